// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::repositories::keyword_repository::RepositoryError;
use crate::engines::traits::ScrapeError;
use crate::queue::task_encoder::TaskDecodeError;
use crate::queue::task_queue::Delivery;
use async_trait::async_trait;
use thiserror::Error;

/// 任务处理错误类型
#[derive(Error, Debug)]
pub enum HandlerError {
    /// 任务无法解码
    #[error("Decode error: {0}")]
    Decode(#[from] TaskDecodeError),
    /// 仓库错误
    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),
    /// 抓取错误
    #[error("Scrape error: {0}")]
    Scrape(#[from] ScrapeError),
    /// 没有为该类型注册处理器
    #[error("No handler registered for task type {0}")]
    UnknownTaskType(String),
    /// 处理器发生panic
    #[error("Handler panicked: {0}")]
    Panicked(String),
}

impl HandlerError {
    /// 判断错误是否可重试
    ///
    /// 解码失败、未知类型和记录缺失重试也不会成功
    pub fn is_retryable(&self) -> bool {
        match self {
            HandlerError::Decode(_) | HandlerError::UnknownTaskType(_) => false,
            HandlerError::Repository(RepositoryError::Database(_)) => true,
            HandlerError::Repository(_) => false,
            HandlerError::Scrape(e) => e.is_retryable(),
            HandlerError::Panicked(_) => true,
        }
    }
}

/// 任务处理器特质
///
/// 工作者池按任务类型标签把投递路由到已注册的处理器
#[async_trait]
pub trait TaskHandler: Send + Sync {
    /// 处理一次投递，返回 `Ok` 时确认任务，返回 `Err` 时上报失败
    async fn handle(&self, delivery: &Delivery) -> Result<(), HandlerError>;
}
