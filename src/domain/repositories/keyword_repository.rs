// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::keyword::{Keyword, KeywordStatus, KeywordUpdate, NewKeyword};
use async_trait::async_trait;
use sea_orm::DbErr;
use thiserror::Error;
use uuid::Uuid;

/// 仓库错误类型
#[derive(Error, Debug)]
pub enum RepositoryError {
    /// 数据库错误
    #[error("Database error: {0}")]
    Database(#[from] DbErr),
    /// 记录未找到
    #[error("Record not found")]
    NotFound,
    /// 条件更新被拒绝，当前状态不允许转换到目标状态
    #[error("Invalid status transition from {from} to {to}")]
    InvalidTransition {
        from: KeywordStatus,
        to: KeywordStatus,
    },
}

/// 关键词仓库特质
///
/// 关键词记录的持久化接口。所有状态写入都经由 [`KeywordUpdate`]
/// 命令完成，实现必须以单条条件更新落库。
#[async_trait]
pub trait KeywordRepository: Send + Sync {
    /// 在一个事务中批量创建 `pending` 关键词，返回带ID的记录
    async fn create_batch(&self, keywords: Vec<NewKeyword>) -> Result<Vec<Keyword>, RepositoryError>;

    /// 根据ID查找关键词
    async fn find_by_id(&self, id: i64) -> Result<Option<Keyword>, RepositoryError>;

    /// 根据ID和所属用户查找关键词
    async fn find_by_id_and_user(
        &self,
        id: i64,
        user_id: Uuid,
    ) -> Result<Option<Keyword>, RepositoryError>;

    /// 列出用户的全部关键词，按创建时间倒序
    async fn list_by_user(&self, user_id: Uuid) -> Result<Vec<Keyword>, RepositoryError>;

    /// 应用更新命令
    ///
    /// # 返回值
    ///
    /// * `Ok(())` - 更新成功
    /// * `Err(RepositoryError::NotFound)` - 记录不存在
    /// * `Err(RepositoryError::InvalidTransition)` - 当前状态不允许该更新
    async fn apply(&self, id: i64, update: KeywordUpdate) -> Result<(), RepositoryError>;

    /// 标记为处理中
    async fn mark_processing(&self, id: i64) -> Result<(), RepositoryError> {
        self.apply(id, KeywordUpdate::MarkProcessing).await
    }

    /// 写入抓取结果并标记为完成
    async fn mark_completed(
        &self,
        id: i64,
        ad_count: i64,
        link_count: i64,
        html_content: String,
    ) -> Result<(), RepositoryError> {
        self.apply(
            id,
            KeywordUpdate::MarkCompleted {
                ad_count,
                link_count,
                html_content,
            },
        )
        .await
    }

    /// 写入错误信息并标记为失败
    async fn mark_failed(&self, id: i64, message: String) -> Result<(), RepositoryError> {
        self.apply(id, KeywordUpdate::MarkFailed { message }).await
    }
}
