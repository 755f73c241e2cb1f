// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::config::settings::{DispatchSettings, WorkerSettings};
use crate::domain::models::task::DEFAULT_QUEUE;
use crate::queue::task_encoder::{encode_scrape_keyword, SCRAPE_KEYWORD_DELAY};
use crate::queue::task_queue::{EnqueueOptions, QueueError, TaskHandle, TaskQueue};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error};

/// 任务分发配置
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    /// 目标队列
    pub queue: String,
    /// 入队延迟
    pub delay: Duration,
    /// 单个任务最大投递次数
    pub max_retries: i32,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            queue: DEFAULT_QUEUE.to_string(),
            delay: SCRAPE_KEYWORD_DELAY,
            max_retries: 3,
        }
    }
}

impl DispatchConfig {
    pub fn from_settings(dispatch: &DispatchSettings, worker: &WorkerSettings) -> Self {
        Self {
            queue: dispatch.queue.clone(),
            delay: Duration::from_secs(dispatch.delay_secs),
            max_retries: worker.max_retries,
        }
    }
}

/// 抓取任务分发器
///
/// 把关键词ID编码为抓取任务并延迟入队，不校验关键词记录是否存在
pub struct ScrapeDispatcher {
    queue: Arc<dyn TaskQueue>,
    config: DispatchConfig,
}

impl ScrapeDispatcher {
    pub fn new(queue: Arc<dyn TaskQueue>, config: DispatchConfig) -> Self {
        Self { queue, config }
    }

    /// 提交一个关键词抓取任务
    pub async fn submit(&self, keyword_id: i64) -> Result<TaskHandle, QueueError> {
        let options = EnqueueOptions {
            queue: self.config.queue.clone(),
            delay: self.config.delay,
            max_retries: self.config.max_retries,
        };

        let handle = self
            .queue
            .enqueue(encode_scrape_keyword(keyword_id), options)
            .await?;
        metrics::counter!("tasks_enqueued_total").increment(1);
        debug!(keyword_id, task_id = %handle.id, "Enqueued scrape task");

        Ok(handle)
    }

    /// 批量提交抓取任务
    ///
    /// 单个任务入队失败只记录日志，不影响其它任务，也不回滚已创建的记录。
    ///
    /// # 返回值
    ///
    /// 成功入队的任务数量
    pub async fn submit_batch(&self, keyword_ids: &[i64]) -> usize {
        let mut enqueued = 0;

        for &keyword_id in keyword_ids {
            match self.submit(keyword_id).await {
                Ok(_) => enqueued += 1,
                Err(e) => {
                    error!(keyword_id, task = "scrape-keyword", "Failed to enqueue task: {}", e);
                }
            }
        }

        enqueued
    }
}
