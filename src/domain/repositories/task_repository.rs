// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::task::QueuedTask;
use crate::domain::repositories::keyword_repository::RepositoryError;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

/// 任务仓库特质
///
/// 定义延迟队列的数据访问接口
#[async_trait]
pub trait TaskRepository: Send + Sync {
    /// 创建新任务
    async fn create(&self, task: &QueuedTask) -> Result<QueuedTask, RepositoryError>;
    /// 根据ID查找任务
    async fn find_by_id(&self, id: Uuid) -> Result<Option<QueuedTask>, RepositoryError>;
    /// 从指定队列中领取下一个已到期的任务，并以租约锁定
    async fn acquire_next(
        &self,
        worker_id: Uuid,
        queues: &[String],
        lease: Duration,
    ) -> Result<Option<QueuedTask>, RepositoryError>;
    /// 标记任务已完成
    ///
    /// 仅当任务仍处于 `active` 且由 `worker_id` 持有租约时才会写入，
    /// 返回 `false` 表示租约已丢失
    async fn mark_completed(&self, id: Uuid, worker_id: Uuid) -> Result<bool, RepositoryError>;
    /// 重新排队，在指定时间后再次投递；租约条件同 [`TaskRepository::mark_completed`]
    async fn reschedule(
        &self,
        id: Uuid,
        worker_id: Uuid,
        error: &str,
        run_at: DateTime<Utc>,
    ) -> Result<bool, RepositoryError>;
    /// 标记任务最终失败；租约条件同 [`TaskRepository::mark_completed`]
    async fn mark_failed(
        &self,
        id: Uuid,
        worker_id: Uuid,
        error: &str,
    ) -> Result<bool, RepositoryError>;
    /// 将租约已过期的活跃任务重新排队
    async fn reset_stuck_tasks(&self) -> Result<u64, RepositoryError>;
}
