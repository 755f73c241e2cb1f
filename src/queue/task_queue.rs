// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::task::{EncodedTask, QueuedTask, TaskStatus, DEFAULT_QUEUE};
use crate::domain::repositories::keyword_repository::RepositoryError;
use crate::domain::repositories::task_repository::TaskRepository;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

/// 队列错误类型
#[derive(Error, Debug)]
pub enum QueueError {
    /// 仓库错误
    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),

    /// 延迟超出可表示范围
    #[error("Invalid delay: {0:?}")]
    InvalidDelay(Duration),

    /// 上报方已不再持有该任务的租约，任务可能已被重新投递
    #[error("Lease lost for task {0}")]
    LeaseLost(Uuid),
}

/// 入队选项
#[derive(Debug, Clone)]
pub struct EnqueueOptions {
    /// 目标队列
    pub queue: String,
    /// 入队延迟，延迟结束前任务不会被投递
    pub delay: Duration,
    /// 最大投递次数
    pub max_retries: i32,
}

impl Default for EnqueueOptions {
    fn default() -> Self {
        Self {
            queue: DEFAULT_QUEUE.to_string(),
            delay: Duration::ZERO,
            max_retries: 3,
        }
    }
}

/// 入队成功后返回的任务句柄
#[derive(Debug, Clone)]
pub struct TaskHandle {
    pub id: Uuid,
    pub queue: String,
    pub scheduled_at: DateTime<Utc>,
}

/// 一次任务投递
#[derive(Debug, Clone)]
pub struct Delivery {
    /// 队列中的任务ID，用于确认或失败上报
    pub id: Uuid,
    /// 来源队列
    pub queue: String,
    /// 当前是第几次投递（从1开始）
    pub attempt: i32,
    /// 编码后的任务
    pub task: EncodedTask,
}

/// 处理失败的上报信息
#[derive(Debug, Clone)]
pub struct TaskFailure {
    pub message: String,
    /// 为 false 时队列不再重试
    pub retryable: bool,
}

/// 任务队列特质
///
/// 延迟投递、至少一次语义的任务传输接口
#[async_trait]
pub trait TaskQueue: Send + Sync {
    /// 入队任务
    async fn enqueue(
        &self,
        task: EncodedTask,
        options: EnqueueOptions,
    ) -> Result<TaskHandle, QueueError>;

    /// 从指定队列中出队一个已到期任务
    async fn dequeue(
        &self,
        worker_id: Uuid,
        queues: &[String],
    ) -> Result<Option<Delivery>, QueueError>;

    /// 确认任务处理成功
    ///
    /// `worker_id` 必须是出队时使用的标识，租约已过期或被他人持有时返回
    /// [`QueueError::LeaseLost`]
    async fn complete(&self, task_id: Uuid, worker_id: Uuid) -> Result<(), QueueError>;

    /// 上报任务处理失败，由队列决定是否重试
    async fn fail(
        &self,
        task_id: Uuid,
        worker_id: Uuid,
        failure: &TaskFailure,
    ) -> Result<(), QueueError>;
}

/// 基于数据库的任务队列实现
pub struct PostgresTaskQueue<R: TaskRepository> {
    /// 任务仓库
    repository: Arc<R>,
    /// 任务被领取后的租约时长
    lease: chrono::Duration,
}

impl<R: TaskRepository> PostgresTaskQueue<R> {
    /// 创建新的任务队列实例
    ///
    /// # 参数
    ///
    /// * `repository` - 任务仓库
    /// * `lease` - 租约时长，应大于单个任务的最长处理时间
    pub fn new(repository: Arc<R>, lease: Duration) -> Self {
        let lease = chrono::Duration::from_std(lease).unwrap_or_else(|_| chrono::Duration::minutes(5));
        Self { repository, lease }
    }
}

#[async_trait]
impl<R: TaskRepository> TaskQueue for PostgresTaskQueue<R> {
    async fn enqueue(
        &self,
        task: EncodedTask,
        options: EnqueueOptions,
    ) -> Result<TaskHandle, QueueError> {
        let delay = chrono::Duration::from_std(options.delay)
            .map_err(|_| QueueError::InvalidDelay(options.delay))?;
        let queued = QueuedTask::new(options.queue, task, delay, options.max_retries);

        let created = self.repository.create(&queued).await?;
        let scheduled_at = created
            .scheduled_at
            .map(|at| at.with_timezone(&Utc))
            .unwrap_or_else(Utc::now);

        Ok(TaskHandle {
            id: created.id,
            queue: created.queue,
            scheduled_at,
        })
    }

    async fn dequeue(
        &self,
        worker_id: Uuid,
        queues: &[String],
    ) -> Result<Option<Delivery>, QueueError> {
        let task = self
            .repository
            .acquire_next(worker_id, queues, self.lease)
            .await?;

        Ok(task.map(|task| Delivery {
            id: task.id,
            queue: task.queue.clone(),
            attempt: task.attempt_count,
            task: task.encoded(),
        }))
    }

    async fn complete(&self, task_id: Uuid, worker_id: Uuid) -> Result<(), QueueError> {
        if !self.repository.mark_completed(task_id, worker_id).await? {
            return Err(QueueError::LeaseLost(task_id));
        }
        Ok(())
    }

    async fn fail(
        &self,
        task_id: Uuid,
        worker_id: Uuid,
        failure: &TaskFailure,
    ) -> Result<(), QueueError> {
        let task = self
            .repository
            .find_by_id(task_id)
            .await?
            .ok_or(RepositoryError::NotFound)?;

        if task.status != TaskStatus::Active || task.lock_token != Some(worker_id) {
            return Err(QueueError::LeaseLost(task_id));
        }

        if failure.retryable && task.can_retry() {
            let backoff = task.retry_backoff();
            let held = self
                .repository
                .reschedule(task_id, worker_id, &failure.message, Utc::now() + backoff)
                .await?;
            if !held {
                return Err(QueueError::LeaseLost(task_id));
            }
            info!(
                task_id = %task_id,
                attempt = task.attempt_count,
                max_retries = task.max_retries,
                "Scheduled retry in {}s",
                backoff.num_seconds()
            );
        } else {
            let held = self
                .repository
                .mark_failed(task_id, worker_id, &failure.message)
                .await?;
            if !held {
                return Err(QueueError::LeaseLost(task_id));
            }
            warn!(
                task_id = %task_id,
                attempt = task.attempt_count,
                retryable = failure.retryable,
                "Task failed permanently"
            );
        }

        Ok(())
    }
}

#[async_trait]
impl<T: TaskQueue + ?Sized> TaskQueue for Arc<T> {
    async fn enqueue(
        &self,
        task: EncodedTask,
        options: EnqueueOptions,
    ) -> Result<TaskHandle, QueueError> {
        (**self).enqueue(task, options).await
    }

    async fn dequeue(
        &self,
        worker_id: Uuid,
        queues: &[String],
    ) -> Result<Option<Delivery>, QueueError> {
        (**self).dequeue(worker_id, queues).await
    }

    async fn complete(&self, task_id: Uuid, worker_id: Uuid) -> Result<(), QueueError> {
        (**self).complete(task_id, worker_id).await
    }

    async fn fail(
        &self,
        task_id: Uuid,
        worker_id: Uuid,
        failure: &TaskFailure,
    ) -> Result<(), QueueError> {
        (**self).fail(task_id, worker_id, failure).await
    }
}
