// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::task::{QueuedTask, TaskStatus};
use crate::domain::repositories::keyword_repository::RepositoryError;
use crate::domain::repositories::task_repository::TaskRepository;
use crate::infrastructure::database::entities::task as task_entity;
use async_trait::async_trait;
use chrono::{DateTime, Duration, FixedOffset, Utc};
use sea_orm::{
    sea_query::{Expr, LockBehavior, LockType},
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DatabaseConnection, DbBackend,
    EntityTrait, QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

/// 任务仓库实现
///
/// 基于SeaORM实现的任务数据访问层
#[derive(Clone)]
pub struct TaskRepositoryImpl {
    /// 数据库连接
    db: Arc<DatabaseConnection>,
}

impl TaskRepositoryImpl {
    /// 创建新的任务仓库实例
    ///
    /// # 参数
    ///
    /// * `db` - 数据库连接
    ///
    /// # 返回值
    ///
    /// 返回新的任务仓库实例
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    fn now() -> DateTime<FixedOffset> {
        Utc::now().into()
    }

    /// 仍由指定工作者持有租约的活跃任务
    fn held_by(id: Uuid, worker_id: Uuid) -> Condition {
        Condition::all()
            .add(task_entity::Column::Id.eq(id))
            .add(task_entity::Column::Status.eq(TaskStatus::Active.to_string()))
            .add(task_entity::Column::LockToken.eq(worker_id))
    }
}

impl From<task_entity::Model> for QueuedTask {
    fn from(model: task_entity::Model) -> Self {
        Self {
            id: model.id,
            queue: model.queue,
            task_type: model.task_type,
            status: model.status.parse().unwrap_or_default(),
            payload: model.payload,
            attempt_count: model.attempt_count,
            max_retries: model.max_retries,
            scheduled_at: model.scheduled_at,
            lock_token: model.lock_token,
            lock_expires_at: model.lock_expires_at,
            last_error: model.last_error,
            started_at: model.started_at,
            completed_at: model.completed_at,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

impl From<QueuedTask> for task_entity::ActiveModel {
    fn from(task: QueuedTask) -> Self {
        Self {
            id: Set(task.id),
            queue: Set(task.queue),
            task_type: Set(task.task_type),
            status: Set(task.status.to_string()),
            payload: Set(task.payload),
            attempt_count: Set(task.attempt_count),
            max_retries: Set(task.max_retries),
            scheduled_at: Set(task.scheduled_at),
            lock_token: Set(task.lock_token),
            lock_expires_at: Set(task.lock_expires_at),
            last_error: Set(task.last_error),
            started_at: Set(task.started_at),
            completed_at: Set(task.completed_at),
            created_at: Set(task.created_at),
            updated_at: Set(task.updated_at),
        }
    }
}

#[async_trait]
impl TaskRepository for TaskRepositoryImpl {
    async fn create(&self, task: &QueuedTask) -> Result<QueuedTask, RepositoryError> {
        let model: task_entity::ActiveModel = task.clone().into();

        model.insert(self.db.as_ref()).await?;
        Ok(task.clone())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<QueuedTask>, RepositoryError> {
        let model = task_entity::Entity::find_by_id(id)
            .one(self.db.as_ref())
            .await?;

        Ok(model.map(Into::into))
    }

    async fn acquire_next(
        &self,
        worker_id: Uuid,
        queues: &[String],
        lease: Duration,
    ) -> Result<Option<QueuedTask>, RepositoryError> {
        let txn = self.db.begin().await?;
        let now = Self::now();

        let mut query = task_entity::Entity::find()
            .filter(task_entity::Column::Status.eq(TaskStatus::Queued.to_string()))
            .filter(task_entity::Column::Queue.is_in(queues.iter().cloned()))
            .filter(
                Condition::any()
                    .add(task_entity::Column::ScheduledAt.is_null())
                    .add(task_entity::Column::ScheduledAt.lte(now)),
            )
            .order_by_asc(task_entity::Column::ScheduledAt)
            .order_by_asc(task_entity::Column::CreatedAt);

        if txn.get_database_backend() == DbBackend::Postgres {
            query = query.lock_with_behavior(LockType::Update, LockBehavior::SkipLocked);
        }

        let Some(candidate) = query.one(&txn).await? else {
            txn.commit().await?;
            return Ok(None);
        };

        // Guarded claim: a concurrent claimant on a backend without row locks updates nothing
        let claimed = task_entity::Entity::update_many()
            .col_expr(
                task_entity::Column::Status,
                Expr::value(TaskStatus::Active.to_string()),
            )
            .col_expr(task_entity::Column::LockToken, Expr::value(Some(worker_id)))
            .col_expr(
                task_entity::Column::LockExpiresAt,
                Expr::value(Some(DateTime::<FixedOffset>::from(Utc::now() + lease))),
            )
            .col_expr(task_entity::Column::StartedAt, Expr::value(Some(now)))
            .col_expr(
                task_entity::Column::AttemptCount,
                Expr::col(task_entity::Column::AttemptCount).add(1),
            )
            .col_expr(task_entity::Column::UpdatedAt, Expr::value(now))
            .filter(task_entity::Column::Id.eq(candidate.id))
            .filter(task_entity::Column::Status.eq(TaskStatus::Queued.to_string()))
            .exec(&txn)
            .await?;

        if claimed.rows_affected == 0 {
            txn.commit().await?;
            return Ok(None);
        }

        let task = task_entity::Entity::find_by_id(candidate.id).one(&txn).await?;
        txn.commit().await?;

        Ok(task.map(Into::into))
    }

    async fn mark_completed(&self, id: Uuid, worker_id: Uuid) -> Result<bool, RepositoryError> {
        let now = Self::now();
        let result = task_entity::Entity::update_many()
            .col_expr(
                task_entity::Column::Status,
                Expr::value(TaskStatus::Completed.to_string()),
            )
            .col_expr(task_entity::Column::CompletedAt, Expr::value(Some(now)))
            .col_expr(task_entity::Column::LockToken, Expr::value(Option::<Uuid>::None))
            .col_expr(
                task_entity::Column::LockExpiresAt,
                Expr::value(Option::<DateTime<FixedOffset>>::None),
            )
            .col_expr(task_entity::Column::UpdatedAt, Expr::value(now))
            .filter(Self::held_by(id, worker_id))
            .exec(self.db.as_ref())
            .await?;

        Ok(result.rows_affected > 0)
    }

    async fn reschedule(
        &self,
        id: Uuid,
        worker_id: Uuid,
        error: &str,
        run_at: DateTime<Utc>,
    ) -> Result<bool, RepositoryError> {
        let now = Self::now();
        let result = task_entity::Entity::update_many()
            .col_expr(
                task_entity::Column::Status,
                Expr::value(TaskStatus::Queued.to_string()),
            )
            .col_expr(
                task_entity::Column::ScheduledAt,
                Expr::value(Some(DateTime::<FixedOffset>::from(run_at))),
            )
            .col_expr(task_entity::Column::LastError, Expr::value(Some(error.to_string())))
            .col_expr(task_entity::Column::LockToken, Expr::value(Option::<Uuid>::None))
            .col_expr(
                task_entity::Column::LockExpiresAt,
                Expr::value(Option::<DateTime<FixedOffset>>::None),
            )
            .col_expr(task_entity::Column::UpdatedAt, Expr::value(now))
            .filter(Self::held_by(id, worker_id))
            .exec(self.db.as_ref())
            .await?;

        Ok(result.rows_affected > 0)
    }

    async fn mark_failed(
        &self,
        id: Uuid,
        worker_id: Uuid,
        error: &str,
    ) -> Result<bool, RepositoryError> {
        let now = Self::now();
        let result = task_entity::Entity::update_many()
            .col_expr(
                task_entity::Column::Status,
                Expr::value(TaskStatus::Failed.to_string()),
            )
            .col_expr(task_entity::Column::LastError, Expr::value(Some(error.to_string())))
            .col_expr(task_entity::Column::CompletedAt, Expr::value(Some(now)))
            .col_expr(task_entity::Column::LockToken, Expr::value(Option::<Uuid>::None))
            .col_expr(
                task_entity::Column::LockExpiresAt,
                Expr::value(Option::<DateTime<FixedOffset>>::None),
            )
            .col_expr(task_entity::Column::UpdatedAt, Expr::value(now))
            .filter(Self::held_by(id, worker_id))
            .exec(self.db.as_ref())
            .await?;

        Ok(result.rows_affected > 0)
    }

    async fn reset_stuck_tasks(&self) -> Result<u64, RepositoryError> {
        let now = Self::now();
        let expired = || {
            Condition::all()
                .add(task_entity::Column::Status.eq(TaskStatus::Active.to_string()))
                .add(task_entity::Column::LockExpiresAt.lte(now))
        };

        // Leases that already used up their delivery budget are not redelivered
        let exhausted = task_entity::Entity::update_many()
            .col_expr(
                task_entity::Column::Status,
                Expr::value(TaskStatus::Failed.to_string()),
            )
            .col_expr(
                task_entity::Column::LastError,
                Expr::value(Some("lease expired".to_string())),
            )
            .col_expr(task_entity::Column::CompletedAt, Expr::value(Some(now)))
            .col_expr(task_entity::Column::LockToken, Expr::value(Option::<Uuid>::None))
            .col_expr(
                task_entity::Column::LockExpiresAt,
                Expr::value(Option::<DateTime<FixedOffset>>::None),
            )
            .col_expr(task_entity::Column::UpdatedAt, Expr::value(now))
            .filter(expired())
            .filter(
                Expr::col(task_entity::Column::AttemptCount)
                    .gte(Expr::col(task_entity::Column::MaxRetries)),
            )
            .exec(self.db.as_ref())
            .await?;

        if exhausted.rows_affected > 0 {
            warn!(
                "{} tasks failed after their lease expired on the last attempt",
                exhausted.rows_affected
            );
        }

        let requeued = task_entity::Entity::update_many()
            .col_expr(
                task_entity::Column::Status,
                Expr::value(TaskStatus::Queued.to_string()),
            )
            .col_expr(task_entity::Column::ScheduledAt, Expr::value(Some(now)))
            .col_expr(task_entity::Column::LockToken, Expr::value(Option::<Uuid>::None))
            .col_expr(
                task_entity::Column::LockExpiresAt,
                Expr::value(Option::<DateTime<FixedOffset>>::None),
            )
            .col_expr(task_entity::Column::UpdatedAt, Expr::value(now))
            .filter(expired())
            .exec(self.db.as_ref())
            .await?;

        Ok(requeued.rows_affected)
    }
}
