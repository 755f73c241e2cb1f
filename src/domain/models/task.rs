// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::{DateTime, Duration, FixedOffset, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// 默认队列名称
pub const DEFAULT_QUEUE: &str = "default";

/// 可序列化的任务描述
///
/// 只包含任务类型标签和JSON负载，不携带任何进程内状态，
/// 因此可以跨进程重启被解码。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncodedTask {
    /// 任务类型标签，例如 `scrape:keyword`
    pub task_type: String,
    /// 任务负载
    pub payload: serde_json::Value,
}

impl EncodedTask {
    pub fn new(task_type: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            task_type: task_type.into(),
            payload,
        }
    }
}

/// 队列中的任务记录
///
/// 延迟队列的持久化单元。`scheduled_at` 之前任务不可被投递，
/// 被工作者领取后通过 `lock_token` 与 `lock_expires_at` 租约锁定，
/// 租约过期的任务会被重新投递（至少一次语义）。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueuedTask {
    /// 任务唯一标识符
    pub id: Uuid,
    /// 所属队列
    pub queue: String,
    /// 任务类型标签
    pub task_type: String,
    /// 任务状态
    pub status: TaskStatus,
    /// 任务负载数据
    pub payload: serde_json::Value,
    /// 已投递次数
    pub attempt_count: i32,
    /// 最大投递次数
    pub max_retries: i32,
    /// 最早可投递时间
    pub scheduled_at: Option<DateTime<FixedOffset>>,
    /// 锁定令牌（领取该任务的工作者）
    pub lock_token: Option<Uuid>,
    /// 锁定过期时间
    pub lock_expires_at: Option<DateTime<FixedOffset>>,
    /// 最近一次失败原因
    pub last_error: Option<String>,
    /// 最近一次开始执行时间
    pub started_at: Option<DateTime<FixedOffset>>,
    /// 完成时间
    pub completed_at: Option<DateTime<FixedOffset>>,
    /// 创建时间
    pub created_at: DateTime<FixedOffset>,
    /// 更新时间
    pub updated_at: DateTime<FixedOffset>,
}

/// 队列任务状态
///
/// Queued → Active → Completed/Failed，Active 的任务在失败后
/// 可能被重新排入 Queued。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// 已入队，等待投递
    #[default]
    Queued,
    /// 已被工作者领取
    Active,
    /// 处理成功
    Completed,
    /// 已失败，不再重试
    Failed,
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            TaskStatus::Queued => write!(f, "queued"),
            TaskStatus::Active => write!(f, "active"),
            TaskStatus::Completed => write!(f, "completed"),
            TaskStatus::Failed => write!(f, "failed"),
        }
    }
}

impl FromStr for TaskStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "queued" => Ok(TaskStatus::Queued),
            "active" => Ok(TaskStatus::Active),
            "completed" => Ok(TaskStatus::Completed),
            "failed" => Ok(TaskStatus::Failed),
            _ => Err(()),
        }
    }
}

impl QueuedTask {
    /// 创建一个新的队列任务
    ///
    /// # 参数
    ///
    /// * `queue` - 队列名称
    /// * `task` - 编码后的任务
    /// * `delay` - 入队延迟
    /// * `max_retries` - 最大投递次数
    pub fn new(queue: impl Into<String>, task: EncodedTask, delay: Duration, max_retries: i32) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            queue: queue.into(),
            task_type: task.task_type,
            status: TaskStatus::Queued,
            payload: task.payload,
            attempt_count: 0,
            max_retries,
            scheduled_at: Some((now + delay).into()),
            lock_token: None,
            lock_expires_at: None,
            last_error: None,
            started_at: None,
            completed_at: None,
            created_at: now.into(),
            updated_at: now.into(),
        }
    }

    /// 取出编码后的任务描述
    pub fn encoded(&self) -> EncodedTask {
        EncodedTask::new(self.task_type.clone(), self.payload.clone())
    }

    /// 判断任务是否还可以重试
    pub fn can_retry(&self) -> bool {
        self.attempt_count < self.max_retries
    }

    /// 下一次重试前的退避时间，按投递次数指数增长，上限一小时
    pub fn retry_backoff(&self) -> Duration {
        let exponent = self.attempt_count.clamp(0, 12) as u32;
        Duration::seconds(2i64.pow(exponent).min(3600))
    }
}
