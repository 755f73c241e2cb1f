// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::repositories::task_repository::TaskRepository;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::interval;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// 任务调度器
///
/// 负责队列的维护工作：把租约已过期的活跃任务重新排队，
/// 使崩溃工作者手上的任务得以重新投递。
pub struct TaskScheduler<R: TaskRepository + Send + Sync + 'static> {
    /// 任务仓库
    repository: Arc<R>,
    /// 维护周期
    period: Duration,
}

impl<R: TaskRepository + Send + Sync + 'static> TaskScheduler<R> {
    /// 创建新的任务调度器实例
    ///
    /// # 参数
    ///
    /// * `repository` - 任务仓库
    /// * `period` - 维护周期
    pub fn new(repository: Arc<R>, period: Duration) -> Self {
        Self { repository, period }
    }

    /// 执行一次维护
    ///
    /// # 返回值
    ///
    /// 被重新排队的任务数量
    pub async fn tick(&self) -> u64 {
        match self.repository.reset_stuck_tasks().await {
            Ok(count) => {
                if count > 0 {
                    info!("Requeued {} tasks with expired leases", count);
                }
                count
            }
            Err(e) => {
                error!("Failed to reset stuck tasks: {}", e);
                0
            }
        }
    }

    /// 启动调度器后台任务
    ///
    /// # 参数
    ///
    /// * `shutdown` - 取消后后台任务退出
    ///
    /// # 返回值
    ///
    /// 返回后台任务的句柄
    pub fn start(self, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = interval(self.period);

            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = ticker.tick() => {
                        self.tick().await;
                        debug!("Scheduler maintenance tick");
                    }
                }
            }

            info!("Task scheduler stopped");
        })
    }
}
