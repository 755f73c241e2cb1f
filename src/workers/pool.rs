// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::config::settings::WorkerSettings;
use crate::domain::models::task::DEFAULT_QUEUE;
use crate::queue::task_queue::{Delivery, QueueError, TaskFailure, TaskQueue};
use crate::workers::worker::{HandlerError, TaskHandler};
use futures::future::join_all;
use futures::FutureExt;
use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

static NEXT_EXECUTOR_ID: AtomicU64 = AtomicU64::new(1);

/// 工作者池配置
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// 并发执行器数量
    pub concurrency: usize,
    /// 监听的队列
    pub queues: Vec<String>,
    /// 队列为空时的轮询间隔
    pub poll_interval: Duration,
    /// 停止时等待进行中任务的时长
    pub shutdown_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            concurrency: 10,
            queues: vec![DEFAULT_QUEUE.to_string()],
            poll_interval: Duration::from_millis(500),
            shutdown_timeout: Duration::from_secs(30),
        }
    }
}

impl From<&WorkerSettings> for PoolConfig {
    fn from(settings: &WorkerSettings) -> Self {
        Self {
            concurrency: settings.concurrency.max(1),
            queues: settings.queues.clone(),
            poll_interval: Duration::from_millis(settings.poll_interval_ms),
            shutdown_timeout: Duration::from_secs(settings.shutdown_timeout_secs),
        }
    }
}

/// 工作者池
///
/// 固定数量的执行器从命名队列中出队任务，按类型标签路由到处理器，
/// 成功时确认，失败时连同可重试性一起上报给队列。
pub struct WorkerPool {
    queue: Arc<dyn TaskQueue>,
    handlers: HashMap<String, Arc<dyn TaskHandler>>,
    poll_interval: Duration,
    shutdown: CancellationToken,
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// 创建新的工作者池
    ///
    /// # 参数
    ///
    /// * `queue` - 任务队列
    /// * `poll_interval` - 队列为空时的轮询间隔
    pub fn new(queue: Arc<dyn TaskQueue>, poll_interval: Duration) -> Self {
        Self {
            queue,
            handlers: HashMap::new(),
            poll_interval,
            shutdown: CancellationToken::new(),
            handles: Vec::new(),
        }
    }

    /// 为任务类型注册处理器，已启动的执行器不受影响
    pub fn register(&mut self, task_type: impl Into<String>, handler: Arc<dyn TaskHandler>) -> &mut Self {
        self.handlers.insert(task_type.into(), handler);
        self
    }

    /// 是否有执行器在运行
    pub fn is_running(&self) -> bool {
        self.handles.iter().any(|h| !h.is_finished())
    }

    /// 启动执行器
    ///
    /// # 参数
    ///
    /// * `concurrency` - 执行器数量，即同时处理的最大任务数
    /// * `queues` - 监听的队列
    pub fn start(&mut self, concurrency: usize, queues: Vec<String>) {
        if self.shutdown.is_cancelled() {
            self.shutdown = CancellationToken::new();
        }

        let handlers = Arc::new(self.handlers.clone());
        let queues: Arc<[String]> = queues.into();

        for _ in 0..concurrency {
            let executor = Executor {
                id: NEXT_EXECUTOR_ID.fetch_add(1, Ordering::Relaxed),
                worker_id: Uuid::new_v4(),
                queue: self.queue.clone(),
                handlers: handlers.clone(),
                queues: queues.clone(),
                poll_interval: self.poll_interval,
            };
            let shutdown = self.shutdown.clone();
            self.handles
                .push(tokio::spawn(async move { executor.run(shutdown).await }));
        }

        info!(concurrency, queues = ?queues, "Worker pool started");
    }

    /// 停止工作者池
    ///
    /// 执行器不再出队新任务；进行中的任务最多等待 `deadline`，
    /// 超时后中止。被中止的任务保留租约，过期后由队列重新投递。
    ///
    /// # 返回值
    ///
    /// 被中止的执行器数量
    pub async fn stop(&mut self, deadline: Duration) -> usize {
        self.shutdown.cancel();
        let handles = std::mem::take(&mut self.handles);
        let aborts: Vec<_> = handles.iter().map(|h| h.abort_handle()).collect();

        match timeout(deadline, join_all(handles)).await {
            Ok(_) => {
                info!("Worker pool stopped");
                0
            }
            Err(_) => {
                let aborted = aborts.iter().filter(|h| !h.is_finished()).count();
                for handle in &aborts {
                    handle.abort();
                }
                warn!(aborted, "Worker pool stop deadline exceeded, aborting in-flight tasks");
                aborted
            }
        }
    }

    /// 启动并运行直到 `signal` 完成，然后在 `deadline` 内停止
    pub async fn run_until<F>(&mut self, signal: F, concurrency: usize, queues: Vec<String>, deadline: Duration)
    where
        F: Future<Output = ()>,
    {
        self.start(concurrency, queues);
        signal.await;
        info!("Shutting down workers...");
        self.stop(deadline).await;
    }
}

struct Executor {
    id: u64,
    worker_id: Uuid,
    queue: Arc<dyn TaskQueue>,
    handlers: Arc<HashMap<String, Arc<dyn TaskHandler>>>,
    queues: Arc<[String]>,
    poll_interval: Duration,
}

impl Executor {
    async fn run(self, shutdown: CancellationToken) {
        debug!(executor = self.id, "Executor started");

        loop {
            let next = tokio::select! {
                _ = shutdown.cancelled() => break,
                next = self.queue.dequeue(self.worker_id, &self.queues) => next,
            };

            match next {
                // In-flight work is not interrupted by the shutdown token
                Ok(Some(delivery)) => self.process(delivery).await,
                Ok(None) => {
                    tokio::select! {
                        _ = shutdown.cancelled() => break,
                        _ = sleep(self.poll_interval) => {}
                    }
                }
                Err(e) => {
                    error!(executor = self.id, "Failed to dequeue task: {}", e);
                    tokio::select! {
                        _ = shutdown.cancelled() => break,
                        _ = sleep(self.poll_interval) => {}
                    }
                }
            }
        }

        debug!(executor = self.id, "Executor stopped");
    }

    async fn process(&self, delivery: Delivery) {
        let task_type = delivery.task.task_type.clone();
        let result = match self.handlers.get(&task_type) {
            Some(handler) => AssertUnwindSafe(handler.handle(&delivery))
                .catch_unwind()
                .await
                .unwrap_or_else(|panic| Err(HandlerError::Panicked(panic_message(&*panic)))),
            None => Err(HandlerError::UnknownTaskType(task_type.clone())),
        };

        match result {
            Ok(()) => {
                match self.queue.complete(delivery.id, self.worker_id).await {
                    Ok(()) => {}
                    Err(e @ QueueError::LeaseLost(_)) => {
                        warn!(task_id = %delivery.id, "Acknowledgement dropped: {}", e);
                        metrics::counter!("tasks_lease_lost_total").increment(1);
                    }
                    Err(e) => error!(task_id = %delivery.id, "Failed to acknowledge task: {}", e),
                }
            }
            Err(e) => {
                let failure = TaskFailure {
                    message: e.to_string(),
                    retryable: e.is_retryable(),
                };
                warn!(
                    executor = self.id,
                    task_id = %delivery.id,
                    task_type = %task_type,
                    attempt = delivery.attempt,
                    retryable = failure.retryable,
                    "Task failed: {}",
                    failure.message
                );
                match self.queue.fail(delivery.id, self.worker_id, &failure).await {
                    Ok(()) => {}
                    Err(e @ QueueError::LeaseLost(_)) => {
                        warn!(task_id = %delivery.id, "Failure report dropped: {}", e);
                        metrics::counter!("tasks_lease_lost_total").increment(1);
                    }
                    Err(e) => error!(task_id = %delivery.id, "Failed to report task failure: {}", e),
                }
            }
        }
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
#[path = "pool_test.rs"]
mod tests;
