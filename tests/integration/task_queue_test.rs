// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use super::helpers::create_context;
use chrono::Utc;
use serpscout::domain::models::task::TaskStatus;
use serpscout::domain::repositories::task_repository::TaskRepository;
use serpscout::queue::scheduler::TaskScheduler;
use serpscout::queue::task_encoder::{decode_scrape_keyword, encode_scrape_keyword};
use serpscout::queue::task_queue::{EnqueueOptions, QueueError, TaskFailure};
use std::time::Duration;
use uuid::Uuid;

fn default_queue() -> Vec<String> {
    vec!["default".to_string()]
}

fn immediate() -> EnqueueOptions {
    EnqueueOptions {
        delay: Duration::ZERO,
        ..EnqueueOptions::default()
    }
}

#[tokio::test]
async fn test_delayed_task_is_not_delivered_early() {
    let ctx = create_context(Duration::from_secs(60), Duration::ZERO).await;

    let handle = ctx
        .queue
        .enqueue(
            encode_scrape_keyword(1),
            EnqueueOptions {
                delay: Duration::from_secs(3600),
                ..EnqueueOptions::default()
            },
        )
        .await
        .unwrap();
    assert!(handle.scheduled_at > Utc::now() + chrono::Duration::minutes(59));

    let delivery = ctx
        .queue
        .dequeue(Uuid::new_v4(), &default_queue())
        .await
        .unwrap();
    assert!(delivery.is_none());
}

#[tokio::test]
async fn test_due_task_is_leased_once() {
    let ctx = create_context(Duration::from_secs(60), Duration::ZERO).await;
    let worker_id = Uuid::new_v4();

    let handle = ctx
        .queue
        .enqueue(encode_scrape_keyword(7), immediate())
        .await
        .unwrap();

    let delivery = ctx
        .queue
        .dequeue(worker_id, &default_queue())
        .await
        .unwrap()
        .expect("task should be due");
    assert_eq!(delivery.id, handle.id);
    assert_eq!(delivery.attempt, 1);
    assert_eq!(decode_scrape_keyword(&delivery.task).unwrap().keyword_id, 7);

    // Leased tasks are invisible to other workers
    assert!(ctx
        .queue
        .dequeue(Uuid::new_v4(), &default_queue())
        .await
        .unwrap()
        .is_none());

    let stored = ctx.task_repo.find_by_id(handle.id).await.unwrap().unwrap();
    assert_eq!(stored.status, TaskStatus::Active);
    assert_eq!(stored.lock_token, Some(worker_id));
    assert!(stored.lock_expires_at.is_some());
}

#[tokio::test]
async fn test_dequeue_only_reads_requested_queues() {
    let ctx = create_context(Duration::from_secs(60), Duration::ZERO).await;

    ctx.queue
        .enqueue(
            encode_scrape_keyword(1),
            EnqueueOptions {
                queue: "critical".to_string(),
                ..immediate()
            },
        )
        .await
        .unwrap();

    assert!(ctx
        .queue
        .dequeue(Uuid::new_v4(), &default_queue())
        .await
        .unwrap()
        .is_none());
    assert!(ctx
        .queue
        .dequeue(Uuid::new_v4(), &["critical".to_string()])
        .await
        .unwrap()
        .is_some());
}

#[tokio::test]
async fn test_complete_marks_task_completed() {
    let ctx = create_context(Duration::from_secs(60), Duration::ZERO).await;
    let worker_id = Uuid::new_v4();
    ctx.queue
        .enqueue(encode_scrape_keyword(1), immediate())
        .await
        .unwrap();

    let delivery = ctx
        .queue
        .dequeue(worker_id, &default_queue())
        .await
        .unwrap()
        .unwrap();
    ctx.queue.complete(delivery.id, worker_id).await.unwrap();

    let stored = ctx.task_repo.find_by_id(delivery.id).await.unwrap().unwrap();
    assert_eq!(stored.status, TaskStatus::Completed);
    assert!(stored.completed_at.is_some());
    assert!(stored.lock_token.is_none());
}

#[tokio::test]
async fn test_retryable_failure_is_rescheduled_with_backoff() {
    let ctx = create_context(Duration::from_secs(60), Duration::ZERO).await;
    let worker_id = Uuid::new_v4();
    ctx.queue
        .enqueue(encode_scrape_keyword(1), immediate())
        .await
        .unwrap();

    let delivery = ctx
        .queue
        .dequeue(worker_id, &default_queue())
        .await
        .unwrap()
        .unwrap();
    ctx.queue
        .fail(
            delivery.id,
            worker_id,
            &TaskFailure {
                message: "status 503".to_string(),
                retryable: true,
            },
        )
        .await
        .unwrap();

    let stored = ctx.task_repo.find_by_id(delivery.id).await.unwrap().unwrap();
    assert_eq!(stored.status, TaskStatus::Queued);
    assert_eq!(stored.last_error.as_deref(), Some("status 503"));
    assert!(stored.scheduled_at.unwrap().with_timezone(&Utc) > Utc::now());

    // Backoff keeps it invisible for now
    assert!(ctx
        .queue
        .dequeue(Uuid::new_v4(), &default_queue())
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_non_retryable_failure_is_final() {
    let ctx = create_context(Duration::from_secs(60), Duration::ZERO).await;
    let worker_id = Uuid::new_v4();
    ctx.queue
        .enqueue(encode_scrape_keyword(1), immediate())
        .await
        .unwrap();

    let delivery = ctx
        .queue
        .dequeue(worker_id, &default_queue())
        .await
        .unwrap()
        .unwrap();
    ctx.queue
        .fail(
            delivery.id,
            worker_id,
            &TaskFailure {
                message: "invalid payload".to_string(),
                retryable: false,
            },
        )
        .await
        .unwrap();

    let stored = ctx.task_repo.find_by_id(delivery.id).await.unwrap().unwrap();
    assert_eq!(stored.status, TaskStatus::Failed);
    assert_eq!(stored.last_error.as_deref(), Some("invalid payload"));
}

#[tokio::test]
async fn test_retry_budget_exhaustion_is_final() {
    let ctx = create_context(Duration::from_secs(60), Duration::ZERO).await;
    let worker_id = Uuid::new_v4();
    ctx.queue
        .enqueue(
            encode_scrape_keyword(1),
            EnqueueOptions {
                max_retries: 1,
                ..immediate()
            },
        )
        .await
        .unwrap();

    let delivery = ctx
        .queue
        .dequeue(worker_id, &default_queue())
        .await
        .unwrap()
        .unwrap();
    ctx.queue
        .fail(
            delivery.id,
            worker_id,
            &TaskFailure {
                message: "timeout".to_string(),
                retryable: true,
            },
        )
        .await
        .unwrap();

    let stored = ctx.task_repo.find_by_id(delivery.id).await.unwrap().unwrap();
    assert_eq!(stored.status, TaskStatus::Failed);
}

#[tokio::test]
async fn test_scheduler_requeues_expired_lease() {
    // A zero lease expires as soon as the task is claimed
    let ctx = create_context(Duration::ZERO, Duration::ZERO).await;
    let handle = ctx
        .queue
        .enqueue(encode_scrape_keyword(1), immediate())
        .await
        .unwrap();

    let first = ctx
        .queue
        .dequeue(Uuid::new_v4(), &default_queue())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(first.attempt, 1);

    tokio::time::sleep(Duration::from_millis(20)).await;
    let scheduler = TaskScheduler::new(ctx.task_repo.clone(), Duration::from_secs(60));
    assert_eq!(scheduler.tick().await, 1);

    let stored = ctx.task_repo.find_by_id(handle.id).await.unwrap().unwrap();
    assert_eq!(stored.status, TaskStatus::Queued);
    assert!(stored.lock_token.is_none());

    let second = ctx
        .queue
        .dequeue(Uuid::new_v4(), &default_queue())
        .await
        .unwrap()
        .expect("expired lease should be redelivered");
    assert_eq!(second.id, handle.id);
    assert_eq!(second.attempt, 2);
}

#[tokio::test]
async fn test_scheduler_fails_expired_lease_without_budget() {
    let ctx = create_context(Duration::ZERO, Duration::ZERO).await;
    let handle = ctx
        .queue
        .enqueue(
            encode_scrape_keyword(1),
            EnqueueOptions {
                max_retries: 1,
                ..immediate()
            },
        )
        .await
        .unwrap();

    ctx.queue
        .dequeue(Uuid::new_v4(), &default_queue())
        .await
        .unwrap()
        .unwrap();

    tokio::time::sleep(Duration::from_millis(20)).await;
    let scheduler = TaskScheduler::new(ctx.task_repo.clone(), Duration::from_secs(60));
    assert_eq!(scheduler.tick().await, 0);

    let stored = ctx.task_repo.find_by_id(handle.id).await.unwrap().unwrap();
    assert_eq!(stored.status, TaskStatus::Failed);
    assert_eq!(stored.last_error.as_deref(), Some("lease expired"));
}

#[tokio::test]
async fn test_scheduler_leaves_live_leases_alone() {
    let ctx = create_context(Duration::from_secs(60), Duration::ZERO).await;
    ctx.queue
        .enqueue(encode_scrape_keyword(1), immediate())
        .await
        .unwrap();
    let delivery = ctx
        .queue
        .dequeue(Uuid::new_v4(), &default_queue())
        .await
        .unwrap()
        .unwrap();

    let scheduler = TaskScheduler::new(ctx.task_repo.clone(), Duration::from_secs(60));
    assert_eq!(scheduler.tick().await, 0);

    let stored = ctx.task_repo.find_by_id(delivery.id).await.unwrap().unwrap();
    assert_eq!(stored.status, TaskStatus::Active);
}

#[tokio::test]
async fn test_stale_worker_cannot_settle_redelivered_task() {
    let ctx = create_context(Duration::ZERO, Duration::ZERO).await;
    let stale_worker = Uuid::new_v4();
    let current_worker = Uuid::new_v4();
    let handle = ctx
        .queue
        .enqueue(encode_scrape_keyword(1), immediate())
        .await
        .unwrap();

    ctx.queue
        .dequeue(stale_worker, &default_queue())
        .await
        .unwrap()
        .unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;
    let scheduler = TaskScheduler::new(ctx.task_repo.clone(), Duration::from_secs(60));
    assert_eq!(scheduler.tick().await, 1);

    let redelivered = ctx
        .queue
        .dequeue(current_worker, &default_queue())
        .await
        .unwrap()
        .expect("expired lease should be redelivered");
    assert_eq!(redelivered.id, handle.id);

    let completed = ctx.queue.complete(handle.id, stale_worker).await;
    assert!(matches!(completed, Err(QueueError::LeaseLost(id)) if id == handle.id));

    let failed = ctx
        .queue
        .fail(
            handle.id,
            stale_worker,
            &TaskFailure {
                message: "late failure".to_string(),
                retryable: false,
            },
        )
        .await;
    assert!(matches!(failed, Err(QueueError::LeaseLost(_))));

    let stored = ctx.task_repo.find_by_id(handle.id).await.unwrap().unwrap();
    assert_eq!(stored.status, TaskStatus::Active);
    assert_eq!(stored.lock_token, Some(current_worker));
    assert!(stored.last_error.is_none());

    ctx.queue.complete(handle.id, current_worker).await.unwrap();
    let stored = ctx.task_repo.find_by_id(handle.id).await.unwrap().unwrap();
    assert_eq!(stored.status, TaskStatus::Completed);
}

#[tokio::test]
async fn test_settled_task_rejects_second_acknowledgement() {
    let ctx = create_context(Duration::from_secs(60), Duration::ZERO).await;
    let worker_id = Uuid::new_v4();
    ctx.queue
        .enqueue(encode_scrape_keyword(1), immediate())
        .await
        .unwrap();

    let delivery = ctx
        .queue
        .dequeue(worker_id, &default_queue())
        .await
        .unwrap()
        .unwrap();
    ctx.queue.complete(delivery.id, worker_id).await.unwrap();

    assert!(matches!(
        ctx.queue.complete(delivery.id, worker_id).await,
        Err(QueueError::LeaseLost(_))
    ));
    let stored = ctx.task_repo.find_by_id(delivery.id).await.unwrap().unwrap();
    assert_eq!(stored.status, TaskStatus::Completed);
}
