// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use dashmap::DashMap;
use governor::{clock::DefaultClock, state::InMemoryState, state::NotKeyed, Quota, RateLimiter};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard};

type DirectLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

struct DomainSlot {
    in_flight: Arc<Mutex<()>>,
    limiter: Option<DirectLimiter>,
}

/// 按域名限流器
///
/// 同一域名同一时刻最多一个请求，且相邻两次请求间隔不小于配置的延迟。
/// 限流状态仅在进程内有效。
pub struct DomainRateLimiter {
    delay: Duration,
    slots: DashMap<String, Arc<DomainSlot>>,
}

/// 域名许可，释放后同域名的下一个请求才能开始
pub struct DomainPermit {
    _guard: OwnedMutexGuard<()>,
}

impl DomainRateLimiter {
    /// 创建限流器，`delay` 为零时只限制并发
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            slots: DashMap::new(),
        }
    }

    /// 等待获取指定域名的请求许可
    pub async fn acquire(&self, domain: &str) -> DomainPermit {
        let slot = self
            .slots
            .entry(domain.to_ascii_lowercase())
            .or_insert_with(|| {
                Arc::new(DomainSlot {
                    in_flight: Arc::new(Mutex::new(())),
                    limiter: Quota::with_period(self.delay).map(RateLimiter::direct),
                })
            })
            .value()
            .clone();

        let guard = slot.in_flight.clone().lock_owned().await;
        if let Some(limiter) = &slot.limiter {
            limiter.until_ready().await;
        }

        DomainPermit { _guard: guard }
    }
}
