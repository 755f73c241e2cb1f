// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::config::settings::MetricsSettings;
use metrics::{describe_counter, describe_histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use tracing::{info, warn};

/// 初始化指标系统
///
/// 安装Prometheus导出器并登记应用使用的指标
pub fn init_metrics(settings: &MetricsSettings) {
    if !settings.enabled {
        info!("Metrics exporter disabled");
        return;
    }

    let addr: SocketAddr = match settings.listen_addr.parse() {
        Ok(addr) => addr,
        Err(e) => {
            warn!("Invalid metrics address {}: {}", settings.listen_addr, e);
            return;
        }
    };

    // Ignore error if address is already in use (for development/testing)
    if let Err(e) = PrometheusBuilder::new().with_http_listener(addr).install() {
        warn!("Failed to install Prometheus recorder: {}. This might happen if the port is already in use.", e);
        return;
    }

    describe_counter!("keywords_uploaded_total", "Total number of keywords accepted by upload");
    describe_counter!("tasks_enqueued_total", "Total number of scrape tasks enqueued");
    describe_counter!(
        "keyword_jobs_completed_total",
        "Total number of keyword jobs completed"
    );
    describe_counter!("keyword_jobs_failed_total", "Total number of keyword jobs failed");
    describe_counter!(
        "scrape_requests_total",
        "Search result page requests by outcome"
    );
    describe_counter!(
        "tasks_lease_lost_total",
        "Task outcomes dropped because the worker no longer held the lease"
    );
    describe_histogram!(
        "scrape_duration_seconds",
        "Duration of search result page requests in seconds"
    );

    info!("Metrics exporter listening on {}", addr);
}
