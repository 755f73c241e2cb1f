// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use axum::Extension;
use serpscout::application::dispatcher::{DispatchConfig, ScrapeDispatcher};
use serpscout::application::usecases::upload_keywords::UploadKeywordsUseCase;
use serpscout::config::settings::Settings;
use serpscout::domain::repositories::keyword_repository::KeywordRepository;
use serpscout::engines::search_scraper::{ScraperConfig, SearchScraper};
use serpscout::infrastructure::database::connection;
use serpscout::infrastructure::metrics;
use serpscout::infrastructure::repositories::keyword_repo_impl::KeywordRepositoryImpl;
use serpscout::infrastructure::repositories::task_repo_impl::TaskRepositoryImpl;
use serpscout::presentation::routes;
use serpscout::queue::scheduler::TaskScheduler;
use serpscout::queue::task_encoder::TYPE_SCRAPE_KEYWORD;
use serpscout::queue::task_queue::{PostgresTaskQueue, TaskQueue};
use serpscout::utils::telemetry;
use serpscout::workers::pool::PoolConfig;
use serpscout::workers::scrape_handler::ScrapeKeywordHandler;
use serpscout::workers::WorkerPool;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

/// 主函数
///
/// 应用程序入口点，负责初始化所有组件并启动服务
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Initialize logging
    telemetry::init_telemetry();
    info!("Starting serpscout...");

    // 2. Load configuration
    let settings = Arc::new(Settings::new()?);
    info!("Configuration loaded");

    metrics::init_metrics(&settings.metrics);

    // 3. Connect to database
    let db = Arc::new(connection::create_pool(&settings.database).await?);
    info!("Database connection established");

    if settings.database.run_migrations {
        info!("Running database migrations...");
        connection::run_migrations(db.as_ref()).await?;
        info!("Database migrations applied");
    }

    // 4. Initialize components
    let keyword_repo = Arc::new(KeywordRepositoryImpl::new(db.clone()));
    let task_repo = Arc::new(TaskRepositoryImpl::new(db.clone()));
    let lease = settings.task_lease();
    info!(lease_secs = lease.as_secs(), "Task lease configured");
    let queue: Arc<dyn TaskQueue> = Arc::new(PostgresTaskQueue::new(task_repo.clone(), lease));

    let dispatcher = Arc::new(ScrapeDispatcher::new(
        queue.clone(),
        DispatchConfig::from_settings(&settings.dispatch, &settings.worker),
    ));
    let keywords: Arc<dyn KeywordRepository> = keyword_repo.clone();
    let upload_use_case = Arc::new(UploadKeywordsUseCase::new(keywords.clone(), dispatcher));

    // 5. Start workers
    let pool_config = PoolConfig::from(&settings.worker);
    let mut pool = WorkerPool::new(queue.clone(), pool_config.poll_interval);
    let maintenance = CancellationToken::new();
    let mut scheduler_handle = None;

    if settings.worker.enabled {
        let scraper = Arc::new(SearchScraper::new(ScraperConfig::from(&settings.scraper))?);
        info!(engine = scraper.profile().name, "Scraper initialized");

        pool.register(
            TYPE_SCRAPE_KEYWORD,
            Arc::new(ScrapeKeywordHandler::new(keyword_repo.clone(), scraper)),
        );
        pool.start(pool_config.concurrency, pool_config.queues.clone());

        let scheduler = TaskScheduler::new(
            task_repo.clone(),
            Duration::from_secs(settings.worker.maintenance_interval_secs),
        );
        scheduler_handle = Some(scheduler.start(maintenance.clone()));
    } else {
        info!("Workers disabled, serving API only");
    }

    // 6. Start HTTP server
    let app = routes::routes()
        .layer(Extension(upload_use_case))
        .layer(Extension(keywords))
        .layer(TraceLayer::new_for_http());

    let addr = format!("{}:{}", settings.server.host, settings.server.port);
    let listener = TcpListener::bind(&addr).await?;
    info!("Server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // 7. Drain workers
    let aborted = pool.stop(pool_config.shutdown_timeout).await;
    if aborted > 0 {
        warn!("{} in-flight tasks were aborted and will be redelivered", aborted);
    }

    maintenance.cancel();
    if let Some(handle) = scheduler_handle {
        let _ = handle.await;
    }

    info!("serpscout stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        // Without a signal handler there is nothing to wait for
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
