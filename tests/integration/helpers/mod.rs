// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use axum::Extension;
use axum_test::TestServer;
use sea_orm::DatabaseConnection;
use serpscout::application::dispatcher::{DispatchConfig, ScrapeDispatcher};
use serpscout::application::usecases::upload_keywords::UploadKeywordsUseCase;
use serpscout::config::settings::DatabaseSettings;
use serpscout::domain::repositories::keyword_repository::KeywordRepository;
use serpscout::infrastructure::database::connection;
use serpscout::infrastructure::repositories::keyword_repo_impl::KeywordRepositoryImpl;
use serpscout::infrastructure::repositories::task_repo_impl::TaskRepositoryImpl;
use serpscout::presentation::routes;
use serpscout::queue::task_queue::{PostgresTaskQueue, TaskQueue};
use std::sync::Arc;
use std::time::Duration;

/// 创建已迁移的内存数据库
///
/// 内存SQLite每个连接都是独立的数据库，因此连接池固定为一个连接
pub async fn setup_db() -> Arc<DatabaseConnection> {
    let settings = DatabaseSettings {
        url: "sqlite::memory:".to_string(),
        max_connections: Some(1),
        min_connections: Some(1),
        connect_timeout: Some(5),
        idle_timeout: None,
        run_migrations: true,
    };

    let db = connection::create_pool(&settings)
        .await
        .expect("Failed to open in-memory database");
    connection::run_migrations(&db)
        .await
        .expect("Failed to run migrations");

    Arc::new(db)
}

/// 直接连在数据库上的组件
pub struct TestContext {
    pub db: Arc<DatabaseConnection>,
    pub keyword_repo: Arc<KeywordRepositoryImpl>,
    pub task_repo: Arc<TaskRepositoryImpl>,
    pub queue: Arc<dyn TaskQueue>,
    pub upload: Arc<UploadKeywordsUseCase>,
}

/// 以给定的租约和分发延迟构建测试组件
pub async fn create_context(lease: Duration, dispatch_delay: Duration) -> TestContext {
    let db = setup_db().await;
    let keyword_repo = Arc::new(KeywordRepositoryImpl::new(db.clone()));
    let task_repo = Arc::new(TaskRepositoryImpl::new(db.clone()));
    let queue: Arc<dyn TaskQueue> = Arc::new(PostgresTaskQueue::new(task_repo.clone(), lease));

    let dispatcher = Arc::new(ScrapeDispatcher::new(
        queue.clone(),
        DispatchConfig {
            delay: dispatch_delay,
            ..DispatchConfig::default()
        },
    ));
    let keywords: Arc<dyn KeywordRepository> = keyword_repo.clone();
    let upload = Arc::new(UploadKeywordsUseCase::new(keywords, dispatcher));

    TestContext {
        db,
        keyword_repo,
        task_repo,
        queue,
        upload,
    }
}

#[allow(dead_code)]
pub struct TestApp {
    pub server: TestServer,
    pub context: TestContext,
}

/// 创建带HTTP服务的测试应用，不启动工作者
pub async fn create_test_app() -> TestApp {
    let context = create_context(Duration::from_secs(60), Duration::from_secs(1)).await;
    let keywords: Arc<dyn KeywordRepository> = context.keyword_repo.clone();

    let app = routes::routes()
        .layer(Extension(context.upload.clone()))
        .layer(Extension(keywords));

    let server = TestServer::new(app).expect("Failed to start test server");
    TestApp { server, context }
}
