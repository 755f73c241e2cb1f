// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use super::helpers::{create_context, TestContext};
use sea_orm::EntityTrait;
use serpscout::domain::models::keyword::{Keyword, KeywordStatus};
use serpscout::domain::models::task::TaskStatus;
use serpscout::config::settings::Settings;
use serpscout::domain::repositories::keyword_repository::KeywordRepository;
use serpscout::engines::search_scraper::{ScraperConfig, SearchScraper};
use serpscout::infrastructure::database::entities::task as task_entity;
use serpscout::queue::scheduler::TaskScheduler;
use serpscout::queue::task_encoder::TYPE_SCRAPE_KEYWORD;
use serpscout::workers::scrape_handler::ScrapeKeywordHandler;
use serpscout::workers::WorkerPool;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const SERP: &str = r##"<html><body>
  <li class="b_ad"><a href="https://ads.example.com">Sponsored</a></li>
  <div class="b_adSlug">Ad</div>
  <ol id="b_results">
    <li><a href="https://rust-lang.org">Rust</a></li>
    <li><a href="https://docs.rs">Docs</a></li>
    <li><a href="#">Back to top</a></li>
  </ol>
</body></html>"##;

fn start_pool(ctx: &TestContext, server: &MockServer) -> WorkerPool {
    let config = ScraperConfig {
        base_url: Some(server.uri()),
        rate_limit_delay: Duration::ZERO,
        request_timeout: Duration::from_secs(5),
        ..ScraperConfig::default()
    };
    start_pool_with(ctx, config, 2)
}

fn start_pool_with(ctx: &TestContext, config: ScraperConfig, concurrency: usize) -> WorkerPool {
    let scraper = SearchScraper::new(config).unwrap();

    let mut pool = WorkerPool::new(ctx.queue.clone(), Duration::from_millis(20));
    pool.register(
        TYPE_SCRAPE_KEYWORD,
        Arc::new(ScrapeKeywordHandler::new(
            ctx.keyword_repo.clone(),
            Arc::new(scraper),
        )),
    );
    pool.start(concurrency, vec!["default".to_string()]);
    pool
}

async fn wait_for_terminal(ctx: &TestContext, id: i64) -> Keyword {
    let deadline = Instant::now() + Duration::from_secs(10);
    loop {
        let keyword = ctx.keyword_repo.find_by_id(id).await.unwrap().unwrap();
        if keyword.status.is_terminal() || Instant::now() > deadline {
            return keyword;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
}

#[tokio::test]
async fn test_uploaded_keyword_is_scraped_and_completed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("q", "rust lang"))
        .respond_with(ResponseTemplate::new(200).set_body_string(SERP))
        .expect(1)
        .mount(&server)
        .await;

    let ctx = create_context(Duration::from_secs(60), Duration::ZERO).await;
    let mut pool = start_pool(&ctx, &server);

    let outcome = ctx
        .upload
        .execute(Uuid::new_v4(), "rust lang\n")
        .await
        .unwrap();
    assert_eq!(outcome.enqueued, 1);
    let id = outcome.keywords[0].id;

    let keyword = wait_for_terminal(&ctx, id).await;
    pool.stop(Duration::from_secs(5)).await;

    assert_eq!(keyword.status, KeywordStatus::Completed);
    assert_eq!(keyword.ad_count, Some(2));
    assert_eq!(keyword.link_count, Some(3));
    assert!(keyword.error_message.is_none());

    let html = keyword.html_content.unwrap();
    assert!(html.starts_with("&lt;html&gt;"));
    assert!(!html.contains('<'));
}

#[tokio::test]
async fn test_client_error_fails_keyword_without_retry() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let ctx = create_context(Duration::from_secs(60), Duration::ZERO).await;
    let mut pool = start_pool(&ctx, &server);

    let outcome = ctx
        .upload
        .execute(Uuid::new_v4(), "missing page")
        .await
        .unwrap();
    let id = outcome.keywords[0].id;

    let keyword = wait_for_terminal(&ctx, id).await;

    // Give the executor time to report the outcome to the queue
    let deadline = Instant::now() + Duration::from_secs(5);
    let task = loop {
        let task = task_entity::Entity::find()
            .one(ctx.db.as_ref())
            .await
            .unwrap()
            .expect("upload should have enqueued a task");
        if task.status == TaskStatus::Failed.to_string() || Instant::now() > deadline {
            break task;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    };
    pool.stop(Duration::from_secs(5)).await;

    assert_eq!(keyword.status, KeywordStatus::Failed);
    assert!(keyword.error_message.unwrap().contains("404"));
    assert!(keyword.html_content.is_none());
    assert_eq!(task.status, TaskStatus::Failed.to_string());
    assert_eq!(task.attempt_count, 1);
    assert!(task.last_error.unwrap().contains("404"));
}

#[tokio::test]
async fn test_rate_limited_keywords_are_scraped_once_under_lease_maintenance() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(SERP)
                .set_delay(Duration::from_millis(1500)),
        )
        .mount(&server)
        .await;

    // A one second floor is shorter than the second keyword waits on the domain permit
    let settings: Settings = Settings::builder()
        .unwrap()
        .set_override("worker.concurrency", 2)
        .unwrap()
        .set_override("worker.lease_secs", 1)
        .unwrap()
        .set_override("scraper.request_timeout_secs", 2)
        .unwrap()
        .set_override("scraper.rate_limit_delay_ms", 0)
        .unwrap()
        .set_override("scraper.base_url", server.uri())
        .unwrap()
        .build()
        .unwrap()
        .try_deserialize()
        .unwrap();

    let ctx = create_context(settings.task_lease(), Duration::ZERO).await;
    let maintenance = CancellationToken::new();
    let scheduler = TaskScheduler::new(ctx.task_repo.clone(), Duration::from_millis(100))
        .start(maintenance.clone());
    let mut pool = start_pool_with(
        &ctx,
        ScraperConfig::from(&settings.scraper),
        settings.worker.concurrency,
    );

    let outcome = ctx.upload.execute(Uuid::new_v4(), "a\nb").await.unwrap();
    assert_eq!(outcome.enqueued, 2);

    for keyword in &outcome.keywords {
        let keyword = wait_for_terminal(&ctx, keyword.id).await;
        assert_eq!(keyword.status, KeywordStatus::Completed);
    }
    // Let any duplicate delivery surface before counting
    tokio::time::sleep(Duration::from_millis(500)).await;
    pool.stop(Duration::from_secs(5)).await;
    maintenance.cancel();
    scheduler.await.unwrap();

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 2);

    let tasks = task_entity::Entity::find().all(ctx.db.as_ref()).await.unwrap();
    assert_eq!(tasks.len(), 2);
    for task in tasks {
        assert_eq!(task.status, TaskStatus::Completed.to_string());
        assert_eq!(task.attempt_count, 1);
    }
}
