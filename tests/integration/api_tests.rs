// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use super::helpers::create_test_app;
use axum::http::StatusCode;
use chrono::Utc;
use sea_orm::EntityTrait;
use serde_json::Value;
use serpscout::domain::repositories::keyword_repository::KeywordRepository;
use serpscout::infrastructure::database::entities::task as task_entity;
use uuid::Uuid;

/// 测试上传关键词
///
/// 验证上传成功返回202，创建pending记录并为每个关键词入队一个延迟任务
#[tokio::test]
async fn test_upload_keywords_accepted() {
    let app = create_test_app().await;
    let user_id = Uuid::new_v4();
    let before = Utc::now();

    let response = app
        .server
        .post("/v1/keywords")
        .add_header("X-User-Id", user_id.to_string())
        .text("running shoes\n\"trail, shoes\"\n\n")
        .await;

    assert_eq!(response.status_code(), StatusCode::ACCEPTED);
    let body: Value = response.json();
    assert_eq!(body["enqueued"], 2);
    let ids = body["ids"].as_array().unwrap();
    assert_eq!(ids.len(), 2);

    let stored = app
        .context
        .keyword_repo
        .list_by_user(user_id)
        .await
        .unwrap();
    let mut names: Vec<_> = stored.iter().map(|k| k.keyword.clone()).collect();
    names.sort();
    assert_eq!(names, vec!["running shoes", "trail, shoes"]);

    let tasks = task_entity::Entity::find()
        .all(app.context.db.as_ref())
        .await
        .unwrap();
    assert_eq!(tasks.len(), 2);
    for task in tasks {
        assert_eq!(task.task_type, "scrape:keyword");
        assert_eq!(task.status, "queued");
        let scheduled = task.scheduled_at.unwrap().with_timezone(&Utc);
        assert!(scheduled >= before + chrono::Duration::seconds(1));
    }
}

#[tokio::test]
async fn test_upload_requires_user() {
    let app = create_test_app().await;

    let response = app.server.post("/v1/keywords").text("rust").await;
    assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);
    let body: Value = response.json();
    assert_eq!(body["error"], "unauthorized");

    let response = app
        .server
        .post("/v1/keywords")
        .add_header("X-User-Id", "not-a-uuid")
        .text("rust")
        .await;
    assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_upload_rejects_invalid_files() {
    let app = create_test_app().await;
    let user_id = Uuid::new_v4().to_string();

    for body in ["", "\n , \n", "a,b\nc", "x\ny,z\n"] {
        let response = app
            .server
            .post("/v1/keywords")
            .add_header("X-User-Id", user_id.clone())
            .text(body)
            .await;
        assert_eq!(response.status_code(), StatusCode::BAD_REQUEST, "body {:?}", body);
        let json: Value = response.json();
        assert!(json["error"].is_string());
    }

    let too_many: String = (0..101).map(|i| format!("keyword {}\n", i)).collect();
    let response = app
        .server
        .post("/v1/keywords")
        .add_header("X-User-Id", user_id.clone())
        .text(too_many)
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);

    let tasks = task_entity::Entity::find()
        .all(app.context.db.as_ref())
        .await
        .unwrap();
    assert!(tasks.is_empty());
}

#[tokio::test]
async fn test_list_keywords_is_scoped_and_newest_first() {
    let app = create_test_app().await;
    let user_id = Uuid::new_v4();

    for csv in ["older", "newer"] {
        app.server
            .post("/v1/keywords")
            .add_header("X-User-Id", user_id.to_string())
            .text(csv)
            .await;
    }
    app.server
        .post("/v1/keywords")
        .add_header("X-User-Id", Uuid::new_v4().to_string())
        .text("someone else")
        .await;

    let response = app
        .server
        .get("/v1/keywords")
        .add_header("X-User-Id", user_id.to_string())
        .await;

    assert_eq!(response.status_code(), StatusCode::OK);
    let body: Value = response.json();
    let list = body.as_array().unwrap();
    assert_eq!(list.len(), 2);
    assert_eq!(list[0]["keyword"], "newer");
    assert_eq!(list[1]["keyword"], "older");
    assert_eq!(list[0]["status"], "pending");
    assert!(list[0]["adCount"].is_null());
}

#[tokio::test]
async fn test_get_keyword() {
    let app = create_test_app().await;
    let user_id = Uuid::new_v4();

    let response = app
        .server
        .post("/v1/keywords")
        .add_header("X-User-Id", user_id.to_string())
        .text("rust")
        .await;
    let body: Value = response.json();
    let id = body["ids"][0].as_i64().unwrap();

    app.context.keyword_repo.mark_processing(id).await.unwrap();
    app.context
        .keyword_repo
        .mark_completed(id, 2, 10, "&lt;html&gt;".to_string())
        .await
        .unwrap();

    let response = app
        .server
        .get(&format!("/v1/keywords/{}", id))
        .add_header("X-User-Id", user_id.to_string())
        .await;

    assert_eq!(response.status_code(), StatusCode::OK);
    let keyword: Value = response.json();
    assert_eq!(keyword["id"], id);
    assert_eq!(keyword["keyword"], "rust");
    assert_eq!(keyword["status"], "completed");
    assert_eq!(keyword["adCount"], 2);
    assert_eq!(keyword["linkCount"], 10);
    assert_eq!(keyword["htmlContent"], "&lt;html&gt;");
    assert!(keyword["errorMessage"].is_null());

    // Other users cannot see it
    let response = app
        .server
        .get(&format!("/v1/keywords/{}", id))
        .add_header("X-User-Id", Uuid::new_v4().to_string())
        .await;
    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_get_keyword_rejects_invalid_ids() {
    let app = create_test_app().await;
    let user_id = Uuid::new_v4().to_string();

    for id in ["abc", "0", "-4", "1.5"] {
        let response = app
            .server
            .get(&format!("/v1/keywords/{}", id))
            .add_header("X-User-Id", user_id.clone())
            .await;
        assert_eq!(response.status_code(), StatusCode::BAD_REQUEST, "id {}", id);
        let body: Value = response.json();
        assert_eq!(body["error"], "invalid id");
    }

    let response = app
        .server
        .get("/v1/keywords/9999")
        .add_header("X-User-Id", user_id)
        .await;
    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_health_and_version() {
    let app = create_test_app().await;

    let response = app.server.get("/health").await;
    assert_eq!(response.status_code(), StatusCode::OK);
    assert_eq!(response.text(), "OK");

    let response = app.server.get("/v1/version").await;
    assert_eq!(response.text(), env!("CARGO_PKG_VERSION"));
}
