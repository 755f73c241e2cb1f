// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::presentation::handlers::keyword_handler;
use axum::{
    routing::{get, post},
    Router,
};

/// 创建应用路由
///
/// 处理器依赖通过 `Extension` 层注入：
/// `Arc<UploadKeywordsUseCase>` 和 `Arc<dyn KeywordRepository>`
///
/// # 返回值
///
/// 返回配置好的路由
pub fn routes() -> Router {
    let public_routes = Router::new()
        .route("/health", get(health_check))
        .route("/v1/version", get(version));

    let keyword_routes = Router::new()
        .route(
            "/v1/keywords",
            post(keyword_handler::upload_keywords).get(keyword_handler::list_keywords),
        )
        .route("/v1/keywords/{id}", get(keyword_handler::get_keyword));

    Router::new().merge(public_routes).merge(keyword_routes)
}

/// 健康检查端点
///
/// # 返回值
///
/// 返回"OK"字符串
pub async fn health_check() -> &'static str {
    "OK"
}

/// 版本信息端点
///
/// # 返回值
///
/// 返回应用版本号
pub async fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
