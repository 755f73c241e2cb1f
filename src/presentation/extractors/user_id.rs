// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use uuid::Uuid;

/// 上游网关写入的已认证用户ID请求头
pub const USER_ID_HEADER: &str = "X-User-Id";

/// 当前请求的用户
#[derive(Debug, Clone, Copy)]
pub struct UserId(pub Uuid);

impl<S> FromRequestParts<S> for UserId
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| Uuid::parse_str(value.trim()).ok())
            .map(UserId)
            .ok_or_else(|| {
                let body = Json(json!({ "error": "unauthorized" }));
                (StatusCode::UNAUTHORIZED, body).into_response()
            })
    }
}
