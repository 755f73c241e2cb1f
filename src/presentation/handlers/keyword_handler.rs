// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use std::sync::Arc;

use crate::application::dto::keyword_response::{KeywordDto, UploadKeywordsResponseDto};
use crate::application::usecases::upload_keywords::UploadKeywordsUseCase;
use crate::domain::repositories::keyword_repository::{KeywordRepository, RepositoryError};
use crate::presentation::errors::{AppError, RequestError};
use crate::presentation::extractors::user_id::UserId;

/// 上传关键词CSV
///
/// 请求体为CSV原文，创建成功后返回 `202` 和新记录ID
pub async fn upload_keywords(
    Extension(use_case): Extension<Arc<UploadKeywordsUseCase>>,
    UserId(user_id): UserId,
    body: String,
) -> Result<impl IntoResponse, AppError> {
    let outcome = use_case.execute(user_id, &body).await?;

    let response = UploadKeywordsResponseDto {
        ids: outcome.keywords.iter().map(|k| k.id).collect(),
        enqueued: outcome.enqueued,
    };
    Ok((StatusCode::ACCEPTED, Json(response)))
}

/// 列出当前用户的关键词，最新的在前
pub async fn list_keywords(
    Extension(repository): Extension<Arc<dyn KeywordRepository>>,
    UserId(user_id): UserId,
) -> Result<Json<Vec<KeywordDto>>, AppError> {
    let keywords = repository.list_by_user(user_id).await?;
    Ok(Json(keywords.into_iter().map(KeywordDto::from).collect()))
}

/// 获取当前用户的单个关键词
pub async fn get_keyword(
    Extension(repository): Extension<Arc<dyn KeywordRepository>>,
    UserId(user_id): UserId,
    Path(id): Path<String>,
) -> Result<Json<KeywordDto>, AppError> {
    let id = id
        .parse::<i64>()
        .ok()
        .filter(|id| *id >= 1)
        .ok_or(RequestError::InvalidId)?;

    let keyword = repository
        .find_by_id_and_user(id, user_id)
        .await?
        .ok_or(RepositoryError::NotFound)?;

    Ok(Json(keyword.into()))
}
