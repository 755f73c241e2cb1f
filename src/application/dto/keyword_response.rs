// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::keyword::Keyword;
use serde::{Deserialize, Serialize};

/// 关键词数据传输对象
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KeywordDto {
    pub id: i64,
    pub keyword: String,
    pub status: String,
    pub ad_count: Option<i64>,
    pub link_count: Option<i64>,
    pub html_content: Option<String>,
    pub error_message: Option<String>,
}

impl From<Keyword> for KeywordDto {
    fn from(keyword: Keyword) -> Self {
        Self {
            id: keyword.id,
            keyword: keyword.keyword,
            status: keyword.status.to_string(),
            ad_count: keyword.ad_count,
            link_count: keyword.link_count,
            html_content: keyword.html_content,
            error_message: keyword.error_message,
        }
    }
}

/// 上传响应数据传输对象
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadKeywordsResponseDto {
    /// 新创建的关键词ID
    pub ids: Vec<i64>,
    /// 成功入队的任务数量
    pub enqueued: usize,
}
