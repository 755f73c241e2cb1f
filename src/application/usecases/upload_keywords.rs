// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::application::dispatcher::ScrapeDispatcher;
use crate::domain::models::keyword::{
    Keyword, NewKeyword, MAX_KEYWORDS_PER_UPLOAD, SEARCH_ENGINE_BING,
};
use crate::domain::repositories::keyword_repository::{KeywordRepository, RepositoryError};
use std::sync::Arc;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

/// 上传错误类型
#[derive(Error, Debug)]
pub enum UploadError {
    /// 文件不是合法的CSV
    #[error("invalid file: {0}")]
    InvalidFile(String),
    /// 没有任何非空关键词
    #[error("invalid file: no keywords found")]
    Empty,
    /// 关键词数量超出上限
    #[error("invalid file: more than {max} keywords")]
    TooManyKeywords { max: usize },
    /// 仓库错误
    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),
}

/// 上传结果
#[derive(Debug, Clone)]
pub struct UploadOutcome {
    /// 新创建的关键词记录
    pub keywords: Vec<Keyword>,
    /// 成功入队的抓取任务数量
    pub enqueued: usize,
}

/// 关键词上传用例
///
/// 解析CSV、批量创建 `pending` 关键词并为每条记录分发抓取任务
pub struct UploadKeywordsUseCase {
    repository: Arc<dyn KeywordRepository>,
    dispatcher: Arc<ScrapeDispatcher>,
}

impl UploadKeywordsUseCase {
    pub fn new(repository: Arc<dyn KeywordRepository>, dispatcher: Arc<ScrapeDispatcher>) -> Self {
        Self {
            repository,
            dispatcher,
        }
    }

    /// 执行上传
    ///
    /// 校验全部通过后才会创建记录；入队失败不会回滚已创建的记录
    pub async fn execute(&self, user_id: Uuid, csv: &str) -> Result<UploadOutcome, UploadError> {
        let keywords = parse_keywords(csv)?;

        let rows = keywords
            .into_iter()
            .map(|keyword| NewKeyword::new(user_id, keyword, SEARCH_ENGINE_BING))
            .collect();
        let created = self.repository.create_batch(rows).await?;

        let ids: Vec<i64> = created.iter().map(|k| k.id).collect();
        let enqueued = self.dispatcher.submit_batch(&ids).await;

        metrics::counter!("keywords_uploaded_total").increment(created.len() as u64);
        info!(
            user_id = %user_id,
            created = created.len(),
            enqueued,
            "Keywords uploaded"
        );

        Ok(UploadOutcome {
            keywords: created,
            enqueued,
        })
    }
}

/// 从CSV中提取关键词
///
/// 取每条记录的第一列，去除首尾空白并丢弃空值。非空关键词超过
/// [`MAX_KEYWORDS_PER_UPLOAD`] 时立即拒绝。所有记录的字段数必须一致。
pub fn parse_keywords(input: &str) -> Result<Vec<String>, UploadError> {
    let input = input.strip_prefix('\u{feff}').unwrap_or(input);
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .from_reader(input.as_bytes());
    let mut keywords = Vec::new();

    for record in reader.records() {
        let record = record.map_err(|e| UploadError::InvalidFile(e.to_string()))?;
        if let Some(first) = record.get(0) {
            let keyword = first.trim();
            if !keyword.is_empty() {
                keywords.push(keyword.to_string());
            }
        }

        if keywords.len() > MAX_KEYWORDS_PER_UPLOAD {
            return Err(UploadError::TooManyKeywords {
                max: MAX_KEYWORDS_PER_UPLOAD,
            });
        }
    }

    if keywords.is_empty() {
        return Err(UploadError::Empty);
    }

    Ok(keywords)
}
