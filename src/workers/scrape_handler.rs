// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::keyword::KeywordStatus;
use crate::domain::repositories::keyword_repository::{KeywordRepository, RepositoryError};
use crate::engines::traits::KeywordScraper;
use crate::queue::task_encoder::decode_scrape_keyword;
use crate::queue::task_queue::Delivery;
use crate::workers::worker::{HandlerError, TaskHandler};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

/// 关键词抓取处理器
///
/// 驱动单个关键词作业的状态机：
/// 标记处理中 → 读取关键词 → 抓取 → 写入结果或错误。
/// 每次调用最多抓取一次，重试由队列负责。
pub struct ScrapeKeywordHandler<K, S>
where
    K: KeywordRepository,
    S: KeywordScraper,
{
    keywords: Arc<K>,
    scraper: Arc<S>,
}

impl<K, S> ScrapeKeywordHandler<K, S>
where
    K: KeywordRepository,
    S: KeywordScraper,
{
    pub fn new(keywords: Arc<K>, scraper: Arc<S>) -> Self {
        Self { keywords, scraper }
    }

    /// 处理一个关键词作业
    #[instrument(skip(self))]
    pub async fn process(&self, keyword_id: i64) -> Result<(), HandlerError> {
        match self.keywords.mark_processing(keyword_id).await {
            Ok(()) => {}
            Err(RepositoryError::InvalidTransition {
                from: KeywordStatus::Completed,
                ..
            }) => {
                info!("Keyword already completed, skipping redelivered task");
                return Ok(());
            }
            // A deleted keyword surfaces here as NotFound, before the load below
            Err(e) => return Err(e.into()),
        }

        let keyword = self
            .keywords
            .find_by_id(keyword_id)
            .await?
            .ok_or(RepositoryError::NotFound)?;

        let result = match self.scraper.scrape(&keyword.keyword).await {
            Ok(result) => result,
            Err(scrape_error) => {
                if let Err(e) = self
                    .keywords
                    .mark_failed(keyword_id, scrape_error.to_string())
                    .await
                {
                    error!("Failed to record scrape failure: {}", e);
                }
                metrics::counter!("keyword_jobs_failed_total").increment(1);
                warn!(keyword = %keyword.keyword, "Scrape failed: {}", scrape_error);
                return Err(scrape_error.into());
            }
        };

        let html_content = html_escape::encode_quoted_attribute(&result.html_content).into_owned();
        self.keywords
            .mark_completed(
                keyword_id,
                i64::from(result.ad_count),
                i64::from(result.link_count),
                html_content,
            )
            .await?;

        metrics::counter!("keyword_jobs_completed_total").increment(1);
        info!(
            keyword = %keyword.keyword,
            ad_count = result.ad_count,
            link_count = result.link_count,
            "Keyword scraped"
        );

        Ok(())
    }
}

#[async_trait]
impl<K, S> TaskHandler for ScrapeKeywordHandler<K, S>
where
    K: KeywordRepository + 'static,
    S: KeywordScraper + 'static,
{
    async fn handle(&self, delivery: &Delivery) -> Result<(), HandlerError> {
        let payload = decode_scrape_keyword(&delivery.task)?;
        self.process(payload.keyword_id).await
    }
}

#[cfg(test)]
#[path = "scrape_handler_test.rs"]
mod tests;
