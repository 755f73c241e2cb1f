// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// 抓取错误类型
#[derive(Error, Debug)]
pub enum ScrapeError {
    /// 请求失败
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),
    /// 超时
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),
    /// 目标站点返回非成功状态码
    #[error("Unexpected status {status} from {url}")]
    Status { status: u16, url: String },
    /// 无法构造搜索URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
    /// 响应体超出读取上限
    #[error("Response body exceeds {limit} bytes")]
    BodyTooLarge { limit: usize },
    /// 选择器无法解析
    #[error("Invalid selector: {0}")]
    Selector(String),
    /// 未知的搜索引擎
    #[error("Unknown search engine: {0}")]
    UnknownEngine(String),
}

impl ScrapeError {
    /// 判断错误是否可重试
    ///
    /// 网络抖动、超时、限流和服务端错误可重试，配置类错误不可重试
    pub fn is_retryable(&self) -> bool {
        match self {
            ScrapeError::Request(e) => {
                e.is_timeout() || e.is_connect() || e.status().is_some_and(|s| s.is_server_error())
            }
            ScrapeError::Timeout(_) => true,
            ScrapeError::Status { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

/// 单个关键词的抓取结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrapingResult {
    /// 广告数量
    pub ad_count: u32,
    /// 链接数量
    pub link_count: u32,
    /// 原始页面内容（可能已截断）
    pub html_content: String,
}

/// 关键词抓取器特质
///
/// 获取关键词的搜索结果页并统计广告和链接
#[async_trait]
pub trait KeywordScraper: Send + Sync {
    /// 抓取一个关键词
    async fn scrape(&self, keyword: &str) -> Result<ScrapingResult, ScrapeError>;
}

#[async_trait]
impl<T: KeywordScraper + ?Sized> KeywordScraper for std::sync::Arc<T> {
    async fn scrape(&self, keyword: &str) -> Result<ScrapingResult, ScrapeError> {
        (**self).scrape(keyword).await
    }
}
