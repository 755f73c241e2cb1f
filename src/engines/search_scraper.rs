// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::config::settings::ScraperSettings;
use crate::engines::page_inspector::{HtmlPageInspector, PageInspector};
use crate::engines::rate_limiter::DomainRateLimiter;
use crate::engines::search_engine::{find_profile, SearchEngineProfile};
use crate::engines::traits::{KeywordScraper, ScrapeError, ScrapingResult};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};
use url::Url;

/// 超出内容上限时追加的标记
pub const TRUNCATION_MARKER: &str = "... [truncated]";

/// 页面内容默认上限（1 MiB）
pub const DEFAULT_MAX_CONTENT_BYTES: usize = 1024 * 1024;

/// 响应体默认读取上限（10 MiB）
pub const DEFAULT_MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

/// 默认浏览器标识
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// 抓取器配置
#[derive(Debug, Clone)]
pub struct ScraperConfig {
    /// 搜索引擎名称
    pub engine: String,
    /// 请求使用的浏览器标识
    pub user_agent: String,
    /// 单次请求超时
    pub request_timeout: Duration,
    /// 保存的页面内容上限（字节）
    pub max_content_bytes: usize,
    /// 响应体读取上限（字节）
    pub max_body_bytes: usize,
    /// 同域名请求最小间隔
    pub rate_limit_delay: Duration,
    /// 覆盖搜索引擎的站点根地址
    pub base_url: Option<String>,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            engine: "bing".to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            request_timeout: Duration::from_secs(30),
            max_content_bytes: DEFAULT_MAX_CONTENT_BYTES,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            rate_limit_delay: Duration::from_secs(1),
            base_url: None,
        }
    }
}

impl From<&ScraperSettings> for ScraperConfig {
    fn from(settings: &ScraperSettings) -> Self {
        Self {
            engine: settings.engine.clone(),
            user_agent: settings.user_agent.clone(),
            request_timeout: Duration::from_secs(settings.request_timeout_secs),
            max_content_bytes: settings.max_content_bytes,
            max_body_bytes: settings.max_body_bytes,
            rate_limit_delay: Duration::from_millis(settings.rate_limit_delay_ms),
            base_url: settings.base_url.clone().filter(|url| !url.trim().is_empty()),
        }
    }
}

/// 搜索结果页抓取器
///
/// 每次抓取只发起一个请求：构造搜索URL，经过域名限流后获取页面，
/// 解析一次并统计广告和链接，最后按上限截断页面内容。
pub struct SearchScraper {
    client: reqwest::Client,
    profile: &'static SearchEngineProfile,
    base_url: Option<String>,
    inspector: Arc<dyn PageInspector>,
    limiter: DomainRateLimiter,
    request_timeout: Duration,
    max_content_bytes: usize,
    max_body_bytes: usize,
}

impl SearchScraper {
    /// 使用默认的页面检查器创建抓取器
    pub fn new(config: ScraperConfig) -> Result<Self, ScrapeError> {
        Self::with_inspector(config, Arc::new(HtmlPageInspector))
    }

    /// 使用指定的页面检查器创建抓取器
    pub fn with_inspector(
        config: ScraperConfig,
        inspector: Arc<dyn PageInspector>,
    ) -> Result<Self, ScrapeError> {
        let profile =
            find_profile(&config.engine).ok_or_else(|| ScrapeError::UnknownEngine(config.engine.clone()))?;

        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.as_str())
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            client,
            profile,
            base_url: config.base_url,
            inspector,
            limiter: DomainRateLimiter::new(config.rate_limit_delay),
            request_timeout: config.request_timeout,
            max_content_bytes: config.max_content_bytes,
            max_body_bytes: config.max_body_bytes,
        })
    }

    /// 当前使用的搜索引擎
    pub fn profile(&self) -> &'static SearchEngineProfile {
        self.profile
    }

    async fn fetch(&self, url: &Url) -> Result<String, ScrapeError> {
        let domain = url.host_str().unwrap_or_default().to_string();
        let _permit = self.limiter.acquire(&domain).await;

        let mut response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ScrapeError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let limit = self.max_body_bytes;
        if response.content_length().is_some_and(|len| len > limit as u64) {
            return Err(ScrapeError::BodyTooLarge { limit });
        }

        // Content-Length may be absent or wrong, so the cap is enforced while reading
        let mut body = Vec::new();
        while let Some(chunk) = response.chunk().await.map_err(|e| self.classify(e))? {
            if body.len() + chunk.len() > limit {
                return Err(ScrapeError::BodyTooLarge { limit });
            }
            body.extend_from_slice(&chunk);
        }

        Ok(String::from_utf8_lossy(&body).into_owned())
    }

    fn classify(&self, error: reqwest::Error) -> ScrapeError {
        if error.is_timeout() {
            ScrapeError::Timeout(self.request_timeout)
        } else {
            ScrapeError::Request(error)
        }
    }
}

#[async_trait]
impl KeywordScraper for SearchScraper {
    async fn scrape(&self, keyword: &str) -> Result<ScrapingResult, ScrapeError> {
        let url = self.profile.search_url(self.base_url.as_deref(), keyword)?;
        let started = Instant::now();

        let body = match self.fetch(&url).await {
            Ok(body) => body,
            Err(e) => {
                warn!(engine = self.profile.name, url = %url, "Scrape request failed: {}", e);
                metrics::counter!("scrape_requests_total", "outcome" => "error").increment(1);
                return Err(e);
            }
        };
        metrics::histogram!("scrape_duration_seconds").record(started.elapsed().as_secs_f64());

        let signals = self
            .inspector
            .inspect(&body, &self.profile.ad_spec(), &self.profile.link_spec())?;
        metrics::counter!("scrape_requests_total", "outcome" => "success").increment(1);

        debug!(
            engine = self.profile.name,
            ad_count = signals.ad_count,
            link_count = signals.link_count,
            bytes = body.len(),
            "Scraped search results"
        );

        Ok(ScrapingResult {
            ad_count: signals.ad_count,
            link_count: signals.link_count,
            html_content: cap_content(body, self.max_content_bytes),
        })
    }
}

/// 按字节上限截断内容
///
/// 截断点落在字符边界上，截断后追加 [`TRUNCATION_MARKER`]
pub fn cap_content(mut body: String, max_bytes: usize) -> String {
    if body.len() <= max_bytes {
        return body;
    }

    let mut cut = max_bytes;
    while !body.is_char_boundary(cut) {
        cut -= 1;
    }
    body.truncate(cut);
    body.push_str(TRUNCATION_MARKER);
    body
}

#[cfg(test)]
#[path = "search_scraper_test.rs"]
mod tests;
