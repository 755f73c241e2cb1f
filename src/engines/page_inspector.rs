// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::engines::traits::ScrapeError;
use scraper::{ElementRef, Html, Selector};

/// 元素过滤规则
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchFilter {
    /// 选择器命中即计数
    Any,
    /// 仅计数 `href` 非空且不以 `#` 开头的元素
    NavigableHref,
}

/// 选择器规格
///
/// 一组CSS选择器按并集匹配，每个元素最多计数一次
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectorSpec {
    pub selectors: Vec<String>,
    pub filter: MatchFilter,
}

impl SelectorSpec {
    pub fn any_of(selectors: &[&str]) -> Self {
        Self {
            selectors: selectors.iter().map(|s| s.to_string()).collect(),
            filter: MatchFilter::Any,
        }
    }

    /// 可导航链接：`a[href]`，排除空链接和页内锚点
    pub fn navigable_links() -> Self {
        Self {
            selectors: vec!["a[href]".to_string()],
            filter: MatchFilter::NavigableHref,
        }
    }

    fn compile(&self) -> Result<Selector, ScrapeError> {
        let group = self.selectors.join(", ");
        Selector::parse(&group).map_err(|e| ScrapeError::Selector(format!("{}: {}", group, e)))
    }
}

/// 页面统计信号
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PageSignals {
    pub ad_count: u32,
    pub link_count: u32,
}

/// 页面检查特质
pub trait PageInspector: Send + Sync {
    /// 解析一次页面并统计广告和链接
    fn inspect(
        &self,
        html: &str,
        ads: &SelectorSpec,
        links: &SelectorSpec,
    ) -> Result<PageSignals, ScrapeError>;
}

/// 基于 `scraper` 的页面检查器
#[derive(Debug, Default, Clone, Copy)]
pub struct HtmlPageInspector;

impl PageInspector for HtmlPageInspector {
    fn inspect(
        &self,
        html: &str,
        ads: &SelectorSpec,
        links: &SelectorSpec,
    ) -> Result<PageSignals, ScrapeError> {
        let document = Html::parse_document(html);

        Ok(PageSignals {
            ad_count: count_matches(&document, ads)?,
            link_count: count_matches(&document, links)?,
        })
    }
}

/// 统计文档中满足选择器规格的元素数量
pub fn count_matches(document: &Html, spec: &SelectorSpec) -> Result<u32, ScrapeError> {
    let selector = spec.compile()?;
    let count = document
        .select(&selector)
        .filter(|element| passes(element, spec.filter))
        .count();

    Ok(u32::try_from(count).unwrap_or(u32::MAX))
}

fn passes(element: &ElementRef<'_>, filter: MatchFilter) -> bool {
    match filter {
        MatchFilter::Any => true,
        MatchFilter::NavigableHref => element
            .value()
            .attr("href")
            .is_some_and(|href| !href.is_empty() && !href.starts_with('#')),
    }
}
