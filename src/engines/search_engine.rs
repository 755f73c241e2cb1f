// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::engines::page_inspector::SelectorSpec;
use crate::engines::traits::ScrapeError;
use url::Url;

/// 搜索引擎配置档
///
/// 描述一个搜索引擎的查询地址和页面特征，抓取逻辑本身与引擎无关
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchEngineProfile {
    /// 引擎标识，与关键词记录的 `search_engine` 字段一致
    pub name: &'static str,
    /// 默认站点根地址
    pub base_url: &'static str,
    /// 搜索路径
    pub search_path: &'static str,
    /// 查询参数名
    pub query_param: &'static str,
    /// 广告标记选择器，任意一个命中即计为一个广告元素
    pub ad_selectors: &'static [&'static str],
}

/// Bing
pub const BING: SearchEngineProfile = SearchEngineProfile {
    name: "bing",
    base_url: "https://www.bing.com",
    search_path: "/search",
    query_param: "q",
    ad_selectors: &[".b_ad", ".b_adurl", ".sb_add", "[data-bm]", ".b_adSlug"],
};

/// 已注册的搜索引擎
pub const PROFILES: &[SearchEngineProfile] = &[BING];

/// 按名称查找搜索引擎配置档（忽略大小写）
pub fn find_profile(name: &str) -> Option<&'static SearchEngineProfile> {
    PROFILES.iter().find(|p| p.name.eq_ignore_ascii_case(name))
}

impl SearchEngineProfile {
    /// 构造关键词的搜索URL
    ///
    /// 关键词按表单规则编码（空格编码为 `+`）。
    ///
    /// # 参数
    ///
    /// * `base_override` - 覆盖默认站点根地址，用于测试或镜像
    /// * `keyword` - 关键词
    pub fn search_url(&self, base_override: Option<&str>, keyword: &str) -> Result<Url, ScrapeError> {
        let base = base_override.unwrap_or(self.base_url);
        let mut url = Url::parse(base)
            .and_then(|u| u.join(self.search_path))
            .map_err(|e| ScrapeError::InvalidUrl(format!("{}: {}", base, e)))?;

        url.query_pairs_mut().append_pair(self.query_param, keyword);
        Ok(url)
    }

    /// 广告元素的选择器规格
    pub fn ad_spec(&self) -> SelectorSpec {
        SelectorSpec::any_of(self.ad_selectors)
    }

    /// 链接元素的选择器规格
    pub fn link_spec(&self) -> SelectorSpec {
        SelectorSpec::navigable_links()
    }
}
