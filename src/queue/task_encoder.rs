// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::task::EncodedTask;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// 关键词抓取任务类型标签
pub const TYPE_SCRAPE_KEYWORD: &str = "scrape:keyword";

/// 关键词抓取任务的入队延迟，同时用作对目标站点的最小请求间隔
pub const SCRAPE_KEYWORD_DELAY: Duration = Duration::from_secs(1);

/// 关键词抓取任务负载
///
/// 只携带关键词ID，其余数据在处理时从存储中重新读取。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrapeKeywordPayload {
    #[serde(rename = "keywordID")]
    pub keyword_id: i64,
}

/// 任务解码错误
#[derive(Error, Debug)]
pub enum TaskDecodeError {
    /// 任务类型标签不匹配
    #[error("Unexpected task type: expected {expected}, found {found}")]
    UnexpectedType {
        expected: &'static str,
        found: String,
    },
    /// 负载无法解析
    #[error("Invalid task payload: {0}")]
    InvalidPayload(#[from] serde_json::Error),
}

/// 编码关键词抓取任务
pub fn encode_scrape_keyword(keyword_id: i64) -> EncodedTask {
    let payload = serde_json::json!({ "keywordID": keyword_id });
    EncodedTask::new(TYPE_SCRAPE_KEYWORD, payload)
}

/// 解码关键词抓取任务
pub fn decode_scrape_keyword(task: &EncodedTask) -> Result<ScrapeKeywordPayload, TaskDecodeError> {
    if task.task_type != TYPE_SCRAPE_KEYWORD {
        return Err(TaskDecodeError::UnexpectedType {
            expected: TYPE_SCRAPE_KEYWORD,
            found: task.task_type.clone(),
        });
    }

    Ok(ScrapeKeywordPayload::deserialize(&task.payload)?)
}
