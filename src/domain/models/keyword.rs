// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

/// 当前唯一支持的搜索引擎标识
pub const SEARCH_ENGINE_BING: &str = "bing";

/// 单次上传允许的最大关键词数量
pub const MAX_KEYWORDS_PER_UPLOAD: usize = 100;

/// 关键词实体
///
/// 表示一个关键词抓取作业及其持久化记录。关键词文本与搜索引擎
/// 在创建后不可变，状态与结果字段由抓取处理器原地更新。
///
/// 结果字段（`ad_count`、`link_count`、`html_content`）仅在
/// `Completed` 状态下存在，`error_message` 仅在 `Failed` 状态下存在。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Keyword {
    /// 由存储分配的数字ID
    pub id: i64,
    /// 所属用户ID
    pub user_id: Uuid,
    /// 关键词文本（已去除首尾空白，非空）
    pub keyword: String,
    /// 目标搜索引擎标识
    pub search_engine: String,
    /// 作业状态
    pub status: KeywordStatus,
    /// 广告数量
    pub ad_count: Option<i64>,
    /// 链接数量
    pub link_count: Option<i64>,
    /// 经过转义的页面内容
    pub html_content: Option<String>,
    /// 失败原因
    pub error_message: Option<String>,
    /// 创建时间
    pub created_at: DateTime<FixedOffset>,
    /// 更新时间
    pub updated_at: DateTime<FixedOffset>,
}

/// 待创建的关键词记录
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewKeyword {
    pub user_id: Uuid,
    pub keyword: String,
    pub search_engine: String,
}

impl NewKeyword {
    pub fn new(user_id: Uuid, keyword: impl Into<String>, search_engine: impl Into<String>) -> Self {
        Self {
            user_id,
            keyword: keyword.into(),
            search_engine: search_engine.into(),
        }
    }
}

/// 关键词作业状态
///
/// 状态转换遵循以下流程：
/// Pending → Processing → Completed/Failed
///
/// 重新投递的任务可以让 Processing 或 Failed 的作业再次进入 Processing，
/// Completed 的作业只允许被新的完整结果覆盖，任何状态都不会回到 Pending。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum KeywordStatus {
    /// 已创建，等待抓取
    #[default]
    Pending,
    /// 正在抓取
    Processing,
    /// 抓取成功
    Completed,
    /// 抓取失败
    Failed,
}

impl fmt::Display for KeywordStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            KeywordStatus::Pending => write!(f, "pending"),
            KeywordStatus::Processing => write!(f, "processing"),
            KeywordStatus::Completed => write!(f, "completed"),
            KeywordStatus::Failed => write!(f, "failed"),
        }
    }
}

impl FromStr for KeywordStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(KeywordStatus::Pending),
            "processing" => Ok(KeywordStatus::Processing),
            "completed" => Ok(KeywordStatus::Completed),
            "failed" => Ok(KeywordStatus::Failed),
            _ => Err(()),
        }
    }
}

impl KeywordStatus {
    /// 是否为终止状态
    pub fn is_terminal(&self) -> bool {
        matches!(self, KeywordStatus::Completed | KeywordStatus::Failed)
    }

    /// 判断是否允许从当前状态转换到目标状态
    pub fn can_transition_to(&self, next: KeywordStatus) -> bool {
        Self::allowed_sources(next).contains(self)
    }

    /// 允许转换到目标状态的来源状态集合
    ///
    /// 存储层据此构造条件更新，保证状态不会倒退。
    pub fn allowed_sources(target: KeywordStatus) -> &'static [KeywordStatus] {
        match target {
            KeywordStatus::Pending => &[],
            KeywordStatus::Processing => &[
                KeywordStatus::Pending,
                KeywordStatus::Processing,
                KeywordStatus::Failed,
            ],
            KeywordStatus::Completed => &[
                KeywordStatus::Processing,
                KeywordStatus::Completed,
                KeywordStatus::Failed,
            ],
            KeywordStatus::Failed => &[KeywordStatus::Processing, KeywordStatus::Failed],
        }
    }
}

/// 关键词更新命令
///
/// 每个命令对应一次原子写入：状态与其附带字段一起写入，
/// 同时清空另一终止状态的字段。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeywordUpdate {
    /// 标记为处理中
    MarkProcessing,
    /// 标记为完成并写入结果
    MarkCompleted {
        ad_count: i64,
        link_count: i64,
        html_content: String,
    },
    /// 标记为失败并写入错误信息
    MarkFailed { message: String },
}

impl KeywordUpdate {
    /// 命令对应的目标状态
    pub fn target_status(&self) -> KeywordStatus {
        match self {
            KeywordUpdate::MarkProcessing => KeywordStatus::Processing,
            KeywordUpdate::MarkCompleted { .. } => KeywordStatus::Completed,
            KeywordUpdate::MarkFailed { .. } => KeywordStatus::Failed,
        }
    }
}

/// 领域错误类型
#[derive(Error, Debug, PartialEq, Eq)]
pub enum DomainError {
    /// 无效的状态转换
    #[error("Invalid state transition from {from} to {to}")]
    InvalidStateTransition {
        from: KeywordStatus,
        to: KeywordStatus,
    },
}

impl Keyword {
    /// 在内存中应用更新命令
    ///
    /// 与存储层的条件更新语义一致，供内存实现和校验使用。
    ///
    /// # 返回值
    ///
    /// * `Ok(())` - 更新成功
    /// * `Err(DomainError)` - 状态转换不被允许
    pub fn apply(&mut self, update: KeywordUpdate) -> Result<(), DomainError> {
        let target = update.target_status();
        if !self.status.can_transition_to(target) {
            return Err(DomainError::InvalidStateTransition {
                from: self.status,
                to: target,
            });
        }

        match update {
            KeywordUpdate::MarkProcessing => {
                self.error_message = None;
            }
            KeywordUpdate::MarkCompleted {
                ad_count,
                link_count,
                html_content,
            } => {
                self.ad_count = Some(ad_count);
                self.link_count = Some(link_count);
                self.html_content = Some(html_content);
                self.error_message = None;
            }
            KeywordUpdate::MarkFailed { message } => {
                self.ad_count = None;
                self.link_count = None;
                self.html_content = None;
                self.error_message = Some(message);
            }
        }

        self.status = target;
        self.updated_at = Utc::now().into();
        Ok(())
    }
}
