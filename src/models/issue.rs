//! 问题清单相关的数据结构

use serde::{Deserialize, Serialize};

/// 论文中发现的单个问题
///
/// `id` 只在按章节排序之后分配，之前始终为 `None`。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    #[serde(rename = "type", default)]
    pub issue_type: String,
    #[serde(default)]
    pub severity: String,
    pub chapter: String,
    #[serde(default)]
    pub sub_chapter: String,
    #[serde(default)]
    pub original_text: String,
    pub detail: String,
    #[serde(default)]
    pub suggestion: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u32>,
}

/// 本地规则检查发现的问题（不经过 LLM）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LintFinding {
    pub chapter: String,
    pub sub_chapter: String,
    pub original_text: String,
    pub detail: String,
}
