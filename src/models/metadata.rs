use serde::{Deserialize, Serialize};

/// 论文元信息（由 LLM 从封面与摘要中提取）
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThesisMetadata {
    pub title: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub major: String,
    #[serde(default)]
    pub supervisor: String,
    #[serde(default)]
    pub keywords_native: Vec<String>,
    #[serde(default)]
    pub keywords_translated: Vec<String>,
}
