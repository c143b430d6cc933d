//! 维度评估上下文
//!
//! 封装"正在评估哪篇论文的哪个维度"这一信息

use std::fmt::Display;

use crate::models::dimension::DimensionSpec;

/// 维度评估上下文（仅用于日志）
#[derive(Debug, Clone)]
pub struct AssessmentCtx {
    /// 文档 ID
    pub document_id: String,

    /// 维度标识
    pub dimension_key: String,

    /// 维度显示名称
    pub dimension_name: String,
}

impl AssessmentCtx {
    pub fn new(document_id: &str, spec: &DimensionSpec) -> Self {
        Self {
            document_id: document_id.to_string(),
            dimension_key: spec.key.clone(),
            dimension_name: spec.display_name.clone(),
        }
    }
}

impl Display for AssessmentCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[文档 {} 维度 {}({})]",
            self.document_id, self.dimension_name, self.dimension_key
        )
    }
}
