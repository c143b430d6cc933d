//! 维度评估相关的数据结构

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// 单个评估维度的静态配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DimensionSpec {
    /// 维度标识（如 "logic"）
    pub key: String,
    /// 展示名称（如 "逻辑性"）
    pub display_name: String,
    pub weight: f64,
    pub full_score: f64,
    /// 章节选择提示词模板，可用占位符：{dimension} {toc} {abstract}
    pub selection_prompt_template: String,
    /// 内容评估提示词模板，可用占位符：{dimension} {content} {full_score}
    pub assessment_prompt_template: String,
}

/// 维度配置文件结构
#[derive(Debug, Clone, Deserialize)]
pub struct DimensionConfig {
    pub dimensions: Vec<DimensionSpec>,
}

impl DimensionConfig {
    /// 校验维度配置：非空、key 唯一、权重非负、满分为正
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.dimensions.is_empty() {
            return Err(ConfigError::NoDimensions);
        }
        let mut seen = std::collections::HashSet::new();
        for spec in &self.dimensions {
            let invalid = |reason: &str| ConfigError::InvalidDimension {
                key: spec.key.clone(),
                reason: reason.to_string(),
            };
            if spec.key.trim().is_empty() {
                return Err(invalid("key 不能为空"));
            }
            if !seen.insert(spec.key.as_str()) {
                return Err(invalid("key 重复"));
            }
            if !(spec.weight >= 0.0) {
                return Err(invalid("权重必须为非负数"));
            }
            if !(spec.full_score > 0.0) {
                return Err(invalid("满分必须为正数"));
            }
        }
        Ok(())
    }
}

/// 阶段一：章节选择结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionResult {
    pub selected_chapter_titles: Vec<String>,
}

/// 阶段二：内容评估结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssessmentResult {
    #[serde(deserialize_with = "deserialize_score")]
    pub score: f64,
    #[serde(default)]
    pub comment: String,
    #[serde(default)]
    pub strengths: Vec<String>,
    #[serde(default)]
    pub weaknesses: Vec<String>,
    #[serde(default)]
    pub suggestions: Vec<String>,
}

// 分数可能以数字或数字字符串返回（如 "8.5"）
fn deserialize_score<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::Visitor;
    use std::fmt;

    struct ScoreVisitor;

    impl<'de> Visitor<'de> for ScoreVisitor {
        type Value = f64;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("a number or numeric string representing a score")
        }

        fn visit_f64<E>(self, value: f64) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            Ok(value)
        }

        fn visit_i64<E>(self, value: i64) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            Ok(value as f64)
        }

        fn visit_u64<E>(self, value: u64) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            Ok(value as f64)
        }

        fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            value
                .trim()
                .trim_end_matches('分')
                .parse::<f64>()
                .map_err(|_| E::custom(format!("invalid score: {}", value)))
        }
    }

    deserializer.deserialize_any(ScoreVisitor)
}

/// 阶段三：幻觉核查结果
#[derive(Debug, Clone, PartialEq)]
pub enum VerificationOutcome {
    /// 评估内容均有原文依据
    NoHallucination,
    /// 发现幻觉，并给出修正后的评估
    HallucinationDetected {
        points: Vec<String>,
        corrected: AssessmentResult,
    },
    /// 核查响应无法解析
    ParseFailed { raw: String },
}

/// 最终采用结果的核查标记
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum VerificationStatus {
    /// 核查通过
    Verified,
    /// 已按核查意见修正
    Corrected { points: Vec<String> },
    /// 多次核查均无法解析，保留原评估
    Unverified,
}

/// 单个维度的最终报告
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DimensionReport {
    pub key: String,
    pub name: String,
    pub score: f64,
    pub full_score: f64,
    pub weight: f64,
    pub focus_chapters: Vec<String>,
    pub comment: String,
    pub strengths: Vec<String>,
    pub weaknesses: Vec<String>,
    pub suggestions: Vec<String>,
    pub verification: VerificationStatus,
}

/// 评估失败的维度
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedDimension {
    pub key: String,
    pub reason: String,
}

/// 维度评分汇总
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreReport {
    /// 有效维度的加权平均分（保留两位小数）
    pub overall_score: f64,
    /// 成功的维度，按配置顺序
    pub dimensions: Vec<DimensionReport>,
    /// 失败的维度（不计入总分）
    pub failed: Vec<FailedDimension>,
}
