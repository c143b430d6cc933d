//! 模型响应解析 - 业务能力层
//!
//! 先解析再校验：模型输出要么成为已知结构（SelectionResult / AssessmentResult /
//! VerificationOutcome / Issue 列表 / 元信息），要么成为 `ParseError`。
//! 章节选择和内容评估在 JSON 解析失败后各有一次正则兜底。

use regex::Regex;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value as JsonValue;
use tracing::debug;

use crate::error::ParseError;
use crate::models::dimension::{AssessmentResult, SelectionResult, VerificationOutcome};
use crate::models::issue::Issue;
use crate::models::metadata::ThesisMetadata;

/// 响应解析器，正则在构造时编译一次
#[derive(Debug, Clone)]
pub struct ResponseParser {
    fenced_block: Regex,
    selected_list: Regex,
    quoted_item: Regex,
    chapter_heading: Regex,
    score_field: Regex,
    comment_field: Regex,
}

impl Default for ResponseParser {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Deserialize)]
struct SelectionPayload {
    selected_chapters: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct VerificationPayload {
    has_hallucination: bool,
    #[serde(default)]
    hallucination_points: Vec<String>,
    #[serde(default)]
    corrected: Option<AssessmentResult>,
}

#[derive(Debug, Deserialize)]
struct IssuesPayload {
    issues: Vec<Issue>,
}

impl ResponseParser {
    pub fn new() -> Self {
        // 以下正则均为常量，编译失败属于程序错误
        let compile = |pattern: &str| Regex::new(pattern).expect("invalid built-in regex");
        Self {
            fenced_block: compile(r"(?s)```(?:json|JSON)?\s*(.*?)```"),
            selected_list: compile(r#"(?s)"?selected_chapters"?\s*[:：]\s*\[(.*?)\]"#),
            quoted_item: compile(r#""([^"]+)"|“([^”]+)”"#),
            chapter_heading: compile(
                r#"第[一二三四五六七八九十百零〇0-9]+章[^\n"“”,，、。;；\]\)）]*"#,
            ),
            score_field: compile(r#""?\bscore\b"?\s*[:：]\s*"?(\d+(?:\.\d+)?)"#),
            comment_field: compile(r#"(?s)"comment"\s*:\s*"((?:[^"\\]|\\.)*)""#),
        }
    }

    /// 从响应中取出 JSON 文本：整体、代码块、或首尾括号之间的部分
    pub fn extract_json(&self, raw: &str) -> Option<JsonValue> {
        let trimmed = raw.trim();
        if let Ok(value) = serde_json::from_str(trimmed) {
            return Some(value);
        }

        for captures in self.fenced_block.captures_iter(trimmed) {
            if let Ok(value) = serde_json::from_str(captures[1].trim()) {
                return Some(value);
            }
        }

        for (open, close) in [('{', '}'), ('[', ']')] {
            if let (Some(start), Some(end)) = (trimmed.find(open), trimmed.rfind(close)) {
                if start < end {
                    if let Ok(value) = serde_json::from_str(&trimmed[start..=end]) {
                        return Some(value);
                    }
                }
            }
        }

        None
    }

    fn parse_as<T: DeserializeOwned>(&self, raw: &str, context: &str) -> Result<T, ParseError> {
        let value = self
            .extract_json(raw)
            .ok_or_else(|| ParseError::no_json(context, raw))?;
        serde_json::from_value(value).map_err(|e| ParseError::invalid_shape(context, e.to_string()))
    }

    // ========== 章节选择 ==========

    /// 解析章节选择结果，JSON 失败时用正则兜底一次
    pub fn parse_selection(&self, raw: &str) -> Result<SelectionResult, ParseError> {
        let titles = match self.parse_as::<SelectionPayload>(raw, "selection") {
            Ok(payload) => payload.selected_chapters,
            Err(e) => {
                debug!("章节选择 JSON 解析失败，尝试正则提取: {}", e);
                self.fallback_selection(raw).ok_or(e)?
            }
        };

        let titles: Vec<String> = titles
            .into_iter()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();

        if titles.is_empty() {
            return Err(ParseError::EmptySelection);
        }

        Ok(SelectionResult {
            selected_chapter_titles: titles,
        })
    }

    fn fallback_selection(&self, raw: &str) -> Option<Vec<String>> {
        if let Some(captures) = self.selected_list.captures(raw) {
            let items: Vec<String> = self
                .quoted_item
                .captures_iter(&captures[1])
                .filter_map(|c| c.get(1).or_else(|| c.get(2)))
                .map(|m| m.as_str().to_string())
                .collect();
            if !items.is_empty() {
                return Some(items);
            }
        }

        let mut headings: Vec<String> = Vec::new();
        for m in self.chapter_heading.find_iter(raw) {
            let heading = m.as_str().trim().to_string();
            if !headings.contains(&heading) {
                headings.push(heading);
            }
        }
        (!headings.is_empty()).then_some(headings)
    }

    // ========== 内容评估 ==========

    /// 解析评估结果并校验分数范围
    pub fn parse_assessment(
        &self,
        raw: &str,
        full_score: f64,
    ) -> Result<AssessmentResult, ParseError> {
        let result = match self.parse_as::<AssessmentResult>(raw, "assessment") {
            Ok(result) => result,
            Err(e) => {
                debug!("评估结果 JSON 解析失败，尝试正则提取: {}", e);
                self.fallback_assessment(raw).ok_or(e)?
            }
        };
        validate_score(result, full_score)
    }

    fn fallback_assessment(&self, raw: &str) -> Option<AssessmentResult> {
        let score = self.score_field.captures(raw)?[1].parse::<f64>().ok()?;
        let comment = self
            .comment_field
            .captures(raw)
            .map(|c| c[1].replace("\\\"", "\"").replace("\\n", "\n"))
            .unwrap_or_default();
        Some(AssessmentResult {
            score,
            comment,
            strengths: Vec::new(),
            weaknesses: Vec::new(),
            suggestions: Vec::new(),
        })
    }

    // ========== 幻觉核查 ==========

    /// 解析核查结果；任何不符合预期的响应都是 `ParseFailed`
    pub fn parse_verification(&self, raw: &str, full_score: f64) -> VerificationOutcome {
        let parse_failed = || VerificationOutcome::ParseFailed {
            raw: raw.to_string(),
        };

        let payload = match self.parse_as::<VerificationPayload>(raw, "verification") {
            Ok(payload) => payload,
            Err(e) => {
                debug!("核查结果解析失败: {}", e);
                return parse_failed();
            }
        };

        if !payload.has_hallucination {
            return VerificationOutcome::NoHallucination;
        }

        match payload.corrected.map(|c| validate_score(c, full_score)) {
            Some(Ok(corrected)) => VerificationOutcome::HallucinationDetected {
                points: payload.hallucination_points,
                corrected,
            },
            _ => parse_failed(),
        }
    }

    // ========== 问题清单 / 元信息 ==========

    /// 解析问题列表：`{"issues": [...]}` 或直接的数组
    pub fn parse_issue_list(&self, raw: &str) -> Result<Vec<Issue>, ParseError> {
        let value = self
            .extract_json(raw)
            .ok_or_else(|| ParseError::no_json("issues", raw))?;
        let issues = if value.is_array() {
            serde_json::from_value::<Vec<Issue>>(value)
        } else {
            serde_json::from_value::<IssuesPayload>(value).map(|p| p.issues)
        };
        issues.map_err(|e| ParseError::invalid_shape("issues", e.to_string()))
    }

    /// 解析论文元信息
    pub fn parse_metadata(&self, raw: &str) -> Result<ThesisMetadata, ParseError> {
        self.parse_as(raw, "metadata")
    }
}

fn validate_score(result: AssessmentResult, full_score: f64) -> Result<AssessmentResult, ParseError> {
    if !result.score.is_finite() || result.score < 0.0 || result.score > full_score {
        return Err(ParseError::ScoreOutOfRange {
            score: result.score,
            full_score,
        });
    }
    Ok(result)
}
