//! 提示词构建 - 业务能力层
//!
//! 维度相关的提示词来自配置模板；这里只负责填充占位符，
//! 并在末尾追加解析器依赖的输出格式说明。

use crate::models::dimension::{AssessmentResult, DimensionSpec};
use crate::models::document::Document;
use crate::models::issue::LintFinding;

/// 幻觉核查提示词标记
pub const VERIFICATION_HEADER: &str = "【幻觉核查】";
/// 分章节问题扫描提示词标记
pub const ISSUE_SCAN_HEADER: &str = "【问题扫描】";
/// 问题汇总提示词标记
pub const AGGREGATION_HEADER: &str = "【问题汇总】";
/// 元信息提取提示词标记
pub const METADATA_HEADER: &str = "【元信息提取】";

/// 用 `{name}` 形式的占位符填充模板（按顺序替换，正文类变量放最后）
pub fn render_template(template: &str, vars: &[(&str, &str)]) -> String {
    vars.iter().fold(template.to_string(), |acc, (name, value)| {
        acc.replace(&format!("{{{}}}", name), value)
    })
}

/// 阶段一：章节选择
pub fn selection_prompt(spec: &DimensionSpec, document: &Document) -> String {
    let body = render_template(
        &spec.selection_prompt_template,
        &[
            ("dimension", spec.display_name.as_str()),
            ("abstract", document.abstract_native.as_str()),
            ("toc", document.table_of_contents.as_str()),
        ],
    );
    format!(
        "{}\n\n请只输出 JSON，格式为：{{\"selected_chapters\": [\"章节标题\", ...]}}，\
         章节标题必须取自目录。",
        body
    )
}

/// 阶段二：内容评估
pub fn assessment_prompt(spec: &DimensionSpec, content_blob: &str) -> String {
    let full_score = format_score(spec.full_score);
    let body = render_template(
        &spec.assessment_prompt_template,
        &[
            ("dimension", spec.display_name.as_str()),
            ("full_score", full_score.as_str()),
            ("content", content_blob),
        ],
    );
    format!(
        "{}\n\n请只输出 JSON，格式为：{{\"score\": 0-{}之间的数字, \"comment\": \"总体评价\", \
         \"strengths\": [\"...\"], \"weaknesses\": [\"...\"], \"suggestions\": [\"...\"]}}",
        body, full_score
    )
}

/// 阶段三：幻觉核查
pub fn verification_prompt(
    spec: &DimensionSpec,
    abstract_text: &str,
    assessment_prompt_used: &str,
    result: &AssessmentResult,
) -> String {
    let result_json = serde_json::to_string_pretty(result).unwrap_or_default();
    format!(
        "{header}\n评估维度：{dimension}（满分 {full_score}）\n\n\
         论文摘要：\n{abstract_text}\n\n\
         评估时使用的提示词（含论文原文）：\n{prompt}\n\n\
         待核查的评估结果：\n{result}\n\n\
         请逐条检查评估结果中的论断是否能在上述原文中找到依据。\n\
         请只输出 JSON，格式为：{{\"has_hallucination\": true/false, \
         \"hallucination_points\": [\"无依据的论断\"], \
         \"corrected\": 修正后的评估结果（格式同上，无幻觉时可省略）}}",
        header = VERIFICATION_HEADER,
        dimension = spec.display_name,
        full_score = format_score(spec.full_score),
        abstract_text = abstract_text,
        prompt = assessment_prompt_used,
        result = result_json,
    )
}

/// 分章节问题扫描
pub fn issue_scan_prompt(chapter: &str, sub_chapter: &str, text: &str) -> String {
    format!(
        "{header}\n章节：{chapter}\n小节：{sub_chapter}\n\n正文：\n{text}\n\n\
         请找出该部分在表述、逻辑、格式、用词上的问题。\
         请只输出 JSON，格式为：{{\"issues\": [{{\"type\": \"问题类型\", \"severity\": \"高/中/低\", \
         \"chapter\": \"{chapter}\", \"sub_chapter\": \"{sub_chapter}\", \
         \"original_text\": \"原文片段\", \"detail\": \"问题说明\", \"suggestion\": \"修改建议\"}}]}}",
        header = ISSUE_SCAN_HEADER,
        chapter = chapter,
        sub_chapter = sub_chapter,
        text = text,
    )
}

/// 问题汇总：合并各章节扫描结果与本地检查结果，去重
pub fn aggregation_prompt(raw_responses: &[String], lint_findings: &[LintFinding]) -> String {
    let lint_json = serde_json::to_string_pretty(lint_findings).unwrap_or_default();
    let mut scans = String::new();
    for (i, raw) in raw_responses.iter().enumerate() {
        scans.push_str(&format!("--- 扫描结果 {} ---\n{}\n", i + 1, raw));
    }

    format!(
        "{header}\n以下是论文各部分的问题扫描结果和本地规则检查结果。\n\
         请合并重复或相近的问题，删除不成立的问题，保留章节与小节信息。\n\n\
         {scans}\n--- 本地规则检查 ---\n{lint}\n\n\
         请只输出 JSON，格式为：{{\"issues\": [{{\"type\": \"\", \"severity\": \"\", \"chapter\": \"\", \
         \"sub_chapter\": \"\", \"original_text\": \"\", \"detail\": \"\", \"suggestion\": \"\"}}]}}",
        header = AGGREGATION_HEADER,
        scans = scans,
        lint = lint_json,
    )
}

/// 元信息提取
pub fn metadata_prompt(document: &Document) -> String {
    format!(
        "{header}\n封面与声明：\n{front}\n\n中文摘要：\n{native}\n\n英文摘要：\n{translated}\n\n\
         请提取论文题目、作者、专业、导师以及中英文关键词。\
         请只输出 JSON，格式为：{{\"title\": \"\", \"author\": \"\", \"major\": \"\", \"supervisor\": \"\", \
         \"keywords_native\": [], \"keywords_translated\": []}}",
        header = METADATA_HEADER,
        front = document.front_matter.trim(),
        native = document.abstract_native,
        translated = document.abstract_translated,
    )
}

fn format_score(score: f64) -> String {
    if score.fract() == 0.0 {
        format!("{}", score as i64)
    } else {
        format!("{}", score)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec() -> DimensionSpec {
        DimensionSpec {
            key: "logic".to_string(),
            display_name: "逻辑性".to_string(),
            weight: 1.0,
            full_score: 10.0,
            selection_prompt_template: "维度：{dimension}\n目录：{toc}\n摘要：{abstract}".to_string(),
            assessment_prompt_template: "请按{dimension}评估（满分{full_score}）：\n{content}"
                .to_string(),
        }
    }

    #[test]
    fn test_render_template_replaces_all_occurrences() {
        let rendered = render_template("{a}-{b}-{a}-{c}", &[("a", "1"), ("b", "2")]);
        assert_eq!(rendered, "1-2-1-{c}");
    }

    #[test]
    fn test_selection_prompt_fills_document_fields() {
        let document = Document {
            table_of_contents: "第一章 绪论".to_string(),
            abstract_native: "本文……".to_string(),
            ..Default::default()
        };
        let prompt = selection_prompt(&spec(), &document);
        assert!(prompt.starts_with("维度：逻辑性\n目录：第一章 绪论\n摘要：本文……"));
        assert!(prompt.contains("selected_chapters"));
    }

    #[test]
    fn test_assessment_prompt_uses_integer_full_score() {
        let prompt = assessment_prompt(&spec(), "【第一章】正文");
        assert!(prompt.starts_with("请按逻辑性评估（满分10）：\n【第一章】正文"));
    }

    #[test]
    fn test_verification_prompt_embeds_assessment() {
        let result = AssessmentResult {
            score: 8.0,
            comment: "结构清晰".to_string(),
            strengths: vec![],
            weaknesses: vec![],
            suggestions: vec![],
        };
        let prompt = verification_prompt(&spec(), "摘要", "原评估提示词", &result);
        assert!(prompt.starts_with(VERIFICATION_HEADER));
        assert!(prompt.contains("原评估提示词"));
        assert!(prompt.contains("结构清晰"));
    }
}
