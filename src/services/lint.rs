//! 本地规则检查：学术写作中的口语化人称
//!
//! 不调用 LLM，结果与分章节扫描结果一起送入问题汇总。

use crate::models::document::Document;
use crate::models::issue::LintFinding;

/// 需要提示的人称代词（长的在前，避免 "我们" 被拆成 "我"）
const PRONOUNS: [&str; 5] = ["我们", "咱们", "你们", "我", "你"];

/// 与 "我" 组成常见书面语的后字（我国、我校……）
const FORMAL_SUFFIXES: [char; 8] = ['国', '校', '省', '市', '院', '军', '党', '方'];

/// 去掉引号内的内容（引文中的人称不算）
fn strip_quotes(sentence: &str) -> String {
    let mut depth = 0usize;
    let mut out = String::with_capacity(sentence.len());
    for c in sentence.chars() {
        match c {
            '“' | '「' | '『' => depth += 1,
            '”' | '」' | '』' => depth = depth.saturating_sub(1),
            _ if depth == 0 => out.push(c),
            _ => {}
        }
    }
    out
}

/// 找出句子中出现的口语化人称，按出现顺序去重
pub fn find_pronouns(sentence: &str) -> Vec<&'static str> {
    let text = strip_quotes(sentence);
    let chars: Vec<char> = text.chars().collect();
    let mut found: Vec<&'static str> = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let matched = PRONOUNS.iter().find(|p| {
            let pc: Vec<char> = p.chars().collect();
            chars[i..].starts_with(&pc)
        });

        match matched {
            Some(pronoun) => {
                let len = pronoun.chars().count();
                let prev = i.checked_sub(1).map(|j| chars[j]);
                let next = chars.get(i + len).copied();
                let formal = *pronoun == "我"
                    && (prev == Some('自') || next.is_some_and(|c| FORMAL_SUFFIXES.contains(&c)));
                if !formal && !found.contains(pronoun) {
                    found.push(pronoun);
                }
                i += len;
            }
            None => i += 1,
        }
    }

    found
}

/// 按句检查一段正文（跳过标题行）
fn lint_text(chapter: &str, sub_chapter: &str, text: &str, out: &mut Vec<LintFinding>) {
    for line in text.lines().filter(|l| !l.trim_start().starts_with('#')) {
        for sentence in line.split_inclusive(['。', '！', '？', '；']) {
            let sentence = sentence.trim();
            if sentence.is_empty() {
                continue;
            }
            let pronouns = find_pronouns(sentence);
            if !pronouns.is_empty() {
                out.push(LintFinding {
                    chapter: chapter.to_string(),
                    sub_chapter: sub_chapter.to_string(),
                    original_text: sentence.to_string(),
                    detail: format!(
                        "学术写作中不宜使用口语化人称“{}”，建议改为“本文”“笔者”或无主语句",
                        pronouns.join("”“")
                    ),
                });
            }
        }
    }
}

/// 检查全文：摘要与各章节
pub fn lint_document(document: &Document) -> Vec<LintFinding> {
    let mut findings = Vec::new();

    lint_text("摘要", "", &document.abstract_native, &mut findings);

    for section in &document.sections {
        lint_text(&section.title, "", section.lead_text(), &mut findings);
        for sub in &section.subsections {
            lint_text(&section.title, &sub.title, &sub.body, &mut findings);
        }
    }

    findings
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::section_index::SectionIndex;

    #[test]
    fn test_find_pronouns_prefers_longer_match() {
        assert_eq!(find_pronouns("我们提出了一种新方法。"), vec!["我们"]);
        assert_eq!(find_pronouns("你可以看到，我认为它有效。"), vec!["你", "我"]);
    }

    #[test]
    fn test_formal_usage_is_not_flagged() {
        assert!(find_pronouns("我国制造业发展迅速，自我修复机制有效。").is_empty());
    }

    #[test]
    fn test_quoted_text_is_ignored() {
        assert!(find_pronouns("受访者表示：“我们很满意”。").is_empty());
    }

    #[test]
    fn test_lint_document_reports_subsection() {
        let markup = "# 摘要\n本文研究了缓存。\n# 第一章 绪论\n## 1.1 背景\n近年来发展很快。我们发现问题。\n";
        let document = SectionIndex::default().build(markup, "doc");
        let findings = lint_document(&document);

        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].chapter, "第一章 绪论");
        assert_eq!(findings[0].sub_chapter, "1.1 背景");
        assert_eq!(findings[0].original_text, "我们发现问题。");
    }
}
