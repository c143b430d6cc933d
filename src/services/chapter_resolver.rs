//! 章节解析 - 业务能力层
//!
//! 把模型返回的（可能不完整、带噪声的）章节名映射回文档中的章或小节。
//! 匹配规则只在这里定义，按顺序：
//! 1. 与章标题完全相等
//! 2. 与小节标题完全相等（返回小节正文）
//! 3. 与章标题双向包含
//! 4. 与小节标题双向包含（返回小节正文而不是整章）
//!
//! 比较前统一做空白与大小写规范化。解析永不报错，无法匹配的标题记日志后跳过。

use serde::Serialize;
use tracing::warn;

use crate::error::EvaluationError;
use crate::models::document::Document;
use crate::services::section_index::normalize_title;

/// 匹配到的层级
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChapterLevel {
    Section,
    Subsection,
}

/// 单个章节名的解析结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedChapter {
    /// 文档中的规范标题
    pub heading: String,
    pub content: String,
    pub level: ChapterLevel,
}

/// 多个章节名拼接后的内容
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedContent {
    /// 拼接后的正文，每段以【规范标题】开头
    pub blob: String,
    /// 实际使用的规范标题，按请求顺序
    pub focus_chapters: Vec<String>,
    /// 未能匹配的请求标题
    pub unresolved: Vec<String>,
}

impl ResolvedContent {
    pub fn is_empty(&self) -> bool {
        self.blob.trim().is_empty()
    }
}

fn contains_either(a: &str, b: &str) -> bool {
    a.contains(b) || b.contains(a)
}

/// 解析单个章节名
pub fn resolve(requested_title: &str, document: &Document) -> Option<ResolvedChapter> {
    let wanted = normalize_title(requested_title);
    if wanted.is_empty() {
        return None;
    }

    let sections: Vec<(String, &crate::models::document::Section)> = document
        .sections
        .iter()
        .map(|s| (normalize_title(&s.title), s))
        .collect();

    if let Some((_, section)) = sections.iter().find(|(title, _)| *title == wanted) {
        return Some(ResolvedChapter {
            heading: section.title.clone(),
            content: section.body.clone(),
            level: ChapterLevel::Section,
        });
    }

    // 完整写出的小节标题优先于章标题的模糊匹配（"2.4 本章结论" 不应落到 "结论" 章）
    if let Some(sub) = document
        .sections
        .iter()
        .flat_map(|s| s.subsections.iter())
        .find(|sub| normalize_title(&sub.title) == wanted)
    {
        return Some(ResolvedChapter {
            heading: sub.title.clone(),
            content: sub.body.clone(),
            level: ChapterLevel::Subsection,
        });
    }

    if let Some((_, section)) = sections
        .iter()
        .find(|(title, _)| !title.is_empty() && contains_either(title, &wanted))
    {
        return Some(ResolvedChapter {
            heading: section.title.clone(),
            content: section.body.clone(),
            level: ChapterLevel::Section,
        });
    }

    document
        .sections
        .iter()
        .flat_map(|s| s.subsections.iter())
        .find(|sub| {
            let title = normalize_title(&sub.title);
            !title.is_empty() && contains_either(&title, &wanted)
        })
        .map(|sub| ResolvedChapter {
            heading: sub.title.clone(),
            content: sub.body.clone(),
            level: ChapterLevel::Subsection,
        })
}

/// 解析一组章节名并拼接正文；同一章节只拼接一次
pub fn resolve_all(requested_titles: &[String], document: &Document) -> ResolvedContent {
    let mut content = ResolvedContent::default();

    for title in requested_titles {
        match resolve(title, document) {
            Some(chapter) => {
                if content.focus_chapters.contains(&chapter.heading) {
                    continue;
                }
                content.blob.push_str(&format!("【{}】\n", chapter.heading));
                content.blob.push_str(chapter.content.trim_end());
                content.blob.push_str("\n\n");
                content.focus_chapters.push(chapter.heading);
            }
            None => {
                let miss = EvaluationError::ResolutionMiss {
                    title: title.clone(),
                };
                warn!("[文档 {}] ⚠️ {}，已跳过", document.id, miss);
                content.unresolved.push(title.clone());
            }
        }
    }

    content
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::section_index::SectionIndex;

    fn document() -> Document {
        let markup = "# 第一章 绪论\n导语\n## 1.1 研究背景\n背景\n## 1.2 研究意义\n意义\n\
                      # 第二章 系统设计与实现\n设计\n## 2.1 总体架构\n架构\n";
        SectionIndex::default().build(markup, "doc")
    }

    #[test]
    fn test_exact_match_ignores_whitespace_and_case() {
        let doc = document();
        let chapter = resolve("第一章绪论", &doc).unwrap();
        assert_eq!(chapter.heading, "第一章 绪论");
        assert_eq!(chapter.level, ChapterLevel::Section);
    }

    #[test]
    fn test_substring_match_both_directions() {
        let doc = document();
        // 请求标题是章标题的一部分
        assert_eq!(resolve("系统设计", &doc).unwrap().heading, "第二章 系统设计与实现");
        // 章标题是请求标题的一部分
        assert_eq!(
            resolve("第一章 绪论（含研究背景）", &doc).unwrap().heading,
            "第一章 绪论"
        );
    }

    #[test]
    fn test_subsection_match_returns_subsection_body() {
        let doc = document();
        let chapter = resolve("1.2 研究意义", &doc).unwrap();
        assert_eq!(chapter.level, ChapterLevel::Subsection);
        assert_eq!(chapter.content, "## 1.2 研究意义\n意义\n");
        assert!(!chapter.content.contains("背景"));
    }

    #[test]
    fn test_exact_subsection_beats_section_substring() {
        let markup = "# 第二章 实验\n## 2.4 本章结论\n实验小结\n# 结论\n全文总结\n";
        let doc = SectionIndex::default().build(markup, "doc");

        let chapter = resolve("2.4 本章结论", &doc).unwrap();
        assert_eq!(chapter.heading, "2.4 本章结论");
        assert_eq!(chapter.level, ChapterLevel::Subsection);
        assert_eq!(chapter.content, "## 2.4 本章结论\n实验小结\n");

        // 只写章名时仍然匹配整章
        assert_eq!(resolve("结论", &doc).unwrap().level, ChapterLevel::Section);
    }

    #[test]
    fn test_unresolved_and_empty_titles() {
        let doc = document();
        assert!(resolve("第五章 总结", &doc).is_none());
        assert!(resolve("   ", &doc).is_none());
    }

    #[test]
    fn test_resolve_all_prefixes_headings_and_dedups() {
        let doc = document();
        let titles = vec![
            "第一章".to_string(),
            "第一章 绪论".to_string(),
            "不存在的章节".to_string(),
            "总体架构".to_string(),
        ];
        let content = resolve_all(&titles, &doc);

        assert_eq!(content.focus_chapters, vec!["第一章 绪论", "2.1 总体架构"]);
        assert_eq!(content.unresolved, vec!["不存在的章节"]);
        assert!(content.blob.starts_with("【第一章 绪论】\n# 第一章 绪论\n"));
        assert!(content.blob.contains("【2.1 总体架构】\n## 2.1 总体架构\n架构"));
    }

    #[test]
    fn test_resolve_all_empty_when_nothing_matches() {
        let doc = document();
        let content = resolve_all(&["结论".to_string()], &doc);
        assert!(content.is_empty());
        assert!(content.focus_chapters.is_empty());
    }
}
