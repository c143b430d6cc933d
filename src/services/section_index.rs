//! 章节索引 - 业务能力层
//!
//! 把转换后的 Markdown 切分成章（一级标题）和小节（二级标题）。
//! 纯解析，不涉及网络与并发。

use tracing::debug;

use crate::models::document::{AuxiliarySegment, Document, Section, SegmentKind, Subsection};

/// 标题规范化：去掉所有空白并转小写（"目 录" 与 "目录" 视为相同）
pub fn normalize_title(title: &str) -> String {
    title
        .chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

/// 排除规则：规范化后的标题以关键字开头即命中
#[derive(Debug, Clone)]
struct ExclusionRule {
    keyword: String,
    kind: SegmentKind,
}

/// 章节索引构建器
#[derive(Debug, Clone)]
pub struct SectionIndex {
    exclusions: Vec<ExclusionRule>,
}

impl Default for SectionIndex {
    fn default() -> Self {
        Self::new(&[])
    }
}

impl SectionIndex {
    /// 创建索引构建器，`extra_exclusions` 为额外排除的一级标题关键字
    pub fn new(extra_exclusions: &[String]) -> Self {
        // 顺序有意义："英文摘要" 必须先于 "摘要" 判断
        let builtin = [
            ("英文摘要", SegmentKind::TranslatedAbstract),
            ("abstract", SegmentKind::TranslatedAbstract),
            ("中文摘要", SegmentKind::Abstract),
            ("摘要", SegmentKind::Abstract),
            ("目录", SegmentKind::TableOfContents),
            ("contents", SegmentKind::TableOfContents),
            ("tableofcontents", SegmentKind::TableOfContents),
            ("参考文献", SegmentKind::References),
            ("references", SegmentKind::References),
            ("bibliography", SegmentKind::References),
            ("致谢", SegmentKind::Acknowledgements),
            ("acknowledg", SegmentKind::Acknowledgements),
            ("附录", SegmentKind::Appendix),
            ("appendix", SegmentKind::Appendix),
        ];

        let mut exclusions: Vec<ExclusionRule> = builtin
            .iter()
            .map(|(keyword, kind)| ExclusionRule {
                keyword: keyword.to_string(),
                kind: *kind,
            })
            .collect();

        exclusions.extend(
            extra_exclusions
                .iter()
                .map(|k| normalize_title(k))
                .filter(|k| !k.is_empty())
                .map(|keyword| ExclusionRule {
                    keyword,
                    kind: SegmentKind::Other,
                }),
        );

        Self { exclusions }
    }

    /// 判断一级标题是否属于排除项
    pub fn classify(&self, title: &str) -> Option<SegmentKind> {
        let normalized = normalize_title(title);
        self.exclusions
            .iter()
            .find(|rule| normalized.starts_with(&rule.keyword))
            .map(|rule| rule.kind)
    }

    /// 从 Markdown 构建文档
    pub fn build(&self, markup: &str, document_id: &str) -> Document {
        let headings = scan_headings(markup);
        let top_level: Vec<&Heading> = headings.iter().filter(|h| h.level == 1).collect();

        let mut document = Document {
            id: document_id.to_string(),
            ..Default::default()
        };

        let first_offset = top_level.first().map(|h| h.offset).unwrap_or(markup.len());
        document.front_matter = markup[..first_offset].to_string();

        for (position, heading) in top_level.iter().enumerate() {
            let end = top_level
                .get(position + 1)
                .map(|next| next.offset)
                .unwrap_or(markup.len());
            let body = &markup[heading.offset..end];

            match self.classify(&heading.title) {
                Some(kind) => {
                    let content = body[heading.line_len..].trim().to_string();
                    match kind {
                        SegmentKind::Abstract if document.abstract_native.is_empty() => {
                            document.abstract_native = content;
                        }
                        SegmentKind::TranslatedAbstract
                            if document.abstract_translated.is_empty() =>
                        {
                            document.abstract_translated = content;
                        }
                        SegmentKind::TableOfContents if document.table_of_contents.is_empty() => {
                            document.table_of_contents = content;
                        }
                        SegmentKind::References if document.references.is_empty() => {
                            document.references = content;
                        }
                        _ => {}
                    }
                    document.auxiliary.push(AuxiliarySegment {
                        kind,
                        title: heading.title.clone(),
                        body: body.to_string(),
                        position,
                    });
                }
                None => {
                    let subsections = headings
                        .iter()
                        .filter(|h| h.level == 2 && h.offset > heading.offset && h.offset < end)
                        .collect::<Vec<_>>();

                    let subsections = subsections
                        .iter()
                        .enumerate()
                        .map(|(i, sub)| {
                            let sub_end = subsections
                                .get(i + 1)
                                .map(|next| next.offset)
                                .unwrap_or(end);
                            Subsection {
                                title: sub.title.clone(),
                                body: markup[sub.offset..sub_end].to_string(),
                            }
                        })
                        .collect();

                    document.sections.push(Section {
                        title: heading.title.clone(),
                        body: body.to_string(),
                        position,
                        subsections,
                    });
                }
            }
        }

        if document.table_of_contents.is_empty() {
            document.table_of_contents = synthesize_toc(&document.sections);
        }

        debug!(
            "[文档 {}] 章节索引完成: {} 章, {} 个排除段落",
            document_id,
            document.sections.len(),
            document.auxiliary.len()
        );

        document
    }
}

/// Markdown 标题行
#[derive(Debug)]
struct Heading {
    level: usize,
    title: String,
    /// 标题行起始字节偏移
    offset: usize,
    /// 标题行长度（含换行符）
    line_len: usize,
}

/// 扫描一、二级标题，跳过代码块内的行
fn scan_headings(markup: &str) -> Vec<Heading> {
    let mut headings = Vec::new();
    let mut offset = 0;
    let mut in_fence = false;

    for line in markup.split_inclusive('\n') {
        let trimmed = line.trim_end();
        if trimmed.trim_start().starts_with("```") {
            in_fence = !in_fence;
        } else if !in_fence {
            if let Some((level, title)) = parse_heading(trimmed) {
                headings.push(Heading {
                    level,
                    title,
                    offset,
                    line_len: line.len(),
                });
            }
        }
        offset += line.len();
    }

    headings
}

fn parse_heading(line: &str) -> Option<(usize, String)> {
    let (level, rest) = if let Some(rest) = line.strip_prefix("## ") {
        (2, rest)
    } else if let Some(rest) = line.strip_prefix("# ") {
        (1, rest)
    } else {
        return None;
    };

    let title = rest.trim().trim_end_matches('#').trim().replace("**", "");
    if title.is_empty() {
        None
    } else {
        Some((level, title))
    }
}

/// 转换结果没有目录时，用章节标题合成一份
fn synthesize_toc(sections: &[Section]) -> String {
    let mut toc = String::new();
    for section in sections {
        toc.push_str(&section.title);
        toc.push('\n');
        for sub in &section.subsections {
            toc.push_str("  ");
            toc.push_str(&sub.title);
            toc.push('\n');
        }
    }
    toc
}
