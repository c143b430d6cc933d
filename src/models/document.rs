//! 文档结构
//!
//! 由 `services::section_index` 从转换后的 Markdown 构建，构建后不再修改。

use serde::{Deserialize, Serialize};

/// 二级标题对应的小节
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subsection {
    /// 小节标题（如 "1.1 研究背景"）
    pub title: String,
    /// 小节正文，包含标题行本身
    pub body: String,
}

/// 一级标题对应的章
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    /// 章标题（如 "第一章 绪论"）
    pub title: String,
    /// 章正文，包含标题行和全部小节
    pub body: String,
    /// 在全部一级标题中的位置（文档顺序排序键）
    pub position: usize,
    /// 按文档顺序排列的小节
    pub subsections: Vec<Subsection>,
}

impl Section {
    /// 按标题精确查找小节
    pub fn subsection(&self, title: &str) -> Option<&Subsection> {
        self.subsections.iter().find(|s| s.title == title)
    }

    /// 第一个小节之前的导语部分（含章标题行）
    ///
    /// 小节正文首尾相接构成 body 的尾部，因此导语长度可以直接算出。
    pub fn lead_text(&self) -> &str {
        let tail: usize = self.subsections.iter().map(|s| s.body.len()).sum();
        let cut = self.body.len().saturating_sub(tail);
        self.body.get(..cut).unwrap_or(&self.body)
    }
}

/// 不作为章节参与评估的一级标题类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmentKind {
    /// 中文摘要
    Abstract,
    /// 英文摘要
    TranslatedAbstract,
    /// 目录
    TableOfContents,
    /// 参考文献
    References,
    /// 致谢
    Acknowledgements,
    /// 附录
    Appendix,
    /// 配置的其他排除项
    Other,
}

/// 被排除的一级标题段落，保留原文以保证全文不丢失
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuxiliarySegment {
    pub kind: SegmentKind,
    pub title: String,
    /// 段落原文，包含标题行
    pub body: String,
    pub position: usize,
}

/// 一篇论文
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    /// 文档 ID（转换输出目录名）
    pub id: String,
    /// 第一个一级标题之前的内容（封面、声明等）
    pub front_matter: String,
    /// 中文摘要正文（不含标题行）
    pub abstract_native: String,
    /// 英文摘要正文（不含标题行）
    pub abstract_translated: String,
    /// 目录文本
    pub table_of_contents: String,
    /// 参考文献正文（不含标题行）
    pub references: String,
    /// 正文章节，按文档顺序
    pub sections: Vec<Section>,
    /// 被排除的段落，按文档顺序
    pub auxiliary: Vec<AuxiliarySegment>,
}

impl Document {
    /// 按标题精确查找章
    pub fn get(&self, title: &str) -> Option<&Section> {
        self.sections.iter().find(|s| s.title == title)
    }

    /// 全部章标题
    pub fn chapter_titles(&self) -> Vec<&str> {
        self.sections.iter().map(|s| s.title.as_str()).collect()
    }

    /// 查找某类排除段落
    pub fn auxiliary(&self, kind: SegmentKind) -> Option<&AuxiliarySegment> {
        self.auxiliary.iter().find(|a| a.kind == kind)
    }

    /// 第一个标题起的全文（章节与排除段落按位置拼接）
    pub fn body_text(&self) -> String {
        let mut parts: Vec<(usize, &str)> = self
            .sections
            .iter()
            .map(|s| (s.position, s.body.as_str()))
            .chain(self.auxiliary.iter().map(|a| (a.position, a.body.as_str())))
            .collect();
        parts.sort_by_key(|(position, _)| *position);
        parts.into_iter().map(|(_, body)| body).collect()
    }
}
