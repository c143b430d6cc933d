//! 文档统计 - 业务能力层
//!
//! 字数统计与图表统计，纯本地计算。

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::models::document::Document;

struct Patterns {
    latin_word: Regex,
    image: Regex,
    figure_caption: Regex,
    table_caption: Regex,
    table_separator: Regex,
}

fn patterns() -> &'static Patterns {
    static PATTERNS: OnceLock<Patterns> = OnceLock::new();
    PATTERNS.get_or_init(|| Patterns {
        latin_word: Regex::new(r"[A-Za-z]+(?:['-][A-Za-z]+)*").expect("常量正则"),
        image: Regex::new(r"!\[[^\]]*\]\([^)]*\)|<img\s").expect("常量正则"),
        figure_caption: Regex::new(r"^\s*图\s*\d+\s*[-－.．]\s*\d+").expect("常量正则"),
        table_caption: Regex::new(r"^\s*表\s*\d+\s*[-－.．]\s*\d+").expect("常量正则"),
        table_separator: Regex::new(r"^\s*\|?\s*:?-{3,}:?\s*(\|\s*:?-{3,}:?\s*)*\|?\s*$")
            .expect("常量正则"),
    })
}

fn is_cjk(c: char) -> bool {
    ('\u{4e00}'..='\u{9fff}').contains(&c) || ('\u{3400}'..='\u{4dbf}').contains(&c)
}

/// 汉字数
pub fn count_cjk(text: &str) -> usize {
    text.chars().filter(|c| is_cjk(*c)).count()
}

/// 英文单词数
pub fn count_latin_words(text: &str) -> usize {
    patterns().latin_word.find_iter(text).count()
}

/// 单章字数
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChapterTextStatistics {
    pub chapter: String,
    pub cjk_chars: usize,
    pub latin_words: usize,
}

/// 字数统计
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextStatistics {
    /// 全文（第一个标题起）汉字数
    pub total_cjk_chars: usize,
    pub total_latin_words: usize,
    /// 中文摘要汉字数
    pub abstract_chars: usize,
    pub chapters: Vec<ChapterTextStatistics>,
}

pub fn text_statistics(document: &Document) -> TextStatistics {
    let full_text = document.body_text();
    let chapters = document
        .sections
        .iter()
        .map(|s| ChapterTextStatistics {
            chapter: s.title.clone(),
            cjk_chars: count_cjk(&s.body),
            latin_words: count_latin_words(&s.body),
        })
        .collect();

    TextStatistics {
        total_cjk_chars: count_cjk(&full_text),
        total_latin_words: count_latin_words(&full_text),
        abstract_chars: count_cjk(&document.abstract_native),
        chapters,
    }
}

/// 图、表、公式计数
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FigureTableCounts {
    pub images: usize,
    pub tables: usize,
    /// 独立公式（$$ ... $$）
    pub formulas: usize,
    /// 图题（图x-y）
    pub figure_captions: usize,
    /// 表题（表x-y）
    pub table_captions: usize,
}

impl FigureTableCounts {
    fn add(&mut self, other: &FigureTableCounts) {
        self.images += other.images;
        self.tables += other.tables;
        self.formulas += other.formulas;
        self.figure_captions += other.figure_captions;
        self.table_captions += other.table_captions;
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChapterFigureTableStatistics {
    pub chapter: String,
    #[serde(flatten)]
    pub counts: FigureTableCounts,
}

/// 图表统计
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FigureTableStatistics {
    pub totals: FigureTableCounts,
    pub chapters: Vec<ChapterFigureTableStatistics>,
}

/// 统计一段正文中的图表
pub fn count_figures_and_tables(text: &str) -> FigureTableCounts {
    let p = patterns();
    let mut counts = FigureTableCounts {
        images: p.image.find_iter(text).count(),
        tables: text.matches("<table").count(),
        ..Default::default()
    };

    let mut in_formula = false;
    for line in text.lines() {
        let trimmed = line.trim();
        if p.table_separator.is_match(trimmed) && trimmed.contains('-') && trimmed.contains('|') {
            counts.tables += 1;
        }
        if p.figure_caption.is_match(trimmed) {
            counts.figure_captions += 1;
        }
        if p.table_caption.is_match(trimmed) {
            counts.table_captions += 1;
        }

        // 单行 $$...$$ 或跨行的 $$ 块
        let markers = trimmed.matches("$$").count();
        if markers >= 2 && !in_formula {
            counts.formulas += markers / 2;
        } else if markers % 2 == 1 {
            if in_formula {
                counts.formulas += 1;
            }
            in_formula = !in_formula;
        }
    }

    counts
}

pub fn figure_table_statistics(document: &Document) -> FigureTableStatistics {
    let mut totals = FigureTableCounts::default();
    let chapters = document
        .sections
        .iter()
        .map(|s| {
            let counts = count_figures_and_tables(&s.body);
            totals.add(&counts);
            ChapterFigureTableStatistics {
                chapter: s.title.clone(),
                counts,
            }
        })
        .collect();

    FigureTableStatistics { totals, chapters }
}
