//! 参考文献检查与统计 - 业务能力层
//!
//! 按 GB/T 7714 的表面规则逐条检查著录格式，并统计文献类型、外文比例与近五年占比。
//! 全部在本地完成，不调用 LLM。

use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// 英文条目中不应出现的全角标点
const FULL_WIDTH_PUNCTUATION: [char; 9] = ['，', '。', '：', '；', '（', '）', '［', '］', '“'];

struct Patterns {
    sequence: Regex,
    type_code: Regex,
    year: Regex,
}

fn patterns() -> &'static Patterns {
    static PATTERNS: OnceLock<Patterns> = OnceLock::new();
    PATTERNS.get_or_init(|| Patterns {
        sequence: Regex::new(r"^\s*(?:[\[［]\s*\d+\s*[\]］]|\d{1,3}(?:\.\s|、))").expect("常量正则"),
        type_code: Regex::new(r"[\[［]\s*([A-Z]{1,2}(?:/OL)?)\s*[\]］]").expect("常量正则"),
        year: Regex::new(r"(?:^|[^\d])((?:19|20)\d{2})(?:[^\d]|$)").expect("常量正则"),
    })
}

fn has_cjk(text: &str) -> bool {
    text.chars().any(|c| ('\u{4e00}'..='\u{9fff}').contains(&c))
}

/// 把参考文献正文切分成条目
///
/// 以序号开头的行开始新条目；没有序号的行在上一条已经以句点结束时也开始新条目，
/// 否则视为上一条的续行。
pub fn split_entries(references: &str) -> Vec<String> {
    let p = patterns();
    let mut entries: Vec<String> = Vec::new();

    for line in references.lines().map(str::trim).filter(|l| !l.is_empty()) {
        let starts_new = p.sequence.is_match(line)
            || entries
                .last()
                .map_or(true, |last| last.ends_with('.') || last.ends_with('。'));
        match entries.last_mut() {
            Some(last) if !starts_new => {
                if !has_cjk(line) {
                    last.push(' ');
                }
                last.push_str(line);
            }
            _ => entries.push(line.to_string()),
        }
    }

    entries
}

/// 条目中的文献类型标识（"J"、"M"、"EB/OL" ……）
pub fn type_code(entry: &str) -> Option<String> {
    patterns()
        .type_code
        .captures(entry)
        .map(|c| c[1].to_string())
}

/// 条目中的出版年份（取第一个四位年份）
pub fn entry_year(entry: &str) -> Option<u32> {
    patterns()
        .year
        .captures(entry)
        .and_then(|c| c[1].parse().ok())
}

/// 单条参考文献的检查结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceFinding {
    /// 条目序号（从 1 开始，按出现顺序）
    pub index: usize,
    pub entry: String,
    pub problems: Vec<String>,
}

/// 参考文献格式检查报告
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceCheckReport {
    pub total_entries: usize,
    /// 只包含存在问题的条目
    pub findings: Vec<ReferenceFinding>,
}

fn check_entry(entry: &str) -> Vec<String> {
    let p = patterns();
    let mut problems = Vec::new();

    if !p.sequence.is_match(entry) {
        problems.push("缺少序号".to_string());
    }
    if type_code(entry).is_none() {
        problems.push("缺少文献类型标识（如 [J]、[M]）".to_string());
    }
    if entry_year(entry).is_none() {
        problems.push("缺少出版年份".to_string());
    }
    if entry.ends_with('。') {
        problems.push("结尾应使用英文句点".to_string());
    } else if !entry.ends_with('.') {
        problems.push("缺少结尾句点".to_string());
    }
    if !has_cjk(entry) {
        let found: String = entry
            .chars()
            .filter(|c| FULL_WIDTH_PUNCTUATION.contains(c))
            .collect();
        if !found.is_empty() {
            problems.push(format!("英文文献中出现全角标点：{}", found));
        }
    }

    problems
}

/// 检查全部条目
pub fn check_references(references: &str) -> ReferenceCheckReport {
    let entries = split_entries(references);
    let findings = entries
        .iter()
        .enumerate()
        .filter_map(|(i, entry)| {
            let problems = check_entry(entry);
            (!problems.is_empty()).then(|| ReferenceFinding {
                index: i + 1,
                entry: entry.clone(),
                problems,
            })
        })
        .collect();

    ReferenceCheckReport {
        total_entries: entries.len(),
        findings,
    }
}

/// 参考文献统计
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReferenceStatistics {
    pub total_entries: usize,
    /// 各文献类型数量，无类型标识的条目计入 "unknown"
    pub by_type: BTreeMap<String, usize>,
    /// 外文（不含汉字）条目占比
    pub foreign_ratio: f64,
    /// 引用的最新年份
    pub newest_year: Option<u32>,
    /// 最新年份往前五年内（含）的条目占比
    pub recent_ratio: f64,
}

fn ratio(part: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        (part as f64 / total as f64 * 100.0).round() / 100.0
    }
}

/// 统计参考文献
pub fn reference_statistics(references: &str) -> ReferenceStatistics {
    let entries = split_entries(references);
    let total = entries.len();

    let mut by_type = BTreeMap::new();
    for entry in &entries {
        let code = type_code(entry).unwrap_or_else(|| "unknown".to_string());
        *by_type.entry(code).or_insert(0) += 1;
    }

    let foreign = entries.iter().filter(|e| !has_cjk(e)).count();
    let years: Vec<u32> = entries.iter().filter_map(|e| entry_year(e)).collect();
    let newest_year = years.iter().copied().max();
    let recent = match newest_year {
        Some(newest) => years.iter().filter(|y| **y + 4 >= newest).count(),
        None => 0,
    };

    ReferenceStatistics {
        total_entries: total,
        by_type,
        foreign_ratio: ratio(foreign, total),
        newest_year,
        recent_ratio: ratio(recent, total),
    }
}
