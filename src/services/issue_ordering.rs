//! 问题排序 - 业务能力层
//!
//! 汇总后的问题按章节顺序排列并重新编号：
//! 中文摘要 → 英文摘要 → 按章号排列的正文章节 → 无法识别的章节（按首次出现顺序）。
//! 同一章内按小节编号排序（1.2 在 1.10 之前），没有编号的问题保持原相对顺序排在最后。

use phf::phf_map;

use crate::models::issue::Issue;
use crate::services::section_index::normalize_title;

/// 中文数字
static CHINESE_DIGITS: phf::Map<char, u32> = phf_map! {
    '零' => 0,
    '〇' => 0,
    '一' => 1,
    '二' => 2,
    '两' => 2,
    '三' => 3,
    '四' => 4,
    '五' => 5,
    '六' => 6,
    '七' => 7,
    '八' => 8,
    '九' => 9,
};

/// 中文数位
static CHINESE_UNITS: phf::Map<char, u32> = phf_map! {
    '十' => 10,
    '百' => 100,
};

/// 解析中文或阿拉伯数字（"十二" → 12，"二十三" → 23，"7" → 7）
pub fn parse_numeral(text: &str) -> Option<u32> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    if text.chars().all(|c| c.is_ascii_digit()) {
        return text.parse().ok();
    }

    let mut total = 0u32;
    let mut current = 0u32;
    for c in text.chars() {
        if let Some(digit) = CHINESE_DIGITS.get(&c) {
            current = *digit;
        } else if let Some(unit) = CHINESE_UNITS.get(&c) {
            // "十二" 省略了前面的 "一"
            let multiplier = if current == 0 { 1 } else { current };
            total += multiplier * unit;
            current = 0;
        } else {
            return None;
        }
    }
    Some(total + current)
}

/// 空白折叠为单个空格并去掉首尾空白
pub fn normalize_chapter(chapter: &str) -> String {
    chapter.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// 章节排序键：(类别, 章号, 首次出现序号)
type ChapterRank = (u8, u32, usize);

/// 从 "第X章" 或 "3 系统设计" 形式的标题中取章号
fn chapter_number(chapter: &str) -> Option<u32> {
    if let Some(rest) = chapter.strip_prefix('第') {
        let (numeral, _) = rest.split_once('章')?;
        return parse_numeral(numeral);
    }

    let digits: String = chapter.chars().take_while(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return None;
    }
    // "1.2 xxx" 是小节而不是章
    match chapter[digits.len()..].chars().next() {
        None => digits.parse().ok(),
        Some(c) if c.is_whitespace() || c == '、' => digits.parse().ok(),
        Some(_) => None,
    }
}

fn chapter_rank(chapter: &str, first_seen: usize) -> ChapterRank {
    let key = normalize_title(chapter);
    if key.starts_with("英文摘要") || key.starts_with("abstract") {
        return (1, 0, 0);
    }
    if key.starts_with("中文摘要") || key.starts_with("摘要") {
        return (0, 0, 0);
    }
    match chapter_number(chapter) {
        // 同章号不同写法（"第一章" 与 "第一章 绪论"）各自成组，按首次出现先后
        Some(number) => (2, number, first_seen),
        None => (3, 0, first_seen),
    }
}

/// 小节编号前缀（"1.10 xxx" → [1, 10]）
fn subsection_prefix(sub_chapter: &str) -> Option<Vec<u32>> {
    let prefix: String = sub_chapter
        .trim()
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    let parts: Vec<u32> = prefix
        .split('.')
        .filter(|p| !p.is_empty())
        .map(|p| p.parse())
        .collect::<Result<_, _>>()
        .ok()?;
    if parts.is_empty() {
        None
    } else {
        Some(parts)
    }
}

/// 按章节顺序排列问题并从 1 开始编号，重复调用结果不变
pub fn order_issues(issues: Vec<Issue>) -> Vec<Issue> {
    let mut first_seen: Vec<String> = Vec::new();

    let mut keyed: Vec<(ChapterRank, (u8, Vec<u32>), Issue)> = issues
        .into_iter()
        .map(|mut issue| {
            issue.chapter = normalize_chapter(&issue.chapter);
            let seen = match first_seen.iter().position(|c| *c == issue.chapter) {
                Some(i) => i,
                None => {
                    first_seen.push(issue.chapter.clone());
                    first_seen.len() - 1
                }
            };
            let rank = chapter_rank(&issue.chapter, seen);
            let sub_key = match subsection_prefix(&issue.sub_chapter) {
                Some(parts) => (0, parts),
                None => (1, Vec::new()),
            };
            (rank, sub_key, issue)
        })
        .collect();

    // 稳定排序，同键问题保持原相对顺序
    keyed.sort_by(|a, b| (&a.0, &a.1).cmp(&(&b.0, &b.1)));

    keyed
        .into_iter()
        .enumerate()
        .map(|(i, (_, _, mut issue))| {
            issue.id = Some(i as u32 + 1);
            issue
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn issue(chapter: &str, sub_chapter: &str, detail: &str) -> Issue {
        Issue {
            issue_type: "表述".to_string(),
            severity: "中".to_string(),
            chapter: chapter.to_string(),
            sub_chapter: sub_chapter.to_string(),
            original_text: String::new(),
            detail: detail.to_string(),
            suggestion: String::new(),
            id: None,
        }
    }

    fn chapters(issues: &[Issue]) -> Vec<&str> {
        issues.iter().map(|i| i.chapter.as_str()).collect()
    }

    #[test]
    fn test_parse_numeral() {
        assert_eq!(parse_numeral("一"), Some(1));
        assert_eq!(parse_numeral("十"), Some(10));
        assert_eq!(parse_numeral("十二"), Some(12));
        assert_eq!(parse_numeral("二十三"), Some(23));
        assert_eq!(parse_numeral("一百零五"), Some(105));
        assert_eq!(parse_numeral("12"), Some(12));
        assert_eq!(parse_numeral("绪论"), None);
    }

    #[test]
    fn test_chapters_follow_document_order() {
        let input = ["第十章", "第二章", "摘要", "Abstract", "第一章"]
            .iter()
            .map(|c| issue(c, "", "问题"))
            .collect();
        let ordered = order_issues(input);

        assert_eq!(chapters(&ordered), vec!["摘要", "Abstract", "第一章", "第二章", "第十章"]);
        let ids: Vec<u32> = ordered.iter().filter_map(|i| i.id).collect();
        assert_eq!(ids, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_subsections_sort_numerically() {
        let input = vec![
            issue("第一章 绪论", "", "无编号A"),
            issue("第一章 绪论", "1.10 小结", "c"),
            issue("第一章 绪论", "1.2 意义", "b"),
            issue("第一章 绪论", "", "无编号B"),
            issue("第一章 绪论", "1.1 背景", "a"),
        ];
        let ordered = order_issues(input);
        let details: Vec<&str> = ordered.iter().map(|i| i.detail.as_str()).collect();
        assert_eq!(details, vec!["a", "b", "c", "无编号A", "无编号B"]);
    }

    #[test]
    fn test_unrecognized_chapters_keep_first_appearance() {
        let input = vec![
            issue("结论", "", "1"),
            issue("第3章 实验", "", "2"),
            issue("作者简介", "", "3"),
            issue("结论", "", "4"),
        ];
        let ordered = order_issues(input);
        assert_eq!(chapters(&ordered), vec!["第3章 实验", "结论", "结论", "作者简介"]);
    }

    #[test]
    fn test_same_number_different_names_stay_grouped() {
        let ordered = order_issues(vec![
            issue("第一章 绪论", "1.1 背景", "a"),
            issue("第一章", "1.2 意义", "b"),
            issue("第一章 绪论", "1.3 内容", "c"),
            issue("第二章 设计", "", "d"),
        ]);

        assert_eq!(
            chapters(&ordered),
            vec!["第一章 绪论", "第一章 绪论", "第一章", "第二章 设计"]
        );
        let details: Vec<&str> = ordered.iter().map(|i| i.detail.as_str()).collect();
        assert_eq!(details, vec!["a", "c", "b", "d"]);
    }

    #[test]
    fn test_whitespace_is_normalized() {
        let input = vec![issue("  第二章   系统 设计 ", "", "x"), issue("第一章", "", "y")];
        let ordered = order_issues(input);
        assert_eq!(chapters(&ordered), vec!["第一章", "第二章 系统 设计"]);
    }

    #[test]
    fn test_ordering_is_idempotent() {
        let input = vec![
            issue("附录", "", "1"),
            issue("第二章", "2.1 方法", "2"),
            issue("英文摘要", "", "3"),
            issue("第二章", "", "4"),
            issue("中文摘要", "", "5"),
        ];
        let once = order_issues(input);
        let twice = order_issues(once.clone());
        assert_eq!(once, twice);
    }
}
