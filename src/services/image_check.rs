//! 图片重复检查 - 业务能力层
//!
//! 收集正文中的图片引用（Markdown 与 HTML 两种写法），按文件内容的 SHA-256 判定是否为同一张图。
//! 文件不存在、是网络地址或路径越出文档目录（绝对路径、`..`）时，用规范化后的路径作为标识。

use std::collections::HashMap;
use std::path::{Component, Path};
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::models::document::Document;

/// 图片出现的位置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageLocation {
    pub chapter: String,
    pub path: String,
}

/// 被多处引用的同一张图片
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuplicateImageGroup {
    /// "sha256:<hex>" 或 "path:<规范化路径>"
    pub identity: String,
    pub locations: Vec<ImageLocation>,
}

/// 图片重复检查结果
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuplicateImageReport {
    pub total_images: usize,
    pub groups: Vec<DuplicateImageGroup>,
}

fn image_patterns() -> &'static [Regex; 2] {
    static PATTERNS: OnceLock<[Regex; 2]> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            Regex::new(r#"!\[[^\]]*\]\(\s*<?([^)\s>]+)>?(?:\s+"[^"]*")?\s*\)"#).expect("常量正则"),
            Regex::new(r#"<img\s+[^>]*src="([^"]+)""#).expect("常量正则"),
        ]
    })
}

/// 路径规范化：统一分隔符，去掉 "./" 前缀
pub fn normalize_image_path(path: &str) -> String {
    let unified = path.trim().replace('\\', "/");
    let mut rest = unified.as_str();
    while let Some(stripped) = rest.strip_prefix("./") {
        rest = stripped;
    }
    rest.to_string()
}

/// 按文档顺序收集全部图片引用
pub fn collect_images(document: &Document) -> Vec<ImageLocation> {
    let mut segments: Vec<(usize, &str, &str)> = document
        .sections
        .iter()
        .map(|s| (s.position, s.title.as_str(), s.body.as_str()))
        .chain(
            document
                .auxiliary
                .iter()
                .map(|a| (a.position, a.title.as_str(), a.body.as_str())),
        )
        .collect();
    segments.sort_by_key(|(position, _, _)| *position);

    let mut images = Vec::new();
    let front = std::iter::once(("封面", document.front_matter.as_str()));
    for (chapter, text) in front.chain(segments.into_iter().map(|(_, t, b)| (t, b))) {
        let mut found: Vec<(usize, String)> = image_patterns()
            .iter()
            .flat_map(|re| re.captures_iter(text))
            .filter_map(|c| c.get(1).map(|m| (m.start(), normalize_image_path(m.as_str()))))
            .collect();
        found.sort_by_key(|(offset, _)| *offset);
        images.extend(found.into_iter().map(|(_, path)| ImageLocation {
            chapter: chapter.to_string(),
            path,
        }));
    }

    images
}

/// 只读取文档目录内的相对路径：绝对路径与 `..` 一律不读
fn is_contained(path: &str) -> bool {
    Path::new(path)
        .components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

async fn image_identity(base_dir: &Path, path: &str) -> String {
    if path.starts_with("http://") || path.starts_with("https://") {
        return format!("path:{}", path);
    }
    if !is_contained(path) {
        debug!("图片路径越出文档目录，按路径比较: {}", path);
        return format!("path:{}", path);
    }
    match tokio::fs::read(base_dir.join(path)).await {
        Ok(bytes) => {
            let mut hasher = Sha256::new();
            hasher.update(&bytes);
            format!("sha256:{:x}", hasher.finalize())
        }
        Err(e) => {
            debug!("图片读取失败，按路径比较: {} ({})", path, e);
            format!("path:{}", path)
        }
    }
}

/// 找出被两处及以上引用的图片，分组按首次出现顺序排列
pub async fn find_duplicate_images(document: &Document, base_dir: &Path) -> DuplicateImageReport {
    let images = collect_images(document);

    let mut order: Vec<String> = Vec::new();
    let mut groups: HashMap<String, Vec<ImageLocation>> = HashMap::new();
    let mut identities: HashMap<String, String> = HashMap::new();

    for image in &images {
        let identity = match identities.get(&image.path) {
            Some(identity) => identity.clone(),
            None => {
                let identity = image_identity(base_dir, &image.path).await;
                identities.insert(image.path.clone(), identity.clone());
                identity
            }
        };
        if !groups.contains_key(&identity) {
            order.push(identity.clone());
        }
        groups.entry(identity).or_default().push(image.clone());
    }

    let groups = order
        .into_iter()
        .filter_map(|identity| {
            let locations = groups.remove(&identity)?;
            (locations.len() >= 2).then_some(DuplicateImageGroup { identity, locations })
        })
        .collect();

    DuplicateImageReport {
        total_images: images.len(),
        groups,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::section_index::SectionIndex;

    const MARKUP: &str = "封面 ![logo](images/logo.png)\n\
# 第一章 绪论\n![图1-1](./images/a.png)\n<img src=\"images/missing.png\" width=\"50%\">\n\
# 第二章 设计\n![图2-1](images/b.png \"架构\")\n![](images\\missing.png)\n\
# 致谢\n![](images/c.png)\n";

    #[test]
    fn test_collect_images_in_document_order() {
        let document = SectionIndex::default().build(MARKUP, "doc");
        let images = collect_images(&document);
        let paths: Vec<&str> = images.iter().map(|i| i.path.as_str()).collect();

        assert_eq!(
            paths,
            vec![
                "images/logo.png",
                "images/a.png",
                "images/missing.png",
                "images/b.png",
                "images/missing.png",
                "images/c.png",
            ]
        );
        assert_eq!(images[0].chapter, "封面");
        assert_eq!(images[3].chapter, "第二章 设计");
        assert_eq!(images[5].chapter, "致谢");
    }

    #[tokio::test]
    async fn test_duplicates_by_content_and_by_path() {
        let dir = tempfile::tempdir().unwrap();
        let images = dir.path().join("images");
        std::fs::create_dir_all(&images).unwrap();
        std::fs::write(images.join("logo.png"), b"logo").unwrap();
        std::fs::write(images.join("a.png"), b"same-bytes").unwrap();
        std::fs::write(images.join("b.png"), b"same-bytes").unwrap();
        std::fs::write(images.join("c.png"), b"other").unwrap();

        let document = SectionIndex::default().build(MARKUP, "doc");
        let report = find_duplicate_images(&document, dir.path()).await;

        assert_eq!(report.total_images, 6);
        assert_eq!(report.groups.len(), 2);

        assert!(report.groups[0].identity.starts_with("sha256:"));
        let chapters: Vec<&str> = report.groups[0]
            .locations
            .iter()
            .map(|l| l.chapter.as_str())
            .collect();
        assert_eq!(chapters, vec!["第一章 绪论", "第二章 设计"]);

        assert_eq!(report.groups[1].identity, "path:images/missing.png");
        assert_eq!(report.groups[1].locations.len(), 2);
    }

    #[tokio::test]
    async fn test_paths_outside_document_dir_are_not_read() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("doc");
        std::fs::create_dir_all(&base).unwrap();
        std::fs::write(base.join("inside.png"), b"inside").unwrap();
        let outside = dir.path().join("outside.png");
        std::fs::write(&outside, b"outside").unwrap();

        assert!(image_identity(&base, "inside.png").await.starts_with("sha256:"));
        assert_eq!(
            image_identity(&base, "../outside.png").await,
            "path:../outside.png"
        );
        let absolute = outside.display().to_string();
        assert_eq!(
            image_identity(&base, &absolute).await,
            format!("path:{}", absolute)
        );
    }

    #[tokio::test]
    async fn test_no_images() {
        let document = SectionIndex::default().build("# 第一章\n纯文本\n", "doc");
        let report = find_duplicate_images(&document, Path::new("/nonexistent")).await;
        assert_eq!(report, DuplicateImageReport::default());
    }
}
