use crate::error::{AppResult, FileError};
use std::path::{Path, PathBuf};
use tokio::fs;

/// 转换器输出的 Markdown 文件名
pub const DOCUMENT_FILE_NAME: &str = "document.md";

/// 一篇转换完成、尚未建立章节索引的文档
#[derive(Debug, Clone)]
pub struct ConvertedDocument {
    /// 文档 ID（目录名）
    pub id: String,
    /// 文档目录，图片路径相对于此目录
    pub dir: PathBuf,
    /// Markdown 原文
    pub markup: String,
}

/// 从单个文档目录加载
pub async fn load_converted_document(dir: &Path) -> AppResult<ConvertedDocument> {
    let file_path = dir.join(DOCUMENT_FILE_NAME);
    let path_str = file_path.display().to_string();

    if !file_path.exists() {
        return Err(FileError::NotFound { path: path_str }.into());
    }

    let markup = fs::read_to_string(&file_path)
        .await
        .map_err(|e| FileError::ReadFailed {
            path: path_str,
            source: Box::new(e),
        })?;

    let id = dir
        .file_name()
        .unwrap_or_default()
        .to_string_lossy()
        .to_string();

    Ok(ConvertedDocument {
        id,
        dir: dir.to_path_buf(),
        markup,
    })
}

/// 加载输入目录下的所有文档（每个子目录一篇），按 ID 排序
pub async fn load_all_documents(folder_path: &str) -> AppResult<Vec<ConvertedDocument>> {
    let folder = PathBuf::from(folder_path);

    if !folder.exists() {
        return Err(FileError::DirectoryNotFound {
            path: folder_path.to_string(),
        }
        .into());
    }

    let mut documents = Vec::new();
    let mut entries = fs::read_dir(&folder)
        .await
        .map_err(|e| FileError::ReadFailed {
            path: folder_path.to_string(),
            source: Box::new(e),
        })?;

    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| FileError::ReadFailed {
            path: folder_path.to_string(),
            source: Box::new(e),
        })?
    {
        let path = entry.path();
        if !path.is_dir() || !path.join(DOCUMENT_FILE_NAME).exists() {
            continue;
        }

        tracing::info!(
            "正在加载: {}",
            path.file_name().unwrap_or_default().to_string_lossy()
        );

        match load_converted_document(&path).await {
            Ok(document) => {
                tracing::info!("成功加载 {} 字符", document.markup.chars().count());
                documents.push(document);
            }
            Err(e) => {
                tracing::warn!("加载文档失败 {}: {}", path.display(), e);
            }
        }
    }

    documents.sort_by(|a, b| a.id.cmp(&b.id));
    Ok(documents)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_load_all_documents_skips_folders_without_markdown() {
        let root = tempfile::tempdir().unwrap();
        let with_doc = root.path().join("thesis-b");
        let without_doc = root.path().join("empty");
        std::fs::create_dir_all(&with_doc).unwrap();
        std::fs::create_dir_all(&without_doc).unwrap();
        std::fs::write(with_doc.join(DOCUMENT_FILE_NAME), "# 第一章 绪论\n").unwrap();

        let documents = load_all_documents(&root.path().to_string_lossy())
            .await
            .unwrap();

        assert_eq!(documents.len(), 1);
        assert_eq!(documents[0].id, "thesis-b");
        assert_eq!(documents[0].markup, "# 第一章 绪论\n");
    }

    #[tokio::test]
    async fn test_load_all_documents_missing_folder() {
        let result = load_all_documents("no/such/folder").await;
        assert!(result.is_err());
    }
}
