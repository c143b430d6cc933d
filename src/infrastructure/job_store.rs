//! 任务状态存储 - 基础设施层
//!
//! 唯一的共享可变状态。以文档 ID 为单位读-改-写，后写者生效；
//! 同一文档不支持多个编排器并发运行，由调用方保证串行。

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::StoreError;
use crate::models::job::{EvaluationProgress, JobName, JobRecord};

/// 任务状态存储接口，键为 (文档 ID, 任务名)
#[async_trait]
pub trait JobStore: Send + Sync {
    /// 读取单个任务记录
    async fn get(&self, document_id: &str, job: JobName) -> Result<Option<JobRecord>, StoreError>;

    /// 读取文档的全部任务记录
    async fn records(&self, document_id: &str) -> Result<Vec<JobRecord>, StoreError>;

    /// 写入单个任务记录
    async fn put(&self, document_id: &str, record: &JobRecord) -> Result<(), StoreError>;

    /// 同时写入任务记录与整体进度（一次写入）
    async fn commit(
        &self,
        document_id: &str,
        record: &JobRecord,
        progress: &EvaluationProgress,
    ) -> Result<(), StoreError>;

    /// 读取整体进度
    async fn progress(&self, document_id: &str) -> Result<Option<EvaluationProgress>, StoreError>;
}

/// 单篇文档的持久化状态
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct DocumentState {
    #[serde(default)]
    records: BTreeMap<JobName, JobRecord>,
    #[serde(default)]
    progress: Option<EvaluationProgress>,
}

// ========== 内存实现 ==========

/// 内存存储（测试与单次运行使用）
#[derive(Default)]
pub struct MemoryJobStore {
    documents: Mutex<HashMap<String, DocumentState>>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn get(&self, document_id: &str, job: JobName) -> Result<Option<JobRecord>, StoreError> {
        let documents = self.documents.lock().await;
        Ok(documents
            .get(document_id)
            .and_then(|state| state.records.get(&job).cloned()))
    }

    async fn records(&self, document_id: &str) -> Result<Vec<JobRecord>, StoreError> {
        let documents = self.documents.lock().await;
        Ok(documents
            .get(document_id)
            .map(|state| state.records.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn put(&self, document_id: &str, record: &JobRecord) -> Result<(), StoreError> {
        let mut documents = self.documents.lock().await;
        documents
            .entry(document_id.to_string())
            .or_default()
            .records
            .insert(record.job_name, record.clone());
        Ok(())
    }

    async fn commit(
        &self,
        document_id: &str,
        record: &JobRecord,
        progress: &EvaluationProgress,
    ) -> Result<(), StoreError> {
        let mut documents = self.documents.lock().await;
        let state = documents.entry(document_id.to_string()).or_default();
        state.records.insert(record.job_name, record.clone());
        state.progress = Some(progress.clone());
        Ok(())
    }

    async fn progress(&self, document_id: &str) -> Result<Option<EvaluationProgress>, StoreError> {
        let documents = self.documents.lock().await;
        Ok(documents
            .get(document_id)
            .and_then(|state| state.progress.clone()))
    }
}

// ========== 文件实现 ==========

/// 文件存储：每篇文档一个 JSON 文件，先写临时文件再重命名
pub struct FileJobStore {
    dir: PathBuf,
    lock: Mutex<()>,
}

impl FileJobStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            lock: Mutex::new(()),
        }
    }

    /// 文档 ID 到文件名的单射编码：字母数字与 `-` 原样保留，
    /// 其余字符（包括 `_` 本身）写成 `_<十六进制码点>_`
    fn path_for(&self, document_id: &str) -> PathBuf {
        let mut file_name = String::with_capacity(document_id.len());
        for c in document_id.chars() {
            if c.is_alphanumeric() || c == '-' {
                file_name.push(c);
            } else {
                file_name.push_str(&format!("_{:x}_", c as u32));
            }
        }
        self.dir.join(format!("{}.json", file_name))
    }

    async fn load(&self, document_id: &str) -> Result<DocumentState, StoreError> {
        let path = self.path_for(document_id);
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(DocumentState::default());
            }
            Err(e) => {
                return Err(StoreError::ReadFailed {
                    path: path.display().to_string(),
                    source: e,
                });
            }
        };
        serde_json::from_str(&content).map_err(|e| StoreError::Serialization {
            document_id: document_id.to_string(),
            source: e,
        })
    }

    async fn save(&self, document_id: &str, state: &DocumentState) -> Result<(), StoreError> {
        let path = self.path_for(document_id);
        let write_failed = |source: std::io::Error| StoreError::WriteFailed {
            path: path.display().to_string(),
            source,
        };

        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(write_failed)?;

        let content =
            serde_json::to_string_pretty(state).map_err(|e| StoreError::Serialization {
                document_id: document_id.to_string(),
                source: e,
            })?;

        let tmp_path = path.with_extension("json.tmp");
        tokio::fs::write(&tmp_path, content)
            .await
            .map_err(write_failed)?;
        tokio::fs::rename(&tmp_path, &path)
            .await
            .map_err(write_failed)?;

        debug!("任务状态已写入: {}", path.display());
        Ok(())
    }
}

#[async_trait]
impl JobStore for FileJobStore {
    async fn get(&self, document_id: &str, job: JobName) -> Result<Option<JobRecord>, StoreError> {
        let _guard = self.lock.lock().await;
        Ok(self.load(document_id).await?.records.remove(&job))
    }

    async fn records(&self, document_id: &str) -> Result<Vec<JobRecord>, StoreError> {
        let _guard = self.lock.lock().await;
        Ok(self.load(document_id).await?.records.into_values().collect())
    }

    async fn put(&self, document_id: &str, record: &JobRecord) -> Result<(), StoreError> {
        let _guard = self.lock.lock().await;
        let mut state = self.load(document_id).await?;
        state.records.insert(record.job_name, record.clone());
        self.save(document_id, &state).await
    }

    async fn commit(
        &self,
        document_id: &str,
        record: &JobRecord,
        progress: &EvaluationProgress,
    ) -> Result<(), StoreError> {
        let _guard = self.lock.lock().await;
        let mut state = self.load(document_id).await?;
        state.records.insert(record.job_name, record.clone());
        state.progress = Some(progress.clone());
        self.save(document_id, &state).await
    }

    async fn progress(&self, document_id: &str) -> Result<Option<EvaluationProgress>, StoreError> {
        let _guard = self.lock.lock().await;
        Ok(self.load(document_id).await?.progress)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::job::JobStatus;

    #[tokio::test]
    async fn test_file_store_round_trip_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileJobStore::new(dir.path());

        let record = JobRecord::pending(JobName::TextStatistics)
            .succeeded(serde_json::json!({"total_chars": 42}));
        let progress = EvaluationProgress::compute("thesis/01", 1, 8, "字数统计 已完成");
        store.commit("thesis/01", &record, &progress).await.unwrap();

        // 新实例模拟进程重启
        let reopened = FileJobStore::new(dir.path());
        let loaded = reopened
            .get("thesis/01", JobName::TextStatistics)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(loaded.status, JobStatus::Succeeded);
        assert_eq!(loaded.result, Some(serde_json::json!({"total_chars": 42})));

        let loaded_progress = reopened.progress("thesis/01").await.unwrap().unwrap();
        assert_eq!(loaded_progress.jobs_succeeded, 1);
        assert!(dir.path().join("thesis_2f_01.json").exists());
    }

    #[tokio::test]
    async fn test_similar_ids_use_distinct_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileJobStore::new(dir.path());

        let dotted = JobRecord::pending(JobName::IssueScan).failed("超时");
        let underscored = JobRecord::pending(JobName::IssueScan).succeeded(serde_json::json!([]));
        store.put("thesis.v2", &dotted).await.unwrap();
        store.put("thesis_v2", &underscored).await.unwrap();

        let dotted_loaded = store.get("thesis.v2", JobName::IssueScan).await.unwrap().unwrap();
        assert_eq!(dotted_loaded.status, JobStatus::Failed);
        let underscored_loaded = store.get("thesis_v2", JobName::IssueScan).await.unwrap().unwrap();
        assert_eq!(underscored_loaded.status, JobStatus::Succeeded);

        assert!(dir.path().join("thesis_2e_v2.json").exists());
        assert!(dir.path().join("thesis_5f_v2.json").exists());
    }

    #[tokio::test]
    async fn test_missing_document_has_no_records() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileJobStore::new(dir.path());
        assert!(store.records("unknown").await.unwrap().is_empty());
        assert!(store.progress("unknown").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_memory_store_put_is_last_writer_wins() {
        let store = MemoryJobStore::new();
        let first = JobRecord::pending(JobName::IssueScan).failed("超时");
        let second = JobRecord::pending(JobName::IssueScan).succeeded(serde_json::json!([]));
        store.put("doc", &first).await.unwrap();
        store.put("doc", &second).await.unwrap();

        let records = store.records("doc").await.unwrap();
        assert_eq!(records.len(), 1);
        assert!(records[0].is_succeeded());
    }
}
