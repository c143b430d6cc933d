//! 任务状态记录
//!
//! 每个 (文档 ID, 任务名) 对应一条 `JobRecord`，只由任务编排器修改。

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// 文档转换阶段完成后的基础进度
pub const PROGRESS_BASE: f64 = 0.6;
/// 评估任务占据的进度区间
pub const PROGRESS_SPAN: f64 = 0.4;

/// 独立评估任务
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobName {
    IssueScan,
    DimensionScoring,
    ReferenceCheck,
    DuplicateImageCheck,
    MetadataExtraction,
    TextStatistics,
    FigureTableStatistics,
    ReferenceStatistics,
}

impl JobName {
    /// 全部任务，按执行顺序
    pub const ALL: [JobName; 8] = [
        JobName::IssueScan,
        JobName::DimensionScoring,
        JobName::ReferenceCheck,
        JobName::DuplicateImageCheck,
        JobName::MetadataExtraction,
        JobName::TextStatistics,
        JobName::FigureTableStatistics,
        JobName::ReferenceStatistics,
    ];

    /// 存储用的标识
    pub fn as_str(self) -> &'static str {
        match self {
            JobName::IssueScan => "issue_scan",
            JobName::DimensionScoring => "dimension_scoring",
            JobName::ReferenceCheck => "reference_check",
            JobName::DuplicateImageCheck => "duplicate_image_check",
            JobName::MetadataExtraction => "metadata_extraction",
            JobName::TextStatistics => "text_statistics",
            JobName::FigureTableStatistics => "figure_table_statistics",
            JobName::ReferenceStatistics => "reference_statistics",
        }
    }

    /// 日志显示名称
    pub fn label(self) -> &'static str {
        match self {
            JobName::IssueScan => "问题扫描",
            JobName::DimensionScoring => "维度评分",
            JobName::ReferenceCheck => "参考文献格式检查",
            JobName::DuplicateImageCheck => "图片重复检查",
            JobName::MetadataExtraction => "元信息提取",
            JobName::TextStatistics => "字数统计",
            JobName::FigureTableStatistics => "图表统计",
            JobName::ReferenceStatistics => "参考文献统计",
        }
    }
}

impl std::fmt::Display for JobName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 任务状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
}

/// 单个任务的状态记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    pub job_name: JobName,
    pub status: JobStatus,
    #[serde(default)]
    pub result: Option<JsonValue>,
    #[serde(default)]
    pub error: Option<String>,
    pub last_progress: f64,
    pub last_message: String,
    pub updated_at: DateTime<Local>,
}

impl JobRecord {
    /// 尚未执行的任务
    pub fn pending(job_name: JobName) -> Self {
        Self {
            job_name,
            status: JobStatus::Pending,
            result: None,
            error: None,
            last_progress: PROGRESS_BASE,
            last_message: format!("{} 等待执行", job_name.label()),
            updated_at: Local::now(),
        }
    }

    /// 标记为执行中（保留上次的结果与错误，便于排查）
    pub fn running(mut self, progress: f64) -> Self {
        self.status = JobStatus::Running;
        self.last_progress = progress;
        self.last_message = format!("{} 执行中", self.job_name.label());
        self.updated_at = Local::now();
        self
    }

    /// 标记为成功
    pub fn succeeded(mut self, result: JsonValue) -> Self {
        self.status = JobStatus::Succeeded;
        self.result = Some(result);
        self.error = None;
        self.last_message = format!("{} 已完成", self.job_name.label());
        self.updated_at = Local::now();
        self
    }

    /// 标记为失败
    pub fn failed(mut self, error: impl Into<String>) -> Self {
        self.status = JobStatus::Failed;
        self.result = None;
        self.error = Some(error.into());
        self.last_message = format!("{} 失败", self.job_name.label());
        self.updated_at = Local::now();
        self
    }

    pub fn is_succeeded(&self) -> bool {
        self.status == JobStatus::Succeeded
    }
}

/// 单篇文档的整体进度
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationProgress {
    pub document_id: String,
    pub progress: f64,
    pub message: String,
    pub jobs_succeeded: usize,
    pub total_jobs: usize,
    pub completed: bool,
    pub updated_at: DateTime<Local>,
}

impl EvaluationProgress {
    /// 由成功任务数计算整体进度：`0.6 + 0.4 * 成功数 / 总数`
    pub fn compute(
        document_id: impl Into<String>,
        jobs_succeeded: usize,
        total_jobs: usize,
        message: impl Into<String>,
    ) -> Self {
        Self {
            document_id: document_id.into(),
            progress: progress_fraction(jobs_succeeded, total_jobs),
            message: message.into(),
            jobs_succeeded,
            total_jobs,
            completed: total_jobs > 0 && jobs_succeeded == total_jobs,
            updated_at: Local::now(),
        }
    }
}

/// 整体进度比例
pub fn progress_fraction(jobs_succeeded: usize, total_jobs: usize) -> f64 {
    if total_jobs == 0 {
        return PROGRESS_BASE;
    }
    PROGRESS_BASE + PROGRESS_SPAN * (jobs_succeeded as f64 / total_jobs as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_fraction() {
        assert!((progress_fraction(0, 8) - 0.6).abs() < 1e-9);
        assert!((progress_fraction(4, 8) - 0.8).abs() < 1e-9);
        assert!((progress_fraction(8, 8) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_completed_requires_all_jobs() {
        assert!(!EvaluationProgress::compute("doc", 7, 8, "").completed);
        assert!(EvaluationProgress::compute("doc", 8, 8, "").completed);
    }

    #[test]
    fn test_job_name_serializes_as_snake_case() {
        let json = serde_json::to_string(&JobName::DuplicateImageCheck).unwrap();
        assert_eq!(json, "\"duplicate_image_check\"");
        assert_eq!(JobName::DuplicateImageCheck.as_str(), "duplicate_image_check");
    }

    #[test]
    fn test_failed_clears_previous_result() {
        let record = JobRecord::pending(JobName::IssueScan)
            .succeeded(serde_json::json!([1]))
            .failed("LLM 超时");
        assert_eq!(record.status, JobStatus::Failed);
        assert!(record.result.is_none());
        assert_eq!(record.error.as_deref(), Some("LLM 超时"));
    }
}
