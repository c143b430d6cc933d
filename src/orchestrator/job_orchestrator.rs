//! 任务编排器 - 编排层
//!
//! ## 职责
//!
//! 对单篇文档依次执行全部评估任务，并把每个任务的状态写入任务存储。
//!
//! - 已成功的任务直接跳过，重新运行即可续跑
//! - 每个任务写两次存储：开始前写入 `Running` 记录（`put`），结束后把任务记录
//!   与整体进度一次写入（`commit`）。两次写入之间崩溃会留下 `Running` 记录，
//!   续跑时该任务不算成功，会重新执行
//! - 单个任务失败只记录在该任务上，后续任务照常执行

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use serde_json::Value as JsonValue;
use tracing::{error, info};

use crate::config::Config;
use crate::error::AppResult;
use crate::infrastructure::{JobStore, ModelInvoker};
use crate::models::dimension::DimensionSpec;
use crate::models::document::Document;
use crate::models::job::{progress_fraction, EvaluationProgress, JobName, JobRecord};
use crate::orchestrator::dimension_scheduler::DimensionScheduler;
use crate::orchestrator::issue_aggregator::IssueAggregator;
use crate::services::{image_check, prompt_builder, reference_check, statistics, ResponseParser};

/// 任务编排器
pub struct JobOrchestrator {
    store: Arc<dyn JobStore>,
    invoker: Arc<dyn ModelInvoker>,
    scheduler: DimensionScheduler,
    aggregator: IssueAggregator,
    specs: Vec<DimensionSpec>,
    parser: ResponseParser,
    metadata_model_id: String,
}

impl JobOrchestrator {
    pub fn new(
        store: Arc<dyn JobStore>,
        invoker: Arc<dyn ModelInvoker>,
        specs: Vec<DimensionSpec>,
        config: &Config,
    ) -> Self {
        Self {
            scheduler: DimensionScheduler::new(invoker.clone(), config),
            aggregator: IssueAggregator::new(invoker.clone(), config),
            store,
            invoker,
            specs,
            parser: ResponseParser::new(),
            metadata_model_id: config.llm_model_name.clone(),
        }
    }

    /// 执行（或续跑）一篇文档的全部任务，返回最新进度
    ///
    /// `base_dir` 为文档所在目录，图片路径相对于它解析。
    pub async fn run(&self, document: Arc<Document>, base_dir: &Path) -> AppResult<EvaluationProgress> {
        let document_id = document.id.clone();
        let total = JobName::ALL.len();

        let mut records: HashMap<JobName, JobRecord> = self
            .store
            .records(&document_id)
            .await?
            .into_iter()
            .map(|r| (r.job_name, r))
            .collect();
        let mut succeeded = records.values().filter(|r| r.is_succeeded()).count();

        if succeeded > 0 {
            info!(
                "[文档 {}] ♻️ 续跑: 已完成 {}/{} 个任务",
                document_id, succeeded, total
            );
        }

        let mut progress = EvaluationProgress::compute(&document_id, succeeded, total, "等待执行");

        for job in JobName::ALL {
            let previous = records.remove(&job);
            if previous.as_ref().is_some_and(JobRecord::is_succeeded) {
                info!("[文档 {}] ⏭️ 跳过已完成任务: {}", document_id, job.label());
                continue;
            }

            let running = previous
                .unwrap_or_else(|| JobRecord::pending(job))
                .running(progress_fraction(succeeded, total));
            self.store.put(&document_id, &running).await?;
            info!("[文档 {}] ▶️ 开始任务: {}", document_id, job.label());

            let record = match self.run_job(job, &document, base_dir).await {
                Ok(result) => {
                    succeeded += 1;
                    info!("[文档 {}] ✓ 任务完成: {}", document_id, job.label());
                    running.succeeded(result)
                }
                Err(e) => {
                    error!("[文档 {}] ❌ 任务失败: {}: {}", document_id, job.label(), e);
                    running.failed(e.to_string())
                }
            };

            progress = EvaluationProgress::compute(
                &document_id,
                succeeded,
                total,
                record.last_message.clone(),
            );
            self.store.commit(&document_id, &record, &progress).await?;
        }

        info!(
            "[文档 {}] 📈 进度 {:.0}% ({}/{})",
            document_id,
            progress.progress * 100.0,
            progress.jobs_succeeded,
            progress.total_jobs
        );
        Ok(progress)
    }

    async fn run_job(&self, job: JobName, document: &Arc<Document>, base_dir: &Path) -> AppResult<JsonValue> {
        let value = match job {
            JobName::IssueScan => {
                let issues = self.aggregator.scan(document.clone()).await?;
                serde_json::to_value(issues)?
            }
            JobName::DimensionScoring => {
                let report = self.scheduler.evaluate(document.clone(), &self.specs).await?;
                serde_json::to_value(report)?
            }
            JobName::ReferenceCheck => {
                serde_json::to_value(reference_check::check_references(&document.references))?
            }
            JobName::DuplicateImageCheck => {
                let report = image_check::find_duplicate_images(document, base_dir).await;
                serde_json::to_value(report)?
            }
            JobName::MetadataExtraction => {
                let prompt = prompt_builder::metadata_prompt(document);
                let raw = self.invoker.invoke(&prompt, &self.metadata_model_id).await?;
                serde_json::to_value(self.parser.parse_metadata(&raw)?)?
            }
            JobName::TextStatistics => serde_json::to_value(statistics::text_statistics(document))?,
            JobName::FigureTableStatistics => {
                serde_json::to_value(statistics::figure_table_statistics(document))?
            }
            JobName::ReferenceStatistics => {
                serde_json::to_value(reference_check::reference_statistics(&document.references))?
            }
        };
        Ok(value)
    }
}
