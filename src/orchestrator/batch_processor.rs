//! 批量论文处理器 - 编排层
//!
//! ## 职责
//!
//! 本模块是整个应用的入口，负责批量论文的评估和资源管理。
//!
//! ## 核心功能
//!
//! 1. **应用初始化**：启动日志、创建模型调用器与任务存储、加载维度配置
//! 2. **批量加载**：扫描转换输出目录，加载所有待评估的论文
//! 3. **并发控制**：使用 Semaphore 限制同时评估的论文数量
//! 4. **分批处理**：将论文分批次处理，每批完成后再开始下一批
//! 5. **全局统计**：汇总所有论文的完成情况
//!
//! ## 设计特点
//!
//! - **顶层编排**：不处理单篇论文的任务细节
//! - **资源所有者**：唯一持有模型调用器与任务存储的模块
//! - **向下委托**：委托 job_orchestrator 处理单篇论文

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use tokio::sync::Semaphore;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::infrastructure::{FileJobStore, JobStore, ModelInvoker, OpenAiInvoker};
use crate::models::{load_all_documents, load_dimension_specs, ConvertedDocument};
use crate::orchestrator::job_orchestrator::JobOrchestrator;
use crate::services::SectionIndex;
use crate::utils::logging::{
    init_log_file, log_batch_complete, log_batch_start, log_documents_loaded, log_startup,
    print_final_stats,
};

/// 应用主结构
pub struct App {
    config: Config,
    orchestrator: Arc<JobOrchestrator>,
    section_index: SectionIndex,
}

impl App {
    /// 初始化应用
    pub async fn initialize(config: Config) -> Result<Self> {
        // 初始化日志文件
        init_log_file(&config.output_log_file)?;

        log_startup(
            config.max_concurrent_documents,
            config.dimension_workers,
            config.section_workers,
        );

        let specs = load_dimension_specs(Path::new(&config.dimensions_file)).await?;
        info!(
            "✓ 已加载 {} 个评估维度: {}",
            specs.len(),
            specs
                .iter()
                .map(|s| s.display_name.as_str())
                .collect::<Vec<_>>()
                .join("、")
        );

        let invoker: Arc<dyn ModelInvoker> = Arc::new(OpenAiInvoker::new(&config));
        let store: Arc<dyn JobStore> = Arc::new(FileJobStore::new(&config.job_store_dir));

        Ok(Self::with_components(config, store, invoker, specs))
    }

    /// 使用给定的存储与模型调用器组装应用
    pub fn with_components(
        config: Config,
        store: Arc<dyn JobStore>,
        invoker: Arc<dyn ModelInvoker>,
        specs: Vec<crate::models::DimensionSpec>,
    ) -> Self {
        let orchestrator = JobOrchestrator::new(store, invoker, specs, &config);
        Self {
            section_index: SectionIndex::new(&config.excluded_headings),
            orchestrator: Arc::new(orchestrator),
            config,
        }
    }

    /// 运行应用主逻辑
    pub async fn run(&self) -> Result<ProcessingStats> {
        // 加载所有待评估的论文
        info!("\n📁 正在扫描待评估的论文...");
        let all_documents = load_all_documents(&self.config.input_folder).await?;

        if all_documents.is_empty() {
            warn!("⚠️ 没有找到待评估的论文，程序结束");
            return Ok(ProcessingStats::default());
        }

        log_documents_loaded(all_documents.len(), self.config.max_concurrent_documents);

        // 处理所有论文
        let stats = self.process_all_documents(all_documents).await?;

        // 输出最终统计
        print_final_stats(
            stats.completed,
            stats.partial,
            stats.total,
            &self.config.output_log_file,
        );

        Ok(stats)
    }

    /// 处理所有论文
    async fn process_all_documents(&self, all_documents: Vec<ConvertedDocument>) -> Result<ProcessingStats> {
        let batch_size = self.config.max_concurrent_documents.max(1);
        let semaphore = Arc::new(Semaphore::new(batch_size));
        let total = all_documents.len();
        let mut stats = ProcessingStats {
            total,
            ..Default::default()
        };

        // 分批处理
        for batch_start in (0..total).step_by(batch_size) {
            let batch_end = (batch_start + batch_size).min(total);
            let batch_num = (batch_start / batch_size) + 1;
            let total_batches = total.div_ceil(batch_size);

            log_batch_start(batch_num, total_batches, batch_start + 1, batch_end, total);

            let batch_result = self
                .process_batch(&all_documents[batch_start..batch_end], semaphore.clone())
                .await?;

            stats.completed += batch_result.completed;
            stats.partial += batch_result.partial;
            stats.failed += batch_result.failed;

            log_batch_complete(
                batch_num,
                batch_result.completed,
                batch_result.completed + batch_result.partial + batch_result.failed,
            );
        }

        Ok(stats)
    }

    /// 处理单个批次
    async fn process_batch(
        &self,
        batch_documents: &[ConvertedDocument],
        semaphore: Arc<Semaphore>,
    ) -> Result<BatchResult> {
        let mut batch_handles = Vec::new();

        // 为本批创建并发任务
        for converted in batch_documents {
            let permit = semaphore.clone().acquire_owned().await?;
            let orchestrator = self.orchestrator.clone();
            let document = Arc::new(self.section_index.build(&converted.markup, &converted.id));
            let dir = converted.dir.clone();

            let handle = tokio::spawn(async move {
                let _permit = permit;
                orchestrator.run(document, &dir).await
            });
            batch_handles.push((converted.id.clone(), handle));
        }

        // 等待本批所有任务完成
        let mut result = BatchResult::default();

        for (document_id, handle) in batch_handles {
            match handle.await {
                Ok(Ok(progress)) if progress.completed => {
                    result.completed += 1;
                }
                Ok(Ok(progress)) => {
                    warn!(
                        "[文档 {}] ⚠️ 部分任务未完成 ({}/{})，可重新运行续跑",
                        document_id, progress.jobs_succeeded, progress.total_jobs
                    );
                    result.partial += 1;
                }
                Ok(Err(e)) => {
                    error!("[文档 {}] ❌ 评估过程中发生错误: {}", document_id, e);
                    result.failed += 1;
                }
                Err(e) => {
                    error!("[文档 {}] 任务执行失败: {}", document_id, e);
                    result.failed += 1;
                }
            }
        }

        Ok(result)
    }
}

/// 处理统计
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ProcessingStats {
    /// 全部任务成功
    pub completed: usize,
    /// 有任务失败，可续跑
    pub partial: usize,
    /// 编排本身出错（如任务存储不可写）
    pub failed: usize,
    pub total: usize,
}

/// 批次处理结果
#[derive(Debug, Default)]
struct BatchResult {
    completed: usize,
    partial: usize,
    failed: usize,
}
