//! # Thesis Eval
//!
//! 学位论文评估编排引擎：把转换好的论文 Markdown 切分为章节，
//! 按配置的维度并发评分，扫描并汇总写作问题，并以可续跑的任务记录保存全部结果。
//!
//! ## 架构设计
//!
//! 本系统采用严格的四层架构：
//!
//! ### ① 基础设施层（Infrastructure）
//! - `infrastructure/` - 持有外部资源，只暴露能力
//! - `ModelInvoker` - 模型调用能力（`OpenAiInvoker` 为生产实现）
//! - `JobStore` - 任务状态存储（`FileJobStore` / `MemoryJobStore`）
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 纯函数能力，不涉及并发
//! - `SectionIndex` - 章节索引
//! - `chapter_resolver` - 章节名解析
//! - `ResponseParser` / `prompt_builder` - 模型输入输出
//! - `lint` / `reference_check` / `image_check` / `statistics` - 本地检查与统计
//! - `issue_ordering` - 问题排序编号
//!
//! ### ③ 流程层（Workflow）
//! - `workflow/` - 定义"一个维度"的完整评估协议
//! - `AssessmentCtx` - 上下文封装（document_id + 维度）
//! - `AssessmentFlow` - 选择 → 解析 → 评估 → 核查
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/batch_processor` - 批量论文处理器，管理资源和并发
//! - `orchestrator/job_orchestrator` - 单篇论文的任务编排与续跑
//! - `orchestrator/dimension_scheduler` - 维度并发调度与加权总分
//! - `orchestrator/issue_aggregator` - 问题扫描与汇总
//!
//! ## 模块结构

pub mod config;
pub mod error;
pub mod infrastructure;
pub mod logger;

pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use config::Config;
pub use error::{AppError, AppResult};
pub use infrastructure::{FileJobStore, JobStore, MemoryJobStore, ModelInvoker, OpenAiInvoker};
pub use models::{Document, EvaluationProgress, Issue, JobName, JobRecord, JobStatus, ScoreReport};
pub use orchestrator::{App, DimensionScheduler, IssueAggregator, JobOrchestrator};
pub use workflow::{AssessmentCtx, AssessmentFlow, AssessmentOutcome};
