//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 本层负责批量处理和流程调度，是整个系统的"指挥中心"。
//!
//! ## 模块划分
//!
//! ### `batch_processor` - 批量论文处理器
//! - 管理应用生命周期（初始化、运行）
//! - 批量加载论文，控制并发数量（Semaphore）
//! - 输出全局统计信息
//!
//! ### `job_orchestrator` - 单篇论文任务编排器
//! - 依次执行全部评估任务，已成功的任务跳过
//! - 维护任务记录与整体进度
//!
//! ### `dimension_scheduler` - 维度调度器
//! - 并发执行各维度的评估协议，计算加权总分
//!
//! ### `issue_aggregator` - 问题汇总器
//! - 分章节扫描、汇总去重、按章节排序
//!
//! ## 层次关系
//!
//! ```text
//! batch_processor (处理 Vec<Document>)
//!     ↓
//! job_orchestrator (处理单篇论文的 8 个任务)
//!     ↓
//! dimension_scheduler / issue_aggregator
//!     ↓
//! workflow::AssessmentFlow (处理单个维度)
//!     ↓
//! services (能力层：章节索引 / 解析 / 检查 / 统计)
//!     ↓
//! infrastructure (基础设施：ModelInvoker / JobStore)
//! ```

pub mod batch_processor;
pub mod dimension_scheduler;
pub mod issue_aggregator;
pub mod job_orchestrator;

// 重新导出主要类型
pub use batch_processor::{App, ProcessingStats};
pub use dimension_scheduler::DimensionScheduler;
pub use issue_aggregator::IssueAggregator;
pub use job_orchestrator::JobOrchestrator;
