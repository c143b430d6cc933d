//! 问题汇总器 - 编排层
//!
//! ## 流程
//!
//! 1. **分章节扫描**：每个小节、每章导语（无小节时为整章）、中英文摘要各为一个扫描单元，
//!    并发调用扫描模型；单元失败只记日志
//! 2. **汇总去重**：本地人称检查结果与全部扫描响应合并为一次汇总调用
//! 3. **排序编号**：按章节顺序排列并从 1 编号

use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::Semaphore;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::error::{AppResult, EvaluationError};
use crate::infrastructure::ModelInvoker;
use crate::models::document::Document;
use crate::models::issue::Issue;
use crate::services::{lint, order_issues, prompt_builder, ResponseParser};

/// 分章节扫描单元
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanUnit {
    pub chapter: String,
    pub sub_chapter: String,
    pub text: String,
}

/// 只有标题行的导语不单独扫描
fn has_content(text: &str) -> bool {
    text.lines()
        .any(|l| !l.trim().is_empty() && !l.trim_start().starts_with('#'))
}

/// 按文档顺序构建扫描单元
pub fn scan_units(document: &Document) -> Vec<ScanUnit> {
    let mut units = Vec::new();

    if !document.abstract_native.trim().is_empty() {
        units.push(ScanUnit {
            chapter: "摘要".to_string(),
            sub_chapter: String::new(),
            text: document.abstract_native.clone(),
        });
    }
    if !document.abstract_translated.trim().is_empty() {
        units.push(ScanUnit {
            chapter: "Abstract".to_string(),
            sub_chapter: String::new(),
            text: document.abstract_translated.clone(),
        });
    }

    for section in &document.sections {
        if section.subsections.is_empty() {
            units.push(ScanUnit {
                chapter: section.title.clone(),
                sub_chapter: String::new(),
                text: section.body.clone(),
            });
            continue;
        }

        let lead = section.lead_text();
        if has_content(lead) {
            units.push(ScanUnit {
                chapter: section.title.clone(),
                sub_chapter: String::new(),
                text: lead.to_string(),
            });
        }
        units.extend(section.subsections.iter().map(|sub| ScanUnit {
            chapter: section.title.clone(),
            sub_chapter: sub.title.clone(),
            text: sub.body.clone(),
        }));
    }

    units
}

/// 问题汇总器
pub struct IssueAggregator {
    invoker: Arc<dyn ModelInvoker>,
    parser: ResponseParser,
    scan_model_id: String,
    aggregate_model_id: String,
    workers: usize,
}

impl IssueAggregator {
    pub fn new(invoker: Arc<dyn ModelInvoker>, config: &Config) -> Self {
        Self::with_models(
            invoker,
            &config.llm_scan_model_name,
            &config.llm_model_name,
            config.section_workers,
        )
    }

    pub fn with_models(
        invoker: Arc<dyn ModelInvoker>,
        scan_model_id: &str,
        aggregate_model_id: &str,
        workers: usize,
    ) -> Self {
        Self {
            invoker,
            parser: ResponseParser::new(),
            scan_model_id: scan_model_id.to_string(),
            aggregate_model_id: aggregate_model_id.to_string(),
            workers: workers.max(1),
        }
    }

    /// 扫描全文并返回排好序的问题清单
    pub async fn scan(&self, document: Arc<Document>) -> AppResult<Vec<Issue>> {
        // ========== 阶段 1: 分章节扫描 ==========
        let units = scan_units(&document);
        info!("[文档 {}] 🔍 分章节扫描: {} 个单元", document.id, units.len());
        let responses = self.scan_all(&document.id, units).await?;

        // ========== 阶段 2: 本地检查 + 汇总 ==========
        let findings = lint::lint_document(&document);
        if responses.is_empty() && findings.is_empty() {
            info!("[文档 {}] 没有扫描结果，跳过问题汇总", document.id);
            return Ok(Vec::new());
        }

        info!(
            "[文档 {}] 🧩 汇总 {} 份扫描结果与 {} 条本地检查结果",
            document.id,
            responses.len(),
            findings.len()
        );
        let prompt = prompt_builder::aggregation_prompt(&responses, &findings);
        let raw = self.invoker.invoke(&prompt, &self.aggregate_model_id).await?;

        let issues = match self.parser.parse_issue_list(&raw) {
            Ok(issues) => issues,
            Err(e) => {
                let e = EvaluationError::AggregationParse(e.to_string());
                warn!("[文档 {}] ⚠️ {}，问题清单记为空", document.id, e);
                Vec::new()
            }
        };

        // ========== 阶段 3: 排序编号 ==========
        let ordered = order_issues(issues);
        info!("[文档 {}] ✓ 问题汇总完成: {} 条", document.id, ordered.len());
        Ok(ordered)
    }

    /// 并发扫描全部单元，返回成功的原始响应（按单元顺序）
    async fn scan_all(&self, document_id: &str, units: Vec<ScanUnit>) -> AppResult<Vec<String>> {
        let semaphore = Arc::new(Semaphore::new(self.workers));
        let mut labels = Vec::with_capacity(units.len());
        let mut handles = Vec::with_capacity(units.len());

        for unit in units {
            let permit = semaphore.clone().acquire_owned().await?;
            let invoker = self.invoker.clone();
            let model_id = self.scan_model_id.clone();
            let label = format!("{} {}", unit.chapter, unit.sub_chapter);

            let handle = tokio::spawn(async move {
                let _permit = permit;
                let prompt = prompt_builder::issue_scan_prompt(&unit.chapter, &unit.sub_chapter, &unit.text);
                invoker.invoke(&prompt, &model_id).await
            });
            labels.push(label);
            handles.push(handle);
        }

        let mut responses = Vec::new();
        for (label, outcome) in labels.into_iter().zip(join_all(handles).await) {
            match outcome {
                Ok(Ok(raw)) => responses.push(raw),
                Ok(Err(e)) => {
                    warn!("[文档 {}] ⚠️ 扫描失败 [{}]: {}", document_id, label.trim(), e);
                }
                Err(e) => {
                    error!("[文档 {}] 扫描任务执行失败 [{}]: {}", document_id, label.trim(), e);
                }
            }
        }

        Ok(responses)
    }
}
