//! 维度调度器 - 编排层
//!
//! ## 职责
//!
//! 为一篇文档并发执行全部维度的评估协议，并汇总为 `ScoreReport`。
//!
//! - 每个维度一个 `tokio::spawn` 任务，`Semaphore` 限制并发数
//! - 单个维度失败（含任务 panic）只记录到 `failed`，不影响其他维度
//! - 报告按配置顺序排列，与完成顺序无关
//! - 总分为有效维度的加权平均，保留两位小数

use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::Semaphore;
use tracing::{error, info};

use crate::config::Config;
use crate::error::{AppResult, EvaluationError};
use crate::infrastructure::ModelInvoker;
use crate::models::dimension::{DimensionReport, DimensionSpec, FailedDimension, ScoreReport};
use crate::models::document::Document;
use crate::workflow::{AssessmentFlow, AssessmentOutcome, VerifiedAssessment};

/// 维度调度器
pub struct DimensionScheduler {
    flow: Arc<AssessmentFlow>,
    workers: usize,
}

impl DimensionScheduler {
    pub fn new(invoker: Arc<dyn ModelInvoker>, config: &Config) -> Self {
        Self::with_flow(AssessmentFlow::new(invoker, config), config.dimension_workers)
    }

    pub fn with_flow(flow: AssessmentFlow, workers: usize) -> Self {
        Self {
            flow: Arc::new(flow),
            workers: workers.max(1),
        }
    }

    /// 评估全部维度
    pub async fn evaluate(&self, document: Arc<Document>, specs: &[DimensionSpec]) -> AppResult<ScoreReport> {
        let semaphore = Arc::new(Semaphore::new(self.workers));
        let mut handles = Vec::with_capacity(specs.len());

        for spec in specs {
            let permit = semaphore.clone().acquire_owned().await?;
            let flow = self.flow.clone();
            let document = document.clone();
            let spec_clone = spec.clone();

            let handle = tokio::spawn(async move {
                let _permit = permit;
                flow.run(&document, &spec_clone).await
            });
            handles.push(handle);
        }

        // 按配置顺序收集结果
        let outcomes = join_all(handles).await;
        let mut dimensions = Vec::new();
        let mut failed = Vec::new();

        for (spec, outcome) in specs.iter().zip(outcomes) {
            match outcome {
                Ok(AssessmentOutcome::Verified(verified)) => {
                    dimensions.push(build_report(spec, verified));
                }
                Ok(AssessmentOutcome::DimensionFailed(failure)) => {
                    failed.push(FailedDimension {
                        key: spec.key.clone(),
                        reason: failure.to_string(),
                    });
                }
                Err(e) => {
                    error!("[文档 {}] 维度 {} 任务执行失败: {}", document.id, spec.key, e);
                    failed.push(FailedDimension {
                        key: spec.key.clone(),
                        reason: format!("任务执行失败: {}", e),
                    });
                }
            }
        }

        if dimensions.is_empty() {
            return Err(EvaluationError::NoDimensionSucceeded {
                attempted: specs.len(),
            }
            .into());
        }

        let overall_score = weighted_overall(&dimensions)?;
        info!(
            "[文档 {}] 📊 维度评分完成: 总分 {} (成功 {} / 失败 {})",
            document.id,
            overall_score,
            dimensions.len(),
            failed.len()
        );

        Ok(ScoreReport {
            overall_score,
            dimensions,
            failed,
        })
    }
}

fn build_report(spec: &DimensionSpec, verified: VerifiedAssessment) -> DimensionReport {
    let VerifiedAssessment {
        result,
        status,
        focus_chapters,
    } = verified;

    DimensionReport {
        key: spec.key.clone(),
        name: spec.display_name.clone(),
        score: result.score,
        full_score: spec.full_score,
        weight: spec.weight,
        focus_chapters,
        comment: result.comment,
        strengths: result.strengths,
        weaknesses: result.weaknesses,
        suggestions: result.suggestions,
        verification: status,
    }
}

/// 加权平均分：Σ score·weight / Σ weight，保留两位小数
pub fn weighted_overall(reports: &[DimensionReport]) -> Result<f64, EvaluationError> {
    if reports.is_empty() {
        return Err(EvaluationError::NoDimensionSucceeded { attempted: 0 });
    }

    let weight_sum: f64 = reports.iter().map(|r| r.weight).sum();
    if weight_sum <= 0.0 {
        return Err(EvaluationError::ZeroWeight);
    }

    let weighted: f64 = reports.iter().map(|r| r.score * r.weight).sum();
    Ok((weighted / weight_sum * 100.0).round() / 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{AppError, LlmError};
    use crate::models::dimension::VerificationStatus;
    use crate::services::prompt_builder::VERIFICATION_HEADER;
    use crate::services::section_index::SectionIndex;
    use async_trait::async_trait;

    /// 按维度 key 返回预设评估结果
    struct FakeInvoker;

    #[async_trait]
    impl ModelInvoker for FakeInvoker {
        async fn invoke(&self, prompt: &str, _model_id: &str) -> Result<String, LlmError> {
            if prompt.starts_with(VERIFICATION_HEADER) {
                return Ok(r#"{"has_hallucination": false}"#.to_string());
            }
            let key = prompt
                .split_whitespace()
                .nth(1)
                .unwrap_or_default()
                .to_string();
            if prompt.starts_with("SELECT") {
                return Ok(match key.as_str() {
                    "missing" => r#"{"selected_chapters": ["第九章"]}"#.to_string(),
                    "boom" => panic!("模拟任务崩溃"),
                    _ => r#"{"selected_chapters": ["第一章"]}"#.to_string(),
                });
            }
            let score = match key.as_str() {
                "a" => 8,
                _ => 6,
            };
            Ok(format!(r#"{{"score": {}, "comment": "ok"}}"#, score))
        }
    }

    fn spec(key: &str, weight: f64) -> DimensionSpec {
        DimensionSpec {
            key: key.to_string(),
            display_name: key.to_uppercase(),
            weight,
            full_score: 10.0,
            selection_prompt_template: format!("SELECT {}\n{{toc}}", key),
            assessment_prompt_template: format!("ASSESS {}\n{{content}}", key),
        }
    }

    fn scheduler() -> DimensionScheduler {
        DimensionScheduler::with_flow(
            AssessmentFlow::with_models(Arc::new(FakeInvoker), "main", "verify"),
            2,
        )
    }

    fn document() -> Arc<Document> {
        Arc::new(SectionIndex::default().build("# 第一章 绪论\n内容。\n", "doc-1"))
    }

    #[tokio::test]
    async fn test_weighted_average_and_config_order() {
        let specs = vec![spec("a", 1.0), spec("missing", 5.0), spec("b", 2.0)];
        let report = scheduler().evaluate(document(), &specs).await.unwrap();

        // (8·1 + 6·2) / 3 = 6.666…
        assert_eq!(report.overall_score, 6.67);
        let keys: Vec<&str> = report.dimensions.iter().map(|d| d.key.as_str()).collect();
        assert_eq!(keys, vec!["a", "b"]);
        assert_eq!(report.dimensions[0].focus_chapters, vec!["第一章 绪论"]);
        assert_eq!(report.dimensions[0].verification, VerificationStatus::Verified);

        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].key, "missing");
    }

    #[tokio::test]
    async fn test_panicked_dimension_is_isolated() {
        let specs = vec![spec("boom", 1.0), spec("a", 1.0)];
        let report = scheduler().evaluate(document(), &specs).await.unwrap();

        assert_eq!(report.dimensions.len(), 1);
        assert_eq!(report.overall_score, 8.0);
        assert_eq!(report.failed[0].key, "boom");
    }

    #[tokio::test]
    async fn test_all_dimensions_failed() {
        let specs = vec![spec("missing", 1.0)];
        let err = scheduler().evaluate(document(), &specs).await.unwrap_err();
        assert!(matches!(
            err,
            AppError::Evaluation(EvaluationError::NoDimensionSucceeded { attempted: 1 })
        ));
    }

    #[tokio::test]
    async fn test_zero_weight_is_rejected() {
        let specs = vec![spec("a", 0.0)];
        let err = scheduler().evaluate(document(), &specs).await.unwrap_err();
        assert!(matches!(err, AppError::Evaluation(EvaluationError::ZeroWeight)));
    }
}
