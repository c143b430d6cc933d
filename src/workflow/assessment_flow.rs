//! 维度评估流程 - 流程层
//!
//! 核心职责：定义"一个维度"的完整评估协议
//!
//! 流程顺序（状态只前进，不回退）：
//! 1. 章节选择 → 2. 章节解析与拼接 → 3. 内容评估 → 4. 幻觉核查（最多 3 次）
//!
//! 任何一步失败都以 `DimensionFailed` 结束，不会编造分数。

use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};

use crate::config::Config;
use crate::error::{LlmError, ParseError};
use crate::infrastructure::ModelInvoker;
use crate::models::dimension::{
    AssessmentResult, DimensionSpec, SelectionResult, VerificationOutcome, VerificationStatus,
};
use crate::models::document::Document;
use crate::services::chapter_resolver::{resolve_all, ResolvedContent};
use crate::services::prompt_builder;
use crate::services::ResponseParser;
use crate::utils::truncate_text;
use crate::workflow::assessment_ctx::AssessmentCtx;

/// 幻觉核查最多尝试次数
pub const VERIFY_MAX_ATTEMPTS: u32 = 3;

/// 通过核查（或核查无法完成）后采用的评估结果
#[derive(Debug, Clone, PartialEq)]
pub struct VerifiedAssessment {
    pub result: AssessmentResult,
    pub status: VerificationStatus,
    /// 评估实际使用的章节（规范标题）
    pub focus_chapters: Vec<String>,
}

/// 维度评估失败原因
#[derive(Debug, Error)]
pub enum DimensionFailure {
    #[error("章节选择结果无法解析: {0}")]
    SelectionParse(#[source] ParseError),
    #[error("所选章节均无法匹配: {requested:?}")]
    NoResolvableChapters { requested: Vec<String> },
    #[error("评估结果无法解析: {0}")]
    AssessmentParse(#[source] ParseError),
    #[error("{stage}阶段模型调用失败: {source}")]
    Invoker {
        stage: &'static str,
        #[source]
        source: LlmError,
    },
}

/// 评估协议的终态
#[derive(Debug)]
pub enum AssessmentOutcome {
    Verified(VerifiedAssessment),
    DimensionFailed(DimensionFailure),
}

/// 协议状态
enum ProtocolState {
    Select,
    Resolve(SelectionResult),
    Assess(ResolvedContent),
    Verify {
        assessment_prompt: String,
        result: AssessmentResult,
        focus_chapters: Vec<String>,
    },
    Done(AssessmentOutcome),
}

/// 维度评估流程
///
/// - 只依赖模型调用能力与解析/拼接服务
/// - 不持有并发控制，调度由 orchestrator 负责
pub struct AssessmentFlow {
    invoker: Arc<dyn ModelInvoker>,
    parser: ResponseParser,
    model_id: String,
    verify_model_id: String,
}

impl AssessmentFlow {
    /// 创建新的评估流程
    pub fn new(invoker: Arc<dyn ModelInvoker>, config: &Config) -> Self {
        Self::with_models(
            invoker,
            &config.llm_model_name,
            &config.llm_verify_model_name,
        )
    }

    pub fn with_models(invoker: Arc<dyn ModelInvoker>, model_id: &str, verify_model_id: &str) -> Self {
        Self {
            invoker,
            parser: ResponseParser::new(),
            model_id: model_id.to_string(),
            verify_model_id: verify_model_id.to_string(),
        }
    }

    /// 对一篇文档执行一个维度的完整评估
    pub async fn run(&self, document: &Document, spec: &DimensionSpec) -> AssessmentOutcome {
        let ctx = AssessmentCtx::new(&document.id, spec);
        let mut state = ProtocolState::Select;

        loop {
            state = match state {
                ProtocolState::Select => self.select(&ctx, document, spec).await,
                ProtocolState::Resolve(selection) => self.resolve(&ctx, document, selection),
                ProtocolState::Assess(content) => self.assess(&ctx, spec, content).await,
                ProtocolState::Verify {
                    assessment_prompt,
                    result,
                    focus_chapters,
                } => {
                    let verified = self
                        .verify(&ctx, document, spec, &assessment_prompt, result)
                        .await;
                    ProtocolState::Done(AssessmentOutcome::Verified(VerifiedAssessment {
                        focus_chapters,
                        ..verified
                    }))
                }
                ProtocolState::Done(outcome) => return outcome,
            };
        }
    }

    // ========== 阶段 1: 章节选择 ==========

    async fn select(&self, ctx: &AssessmentCtx, document: &Document, spec: &DimensionSpec) -> ProtocolState {
        info!("{} 🔍 正在选择评估章节...", ctx);
        let prompt = prompt_builder::selection_prompt(spec, document);

        let raw = match self.invoker.invoke(&prompt, &self.model_id).await {
            Ok(raw) => raw,
            Err(e) => return failed(ctx, DimensionFailure::Invoker { stage: "章节选择", source: e }),
        };

        match self.parser.parse_selection(&raw) {
            Ok(selection) => {
                info!(
                    "{} ✓ 选择了 {} 个章节: {:?}",
                    ctx,
                    selection.selected_chapter_titles.len(),
                    selection.selected_chapter_titles
                );
                ProtocolState::Resolve(selection)
            }
            Err(e) => failed(ctx, DimensionFailure::SelectionParse(e)),
        }
    }

    // ========== 阶段 2: 章节解析与拼接 ==========

    fn resolve(&self, ctx: &AssessmentCtx, document: &Document, selection: SelectionResult) -> ProtocolState {
        let content = resolve_all(&selection.selected_chapter_titles, document);
        if content.is_empty() {
            return failed(
                ctx,
                DimensionFailure::NoResolvableChapters {
                    requested: selection.selected_chapter_titles,
                },
            );
        }
        ProtocolState::Assess(content)
    }

    // ========== 阶段 3: 内容评估 ==========

    async fn assess(&self, ctx: &AssessmentCtx, spec: &DimensionSpec, content: ResolvedContent) -> ProtocolState {
        info!("{} 📝 正在评估 {} 个章节...", ctx, content.focus_chapters.len());
        let prompt = prompt_builder::assessment_prompt(spec, &content.blob);

        let raw = match self.invoker.invoke(&prompt, &self.model_id).await {
            Ok(raw) => raw,
            Err(e) => return failed(ctx, DimensionFailure::Invoker { stage: "内容评估", source: e }),
        };

        match self.parser.parse_assessment(&raw, spec.full_score) {
            Ok(result) => {
                info!("{} ✓ 评估得分: {}/{}", ctx, result.score, spec.full_score);
                ProtocolState::Verify {
                    assessment_prompt: prompt,
                    result,
                    focus_chapters: content.focus_chapters,
                }
            }
            Err(e) => failed(ctx, DimensionFailure::AssessmentParse(e)),
        }
    }

    // ========== 阶段 4: 幻觉核查 ==========

    /// 核查只尽力而为：解析失败与调用失败都计为一次失败尝试，次数用尽后保留原评估
    async fn verify(
        &self,
        ctx: &AssessmentCtx,
        document: &Document,
        spec: &DimensionSpec,
        assessment_prompt: &str,
        result: AssessmentResult,
    ) -> VerifiedAssessment {
        let prompt =
            prompt_builder::verification_prompt(spec, &document.abstract_native, assessment_prompt, &result);

        for attempt in 1..=VERIFY_MAX_ATTEMPTS {
            let raw = match self.invoker.invoke(&prompt, &self.verify_model_id).await {
                Ok(raw) => raw,
                Err(e) => {
                    warn!(
                        "{} ⚠️ 幻觉核查调用失败 (第 {}/{} 次): {}",
                        ctx, attempt, VERIFY_MAX_ATTEMPTS, e
                    );
                    continue;
                }
            };

            match self.parser.parse_verification(&raw, spec.full_score) {
                VerificationOutcome::NoHallucination => {
                    info!("{} ✓ 幻觉核查通过", ctx);
                    return VerifiedAssessment {
                        result,
                        status: VerificationStatus::Verified,
                        focus_chapters: Vec::new(),
                    };
                }
                VerificationOutcome::HallucinationDetected { points, corrected } => {
                    info!(
                        "{} 🔧 发现 {} 处幻觉，采用修正结果 ({} → {})",
                        ctx,
                        points.len(),
                        result.score,
                        corrected.score
                    );
                    return VerifiedAssessment {
                        result: corrected,
                        status: VerificationStatus::Corrected { points },
                        focus_chapters: Vec::new(),
                    };
                }
                VerificationOutcome::ParseFailed { raw } => {
                    warn!(
                        "{} ⚠️ 幻觉核查响应无法解析 (第 {}/{} 次): {}",
                        ctx,
                        attempt,
                        VERIFY_MAX_ATTEMPTS,
                        truncate_text(&raw, 80)
                    );
                }
            }
        }

        warn!("{} ⚠️ 幻觉核查 {} 次均未完成，保留原评估结果", ctx, VERIFY_MAX_ATTEMPTS);
        VerifiedAssessment {
            result,
            status: VerificationStatus::Unverified,
            focus_chapters: Vec::new(),
        }
    }
}

fn failed(ctx: &AssessmentCtx, failure: DimensionFailure) -> ProtocolState {
    warn!("{} ❌ 维度评估失败: {}", ctx, failure);
    ProtocolState::Done(AssessmentOutcome::DimensionFailed(failure))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::prompt_builder::VERIFICATION_HEADER;
    use crate::services::section_index::SectionIndex;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// 按提示词内容返回预设响应，并统计核查调用次数
    struct FakeInvoker {
        selection: String,
        assessment: String,
        verification: Vec<Result<String, ()>>,
        verify_calls: AtomicUsize,
    }

    impl FakeInvoker {
        fn new(selection: &str, assessment: &str, verification: Vec<Result<&str, ()>>) -> Self {
            Self {
                selection: selection.to_string(),
                assessment: assessment.to_string(),
                verification: verification
                    .into_iter()
                    .map(|r| r.map(str::to_string))
                    .collect(),
                verify_calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl ModelInvoker for FakeInvoker {
        async fn invoke(&self, prompt: &str, model_id: &str) -> Result<String, LlmError> {
            if prompt.starts_with(VERIFICATION_HEADER) {
                let n = self.verify_calls.fetch_add(1, Ordering::SeqCst);
                return match self.verification.get(n) {
                    Some(Ok(raw)) => Ok(raw.clone()),
                    _ => Err(LlmError::EmptyContent {
                        model: model_id.to_string(),
                    }),
                };
            }
            if prompt.starts_with("SELECT") {
                return Ok(self.selection.clone());
            }
            Ok(self.assessment.clone())
        }
    }

    fn spec() -> DimensionSpec {
        DimensionSpec {
            key: "logic".to_string(),
            display_name: "逻辑性".to_string(),
            weight: 1.0,
            full_score: 10.0,
            selection_prompt_template: "SELECT {dimension}\n{toc}".to_string(),
            assessment_prompt_template: "ASSESS {dimension}\n{content}".to_string(),
        }
    }

    fn document() -> Document {
        let markup = "# 摘要\n本文研究缓存。\n# 第一章 绪论\n背景。\n# 第二章 设计\n架构。\n";
        SectionIndex::default().build(markup, "doc-1")
    }

    const SELECTION: &str = r#"{"selected_chapters": ["第一章 绪论", "设计"]}"#;
    const ASSESSMENT: &str = r#"{"score": 8, "comment": "结构清晰"}"#;

    async fn run(invoker: FakeInvoker) -> (AssessmentOutcome, usize) {
        let invoker = Arc::new(invoker);
        let flow = AssessmentFlow::with_models(invoker.clone(), "main", "verify");
        let outcome = flow.run(&document(), &spec()).await;
        (outcome, invoker.verify_calls.load(Ordering::SeqCst))
    }

    #[tokio::test]
    async fn test_verified_on_first_attempt() {
        let (outcome, calls) = run(FakeInvoker::new(
            SELECTION,
            ASSESSMENT,
            vec![Ok(r#"{"has_hallucination": false}"#)],
        ))
        .await;

        let AssessmentOutcome::Verified(verified) = outcome else {
            panic!("应当评估成功");
        };
        assert_eq!(verified.result.score, 8.0);
        assert_eq!(verified.status, VerificationStatus::Verified);
        assert_eq!(verified.focus_chapters, vec!["第一章 绪论", "第二章 设计"]);
        assert_eq!(calls, 1);
    }

    #[tokio::test]
    async fn test_hallucination_uses_corrected_result() {
        let verification = r#"{"has_hallucination": true, "hallucination_points": ["虚构了实验"],
            "corrected": {"score": 6, "comment": "修正后"}}"#;
        let (outcome, calls) = run(FakeInvoker::new(SELECTION, ASSESSMENT, vec![Ok(verification)])).await;

        let AssessmentOutcome::Verified(verified) = outcome else {
            panic!("应当评估成功");
        };
        assert_eq!(verified.result.score, 6.0);
        assert_eq!(
            verified.status,
            VerificationStatus::Corrected {
                points: vec!["虚构了实验".to_string()]
            }
        );
        assert_eq!(calls, 1);
    }

    #[tokio::test]
    async fn test_unverified_after_three_failed_attempts() {
        let (outcome, calls) = run(FakeInvoker::new(
            SELECTION,
            ASSESSMENT,
            vec![Ok("无法判断"), Err(()), Ok("{}")],
        ))
        .await;

        let AssessmentOutcome::Verified(verified) = outcome else {
            panic!("应当保留原评估");
        };
        assert_eq!(verified.result.score, 8.0);
        assert_eq!(verified.status, VerificationStatus::Unverified);
        assert_eq!(calls, VERIFY_MAX_ATTEMPTS as usize);
    }

    #[tokio::test]
    async fn test_retry_then_verified() {
        let (outcome, calls) = run(FakeInvoker::new(
            SELECTION,
            ASSESSMENT,
            vec![Ok("not json"), Ok(r#"{"has_hallucination": false}"#)],
        ))
        .await;

        assert!(matches!(
            outcome,
            AssessmentOutcome::Verified(VerifiedAssessment {
                status: VerificationStatus::Verified,
                ..
            })
        ));
        assert_eq!(calls, 2);
    }

    #[tokio::test]
    async fn test_malformed_selection_fails_dimension() {
        let (outcome, calls) = run(FakeInvoker::new("我觉得都挺好", ASSESSMENT, vec![])).await;
        assert!(matches!(
            outcome,
            AssessmentOutcome::DimensionFailed(DimensionFailure::SelectionParse(_))
        ));
        assert_eq!(calls, 0);
    }

    #[tokio::test]
    async fn test_unresolvable_chapters_fail_dimension() {
        let (outcome, _) = run(FakeInvoker::new(
            r#"{"selected_chapters": ["第九章 不存在"]}"#,
            ASSESSMENT,
            vec![],
        ))
        .await;
        assert!(matches!(
            outcome,
            AssessmentOutcome::DimensionFailed(DimensionFailure::NoResolvableChapters { .. })
        ));
    }

    #[tokio::test]
    async fn test_out_of_range_score_fails_dimension() {
        let (outcome, _) = run(FakeInvoker::new(SELECTION, r#"{"score": 15, "comment": "x"}"#, vec![])).await;
        assert!(matches!(
            outcome,
            AssessmentOutcome::DimensionFailed(DimensionFailure::AssessmentParse(ParseError::ScoreOutOfRange { .. }))
        ));
    }
}
