pub mod assessment_ctx;
pub mod assessment_flow;

pub use assessment_ctx::AssessmentCtx;
pub use assessment_flow::{AssessmentFlow, AssessmentOutcome, DimensionFailure, VerifiedAssessment};
