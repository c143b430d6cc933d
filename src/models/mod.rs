pub mod dimension;
pub mod document;
pub mod issue;
pub mod job;
pub mod loaders;
pub mod metadata;

pub use dimension::{
    AssessmentResult, DimensionReport, DimensionSpec, FailedDimension, ScoreReport,
    SelectionResult, VerificationOutcome, VerificationStatus,
};
pub use document::{AuxiliarySegment, Document, Section, SegmentKind, Subsection};
pub use issue::{Issue, LintFinding};
pub use job::{EvaluationProgress, JobName, JobRecord, JobStatus};
pub use loaders::{load_all_documents, load_dimension_specs, ConvertedDocument};
pub use metadata::ThesisMetadata;
