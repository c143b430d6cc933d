pub mod chapter_resolver;
pub mod image_check;
pub mod issue_ordering;
pub mod lint;
pub mod prompt_builder;
pub mod reference_check;
pub mod response_parser;
pub mod section_index;
pub mod statistics;

pub use chapter_resolver::{resolve, resolve_all, ResolvedContent};
pub use issue_ordering::order_issues;
pub use response_parser::ResponseParser;
pub use section_index::SectionIndex;
