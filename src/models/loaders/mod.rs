pub mod markdown_loader;
pub mod toml_loader;

pub use markdown_loader::{load_all_documents, load_converted_document, ConvertedDocument};
pub use toml_loader::{load_dimension_specs, parse_dimension_specs};
