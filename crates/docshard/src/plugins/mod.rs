//! Plugin traits for the pluggable parts of the pipeline.
//!
//! - [`Plugin`] - lifecycle shared by every plugin
//! - [`DocumentExtractor`] - turns a file into raw pages, metadata and structure
//! - [`LanguageDetector`] - identifies the language of the extracted text
//!
//! Plugins are held as `Arc<dyn Trait>` by the orchestrator so concurrent
//! workers can share them.

pub mod extractor;
pub mod language;
pub mod traits;

pub use extractor::{DocumentExtractor, ExtractionOptions};
pub use language::LanguageDetector;
pub use traits::Plugin;
