//! Document extractor plugin trait.
//!
//! An extractor turns one file into raw page text, metadata, structural subtype
//! tags, outline entries and (optionally) page images. It does not sanitize or
//! normalize anything; the orchestrator does that for every extractor alike.

use super::Plugin;
use crate::Result;
use crate::types::DocumentExtractionResult;
use std::path::Path;

/// Per-call extraction settings derived from the batch configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtractionOptions {
    /// Render every page to PNG.
    pub capture_images: bool,
    pub render_dpi: u32,
}

impl Default for ExtractionOptions {
    fn default() -> Self {
        Self {
            capture_images: false,
            render_dpi: 150,
        }
    }
}

/// Trait for document extractor plugins.
///
/// `extract` is synchronous and may be CPU-heavy; concurrent runs call it from
/// blocking worker threads, so it must not assume an async context.
///
/// # Example
///
/// ```rust
/// use docshard::plugins::{DocumentExtractor, ExtractionOptions, Plugin};
/// use docshard::types::{DocumentExtractionResult, RawText};
/// use docshard::Result;
/// use std::path::Path;
///
/// struct PlainText;
///
/// impl Plugin for PlainText {
///     fn name(&self) -> &str { "plain-text" }
///     fn version(&self) -> String { "1.0.0".to_string() }
///     fn initialize(&self) -> Result<()> { Ok(()) }
///     fn shutdown(&self) -> Result<()> { Ok(()) }
/// }
///
/// impl DocumentExtractor for PlainText {
///     fn extract(&self, path: &Path, _options: &ExtractionOptions) -> Result<DocumentExtractionResult> {
///         let bytes = std::fs::read(path)?;
///         Ok(DocumentExtractionResult {
///             pages: vec![RawText::Bytes(bytes)],
///             ..Default::default()
///         })
///     }
/// }
/// ```
pub trait DocumentExtractor: Plugin {
    /// Extract one document.
    ///
    /// # Errors
    ///
    /// Any error is treated as a per-document failure. Returning zero pages is
    /// not an error here; the orchestrator reports it as an empty document.
    fn extract(&self, path: &Path, options: &ExtractionOptions) -> Result<DocumentExtractionResult>;

    /// Whether `extract` can honour `capture_images`.
    fn supports_page_images(&self) -> bool {
        false
    }
}
