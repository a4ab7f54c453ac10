//! Error types for docshard.
//!
//! All fallible operations return [`DocshardError`]. The variants are split by
//! how far an error is allowed to travel:
//!
//! **Run-fatal errors abort the batch before (or instead of) processing:**
//! - `Configuration` - missing input, unreadable manifest, invalid options,
//!   plugin initialization failure (wrapping a `Plugin` error as its source)
//! - `Io` (from `std::io::Error`) - shard files that cannot be opened or
//!   written. These always bubble up unchanged.
//!
//! **Per-document errors are caught by the orchestrator, logged and counted:**
//! - `DocumentUnavailable` - missing, empty or unreachable input file
//! - `Extraction` - the document extractor failed or panicked
//! - `WriteEncoding` - the record could not be serialized; nothing is written
//!
//! Date and text normalization never produce errors: degraded values are
//! encoded as sentinel strings instead.
//!
//! # Example
//!
//! ```rust
//! use docshard::{DocshardError, Result};
//!
//! fn manifest_lines(path: &str) -> Result<Vec<String>> {
//!     let content = std::fs::read_to_string(path).map_err(|e| {
//!         DocshardError::configuration_with_source(format!("Cannot read manifest {}", path), e)
//!     })?;
//!     Ok(content.lines().map(str::to_string).collect())
//! }
//! ```
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using `DocshardError`.
pub type Result<T> = std::result::Result<T, DocshardError>;

/// Main error type for all docshard operations.
#[derive(Debug, Error)]
pub enum DocshardError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {message}")]
    Configuration {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Document unavailable: {}: {message}", path.display())]
    DocumentUnavailable { path: PathBuf, message: String },

    #[error("Extraction error: {message}")]
    Extraction {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Write encoding error: {message}")]
    WriteEncoding {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Plugin error in '{plugin_name}': {message}")]
    Plugin { message: String, plugin_name: String },

    #[error("{0}")]
    Other(String),
}

impl From<serde_json::Error> for DocshardError {
    fn from(err: serde_json::Error) -> Self {
        DocshardError::WriteEncoding {
            message: err.to_string(),
            source: Some(Box::new(err)),
        }
    }
}

#[cfg(feature = "pdf")]
impl From<crate::pdf::error::PdfError> for DocshardError {
    fn from(err: crate::pdf::error::PdfError) -> Self {
        DocshardError::Extraction {
            message: err.to_string(),
            source: Some(Box::new(err)),
        }
    }
}

macro_rules! error_constructor {
    ($name:ident, $variant:ident) => {
        pastey::paste! {
            #[doc = "Create a " $variant " error"]
            pub fn $name<S: Into<String>>(message: S) -> Self {
                Self::$variant {
                    message: message.into(),
                    source: None,
                }
            }

            #[doc = "Create a " $variant " error with source"]
            pub fn [<$name _with_source>]<S: Into<String>, E: std::error::Error + Send + Sync + 'static>(
                message: S,
                source: E,
            ) -> Self {
                Self::$variant {
                    message: message.into(),
                    source: Some(Box::new(source)),
                }
            }
        }
    };
}

impl DocshardError {
    error_constructor!(configuration, Configuration);
    error_constructor!(extraction, Extraction);
    error_constructor!(write_encoding, WriteEncoding);

    /// Create a `DocumentUnavailable` error for `path`.
    pub fn unavailable<P: Into<PathBuf>, S: Into<String>>(path: P, message: S) -> Self {
        Self::DocumentUnavailable {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a `Plugin` error attributed to `plugin_name`.
    pub fn plugin<N: Into<String>, S: Into<String>>(plugin_name: N, message: S) -> Self {
        Self::Plugin {
            message: message.into(),
            plugin_name: plugin_name.into(),
        }
    }

    /// Whether this error only concerns a single document or record.
    ///
    /// The orchestrator counts these and keeps going; everything else stops the run.
    pub fn is_per_document(&self) -> bool {
        matches!(
            self,
            Self::DocumentUnavailable { .. } | Self::Extraction { .. } | Self::WriteEncoding { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_from() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: DocshardError = io_err.into();
        assert!(matches!(err, DocshardError::Io(_)));
        assert!(err.to_string().contains("IO error"));
        assert!(!err.is_per_document());
    }

    #[test]
    fn test_configuration_error() {
        let err = DocshardError::configuration("input path does not exist");
        assert_eq!(err.to_string(), "Configuration error: input path does not exist");
        assert!(!err.is_per_document());
    }

    #[test]
    fn test_configuration_error_with_source() {
        let source = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err = DocshardError::configuration_with_source("cannot read manifest", source);
        assert_eq!(err.to_string(), "Configuration error: cannot read manifest");
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_document_unavailable_mentions_path() {
        let err = DocshardError::unavailable("/data/missing.pdf", "file does not exist");
        assert_eq!(
            err.to_string(),
            "Document unavailable: /data/missing.pdf: file does not exist"
        );
        assert!(err.is_per_document());
    }

    #[test]
    fn test_extraction_error_is_per_document() {
        let err = DocshardError::extraction("no pages");
        assert_eq!(err.to_string(), "Extraction error: no pages");
        assert!(err.is_per_document());
    }

    #[test]
    fn test_serde_json_error_becomes_write_encoding() {
        let json_err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let err: DocshardError = json_err.into();
        assert!(matches!(err, DocshardError::WriteEncoding { .. }));
        assert!(err.is_per_document());
    }

    #[test]
    fn test_plugin_error() {
        let err = DocshardError::plugin("whatlang", "model failed to load");
        assert_eq!(err.to_string(), "Plugin error in 'whatlang': model failed to load");
        assert!(!err.is_per_document());
    }

    #[test]
    #[cfg(feature = "pdf")]
    fn test_pdf_error_conversion() {
        let pdf_err = crate::pdf::error::PdfError::InvalidPdf("corrupt xref".to_string());
        let err: DocshardError = pdf_err.into();
        assert!(matches!(err, DocshardError::Extraction { .. }));
    }

    #[test]
    fn test_io_error_bubbles_unchanged() {
        fn read_shard() -> Result<String> {
            let content = std::fs::read_to_string("/nonexistent/output_01.jsonl")?;
            Ok(content)
        }

        assert!(matches!(read_shard().unwrap_err(), DocshardError::Io(_)));
    }
}
