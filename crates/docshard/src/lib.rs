//! docshard - resumable batch conversion of document collections into sharded
//! JSON Lines datasets.
//!
//! Given a single document or a manifest of document paths, docshard extracts
//! every document, normalizes the result (sanitized text, epoch timestamps for
//! dates, flattened outlines) and appends one record per line to size-bounded
//! shard files. Interrupted runs can be resumed: existing shards are rescanned
//! and documents already recorded are skipped.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use docshard::{BatchConfig, BatchProcessor};
//!
//! # fn main() -> docshard::Result<()> {
//! let mut config = BatchConfig::new("manifest.txt");
//! config.output_path = "dataset/corpus.jsonl".into();
//! config.max_lines_per_shard = 5_000;
//! config.resume = true;
//!
//! let summary = BatchProcessor::with_default_plugins(config)?.run()?;
//! println!("{} written, {} failed, {} skipped", summary.succeeded, summary.failed, summary.skipped);
//! # Ok(())
//! # }
//! ```
//!
//! # Architecture
//!
//! - **Core Module** (`core`): input resolution, resume tracking, shard writing, orchestration
//! - **Normalization** (`normalize`): text sanitization and metadata date parsing
//! - **Plugin System** (`plugins`): extractor and language detector traits
//! - **Extractors**: the bundled lopdf-based PDF extractor
//!
//! # Features
//!
//! - `pdf` (default): bundled PDF extractor
//! - `pdf-render`: page images through pdfium
//! - `language-detection` (default): whatlang-based detector
//! - `simd-utf8` (default): SIMD UTF-8 validation in the sanitizer

#![deny(unsafe_code)]

pub mod core;
pub mod error;
pub mod extractors;
pub mod normalize;
pub mod plugins;
pub mod types;

#[cfg(feature = "language-detection")]
pub mod language_detection;

#[cfg(feature = "pdf")]
pub mod pdf;

pub use error::{DocshardError, Result};
pub use types::*;

pub use core::cancel::CancellationFlag;
pub use core::config::BatchConfig;
pub use core::pipeline::BatchProcessor;

pub use plugins::{DocumentExtractor, ExtractionOptions, LanguageDetector, Plugin};

#[cfg(feature = "pdf")]
pub use extractors::PdfExtractor;

#[cfg(feature = "language-detection")]
pub use language_detection::WhatlangDetector;
