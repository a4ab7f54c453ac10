use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::PathBuf;
use std::time::Duration;

/// Language value written when detection is disabled or inconclusive.
pub const LANGUAGE_NOT_DETECTED: &str = "none";

/// Delimiter between the fields of a flattened outline entry.
pub const TOC_DELIMITER: &str = "|||";

// ============================================================================
// Output records
// ============================================================================

/// One line of output: a fully normalized document.
///
/// `source_path` is the identity used for resume and deduplication. Every string
/// field has already been through the sanitizer when a record is built by the
/// pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub source_path: String,
    pub size_mb: f64,
    /// Reserved. Records are only ever emitted for readable documents.
    pub available: bool,
    pub metadata: BTreeMap<String, serde_json::Value>,
    /// Unix timestamp (seconds) of record creation, as a decimal string.
    pub processed_at: String,
    pub language: String,
    pub pages_text: Vec<String>,
    /// Base64 PNG per page; empty unless page image capture is enabled.
    #[serde(default)]
    pub pages_image: Vec<String>,
    pub xref_subtypes: Vec<String>,
    pub toc_entries: Vec<String>,
}

// ============================================================================
// Extractor output
// ============================================================================

/// Page text as handed over by an extractor, before sanitization.
///
/// Extractors pass text through in whatever form they decoded it so the
/// sanitizer is the single place that deals with broken encodings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawText {
    Utf8(String),
    /// Bytes that are expected to be UTF-8 but may contain invalid sequences
    /// or encoded surrogates.
    Bytes(Vec<u8>),
    /// UTF-16 code units, possibly with unpaired surrogates.
    Utf16(Vec<u16>),
}

impl From<String> for RawText {
    fn from(text: String) -> Self {
        RawText::Utf8(text)
    }
}

impl From<&str> for RawText {
    fn from(text: &str) -> Self {
        RawText::Utf8(text.to_string())
    }
}

/// A single document outline (bookmark) entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutlineEntry {
    /// 1-based nesting level.
    pub level: u32,
    pub title: String,
    /// 1-based target page, `None` when the entry has no resolvable destination.
    pub page: Option<u32>,
}

impl OutlineEntry {
    /// Flatten into the `level|||title|||page` form used in `toc_entries`.
    ///
    /// Entries without a destination use page `-1`.
    pub fn flatten(&self) -> String {
        let page = self.page.map(i64::from).unwrap_or(-1);
        format!("{}{TOC_DELIMITER}{}{TOC_DELIMITER}{}", self.level, self.title, page)
    }
}

/// Everything a document extractor returns for one file.
#[derive(Debug, Clone, Default)]
pub struct DocumentExtractionResult {
    /// Loosely typed document metadata (e.g. the PDF Info dictionary).
    pub metadata: serde_json::Map<String, serde_json::Value>,
    /// One entry per page, in physical page order.
    pub pages: Vec<RawText>,
    /// One entry per page when image capture was requested, otherwise empty.
    pub page_images: Vec<Option<Vec<u8>>>,
    /// Distinct structural object subtypes (e.g. `/Image`, `/Link`).
    pub xref_subtypes: BTreeSet<String>,
    pub outline: Vec<OutlineEntry>,
}

impl DocumentExtractionResult {
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }
}

// ============================================================================
// Shard and resume state
// ============================================================================

/// The shard currently being appended to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShardDescriptor {
    /// 1-based shard index.
    pub index: u32,
    pub path: PathBuf,
    /// Records already present in the shard.
    pub line_count: usize,
}

/// State reconstructed from existing output before a run starts.
#[derive(Debug, Clone)]
pub struct ResumeState {
    /// `source_path` of every record found across all existing shards.
    pub processed_paths: HashSet<String>,
    pub current_shard: ShardDescriptor,
    /// Number of shard files found on disk.
    pub shard_count: usize,
    /// Total number of records read while collecting `processed_paths`.
    pub record_count: usize,
    /// Widest zero-padded index among existing shard names (0 when none exist).
    pub index_width: usize,
}

// ============================================================================
// Run accounting
// ============================================================================

/// Why a document ended up `FAILED`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    /// Missing, empty, not a regular file, or path too long.
    Unavailable,
    /// The extractor returned an error or panicked.
    Extraction,
    /// Extraction succeeded but the document has no pages.
    EmptyDocument,
    /// The record could not be serialized.
    WriteEncoding,
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            FailureReason::Unavailable => "unavailable",
            FailureReason::Extraction => "extraction",
            FailureReason::EmptyDocument => "empty_document",
            FailureReason::WriteEncoding => "write_encoding",
        };
        f.write_str(label)
    }
}

/// Terminal state of one input path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentOutcome {
    Written { shard_index: u32 },
    Skipped,
    Failed { reason: FailureReason, message: String },
}

/// Totals reported at the end of a run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    /// Paths produced by the input resolver.
    pub resolved: usize,
    /// Paths skipped because they were already recorded.
    pub skipped: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Failures broken down by reason.
    pub failures_by_reason: BTreeMap<String, usize>,
    /// Shard files opened for the first time during this run.
    pub shards_created: usize,
    pub last_shard_index: u32,
    pub cancelled: bool,
    #[serde(with = "duration_secs")]
    pub elapsed: Duration,
}

impl BatchSummary {
    pub(crate) fn record(&mut self, outcome: &DocumentOutcome) {
        match outcome {
            DocumentOutcome::Written { .. } => self.succeeded += 1,
            DocumentOutcome::Skipped => self.skipped += 1,
            DocumentOutcome::Failed { reason, .. } => {
                self.failed += 1;
                *self.failures_by_reason.entry(reason.to_string()).or_insert(0) += 1;
            }
        }
    }

    /// Add the outcome counts of `other` (shard and timing fields are left alone).
    pub(crate) fn absorb(&mut self, other: &BatchSummary) {
        self.skipped += other.skipped;
        self.succeeded += other.succeeded;
        self.failed += other.failed;
        for (reason, count) in &other.failures_by_reason {
            *self.failures_by_reason.entry(reason.clone()).or_insert(0) += count;
        }
    }

    /// Paths handed to an extractor or rejected before extraction, i.e. not skipped.
    pub fn attempted(&self) -> usize {
        self.succeeded + self.failed
    }

    /// Paths that reached any terminal state.
    pub fn settled(&self) -> usize {
        self.succeeded + self.failed + self.skipped
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(value.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Ok(Duration::from_secs_f64(secs.max(0.0)))
    }
}
