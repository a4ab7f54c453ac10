//! Batch orchestration.
//!
//! [`BatchProcessor`] drives a whole run: it resolves the inputs, rebuilds
//! resume state, then moves every path through
//! `PENDING -> SKIPPED | FAILED | WRITTEN` and returns a [`BatchSummary`].
//!
//! Per-document problems (unavailable files, extractor errors, empty documents,
//! records that cannot be encoded) are logged with the path and counted; they
//! never stop the run. Configuration problems and I/O failures on the shard
//! files do.
//!
//! Two execution modes share the per-document logic:
//!
//! - [`BatchProcessor::run`] handles one document at a time.
//! - [`BatchProcessor::run_concurrent`] extracts on a bounded pool of blocking
//!   workers and funnels records to a single writer task, so shard state has one
//!   owner. Records land in completion order.

use super::cancel::CancellationFlag;
use super::config::BatchConfig;
use super::input::resolve_inputs;
use super::io::{DocumentFile, normalize_path, path_key, validate_document};
use super::resume;
use super::shard::{MIN_INDEX_WIDTH, ShardLayout, ShardStats, ShardWriter};
use crate::normalize::{normalize_metadata, sanitize, sanitize_raw};
use crate::plugins::{DocumentExtractor, ExtractionOptions, LanguageDetector};
use crate::types::{
    BatchSummary, DocumentExtractionResult, DocumentOutcome, DocumentRecord, FailureReason, LANGUAGE_NOT_DETECTED,
};
use crate::{DocshardError, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::Serialize;
use std::collections::HashSet;
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{Semaphore, mpsc};
use tokio::task::JoinSet;

/// Why a single document did not produce a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentFailure {
    pub reason: FailureReason,
    pub message: String,
}

impl DocumentFailure {
    fn new(reason: FailureReason, message: impl Into<String>) -> Self {
        Self {
            reason,
            message: message.into(),
        }
    }

    fn from_error(err: &DocshardError) -> Self {
        let reason = match err {
            DocshardError::DocumentUnavailable { .. } => FailureReason::Unavailable,
            DocshardError::WriteEncoding { .. } => FailureReason::WriteEncoding,
            _ => FailureReason::Extraction,
        };
        Self::new(reason, err.to_string())
    }

    fn into_outcome(self) -> DocumentOutcome {
        DocumentOutcome::Failed {
            reason: self.reason,
            message: self.message,
        }
    }
}

/// Everything a worker needs to turn a path into a record.
#[derive(Clone)]
struct DocumentContext {
    extractor: Arc<dyn DocumentExtractor>,
    detector: Option<Arc<dyn LanguageDetector>>,
    options: ExtractionOptions,
    max_path_length: usize,
}

/// State built before the first document is dispatched.
struct Prepared {
    inputs: Vec<PathBuf>,
    claimed: HashSet<String>,
    writer: ShardWriter,
}

/// Orchestrates one batch run.
///
/// # Example
///
/// ```rust,no_run
/// use docshard::core::config::BatchConfig;
/// use docshard::core::pipeline::BatchProcessor;
///
/// # fn example() -> docshard::Result<()> {
/// let mut config = BatchConfig::new("inputs.txt");
/// config.output_path = "out/corpus.jsonl".into();
/// config.resume = true;
///
/// let processor = BatchProcessor::with_default_plugins(config)?;
/// let summary = processor.run()?;
/// println!("{} written, {} failed", summary.succeeded, summary.failed);
/// # Ok(())
/// # }
/// ```
pub struct BatchProcessor {
    config: BatchConfig,
    extractor: Arc<dyn DocumentExtractor>,
    detector: Option<Arc<dyn LanguageDetector>>,
    cancellation: CancellationFlag,
}

impl std::fmt::Debug for BatchProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchProcessor")
            .field("config", &self.config)
            .field("extractor", &self.extractor.name())
            .field("detector", &self.detector.as_ref().map(|d| d.name().to_string()))
            .finish()
    }
}

impl BatchProcessor {
    /// Create a processor around `extractor`.
    ///
    /// # Errors
    ///
    /// Returns `DocshardError::Configuration` if `config` is invalid.
    pub fn new(config: BatchConfig, extractor: Arc<dyn DocumentExtractor>) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            extractor,
            detector: None,
            cancellation: CancellationFlag::new(),
        })
    }

    /// Processor using the bundled PDF extractor and, when language detection
    /// is enabled and compiled in, the whatlang detector.
    #[cfg(feature = "pdf")]
    pub fn with_default_plugins(config: BatchConfig) -> Result<Self> {
        let detect = config.language_detection;
        let processor = Self::new(config, Arc::new(crate::extractors::PdfExtractor::new()))?;

        #[cfg(feature = "language-detection")]
        if detect {
            return Ok(processor.with_language_detector(Arc::new(
                crate::language_detection::WhatlangDetector::default(),
            )));
        }
        #[cfg(not(feature = "language-detection"))]
        let _ = detect;

        Ok(processor)
    }

    pub fn with_language_detector(mut self, detector: Arc<dyn LanguageDetector>) -> Self {
        self.detector = Some(detector);
        self
    }

    /// Use an externally owned cancellation flag.
    pub fn with_cancellation(mut self, cancellation: CancellationFlag) -> Self {
        self.cancellation = cancellation;
        self
    }

    /// Handle that stops the run when set.
    pub fn cancellation_flag(&self) -> CancellationFlag {
        self.cancellation.clone()
    }

    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    /// Process every input one after another.
    ///
    /// # Errors
    ///
    /// Returns `DocshardError::Configuration` for unusable inputs, output
    /// directories or plugins, and `DocshardError::Io` when a shard cannot be
    /// written. Per-document failures are counted in the summary instead.
    pub fn run(&self) -> Result<BatchSummary> {
        let started = Instant::now();
        let ctx = self.document_context()?;
        let Prepared {
            inputs,
            mut claimed,
            mut writer,
        } = self.prepare()?;

        let mut summary = BatchSummary {
            resolved: inputs.len(),
            ..Default::default()
        };

        for raw in &inputs {
            if self.cancellation.is_cancelled() {
                summary.cancelled = true;
                break;
            }

            let outcome = match claim(raw, &mut claimed) {
                None => DocumentOutcome::Skipped,
                Some(path) => match process_document(&ctx, &path) {
                    Ok(record) => match append_record(&mut writer, &record) {
                        Ok(outcome) => outcome,
                        Err(e) => {
                            close_after_failure(writer);
                            self.shutdown_plugins();
                            return Err(e);
                        }
                    },
                    Err(failure) => failure.into_outcome(),
                },
            };

            log_outcome(raw, &outcome);
            summary.record(&outcome);
            self.report_progress(&summary);
        }

        let stats = writer.finish()?;
        Ok(self.complete(summary, stats, started))
    }

    /// Process inputs on a bounded worker pool with a single writer.
    ///
    /// The pool size is [`BatchConfig::concurrency`]. Extraction runs on
    /// blocking threads; a panicking extractor counts as an extraction failure.
    ///
    /// # Errors
    ///
    /// Same as [`run`](Self::run).
    pub async fn run_concurrent(&self) -> Result<BatchSummary> {
        let started = Instant::now();
        let ctx = self.document_context()?;
        let Prepared {
            inputs,
            mut claimed,
            writer,
        } = self.prepare()?;

        let concurrency = self.config.concurrency();
        let mut summary = BatchSummary {
            resolved: inputs.len(),
            ..Default::default()
        };

        let (tx, rx) = mpsc::channel::<(PathBuf, DocumentRecord)>(concurrency * 2);
        let writer_task = tokio::task::spawn_blocking(move || write_loop(writer, rx));

        let semaphore = Arc::new(Semaphore::new(concurrency));
        let mut tasks: JoinSet<Option<(PathBuf, DocumentFailure)>> = JoinSet::new();

        tracing::info!(concurrency, inputs = inputs.len(), "Starting concurrent batch");

        for raw in inputs {
            if self.cancellation.is_cancelled() {
                summary.cancelled = true;
                break;
            }
            if writer_task.is_finished() {
                break;
            }

            let Some(path) = claim(&raw, &mut claimed) else {
                log_outcome(&raw, &DocumentOutcome::Skipped);
                summary.record(&DocumentOutcome::Skipped);
                continue;
            };

            let permit = Arc::clone(&semaphore)
                .acquire_owned()
                .await
                .map_err(|e| DocshardError::Other(format!("Worker pool closed: {}", e)))?;

            while let Some(joined) = tasks.try_join_next() {
                record_task_result(joined, &mut summary);
            }

            let ctx = ctx.clone();
            let tx = tx.clone();
            tasks.spawn(async move {
                let _permit = permit;
                let worker_path = path.clone();
                let processed = tokio::task::spawn_blocking(move || process_document(&ctx, &worker_path))
                    .await
                    .unwrap_or_else(|e| {
                        Err(DocumentFailure::new(
                            FailureReason::Extraction,
                            format!("Extraction task failed: {}", e),
                        ))
                    });

                match processed {
                    Ok(record) => {
                        // A closed channel means the writer stopped on a fatal error.
                        let _ = tx.send((path, record)).await;
                        None
                    }
                    Err(failure) => Some((path, failure)),
                }
            });

            self.report_progress_dispatched(&summary, tasks.len());
        }

        while let Some(joined) = tasks.join_next().await {
            record_task_result(joined, &mut summary);
        }
        drop(tx);

        let (stats, written) = writer_task
            .await
            .map_err(|e| DocshardError::Other(format!("Shard writer task failed: {}", e)))?
            .inspect_err(|_| self.shutdown_plugins())?;
        summary.absorb(&written);

        Ok(self.complete(summary, stats, started))
    }

    fn document_context(&self) -> Result<DocumentContext> {
        let mut capture_images = self.config.page_images;
        if capture_images && !self.extractor.supports_page_images() {
            tracing::warn!(
                extractor = self.extractor.name(),
                "Page images requested but the extractor cannot render pages; pages_image will be empty"
            );
            capture_images = false;
        }

        let detector = if self.config.language_detection {
            match &self.detector {
                Some(detector) => Some(Arc::clone(detector)),
                None => {
                    return Err(DocshardError::configuration(
                        "Language detection is enabled but no language detector is available",
                    ));
                }
            }
        } else {
            None
        };

        Ok(DocumentContext {
            extractor: Arc::clone(&self.extractor),
            detector,
            options: ExtractionOptions {
                capture_images,
                render_dpi: self.config.render_dpi,
            },
            max_path_length: self.config.max_path_length,
        })
    }

    fn prepare(&self) -> Result<Prepared> {
        let inputs = resolve_inputs(&self.config.input_path)?;

        let base_layout = ShardLayout::from_output_path(&self.config.output_path, MIN_INDEX_WIDTH);
        let mut state = if self.config.resume {
            resume::load(&base_layout)?
        } else {
            resume::locate(&base_layout)?
        };

        let width = ShardLayout::estimate_width(
            state.current_shard.index,
            inputs.len(),
            self.config.max_lines_per_shard,
            state.index_width,
        );
        let layout = base_layout.with_width(width);
        if state.shard_count > 0 && layout.align_widths()? > 0 {
            state.current_shard.path = layout.path_for(state.current_shard.index);
        }
        let writer = ShardWriter::open(layout, &state, self.config.max_lines_per_shard)?;

        self.initialize_plugins()?;

        tracing::info!(
            input = %self.config.input_path.display(),
            output = %self.config.output_path.display(),
            resolved = inputs.len(),
            already_processed = state.processed_paths.len(),
            shard = writer.current_index(),
            "Batch prepared"
        );

        Ok(Prepared {
            inputs,
            claimed: state.processed_paths,
            writer,
        })
    }

    fn initialize_plugins(&self) -> Result<()> {
        self.extractor.initialize().map_err(|e| {
            let name = self.extractor.name();
            DocshardError::configuration_with_source(
                format!("Failed to initialize extractor '{}'", name),
                DocshardError::plugin(name, e.to_string()),
            )
        })?;
        if self.config.language_detection
            && let Some(detector) = &self.detector
        {
            detector.initialize().map_err(|e| {
                let name = detector.name();
                DocshardError::configuration_with_source(
                    format!("Failed to initialize language detector '{}'", name),
                    DocshardError::plugin(name, e.to_string()),
                )
            })?;
        }
        Ok(())
    }

    fn shutdown_plugins(&self) {
        if let Err(e) = self.extractor.shutdown() {
            tracing::warn!(plugin = self.extractor.name(), error = %e, "Plugin shutdown failed");
        }
        if self.config.language_detection
            && let Some(detector) = &self.detector
            && let Err(e) = detector.shutdown()
        {
            tracing::warn!(plugin = detector.name(), error = %e, "Plugin shutdown failed");
        }
    }

    fn report_progress(&self, summary: &BatchSummary) {
        let settled = summary.settled();
        if self.config.progress_interval > 0 && settled > 0 && settled % self.config.progress_interval == 0 {
            tracing::info!(
                settled,
                total = summary.resolved,
                succeeded = summary.succeeded,
                failed = summary.failed,
                skipped = summary.skipped,
                "Progress"
            );
        }
    }

    fn report_progress_dispatched(&self, summary: &BatchSummary, in_flight: usize) {
        let settled = summary.settled() + in_flight;
        if self.config.progress_interval > 0 && settled % self.config.progress_interval == 0 {
            tracing::info!(
                dispatched = settled,
                total = summary.resolved,
                failed = summary.failed,
                skipped = summary.skipped,
                in_flight,
                "Progress"
            );
        }
    }

    fn complete(&self, mut summary: BatchSummary, stats: ShardStats, started: Instant) -> BatchSummary {
        self.shutdown_plugins();

        summary.shards_created = stats.shards_created;
        summary.last_shard_index = stats.last_index;
        summary.elapsed = started.elapsed();

        tracing::info!(
            resolved = summary.resolved,
            succeeded = summary.succeeded,
            failed = summary.failed,
            skipped = summary.skipped,
            shards_created = summary.shards_created,
            last_shard = summary.last_shard_index,
            cancelled = summary.cancelled,
            elapsed_secs = summary.elapsed.as_secs_f64(),
            "Batch finished"
        );
        summary
    }
}

/// Normalize `raw` and claim it for this run.
///
/// Returns `None` when the path is already recorded or was claimed earlier in
/// the run.
fn claim(raw: &Path, claimed: &mut HashSet<String>) -> Option<PathBuf> {
    let path = normalize_path(raw);
    claimed.insert(path_key(&path)).then_some(path)
}

/// Validate, extract and normalize one document.
#[tracing::instrument(level = "debug", skip_all, fields(path = %path.display()))]
fn process_document(ctx: &DocumentContext, path: &Path) -> std::result::Result<DocumentRecord, DocumentFailure> {
    let file = validate_document(path, ctx.max_path_length).map_err(|e| DocumentFailure::from_error(&e))?;

    let extracted = std::panic::catch_unwind(AssertUnwindSafe(|| ctx.extractor.extract(path, &ctx.options)))
        .map_err(|panic| DocumentFailure::new(FailureReason::Extraction, panic_message(panic.as_ref())))?
        .map_err(|e| DocumentFailure::new(FailureReason::Extraction, e.to_string()))?;

    if extracted.page_count() == 0 {
        return Err(DocumentFailure::new(FailureReason::EmptyDocument, "document has no pages"));
    }

    Ok(build_record(ctx, &file, extracted))
}

fn build_record(ctx: &DocumentContext, file: &DocumentFile, extracted: DocumentExtractionResult) -> DocumentRecord {
    let pages_text: Vec<String> = extracted.pages.iter().map(sanitize_raw).collect();

    let language = ctx
        .detector
        .as_ref()
        .and_then(|detector| detector.detect(&pages_text.join(" ")))
        .map(|code| sanitize(&code).into_owned())
        .unwrap_or_else(|| LANGUAGE_NOT_DETECTED.to_string());

    let pages_image = if ctx.options.capture_images && !extracted.page_images.is_empty() {
        (0..pages_text.len())
            .map(|index| {
                extracted
                    .page_images
                    .get(index)
                    .and_then(Option::as_ref)
                    .map(|png| STANDARD.encode(png))
                    .unwrap_or_default()
            })
            .collect()
    } else {
        Vec::new()
    };

    DocumentRecord {
        source_path: path_key(&file.path),
        size_mb: file.size_mb(),
        available: true,
        metadata: normalize_metadata(Some(&extracted.metadata)),
        processed_at: chrono::Utc::now().timestamp().to_string(),
        language,
        pages_text,
        pages_image,
        xref_subtypes: extracted
            .xref_subtypes
            .iter()
            .map(|subtype| sanitize(subtype).into_owned())
            .collect(),
        toc_entries: extracted
            .outline
            .iter()
            .map(|entry| sanitize(&entry.flatten()).into_owned())
            .collect(),
    }
}

/// Append a record; encoding failures become a per-document outcome.
fn append_record<T: Serialize + ?Sized>(writer: &mut ShardWriter, record: &T) -> Result<DocumentOutcome> {
    match writer.append(record) {
        Ok(appended) => Ok(DocumentOutcome::Written {
            shard_index: appended.shard_index,
        }),
        Err(e) if e.is_per_document() => Ok(DocumentFailure::from_error(&e).into_outcome()),
        Err(e) => Err(e),
    }
}

fn write_loop(
    mut writer: ShardWriter,
    mut rx: mpsc::Receiver<(PathBuf, DocumentRecord)>,
) -> Result<(ShardStats, BatchSummary)> {
    let mut written = BatchSummary::default();
    while let Some((path, record)) = rx.blocking_recv() {
        match append_record(&mut writer, &record) {
            Ok(outcome) => {
                log_outcome(&path, &outcome);
                written.record(&outcome);
            }
            Err(e) => {
                tracing::error!(path = %path.display(), error = %e, "Shard write failed; stopping");
                close_after_failure(writer);
                return Err(e);
            }
        }
    }
    Ok((writer.finish()?, written))
}

fn close_after_failure(writer: ShardWriter) {
    if let Err(e) = writer.finish() {
        tracing::warn!(error = %e, "Flushing shard after write failure also failed");
    }
}

fn record_task_result(
    joined: std::result::Result<Option<(PathBuf, DocumentFailure)>, tokio::task::JoinError>,
    summary: &mut BatchSummary,
) {
    match joined {
        Ok(None) => {}
        Ok(Some((path, failure))) => {
            let outcome = failure.into_outcome();
            log_outcome(&path, &outcome);
            summary.record(&outcome);
        }
        Err(e) => {
            tracing::error!(error = %e, "Worker task failed");
            summary.record(&DocumentOutcome::Failed {
                reason: FailureReason::Extraction,
                message: e.to_string(),
            });
        }
    }
}

fn log_outcome(path: &Path, outcome: &DocumentOutcome) {
    match outcome {
        DocumentOutcome::Written { shard_index } => {
            tracing::debug!(path = %path.display(), shard = shard_index, "Document written");
        }
        DocumentOutcome::Skipped => {
            tracing::debug!(path = %path.display(), "Document already processed, skipping");
        }
        DocumentOutcome::Failed { reason, message } => {
            tracing::error!(path = %path.display(), reason = %reason, error = %message, "Document failed");
        }
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    let detail = panic
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string());
    format!("extractor panicked: {}", detail)
}
