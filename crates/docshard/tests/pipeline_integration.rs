//! End-to-end batch runs against a plain-text fixture extractor.
//!
//! Validates:
//! - per-document failures are counted without stopping the run
//! - shards rotate at `max_lines_per_shard` and preserve input order
//! - duplicates and cancellation are accounted for
//! - concurrent runs write every record exactly once
//! - runs without resume append to existing shards instead of replacing them

mod helpers;

use docshard::{
    BatchProcessor, CancellationFlag, DocumentExtractionResult, DocumentExtractor, ExtractionOptions,
    LanguageDetector, Plugin, Result,
};
use helpers::*;
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use tempfile::tempdir;

#[test]
fn test_missing_document_is_counted_and_run_continues() {
    let dir = tempdir().unwrap();
    let mut docs = write_docs(dir.path(), 2);
    docs.insert(1, dir.path().join("missing.pdf"));
    let manifest = write_manifest(dir.path(), &docs);
    let out = dir.path().join("out");

    let processor = BatchProcessor::new(config(&manifest, &out), Arc::new(TextExtractor::default())).unwrap();
    let summary = processor.run().unwrap();

    assert_eq!(summary.resolved, 3);
    assert_eq!(summary.succeeded, 2);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.failures_by_reason.get("unavailable"), Some(&1));
    assert!(!summary.cancelled);

    let shards = shard_files(&out);
    assert_eq!(shards.len(), 1);
    assert_eq!(shards[0], out.join("output_01.jsonl"));

    let records = read_records(&shards[0]);
    assert_eq!(records.len(), 2);
    let record = &records[0];
    assert_eq!(record["pages_text"][0], "page one of 0");
    assert_eq!(record["language"], "none");
    assert_eq!(record["available"], true);
    assert!(record["metadata"]["creationDate"].as_str().unwrap().parse::<i64>().is_ok());
    assert!(record["processed_at"].as_str().unwrap().parse::<i64>().is_ok());
}

#[test]
fn test_one_record_per_shard() {
    let dir = tempdir().unwrap();
    let manifest = write_manifest(dir.path(), &write_docs(dir.path(), 3));
    let out = dir.path().join("out");

    let mut config = config(&manifest, &out);
    config.max_lines_per_shard = 1;
    let summary = BatchProcessor::new(config, Arc::new(TextExtractor::default()))
        .unwrap()
        .run()
        .unwrap();

    assert_eq!(summary.succeeded, 3);
    assert_eq!(summary.shards_created, 3);
    assert_eq!(summary.last_shard_index, 3);

    let shards = shard_files(&out);
    assert_eq!(shards.len(), 3);
    for shard in &shards {
        assert_eq!(read_records(shard).len(), 1);
    }
}

#[test]
fn test_shard_concatenation_preserves_input_order() {
    let dir = tempdir().unwrap();
    let docs = write_docs(dir.path(), 7);
    let manifest = write_manifest(dir.path(), &docs);
    let out = dir.path().join("out");

    let mut config = config(&manifest, &out);
    config.max_lines_per_shard = 3;
    BatchProcessor::new(config, Arc::new(TextExtractor::default()))
        .unwrap()
        .run()
        .unwrap();

    let shards = shard_files(&out);
    let sizes: Vec<usize> = shards.iter().map(|shard| read_records(shard).len()).collect();
    assert_eq!(sizes, vec![3, 3, 1]);

    let written = source_paths(&all_records(&out));
    let expected: Vec<String> = docs.iter().map(|p| key(p)).collect();
    assert_eq!(written, expected);
}

#[test]
fn test_failure_reasons_are_tallied() {
    let dir = tempdir().unwrap();
    let docs = vec![
        write_doc(dir.path(), "good.pdf", "fine"),
        write_doc(dir.path(), "broken.pdf", "FAIL"),
        write_doc(dir.path(), "blank.pdf", "EMPTY"),
        write_doc(dir.path(), "zero.pdf", ""),
    ];
    let manifest = write_manifest(dir.path(), &docs);
    let out = dir.path().join("out");

    let extractor = Arc::new(TextExtractor::default());
    let summary = BatchProcessor::new(config(&manifest, &out), extractor.clone())
        .unwrap()
        .run()
        .unwrap();

    assert_eq!(summary.succeeded, 1);
    assert_eq!(summary.failed, 3);
    assert_eq!(summary.failures_by_reason.get("extraction"), Some(&1));
    assert_eq!(summary.failures_by_reason.get("empty_document"), Some(&1));
    assert_eq!(summary.failures_by_reason.get("unavailable"), Some(&1));
    assert_eq!(summary.attempted() + summary.skipped, summary.resolved);
    // The zero-byte file is rejected before extraction.
    assert_eq!(extractor.calls.load(Ordering::SeqCst), 3);
}

#[test]
fn test_duplicate_manifest_entries_are_skipped() {
    let dir = tempdir().unwrap();
    let doc = write_doc(dir.path(), "a.pdf", "text");
    let alias = dir.path().join(".").join("a.pdf");
    let manifest = write_manifest(dir.path(), &[doc.clone(), alias, doc]);
    let out = dir.path().join("out");

    let summary = BatchProcessor::new(config(&manifest, &out), Arc::new(TextExtractor::default()))
        .unwrap()
        .run()
        .unwrap();

    assert_eq!(summary.resolved, 3);
    assert_eq!(summary.succeeded, 1);
    assert_eq!(summary.skipped, 2);
    assert_eq!(all_records(&out).len(), 1);
}

#[test]
fn test_no_records_leaves_output_untouched() {
    let dir = tempdir().unwrap();
    let doc = write_doc(dir.path(), "broken.pdf", "FAIL");
    let out = dir.path().join("out");

    let summary = BatchProcessor::new(config(&doc, &out), Arc::new(TextExtractor::default()))
        .unwrap()
        .run()
        .unwrap();

    assert_eq!(summary.failed, 1);
    assert_eq!(summary.shards_created, 0);
    assert!(shard_files(&out).is_empty());
}

#[test]
fn test_cancelled_before_start_writes_nothing() {
    let dir = tempdir().unwrap();
    let manifest = write_manifest(dir.path(), &write_docs(dir.path(), 3));
    let out = dir.path().join("out");

    let flag = CancellationFlag::new();
    flag.cancel();
    let summary = BatchProcessor::new(config(&manifest, &out), Arc::new(TextExtractor::default()))
        .unwrap()
        .with_cancellation(flag)
        .run()
        .unwrap();

    assert!(summary.cancelled);
    assert_eq!(summary.settled(), 0);
    assert!(shard_files(&out).is_empty());
}

/// Cancels the run from inside the first extraction.
struct CancellingExtractor {
    inner: TextExtractor,
    flag: CancellationFlag,
}

impl Plugin for CancellingExtractor {
    fn name(&self) -> &str {
        "cancelling-fixture"
    }

    fn version(&self) -> String {
        "1.0.0".to_string()
    }

    fn initialize(&self) -> Result<()> {
        Ok(())
    }

    fn shutdown(&self) -> Result<()> {
        Ok(())
    }
}

impl DocumentExtractor for CancellingExtractor {
    fn extract(&self, path: &Path, options: &ExtractionOptions) -> Result<DocumentExtractionResult> {
        self.flag.cancel();
        self.inner.extract(path, options)
    }
}

#[test]
fn test_cancellation_finishes_in_flight_document() {
    let dir = tempdir().unwrap();
    let manifest = write_manifest(dir.path(), &write_docs(dir.path(), 3));
    let out = dir.path().join("out");

    let flag = CancellationFlag::new();
    let extractor = Arc::new(CancellingExtractor {
        inner: TextExtractor::default(),
        flag: flag.clone(),
    });
    let summary = BatchProcessor::new(config(&manifest, &out), extractor)
        .unwrap()
        .with_cancellation(flag)
        .run()
        .unwrap();

    assert!(summary.cancelled);
    assert_eq!(summary.succeeded, 1);
    assert_eq!(summary.settled(), 1);
    assert_eq!(all_records(&out).len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_run_writes_each_document_once() {
    let dir = tempdir().unwrap();
    let mut docs = write_docs(dir.path(), 20);
    docs.push(write_doc(dir.path(), "broken.pdf", "FAIL"));
    docs.push(dir.path().join("missing.pdf"));
    let manifest = write_manifest(dir.path(), &docs);
    let out = dir.path().join("out");

    let mut config = config(&manifest, &out);
    config.max_lines_per_shard = 6;
    config.max_concurrent_extractions = Some(4);
    let summary = BatchProcessor::new(config, Arc::new(TextExtractor::default()))
        .unwrap()
        .run_concurrent()
        .await
        .unwrap();

    assert_eq!(summary.resolved, 22);
    assert_eq!(summary.succeeded, 20);
    assert_eq!(summary.failed, 2);
    assert_eq!(summary.shards_created, 4);

    let shards = shard_files(&out);
    let sizes: Vec<usize> = shards.iter().map(|shard| read_records(shard).len()).collect();
    assert_eq!(sizes, vec![6, 6, 6, 2]);

    let paths = source_paths(&all_records(&out));
    let distinct: HashSet<&String> = paths.iter().collect();
    assert_eq!(distinct.len(), 20);
}

#[tokio::test]
async fn test_concurrent_run_honours_cancellation() {
    let dir = tempdir().unwrap();
    let manifest = write_manifest(dir.path(), &write_docs(dir.path(), 5));
    let out = dir.path().join("out");

    let mut config = config(&manifest, &out);
    config.max_concurrent_extractions = Some(2);
    let processor = BatchProcessor::new(config, Arc::new(TextExtractor::default())).unwrap();
    processor.cancellation_flag().cancel();

    let summary = processor.run_concurrent().await.unwrap();
    assert!(summary.cancelled);
    assert_eq!(summary.succeeded, 0);
    assert!(shard_files(&out).is_empty());
}

#[test]
fn test_rerun_without_resume_appends() {
    let dir = tempdir().unwrap();
    let manifest = write_manifest(dir.path(), &write_docs(dir.path(), 3));
    let out = dir.path().join("out");

    let mut config = config(&manifest, &out);
    config.max_lines_per_shard = 2;

    for _ in 0..2 {
        BatchProcessor::new(config.clone(), Arc::new(TextExtractor::default()))
            .unwrap()
            .run()
            .unwrap();
    }

    let shards = shard_files(&out);
    let sizes: Vec<usize> = shards.iter().map(|shard| read_records(shard).len()).collect();
    assert_eq!(sizes, vec![2, 2, 2]);
    assert_eq!(all_records(&out).len(), 6);
}

struct FixedLanguage;

impl Plugin for FixedLanguage {
    fn name(&self) -> &str {
        "fixed-language"
    }

    fn version(&self) -> String {
        "1.0.0".to_string()
    }

    fn initialize(&self) -> Result<()> {
        Ok(())
    }

    fn shutdown(&self) -> Result<()> {
        Ok(())
    }
}

impl LanguageDetector for FixedLanguage {
    fn detect(&self, text: &str) -> Option<String> {
        (!text.trim().is_empty()).then(|| "fra".to_string())
    }
}

#[test]
fn test_language_detector_sets_language() {
    let dir = tempdir().unwrap();
    let doc = write_doc(dir.path(), "a.pdf", "bonjour");
    let out = dir.path().join("out");

    let mut config = config(&doc, &out);
    config.language_detection = true;
    BatchProcessor::new(config, Arc::new(TextExtractor::default()))
        .unwrap()
        .with_language_detector(Arc::new(FixedLanguage))
        .run()
        .unwrap();

    let records = all_records(&out);
    assert_eq!(records[0]["language"], "fra");
}

#[test]
fn test_page_images_are_base64_per_page() {
    let dir = tempdir().unwrap();
    let doc = write_doc(dir.path(), "a.pdf", "one\u{c}two");
    let out = dir.path().join("out");

    let mut config = config(&doc, &out);
    config.page_images = true;
    BatchProcessor::new(config, Arc::new(TextExtractor::default()))
        .unwrap()
        .run()
        .unwrap();

    let records = all_records(&out);
    let images = records[0]["pages_image"].as_array().unwrap();
    assert_eq!(images.len(), 2);
    // base64 of "png-bytes"
    assert_eq!(images[0], "cG5nLWJ5dGVz");
    assert_eq!(images[1], "");
}
