//! Shared fixtures for integration tests.
#![allow(dead_code)]

use docshard::{
    BatchConfig, DocshardError, DocumentExtractionResult, DocumentExtractor, ExtractionOptions, Plugin, RawText,
    Result,
};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Treats files as plain text with form feeds between pages.
///
/// `FAIL` in the content makes extraction fail, `EMPTY` yields zero pages.
#[derive(Default)]
pub struct TextExtractor {
    pub calls: AtomicUsize,
}

impl Plugin for TextExtractor {
    fn name(&self) -> &str {
        "text-fixture"
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

impl DocumentExtractor for TextExtractor {
    fn extract(&self, path: &Path, options: &ExtractionOptions) -> Result<DocumentExtractionResult> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let content = fs::read_to_string(path)?;
        if content.contains("FAIL") {
            return Err(DocshardError::extraction("fixture refused the document"));
        }
        if content.contains("EMPTY") {
            return Ok(DocumentExtractionResult::default());
        }

        let pages: Vec<RawText> = content.split('\u{c}').map(RawText::from).collect();
        let page_images = if options.capture_images {
            (0..pages.len())
                .map(|i| if i == 0 { Some(b"png-bytes".to_vec()) } else { None })
                .collect()
        } else {
            Vec::new()
        };

        let mut metadata = serde_json::Map::new();
        metadata.insert("creationDate".to_string(), Value::from("D:20230115123045+01'00'"));
        metadata.insert("title".to_string(), Value::from(path.file_name().unwrap().to_string_lossy().into_owned()));

        Ok(DocumentExtractionResult {
            metadata,
            pages,
            page_images,
            ..Default::default()
        })
    }

    fn supports_page_images(&self) -> bool {
        true
    }
}

pub fn write_doc(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, content).unwrap();
    path
}

/// Create `count` documents named `doc_<n>.pdf`.
pub fn write_docs(dir: &Path, count: usize) -> Vec<PathBuf> {
    (0..count)
        .map(|i| write_doc(dir, &format!("doc_{i:03}.pdf"), &format!("page one of {i}\u{c}page two of {i}")))
        .collect()
}

pub fn write_manifest(dir: &Path, paths: &[PathBuf]) -> PathBuf {
    let manifest = dir.join("manifest.txt");
    let content: String = paths.iter().map(|p| format!("{}\n", p.display())).collect();
    fs::write(&manifest, content).unwrap();
    manifest
}

pub fn config(input: &Path, output_dir: &Path) -> BatchConfig {
    init_tracing();
    let mut config = BatchConfig::new(input);
    config.output_path = output_dir.join("output.jsonl");
    config
}

/// Route library logs through the test harness; `RUST_LOG` picks the level.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Shard files next to `output.jsonl`, ordered by index.
pub fn shard_files(output_dir: &Path) -> Vec<PathBuf> {
    let mut shards: Vec<(u64, PathBuf)> = fs::read_dir(output_dir)
        .map(|entries| {
            entries
                .filter_map(|entry| entry.ok().map(|e| e.path()))
                .filter_map(|path| {
                    let name = path.file_name()?.to_str()?.to_string();
                    let digits = name.strip_prefix("output_")?.strip_suffix(".jsonl")?;
                    Some((digits.parse().ok()?, path))
                })
                .collect()
        })
        .unwrap_or_default();
    shards.sort();
    shards.into_iter().map(|(_, path)| path).collect()
}

pub fn read_records(path: &Path) -> Vec<Value> {
    fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}

/// All records across all shards, in index order.
pub fn all_records(output_dir: &Path) -> Vec<Value> {
    shard_files(output_dir).iter().flat_map(|path| read_records(path)).collect()
}

pub fn source_paths(records: &[Value]) -> Vec<String> {
    records
        .iter()
        .map(|record| record["source_path"].as_str().unwrap().to_string())
        .collect()
}

/// The `source_path` a record for `path` carries.
pub fn key(path: &Path) -> String {
    fs::canonicalize(path).unwrap().to_string_lossy().into_owned()
}
