//! Resume tracking.
//!
//! Rebuilds the state of previous runs from the shards already on disk: which
//! documents have been recorded and where writing should continue.
//!
//! Shards are streamed line by line, so memory stays proportional to the number
//! of distinct source paths rather than the size of the output. Only lines that
//! end with `\n` count as records; a torn final line left by a crash is ignored
//! here and truncated by the writer before it appends.

use super::shard::{ShardFile, ShardLayout};
use crate::Result;
use crate::types::{ResumeState, ShardDescriptor};
use serde::Deserialize;
use std::collections::HashSet;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// The only part of a record resume needs.
#[derive(Debug, Deserialize)]
struct RecordKey {
    #[serde(alias = "file_path")]
    source_path: String,
}

/// Full scan: current position plus every recorded `source_path`.
///
/// Also reads the un-sharded base output file when present.
///
/// # Errors
///
/// Returns `DocshardError::Configuration` if the output directory cannot be read.
pub fn load(layout: &ShardLayout) -> Result<ResumeState> {
    let shards = layout.discover()?;
    let mut state = position(layout, &shards);

    let legacy = layout.base_path();
    if legacy.is_file() {
        collect_paths(&legacy, &mut state);
    }
    for shard in &shards {
        collect_paths(&shard.path, &mut state);
    }

    tracing::info!(
        shards = state.shard_count,
        records = state.record_count,
        distinct = state.processed_paths.len(),
        current_shard = state.current_shard.index,
        current_lines = state.current_shard.line_count,
        "Loaded resume state"
    );
    Ok(state)
}

/// Position only: where writing continues, with no processed paths.
///
/// Used when resume is disabled; existing shards are still appended to, never
/// overwritten.
///
/// # Errors
///
/// Returns `DocshardError::Configuration` if the output directory cannot be read.
pub fn locate(layout: &ShardLayout) -> Result<ResumeState> {
    let shards = layout.discover()?;
    Ok(position(layout, &shards))
}

fn position(layout: &ShardLayout, shards: &[ShardFile]) -> ResumeState {
    let index_width = shards.iter().map(|shard| shard.width).max().unwrap_or(0);

    let current_shard = match shards.last() {
        Some(last) => ShardDescriptor {
            index: last.index,
            path: last.path.clone(),
            line_count: count_records(&last.path),
        },
        None => ShardDescriptor {
            index: 1,
            path: layout.path_for(1),
            line_count: 0,
        },
    };

    ResumeState {
        processed_paths: HashSet::new(),
        current_shard,
        shard_count: shards.len(),
        record_count: 0,
        index_width,
    }
}

/// Complete, non-blank lines in a shard.
pub fn count_records(path: &Path) -> usize {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Cannot open shard for counting");
            return 0;
        }
    };

    let mut reader = BufReader::new(file);
    let mut line = Vec::new();
    let mut count = 0;
    loop {
        line.clear();
        match reader.read_until(b'\n', &mut line) {
            Ok(0) => break,
            Ok(_) => {
                if line.ends_with(b"\n") && !line.trim_ascii().is_empty() {
                    count += 1;
                }
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Error while counting shard lines");
                break;
            }
        }
    }
    count
}

fn collect_paths(path: &Path, state: &mut ResumeState) {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Cannot open output file for resume");
            return;
        }
    };

    let mut reader = BufReader::new(file);
    let mut line = Vec::new();
    let mut line_number = 0usize;
    loop {
        line.clear();
        let read = match reader.read_until(b'\n', &mut line) {
            Ok(read) => read,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Error while reading output file");
                break;
            }
        };
        if read == 0 {
            break;
        }
        line_number += 1;

        if !line.ends_with(b"\n") {
            tracing::warn!(path = %path.display(), line = line_number, "Ignoring incomplete trailing line");
            break;
        }
        let content = line.trim_ascii();
        if content.is_empty() {
            continue;
        }

        match serde_json::from_slice::<RecordKey>(content) {
            Ok(key) => {
                state.record_count += 1;
                state.processed_paths.insert(key.source_path);
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    line = line_number,
                    error = %e,
                    "Skipping unreadable record"
                );
            }
        }
    }
}
