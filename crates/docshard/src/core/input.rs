//! Input resolution.
//!
//! The input is either a single document or a manifest: a text file listing one
//! document path per line.

use super::io::validate_file_exists;
use crate::{DocshardError, Result};
use std::path::{Path, PathBuf};

/// Extensions that mark an input file as a manifest.
pub const MANIFEST_EXTENSIONS: &[&str] = &["txt", "lst"];

/// Whether `path` is treated as a manifest rather than a document.
pub fn is_manifest(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| MANIFEST_EXTENSIONS.iter().any(|m| ext.eq_ignore_ascii_case(m)))
        .unwrap_or(false)
}

/// Produce the ordered list of document paths for a run.
///
/// Manifest lines are trimmed; blank lines and lines starting with `#` are
/// dropped. Relative entries resolve against the manifest's directory.
/// Duplicates are kept in order.
///
/// # Errors
///
/// Returns `DocshardError::Configuration` if the input does not exist or the
/// manifest cannot be read.
pub fn resolve_inputs(input: &Path) -> Result<Vec<PathBuf>> {
    validate_file_exists(input)?;

    if !is_manifest(input) {
        return Ok(vec![input.to_path_buf()]);
    }

    let content = std::fs::read_to_string(input).map_err(|e| {
        DocshardError::configuration_with_source(format!("Cannot read manifest {}", input.display()), e)
    })?;

    let base = input.parent().unwrap_or_else(|| Path::new(""));
    let paths: Vec<PathBuf> = content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(|line| {
            let entry = Path::new(line);
            if entry.is_absolute() {
                entry.to_path_buf()
            } else {
                base.join(entry)
            }
        })
        .collect();

    tracing::debug!(manifest = %input.display(), count = paths.len(), "Resolved manifest entries");
    Ok(paths)
}
