//! File I/O utilities.
//!
//! Path normalization and the availability checks every document goes through
//! before an extractor sees it.

use crate::normalize::sanitize;
use crate::{DocshardError, Result};
use std::path::{Component, Path, PathBuf};

/// Bytes per MiB, the unit of `DocumentRecord::size_mb`.
const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// A document that passed the availability checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentFile {
    /// Absolute, normalized path.
    pub path: PathBuf,
    pub size_bytes: u64,
}

impl DocumentFile {
    /// File size in MiB rounded to two decimals.
    pub fn size_mb(&self) -> f64 {
        size_mb(self.size_bytes)
    }
}

/// Convert a byte count to MiB rounded to two decimals.
pub fn size_mb(size_bytes: u64) -> f64 {
    (size_bytes as f64 / BYTES_PER_MB * 100.0).round() / 100.0
}

/// Check if a file exists.
pub fn file_exists(path: impl AsRef<Path>) -> bool {
    path.as_ref().exists()
}

/// Validate that an input path exists.
///
/// # Errors
///
/// Returns `DocshardError::Configuration` if it doesn't.
pub fn validate_file_exists(path: impl AsRef<Path>) -> Result<()> {
    if !file_exists(&path) {
        return Err(DocshardError::configuration(format!(
            "Input path does not exist: {}",
            path.as_ref().display()
        )));
    }
    Ok(())
}

/// Resolve `.` and `..` components without touching the filesystem.
///
/// `..` at the root stays at the root.
pub fn lexical_normalize(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !normalized.pop() && !path.has_root() {
                    normalized.push("..");
                }
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}

/// Absolute, normalized form of `path`.
///
/// Symlinks are resolved when the file exists. Missing files are normalized
/// lexically against the current directory so they still get a stable identity.
pub fn normalize_path(path: &Path) -> PathBuf {
    if let Ok(canonical) = std::fs::canonicalize(path) {
        return canonical;
    }

    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    };
    lexical_normalize(&absolute)
}

/// The string used as `source_path` and as the resume key.
pub fn path_key(path: &Path) -> String {
    sanitize(&path.to_string_lossy()).into_owned()
}

/// Check that a document can be handed to an extractor.
///
/// The path must be at most `max_path_length` bytes and point at a non-empty
/// regular file.
///
/// # Errors
///
/// Returns `DocshardError::DocumentUnavailable` describing the first failed check.
pub fn validate_document(path: &Path, max_path_length: usize) -> Result<DocumentFile> {
    let path_len = path.as_os_str().len();
    if path_len > max_path_length {
        return Err(DocshardError::unavailable(
            path,
            format!("path is {path_len} bytes, limit is {max_path_length}"),
        ));
    }

    let metadata = match std::fs::metadata(path) {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(DocshardError::unavailable(path, "file does not exist"));
        }
        Err(e) => return Err(DocshardError::unavailable(path, format!("cannot stat file: {e}"))),
    };

    if !metadata.is_file() {
        return Err(DocshardError::unavailable(path, "not a regular file"));
    }
    if metadata.len() == 0 {
        return Err(DocshardError::unavailable(path, "file is empty"));
    }

    Ok(DocumentFile {
        path: path.to_path_buf(),
        size_bytes: metadata.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_size_mb_rounds_to_two_decimals() {
        assert_eq!(size_mb(0), 0.0);
        assert_eq!(size_mb(1024 * 1024), 1.0);
        assert_eq!(size_mb(1024 * 1024 + 1024 * 1024 / 3), 1.33);
        assert_eq!(size_mb(5 * 1024), 0.0);
    }

    #[test]
    fn test_lexical_normalize() {
        assert_eq!(lexical_normalize(Path::new("/a/./b/../c")), PathBuf::from("/a/c"));
        assert_eq!(lexical_normalize(Path::new("/../x")), PathBuf::from("/x"));
        assert_eq!(lexical_normalize(Path::new("a/../../b")), PathBuf::from("../b"));
    }

    #[test]
    fn test_normalize_path_missing_file_is_absolute() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("sub").join("..").join("missing.pdf");
        let normalized = normalize_path(&missing);
        assert!(normalized.is_absolute());
        assert!(normalized.ends_with("missing.pdf"));
        assert!(!normalized.to_string_lossy().contains(".."));
    }

    #[test]
    fn test_validate_document_ok() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("doc.pdf");
        fs::write(&path, b"%PDF-1.5").unwrap();

        let file = validate_document(&path, 4096).unwrap();
        assert_eq!(file.size_bytes, 8);
        assert_eq!(file.path, path);
    }

    #[test]
    fn test_validate_document_missing() {
        let dir = tempdir().unwrap();
        let err = validate_document(&dir.path().join("nope.pdf"), 4096).unwrap_err();
        assert!(matches!(err, DocshardError::DocumentUnavailable { .. }));
        assert!(err.to_string().contains("does not exist"));
    }

    #[test]
    fn test_validate_document_empty_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("empty.pdf");
        fs::write(&path, b"").unwrap();
        let err = validate_document(&path, 4096).unwrap_err();
        assert!(err.to_string().contains("empty"));
    }

    #[test]
    fn test_validate_document_directory() {
        let dir = tempdir().unwrap();
        let err = validate_document(dir.path(), 4096).unwrap_err();
        assert!(err.to_string().contains("not a regular file"));
    }

    #[test]
    fn test_validate_document_path_too_long() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("doc.pdf");
        fs::write(&path, b"data").unwrap();
        let err = validate_document(&path, 4).unwrap_err();
        assert!(matches!(err, DocshardError::DocumentUnavailable { .. }));
        assert!(err.to_string().contains("limit is 4"));
    }

    #[test]
    fn test_validate_file_exists_is_configuration_error() {
        let err = validate_file_exists("/nonexistent/manifest.txt").unwrap_err();
        assert!(matches!(err, DocshardError::Configuration { .. }));
    }
}
