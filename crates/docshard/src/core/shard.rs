//! Sharded JSON Lines output.
//!
//! Records are appended to `<stem>_<index><suffix>` files next to the configured
//! output path, with the index zero-padded. A shard holds at most
//! `max_lines_per_shard` records; the writer rotates to the next index before a
//! record would overflow it.
//!
//! The writer is the only owner of the current index, line count and file
//! handle. Each record is serialized in full before anything touches the file,
//! so a record that cannot be encoded never leaves a partial line behind.

use crate::types::ResumeState;
use crate::{DocshardError, Result};
use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// Smallest zero-padding width for shard indices.
pub const MIN_INDEX_WIDTH: usize = 2;

const TAIL_SCAN_CHUNK: u64 = 8192;

/// Naming rule for shard files derived from the configured output path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShardLayout {
    dir: PathBuf,
    stem: String,
    suffix: String,
    width: usize,
}

/// A shard file found on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShardFile {
    pub index: u32,
    pub path: PathBuf,
    /// Number of digits in the file name's index.
    pub width: usize,
}

impl ShardLayout {
    /// Derive the layout from an output path such as `out/corpus.jsonl`.
    ///
    /// The directory defaults to `.`, the stem to `output` and the suffix keeps
    /// its leading dot (empty when the path has no extension).
    pub fn from_output_path(base: &Path, width: usize) -> Self {
        let dir = match base.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let stem = base
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "output".to_string());
        let suffix = base
            .extension()
            .map(|ext| format!(".{}", ext.to_string_lossy()))
            .unwrap_or_default();

        Self {
            dir,
            stem,
            suffix,
            width: width.max(MIN_INDEX_WIDTH),
        }
    }

    pub fn with_width(mut self, width: usize) -> Self {
        self.width = width.max(MIN_INDEX_WIDTH);
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn width(&self) -> usize {
        self.width
    }

    /// `<dir>/<stem>_<index padded to width><suffix>`
    pub fn path_for(&self, index: u32) -> PathBuf {
        self.dir
            .join(format!("{}_{:0width$}{}", self.stem, index, self.suffix, width = self.width))
    }

    /// The un-sharded output file (`<dir>/<stem><suffix>`).
    pub fn base_path(&self) -> PathBuf {
        self.dir.join(format!("{}{}", self.stem, self.suffix))
    }

    /// The digits between `<stem>_` and `<suffix>`, if `file_name` is a shard name.
    pub fn index_digits<'a>(&self, file_name: &'a str) -> Option<&'a str> {
        let digits = file_name
            .strip_prefix(self.stem.as_str())?
            .strip_prefix('_')?
            .strip_suffix(self.suffix.as_str())?;
        (!digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())).then_some(digits)
    }

    /// List existing shards sorted by index.
    ///
    /// Names whose index does not fit a `u32` are logged and skipped. A missing
    /// output directory yields an empty list.
    ///
    /// # Errors
    ///
    /// Returns `DocshardError::Configuration` if the output directory cannot be read.
    pub fn discover(&self) -> Result<Vec<ShardFile>> {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(DocshardError::configuration_with_source(
                    format!("Cannot read output directory {}", self.dir.display()),
                    e,
                ));
            }
        };

        let mut shards = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| {
                DocshardError::configuration_with_source(
                    format!("Cannot read output directory {}", self.dir.display()),
                    e,
                )
            })?;
            let file_name = entry.file_name();
            let Some(name) = file_name.to_str() else {
                continue;
            };
            let Some(digits) = self.index_digits(name) else {
                continue;
            };
            match digits.parse::<u32>() {
                Ok(index) => shards.push(ShardFile {
                    index,
                    path: entry.path(),
                    width: digits.len(),
                }),
                Err(e) => {
                    tracing::warn!(file = %name, error = %e, "Ignoring shard with unparseable index");
                }
            }
        }

        shards.sort_by_key(|shard| shard.index);
        Ok(shards)
    }

    /// Rename existing shards whose index is padded narrower than this layout.
    ///
    /// Keeps every shard name at one width so that lexicographic and numeric
    /// order agree once a resumed run needs more digits. Returns the number of
    /// files renamed.
    ///
    /// # Errors
    ///
    /// Returns `DocshardError::Configuration` if two shards share an index or
    /// the target name is already taken, and `DocshardError::Io` if a rename fails.
    pub fn align_widths(&self) -> Result<usize> {
        let mut renamed = 0;
        for shard in self.discover()? {
            if shard.width >= self.width {
                continue;
            }
            let target = self.path_for(shard.index);
            if target.exists() {
                return Err(DocshardError::configuration(format!(
                    "Cannot widen {} to {}: target already exists",
                    shard.path.display(),
                    target.display()
                )));
            }
            std::fs::rename(&shard.path, &target)?;
            tracing::info!(
                from = %shard.path.display(),
                to = %target.display(),
                "Renamed shard to wider index"
            );
            renamed += 1;
        }
        Ok(renamed)
    }

    /// Padding width for a run: wide enough for the last shard the run can
    /// reach, never narrower than existing names or [`MIN_INDEX_WIDTH`].
    pub fn estimate_width(current_index: u32, pending_inputs: usize, max_lines: usize, existing_width: usize) -> usize {
        let additional = pending_inputs.div_ceil(max_lines.max(1)) as u64;
        let last_index = u64::from(current_index) + additional;
        let digits = last_index.checked_ilog10().map(|d| d as usize + 1).unwrap_or(1);
        digits.max(existing_width).max(MIN_INDEX_WIDTH)
    }
}

/// Where a record ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppendOutcome {
    pub shard_index: u32,
    /// Whether this append opened a new shard.
    pub rotated: bool,
}

/// Totals reported when the writer is closed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShardStats {
    /// Shard files created by this writer.
    pub shards_created: usize,
    pub records_written: usize,
    pub last_index: u32,
    pub last_line_count: usize,
}

/// Appends records to the current shard, rotating when it is full.
pub struct ShardWriter {
    layout: ShardLayout,
    max_lines: usize,
    index: u32,
    line_count: usize,
    path: PathBuf,
    file: Option<BufWriter<File>>,
    shards_created: usize,
    records_written: usize,
}

impl std::fmt::Debug for ShardWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShardWriter")
            .field("path", &self.path)
            .field("index", &self.index)
            .field("line_count", &self.line_count)
            .field("max_lines", &self.max_lines)
            .finish()
    }
}

impl ShardWriter {
    /// Continue from the shard recorded in `state`.
    ///
    /// An existing shard keeps its discovered name; otherwise the name comes
    /// from `layout`.
    ///
    /// Nothing is opened until the first append, so a run that writes no
    /// records leaves the output untouched.
    ///
    /// # Errors
    ///
    /// Returns `DocshardError::Configuration` if `max_lines` is zero and
    /// `DocshardError::Io` if the output directory cannot be created.
    pub fn open(layout: ShardLayout, state: &ResumeState, max_lines: usize) -> Result<Self> {
        if max_lines == 0 {
            return Err(DocshardError::configuration("max_lines_per_shard must be greater than 0"));
        }
        std::fs::create_dir_all(layout.dir())?;

        let current = &state.current_shard;
        let path = if current.path.exists() {
            current.path.clone()
        } else {
            layout.path_for(current.index)
        };
        tracing::debug!(
            shard = current.index,
            path = %path.display(),
            line_count = current.line_count,
            "Shard writer positioned"
        );

        Ok(Self {
            layout,
            max_lines,
            index: current.index,
            line_count: current.line_count,
            path,
            file: None,
            shards_created: 0,
            records_written: 0,
        })
    }

    pub fn current_index(&self) -> u32 {
        self.index
    }

    pub fn line_count(&self) -> usize {
        self.line_count
    }

    pub fn current_path(&self) -> &Path {
        &self.path
    }

    /// Append one record as a single line.
    ///
    /// # Errors
    ///
    /// Returns `DocshardError::WriteEncoding` if the record cannot be serialized
    /// (nothing is written), and `DocshardError::Io` if the shard cannot be
    /// opened or written.
    pub fn append<T: Serialize + ?Sized>(&mut self, record: &T) -> Result<AppendOutcome> {
        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');

        let rotated = if self.line_count >= self.max_lines {
            self.rotate()?;
            true
        } else {
            false
        };

        let writer = self.ensure_open()?;
        writer.write_all(&line)?;
        writer.flush()?;

        self.line_count += 1;
        self.records_written += 1;
        Ok(AppendOutcome {
            shard_index: self.index,
            rotated,
        })
    }

    /// Flush and close the current shard.
    pub fn finish(mut self) -> Result<ShardStats> {
        if let Some(mut file) = self.file.take() {
            file.flush()?;
        }
        tracing::debug!(
            shard = self.index,
            records = self.records_written,
            created = self.shards_created,
            "Shard writer closed"
        );
        Ok(ShardStats {
            shards_created: self.shards_created,
            records_written: self.records_written,
            last_index: self.index,
            last_line_count: self.line_count,
        })
    }

    fn rotate(&mut self) -> Result<()> {
        if let Some(mut file) = self.file.take() {
            file.flush()?;
        }
        self.index = self
            .index
            .checked_add(1)
            .ok_or_else(|| DocshardError::Other("Shard index space exhausted".to_string()))?;
        self.line_count = 0;
        self.path = self.layout.path_for(self.index);
        tracing::info!(shard = self.index, path = %self.path.display(), "Rotating to new shard");
        Ok(())
    }

    fn ensure_open(&mut self) -> Result<&mut BufWriter<File>> {
        if self.file.is_none() {
            let existed = self.path.exists();
            if existed {
                repair_torn_tail(&self.path)?;
            }
            let file = OpenOptions::new().create(true).append(true).open(&self.path)?;
            if !existed {
                self.shards_created += 1;
            }
            self.file = Some(BufWriter::new(file));
        }
        self.file
            .as_mut()
            .ok_or_else(|| DocshardError::Other("Shard file handle missing".to_string()))
    }
}

/// Truncate a file that does not end with `\n` back to its last complete line.
///
/// Returns the number of bytes removed.
pub fn repair_torn_tail(path: &Path) -> Result<u64> {
    let mut file = OpenOptions::new().read(true).write(true).open(path)?;
    let len = file.metadata()?.len();
    if len == 0 {
        return Ok(0);
    }

    let mut last = [0u8; 1];
    file.seek(SeekFrom::Start(len - 1))?;
    file.read_exact(&mut last)?;
    if last[0] == b'\n' {
        return Ok(0);
    }

    let mut keep = 0u64;
    let mut end = len;
    let mut chunk = vec![0u8; TAIL_SCAN_CHUNK as usize];
    while end > 0 {
        let start = end.saturating_sub(TAIL_SCAN_CHUNK);
        let size = (end - start) as usize;
        file.seek(SeekFrom::Start(start))?;
        file.read_exact(&mut chunk[..size])?;
        if let Some(pos) = chunk[..size].iter().rposition(|&b| b == b'\n') {
            keep = start + pos as u64 + 1;
            break;
        }
        end = start;
    }

    file.set_len(keep)?;
    let removed = len - keep;
    tracing::warn!(
        path = %path.display(),
        bytes = removed,
        "Truncated incomplete trailing line in shard"
    );
    Ok(removed)
}
