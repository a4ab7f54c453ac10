//! Configuration loading and management.
//!
//! A [`BatchConfig`] can be built programmatically, loaded from TOML, YAML or
//! JSON files, or discovered as `docshard.toml` in the current directory or one
//! of its parents. The CLI overlays its flags on top of whatever was loaded.

use crate::{DocshardError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// File name searched for by [`BatchConfig::discover`].
pub const CONFIG_FILE_NAME: &str = "docshard.toml";

/// Settings for one batch run.
///
/// # Example
///
/// ```rust
/// use docshard::core::config::BatchConfig;
///
/// let config = BatchConfig::new("inputs.txt");
/// assert_eq!(config.max_lines_per_shard, 10_000);
/// assert!(!config.resume);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BatchConfig {
    /// A single document, or a `.txt`/`.lst` manifest of document paths.
    #[serde(default)]
    pub input_path: PathBuf,

    /// Base output path; shards are written next to it as `<stem>_<NN><suffix>`.
    #[serde(default = "default_output_path")]
    pub output_path: PathBuf,

    /// Log file used by the CLI (None = CLI default)
    #[serde(default)]
    pub log_file: Option<PathBuf>,

    #[serde(default = "default_max_lines")]
    pub max_lines_per_shard: usize,

    /// Detect the language of each document
    #[serde(default)]
    pub language_detection: bool,

    /// Capture a PNG of every page
    #[serde(default)]
    pub page_images: bool,

    /// Skip documents already present in existing shards
    #[serde(default)]
    pub resume: bool,

    /// Worker limit for concurrent runs (None = `num_cpus * 2`, 1 = sequential)
    #[serde(default)]
    pub max_concurrent_extractions: Option<usize>,

    #[serde(default = "default_max_path_length")]
    pub max_path_length: usize,

    /// Emit a progress line every this many documents
    #[serde(default = "default_progress_interval")]
    pub progress_interval: usize,

    /// Resolution for page image capture
    #[serde(default = "default_render_dpi")]
    pub render_dpi: u32,
}

fn default_output_path() -> PathBuf {
    PathBuf::from("output.jsonl")
}

fn default_max_lines() -> usize {
    10_000
}

fn default_max_path_length() -> usize {
    4096
}

fn default_progress_interval() -> usize {
    1000
}

fn default_render_dpi() -> u32 {
    150
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            input_path: PathBuf::new(),
            output_path: default_output_path(),
            log_file: None,
            max_lines_per_shard: default_max_lines(),
            language_detection: false,
            page_images: false,
            resume: false,
            max_concurrent_extractions: None,
            max_path_length: default_max_path_length(),
            progress_interval: default_progress_interval(),
            render_dpi: default_render_dpi(),
        }
    }
}

impl BatchConfig {
    /// Defaults for everything but the input.
    pub fn new(input_path: impl Into<PathBuf>) -> Self {
        Self {
            input_path: input_path.into(),
            ..Self::default()
        }
    }

    /// Check the settings that would make a run meaningless.
    ///
    /// # Errors
    ///
    /// Returns `DocshardError::Configuration` describing the first invalid field.
    pub fn validate(&self) -> Result<()> {
        if self.input_path.as_os_str().is_empty() {
            return Err(DocshardError::configuration("input_path is required"));
        }
        if self.max_lines_per_shard == 0 {
            return Err(DocshardError::configuration("max_lines_per_shard must be greater than 0"));
        }
        if self.max_concurrent_extractions == Some(0) {
            return Err(DocshardError::configuration(
                "max_concurrent_extractions must be greater than 0",
            ));
        }
        if self.render_dpi == 0 {
            return Err(DocshardError::configuration("render_dpi must be greater than 0"));
        }
        if self.max_path_length == 0 {
            return Err(DocshardError::configuration("max_path_length must be greater than 0"));
        }
        Ok(())
    }

    /// Worker limit for concurrent runs.
    pub fn concurrency(&self) -> usize {
        self.max_concurrent_extractions
            .unwrap_or_else(|| num_cpus::get() * 2)
            .max(1)
    }

    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns `DocshardError::Configuration` if the file doesn't exist or is invalid TOML.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = read_config(path.as_ref())?;
        toml::from_str(&content).map_err(|e| {
            DocshardError::configuration(format!("Invalid TOML in {}: {}", path.as_ref().display(), e))
        })
    }

    /// Load configuration from a YAML file.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = read_config(path.as_ref())?;
        serde_yaml_ng::from_str(&content).map_err(|e| {
            DocshardError::configuration(format!("Invalid YAML in {}: {}", path.as_ref().display(), e))
        })
    }

    /// Load configuration from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = read_config(path.as_ref())?;
        serde_json::from_str(&content).map_err(|e| {
            DocshardError::configuration(format!("Invalid JSON in {}: {}", path.as_ref().display(), e))
        })
    }

    /// Load configuration, picking the format from the file extension.
    ///
    /// Unknown extensions are read as TOML.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase);
        match extension.as_deref() {
            Some("json") => Self::from_json_file(path),
            Some("yaml" | "yml") => Self::from_yaml_file(path),
            _ => Self::from_toml_file(path),
        }
    }

    /// Discover `docshard.toml` in the current directory or its parents.
    ///
    /// # Returns
    ///
    /// - `Some(config)` if found
    /// - `None` if no config file found
    pub fn discover() -> Result<Option<Self>> {
        let current = std::env::current_dir().map_err(DocshardError::Io)?;
        Self::discover_from(&current)
    }

    /// Like [`discover`](Self::discover), starting at `start`.
    pub fn discover_from(start: &Path) -> Result<Option<Self>> {
        for dir in start.ancestors() {
            let candidate = dir.join(CONFIG_FILE_NAME);
            if candidate.is_file() {
                tracing::debug!(path = %candidate.display(), "Using discovered configuration");
                return Ok(Some(Self::from_toml_file(candidate)?));
            }
        }
        Ok(None)
    }
}

fn read_config(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|e| {
        DocshardError::configuration_with_source(format!("Failed to read config file {}", path.display()), e)
    })
}
