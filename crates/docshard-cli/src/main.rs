//! docshard command-line interface.
//!
//! Builds a [`BatchConfig`] from an optional config file plus flags, installs
//! logging to stderr and a log file, runs the batch and prints the summary.
//!
//! # Usage
//!
//! ```bash
//! # Single document
//! docshard -i report.pdf -o dataset/corpus.jsonl
//!
//! # Manifest, 5000 records per shard, resuming a previous run
//! docshard -i manifest.txt -o dataset/corpus.jsonl -n 5000 --resume
//!
//! # Sequential run with language detection and a JSON summary
//! docshard -i manifest.txt -j 1 --lang-detect --json
//! ```
//!
//! Exits non-zero only for configuration errors and fatal shard I/O;
//! per-document failures are logged and counted.

use anyhow::{Context, Result, bail};
use clap::Parser;
use docshard::core::config::CONFIG_FILE_NAME;
use docshard::{BatchConfig, BatchProcessor, BatchSummary, CancellationFlag};
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

const DEFAULT_LOG_FILE: &str = "docshard.log";

/// Convert documents into sharded JSON Lines records.
#[derive(Debug, Parser)]
#[command(name = "docshard", version, about, long_about = None)]
struct Cli {
    /// Document, or a .txt/.lst manifest with one document path per line
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Base output path; shards are written as <stem>_<NN><ext>
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Log file (appended to)
    #[arg(short, long)]
    log_file: Option<PathBuf>,

    /// Records per shard before rotating
    #[arg(short = 'n', long)]
    max_lines: Option<usize>,

    /// Detect the language of each document
    #[arg(short = 'd', long)]
    lang_detect: bool,

    /// Capture a base64 PNG of every page
    #[arg(long)]
    page_images: bool,

    /// Skip documents already present in existing shards
    #[arg(short, long)]
    resume: bool,

    /// Concurrent extractions (1 = sequential)
    #[arg(short, long)]
    jobs: Option<usize>,

    /// Config file (TOML, YAML or JSON); defaults to a discovered docshard.toml
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print the summary as JSON
    #[arg(long)]
    json: bool,
}

impl Cli {
    /// Load the base configuration and overlay the flags on it.
    fn into_config(self) -> Result<BatchConfig> {
        let mut config = match &self.config {
            Some(path) => BatchConfig::from_file(path)
                .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
            None => BatchConfig::discover()?.unwrap_or_default(),
        };

        if let Some(input) = self.input {
            config.input_path = input;
        }
        if let Some(output) = self.output {
            config.output_path = output;
        }
        if let Some(log_file) = self.log_file {
            config.log_file = Some(log_file);
        }
        if let Some(max_lines) = self.max_lines {
            config.max_lines_per_shard = max_lines;
        }
        if let Some(jobs) = self.jobs {
            config.max_concurrent_extractions = Some(jobs);
        }
        config.language_detection |= self.lang_detect;
        config.page_images |= self.page_images;
        config.resume |= self.resume;

        if config.input_path.as_os_str().is_empty() {
            bail!("No input given: pass --input or set input_path in {}", CONFIG_FILE_NAME);
        }
        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let json = cli.json;
    let config = cli.into_config()?;

    let log_file = config
        .log_file
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_FILE));
    init_tracing(&log_file)?;

    let processor = Arc::new(BatchProcessor::with_default_plugins(config)?);
    tokio::spawn(cancel_on_ctrl_c(processor.cancellation_flag()));

    let summary = if processor.config().concurrency() == 1 {
        let processor = Arc::clone(&processor);
        tokio::task::spawn_blocking(move || processor.run())
            .await
            .context("Batch task panicked")??
    } else {
        processor.run_concurrent().await?
    };

    print_summary(&summary, json)
}

/// First Ctrl-C stops the run gracefully, the second exits immediately.
async fn cancel_on_ctrl_c(flag: CancellationFlag) {
    if tokio::signal::ctrl_c().await.is_err() {
        return;
    }
    flag.cancel();
    eprintln!("Stopping after in-flight documents; press Ctrl-C again to abort");

    if tokio::signal::ctrl_c().await.is_ok() {
        std::process::exit(130);
    }
}

fn init_tracing(log_file: &Path) -> Result<()> {
    if let Some(parent) = log_file.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create log directory {}", parent.display()))?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_file)
        .with_context(|| format!("Failed to open log file {}", log_file.display()))?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(fmt::layer().with_writer(Mutex::new(file)).with_ansi(false))
        .try_init()
        .context("Failed to install logger")?;
    Ok(())
}

fn print_summary(summary: &BatchSummary, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(summary)?);
        return Ok(());
    }

    println!("Resolved:   {}", summary.resolved);
    println!("Succeeded:  {}", summary.succeeded);
    println!("Failed:     {}", summary.failed);
    for (reason, count) in &summary.failures_by_reason {
        println!("  {reason}: {count}");
    }
    println!("Skipped:    {}", summary.skipped);
    println!(
        "Shards:     {} created, last index {}",
        summary.shards_created, summary.last_shard_index
    );
    println!("Elapsed:    {:.2}s", summary.elapsed.as_secs_f64());
    if summary.cancelled {
        println!("Cancelled before all inputs were processed");
    }
    Ok(())
}
