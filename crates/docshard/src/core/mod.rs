//! Core batch orchestration.
//!
//! - **Configuration**: [`config::BatchConfig`], loaded from files or built in code
//! - **Inputs**: resolving a document or manifest into an ordered path list
//! - **I/O**: path normalization and per-document availability checks
//! - **Resume**: rebuilding processed paths and the write position from existing shards
//! - **Shards**: naming, discovery and the append-only [`shard::ShardWriter`]
//! - **Pipeline**: the [`pipeline::BatchProcessor`] that ties it all together
//!
//! # Example
//!
//! ```rust,no_run
//! use docshard::core::{BatchConfig, BatchProcessor};
//!
//! # async fn example() -> docshard::Result<()> {
//! let config = BatchConfig::new("manifest.txt");
//! let processor = BatchProcessor::with_default_plugins(config)?;
//! let summary = processor.run_concurrent().await?;
//! println!("{} documents written", summary.succeeded);
//! # Ok(())
//! # }
//! ```

pub mod cancel;
pub mod config;
pub mod input;
pub mod io;
pub mod pipeline;
pub mod resume;
pub mod shard;

pub use cancel::CancellationFlag;
pub use config::BatchConfig;
pub use input::resolve_inputs;
pub use pipeline::{BatchProcessor, DocumentFailure};
pub use shard::{AppendOutcome, ShardLayout, ShardStats, ShardWriter};
