//! Base plugin trait definition.
//!
//! Extractors and language detectors share the `Plugin` lifecycle: the
//! orchestrator calls `initialize` once before the first document and
//! `shutdown` once after the last.

use crate::Result;

/// Base trait that all plugins must implement.
///
/// # Thread Safety
///
/// Plugins are shared across worker threads in concurrent runs and must be
/// `Send + Sync`.
///
/// # Example
///
/// ```rust
/// use docshard::plugins::Plugin;
/// use docshard::Result;
/// use std::sync::atomic::{AtomicBool, Ordering};
///
/// struct MyPlugin {
///     initialized: AtomicBool,
/// }
///
/// impl Plugin for MyPlugin {
///     fn name(&self) -> &str {
///         "my-plugin"
///     }
///
///     fn version(&self) -> String {
///         "1.0.0".to_string()
///     }
///
///     fn initialize(&self) -> Result<()> {
///         self.initialized.store(true, Ordering::Release);
///         Ok(())
///     }
///
///     fn shutdown(&self) -> Result<()> {
///         self.initialized.store(false, Ordering::Release);
///         Ok(())
///     }
/// }
/// ```
pub trait Plugin: Send + Sync {
    /// Unique, lowercase, hyphenated identifier (e.g. `"pdf-extractor"`).
    fn name(&self) -> &str;

    fn version(&self) -> String;

    /// Acquire resources. Failures abort the run before any document is processed.
    fn initialize(&self) -> Result<()>;

    fn shutdown(&self) -> Result<()>;

    fn description(&self) -> &str {
        ""
    }
}
