//! Language detector plugin trait.

use super::Plugin;

/// Identifies the dominant language of a text.
pub trait LanguageDetector: Plugin {
    /// ISO 639-3 code of the detected language.
    ///
    /// Returns `None` for empty or whitespace-only input and whenever the
    /// detector is not confident; the record then carries the "not detected"
    /// sentinel.
    fn detect(&self, text: &str) -> Option<String>;
}
