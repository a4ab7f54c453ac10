//! Language detection using the whatlang library.

use crate::Result;
use crate::plugins::{LanguageDetector, Plugin};
use whatlang::detect;

/// Minimum confidence for a detection to be reported.
pub const DEFAULT_MIN_CONFIDENCE: f64 = 0.0;

/// [`LanguageDetector`] backed by whatlang's trigram model.
///
/// # Example
///
/// ```rust
/// use docshard::language_detection::WhatlangDetector;
/// use docshard::plugins::LanguageDetector;
///
/// let detector = WhatlangDetector::default();
/// let text = "This is a reasonably long English sentence about document processing.";
/// assert_eq!(detector.detect(text).as_deref(), Some("eng"));
/// ```
#[derive(Debug, Clone, Copy)]
pub struct WhatlangDetector {
    min_confidence: f64,
}

impl Default for WhatlangDetector {
    fn default() -> Self {
        Self {
            min_confidence: DEFAULT_MIN_CONFIDENCE,
        }
    }
}

impl WhatlangDetector {
    pub fn with_min_confidence(min_confidence: f64) -> Self {
        Self { min_confidence }
    }
}

impl Plugin for WhatlangDetector {
    fn name(&self) -> &str {
        "whatlang"
    }

    fn version(&self) -> String {
        env!("CARGO_PKG_VERSION").to_string()
    }

    fn initialize(&self) -> Result<()> {
        Ok(())
    }

    fn shutdown(&self) -> Result<()> {
        Ok(())
    }
}

impl LanguageDetector for WhatlangDetector {
    fn detect(&self, text: &str) -> Option<String> {
        if text.trim().is_empty() {
            return None;
        }
        let info = detect(text)?;
        if info.confidence() < self.min_confidence {
            return None;
        }
        Some(info.lang().code().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_english() {
        let detector = WhatlangDetector::default();
        let text = "The quick brown fox jumps over the lazy dog. This is clearly an English sentence.";
        assert_eq!(detector.detect(text).as_deref(), Some("eng"));
    }

    #[test]
    fn test_detect_german() {
        let detector = WhatlangDetector::default();
        let text = "Der schnelle braune Fuchs springt über den faulen Hund. Das ist ein deutscher Satz.";
        assert_eq!(detector.detect(text).as_deref(), Some("deu"));
    }

    #[test]
    fn test_empty_text() {
        let detector = WhatlangDetector::default();
        assert_eq!(detector.detect(""), None);
        assert_eq!(detector.detect("   \n\t "), None);
    }

    #[test]
    fn test_confidence_threshold() {
        let detector = WhatlangDetector::with_min_confidence(1.1);
        assert_eq!(detector.detect("Hello world, this is English text."), None);
    }
}
