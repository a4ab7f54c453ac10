//! Text sanitization applied to every page and every textual metadata value.
//!
//! Three entry points cover the forms text arrives in:
//!
//! - [`sanitize`] for text that is already a Rust string,
//! - [`sanitize_bytes`] for bytes that should be UTF-8 but may carry invalid
//!   sequences or surrogate code points in generalized UTF-8 (`ED A0..BF ..`),
//! - [`sanitize_utf16`] for UTF-16 code units that may contain unpaired surrogates.
//!
//! All of them are total and idempotent. Output never contains C0/C1 control
//! characters other than `\n`, `\r` and `\t`, line or paragraph separators,
//! zero-width and bidi-override format characters, a byte order mark, or the
//! noncharacters U+FFFE/U+FFFF.

use crate::types::RawText;
use once_cell::sync::Lazy;
use regex::Regex;
use std::borrow::Cow;

static NON_PRINTABLE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"[\x00-\x08\x0B\x0C\x0E-\x1F\x7F-\x9F\x{200B}-\x{200F}\x{2028}-\x{202E}\x{2060}-\x{2064}\x{FEFF}\x{FFFE}\x{FFFF}]",
    )
    .expect("Non-printable regex pattern is valid and should compile")
});

/// Remove non-printable characters, keeping newline, carriage return and tab.
///
/// Borrows the input when nothing has to be removed.
pub fn sanitize(text: &str) -> Cow<'_, str> {
    if NON_PRINTABLE.is_match(text) {
        NON_PRINTABLE.replace_all(text, "")
    } else {
        Cow::Borrowed(text)
    }
}

/// Decode possibly broken UTF-8 and sanitize it.
///
/// Invalid sequences are dropped rather than replaced with U+FFFD, so encoded
/// surrogates disappear together with any other garbage bytes.
pub fn sanitize_bytes(bytes: &[u8]) -> String {
    if let Ok(text) = from_utf8_fast(bytes) {
        return sanitize(text).into_owned();
    }

    let mut decoded = String::with_capacity(bytes.len());
    for chunk in bytes.utf8_chunks() {
        decoded.push_str(chunk.valid());
    }
    sanitize(&decoded).into_owned()
}

/// Decode UTF-16 code units, dropping unpaired surrogates, and sanitize.
pub fn sanitize_utf16(units: &[u16]) -> String {
    let decoded: String = char::decode_utf16(units.iter().copied())
        .filter_map(|unit| unit.ok())
        .collect();
    sanitize(&decoded).into_owned()
}

/// Sanitize extractor output regardless of how it was encoded.
pub fn sanitize_raw(text: &RawText) -> String {
    match text {
        RawText::Utf8(text) => sanitize(text).into_owned(),
        RawText::Bytes(bytes) => sanitize_bytes(bytes),
        RawText::Utf16(units) => sanitize_utf16(units),
    }
}

/// Sanitize any JSON value as text. Non-string values are stringified first.
pub fn sanitize_value(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(text) => sanitize(text).into_owned(),
        other => sanitize(&other.to_string()).into_owned(),
    }
}

#[cfg(feature = "simd-utf8")]
#[inline]
fn from_utf8_fast(bytes: &[u8]) -> Result<&str, ()> {
    simdutf8::basic::from_utf8(bytes).map_err(|_| ())
}

#[cfg(not(feature = "simd-utf8"))]
#[inline]
fn from_utf8_fast(bytes: &[u8]) -> Result<&str, ()> {
    std::str::from_utf8(bytes).map_err(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_clean(text: &str) {
        for c in text.chars() {
            let code = c as u32;
            assert!(!(0xD800..=0xDFFF).contains(&code), "surrogate {code:#x} in {text:?}");
            if c.is_control() {
                assert!(matches!(c, '\n' | '\r' | '\t'), "control {code:#x} in {text:?}");
            }
        }
    }

    #[test]
    fn test_clean_text_is_borrowed() {
        let text = "Plain text\nwith\ttabs and\r\nline endings — and ünïcödé";
        assert!(matches!(sanitize(text), Cow::Borrowed(_)));
    }

    #[test]
    fn test_removes_control_characters() {
        let text = "a\u{0000}b\u{0007}c\u{001B}d\u{007F}e\u{0085}f";
        assert_eq!(sanitize(text), "abcdef");
    }

    #[test]
    fn test_keeps_newline_carriage_return_tab() {
        assert_eq!(sanitize("a\nb\rc\td"), "a\nb\rc\td");
    }

    #[test]
    fn test_removes_format_characters() {
        let text = "\u{FEFF}zero\u{200B}width\u{2028}sep\u{202E}bidi\u{FFFF}";
        assert_eq!(sanitize(text), "zerowidthsepbidi");
    }

    #[test]
    fn test_sanitize_is_idempotent() {
        let samples = [
            "",
            "hello",
            "\u{0001}\u{0002}x\u{2029}",
            "mixed\u{FEFF}\u{FEFF}content\u{0000}",
            "日本語のテキスト\u{200D}",
        ];
        for sample in samples {
            let once = sanitize(sample).into_owned();
            let twice = sanitize(&once).into_owned();
            assert_eq!(once, twice);
            assert_clean(&once);
        }
    }

    #[test]
    fn test_sanitize_bytes_valid_utf8() {
        assert_eq!(sanitize_bytes("Grüße\u{0003}".as_bytes()), "Grüße");
    }

    #[test]
    fn test_sanitize_bytes_drops_encoded_surrogates() {
        // "a" + U+D800 in generalized UTF-8 + "b"
        let bytes = [b'a', 0xED, 0xA0, 0x80, b'b'];
        let result = sanitize_bytes(&bytes);
        assert_eq!(result, "ab");
        assert_clean(&result);
    }

    #[test]
    fn test_sanitize_bytes_drops_invalid_sequences_without_replacement() {
        let bytes = [b'o', b'k', 0xFF, 0xFE, b'!', 0xC3];
        let result = sanitize_bytes(&bytes);
        assert_eq!(result, "ok!");
        assert!(!result.contains('\u{FFFD}'));
    }

    #[test]
    fn test_sanitize_utf16_drops_unpaired_surrogates() {
        let mut units: Vec<u16> = "Hi".encode_utf16().collect();
        units.push(0xD83D);
        units.extend("there".encode_utf16());
        units.push(0xDC00);
        let result = sanitize_utf16(&units);
        assert_eq!(result, "Hithere");
        assert_clean(&result);
    }

    #[test]
    fn test_sanitize_utf16_keeps_valid_pairs() {
        let units: Vec<u16> = "emoji 😀".encode_utf16().collect();
        assert_eq!(sanitize_utf16(&units), "emoji 😀");
    }

    #[test]
    fn test_sanitize_value_stringifies_non_strings() {
        assert_eq!(sanitize_value(&serde_json::json!(42)), "42");
        assert_eq!(sanitize_value(&serde_json::json!(true)), "true");
        assert_eq!(sanitize_value(&serde_json::Value::Null), "null");
        assert_eq!(sanitize_value(&serde_json::json!("x\u{0000}y")), "xy");
    }

    #[test]
    fn test_sanitize_raw_dispatches_on_encoding() {
        assert_eq!(sanitize_raw(&RawText::from("a\u{0001}")), "a");
        assert_eq!(sanitize_raw(&RawText::Bytes(vec![b'b', 0xFF])), "b");
        assert_eq!(sanitize_raw(&RawText::Utf16(vec![0x0063, 0xDFFF])), "c");
    }
}
