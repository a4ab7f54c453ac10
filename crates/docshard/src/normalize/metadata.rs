//! Metadata normalization.
//!
//! Turns the loosely typed metadata map handed over by an extractor into the
//! map stored in a [`DocumentRecord`](crate::types::DocumentRecord):
//!
//! - values under date-like keys become Unix timestamps (decimal strings), or a
//!   sentinel string that carries the original value verbatim when parsing fails,
//! - other string values are sanitized,
//! - everything else passes through unchanged.
//!
//! Normalization never fails. A value that cannot be interpreted is degraded
//! to a sentinel instead of raising an error.

use super::sanitize::sanitize;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Sentinel prefix for values that were not handed to the permissive parser:
/// structured `D:` dates that failed to parse, blank strings and non-strings.
pub const NO_PROCESSED_SENTINEL: &str = "no_processed";

/// Sentinel prefix for free-form date strings the permissive parser rejected.
pub const PARSE_ERROR_SENTINEL: &str = "dateutilparser_error";

/// Separator between a sentinel prefix and the original value.
pub const SENTINEL_DELIMITER: &str = "||||";

/// Layouts with an explicit UTC offset.
const OFFSET_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f%:z",
    "%Y-%m-%d %H:%M:%S%.f%z",
    "%Y-%m-%d %H:%M:%S%.f %z",
    "%Y-%m-%dT%H:%M:%S%.f%z",
    "%Y/%m/%d %H:%M:%S%.f%:z",
];

/// Layouts without an offset; interpreted as UTC.
const NAIVE_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S%.f",
    "%Y/%m/%d %H:%M",
    "%d.%m.%Y %H:%M:%S",
    "%d.%m.%Y %H:%M",
    "%Y%m%d%H%M%S",
    "%Y%m%dT%H%M%S",
    "%b %d %Y %H:%M:%S",
    "%B %d %Y %H:%M:%S",
    "%a %b %e %H:%M:%S %Y",
];

/// Date-only layouts; midnight UTC.
const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%d.%m.%Y",
    "%Y%m%d",
    "%b %d %Y",
    "%b %d, %Y",
    "%B %d %Y",
    "%B %d, %Y",
    "%d %b %Y",
    "%d %B %Y",
];

/// Why a date value could not be turned into a timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnparsedReason {
    /// `D:`-prefixed value the structured parser rejected.
    Structured,
    /// Empty or whitespace-only string.
    Blank,
    /// JSON value that is not a string.
    NotText,
    /// Free-form string the permissive parser rejected.
    Unrecognized,
}

impl UnparsedReason {
    pub fn sentinel_prefix(self) -> &'static str {
        match self {
            UnparsedReason::Unrecognized => PARSE_ERROR_SENTINEL,
            UnparsedReason::Structured | UnparsedReason::Blank | UnparsedReason::NotText => NO_PROCESSED_SENTINEL,
        }
    }
}

/// Result of interpreting one date value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DateParse {
    /// Seconds since the Unix epoch.
    Parsed(i64),
    Unparsed { reason: UnparsedReason, original: String },
}

impl DateParse {
    /// The string stored in the record: the timestamp, or `<sentinel>||||<original>`.
    pub fn into_record_value(self) -> String {
        match self {
            DateParse::Parsed(seconds) => seconds.to_string(),
            DateParse::Unparsed { reason, original } => {
                format!("{}{SENTINEL_DELIMITER}{}", reason.sentinel_prefix(), original)
            }
        }
    }
}

/// Whether `key` names a date field.
///
/// The key is split into words at punctuation and camel-case boundaries. It is
/// a date key when any word is `date` or `datetime`, or the last word is
/// `time`: `creationDate`, `ModDate` and `dcterms:modified_time` match,
/// `validated` and `Candidate` do not.
pub fn is_date_key(key: &str) -> bool {
    let words = key_words(key);
    words.iter().any(|w| w == "date" || w == "datetime") || words.last().is_some_and(|w| w == "time")
}

/// Lowercase words of an identifier such as `xmp:CreateDate` or `PDFModDate`.
fn key_words(key: &str) -> Vec<String> {
    let chars: Vec<char> = key.chars().collect();
    let mut words = Vec::new();
    let mut current = String::new();

    for (i, &c) in chars.iter().enumerate() {
        if !c.is_alphanumeric() {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
            continue;
        }
        if c.is_uppercase() && !current.is_empty() {
            let prev = chars[i - 1];
            let next_is_lower = chars.get(i + 1).is_some_and(|n| n.is_lowercase());
            if prev.is_lowercase() || prev.is_numeric() || (prev.is_uppercase() && next_is_lower) {
                words.push(std::mem::take(&mut current));
            }
        }
        current.extend(c.to_lowercase());
    }
    if !current.is_empty() {
        words.push(current);
    }
    words
}

/// Interpret a metadata value as a point in time.
///
/// `D:`-prefixed values go to the structured PDF date parser, everything else
/// to the permissive parser. Blank strings and non-strings are never parsed.
pub fn parse_date(value: &Value) -> DateParse {
    let Some(text) = value.as_str() else {
        return DateParse::Unparsed {
            reason: UnparsedReason::NotText,
            original: value.to_string(),
        };
    };

    let trimmed = text.trim();
    if trimmed.is_empty() {
        return DateParse::Unparsed {
            reason: UnparsedReason::Blank,
            original: text.to_string(),
        };
    }

    if let Some(structured) = trimmed.strip_prefix("D:") {
        return match parse_pdf_date(structured) {
            Some(seconds) => DateParse::Parsed(seconds),
            None => DateParse::Unparsed {
                reason: UnparsedReason::Structured,
                original: text.to_string(),
            },
        };
    }

    match parse_permissive(trimmed) {
        Some(seconds) => DateParse::Parsed(seconds),
        None => DateParse::Unparsed {
            reason: UnparsedReason::Unrecognized,
            original: text.to_string(),
        },
    }
}

/// Parse a free-form date string. Naive values are taken as UTC.
pub fn parse_permissive(text: &str) -> Option<i64> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(text) {
        return Some(parsed.timestamp());
    }
    if let Ok(parsed) = DateTime::parse_from_rfc2822(text) {
        return Some(parsed.timestamp());
    }

    for format in OFFSET_FORMATS {
        if let Ok(parsed) = DateTime::parse_from_str(text, format) {
            return Some(parsed.timestamp());
        }
    }

    let naive_text = text.strip_suffix('Z').unwrap_or(text);
    for format in NAIVE_DATETIME_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(naive_text, format) {
            return Some(parsed.and_utc().timestamp());
        }
    }

    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(text, format) {
            return Some(date.and_time(NaiveTime::MIN).and_utc().timestamp());
        }
    }

    None
}

/// Parse the body of a PDF date (`YYYYMMDDHHmmSS` followed by an optional zone).
///
/// Only the leading digits matter: with 14 or more the first 14 are read as
/// `%Y%m%d%H%M%S` in UTC and the zone suffix is ignored. Truncated forms down to
/// a bare year are completed with January 1st, midnight.
pub fn parse_pdf_date(body: &str) -> Option<i64> {
    let digit_count = body.bytes().take_while(u8::is_ascii_digit).count();
    if digit_count < 14 && !matches!(body[digit_count..].chars().next(), None | Some('Z' | '+' | '-')) {
        return None;
    }

    let digits: Vec<u32> = body[..digit_count.min(14)]
        .bytes()
        .map(|b| u32::from(b - b'0'))
        .collect();

    if digits.len() < 4 || digits.len() % 2 != 0 {
        return None;
    }

    let field = |start: usize, width: usize, default: u32| -> u32 {
        if digits.len() >= start + width {
            digits[start..start + width].iter().fold(0, |acc, d| acc * 10 + d)
        } else {
            default
        }
    };

    let year = i32::try_from(field(0, 4, 0)).ok()?;
    let date = NaiveDate::from_ymd_opt(year, field(4, 2, 1), field(6, 2, 1))?;
    let time = NaiveTime::from_hms_opt(field(8, 2, 0), field(10, 2, 0), field(12, 2, 0))?;
    Some(date.and_time(time).and_utc().timestamp())
}

/// Normalize an extractor metadata map into record form.
///
/// Returns a new map; `None` yields an empty map.
pub fn normalize_metadata(metadata: Option<&Map<String, Value>>) -> BTreeMap<String, Value> {
    let Some(metadata) = metadata else {
        return BTreeMap::new();
    };

    metadata
        .iter()
        .map(|(key, value)| {
            let normalized = if is_date_key(key) {
                Value::String(parse_date(value).into_record_value())
            } else {
                sanitize_nested(value)
            };
            (sanitize(key).into_owned(), normalized)
        })
        .collect()
}

fn sanitize_nested(value: &Value) -> Value {
    match value {
        Value::String(text) => Value::String(sanitize(text).into_owned()),
        Value::Array(items) => Value::Array(items.iter().map(sanitize_nested).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(key, item)| (sanitize(key).into_owned(), sanitize_nested(item)))
                .collect(),
        ),
        other => other.clone(),
    }
}
