//! Record normalization: text sanitization and metadata date handling.
//!
//! Everything in here is pure and total. Degraded values are represented as
//! sentinel strings, never as errors.

pub mod metadata;
pub mod sanitize;

pub use metadata::{
    DateParse, NO_PROCESSED_SENTINEL, PARSE_ERROR_SENTINEL, SENTINEL_DELIMITER, UnparsedReason, is_date_key,
    normalize_metadata, parse_date,
};
pub use sanitize::{sanitize, sanitize_bytes, sanitize_raw, sanitize_utf16, sanitize_value};
