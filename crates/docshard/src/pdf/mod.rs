//! PDF processing on top of `lopdf`.
//!
//! - **Text**: per-page text in page order, and decoding of PDF text strings
//! - **Metadata**: the Info dictionary as a loosely typed map
//! - **Structure**: `/Subtype` tags and the flattened outline
//! - **Rendering** (`pdf-render`): page PNGs through pdfium
//!
//! Used by [`PdfExtractor`](crate::extractors::PdfExtractor).

pub mod error;
pub mod metadata;
#[cfg(feature = "pdf-render")]
pub mod rendering;
pub mod structure;
pub mod text;

pub use error::PdfError;
pub use metadata::extract_info;
#[cfg(feature = "pdf-render")]
pub use rendering::PdfRenderer;
pub use structure::{collect_outline, collect_subtypes};
pub use text::{decode_text_string, extract_page_texts};
