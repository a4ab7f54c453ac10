//! Page text and PDF text-string decoding.

use crate::types::RawText;
use lopdf::Document;

/// Decode a PDF text string (Info values, outline titles).
///
/// Strings with a UTF-16 byte order mark are returned as code units so that
/// unpaired surrogates can be dropped by the sanitizer. A UTF-8 BOM yields raw
/// bytes; anything else is PDFDocEncoding, read here as Latin-1.
pub fn decode_text_string(bytes: &[u8]) -> RawText {
    if let Some(body) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        return RawText::Utf16(
            body.chunks_exact(2)
                .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
                .collect(),
        );
    }
    if let Some(body) = bytes.strip_prefix(&[0xFF, 0xFE]) {
        return RawText::Utf16(
            body.chunks_exact(2)
                .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
                .collect(),
        );
    }
    if let Some(body) = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]) {
        return RawText::Bytes(body.to_vec());
    }
    RawText::Utf8(bytes.iter().map(|&b| char::from(b)).collect())
}

/// Text of every page in page order.
///
/// A page whose content cannot be decoded contributes an empty string so page
/// indices stay aligned with the document.
pub fn extract_page_texts(doc: &Document) -> Vec<RawText> {
    doc.get_pages()
        .keys()
        .map(|&page_number| match doc.extract_text(&[page_number]) {
            Ok(text) => RawText::Utf8(text),
            Err(e) => {
                tracing::debug!(page = page_number, error = %e, "Page text extraction failed");
                RawText::Utf8(String::new())
            }
        })
        .collect()
}
