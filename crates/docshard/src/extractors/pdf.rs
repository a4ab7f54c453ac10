//! PDF document extractor.

use crate::Result;
use crate::pdf::{PdfError, collect_outline, collect_subtypes, extract_info, extract_page_texts};
use crate::plugins::{DocumentExtractor, ExtractionOptions, Plugin};
use crate::types::DocumentExtractionResult;
use lopdf::Document;
use std::path::Path;

/// Extracts page text, Info metadata, subtypes and outline with `lopdf`.
///
/// With the `pdf-render` feature it also renders page images through pdfium.
#[derive(Debug, Default, Clone, Copy)]
pub struct PdfExtractor;

impl PdfExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl Plugin for PdfExtractor {
    fn name(&self) -> &str {
        "pdf-extractor"
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

    fn description(&self) -> &str {
        "PDF text, metadata and outline extraction (lopdf)"
    }
}

impl DocumentExtractor for PdfExtractor {
    fn extract(&self, path: &Path, options: &ExtractionOptions) -> Result<DocumentExtractionResult> {
        let doc = Document::load(path).map_err(PdfError::from)?;

        let pages = extract_page_texts(&doc);
        let page_images = if options.capture_images {
            render_pages(path, options.render_dpi, pages.len())
        } else {
            Vec::new()
        };

        Ok(DocumentExtractionResult {
            metadata: extract_info(&doc),
            pages,
            page_images,
            xref_subtypes: collect_subtypes(&doc),
            outline: collect_outline(&doc),
        })
    }

    fn supports_page_images(&self) -> bool {
        cfg!(feature = "pdf-render")
    }
}

#[cfg(feature = "pdf-render")]
fn render_pages(path: &Path, dpi: u32, page_count: usize) -> Vec<Option<Vec<u8>>> {
    let rendered = crate::pdf::PdfRenderer::new().and_then(|renderer| renderer.render_pages_png(path, dpi));
    match rendered {
        Ok(mut images) => {
            images.resize(page_count, None);
            images
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Page images unavailable");
            vec![None; page_count]
        }
    }
}

#[cfg(not(feature = "pdf-render"))]
fn render_pages(_path: &Path, _dpi: u32, _page_count: usize) -> Vec<Option<Vec<u8>>> {
    Vec::new()
}
