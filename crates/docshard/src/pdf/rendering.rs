//! Page rasterisation through pdfium.
//!
//! Requires a pdfium shared library that `pdfium-render` can bind at runtime.

use super::error::{PdfError, Result};
use image::ImageFormat;
use pdfium_render::prelude::*;
use std::io::Cursor;
use std::path::Path;

const PDF_POINTS_PER_INCH: f32 = 72.0;

/// Largest edge, in pixels, of a rendered page.
const MAX_IMAGE_DIMENSION: f32 = 16384.0;

pub struct PdfRenderer {
    pdfium: Pdfium,
}

impl PdfRenderer {
    pub fn new() -> Result<Self> {
        let bindings = Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
            .or_else(|_| Pdfium::bind_to_system_library())
            .map_err(|e| PdfError::RenderingFailed(format!("Failed to bind pdfium: {}", e)))?;
        Ok(Self {
            pdfium: Pdfium::new(bindings),
        })
    }

    /// Render every page of the file at `path` to PNG.
    ///
    /// Pages that fail to render yield `None` so the result stays aligned with
    /// the page order.
    pub fn render_pages_png(&self, path: &Path, dpi: u32) -> Result<Vec<Option<Vec<u8>>>> {
        let document = self
            .pdfium
            .load_pdf_from_file(path, None)
            .map_err(|e| PdfError::InvalidPdf(e.to_string()))?;

        let scale = dpi as f32 / PDF_POINTS_PER_INCH;
        let pages = document
            .pages()
            .iter()
            .enumerate()
            .map(|(index, page)| match render_page(&page, scale) {
                Ok(png) => Some(png),
                Err(e) => {
                    tracing::warn!(path = %path.display(), page = index + 1, error = %e, "Page rendering failed");
                    None
                }
            })
            .collect();
        Ok(pages)
    }
}

fn render_page(page: &PdfPage<'_>, scale: f32) -> Result<Vec<u8>> {
    let width = (page.width().value * scale).clamp(1.0, MAX_IMAGE_DIMENSION) as i32;
    let height = (page.height().value * scale).clamp(1.0, MAX_IMAGE_DIMENSION) as i32;

    let config = PdfRenderConfig::new()
        .set_target_width(width)
        .set_target_height(height)
        .rotate_if_landscape(PdfPageRenderRotation::None, false);

    let bitmap = page
        .render_with_config(&config)
        .map_err(|e| PdfError::RenderingFailed(format!("Failed to render page: {}", e)))?;

    let mut png = Vec::new();
    bitmap
        .as_image()
        .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
        .map_err(|e| PdfError::RenderingFailed(format!("Failed to encode PNG: {}", e)))?;
    Ok(png)
}
