//! Page rasterization backed by hayro.

use hayro::{InterpreterSettings, Pdf, RenderSettings};

use crate::error::{CompressError, Result};
use crate::pipeline::{PageImage, PageRasterizer};
use crate::source::SourceDocument;

/// PDF user space unit, 72 per inch.
const POINTS_PER_INCH: f32 = 72.0;

pub struct HayroRasterizer {
    dpi: f32,
}

impl HayroRasterizer {
    pub fn new(dpi: f32) -> Self {
        Self { dpi }
    }
}

impl PageRasterizer for HayroRasterizer {
    fn rasterize(&self, source: &SourceDocument) -> Result<Vec<PageImage>> {
        let pdf = Pdf::new(source.shared_bytes()).map_err(|e| {
            CompressError::invalid_input(source.path(), format!("failed to parse PDF: {:?}", e))
        })?;

        let pages = pdf.pages();
        if pages.len() == 0 {
            return Err(CompressError::invalid_input(source.path(), "document has no pages"));
        }

        let scale = self.dpi / POINTS_PER_INCH;
        let render_settings = RenderSettings {
            x_scale: scale,
            y_scale: scale,
            width: None,
            height: None,
        };
        let interpreter_settings = InterpreterSettings::default();

        log::info!("Rasterizing {} pages at {} DPI", pages.len(), self.dpi);

        let mut images = Vec::with_capacity(pages.len());
        for (index, page) in pages.iter().enumerate() {
            let pixmap = hayro::render(page, &interpreter_settings, &render_settings);
            let png = pixmap.take_png();

            let image = image::load_from_memory(&png).map_err(|e| CompressError::Rasterize {
                page: Some(index + 1),
                message: format!("rendered page could not be decoded: {}", e),
            })?;
            log::debug!("page {}: {}x{} px", index + 1, image.width(), image.height());

            images.push(PageImage {
                index,
                image: image::DynamicImage::ImageRgb8(image.to_rgb8()),
                dpi: self.dpi,
            });
        }

        Ok(images)
    }
}
