use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::ColorType;

use crate::error::{CompressError, Result};
use crate::pipeline::{EncodedPage, PageEncoder, PageImage};
use crate::search::CompressionParameters;

/// Resamples a page with Lanczos3 and encodes it as baseline JPEG.
#[derive(Debug, Default, Clone, Copy)]
pub struct JpegPageEncoder;

/// Target dimensions for `scale`, never collapsing below one pixel.
pub fn scaled_dimensions(width: u32, height: u32, scale: f64) -> (u32, u32) {
    let w = (width as f64 * scale).floor().max(1.0) as u32;
    let h = (height as f64 * scale).floor().max(1.0) as u32;
    (w, h)
}

impl PageEncoder for JpegPageEncoder {
    fn encode_page(&self, page: &PageImage, params: &CompressionParameters) -> Result<EncodedPage> {
        let (w, h) = scaled_dimensions(page.width(), page.height(), params.scale_factor);

        let img = if (w, h) == (page.width(), page.height()) {
            page.image.to_rgb8()
        } else {
            page.image
                .resize_exact(w, h, FilterType::Lanczos3)
                .to_rgb8()
        };

        let mut buffer = Vec::new();
        let mut encoder = JpegEncoder::new_with_quality(&mut buffer, params.quality);
        encoder
            .encode(img.as_raw(), w, h, ColorType::Rgb8.into())
            .map_err(|source| CompressError::Encode {
                page: page.index + 1,
                source,
            })?;

        let (page_width_pt, page_height_pt) = page.size_points();
        Ok(EncodedPage {
            index: page.index,
            bytes: buffer,
            width: w,
            height: h,
            page_width_pt,
            page_height_pt,
        })
    }
}
