//! Collaborator contracts and the per-iteration encode/assemble cycle.
//!
//! The controller rasterizes once and then calls [`run_iteration`] for every
//! parameter pair it tries. Encoding fans out across the rayon pool; the
//! collected pages keep their original order no matter which finishes first.

use image::DynamicImage;
use rayon::prelude::*;

use crate::config::BYTES_PER_MB;
use crate::error::Result;
use crate::search::CompressionParameters;
use crate::source::SourceDocument;

/// One rendered page at native resolution. Never mutated after rasterization.
#[derive(Debug, Clone)]
pub struct PageImage {
    /// Zero-based position in the source document
    pub index: usize,
    pub image: DynamicImage,
    /// Resolution the page was rendered at
    pub dpi: f32,
}

impl PageImage {
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Physical page size in PDF points, independent of any later scaling.
    pub fn size_points(&self) -> (f32, f32) {
        let per_pixel = 72.0 / self.dpi;
        (
            self.width() as f32 * per_pixel,
            self.height() as f32 * per_pixel,
        )
    }
}

/// A compressed page ready for assembly.
#[derive(Debug, Clone)]
pub struct EncodedPage {
    pub index: usize,
    pub bytes: Vec<u8>,
    /// Decoded pixel dimensions of `bytes`
    pub width: u32,
    pub height: u32,
    pub page_width_pt: f32,
    pub page_height_pt: f32,
}

/// An assembled output document held in memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssembledDocument {
    pub bytes: Vec<u8>,
}

impl AssembledDocument {
    pub fn size_bytes(&self) -> u64 {
        self.bytes.len() as u64
    }

    pub fn size_mb(&self) -> f64 {
        self.size_bytes() as f64 / BYTES_PER_MB
    }
}

/// Outcome of one encode/assemble/measure cycle.
#[derive(Debug, Clone)]
pub struct IterationResult {
    /// One-based iteration number within the run
    pub iteration: usize,
    pub parameters: CompressionParameters,
    pub document: AssembledDocument,
}

impl IterationResult {
    pub fn size_bytes(&self) -> u64 {
        self.document.size_bytes()
    }

    pub fn size_mb(&self) -> f64 {
        self.document.size_mb()
    }
}

pub trait PageRasterizer {
    /// Render every page of `source`, in document order.
    fn rasterize(&self, source: &SourceDocument) -> Result<Vec<PageImage>>;
}

pub trait PageEncoder: Sync {
    fn encode_page(&self, page: &PageImage, params: &CompressionParameters) -> Result<EncodedPage>;
}

pub trait DocumentAssembler {
    /// Concatenate `pages` into one document. Output page count equals `pages.len()`.
    fn assemble(&self, pages: &[EncodedPage]) -> Result<AssembledDocument>;
}

/// Encode every page at `params`, assemble, and measure.
///
/// Page failures surface as the error of the lowest failing page index.
pub fn run_iteration<E, A>(
    pages: &[PageImage],
    params: &CompressionParameters,
    iteration: usize,
    encoder: &E,
    assembler: &A,
) -> Result<IterationResult>
where
    E: PageEncoder + ?Sized,
    A: DocumentAssembler + ?Sized,
{
    let encoded = pages
        .par_iter()
        .map(|page| encoder.encode_page(page, params))
        .collect::<Vec<_>>()
        .into_iter()
        .collect::<Result<Vec<EncodedPage>>>()?;

    let document = assembler.assemble(&encoded)?;
    log::debug!(
        "iteration {}: {} pages assembled into {} bytes",
        iteration,
        encoded.len(),
        document.size_bytes()
    );

    Ok(IterationResult {
        iteration,
        parameters: *params,
        document,
    })
}
