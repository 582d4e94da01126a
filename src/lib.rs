//! Shrinks a PDF below a size ceiling by re-rendering its pages as JPEG
//! images and searching for the scale factor and quality that land the
//! reassembled document just under the ceiling.

pub mod assemble;
pub mod config;
pub mod controller;
pub mod encode;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod raster;
pub mod search;
pub mod source;

use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;

use wasm_bindgen::prelude::*;

pub use config::CompressionConfig;
pub use controller::CompressionController;
pub use error::{CompressError, Result};
pub use pipeline::IterationResult;
pub use search::{CompressionParameters, SearchOutcome, StopReason};
pub use source::SourceDocument;

/// What a file-to-file run produced.
#[derive(Debug)]
pub struct CompressionReport {
    pub original_size_bytes: u64,
    pub outcome: SearchOutcome,
    /// Set only when a document was written
    pub output_path: Option<PathBuf>,
}

/// Compress `input` and, on success, write the result to `output`
/// (or [`output::default_output_path`] when `None`).
pub fn compress_file<F>(
    input: &Path,
    output: Option<&Path>,
    config: CompressionConfig,
    cancel: &AtomicBool,
    on_iteration: F,
) -> Result<CompressionReport>
where
    F: FnMut(&IterationResult),
{
    let source = SourceDocument::open(input)?;
    let controller = CompressionController::with_defaults(config);
    let outcome = controller.run_with(&source, cancel, on_iteration)?;

    let output_path = match outcome.result() {
        Some(best) => {
            let path = output
                .map(Path::to_path_buf)
                .unwrap_or_else(|| output::default_output_path(input));
            output::write_atomically(&path, &best.document.bytes)?;
            log::info!("Wrote {} bytes to {}", best.size_bytes(), path.display());
            Some(path)
        }
        None => None,
    };

    Ok(CompressionReport {
        original_size_bytes: source.size_bytes(),
        outcome,
        output_path,
    })
}

#[wasm_bindgen]
pub fn compress_pdf_to_target(
    input: &[u8],
    max_size_mb: f64,
    quality: u8,
    scale_factor: f64,
) -> std::result::Result<Vec<u8>, JsError> {
    let config = CompressionConfig {
        max_size_mb,
        initial_quality: quality,
        initial_scale: scale_factor,
        ..Default::default()
    };
    let source = SourceDocument::from_bytes("input.pdf", input.to_vec())
        .map_err(|e| JsError::new(&e.to_string()))?;

    let outcome = CompressionController::with_defaults(config)
        .run(&source)
        .map_err(|e| JsError::new(&e.to_string()))?;

    match outcome.into_result() {
        Some(best) => Ok(best.document.bytes),
        None => Err(JsError::new(
            "Unable to compress further without severe quality loss.",
        )),
    }
}
