//! Drives the rasterize-once, encode/assemble/measure-many loop.

use std::sync::atomic::{AtomicBool, Ordering};

use crate::assemble::LopdfAssembler;
use crate::config::CompressionConfig;
use crate::encode::JpegPageEncoder;
use crate::error::{CompressError, Result};
use crate::pipeline::{run_iteration, DocumentAssembler, IterationResult, PageEncoder, PageRasterizer};
use crate::raster::HayroRasterizer;
use crate::search::{SearchOutcome, SearchState, Step};
use crate::source::SourceDocument;

pub struct CompressionController<R, E, A> {
    config: CompressionConfig,
    rasterizer: R,
    encoder: E,
    assembler: A,
}

impl CompressionController<HayroRasterizer, JpegPageEncoder, LopdfAssembler> {
    /// Controller wired to the hayro / JPEG / lopdf pipeline.
    pub fn with_defaults(config: CompressionConfig) -> Self {
        let rasterizer = HayroRasterizer::new(config.render_dpi);
        Self::new(config, rasterizer, JpegPageEncoder, LopdfAssembler)
    }
}

impl<R, E, A> CompressionController<R, E, A>
where
    R: PageRasterizer,
    E: PageEncoder,
    A: DocumentAssembler,
{
    pub fn new(config: CompressionConfig, rasterizer: R, encoder: E, assembler: A) -> Self {
        Self {
            config,
            rasterizer,
            encoder,
            assembler,
        }
    }

    pub fn config(&self) -> &CompressionConfig {
        &self.config
    }

    pub fn run(&self, source: &SourceDocument) -> Result<SearchOutcome> {
        self.run_with(source, &AtomicBool::new(false), |_| {})
    }

    /// Run the search, calling `on_iteration` after every measured iteration.
    ///
    /// `cancel` is polled before each iteration. Everything produced along
    /// the way lives in memory, so returning on any path releases it.
    pub fn run_with<F>(
        &self,
        source: &SourceDocument,
        cancel: &AtomicBool,
        mut on_iteration: F,
    ) -> Result<SearchOutcome>
    where
        F: FnMut(&IterationResult),
    {
        self.config.validate()?;

        let pages = self.rasterizer.rasterize(source)?;
        log::info!(
            "Rasterized {} pages from {}",
            pages.len(),
            source.path().display()
        );

        let mut state = SearchState::new(&self.config);
        loop {
            if cancel.load(Ordering::Relaxed) {
                return Err(CompressError::Cancelled {
                    iterations: state.iteration_count(),
                });
            }

            let params = state.current();
            let result = run_iteration(
                &pages,
                &params,
                state.iteration_count() + 1,
                &self.encoder,
                &self.assembler,
            )?;
            log::info!(
                "Current file size: {:.2} MB with {}",
                result.size_mb(),
                params
            );
            on_iteration(&result);

            match state.observe(result) {
                Step::Continue(_) => {}
                Step::Finish(outcome) => {
                    match &outcome {
                        SearchOutcome::Converged(best) => {
                            log::info!("Converged at {:.2} MB", best.size_mb())
                        }
                        SearchOutcome::BestAvailable { result, reason } => log::warn!(
                            "Stopped with best result {:.2} MB ({})",
                            result.size_mb(),
                            reason
                        ),
                        SearchOutcome::Exhausted { iterations, .. } => log::warn!(
                            "No result under {:.2} MB after {} iterations",
                            self.config.max_size_mb,
                            iterations
                        ),
                    }
                    return Ok(outcome);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BYTES_PER_MB;
    use crate::pipeline::{AssembledDocument, EncodedPage, PageImage};
    use crate::search::{CompressionParameters, StopReason};
    use image::{DynamicImage, RgbImage};
    use std::cell::Cell;

    struct BlankRasterizer {
        pages: usize,
        calls: Cell<usize>,
    }

    impl BlankRasterizer {
        fn new(pages: usize) -> Self {
            Self {
                pages,
                calls: Cell::new(0),
            }
        }
    }

    impl PageRasterizer for BlankRasterizer {
        fn rasterize(&self, _source: &SourceDocument) -> Result<Vec<PageImage>> {
            self.calls.set(self.calls.get() + 1);
            Ok((0..self.pages)
                .map(|index| PageImage {
                    index,
                    image: DynamicImage::ImageRgb8(RgbImage::new(170, 220)),
                    dpi: 20.0,
                })
                .collect())
        }
    }

    struct FailingRasterizer;

    impl PageRasterizer for FailingRasterizer {
        fn rasterize(&self, _source: &SourceDocument) -> Result<Vec<PageImage>> {
            Err(CompressError::Rasterize {
                page: Some(2),
                message: "broken page".into(),
            })
        }
    }

    /// Emits `page_mb * scale^2 * quality/100` megabytes per page.
    struct ModelEncoder {
        page_mb: f64,
        fail_on: Option<usize>,
    }

    impl PageEncoder for ModelEncoder {
        fn encode_page(&self, page: &PageImage, params: &CompressionParameters) -> Result<EncodedPage> {
            if self.fail_on == Some(page.index) {
                return Err(CompressError::Encode {
                    page: page.index + 1,
                    source: image::ImageError::Limits(image::error::LimitError::from_kind(
                        image::error::LimitErrorKind::InsufficientMemory,
                    )),
                });
            }
            let factor = params.scale_factor * params.scale_factor * params.quality as f64 / 100.0;
            let len = (self.page_mb * BYTES_PER_MB * factor) as usize;
            Ok(EncodedPage {
                index: page.index,
                bytes: vec![page.index as u8; len],
                width: page.width(),
                height: page.height(),
                page_width_pt: 0.0,
                page_height_pt: 0.0,
            })
        }
    }

    struct ConcatAssembler;

    impl DocumentAssembler for ConcatAssembler {
        fn assemble(&self, pages: &[EncodedPage]) -> Result<AssembledDocument> {
            Ok(AssembledDocument {
                bytes: pages.iter().flat_map(|p| p.bytes.iter().copied()).collect(),
            })
        }
    }

    fn source() -> SourceDocument {
        SourceDocument::from_bytes("input.pdf", b"%PDF-1.7\n".to_vec()).unwrap()
    }

    fn controller(
        config: CompressionConfig,
        pages: usize,
        page_mb: f64,
    ) -> CompressionController<BlankRasterizer, ModelEncoder, ConcatAssembler> {
        CompressionController::new(
            config,
            BlankRasterizer::new(pages),
            ModelEncoder {
                page_mb,
                fail_on: None,
            },
            ConcatAssembler,
        )
    }

    #[test]
    fn converges_and_rasterizes_once() {
        let config = CompressionConfig::default().with_max_size_mb(0.2);
        let controller = controller(config.clone(), 10, 0.1);

        let mut sizes = Vec::new();
        let outcome = controller
            .run_with(&source(), &AtomicBool::new(false), |r| sizes.push(r.size_bytes()))
            .unwrap();

        assert_eq!(controller.rasterizer.calls.get(), 1);
        let result = match outcome {
            SearchOutcome::Converged(result) => result,
            other => panic!("expected convergence, got {:?}", other),
        };
        assert!(result.size_bytes() <= config.max_size_bytes());
        assert!(result.size_bytes() >= config.tolerance_floor_bytes());
        assert!(sizes.len() > 1);
        assert!(sizes[0] > config.max_size_bytes());
    }

    #[test]
    fn reports_exhaustion_without_error() {
        let config = CompressionConfig::default().with_max_size_mb(0.00001);
        let outcome = controller(config, 3, 0.1).run(&source()).unwrap();

        assert!(!outcome.is_success());
        assert!(matches!(outcome, SearchOutcome::Exhausted { .. }));
    }

    #[test]
    fn stops_at_scale_ceiling_when_document_is_small() {
        let config = CompressionConfig::default().with_max_size_mb(50.0);
        let outcome = controller(config, 2, 0.01).run(&source()).unwrap();

        match outcome {
            SearchOutcome::BestAvailable { result, reason } => {
                assert_eq!(reason, StopReason::ScaleCeiling);
                assert_eq!(result.parameters.scale_factor, 1.0);
            }
            other => panic!("expected best-available exit, got {:?}", other),
        }
    }

    #[test]
    fn invalid_config_fails_before_rasterizing() {
        let config = CompressionConfig::default().with_max_size_mb(-1.0);
        let controller = controller(config, 2, 0.1);

        let err = controller.run(&source()).unwrap_err();
        assert!(matches!(err, CompressError::InvalidConfig(_)));
        assert_eq!(controller.rasterizer.calls.get(), 0);
    }

    #[test]
    fn rasterizer_failure_aborts_before_first_iteration() {
        let controller = CompressionController::new(
            CompressionConfig::default(),
            FailingRasterizer,
            ModelEncoder {
                page_mb: 0.1,
                fail_on: None,
            },
            ConcatAssembler,
        );
        let mut iterations = 0;
        let err = controller
            .run_with(&source(), &AtomicBool::new(false), |_| iterations += 1)
            .unwrap_err();

        assert_eq!(iterations, 0);
        assert_eq!(err.stage(), "rasterize");
    }

    #[test]
    fn encoder_failure_names_page() {
        let controller = CompressionController::new(
            CompressionConfig::default(),
            BlankRasterizer::new(5),
            ModelEncoder {
                page_mb: 0.1,
                fail_on: Some(3),
            },
            ConcatAssembler,
        );
        let err = controller.run(&source()).unwrap_err();
        assert!(matches!(err, CompressError::Encode { page: 4, .. }));
    }

    #[test]
    fn cancellation_is_checked_between_iterations() {
        let config = CompressionConfig::default().with_max_size_mb(0.2);
        let controller = controller(config, 10, 0.1);
        let cancel = AtomicBool::new(false);

        let err = controller
            .run_with(&source(), &cancel, |_| cancel.store(true, Ordering::Relaxed))
            .unwrap_err();
        assert!(matches!(err, CompressError::Cancelled { iterations: 1 }));
    }

    #[test]
    fn preset_cancellation_runs_no_iterations() {
        let controller = controller(CompressionConfig::default(), 1, 0.1);
        let cancel = AtomicBool::new(true);
        let err = controller.run_with(&source(), &cancel, |_| {}).unwrap_err();
        assert!(matches!(err, CompressError::Cancelled { iterations: 0 }));
    }
}
