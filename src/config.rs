//! Runtime settings for one compression run.

use crate::error::{CompressError, Result};
use crate::search::{CompressionParameters, ParameterBounds};

pub const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Knobs for the size-targeting search.
#[derive(Debug, Clone, PartialEq)]
pub struct CompressionConfig {
    /// Size ceiling in binary megabytes
    pub max_size_mb: f64,
    /// Fraction below the ceiling that still counts as converged
    pub tolerance: f64,
    pub initial_scale: f64,
    pub initial_quality: u8,
    pub min_scale: f64,
    pub max_scale: f64,
    pub min_quality: u8,
    pub max_quality: u8,
    /// Multiplier applied when the output undershoots the tolerance band
    pub relax_step: f64,
    /// Multiplier applied when the output overshoots the ceiling
    pub tighten_step: f64,
    /// When false only the scale factor moves
    pub adjust_quality: bool,
    /// Hard cap on encode/assemble cycles
    pub max_iterations: usize,
    /// Resolution pages are rasterized at before any scaling
    pub render_dpi: f32,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            max_size_mb: 4.0,
            tolerance: 0.1,
            initial_scale: 0.5,
            initial_quality: 90,
            min_scale: 0.1,
            max_scale: 1.0,
            min_quality: 10,
            max_quality: 100,
            relax_step: 1.05,
            tighten_step: 0.95,
            adjust_quality: true,
            max_iterations: 50,
            render_dpi: 200.0,
        }
    }
}

impl CompressionConfig {
    pub fn with_max_size_mb(mut self, max_size_mb: f64) -> Self {
        self.max_size_mb = max_size_mb;
        self
    }

    pub fn max_size_bytes(&self) -> u64 {
        (self.max_size_mb * BYTES_PER_MB).floor() as u64
    }

    /// Smallest size, in bytes, that ends the search as converged.
    pub fn tolerance_floor_bytes(&self) -> u64 {
        let floor = ((1.0 - self.tolerance) * self.max_size_mb * BYTES_PER_MB).ceil() as u64;
        floor.min(self.max_size_bytes())
    }

    pub fn bounds(&self) -> ParameterBounds {
        ParameterBounds {
            min_scale: self.min_scale,
            max_scale: self.max_scale,
            min_quality: self.min_quality,
            max_quality: self.max_quality,
        }
    }

    pub fn initial_parameters(&self) -> CompressionParameters {
        CompressionParameters {
            scale_factor: self.initial_scale,
            quality: self.initial_quality,
        }
    }

    pub fn validate(&self) -> Result<()> {
        let fail = |msg: String| Err(CompressError::InvalidConfig(msg));

        if !(self.max_size_mb.is_finite() && self.max_size_mb > 0.0) {
            return fail(format!("max size must be positive, got {}", self.max_size_mb));
        }
        if !(0.0..1.0).contains(&self.tolerance) {
            return fail(format!("tolerance must be in [0, 1), got {}", self.tolerance));
        }
        if !(self.min_scale > 0.0 && self.min_scale <= self.max_scale && self.max_scale.is_finite()) {
            return fail(format!(
                "scale bounds must satisfy 0 < min <= max, got [{}, {}]",
                self.min_scale, self.max_scale
            ));
        }
        if self.min_quality == 0 || self.max_quality > 100 || self.min_quality > self.max_quality {
            return fail(format!(
                "quality bounds must satisfy 1 <= min <= max <= 100, got [{}, {}]",
                self.min_quality, self.max_quality
            ));
        }
        if !(self.min_scale..=self.max_scale).contains(&self.initial_scale) {
            return fail(format!(
                "initial scale {} outside [{}, {}]",
                self.initial_scale, self.min_scale, self.max_scale
            ));
        }
        if !(self.min_quality..=self.max_quality).contains(&self.initial_quality) {
            return fail(format!(
                "initial quality {} outside [{}, {}]",
                self.initial_quality, self.min_quality, self.max_quality
            ));
        }
        if !(self.relax_step > 1.0 && self.relax_step.is_finite()) {
            return fail(format!("relax step must be > 1, got {}", self.relax_step));
        }
        if !(self.tighten_step > 0.0 && self.tighten_step < 1.0) {
            return fail(format!("tighten step must be in (0, 1), got {}", self.tighten_step));
        }
        if self.max_iterations == 0 {
            return fail("max iterations must be at least 1".to_string());
        }
        if !(self.render_dpi.is_finite() && self.render_dpi > 0.0) {
            return fail(format!("render DPI must be positive, got {}", self.render_dpi));
        }
        Ok(())
    }
}
