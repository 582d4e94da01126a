//! Adaptive search over scale factor and JPEG quality.
//!
//! Each observed iteration either ends the search or yields the next pair of
//! parameters to try. Overshooting the ceiling tightens both knobs by a
//! multiplicative step; undershooting the tolerance band relaxes them. The
//! state keeps a single best accepted result, replaced only by a strictly
//! larger one that still fits under the ceiling.

use std::fmt;

use crate::config::CompressionConfig;
use crate::pipeline::IterationResult;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompressionParameters {
    pub scale_factor: f64,
    pub quality: u8,
}

impl CompressionParameters {
    /// True when `self` would produce output at least as large as `other`.
    fn dominates(&self, other: &CompressionParameters) -> bool {
        self.scale_factor >= other.scale_factor && self.quality >= other.quality
    }
}

impl fmt::Display for CompressionParameters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "scale factor: {:.4} and quality: {}",
            self.scale_factor, self.quality
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParameterBounds {
    pub min_scale: f64,
    pub max_scale: f64,
    pub min_quality: u8,
    pub max_quality: u8,
}

impl ParameterBounds {
    pub fn clamp(&self, params: CompressionParameters) -> CompressionParameters {
        CompressionParameters {
            scale_factor: params.scale_factor.clamp(self.min_scale, self.max_scale),
            quality: params.quality.clamp(self.min_quality, self.max_quality),
        }
    }

    /// Neither knob can shrink output any further.
    pub fn at_floor(&self, params: &CompressionParameters, adjust_quality: bool) -> bool {
        params.scale_factor <= self.min_scale
            && (!adjust_quality || params.quality <= self.min_quality)
    }

    pub fn at_scale_ceiling(&self, params: &CompressionParameters) -> bool {
        params.scale_factor >= self.max_scale
    }
}

/// Why a search stopped with a best-effort result instead of converging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The maximum scale factor was reached while an accepted result was held
    ScaleCeiling,
    /// Relaxing further would repeat parameters already known to overshoot
    Bracketed,
    /// Overshoot at the parameter floor after an earlier accepted result
    FloorReached,
    IterationLimit,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            StopReason::ScaleCeiling => "maximum scale factor reached",
            StopReason::Bracketed => "no untried parameters between accepted and overshooting results",
            StopReason::FloorReached => "scale and quality at their minima",
            StopReason::IterationLimit => "iteration limit reached",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone)]
pub enum SearchOutcome {
    /// Output fits within the tolerance band below the ceiling
    Converged(IterationResult),
    /// Output fits under the ceiling but the band could not be reached
    BestAvailable {
        result: IterationResult,
        reason: StopReason,
    },
    /// No iteration produced output under the ceiling
    Exhausted {
        iterations: usize,
        smallest_size_bytes: Option<u64>,
        last_parameters: CompressionParameters,
    },
}

impl SearchOutcome {
    pub fn result(&self) -> Option<&IterationResult> {
        match self {
            SearchOutcome::Converged(result) | SearchOutcome::BestAvailable { result, .. } => {
                Some(result)
            }
            SearchOutcome::Exhausted { .. } => None,
        }
    }

    pub fn into_result(self) -> Option<IterationResult> {
        match self {
            SearchOutcome::Converged(result) | SearchOutcome::BestAvailable { result, .. } => {
                Some(result)
            }
            SearchOutcome::Exhausted { .. } => None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.result().is_some()
    }
}

#[derive(Debug)]
pub enum Step {
    Continue(CompressionParameters),
    Finish(SearchOutcome),
}

#[derive(Debug, Clone)]
struct SearchPolicy {
    bounds: ParameterBounds,
    ceiling_bytes: u64,
    floor_bytes: u64,
    relax_step: f64,
    tighten_step: f64,
    adjust_quality: bool,
    max_iterations: usize,
}

/// Mutable state of one search run.
#[derive(Debug)]
pub struct SearchState {
    policy: SearchPolicy,
    current: CompressionParameters,
    best_accepted: Option<IterationResult>,
    iteration_count: usize,
    overshoots: Vec<CompressionParameters>,
    smallest_size_bytes: Option<u64>,
}

impl SearchState {
    pub fn new(config: &CompressionConfig) -> Self {
        let bounds = config.bounds();
        Self {
            policy: SearchPolicy {
                bounds,
                ceiling_bytes: config.max_size_bytes(),
                floor_bytes: config.tolerance_floor_bytes(),
                relax_step: config.relax_step,
                tighten_step: config.tighten_step,
                adjust_quality: config.adjust_quality,
                max_iterations: config.max_iterations,
            },
            current: bounds.clamp(config.initial_parameters()),
            best_accepted: None,
            iteration_count: 0,
            overshoots: Vec::new(),
            smallest_size_bytes: None,
        }
    }

    pub fn current(&self) -> CompressionParameters {
        self.current
    }

    pub fn iteration_count(&self) -> usize {
        self.iteration_count
    }

    pub fn best_accepted(&self) -> Option<&IterationResult> {
        self.best_accepted.as_ref()
    }

    /// Scale and quality lowered by one step, clamped to the minima.
    pub fn tighten(&self, params: &CompressionParameters) -> CompressionParameters {
        let policy = &self.policy;
        let quality = if policy.adjust_quality {
            step_quality(params.quality, policy.tighten_step)
        } else {
            params.quality
        };
        policy.bounds.clamp(CompressionParameters {
            scale_factor: params.scale_factor * policy.tighten_step,
            quality,
        })
    }

    /// Scale and quality raised by one step, clamped to the maxima.
    pub fn relax(&self, params: &CompressionParameters) -> CompressionParameters {
        let policy = &self.policy;
        let quality = if policy.adjust_quality {
            step_quality(params.quality, policy.relax_step)
        } else {
            params.quality
        };
        policy.bounds.clamp(CompressionParameters {
            scale_factor: params.scale_factor * policy.relax_step,
            quality,
        })
    }

    /// Feed the result of the iteration run at [`current`](Self::current).
    pub fn observe(&mut self, result: IterationResult) -> Step {
        self.iteration_count += 1;
        let size = result.size_bytes();
        let evaluated = result.parameters;
        self.smallest_size_bytes = Some(self.smallest_size_bytes.map_or(size, |s| s.min(size)));

        if size <= self.policy.ceiling_bytes {
            let converged = size >= self.policy.floor_bytes;
            self.offer(result);

            if converged {
                return self.finish_with_best(None);
            }
            if self.policy.bounds.at_scale_ceiling(&evaluated) {
                return self.finish_with_best(Some(StopReason::ScaleCeiling));
            }

            let next = self.relax(&evaluated);
            if self.overshoots.iter().any(|over| next.dominates(over)) {
                return self.finish_with_best(Some(StopReason::Bracketed));
            }
            log::debug!("undershoot at {} bytes, relaxing to {}", size, next);
            self.advance(next)
        } else {
            self.overshoots.push(evaluated);

            if self
                .policy
                .bounds
                .at_floor(&evaluated, self.policy.adjust_quality)
            {
                return self.finish_with_best(Some(StopReason::FloorReached));
            }
            if self.best_accepted.is_some() && self.policy.bounds.at_scale_ceiling(&evaluated) {
                return self.finish_with_best(Some(StopReason::ScaleCeiling));
            }

            let next = self.tighten(&evaluated);
            log::debug!("overshoot at {} bytes, tightening to {}", size, next);
            self.advance(next)
        }
    }

    fn advance(&mut self, next: CompressionParameters) -> Step {
        if self.iteration_count >= self.policy.max_iterations {
            return self.finish_with_best(Some(StopReason::IterationLimit));
        }
        self.current = next;
        Step::Continue(next)
    }

    /// Keep `result` only if it lands closer to the ceiling than the current best.
    fn offer(&mut self, result: IterationResult) {
        let replace = match &self.best_accepted {
            Some(best) => result.size_bytes() > best.size_bytes(),
            None => true,
        };
        if replace {
            self.best_accepted = Some(result);
        }
    }

    /// `reason == None` marks convergence inside the tolerance band.
    fn finish_with_best(&mut self, reason: Option<StopReason>) -> Step {
        let outcome = match (self.best_accepted.take(), reason) {
            (Some(result), None) => SearchOutcome::Converged(result),
            (Some(result), Some(reason)) => SearchOutcome::BestAvailable { result, reason },
            (None, _) => SearchOutcome::Exhausted {
                iterations: self.iteration_count,
                smallest_size_bytes: self.smallest_size_bytes,
                last_parameters: self.current,
            },
        };
        Step::Finish(outcome)
    }
}

/// Multiply `quality` by `step`, moving at least one unit in the step's direction.
fn step_quality(quality: u8, step: f64) -> u8 {
    let scaled = (quality as f64 * step).round().clamp(0.0, 255.0) as u8;
    if step < 1.0 {
        scaled.min(quality.saturating_sub(1))
    } else {
        scaled.max(quality.saturating_add(1))
    }
}
