//! Robust 1-D registration matcher (ICP-style).
//!
//! Aligns the longer series ("data") onto the shorter one ("model") by
//! iterating:
//!
//! 1. Select an active subset of the working data per the configured
//!    outlier-rejection mode, with at most one data point per model point
//! 2. Re-run nearest-neighbor correspondence search
//! 3. Solve the 1-D optimal translation of the subset (L1 objective)
//! 4. Apply the translation to the whole working copy and accumulate it
//!
//! The loop exits once the magnitude of the last translation drops below
//! the threshold, or at the iteration cap. There is no guaranteed
//! monotonic cost decrease, so the cap is a hard stop, not a fallback.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::correspondence::nearest_indices;
use super::initial_guess::{self, SampleConsensus, SampleConsensusConfig};
use super::{require_non_empty, LagMatcher, MatchAux, MatchError, MatchResult};
use crate::core::optimize::minimize_l1_translation;
use crate::core::stats;

/// Outlier rejection policy for the active-subset selection.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub enum OutlierMode {
    /// Use every data point.
    #[default]
    None,

    /// Trimmed matching: keep the fraction of points with the smallest
    /// current nearest-model distance. Must lie in `[0, 1]`.
    Fraction(f64),

    /// Keep points whose nearest-model distance is within ~1.28 standard
    /// deviations of the mean distance (an 80% confidence band).
    Confidence,
}

/// Configuration for [`IcpLagMatcher`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IcpLagConfig {
    /// Maximum number of iterations.
    /// Default: 50
    pub max_iterations: u32,

    /// Convergence threshold on the translation magnitude.
    /// Default: 1e-6
    pub threshold: f64,

    /// Override for the initial offset, expressed as the expected
    /// trigger-to-response delay. When absent, the sample-consensus
    /// estimate seeds the loop.
    pub initial_offset: Option<f64>,

    /// Outlier rejection mode.
    /// Default: [`OutlierMode::None`]
    pub outlier_mode: OutlierMode,

    /// Drop residuals outside the 2.58-sigma band from the reported
    /// statistics.
    /// Default: true
    pub trim_residuals: bool,

    /// RNG seed for the sample-consensus initial guess.
    pub seed: Option<u64>,
}

impl Default for IcpLagConfig {
    fn default() -> Self {
        Self {
            max_iterations: 50,
            threshold: 1e-6,
            initial_offset: None,
            outlier_mode: OutlierMode::None,
            trim_residuals: true,
            seed: None,
        }
    }
}

impl IcpLagConfig {
    /// Fail fast on out-of-range values before any numerical work.
    pub fn validate(&self) -> Result<(), MatchError> {
        if self.max_iterations == 0 {
            return Err(MatchError::InvalidConfig(
                "max_iterations must be at least 1".into(),
            ));
        }
        if !(self.threshold > 0.0) {
            return Err(MatchError::InvalidConfig(
                "threshold must be positive".into(),
            ));
        }
        if let OutlierMode::Fraction(f) = self.outlier_mode {
            if !(0.0..=1.0).contains(&f) {
                return Err(MatchError::InvalidConfig(format!(
                    "outlier fraction {f} outside [0, 1]"
                )));
            }
        }
        Ok(())
    }
}

/// Injectable per-iteration observer replacing ad-hoc plotting hooks.
///
/// The default sink does nothing; [`LogSink`] forwards to the log.
pub trait IterationSink: Send + Sync {
    fn on_iteration(&self, iteration: u32, offset: f64, step: f64, active: usize);
}

/// Sink that ignores every iteration.
pub struct NullSink;

impl IterationSink for NullSink {
    fn on_iteration(&self, _: u32, _: f64, _: f64, _: usize) {}
}

/// Sink that reports each iteration at debug level.
pub struct LogSink;

impl IterationSink for LogSink {
    fn on_iteration(&self, iteration: u32, offset: f64, step: f64, active: usize) {
        log::debug!(
            "icp iteration {iteration}: offset {offset:.6} step {step:.6} active {active}"
        );
    }
}

/// Iterative robust registration matcher.
pub struct IcpLagMatcher {
    config: IcpLagConfig,
    sink: Box<dyn IterationSink>,
}

impl fmt::Debug for IcpLagMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IcpLagMatcher")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl IcpLagMatcher {
    /// Create a matcher, validating the configuration.
    pub fn new(config: IcpLagConfig) -> Result<Self, MatchError> {
        config.validate()?;
        Ok(Self {
            config,
            sink: Box::new(NullSink),
        })
    }

    /// Replace the iteration observer.
    pub fn with_sink(mut self, sink: Box<dyn IterationSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Current configuration.
    pub fn config(&self) -> &IcpLagConfig {
        &self.config
    }
}

impl LagMatcher for IcpLagMatcher {
    fn match_series(&self, trigger: &[f64], response: &[f64]) -> Result<MatchResult, MatchError> {
        require_non_empty(trigger, response)?;

        // The shorter series is the fixed model; the longer one is shifted
        // onto it. Residual signs flip when the roles are swapped.
        let swapped = response.len() > trigger.len();
        let (data, model) = if swapped {
            log::debug!("response series is longer; aligning response onto trigger");
            (response, trigger)
        } else {
            (trigger, response)
        };

        let initial = match self.config.initial_offset {
            // User offsets are trigger-to-response delays; flip into the
            // internal data-onto-model orientation when roles swapped.
            Some(value) => {
                if swapped {
                    -value
                } else {
                    value
                }
            }
            None => {
                let consensus = SampleConsensus::new(SampleConsensusConfig {
                    seed: self.config.seed,
                    ..SampleConsensusConfig::default()
                });
                initial_guess::ensemble_diagnostic(data, model, &consensus)
            }
        };

        let mut working: Vec<f64> = data.iter().map(|d| d + initial).collect();
        let mut offset = initial;
        let mut converged = false;
        let mut iterations = 0u32;

        for iteration in 0..self.config.max_iterations {
            iterations = iteration + 1;

            let active = select_active(&working, model, self.config.outlier_mode);
            let subset: Vec<f64> = active.iter().map(|&(i, _)| working[i]).collect();
            let targets: Vec<f64> = active.iter().map(|&(_, j)| model[j]).collect();

            let step = minimize_l1_translation(&subset, &targets);
            for w in &mut working {
                *w += step;
            }
            offset += step;
            self.sink.on_iteration(iterations, offset, step, active.len());

            if step.abs() < self.config.threshold {
                converged = true;
                break;
            }
        }
        log::debug!("final offset {offset:.6} after {iterations} iterations");

        // One last correspondence pass over the full working copy. The
        // reported delay is matched model minus the original (unshifted)
        // data, re-expressed in trigger/response orientation.
        let nn = nearest_indices(&working, model);
        let mut residuals = Vec::with_capacity(data.len());
        let mut pairs = Vec::with_capacity(data.len());
        for (i, &j) in nn.iter().enumerate() {
            let delay = model[j] - data[i];
            residuals.push(if swapped { -delay } else { delay });
            pairs.push(if swapped { (j, i) } else { (i, j) });
        }

        let aux = MatchAux::Registration {
            offset: if swapped { -offset } else { offset },
            iterations,
            converged,
        };
        MatchResult::from_residuals(residuals, pairs, aux, self.config.trim_residuals)
    }
}

/// Active-subset selection: apply the outlier mode, then keep at most one
/// data point per model point (smallest distance wins).
///
/// Returns `(data index, model index)` pairs sorted by data index.
pub(crate) fn select_active(
    working: &[f64],
    model: &[f64],
    mode: OutlierMode,
) -> Vec<(usize, usize)> {
    let nn = nearest_indices(working, model);
    let dist: Vec<f64> = working
        .iter()
        .zip(&nn)
        .map(|(w, &j)| (w - model[j]).abs())
        .collect();

    let mut keep: Vec<usize> = (0..working.len()).collect();
    match mode {
        OutlierMode::None => {}
        OutlierMode::Fraction(f) => {
            keep.sort_by(|&a, &b| dist[a].partial_cmp(&dist[b]).unwrap());
            let cap = ((f * working.len() as f64).floor() as usize).min(model.len());
            keep.truncate(cap);
        }
        OutlierMode::Confidence => {
            let mean = stats::mean(&dist);
            let sd = stats::std_dev(&dist);
            if sd > 0.0 {
                keep.retain(|&i| (dist[i] - mean).abs() <= 1.28 * sd);
            }
        }
    }

    let mut best: HashMap<usize, usize> = HashMap::with_capacity(keep.len());
    for &i in &keep {
        match best.entry(nn[i]) {
            Entry::Occupied(mut slot) => {
                if dist[i] < dist[*slot.get()] {
                    slot.insert(i);
                }
            }
            Entry::Vacant(slot) => {
                slot.insert(i);
            }
        }
    }

    let mut active: Vec<(usize, usize)> = best.into_iter().map(|(j, i)| (i, j)).collect();
    active.sort_unstable();
    active
}
