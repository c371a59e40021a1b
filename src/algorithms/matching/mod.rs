//! Time-lag matching engine.
//!
//! Provides algorithms for pairing trigger occurrences with response
//! occurrences and estimating the delay distribution between them.
//!
//! # Algorithms
//!
//! - [`IcpLagMatcher`]: iterative robust point registration
//! - [`LpAssignmentMatcher`]: relaxed one-to-one assignment over a
//!   pluggable LP/ILP backend
//! - [`EmLagMatcher`]: expectation-maximization with multi-batch restarts
//! - [`MunkresMatcher`]: exact bipartite assignment (external primitive)
//!
//! # Example
//!
//! ```
//! use vilamba::algorithms::matching::{LagMatcher, MunkresMatcher};
//!
//! let matcher = MunkresMatcher::default();
//! let result = matcher
//!     .match_series(&[5.0, 20.0, 27.0], &[12.0, 25.0, 32.0])
//!     .unwrap();
//! assert_eq!(result.pairs, vec![(0, 0), (1, 1), (2, 2)]);
//! ```

pub mod assignment;
pub mod correspondence;
pub mod icp;
pub mod initial_guess;
pub mod lag_em;
pub mod munkres;

pub use assignment::{LpAssignmentConfig, LpAssignmentMatcher, RoundingTransform};
pub use icp::{IcpLagConfig, IcpLagMatcher, IterationSink, LogSink, NullSink, OutlierMode};
pub use lag_em::{EmLagConfig, EmLagMatcher};
pub use munkres::MunkresMatcher;

use rayon::prelude::*;
use serde::Serialize;
use thiserror::Error;

use crate::core::distribution::{DistributionError, KdeDistribution};
use crate::core::stats;
use crate::core::types::EventSequence;
use crate::solver::SolverError;

/// Errors raised by the matching engine.
///
/// Numerical degeneracy (EM divergence, LP infeasibility) is *not* an
/// error: those paths recover locally and return a best-effort result
/// with a logged warning.
#[derive(Debug, Error)]
pub enum MatchError {
    /// One of the input series holds no events.
    #[error("{role} series is empty; a match needs at least one event on each side")]
    EmptySeries { role: &'static str },

    /// A configuration value is out of range or contradictory.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A solver backend cannot run at all.
    #[error(transparent)]
    Solver(#[from] SolverError),

    /// Residual distribution could not be formed.
    #[error(transparent)]
    Distribution(#[from] DistributionError),
}

/// Algorithm-specific auxiliary data carried next to the common fields.
#[derive(Debug, Clone, Serialize)]
pub enum MatchAux {
    /// Registration matcher: accumulated offset and loop telemetry.
    Registration {
        offset: f64,
        iterations: u32,
        converged: bool,
    },
    /// Assignment matcher: which backend ran, and whether it degenerated
    /// to the all-zero fallback solution.
    Assignment {
        backend: &'static str,
        degenerate: bool,
    },
    /// EM matcher: winning likelihood plus per-batch winners kept as a
    /// repeated-convergence diagnostic (they never change the answer).
    Em {
        likelihood: f64,
        batch_means: Vec<f64>,
        batch_likelihoods: Vec<f64>,
    },
    /// Munkres matcher: total squared-delay cost of the assignment.
    Munkres { total_cost: f64 },
}

/// Result of one match call.
///
/// Created once at the end of the call; immutable afterwards.
#[derive(Debug, Clone, Serialize)]
pub struct MatchResult {
    /// Mean delay between matched pairs.
    pub mean: f64,

    /// Delay spread (sample standard deviation).
    pub std_dev: f64,

    /// Non-parametric density estimate of the matched delays.
    pub kde: KdeDistribution,

    /// Correspondences as `(trigger index, response index)` into the
    /// original, pre-trim series positions.
    pub pairs: Vec<(usize, usize)>,

    /// Algorithm-specific extras.
    pub aux: MatchAux,
}

impl MatchResult {
    /// Build a result from raw matched residuals.
    ///
    /// With `trim` set, residuals outside the 2.58-sigma band are dropped
    /// from the statistics (the pair list stays complete). An empty
    /// residual vector degenerates to a zero result rather than failing.
    pub(crate) fn from_residuals(
        residuals: Vec<f64>,
        pairs: Vec<(usize, usize)>,
        aux: MatchAux,
        trim: bool,
    ) -> Result<Self, MatchError> {
        let kept = if trim {
            stats::trim_outliers(&residuals)
        } else {
            residuals
        };
        let samples = if kept.is_empty() {
            log::warn!("no matched residuals; reporting a degenerate zero result");
            vec![0.0]
        } else {
            kept
        };
        let kde = KdeDistribution::new(samples.clone())?;
        Ok(Self {
            mean: stats::mean(&samples),
            std_dev: stats::std_dev(&samples),
            kde,
            pairs,
            aux,
        })
    }
}

/// Outcome of one trigger/response pairing inside [`LagMatcher::match_all`].
#[derive(Debug)]
pub struct PairMatch {
    pub trigger: String,
    pub response: String,
    pub result: Result<MatchResult, MatchError>,
}

/// Common contract implemented by every matching algorithm.
pub trait LagMatcher {
    /// Run the algorithm once for one trigger/response series pair.
    fn match_series(&self, trigger: &[f64], response: &[f64]) -> Result<MatchResult, MatchError>;

    /// Run [`LagMatcher::match_series`] for every ordered pair of distinct
    /// event types that occur in `sequence`.
    ///
    /// Each call owns its working state exclusively, so pairs run on
    /// parallel worker threads.
    fn match_all(&self, sequence: &EventSequence) -> Vec<PairMatch>
    where
        Self: Sync,
    {
        let types: Vec<String> = sequence
            .event_types()
            .into_iter()
            .map(str::to_owned)
            .collect();
        let mut combos = Vec::new();
        for t in &types {
            for r in &types {
                if t != r {
                    combos.push((t.clone(), r.clone()));
                }
            }
        }
        combos
            .into_par_iter()
            .map(|(trigger, response)| {
                let a = sequence.timestamps(&trigger);
                let b = sequence.timestamps(&response);
                let result = self.match_series(&a, &b);
                PairMatch {
                    trigger,
                    response,
                    result,
                }
            })
            .collect()
    }
}

/// Closed set of matching algorithms behind one dispatch point.
pub enum Matcher {
    Registration(IcpLagMatcher),
    Assignment(LpAssignmentMatcher),
    Em(EmLagMatcher),
    Munkres(MunkresMatcher),
}

impl LagMatcher for Matcher {
    fn match_series(&self, trigger: &[f64], response: &[f64]) -> Result<MatchResult, MatchError> {
        match self {
            Matcher::Registration(m) => m.match_series(trigger, response),
            Matcher::Assignment(m) => m.match_series(trigger, response),
            Matcher::Em(m) => m.match_series(trigger, response),
            Matcher::Munkres(m) => m.match_series(trigger, response),
        }
    }
}

/// Fail fast on empty inputs before any numerical work begins.
pub(crate) fn require_non_empty(trigger: &[f64], response: &[f64]) -> Result<(), MatchError> {
    if trigger.is_empty() {
        return Err(MatchError::EmptySeries { role: "trigger" });
    }
    if response.is_empty() {
        return Err(MatchError::EmptySeries { role: "response" });
    }
    Ok(())
}
