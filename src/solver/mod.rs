//! Relaxed-assignment solving capability.
//!
//! The assignment matcher formulates one-to-one pairing as a linear
//! program and delegates to a pluggable backend implementing
//! [`AssignmentBackend`]. Backends return a *relaxed* (possibly
//! fractional) weight per candidate pair; rounding to a hard assignment
//! happens in the matcher, not here.
//!
//! # Backends
//!
//! - [`RelaxedLpBackend`]: in-process simplex LP (default)
//! - [`IntegerBackend`]: in-process mixed-integer formulation
//! - [`GlpkProcessBackend`]: bridge to an external `glpsol` process,
//!   fallible and single-flighted, with an explicit timeout

mod glpsol;
mod relaxed;

pub use glpsol::GlpkProcessBackend;
pub use relaxed::{IntegerBackend, RelaxedLpBackend};

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors reported by assignment backends.
#[derive(Debug, Error)]
pub enum SolverError {
    /// The backend reported the problem infeasible or failed to converge.
    #[error("assignment problem unsolved: {0}")]
    Infeasible(String),

    /// The backend cannot run at all (e.g. external binary missing).
    #[error("solver backend `{backend}` unavailable: {reason}")]
    BackendUnavailable {
        backend: &'static str,
        reason: String,
    },

    /// The external backend exceeded its time budget.
    #[error("solver backend `{backend}` exceeded its {timeout:?} time budget")]
    Timeout {
        backend: &'static str,
        timeout: Duration,
    },

    /// I/O failure while talking to an external backend.
    #[error("solver i/o failure: {0}")]
    Io(#[from] std::io::Error),
}

/// One-to-one pairing relaxation over every trigger/response candidate.
///
/// Flat vectors are response-major: entry `j * n_trigger + i` couples
/// trigger `i` with response `j`. Built fresh per match call and discarded
/// once the backend returns.
#[derive(Debug, Clone)]
pub struct AssignmentProblem {
    /// Signed delay `response[j] - trigger[i]` per candidate pair.
    pub delays: Vec<f64>,

    /// Objective coefficient `delay^2 / (n_trigger - 1)` per candidate pair.
    pub costs: Vec<f64>,

    pub n_trigger: usize,
    pub n_response: usize,
}

impl AssignmentProblem {
    /// Build the problem for one trigger/response series pair.
    pub fn new(trigger: &[f64], response: &[f64]) -> Self {
        let n_trigger = trigger.len();
        let n_response = response.len();
        let norm = (n_trigger.max(2) - 1) as f64;
        let mut delays = Vec::with_capacity(n_trigger * n_response);
        let mut costs = Vec::with_capacity(n_trigger * n_response);
        for &b in response {
            for &a in trigger {
                let d = b - a;
                delays.push(d);
                costs.push(d * d / norm);
            }
        }
        Self {
            delays,
            costs,
            n_trigger,
            n_response,
        }
    }

    /// Number of candidate pairs.
    pub fn len(&self) -> usize {
        self.n_trigger * self.n_response
    }

    /// Whether the problem has no candidates.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True when the equality constraint rides on the response side.
    ///
    /// The smaller series gets "exactly one" so the problem stays
    /// feasible; the larger side gets "at most once".
    pub fn response_constrained(&self) -> bool {
        self.n_trigger >= self.n_response
    }
}

/// A pluggable relaxed-assignment solving capability.
pub trait AssignmentBackend: Send + Sync {
    /// Stable identifier used in logs and results.
    fn name(&self) -> &'static str;

    /// Solve the relaxed problem, returning one weight in `[0, 1]` per
    /// candidate pair (response-major, like [`AssignmentProblem`]).
    fn solve(&self, problem: &AssignmentProblem) -> Result<Vec<f64>, SolverError>;
}

/// Closed set of built-in backends, selected by explicit tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BackendKind {
    /// In-process simplex LP relaxation.
    #[default]
    RelaxedLp,
    /// In-process mixed-integer formulation.
    Integer,
    /// External `glpsol` process bridge.
    GlpkProcess,
}

impl BackendKind {
    /// Instantiate the backend for this tag.
    pub fn backend(self) -> Box<dyn AssignmentBackend> {
        match self {
            BackendKind::RelaxedLp => Box::new(RelaxedLpBackend),
            BackendKind::Integer => Box::new(IntegerBackend),
            BackendKind::GlpkProcess => Box::new(GlpkProcessBackend::default()),
        }
    }
}
