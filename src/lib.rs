//! Vilamba - time-lag estimation between correlated event streams.
//!
//! Given a "trigger" event type and a "response" event type drawn from a
//! shared timeline, the crate infers which trigger occurrence caused which
//! response occurrence and estimates the distribution of the delay between
//! matched pairs (mean, spread, shape), despite missing occurrences,
//! spurious events and many-to-many candidate ambiguity.
//!
//! # Architecture
//!
//! The crate is organized into 3 logical layers:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                  algorithms/                        │  ← Matching engine
//! │   (registration, assignment, EM, correspondence)    │
//! └─────────────────────────────────────────────────────┘
//!                          │
//! ┌─────────────────────────────────────────────────────┐
//! │                    solver/                          │  ← LP/ILP capability
//! │        (in-process LP/MILP, glpsol bridge)          │
//! └─────────────────────────────────────────────────────┘
//!                          │
//! ┌─────────────────────────────────────────────────────┐
//! │                     core/                           │  ← Foundation
//! │     (types, stats, distributions, 1-D optimizers)   │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! # Matchers
//!
//! All algorithms implement the [`LagMatcher`] trait and return a
//! [`MatchResult`]:
//!
//! - [`IcpLagMatcher`]: iterative robust point registration with trimmed
//!   outlier rejection and a sample-consensus initial guess
//! - [`LpAssignmentMatcher`]: relaxed one-to-one assignment solved by a
//!   pluggable LP/ILP backend, rounded to a hard matching
//! - [`EmLagMatcher`]: expectation-maximization over a latent soft
//!   assignment with multi-batch random restarts
//! - [`MunkresMatcher`]: exact bipartite assignment via the external
//!   Kuhn-Munkres primitive
//!
//! # Example
//!
//! ```
//! use vilamba::{IcpLagConfig, IcpLagMatcher, LagMatcher};
//!
//! let trigger = vec![5.0, 20.0, 27.0];
//! let response = vec![12.0, 25.0, 32.0];
//!
//! let matcher = IcpLagMatcher::new(IcpLagConfig {
//!     seed: Some(7),
//!     ..IcpLagConfig::default()
//! })
//! .unwrap();
//!
//! let result = matcher.match_series(&trigger, &response).unwrap();
//! assert!(result.mean > 0.0);
//! ```

// ============================================================================
// Layer 1: Core foundation (no internal deps)
// ============================================================================
pub mod core;

// ============================================================================
// Layer 2: Assignment solving capability (depends on core)
// ============================================================================
pub mod solver;

// ============================================================================
// Layer 3: Matching engine (depends on core, solver)
// ============================================================================
pub mod algorithms;

// ============================================================================
// Convenience re-exports (flat namespace for common use)
// ============================================================================

// Core types
pub use crate::core::distribution::{DistributionError, KdeDistribution, NormalFit};
pub use crate::core::types::{Event, EventSequence};

// Matching contract
pub use algorithms::matching::{
    LagMatcher, MatchAux, MatchError, MatchResult, Matcher, PairMatch,
};

// Matchers
pub use algorithms::matching::assignment::{
    LpAssignmentConfig, LpAssignmentMatcher, RoundingTransform,
};
pub use algorithms::matching::icp::{
    IcpLagConfig, IcpLagMatcher, IterationSink, LogSink, NullSink, OutlierMode,
};
pub use algorithms::matching::lag_em::{EmLagConfig, EmLagMatcher};
pub use algorithms::matching::munkres::MunkresMatcher;

// Correspondence search and initial-guess estimators
pub use algorithms::matching::correspondence::{k_nearest_indices, nearest_indices};
pub use algorithms::matching::initial_guess::{
    BinAlignment, MeanOffset, OffsetEstimator, SampleConsensus, SampleConsensusConfig,
};

// Solver capability
pub use solver::{
    AssignmentBackend, AssignmentProblem, BackendKind, GlpkProcessBackend, IntegerBackend,
    RelaxedLpBackend, SolverError,
};
