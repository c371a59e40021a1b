//! Relaxed-assignment matcher (LP-style).
//!
//! Formulates one-to-one pairing as a linear program over a
//! quadratic-in-delay cost, delegates to a pluggable
//! [`AssignmentBackend`](crate::solver::AssignmentBackend) and rounds the
//! relaxed solution into a discrete assignment.
//!
//! Infeasibility or solver non-convergence does not raise: the matcher
//! logs a warning and reports the all-zero degenerate solution, which
//! callers can detect through [`MatchAux::Assignment`].

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use super::{require_non_empty, LagMatcher, MatchAux, MatchError, MatchResult};
use crate::solver::{AssignmentBackend, AssignmentProblem, BackendKind, SolverError};

/// How the relaxed (fractional) solution becomes a hard assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RoundingTransform {
    /// Round every weight to {0, 1}.
    Rounding,

    /// Per constrained point, keep only the candidate of maximal weight.
    ArgMax,

    /// Keep a candidate when a uniform draw lands at or below its weight.
    #[default]
    RandomizedRounding,
}

/// Configuration for [`LpAssignmentMatcher`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LpAssignmentConfig {
    /// Which LP/ILP backend solves the relaxation.
    /// Default: [`BackendKind::RelaxedLp`]
    pub backend: BackendKind,

    /// Rounding transform applied to the relaxed weights.
    /// Default: [`RoundingTransform::RandomizedRounding`]
    pub transform: RoundingTransform,

    /// Drop residuals outside the 2.58-sigma band from the reported
    /// statistics.
    /// Default: true
    pub trim_residuals: bool,

    /// RNG seed for randomized rounding.
    pub seed: Option<u64>,
}

impl Default for LpAssignmentConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::default(),
            transform: RoundingTransform::default(),
            trim_residuals: true,
            seed: None,
        }
    }
}

/// Relaxed-assignment matcher over a pluggable solver backend.
pub struct LpAssignmentMatcher {
    config: LpAssignmentConfig,
    backend: Box<dyn AssignmentBackend>,
}

impl LpAssignmentMatcher {
    /// Create a matcher with the backend named in the configuration.
    pub fn new(config: LpAssignmentConfig) -> Self {
        let backend = config.backend.backend();
        Self { config, backend }
    }

    /// Create a matcher with a caller-supplied backend implementation.
    pub fn with_backend(config: LpAssignmentConfig, backend: Box<dyn AssignmentBackend>) -> Self {
        Self { config, backend }
    }

    /// Current configuration.
    pub fn config(&self) -> &LpAssignmentConfig {
        &self.config
    }

    fn apply_transform(&self, weights: &[f64], problem: &AssignmentProblem) -> Vec<f64> {
        let (na, nb) = (problem.n_trigger, problem.n_response);
        match self.config.transform {
            RoundingTransform::Rounding => weights
                .iter()
                .map(|w| w.round().clamp(0.0, 1.0))
                .collect(),
            RoundingTransform::ArgMax => {
                let mut hard = vec![0.0; weights.len()];
                if problem.response_constrained() {
                    for j in 0..nb {
                        let row = &weights[j * na..(j + 1) * na];
                        if let Some((i, &w)) = row
                            .iter()
                            .enumerate()
                            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap())
                        {
                            if w > 0.0 {
                                hard[j * na + i] = 1.0;
                            }
                        }
                    }
                } else {
                    for i in 0..na {
                        let (mut best_j, mut best_w) = (0usize, f64::NEG_INFINITY);
                        for j in 0..nb {
                            let w = weights[j * na + i];
                            if w > best_w {
                                best_w = w;
                                best_j = j;
                            }
                        }
                        if best_w > 0.0 {
                            hard[best_j * na + i] = 1.0;
                        }
                    }
                }
                hard
            }
            RoundingTransform::RandomizedRounding => {
                let mut rng = match self.config.seed {
                    Some(seed) => StdRng::seed_from_u64(seed),
                    None => StdRng::from_os_rng(),
                };
                weights
                    .iter()
                    .map(|&w| {
                        if w > 0.0 && rng.random::<f64>() <= w {
                            1.0
                        } else {
                            0.0
                        }
                    })
                    .collect()
            }
        }
    }
}

impl LagMatcher for LpAssignmentMatcher {
    fn match_series(&self, trigger: &[f64], response: &[f64]) -> Result<MatchResult, MatchError> {
        require_non_empty(trigger, response)?;

        let problem = AssignmentProblem::new(trigger, response);
        let (weights, degenerate) = match self.backend.solve(&problem) {
            Ok(weights) => (weights, false),
            // No local fallback exists for a missing backend
            Err(err @ SolverError::BackendUnavailable { .. }) => return Err(err.into()),
            Err(err) => {
                log::warn!(
                    "assignment backend `{}` failed: {err}; returning a degenerate zero solution",
                    self.backend.name()
                );
                (vec![0.0; problem.len()], true)
            }
        };

        let hard = self.apply_transform(&weights, &problem);
        let (residuals, pairs) = extract_assignment(&hard, &problem);
        let aux = MatchAux::Assignment {
            backend: self.backend.name(),
            degenerate,
        };
        MatchResult::from_residuals(residuals, pairs, aux, self.config.trim_residuals)
    }
}

/// Scan the hard assignment for the minimal signed delay per constrained
/// point. Unmatched points keep a zero cost entry and produce no pair.
fn extract_assignment(
    hard: &[f64],
    problem: &AssignmentProblem,
) -> (Vec<f64>, Vec<(usize, usize)>) {
    let (na, nb) = (problem.n_trigger, problem.n_response);
    let mut residuals = Vec::new();
    let mut pairs = Vec::new();

    if problem.response_constrained() {
        for j in 0..nb {
            let mut best: Option<(usize, f64)> = None;
            for i in 0..na {
                let k = j * na + i;
                if hard[k] != 0.0 {
                    let d = problem.delays[k];
                    if best.map_or(true, |(_, bd)| d < bd) {
                        best = Some((i, d));
                    }
                }
            }
            match best {
                Some((i, d)) => {
                    residuals.push(d);
                    pairs.push((i, j));
                }
                None => residuals.push(0.0),
            }
        }
    } else {
        for i in 0..na {
            let mut best: Option<(usize, f64)> = None;
            for j in 0..nb {
                let k = j * na + i;
                if hard[k] != 0.0 {
                    let d = problem.delays[k];
                    if best.map_or(true, |(_, bd)| d < bd) {
                        best = Some((j, d));
                    }
                }
            }
            match best {
                Some((j, d)) => {
                    residuals.push(d);
                    pairs.push((i, j));
                }
                None => residuals.push(0.0),
            }
        }
    }
    (residuals, pairs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn arg_max_matcher() -> LpAssignmentMatcher {
        LpAssignmentMatcher::new(LpAssignmentConfig {
            transform: RoundingTransform::ArgMax,
            trim_residuals: false,
            ..LpAssignmentConfig::default()
        })
    }

    #[test]
    fn test_one_to_one_minimal_delay() {
        let trigger = [5.0, 20.0, 27.0];
        let response = [12.0, 25.0, 32.0];
        let result = arg_max_matcher().match_series(&trigger, &response).unwrap();

        assert_eq!(result.pairs, vec![(0, 0), (1, 1), (2, 2)]);
        assert_relative_eq!(result.mean, 17.0 / 3.0, epsilon = 1e-9);
    }

    #[test]
    fn test_equal_sized_series() {
        let trigger = [34.0, 73.0, 82.0];
        let response = [109.0, 149.0, 169.0];
        let result = arg_max_matcher().match_series(&trigger, &response).unwrap();
        assert_eq!(result.pairs, vec![(0, 0), (1, 1), (2, 2)]);
    }

    #[test]
    fn test_more_triggers_than_responses() {
        let trigger = [34.0, 73.0, 82.0];
        let response = [109.0, 149.0];
        let result = arg_max_matcher().match_series(&trigger, &response).unwrap();
        assert_eq!(result.pairs, vec![(1, 0), (2, 1)]);
    }

    #[test]
    fn test_more_responses_than_triggers() {
        // Fewer triggers: every trigger must be used exactly once and the
        // surplus responses stay unmatched.
        let trigger = [73.0, 82.0];
        let response = [109.0, 149.0, 169.0];
        let result = arg_max_matcher().match_series(&trigger, &response).unwrap();
        assert_eq!(result.pairs, vec![(0, 0), (1, 1)]);
    }

    #[test]
    fn test_rounding_transform_matches_arg_max_on_integral_solution() {
        let trigger = [5.0, 20.0, 27.0];
        let response = [12.0, 25.0, 32.0];
        let matcher = LpAssignmentMatcher::new(LpAssignmentConfig {
            transform: RoundingTransform::Rounding,
            trim_residuals: false,
            ..LpAssignmentConfig::default()
        });
        let result = matcher.match_series(&trigger, &response).unwrap();
        assert_eq!(result.pairs, vec![(0, 0), (1, 1), (2, 2)]);
    }

    #[test]
    fn test_randomized_rounding_deterministic_under_seed() {
        let trigger = [5.0, 20.0, 27.0];
        let response = [12.0, 25.0, 32.0];
        let matcher = LpAssignmentMatcher::new(LpAssignmentConfig {
            transform: RoundingTransform::RandomizedRounding,
            seed: Some(99),
            trim_residuals: false,
            ..LpAssignmentConfig::default()
        });
        let a = matcher.match_series(&trigger, &response).unwrap();
        let b = matcher.match_series(&trigger, &response).unwrap();
        assert_eq!(a.pairs, b.pairs);
        assert_eq!(a.mean, b.mean);
    }

    #[test]
    fn test_infeasible_problem_degenerates_with_warning() {
        // Both responses precede every trigger: no nonnegative-delay
        // candidate exists and the LP is infeasible.
        let trigger = [100.0, 200.0];
        let response = [5.0, 10.0];
        let result = arg_max_matcher().match_series(&trigger, &response).unwrap();

        match result.aux {
            MatchAux::Assignment { degenerate, .. } => assert!(degenerate),
            _ => panic!("wrong aux variant"),
        }
        assert!(result.pairs.is_empty());
        assert_eq!(result.mean, 0.0);
    }

    #[test]
    fn test_empty_series_rejected() {
        let matcher = arg_max_matcher();
        assert!(matches!(
            matcher.match_series(&[], &[1.0]),
            Err(MatchError::EmptySeries { .. })
        ));
    }

    #[test]
    fn test_integer_backend_agrees() {
        let matcher = LpAssignmentMatcher::new(LpAssignmentConfig {
            backend: BackendKind::Integer,
            transform: RoundingTransform::ArgMax,
            trim_residuals: false,
            ..LpAssignmentConfig::default()
        });
        let result = matcher
            .match_series(&[5.0, 20.0, 27.0], &[12.0, 25.0, 32.0])
            .unwrap();
        assert_eq!(result.pairs, vec![(0, 0), (1, 1), (2, 2)]);
        assert_relative_eq!(result.mean, 17.0 / 3.0, epsilon = 1e-9);
    }
}
