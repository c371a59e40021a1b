//! Exact bipartite assignment matcher.
//!
//! Thin matcher over the external Kuhn-Munkres optimal-assignment
//! primitive: every event on the smaller side is paired one-to-one with
//! an event on the larger side, minimizing total squared delay. The
//! assignment algorithm itself stays an external collaborator.

use pathfinding::prelude::{kuhn_munkres_min, Matrix};

use super::{require_non_empty, LagMatcher, MatchAux, MatchError, MatchResult};

/// Fixed-point scale applied to squared delays before the integer-cost
/// assignment.
const COST_SCALE: f64 = 1000.0;

/// Exact one-to-one matcher via Kuhn-Munkres.
#[derive(Debug, Clone)]
pub struct MunkresMatcher {
    /// Drop residuals outside the 2.58-sigma band from the reported
    /// statistics.
    /// Default: true
    pub trim_residuals: bool,
}

impl Default for MunkresMatcher {
    fn default() -> Self {
        Self {
            trim_residuals: true,
        }
    }
}

impl LagMatcher for MunkresMatcher {
    fn match_series(&self, trigger: &[f64], response: &[f64]) -> Result<MatchResult, MatchError> {
        require_non_empty(trigger, response)?;

        // The assignment primitive wants rows <= columns
        let rows_are_triggers = trigger.len() <= response.len();
        let (rows, cols) = if rows_are_triggers {
            (trigger, response)
        } else {
            (response, trigger)
        };

        let weights: Vec<Vec<i64>> = rows
            .iter()
            .map(|&r| {
                cols.iter()
                    .map(|&c| {
                        let delay = c - r;
                        (delay * delay * COST_SCALE).round() as i64
                    })
                    .collect()
            })
            .collect();
        let matrix =
            Matrix::from_rows(weights).map_err(|e| MatchError::InvalidConfig(e.to_string()))?;
        let (total, assignment) = kuhn_munkres_min(&matrix);

        let mut matched: Vec<((usize, usize), f64)> = assignment
            .iter()
            .enumerate()
            .map(|(row, &col)| {
                let (i, j) = if rows_are_triggers {
                    (row, col)
                } else {
                    (col, row)
                };
                ((i, j), response[j] - trigger[i])
            })
            .collect();
        matched.sort_unstable_by_key(|&(pair, _)| pair);

        let pairs: Vec<(usize, usize)> = matched.iter().map(|&(pair, _)| pair).collect();
        let residuals: Vec<f64> = matched.iter().map(|&(_, d)| d).collect();
        let aux = MatchAux::Munkres {
            total_cost: total as f64 / COST_SCALE,
        };
        MatchResult::from_residuals(residuals, pairs, aux, self.trim_residuals)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn matcher() -> MunkresMatcher {
        MunkresMatcher {
            trim_residuals: false,
        }
    }

    #[test]
    fn test_equal_sized_series() {
        let result = matcher()
            .match_series(&[5.0, 20.0, 27.0], &[12.0, 25.0, 32.0])
            .unwrap();
        assert_eq!(result.pairs, vec![(0, 0), (1, 1), (2, 2)]);
        assert_relative_eq!(result.mean, 17.0 / 3.0, epsilon = 1e-9);
    }

    #[test]
    fn test_more_triggers_than_responses() {
        let result = matcher()
            .match_series(&[34.0, 73.0, 82.0], &[109.0, 149.0])
            .unwrap();
        assert_eq!(result.pairs, vec![(1, 0), (2, 1)]);
    }

    #[test]
    fn test_more_responses_than_triggers() {
        let result = matcher()
            .match_series(&[73.0, 82.0], &[109.0, 149.0, 169.0])
            .unwrap();
        assert_eq!(result.pairs, vec![(0, 0), (1, 1)]);
    }

    #[test]
    fn test_total_cost_reported() {
        let result = matcher()
            .match_series(&[0.0, 10.0], &[1.0, 12.0])
            .unwrap();
        match result.aux {
            MatchAux::Munkres { total_cost } => {
                assert_relative_eq!(total_cost, 1.0 + 4.0, epsilon = 1e-6);
            }
            _ => panic!("wrong aux variant"),
        }
    }

    #[test]
    fn test_empty_series_rejected() {
        assert!(matches!(
            matcher().match_series(&[], &[1.0]),
            Err(MatchError::EmptySeries { .. })
        ));
    }
}
