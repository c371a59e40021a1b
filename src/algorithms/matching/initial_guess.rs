//! Scalar-offset estimators seeding the registration matcher.
//!
//! Three independent estimators share the [`OffsetEstimator`] contract:
//!
//! - [`MeanOffset`]: difference of series means, O(n+m)
//! - [`SampleConsensus`]: RANSAC-style subset search scored by a robust
//!   capped-residual metric
//! - [`BinAlignment`]: histogram-occupancy alignment via bounded 1-D
//!   minimization
//!
//! The registration matcher seeds from the sample-consensus estimate;
//! [`ensemble_diagnostic`] computes the other two for the log only.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::correspondence::{k_nearest_indices, nearest_indices};
use crate::core::optimize::{golden_section_min, minimize_l1_translation};
use crate::core::stats;

/// A scalar-offset estimator between a data series and a model series.
pub trait OffsetEstimator {
    /// Estimate the offset aligning `data` onto `model`.
    fn estimate(&self, data: &[f64], model: &[f64]) -> f64;
}

/// Difference of series means.
pub struct MeanOffset;

impl OffsetEstimator for MeanOffset {
    fn estimate(&self, data: &[f64], model: &[f64]) -> f64 {
        stats::mean(model) - stats::mean(data)
    }
}

/// Configuration for [`SampleConsensus`].
#[derive(Debug, Clone)]
pub struct SampleConsensusConfig {
    /// Maximum number of hypothesis draws.
    /// Default: 100
    pub max_iterations: usize,

    /// Points per random subset.
    /// Default: 5
    pub sample_size: usize,

    /// Candidate model neighbors considered per sampled point.
    /// Default: 4
    pub k_candidates: usize,

    /// RNG seed; `None` draws from OS entropy.
    pub seed: Option<u64>,
}

impl Default for SampleConsensusConfig {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            sample_size: 5,
            k_candidates: 4,
            seed: None,
        }
    }
}

/// RANSAC-style offset estimator.
///
/// Each iteration draws a spaced random subset of the data, pairs every
/// sampled point with one of its k nearest model values at random, solves
/// the 1-D optimal translation for the subset and scores it over the full
/// data set with per-point error capped at 1. The lowest-scoring offset
/// wins.
pub struct SampleConsensus {
    config: SampleConsensusConfig,
}

impl SampleConsensus {
    pub fn new(config: SampleConsensusConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SampleConsensusConfig {
        &self.config
    }
}

impl Default for SampleConsensus {
    fn default() -> Self {
        Self::new(SampleConsensusConfig::default())
    }
}

impl OffsetEstimator for SampleConsensus {
    fn estimate(&self, data: &[f64], model: &[f64]) -> f64 {
        if data.is_empty() || model.is_empty() {
            return 0.0;
        }
        let mut rng = match self.config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };

        let sample_size = self.config.sample_size.clamp(1, data.len());
        let span = data.iter().cloned().fold(f64::NEG_INFINITY, f64::max)
            - data.iter().cloned().fold(f64::INFINITY, f64::min);
        let mut min_spacing = if sample_size > 1 {
            span / (2.0 * sample_size as f64)
        } else {
            0.0
        };

        let k = self.config.k_candidates.clamp(1, model.len());
        let mut best: Option<(f64, f64)> = None; // (score, offset)

        for _ in 0..self.config.max_iterations {
            let Some(subset) = draw_spaced_subset(&mut rng, data, sample_size, &mut min_spacing)
            else {
                continue;
            };

            let sample_vals: Vec<f64> = subset.iter().map(|&i| data[i]).collect();
            let mut targets = Vec::with_capacity(subset.len());
            for &value in &sample_vals {
                let candidates = k_nearest_indices(std::slice::from_ref(&value), model, k);
                let pick = candidates[rng.random_range(0..candidates.len())];
                targets.push(model[pick]);
            }

            let offset = minimize_l1_translation(&sample_vals, &targets);
            let score = consensus_score(data, model, offset);
            if best.map_or(true, |(s, _)| score < s) {
                best = Some((score, offset));
            }
        }

        match best {
            Some((_, offset)) => offset,
            None => MeanOffset.estimate(data, model),
        }
    }
}

/// Robust alignment score: nearest-model error per point, capped at 1.
fn consensus_score(data: &[f64], model: &[f64], offset: f64) -> f64 {
    let shifted: Vec<f64> = data.iter().map(|d| d + offset).collect();
    let idx = nearest_indices(&shifted, model);
    shifted
        .iter()
        .zip(&idx)
        .map(|(s, &j)| (s - model[j]).abs().min(1.0))
        .sum()
}

/// Draw `size` distinct indices whose values keep the minimum pairwise
/// spacing. After 20 failed draws the spacing is halved and `None` is
/// returned so the caller retries on its next iteration.
fn draw_spaced_subset(
    rng: &mut StdRng,
    data: &[f64],
    size: usize,
    min_spacing: &mut f64,
) -> Option<Vec<usize>> {
    const DRAWS_PER_RELAXATION: usize = 20;

    for _ in 0..DRAWS_PER_RELAXATION {
        let mut picked: Vec<usize> = Vec::with_capacity(size);
        for _ in 0..size * 4 {
            if picked.len() == size {
                break;
            }
            let candidate = rng.random_range(0..data.len());
            if !picked.contains(&candidate) {
                picked.push(candidate);
            }
        }
        if picked.len() < size {
            continue;
        }
        let spaced = picked.iter().all(|&i| {
            picked
                .iter()
                .all(|&j| i == j || (data[i] - data[j]).abs() >= *min_spacing)
        });
        if spaced {
            return Some(picked);
        }
    }
    *min_spacing *= 0.5;
    None
}

/// Histogram-occupancy alignment estimator.
///
/// Bin count follows Sturges' rule on the larger series; the offset
/// minimizing the squared difference of bin occupancies is found by
/// golden-section search on a window centered at the mean offset.
pub struct BinAlignment;

impl OffsetEstimator for BinAlignment {
    fn estimate(&self, data: &[f64], model: &[f64]) -> f64 {
        if data.is_empty() || model.is_empty() {
            return 0.0;
        }
        let bins = stats::sturges_bins(data.len().max(model.len()));
        let lo = model.iter().cloned().fold(f64::INFINITY, f64::min);
        let hi = model.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        let model_hist = stats::bin_counts(model, lo, hi, bins);

        let center = MeanOffset.estimate(data, model);
        let data_span = data.iter().cloned().fold(f64::NEG_INFINITY, f64::max)
            - data.iter().cloned().fold(f64::INFINITY, f64::min);
        let span = (hi - lo).max(data_span).max(1.0);

        let objective = |t: f64| {
            let shifted: Vec<f64> = data.iter().map(|d| d + t).collect();
            let data_hist = stats::bin_counts(&shifted, lo, hi, bins);
            data_hist
                .iter()
                .zip(&model_hist)
                .map(|(&a, &b)| {
                    let d = a as f64 - b as f64;
                    d * d
                })
                .sum()
        };
        golden_section_min(objective, center - span, center + span, 1e-3, 200)
    }
}

/// Compute every estimator for the log, then hand back the
/// sample-consensus estimate, which is what actually seeds the
/// registration matcher.
pub fn ensemble_diagnostic(data: &[f64], model: &[f64], consensus: &SampleConsensus) -> f64 {
    let mean_offset = MeanOffset.estimate(data, model);
    let bin_offset = BinAlignment.estimate(data, model);
    let consensus_offset = consensus.estimate(data, model);
    log::debug!(
        "initial guess: mean={mean_offset:.4} bins={bin_offset:.4} consensus={consensus_offset:.4} (ensemble avg {:.4})",
        (mean_offset + bin_offset + consensus_offset) / 3.0
    );
    consensus_offset
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    /// Irregularly spaced points with gaps much larger than `offset`, so
    /// the true counterpart of every data point is among its nearest
    /// model candidates.
    fn shifted_series(n: usize, offset: f64) -> (Vec<f64>, Vec<f64>) {
        let data: Vec<f64> = (0..n)
            .map(|i| i as f64 * 50.0 + (i * i % 13) as f64)
            .collect();
        let model: Vec<f64> = data.iter().map(|d| d + offset).collect();
        (data, model)
    }

    #[test]
    fn test_mean_offset() {
        let (data, model) = shifted_series(20, 12.5);
        assert_relative_eq!(MeanOffset.estimate(&data, &model), 12.5, epsilon = 1e-9);
    }

    #[test]
    fn test_sample_consensus_recovers_clean_shift() {
        let (data, model) = shifted_series(40, 13.0);
        let estimator = SampleConsensus::new(SampleConsensusConfig {
            seed: Some(7),
            ..SampleConsensusConfig::default()
        });
        let offset = estimator.estimate(&data, &model);
        assert_relative_eq!(offset, 13.0, epsilon = 1.0);
    }

    #[test]
    fn test_sample_consensus_deterministic_under_seed() {
        let (data, model) = shifted_series(30, 8.0);
        let estimator = SampleConsensus::new(SampleConsensusConfig {
            seed: Some(123),
            ..SampleConsensusConfig::default()
        });
        let a = estimator.estimate(&data, &model);
        let b = estimator.estimate(&data, &model);
        assert_eq!(a, b);
    }

    #[test]
    fn test_sample_consensus_tiny_input_falls_back() {
        // Fewer points than the subset size still produces an estimate
        let estimator = SampleConsensus::new(SampleConsensusConfig {
            seed: Some(3),
            ..SampleConsensusConfig::default()
        });
        let offset = estimator.estimate(&[1.0, 2.0], &[11.0, 12.0]);
        assert_relative_eq!(offset, 10.0, epsilon = 0.5);
    }

    #[test]
    fn test_bin_alignment_lands_in_the_right_neighborhood() {
        let (data, model) = shifted_series(64, 17.0);
        let offset = BinAlignment.estimate(&data, &model);
        // The histogram objective is coarse by construction (bin-width
        // resolution); the estimate only needs to sit in the right
        // neighborhood to seed the registration loop.
        let bin_width = (model.last().unwrap() - model[0]) / stats::sturges_bins(64) as f64;
        assert!(
            (offset - 17.0).abs() <= bin_width,
            "offset {offset} outside one bin width of the truth"
        );
    }

    #[test]
    fn test_ensemble_returns_consensus_value() {
        let (data, model) = shifted_series(40, 5.0);
        let consensus = SampleConsensus::new(SampleConsensusConfig {
            seed: Some(11),
            ..SampleConsensusConfig::default()
        });
        let expected = consensus.estimate(&data, &model);
        let actual = ensemble_diagnostic(&data, &model, &consensus);
        assert_eq!(actual, expected);
    }
}
