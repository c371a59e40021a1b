//! EM-based lag matcher.
//!
//! Models the delay between every trigger/response candidate pair as
//! Normal(mean, variance) with a latent soft assignment. The E-step
//! multiplies the responsibilities by the Gaussian likelihood of each
//! candidate delay and row-normalizes; the M-step recomputes the weighted
//! mean and variance. A single run can land in a poor local optimum, so
//! the matcher performs many random restarts per call, in several
//! independent batches.
//!
//! The returned parameters come from the first batch's highest-likelihood
//! run; the other batch winners are kept in [`MatchAux::Em`] purely as a
//! repeated-convergence diagnostic.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use statrs::distribution::{Continuous, Normal};

use super::{require_non_empty, LagMatcher, MatchAux, MatchError, MatchResult};
use crate::core::distribution::KdeDistribution;

/// Configuration for [`EmLagMatcher`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmLagConfig {
    /// Convergence threshold on both parameter deltas.
    /// Default: 1e-2
    pub threshold: f64,

    /// Random restarts per batch.
    /// Default: 20
    pub restarts: usize,

    /// Independent restart batches.
    /// Default: 10
    pub batches: usize,

    /// Hard cap on E/M sweeps per restart; non-converged restarts still
    /// report their last parameters.
    /// Default: 200
    pub max_iterations: u32,

    /// Uniform window for the random initial mean.
    /// Default: (0, 100)
    pub init_mean_range: (f64, f64),

    /// Uniform window for the random initial standard deviation.
    /// Default: (3, 25)
    pub init_sigma_range: (f64, f64),

    /// RNG seed; `None` draws from OS entropy.
    pub seed: Option<u64>,
}

impl Default for EmLagConfig {
    fn default() -> Self {
        Self {
            threshold: 1e-2,
            restarts: 20,
            batches: 10,
            max_iterations: 200,
            init_mean_range: (0.0, 100.0),
            init_sigma_range: (3.0, 25.0),
            seed: None,
        }
    }
}

impl EmLagConfig {
    /// Fail fast on out-of-range values before any numerical work.
    pub fn validate(&self) -> Result<(), MatchError> {
        if !(self.threshold > 0.0) {
            return Err(MatchError::InvalidConfig(
                "threshold must be positive".into(),
            ));
        }
        if self.restarts == 0 || self.batches == 0 {
            return Err(MatchError::InvalidConfig(
                "restarts and batches must be at least 1".into(),
            ));
        }
        if self.init_mean_range.0 >= self.init_mean_range.1
            || self.init_sigma_range.0 >= self.init_sigma_range.1
        {
            return Err(MatchError::InvalidConfig(
                "initialization windows must be non-empty ranges".into(),
            ));
        }
        if self.init_sigma_range.0 <= 0.0 {
            return Err(MatchError::InvalidConfig(
                "initial sigma must be positive".into(),
            ));
        }
        Ok(())
    }
}

/// One converged (or capped) EM restart.
#[derive(Debug, Clone)]
struct EmRun {
    mean: f64,
    std_dev: f64,
    likelihood: f64,
    pairs: Vec<(usize, usize)>,
}

/// Expectation-maximization lag matcher with multi-batch restarts.
#[derive(Debug, Clone)]
pub struct EmLagMatcher {
    config: EmLagConfig,
}

impl EmLagMatcher {
    /// Create a matcher, validating the configuration.
    pub fn new(config: EmLagConfig) -> Result<Self, MatchError> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Current configuration.
    pub fn config(&self) -> &EmLagConfig {
        &self.config
    }
}

impl LagMatcher for EmLagMatcher {
    fn match_series(&self, trigger: &[f64], response: &[f64]) -> Result<MatchResult, MatchError> {
        require_non_empty(trigger, response)?;

        let na = trigger.len();
        let nb = response.len();
        // delta[i * nb + j] = response[j] - trigger[i]
        let mut delta = Vec::with_capacity(na * nb);
        for &a in trigger {
            for &b in response {
                delta.push(b - a);
            }
        }

        let base_seed = match self.config.seed {
            Some(seed) => seed,
            None => rand::rng().random(),
        };

        // Batches are independent; each keeps only its best-likelihood
        // restart. Restart seeds are derived from (batch, restart) so the
        // outcome is independent of worker scheduling.
        let batches: Vec<Option<EmRun>> = (0..self.config.batches)
            .into_par_iter()
            .map(|batch| {
                let mut best: Option<EmRun> = None;
                for restart in 0..self.config.restarts {
                    let stream = (batch * self.config.restarts + restart) as u64;
                    let mut rng = StdRng::seed_from_u64(
                        base_seed ^ stream.wrapping_mul(0x9E37_79B9_7F4A_7C15),
                    );
                    let mean0 = rng
                        .random_range(self.config.init_mean_range.0..self.config.init_mean_range.1);
                    let sigma0 = rng.random_range(
                        self.config.init_sigma_range.0..self.config.init_sigma_range.1,
                    );
                    let run = em_single(
                        na,
                        nb,
                        &delta,
                        mean0,
                        sigma0 * sigma0,
                        self.config.threshold,
                        self.config.max_iterations,
                    );
                    if let Some(run) = run {
                        if best
                            .as_ref()
                            .map_or(true, |b| run.likelihood > b.likelihood)
                        {
                            best = Some(run);
                        }
                    }
                }
                best
            })
            .collect();

        let batch_means: Vec<f64> = batches.iter().flatten().map(|r| r.mean).collect();
        let batch_likelihoods: Vec<f64> = batches.iter().flatten().map(|r| r.likelihood).collect();
        log::info!(
            "EM batch winners: means {batch_means:?}, likelihoods {batch_likelihoods:?}"
        );

        let Some(winner) = batches.iter().flatten().next().cloned() else {
            log::warn!("every EM restart failed (non-finite parameters); reporting a degenerate result");
            return MatchResult::from_residuals(
                vec![0.0],
                Vec::new(),
                MatchAux::Em {
                    likelihood: f64::NEG_INFINITY,
                    batch_means,
                    batch_likelihoods,
                },
                false,
            );
        };
        if batches[0].is_none() {
            log::warn!("first EM batch produced no usable restart; reporting the next batch's winner");
        }

        let samples: Vec<f64> = winner
            .pairs
            .iter()
            .map(|&(i, j)| delta[i * nb + j])
            .collect();
        let samples = if samples.is_empty() {
            log::warn!("EM winner carries no assignments; density falls back to a zero sample");
            vec![0.0]
        } else {
            samples
        };

        let kde = KdeDistribution::new(samples)?;
        Ok(MatchResult {
            mean: winner.mean,
            std_dev: winner.std_dev,
            kde,
            pairs: winner.pairs,
            aux: MatchAux::Em {
                likelihood: winner.likelihood,
                batch_means,
                batch_likelihoods,
            },
        })
    }
}

/// One EM run from a random initialization.
///
/// Returns `None` when the parameters become non-finite (a failed run,
/// recovered by the caller moving to the next restart).
fn em_single(
    na: usize,
    nb: usize,
    delta: &[f64],
    mut mean: f64,
    mut variance: f64,
    threshold: f64,
    max_iterations: u32,
) -> Option<EmRun> {
    let mut resp = vec![1.0 / nb as f64; na * nb];
    let mut weighted = vec![0.0; na * nb];

    for _ in 0..max_iterations {
        // E-step
        let normal = match Normal::new(mean, variance.sqrt()) {
            Ok(n) => n,
            Err(_) => {
                log::warn!("EM parameters degenerated (mean {mean}, variance {variance}); aborting restart");
                return None;
            }
        };
        for (w, (&r, &d)) in weighted.iter_mut().zip(resp.iter().zip(delta)) {
            *w = r * normal.pdf(d);
        }
        for i in 0..na {
            let row = i * nb..(i + 1) * nb;
            let sum: f64 = weighted[row.clone()].iter().sum();
            if sum > 0.0 {
                for (r, &w) in resp[row.clone()].iter_mut().zip(&weighted[row]) {
                    *r = w / sum;
                }
            } else {
                for r in resp[row].iter_mut() {
                    *r = 0.0;
                }
            }
        }

        // M-step
        let mut new_mean = 0.0;
        for (&r, &d) in resp.iter().zip(delta) {
            new_mean += r * d;
        }
        new_mean /= na as f64;
        let mut new_variance = 0.0;
        for (&r, &d) in resp.iter().zip(delta) {
            new_variance += r * (d - new_mean) * (d - new_mean);
        }
        new_variance /= na as f64;

        let delta_mean = (mean - new_mean).abs();
        let delta_variance = (variance - new_variance).abs();
        mean = new_mean;
        variance = new_variance;

        if !mean.is_finite() || !variance.is_finite() {
            log::warn!("EM produced non-finite parameters; aborting restart");
            return None;
        }
        if delta_mean < threshold && delta_variance < threshold {
            break;
        }
    }

    // Final likelihood over response columns
    let normal = Normal::new(mean, variance.sqrt()).ok()?;
    let mut likelihood = 0.0;
    for j in 0..nb {
        let mut column = 0.0;
        for i in 0..na {
            let k = i * nb + j;
            column += resp[k] * normal.pdf(delta[k]);
        }
        likelihood += column.ln();
    }

    // Hard assignments: arg-max responsibility per trigger row
    let mut pairs = Vec::new();
    for i in 0..na {
        let mut best: Option<(usize, f64)> = None;
        for j in 0..nb {
            let r = resp[i * nb + j];
            if r > best.map_or(0.0, |(_, w)| w) {
                best = Some((j, r));
            }
        }
        if let Some((j, _)) = best {
            pairs.push((i, j));
        }
    }

    Some(EmRun {
        mean,
        std_dev: variance.sqrt(),
        likelihood,
        pairs,
    })
}
