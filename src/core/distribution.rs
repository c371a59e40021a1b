//! Residual delay distributions.
//!
//! The matching engine reports the shape of the matched delays as a
//! non-parametric kernel density estimate next to the parametric
//! mean/spread summary. Parametric distributions (Normal, Uniform) come
//! from `statrs`/`rand_distr`; this module only carries the KDE wrapper
//! and a small moment-fit helper.

use rand::Rng;
use rand_distr::StandardNormal;
use serde::Serialize;
use statrs::distribution::{Continuous, ContinuousCDF, Normal};
use thiserror::Error;

use crate::core::stats;

/// Bandwidth factor applied to the sample standard deviation.
pub const KDE_BANDWIDTH_FACTOR: f64 = 0.1;

/// Errors from distribution construction.
#[derive(Debug, Error)]
pub enum DistributionError {
    /// A kernel density estimate cannot be formed without samples.
    #[error("kernel density estimation needs at least one sample")]
    NoSamples,
}

/// Gaussian kernel density estimate over a set of residual delays.
///
/// Bandwidth is [`KDE_BANDWIDTH_FACTOR`] times the sample standard
/// deviation. When every sample coincides the estimate degenerates to a
/// point mass at that value.
#[derive(Debug, Clone, Serialize)]
pub struct KdeDistribution {
    samples: Vec<f64>,
    bandwidth: f64,
}

impl KdeDistribution {
    /// Build a KDE from residual samples.
    pub fn new(mut samples: Vec<f64>) -> Result<Self, DistributionError> {
        if samples.is_empty() {
            return Err(DistributionError::NoSamples);
        }
        samples.sort_by(|a, b| a.partial_cmp(b).unwrap());
        let bandwidth = KDE_BANDWIDTH_FACTOR * stats::std_dev(&samples);
        Ok(Self { samples, bandwidth })
    }

    /// Number of underlying samples.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// A KDE always holds at least one sample.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// The sorted underlying samples.
    pub fn samples(&self) -> &[f64] {
        &self.samples
    }

    /// Kernel bandwidth; zero for a point mass.
    pub fn bandwidth(&self) -> f64 {
        self.bandwidth
    }

    /// Mean of the underlying samples.
    pub fn mean(&self) -> f64 {
        stats::mean(&self.samples)
    }

    /// Sample standard deviation of the underlying samples.
    pub fn std_dev(&self) -> f64 {
        stats::std_dev(&self.samples)
    }

    /// Probability density at `x`.
    pub fn pdf(&self, x: f64) -> f64 {
        if self.bandwidth == 0.0 {
            // Point mass
            return if (x - self.samples[0]).abs() <= 1e-12 {
                f64::INFINITY
            } else {
                0.0
            };
        }
        let unit = Normal::new(0.0, 1.0).unwrap();
        let n = self.samples.len() as f64;
        self.samples
            .iter()
            .map(|&s| unit.pdf((x - s) / self.bandwidth))
            .sum::<f64>()
            / (n * self.bandwidth)
    }

    /// Cumulative probability at `x`.
    pub fn cdf(&self, x: f64) -> f64 {
        if self.bandwidth == 0.0 {
            return if x >= self.samples[0] { 1.0 } else { 0.0 };
        }
        let unit = Normal::new(0.0, 1.0).unwrap();
        let n = self.samples.len() as f64;
        self.samples
            .iter()
            .map(|&s| unit.cdf((x - s) / self.bandwidth))
            .sum::<f64>()
            / n
    }

    /// Draw one value: a random kernel center plus bandwidth-scaled noise.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        let center = self.samples[rng.random_range(0..self.samples.len())];
        if self.bandwidth == 0.0 {
            return center;
        }
        let z: f64 = rng.sample(StandardNormal);
        center + z * self.bandwidth
    }
}

/// Moment fit of a Normal distribution to a sample vector.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct NormalFit {
    pub mean: f64,
    pub std_dev: f64,
}

impl NormalFit {
    /// Fit mean and standard deviation to `samples`.
    pub fn from_samples(samples: &[f64]) -> Self {
        Self {
            mean: stats::mean(samples),
            std_dev: stats::std_dev(samples),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_empty_samples_rejected() {
        assert!(matches!(
            KdeDistribution::new(Vec::new()),
            Err(DistributionError::NoSamples)
        ));
    }

    #[test]
    fn test_pdf_integrates_to_one() {
        let kde = KdeDistribution::new(vec![1.0, 2.0, 2.5, 4.0]).unwrap();
        // Trapezoidal integration over a generous range
        let (lo, hi, steps) = (-10.0, 15.0, 5000);
        let h = (hi - lo) / steps as f64;
        let mut area = 0.0;
        for i in 0..steps {
            let x0 = lo + i as f64 * h;
            area += 0.5 * (kde.pdf(x0) + kde.pdf(x0 + h)) * h;
        }
        assert_relative_eq!(area, 1.0, epsilon = 1e-3);
    }

    #[test]
    fn test_cdf_monotone_and_bounded() {
        let kde = KdeDistribution::new(vec![0.0, 1.0, 5.0]).unwrap();
        assert!(kde.cdf(-100.0) < 1e-6);
        assert_relative_eq!(kde.cdf(100.0), 1.0, epsilon = 1e-9);
        assert!(kde.cdf(1.0) <= kde.cdf(2.0));
    }

    #[test]
    fn test_point_mass_degeneration() {
        let kde = KdeDistribution::new(vec![3.0, 3.0, 3.0]).unwrap();
        assert_eq!(kde.bandwidth(), 0.0);
        assert_eq!(kde.pdf(2.9), 0.0);
        assert!(kde.pdf(3.0).is_infinite());
        assert_eq!(kde.cdf(2.9), 0.0);
        assert_eq!(kde.cdf(3.1), 1.0);

        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(kde.sample(&mut rng), 3.0);
    }

    #[test]
    fn test_sampling_tracks_sample_mean() {
        let kde = KdeDistribution::new(vec![10.0, 10.5, 9.5, 10.2, 9.8]).unwrap();
        let mut rng = StdRng::seed_from_u64(42);
        let draws: Vec<f64> = (0..2000).map(|_| kde.sample(&mut rng)).collect();
        assert_relative_eq!(crate::core::stats::mean(&draws), 10.0, epsilon = 0.1);
    }

    #[test]
    fn test_normal_fit() {
        let fit = NormalFit::from_samples(&[1.0, 2.0, 3.0]);
        assert_relative_eq!(fit.mean, 2.0);
        assert_relative_eq!(fit.std_dev, 1.0);
    }
}
