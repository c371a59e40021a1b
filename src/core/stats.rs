//! Scalar statistics shared across the matching engine.

/// Arithmetic mean. Returns 0.0 for an empty slice.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation (n - 1 normalization).
///
/// Returns 0.0 when fewer than two values are given.
pub fn std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    let variance = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    variance.sqrt()
}

/// Histogram bin count by Sturges' rule, `floor(log2 n) + 1`, floored at one bin.
pub fn sturges_bins(n: usize) -> usize {
    if n <= 1 {
        return 1;
    }
    (n as f64).log2().floor() as usize + 1
}

/// Bin occupancy of `values` over the fixed range `[lo, hi]`.
///
/// Values outside the range are dropped; the upper edge belongs to the last
/// bin.
pub fn bin_counts(values: &[f64], lo: f64, hi: f64, bins: usize) -> Vec<usize> {
    let mut counts = vec![0usize; bins.max(1)];
    if values.is_empty() || hi <= lo {
        return counts;
    }
    let width = (hi - lo) / counts.len() as f64;
    for &v in values {
        if v < lo || v > hi {
            continue;
        }
        let idx = (((v - lo) / width) as usize).min(counts.len() - 1);
        counts[idx] += 1;
    }
    counts
}

/// Keep values within 2.58 standard deviations of the mean (99% band).
///
/// Degenerate inputs (zero spread) are returned unchanged.
pub fn trim_outliers(values: &[f64]) -> Vec<f64> {
    let m = mean(values);
    let sd = std_dev(values);
    if sd == 0.0 {
        return values.to_vec();
    }
    values
        .iter()
        .copied()
        .filter(|v| (v - m).abs() < 2.58 * sd)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_mean() {
        assert_eq!(mean(&[]), 0.0);
        assert_relative_eq!(mean(&[1.0, 2.0, 3.0]), 2.0);
    }

    #[test]
    fn test_std_dev() {
        assert_eq!(std_dev(&[5.0]), 0.0);
        // Sample std of [2, 4, 4, 4, 5, 5, 7, 9] is ~2.138
        let values = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert_relative_eq!(std_dev(&values), 2.138, epsilon = 1e-3);
    }

    #[test]
    fn test_sturges_bins() {
        assert_eq!(sturges_bins(0), 1);
        assert_eq!(sturges_bins(1), 1);
        assert_eq!(sturges_bins(8), 4);
        assert_eq!(sturges_bins(100), 7);
    }

    #[test]
    fn test_bin_counts() {
        let counts = bin_counts(&[0.5, 1.5, 1.6, 3.9, 4.0], 0.0, 4.0, 4);
        assert_eq!(counts, vec![1, 2, 0, 2]);
    }

    #[test]
    fn test_bin_counts_drops_out_of_range() {
        let counts = bin_counts(&[-1.0, 0.5, 9.0], 0.0, 1.0, 2);
        assert_eq!(counts.iter().sum::<usize>(), 1);
    }

    #[test]
    fn test_trim_outliers_removes_extreme_value() {
        let mut values = vec![10.0; 40];
        values.extend_from_slice(&[10.5; 40]);
        values.push(500.0);
        let trimmed = trim_outliers(&values);
        assert_eq!(trimmed.len(), 80);
        assert!(trimmed.iter().all(|&v| v < 100.0));
    }

    #[test]
    fn test_trim_outliers_keeps_uniform_input() {
        let values = vec![3.0, 3.0, 3.0];
        assert_eq!(trim_outliers(&values), values);
    }
}
