//! Nearest-neighbor correspondence search between 1-D point sets.
//!
//! Both the registration matcher and the initial-guess estimators pair
//! data points with model points by minimal absolute distance. Series
//! sizes are event counts per run, so an O(n·m) all-pairs scan suffices
//! without indexing structures.

/// For every element of `data`, the index of its nearest value in `model`.
///
/// Ties break to the first occurrence in `model`. Panics only if `model`
/// is empty, which callers rule out up front.
pub fn nearest_indices(data: &[f64], model: &[f64]) -> Vec<usize> {
    debug_assert!(!model.is_empty());
    data.iter()
        .map(|&d| {
            let mut best = 0usize;
            let mut best_dist = f64::INFINITY;
            for (j, &m) in model.iter().enumerate() {
                let dist = (d - m).abs();
                if dist < best_dist {
                    best_dist = dist;
                    best = j;
                }
            }
            best
        })
        .collect()
}

/// The `k` nearest model indices per data point, flattened in data order,
/// nearest first within each group.
///
/// `k` is clamped to the model size.
pub fn k_nearest_indices(data: &[f64], model: &[f64], k: usize) -> Vec<usize> {
    debug_assert!(!model.is_empty());
    let k = k.clamp(1, model.len());
    let mut out = Vec::with_capacity(data.len() * k);
    let mut order: Vec<usize> = Vec::with_capacity(model.len());
    for &d in data {
        order.clear();
        order.extend(0..model.len());
        order.sort_by(|&a, &b| {
            (d - model[a])
                .abs()
                .partial_cmp(&(d - model[b]).abs())
                .unwrap()
                .then(a.cmp(&b))
        });
        out.extend_from_slice(&order[..k]);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    #[test]
    fn test_nearest_basic() {
        let model = [12.0, 25.0, 32.0];
        let data = [5.0, 20.0, 27.0];
        assert_eq!(nearest_indices(&data, &model), vec![0, 1, 1]);
    }

    #[test]
    fn test_nearest_tie_breaks_to_first() {
        // 15 is equidistant from 10 and 20
        let model = [10.0, 20.0];
        assert_eq!(nearest_indices(&[15.0], &model), vec![0]);
    }

    #[test]
    fn test_nearest_is_minimal_everywhere() {
        let mut rng = StdRng::seed_from_u64(99);
        let data: Vec<f64> = (0..40).map(|_| rng.random_range(0.0..100.0)).collect();
        let model: Vec<f64> = (0..25).map(|_| rng.random_range(0.0..100.0)).collect();

        let idx = nearest_indices(&data, &model);
        for (i, &j) in idx.iter().enumerate() {
            assert!(j < model.len());
            let chosen = (data[i] - model[j]).abs();
            for &m in &model {
                assert!(chosen <= (data[i] - m).abs() + 1e-12);
            }
        }
    }

    #[test]
    fn test_k_nearest_flattened_groups() {
        let model = [0.0, 10.0, 21.0, 50.0];
        let flat = k_nearest_indices(&[9.0, 49.0], &model, 2);
        assert_eq!(flat.len(), 4);
        assert_eq!(&flat[..2], &[1, 0]); // 9.0: nearest 10, then 0
        assert_eq!(&flat[2..], &[3, 2]); // 49.0: nearest 50, then 21
    }

    #[test]
    fn test_k_nearest_clamps_k() {
        let model = [1.0, 2.0];
        let flat = k_nearest_indices(&[0.0], &model, 10);
        assert_eq!(flat, vec![0, 1]);
    }
}
