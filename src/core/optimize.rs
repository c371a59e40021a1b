//! 1-D optimization primitives used by the matchers.

/// Optimal translation `t` minimizing `Σ |data[i] + t - model[i]|` over
/// paired slices.
///
/// The objective is piecewise linear: its gradient at `t` is the count of
/// positive residuals minus the count of negative ones, and the Hessian is
/// zero everywhere. A Newton step therefore degenerates to a bisection on
/// the gradient sign over the hull of the per-pair residuals, which this
/// implements directly.
pub fn minimize_l1_translation(data: &[f64], model: &[f64]) -> f64 {
    debug_assert_eq!(data.len(), model.len());
    if data.is_empty() {
        return 0.0;
    }

    let mut lo = f64::INFINITY;
    let mut hi = f64::NEG_INFINITY;
    for (d, m) in data.iter().zip(model) {
        let r = m - d;
        lo = lo.min(r);
        hi = hi.max(r);
    }
    if lo >= hi {
        return lo;
    }

    let gradient = |t: f64| -> i64 {
        let mut g = 0i64;
        for (d, m) in data.iter().zip(model) {
            let e = d + t - m;
            if e > 0.0 {
                g += 1;
            } else if e < 0.0 {
                g -= 1;
            }
        }
        g
    };

    for _ in 0..128 {
        let mid = 0.5 * (lo + hi);
        match gradient(mid) {
            g if g < 0 => lo = mid,
            g if g > 0 => hi = mid,
            _ => return mid,
        }
        if hi - lo <= 1e-12 * hi.abs().max(lo.abs()).max(1.0) {
            break;
        }
    }
    0.5 * (lo + hi)
}

/// Bounded derivative-free scalar minimization by golden-section search.
///
/// Converges to a local minimum of `f` on `[lo, hi]`; for unimodal
/// objectives this is the global one.
pub fn golden_section_min(
    mut f: impl FnMut(f64) -> f64,
    lo: f64,
    hi: f64,
    tol: f64,
    max_iter: u32,
) -> f64 {
    const INV_PHI: f64 = 0.618_033_988_749_894_8;

    let (mut a, mut b) = (lo.min(hi), lo.max(hi));
    let mut c = b - INV_PHI * (b - a);
    let mut d = a + INV_PHI * (b - a);
    let mut fc = f(c);
    let mut fd = f(d);

    let mut iter = 0;
    while (b - a) > tol && iter < max_iter {
        if fc < fd {
            b = d;
            d = c;
            fd = fc;
            c = b - INV_PHI * (b - a);
            fc = f(c);
        } else {
            a = c;
            c = d;
            fc = fd;
            d = a + INV_PHI * (b - a);
            fd = f(d);
        }
        iter += 1;
    }
    0.5 * (a + b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_l1_translation_exact_shift() {
        let model = [10.0, 20.0, 30.0];
        let data = [7.0, 17.0, 27.0];
        assert_relative_eq!(minimize_l1_translation(&data, &model), 3.0, epsilon = 1e-9);
    }

    #[test]
    fn test_l1_translation_is_median_of_residuals() {
        // Residuals are [1, 2, 100]; the L1 optimum sits at the median, not
        // the mean, so the outlier has no pull.
        let data = [0.0, 0.0, 0.0];
        let model = [1.0, 2.0, 100.0];
        let t = minimize_l1_translation(&data, &model);
        assert_relative_eq!(t, 2.0, epsilon = 1e-6);
    }

    #[test]
    fn test_l1_translation_degenerate_inputs() {
        assert_eq!(minimize_l1_translation(&[], &[]), 0.0);
        assert_relative_eq!(minimize_l1_translation(&[5.0], &[9.0]), 4.0);
    }

    #[test]
    fn test_golden_section_quadratic() {
        let min = golden_section_min(|x| (x - 3.5) * (x - 3.5), -10.0, 10.0, 1e-9, 200);
        assert_relative_eq!(min, 3.5, epsilon = 1e-6);
    }

    #[test]
    fn test_golden_section_respects_bounds() {
        // Minimum of x^2 on [2, 5] is at the lower bound
        let min = golden_section_min(|x| x * x, 2.0, 5.0, 1e-9, 200);
        assert_relative_eq!(min, 2.0, epsilon = 1e-4);
    }
}
