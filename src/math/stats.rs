//! Summary statistics used by the cleaner, the residual summary and the
//! bootstrap interval.

use nalgebra::DVector;

/// Arithmetic mean, or `None` for an empty slice.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(DVector::from_column_slice(values).mean())
}

/// Standard deviation with `ddof` delta degrees of freedom.
///
/// `ddof = 0` is the population SD (what the outlier filter uses);
/// `ddof = 2` matches the residual SD of a two-parameter line fit.
/// Returns `None` when `n <= ddof`.
pub fn std_dev(values: &[f64], ddof: usize) -> Option<f64> {
    let n = values.len();
    if n == 0 || n <= ddof {
        return None;
    }
    let v = DVector::from_column_slice(values);
    let centered = v.add_scalar(-v.mean());
    let ss = centered.dot(&centered);
    Some((ss / (n - ddof) as f64).sqrt())
}

/// Empirical percentile of an ascending-sorted slice, `q` in `[0, 1]`.
///
/// Uses linear interpolation between the two closest order statistics at
/// rank `q * (n - 1)`.
pub fn percentile(sorted: &[f64], q: f64) -> Option<f64> {
    if sorted.is_empty() || !(0.0..=1.0).contains(&q) {
        return None;
    }
    let rank = q * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let frac = rank - lo as f64;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * frac)
}
