//! Simple (single-predictor) ordinary least squares.
//!
//! Every fit in this project is a straight line `y = slope * x + intercept`,
//! both for the per-level models and for each bootstrap resample, so we solve
//! the normal equations in closed form rather than going through a general
//! least-squares solver:
//!
//! ```text
//! slope     = Sxy / Sxx
//! intercept = mean(y) - slope * mean(x)
//! r         = Sxy / sqrt(Sxx * Syy)
//! ```
//!
//! where `Sxx`, `Sxy`, `Syy` are sums of centered cross-products.

use nalgebra::DVector;

/// Why a line could not be fitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum OlsError {
    #[error("need at least 2 observations, got {0}")]
    TooFewPoints(usize),
    #[error("all predictor values are identical (zero variance)")]
    ZeroVariance,
    #[error("predictor and response lengths differ ({x} vs {y})")]
    LengthMismatch { x: usize, y: usize },
}

/// Closed-form line fit plus the diagnostics derived from the same sums.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineFit {
    pub slope: f64,
    pub intercept: f64,
    /// Pearson correlation; `0.0` when `y` is constant.
    pub r: f64,
    /// `sqrt(SSE / (n - 2))`; `0.0` when `n == 2` (the line is exact).
    pub residual_std: f64,
    pub n: usize,
}

impl LineFit {
    pub fn predict(&self, x: f64) -> f64 {
        self.slope * x + self.intercept
    }
}

/// Fit `y = slope * x + intercept` by ordinary least squares.
pub fn fit_line(x: &[f64], y: &[f64]) -> Result<LineFit, OlsError> {
    if x.len() != y.len() {
        return Err(OlsError::LengthMismatch { x: x.len(), y: y.len() });
    }
    let n = x.len();
    if n < 2 {
        return Err(OlsError::TooFewPoints(n));
    }
    // Checked on the raw values: the centered sum of squares of identical
    // values can come out as a tiny positive number after rounding.
    if x.iter().all(|&v| v == x[0]) {
        return Err(OlsError::ZeroVariance);
    }

    let xv = DVector::from_column_slice(x);
    let yv = DVector::from_column_slice(y);
    let x_mean = xv.mean();
    let y_mean = yv.mean();

    let dx = xv.add_scalar(-x_mean);
    let dy = yv.add_scalar(-y_mean);
    let sxx = dx.dot(&dx);
    let sxy = dx.dot(&dy);
    let syy = dy.dot(&dy);

    if !sxx.is_finite() || sxx <= 0.0 {
        return Err(OlsError::ZeroVariance);
    }

    let slope = sxy / sxx;
    let intercept = y_mean - slope * x_mean;
    let r = if syy > 0.0 {
        (sxy / (sxx * syy).sqrt()).clamp(-1.0, 1.0)
    } else {
        0.0
    };

    let fitted = xv.map(|v| slope * v + intercept);
    let resid = &yv - fitted;
    let sse = resid.dot(&resid);
    let residual_std = if n > 2 { (sse / (n - 2) as f64).sqrt() } else { 0.0 };

    Ok(LineFit {
        slope,
        intercept,
        r,
        residual_std,
        n,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fits_exact_line() {
        // y = 2 + 3x on x = [0,1,2]
        let fit = fit_line(&[0.0, 1.0, 2.0], &[2.0, 5.0, 8.0]).unwrap();
        assert!((fit.slope - 3.0).abs() < 1e-12);
        assert!((fit.intercept - 2.0).abs() < 1e-12);
        assert!((fit.r - 1.0).abs() < 1e-12);
        assert!(fit.residual_std.abs() < 1e-12);
        assert!((fit.predict(4.0) - 14.0).abs() < 1e-12);
    }

    #[test]
    fn residual_std_uses_n_minus_two() {
        // x = [0,1,2,3], y = [0,2,1,3]: slope 0.8, intercept 0.3,
        // residuals [-0.3, 0.9, -0.9, 0.3], SSE = 1.8, SSE/(n-2) = 0.9.
        let fit = fit_line(&[0.0, 1.0, 2.0, 3.0], &[0.0, 2.0, 1.0, 3.0]).unwrap();
        assert!((fit.slope - 0.8).abs() < 1e-12);
        assert!((fit.intercept - 0.3).abs() < 1e-12);
        assert!((fit.residual_std - 0.9_f64.sqrt()).abs() < 1e-12);
        assert!((fit.r - 0.8).abs() < 1e-12);
    }

    #[test]
    fn negative_relationship_has_negative_r() {
        let fit = fit_line(&[1.0, 2.0, 3.0, 4.0], &[10.0, 8.1, 6.0, 3.9]).unwrap();
        assert!(fit.slope < 0.0);
        assert!(fit.r < -0.99);
    }

    #[test]
    fn rejects_degenerate_inputs() {
        assert_eq!(fit_line(&[1.0], &[2.0]), Err(OlsError::TooFewPoints(1)));
        assert_eq!(fit_line(&[], &[]), Err(OlsError::TooFewPoints(0)));
        assert_eq!(
            fit_line(&[0.1, 0.1, 0.1], &[1.0, 2.0, 3.0]),
            Err(OlsError::ZeroVariance)
        );
        assert_eq!(
            fit_line(&[1.0, 2.0], &[1.0]),
            Err(OlsError::LengthMismatch { x: 2, y: 1 })
        );
    }

    #[test]
    fn constant_response_has_zero_slope_and_r() {
        let fit = fit_line(&[1.0, 2.0, 3.0], &[5.0, 5.0, 5.0]).unwrap();
        assert_eq!(fit.slope, 0.0);
        assert_eq!(fit.r, 0.0);
        assert!((fit.intercept - 5.0).abs() < 1e-12);
    }

    #[test]
    fn two_points_fit_exactly() {
        let fit = fit_line(&[1.0, 3.0], &[2.0, 6.0]).unwrap();
        assert!((fit.slope - 2.0).abs() < 1e-12);
        assert_eq!(fit.residual_std, 0.0);
    }
}
