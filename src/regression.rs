//! Simple linear regression for method comparison.
//!
//! # Examples
//!
//! ```
//! use poct_qc::regression::linear_regression;
//!
//! let x = [1.0, 2.0, 3.0, 4.0, 5.0];
//! let y = [2.1, 3.9, 6.1, 7.9, 10.1];
//! let fit = linear_regression(&x, &y).unwrap();
//! assert!((fit.slope - 2.0).abs() < 0.1);
//! assert!((fit.intercept - 0.1).abs() < 0.2);
//! assert!((fit.predict(6.0) - 12.1).abs() < 0.3);
//! ```

use serde::{Deserialize, Serialize};
use u_numflow::stats;

use crate::error::{ensure_same_len, Result};

/// Result of a simple linear regression: y = intercept + slope · x.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LinearFit {
    /// Slope coefficient (β₁).
    #[serde(deserialize_with = "crate::stats::nan_from_null")]
    pub slope: f64,
    /// Intercept (β₀).
    #[serde(deserialize_with = "crate::stats::nan_from_null")]
    pub intercept: f64,
    /// Number of (x, y) pairs fitted.
    pub n: usize,
}

impl LinearFit {
    /// Predicted y for the given x.
    pub fn predict(&self, x: f64) -> f64 {
        self.intercept + self.slope * x
    }
}

// ---------------------------------------------------------------------------
// Simple Linear Regression
// ---------------------------------------------------------------------------

/// Computes simple linear regression (OLS closed-form).
///
/// # Algorithm
///
/// β₁ = Σ(x − x̄)(y − ȳ) / Σ(x − x̄)²
/// β₀ = ȳ − β₁·x̄
///
/// # Returns
///
/// Slope and intercept are `NaN` when fewer than two pairs are given or x
/// has zero variance.
///
/// # Errors
///
/// [`QcError::LengthMismatch`](crate::QcError::LengthMismatch) if the slices
/// differ in length.
///
/// # References
///
/// Draper & Smith (1998). "Applied Regression Analysis", 3rd edition.
pub fn linear_regression(xs: &[f64], ys: &[f64]) -> Result<LinearFit> {
    ensure_same_len(xs, ys)?;
    let n = xs.len();
    let undefined = LinearFit {
        slope: f64::NAN,
        intercept: f64::NAN,
        n,
    };
    if n < 2 {
        return Ok(undefined);
    }

    let (Some(x_mean), Some(y_mean), Some(x_var), Some(cov)) = (
        stats::mean(xs),
        stats::mean(ys),
        stats::variance(xs),
        stats::covariance(xs, ys),
    ) else {
        return Ok(undefined);
    };

    if x_var == 0.0 || xs.windows(2).all(|w| w[0] == w[1]) {
        return Ok(undefined); // zero variance in x
    }

    let slope = cov / x_var;
    let intercept = y_mean - slope * x_mean;
    Ok(LinearFit {
        slope,
        intercept,
        n,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::QcError;

    #[test]
    fn perfect_line_through_origin() {
        let fit = linear_regression(&[1.0, 2.0, 3.0], &[2.0, 4.0, 6.0]).unwrap();
        assert!((fit.slope - 2.0).abs() < 1e-10);
        assert!(fit.intercept.abs() < 1e-10);
        assert_eq!(fit.n, 3);
    }

    #[test]
    fn known_intercept() {
        // y = 3 + 0.5x
        let x = [0.0, 2.0, 4.0, 6.0];
        let y = [3.0, 4.0, 5.0, 6.0];
        let fit = linear_regression(&x, &y).unwrap();
        assert!((fit.slope - 0.5).abs() < 1e-10);
        assert!((fit.intercept - 3.0).abs() < 1e-10);
        assert!((fit.predict(10.0) - 8.0).abs() < 1e-10);
    }

    #[test]
    fn constant_x_is_undefined() {
        let fit = linear_regression(&[2.0, 2.0, 2.0], &[1.0, 2.0, 3.0]).unwrap();
        assert!(fit.slope.is_nan());
        assert!(fit.intercept.is_nan());
        assert!(fit.predict(1.0).is_nan());
    }

    #[test]
    fn empty_is_undefined() {
        let fit = linear_regression(&[], &[]).unwrap();
        assert_eq!(fit.n, 0);
        assert!(fit.slope.is_nan());
    }

    #[test]
    fn length_mismatch() {
        assert!(matches!(
            linear_regression(&[1.0, 2.0], &[1.0]),
            Err(QcError::LengthMismatch { left: 2, right: 1 })
        ));
    }
}
