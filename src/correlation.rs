//! Correlation analysis for paired device readings.
//!
//! # Examples
//!
//! ```
//! use poct_qc::correlation::{pearson_correlation, r_squared};
//!
//! let x = [1.0, 2.0, 3.0, 4.0, 5.0];
//! let y = [2.0, 4.0, 6.0, 8.0, 10.0];
//!
//! let r = pearson_correlation(&x, &y).unwrap();
//! assert!((r - 1.0).abs() < 1e-10);
//! assert!((r_squared(&x, &y).unwrap() - 1.0).abs() < 1e-10);
//! ```

use u_numflow::stats;

use crate::error::{ensure_same_len, Result};
use crate::stats::sample_std_dev;

// ---------------------------------------------------------------------------
// Pearson
// ---------------------------------------------------------------------------

/// Computes the Pearson product-moment correlation coefficient.
///
/// # Algorithm
///
/// r = cov(x,y) / (s_x · s_y), clamped to [-1, 1] to absorb rounding.
///
/// # Returns
///
/// `NaN` when fewer than two pairs are given or either series is constant
/// (zero variance). Paired readings with zero overlap therefore degrade to
/// `NaN` rather than failing.
///
/// # Errors
///
/// [`QcError::LengthMismatch`](crate::QcError::LengthMismatch) if the slices
/// differ in length.
///
/// # References
///
/// Pearson (1895). "Note on regression and inheritance in the case of
/// two parents". Proceedings of the Royal Society of London, 58, 240–242.
pub fn pearson_correlation(xs: &[f64], ys: &[f64]) -> Result<f64> {
    ensure_same_len(xs, ys)?;
    if xs.len() < 2 {
        return Ok(f64::NAN);
    }

    let sx = sample_std_dev(xs);
    let sy = sample_std_dev(ys);
    if sx == 0.0 || sy == 0.0 || sx.is_nan() || sy.is_nan() {
        return Ok(f64::NAN); // zero variance
    }

    let Some(cov) = stats::covariance(xs, ys) else {
        return Ok(f64::NAN);
    };
    Ok((cov / (sx * sy)).clamp(-1.0, 1.0))
}

/// Coefficient of determination, the square of [`pearson_correlation`].
pub fn r_squared(xs: &[f64], ys: &[f64]) -> Result<f64> {
    let r = pearson_correlation(xs, ys)?;
    Ok(r * r)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::QcError;

    #[test]
    fn pearson_perfect_positive() {
        let r = pearson_correlation(&[1.0, 2.0, 3.0], &[2.0, 4.0, 6.0]).unwrap();
        assert!((r - 1.0).abs() < 1e-10);
    }

    #[test]
    fn pearson_perfect_negative() {
        let x = [1.0, 2.0, 3.0, 4.0, 5.0];
        let y = [10.0, 8.0, 6.0, 4.0, 2.0];
        let r = pearson_correlation(&x, &y).unwrap();
        assert!((r + 1.0).abs() < 1e-10);
    }

    #[test]
    fn pearson_known_value() {
        // Height (inches) vs GPA example
        let x = [68.0, 71.0, 62.0, 75.0, 58.0, 60.0, 67.0, 68.0, 71.0, 69.0];
        let y = [4.1, 4.6, 3.8, 4.4, 3.2, 3.1, 3.8, 4.1, 4.3, 3.7];
        let r = pearson_correlation(&x, &y).unwrap();
        assert!((r - 0.8816).abs() < 0.01, "r = {r}");
    }

    #[test]
    fn pearson_constant_series_is_nan() {
        let r = pearson_correlation(&[5.0, 5.0, 5.0], &[1.0, 2.0, 3.0]).unwrap();
        assert!(r.is_nan());
    }

    #[test]
    fn pearson_too_few_points_is_nan() {
        assert!(pearson_correlation(&[], &[]).unwrap().is_nan());
        assert!(pearson_correlation(&[1.0], &[2.0]).unwrap().is_nan());
    }

    #[test]
    fn pearson_length_mismatch() {
        let err = pearson_correlation(&[1.0, 2.0, 3.0], &[4.0, 5.0]).unwrap_err();
        assert!(matches!(err, QcError::LengthMismatch { left: 3, right: 2 }));
    }

    #[test]
    fn r_squared_of_negative_correlation_is_positive() {
        let r2 = r_squared(&[1.0, 2.0, 3.0], &[3.0, 2.0, 1.0]).unwrap();
        assert!((r2 - 1.0).abs() < 1e-10);
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn pearson_bounded(
            data in proptest::collection::vec(-1e6_f64..1e6, 3..50).prop_flat_map(|x| {
                let n = x.len();
                (Just(x), proptest::collection::vec(-1e6_f64..1e6, n..=n))
            })
        ) {
            let (x, y) = data;
            let r = pearson_correlation(&x, &y).unwrap();
            prop_assert!(r.is_nan() || (-1.0..=1.0).contains(&r), "r out of bounds: {}", r);
        }
    }
}
