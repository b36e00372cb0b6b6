//! Descriptive statistics primitives.
//!
//! Thin wrappers over `u_numflow::stats` that follow the crate-wide
//! convention for statistical indeterminacy: instead of `None`, every
//! function here returns `f64::NAN` when the statistic is undefined
//! (empty input, n < 2 for the sample standard deviation, zero mean for CV%).
//! Callers can therefore pass results straight to rendering without
//! unwrapping.
//!
//! # Examples
//!
//! ```
//! use poct_qc::stats::{mean, sample_std_dev, cv_percent};
//!
//! let v = [10.0, 12.0, 14.0];
//! assert!((mean(&v) - 12.0).abs() < 1e-12);
//! assert!((sample_std_dev(&v) - 2.0).abs() < 1e-12);
//! assert!((cv_percent(sample_std_dev(&v), mean(&v)) - 16.666_666).abs() < 1e-4);
//! assert!(mean(&[]).is_nan());
//! ```

use serde::{Deserialize, Serialize};
use u_numflow::stats;

use crate::error::{QcError, Result};

/// Which variance denominator to use for a standard deviation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dispersion {
    /// Bessel-corrected, n − 1 denominator.
    #[default]
    Sample,
    /// n denominator.
    Population,
}

impl Dispersion {
    /// Standard deviation of `values` under this convention.
    pub fn std_dev(self, values: &[f64]) -> f64 {
        match self {
            Dispersion::Sample => sample_std_dev(values),
            Dispersion::Population => population_std_dev(values),
        }
    }
}

// ---------------------------------------------------------------------------
// Location and dispersion
// ---------------------------------------------------------------------------

/// Arithmetic mean. `NaN` on empty input.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    stats::mean(values).unwrap_or(f64::NAN)
}

/// Sample standard deviation √(Σ(x − x̄)² / (n − 1)).
///
/// # Returns
///
/// `NaN` when fewer than two values are given. `n` identical values give
/// exactly `0.0`.
pub fn sample_std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return f64::NAN;
    }
    if is_constant(values) {
        return 0.0;
    }
    stats::std_dev(values).unwrap_or(f64::NAN)
}

/// Population standard deviation √(Σ(x − x̄)² / n). `NaN` on empty input.
pub fn population_std_dev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    if is_constant(values) {
        return 0.0;
    }
    stats::population_std_dev(values).unwrap_or(f64::NAN)
}

/// Coefficient of variation in percent, 100 · sd / mean.
///
/// `NaN` when `mean` is zero or either argument is `NaN`.
pub fn cv_percent(sd: f64, mean: f64) -> f64 {
    percent_of(sd, mean)
}

/// Mean absolute deviation around the mean. `NaN` on empty input.
pub fn mean_absolute_deviation(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    let m = mean(values);
    values.iter().map(|v| (v - m).abs()).sum::<f64>() / values.len() as f64
}

// ---------------------------------------------------------------------------
// Smoothing
// ---------------------------------------------------------------------------

/// Centred moving average with output length equal to input length.
///
/// # Algorithm
///
/// For index i the window is `[i − ⌊w/2⌋, i + ⌈w/2⌉)`, clipped to the
/// bounds of the input, so edge points average over fewer values.
///
/// # Errors
///
/// [`QcError::InvalidArgument`] when `window` is zero.
///
/// # Examples
///
/// ```
/// use poct_qc::stats::moving_average;
///
/// let smoothed = moving_average(&[1.0, 2.0, 3.0, 4.0], 3).unwrap();
/// assert_eq!(smoothed, vec![1.5, 2.0, 3.0, 3.5]);
/// ```
pub fn moving_average(values: &[f64], window: usize) -> Result<Vec<f64>> {
    if window == 0 {
        return Err(QcError::InvalidArgument(
            "moving average window must be > 0".into(),
        ));
    }
    let n = values.len();
    let back = window / 2;
    let ahead = window.div_ceil(2);
    Ok((0..n)
        .map(|i| {
            let start = i.saturating_sub(back);
            let end = (i + ahead).min(n);
            let slice = &values[start..end];
            slice.iter().sum::<f64>() / slice.len() as f64
        })
        .collect())
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// 100 · numerator / denominator, `NaN` when the denominator is zero or not finite.
pub(crate) fn percent_of(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 || !denominator.is_finite() || numerator.is_nan() {
        return f64::NAN;
    }
    100.0 * numerator / denominator
}

/// Whether every value equals the first (floating-point equality).
fn is_constant(values: &[f64]) -> bool {
    values.windows(2).all(|w| w[0] == w[1])
}

// ---------------------------------------------------------------------------
// Serde
// ---------------------------------------------------------------------------

/// Reads back an `f64` written by `serde_json`, where `NaN` became `null`.
///
/// Used as `#[serde(deserialize_with = "crate::stats::nan_from_null")]` on
/// every statistic that may be undefined.
pub(crate) fn nan_from_null<'de, D>(deserializer: D) -> std::result::Result<f64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(f64::NAN))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mean_basic() {
        assert!((mean(&[1.0, 2.0, 3.0, 4.0]) - 2.5).abs() < 1e-12);
    }

    #[test]
    fn mean_empty_is_nan() {
        assert!(mean(&[]).is_nan());
    }

    #[test]
    fn sample_sd_known_value() {
        // Σ(x − 5)² = 32, n − 1 = 7
        let v = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert!((sample_std_dev(&v) - (32.0_f64 / 7.0).sqrt()).abs() < 1e-12);
    }

    #[test]
    fn sample_sd_single_value_is_nan() {
        assert!(sample_std_dev(&[4.2]).is_nan());
        assert!(sample_std_dev(&[]).is_nan());
    }

    #[test]
    fn sample_sd_identical_values_is_zero() {
        assert_eq!(sample_std_dev(&[0.1, 0.1, 0.1, 0.1, 0.1]), 0.0);
    }

    #[test]
    fn population_sd_known_value() {
        let v = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert!((population_std_dev(&v) - 2.0).abs() < 1e-12);
        assert_eq!(population_std_dev(&[3.0]), 0.0);
        assert!(population_std_dev(&[]).is_nan());
    }

    #[test]
    fn population_sd_matches_numflow() {
        let v = [1.0, 3.0, 8.0, 10.5];
        let expected = stats::population_std_dev(&v).unwrap();
        assert!((population_std_dev(&v) - expected).abs() < 1e-12);
        assert!((population_std_dev(&[1.0, 3.0]) - 1.0).abs() < 1e-12);
    }

    #[derive(Debug, Deserialize)]
    struct Wrapped {
        #[serde(deserialize_with = "nan_from_null")]
        x: f64,
    }

    #[test]
    fn null_reads_back_as_nan() {
        let w: Wrapped = serde_json::from_str(r#"{"x":null}"#).unwrap();
        assert!(w.x.is_nan());
        let w: Wrapped = serde_json::from_str(r#"{"x":2.5}"#).unwrap();
        assert_eq!(w.x, 2.5);
        assert!(serde_json::from_str::<Wrapped>(r#"{"x":"a"}"#).is_err());
    }

    #[test]
    fn dispersion_dispatch() {
        let v = [1.0, 3.0];
        assert!((Dispersion::Sample.std_dev(&v) - 2.0_f64.sqrt()).abs() < 1e-12);
        assert!((Dispersion::Population.std_dev(&v) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn cv_zero_mean_is_nan() {
        assert!(cv_percent(1.0, 0.0).is_nan());
        assert!(cv_percent(f64::NAN, 5.0).is_nan());
        assert!((cv_percent(0.5, 10.0) - 5.0).abs() < 1e-12);
    }

    #[test]
    fn mad_basic() {
        // mean 3, |dev| = 2,1,0,1,2
        assert!((mean_absolute_deviation(&[1.0, 2.0, 3.0, 4.0, 5.0]) - 1.2).abs() < 1e-12);
        assert!(mean_absolute_deviation(&[]).is_nan());
    }

    #[test]
    fn moving_average_even_window() {
        // w = 2: window [i − 1, i + 1)
        let out = moving_average(&[2.0, 4.0, 6.0], 2).unwrap();
        assert_eq!(out, vec![2.0, 3.0, 5.0]);
    }

    #[test]
    fn moving_average_window_one_is_identity() {
        let v = [5.0, 1.0, 9.0];
        assert_eq!(moving_average(&v, 1).unwrap(), v.to_vec());
    }

    #[test]
    fn moving_average_zero_window_fails() {
        assert!(matches!(
            moving_average(&[1.0], 0),
            Err(QcError::InvalidArgument(_))
        ));
    }

    #[test]
    fn moving_average_empty() {
        assert!(moving_average(&[], 3).unwrap().is_empty());
    }
}
