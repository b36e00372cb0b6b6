//! Analysis settings.
//!
//! Every engine takes a `&QcConfig`. The defaults reproduce the classic
//! laboratory conventions: 95% limits of agreement, a 3% / 0.5-unit bias
//! flag, a 5% pooled CV warning, Bessel-corrected SDs and chronological
//! Levey–Jennings ordering.

use serde::{Deserialize, Serialize};

use crate::error::{QcError, Result};
use crate::stats::Dispersion;

/// How the sample pivot treats a repeated (sample_id, device_id) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicatePolicy {
    /// Replace the repeated cell with the mean of all its readings.
    #[default]
    Average,
    /// Keep the reading that appears last in the input.
    LastWriteWins,
    /// Fail the pivot with [`QcError::DuplicateMeasurement`].
    Reject,
}

/// Ordering of each precision group's value sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrecisionOrder {
    /// Chronological by `test_date`, stable on input order.
    #[default]
    ByTestDate,
    /// Input row order.
    InputOrder,
}

/// Settings shared by all engines.
///
/// # Examples
///
/// ```
/// use poct_qc::{DuplicatePolicy, QcConfig};
///
/// let cfg = QcConfig::from_json_str(r#"{"percent_bias_threshold": 5.0,
///                                       "duplicate_policy": "reject"}"#).unwrap();
/// assert_eq!(cfg.percent_bias_threshold, 5.0);
/// assert_eq!(cfg.duplicate_policy, DuplicatePolicy::Reject);
/// assert_eq!(cfg.loa_z, 1.96);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct QcConfig {
    /// Normal quantile for the limits of agreement (bias ± z·sd).
    pub loa_z: f64,
    /// Percent-bias magnitude above which a bias row is flagged.
    pub percent_bias_threshold: f64,
    /// Absolute-bias magnitude above which a sample bias row is flagged.
    pub absolute_bias_threshold: f64,
    /// Pooled CV% above which the device summary raises a warning.
    pub global_cv_warning: f64,
    /// SD convention for device summaries and precision groups.
    pub dispersion: Dispersion,
    pub duplicate_policy: DuplicatePolicy,
    pub precision_order: PrecisionOrder,
    /// Window of the Levey–Jennings trend line.
    pub trend_window: usize,
}

impl Default for QcConfig {
    fn default() -> Self {
        Self {
            loa_z: 1.96,
            percent_bias_threshold: 3.0,
            absolute_bias_threshold: 0.5,
            global_cv_warning: 5.0,
            dispersion: Dispersion::Sample,
            duplicate_policy: DuplicatePolicy::Average,
            precision_order: PrecisionOrder::ByTestDate,
            trend_window: 3,
        }
    }
}

impl QcConfig {
    /// Parses and validates a JSON document; absent fields take defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let cfg: Self = serde_json::from_str(json)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Checks that every numeric setting is in range.
    pub fn validate(&self) -> Result<()> {
        if !(self.loa_z.is_finite() && self.loa_z > 0.0) {
            return Err(QcError::InvalidConfig(format!(
                "loa_z must be a positive number, got {}",
                self.loa_z
            )));
        }
        for (name, value) in [
            ("percent_bias_threshold", self.percent_bias_threshold),
            ("absolute_bias_threshold", self.absolute_bias_threshold),
            ("global_cv_warning", self.global_cv_warning),
        ] {
            if !(value.is_finite() && value >= 0.0) {
                return Err(QcError::InvalidConfig(format!(
                    "{name} must be a non-negative number, got {value}"
                )));
            }
        }
        if self.trend_window == 0 {
            return Err(QcError::InvalidConfig("trend_window must be > 0".into()));
        }
        Ok(())
    }
}
