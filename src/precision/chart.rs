//! Levey–Jennings chart: repeated results against mean ± SD bands.
//!
//! Each point carries its z-score and the Westgard rules it triggered.
//! Unlike a Shewhart chart, the bands come straight from the group's own
//! mean and SD rather than from range-based estimates.
//!
//! # References
//!
//! - Levey, S. & Jennings, E.R. (1950). "The use of control charts in the
//!   clinical laboratory". *American Journal of Clinical Pathology* 20(11),
//!   pp. 1059-1066.
//! - Westgard, J.O. et al. (1981). "A multi-rule Shewhart chart for quality
//!   control in clinical chemistry". *Clinical Chemistry* 27(3), pp. 493-501.

use serde::{Deserialize, Serialize};

use super::rules::{RunRule, WestgardRule, WestgardRules};
use super::PrecisionPoint;
use crate::error::Result;
use crate::stats::moving_average;

/// Mean ± 1, 2 and 3 SD bands.
///
/// All bands are `NaN` when the SD is undefined.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ControlLimits {
    #[serde(deserialize_with = "crate::stats::nan_from_null")]
    pub mean: f64,
    #[serde(deserialize_with = "crate::stats::nan_from_null")]
    pub sd: f64,
    #[serde(deserialize_with = "crate::stats::nan_from_null")]
    pub plus_1sd: f64,
    #[serde(deserialize_with = "crate::stats::nan_from_null")]
    pub minus_1sd: f64,
    #[serde(deserialize_with = "crate::stats::nan_from_null")]
    pub plus_2sd: f64,
    #[serde(deserialize_with = "crate::stats::nan_from_null")]
    pub minus_2sd: f64,
    #[serde(deserialize_with = "crate::stats::nan_from_null")]
    pub plus_3sd: f64,
    #[serde(deserialize_with = "crate::stats::nan_from_null")]
    pub minus_3sd: f64,
}

impl ControlLimits {
    pub fn new(mean: f64, sd: f64) -> Self {
        Self {
            mean,
            sd,
            plus_1sd: mean + sd,
            minus_1sd: mean - sd,
            plus_2sd: mean + 2.0 * sd,
            minus_2sd: mean - 2.0 * sd,
            plus_3sd: mean + 3.0 * sd,
            minus_3sd: mean - 3.0 * sd,
        }
    }

    /// Whether the bands can be used for rule evaluation (finite, positive SD).
    pub fn is_usable(&self) -> bool {
        self.mean.is_finite() && self.sd.is_finite() && self.sd > 0.0
    }

    /// (value − mean) / sd; `NaN` when the limits are not usable.
    pub fn z_score(&self, value: f64) -> f64 {
        if !self.is_usable() {
            return f64::NAN;
        }
        (value - self.mean) / self.sd
    }
}

/// A single result on the chart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartPoint {
    /// Zero-based position in the charted sequence.
    pub index: usize,
    pub date: String,
    #[serde(deserialize_with = "crate::stats::nan_from_null")]
    pub value: f64,
    #[serde(deserialize_with = "crate::stats::nan_from_null")]
    pub z_score: f64,
    /// Rules triggered at this point.
    pub violations: Vec<WestgardRule>,
}

/// A rule triggered at a point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    pub point_index: usize,
    pub rule: WestgardRule,
}

/// Levey–Jennings chart for one device/analyte series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeveyJenningsChart {
    pub limits: ControlLimits,
    pub points: Vec<ChartPoint>,
    /// Centred moving average of the values.
    pub trend: Vec<f64>,
    /// No rejection rule fired. Warnings (1₂ₛ) do not count.
    pub in_control: bool,
}

impl LeveyJenningsChart {
    /// Charts `series` against `mean` ± `sd` using the Westgard multirule.
    ///
    /// # Errors
    ///
    /// [`QcError::InvalidArgument`](crate::QcError::InvalidArgument) when
    /// `trend_window` is zero.
    pub fn new(series: &[PrecisionPoint], mean: f64, sd: f64, trend_window: usize) -> Result<Self> {
        Self::with_rules(series, mean, sd, trend_window, &WestgardRules)
    }

    /// Charts `series` with a caller-supplied rule set.
    ///
    /// Rules are skipped entirely when the SD is undefined or zero.
    pub fn with_rules(
        series: &[PrecisionPoint],
        mean: f64,
        sd: f64,
        trend_window: usize,
        rules: &dyn RunRule,
    ) -> Result<Self> {
        let limits = ControlLimits::new(mean, sd);
        let values: Vec<f64> = series.iter().map(|p| p.value).collect();
        let trend = moving_average(&values, trend_window)?;

        let mut points: Vec<ChartPoint> = series
            .iter()
            .enumerate()
            .map(|(i, p)| ChartPoint {
                index: i,
                date: p.date.clone(),
                value: p.value,
                z_score: limits.z_score(p.value),
                violations: Vec::new(),
            })
            .collect();

        if limits.is_usable() {
            for (idx, rule) in rules.check(&points, &limits) {
                if let Some(point) = points.get_mut(idx) {
                    if !point.violations.contains(&rule) {
                        point.violations.push(rule);
                    }
                }
            }
        }

        let in_control = points
            .iter()
            .all(|p| p.violations.iter().all(|r| !r.is_rejection()));

        Ok(Self {
            limits,
            points,
            trend,
            in_control,
        })
    }

    /// All violations, in point order.
    pub fn violations(&self) -> Vec<Violation> {
        self.points
            .iter()
            .flat_map(|p| {
                p.violations.iter().map(move |&rule| Violation {
                    point_index: p.index,
                    rule,
                })
            })
            .collect()
    }

    /// Whether any point triggered the 1₂ₛ warning.
    pub fn has_warning(&self) -> bool {
        self.points
            .iter()
            .any(|p| p.violations.contains(&WestgardRule::Warning1_2s))
    }
}
