//! Internal precision: repeatability of each device on each analyte.
//!
//! Rows are grouped by (device, analyte). Every group reports mean, SD, CV%
//! and mean absolute deviation over its numeric readings, keeps the ordered
//! `{date, value}` sequence, and charts that sequence on a Levey–Jennings
//! chart evaluated with the Westgard multirule.
//!
//! # Charts and rules
//!
//! - [`LeveyJenningsChart`] — mean ± 1/2/3 SD bands, z-scores and trend line
//! - [`WestgardRules`] — `1_2s` warning plus `1_3s`, `2_2s`, `R_4s`, `4_1s`,
//!   `10_x` rejection rules
//!
//! # Examples
//!
//! ```
//! use poct_qc::{compute_precision_stats, MeasurementRecord, QcConfig};
//!
//! let rows = vec![
//!     MeasurementRecord::new("A", "Glucose", None, "2024-01-03", 5.2),
//!     MeasurementRecord::new("A", "Glucose", None, "2024-01-01", 5.0),
//!     MeasurementRecord::new("A", "Glucose", None, "2024-01-02", 5.1),
//! ];
//! let groups = compute_precision_stats(&rows, &QcConfig::default()).unwrap();
//! assert_eq!(groups[0].key, "A-Glucose");
//! let values: Vec<f64> = groups[0].data.iter().map(|p| p.value).collect();
//! assert_eq!(values, [5.0, 5.1, 5.2]);
//! ```

mod chart;
mod rules;

pub use chart::{ChartPoint, ControlLimits, LeveyJenningsChart, Violation};
pub use rules::{RunRule, WestgardRule, WestgardRules};

use chrono::NaiveDateTime;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::config::{PrecisionOrder, QcConfig};
use crate::error::Result;
use crate::record::MeasurementRecord;
use crate::stats::mean_absolute_deviation;
use crate::summary::Moments;

/// Structured grouping key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PrecisionKey {
    pub device: String,
    pub analyte: String,
}

impl PrecisionKey {
    pub fn new(device: impl Into<String>, analyte: impl Into<String>) -> Self {
        Self {
            device: device.into(),
            analyte: analyte.into(),
        }
    }

    /// Display label `"<device>-<analyte>"`.
    pub fn label(&self) -> String {
        format!("{}-{}", self.device, self.analyte)
    }
}

/// One reading in a precision sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrecisionPoint {
    pub date: String,
    #[serde(deserialize_with = "crate::stats::nan_from_null")]
    pub value: f64,
}

/// Repeatability statistics for one device/analyte combination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrecisionGroup {
    /// Display label only; group identity is (`device`, `analyte`).
    pub key: String,
    pub device: String,
    pub analyte: String,
    #[serde(deserialize_with = "crate::stats::nan_from_null")]
    pub mean: f64,
    #[serde(deserialize_with = "crate::stats::nan_from_null")]
    pub sd: f64,
    /// CV%
    #[serde(deserialize_with = "crate::stats::nan_from_null")]
    pub cv: f64,
    /// Mean absolute deviation
    #[serde(deserialize_with = "crate::stats::nan_from_null")]
    pub mad: f64,
    pub n: usize,
    pub data: Vec<PrecisionPoint>,
    pub chart: LeveyJenningsChart,
}

impl PrecisionGroup {
    pub fn precision_key(&self) -> PrecisionKey {
        PrecisionKey::new(self.device.as_str(), self.analyte.as_str())
    }

    pub fn values(&self) -> Vec<f64> {
        self.data.iter().map(|p| p.value).collect()
    }
}

/// Rows of one group before ordering, with their parsed dates.
type Pending = Vec<(Option<NaiveDateTime>, PrecisionPoint)>;

/// Groups numeric readings by (device, analyte) and charts each group.
///
/// Groups appear in first-seen order. Under [`PrecisionOrder::ByTestDate`]
/// each sequence is sorted chronologically; ties and unparseable dates keep
/// their input order, and unparseable dates come after every parseable one.
///
/// # Errors
///
/// [`QcError::InvalidArgument`](crate::QcError::InvalidArgument) when
/// `config.trend_window` is zero.
pub fn compute_precision_stats(
    records: &[MeasurementRecord],
    config: &QcConfig,
) -> Result<Vec<PrecisionGroup>> {
    let mut groups: Vec<(PrecisionKey, Pending)> = Vec::new();
    for rec in records {
        let Some(value) = rec.value() else {
            continue;
        };
        let key = PrecisionKey::new(rec.device_id.as_str(), rec.analyte.as_str());
        let slot = match groups.iter().position(|(k, _)| *k == key) {
            Some(slot) => slot,
            None => {
                groups.push((key, Vec::new()));
                groups.len() - 1
            }
        };
        groups[slot].1.push((
            rec.parsed_date(),
            PrecisionPoint {
                date: rec.test_date.clone(),
                value,
            },
        ));
    }

    let result = groups
        .into_iter()
        .map(|(key, mut pending)| {
            if config.precision_order == PrecisionOrder::ByTestDate {
                // stable; None sorts last
                pending.sort_by_key(|(date, _)| (date.is_none(), *date));
            }
            let data: Vec<PrecisionPoint> = pending.into_iter().map(|(_, p)| p).collect();
            build_group(key, data, config)
        })
        .collect::<Result<Vec<_>>>()?;

    debug!("precision: {} group(s)", result.len());
    Ok(result)
}

fn build_group(
    key: PrecisionKey,
    data: Vec<PrecisionPoint>,
    config: &QcConfig,
) -> Result<PrecisionGroup> {
    let values: Vec<f64> = data.iter().map(|p| p.value).collect();
    let m = Moments::of(&values, config.dispersion);
    let chart = LeveyJenningsChart::new(&data, m.mean, m.sd, config.trend_window)?;
    if !chart.in_control {
        debug!("precision: {} out of control", key.label());
    }
    Ok(PrecisionGroup {
        key: key.label(),
        mean: m.mean,
        sd: m.sd,
        cv: m.cv,
        mad: mean_absolute_deviation(&values),
        n: values.len(),
        data,
        chart,
        device: key.device,
        analyte: key.analyte,
    })
}
