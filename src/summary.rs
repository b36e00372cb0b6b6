//! Per-device and pooled descriptive statistics.
//!
//! # Examples
//!
//! ```
//! use poct_qc::{summarize_devices, MeasurementRecord, QcConfig};
//!
//! let rows = vec![
//!     MeasurementRecord::new("A", "Glu", Some("S1"), "2024-01-01", 5.0),
//!     MeasurementRecord::new("A", "Glu", Some("S2"), "2024-01-01", 7.0),
//!     MeasurementRecord::new("B", "Glu", Some("S1"), "2024-01-01", 6.0),
//! ];
//! let summary = summarize_devices(&rows, &QcConfig::default());
//! assert_eq!(summary.device_count, 2);
//! assert!((summary.device_stats[0].mean - 6.0).abs() < 1e-12);
//! assert!(summary.device_stats[1].sd.is_nan()); // single reading
//! assert!((summary.global_mean - 6.0).abs() < 1e-12);
//! ```

use log::debug;
use serde::{Deserialize, Serialize};

use crate::config::QcConfig;
use crate::record::MeasurementRecord;
use crate::stats::{self, Dispersion};

/// Descriptive statistics of one device's readings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceStatistic {
    pub device: String,
    #[serde(deserialize_with = "crate::stats::nan_from_null")]
    pub mean: f64,
    #[serde(deserialize_with = "crate::stats::nan_from_null")]
    pub sd: f64,
    /// Coefficient of variation in percent.
    #[serde(deserialize_with = "crate::stats::nan_from_null")]
    pub cv: f64,
    /// Number of numeric readings.
    pub count: usize,
}

/// Device statistics plus the pooled figures over every numeric reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceSummary {
    pub device_count: usize,
    pub device_stats: Vec<DeviceStatistic>,
    #[serde(deserialize_with = "crate::stats::nan_from_null")]
    pub global_mean: f64,
    #[serde(deserialize_with = "crate::stats::nan_from_null")]
    pub global_sd: f64,
    #[serde(deserialize_with = "crate::stats::nan_from_null")]
    pub global_cv: f64,
    /// Pooled CV% exceeds [`QcConfig::global_cv_warning`].
    pub cv_warning: bool,
}

/// Mean, SD and CV% of a set of values.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Moments {
    pub mean: f64,
    pub sd: f64,
    pub cv: f64,
}

impl Moments {
    pub(crate) fn of(values: &[f64], dispersion: Dispersion) -> Self {
        let mean = stats::mean(values);
        let sd = dispersion.std_dev(values);
        Self {
            mean,
            sd,
            cv: stats::cv_percent(sd, mean),
        }
    }
}

/// Numeric readings grouped by device, in first-seen device order.
///
/// A device whose readings are all non-numeric is kept with no values.
pub(crate) fn values_by_device(records: &[MeasurementRecord]) -> Vec<(String, Vec<f64>)> {
    let mut groups: Vec<(String, Vec<f64>)> = Vec::new();
    for rec in records {
        let slot = match groups.iter().position(|(d, _)| *d == rec.device_id) {
            Some(slot) => slot,
            None => {
                groups.push((rec.device_id.clone(), Vec::new()));
                groups.len() - 1
            }
        };
        if let Some(v) = rec.value() {
            groups[slot].1.push(v);
        }
    }
    groups
}

/// Summarizes readings per device and over the pooled readings.
///
/// The global figures come from the raw pooled values, not from the
/// per-device means. Sparse devices yield `NaN` fields.
pub fn summarize_devices(records: &[MeasurementRecord], config: &QcConfig) -> DeviceSummary {
    let groups = values_by_device(records);

    let device_stats: Vec<DeviceStatistic> = groups
        .iter()
        .map(|(device, values)| {
            let m = Moments::of(values, config.dispersion);
            DeviceStatistic {
                device: device.clone(),
                mean: m.mean,
                sd: m.sd,
                cv: m.cv,
                count: values.len(),
            }
        })
        .collect();

    let pooled: Vec<f64> = records.iter().filter_map(MeasurementRecord::value).collect();
    let global = Moments::of(&pooled, config.dispersion);
    debug!(
        "summary: {} device(s), {} numeric of {} row(s)",
        device_stats.len(),
        pooled.len(),
        records.len()
    );

    DeviceSummary {
        device_count: device_stats.len(),
        device_stats,
        global_mean: global.mean,
        global_sd: global.sd,
        global_cv: global.cv,
        cv_warning: global.cv > config.global_cv_warning,
    }
}
