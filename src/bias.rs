//! Bias engines: how far each device, and each reading, sits from consensus.
//!
//! - [`calculate_device_bias`] compares each device mean with the pooled mean
//!   of every numeric reading in the upload.
//! - [`calculate_sample_bias`] compares each reading with the mean of all
//!   devices on the same specimen.
//!
//! Percent bias is `100 · bias / reference` and is `NaN` when the reference
//! is zero or not finite. `NaN` never raises a flag.
//!
//! # Examples
//!
//! ```
//! use poct_qc::{calculate_sample_bias, MeasurementRecord, QcConfig};
//!
//! let rows = vec![
//!     MeasurementRecord::new("A", "Glu", Some("S1"), "", 10.0),
//!     MeasurementRecord::new("B", "Glu", Some("S1"), "", 12.0),
//!     MeasurementRecord::new("C", "Glu", Some("S1"), "", 14.0),
//! ];
//! let rows = calculate_sample_bias(&rows, &QcConfig::default()).unwrap();
//! let biases: Vec<f64> = rows.iter().map(|r| r.bias).collect();
//! assert_eq!(biases, [-2.0, 0.0, 2.0]);
//! ```

use log::debug;
use serde::{Deserialize, Serialize};

use crate::config::QcConfig;
use crate::error::Result;
use crate::pivot::SamplePivot;
use crate::record::MeasurementRecord;
use crate::stats::{self, percent_of};
use crate::summary::values_by_device;

/// Bias of one device against the pooled mean.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceBias {
    pub device: String,
    /// Mean of the device's readings.
    #[serde(deserialize_with = "crate::stats::nan_from_null")]
    pub measured: f64,
    /// Mean of every numeric reading in the upload.
    #[serde(deserialize_with = "crate::stats::nan_from_null")]
    pub group_mean: f64,
    #[serde(deserialize_with = "crate::stats::nan_from_null")]
    pub bias: f64,
    #[serde(deserialize_with = "crate::stats::nan_from_null")]
    pub percent_bias: f64,
    pub flagged: bool,
}

/// Bias of one reading against its sample's cross-device mean.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleBias {
    pub sample_id: String,
    pub device: String,
    #[serde(deserialize_with = "crate::stats::nan_from_null")]
    pub measured: f64,
    #[serde(deserialize_with = "crate::stats::nan_from_null")]
    pub sample_mean: f64,
    #[serde(deserialize_with = "crate::stats::nan_from_null")]
    pub bias: f64,
    #[serde(deserialize_with = "crate::stats::nan_from_null")]
    pub percent_bias: f64,
    pub flagged: bool,
}

/// `|value| > limit`, false for `NaN`.
fn exceeds(value: f64, limit: f64) -> bool {
    value.abs() > limit
}

/// Per-device bias against the pooled mean, in first-seen device order.
///
/// A device is flagged when `|percent_bias|` exceeds
/// [`QcConfig::percent_bias_threshold`]. Devices without numeric readings
/// get `NaN` figures.
pub fn calculate_device_bias(records: &[MeasurementRecord], config: &QcConfig) -> Vec<DeviceBias> {
    let pooled: Vec<f64> = records.iter().filter_map(MeasurementRecord::value).collect();
    let group_mean = stats::mean(&pooled);

    let rows: Vec<DeviceBias> = values_by_device(records)
        .into_iter()
        .map(|(device, values)| {
            let measured = stats::mean(&values);
            let bias = measured - group_mean;
            let percent_bias = percent_of(bias, group_mean);
            DeviceBias {
                device,
                measured,
                group_mean,
                bias,
                percent_bias,
                flagged: exceeds(percent_bias, config.percent_bias_threshold),
            }
        })
        .collect();

    let flagged = rows.iter().filter(|r| r.flagged).count();
    debug!("device bias: {} device(s), {} flagged", rows.len(), flagged);
    rows
}

/// Per-reading bias over an existing pivot.
///
/// Samples are visited in pivot order and readings in device column order.
/// A row is flagged when `|percent_bias|` exceeds the percent threshold or
/// `|bias|` exceeds [`QcConfig::absolute_bias_threshold`].
pub fn sample_bias_from_pivot(pivot: &SamplePivot, config: &QcConfig) -> Vec<SampleBias> {
    let mut rows = Vec::new();
    for sample in &pivot.samples {
        let readings: Vec<(&str, f64)> = pivot
            .devices
            .iter()
            .filter_map(|d| sample.get(d).map(|v| (d.as_str(), v)))
            .collect();
        if readings.is_empty() {
            continue;
        }
        let values: Vec<f64> = readings.iter().map(|&(_, v)| v).collect();
        let sample_mean = stats::mean(&values);

        for (device, measured) in readings {
            let bias = measured - sample_mean;
            let percent_bias = percent_of(bias, sample_mean);
            rows.push(SampleBias {
                sample_id: sample.sample_id.clone(),
                device: device.to_owned(),
                measured,
                sample_mean,
                bias,
                percent_bias,
                flagged: exceeds(percent_bias, config.percent_bias_threshold)
                    || exceeds(bias, config.absolute_bias_threshold),
            });
        }
    }
    debug!(
        "sample bias: {} reading(s), {} flagged",
        rows.len(),
        rows.iter().filter(|r| r.flagged).count()
    );
    rows
}

/// Pivots `records` and computes per-reading bias.
///
/// # Errors
///
/// Fails only when the pivot does, see [`SamplePivot::from_records`].
pub fn calculate_sample_bias(
    records: &[MeasurementRecord],
    config: &QcConfig,
) -> Result<Vec<SampleBias>> {
    let pivot = SamplePivot::from_records(records, config.duplicate_policy)?;
    Ok(sample_bias_from_pivot(&pivot, config))
}
