//! Sample pivot: one row per specimen, one column per device.
//!
//! Cross-device statistics need readings of the *same* specimen side by
//! side. [`SamplePivot::from_records`] groups the flat measurement rows by
//! sample id and keeps, per sample, one numeric cell per device.
//!
//! # Ordering
//!
//! - Samples appear in first-seen order.
//! - The device column list is the union of devices over all samples, in
//!   first-seen order. A device that only shows up late in the upload is
//!   still a column.
//!
//! # Examples
//!
//! ```
//! use poct_qc::{DuplicatePolicy, MeasurementRecord, SamplePivot};
//!
//! let rows = vec![
//!     MeasurementRecord::new("A", "Glu", Some("S1"), "2024-01-01", 5.0),
//!     MeasurementRecord::new("B", "Glu", Some("S1"), "2024-01-01", 5.4),
//!     MeasurementRecord::new("A", "Glu", Some("S2"), "2024-01-01", 7.1),
//! ];
//! let pivot = SamplePivot::from_records(&rows, DuplicatePolicy::Average).unwrap();
//! assert_eq!(pivot.devices, vec!["A", "B"]);
//! assert_eq!(pivot.samples[0].get("B"), Some(5.4));
//! assert_eq!(pivot.samples[1].get("B"), None);
//! ```

use std::collections::{BTreeMap, HashMap};

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::config::DuplicatePolicy;
use crate::error::{QcError, Result};
use crate::record::MeasurementRecord;

/// One specimen with the reading of every device that measured it.
///
/// Serializes flat, as `{"sample_id": "S1", "A": 5.0, "B": 5.4}`. A device
/// may therefore not be called [`SAMPLE_ID_KEY`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PivotedSample {
    pub sample_id: String,
    /// Device id → numeric reading. Devices without a reading are absent.
    #[serde(flatten)]
    pub values: BTreeMap<String, f64>,
}

impl PivotedSample {
    /// Reading of `device` for this sample, if any.
    pub fn get(&self, device: &str) -> Option<f64> {
        self.values.get(device).copied()
    }
}

/// Pivoted samples plus the device column order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SamplePivot {
    /// Union of devices across all samples, first-seen order.
    pub devices: Vec<String>,
    /// Samples in first-seen order.
    pub samples: Vec<PivotedSample>,
}

/// Key of the sample id in a serialized [`PivotedSample`]; reserved as a
/// device id.
pub const SAMPLE_ID_KEY: &str = "sample_id";

/// Id used for a row without a sample id: `row_<index>`.
pub fn synthesized_sample_id(index: usize) -> String {
    format!("row_{index}")
}

/// Per-sample accumulation before the duplicate policy is applied.
struct Cell {
    sum: f64,
    count: usize,
    last: f64,
}

impl SamplePivot {
    /// Pivots measurement rows by sample id.
    ///
    /// Rows without a sample id get `row_<index>` from their position in
    /// `records`. Rows whose value is not numeric register their sample but
    /// contribute no cell.
    ///
    /// # Errors
    ///
    /// - [`QcError::DuplicateMeasurement`] when a (sample, device) pair
    ///   repeats and `policy` is [`DuplicatePolicy::Reject`].
    /// - [`QcError::InvalidArgument`] when a device id is [`SAMPLE_ID_KEY`].
    pub fn from_records(records: &[MeasurementRecord], policy: DuplicatePolicy) -> Result<Self> {
        let mut order: Vec<String> = Vec::new();
        let mut index: HashMap<String, usize> = HashMap::new();
        let mut cells: Vec<BTreeMap<String, Cell>> = Vec::new();
        let mut devices: Vec<String> = Vec::new();
        let mut skipped = 0_usize;

        for (i, rec) in records.iter().enumerate() {
            if rec.device_id == SAMPLE_ID_KEY {
                return Err(QcError::InvalidArgument(format!(
                    "row {i}: device id '{SAMPLE_ID_KEY}' is reserved"
                )));
            }
            let sample_id = rec
                .sample_id
                .clone()
                .unwrap_or_else(|| synthesized_sample_id(i));
            let slot = *index.entry(sample_id.clone()).or_insert_with(|| {
                order.push(sample_id.clone());
                cells.push(BTreeMap::new());
                order.len() - 1
            });

            let Some(value) = rec.value() else {
                skipped += 1;
                continue;
            };

            if !devices.contains(&rec.device_id) {
                devices.push(rec.device_id.clone());
            }

            match cells[slot].get_mut(&rec.device_id) {
                None => {
                    cells[slot].insert(
                        rec.device_id.clone(),
                        Cell {
                            sum: value,
                            count: 1,
                            last: value,
                        },
                    );
                }
                Some(cell) => {
                    if policy == DuplicatePolicy::Reject {
                        return Err(QcError::DuplicateMeasurement {
                            sample_id,
                            device: rec.device_id.clone(),
                        });
                    }
                    warn!(
                        "duplicate reading for sample '{sample_id}' on device '{}' ({policy:?})",
                        rec.device_id
                    );
                    cell.sum += value;
                    cell.count += 1;
                    cell.last = value;
                }
            }
        }

        if skipped > 0 {
            debug!("pivot: {skipped} row(s) without a numeric value");
        }

        let samples = order
            .into_iter()
            .zip(cells)
            .map(|(sample_id, row)| PivotedSample {
                sample_id,
                values: row
                    .into_iter()
                    .map(|(device, cell)| {
                        let value = match policy {
                            DuplicatePolicy::LastWriteWins => cell.last,
                            _ => cell.sum / cell.count as f64,
                        };
                        (device, value)
                    })
                    .collect(),
            })
            .collect();

        Ok(Self { devices, samples })
    }

    /// Expands the pivot back into one record per cell.
    ///
    /// Only `device_id`, `sample_id` and `measured_value` are populated.
    pub fn to_records(&self) -> Vec<MeasurementRecord> {
        self.samples
            .iter()
            .flat_map(|sample| {
                self.devices.iter().filter_map(move |device| {
                    sample.get(device).map(|value| {
                        MeasurementRecord::new(
                            device.as_str(),
                            "",
                            Some(sample.sample_id.as_str()),
                            "",
                            value,
                        )
                    })
                })
            })
            .collect()
    }

    /// Number of samples.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Whether no sample was observed.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Unordered device pairs `(i, j)` with `i < j` over the column list.
    pub fn device_pairs(&self) -> impl Iterator<Item = (&str, &str)> + '_ {
        self.devices.iter().enumerate().flat_map(move |(i, a)| {
            self.devices[i + 1..]
                .iter()
                .map(move |b| (a.as_str(), b.as_str()))
        })
    }

    /// Paired readings of two devices over the samples that have both.
    pub fn overlap<'a>(
        &'a self,
        device_a: &'a str,
        device_b: &'a str,
    ) -> impl Iterator<Item = (&'a str, f64, f64)> + 'a {
        self.samples.iter().filter_map(move |s| {
            Some((s.sample_id.as_str(), s.get(device_a)?, s.get(device_b)?))
        })
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn pivot_round_trip(
            cells in proptest::collection::btree_map(
                (0u8..8, 0u8..5),
                -1e3_f64..1e3,
                0..40,
            )
        ) {
            // Unique (sample, device) keys by construction.
            let rows: Vec<MeasurementRecord> = cells
                .iter()
                .map(|(&(s, d), &v)| {
                    MeasurementRecord::new(format!("D{d}"), "", Some(format!("S{s}").as_str()), "", v)
                })
                .collect();
            let first = SamplePivot::from_records(&rows, DuplicatePolicy::Reject).unwrap();
            let second =
                SamplePivot::from_records(&first.to_records(), DuplicatePolicy::Reject).unwrap();
            prop_assert_eq!(first.samples, second.samples);
        }
    }
}
