//! Method comparison: agreement plus linearity for each device pair.
//!
//! A verification study asks two questions of the same paired readings:
//! do the devices agree (Bland–Altman bias and limits) and are they linearly
//! related (Pearson r, OLS slope and intercept). Both views are computed
//! from a single scan of the sample pivot per pair.
//!
//! # Examples
//!
//! ```
//! use poct_qc::{compute_method_comparison, MeasurementRecord, QcConfig};
//!
//! let rows: Vec<MeasurementRecord> = [(1.0, 2.0), (2.0, 4.0), (3.0, 6.0)]
//!     .iter()
//!     .enumerate()
//!     .flat_map(|(i, &(a, b))| {
//!         let id = format!("S{i}");
//!         vec![
//!             MeasurementRecord::new("Ref", "Hb", Some(id.as_str()), "", a),
//!             MeasurementRecord::new("POC", "Hb", Some(id.as_str()), "", b),
//!         ]
//!     })
//!     .collect();
//! let method = compute_method_comparison(&rows, &QcConfig::default()).unwrap();
//! let pair = method.get("Ref vs POC").unwrap();
//! assert!((pair.correlation - 1.0).abs() < 1e-10);
//! assert!((pair.slope - 2.0).abs() < 1e-10);
//! ```

use log::debug;
use serde::{Deserialize, Serialize};

use crate::agreement::{by_label, AgreementPair};
use crate::config::QcConfig;
use crate::correlation::pearson_correlation;
use crate::error::Result;
use crate::pivot::SamplePivot;
use crate::record::MeasurementRecord;
use crate::regression::linear_regression;

/// Agreement and regression results for one device pair.
///
/// Regression is of device b (y) on device a (x).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodComparisonPair {
    #[serde(flatten)]
    pub agreement: AgreementPair,
    /// Pearson r
    #[serde(deserialize_with = "crate::stats::nan_from_null")]
    pub correlation: f64,
    #[serde(deserialize_with = "crate::stats::nan_from_null")]
    pub slope: f64,
    #[serde(deserialize_with = "crate::stats::nan_from_null")]
    pub intercept: f64,
    /// correlation²
    #[serde(deserialize_with = "crate::stats::nan_from_null")]
    pub r2: f64,
}

impl MethodComparisonPair {
    /// Compares `device_a` against `device_b` over the pivot.
    pub fn from_pivot(
        pivot: &SamplePivot,
        device_a: &str,
        device_b: &str,
        config: &QcConfig,
    ) -> Result<Self> {
        let agreement = AgreementPair::from_pivot(pivot, device_a, device_b, config.loa_z);
        let xs = agreement.xs();
        let ys = agreement.ys();
        let correlation = pearson_correlation(&xs, &ys)?;
        let fit = linear_regression(&xs, &ys)?;
        Ok(Self {
            agreement,
            correlation,
            slope: fit.slope,
            intercept: fit.intercept,
            r2: correlation * correlation,
        })
    }

    /// `"<a> vs <b>"`
    pub fn label(&self) -> &str {
        &self.agreement.label
    }

    /// Number of paired readings.
    pub fn n(&self) -> usize {
        self.agreement.stats.n
    }
}

impl by_label::Labelled for MethodComparisonPair {
    fn label(&self) -> &str {
        &self.agreement.label
    }
}

/// Method comparison for every device pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodComparison {
    /// Serialized as an object keyed by pair label.
    #[serde(with = "by_label")]
    pub pairs: Vec<MethodComparisonPair>,
}

impl MethodComparison {
    /// Runs the comparison on an existing pivot.
    pub fn from_pivot(pivot: &SamplePivot, config: &QcConfig) -> Result<Self> {
        let pairs = pivot
            .device_pairs()
            .map(|(a, b)| MethodComparisonPair::from_pivot(pivot, a, b, config))
            .collect::<Result<Vec<_>>>()?;
        debug!("method comparison: {} pair(s)", pairs.len());
        Ok(Self { pairs })
    }

    /// Pair by its `"<a> vs <b>"` label.
    pub fn get(&self, label: &str) -> Option<&MethodComparisonPair> {
        self.pairs.iter().find(|p| p.label() == label)
    }
}

/// Pivots `records` and runs the method comparison on every device pair.
pub fn compute_method_comparison(
    records: &[MeasurementRecord],
    config: &QcConfig,
) -> Result<MethodComparison> {
    let pivot = SamplePivot::from_records(records, config.duplicate_policy)?;
    MethodComparison::from_pivot(&pivot, config)
}
