//! One-call analysis of an upload.

use log::info;
use serde::{Deserialize, Serialize};

use crate::agreement::{by_label, AgreementPair, InterDeviceAgreement};
use crate::bias::{calculate_device_bias, sample_bias_from_pivot, DeviceBias, SampleBias};
use crate::config::QcConfig;
use crate::error::Result;
use crate::method::{MethodComparison, MethodComparisonPair};
use crate::pivot::SamplePivot;
use crate::precision::{compute_precision_stats, PrecisionGroup};
use crate::record::MeasurementRecord;
use crate::summary::{summarize_devices, DeviceSummary};

/// Every engine's output for one set of rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QcReport {
    /// Rows supplied.
    pub record_count: usize,
    /// Rows with a numeric measurement.
    pub numeric_count: usize,
    pub summary: DeviceSummary,
    pub pivot: SamplePivot,
    /// Bland–Altman per device pair, keyed by pair label when serialized.
    #[serde(with = "by_label")]
    pub agreement: Vec<AgreementPair>,
    #[serde(with = "by_label")]
    pub method_comparison: Vec<MethodComparisonPair>,
    pub precision: Vec<PrecisionGroup>,
    pub device_bias: Vec<DeviceBias>,
    pub sample_bias: Vec<SampleBias>,
}

impl QcReport {
    /// Serializes the report; `NaN` figures become `null`.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Precision groups whose Levey–Jennings chart rejected the run.
    pub fn out_of_control(&self) -> impl Iterator<Item = &PrecisionGroup> {
        self.precision.iter().filter(|g| !g.chart.in_control)
    }
}

/// Runs every engine over `records`.
///
/// The sample pivot is built once and shared by the cross-device engines.
///
/// # Errors
///
/// - [`QcError::InvalidConfig`](crate::QcError::InvalidConfig) when `config`
///   fails validation
/// - [`QcError::DuplicateMeasurement`](crate::QcError::DuplicateMeasurement)
///   under [`DuplicatePolicy::Reject`](crate::DuplicatePolicy::Reject)
///
/// # Examples
///
/// ```
/// use poct_qc::{analyze, MeasurementRecord, QcConfig};
///
/// let rows = vec![
///     MeasurementRecord::new("A", "Glu", Some("S1"), "2024-01-01", 5.0),
///     MeasurementRecord::new("B", "Glu", Some("S1"), "2024-01-01", 5.2),
///     MeasurementRecord::new("A", "Glu", Some("S2"), "2024-01-02", 6.0),
///     MeasurementRecord::new("B", "Glu", Some("S2"), "2024-01-02", 6.4),
/// ];
/// let report = analyze(&rows, &QcConfig::default()).unwrap();
/// assert_eq!(report.summary.device_count, 2);
/// assert_eq!(report.agreement.len(), 1);
/// assert_eq!(report.precision.len(), 2);
/// assert_eq!(report.sample_bias.len(), 4);
/// ```
pub fn analyze(records: &[MeasurementRecord], config: &QcConfig) -> Result<QcReport> {
    config.validate()?;

    let pivot = SamplePivot::from_records(records, config.duplicate_policy)?;
    let summary = summarize_devices(records, config);
    let method = MethodComparison::from_pivot(&pivot, config)?;
    let agreement = method.pairs.iter().map(|p| p.agreement.clone()).collect();
    let precision = compute_precision_stats(records, config)?;
    let device_bias = calculate_device_bias(records, config);
    let sample_bias = sample_bias_from_pivot(&pivot, config);

    let report = QcReport {
        record_count: records.len(),
        numeric_count: records.iter().filter(|r| r.value().is_some()).count(),
        summary,
        pivot,
        agreement,
        method_comparison: method.pairs,
        precision,
        device_bias,
        sample_bias,
    };

    info!(
        "qc analysis: {} row(s), {} numeric, {} sample(s), {} device(s), {} pair(s), {} precision group(s), {} out of control",
        report.record_count,
        report.numeric_count,
        report.pivot.len(),
        report.summary.device_count,
        report.agreement.len(),
        report.precision.len(),
        report.out_of_control().count()
    );
    Ok(report)
}

/// Agreement view of a report, for callers that only want Bland–Altman.
impl From<&QcReport> for InterDeviceAgreement {
    fn from(report: &QcReport) -> Self {
        InterDeviceAgreement {
            pairs: report.agreement.clone(),
            pivot: report.pivot.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DuplicatePolicy;
    use crate::QcError;

    fn rec(device: &str, sample: &str, date: &str, value: f64) -> MeasurementRecord {
        MeasurementRecord::new(device, "Glu", Some(sample), date, value)
    }

    fn upload() -> Vec<MeasurementRecord> {
        vec![
            rec("A", "S1", "2024-01-01", 10.0),
            rec("B", "S1", "2024-01-01", 12.0),
            rec("A", "S2", "2024-01-02", 8.0),
            rec("B", "S2", "2024-01-02", 8.0),
            rec("A", "S3", "2024-01-03", 6.0),
            rec("B", "S3", "2024-01-03", 7.0),
            MeasurementRecord::from_text("C", "Glu", "S3", "2024-01-03", "ERR", ""),
        ]
    }

    #[test]
    fn bundles_every_engine() {
        let report = analyze(&upload(), &QcConfig::default()).unwrap();
        assert_eq!(report.record_count, 7);
        assert_eq!(report.numeric_count, 6);
        assert_eq!(report.pivot.len(), 3);
        assert_eq!(report.summary.device_count, 3);
        assert_eq!(report.agreement.len(), 1);
        assert_eq!(report.method_comparison.len(), 1);
        assert_eq!(report.agreement[0], report.method_comparison[0].agreement);
        assert!((report.agreement[0].stats.bias + 1.0).abs() < 1e-12);
        assert_eq!(report.precision.len(), 2);
        assert_eq!(report.device_bias.len(), 3);
        assert_eq!(report.sample_bias.len(), 6);
    }

    #[test]
    fn rejects_invalid_config() {
        let config = QcConfig {
            loa_z: -1.0,
            ..QcConfig::default()
        };
        assert!(matches!(
            analyze(&upload(), &config),
            Err(QcError::InvalidConfig(_))
        ));
    }

    #[test]
    fn reject_policy_propagates() {
        let mut rows = upload();
        rows.push(rec("A", "S1", "2024-01-04", 10.5));
        let config = QcConfig {
            duplicate_policy: DuplicatePolicy::Reject,
            ..QcConfig::default()
        };
        assert!(matches!(
            analyze(&rows, &config),
            Err(QcError::DuplicateMeasurement { .. })
        ));
    }

    #[test]
    fn empty_upload() {
        let report = analyze(&[], &QcConfig::default()).unwrap();
        assert_eq!(report.record_count, 0);
        assert!(report.pivot.is_empty());
        assert!(report.agreement.is_empty());
        assert!(report.precision.is_empty());
        assert!(report.summary.global_mean.is_nan());
    }

    #[test]
    fn json_nan_as_null() {
        let rows = vec![rec("A", "S1", "2024-01-01", 5.0)];
        let report = analyze(&rows, &QcConfig::default()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();
        assert!(value["summary"]["global_sd"].is_null());
        assert_eq!(value["precision"][0]["key"], "A-Glu");
    }

    #[test]
    fn json_reads_back() {
        let rows = vec![rec("A", "S1", "2024-01-01", 5.0)];
        let report = analyze(&rows, &QcConfig::default()).unwrap();
        let json = report.to_json().unwrap();
        let back: QcReport = serde_json::from_str(&json).unwrap();
        assert!(back.summary.global_sd.is_nan());
        assert!(back.precision[0].sd.is_nan());
        assert!(back.precision[0].chart.limits.plus_2sd.is_nan());
        assert_eq!(back.to_json().unwrap(), json);
    }

    #[test]
    fn pairs_keyed_by_label_in_json() {
        let report = analyze(&upload(), &QcConfig::default()).unwrap();
        let json = report.to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["agreement"]["A vs B"]["n"], 3);
        assert_eq!(value["method_comparison"]["A vs B"]["label"], "A vs B");

        let back: QcReport = serde_json::from_str(&json).unwrap();
        assert_eq!(back.agreement.len(), 1);
        assert_eq!(back.method_comparison[0].label(), "A vs B");
        assert_eq!(back.sample_bias.len(), report.sample_bias.len());
    }

    #[test]
    fn agreement_view() {
        let report = analyze(&upload(), &QcConfig::default()).unwrap();
        let view = InterDeviceAgreement::from(&report);
        assert!(view.get("A vs B").is_some());
        assert_eq!(view.pivot.devices, ["A", "B"]);
    }
}
