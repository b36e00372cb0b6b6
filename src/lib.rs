//! # poct-qc
//!
//! Quality-control statistics for point-of-care testing (POCT) devices:
//! how well several analyzers agree on the same specimens, how precise each
//! one is over time, and how far each sits from consensus.
//!
//! Every engine is a pure function of a slice of [`MeasurementRecord`] rows
//! and a [`QcConfig`]. Sparse or non-numeric data degrades to `NaN`
//! statistics; only caller-contract violations return a [`QcError`].
//!
//! ## Modules
//!
//! - [`stats`] — Mean, sample/population SD, CV%, mean absolute deviation, moving average
//! - [`correlation`] — Pearson correlation and R²
//! - [`regression`] — Simple OLS linear regression
//! - [`pivot`] — Flat rows → one row per sample, one column per device
//! - [`summary`] — Per-device and pooled mean/SD/CV%
//! - [`agreement`] — Pairwise Bland–Altman bias and limits of agreement
//! - [`method`] — Method comparison (agreement + correlation + regression)
//! - [`precision`] — Per device/analyte repeatability, Levey–Jennings charts, Westgard rules
//! - [`bias`] — Device bias vs. pooled mean, reading bias vs. sample mean
//! - [`report`] — All engines in one call
//!
//! ## Design Philosophy
//!
//! - **Stateless**: no shared mutable state, results are plain data
//! - **Numerical stability**: Leverages `u-numflow` for stable statistics
//! - **Serializable**: every result derives `serde`; `NaN` becomes `null`
//!
//! ## Example
//!
//! ```
//! use poct_qc::{analyze, MeasurementRecord, QcConfig};
//!
//! let rows: Vec<MeasurementRecord> = serde_json::from_str(r#"[
//!     {"device_id":"A","analyte":"Glu","sample_id":"S1","test_date":"2024-01-01","measured_value":"5.1"},
//!     {"device_id":"B","analyte":"Glu","sample_id":"S1","test_date":"2024-01-01","measured_value":5.3}
//! ]"#).unwrap();
//! let report = analyze(&rows, &QcConfig::default()).unwrap();
//! let pair = &report.agreement[0];
//! assert_eq!(pair.label, "A vs B");
//! assert!((pair.stats.bias + 0.2).abs() < 1e-9);
//! ```

pub mod agreement;
pub mod bias;
pub mod config;
pub mod correlation;
pub mod error;
pub mod method;
pub mod pivot;
pub mod precision;
pub mod record;
pub mod regression;
pub mod report;
pub mod stats;
pub mod summary;

pub use agreement::{bland_altman, compute_inter_device_agreement, BlandAltman, InterDeviceAgreement};
pub use bias::{calculate_device_bias, calculate_sample_bias, DeviceBias, SampleBias};
pub use config::{DuplicatePolicy, PrecisionOrder, QcConfig};
pub use error::{QcError, Result};
pub use method::{compute_method_comparison, MethodComparison};
pub use pivot::SamplePivot;
pub use precision::{compute_precision_stats, PrecisionGroup};
pub use record::MeasurementRecord;
pub use report::{analyze, QcReport};
pub use summary::{summarize_devices, DeviceSummary};
