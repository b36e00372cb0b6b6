//! Pairwise inter-device agreement (Bland–Altman).
//!
//! For every unordered pair of devices in the sample pivot, the readings of
//! the specimens both devices measured are compared: per-sample mean and
//! difference, then the bias (mean difference), the SD of the differences,
//! and the limits of agreement bias ± z·SD.
//!
//! # References
//!
//! Bland & Altman (1986). "Statistical methods for assessing agreement
//! between two methods of clinical measurement". The Lancet, 327(8476),
//! 307–310.
//!
//! # Examples
//!
//! ```
//! use poct_qc::{compute_inter_device_agreement, MeasurementRecord, QcConfig};
//!
//! let rows = vec![
//!     MeasurementRecord::new("A", "Glu", Some("S1"), "", 10.0),
//!     MeasurementRecord::new("B", "Glu", Some("S1"), "", 12.0),
//!     MeasurementRecord::new("A", "Glu", Some("S2"), "", 8.0),
//!     MeasurementRecord::new("B", "Glu", Some("S2"), "", 8.0),
//! ];
//! let agreement = compute_inter_device_agreement(&rows, &QcConfig::default()).unwrap();
//! let pair = agreement.get("A vs B").unwrap();
//! assert_eq!(pair.stats.n, 2);
//! assert!((pair.stats.bias + 1.0).abs() < 1e-12);
//! ```

use log::debug;
use serde::{Deserialize, Serialize};

use crate::config::QcConfig;
use crate::error::{ensure_same_len, Result};
use crate::pivot::SamplePivot;
use crate::record::MeasurementRecord;
use crate::stats::{mean, sample_std_dev};

/// Bland–Altman summary of a set of paired differences.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BlandAltman {
    /// Mean difference (a − b).
    #[serde(deserialize_with = "crate::stats::nan_from_null")]
    pub bias: f64,
    /// Sample SD of the differences.
    #[serde(deserialize_with = "crate::stats::nan_from_null")]
    pub sd: f64,
    /// bias − z·sd
    #[serde(rename = "loaLower")]
    #[serde(deserialize_with = "crate::stats::nan_from_null")]
    pub loa_lower: f64,
    /// bias + z·sd
    #[serde(rename = "loaUpper")]
    #[serde(deserialize_with = "crate::stats::nan_from_null")]
    pub loa_upper: f64,
    /// Number of paired readings.
    pub n: usize,
}

impl BlandAltman {
    /// Summarizes differences with limits at bias ± `z`·sd.
    ///
    /// Empty input gives `NaN` bias and limits; a single difference gives a
    /// finite bias and `NaN` SD and limits.
    pub fn from_diffs(diffs: &[f64], z: f64) -> Self {
        let bias = mean(diffs);
        let sd = sample_std_dev(diffs);
        Self {
            bias,
            sd,
            loa_lower: bias - z * sd,
            loa_upper: bias + z * sd,
            n: diffs.len(),
        }
    }
}

/// Bland–Altman analysis of two equal-length measurement series.
///
/// # Errors
///
/// [`QcError::LengthMismatch`](crate::QcError::LengthMismatch) if the series
/// differ in length.
///
/// # Examples
///
/// ```
/// use poct_qc::agreement::bland_altman;
///
/// let ba = bland_altman(&[10.0, 8.0, 14.0], &[12.0, 8.0, 13.0], 1.96).unwrap();
/// assert!((ba.bias + 1.0 / 3.0).abs() < 1e-12);
/// assert!(ba.loa_lower < ba.bias && ba.bias < ba.loa_upper);
/// ```
pub fn bland_altman(a: &[f64], b: &[f64], z: f64) -> Result<BlandAltman> {
    ensure_same_len(a, b)?;
    let diffs: Vec<f64> = a.iter().zip(b).map(|(x, y)| x - y).collect();
    Ok(BlandAltman::from_diffs(&diffs, z))
}

/// One specimen in a device-pair comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgreementPoint {
    pub sample_id: String,
    /// (a + b) / 2
    #[serde(deserialize_with = "crate::stats::nan_from_null")]
    pub mean: f64,
    /// a − b
    #[serde(deserialize_with = "crate::stats::nan_from_null")]
    pub diff: f64,
    #[serde(deserialize_with = "crate::stats::nan_from_null")]
    pub a: f64,
    #[serde(deserialize_with = "crate::stats::nan_from_null")]
    pub b: f64,
}

/// Agreement between two devices over the specimens both measured.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgreementPair {
    /// `"<device_a> vs <device_b>"`
    pub label: String,
    pub device_a: String,
    pub device_b: String,
    pub data: Vec<AgreementPoint>,
    #[serde(flatten)]
    pub stats: BlandAltman,
}

/// Label of a device pair, `"<a> vs <b>"`.
pub fn pair_label(device_a: &str, device_b: &str) -> String {
    format!("{device_a} vs {device_b}")
}

impl AgreementPair {
    /// Compares `device_a` against `device_b` over the pivot.
    ///
    /// Samples lacking either reading are skipped. A pair with no overlap is
    /// still returned, with `n = 0` and `NaN` statistics.
    pub fn from_pivot(pivot: &SamplePivot, device_a: &str, device_b: &str, z: f64) -> Self {
        let data: Vec<AgreementPoint> = pivot
            .overlap(device_a, device_b)
            .map(|(sample_id, a, b)| AgreementPoint {
                sample_id: sample_id.to_owned(),
                mean: (a + b) / 2.0,
                diff: a - b,
                a,
                b,
            })
            .collect();
        let diffs: Vec<f64> = data.iter().map(|p| p.diff).collect();
        let stats = BlandAltman::from_diffs(&diffs, z);
        if stats.n == 0 {
            debug!("agreement: '{device_a}' and '{device_b}' share no sample");
        }
        Self {
            label: pair_label(device_a, device_b),
            device_a: device_a.to_owned(),
            device_b: device_b.to_owned(),
            data,
            stats,
        }
    }

    /// Device-a readings, in sample order.
    pub fn xs(&self) -> Vec<f64> {
        self.data.iter().map(|p| p.a).collect()
    }

    /// Device-b readings, in sample order.
    pub fn ys(&self) -> Vec<f64> {
        self.data.iter().map(|p| p.b).collect()
    }
}

impl by_label::Labelled for AgreementPair {
    fn label(&self) -> &str {
        &self.label
    }
}

/// Serde adapter writing a pair list as a JSON object keyed by pair label.
///
/// Keys keep list order on output, and reading back keeps document order.
pub(crate) mod by_label {
    use std::fmt;
    use std::marker::PhantomData;

    use serde::de::{MapAccess, Visitor};
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// A result that carries its `"<a> vs <b>"` label.
    pub(crate) trait Labelled {
        fn label(&self) -> &str;
    }

    pub(crate) fn serialize<S, T>(pairs: &[T], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
        T: Serialize + Labelled,
    {
        serializer.collect_map(pairs.iter().map(|p| (p.label(), p)))
    }

    struct PairsVisitor<T>(PhantomData<T>);

    impl<'de, T: Deserialize<'de>> Visitor<'de> for PairsVisitor<T> {
        type Value = Vec<T>;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("a map of device-pair label to result")
        }

        fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
            let mut pairs = Vec::with_capacity(map.size_hint().unwrap_or(0));
            while let Some((_, pair)) = map.next_entry::<String, T>()? {
                pairs.push(pair);
            }
            Ok(pairs)
        }
    }

    pub(crate) fn deserialize<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
    where
        D: Deserializer<'de>,
        T: Deserialize<'de>,
    {
        deserializer.deserialize_map(PairsVisitor(PhantomData))
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Bland–Altman results for every device pair, plus the pivot they came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterDeviceAgreement {
    /// One entry per unordered pair, in pivot column order. Serialized as an
    /// object keyed by pair label.
    #[serde(with = "by_label")]
    pub pairs: Vec<AgreementPair>,
    pub pivot: SamplePivot,
}

impl InterDeviceAgreement {
    /// Runs the pairwise comparison on an existing pivot.
    ///
    /// With `d` device columns this yields exactly `d·(d−1)/2` pairs.
    pub fn from_pivot(pivot: SamplePivot, config: &QcConfig) -> Self {
        let pairs: Vec<AgreementPair> = pivot
            .device_pairs()
            .map(|(a, b)| AgreementPair::from_pivot(&pivot, a, b, config.loa_z))
            .collect();
        debug!(
            "agreement: {} pair(s) over {} device(s)",
            pairs.len(),
            pivot.devices.len()
        );
        Self { pairs, pivot }
    }

    /// Pair by its `"<a> vs <b>"` label.
    pub fn get(&self, label: &str) -> Option<&AgreementPair> {
        self.pairs.iter().find(|p| p.label == label)
    }
}

/// Pivots `records` and compares every device pair.
///
/// # Errors
///
/// Only a pivot failure under [`DuplicatePolicy::Reject`](crate::DuplicatePolicy::Reject).
pub fn compute_inter_device_agreement(
    records: &[MeasurementRecord],
    config: &QcConfig,
) -> Result<InterDeviceAgreement> {
    let pivot = SamplePivot::from_records(records, config.duplicate_policy)?;
    Ok(InterDeviceAgreement::from_pivot(pivot, config))
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn pair_count_is_binomial(d in 0usize..8, samples in 1usize..5) {
            let rows: Vec<MeasurementRecord> = (0..samples)
                .flat_map(|s| {
                    (0..d).map(move |k| {
                        MeasurementRecord::new(
                            format!("D{k}"),
                            "Glu",
                            Some(format!("S{s}").as_str()),
                            "",
                            (s * 10 + k) as f64,
                        )
                    })
                })
                .collect();
            let agreement = compute_inter_device_agreement(&rows, &QcConfig::default()).unwrap();
            prop_assert_eq!(agreement.pairs.len(), d * d.saturating_sub(1) / 2);

            let mut seen = std::collections::HashSet::new();
            for pair in &agreement.pairs {
                prop_assert_ne!(&pair.device_a, &pair.device_b);
                let key = if pair.device_a < pair.device_b {
                    (pair.device_a.clone(), pair.device_b.clone())
                } else {
                    (pair.device_b.clone(), pair.device_a.clone())
                };
                prop_assert!(seen.insert(key));
            }
        }

        #[test]
        fn limits_bracket_bias(
            a in proptest::collection::vec(-1e3_f64..1e3, 2..30),
            shift in -10.0_f64..10.0,
        ) {
            let b: Vec<f64> = a.iter().enumerate().map(|(i, x)| x + shift + (i % 3) as f64).collect();
            let ba = bland_altman(&a, &b, 1.96).unwrap();
            prop_assert!(ba.loa_lower <= ba.bias && ba.bias <= ba.loa_upper);
        }
    }
}
