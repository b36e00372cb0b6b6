//! Measurement rows as delivered by the upload parser.
//!
//! A CSV or spreadsheet decoder hands every cell over as text, so numeric
//! fields arrive either as JSON numbers or as strings. [`MeasurementRecord`]
//! accepts both and keeps `None` for anything that does not coerce to a
//! finite number.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Deserializer, Serialize};

/// One measurement row.
///
/// # Examples
///
/// ```
/// use poct_qc::MeasurementRecord;
///
/// let json = r#"{"device_id":"A","analyte":"Glucose","sample_id":"S1",
///               "test_date":"2024-03-01","measured_value":" 5.4 ","target_value":""}"#;
/// let rec: MeasurementRecord = serde_json::from_str(json).unwrap();
/// assert_eq!(rec.measured_value, Some(5.4));
/// assert_eq!(rec.target_value, None);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasurementRecord {
    pub device_id: String,
    #[serde(default)]
    pub analyte: String,
    #[serde(default, deserialize_with = "optional_text")]
    pub sample_id: Option<String>,
    #[serde(default)]
    pub test_date: String,
    /// `None` when the cell was empty or not numeric.
    #[serde(default, deserialize_with = "lenient_number")]
    pub measured_value: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub target_value: Option<f64>,
}

impl MeasurementRecord {
    /// Record with a numeric measurement and no target value.
    pub fn new(
        device_id: impl Into<String>,
        analyte: impl Into<String>,
        sample_id: Option<&str>,
        test_date: impl Into<String>,
        measured_value: f64,
    ) -> Self {
        Self {
            device_id: device_id.into(),
            analyte: analyte.into(),
            sample_id: sample_id.map(str::to_owned),
            test_date: test_date.into(),
            measured_value: measured_value.is_finite().then_some(measured_value),
            target_value: None,
        }
    }

    /// Record built from raw text cells, coercing the numeric ones.
    pub fn from_text(
        device_id: &str,
        analyte: &str,
        sample_id: &str,
        test_date: &str,
        measured_value: &str,
        target_value: &str,
    ) -> Self {
        let sample_id = sample_id.trim();
        Self {
            device_id: device_id.to_owned(),
            analyte: analyte.to_owned(),
            sample_id: (!sample_id.is_empty()).then(|| sample_id.to_owned()),
            test_date: test_date.to_owned(),
            measured_value: coerce_number(measured_value),
            target_value: coerce_number(target_value),
        }
    }

    /// The measured value if it is a finite number.
    pub fn value(&self) -> Option<f64> {
        self.measured_value.filter(|v| v.is_finite())
    }

    /// `test_date` as a timestamp, see [`parse_test_date`].
    pub fn parsed_date(&self) -> Option<NaiveDateTime> {
        parse_test_date(&self.test_date)
    }
}

/// Date-time formats tried after RFC 3339, most specific first.
const DATE_TIME_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

/// Date-only formats; the time is taken as midnight.
const DATE_FORMATS: [&str; 2] = ["%Y-%m-%d", "%d/%m/%Y"];

/// Parses a test date.
///
/// Accepts RFC 3339 (normalized to UTC), `YYYY-MM-DD[ T]HH:MM[:SS]`,
/// `YYYY-MM-DD` and `DD/MM/YYYY`. Anything else is `None`.
///
/// # Examples
///
/// ```
/// use poct_qc::record::parse_test_date;
///
/// let a = parse_test_date("2024-03-01").unwrap();
/// let b = parse_test_date("01/03/2024 ").unwrap();
/// assert_eq!(a, b);
/// assert!(parse_test_date("last tuesday").is_none());
/// ```
pub fn parse_test_date(text: &str) -> Option<NaiveDateTime> {
    let s = text.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_utc());
    }
    DATE_TIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

/// Parses a text cell as a finite `f64`; blank or non-numeric text is `None`.
pub fn coerce_number(text: &str) -> Option<f64> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse::<f64>().ok().filter(|v| v.is_finite())
}

// ---------------------------------------------------------------------------
// Serde helpers
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
#[serde(untagged)]
enum Cell {
    Number(f64),
    Text(String),
    Flag(bool),
}

fn lenient_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let cell: Option<Cell> = Option::deserialize(deserializer)?;
    Ok(match cell {
        Some(Cell::Number(v)) => Some(v).filter(|v| v.is_finite()),
        Some(Cell::Text(s)) => coerce_number(&s),
        Some(Cell::Flag(_)) | None => None,
    })
}

fn optional_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let cell: Option<Cell> = Option::deserialize(deserializer)?;
    Ok(match cell {
        Some(Cell::Text(s)) => {
            let s = s.trim();
            (!s.is_empty()).then(|| s.to_owned())
        }
        // Spreadsheet decoders hand numeric ids over as numbers.
        Some(Cell::Number(v)) => Some(v.to_string()),
        Some(Cell::Flag(_)) | None => None,
    })
}
