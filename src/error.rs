//! Error types for poct-qc.
//!
//! Only caller-contract violations surface as errors. Sparse or non-numeric
//! data never fails an engine; it degrades to `NaN` statistics instead.

use thiserror::Error;

/// poct-qc error type
#[derive(Error, Debug)]
pub enum QcError {
    /// Paired inputs of different lengths.
    #[error("length mismatch: left has {left} values, right has {right}")]
    LengthMismatch { left: usize, right: usize },

    /// Same (sample, device) measured twice under `DuplicatePolicy::Reject`.
    #[error("duplicate measurement for sample '{sample_id}' on device '{device}'")]
    DuplicateMeasurement { sample_id: String, device: String },

    /// Argument outside its valid domain
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Configuration failed validation
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, QcError>;

/// Fails with [`QcError::LengthMismatch`] unless both slices have equal length.
pub(crate) fn ensure_same_len(left: &[f64], right: &[f64]) -> Result<()> {
    if left.len() != right.len() {
        return Err(QcError::LengthMismatch {
            left: left.len(),
            right: right.len(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn length_mismatch_message() {
        let err = ensure_same_len(&[1.0, 2.0], &[1.0]).unwrap_err();
        assert_eq!(
            err.to_string(),
            "length mismatch: left has 2 values, right has 1"
        );
    }

    #[test]
    fn equal_lengths_pass() {
        assert!(ensure_same_len(&[], &[]).is_ok());
        assert!(ensure_same_len(&[1.0], &[2.0]).is_ok());
    }

    #[test]
    fn json_error_converts() {
        let parse: std::result::Result<serde_json::Value, _> = serde_json::from_str("{");
        let err: QcError = parse.unwrap_err().into();
        assert!(matches!(err, QcError::Json(_)));
    }
}
