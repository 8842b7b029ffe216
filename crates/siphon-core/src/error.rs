//! Error types for Siphon
//!
//! Three classes matter to callers: `Format` (structural, caught during
//! synchronous validation), `Data` (a value past the validated sample failed
//! coercion; aborts the run), and the storage variants (transient persistence
//! faults, eligible for whole-pipeline retry).

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// Structural problem in the upload: missing required columns or an
    /// unparsable value in the validation sample. User-correctable.
    #[error("{0}")]
    Format(String),

    /// A row beyond the validated sample failed coercion. Fatal to the run;
    /// batches committed before the failure remain.
    #[error("{0}")]
    Data(String),

    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("Storage pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("CSV parsing error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// True for persistence-layer faults unrelated to data shape. Only these
    /// justify re-running the pipeline; format and data failures are
    /// deterministic and would fail again.
    pub fn is_storage_fault(&self) -> bool {
        matches!(self, Error::Storage(_) | Error::Pool(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_faults_are_retryable() {
        let err = Error::Storage(rusqlite::Error::InvalidQuery);
        assert!(err.is_storage_fault());
    }

    #[test]
    fn test_format_and_data_errors_are_not_retryable() {
        assert!(!Error::Format("missing columns".into()).is_storage_fault());
        assert!(!Error::Data("bad amount".into()).is_storage_fault());
    }

    #[test]
    fn test_format_error_message_is_verbatim() {
        let err = Error::Format("CSV is missing required columns: timestamp".into());
        assert_eq!(
            err.to_string(),
            "CSV is missing required columns: timestamp"
        );
    }
}
