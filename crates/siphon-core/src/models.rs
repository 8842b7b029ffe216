//! Domain models for Siphon

use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// A coerced transaction row, the unit of ingestion.
///
/// `transaction_id` is the primary key in the store; ingestion is idempotent
/// on it and the first-seen row for a given id wins. Amounts are normalized
/// to exactly two fractional digits before they reach the writer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub transaction_id: String,
    pub user_id: i64,
    pub product_id: i64,
    /// Source data carries no zone, so timestamps stay naive.
    pub timestamp: NaiveDateTime,
    pub amount: BigDecimal,
}

/// Lifecycle of an ingestion run.
///
/// `Pending` is the queued-but-not-started state; the pipeline then walks
/// `Validating → Transcoding → Writing → Completed`, with `Failed` reachable
/// from any non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    #[default]
    Pending,
    Validating,
    Transcoding,
    Writing,
    Completed,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Validating => "validating",
            Self::Transcoding => "transcoding",
            Self::Writing => "writing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// Terminal states never transition again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl std::str::FromStr for RunStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "validating" => Ok(Self::Validating),
            "transcoding" => Ok(Self::Transcoding),
            "writing" => Ok(Self::Writing),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            _ => Err(format!("Unknown run status: {}", s)),
        }
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Durable record of one pipeline execution.
///
/// Background failures surface here rather than to the original caller; the
/// server's run endpoints are the query side.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestionRun {
    pub id: i64,
    /// Original file name as presented by the caller, for display.
    pub source_name: String,
    pub status: RunStatus,
    /// Rows handed to the writer so far, duplicates included.
    pub rows_presented: i64,
    pub batches_written: i64,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

/// Acknowledgement returned by the trigger interface.
///
/// The message promises only that the file was accepted; completion is
/// observable through the run record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestionReceipt {
    pub run_id: i64,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_run_status_round_trip() {
        for status in [
            RunStatus::Pending,
            RunStatus::Validating,
            RunStatus::Transcoding,
            RunStatus::Writing,
            RunStatus::Completed,
            RunStatus::Failed,
        ] {
            let parsed = RunStatus::from_str(status.as_str()).unwrap();
            assert_eq!(parsed, status);
        }
    }

    #[test]
    fn test_run_status_rejects_unknown() {
        assert!(RunStatus::from_str("paused").is_err());
    }

    #[test]
    fn test_terminal_states() {
        assert!(RunStatus::Completed.is_terminal());
        assert!(RunStatus::Failed.is_terminal());
        assert!(!RunStatus::Writing.is_terminal());
        assert!(!RunStatus::Pending.is_terminal());
    }
}
