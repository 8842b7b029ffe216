//! Synthetic transaction data generation
//!
//! Produces CSV files shaped like the real upstream exports so the pipeline
//! can be exercised end to end without production data. Two windows mirror
//! the upstream feeds: a daily drop covering yesterday, and a bulk export
//! covering the trailing year.

use std::path::{Path, PathBuf};

use bigdecimal::BigDecimal;
use chrono::{Duration, NaiveDateTime, NaiveTime, Utc};
use rand::Rng;
use tracing::info;
use uuid::Uuid;

use crate::db::TIMESTAMP_FORMAT;
use crate::error::Result;
use crate::models::TransactionRecord;
use crate::transcode::REQUIRED_COLUMNS;

/// Time window generated timestamps are drawn from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Window {
    /// All of yesterday, 00:00:00 through 23:59:59
    Daily,
    /// The trailing year up to now
    LastYear,
}

impl Window {
    fn bounds(&self) -> (NaiveDateTime, NaiveDateTime) {
        match self {
            Window::Daily => {
                let start = (Utc::now() - Duration::days(1))
                    .date_naive()
                    .and_time(NaiveTime::MIN);
                (start, start + Duration::days(1) - Duration::seconds(1))
            }
            Window::LastYear => {
                let now = Utc::now().naive_utc();
                (now - Duration::days(365), now)
            }
        }
    }

    /// Filename prefix matching the upstream feed naming
    pub fn file_prefix(&self) -> &'static str {
        match self {
            Window::Daily => "daily_batch",
            Window::LastYear => "bulk_batch",
        }
    }
}

/// Generate `rows` random transactions with timestamps inside `window`
///
/// IDs are fresh UUIDs, users are drawn from 1-1000, products from 1-500,
/// and amounts uniformly from 5.00 to 500.00.
pub fn generate_transactions(rows: usize, window: Window) -> Vec<TransactionRecord> {
    let (start, end) = window.bounds();
    let span = (end - start).num_seconds().max(1);
    let mut rng = rand::thread_rng();

    (0..rows)
        .map(|_| {
            let cents: i64 = rng.gen_range(500..=50_000);
            TransactionRecord {
                transaction_id: Uuid::new_v4().to_string(),
                user_id: rng.gen_range(1..=1000),
                product_id: rng.gen_range(1..=500),
                timestamp: start + Duration::seconds(rng.gen_range(0..=span)),
                amount: (BigDecimal::from(cents) / BigDecimal::from(100)).with_scale(2),
            }
        })
        .collect()
}

/// Render transactions as CSV with the canonical header
pub fn render_csv(transactions: &[TransactionRecord]) -> String {
    let mut csv = REQUIRED_COLUMNS.join(",");
    csv.push('\n');

    for tx in transactions {
        csv.push_str(&format!(
            "{},{},{},{},{}\n",
            tx.transaction_id,
            tx.user_id,
            tx.product_id,
            tx.timestamp.format(TIMESTAMP_FORMAT),
            tx.amount
        ));
    }

    csv
}

/// Write a generated CSV file into `dir`, named after the window's feed
///
/// Returns the path of the written file.
pub fn generate_csv_file(dir: &Path, rows: usize, window: Window) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let filename = format!("{}_{}.csv", window.file_prefix(), Uuid::new_v4());
    let path = dir.join(filename);

    let transactions = generate_transactions(rows, window);
    std::fs::write(&path, render_csv(&transactions))?;

    info!("Generated {} rows at {}", rows, path.display());
    Ok(path)
}
