//! Transaction storage: batch upsert writer and query helpers

use std::str::FromStr;

use bigdecimal::BigDecimal;
use rusqlite::{params, OptionalExtension};
use tracing::{debug, warn};

use super::Database;
use crate::error::Result;
use crate::models::TransactionRecord;

/// Storage format for transaction timestamps.
pub(crate) const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

impl Database {
    /// Write one coerced batch inside a single transaction.
    ///
    /// Insert policy is insert-or-ignore keyed on `transaction_id`: conflict
    /// resolution is the engine's ON CONFLICT DO NOTHING, never a read-back
    /// existence check, so concurrent runs stay safe without application
    /// locks. Returns the number of rows presented (duplicates included);
    /// the inserted/skipped split is logged at debug level.
    ///
    /// If any statement fails the transaction rolls back on drop and the
    /// batch contributes zero rows.
    pub fn write_batch(&self, batch: &[TransactionRecord]) -> Result<usize> {
        if batch.is_empty() {
            return Ok(0);
        }

        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let mut inserted = 0usize;
        {
            let mut stmt = tx.prepare(
                r#"
                INSERT INTO transactions (transaction_id, user_id, product_id, timestamp, transaction_amount)
                VALUES (?1, ?2, ?3, ?4, ?5)
                ON CONFLICT(transaction_id) DO NOTHING
                "#,
            )?;

            for record in batch {
                inserted += stmt.execute(params![
                    record.transaction_id,
                    record.user_id,
                    record.product_id,
                    record.timestamp.format(TIMESTAMP_FORMAT).to_string(),
                    record.amount.to_string(),
                ])?;
            }
        }
        tx.commit()?;

        debug!(
            "Wrote batch: {} rows presented, {} inserted, {} duplicates skipped",
            batch.len(),
            inserted,
            batch.len() - inserted
        );
        Ok(batch.len())
    }

    /// Create the `(user_id, timestamp)` composite index if absent.
    ///
    /// Idempotent and best-effort: a failure here costs query speed, not
    /// correctness, so it is logged and swallowed rather than propagated.
    pub fn ensure_indexes(&self) {
        let result = self.conn().and_then(|conn| {
            conn.execute(
                "CREATE INDEX IF NOT EXISTS idx_transactions_user_time
                 ON transactions(user_id, timestamp)",
                [],
            )?;
            Ok(())
        });

        if let Err(e) = result {
            warn!("Failed to ensure transaction indexes: {}", e);
        }
    }

    /// Count total stored transactions
    pub fn count_transactions(&self) -> Result<i64> {
        let conn = self.conn()?;
        let count: i64 =
            conn.query_row("SELECT COUNT(*) FROM transactions", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Get a single transaction by its id
    pub fn get_transaction(&self, transaction_id: &str) -> Result<Option<TransactionRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT transaction_id, user_id, product_id, timestamp, transaction_amount
             FROM transactions WHERE transaction_id = ?",
        )?;

        let record = stmt
            .query_row(params![transaction_id], |row| {
                Self::map_transaction_row(row)
            })
            .optional()?;

        Ok(record)
    }

    /// List stored transactions ordered by id (stable across batch sizes)
    pub fn list_transactions(&self, limit: i64) -> Result<Vec<TransactionRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT transaction_id, user_id, product_id, timestamp, transaction_amount
             FROM transactions
             ORDER BY transaction_id
             LIMIT ?",
        )?;

        let records = stmt
            .query_map(params![limit], |row| Self::map_transaction_row(row))?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(records)
    }

    /// Helper to convert a row to TransactionRecord
    /// Column order: transaction_id, user_id, product_id, timestamp, transaction_amount
    fn map_transaction_row(row: &rusqlite::Row) -> rusqlite::Result<TransactionRecord> {
        let timestamp_str: String = row.get(3)?;
        let amount_str: String = row.get(4)?;
        Ok(TransactionRecord {
            transaction_id: row.get(0)?,
            user_id: row.get(1)?,
            product_id: row.get(2)?,
            timestamp: chrono::NaiveDateTime::parse_from_str(&timestamp_str, TIMESTAMP_FORMAT)
                .unwrap_or_default(),
            amount: BigDecimal::from_str(&amount_str).unwrap_or_default(),
        })
    }
}
