//! Chunked CSV decoding into typed transaction records
//!
//! Rows are pulled lazily and yielded in bounded batches so arbitrarily large
//! files never have to fit in memory. Columns are resolved by name, so extra
//! columns and reordered headers are fine. The first cell that fails coercion
//! ends the stream with a data error.

use bigdecimal::{BigDecimal, RoundingMode};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use csv::{ReaderBuilder, StringRecord, Trim};
use std::io::Read;
use std::str::FromStr;
use tracing::debug;

use crate::error::{Error, Result};
use crate::models::TransactionRecord;

/// Default number of rows per batch
pub const DEFAULT_BATCH_SIZE: usize = 50_000;

/// Columns every source file must carry, in canonical order
pub const REQUIRED_COLUMNS: [&str; 5] = [
    "transaction_id",
    "user_id",
    "product_id",
    "timestamp",
    "transaction_amount",
];

/// Resolved indices of the required columns within a header row
#[derive(Debug, Clone, Copy)]
pub(crate) struct ColumnMap {
    transaction_id: usize,
    user_id: usize,
    product_id: usize,
    timestamp: usize,
    amount: usize,
}

impl ColumnMap {
    /// Resolve the required columns by name
    ///
    /// Returns a format error naming every missing column, not just the first.
    pub(crate) fn from_headers(headers: &StringRecord) -> Result<Self> {
        let position = |name: &str| headers.iter().position(|h| h.trim() == name);

        let transaction_id = position("transaction_id");
        let user_id = position("user_id");
        let product_id = position("product_id");
        let timestamp = position("timestamp");
        let amount = position("transaction_amount");

        match (transaction_id, user_id, product_id, timestamp, amount) {
            (
                Some(transaction_id),
                Some(user_id),
                Some(product_id),
                Some(timestamp),
                Some(amount),
            ) => Ok(Self {
                transaction_id,
                user_id,
                product_id,
                timestamp,
                amount,
            }),
            _ => {
                let missing: Vec<&str> = REQUIRED_COLUMNS
                    .iter()
                    .filter(|name| position(name).is_none())
                    .copied()
                    .collect();
                Err(Error::Format(format!(
                    "Missing required columns: {}",
                    missing.join(", ")
                )))
            }
        }
    }
}

/// Lazy batch iterator over a CSV source
///
/// Yields `Vec<TransactionRecord>` of at most `batch_size` rows. The final
/// batch may be short. After an error the iterator is exhausted.
pub struct Batches<R: Read> {
    reader: csv::Reader<R>,
    columns: ColumnMap,
    batch_size: usize,
    row_number: u64,
    done: bool,
}

impl<R: Read> Batches<R> {
    /// Open a batch stream with the default batch size
    pub fn new(reader: R) -> Result<Self> {
        Self::with_batch_size(reader, DEFAULT_BATCH_SIZE)
    }

    /// Open a batch stream with an explicit batch size (clamped to >= 1)
    pub fn with_batch_size(reader: R, batch_size: usize) -> Result<Self> {
        let mut rdr = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(Trim::All)
            .from_reader(reader);

        let headers = rdr.headers()?.clone();
        let columns = ColumnMap::from_headers(&headers)?;

        Ok(Self {
            reader: rdr,
            columns,
            batch_size: batch_size.max(1),
            row_number: 0,
            done: false,
        })
    }
}

impl<R: Read> Iterator for Batches<R> {
    type Item = Result<Vec<TransactionRecord>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let mut batch = Vec::with_capacity(self.batch_size);
        let mut record = StringRecord::new();

        while batch.len() < self.batch_size {
            match self.reader.read_record(&mut record) {
                Ok(true) => {
                    self.row_number += 1;
                    match coerce_record(&self.columns, &record, self.row_number) {
                        Ok(tx) => batch.push(tx),
                        Err(e) => {
                            self.done = true;
                            return Some(Err(e));
                        }
                    }
                }
                Ok(false) => {
                    self.done = true;
                    break;
                }
                Err(e) => {
                    self.done = true;
                    return Some(Err(e.into()));
                }
            }
        }

        if batch.is_empty() {
            None
        } else {
            debug!("Decoded batch of {} rows", batch.len());
            Some(Ok(batch))
        }
    }
}

/// Coerce one CSV record into a typed transaction
///
/// `row_number` is the 1-based data row index, used in error messages.
pub(crate) fn coerce_record(
    columns: &ColumnMap,
    record: &StringRecord,
    row_number: u64,
) -> Result<TransactionRecord> {
    let transaction_id = record
        .get(columns.transaction_id)
        .ok_or_else(|| Error::Data(format!("Row {}: missing transaction_id value", row_number)))?;
    if transaction_id.is_empty() {
        return Err(Error::Data(format!(
            "Row {}: transaction_id is empty",
            row_number
        )));
    }

    let user_id_raw = record
        .get(columns.user_id)
        .ok_or_else(|| Error::Data(format!("Row {}: missing user_id value", row_number)))?;
    let user_id = user_id_raw.parse::<i64>().map_err(|_| {
        Error::Data(format!(
            "Row {}: unable to parse user_id: {}",
            row_number, user_id_raw
        ))
    })?;

    let product_id_raw = record
        .get(columns.product_id)
        .ok_or_else(|| Error::Data(format!("Row {}: missing product_id value", row_number)))?;
    let product_id = product_id_raw.parse::<i64>().map_err(|_| {
        Error::Data(format!(
            "Row {}: unable to parse product_id: {}",
            row_number, product_id_raw
        ))
    })?;

    let timestamp_raw = record
        .get(columns.timestamp)
        .ok_or_else(|| Error::Data(format!("Row {}: missing timestamp value", row_number)))?;
    let timestamp = parse_timestamp(timestamp_raw).ok_or_else(|| {
        Error::Data(format!(
            "Row {}: unable to parse timestamp: {}",
            row_number, timestamp_raw
        ))
    })?;

    let amount_raw = record
        .get(columns.amount)
        .ok_or_else(|| {
            Error::Data(format!(
                "Row {}: missing transaction_amount value",
                row_number
            ))
        })?;
    let amount = parse_amount(amount_raw).ok_or_else(|| {
        Error::Data(format!(
            "Row {}: unable to parse transaction_amount: {}",
            row_number, amount_raw
        ))
    })?;

    Ok(TransactionRecord {
        transaction_id: transaction_id.to_string(),
        user_id,
        product_id,
        timestamp,
        amount,
    })
}

/// Parse a timestamp string, trying common formats
///
/// Date-only values resolve to midnight.
fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();

    let datetime_formats = [
        "%Y-%m-%d %H:%M:%S%.f",  // 2024-01-15 10:30:00
        "%Y-%m-%dT%H:%M:%S%.f",  // 2024-01-15T10:30:00
        "%Y-%m-%dT%H:%M:%S%.fZ", // 2024-01-15T10:30:00Z
        "%m/%d/%Y %H:%M:%S",     // 01/15/2024 10:30:00
    ];

    for fmt in datetime_formats {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt);
        }
    }

    let date_formats = [
        "%Y-%m-%d", // 2024-01-15
        "%m/%d/%Y", // 01/15/2024
        "%m/%d/%y", // 01/15/24
        "%m-%d-%Y", // 01-15-2024
    ];

    for fmt in date_formats {
        if let Ok(date) = NaiveDate::parse_from_str(s, fmt) {
            return Some(date.and_time(NaiveTime::MIN));
        }
    }

    None
}

/// Parse an amount string, handling currency symbols and commas
///
/// The result is normalized to two decimal places (half-up).
fn parse_amount(s: &str) -> Option<BigDecimal> {
    let cleaned: String = s
        .trim()
        .replace(['$', ',', ' '], "")
        .replace('(', "-")
        .replace(')', "");

    let amount = BigDecimal::from_str(&cleaned).ok()?;
    Some(amount.with_scale_round(2, RoundingMode::HalfUp))
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "transaction_id,user_id,product_id,timestamp,transaction_amount";

    fn csv_with_rows(rows: &[&str]) -> String {
        let mut out = String::from(HEADER);
        for row in rows {
            out.push('\n');
            out.push_str(row);
        }
        out
    }

    #[test]
    fn test_parse_timestamp_formats() {
        let expected = NaiveDate::from_ymd_opt(2024, 1, 15)
            .unwrap()
            .and_hms_opt(10, 30, 0)
            .unwrap();

        assert_eq!(parse_timestamp("2024-01-15 10:30:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-01-15T10:30:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-01-15T10:30:00Z"), Some(expected));
        assert_eq!(parse_timestamp("01/15/2024 10:30:00"), Some(expected));

        let with_fraction = NaiveDate::from_ymd_opt(2024, 1, 15)
            .unwrap()
            .and_hms_milli_opt(10, 30, 0, 123)
            .unwrap();
        assert_eq!(
            parse_timestamp("2024-01-15 10:30:00.123"),
            Some(with_fraction)
        );

        assert_eq!(parse_timestamp("not a date"), None);
    }

    #[test]
    fn test_parse_timestamp_date_only_is_midnight() {
        let midnight = NaiveDate::from_ymd_opt(2024, 1, 15)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();

        assert_eq!(parse_timestamp("2024-01-15"), Some(midnight));
        assert_eq!(parse_timestamp("01/15/2024"), Some(midnight));
    }

    #[test]
    fn test_parse_amount_normalizes_scale() {
        assert_eq!(parse_amount("100.5").unwrap().to_string(), "100.50");
        assert_eq!(parse_amount("$1,234.567").unwrap().to_string(), "1234.57");
        assert_eq!(parse_amount("(50)").unwrap().to_string(), "-50.00");
        assert_eq!(parse_amount("garbage"), None);
        assert_eq!(parse_amount(""), None);
    }

    #[test]
    fn test_batches_respect_batch_size() {
        let data = csv_with_rows(&[
            "a,1,10,2024-01-15 10:00:00,5.00",
            "b,2,11,2024-01-15 10:01:00,6.00",
            "c,3,12,2024-01-15 10:02:00,7.00",
            "d,4,13,2024-01-15 10:03:00,8.00",
            "e,5,14,2024-01-15 10:04:00,9.00",
            "f,6,15,2024-01-15 10:05:00,1.00",
            "g,7,16,2024-01-15 10:06:00,2.00",
            "h,8,17,2024-01-15 10:07:00,3.00",
            "i,9,18,2024-01-15 10:08:00,4.00",
            "j,10,19,2024-01-15 10:09:00,5.00",
        ]);

        let batches: Vec<_> = Batches::with_batch_size(data.as_bytes(), 3)
            .unwrap()
            .collect::<Result<Vec<_>>>()
            .unwrap();

        let sizes: Vec<usize> = batches.iter().map(|b| b.len()).collect();
        assert_eq!(sizes, vec![3, 3, 3, 1]);
        assert_eq!(batches[0][0].transaction_id, "a");
        assert_eq!(batches[3][0].transaction_id, "j");
    }

    #[test]
    fn test_small_file_is_one_default_batch() {
        let data = csv_with_rows(&[
            "a,1,10,2024-01-15 10:00:00,5.00",
            "b,2,11,2024-01-15 10:01:00,6.00",
        ]);

        let batches: Vec<_> = Batches::new(data.as_bytes())
            .unwrap()
            .collect::<Result<Vec<_>>>()
            .unwrap();

        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].len(), 2);
    }

    #[test]
    fn test_columns_resolved_by_name() {
        let data = "user_id,transaction_amount,transaction_id,extra,timestamp,product_id\n\
                    7,42.10,tx-1,ignored,2024-01-15 10:00:00,99";

        let batches: Vec<_> = Batches::new(data.as_bytes())
            .unwrap()
            .collect::<Result<Vec<_>>>()
            .unwrap();

        let tx = &batches[0][0];
        assert_eq!(tx.transaction_id, "tx-1");
        assert_eq!(tx.user_id, 7);
        assert_eq!(tx.product_id, 99);
        assert_eq!(tx.amount.to_string(), "42.10");
    }

    #[test]
    fn test_missing_columns_all_named() {
        let data = "transaction_id,product_id,transaction_amount\nabc,1,5.00";

        let err = Batches::new(data.as_bytes()).err().unwrap();
        let msg = err.to_string();
        assert!(msg.contains("user_id"), "got: {}", msg);
        assert!(msg.contains("timestamp"), "got: {}", msg);
        assert!(matches!(err, Error::Format(_)));
    }

    #[test]
    fn test_bad_timestamp_is_data_error_with_row() {
        let data = csv_with_rows(&[
            "a,1,10,2024-01-15 10:00:00,5.00",
            "b,2,11,notadate,6.00",
        ]);

        let mut batches = Batches::with_batch_size(data.as_bytes(), 10).unwrap();
        let err = batches.next().unwrap().err().unwrap();
        assert!(matches!(err, Error::Data(_)));
        let msg = err.to_string();
        assert!(msg.contains("Row 2"), "got: {}", msg);
        assert!(msg.contains("notadate"), "got: {}", msg);
    }

    #[test]
    fn test_empty_transaction_id_rejected() {
        let data = csv_with_rows(&["  ,1,10,2024-01-15 10:00:00,5.00"]);

        let mut batches = Batches::new(data.as_bytes()).unwrap();
        let err = batches.next().unwrap().err().unwrap();
        assert!(matches!(err, Error::Data(_)));
        assert!(err.to_string().contains("transaction_id"));
    }

    #[test]
    fn test_error_ends_iteration() {
        let data = csv_with_rows(&[
            "a,1,10,2024-01-15 10:00:00,5.00",
            "b,oops,11,2024-01-15 10:01:00,6.00",
            "c,3,12,2024-01-15 10:02:00,7.00",
        ]);

        let mut batches = Batches::with_batch_size(data.as_bytes(), 1).unwrap();
        assert!(batches.next().unwrap().is_ok());
        assert!(batches.next().unwrap().is_err());
        assert!(batches.next().is_none());
    }

    #[test]
    fn test_no_data_rows_yields_nothing() {
        let mut batches = Batches::new(HEADER.as_bytes()).unwrap();
        assert!(batches.next().is_none());
    }
}
