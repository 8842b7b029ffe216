//! Pre-flight schema validation for incoming CSV files
//!
//! Runs before a run is scheduled so obviously broken files are rejected
//! while the caller is still around to hear about it. Only the header and a
//! small sample of rows are inspected, so validation stays cheap no matter
//! how large the file is.

use csv::{ReaderBuilder, StringRecord, Trim};
use std::io::Read;
use tracing::debug;

use crate::error::{Error, Result};
use crate::transcode::{coerce_record, ColumnMap};

/// Number of data rows inspected during validation
pub const SAMPLE_ROWS: u64 = 5;

/// Validate the header and a bounded sample of rows
///
/// Checks that every required column is present (naming all missing ones)
/// and that the first [`SAMPLE_ROWS`] data rows coerce cleanly. All failures
/// are reported as [`Error::Format`] so callers can reject the file before
/// any work is scheduled. A file with a valid header and no data rows passes.
pub fn validate_sample<R: Read>(reader: R) -> Result<()> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(reader);

    let headers = rdr
        .headers()
        .map_err(|e| Error::Format(format!("Unreadable CSV header: {}", e)))?
        .clone();

    if headers.is_empty() {
        return Err(Error::Format("CSV file is empty".to_string()));
    }

    let columns = ColumnMap::from_headers(&headers)?;

    let mut record = StringRecord::new();
    let mut row_number: u64 = 0;

    while row_number < SAMPLE_ROWS {
        let has_row = rdr
            .read_record(&mut record)
            .map_err(|e| Error::Format(format!("Malformed CSV: {}", e)))?;
        if !has_row {
            break;
        }
        row_number += 1;

        // A value the decoder would choke on rejects the file up front
        if let Err(err) = coerce_record(&columns, &record, row_number) {
            return match err {
                Error::Data(msg) => Err(Error::Format(msg)),
                other => Err(other),
            };
        }
    }

    debug!("Validated header and {} sample rows", row_number);
    Ok(())
}
