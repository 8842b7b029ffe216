//! Ingestion pipeline orchestration
//!
//! Drives a staged CSV file through validation, chunked decoding, and
//! batched writes, recording progress in the run ledger as it goes. Storage
//! faults retry the whole pipeline with a fixed delay; format and data
//! errors fail the run immediately.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::db::Database;
use crate::error::Result;
use crate::jobs::JobRunner;
use crate::models::{IngestionReceipt, RunStatus};
use crate::transcode::{Batches, DEFAULT_BATCH_SIZE};
use crate::validate::validate_sample;

/// Retry policy for storage faults
///
/// Only storage faults are retried. Format and data problems are properties
/// of the file and will not improve on a second look.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    /// A policy that gives every operation exactly one attempt
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            delay: Duration::ZERO,
        }
    }

    /// Run `op` until it succeeds or attempts are exhausted
    pub fn run<T, F>(&self, mut op: F) -> Result<T>
    where
        F: FnMut() -> Result<T>,
    {
        let max = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match op() {
                Ok(value) => return Ok(value),
                Err(e) if e.is_storage_fault() && attempt < max => {
                    warn!(
                        "Storage fault on attempt {}/{}: {}. Retrying in {:?}",
                        attempt, max, e, self.delay
                    );
                    std::thread::sleep(self.delay);
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Knobs for a single ingestion
#[derive(Debug, Clone)]
pub struct IngestOptions {
    pub batch_size: usize,
    pub retry: RetryPolicy,
    /// Remove the staged source file once the run completes
    pub remove_source: bool,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            retry: RetryPolicy::default(),
            remove_source: true,
        }
    }
}

/// Run the full pipeline for an existing run
///
/// On success the run is marked completed and the staged file removed (if
/// `remove_source` is set); on failure the run is marked failed with the
/// error message. Returns `(rows_presented, batches_written)`.
pub fn ingest_file(
    db: &Database,
    run_id: i64,
    path: &Path,
    options: &IngestOptions,
) -> Result<(i64, i64)> {
    let outcome = options
        .retry
        .run(|| ingest_attempt(db, run_id, path, options.batch_size))
        .and_then(|(rows, batches)| {
            // Rows are durable here. The completion update shares the retry
            // budget; a residual fault drops to the failure bookkeeping below
            // so the run still reaches a terminal state.
            options
                .retry
                .run(|| db.mark_run_completed(run_id, rows, batches))?;
            Ok((rows, batches))
        });

    match outcome {
        Ok((rows, batches)) => {
            if options.remove_source {
                if let Err(e) = std::fs::remove_file(path) {
                    warn!("Failed to remove staged file {}: {}", path.display(), e);
                }
            }
            info!(
                "Run {} completed: {} rows presented in {} batches",
                run_id, rows, batches
            );
            Ok((rows, batches))
        }
        Err(e) => {
            error!("Run {} failed: {}", run_id, e);
            if let Err(mark_err) = db.mark_run_failed(run_id, &e.to_string()) {
                error!("Failed to record failure for run {}: {}", run_id, mark_err);
            }
            Err(e)
        }
    }
}

/// One full pass over the source file
///
/// Retries restart from here, so each attempt re-validates and re-reads
/// the file from the top. Writes are idempotent, so rows persisted by an
/// earlier attempt are simply skipped.
fn ingest_attempt(
    db: &Database,
    run_id: i64,
    path: &Path,
    batch_size: usize,
) -> Result<(i64, i64)> {
    db.update_run_status(run_id, RunStatus::Validating)?;
    let file = File::open(path)?;
    validate_sample(BufReader::new(file))?;

    db.update_run_status(run_id, RunStatus::Transcoding)?;
    let file = File::open(path)?;
    let batches = Batches::with_batch_size(BufReader::new(file), batch_size)?;

    db.ensure_indexes();

    let mut rows_presented: i64 = 0;
    let mut batches_written: i64 = 0;
    let mut writing = false;

    for batch in batches {
        let batch = batch?;
        if !writing {
            db.update_run_status(run_id, RunStatus::Writing)?;
            writing = true;
        }
        let presented = db.write_batch(&batch)?;
        rows_presented += presented as i64;
        batches_written += 1;
        db.update_run_progress(run_id, rows_presented, batches_written)?;
    }

    Ok((rows_presented, batches_written))
}

/// Validate a staged file and schedule its ingestion
///
/// Validation runs synchronously so the caller hears about format problems
/// immediately; nothing is recorded for a rejected file. On success a
/// pending run is created and the pipeline is handed to `runner`. The
/// receipt acknowledges acceptance, not completion.
///
/// `source_name` is the display name recorded on the run. Callers that
/// stage uploads under generated file names pass the original name here.
pub fn submit_ingestion(
    db: &Database,
    runner: &dyn JobRunner,
    path: &Path,
    source_name: &str,
    options: IngestOptions,
) -> Result<IngestionReceipt> {
    let file = File::open(path)?;
    validate_sample(BufReader::new(file))?;

    let run_id = db.create_run(source_name)?;

    let db = db.clone();
    let path = path.to_path_buf();
    let handle = runner.submit(Box::new(move || {
        let _ = ingest_file(&db, run_id, &path, &options);
    }));

    debug!("Run {} scheduled as job {}", run_id, handle.id);

    Ok(IngestionReceipt {
        run_id,
        message: format!("File '{}' accepted for processing", source_name),
    })
}
