//! Integration tests for siphon-core
//!
//! These tests exercise the full validate → transcode → write workflow
//! through the public API, the way embedding applications use it.

use std::path::PathBuf;

use siphon_core::generate::{generate_csv_file, Window};
use siphon_core::{
    ingest_file, submit_ingestion, Database, IngestOptions, IngestionRun, InlineRunner,
    RetryPolicy, RunStatus,
};
use tempfile::TempDir;

const HEADER: &str = "transaction_id,user_id,product_id,timestamp,transaction_amount";

/// Helper to write a transactions CSV into a scratch directory
fn write_csv(dir: &TempDir, name: &str, rows: &[&str]) -> PathBuf {
    let mut body = String::from(HEADER);
    for row in rows {
        body.push('\n');
        body.push_str(row);
    }
    let path = dir.path().join(name);
    std::fs::write(&path, body).expect("Failed to write test CSV");
    path
}

fn options(batch_size: usize) -> IngestOptions {
    IngestOptions {
        batch_size,
        retry: RetryPolicy::no_retry(),
        remove_source: false,
    }
}

fn fetch_run(db: &Database, run_id: i64) -> IngestionRun {
    db.get_run(run_id).unwrap().expect("Run not recorded")
}

// =============================================================================
// Full Pipeline Tests
// =============================================================================

#[test]
fn test_full_ingestion_workflow() {
    let db = Database::in_memory().expect("Failed to create in-memory database");
    let dir = TempDir::new().unwrap();

    let path = write_csv(
        &dir,
        "transactions.csv",
        &[
            "tx-01,1,100,2024-01-15 10:00:00,19.99",
            "tx-02,2,101,2024-01-15 10:05:00,5.00",
            "tx-03,3,102,2024-01-16 08:30:00,250.00",
            "tx-04,1,103,2024-01-17 14:00:00,7.25",
        ],
    );

    let run_id = db.create_run("transactions.csv").unwrap();
    let (rows, batches) = ingest_file(&db, run_id, &path, &options(2)).expect("Ingestion failed");

    assert_eq!(rows, 4);
    assert_eq!(batches, 2);
    assert_eq!(db.count_transactions().unwrap(), 4);

    let run = fetch_run(&db, run_id);
    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.rows_presented, 4);
    assert_eq!(run.batches_written, 2);
    assert!(run.finished_at.is_some());

    // Re-ingesting the same file presents every row again but stores none
    let second = db.create_run("transactions.csv").unwrap();
    let (rows, _) = ingest_file(&db, second, &path, &options(2)).unwrap();
    assert_eq!(rows, 4);
    assert_eq!(db.count_transactions().unwrap(), 4);
    assert_eq!(fetch_run(&db, second).status, RunStatus::Completed);
}

#[test]
fn test_duplicate_ids_across_files_first_wins() {
    let db = Database::in_memory().expect("Failed to create in-memory database");
    let dir = TempDir::new().unwrap();

    let monday = write_csv(
        &dir,
        "monday.csv",
        &[
            "shared,1,100,2024-01-15 10:00:00,100.50",
            "mon-only,2,101,2024-01-15 11:00:00,5.00",
        ],
    );
    let tuesday = write_csv(
        &dir,
        "tuesday.csv",
        &[
            "shared,99,900,2024-01-16 10:00:00,999.99",
            "tue-only,3,102,2024-01-16 11:00:00,6.00",
        ],
    );

    let first = db.create_run("monday.csv").unwrap();
    ingest_file(&db, first, &monday, &options(10)).unwrap();
    let second = db.create_run("tuesday.csv").unwrap();
    ingest_file(&db, second, &tuesday, &options(10)).unwrap();

    // Monday's copy of the shared id survives Tuesday's re-presentation
    assert_eq!(db.count_transactions().unwrap(), 3);
    let shared = db.get_transaction("shared").unwrap().unwrap();
    assert_eq!(shared.user_id, 1);
    assert_eq!(shared.amount.to_string(), "100.50");
}

#[test]
fn test_submit_schedules_run_observable_by_callers() {
    let db = Database::in_memory().expect("Failed to create in-memory database");
    let dir = TempDir::new().unwrap();

    let path = write_csv(
        &dir,
        "upload.csv",
        &[
            "tx-01,1,100,2024-01-15 10:00:00,19.99",
            "tx-02,2,101,2024-01-15 10:05:00,5.00",
        ],
    );

    let opts = IngestOptions {
        retry: RetryPolicy::no_retry(),
        ..IngestOptions::default()
    };
    let receipt =
        submit_ingestion(&db, &InlineRunner, &path, "upload.csv", opts).expect("Submit failed");
    assert!(receipt.message.contains("upload.csv"));

    // The inline runner completed before the receipt returned, so the
    // ledger already reflects the outcome
    let run = fetch_run(&db, receipt.run_id);
    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.rows_presented, 2);
    assert_eq!(db.count_transactions().unwrap(), 2);

    // Staged uploads are removed once the run completes
    assert!(!path.exists());
}

#[test]
fn test_failed_run_is_observable_with_partial_progress() {
    let db = Database::in_memory().expect("Failed to create in-memory database");
    let dir = TempDir::new().unwrap();

    // The bad row lands in the second batch of two
    let path = write_csv(
        &dir,
        "bad-tail.csv",
        &[
            "tx-01,1,100,2024-01-15 10:00:00,19.99",
            "tx-02,2,101,2024-01-15 10:05:00,5.00",
            "tx-03,3,102,2024-01-16 08:30:00,250.00",
            "tx-04,bad-user,103,2024-01-17 14:00:00,7.25",
        ],
    );

    let run_id = db.create_run("bad-tail.csv").unwrap();
    let err = ingest_file(&db, run_id, &path, &options(2)).expect_err("Ingestion should fail");
    assert!(err.to_string().contains("Row 4"));

    // The complete batch before the failure survives; the failed batch
    // contributes nothing
    assert_eq!(db.count_transactions().unwrap(), 2);

    let run = fetch_run(&db, run_id);
    assert_eq!(run.status, RunStatus::Failed);
    assert_eq!(run.rows_presented, 2);
    assert!(run.error.unwrap().contains("Row 4"));
    assert!(path.exists());
}

// =============================================================================
// Generator Round-Trip Tests
// =============================================================================

#[test]
fn test_generated_files_are_valid_pipeline_input() {
    let db = Database::in_memory().expect("Failed to create in-memory database");
    let dir = TempDir::new().unwrap();

    let path = generate_csv_file(dir.path(), 50, Window::LastYear).expect("Generation failed");

    let run_id = db.create_run("generated.csv").unwrap();
    let (rows, batches) = ingest_file(&db, run_id, &path, &options(20)).unwrap();

    assert_eq!(rows, 50);
    assert_eq!(batches, 3);
    // Generated ids are fresh UUIDs, so nothing collides
    assert_eq!(db.count_transactions().unwrap(), 50);
}
