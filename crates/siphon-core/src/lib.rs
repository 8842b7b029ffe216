//! Siphon Core Library
//!
//! Shared functionality for the Siphon transaction ingestion pipeline:
//! - Database access and migrations (SQLite, pooled)
//! - Pre-flight schema validation of staged CSV files
//! - Chunked CSV decoding into typed batches
//! - Idempotent batch writer (first occurrence of a transaction id wins)
//! - Run orchestration with storage-fault retry and a persistent run ledger
//! - Pluggable background job execution
//! - Synthetic data generation for demos and load testing

pub mod db;
pub mod error;
pub mod generate;
pub mod ingest;
pub mod jobs;
pub mod models;
pub mod transcode;
pub mod validate;

pub use db::Database;
pub use error::{Error, Result};
pub use ingest::{ingest_file, submit_ingestion, IngestOptions, RetryPolicy};
pub use jobs::{InlineRunner, JobHandle, JobRunner, ThreadRunner};
pub use models::{IngestionReceipt, IngestionRun, RunStatus, TransactionRecord};
pub use transcode::{Batches, DEFAULT_BATCH_SIZE, REQUIRED_COLUMNS};
pub use validate::{validate_sample, SAMPLE_ROWS};
