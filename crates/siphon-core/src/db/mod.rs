//! Database access layer with connection pooling and schema setup
//!
//! This module is organized by domain:
//! - `transactions` - batch upsert writer and transaction queries
//! - `runs` - ingestion run ledger (status machine, progress, recovery)

use chrono::{DateTime, Utc};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use tracing::info;

use crate::error::Result;

mod runs;
mod transactions;

pub(crate) use transactions::TIMESTAMP_FORMAT;

pub type DbPool = Pool<SqliteConnectionManager>;
pub type DbConn = PooledConnection<SqliteConnectionManager>;

/// Parse a SQLite datetime string into a DateTime<Utc>
pub(crate) fn parse_datetime(s: &str) -> DateTime<Utc> {
    // SQLite stores as "YYYY-MM-DD HH:MM:SS" format
    chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
        .map(|dt| dt.and_utc())
        .unwrap_or_else(|_| Utc::now())
}

/// Database wrapper with connection pooling
///
/// Cloneable; constructed once at the process entry point and injected into
/// the pipeline. Nothing in this crate reads connection details from the
/// environment.
#[derive(Clone)]
pub struct Database {
    pool: DbPool,
    /// Path to the database file
    db_path: String,
}

impl Database {
    /// Open (creating if needed) a database at the given path.
    pub fn new(path: &str) -> Result<Self> {
        let manager = SqliteConnectionManager::file(path);
        let pool = Pool::builder().max_size(10).build(manager)?;

        let db = Self {
            pool,
            db_path: path.to_string(),
        };
        db.run_migrations()?;

        Ok(db)
    }

    /// Get the path to the database file
    pub fn path(&self) -> &str {
        &self.db_path
    }

    /// Create a throwaway database (for testing)
    ///
    /// Uses a temporary file rather than `:memory:` because every pooled
    /// connection must see the same database.
    pub fn in_memory() -> Result<Self> {
        use std::sync::atomic::{AtomicU64, Ordering};
        static COUNTER: AtomicU64 = AtomicU64::new(0);

        let id = COUNTER.fetch_add(1, Ordering::SeqCst);
        let path = format!(
            "{}/siphon_test_{}_{}.db",
            std::env::temp_dir().display(),
            std::process::id(),
            id
        );

        // Remove any existing file
        let _ = std::fs::remove_file(&path);

        Self::new(&path)
    }

    /// Get a connection from the pool
    pub fn conn(&self) -> Result<DbConn> {
        Ok(self.pool.get()?)
    }

    /// Run database migrations
    fn run_migrations(&self) -> Result<()> {
        let conn = self.conn()?;

        conn.execute_batch(
            r#"
            -- Performance pragmas for local storage
            -- WAL mode: better concurrency, readers don't block writers
            -- Note: creates -wal and -shm sidecar files alongside the database
            PRAGMA journal_mode = WAL;

            -- Cache size: ~8MB (2000 pages * 4KB default page size)
            PRAGMA cache_size = 2000;

            -- Synchronous NORMAL: good balance of safety and performance
            PRAGMA synchronous = NORMAL;

            -- Store temp tables in memory (faster for large batch writes)
            PRAGMA temp_store = MEMORY;

            -- Ingested transactions. transaction_id is the idempotency key:
            -- the batch writer inserts with ON CONFLICT DO NOTHING, so the
            -- first-seen row for an id is never overwritten.
            CREATE TABLE IF NOT EXISTS transactions (
                transaction_id TEXT PRIMARY KEY,
                user_id INTEGER NOT NULL,
                product_id INTEGER NOT NULL,
                timestamp DATETIME NOT NULL,
                transaction_amount TEXT NOT NULL,           -- canonical 2-digit decimal text
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );

            -- The (user_id, timestamp) composite index is owned by
            -- Database::ensure_indexes, which the orchestrator invokes.

            -- Ingestion runs (one row per pipeline execution)
            CREATE TABLE IF NOT EXISTS ingestion_runs (
                id INTEGER PRIMARY KEY,
                source_name TEXT NOT NULL,                  -- original file name, for display
                status TEXT NOT NULL DEFAULT 'pending',     -- pending, validating, transcoding, writing, completed, failed
                rows_presented INTEGER NOT NULL DEFAULT 0,  -- rows handed to the writer, duplicates included
                batches_written INTEGER NOT NULL DEFAULT 0,
                error TEXT,                                 -- terminal failure message
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                started_at DATETIME,                        -- set when the run leaves 'pending'
                finished_at DATETIME                        -- set on completed/failed
            );

            CREATE INDEX IF NOT EXISTS idx_ingestion_runs_status ON ingestion_runs(status);
            CREATE INDEX IF NOT EXISTS idx_ingestion_runs_created ON ingestion_runs(created_at);
            "#,
        )?;

        info!("Database schema initialized");
        Ok(())
    }
}
