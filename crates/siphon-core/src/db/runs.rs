//! Ingestion run ledger operations
//!
//! One row per pipeline execution. The orchestrator persists every state
//! transition here so background failures are observable after the trigger
//! has already returned.

use rusqlite::{params, OptionalExtension};

use super::{parse_datetime, Database};
use crate::error::Result;
use crate::models::{IngestionRun, RunStatus};

impl Database {
    /// Create a new ingestion run in the pending state
    pub fn create_run(&self, source_name: &str) -> Result<i64> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO ingestion_runs (source_name) VALUES (?)",
            params![source_name],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Advance a run to the given status
    ///
    /// Stamps `started_at` the first time the run leaves the pending state.
    pub fn update_run_status(&self, run_id: i64, status: RunStatus) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            r#"UPDATE ingestion_runs SET
                status = ?,
                started_at = COALESCE(started_at, datetime('now'))
            WHERE id = ?"#,
            params![status.as_str(), run_id],
        )?;
        Ok(())
    }

    /// Update per-batch progress counters
    pub fn update_run_progress(
        &self,
        run_id: i64,
        rows_presented: i64,
        batches_written: i64,
    ) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            r#"UPDATE ingestion_runs SET
                rows_presented = ?,
                batches_written = ?
            WHERE id = ?"#,
            params![rows_presented, batches_written, run_id],
        )?;
        Ok(())
    }

    /// Mark a run as completed with its final counts
    pub fn mark_run_completed(
        &self,
        run_id: i64,
        rows_presented: i64,
        batches_written: i64,
    ) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            r#"UPDATE ingestion_runs SET
                status = 'completed',
                rows_presented = ?,
                batches_written = ?,
                finished_at = datetime('now')
            WHERE id = ?"#,
            params![rows_presented, batches_written, run_id],
        )?;
        Ok(())
    }

    /// Mark a run as failed
    pub fn mark_run_failed(&self, run_id: i64, error: &str) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            r#"UPDATE ingestion_runs SET
                status = 'failed',
                error = ?,
                finished_at = datetime('now')
            WHERE id = ?"#,
            params![error, run_id],
        )?;
        Ok(())
    }

    /// Get a single run by id
    pub fn get_run(&self, run_id: i64) -> Result<Option<IngestionRun>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, source_name, status, rows_presented, batches_written, error,
                    created_at, started_at, finished_at
             FROM ingestion_runs WHERE id = ?",
        )?;

        let run = stmt
            .query_row(params![run_id], |row| Self::map_run_row(row))
            .optional()?;

        Ok(run)
    }

    /// List recent runs, newest first
    pub fn list_runs(&self, limit: i64) -> Result<Vec<IngestionRun>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, source_name, status, rows_presented, batches_written, error,
                    created_at, started_at, finished_at
             FROM ingestion_runs
             ORDER BY created_at DESC, id DESC
             LIMIT ?",
        )?;

        let runs = stmt
            .query_map(params![limit], |row| Self::map_run_row(row))?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(runs)
    }

    /// Recover any runs left in a non-terminal state (e.g. due to process
    /// restart mid-ingestion). Marks them as failed.
    /// Returns the number of runs recovered.
    pub fn recover_stuck_runs(&self) -> Result<i64> {
        let conn = self.conn()?;
        let count = conn.execute(
            r#"UPDATE ingestion_runs SET
                status = 'failed',
                error = 'Server restarted during ingestion. Please re-submit the file.',
                finished_at = datetime('now')
            WHERE status NOT IN ('completed', 'failed')"#,
            [],
        )?;
        Ok(count as i64)
    }

    /// Helper to convert a row to IngestionRun
    /// Column order: id, source_name, status, rows_presented, batches_written,
    ///               error, created_at, started_at, finished_at
    fn map_run_row(row: &rusqlite::Row) -> rusqlite::Result<IngestionRun> {
        let status_str: String = row.get(2)?;
        let created_at_str: String = row.get(6)?;
        let started_at_str: Option<String> = row.get(7)?;
        let finished_at_str: Option<String> = row.get(8)?;
        Ok(IngestionRun {
            id: row.get(0)?,
            source_name: row.get(1)?,
            status: status_str.parse().unwrap_or(RunStatus::Pending),
            rows_presented: row.get(3)?,
            batches_written: row.get(4)?,
            error: row.get(5)?,
            created_at: parse_datetime(&created_at_str),
            started_at: started_at_str.map(|s| parse_datetime(&s)),
            finished_at: finished_at_str.map(|s| parse_datetime(&s)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup_test_db() -> Database {
        Database::in_memory().unwrap()
    }

    #[test]
    fn test_create_run_starts_pending() {
        let db = setup_test_db();
        let run_id = db.create_run("upload.csv").unwrap();

        let run = db.get_run(run_id).unwrap().unwrap();
        assert_eq!(run.source_name, "upload.csv");
        assert_eq!(run.status, RunStatus::Pending);
        assert_eq!(run.rows_presented, 0);
        assert_eq!(run.batches_written, 0);
        assert!(run.error.is_none());
        assert!(run.started_at.is_none());
        assert!(run.finished_at.is_none());
    }

    #[test]
    fn test_run_lifecycle_to_completed() {
        let db = setup_test_db();
        let run_id = db.create_run("upload.csv").unwrap();

        db.update_run_status(run_id, RunStatus::Validating).unwrap();
        let run = db.get_run(run_id).unwrap().unwrap();
        assert_eq!(run.status, RunStatus::Validating);
        assert!(run.started_at.is_some());

        db.update_run_status(run_id, RunStatus::Writing).unwrap();
        db.update_run_progress(run_id, 150, 3).unwrap();
        let run = db.get_run(run_id).unwrap().unwrap();
        assert_eq!(run.rows_presented, 150);
        assert_eq!(run.batches_written, 3);

        db.mark_run_completed(run_id, 200, 4).unwrap();
        let run = db.get_run(run_id).unwrap().unwrap();
        assert_eq!(run.status, RunStatus::Completed);
        assert_eq!(run.rows_presented, 200);
        assert!(run.finished_at.is_some());
    }

    #[test]
    fn test_mark_run_failed_records_error() {
        let db = setup_test_db();
        let run_id = db.create_run("upload.csv").unwrap();
        db.update_run_status(run_id, RunStatus::Transcoding).unwrap();

        db.mark_run_failed(run_id, "Unable to parse timestamp: notadate")
            .unwrap();

        let run = db.get_run(run_id).unwrap().unwrap();
        assert_eq!(run.status, RunStatus::Failed);
        assert_eq!(
            run.error.as_deref(),
            Some("Unable to parse timestamp: notadate")
        );
        assert!(run.finished_at.is_some());
    }

    #[test]
    fn test_get_run_missing_returns_none() {
        let db = setup_test_db();
        assert!(db.get_run(9999).unwrap().is_none());
    }

    #[test]
    fn test_list_runs_newest_first_with_limit() {
        let db = setup_test_db();
        let first = db.create_run("a.csv").unwrap();
        let second = db.create_run("b.csv").unwrap();
        let third = db.create_run("c.csv").unwrap();

        let runs = db.list_runs(2).unwrap();
        assert_eq!(runs.len(), 2);
        assert_eq!(runs[0].id, third);
        assert_eq!(runs[1].id, second);
        assert!(runs.iter().all(|r| r.id != first));
    }

    #[test]
    fn test_recover_stuck_runs_only_touches_non_terminal() {
        let db = setup_test_db();
        let stuck = db.create_run("stuck.csv").unwrap();
        db.update_run_status(stuck, RunStatus::Writing).unwrap();
        let done = db.create_run("done.csv").unwrap();
        db.mark_run_completed(done, 10, 1).unwrap();

        let recovered = db.recover_stuck_runs().unwrap();
        assert_eq!(recovered, 1);

        let stuck_run = db.get_run(stuck).unwrap().unwrap();
        assert_eq!(stuck_run.status, RunStatus::Failed);
        assert!(stuck_run.error.unwrap().contains("restarted"));

        let done_run = db.get_run(done).unwrap().unwrap();
        assert_eq!(done_run.status, RunStatus::Completed);
    }
}
