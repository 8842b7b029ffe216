//! Run history command

use anyhow::Result;
use siphon_core::{Database, RunStatus};

use super::truncate;

pub fn cmd_runs(db: &Database, limit: i64) -> Result<()> {
    let runs = db.list_runs(limit)?;

    if runs.is_empty() {
        println!("No ingestion runs recorded. Ingest a file with:");
        println!("  siphon ingest --file transactions.csv");
        return Ok(());
    }

    println!();
    println!("📜 Recent Ingestion Runs");
    println!("   ──────────────────────────────────────────────────────────────");

    for run in runs {
        println!(
            "   [{}] {} │ {:>9} │ {:>9} rows │ {}",
            run.id,
            run.created_at.format("%Y-%m-%d %H:%M"),
            format_status(run.status),
            run.rows_presented,
            truncate(&run.source_name, 32)
        );
        if let Some(error) = &run.error {
            println!("        ↳ {}", truncate(error, 70));
        }
    }

    Ok(())
}

fn format_status(status: RunStatus) -> String {
    match status {
        RunStatus::Completed => format!("\x1b[32m{}\x1b[0m", status), // Green
        RunStatus::Failed => format!("\x1b[31m{}\x1b[0m", status),    // Red
        other => other.to_string(),
    }
}
