//! Foreground ingestion command

use std::path::Path;

use anyhow::{Context, Result};
use siphon_core::{ingest_file, IngestOptions, RetryPolicy};

use super::open_db;

/// Run the full ingestion pipeline in the foreground.
///
/// Unlike the web upload path this drives the file the caller named, so
/// the source is kept unless `--remove-source` asks otherwise. The run is
/// recorded either way, failures included.
pub fn cmd_ingest(
    db_path: &Path,
    file: &Path,
    batch_size: usize,
    remove_source: bool,
) -> Result<()> {
    if !file.exists() {
        anyhow::bail!("File not found: {}", file.display());
    }

    let source_name = file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| file.display().to_string());

    println!("📥 Ingesting {}...", file.display());

    let db = open_db(db_path)?;
    let run_id = db.create_run(&source_name)?;

    let options = IngestOptions {
        batch_size,
        retry: RetryPolicy::default(),
        remove_source,
    };

    let (rows, batches) = ingest_file(&db, run_id, file, &options)
        .with_context(|| format!("Ingestion run {} failed", run_id))?;

    println!("✅ Ingestion complete!");
    println!("   Rows presented: {}", rows);
    println!("   Batches written: {}", batches);
    println!("   Stored transactions: {}", db.count_transactions()?);
    if remove_source {
        println!("   Source file removed");
    }

    Ok(())
}
