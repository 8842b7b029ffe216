//! Core command implementations and shared utilities
//!
//! This module contains:
//! - `open_db` - Shared utility to open the database
//! - `cmd_init` - Initialize the database

use std::path::Path;

use anyhow::{Context, Result};
use siphon_core::Database;

/// Open the database, creating the schema on first use
pub fn open_db(db_path: &Path) -> Result<Database> {
    let path_str = db_path
        .to_str()
        .ok_or_else(|| anyhow::anyhow!("Database path must be valid UTF-8"))?;
    Database::new(path_str).context("Failed to open database")
}

pub fn cmd_init(db_path: &Path) -> Result<()> {
    println!("🔧 Initializing database at {}...", db_path.display());

    let db = open_db(db_path)?;
    db.ensure_indexes();
    println!("   Schema ready, query indexes in place");

    println!("✅ Database initialized successfully!");
    println!();
    println!("Next steps:");
    println!("  1. Generate sample data: siphon generate --rows 100000");
    println!("  2. Ingest a file: siphon ingest --file data/<name>.csv");
    println!("  3. Start the web API: siphon serve");

    Ok(())
}
