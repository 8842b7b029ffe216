//! CLI argument definitions using clap
//!
//! This module contains all the clap structs and enums for parsing CLI arguments.
//! The actual command implementations are in the `commands` module.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use siphon_core::DEFAULT_BATCH_SIZE;

/// Siphon - Chunked CSV transaction ingestion
#[derive(Parser)]
#[command(name = "siphon")]
#[command(about = "Idempotent transaction CSV ingestion service", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Database path
    #[arg(long, default_value = "siphon.db", global = true)]
    pub db: PathBuf,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize the database
    Init,

    /// Ingest a transactions CSV file
    Ingest {
        /// CSV file to ingest
        #[arg(short, long)]
        file: PathBuf,

        /// Rows per write batch
        #[arg(long, default_value_t = DEFAULT_BATCH_SIZE)]
        batch_size: usize,

        /// Delete the source file after a successful run
        #[arg(long)]
        remove_source: bool,
    },

    /// Generate sample transaction CSV files
    Generate {
        /// Rows per file
        #[arg(short, long, default_value = "1000")]
        rows: usize,

        /// Number of files to generate
        #[arg(long, default_value = "1")]
        files: usize,

        /// Output directory
        #[arg(short, long, default_value = "data")]
        out: PathBuf,

        /// Spread timestamps over yesterday only (default: the past year)
        #[arg(long)]
        daily: bool,
    },

    /// List recent ingestion runs
    Runs {
        /// Maximum number of runs to show
        #[arg(short, long, default_value = "20")]
        limit: i64,
    },

    /// Start the web server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "3000")]
        port: u16,

        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Directory where uploads are staged before ingestion
        #[arg(long, default_value = "uploads")]
        upload_dir: PathBuf,
    },
}
