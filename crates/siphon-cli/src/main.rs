//! Siphon CLI - Transaction CSV ingestion
//!
//! Usage:
//!   siphon init                    Initialize database
//!   siphon generate --rows 100000  Generate sample CSV files
//!   siphon ingest --file CSV       Ingest a transactions file
//!   siphon runs                    Show recent ingestion runs
//!   siphon serve --port 3000       Start web server

mod cli;
mod commands;


use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::*;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).compact())
        .init();

    match cli.command {
        Commands::Init => commands::cmd_init(&cli.db),
        Commands::Ingest {
            file,
            batch_size,
            remove_source,
        } => commands::cmd_ingest(&cli.db, &file, batch_size, remove_source),
        Commands::Generate {
            rows,
            files,
            out,
            daily,
        } => commands::cmd_generate(&out, rows, files, daily),
        Commands::Runs { limit } => {
            let db = commands::open_db(&cli.db)?;
            commands::cmd_runs(&db, limit)
        }
        Commands::Serve {
            port,
            host,
            upload_dir,
        } => commands::cmd_serve(&cli.db, &host, port, upload_dir).await,
    }
}
