//! Server command implementation

use std::path::{Path, PathBuf};

use anyhow::Result;

use super::open_db;

pub async fn cmd_serve(db_path: &Path, host: &str, port: u16, upload_dir: PathBuf) -> Result<()> {
    println!("🚀 Starting Siphon web server...");
    println!("   Database: {}", db_path.display());
    println!("   Listening: http://{}:{}", host, port);
    println!("   Upload staging: {}", upload_dir.display());
    println!();
    println!("   Press Ctrl+C to stop");

    let db = open_db(db_path)?;

    let config = siphon_server::ServerConfig {
        upload_dir,
        ..Default::default()
    };

    siphon_server::serve(db, host, port, config).await?;

    Ok(())
}
