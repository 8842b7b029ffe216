//! Sample data generation command

use std::path::Path;

use anyhow::Result;
use siphon_core::generate::{generate_csv_file, Window};

pub fn cmd_generate(out: &Path, rows: usize, files: usize, daily: bool) -> Result<()> {
    let window = if daily {
        Window::Daily
    } else {
        Window::LastYear
    };

    println!(
        "🎲 Generating {} file(s) with {} rows each in {}...",
        files,
        rows,
        out.display()
    );

    for _ in 0..files {
        let path = generate_csv_file(out, rows, window)?;
        println!("   Wrote {}", path.display());
    }

    println!("✅ Generation complete!");
    println!();
    println!("   Ingest with: siphon ingest --file <path>");

    Ok(())
}
