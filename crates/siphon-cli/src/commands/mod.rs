//! CLI command implementations
//!
//! Commands are organized by domain:
//! - `core` - Core commands (init) and shared utilities (open_db)
//! - `generate` - Sample CSV generation command
//! - `ingest` - Foreground CSV ingestion command
//! - `runs` - Run history listing command
//! - `serve` - Web server command

pub mod core;
pub mod generate;
pub mod ingest;
pub mod runs;
pub mod serve;

// Re-export command functions for main.rs
pub use core::*;
pub use generate::*;
pub use ingest::*;
pub use runs::*;
pub use serve::*;

/// Truncate a string to at most `max` characters, adding "..." if truncated
///
/// Counts characters rather than bytes; run names and error text can carry
/// multi-byte input and must never split one.
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
