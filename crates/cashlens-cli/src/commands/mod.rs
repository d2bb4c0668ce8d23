//! CLI command implementations
//!
//! - `parse` - Ledger parsing and preview
//! - `analyze` - Full analysis pipeline and dashboard rendering

pub mod analyze;
pub mod parse;

// Re-export command functions for main.rs
pub use analyze::*;
pub use parse::*;

/// Truncate a string to a maximum number of characters, adding "..." if truncated
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
