//! Tool system for research task execution
//!
//! Tools give the executor model access to the web. Each call gets a
//! [`ToolContext`] naming the run and task it belongs to, and every failure
//! comes back to the model as an error [`ToolResult`] so the loop can recover.

mod context;
mod error;
mod executor;
mod traits;

pub mod builtin;

pub use builtin::{SearchProvider, SearchSettings};
pub use context::ToolContext;
pub use error::ToolError;
pub use executor::ToolExecutor;
pub use traits::{Tool, ToolResult};

/// Truncate to `max` characters, marking the cut
pub fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((cut, _)) => format!("{}...", &s[..cut]),
        None => s.to_string(),
    }
}
