//! Tool error types

use thiserror::Error;

/// Errors raised inside tool implementations
///
/// Tools never return these to the model directly; `Tool::execute` renders
/// them into an error [`ToolResult`](super::ToolResult) the model can read.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Unknown search provider: '{0}'. Supported: tavily, brave, serpapi")]
    UnknownProvider(String),

    #[error("Request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{service} returned {status}: {body}")]
    Api {
        service: &'static str,
        status: u16,
        body: String,
    },

    #[error("Response too large ({size} bytes)")]
    TooLarge { size: usize },
}
