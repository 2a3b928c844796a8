//! Tool trait definition

use async_trait::async_trait;
use serde_json::Value;

use super::context::ToolContext;
use super::error::ToolError;

/// A tool the executor model can call during a research loop
#[async_trait]
pub trait Tool: Send + Sync {
    /// Tool name (matches the tool_use name the model sends)
    fn name(&self) -> &'static str;

    /// Description shown to the model
    fn description(&self) -> &'static str;

    /// JSON Schema for input parameters
    fn input_schema(&self) -> Value;

    /// Execute the tool; failures come back as an error result, not a panic
    async fn execute(&self, input: Value, ctx: &ToolContext) -> ToolResult;
}

/// Result of a tool execution, fed back to the model as a tool_result block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolResult {
    pub content: String,
    pub is_error: bool,
}

impl ToolResult {
    pub fn success(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            is_error: false,
        }
    }

    pub fn error(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            is_error: true,
        }
    }
}

impl From<Result<String, ToolError>> for ToolResult {
    fn from(result: Result<String, ToolError>) -> Self {
        match result {
            Ok(content) => Self::success(content),
            Err(e) => Self::error(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_ok() {
        let result: ToolResult = Ok("3 results".to_string()).into();
        assert!(!result.is_error);
        assert_eq!(result.content, "3 results");
    }

    #[test]
    fn test_from_err() {
        let result: ToolResult = Err(ToolError::InvalidArgument("query is required".to_string())).into();
        assert!(result.is_error);
        assert_eq!(result.content, "Invalid argument: query is required");
    }
}
