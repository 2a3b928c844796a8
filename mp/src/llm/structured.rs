//! Schema-constrained generation
//!
//! A type describes its JSON schema and the name of the `submit_*` tool the
//! model must call; `generate_structured` forces that tool call and
//! deserializes its input. Deeper semantic checks (length bounds and the
//! like) are the caller's job once it holds a typed value.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{debug, warn};

use super::{CompletionRequest, CompletionResponse, LlmClient, LlmError, Message, ToolChoice, ToolDefinition};

/// A value the model can be asked to produce through a forced tool call
pub trait StructuredOutput: DeserializeOwned {
    /// Name of the submit tool (e.g. `submit_tasks`)
    const TOOL_NAME: &'static str;

    /// Description shown to the model for the submit tool
    const DESCRIPTION: &'static str;

    /// JSON schema of the tool input
    fn schema() -> serde_json::Value;

    /// Tool definition for the request
    fn tool() -> ToolDefinition {
        ToolDefinition::new(Self::TOOL_NAME, Self::DESCRIPTION, Self::schema())
    }
}

/// Failure to obtain a schema-conforming value
#[derive(Debug, Error)]
pub enum StructuredError {
    #[error("LLM call failed: {0}")]
    Llm(#[from] LlmError),

    #[error("Model did not call '{tool}' and returned no parseable JSON")]
    NoOutput { tool: &'static str },

    #[error("Output of '{tool}' does not match its schema: {source}")]
    Schema {
        tool: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

/// Ask the model for a `T`, forcing the `T::TOOL_NAME` tool call
pub async fn generate_structured<T: StructuredOutput>(
    llm: &Arc<dyn LlmClient>,
    system_prompt: String,
    user_prompt: String,
    max_tokens: u32,
) -> Result<T, StructuredError> {
    debug!(tool = T::TOOL_NAME, model = llm.model(), "generate_structured: called");
    let request = CompletionRequest {
        system_prompt,
        messages: vec![Message::user(user_prompt)],
        tools: vec![T::tool()],
        tool_choice: ToolChoice::Tool(T::TOOL_NAME.to_string()),
        max_tokens,
        temperature: None,
    };

    let response = llm.complete(request).await?;
    parse_structured(response)
}

/// Extract a `T` from a response: the submit tool call first, then JSON text
pub fn parse_structured<T: StructuredOutput>(response: CompletionResponse) -> Result<T, StructuredError> {
    if let Some(call) = response.tool_calls.into_iter().find(|c| c.name == T::TOOL_NAME) {
        debug!(tool = T::TOOL_NAME, "parse_structured: found submit tool call");
        return serde_json::from_value(call.input).map_err(|source| StructuredError::Schema {
            tool: T::TOOL_NAME,
            source,
        });
    }

    if let Some(content) = response.content {
        let json = strip_code_fence(&content);
        if json.starts_with('{') {
            warn!(tool = T::TOOL_NAME, "parse_structured: no tool call, falling back to JSON content");
            return serde_json::from_str(json).map_err(|source| StructuredError::Schema {
                tool: T::TOOL_NAME,
                source,
            });
        }
    }

    Err(StructuredError::NoOutput { tool: T::TOOL_NAME })
}

/// Strip a surrounding ```json fence if the model added one
fn strip_code_fence(content: &str) -> &str {
    let trimmed = content.trim();
    trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.strip_suffix("```"))
        .map(str::trim)
        .unwrap_or(trimmed)
}
