//! LLM client module
//!
//! Provider clients behind the [`LlmClient`] trait, plus schema-constrained
//! generation on top of forced tool calls.

use std::sync::Arc;

use tracing::debug;

mod anthropic;
pub mod client;
mod error;
mod openai;
pub mod structured;
mod types;

pub use anthropic::AnthropicClient;
pub use client::LlmClient;
pub use error::LlmError;
pub use openai::OpenAIClient;
pub use structured::{StructuredError, StructuredOutput, generate_structured, parse_structured};
pub use types::{
    CompletionRequest, CompletionResponse, ContentBlock, Message, MessageContent, Role, StopReason, TokenUsage,
    ToolCall, ToolChoice, ToolDefinition,
};

use crate::config::ResolvedLlmConfig;

/// Create an LLM client from a resolved configuration
///
/// Supports "anthropic" and "openai" providers.
pub fn create_client(config: &ResolvedLlmConfig) -> Result<Arc<dyn LlmClient>, LlmError> {
    debug!(provider = %config.provider, model = %config.model, "create_client: called");
    match config.provider.as_str() {
        "anthropic" => Ok(Arc::new(AnthropicClient::from_config(config)?)),
        "openai" => Ok(Arc::new(OpenAIClient::from_config(config)?)),
        other => {
            debug!(provider = %other, "create_client: unknown provider");
            Err(LlmError::UnknownProvider(other.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolved(provider: &str) -> ResolvedLlmConfig {
        ResolvedLlmConfig {
            provider: provider.to_string(),
            model: "some-model".to_string(),
            api_key: "key".to_string(),
            base_url: "https://example.invalid".to_string(),
            max_tokens: 1024,
            timeout_ms: 1000,
            temperature: 0.0,
        }
    }

    #[test]
    fn test_create_client_known_providers() {
        assert_eq!(create_client(&resolved("openai")).unwrap().model(), "some-model");
        assert_eq!(create_client(&resolved("anthropic")).unwrap().model(), "some-model");
    }

    #[test]
    fn test_create_client_unknown_provider() {
        let err = create_client(&resolved("bard")).err().unwrap();
        assert!(matches!(err, LlmError::UnknownProvider(ref p) if p == "bard"));
    }
}
