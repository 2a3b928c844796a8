//! LlmClient trait definition

use async_trait::async_trait;

use super::{CompletionRequest, CompletionResponse, LlmError};

/// Stateless LLM client - each call is independent
///
/// Every planning component talks to the model through this trait, so the
/// generation backend can be swapped (OpenAI, Anthropic, scripted mocks)
/// without touching the components.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Send a single completion request and wait for the full response
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError>;

    /// Model identifier, for logging
    fn model(&self) -> &str;
}

#[cfg(test)]
pub mod mock {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tracing::debug;

    /// Mock LLM client for unit tests
    ///
    /// Replays scripted responses in order and records every request it sees.
    pub struct MockLlmClient {
        responses: Vec<Result<CompletionResponse, String>>,
        call_count: AtomicUsize,
        requests: Mutex<Vec<CompletionRequest>>,
    }

    impl MockLlmClient {
        pub fn new(responses: Vec<CompletionResponse>) -> Self {
            debug!(response_count = %responses.len(), "MockLlmClient::new: called");
            Self::scripted(responses.into_iter().map(Ok).collect())
        }

        /// Script a mix of successes and failures (`Err` becomes `LlmError::ApiError`)
        pub fn scripted(responses: Vec<Result<CompletionResponse, String>>) -> Self {
            Self {
                responses,
                call_count: AtomicUsize::new(0),
                requests: Mutex::new(Vec::new()),
            }
        }

        pub fn call_count(&self) -> usize {
            self.call_count.load(Ordering::SeqCst)
        }

        pub fn requests(&self) -> Vec<CompletionRequest> {
            self.requests.lock().map(|r| r.clone()).unwrap_or_default()
        }
    }

    #[async_trait]
    impl LlmClient for MockLlmClient {
        async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
            debug!("MockLlmClient::complete: called");
            if let Ok(mut requests) = self.requests.lock() {
                requests.push(request);
            }
            let idx = self.call_count.fetch_add(1, Ordering::SeqCst);
            match self.responses.get(idx) {
                Some(Ok(response)) => Ok(response.clone()),
                Some(Err(message)) => Err(LlmError::ApiError {
                    status: 500,
                    message: message.clone(),
                }),
                None => Err(LlmError::InvalidResponse("No more mock responses".to_string())),
            }
        }

        fn model(&self) -> &str {
            "mock"
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[tokio::test]
        async fn test_mock_client_returns_responses_in_order() {
            let client = MockLlmClient::new(vec![
                CompletionResponse::text("Response 1"),
                CompletionResponse::text("Response 2"),
            ]);

            let req = CompletionRequest::text("Test", "hello", 1000);

            let resp1 = client.complete(req.clone()).await.unwrap();
            assert_eq!(resp1.content, Some("Response 1".to_string()));

            let resp2 = client.complete(req).await.unwrap();
            assert_eq!(resp2.content, Some("Response 2".to_string()));

            assert_eq!(client.call_count(), 2);
            assert_eq!(client.requests().len(), 2);
        }

        #[tokio::test]
        async fn test_mock_client_errors_when_exhausted() {
            let client = MockLlmClient::new(vec![]);
            let result = client.complete(CompletionRequest::text("Test", "hello", 10)).await;
            assert!(result.is_err());
        }

        #[tokio::test]
        async fn test_mock_client_scripted_failure() {
            let client = MockLlmClient::scripted(vec![Err("boom".to_string())]);
            let result = client.complete(CompletionRequest::text("Test", "hello", 10)).await;
            assert!(matches!(result, Err(LlmError::ApiError { status: 500, .. })));
        }
    }
}
