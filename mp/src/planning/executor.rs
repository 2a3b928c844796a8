//! Task execution
//!
//! [`ResearchExecutor`] runs the chosen option as a tool-using conversation:
//! the model searches and fetches until it ends its turn, and the final
//! assistant text becomes the task result.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use tracing::{debug, info, warn};

use super::PlanError;
use crate::domain::{PlanState, Task, TaskOption};
use crate::llm::{
    CompletionRequest, CompletionResponse, ContentBlock, LlmClient, Message, StopReason, TokenUsage, ToolChoice,
};
use crate::prompts::PromptLoader;
use crate::tools::{ToolContext, ToolExecutor, ToolResult};

const SYSTEM_PROMPT: &str = "You are a research assistant. Complete the task with the available tools \
     and report concrete, sourced findings.";

const CONTINUE_PROMPT: &str = "Continue from where you left off. Your previous response was truncated.";

const WRAP_UP_PROMPT: &str = "You have used all available tool turns. Summarize your findings now without calling tools.";

/// Runs one task with its chosen option
#[async_trait]
pub trait TaskExecutor: Send + Sync {
    async fn execute(
        &self,
        task_index: usize,
        task: &Task,
        option: &TaskOption,
        state: &PlanState,
    ) -> Result<String, PlanError>;
}

/// Agentic research loop over search and fetch tools
pub struct ResearchExecutor {
    llm: Arc<dyn LlmClient>,
    tools: Arc<ToolExecutor>,
    prompts: Arc<PromptLoader>,
    current_date: String,
    max_turns: u32,
    max_tokens: u32,
}

impl ResearchExecutor {
    pub fn new(llm: Arc<dyn LlmClient>, tools: Arc<ToolExecutor>, prompts: Arc<PromptLoader>, max_turns: u32) -> Self {
        Self {
            llm,
            tools,
            prompts,
            current_date: super::today(),
            max_turns: max_turns.max(1),
            max_tokens: 4096,
        }
    }

    pub fn with_current_date(mut self, date: impl Into<String>) -> Self {
        self.current_date = date.into();
        self
    }

    async fn run_loop(&self, task_index: usize, prompt: String, ctx: &ToolContext) -> Result<String, PlanError> {
        let tool_defs = self.tools.definitions();
        let mut messages = vec![Message::user(prompt)];
        // Latest answer; text of truncated turns is joined with its continuation
        let mut answer = String::new();
        let mut continuing = false;
        let mut usage = TokenUsage::default();
        let mut turn = 0;

        loop {
            turn += 1;
            let out_of_turns = turn > self.max_turns;
            if out_of_turns {
                // Tools stay defined because the history holds tool_use blocks
                warn!(task_index, max_turns = self.max_turns, "Max turns reached, asking for a summary");
                messages.push(Message::user(WRAP_UP_PROMPT));
            }

            let request = CompletionRequest {
                system_prompt: SYSTEM_PROMPT.to_string(),
                messages: messages.clone(),
                tools: tool_defs.clone(),
                tool_choice: if out_of_turns { ToolChoice::None } else { ToolChoice::Auto },
                max_tokens: self.max_tokens,
                temperature: None,
            };

            debug!(task_index, turn, "ResearchExecutor::run_loop: calling LLM");
            let response = self
                .llm
                .complete(request)
                .await
                .map_err(|e| PlanError::execution(task_index, e.to_string()))?;
            usage.add(&response.usage);

            if let Some(text) = response.content.as_deref().filter(|t| !t.trim().is_empty()) {
                if continuing {
                    answer.push_str(text);
                } else {
                    answer = text.to_string();
                }
            }
            messages.push(assistant_message(&response));

            continuing = false;
            match response.stop_reason {
                StopReason::ToolUse if !out_of_turns && !response.tool_calls.is_empty() => {
                    debug!(task_index, turn, tool_count = response.tool_calls.len(), "ResearchExecutor::run_loop: running tools");
                    let results = self.tools.execute_all(&response.tool_calls, ctx).await;
                    messages.push(tool_result_message(&results));
                }
                StopReason::MaxTokens if !out_of_turns => {
                    debug!(task_index, turn, "ResearchExecutor::run_loop: truncated, continuing");
                    continuing = true;
                    messages.push(Message::user(CONTINUE_PROMPT));
                }
                _ => break,
            }
        }

        info!(
            task_index,
            turns = turn,
            input_tokens = usage.input_tokens,
            output_tokens = usage.output_tokens,
            "Task executed"
        );

        let answer = answer.trim();
        if answer.is_empty() {
            return Err(PlanError::execution(task_index, "model produced no findings"));
        }
        Ok(answer.to_string())
    }
}

#[async_trait]
impl TaskExecutor for ResearchExecutor {
    async fn execute(
        &self,
        task_index: usize,
        task: &Task,
        option: &TaskOption,
        state: &PlanState,
    ) -> Result<String, PlanError> {
        debug!(task_index, task = %task.name, "ResearchExecutor::execute: called");
        let prompt = self
            .prompts
            .render(
                "execute-task",
                &json!({
                    "current_date": self.current_date,
                    "task_name": task.name,
                    "option": option.description,
                }),
            )
            .map_err(|e| PlanError::execution(task_index, e.to_string()))?;

        let ctx = ToolContext::new(state.run_id().as_str(), task_index, task.name.clone());
        self.run_loop(task_index, prompt, &ctx).await
    }
}

/// Assistant turn as content blocks, so tool_use ids line up with the results
fn assistant_message(response: &CompletionResponse) -> Message {
    let mut blocks = Vec::with_capacity(response.tool_calls.len() + 1);
    if let Some(text) = &response.content {
        blocks.push(ContentBlock::text(text));
    }
    blocks.extend(response.tool_calls.iter().map(|call| ContentBlock::ToolUse {
        id: call.id.clone(),
        name: call.name.clone(),
        input: call.input.clone(),
    }));
    Message::assistant_blocks(blocks)
}

fn tool_result_message(results: &[(String, ToolResult)]) -> Message {
    let blocks = results
        .iter()
        .map(|(id, result)| ContentBlock::tool_result(id, &result.content, result.is_error))
        .collect();
    Message::user_blocks(blocks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{DecomposedTasks, ErrorKind};
    use crate::llm::client::mock::MockLlmClient;
    use crate::llm::{MessageContent, ToolCall};
    use crate::tools::{Tool, ToolResult};
    use serde_json::Value;

    struct StubSearch;

    #[async_trait]
    impl Tool for StubSearch {
        fn name(&self) -> &'static str {
            "search"
        }

        fn description(&self) -> &'static str {
            "stub search"
        }

        fn input_schema(&self) -> Value {
            json!({ "type": "object" })
        }

        async fn execute(&self, input: Value, ctx: &ToolContext) -> ToolResult {
            ToolResult::success(format!("hits for {} (task {})", input["query"], ctx.task_index))
        }
    }

    fn executor(mock: Arc<MockLlmClient>, max_turns: u32) -> ResearchExecutor {
        let mut tools = ToolExecutor::empty();
        tools.add_tool(Box::new(StubSearch));
        ResearchExecutor::new(mock, Arc::new(tools), Arc::new(PromptLoader::embedded_only()), max_turns)
            .with_current_date("2026-02-02")
    }

    fn state() -> PlanState {
        let mut state = PlanState::new("q");
        let tasks = DecomposedTasks::new(vec![
            Task::new("a", ["x", "y"]),
            Task::new("b", ["x", "y"]),
            Task::new("c", ["x", "y"]),
        ])
        .unwrap();
        state.commit_decomposition("g".into(), "r".into(), tasks).unwrap();
        state
    }

    fn search_call(query: &str) -> CompletionResponse {
        CompletionResponse {
            content: None,
            tool_calls: vec![ToolCall {
                id: format!("call_{}", query),
                name: "search".to_string(),
                input: json!({ "query": query }),
            }],
            stop_reason: StopReason::ToolUse,
            usage: TokenUsage::default(),
        }
    }

    #[tokio::test]
    async fn test_tool_loop_returns_final_text() {
        let mock = Arc::new(MockLlmClient::new(vec![
            search_call("curry"),
            CompletionResponse::text("Curry shops: A and B."),
        ]));
        let task = Task::new("find shops", ["search the web", "ask forums"]);

        let result = executor(mock.clone(), 4)
            .execute(1, &task, &task.options[0], &state())
            .await
            .unwrap();
        assert_eq!(result, "Curry shops: A and B.");

        let requests = mock.requests();
        assert_eq!(requests.len(), 2);
        let first_prompt = requests[0].messages[0].content.as_text().unwrap();
        assert!(first_prompt.contains("Approach: search the web"));
        assert!(first_prompt.contains("CURRENT_DATE: 2026-02-02"));

        // Second request carries the tool_use turn and its tool_result
        let second = &requests[1].messages;
        assert_eq!(second.len(), 3);
        match &second[2].content {
            MessageContent::Blocks(blocks) => match &blocks[0] {
                ContentBlock::ToolResult { tool_use_id, content, .. } => {
                    assert_eq!(tool_use_id, "call_curry");
                    assert!(content.contains("task 1"));
                }
                other => panic!("unexpected block {:?}", other),
            },
            other => panic!("unexpected content {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_turn_limit_forces_summary_without_tools() {
        let mock = Arc::new(MockLlmClient::new(vec![
            search_call("one"),
            search_call("two"),
            CompletionResponse::text("Summary after limit."),
        ]));
        let task = Task::new("t", ["o1", "o2"]);

        let result = executor(mock.clone(), 2)
            .execute(0, &task, &task.options[1], &state())
            .await
            .unwrap();
        assert_eq!(result, "Summary after limit.");

        let requests = mock.requests();
        assert_eq!(requests.len(), 3);
        assert_eq!(requests[1].tool_choice, ToolChoice::Auto);
        // The wrap-up call keeps the tool definitions its history refers to
        assert_eq!(requests[2].tools.len(), 1);
        assert_eq!(requests[2].tool_choice, ToolChoice::None);
        assert!(requests[2].messages.last().unwrap().content.as_text().unwrap().contains("Summarize"));
    }

    #[tokio::test]
    async fn test_truncated_answer_is_joined_with_continuation() {
        let truncated = CompletionResponse {
            stop_reason: StopReason::MaxTokens,
            ..CompletionResponse::text("Shops: A on Main St, B near the ")
        };
        let mock = Arc::new(MockLlmClient::new(vec![
            search_call("curry"),
            truncated,
            CompletionResponse::text("station, C downtown."),
        ]));
        let task = Task::new("find shops", ["search the web", "ask forums"]);

        let result = executor(mock.clone(), 4)
            .execute(0, &task, &task.options[0], &state())
            .await
            .unwrap();
        assert_eq!(result, "Shops: A on Main St, B near the station, C downtown.");

        let requests = mock.requests();
        assert_eq!(requests.len(), 3);
        let last = requests[2].messages.last().unwrap().content.as_text().unwrap();
        assert_eq!(last, CONTINUE_PROMPT);
    }

    #[tokio::test]
    async fn test_text_before_tool_call_is_replaced_by_final_answer() {
        let mut searching = search_call("curry");
        searching.content = Some("Let me search.".to_string());
        let mock = Arc::new(MockLlmClient::new(vec![searching, CompletionResponse::text("Found A and B.")]));
        let task = Task::new("find shops", ["search the web", "ask forums"]);

        let result = executor(mock, 4)
            .execute(0, &task, &task.options[0], &state())
            .await
            .unwrap();
        assert_eq!(result, "Found A and B.");
    }

    #[tokio::test]
    async fn test_backend_failure_is_execution_error() {
        let mock = Arc::new(MockLlmClient::scripted(vec![Err("overloaded".to_string())]));
        let task = Task::new("t", ["o1", "o2"]);

        let err = executor(mock, 3)
            .execute(2, &task, &task.options[0], &state())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Execution);
        assert_eq!(err.task_index(), Some(2));
    }

    #[tokio::test]
    async fn test_no_text_is_execution_error() {
        let mock = Arc::new(MockLlmClient::new(vec![CompletionResponse::text("   ")]));
        let task = Task::new("t", ["o1", "o2"]);

        let err = executor(mock, 3)
            .execute(0, &task, &task.options[0], &state())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("no findings"));
    }
}
