//! Result aggregation into the final answer

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::json;
use tracing::{debug, info};

use super::PlanError;
use crate::domain::PlanState;
use crate::llm::{CompletionRequest, LlmClient};
use crate::prompts::PromptLoader;

const SYSTEM_PROMPT: &str = "You write the final answer of a research run from the findings of its tasks.";

/// Synthesizes `final_output` from a fully executed plan
#[async_trait]
pub trait ResultAggregator: Send + Sync {
    async fn aggregate(&self, state: &PlanState) -> Result<String, PlanError>;
}

#[derive(Debug, Serialize)]
struct ResultEntry<'a> {
    index: usize,
    task_name: &'a str,
    option: &'a str,
    result: &'a str,
}

/// Collect `(task, chosen option, result)` triples in task order
fn result_entries(state: &PlanState) -> Vec<ResultEntry<'_>> {
    state
        .steps()
        .prefix()
        .filter_map(|step| {
            let task = state.task(step.task_index)?;
            let option = task.options.get(step.option_index)?;
            Some(ResultEntry {
                index: step.task_index + 1,
                task_name: &task.name,
                option: &option.description,
                result: &step.result,
            })
        })
        .collect()
}

pub struct LlmAggregator {
    llm: Arc<dyn LlmClient>,
    prompts: Arc<PromptLoader>,
    max_tokens: u32,
}

impl LlmAggregator {
    pub fn new(llm: Arc<dyn LlmClient>, prompts: Arc<PromptLoader>) -> Self {
        Self {
            llm,
            prompts,
            max_tokens: 4096,
        }
    }
}

#[async_trait]
impl ResultAggregator for LlmAggregator {
    async fn aggregate(&self, state: &PlanState) -> Result<String, PlanError> {
        let results = result_entries(state);
        debug!(result_count = results.len(), "LlmAggregator::aggregate: called");

        let prompt = self.prompts.render(
            "aggregate",
            &json!({
                "query": state.query(),
                "results": results,
                "response_spec": state.optimized_response().unwrap_or("A clear, well-structured answer."),
            }),
        )?;

        let response = self
            .llm
            .complete(CompletionRequest::text(SYSTEM_PROMPT, prompt, self.max_tokens))
            .await?;

        let output = response
            .content
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .ok_or_else(|| PlanError::generation("aggregation returned no text"))?;
        info!(output_len = output.len(), "Results aggregated");
        Ok(output)
    }
}
