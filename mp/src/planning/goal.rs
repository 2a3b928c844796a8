//! Goal and response optimization
//!
//! Before decomposition the raw query is turned into a concrete goal, then
//! sharpened into a measurable one, and a specification of how the final
//! answer should read is derived from it.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info};

use super::PlanError;
use crate::domain::ValidationError;
use crate::llm::{CompletionRequest, LlmClient, StructuredOutput, generate_structured};
use crate::prompts::PromptLoader;

const GOAL_SYSTEM_PROMPT: &str = "You turn vague requests into precise, verifiable goals for a research agent.";
const RESPONSE_SYSTEM_PROMPT: &str = "You design the shape of answers so they serve their reader.";

/// A goal with the metrics that show it was reached
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptimizedGoal {
    pub description: String,
    #[serde(default)]
    pub metrics: Vec<String>,
}

impl OptimizedGoal {
    /// Goal and metrics as a single text, the form downstream prompts take
    pub fn text(&self) -> String {
        if self.metrics.is_empty() {
            return self.description.clone();
        }
        format!(
            "{}\n(Measurement criteria: {})",
            self.description,
            self.metrics.join("; ")
        )
    }
}

impl StructuredOutput for OptimizedGoal {
    const TOOL_NAME: &'static str = "submit_optimized_goal";
    const DESCRIPTION: &'static str = "Submit the optimized goal and its measurable success criteria.";

    fn schema() -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "description": {
                    "type": "string",
                    "description": "The goal, specific and measurable"
                },
                "metrics": {
                    "type": "array",
                    "items": { "type": "string" },
                    "minItems": 1,
                    "maxItems": 5,
                    "description": "Criteria that show the goal was reached"
                }
            },
            "required": ["description", "metrics"]
        })
    }
}

/// How the final answer should be written
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptimizedResponse {
    pub spec: String,
}

/// Turns a raw query into an optimized goal
#[async_trait]
pub trait GoalOptimizer: Send + Sync {
    async fn optimize(&self, query: &str) -> Result<OptimizedGoal, PlanError>;
}

/// Derives a response specification from an optimized goal
#[async_trait]
pub trait ResponseOptimizer: Send + Sync {
    async fn optimize(&self, goal: &str) -> Result<OptimizedResponse, PlanError>;
}

/// Two-stage LLM goal optimizer: goal creation, then SMART refinement
pub struct LlmGoalOptimizer {
    llm: Arc<dyn LlmClient>,
    prompts: Arc<PromptLoader>,
    current_date: String,
    max_tokens: u32,
}

impl LlmGoalOptimizer {
    pub fn new(llm: Arc<dyn LlmClient>, prompts: Arc<PromptLoader>) -> Self {
        Self {
            llm,
            prompts,
            current_date: super::today(),
            max_tokens: 1024,
        }
    }

    /// Fix the date used in prompts (for deterministic tests)
    pub fn with_current_date(mut self, date: impl Into<String>) -> Self {
        self.current_date = date.into();
        self
    }

    async fn create_goal(&self, query: &str) -> Result<String, PlanError> {
        debug!(model = self.llm.model(), "LlmGoalOptimizer::create_goal: called");
        let prompt = self.prompts.render(
            "goal-create",
            &json!({ "current_date": self.current_date, "query": query }),
        )?;
        let response = self
            .llm
            .complete(CompletionRequest::text(GOAL_SYSTEM_PROMPT, prompt, self.max_tokens))
            .await?;

        response
            .content
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .ok_or_else(|| PlanError::generation("goal creation returned no text"))
    }
}

#[async_trait]
impl GoalOptimizer for LlmGoalOptimizer {
    async fn optimize(&self, query: &str) -> Result<OptimizedGoal, PlanError> {
        debug!(query_len = query.len(), "LlmGoalOptimizer::optimize: called");
        if query.trim().is_empty() {
            return Err(ValidationError::EmptyGoal.into());
        }

        let goal = self.create_goal(query).await?;
        let prompt = self.prompts.render(
            "goal-optimize",
            &json!({ "current_date": self.current_date, "goal": goal }),
        )?;
        let optimized: OptimizedGoal =
            generate_structured(&self.llm, GOAL_SYSTEM_PROMPT.to_string(), prompt, self.max_tokens).await?;

        if optimized.description.trim().is_empty() {
            return Err(ValidationError::EmptyGoal.into());
        }
        info!(metrics = optimized.metrics.len(), "Goal optimized");
        Ok(optimized)
    }
}

/// LLM response optimizer
pub struct LlmResponseOptimizer {
    llm: Arc<dyn LlmClient>,
    prompts: Arc<PromptLoader>,
    max_tokens: u32,
}

impl LlmResponseOptimizer {
    pub fn new(llm: Arc<dyn LlmClient>, prompts: Arc<PromptLoader>) -> Self {
        Self {
            llm,
            prompts,
            max_tokens: 1024,
        }
    }
}

#[async_trait]
impl ResponseOptimizer for LlmResponseOptimizer {
    async fn optimize(&self, goal: &str) -> Result<OptimizedResponse, PlanError> {
        debug!(goal_len = goal.len(), "LlmResponseOptimizer::optimize: called");
        let prompt = self.prompts.render("response-optimize", &json!({ "goal": goal }))?;
        let response = self
            .llm
            .complete(CompletionRequest::text(RESPONSE_SYSTEM_PROMPT, prompt, self.max_tokens))
            .await?;

        let spec = response
            .content
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .ok_or_else(|| PlanError::generation("response optimization returned no text"))?;
        Ok(OptimizedResponse { spec })
    }
}
