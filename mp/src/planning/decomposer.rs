//! TaskDecomposer - LLM-driven decomposition of a goal into tasks with options
//!
//! The model submits its decomposition through a forced `submit_tasks` tool
//! call. The raw output is deserialized into a loose shape first and then
//! validated into [`DecomposedTasks`], so a bounds violation is reported as
//! a validation failure rather than a parse failure.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info};

use super::PlanError;
use crate::domain::{DecomposedTasks, MAX_OPTIONS, MAX_TASKS, MIN_OPTIONS, MIN_TASKS, Task, TaskOption, ValidationError};
use crate::llm::{LlmClient, StructuredOutput, generate_structured};
use crate::prompts::PromptLoader;

const SYSTEM_PROMPT: &str = "You are a planner that breaks goals into concrete, executable research tasks. \
     Every task offers alternative approaches so a later step can choose between them.";

/// Configuration for decomposition
#[derive(Debug, Clone)]
pub struct DecomposerConfig {
    /// The only actions generated tasks may rely on
    pub capabilities: Vec<String>,
    /// Token budget for the decomposition call
    pub max_tokens: u32,
}

impl Default for DecomposerConfig {
    fn default() -> Self {
        Self {
            capabilities: vec!["Research on the internet to gather the information the goal needs.".to_string()],
            max_tokens: 4096,
        }
    }
}

/// LLM output schema for one task
#[derive(Debug, Clone, Serialize, Deserialize)]
struct TaskOutput {
    #[serde(alias = "task_name")]
    name: String,
    #[serde(default, alias = "task_options")]
    options: Vec<OptionOutput>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct OptionOutput {
    #[serde(default)]
    description: String,
}

/// Full decomposition output from the LLM
#[derive(Debug, Clone, Serialize, Deserialize)]
struct DecompositionOutput {
    #[serde(alias = "values")]
    tasks: Vec<TaskOutput>,
}

impl StructuredOutput for DecompositionOutput {
    const TOOL_NAME: &'static str = "submit_tasks";
    const DESCRIPTION: &'static str = "Submit the decomposed tasks. Call this once with every task, in execution order.";

    fn schema() -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "tasks": {
                    "type": "array",
                    "minItems": MIN_TASKS,
                    "maxItems": MAX_TASKS,
                    "items": {
                        "type": "object",
                        "properties": {
                            "name": {
                                "type": "string",
                                "description": "Specific, self-contained task description"
                            },
                            "options": {
                                "type": "array",
                                "minItems": MIN_OPTIONS,
                                "maxItems": MAX_OPTIONS,
                                "items": {
                                    "type": "object",
                                    "properties": {
                                        "description": {
                                            "type": "string",
                                            "description": "One concrete way to carry out the task"
                                        }
                                    },
                                    "required": ["description"]
                                }
                            }
                        },
                        "required": ["name", "options"]
                    }
                }
            },
            "required": ["tasks"]
        })
    }
}

impl From<DecompositionOutput> for Vec<Task> {
    fn from(output: DecompositionOutput) -> Self {
        output
            .tasks
            .into_iter()
            .map(|t| Task {
                name: t.name,
                options: t.options.into_iter().map(|o| TaskOption::new(o.description)).collect(),
            })
            .collect()
    }
}

/// Breaks an optimized goal into validated tasks
#[async_trait]
pub trait Decomposer: Send + Sync {
    async fn decompose(&self, goal: &str) -> Result<DecomposedTasks, PlanError>;
}

/// Decomposer backed by schema-constrained generation
pub struct TaskDecomposer {
    llm: Arc<dyn LlmClient>,
    prompts: Arc<PromptLoader>,
    config: DecomposerConfig,
    /// Captured once at construction, `YYYY-MM-DD`
    current_date: String,
}

impl TaskDecomposer {
    pub fn new(llm: Arc<dyn LlmClient>, prompts: Arc<PromptLoader>, config: DecomposerConfig) -> Self {
        let current_date = super::today();
        debug!(%current_date, "TaskDecomposer::new: called");
        Self {
            llm,
            prompts,
            config,
            current_date,
        }
    }

    /// Fix the date substituted into the prompt
    pub fn with_current_date(mut self, date: impl Into<String>) -> Self {
        self.current_date = date.into();
        self
    }

    pub fn current_date(&self) -> &str {
        &self.current_date
    }

    fn render_prompt(&self, goal: &str) -> Result<String, PlanError> {
        Ok(self.prompts.render(
            "decompose",
            &json!({
                "current_date": self.current_date,
                "goal": goal,
                "capabilities": self.config.capabilities,
                "min_tasks": MIN_TASKS,
                "max_tasks": MAX_TASKS,
                "min_options": MIN_OPTIONS,
                "max_options": MAX_OPTIONS,
            }),
        )?)
    }
}

#[async_trait]
impl Decomposer for TaskDecomposer {
    async fn decompose(&self, goal: &str) -> Result<DecomposedTasks, PlanError> {
        debug!(goal_len = goal.len(), "TaskDecomposer::decompose: called");
        if goal.trim().is_empty() {
            return Err(ValidationError::EmptyGoal.into());
        }

        let prompt = self.render_prompt(goal)?;
        let output: DecompositionOutput =
            generate_structured(&self.llm, SYSTEM_PROMPT.to_string(), prompt, self.config.max_tokens).await?;

        let tasks = DecomposedTasks::new(output.into())?;
        info!(task_count = tasks.len(), "Goal decomposed into {} tasks", tasks.len());
        Ok(tasks)
    }
}
