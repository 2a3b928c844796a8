//! Option selection policies
//!
//! A presenter picks one option for a task. Three policies ship: always the
//! first option, ask the model, or a caller-supplied function. Whatever the
//! policy, a presenter either returns a valid index or a selection error; it
//! never silently falls back. Falling back is the runner's decision.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info};

use super::PlanError;
use crate::domain::{PlanState, Task};
use crate::llm::{CompletionRequest, LlmClient};
use crate::prompts::PromptLoader;
use crate::tools::truncate_chars;

const SYSTEM_PROMPT: &str = "You choose between alternative approaches to a task. Reply with a number only.";

/// Answer budget for the number-only reply
const SELECT_MAX_TOKENS: u32 = 16;

/// Prior findings shown to the model, each clipped to this many characters
const PRIOR_RESULT_CHARS: usize = 400;

/// Which selection policy to build from configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum PresenterKind {
    /// Always take the first option
    First,
    /// Let the model choose
    Llm,
}

impl fmt::Display for PresenterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::First => write!(f, "first"),
            Self::Llm => write!(f, "llm"),
        }
    }
}

/// Selects one option index for a task
#[async_trait]
pub trait OptionPresenter: Send + Sync {
    /// Pick an option of `task`, which sits at `task_index` in the plan
    async fn select(&self, task_index: usize, task: &Task, state: &PlanState) -> Result<usize, PlanError>;
}

/// Deterministic baseline: option 0
#[derive(Debug, Default, Clone, Copy)]
pub struct FirstOptionPresenter;

#[async_trait]
impl OptionPresenter for FirstOptionPresenter {
    async fn select(&self, task_index: usize, task: &Task, _state: &PlanState) -> Result<usize, PlanError> {
        if task.options.is_empty() {
            return Err(PlanError::selection(task_index, "task has no options"));
        }
        Ok(0)
    }
}

/// Caller-supplied selection policy
pub struct FnOptionPresenter<F> {
    select: F,
}

impl<F> FnOptionPresenter<F>
where
    F: Fn(&Task, &PlanState) -> Result<usize, PlanError> + Send + Sync,
{
    pub fn new(select: F) -> Self {
        Self { select }
    }
}

#[async_trait]
impl<F> OptionPresenter for FnOptionPresenter<F>
where
    F: Fn(&Task, &PlanState) -> Result<usize, PlanError> + Send + Sync,
{
    async fn select(&self, _task_index: usize, task: &Task, state: &PlanState) -> Result<usize, PlanError> {
        (self.select)(task, state)
    }
}

/// Asks the model for the number of the best option
pub struct LlmOptionPresenter {
    llm: Arc<dyn LlmClient>,
    prompts: Arc<PromptLoader>,
}

impl LlmOptionPresenter {
    pub fn new(llm: Arc<dyn LlmClient>, prompts: Arc<PromptLoader>) -> Self {
        Self { llm, prompts }
    }
}

#[async_trait]
impl OptionPresenter for LlmOptionPresenter {
    async fn select(&self, task_index: usize, task: &Task, state: &PlanState) -> Result<usize, PlanError> {
        debug!(task_index, option_count = task.options.len(), "LlmOptionPresenter::select: called");
        let prior_results: Vec<String> = state
            .results()
            .into_iter()
            .map(|r| truncate_chars(r, PRIOR_RESULT_CHARS))
            .collect();

        let prompt = self
            .prompts
            .render(
                "select-option",
                &json!({
                    "goal": state.optimized_goal().unwrap_or(state.query()),
                    "prior_results": prior_results,
                    "task_name": task.name,
                    "options": task.numbered_options(),
                    "option_count": task.options.len(),
                }),
            )
            .map_err(|e| PlanError::selection(task_index, e.to_string()))?;

        let mut request = CompletionRequest::text(SYSTEM_PROMPT, prompt, SELECT_MAX_TOKENS);
        request.temperature = Some(0.0);

        let response = self
            .llm
            .complete(request)
            .await
            .map_err(|e| PlanError::selection(task_index, e.to_string()))?;
        let answer = response.content.unwrap_or_default();

        let index = parse_choice(&answer, task.options.len()).map_err(|msg| PlanError::selection(task_index, msg))?;
        info!(task_index, choice = index + 1, "Option selected");
        Ok(index)
    }
}

/// Map a 1-based numeric answer to a 0-based option index
///
/// Takes the first run of digits (ASCII or full-width) anywhere in the answer.
pub fn parse_choice(answer: &str, option_count: usize) -> Result<usize, String> {
    let digits: String = answer
        .chars()
        .map(normalize_digit)
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(|c| c.is_ascii_digit())
        .collect();

    if digits.is_empty() {
        return Err(format!("answer '{}' contains no option number", answer.trim()));
    }

    let number: usize = digits
        .parse()
        .map_err(|_| format!("answer '{}' is not a usable number", answer.trim()))?;
    if number == 0 || number > option_count {
        return Err(format!("answer {} is outside 1-{}", number, option_count));
    }
    Ok(number - 1)
}

fn normalize_digit(c: char) -> char {
    match c {
        '０'..='９' => char::from(b'0' + (c as u32 - '０' as u32) as u8),
        other => other,
    }
}
