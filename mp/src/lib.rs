//! multipath - Multi-path plan generation agent
//!
//! Given a goal, multipath optimizes it, decomposes it into an ordered list of
//! 3-5 tasks with 2-3 alternative options each, picks one option per task,
//! researches each task with web tools, and aggregates the findings into a
//! final answer.
//!
//! # Core Concepts
//!
//! - **Validated decomposition**: a [`DecomposedTasks`] value always satisfies its bounds
//! - **Append-only steps**: each task commits its option and result together, keyed by index
//! - **Swappable selection**: the option presenter is a strategy trait
//! - **Inspectable failure**: an aborted run hands back its partial state
//!
//! # Modules
//!
//! - [`domain`] - Task model, plan state and step log
//! - [`planning`] - Goal optimization, decomposition, selection, execution, aggregation
//! - [`orchestrator`] - The run state machine
//! - [`llm`] - LLM client trait with OpenAI and Anthropic implementations
//! - [`tools`] - Search and fetch tools for research
//! - [`prompts`] - Handlebars prompt templates
//! - [`config`] - Configuration types and loading
//! - [`cli`] - Command-line interface

pub mod cli;
pub mod config;
pub mod domain;
pub mod llm;
pub mod orchestrator;
pub mod planning;
pub mod prompts;
pub mod tools;

pub use config::{Config, LlmConfig, PlannerConfig, SearchConfig};
pub use domain::{DecomposedTasks, ErrorKind, PlanState, RunPhase, StepLog, StepRecord, Task, TaskOption};
pub use llm::{CompletionRequest, CompletionResponse, LlmClient, LlmError, create_client};
pub use orchestrator::{
    CancelHandle, CancelToken, ExecutionMode, FailurePolicy, PlanComponents, PlanRunner, RunFailure, RunnerConfig,
};
pub use planning::{
    Decomposer, GoalOptimizer, OptionPresenter, PlanError, ResponseOptimizer, ResultAggregator, TaskExecutor,
};
pub use prompts::PromptLoader;
pub use tools::{Tool, ToolContext, ToolError, ToolExecutor, ToolResult};
