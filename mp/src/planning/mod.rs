//! Planning components
//!
//! Each stage of a run sits behind its own trait so the runner can be driven
//! by LLM-backed implementations in production and scripted ones in tests.

mod aggregator;
mod decomposer;
mod error;
mod executor;
mod goal;
mod presenter;

pub use aggregator::{LlmAggregator, ResultAggregator};
pub use decomposer::{Decomposer, DecomposerConfig, TaskDecomposer};
pub use error::PlanError;
pub use executor::{ResearchExecutor, TaskExecutor};
pub use goal::{GoalOptimizer, LlmGoalOptimizer, LlmResponseOptimizer, OptimizedGoal, OptimizedResponse, ResponseOptimizer};
pub use presenter::{
    FirstOptionPresenter, FnOptionPresenter, LlmOptionPresenter, OptionPresenter, PresenterKind, parse_choice,
};

/// Local date as `YYYY-MM-DD`
pub(crate) fn today() -> String {
    chrono::Local::now().format("%Y-%m-%d").to_string()
}
