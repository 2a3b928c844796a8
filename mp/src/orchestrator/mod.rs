//! Orchestration of a planning run
//!
//! [`PlanRunner`] owns the state machine; the stages themselves live in
//! [`crate::planning`].

mod cancel;
mod config;
mod runner;

pub use cancel::{CancelHandle, CancelToken};
pub use config::{ExecutionMode, FailurePolicy, RunnerConfig};
pub use runner::{PlanComponents, PlanRunner, RunFailure};
