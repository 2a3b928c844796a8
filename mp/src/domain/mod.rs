//! Domain types for multipath
//!
//! The task model produced by decomposition, the per-run state that the
//! orchestrator accumulates, and the errors raised when either is violated.

mod error;
mod id;
mod state;
mod task;

pub use error::{StateError, ValidationError};
pub use id::RunId;
pub use state::{ErrorKind, FailureRecord, PlanReport, PlanState, RunPhase, StepLog, StepRecord};
pub use task::{DecomposedTasks, MAX_OPTIONS, MAX_TASKS, MIN_OPTIONS, MIN_TASKS, Task, TaskOption};
