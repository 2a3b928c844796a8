//! Domain error types

use thiserror::Error;

use super::task::{MAX_OPTIONS, MAX_TASKS, MIN_OPTIONS, MIN_TASKS};

/// Structural violations in generated (or hand-built) plan content
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Goal is empty")]
    EmptyGoal,

    #[error("Expected {MIN_TASKS}-{MAX_TASKS} tasks, got {count}")]
    TaskCount { count: usize },

    #[error("Task {task_index} has an empty name")]
    EmptyTaskName { task_index: usize },

    #[error("Task {task_index} ('{task}') has {count} options, expected {MIN_OPTIONS}-{MAX_OPTIONS}")]
    OptionCount {
        task_index: usize,
        task: String,
        count: usize,
    },

    #[error("Option {option_index} of task {task_index} has an empty description")]
    EmptyOptionDescription { task_index: usize, option_index: usize },
}

/// Violations of PlanState's write-once / append-only rules
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StateError {
    #[error("Plan is already decomposed")]
    AlreadyDecomposed,

    #[error("Operation requires phase {expected}, but the run is in phase {actual}")]
    WrongPhase { expected: &'static str, actual: String },

    #[error("Task index {task_index} is out of range for {task_count} tasks")]
    TaskOutOfRange { task_index: usize, task_count: usize },

    #[error("Option {option_index} is not valid for task {task_index} ({option_count} options)")]
    InvalidOption {
        task_index: usize,
        option_index: usize,
        option_count: usize,
    },

    #[error("Conflicting record for task {task_index} already committed")]
    ConflictingStep { task_index: usize },

    #[error("Only {completed} of {total} tasks completed; cannot finish")]
    Incomplete { completed: usize, total: usize },

    #[error("Final output is already set")]
    AlreadyFinished,
}
