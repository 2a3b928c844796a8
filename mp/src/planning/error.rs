//! Planning error taxonomy

use thiserror::Error;

use crate::domain::{ErrorKind, StateError, ValidationError};
use crate::llm::{LlmError, StructuredError};
use crate::prompts::PromptError;

/// Failure of a planning step
#[derive(Debug, Clone, Error)]
pub enum PlanError {
    /// Generated content broke a structural rule
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// The generation backend failed, timed out or returned something unusable
    #[error("Generation failed: {0}")]
    Generation(String),

    #[error("Selection failed for task {task_index}: {message}")]
    Selection { task_index: usize, message: String },

    #[error("Execution failed for task {task_index}: {message}")]
    Execution { task_index: usize, message: String },

    #[error("Run cancelled")]
    Cancelled,

    #[error("State violation: {0}")]
    State(#[from] StateError),
}

impl PlanError {
    pub fn generation(message: impl Into<String>) -> Self {
        Self::Generation(message.into())
    }

    pub fn selection(task_index: usize, message: impl Into<String>) -> Self {
        Self::Selection {
            task_index,
            message: message.into(),
        }
    }

    pub fn execution(task_index: usize, message: impl Into<String>) -> Self {
        Self::Execution {
            task_index,
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::Generation(_) => ErrorKind::Generation,
            Self::Selection { .. } => ErrorKind::Selection,
            Self::Execution { .. } => ErrorKind::Execution,
            Self::Cancelled => ErrorKind::Cancelled,
            Self::State(_) => ErrorKind::State,
        }
    }

    /// Task the failure belongs to, for per-task errors
    pub fn task_index(&self) -> Option<usize> {
        match self {
            Self::Selection { task_index, .. } | Self::Execution { task_index, .. } => Some(*task_index),
            _ => None,
        }
    }

    /// Failure detail without the category prefix
    pub fn detail(&self) -> String {
        match self {
            Self::Validation(e) => e.to_string(),
            Self::Generation(m) => m.clone(),
            Self::Selection { message, .. } | Self::Execution { message, .. } => message.clone(),
            Self::Cancelled => "cancelled".to_string(),
            Self::State(e) => e.to_string(),
        }
    }
}

impl From<LlmError> for PlanError {
    fn from(e: LlmError) -> Self {
        Self::Generation(e.to_string())
    }
}

impl From<StructuredError> for PlanError {
    fn from(e: StructuredError) -> Self {
        Self::Generation(e.to_string())
    }
}

impl From<PromptError> for PlanError {
    fn from(e: PromptError) -> Self {
        Self::Generation(e.to_string())
    }
}
