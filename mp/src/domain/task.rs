//! Task model produced by decomposition
//!
//! A [`DecomposedTasks`] value can only be built through validation, so holding
//! one means the 3-5 tasks / 2-3 options bounds hold.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::error::ValidationError;

/// Fewest tasks a decomposition may produce
pub const MIN_TASKS: usize = 3;
/// Most tasks a decomposition may produce
pub const MAX_TASKS: usize = 5;
/// Fewest options per task
pub const MIN_OPTIONS: usize = 2;
/// Most options per task
pub const MAX_OPTIONS: usize = 3;

/// One candidate approach for a task
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskOption {
    #[serde(default)]
    pub description: String,
}

impl TaskOption {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
        }
    }
}

/// One decomposed unit of work with its mutually exclusive options
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub name: String,
    pub options: Vec<TaskOption>,
}

impl Task {
    pub fn new<S: Into<String>>(name: impl Into<String>, options: impl IntoIterator<Item = S>) -> Self {
        Self {
            name: name.into(),
            options: options.into_iter().map(TaskOption::new).collect(),
        }
    }

    /// Check the per-task constraints; `task_index` is only used in the error
    pub fn validate(&self, task_index: usize) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::EmptyTaskName { task_index });
        }

        let count = self.options.len();
        if !(MIN_OPTIONS..=MAX_OPTIONS).contains(&count) {
            return Err(ValidationError::OptionCount {
                task_index,
                task: self.name.clone(),
                count,
            });
        }

        if let Some(option_index) = self.options.iter().position(|o| o.description.trim().is_empty()) {
            return Err(ValidationError::EmptyOptionDescription {
                task_index,
                option_index,
            });
        }

        Ok(())
    }

    /// Whether `index` names one of this task's options
    pub fn is_valid_option(&self, index: usize) -> bool {
        index < self.options.len()
    }

    /// Options rendered as a 1-based numbered list
    pub fn numbered_options(&self) -> String {
        self.options
            .iter()
            .enumerate()
            .map(|(i, o)| format!("{}. {}", i + 1, o.description))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Ordered, validated list of tasks; list order is execution order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Task>", into = "Vec<Task>")]
pub struct DecomposedTasks(Vec<Task>);

impl DecomposedTasks {
    /// Validate and wrap a task list
    pub fn new(tasks: Vec<Task>) -> Result<Self, ValidationError> {
        debug!(task_count = tasks.len(), "DecomposedTasks::new: called");
        if !(MIN_TASKS..=MAX_TASKS).contains(&tasks.len()) {
            return Err(ValidationError::TaskCount { count: tasks.len() });
        }
        for (idx, task) in tasks.iter().enumerate() {
            task.validate(idx)?;
        }
        Ok(Self(tasks))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Task> {
        self.0.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Task> {
        self.0.iter()
    }

    pub fn as_slice(&self) -> &[Task] {
        &self.0
    }
}

impl TryFrom<Vec<Task>> for DecomposedTasks {
    type Error = ValidationError;

    fn try_from(tasks: Vec<Task>) -> Result<Self, Self::Error> {
        Self::new(tasks)
    }
}

impl From<DecomposedTasks> for Vec<Task> {
    fn from(tasks: DecomposedTasks) -> Self {
        tasks.0
    }
}

impl<'a> IntoIterator for &'a DecomposedTasks {
    type Item = &'a Task;
    type IntoIter = std::slice::Iter<'a, Task>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
