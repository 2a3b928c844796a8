//! Runner configuration

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// What a per-task failure does to the run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum FailurePolicy {
    /// The first task error aborts the run
    #[default]
    FailFast,
    /// Fall back to option 0 on selection failures, record placeholders for
    /// execution failures, and keep going
    BestEffort,
}

impl fmt::Display for FailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FailFast => write!(f, "fail-fast"),
            Self::BestEffort => write!(f, "best-effort"),
        }
    }
}

/// How task steps are scheduled
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ExecutionMode {
    /// One step at a time; each presenter call sees every prior result
    #[default]
    Sequential,
    /// Up to `max_concurrent` steps in flight, committed in task order
    Parallel { max_concurrent: usize },
}

/// Settings for a [`PlanRunner`](super::PlanRunner)
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    pub failure_policy: FailurePolicy,
    pub mode: ExecutionMode,
    /// Upper bound for every single collaborator call
    pub step_timeout: Duration,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            failure_policy: FailurePolicy::default(),
            mode: ExecutionMode::default(),
            step_timeout: Duration::from_secs(300),
        }
    }
}
