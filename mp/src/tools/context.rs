//! Per-call tool context

/// Identifies which run and task a tool call belongs to
///
/// Tools use it for log correlation only; research tools have no
/// filesystem or process access to scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolContext {
    pub run_id: String,
    pub task_index: usize,
    pub task_name: String,
}

impl ToolContext {
    pub fn new(run_id: impl Into<String>, task_index: usize, task_name: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            task_index,
            task_name: task_name.into(),
        }
    }

    /// Context for tools called outside a plan run (tests, ad-hoc use)
    pub fn detached() -> Self {
        Self::new("detached", 0, "")
    }
}
