//! Run state
//!
//! [`PlanState`] is the single record of a run. Its fields only ever grow:
//! decomposition outputs are written once, per-task selections and results
//! are appended through a [`StepLog`], and the final output is set once.
//!
//! The step log is keyed by task index. Committing the same record twice is
//! a no-op and merging two logs gives the same result in either order, so
//! step outcomes produced concurrently can be combined without losing or
//! duplicating entries. A different record for an already committed index is
//! rejected rather than overwritten.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::error::StateError;
use super::id::RunId;
use super::task::{DecomposedTasks, Task};

/// Where a run is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "name", rename_all = "snake_case")]
pub enum RunPhase {
    Init,
    Decomposed,
    /// Tasks before `index` are committed
    Executing { index: usize },
    Done,
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Init => write!(f, "init"),
            Self::Decomposed => write!(f, "decomposed"),
            Self::Executing { index } => write!(f, "executing({})", index),
            Self::Done => write!(f, "done"),
        }
    }
}

/// Category of a run failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    Generation,
    Selection,
    Execution,
    Cancelled,
    State,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Validation => "validation",
            Self::Generation => "generation",
            Self::Selection => "selection",
            Self::Execution => "execution",
            Self::Cancelled => "cancelled",
            Self::State => "state",
        };
        f.write_str(name)
    }
}

/// Why a run stopped early
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureRecord {
    pub kind: ErrorKind,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_index: Option<usize>,
}

/// Outcome of one task: the option taken and what executing it produced
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepRecord {
    pub task_index: usize,
    pub option_index: usize,
    pub result: String,
    /// The option was not chosen by the presenter but substituted after a selection failure
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub fallback: bool,
    /// Execution error absorbed under best-effort; `result` then holds a placeholder
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StepRecord {
    pub fn completed(task_index: usize, option_index: usize, result: impl Into<String>) -> Self {
        Self {
            task_index,
            option_index,
            result: result.into(),
            fallback: false,
            error: None,
        }
    }

    /// A step whose execution failed; the result is a visible placeholder
    pub fn failed(task_index: usize, option_index: usize, error: impl Into<String>) -> Self {
        let error = error.into();
        Self {
            task_index,
            option_index,
            result: format!("[task failed: {}]", error),
            fallback: false,
            error: Some(error),
        }
    }

    /// Mark the option as a fallback substitution
    pub fn with_fallback(mut self, fallback: bool) -> Self {
        self.fallback = fallback;
        self
    }
}

/// Task-index keyed log of committed steps
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StepLog {
    steps: BTreeMap<usize, StepRecord>,
}

impl StepLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a record; `Ok(false)` if the identical record was already present
    pub fn commit(&mut self, record: StepRecord) -> Result<bool, StateError> {
        match self.steps.get(&record.task_index) {
            Some(existing) if *existing == record => Ok(false),
            Some(_) => Err(StateError::ConflictingStep {
                task_index: record.task_index,
            }),
            None => {
                self.steps.insert(record.task_index, record);
                Ok(true)
            }
        }
    }

    /// Union with another log; nothing is applied if any index conflicts
    pub fn merge(&mut self, other: &StepLog) -> Result<usize, StateError> {
        if let Some(conflict) = other
            .steps
            .iter()
            .find(|(idx, rec)| self.steps.get(*idx).is_some_and(|existing| existing != *rec))
        {
            return Err(StateError::ConflictingStep { task_index: *conflict.0 });
        }

        let mut added = 0;
        for (idx, rec) in &other.steps {
            if !self.steps.contains_key(idx) {
                self.steps.insert(*idx, rec.clone());
                added += 1;
            }
        }
        Ok(added)
    }

    /// Number of records at indices 0, 1, 2, ... without a gap
    pub fn completed_prefix(&self) -> usize {
        self.steps
            .keys()
            .enumerate()
            .take_while(|(position, idx)| position == *idx)
            .count()
    }

    /// Records in the gap-free prefix, in task order
    pub fn prefix(&self) -> impl Iterator<Item = &StepRecord> {
        self.steps.values().take(self.completed_prefix())
    }

    pub fn get(&self, task_index: usize) -> Option<&StepRecord> {
        self.steps.get(&task_index)
    }
}

/// Accumulated state of one plan run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanState {
    run_id: RunId,
    query: String,
    optimized_goal: Option<String>,
    optimized_response: Option<String>,
    tasks: Option<DecomposedTasks>,
    steps: StepLog,
    final_output: Option<String>,
    phase: RunPhase,
    failure: Option<FailureRecord>,
}

impl PlanState {
    pub fn new(query: impl Into<String>) -> Self {
        let query = query.into();
        Self {
            run_id: RunId::new(&query),
            query,
            optimized_goal: None,
            optimized_response: None,
            tasks: None,
            steps: StepLog::new(),
            final_output: None,
            phase: RunPhase::Init,
            failure: None,
        }
    }

    pub fn run_id(&self) -> &RunId {
        &self.run_id
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn optimized_goal(&self) -> Option<&str> {
        self.optimized_goal.as_deref()
    }

    pub fn optimized_response(&self) -> Option<&str> {
        self.optimized_response.as_deref()
    }

    pub fn tasks(&self) -> Option<&DecomposedTasks> {
        self.tasks.as_ref()
    }

    pub fn task(&self, index: usize) -> Option<&Task> {
        self.tasks.as_ref().and_then(|t| t.get(index))
    }

    /// Number of tasks, zero before decomposition
    pub fn task_count(&self) -> usize {
        self.tasks.as_ref().map_or(0, DecomposedTasks::len)
    }

    /// Index of the next task to execute
    pub fn current_task_index(&self) -> usize {
        self.steps.completed_prefix()
    }

    /// Chosen option per completed task, in task order
    pub fn chosen_options(&self) -> Vec<usize> {
        self.steps.prefix().map(|s| s.option_index).collect()
    }

    /// Result text per completed task, in task order
    pub fn results(&self) -> Vec<&str> {
        self.steps.prefix().map(|s| s.result.as_str()).collect()
    }

    pub fn steps(&self) -> &StepLog {
        &self.steps
    }

    pub fn final_output(&self) -> Option<&str> {
        self.final_output.as_deref()
    }

    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    pub fn failure(&self) -> Option<&FailureRecord> {
        self.failure.as_ref()
    }

    pub fn is_done(&self) -> bool {
        self.phase == RunPhase::Done
    }

    /// Write the decomposition outputs together; Init -> Decomposed
    pub fn commit_decomposition(
        &mut self,
        optimized_goal: String,
        optimized_response: String,
        tasks: DecomposedTasks,
    ) -> Result<(), StateError> {
        debug!(run_id = %self.run_id, task_count = tasks.len(), "PlanState::commit_decomposition: called");
        if self.tasks.is_some() {
            return Err(StateError::AlreadyDecomposed);
        }
        self.expect_phase(RunPhase::Init, "init")?;

        self.optimized_goal = Some(optimized_goal);
        self.optimized_response = Some(optimized_response);
        self.tasks = Some(tasks);
        self.phase = RunPhase::Decomposed;
        Ok(())
    }

    /// Decomposed -> Executing(0)
    pub fn start_execution(&mut self) -> Result<(), StateError> {
        self.expect_phase(RunPhase::Decomposed, "decomposed")?;
        self.phase = RunPhase::Executing { index: 0 };
        Ok(())
    }

    /// Append one step; `Ok(false)` for an identical replay
    pub fn commit_step(&mut self, record: StepRecord) -> Result<bool, StateError> {
        debug!(
            run_id = %self.run_id,
            task_index = record.task_index,
            option_index = record.option_index,
            "PlanState::commit_step: called"
        );
        self.expect_executing()?;
        self.check_record(&record)?;
        let added = self.steps.commit(record)?;
        self.advance();
        Ok(added)
    }

    /// Set the final output once every task is committed; Executing(N) -> Done
    pub fn finish(&mut self, final_output: String) -> Result<(), StateError> {
        debug!(run_id = %self.run_id, "PlanState::finish: called");
        if self.final_output.is_some() {
            return Err(StateError::AlreadyFinished);
        }
        self.expect_executing()?;

        let completed = self.current_task_index();
        let total = self.task_count();
        if completed < total {
            return Err(StateError::Incomplete { completed, total });
        }

        self.final_output = Some(final_output);
        self.phase = RunPhase::Done;
        Ok(())
    }

    /// Record why the run stopped; the first failure is kept
    pub fn record_failure(&mut self, kind: ErrorKind, message: impl Into<String>, task_index: Option<usize>) {
        if self.failure.is_none() {
            self.failure = Some(FailureRecord {
                kind,
                message: message.into(),
                task_index,
            });
        }
    }

    /// Serializable view with the derived per-task lists
    pub fn report(&self) -> PlanReport<'_> {
        PlanReport {
            run_id: self.run_id.as_str(),
            query: &self.query,
            phase: self.phase,
            optimized_goal: self.optimized_goal(),
            optimized_response: self.optimized_response(),
            tasks: self.tasks.as_ref().map(DecomposedTasks::as_slice),
            chosen_options: self.chosen_options(),
            results: self.results(),
            fallbacks: self.steps.prefix().filter(|s| s.fallback).map(|s| s.task_index).collect(),
            final_output: self.final_output(),
            failure: self.failure.as_ref(),
        }
    }

    fn expect_phase(&self, expected: RunPhase, name: &'static str) -> Result<(), StateError> {
        if self.phase != expected {
            return Err(StateError::WrongPhase {
                expected: name,
                actual: self.phase.to_string(),
            });
        }
        Ok(())
    }

    fn expect_executing(&self) -> Result<(), StateError> {
        match self.phase {
            RunPhase::Executing { .. } => Ok(()),
            other => Err(StateError::WrongPhase {
                expected: "executing",
                actual: other.to_string(),
            }),
        }
    }

    fn check_record(&self, record: &StepRecord) -> Result<(), StateError> {
        let task_count = self.task_count();
        let task = self.task(record.task_index).ok_or(StateError::TaskOutOfRange {
            task_index: record.task_index,
            task_count,
        })?;
        if !task.is_valid_option(record.option_index) {
            return Err(StateError::InvalidOption {
                task_index: record.task_index,
                option_index: record.option_index,
                option_count: task.options.len(),
            });
        }
        Ok(())
    }

    fn advance(&mut self) {
        self.phase = RunPhase::Executing {
            index: self.current_task_index(),
        };
    }
}

/// Flattened run summary for reports and JSON output
#[derive(Debug, Serialize)]
pub struct PlanReport<'a> {
    pub run_id: &'a str,
    pub query: &'a str,
    pub phase: RunPhase,
    pub optimized_goal: Option<&'a str>,
    pub optimized_response: Option<&'a str>,
    pub tasks: Option<&'a [Task]>,
    pub chosen_options: Vec<usize>,
    pub results: Vec<&'a str>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fallbacks: Vec<usize>,
    pub final_output: Option<&'a str>,
    pub failure: Option<&'a FailureRecord>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn tasks() -> DecomposedTasks {
        DecomposedTasks::new(vec![
            Task::new("gather", ["web search", "papers"]),
            Task::new("compare", ["table", "prose", "scorecard"]),
            Task::new("summarize", ["bullets", "essay"]),
        ])
        .unwrap()
    }

    fn executing_state() -> PlanState {
        let mut state = PlanState::new("compare frameworks");
        state
            .commit_decomposition("goal".into(), "response".into(), tasks())
            .unwrap();
        state.start_execution().unwrap();
        state
    }

    #[test]
    fn test_new_state_is_init() {
        let state = PlanState::new("q");
        assert_eq!(state.phase(), RunPhase::Init);
        assert_eq!(state.current_task_index(), 0);
        assert!(state.tasks().is_none());
        assert!(state.final_output().is_none());
    }

    #[test]
    fn test_decomposition_written_once() {
        let mut state = PlanState::new("q");
        state.commit_decomposition("g".into(), "r".into(), tasks()).unwrap();
        assert_eq!(state.phase(), RunPhase::Decomposed);
        assert_eq!(state.optimized_goal(), Some("g"));
        assert_eq!(state.task_count(), 3);

        let err = state.commit_decomposition("g2".into(), "r2".into(), tasks()).unwrap_err();
        assert_eq!(err, StateError::AlreadyDecomposed);
        assert_eq!(state.optimized_goal(), Some("g"));
    }

    #[test]
    fn test_steps_require_executing_phase() {
        let mut state = PlanState::new("q");
        let err = state.commit_step(StepRecord::completed(0, 0, "r")).unwrap_err();
        assert!(matches!(err, StateError::WrongPhase { expected: "executing", .. }));
    }

    #[test]
    fn test_commit_advances_cursor() {
        let mut state = executing_state();
        assert!(state.commit_step(StepRecord::completed(0, 1, "found")).unwrap());
        assert_eq!(state.current_task_index(), 1);
        assert_eq!(state.phase(), RunPhase::Executing { index: 1 });
        assert_eq!(state.chosen_options(), vec![1]);
        assert_eq!(state.results(), vec!["found"]);
    }

    #[test]
    fn test_replayed_step_is_noop() {
        let mut state = executing_state();
        state.commit_step(StepRecord::completed(0, 1, "found")).unwrap();
        assert!(!state.commit_step(StepRecord::completed(0, 1, "found")).unwrap());
        assert_eq!(state.chosen_options().len(), 1);
    }

    #[test]
    fn test_conflicting_step_rejected() {
        let mut state = executing_state();
        state.commit_step(StepRecord::completed(0, 1, "found")).unwrap();
        let err = state.commit_step(StepRecord::completed(0, 0, "other")).unwrap_err();
        assert_eq!(err, StateError::ConflictingStep { task_index: 0 });
        assert_eq!(state.chosen_options(), vec![1]);
    }

    #[test]
    fn test_invalid_option_rejected() {
        let mut state = executing_state();
        let err = state.commit_step(StepRecord::completed(0, 2, "r")).unwrap_err();
        assert!(matches!(err, StateError::InvalidOption { option_count: 2, .. }));

        let err = state.commit_step(StepRecord::completed(7, 0, "r")).unwrap_err();
        assert!(matches!(err, StateError::TaskOutOfRange { task_index: 7, .. }));
    }

    #[test]
    fn test_out_of_order_commit_hidden_until_gap_filled() {
        let mut state = executing_state();
        state.commit_step(StepRecord::completed(1, 0, "second")).unwrap();
        assert_eq!(state.current_task_index(), 0);
        assert!(state.chosen_options().is_empty());

        state.commit_step(StepRecord::completed(0, 0, "first")).unwrap();
        assert_eq!(state.current_task_index(), 2);
        assert_eq!(state.results(), vec!["first", "second"]);
    }

    #[test]
    fn test_finish_requires_all_tasks() {
        let mut state = executing_state();
        state.commit_step(StepRecord::completed(0, 0, "a")).unwrap();
        let err = state.finish("out".into()).unwrap_err();
        assert_eq!(err, StateError::Incomplete { completed: 1, total: 3 });

        state.commit_step(StepRecord::completed(1, 0, "b")).unwrap();
        state.commit_step(StepRecord::completed(2, 0, "c")).unwrap();
        assert_eq!(state.phase(), RunPhase::Executing { index: 3 });
        state.finish("out".into()).unwrap();
        assert!(state.is_done());
        assert_eq!(state.final_output(), Some("out"));

        assert_eq!(state.finish("again".into()).unwrap_err(), StateError::AlreadyFinished);
    }

    #[test]
    fn test_failed_step_placeholder() {
        let record = StepRecord::failed(1, 0, "search timed out");
        assert_eq!(record.result, "[task failed: search timed out]");
        assert_eq!(record.error.as_deref(), Some("search timed out"));
    }

    #[test]
    fn test_first_failure_kept() {
        let mut state = PlanState::new("q");
        state.record_failure(ErrorKind::Selection, "bad pick", Some(1));
        state.record_failure(ErrorKind::Cancelled, "later", None);
        let failure = state.failure().unwrap();
        assert_eq!(failure.kind, ErrorKind::Selection);
        assert_eq!(failure.task_index, Some(1));
    }

    #[test]
    fn test_report_serializes_derived_lists() {
        let mut state = executing_state();
        state
            .commit_step(StepRecord::completed(0, 1, "a").with_fallback(true))
            .unwrap();
        let json = serde_json::to_value(state.report()).unwrap();
        assert_eq!(json["chosen_options"], serde_json::json!([1]));
        assert_eq!(json["fallbacks"], serde_json::json!([0]));
        assert_eq!(json["phase"]["name"], "executing");
    }

    #[test]
    fn test_state_json_roundtrip() {
        let mut state = executing_state();
        state.commit_step(StepRecord::completed(0, 1, "a")).unwrap();
        let json = serde_json::to_string(&state).unwrap();
        let back: PlanState = serde_json::from_str(&json).unwrap();
        assert_eq!(back, state);
    }

    fn record_for(idx: usize) -> StepRecord {
        StepRecord::completed(idx, idx % 2, format!("result {}", idx))
    }

    fn log_from(indices: &[usize]) -> StepLog {
        let mut log = StepLog::new();
        for &idx in indices {
            log.commit(record_for(idx)).unwrap();
        }
        log
    }

    proptest! {
        #[test]
        fn prop_merge_commutes(a in proptest::collection::vec(0usize..8, 0..8), b in proptest::collection::vec(0usize..8, 0..8)) {
            let mut ab = log_from(&a);
            ab.merge(&log_from(&b)).unwrap();
            let mut ba = log_from(&b);
            ba.merge(&log_from(&a)).unwrap();
            prop_assert_eq!(ab, ba);
        }

        #[test]
        fn prop_merge_idempotent(a in proptest::collection::vec(0usize..8, 0..8)) {
            let log = log_from(&a);
            let mut twice = log.clone();
            prop_assert_eq!(twice.merge(&log).unwrap(), 0);
            prop_assert_eq!(twice, log);
        }

        #[test]
        fn prop_commit_order_irrelevant(mut indices in proptest::collection::vec(0usize..8, 0..12)) {
            let forward = log_from(&indices);
            indices.reverse();
            let backward = log_from(&indices);
            prop_assert_eq!(forward, backward);
        }

        #[test]
        fn prop_chosen_options_track_cursor(indices in proptest::collection::vec(0usize..3, 0..6)) {
            let mut state = executing_state();
            for idx in indices {
                state.commit_step(StepRecord::completed(idx, 0, "r")).unwrap();
                prop_assert_eq!(state.chosen_options().len(), state.current_task_index());
                prop_assert_eq!(state.results().len(), state.current_task_index());
            }
        }
    }
}
