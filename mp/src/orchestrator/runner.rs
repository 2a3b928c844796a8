//! PlanRunner - drives one planning run through its phases
//!
//! `Init -> Decomposed -> Executing(0..N) -> Done`. Every collaborator call
//! is bounded by the step timeout and raced against cancellation; state is
//! only written after a step has fully succeeded, so an abandoned step never
//! leaves a trace.

use std::future::Future;
use std::pin::pin;
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::{CancelToken, ExecutionMode, FailurePolicy, RunnerConfig};
use crate::domain::{ErrorKind, PlanState, StateError, StepRecord, Task};
use crate::planning::{Decomposer, GoalOptimizer, OptionPresenter, PlanError, ResponseOptimizer, ResultAggregator, TaskExecutor};

/// A run that stopped early, with everything committed before the failure
#[derive(Debug, Error)]
#[error("{error}")]
pub struct RunFailure {
    pub state: Box<PlanState>,
    pub error: PlanError,
}

/// The collaborators a runner calls, one per stage
#[derive(Clone)]
pub struct PlanComponents {
    pub goal_optimizer: Arc<dyn GoalOptimizer>,
    pub response_optimizer: Arc<dyn ResponseOptimizer>,
    pub decomposer: Arc<dyn Decomposer>,
    pub presenter: Arc<dyn OptionPresenter>,
    pub executor: Arc<dyn TaskExecutor>,
    pub aggregator: Arc<dyn ResultAggregator>,
}

/// Which call a timeout interrupted; decides the error it becomes
#[derive(Debug, Clone, Copy)]
enum Stage {
    Optimize,
    Decompose,
    Select(usize),
    Execute(usize),
    Aggregate,
}

impl Stage {
    fn timeout_error(self, limit: Duration) -> PlanError {
        let message = format!("timed out after {:?}", limit);
        match self {
            Self::Optimize | Self::Decompose | Self::Aggregate => PlanError::generation(message),
            Self::Select(index) => PlanError::selection(index, message),
            Self::Execute(index) => PlanError::execution(index, message),
        }
    }
}

pub struct PlanRunner {
    components: PlanComponents,
    config: RunnerConfig,
    cancel: CancelToken,
}

impl PlanRunner {
    pub fn new(components: PlanComponents, config: RunnerConfig) -> Self {
        debug!(?config, "PlanRunner::new: called");
        Self {
            components,
            config,
            cancel: CancelToken::never(),
        }
    }

    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    /// Run the full pipeline for `query`
    ///
    /// On failure the returned [`RunFailure`] carries the state as it was
    /// when the run stopped, with the failure recorded in it.
    pub async fn run(&self, query: &str) -> Result<PlanState, RunFailure> {
        let mut state = PlanState::new(query);
        info!(run_id = %state.run_id(), policy = %self.config.failure_policy, "Run started");

        match self.drive(&mut state).await {
            Ok(()) => {
                info!(run_id = %state.run_id(), tasks = state.task_count(), "Run finished");
                Ok(state)
            }
            Err(error) => {
                warn!(run_id = %state.run_id(), phase = %state.phase(), %error, "Run aborted");
                state.record_failure(error.kind(), error.detail(), error.task_index());
                Err(RunFailure {
                    state: Box::new(state),
                    error,
                })
            }
        }
    }

    /// Only the `Init -> Decomposed` transition
    pub async fn decompose_only(&self, query: &str) -> Result<PlanState, RunFailure> {
        let mut state = PlanState::new(query);
        match self.decompose(&mut state).await {
            Ok(()) => Ok(state),
            Err(error) => {
                state.record_failure(error.kind(), error.detail(), None);
                Err(RunFailure {
                    state: Box::new(state),
                    error,
                })
            }
        }
    }

    async fn drive(&self, state: &mut PlanState) -> Result<(), PlanError> {
        self.decompose(state).await?;
        state.start_execution()?;

        match self.config.mode {
            ExecutionMode::Sequential => self.execute_sequential(state).await?,
            ExecutionMode::Parallel { max_concurrent } => self.execute_parallel(state, max_concurrent.max(1)).await?,
        }

        let output = self
            .guarded(Stage::Aggregate, self.components.aggregator.aggregate(state))
            .await?;
        state.finish(output)?;
        Ok(())
    }

    /// Optimize, optimize the response, decompose; commit all three or nothing
    async fn decompose(&self, state: &mut PlanState) -> Result<(), PlanError> {
        debug!(run_id = %state.run_id(), "PlanRunner::decompose: called");
        let c = &self.components;

        let goal = self.guarded(Stage::Optimize, c.goal_optimizer.optimize(state.query())).await?;
        let goal = goal.text();
        let response = self
            .guarded(Stage::Optimize, c.response_optimizer.optimize(&goal))
            .await?;
        let tasks = self.guarded(Stage::Decompose, c.decomposer.decompose(&goal)).await?;

        info!(run_id = %state.run_id(), task_count = tasks.len(), "Plan decomposed");
        state.commit_decomposition(goal, response.spec, tasks)?;
        Ok(())
    }

    async fn execute_sequential(&self, state: &mut PlanState) -> Result<(), PlanError> {
        loop {
            let index = state.current_task_index();
            if index >= state.task_count() {
                return Ok(());
            }
            let record = self.run_step(index, state).await?;
            state.commit_step(record)?;
            info!(task_index = index, "Task committed");
        }
    }

    /// Steps run concurrently against one snapshot, commits stay in index order
    async fn execute_parallel(&self, state: &mut PlanState, max_concurrent: usize) -> Result<(), PlanError> {
        let snapshot = state.clone();
        let start = snapshot.current_task_index();
        debug!(start, max_concurrent, "PlanRunner::execute_parallel: called");

        let mut steps = pin!(
            futures::stream::iter(start..snapshot.task_count())
                .map(|index| self.run_step(index, &snapshot))
                .buffered(max_concurrent)
        );

        // Returning early drops the stream and with it every step still in flight
        while let Some(outcome) = steps.next().await {
            let record = outcome?;
            let index = record.task_index;
            state.commit_step(record)?;
            info!(task_index = index, "Task committed");
        }
        Ok(())
    }

    /// Select and execute one task, applying the failure policy
    async fn run_step(&self, index: usize, state: &PlanState) -> Result<StepRecord, PlanError> {
        let task = state.task(index).ok_or(StateError::TaskOutOfRange {
            task_index: index,
            task_count: state.task_count(),
        })?;
        let best_effort = self.config.failure_policy == FailurePolicy::BestEffort;

        let (option_index, fallback) = match self.select(index, task, state).await {
            Ok(choice) => (choice, false),
            Err(error) if best_effort && error.kind() == ErrorKind::Selection => {
                warn!(task_index = index, %error, "Selection failed, falling back to option 1");
                (0, true)
            }
            Err(error) => return Err(error),
        };

        let option = task.options.get(option_index).ok_or(StateError::InvalidOption {
            task_index: index,
            option_index,
            option_count: task.options.len(),
        })?;

        let executed = self
            .guarded(
                Stage::Execute(index),
                self.components.executor.execute(index, task, option, state),
            )
            .await;

        match executed {
            Ok(result) => Ok(StepRecord::completed(index, option_index, result).with_fallback(fallback)),
            Err(error) if best_effort && error.kind() == ErrorKind::Execution => {
                warn!(task_index = index, %error, "Execution failed, recording placeholder");
                Ok(StepRecord::failed(index, option_index, error.detail()).with_fallback(fallback))
            }
            Err(error) => Err(error),
        }
    }

    async fn select(&self, index: usize, task: &Task, state: &PlanState) -> Result<usize, PlanError> {
        let choice = self
            .guarded(Stage::Select(index), self.components.presenter.select(index, task, state))
            .await?;
        if !task.is_valid_option(choice) {
            return Err(PlanError::selection(
                index,
                format!("presenter chose option {} of {}", choice + 1, task.options.len()),
            ));
        }
        debug!(task_index = index, choice, "PlanRunner::select: option chosen");
        Ok(choice)
    }

    /// Bound a collaborator call by the step timeout and cancellation
    async fn guarded<T>(&self, stage: Stage, call: impl Future<Output = Result<T, PlanError>>) -> Result<T, PlanError> {
        if self.cancel.is_cancelled() {
            return Err(PlanError::Cancelled);
        }
        let limit = self.config.step_timeout;

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {
                debug!(?stage, "PlanRunner::guarded: cancelled");
                Err(PlanError::Cancelled)
            }
            outcome = tokio::time::timeout(limit, call) => match outcome {
                Ok(result) => result,
                Err(_) => {
                    warn!(?stage, ?limit, "Step timed out");
                    Err(stage.timeout_error(limit))
                }
            },
        }
    }
}
