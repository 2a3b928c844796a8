//! End-to-end runs of the plan runner with scripted collaborators

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use multipath::domain::{DecomposedTasks, ErrorKind, PlanState, RunPhase, Task, TaskOption, ValidationError};
use multipath::llm::{CompletionRequest, CompletionResponse, LlmClient, LlmError};
use multipath::orchestrator::{CancelHandle, ExecutionMode, FailurePolicy, PlanComponents, PlanRunner, RunnerConfig};
use multipath::planning::{
    DecomposerConfig, FirstOptionPresenter, FnOptionPresenter, LlmOptionPresenter, OptimizedGoal, OptimizedResponse,
    OptionPresenter, GoalOptimizer, PlanError, ResponseOptimizer, ResultAggregator, TaskDecomposer, TaskExecutor,
};
use multipath::prompts::PromptLoader;

/// Plays back canned responses in order
struct ScriptedLlm {
    responses: Mutex<VecDeque<CompletionResponse>>,
}

impl ScriptedLlm {
    fn new(responses: Vec<CompletionResponse>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.into()),
        })
    }
}

#[async_trait]
impl LlmClient for ScriptedLlm {
    async fn complete(&self, _request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| LlmError::InvalidResponse("script exhausted".into()))
    }

    fn model(&self) -> &str {
        "scripted"
    }
}

struct EchoGoal;

#[async_trait]
impl GoalOptimizer for EchoGoal {
    async fn optimize(&self, query: &str) -> Result<OptimizedGoal, PlanError> {
        Ok(OptimizedGoal {
            description: query.to_string(),
            metrics: vec!["at least three sources".to_string()],
        })
    }
}

struct PlainResponse;

#[async_trait]
impl ResponseOptimizer for PlainResponse {
    async fn optimize(&self, _goal: &str) -> Result<OptimizedResponse, PlanError> {
        Ok(OptimizedResponse {
            spec: "Short report with sources".to_string(),
        })
    }
}

#[derive(Default)]
struct RecordingExecutor {
    seen: Mutex<Vec<(usize, String)>>,
}

#[async_trait]
impl TaskExecutor for RecordingExecutor {
    async fn execute(
        &self,
        task_index: usize,
        task: &Task,
        option: &TaskOption,
        _state: &PlanState,
    ) -> Result<String, PlanError> {
        self.seen.lock().unwrap().push((task_index, option.description.clone()));
        Ok(format!("findings for {}", task.name))
    }
}

struct Summary;

#[async_trait]
impl ResultAggregator for Summary {
    async fn aggregate(&self, state: &PlanState) -> Result<String, PlanError> {
        Ok(format!("{} findings: {}", state.results().len(), state.results().join("; ")))
    }
}

fn submit_tasks(tasks: serde_json::Value) -> CompletionResponse {
    CompletionResponse::tool_call("submit_tasks", json!({ "tasks": tasks }))
}

fn research_tasks() -> serde_json::Value {
    json!([
        {"name": "研究Xの主要論文を集める", "options": [
            {"description": "Search recent papers"}, {"description": "Search preprint servers"}]},
        {"name": "研究Xの主要プレイヤーを特定する", "options": [
            {"description": "Search company news"}, {"description": "Search conference talks"}]},
        {"name": "最新動向を要約する", "options": [
            {"description": "Timeline summary"}, {"description": "Theme summary"}, {"description": "Q&A summary"}]}
    ])
}

fn components(
    llm: Arc<dyn LlmClient>,
    presenter: Arc<dyn OptionPresenter>,
    executor: Arc<RecordingExecutor>,
) -> PlanComponents {
    let prompts = Arc::new(PromptLoader::embedded_only());
    PlanComponents {
        goal_optimizer: Arc::new(EchoGoal),
        response_optimizer: Arc::new(PlainResponse),
        decomposer: Arc::new(
            TaskDecomposer::new(llm, prompts, DecomposerConfig::default()).with_current_date("2026-01-15"),
        ),
        presenter,
        executor,
        aggregator: Arc::new(Summary),
    }
}

#[tokio::test]
async fn test_research_query_runs_to_completion() {
    let llm = ScriptedLlm::new(vec![submit_tasks(research_tasks())]);
    let executor = Arc::new(RecordingExecutor::default());
    let runner = PlanRunner::new(
        components(llm, Arc::new(FirstOptionPresenter), executor.clone()),
        RunnerConfig::default(),
    );

    let state = runner.run("研究Xの最新動向を調査する").await.unwrap();

    assert_eq!(state.phase(), RunPhase::Done);
    assert_eq!(state.task_count(), 3);
    assert_eq!(state.chosen_options().len(), 3);
    assert_eq!(state.results().len(), 3);
    assert_eq!(state.current_task_index(), 3);
    assert!(!state.final_output().unwrap().is_empty());
    assert!(state.run_id().as_str().contains("-run-"));

    for (i, option) in state.chosen_options().into_iter().enumerate() {
        assert!(option < state.task(i).unwrap().options.len());
    }
    assert_eq!(executor.seen.lock().unwrap()[0], (0, "Search recent papers".to_string()));
}

#[tokio::test]
async fn test_four_options_fails_validation_in_init() {
    let llm = ScriptedLlm::new(vec![submit_tasks(json!([
        {"name": "a", "options": [
            {"description": "1"}, {"description": "2"}, {"description": "3"}, {"description": "4"}]},
        {"name": "b", "options": [{"description": "1"}, {"description": "2"}]},
        {"name": "c", "options": [{"description": "1"}, {"description": "2"}]}
    ]))]);
    let executor = Arc::new(RecordingExecutor::default());
    let runner = PlanRunner::new(
        components(llm, Arc::new(FirstOptionPresenter), executor.clone()),
        RunnerConfig::default(),
    );

    let failure = runner.run("goal").await.unwrap_err();
    assert!(matches!(
        failure.error,
        PlanError::Validation(ValidationError::OptionCount { count: 4, .. })
    ));
    assert_eq!(failure.state.phase(), RunPhase::Init);
    assert!(failure.state.tasks().is_none());
    assert_eq!(failure.state.failure().unwrap().kind, ErrorKind::Validation);
    assert!(executor.seen.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_presenter_failure_on_second_task_fail_fast() {
    // Decomposition, one selection, then an unusable answer for task 1
    let llm = ScriptedLlm::new(vec![
        submit_tasks(research_tasks()),
        CompletionResponse::text("2"),
        CompletionResponse::text("I would go with the second or maybe the third"),
    ]);
    let presenter = Arc::new(LlmOptionPresenter::new(llm.clone(), Arc::new(PromptLoader::embedded_only())));
    let runner = PlanRunner::new(
        components(llm, presenter, Arc::new(RecordingExecutor::default())),
        RunnerConfig::default(),
    );

    let failure = runner.run("研究Xの最新動向を調査する").await.unwrap_err();
    // "second or maybe the third" has no digits
    assert_eq!(failure.error.kind(), ErrorKind::Selection);
    assert_eq!(failure.state.chosen_options(), vec![1]);
    assert_eq!(failure.state.results().len(), 1);
    assert!(failure.state.final_output().is_none());
    assert_eq!(failure.state.failure().unwrap().task_index, Some(1));
}

#[tokio::test]
async fn test_best_effort_run_reports_fallback() {
    let llm = ScriptedLlm::new(vec![submit_tasks(research_tasks())]);
    let presenter = Arc::new(FnOptionPresenter::new(|task: &Task, _state: &PlanState| {
        if task.options.len() == 3 {
            Err(PlanError::selection(2, "undecided"))
        } else {
            Ok(1)
        }
    }));
    let runner = PlanRunner::new(
        components(llm, presenter, Arc::new(RecordingExecutor::default())),
        RunnerConfig {
            failure_policy: FailurePolicy::BestEffort,
            ..RunnerConfig::default()
        },
    );

    let state = runner.run("goal").await.unwrap();
    assert_eq!(state.chosen_options(), vec![1, 1, 0]);
    let report = serde_json::to_value(state.report()).unwrap();
    assert_eq!(report["fallbacks"], json!([2]));
    assert_eq!(report["phase"]["name"], "done");
}

#[tokio::test]
async fn test_parallel_run_keeps_task_order() {
    let llm = ScriptedLlm::new(vec![submit_tasks(research_tasks())]);
    let runner = PlanRunner::new(
        components(llm, Arc::new(FirstOptionPresenter), Arc::new(RecordingExecutor::default())),
        RunnerConfig {
            mode: ExecutionMode::Parallel { max_concurrent: 3 },
            ..RunnerConfig::default()
        },
    );

    let state = runner.run("goal").await.unwrap();
    assert_eq!(
        state.results(),
        vec![
            "findings for 研究Xの主要論文を集める",
            "findings for 研究Xの主要プレイヤーを特定する",
            "findings for 最新動向を要約する"
        ]
    );
}

#[tokio::test]
async fn test_cancel_before_run_leaves_state_untouched() {
    let llm = ScriptedLlm::new(vec![submit_tasks(research_tasks())]);
    let handle = CancelHandle::new();
    handle.cancel();
    let runner = PlanRunner::new(
        components(llm, Arc::new(FirstOptionPresenter), Arc::new(RecordingExecutor::default())),
        RunnerConfig {
            failure_policy: FailurePolicy::BestEffort,
            step_timeout: Duration::from_secs(1),
            ..RunnerConfig::default()
        },
    )
    .with_cancel_token(handle.token());

    let failure = runner.run("goal").await.unwrap_err();
    assert!(matches!(failure.error, PlanError::Cancelled));
    assert_eq!(failure.state.phase(), RunPhase::Init);
}

#[tokio::test]
async fn test_replayed_commit_is_a_no_op() {
    let llm = ScriptedLlm::new(vec![submit_tasks(research_tasks())]);
    let runner = PlanRunner::new(
        components(llm, Arc::new(FirstOptionPresenter), Arc::new(RecordingExecutor::default())),
        RunnerConfig::default(),
    );
    let state = runner.decompose_only("goal").await.unwrap();
    assert_eq!(state.phase(), RunPhase::Decomposed);

    let mut state = state;
    state.start_execution().unwrap();
    let record = multipath::domain::StepRecord::completed(0, 1, "found");
    assert!(state.commit_step(record.clone()).unwrap());
    assert!(!state.commit_step(record).unwrap());
    assert_eq!(state.chosen_options(), vec![1]);

    let conflicting = multipath::domain::StepRecord::completed(0, 0, "other");
    assert!(state.commit_step(conflicting).is_err());
}

#[test]
fn test_decomposed_tasks_bounds_from_public_api() {
    let two = vec![Task::new("a", ["x", "y"]), Task::new("b", ["x", "y"])];
    assert!(DecomposedTasks::new(two).is_err());

    let one_option = vec![
        Task::new("a", ["x"]),
        Task::new("b", ["x", "y"]),
        Task::new("c", ["x", "y"]),
    ];
    assert!(matches!(
        DecomposedTasks::new(one_option),
        Err(ValidationError::OptionCount { count: 1, .. })
    ));
}
