//! mpp - multipath command line

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Parser;
use colored::Colorize;
use eyre::{Context, Result};
use tracing::{debug, info, warn};

use multipath::cli::{Cli, Command, OutputFormat, get_log_path};
use multipath::config::Config;
use multipath::domain::PlanState;
use multipath::llm::create_client;
use multipath::orchestrator::{CancelHandle, CancelToken, PlanComponents, PlanRunner, RunFailure};
use multipath::planning::{
    DecomposerConfig, FirstOptionPresenter, LlmAggregator, LlmGoalOptimizer, LlmOptionPresenter, LlmResponseOptimizer,
    OptionPresenter, PresenterKind, ResearchExecutor, TaskDecomposer,
};
use multipath::prompts::PromptLoader;
use multipath::tools::ToolExecutor;

fn setup_logging(cli_log_level: Option<&str>, config_log_level: Option<&str>) -> Result<()> {
    // Logging is not up yet, so nothing here can trace
    let log_path = get_log_path();
    let log_dir = log_path.parent().map(Path::to_path_buf).unwrap_or_else(|| PathBuf::from("."));
    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    // Priority: CLI --log-level > config file > INFO
    let level = match cli_log_level.or(config_log_level).map(str::to_uppercase).as_deref() {
        Some("TRACE") => tracing::Level::TRACE,
        Some("DEBUG") => tracing::Level::DEBUG,
        Some("INFO") | None => tracing::Level::INFO,
        Some("WARN") | Some("WARNING") => tracing::Level::WARN,
        Some("ERROR") => tracing::Level::ERROR,
        Some(other) => {
            eprintln!("Warning: Unknown log-level '{}', defaulting to INFO", other);
            tracing::Level::INFO
        }
    };

    let log_file = fs::File::create(&log_path).context("Failed to create log file")?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!("Logging initialized (level: {:?})", level);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_log_level = Config::load_log_level(cli.config.as_ref());
    setup_logging(cli.log_level.as_deref(), config_log_level.as_deref()).context("Failed to setup logging")?;

    let mut config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;

    debug!(command = ?cli.command, "main: dispatching command");
    match cli.command {
        Command::Run {
            query,
            presenter,
            failure_policy,
            parallel,
            format,
            output,
        } => {
            if let Some(presenter) = presenter {
                config.planner.presenter = presenter;
            }
            if let Some(policy) = failure_policy {
                config.planner.failure_policy = policy;
            }
            if let Some(parallel) = parallel {
                config.planner.parallel = parallel;
            }
            cmd_run(&config, &query, format, output.as_deref()).await
        }
        Command::Decompose { goal, format } => cmd_decompose(&config, &goal, format).await,
        Command::Config => cmd_config(&config),
    }
}

/// Wire the LLM-backed components from configuration
fn build_components(config: &Config, tools: ToolExecutor) -> Result<PlanComponents> {
    debug!("build_components: called");
    let llm = create_client(&config.llm.resolve()?).context("Failed to create LLM client")?;
    let mini = create_client(&config.llm.resolve_mini()?).context("Failed to create LLM client")?;

    let prompts = Arc::new(
        PromptLoader::new(config.planner.prompts_dir.as_deref()).with_language(config.planner.language.clone()),
    );

    let presenter: Arc<dyn OptionPresenter> = match config.planner.presenter {
        PresenterKind::First => Arc::new(FirstOptionPresenter),
        PresenterKind::Llm => Arc::new(LlmOptionPresenter::new(mini.clone(), prompts.clone())),
    };

    Ok(PlanComponents {
        goal_optimizer: Arc::new(LlmGoalOptimizer::new(llm.clone(), prompts.clone())),
        response_optimizer: Arc::new(LlmResponseOptimizer::new(mini, prompts.clone())),
        decomposer: Arc::new(TaskDecomposer::new(llm.clone(), prompts.clone(), DecomposerConfig::default())),
        presenter,
        executor: Arc::new(ResearchExecutor::new(
            llm.clone(),
            Arc::new(tools),
            prompts.clone(),
            config.planner.max_turns,
        )),
        aggregator: Arc::new(LlmAggregator::new(llm, prompts)),
    })
}

/// Token that fires on Ctrl-C
fn cancel_on_ctrl_c() -> CancelToken {
    let handle = CancelHandle::new();
    let token = handle.token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Ctrl-C received, cancelling run");
            eprintln!("{}", "Cancelling...".yellow());
            handle.cancel();
        }
    });
    token
}

async fn cmd_run(config: &Config, query: &str, format: OutputFormat, output: Option<&Path>) -> Result<()> {
    debug!(%query, ?format, "cmd_run: called");
    config.validate()?;
    let tools = ToolExecutor::research(config.search.resolve()?);
    debug!(tools = ?tools.tool_names(), "cmd_run: research tools ready");
    let components = build_components(config, tools)?;

    let runner = PlanRunner::new(components, config.planner.runner_config()).with_cancel_token(cancel_on_ctrl_c());

    if format == OutputFormat::Text {
        println!("{} {}", "Planning:".bold(), query);
    }

    let outcome = runner.run(query).await;
    let state = match &outcome {
        Ok(state) => state,
        Err(failure) => &failure.state,
    };

    if let Some(path) = output {
        write_report(state, path)?;
    }

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&state.report())?),
        OutputFormat::Text => print_run(state),
    }

    match outcome {
        Ok(_) => Ok(()),
        Err(RunFailure { error, .. }) => Err(eyre::eyre!(error).wrap_err("Run failed")),
    }
}

async fn cmd_decompose(config: &Config, goal: &str, format: OutputFormat) -> Result<()> {
    debug!(%goal, ?format, "cmd_decompose: called");
    config.validate()?;
    let components = build_components(config, ToolExecutor::empty())?;
    let runner = PlanRunner::new(components, config.planner.runner_config());

    let state = runner
        .decompose_only(goal)
        .await
        .map_err(|failure| eyre::eyre!(failure.error).wrap_err("Decomposition failed"))?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&state.report())?),
        OutputFormat::Text => print_plan(&state),
    }
    Ok(())
}

fn cmd_config(config: &Config) -> Result<()> {
    debug!("cmd_config: called");
    let yaml = serde_yaml::to_string(config).context("Failed to serialize configuration")?;
    print!("{}", yaml);
    Ok(())
}

fn write_report(state: &PlanState, path: &Path) -> Result<()> {
    debug!(path = %path.display(), "write_report: called");
    let json = serde_json::to_string_pretty(&state.report())?;
    fs::write(path, json).context(format!("Failed to write report to {}", path.display()))?;
    info!(path = %path.display(), "Report written");
    Ok(())
}

fn print_plan(state: &PlanState) {
    if let Some(goal) = state.optimized_goal() {
        println!("{}\n{}\n", "Goal:".bold(), goal);
    }
    let Some(tasks) = state.tasks() else {
        return;
    };
    for (i, task) in tasks.iter().enumerate() {
        println!("{} {}", format!("{}.", i + 1).cyan().bold(), task.name);
        for (j, option) in task.options.iter().enumerate() {
            println!("   {} {}", format!("{})", j + 1).dimmed(), option.description);
        }
    }
}

fn print_run(state: &PlanState) {
    print_plan(state);
    println!();

    let chosen = state.chosen_options();
    for (step, option) in state.steps().prefix().zip(chosen) {
        let Some(task) = state.task(step.task_index) else {
            continue;
        };
        let marker = if step.error.is_some() {
            "✗".red()
        } else if step.fallback {
            "~".yellow()
        } else {
            "✓".green()
        };
        let approach = task.options.get(option).map_or("", |o| o.description.as_str());
        println!("{} {} ({})", marker, task.name.bold(), approach.dimmed());
    }

    if let Some(output) = state.final_output() {
        println!("\n{}\n{}", "Answer:".bold().green(), output);
    }
    if let Some(failure) = state.failure() {
        let at = failure.task_index.map(|i| format!(" at task {}", i + 1)).unwrap_or_default();
        eprintln!("\n{} {}{}: {}", "Failed:".bold().red(), failure.kind, at, failure.message);
    }
}
