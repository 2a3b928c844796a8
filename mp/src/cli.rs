//! CLI command definitions

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::debug;

use crate::orchestrator::FailurePolicy;
use crate::planning::PresenterKind;

/// multipath - plan, choose, research, answer
#[derive(Parser)]
#[command(
    name = "mpp",
    about = "Multi-path plan generation agent",
    version = env!("CARGO_PKG_VERSION"),
    after_help = after_help()
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[arg(
        short = 'l',
        long = "log-level",
        global = true,
        help = "Log level (TRACE, DEBUG, INFO, WARN, ERROR)"
    )]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the full pipeline for a query
    Run {
        /// What you want to find out or achieve
        query: String,

        /// Option selection policy (overrides config)
        #[arg(long, value_enum)]
        presenter: Option<PresenterKind>,

        /// Failure policy (overrides config)
        #[arg(long = "failure-policy", value_enum)]
        failure_policy: Option<FailurePolicy>,

        /// Tasks in flight at once (overrides config)
        #[arg(short, long)]
        parallel: Option<usize>,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,

        /// Also write the final state as JSON to this file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Optimize and decompose a goal without executing it
    Decompose {
        /// Goal to decompose
        goal: String,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Print the effective configuration
    Config,
}

/// Output format for run and decompose
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        debug!(%s, "OutputFormat::from_str: called");
        match s.to_lowercase().as_str() {
            "text" | "plain" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => Err(format!("Unknown format: {}. Use text or json", other)),
        }
    }
}

/// Where the log file goes
pub fn get_log_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("multipath")
        .join("logs")
        .join("multipath.log")
}

fn after_help() -> String {
    format!("Logs are written to: {}", get_log_path().display())
}
