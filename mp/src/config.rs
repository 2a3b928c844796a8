//! Configuration types and loading
//!
//! Configuration is read from YAML, then resolved into plain values
//! ([`ResolvedLlmConfig`], [`SearchSettings`]) that are handed to
//! constructors. Nothing here writes to the process environment.

use eyre::{Context, Result, bail, eyre};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::orchestrator::{ExecutionMode, FailurePolicy, RunnerConfig};
use crate::planning::PresenterKind;
use crate::tools::{SearchProvider, SearchSettings};

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[serde(rename = "log-level", skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,

    /// LLM provider configuration
    pub llm: LlmConfig,

    /// Research search API configuration
    pub search: SearchConfig,

    /// Planning run behaviour
    pub planner: PlannerConfig,
}

impl Config {
    /// Validate configuration before use
    ///
    /// Checks that the LLM API key is present and planner values are sane.
    pub fn validate(&self) -> Result<()> {
        debug!("Config::validate: called");
        self.llm.get_api_key()?;

        if !(0.0..=2.0).contains(&self.llm.temperature) {
            bail!("llm.temperature must be within 0.0..=2.0, got {}", self.llm.temperature);
        }
        if self.planner.parallel == 0 {
            bail!("planner.parallel must be at least 1");
        }
        if self.planner.step_timeout_ms == 0 {
            bail!("planner.step-timeout-ms must be greater than zero");
        }
        if self.planner.max_turns == 0 {
            bail!("planner.max-turns must be at least 1");
        }
        Ok(())
    }

    /// Load configuration with fallback chain
    ///
    /// Explicit path, then `./.multipath.yml`, then
    /// `~/.config/multipath/multipath.yml`, then defaults.
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        for candidate in Self::search_paths() {
            if candidate.exists() {
                match Self::load_from_file(&candidate) {
                    Ok(config) => return Ok(config),
                    Err(e) => warn!("Failed to load config from {}: {}", candidate.display(), e),
                }
            }
        }

        info!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Read just the log level, before logging is set up
    ///
    /// Errors are swallowed; the full load reports them once logging works.
    pub fn load_log_level(config_path: Option<&PathBuf>) -> Option<String> {
        let path = match config_path {
            Some(p) => Some(p.clone()),
            None => Self::search_paths().into_iter().find(|p| p.exists()),
        }?;
        let content = fs::read_to_string(path).ok()?;
        let config: Self = serde_yaml::from_str(&content).ok()?;
        config.log_level
    }

    fn search_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from(".multipath.yml")];
        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("multipath").join("multipath.yml"));
        }
        paths
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;
        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;
        info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }
}

/// LLM provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Provider name ("openai" or "anthropic")
    pub provider: String,

    /// Main model: optimizers, decomposition, execution, aggregation
    pub model: String,

    /// Lightweight model for option selection (falls back to `model`)
    #[serde(rename = "mini-model", skip_serializing_if = "Option::is_none")]
    pub mini_model: Option<String>,

    /// Environment variable containing the API key
    #[serde(rename = "api-key-env")]
    pub api_key_env: String,

    /// API base URL
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Maximum tokens per response
    #[serde(rename = "max-tokens")]
    pub max_tokens: u32,

    /// Request timeout in milliseconds
    #[serde(rename = "timeout-ms")]
    pub timeout_ms: u64,

    /// Sampling temperature
    pub temperature: f32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: "gpt-4o".to_string(),
            mini_model: Some("gpt-4o-mini".to_string()),
            api_key_env: "OPENAI_API_KEY".to_string(),
            base_url: "https://api.openai.com".to_string(),
            max_tokens: 4096,
            timeout_ms: 120_000,
            temperature: 0.0,
        }
    }
}

impl LlmConfig {
    /// Read the API key from the configured environment variable
    pub fn get_api_key(&self) -> Result<String> {
        match std::env::var(&self.api_key_env) {
            Ok(key) if !key.trim().is_empty() => Ok(key),
            _ => Err(eyre!(
                "LLM API key not found. Set the {} environment variable.",
                self.api_key_env
            )),
        }
    }

    /// Resolve the main model
    pub fn resolve(&self) -> Result<ResolvedLlmConfig> {
        self.resolve_model(&self.model)
    }

    /// Resolve the lightweight model used for option selection
    pub fn resolve_mini(&self) -> Result<ResolvedLlmConfig> {
        self.resolve_model(self.mini_model.as_deref().unwrap_or(&self.model))
    }

    fn resolve_model(&self, model: &str) -> Result<ResolvedLlmConfig> {
        debug!(provider = %self.provider, %model, "LlmConfig::resolve_model: called");
        Ok(ResolvedLlmConfig {
            provider: self.provider.clone(),
            model: model.to_string(),
            api_key: self.get_api_key()?,
            base_url: self.base_url.clone(),
            max_tokens: self.max_tokens,
            timeout_ms: self.timeout_ms,
            temperature: self.temperature,
        })
    }
}

/// Fully resolved LLM settings handed to a client constructor
#[derive(Clone)]
pub struct ResolvedLlmConfig {
    pub provider: String,
    pub model: String,
    pub api_key: String,
    pub base_url: String,
    pub max_tokens: u32,
    pub timeout_ms: u64,
    pub temperature: f32,
}

impl std::fmt::Debug for ResolvedLlmConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedLlmConfig")
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("max_tokens", &self.max_tokens)
            .field("timeout_ms", &self.timeout_ms)
            .field("temperature", &self.temperature)
            .finish()
    }
}

/// Search API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// API provider: "tavily", "brave", "serpapi"
    pub provider: String,

    /// Environment variable containing the API key
    #[serde(rename = "api-key-env")]
    pub api_key_env: String,

    /// Results returned per query unless the model asks otherwise
    #[serde(rename = "max-results")]
    pub max_results: usize,

    /// Request timeout in milliseconds
    #[serde(rename = "timeout-ms")]
    pub timeout_ms: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            provider: "tavily".to_string(),
            api_key_env: "TAVILY_API_KEY".to_string(),
            max_results: 5,
            timeout_ms: 30_000,
        }
    }
}

impl SearchConfig {
    /// Resolve into settings for the search tool
    pub fn resolve(&self) -> Result<SearchSettings> {
        debug!(provider = %self.provider, "SearchConfig::resolve: called");
        let provider: SearchProvider = self.provider.parse()?;
        let api_key = match std::env::var(&self.api_key_env) {
            Ok(key) if !key.trim().is_empty() => key,
            _ => bail!("Search API key not found. Set the {} environment variable.", self.api_key_env),
        };
        Ok(SearchSettings {
            provider,
            api_key,
            max_results: self.max_results,
            timeout: Duration::from_millis(self.timeout_ms),
        })
    }
}

/// Planning run configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    /// Option selection policy
    pub presenter: PresenterKind,

    /// What a per-task failure does to the run
    #[serde(rename = "failure-policy")]
    pub failure_policy: FailurePolicy,

    /// Steps in flight at once; 1 runs tasks strictly in order
    pub parallel: usize,

    /// Timeout for each collaborator call in milliseconds
    #[serde(rename = "step-timeout-ms")]
    pub step_timeout_ms: u64,

    /// Tool-loop turns the executor may take per task
    #[serde(rename = "max-turns")]
    pub max_turns: u32,

    /// Output language for generated tasks and answers (default: the goal's language)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,

    /// Directory with `<name>.pmt` prompt overrides
    #[serde(rename = "prompts-dir", skip_serializing_if = "Option::is_none")]
    pub prompts_dir: Option<PathBuf>,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            presenter: PresenterKind::Llm,
            failure_policy: FailurePolicy::FailFast,
            parallel: 1,
            step_timeout_ms: 300_000,
            max_turns: 8,
            language: None,
            prompts_dir: None,
        }
    }
}

impl PlannerConfig {
    /// Runner settings derived from this section
    pub fn runner_config(&self) -> RunnerConfig {
        RunnerConfig {
            failure_policy: self.failure_policy,
            mode: if self.parallel > 1 {
                ExecutionMode::Parallel {
                    max_concurrent: self.parallel,
                }
            } else {
                ExecutionMode::Sequential
            },
            step_timeout: Duration::from_millis(self.step_timeout_ms),
        }
    }
}
