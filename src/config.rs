//! Runtime configuration read once at startup from environment variables.
//!
//! Every knob has a documented default; invalid values are logged and the
//! default is used rather than aborting the run.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use tracing::warn;

use crate::workflow::retry::RetryPolicy;

/// Model identifier passed to the provider CLI.
const MODEL_ENV: &str = "AUTOFLOW_MODEL";
const DEFAULT_MODEL: &str = "claude";

/// Verbosity toggle ("true", "1", "t", "yes" enable).
const VERBOSE_ENV: &str = "AUTOFLOW_VERBOSE";

/// Retries after the first model-call failure (attempts = retries + 1).
const RETRIES_ENV: &str = "AUTOFLOW_MODEL_RETRIES";
const DEFAULT_RETRIES: u32 = 2;

/// Byte budget for the diff text embedded in prompts.
const DIFF_BUDGET_ENV: &str = "AUTOFLOW_DIFF_BUDGET";
const DEFAULT_DIFF_BUDGET: usize = 60_000;

/// Branches on which direct commits trigger automatic branch creation.
const PROTECTED_ENV: &str = "AUTOFLOW_PROTECTED_BRANCHES";
const DEFAULT_PROTECTED: &[&str] = &["main", "master"];

/// Glob patterns excluded from automatic staging.
const EXCLUDE_ENV: &str = "AUTOFLOW_EXCLUDE";

/// Maximum length of a generated branch slug.
const SLUG_MAX_ENV: &str = "AUTOFLOW_SLUG_MAX";
const DEFAULT_SLUG_MAX: usize = 60;

/// Model subprocess timeout in seconds.
const MODEL_TIMEOUT_ENV: &str = "AUTOFLOW_MODEL_TIMEOUT";
const DEFAULT_MODEL_TIMEOUT_SECS: u64 = 120;

/// Pull-request creation timeout in seconds.
const GITHUB_TIMEOUT_ENV: &str = "AUTOFLOW_GITHUB_TIMEOUT";
const DEFAULT_GITHUB_TIMEOUT_SECS: u64 = 30;

/// Lock files and generated artifacts never auto-staged.
pub const DEFAULT_EXCLUDES: &[&str] = &[
    "Cargo.lock",
    "package-lock.json",
    "yarn.lock",
    "pnpm-lock.yaml",
    "poetry.lock",
    "uv.lock",
    "Pipfile.lock",
    "composer.lock",
    "Gemfile.lock",
    "target/**",
    "dist/**",
    "node_modules/**",
];

/// Configuration for one invocation, immutable after startup.
#[derive(Debug, Clone)]
pub struct FlowConfig {
    pub model: String,
    pub verbose: bool,
    pub model_retries: u32,
    pub diff_budget: usize,
    pub protected_branches: Vec<String>,
    pub exclude_patterns: Vec<String>,
    pub slug_max_len: usize,
    pub model_timeout: Duration,
    pub github_timeout: Duration,
    /// Ask before committing (set from the CLI, not the environment).
    pub confirm: bool,
}

impl FlowConfig {
    /// Read configuration from the environment, falling back to defaults.
    pub fn from_env() -> Self {
        FlowConfig {
            model: env_string(MODEL_ENV, DEFAULT_MODEL),
            verbose: env_flag(VERBOSE_ENV),
            model_retries: env_parse(RETRIES_ENV, DEFAULT_RETRIES),
            diff_budget: env_parse(DIFF_BUDGET_ENV, DEFAULT_DIFF_BUDGET),
            protected_branches: env_list(PROTECTED_ENV, DEFAULT_PROTECTED),
            exclude_patterns: env_list(EXCLUDE_ENV, DEFAULT_EXCLUDES),
            slug_max_len: env_parse(SLUG_MAX_ENV, DEFAULT_SLUG_MAX),
            model_timeout: Duration::from_secs(env_parse(
                MODEL_TIMEOUT_ENV,
                DEFAULT_MODEL_TIMEOUT_SECS,
            )),
            github_timeout: Duration::from_secs(env_parse(
                GITHUB_TIMEOUT_ENV,
                DEFAULT_GITHUB_TIMEOUT_SECS,
            )),
            confirm: false,
        }
    }

    /// Retry policy applied to model calls: retries + 1 total attempts,
    /// 1s base delay, doubling per attempt.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.model_retries + 1)
    }
}

impl Default for FlowConfig {
    fn default() -> Self {
        FlowConfig {
            model: DEFAULT_MODEL.to_string(),
            verbose: false,
            model_retries: DEFAULT_RETRIES,
            diff_budget: DEFAULT_DIFF_BUDGET,
            protected_branches: DEFAULT_PROTECTED.iter().map(|s| s.to_string()).collect(),
            exclude_patterns: DEFAULT_EXCLUDES.iter().map(|s| s.to_string()).collect(),
            slug_max_len: DEFAULT_SLUG_MAX,
            model_timeout: Duration::from_secs(DEFAULT_MODEL_TIMEOUT_SECS),
            github_timeout: Duration::from_secs(DEFAULT_GITHUB_TIMEOUT_SECS),
            confirm: false,
        }
    }
}

fn env_string(var: &str, default: &str) -> String {
    match env::var(var) {
        Ok(v) if !v.trim().is_empty() => v.trim().to_string(),
        _ => default.to_string(),
    }
}

fn env_flag(var: &str) -> bool {
    match env::var(var) {
        Ok(v) => matches!(v.to_lowercase().as_str(), "true" | "1" | "t" | "yes"),
        Err(_) => false,
    }
}

fn env_parse<T: FromStr + Copy>(var: &str, default: T) -> T {
    match env::var(var) {
        Ok(v) if !v.is_empty() => match v.parse::<T>() {
            Ok(value) => value,
            Err(_) => {
                warn!("invalid {} value '{}', using default", var, v);
                default
            }
        },
        _ => default,
    }
}

fn env_list(var: &str, default: &[&str]) -> Vec<String> {
    match env::var(var) {
        Ok(v) if !v.trim().is_empty() => v
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect(),
        _ => default.iter().map(|s| s.to_string()).collect(),
    }
}
