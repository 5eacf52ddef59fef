//! Run configuration.
//!
//! [`RunArgs`] is the raw clap surface. [`Config::from_args`] resolves
//! defaults that depend on other values and validates the result, reporting
//! every invalid field at once.

mod args;
mod validate;

use std::collections::BTreeMap;
use std::time::Duration;

pub use args::RunArgs;
pub use validate::{ConfigError, FieldError};

use crate::plan::PlanRequest;
use crate::runner::{RunnerConfig, RunnerKind};

/// Validated configuration for one node's run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub server_base_url: String,
    pub access_token: String,
    pub organization_slug: String,
    pub suite_slug: String,
    pub identifier: String,
    pub parallelism: usize,
    pub node_index: usize,
    pub branch: String,
    pub max_retries: usize,
    pub test_runner: RunnerKind,
    pub test_command: Option<String>,
    pub retry_test_command: Option<String>,
    pub test_file_pattern: Option<String>,
    pub test_file_exclude_pattern: Option<String>,
    pub result_path: Option<String>,
    pub split_by_example: bool,
    pub slow_file_threshold: Duration,
    pub api_deadline: Duration,
    pub debug: bool,
}

impl Config {
    /// Build and validate the configuration from parsed arguments.
    pub fn from_args(args: RunArgs) -> Result<Self, ConfigError> {
        let identifier = match args.identifier.filter(|id| !id.is_empty()) {
            Some(identifier) => identifier,
            None => match (args.build_id, args.step_id) {
                (Some(build), Some(step)) if !build.is_empty() && !step.is_empty() => {
                    format!("{build}/{step}")
                }
                _ => String::new(),
            },
        };

        let config = Self {
            server_base_url: args.base_url,
            access_token: args.access_token,
            organization_slug: args.organization_slug,
            suite_slug: args.suite_slug,
            identifier,
            parallelism: args.parallelism,
            node_index: args.node_index,
            branch: args.branch,
            max_retries: args.max_retries,
            test_runner: args.test_runner,
            test_command: non_empty(args.test_command),
            retry_test_command: non_empty(args.retry_command),
            test_file_pattern: non_empty(args.test_file_pattern),
            test_file_exclude_pattern: non_empty(args.test_file_exclude_pattern),
            result_path: non_empty(args.result_path),
            split_by_example: args.split_by_example,
            slow_file_threshold: Duration::from_millis(args.slow_file_threshold),
            api_deadline: Duration::from_secs(args.api_timeout),
            debug: args.debug,
        };

        config.validate()?;
        Ok(config)
    }

    /// Overrides handed to the runner adapter.
    pub fn runner_config(&self) -> RunnerConfig {
        RunnerConfig {
            test_command: self.test_command.clone(),
            retry_test_command: self.retry_test_command.clone(),
            test_file_pattern: self.test_file_pattern.clone(),
            test_file_exclude_pattern: self.test_file_exclude_pattern.clone(),
            result_path: self.result_path.clone(),
        }
    }

    /// Inputs for plan resolution.
    pub fn plan_request(&self) -> PlanRequest {
        PlanRequest {
            suite_slug: self.suite_slug.clone(),
            identifier: self.identifier.clone(),
            parallelism: self.parallelism,
            branch: self.branch.clone(),
            split_by_example: self.split_by_example,
            slow_file_threshold: self.slow_file_threshold,
        }
    }

    /// Non-secret settings keyed by environment variable name.
    ///
    /// The access token is never included.
    pub fn dump_env(&self) -> BTreeMap<String, String> {
        let optional = |value: &Option<String>| value.clone().unwrap_or_default();

        [
            ("BUILDKITE_SPLITTER_BASE_URL", self.server_base_url.clone()),
            ("BUILDKITE_ORGANIZATION_SLUG", self.organization_slug.clone()),
            ("BUILDKITE_SPLITTER_SUITE_SLUG", self.suite_slug.clone()),
            ("BUILDKITE_SPLITTER_IDENTIFIER", self.identifier.clone()),
            ("BUILDKITE_PARALLEL_JOB_COUNT", self.parallelism.to_string()),
            ("BUILDKITE_PARALLEL_JOB", self.node_index.to_string()),
            ("BUILDKITE_BRANCH", self.branch.clone()),
            ("BUILDKITE_SPLITTER_RETRY_COUNT", self.max_retries.to_string()),
            ("BUILDKITE_SPLITTER_TEST_RUNNER", self.test_runner.as_str().to_string()),
            ("BUILDKITE_SPLITTER_TEST_CMD", optional(&self.test_command)),
            ("BUILDKITE_SPLITTER_RETRY_CMD", optional(&self.retry_test_command)),
            ("BUILDKITE_SPLITTER_TEST_FILE_PATTERN", optional(&self.test_file_pattern)),
            (
                "BUILDKITE_SPLITTER_TEST_FILE_EXCLUDE_PATTERN",
                optional(&self.test_file_exclude_pattern),
            ),
            ("BUILDKITE_SPLITTER_RESULT_PATH", optional(&self.result_path)),
            ("BUILDKITE_SPLITTER_SPLIT_BY_EXAMPLE", self.split_by_example.to_string()),
            (
                "BUILDKITE_SPLITTER_SLOW_FILE_THRESHOLD",
                self.slow_file_threshold.as_millis().to_string(),
            ),
            ("BUILDKITE_SPLITTER_API_TIMEOUT", self.api_deadline.as_secs().to_string()),
            ("BUILDKITE_SPLITTER_DEBUG_ENABLED", self.debug.to_string()),
        ]
        .into_iter()
        .map(|(key, value)| (key.to_string(), value))
        .collect()
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
