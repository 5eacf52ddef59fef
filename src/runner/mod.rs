//! Test framework adapters.
//!
//! The plan and retry logic only see the [`TestRunner`] trait. Each supported
//! framework has one implementing type that knows how to discover test files,
//! expand files into examples, invoke the framework and read its report.

pub mod command;
pub mod discover;
mod jest;
mod playwright;
mod rspec;

use std::fs;
use std::path::Path;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::plan::TestCase;

pub use command::{describe_signal, install_signal_handler, CommandExit};
pub use jest::Jest;
pub use playwright::Playwright;
pub use rspec::Rspec;

/// Outcome category of a single run of the test command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    /// Every test passed.
    Passed,
    /// The report was read and at least one test failed.
    Failed,
    /// The command could not produce an interpretable report.
    Error,
}

/// Result of one execution attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunResult {
    pub status: RunStatus,
    /// Identifiers of failing tests, in report order. Empty unless `Failed`.
    pub failed_tests: Vec<String>,
}

impl RunResult {
    pub fn passed() -> Self {
        Self {
            status: RunStatus::Passed,
            failed_tests: Vec::new(),
        }
    }

    pub fn failed(failed_tests: Vec<String>) -> Self {
        Self {
            status: RunStatus::Failed,
            failed_tests,
        }
    }
}

/// Errors raised by runner adapters.
///
/// Failing tests are not errors; they are reported through [`RunResult`].
#[derive(Error, Debug)]
pub enum RunnerError {
    /// The test command was killed by a signal.
    #[error("test command was terminated by {}", describe_signal(*.signal))]
    Signaled { signal: i32 },

    /// The test command failed and its report could not be read, so the
    /// failing tests are unknown.
    #[error("test command exited with status {code} and its report could not be read: {reason}")]
    ReportParse { code: i32, reason: String },

    /// The test command failed but its report lists no failing tests.
    #[error("test command exited with status {code} without reporting failing tests")]
    Exited { code: i32 },

    #[error("failed to start `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid test command `{command}`: {reason}")]
    InvalidCommand { command: String, reason: String },

    #[error("invalid file pattern `{pattern}`: {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("no files found with pattern {pattern:?} and exclude pattern {exclude:?}")]
    NoFilesFound { pattern: String, exclude: String },

    /// The dry run used to enumerate examples failed.
    #[error("dry run failed: {0}")]
    DryRun(String),

    #[error("failed to read report {path}: {reason}")]
    Report { path: String, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Capability every framework adapter provides.
#[async_trait]
pub trait TestRunner: Send + Sync {
    /// Human-readable framework name.
    fn name(&self) -> &'static str;

    /// Discover candidate test files, sorted, with exclusions applied.
    fn get_files(&self) -> Result<Vec<String>, RunnerError>;

    /// Expand `files` into individual examples. Adapters without dry-run
    /// support return an empty list.
    async fn get_examples(&self, files: &[String]) -> Result<Vec<TestCase>, RunnerError>;

    /// Run `test_cases` and classify the outcome. `retry` selects the retry
    /// command when the adapter has one.
    async fn run(&self, test_cases: &[String], retry: bool) -> Result<RunResult, RunnerError>;
}

/// Supported test frameworks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum RunnerKind {
    Rspec,
    Jest,
    Playwright,
}

impl RunnerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunnerKind::Rspec => "rspec",
            RunnerKind::Jest => "jest",
            RunnerKind::Playwright => "playwright",
        }
    }
}

/// User overrides for an adapter. Unset fields take the adapter's defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunnerConfig {
    pub test_command: Option<String>,
    pub retry_test_command: Option<String>,
    pub test_file_pattern: Option<String>,
    pub test_file_exclude_pattern: Option<String>,
    pub result_path: Option<String>,
}

/// Build the adapter for `kind`.
pub fn detect_runner(kind: RunnerKind, config: RunnerConfig) -> Box<dyn TestRunner> {
    match kind {
        RunnerKind::Rspec => Box::new(Rspec::new(config)),
        RunnerKind::Jest => Box::new(Jest::new(config)),
        RunnerKind::Playwright => Box::new(Playwright::new(config)),
    }
}

/// Default report location for a framework, under the system temp directory.
fn default_result_path(framework: &str) -> String {
    std::env::temp_dir()
        .join(format!(
            "test-splitter-{}-{}.json",
            framework,
            std::process::id()
        ))
        .to_string_lossy()
        .into_owned()
}

/// Read and decode a JSON report written by a test framework.
pub(crate) fn read_json_file<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T, RunnerError> {
    let path = path.as_ref();
    let data = fs::read(path).map_err(|err| RunnerError::Report {
        path: path.display().to_string(),
        reason: err.to_string(),
    })?;
    serde_json::from_slice(&data).map_err(|err| RunnerError::Report {
        path: path.display().to_string(),
        reason: err.to_string(),
    })
}

/// Delete a stale report so a failed run cannot be classified from an
/// earlier attempt's output.
pub(crate) fn remove_stale_report(path: &str) -> Result<(), RunnerError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(RunnerError::Io(err)),
    }
}
