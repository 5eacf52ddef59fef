use async_trait::async_trait;
use serde::Deserialize;
use tokio::process::Command;
use tracing::debug;

use super::command::{command_name_and_args, run_and_forward_signal, RESULT_PATH};
use super::discover::discover_test_files;
use super::{
    default_result_path, read_json_file, remove_stale_report, CommandExit, RunResult,
    RunnerConfig, RunnerError, TestRunner,
};
use crate::plan::{TestCase, FORMAT_EXAMPLE};

const DEFAULT_TEST_COMMAND: &str =
    "bundle exec rspec --format progress --format json --out {{resultPath}} {{testExamples}}";
const DEFAULT_TEST_FILE_PATTERN: &str = "spec/**/*_spec.rb";

/// A single example in an RSpec JSON report.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RspecExample {
    pub id: String,
    pub description: String,
    pub full_description: String,
    pub status: String,
    pub file_path: String,
    pub line_number: u32,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RspecSummary {
    pub example_count: u32,
    pub failure_count: u32,
    pub pending_count: u32,
}

/// RSpec's `--format json` output.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RspecReport {
    pub version: String,
    pub examples: Vec<RspecExample>,
    pub summary: RspecSummary,
}

impl RspecReport {
    /// Ids of failed examples, e.g. `./spec/a_spec.rb[1:2]`.
    pub fn failed_examples(&self) -> Vec<String> {
        self.examples
            .iter()
            .filter(|example| example.status == "failed")
            .map(|example| example.id.clone())
            .collect()
    }
}

/// RSpec reports relative paths with a leading `./`, so plan paths must match.
fn dot_relative(file: String) -> String {
    if file.starts_with("./") || file.starts_with('/') {
        file
    } else {
        format!("./{file}")
    }
}

/// Adapter for RSpec.
#[derive(Debug, Clone)]
pub struct Rspec {
    test_command: String,
    retry_test_command: String,
    test_file_pattern: String,
    test_file_exclude_pattern: Option<String>,
    result_path: String,
}

impl Rspec {
    pub fn new(config: RunnerConfig) -> Self {
        let test_command = config
            .test_command
            .unwrap_or_else(|| DEFAULT_TEST_COMMAND.to_string());
        Self {
            retry_test_command: config
                .retry_test_command
                .unwrap_or_else(|| test_command.clone()),
            test_command,
            test_file_pattern: config
                .test_file_pattern
                .unwrap_or_else(|| DEFAULT_TEST_FILE_PATTERN.to_string()),
            test_file_exclude_pattern: config.test_file_exclude_pattern,
            result_path: config
                .result_path
                .unwrap_or_else(|| default_result_path("rspec")),
        }
    }

    pub fn parse_report(&self, path: &str) -> Result<RspecReport, RunnerError> {
        read_json_file(path)
    }
}

#[async_trait]
impl TestRunner for Rspec {
    fn name(&self) -> &'static str {
        "RSpec"
    }

    fn get_files(&self) -> Result<Vec<String>, RunnerError> {
        let files = discover_test_files(
            &self.test_file_pattern,
            self.test_file_exclude_pattern.as_deref(),
        )?;

        if files.is_empty() {
            return Err(RunnerError::NoFilesFound {
                pattern: self.test_file_pattern.clone(),
                exclude: self.test_file_exclude_pattern.clone().unwrap_or_default(),
            });
        }

        Ok(files.into_iter().map(dot_relative).collect())
    }

    async fn get_examples(&self, files: &[String]) -> Result<Vec<TestCase>, RunnerError> {
        // The dry run writes JSON to its own file; stdout may use any formatter.
        let report_file = tempfile::Builder::new()
            .prefix("dry-run-")
            .suffix(".json")
            .tempfile()?;
        let report_path = report_file.path().to_string_lossy().into_owned();

        let (program, mut args) = command_name_and_args(
            &self.test_command,
            files,
            &[(RESULT_PATH, self.result_path.as_str())],
        )?;
        args.extend(
            [
                "--dry-run",
                "--format",
                "json",
                "--out",
                report_path.as_str(),
                "--format",
                "progress",
            ]
            .map(String::from),
        );

        debug!("Running `{} {}` for dry run", program, args.join(" "));
        let output = Command::new(&program)
            .args(&args)
            .output()
            .await
            .map_err(|source| RunnerError::Spawn {
                command: program.clone(),
                source,
            })?;

        if !output.status.success() {
            let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
            combined.push_str(&String::from_utf8_lossy(&output.stderr));
            return Err(RunnerError::DryRun(combined));
        }

        let report = self.parse_report(&report_path)?;
        Ok(report
            .examples
            .into_iter()
            .map(|example| TestCase {
                path: example.id.clone(),
                format: Some(FORMAT_EXAMPLE.to_string()),
                identifier: Some(example.id),
                name: Some(example.description),
                scope: Some(example.full_description),
                estimated_duration: None,
            })
            .collect())
    }

    async fn run(&self, test_cases: &[String], retry: bool) -> Result<RunResult, RunnerError> {
        let template = if retry {
            &self.retry_test_command
        } else {
            &self.test_command
        };

        let (program, args) = command_name_and_args(
            template,
            test_cases,
            &[(RESULT_PATH, self.result_path.as_str())],
        )?;

        remove_stale_report(&self.result_path)?;
        println!("{} {}", program, args.join(" "));

        let mut command = Command::new(&program);
        command.args(&args);

        match run_and_forward_signal(command).await? {
            CommandExit::Success => Ok(RunResult::passed()),
            CommandExit::Failure { code } => {
                // An unreadable report means RSpec itself failed rather than
                // the tests, so there is nothing to retry.
                let report = self.parse_report(&self.result_path).map_err(|err| {
                    println!("Failed to read RSpec output, tests will not be retried.");
                    RunnerError::ReportParse {
                        code,
                        reason: err.to_string(),
                    }
                })?;

                let failed = report.failed_examples();
                if report.summary.failure_count == 0 || failed.is_empty() {
                    return Err(RunnerError::Exited { code });
                }
                Ok(RunResult::failed(failed))
            }
        }
    }
}
