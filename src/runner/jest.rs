use std::sync::Mutex;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::process::Command;

use super::command::{
    command_name_and_args, run_and_forward_signal, RESULT_PATH, TEST_NAME_PATTERN,
};
use super::discover::discover_test_files;
use super::{
    default_result_path, read_json_file, remove_stale_report, CommandExit, RunResult,
    RunnerConfig, RunnerError, TestRunner,
};
use crate::plan::TestCase;

const DEFAULT_TEST_COMMAND: &str =
    "npx jest --ci --json --testLocationInResults --outputFile {{resultPath}}";
const DEFAULT_RETRY_TEST_COMMAND: &str = "npx jest --ci --json --testLocationInResults --outputFile {{resultPath}} --testNamePattern {{testNamePattern}}";
const DEFAULT_TEST_FILE_PATTERN: &str = "**/{__tests__/**/*,*.spec,*.test}.{ts,js,tsx,jsx}";
const DEFAULT_TEST_FILE_EXCLUDE_PATTERN: &str = "**/node_modules";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct JestAssertion {
    pub full_name: String,
    pub status: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct JestTestResult {
    pub name: String,
    pub status: String,
    pub assertion_results: Vec<JestAssertion>,
}

/// Jest's `--json` output.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct JestReport {
    pub num_failed_tests: u32,
    pub num_runtime_error_test_suites: u32,
    pub test_results: Vec<JestTestResult>,
}

impl JestReport {
    /// Full names of failed assertions, deduplicated in report order.
    pub fn failed_tests(&self) -> Vec<String> {
        let mut failed: Vec<String> = Vec::new();
        for assertion in self
            .test_results
            .iter()
            .flat_map(|result| result.assertion_results.iter())
            .filter(|assertion| assertion.status == "failed")
        {
            if !failed.contains(&assertion.full_name) {
                failed.push(assertion.full_name.clone());
            }
        }
        failed
    }
}

/// Adapter for Jest.
///
/// Jest retries select failing tests by name rather than by file. The retry
/// command receives `{{testNamePattern}}` plus the files of the last full
/// run, so a retry never reaches tests outside this node's task.
#[derive(Debug)]
pub struct Jest {
    test_command: String,
    retry_test_command: String,
    test_file_pattern: String,
    test_file_exclude_pattern: String,
    result_path: String,
    node_files: Mutex<Vec<String>>,
}

impl Jest {
    pub fn new(config: RunnerConfig) -> Self {
        Self {
            test_command: config
                .test_command
                .unwrap_or_else(|| DEFAULT_TEST_COMMAND.to_string()),
            retry_test_command: config
                .retry_test_command
                .unwrap_or_else(|| DEFAULT_RETRY_TEST_COMMAND.to_string()),
            test_file_pattern: config
                .test_file_pattern
                .unwrap_or_else(|| DEFAULT_TEST_FILE_PATTERN.to_string()),
            test_file_exclude_pattern: config
                .test_file_exclude_pattern
                .unwrap_or_else(|| DEFAULT_TEST_FILE_EXCLUDE_PATTERN.to_string()),
            result_path: config
                .result_path
                .unwrap_or_else(|| default_result_path("jest")),
            node_files: Mutex::new(Vec::new()),
        }
    }

    pub fn parse_report(&self, path: &str) -> Result<JestReport, RunnerError> {
        read_json_file(path)
    }

    /// On a retry `test_cases` are failing test names; otherwise they are
    /// the files to run, remembered for later retries.
    fn command_for(&self, test_cases: &[String], retry: bool) -> Result<(String, Vec<String>), RunnerError> {
        if !retry {
            if let Ok(mut files) = self.node_files.lock() {
                *files = test_cases.to_vec();
            }
            return command_name_and_args(
                &self.test_command,
                test_cases,
                &[(RESULT_PATH, self.result_path.as_str())],
            );
        }

        let files = match self.node_files.lock() {
            Ok(files) => files.clone(),
            Err(_) => Vec::new(),
        };
        let pattern = name_pattern(test_cases);
        command_name_and_args(
            &self.retry_test_command,
            &files,
            &[
                (RESULT_PATH, self.result_path.as_str()),
                (TEST_NAME_PATTERN, pattern.as_str()),
            ],
        )
    }
}

/// Anchored alternation matching exactly the given test names.
fn name_pattern(names: &[String]) -> String {
    let escaped: Vec<String> = names.iter().map(|name| regex::escape(name)).collect();
    format!("^({})$", escaped.join("|"))
}

#[async_trait]
impl TestRunner for Jest {
    fn name(&self) -> &'static str {
        "Jest"
    }

    fn get_files(&self) -> Result<Vec<String>, RunnerError> {
        let files =
            discover_test_files(&self.test_file_pattern, Some(&self.test_file_exclude_pattern))?;
        if files.is_empty() {
            return Err(RunnerError::NoFilesFound {
                pattern: self.test_file_pattern.clone(),
                exclude: self.test_file_exclude_pattern.clone(),
            });
        }
        Ok(files)
    }

    async fn get_examples(&self, _files: &[String]) -> Result<Vec<TestCase>, RunnerError> {
        Ok(Vec::new())
    }

    async fn run(&self, test_cases: &[String], retry: bool) -> Result<RunResult, RunnerError> {
        let (program, args) = self.command_for(test_cases, retry)?;

        remove_stale_report(&self.result_path)?;
        println!("{} {}", program, args.join(" "));

        let mut command = Command::new(&program);
        command.args(&args);

        match run_and_forward_signal(command).await? {
            CommandExit::Success => Ok(RunResult::passed()),
            CommandExit::Failure { code } => {
                let report = self.parse_report(&self.result_path).map_err(|err| {
                    println!("Failed to read Jest output, tests will not be retried.");
                    RunnerError::ReportParse {
                        code,
                        reason: err.to_string(),
                    }
                })?;

                let failed = report.failed_tests();
                if failed.is_empty() {
                    return Err(RunnerError::Exited { code });
                }
                Ok(RunResult::failed(failed))
            }
        }
    }
}
