use async_trait::async_trait;
use serde::Deserialize;
use tokio::process::Command;

use super::command::{command_name_and_args, run_and_forward_signal, RESULT_PATH};
use super::discover::discover_test_files;
use super::{
    read_json_file, remove_stale_report, CommandExit, RunResult, RunnerConfig, RunnerError,
    TestRunner,
};
use crate::plan::TestCase;

const DEFAULT_TEST_COMMAND: &str = "npx playwright test --reporter=line,json {{testExamples}}";
const DEFAULT_TEST_FILE_PATTERN: &str = "**/{*.spec,*.test}.{ts,js}";
const DEFAULT_TEST_FILE_EXCLUDE_PATTERN: &str = "**/node_modules";
const DEFAULT_RESULT_PATH: &str = "test-results/results.json";

/// Environment variable the JSON reporter writes its output to.
const JSON_OUTPUT_ENV: &str = "PLAYWRIGHT_JSON_OUTPUT_NAME";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PlaywrightSpec {
    pub title: String,
    pub ok: bool,
    pub file: String,
    pub line: u32,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PlaywrightSuite {
    pub title: String,
    pub file: String,
    pub specs: Vec<PlaywrightSpec>,
    pub suites: Vec<PlaywrightSuite>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PlaywrightStats {
    pub expected: u32,
    pub unexpected: u32,
    pub flaky: u32,
    pub skipped: u32,
}

/// Playwright's JSON reporter output.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PlaywrightReport {
    pub suites: Vec<PlaywrightSuite>,
    pub stats: PlaywrightStats,
}

impl PlaywrightReport {
    /// `file:line` locations of failed specs, depth first.
    pub fn failed_tests(&self) -> Vec<String> {
        let mut failed = Vec::new();
        for suite in &self.suites {
            collect_failures(suite, &mut failed);
        }
        failed
    }
}

fn collect_failures(suite: &PlaywrightSuite, failed: &mut Vec<String>) {
    for spec in suite.specs.iter().filter(|spec| !spec.ok) {
        let location = format!("{}:{}", spec.file, spec.line);
        if !failed.contains(&location) {
            failed.push(location);
        }
    }
    for child in &suite.suites {
        collect_failures(child, failed);
    }
}

/// Adapter for Playwright.
#[derive(Debug, Clone)]
pub struct Playwright {
    test_command: String,
    retry_test_command: String,
    test_file_pattern: String,
    test_file_exclude_pattern: String,
    result_path: String,
}

impl Playwright {
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
            test_file_exclude_pattern: config
                .test_file_exclude_pattern
                .unwrap_or_else(|| DEFAULT_TEST_FILE_EXCLUDE_PATTERN.to_string()),
            result_path: config
                .result_path
                .unwrap_or_else(|| DEFAULT_RESULT_PATH.to_string()),
        }
    }

    pub fn parse_report(&self, path: &str) -> Result<PlaywrightReport, RunnerError> {
        read_json_file(path)
    }
}

#[async_trait]
impl TestRunner for Playwright {
    fn name(&self) -> &'static str {
        "Playwright"
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
        command.args(&args).env(JSON_OUTPUT_ENV, &self.result_path);

        match run_and_forward_signal(command).await? {
            CommandExit::Success => Ok(RunResult::passed()),
            CommandExit::Failure { code } => {
                let report = self.parse_report(&self.result_path).map_err(|err| {
                    println!("Failed to read Playwright output, tests will not be retried.");
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
