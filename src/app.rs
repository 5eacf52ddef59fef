//! One node's run from file discovery to exit code.

use tracing::{debug, info};

use crate::api::{PlanService, TestPlanMetadataParams};
use crate::config::Config;
use crate::plan::fetch_or_create_test_plan;
use crate::retry::{run_with_retry, Timeline};
use crate::runner::{describe_signal, RunStatus, RunnerError, TestRunner};
use crate::VERSION;

/// Every test passed, or this node had nothing to run.
pub const EXIT_SUCCESS: i32 = 0;

/// Tests were still failing after the last retry.
pub const EXIT_TEST_FAILURES: i32 = 1;

/// Configuration or infrastructure failure.
pub const EXIT_INFRASTRUCTURE: i32 = 16;

/// Print a user-facing line with the tool's prefix.
pub fn report(message: impl AsRef<str>) {
    println!("Test Splitter: {}", message.as_ref());
}

/// Run this node's share of the suite and return the process exit code.
///
/// Metadata is posted on every path that got as far as running (or skipping)
/// tests. Failing to post it never changes the exit code.
pub async fn run(config: &Config, service: &dyn PlanService, runner: &dyn TestRunner) -> i32 {
    let files = match runner.get_files() {
        Ok(files) => files,
        Err(err) => {
            report(format!("Couldn't get files: {err}"));
            return EXIT_INFRASTRUCTURE;
        }
    };
    debug!(runner = runner.name(), files = files.len(), "Discovered test files");

    let plan = match fetch_or_create_test_plan(service, &config.plan_request(), &files, runner).await
    {
        Ok(plan) => plan,
        Err(err) => {
            report(format!("Couldn't fetch or create test plan: {err}"));
            return EXIT_INFRASTRUCTURE;
        }
    };

    let tests = plan.runnable_tests(config.node_index);
    if tests.is_empty() {
        report(format!("No tests assigned to node {}", config.node_index));
        send_metadata(config, service, Timeline::new()).await;
        return EXIT_SUCCESS;
    }
    info!(node = config.node_index, tests = tests.len(), "Running assigned tests");

    let outcome = run_with_retry(runner, tests, config.max_retries).await;
    debug!(attempts = outcome.attempts, status = ?outcome.status(), "Test run finished");
    send_metadata(config, service, outcome.timeline).await;

    match outcome.result {
        Err(RunnerError::Signaled { signal }) => {
            report(format!(
                "{} was terminated with signal: {}",
                runner.name(),
                describe_signal(signal)
            ));
            128 + signal
        }
        Err(err) => match err {
            RunnerError::ReportParse { code, .. } | RunnerError::Exited { code } => {
                report(format!("{} exited with error: {err}", runner.name()));
                code
            }
            _ => {
                report(format!("Couldn't run tests: {err}"));
                EXIT_INFRASTRUCTURE
            }
        },
        Ok(result) => match result.status {
            RunStatus::Passed => EXIT_SUCCESS,
            RunStatus::Failed => {
                match result.failed_tests.len() {
                    1 => report(format!("{} exited with 1 failure", runner.name())),
                    n => report(format!("{} exited with {n} failures", runner.name())),
                }
                EXIT_TEST_FAILURES
            }
            RunStatus::Error => EXIT_INFRASTRUCTURE,
        },
    }
}

async fn send_metadata(config: &Config, service: &dyn PlanService, timeline: Timeline) {
    let params = TestPlanMetadataParams {
        identifier: config.identifier.clone(),
        version: VERSION.to_string(),
        env: config.dump_env(),
        timeline: timeline.into_events(),
    };

    if let Err(err) = service
        .post_test_plan_metadata(&config.suite_slug, &params)
        .await
    {
        report(format!("Failed to send metadata: {err}"));
    }
}
