//! Runs a node's tests and re-runs only the failures, up to a bound.
//!
//! Each attempt is bracketed by a pair of [`Timeline`] events. The loop stops
//! on the first of: a signal-terminated or otherwise broken test command,
//! the retry bound, or a passing run.

use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use tracing::debug;

use crate::runner::{RunResult, RunStatus, RunnerError, TestRunner};

/// A single attempt boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimelineEvent {
    /// `test_start`, `test_end`, `retry_<n>_start` or `retry_<n>_end`.
    pub event: String,
    /// RFC 3339 UTC timestamp with nanoseconds.
    pub timestamp: String,
}

/// Append-only record of attempt boundaries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Timeline {
    events: Vec<TimelineEvent>,
}

impl Timeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `event` at the current time.
    pub fn record(&mut self, event: impl Into<String>) {
        self.events.push(TimelineEvent {
            event: event.into(),
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Nanos, true),
        });
    }

    pub fn events(&self) -> &[TimelineEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn into_events(self) -> Vec<TimelineEvent> {
        self.events
    }
}

fn start_event(attempt: usize) -> String {
    if attempt == 0 {
        "test_start".to_string()
    } else {
        format!("retry_{attempt}_start")
    }
}

fn end_event(attempt: usize) -> String {
    if attempt == 0 {
        "test_end".to_string()
    } else {
        format!("retry_{attempt}_end")
    }
}

/// Loop state of [`run_with_retry`].
#[derive(Debug)]
struct RetryState {
    attempt: usize,
    units: Vec<String>,
    timeline: Timeline,
}

/// What [`run_with_retry`] ended with.
#[derive(Debug)]
pub struct RetryOutcome {
    /// Result of the last attempt.
    pub result: Result<RunResult, RunnerError>,
    pub timeline: Timeline,
    /// Number of attempts made, including the first run.
    pub attempts: usize,
}

impl RetryOutcome {
    /// Status of the last attempt, with runner errors reported as `Error`.
    pub fn status(&self) -> RunStatus {
        match &self.result {
            Ok(result) => result.status,
            Err(_) => RunStatus::Error,
        }
    }
}

/// Run `units` through `runner`, retrying failed tests up to `max_retries`
/// times. Every retry runs exactly the tests that failed in the previous
/// attempt.
pub async fn run_with_retry(
    runner: &dyn TestRunner,
    units: Vec<String>,
    max_retries: usize,
) -> RetryOutcome {
    let mut state = RetryState {
        attempt: 0,
        units,
        timeline: Timeline::new(),
    };

    loop {
        if state.attempt == 0 {
            println!("+++ Test Splitter: Running tests");
        } else {
            println!(
                "+++ Test Splitter: Attempt {} of {} to retry failing tests",
                state.attempt, max_retries
            );
        }

        state.timeline.record(start_event(state.attempt));
        let result = runner.run(&state.units, state.attempt > 0).await;
        state.timeline.record(end_event(state.attempt));

        let failed_tests = match &result {
            Err(RunnerError::Signaled { signal }) => {
                debug!(signal, "Test command terminated by signal, not retrying");
                None
            }
            Err(err) => {
                debug!(error = %err, "Test command error, not retrying");
                None
            }
            Ok(_) if state.attempt >= max_retries => None,
            Ok(run) if run.status != RunStatus::Failed => None,
            Ok(run) => Some(run.failed_tests.clone()),
        };

        let Some(failed_tests) = failed_tests else {
            return RetryOutcome {
                result,
                timeline: state.timeline,
                attempts: state.attempt + 1,
            };
        };

        debug!(
            attempt = state.attempt,
            failed = failed_tests.len(),
            "Retrying failed tests"
        );
        state.units = failed_tests;
        state.attempt += 1;
    }
}
