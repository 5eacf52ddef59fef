//! Argument and configuration handling.

use predicates::prelude::*;

use crate::splitter_cmd;

#[test]
fn test_version_flag() {
    splitter_cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_help_lists_options() {
    splitter_cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--split-by-example"))
        .stdout(predicate::str::contains("BUILDKITE_SPLITTER_RETRY_COUNT"));
}

#[test]
fn test_missing_configuration_exits_16() {
    splitter_cmd()
        .assert()
        .code(16)
        .stdout(predicate::str::contains("Invalid configuration"))
        .stdout(predicate::str::contains("AccessToken must not be blank"))
        .stdout(predicate::str::contains("SuiteSlug must not be blank"));
}

#[test]
fn test_node_index_out_of_range_exits_16() {
    splitter_cmd()
        .env("BUILDKITE_SPLITTER_API_ACCESS_TOKEN", "secret")
        .env("BUILDKITE_ORGANIZATION_SLUG", "my-org")
        .env("BUILDKITE_SPLITTER_SUITE_SLUG", "my-suite")
        .env("BUILDKITE_BUILD_ID", "123")
        .env("BUILDKITE_STEP_ID", "456")
        .env("BUILDKITE_PARALLEL_JOB_COUNT", "2")
        .env("BUILDKITE_PARALLEL_JOB", "2")
        .assert()
        .code(16)
        .stdout(predicate::str::contains("NodeIndex was 2, must not be greater than 1"));
}

#[test]
fn test_unknown_runner_exits_16() {
    splitter_cmd()
        .env("BUILDKITE_SPLITTER_TEST_RUNNER", "mocha")
        .assert()
        .code(16);
}

#[test]
fn test_secret_is_not_echoed_in_help() {
    splitter_cmd()
        .env("BUILDKITE_SPLITTER_API_ACCESS_TOKEN", "super-secret-token")
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("super-secret-token").not());
}
