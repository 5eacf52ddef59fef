//! Integration tests for the `test-splitter` binary.

mod cli;
mod run;
mod signals;

use assert_cmd::Command;

/// Get a Command for the test-splitter binary with a clean environment.
#[allow(deprecated)]
pub fn splitter_cmd() -> Command {
    let mut cmd = Command::cargo_bin("test-splitter").expect("Failed to find test-splitter binary");
    cmd.env_clear()
        .env("PATH", std::env::var("PATH").unwrap_or_default())
        .timeout(std::time::Duration::from_secs(30));
    cmd
}
