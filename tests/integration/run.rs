//! End-to-end runs against a stub coordination service.

use std::collections::HashMap;
use std::fs;
use std::net::SocketAddr;
use std::sync::{mpsc, Arc, Mutex};

use assert_cmd::Command;
use axum::extract::Query;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use predicates::prelude::*;
use serde_json::{json, Value};
use tempfile::TempDir;

use crate::splitter_cmd;

pub(crate) const SUITE_PATH: &str = "/v2/analytics/organizations/my-org/suites/my-suite";

/// Serve `router` from a background runtime and return its base URL.
pub(crate) fn start_stub(router: Router) -> String {
    let (tx, rx) = mpsc::channel::<SocketAddr>();
    std::thread::spawn(move || {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        runtime.block_on(async move {
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            tx.send(listener.local_addr().unwrap()).unwrap();
            axum::serve(listener, router).await.unwrap();
        });
    });
    format!("http://{}", rx.recv().unwrap())
}

/// Stub that serves `plan` for any identifier and records metadata posts.
fn plan_stub(plan: Value, metadata: Arc<Mutex<Vec<Value>>>) -> String {
    let router = Router::new()
        .route(
            &format!("{SUITE_PATH}/test_plan"),
            get(move |Query(query): Query<HashMap<String, String>>| {
                let plan = plan.clone();
                async move {
                    match query.get("identifier").map(String::as_str) {
                        Some("123/456") => (StatusCode::OK, Json(plan)),
                        _ => (StatusCode::NOT_FOUND, Json(json!({"message": "not found"}))),
                    }
                }
            }),
        )
        .route(
            &format!("{SUITE_PATH}/test_plan_metadata"),
            post(move |Json(body): Json<Value>| {
                let metadata = Arc::clone(&metadata);
                async move {
                    metadata.lock().unwrap().push(body);
                    (StatusCode::OK, Json(json!({})))
                }
            }),
        );
    start_stub(router)
}

/// A project directory with two RSpec files.
pub(crate) fn project() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir_all(dir.path().join("spec/models")).unwrap();
    fs::write(dir.path().join("spec/models/user_spec.rb"), "").unwrap();
    fs::write(dir.path().join("spec/models/post_spec.rb"), "").unwrap();
    dir
}

/// Environment for node 0 of a single-node build against `base_url`.
pub(crate) fn node_env(dir: &TempDir, base_url: &str, test_cmd: &str) -> Vec<(String, String)> {
    [
        ("BUILDKITE_SPLITTER_BASE_URL", base_url.to_string()),
        ("BUILDKITE_SPLITTER_API_ACCESS_TOKEN", "secret".to_string()),
        ("BUILDKITE_ORGANIZATION_SLUG", "my-org".to_string()),
        ("BUILDKITE_SPLITTER_SUITE_SLUG", "my-suite".to_string()),
        ("BUILDKITE_BUILD_ID", "123".to_string()),
        ("BUILDKITE_STEP_ID", "456".to_string()),
        ("BUILDKITE_PARALLEL_JOB_COUNT", "1".to_string()),
        ("BUILDKITE_PARALLEL_JOB", "0".to_string()),
        ("BUILDKITE_SPLITTER_TEST_CMD", test_cmd.to_string()),
        (
            "BUILDKITE_SPLITTER_RESULT_PATH",
            dir.path().join("rspec.json").display().to_string(),
        ),
    ]
    .into_iter()
    .map(|(key, value)| (key.to_string(), value))
    .collect()
}

fn node_cmd(dir: &TempDir, base_url: &str, test_cmd: &str) -> Command {
    let mut cmd = splitter_cmd();
    cmd.current_dir(dir.path()).envs(node_env(dir, base_url, test_cmd));
    cmd
}

pub(crate) fn single_task_plan(path: &str) -> Value {
    json!({
        "tasks": {
            "0": {"node_number": 0, "tests": [{"path": path, "format": "file"}]}
        }
    })
}

#[test]
fn test_runs_remote_plan_and_posts_metadata() {
    let dir = project();
    let metadata = Arc::new(Mutex::new(Vec::new()));
    let base_url = plan_stub(single_task_plan("./spec/models/user_spec.rb"), Arc::clone(&metadata));

    node_cmd(&dir, &base_url, "true")
        .assert()
        .success()
        .stdout(predicate::str::contains("Running tests"))
        .stdout(predicate::str::contains("true ./spec/models/user_spec.rb"));

    let metadata = metadata.lock().unwrap();
    assert_eq!(metadata.len(), 1);
    assert_eq!(metadata[0]["identifier"], "123/456");
    assert_eq!(metadata[0]["timeline"][0]["event"], "test_start");
    assert_eq!(metadata[0]["timeline"][1]["event"], "test_end");
    assert!(metadata[0]["env"]
        .as_object()
        .unwrap()
        .values()
        .all(|v| v != "secret"));
}

#[test]
fn test_signal_killed_command_exits_128_plus_signal() {
    let dir = project();
    let metadata = Arc::new(Mutex::new(Vec::new()));
    let base_url = plan_stub(single_task_plan("./spec/models/user_spec.rb"), Arc::clone(&metadata));

    node_cmd(&dir, &base_url, "sh -c 'kill -9 $$'")
        .env("BUILDKITE_SPLITTER_RETRY_COUNT", "2")
        .assert()
        .code(137)
        .stdout(predicate::str::contains("SIGKILL (9)"))
        .stdout(predicate::str::contains("Attempt 1").not());

    assert_eq!(metadata.lock().unwrap().len(), 1);
}

#[test]
fn test_command_without_report_exits_with_its_status() {
    let dir = project();
    let metadata = Arc::new(Mutex::new(Vec::new()));
    let base_url = plan_stub(single_task_plan("./spec/models/user_spec.rb"), Arc::clone(&metadata));

    node_cmd(&dir, &base_url, "sh -c 'exit 3'")
        .env("BUILDKITE_SPLITTER_RETRY_COUNT", "2")
        .assert()
        .code(3)
        .stdout(predicate::str::contains("tests will not be retried"));
}

#[test]
fn test_unreachable_service_uses_fallback_plan() {
    let dir = project();

    // Nothing listens on port 1; requests fail until the deadline.
    node_cmd(&dir, "http://127.0.0.1:1", "true")
        .env("BUILDKITE_SPLITTER_API_TIMEOUT", "1")
        .assert()
        .success()
        .stdout(predicate::str::contains("using fallback mode"))
        .stdout(predicate::str::contains(
            "true ./spec/models/post_spec.rb ./spec/models/user_spec.rb",
        ));
}

#[test]
fn test_no_test_files_exits_16() {
    let dir = tempfile::tempdir().unwrap();
    let metadata = Arc::new(Mutex::new(Vec::new()));
    let base_url = plan_stub(single_task_plan("./spec/a_spec.rb"), Arc::clone(&metadata));

    node_cmd(&dir, &base_url, "true")
        .assert()
        .code(16)
        .stdout(predicate::str::contains("Couldn't get files"));
}
