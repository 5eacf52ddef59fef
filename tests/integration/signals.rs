//! Termination signals sent to the binary while a node runs.

use std::io::Read;
use std::path::Path;
use std::process::{Child, ExitStatus, Stdio};
use std::sync::{mpsc, Arc, Mutex};
use std::time::{Duration, Instant};

use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::Value;
use tempfile::TempDir;

use crate::run::{node_env, project, single_task_plan, start_stub, SUITE_PATH};

/// Stub whose metadata endpoint either answers or never responds.
fn stub(metadata_hangs: bool, posted: mpsc::Sender<()>) -> String {
    let plan = single_task_plan("./spec/models/user_spec.rb");
    let posted = Arc::new(Mutex::new(posted));
    let router = Router::new()
        .route(
            &format!("{SUITE_PATH}/test_plan"),
            get(move || {
                let plan = plan.clone();
                async move { Json(plan) }
            }),
        )
        .route(
            &format!("{SUITE_PATH}/test_plan_metadata"),
            post(move |Json(_): Json<Value>| {
                let posted = Arc::clone(&posted);
                async move {
                    let _ = posted.lock().unwrap().send(());
                    if metadata_hangs {
                        std::future::pending::<()>().await;
                    }
                    StatusCode::OK
                }
            }),
        );
    start_stub(router)
}

fn spawn_node(dir: &TempDir, base_url: &str, test_cmd: &str) -> Child {
    std::process::Command::new(env!("CARGO_BIN_EXE_test-splitter"))
        .env_clear()
        .env("PATH", std::env::var("PATH").unwrap_or_default())
        .envs(node_env(dir, base_url, test_cmd))
        .current_dir(dir.path())
        .stdout(Stdio::piped())
        .spawn()
        .unwrap()
}

fn send_signal(child: &Child, signal: i32) {
    unsafe {
        libc::kill(child.id() as libc::pid_t, signal);
    }
}

fn wait_for(child: &mut Child, timeout: Duration) -> ExitStatus {
    let start = Instant::now();
    loop {
        if let Some(status) = child.try_wait().unwrap() {
            return status;
        }
        if start.elapsed() > timeout {
            let _ = child.kill();
            panic!("test-splitter did not exit within {timeout:?}");
        }
        std::thread::sleep(Duration::from_millis(50));
    }
}

fn wait_for_file(path: &Path, timeout: Duration) {
    let start = Instant::now();
    while !path.exists() {
        assert!(start.elapsed() < timeout, "{} never appeared", path.display());
        std::thread::sleep(Duration::from_millis(20));
    }
}

fn stdout_of(child: &mut Child) -> String {
    let mut out = String::new();
    if let Some(mut stdout) = child.stdout.take() {
        stdout.read_to_string(&mut out).unwrap();
    }
    out
}

#[test]
fn test_sigterm_after_command_finished_exits() {
    let dir = project();
    let (tx, rx) = mpsc::channel();
    let base_url = stub(true, tx);

    let mut child = spawn_node(&dir, &base_url, "true");

    // The metadata post starts only after the test command has exited.
    rx.recv_timeout(Duration::from_secs(10)).unwrap();
    send_signal(&child, libc::SIGTERM);

    let status = wait_for(&mut child, Duration::from_secs(10));
    assert_eq!(status.code(), Some(143));
    assert!(stdout_of(&mut child).contains("Received SIGTERM (15), exiting"));
}

#[test]
fn test_sigterm_is_forwarded_to_running_command() {
    let dir = project();
    let (tx, rx) = mpsc::channel();
    let base_url = stub(false, tx);

    let mut child = spawn_node(&dir, &base_url, "sh -c 'touch started; exec sleep 30'");

    wait_for_file(&dir.path().join("started"), Duration::from_secs(10));
    send_signal(&child, libc::SIGTERM);

    let status = wait_for(&mut child, Duration::from_secs(10));
    assert_eq!(status.code(), Some(143));
    assert!(stdout_of(&mut child).contains("terminated with signal: SIGTERM (15)"));
    rx.recv_timeout(Duration::from_secs(1)).unwrap();
}
