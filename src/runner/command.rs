//! Building and running test commands.

use std::os::unix::process::ExitStatusExt;
use std::sync::atomic::{AtomicU32, Ordering};

use tokio::process::Command;
use tokio::signal::unix::{signal, SignalKind};
use tracing::debug;

use super::RunnerError;

/// Replaced by the tests to run. Tests are appended when absent.
pub const TEST_EXAMPLES: &str = "{{testExamples}}";

/// Replaced by the adapter's report path.
pub const RESULT_PATH: &str = "{{resultPath}}";

/// Replaced by a regular expression matching failing test names (Jest retries).
pub const TEST_NAME_PATTERN: &str = "{{testNamePattern}}";

/// Pid of the running test command, 0 when none is running.
static CURRENT_CHILD: AtomicU32 = AtomicU32::new(0);

/// How a test command finished when it was not killed by a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandExit {
    Success,
    Failure { code: i32 },
}

/// Split a command template into a program and its arguments.
///
/// `substitutions` are applied inside every word, then the
/// [`TEST_EXAMPLES`] word is replaced by `test_cases` (or `test_cases` are
/// appended when the template has no such word).
pub fn command_name_and_args(
    template: &str,
    test_cases: &[String],
    substitutions: &[(&str, &str)],
) -> Result<(String, Vec<String>), RunnerError> {
    let mut words = shell_words::split(template).map_err(|err| RunnerError::InvalidCommand {
        command: template.to_string(),
        reason: err.to_string(),
    })?;

    for word in words.iter_mut() {
        for (placeholder, value) in substitutions {
            if word.contains(placeholder) {
                *word = word.replace(placeholder, value);
            }
        }
    }

    match words.iter().position(|word| word == TEST_EXAMPLES) {
        Some(idx) => {
            words.splice(idx..=idx, test_cases.iter().cloned());
        }
        None => words.extend(test_cases.iter().cloned()),
    }

    let mut words = words.into_iter();
    let program = words.next().ok_or_else(|| RunnerError::InvalidCommand {
        command: template.to_string(),
        reason: "command is empty".to_string(),
    })?;

    Ok((program, words.collect()))
}

/// Install the process-wide handler for SIGINT, SIGTERM, SIGHUP and SIGQUIT.
///
/// While a test command runs, these signals are forwarded to it and its exit
/// decides the outcome. At any other time the process exits with
/// `128 + signal`. Must be called from within a tokio runtime.
pub fn install_signal_handler() -> std::io::Result<()> {
    let mut interrupt = signal(SignalKind::interrupt())?;
    let mut terminate = signal(SignalKind::terminate())?;
    let mut hangup = signal(SignalKind::hangup())?;
    let mut quit = signal(SignalKind::quit())?;

    tokio::spawn(async move {
        loop {
            let received = tokio::select! {
                Some(()) = interrupt.recv() => libc::SIGINT,
                Some(()) = terminate.recv() => libc::SIGTERM,
                Some(()) = hangup.recv() => libc::SIGHUP,
                Some(()) = quit.recv() => libc::SIGQUIT,
                else => break,
            };
            handle_signal(received);
        }
    });

    Ok(())
}

fn handle_signal(signal: i32) {
    match CURRENT_CHILD.load(Ordering::SeqCst) {
        0 => {
            println!(
                "Test Splitter: Received {}, exiting",
                describe_signal(signal)
            );
            std::process::exit(128 + signal);
        }
        pid => forward_signal(pid, signal),
    }
}

/// Clears the registered child pid when the wait ends or is cancelled.
struct RunningChild;

impl RunningChild {
    fn register(pid: Option<u32>) -> Self {
        if let Some(pid) = pid {
            CURRENT_CHILD.store(pid, Ordering::SeqCst);
        }
        RunningChild
    }
}

impl Drop for RunningChild {
    fn drop(&mut self) {
        CURRENT_CHILD.store(0, Ordering::SeqCst);
    }
}

/// Run `command` to completion. Once [`install_signal_handler`] is active,
/// termination signals received meanwhile are forwarded to the child.
///
/// A child killed by a signal is reported as [`RunnerError::Signaled`] so it
/// can never be mistaken for failing tests.
pub async fn run_and_forward_signal(mut command: Command) -> Result<CommandExit, RunnerError> {
    let program = command.as_std().get_program().to_string_lossy().into_owned();
    let mut child = command.spawn().map_err(|source| RunnerError::Spawn {
        command: program.clone(),
        source,
    })?;

    let status = {
        let _running = RunningChild::register(child.id());
        child.wait().await?
    };

    debug!(%program, ?status, "Test command finished");

    if status.success() {
        return Ok(CommandExit::Success);
    }

    if let Some(signal) = status.signal() {
        return Err(RunnerError::Signaled { signal });
    }

    Ok(CommandExit::Failure {
        code: status.code().unwrap_or(1),
    })
}

fn forward_signal(pid: u32, signal: i32) {
    debug!(pid, signal = %describe_signal(signal), "Forwarding signal to test command");
    // SAFETY: kill(2) has no memory-safety preconditions; a stale pid only
    // yields ESRCH.
    unsafe {
        libc::kill(pid as libc::pid_t, signal);
    }
}

/// `SIGKILL (9)` style description of a signal number.
pub fn describe_signal(signal: i32) -> String {
    let name = match signal {
        libc::SIGHUP => "SIGHUP",
        libc::SIGINT => "SIGINT",
        libc::SIGQUIT => "SIGQUIT",
        libc::SIGILL => "SIGILL",
        libc::SIGABRT => "SIGABRT",
        libc::SIGBUS => "SIGBUS",
        libc::SIGFPE => "SIGFPE",
        libc::SIGKILL => "SIGKILL",
        libc::SIGSEGV => "SIGSEGV",
        libc::SIGPIPE => "SIGPIPE",
        libc::SIGALRM => "SIGALRM",
        libc::SIGTERM => "SIGTERM",
        libc::SIGUSR1 => "SIGUSR1",
        libc::SIGUSR2 => "SIGUSR2",
        _ => "signal",
    };
    format!("{name} ({signal})")
}
