//! External process execution with optional hard deadlines.
//!
//! Commands are described by a [`CommandSpec`] (program plus discrete
//! argument tokens) and executed by a [`CommandRunner`]. The system runner
//! captures stdout and stderr fully into memory and never wires up stdin.
//!
//! With a deadline, the child is started in its own process group and a
//! single background waiter posts its result to a one-slot channel. The
//! caller blocks on that channel until either the result arrives or the
//! deadline passes. On expiry the whole group is killed and the caller then
//! drains the channel so the waiter thread is never left behind.
//!
//! ```rust,no_run
//! use gitdeploy::process::{CommandSpec, run_with_deadline};
//! use std::time::Duration;
//!
//! let result = run_with_deadline(
//!     &CommandSpec::new("git").arg("--version"),
//!     Duration::from_secs(5),
//! );
//! println!("{}", result.stdout);
//! ```

use crate::error::{DeployError, ErrorKind, Result};
use nix::errno::Errno;
use nix::sys::signal::{Signal, killpg};
use nix::unistd::Pid;
use std::fmt;
use std::os::unix::process::CommandExt;
use std::process::{Command, Output, Stdio};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

/// An external command: program name plus ordered argument tokens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    program: String,
    args: Vec<String>,
}

impl CommandSpec {
    /// Creates a command with no arguments.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Appends one argument token.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Appends several argument tokens in order.
    pub fn args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn arguments(&self) -> &[String] {
        &self.args
    }

    fn to_command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        command
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// How a command finished.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Exited with status zero.
    Completed,
    /// Non-zero exit, death by signal, or the process never started.
    Failed(String),
    /// The deadline passed and the process group was killed.
    TimedOut(Duration),
    /// The deadline passed and the kill signal could not be delivered.
    TimedOutKillFailed { deadline: Duration, message: String },
}

/// Captured output and outcome of one command.
#[derive(Debug, Clone)]
pub struct ExecutionResult {
    /// The command as it was run, for diagnostics.
    pub command: String,
    pub stdout: String,
    pub stderr: String,
    pub outcome: Outcome,
}

impl ExecutionResult {
    /// Builds a result from already-known parts.
    pub fn new(
        command: impl Into<String>,
        stdout: impl Into<String>,
        stderr: impl Into<String>,
        outcome: Outcome,
    ) -> Self {
        Self {
            command: command.into(),
            stdout: stdout.into(),
            stderr: stderr.into(),
            outcome,
        }
    }

    fn from_output(spec: &CommandSpec, output: Output) -> Self {
        let outcome = if output.status.success() {
            Outcome::Completed
        } else {
            Outcome::Failed(output.status.to_string())
        };
        Self {
            command: spec.to_string(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            outcome,
        }
    }

    fn failed(spec: &CommandSpec, message: impl Into<String>) -> Self {
        Self::new(spec.to_string(), "", "", Outcome::Failed(message.into()))
    }

    /// True when the process exited cleanly.
    pub fn is_success(&self) -> bool {
        self.outcome == Outcome::Completed
    }

    /// stdout followed by stderr.
    pub fn combined_output(&self) -> String {
        let mut combined = String::with_capacity(self.stdout.len() + self.stderr.len());
        combined.push_str(&self.stdout);
        combined.push_str(&self.stderr);
        combined
    }

    /// The error this result represents, if any, tagged with `op`.
    pub fn error(&self, op: &'static str) -> Option<DeployError> {
        let kind = match &self.outcome {
            Outcome::Completed => return None,
            Outcome::Failed(message) => ErrorKind::ProcessFailure {
                command: self.command.clone(),
                message: message.clone(),
            },
            Outcome::TimedOut(deadline) => ErrorKind::Timeout {
                command: self.command.clone(),
                deadline: *deadline,
            },
            Outcome::TimedOutKillFailed { deadline, message } => ErrorKind::TimeoutKillFailed {
                command: self.command.clone(),
                deadline: *deadline,
                message: message.clone(),
            },
        };
        Some(DeployError::new(op, kind))
    }

    /// Converts a failed outcome into an error tagged with `op`.
    pub fn check(self, op: &'static str) -> Result<Self> {
        match self.error(op) {
            Some(err) => Err(err),
            None => Ok(self),
        }
    }
}

/// Something that can run commands.
///
/// The system implementation spawns real processes; tests substitute a
/// scripted runner to drive pipelines and probes deterministically.
pub trait CommandRunner {
    /// Runs `spec`, killing it if `deadline` elapses first.
    fn run(&self, spec: &CommandSpec, deadline: Option<Duration>) -> ExecutionResult;

    /// Blocks the caller between retry attempts.
    fn pause(&self, duration: Duration) {
        thread::sleep(duration);
    }
}

/// Runs commands as real child processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, spec: &CommandSpec, deadline: Option<Duration>) -> ExecutionResult {
        match deadline {
            Some(deadline) => run_with_deadline(spec, deadline),
            None => run(spec),
        }
    }
}

impl<R: CommandRunner + ?Sized> CommandRunner for &R {
    fn run(&self, spec: &CommandSpec, deadline: Option<Duration>) -> ExecutionResult {
        (**self).run(spec, deadline)
    }

    fn pause(&self, duration: Duration) {
        (**self).pause(duration)
    }
}

/// Runs a command to completion with no deadline.
pub fn run(spec: &CommandSpec) -> ExecutionResult {
    tracing::debug!(command = %spec, "running command");
    let start = Instant::now();

    let result = match spec.to_command().output() {
        Ok(output) => ExecutionResult::from_output(spec, output),
        Err(e) => ExecutionResult::failed(spec, format!("failed to start: {}", e)),
    };

    tracing::debug!(
        command = %spec,
        duration_ms = start.elapsed().as_millis() as u64,
        outcome = ?result.outcome,
        "command finished"
    );
    result
}

/// Runs a command, killing its process group if `deadline` elapses first.
pub fn run_with_deadline(spec: &CommandSpec, deadline: Duration) -> ExecutionResult {
    let span = tracing::info_span!(
        "process.run",
        command = %spec,
        deadline_ms = deadline.as_millis() as u64,
        duration_ms = tracing::field::Empty,
    );
    let _guard = span.enter();
    let start = Instant::now();

    let mut command = spec.to_command();
    // Own process group so a kill reaches anything the command spawned.
    command.process_group(0);

    let child = match command.spawn() {
        Ok(child) => child,
        Err(e) => return ExecutionResult::failed(spec, format!("failed to start: {}", e)),
    };
    let pid = Pid::from_raw(child.id() as i32);

    let (done_tx, done_rx) = mpsc::sync_channel(1);
    let waiter = thread::spawn(move || {
        let _ = done_tx.send(child.wait_with_output());
    });

    let result = match done_rx.recv_timeout(deadline) {
        Ok(output) => {
            let _ = waiter.join();
            finished(spec, output)
        }
        Err(RecvTimeoutError::Timeout) => match killpg(pid, Signal::SIGKILL) {
            Ok(()) => {
                tracing::warn!(command = %spec, "deadline exceeded, process group killed");
                let drained = done_rx.recv();
                let _ = waiter.join();
                let mut result = match drained {
                    Ok(Ok(output)) => ExecutionResult::from_output(spec, output),
                    _ => ExecutionResult::failed(spec, "killed"),
                };
                result.outcome = Outcome::TimedOut(deadline);
                result
            }
            // Already exited and reaped between the timer firing and the kill.
            Err(Errno::ESRCH) => {
                let drained = done_rx.recv();
                let _ = waiter.join();
                match drained {
                    Ok(output) => finished(spec, output),
                    Err(_) => ExecutionResult::failed(spec, "waiter exited without a result"),
                }
            }
            Err(errno) => {
                tracing::warn!(command = %spec, error = %errno, "deadline exceeded, kill failed");
                // The waiter cannot finish while the process lives; leave it.
                ExecutionResult::new(
                    spec.to_string(),
                    "",
                    "",
                    Outcome::TimedOutKillFailed {
                        deadline,
                        message: errno.to_string(),
                    },
                )
            }
        },
        Err(RecvTimeoutError::Disconnected) => {
            let _ = waiter.join();
            ExecutionResult::failed(spec, "waiter exited without a result")
        }
    };

    span.record("duration_ms", start.elapsed().as_millis() as u64);
    tracing::debug!(outcome = ?result.outcome, "command finished");
    result
}

fn finished(spec: &CommandSpec, output: std::io::Result<Output>) -> ExecutionResult {
    match output {
        Ok(output) => ExecutionResult::from_output(spec, output),
        Err(e) => ExecutionResult::failed(spec, format!("failed to wait: {}", e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sh(script: &str) -> CommandSpec {
        CommandSpec::new("/bin/sh").arg("-c").arg(script)
    }

    #[test]
    fn test_command_spec_keeps_tokens_intact() {
        let spec = CommandSpec::new("git")
            .arg("commit")
            .args(["-am", "fix the thing"]);

        assert_eq!(spec.program(), "git");
        assert_eq!(spec.arguments(), &["commit", "-am", "fix the thing"]);
        assert_eq!(spec.to_string(), "git commit -am fix the thing");
    }

    #[test]
    fn test_run_captures_both_streams() {
        let result = run(&sh("echo out; echo err >&2"));

        assert!(result.is_success());
        assert_eq!(result.stdout, "out\n");
        assert_eq!(result.stderr, "err\n");
        assert_eq!(result.combined_output(), "out\nerr\n");
    }

    #[test]
    fn test_run_reports_nonzero_exit() {
        let result = run(&sh("echo partial; exit 3"));

        assert!(matches!(result.outcome, Outcome::Failed(_)));
        assert_eq!(result.stdout, "partial\n");
        let err = result.error("test").unwrap();
        assert!(matches!(err.kind(), ErrorKind::ProcessFailure { .. }));
    }

    #[test]
    fn test_run_reports_spawn_failure() {
        let result = run(&CommandSpec::new("/no/such/binary-gitdeploy"));

        assert!(matches!(result.outcome, Outcome::Failed(ref m) if m.contains("failed to start")));
    }

    #[test]
    fn test_deadline_not_reached() {
        let result = run_with_deadline(&sh("echo quick"), Duration::from_secs(10));

        assert_eq!(result.outcome, Outcome::Completed);
        assert_eq!(result.stdout, "quick\n");
    }

    #[test]
    fn test_deadline_kills_process() {
        let start = Instant::now();
        let result = run_with_deadline(&sh("sleep 30"), Duration::from_millis(200));

        assert_eq!(result.outcome, Outcome::TimedOut(Duration::from_millis(200)));
        assert!(start.elapsed() < Duration::from_secs(10));
        assert!(result.check("test").unwrap_err().is_timeout());
    }

    #[test]
    fn test_deadline_kills_grandchildren() {
        // The backgrounded sleep holds the pipes open; only a group kill ends it.
        let start = Instant::now();
        let result = run_with_deadline(&sh("sleep 30 & wait"), Duration::from_millis(200));

        assert!(matches!(result.outcome, Outcome::TimedOut(_)));
        assert!(start.elapsed() < Duration::from_secs(10));
    }

    #[test]
    fn test_deadline_failure_status_preserved() {
        let result = run_with_deadline(&sh("echo nope >&2; exit 1"), Duration::from_secs(10));

        assert!(matches!(result.outcome, Outcome::Failed(_)));
        assert_eq!(result.stderr, "nope\n");
    }

    #[test]
    fn test_kill_failure_maps_to_timeout_kind() {
        let result = ExecutionResult::new(
            "sleep 30",
            "",
            "",
            Outcome::TimedOutKillFailed {
                deadline: Duration::from_secs(2),
                message: "EPERM: Operation not permitted".into(),
            },
        );

        assert!(!result.is_success());
        let err = result.error("process.run").unwrap();
        assert!(err.is_timeout());
        match err.kind() {
            ErrorKind::TimeoutKillFailed {
                command,
                deadline,
                message,
            } => {
                assert_eq!(command, "sleep 30");
                assert_eq!(*deadline, Duration::from_secs(2));
                assert!(message.contains("EPERM"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_system_runner_dispatches_on_deadline() {
        let runner = SystemRunner;
        assert!(runner.run(&sh("true"), None).is_success());
        assert!(runner.run(&sh("true"), Some(Duration::from_secs(5))).is_success());
    }
}
