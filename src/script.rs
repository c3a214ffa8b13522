//! Ad-hoc shell scripts run through a temporary file.

use crate::error::{Result, ResultExt};
use crate::process::{CommandRunner, CommandSpec, ExecutionResult, SystemRunner};
use std::io::Write;
use std::time::Duration;

/// Deadline used when none (or zero) is given.
pub const DEFAULT_SCRIPT_TIMEOUT: Duration = Duration::from_secs(60);

/// Interpreter used by [`run_script`].
pub const DEFAULT_SHELL: &str = "/bin/bash";

/// Runs scripts with an interpreter, bounded by a deadline.
pub struct ScriptRunner<R> {
    runner: R,
    shell: String,
}

impl<R: CommandRunner> ScriptRunner<R> {
    pub fn new(runner: R, shell: impl Into<String>) -> Self {
        Self {
            runner,
            shell: shell.into(),
        }
    }

    /// Writes `script` to a temp file and executes it.
    ///
    /// The file starts with a shebang for the configured shell and `set -e`,
    /// so the first failing command ends the script. It is removed when this
    /// call returns, whatever the outcome.
    pub fn run(&self, script: &str, timeout: Option<Duration>) -> Result<ExecutionResult> {
        const OP: &str = "script.run";

        let timeout = match timeout {
            Some(t) if !t.is_zero() => t,
            _ => DEFAULT_SCRIPT_TIMEOUT,
        };

        let mut file = tempfile::Builder::new()
            .prefix("gitdeploy-script")
            .suffix(".sh")
            .tempfile()
            .at(OP)?;
        write!(file, "#!{}\nset -e\n{}", self.shell, script).at(OP)?;
        file.flush().at(OP)?;

        let spec = CommandSpec::new(&self.shell).arg(file.path().to_string_lossy());
        tracing::debug!(path = %file.path().display(), timeout_secs = timeout.as_secs(), "running script");
        Ok(self.runner.run(&spec, Some(timeout)))
    }
}

/// Runs `script` under [`DEFAULT_SHELL`] as a real process.
pub fn run_script(script: &str, timeout: Option<Duration>) -> Result<ExecutionResult> {
    ScriptRunner::new(SystemRunner, DEFAULT_SHELL).run(script, timeout)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::Outcome;
    use std::cell::RefCell;

    struct Capture {
        seen: RefCell<Vec<(CommandSpec, Option<Duration>, String)>>,
    }

    impl CommandRunner for Capture {
        fn run(&self, spec: &CommandSpec, deadline: Option<Duration>) -> ExecutionResult {
            let body = std::fs::read_to_string(&spec.arguments()[0]).unwrap();
            self.seen.borrow_mut().push((spec.clone(), deadline, body));
            ExecutionResult::new(spec.to_string(), "", "", Outcome::Completed)
        }
    }

    #[test]
    fn test_default_timeout_applies_for_none_and_zero() {
        let capture = Capture { seen: RefCell::new(Vec::new()) };
        let runner = ScriptRunner::new(&capture, "/bin/bash");

        runner.run("true", None).unwrap();
        runner.run("true", Some(Duration::ZERO)).unwrap();
        runner.run("true", Some(Duration::from_secs(5))).unwrap();

        let seen = capture.seen.borrow();
        assert_eq!(seen[0].1, Some(DEFAULT_SCRIPT_TIMEOUT));
        assert_eq!(seen[1].1, Some(DEFAULT_SCRIPT_TIMEOUT));
        assert_eq!(seen[2].1, Some(Duration::from_secs(5)));
    }

    #[test]
    fn test_script_file_has_prelude_and_is_removed() {
        let capture = Capture { seen: RefCell::new(Vec::new()) };
        let runner = ScriptRunner::new(&capture, "/bin/bash");

        runner.run("echo hi", None).unwrap();

        let seen = capture.seen.borrow();
        let (spec, _, body) = &seen[0];
        assert_eq!(spec.program(), "/bin/bash");
        assert_eq!(body, "#!/bin/bash\nset -e\necho hi");
        assert!(!std::path::Path::new(&spec.arguments()[0]).exists());
    }

    #[test]
    fn test_set_e_stops_at_first_failure() {
        let runner = ScriptRunner::new(SystemRunner, "/bin/sh");

        let result = runner.run("echo before\nfalse\necho after", None).unwrap();

        assert!(matches!(result.outcome, Outcome::Failed(_)));
        assert_eq!(result.stdout, "before\n");
    }

    #[test]
    fn test_script_timeout_kills() {
        let runner = ScriptRunner::new(SystemRunner, "/bin/sh");

        let result = runner
            .run("sleep 30", Some(Duration::from_millis(200)))
            .unwrap();

        assert!(matches!(result.outcome, Outcome::TimedOut(_)));
    }

    #[test]
    fn test_run_script_with_default_shell() {
        if !std::path::Path::new(DEFAULT_SHELL).exists() {
            return;
        }
        let result = run_script("printf ok", None).unwrap();

        assert!(result.is_success());
        assert_eq!(result.stdout, "ok");
    }
}
