//! Ordered, fail-fast command pipelines.
//!
//! A [`Pipeline`] runs its steps strictly in sequence through a
//! [`CommandRunner`]. Each executed step's stdout and stderr are appended to
//! the pipeline output. The first failing step stops the pipeline; later
//! steps never run and contribute nothing. Nothing is rolled back.

use crate::error::{DeployError, ErrorKind, Result};
use crate::process::{CommandRunner, CommandSpec};
use std::time::Duration;

/// One command in a pipeline, plus its failure policy.
#[derive(Debug, Clone)]
pub struct PipelineStep {
    /// Short name used in logs and errors, e.g. `"checkout"`.
    pub name: &'static str,
    pub command: CommandSpec,
    /// Treat any stderr output as failure even when the exit status is clean.
    pub stderr_is_failure: bool,
}

impl PipelineStep {
    /// A step that only fails on a process-level error.
    pub fn new(name: &'static str, command: CommandSpec) -> Self {
        Self {
            name,
            command,
            stderr_is_failure: false,
        }
    }

    /// A step that also fails when stderr is non-empty.
    pub fn strict(name: &'static str, command: CommandSpec) -> Self {
        Self {
            stderr_is_failure: true,
            ..Self::new(name, command)
        }
    }
}

/// The step that stopped a pipeline.
#[derive(Debug)]
pub struct StepFailure {
    /// Zero-based index of the failing step.
    pub index: usize,
    pub name: &'static str,
    pub error: DeployError,
}

/// Output of a pipeline run.
#[derive(Debug)]
pub struct PipelineOutcome {
    /// Concatenated stdout+stderr of every executed step, in order.
    pub output: String,
    /// Number of steps that ran, including a failing one.
    pub executed: usize,
    /// Total steps in the pipeline.
    pub total: usize,
    pub failure: Option<StepFailure>,
}

impl PipelineOutcome {
    pub fn is_success(&self) -> bool {
        self.failure.is_none()
    }

    /// The output on success, the failing step's error otherwise.
    pub fn into_result(self) -> Result<String> {
        match self.failure {
            None => Ok(self.output),
            Some(failure) => Err(failure.error),
        }
    }
}

/// An ordered list of steps run under one operation tag.
#[derive(Debug, Clone)]
pub struct Pipeline {
    op: &'static str,
    steps: Vec<PipelineStep>,
    deadline: Option<Duration>,
}

impl Pipeline {
    pub fn new(op: &'static str) -> Self {
        Self {
            op,
            steps: Vec::new(),
            deadline: None,
        }
    }

    /// Appends a step.
    pub fn step(mut self, step: PipelineStep) -> Self {
        self.steps.push(step);
        self
    }

    /// Bounds every step by `deadline`.
    pub fn deadline(mut self, deadline: Option<Duration>) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn steps(&self) -> &[PipelineStep] {
        &self.steps
    }

    /// Runs the steps in order, stopping at the first failure.
    pub fn run(&self, runner: &impl CommandRunner) -> PipelineOutcome {
        let mut output = String::new();

        for (index, step) in self.steps.iter().enumerate() {
            tracing::debug!(op = self.op, step = step.name, command = %step.command, "running step");
            let result = runner.run(&step.command, self.deadline);
            output.push_str(&result.stdout);
            output.push_str(&result.stderr);

            let error = result.error(self.op).or_else(|| {
                (step.stderr_is_failure && !result.stderr.is_empty()).then(|| {
                    DeployError::new(
                        self.op,
                        ErrorKind::StderrNonEmpty {
                            command: result.command.clone(),
                            stderr: result.stderr.trim_end().to_string(),
                        },
                    )
                })
            });

            if let Some(error) = error {
                tracing::warn!(op = self.op, step = step.name, index, error = %error.kind, "step failed");
                return PipelineOutcome {
                    output,
                    executed: index + 1,
                    total: self.steps.len(),
                    failure: Some(StepFailure {
                        index,
                        name: step.name,
                        error,
                    }),
                };
            }
        }

        PipelineOutcome {
            output,
            executed: self.steps.len(),
            total: self.steps.len(),
            failure: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::{ExecutionResult, Outcome};
    use std::cell::RefCell;

    /// Replays canned results in order and records what was asked for.
    struct Scripted {
        results: RefCell<Vec<ExecutionResult>>,
        calls: RefCell<Vec<String>>,
    }

    impl Scripted {
        fn new(results: Vec<(&str, &str, Outcome)>) -> Self {
            Self {
                results: RefCell::new(
                    results
                        .into_iter()
                        .rev()
                        .map(|(out, err, outcome)| ExecutionResult::new("", out, err, outcome))
                        .collect(),
                ),
                calls: RefCell::new(Vec::new()),
            }
        }
    }

    impl CommandRunner for Scripted {
        fn run(&self, spec: &CommandSpec, _deadline: Option<Duration>) -> ExecutionResult {
            self.calls.borrow_mut().push(spec.to_string());
            let mut result = self.results.borrow_mut().pop().expect("unexpected step");
            result.command = spec.to_string();
            result
        }
    }

    fn three_steps(strict_last: bool) -> Pipeline {
        let last = CommandSpec::new("c");
        Pipeline::new("test")
            .step(PipelineStep::new("a", CommandSpec::new("a")))
            .step(PipelineStep::new("b", CommandSpec::new("b")))
            .step(if strict_last {
                PipelineStep::strict("c", last)
            } else {
                PipelineStep::new("c", last)
            })
    }

    #[test]
    fn test_all_steps_succeed() {
        let runner = Scripted::new(vec![
            ("1", "", Outcome::Completed),
            ("2", "warn", Outcome::Completed),
            ("3", "", Outcome::Completed),
        ]);

        let outcome = three_steps(false).run(&runner);

        assert!(outcome.is_success());
        assert_eq!(outcome.output, "12warn3");
        assert_eq!(outcome.executed, 3);
        assert_eq!(outcome.into_result().unwrap(), "12warn3");
    }

    #[test]
    fn test_stops_at_first_failure() {
        let runner = Scripted::new(vec![
            ("1", "", Outcome::Completed),
            ("2", "boom", Outcome::Failed("exit status: 1".into())),
        ]);

        let outcome = three_steps(false).run(&runner);

        assert_eq!(outcome.output, "12boom");
        assert_eq!(outcome.executed, 2);
        assert_eq!(outcome.total, 3);
        assert_eq!(runner.calls.borrow().as_slice(), ["a", "b"]);
        let failure = outcome.failure.unwrap();
        assert_eq!(failure.index, 1);
        assert_eq!(failure.name, "b");
        assert!(matches!(failure.error.kind(), ErrorKind::ProcessFailure { .. }));
    }

    #[test]
    fn test_stderr_only_fails_strict_steps() {
        let runner = Scripted::new(vec![
            ("", "chatty", Outcome::Completed),
            ("", "", Outcome::Completed),
            ("", "fatal: nope\n", Outcome::Completed),
        ]);

        let outcome = three_steps(true).run(&runner);

        let failure = outcome.failure.unwrap();
        assert_eq!(failure.index, 2);
        match failure.error.kind() {
            ErrorKind::StderrNonEmpty { stderr, .. } => assert_eq!(stderr, "fatal: nope"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_timeout_surfaces_as_timeout() {
        let runner = Scripted::new(vec![("", "", Outcome::TimedOut(Duration::from_secs(1)))]);

        let outcome = three_steps(false).run(&runner);

        assert_eq!(outcome.executed, 1);
        assert!(outcome.into_result().unwrap_err().is_timeout());
    }

    #[test]
    fn test_empty_pipeline_succeeds() {
        let runner = Scripted::new(vec![]);
        let outcome = Pipeline::new("test").run(&runner);

        assert!(outcome.is_success());
        assert_eq!(outcome.executed, 0);
        assert_eq!(outcome.output, "");
    }
}
