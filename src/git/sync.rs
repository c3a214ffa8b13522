//! Pulling into and pushing from an existing working tree.

use crate::error::{DeployError, Result};
use crate::git::{GitDeployer, check_token};
use crate::pipeline::{Pipeline, PipelineOutcome, PipelineStep};
use crate::process::CommandRunner;

/// Sequence that commit messages may not contain.
pub const FORBIDDEN_MESSAGE_DELIMITER: &str = "|||";

/// Pull and push operations for GitDeployer.
pub trait SyncOps {
    /// Bring `branch` up to date from `remote_url`.
    ///
    /// Steps: `remote set-url origin`, `checkout`, `fetch origin <branch>`,
    /// `merge origin/<branch>`. Output from all four accumulates; stderr
    /// alone does not fail a step.
    fn pull(&self, remote_url: &str, project: &str, branch: &str) -> Result<PipelineOutcome>;

    /// Commit every change on `branch` and push it to `remote_url`.
    ///
    /// Steps: `remote set-url origin`, `checkout`, `add -A`,
    /// `commit -am <message>`, `push origin <branch>`. The message is one
    /// argument no matter what whitespace it contains.
    fn push(
        &self,
        remote_url: &str,
        project: &str,
        branch: &str,
        message: &str,
    ) -> Result<PipelineOutcome>;
}

impl<R: CommandRunner> SyncOps for GitDeployer<R> {
    fn pull(&self, remote_url: &str, project: &str, branch: &str) -> Result<PipelineOutcome> {
        const OP: &str = "git.pull";

        check_token(OP, "remote url", remote_url)?;
        check_token(OP, "branch", branch)?;
        let dir = self.existing_project_dir(OP, project)?;

        self.prober().probe_url(remote_url)?;

        tracing::info!(project, branch, "pulling");
        let git = || self.git_in(&dir);
        let outcome = Pipeline::new(OP)
            .deadline(self.config().step_deadline())
            .step(PipelineStep::new(
                "remote set-url",
                git().args(["remote", "set-url", "origin", remote_url]),
            ))
            .step(PipelineStep::new("checkout", git().args(["checkout", branch])))
            .step(PipelineStep::new("fetch", git().args(["fetch", "origin", branch])))
            .step(PipelineStep::new(
                "merge",
                git().arg("merge").arg(format!("origin/{}", branch)),
            ))
            .run(self.runner());
        tracing::info!(project, branch, success = outcome.is_success(), "pull finished");
        Ok(outcome)
    }

    fn push(
        &self,
        remote_url: &str,
        project: &str,
        branch: &str,
        message: &str,
    ) -> Result<PipelineOutcome> {
        const OP: &str = "git.push";

        if message.contains(FORBIDDEN_MESSAGE_DELIMITER) {
            return Err(DeployError::invalid_argument(
                OP,
                format!("commit message must not contain {}", FORBIDDEN_MESSAGE_DELIMITER),
            ));
        }
        if message.trim().is_empty() {
            return Err(DeployError::invalid_argument(OP, "empty commit message"));
        }
        check_token(OP, "remote url", remote_url)?;
        check_token(OP, "branch", branch)?;
        let dir = self.existing_project_dir(OP, project)?;

        self.prober().probe_url(remote_url)?;

        tracing::info!(project, branch, "pushing");
        let git = || self.git_in(&dir);
        let outcome = Pipeline::new(OP)
            .deadline(self.config().step_deadline())
            .step(PipelineStep::new(
                "remote set-url",
                git().args(["remote", "set-url", "origin", remote_url]),
            ))
            .step(PipelineStep::new("checkout", git().args(["checkout", branch])))
            .step(PipelineStep::new("add", git().args(["add", "-A"])))
            .step(PipelineStep::new("commit", git().args(["commit", "-am", message])))
            .step(PipelineStep::new("push", git().args(["push", "origin", branch])))
            .run(self.runner());
        tracing::info!(project, branch, success = outcome.is_success(), "push finished");
        Ok(outcome)
    }
}
