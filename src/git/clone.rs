//! Cloning a project into the deploy root.

use crate::error::{DeployError, Result, ResultExt};
use crate::fs;
use crate::git::{GitDeployer, check_token};
use crate::pipeline::{Pipeline, PipelineOutcome, PipelineStep};
use crate::process::{CommandRunner, CommandSpec};

/// Clone operations for GitDeployer.
pub trait CloneOps {
    /// Clone `remote_url` into `<deploy_root>/<project>`.
    ///
    /// Fails with `AlreadyExists` if the target is present (nothing is
    /// overwritten, nothing is spawned) and with `RemoteUnreachable` if the
    /// SSH probe gives up. The clone runs with `--quiet`; any stderr output
    /// is treated as failure.
    fn clone_project(&self, remote_url: &str, project: &str) -> Result<PipelineOutcome>;
}

impl<R: CommandRunner> CloneOps for GitDeployer<R> {
    fn clone_project(&self, remote_url: &str, project: &str) -> Result<PipelineOutcome> {
        const OP: &str = "git.clone";

        check_token(OP, "remote url", remote_url)?;
        let target = self.project_dir(project)?;
        if fs::exists(&target) {
            return Err(DeployError::already_exists(OP, target));
        }

        self.prober().probe_url(remote_url)?;

        if let Some(parent) = target.parent() {
            fs::create_dirs(parent).at(OP)?;
        }

        tracing::info!(project, remote = remote_url, "cloning");
        let clone = CommandSpec::new(&self.config().git)
            .args(["clone", "--quiet", remote_url])
            .arg(target.to_string_lossy());

        let outcome = Pipeline::new(OP)
            .deadline(self.config().step_deadline())
            .step(PipelineStep::strict("clone", clone))
            .run(self.runner());
        tracing::info!(project, success = outcome.is_success(), "clone finished");
        Ok(outcome)
    }
}
