//! Git deploy workflows built on the `git` executable.
//!
//! Every project lives in `<deploy_root>/<project>`. Commands are always
//! issued with explicit `--git-dir` and `--work-tree` flags, so nothing
//! depends on the current directory of this process.
//!
//! # Example
//!
//! ```rust,no_run
//! use gitdeploy::config::DeployConfig;
//! use gitdeploy::git::{GitDeployer, CloneOps, SyncOps, RefOps};
//!
//! let deployer = GitDeployer::new(DeployConfig::new("/srv/deploy"))?;
//!
//! deployer.clone_project("git@gitlab.example.com:ops/app.git", "app")?.into_result()?;
//! // ... edit files in /srv/deploy/app ...
//! let outcome = deployer.push("git@gitlab.example.com:ops/app.git", "app", "main", "update config")?;
//! println!("{}", outcome.output);
//! println!("now at {}", deployer.head_commit("app")?);
//! # Ok::<(), gitdeploy::error::DeployError>(())
//! ```

mod clone;
mod log;
mod refs;
mod sync;

pub use clone::CloneOps;
pub use log::{CommitInfo, LOG_FIELD_SEPARATOR, LogOps, parse_commit_log};
pub use refs::{RefOps, RefPointer, resolve_branch, resolve_head};
pub use sync::{FORBIDDEN_MESSAGE_DELIMITER, SyncOps};

use crate::config::DeployConfig;
use crate::error::{DeployError, Result};
use crate::fs;
use crate::probe::Prober;
use crate::process::{CommandRunner, CommandSpec, SystemRunner};
use std::path::{Path, PathBuf};

/// Runs git workflows against projects under a deploy root.
pub struct GitDeployer<R = SystemRunner> {
    config: DeployConfig,
    runner: R,
}

impl GitDeployer<SystemRunner> {
    /// Creates a deployer that spawns real processes.
    pub fn new(config: DeployConfig) -> Result<Self> {
        Self::with_runner(config, SystemRunner)
    }
}

impl<R: CommandRunner> GitDeployer<R> {
    /// Creates a deployer with a custom command runner.
    pub fn with_runner(config: DeployConfig, runner: R) -> Result<Self> {
        config.validate()?;
        Ok(Self { config, runner })
    }

    pub fn config(&self) -> &DeployConfig {
        &self.config
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    /// Working tree for `project`.
    pub fn project_dir(&self, project: &str) -> Result<PathBuf> {
        fs::project_dir(&self.config.deploy_root, project)
    }

    /// Reachability prober sharing this deployer's runner.
    pub fn prober(&self) -> Prober<&R> {
        Prober::new(&self.runner, &self.config.ssh, self.config.probe)
    }

    /// `git --git-dir=<dir>/.git --work-tree=<dir>`, ready for a subcommand.
    pub(crate) fn git_in(&self, work_tree: &Path) -> CommandSpec {
        git_command(&self.config.git, work_tree)
    }

    /// Working tree for `project`, which must already exist.
    pub(crate) fn existing_project_dir(&self, op: &'static str, project: &str) -> Result<PathBuf> {
        let dir = self.project_dir(project)?;
        match fs::is_dir(&dir) {
            Ok(true) => Ok(dir),
            _ => Err(DeployError::not_found(op, dir)),
        }
    }
}

/// Builds a git command bound to `work_tree` and its `.git` directory.
pub fn git_command(git: &str, work_tree: &Path) -> CommandSpec {
    CommandSpec::new(git)
        .arg(format!("--git-dir={}", work_tree.join(".git").display()))
        .arg(format!("--work-tree={}", work_tree.display()))
}

/// Rejects values git would read as an option, or that are empty.
pub(crate) fn check_token(op: &'static str, what: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(DeployError::invalid_argument(op, format!("empty {}", what)));
    }
    if value.starts_with('-') {
        return Err(DeployError::invalid_argument(
            op,
            format!("{} must not start with '-': {}", what, value),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_git_command_uses_explicit_dirs() {
        let spec = git_command("git", Path::new("/deploy/proj1")).arg("status");

        assert_eq!(
            spec.arguments(),
            &[
                "--git-dir=/deploy/proj1/.git",
                "--work-tree=/deploy/proj1",
                "status"
            ]
        );
    }

    #[test]
    fn test_check_token() {
        assert!(check_token("t", "branch", "main").is_ok());
        assert!(check_token("t", "branch", "").unwrap_err().is_invalid_argument());
        assert!(check_token("t", "branch", "--upload-pack=x").unwrap_err().is_invalid_argument());
    }

    #[test]
    fn test_new_validates_config() {
        assert!(GitDeployer::new(DeployConfig::new("relative")).is_err());
        assert!(GitDeployer::new(DeployConfig::new("/srv/deploy")).is_ok());
    }
}
