//! Commit history for a single file.

use crate::error::{DeployError, Result};
use crate::fs;
use crate::git::{GitDeployer, check_token};
use crate::pipeline::{Pipeline, PipelineStep};
use crate::process::CommandRunner;
use serde::Serialize;

/// Separates the commit id from the subject in log output (ASCII unit
/// separator), since subjects routinely contain `:`.
pub const LOG_FIELD_SEPARATOR: &str = "\x1f";

/// A commit touching a file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommitInfo {
    /// Full commit id.
    pub id: String,
    /// Subject line.
    pub message: String,
}

/// History operations for GitDeployer.
pub trait LogOps {
    /// Commits on `branch` that touched `file` (relative to the project),
    /// newest first.
    fn file_commits(&self, project: &str, branch: &str, file: &str) -> Result<Vec<CommitInfo>>;
}

impl<R: CommandRunner> LogOps for GitDeployer<R> {
    fn file_commits(&self, project: &str, branch: &str, file: &str) -> Result<Vec<CommitInfo>> {
        const OP: &str = "git.log";

        check_token(OP, "branch", branch)?;
        let dir = self.existing_project_dir(OP, project)?;
        let path = fs::join_within(&dir, file, OP)?;
        if !fs::exists(&path) {
            return Err(DeployError::not_found(OP, path));
        }

        let log = self
            .git_in(&dir)
            .arg("log")
            .arg("--pretty=format:%H%x1f%s")
            .args([branch, "--"])
            .arg(path.to_string_lossy());

        let output = Pipeline::new(OP)
            .deadline(self.config().step_deadline())
            .step(PipelineStep::strict("log", log))
            .run(self.runner())
            .into_result()?;

        parse_commit_log(&output, LOG_FIELD_SEPARATOR)
    }
}

/// Parses `<id><delimiter><subject>` lines.
///
/// Every non-blank line must split into exactly two fields; otherwise the
/// whole parse fails. Empty input means no commits.
pub fn parse_commit_log(raw: &str, delimiter: &str) -> Result<Vec<CommitInfo>> {
    raw.lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| {
            let fields: Vec<&str> = line.split(delimiter).collect();
            match fields.as_slice() {
                [id, message] if !id.is_empty() => Ok(CommitInfo {
                    id: id.to_string(),
                    message: message.to_string(),
                }),
                _ => Err(DeployError::parse(
                    "git.log",
                    format!("commit line {:?} does not split into id and subject", line),
                )),
            }
        })
        .collect()
}
