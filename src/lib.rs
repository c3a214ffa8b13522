//! # gitdeploy
//!
//! Drive git working trees under a single deploy root: clone, pull, commit
//! and push, read HEAD and branch tips, and list the commits that touched a
//! file. Every external command runs as an explicit argument vector with an
//! optional deadline, and SSH remotes are probed before network operations.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use gitdeploy::prelude::*;
//!
//! let config = DeployConfig::new("/srv/deploy").step_timeout(300);
//! let deployer = GitDeployer::new(config)?;
//!
//! let outcome = deployer.pull("git@gitlab.example.com:ops/app.git", "app", "main")?;
//! print!("{}", outcome.output);
//! outcome.into_result()?;
//!
//! for commit in deployer.file_commits("app", "main", "config/app.yaml")? {
//!     println!("{} {}", commit.id, commit.message);
//! }
//! # Ok::<(), gitdeploy::error::DeployError>(())
//! ```
//!
//! ## Scripts
//!
//! ```rust,no_run
//! use gitdeploy::prelude::*;
//! use std::time::Duration;
//!
//! let scripts = ScriptRunner::new(SystemRunner, "/bin/bash");
//! let result = scripts.run("systemctl reload nginx", Some(Duration::from_secs(30)))?;
//! println!("{}", result.combined_output());
//! # Ok::<(), gitdeploy::error::DeployError>(())
//! ```
//!
//! ## GitLab
//!
//! ```rust,no_run
//! use gitdeploy::prelude::*;
//!
//! let gitlab = GitLabClient::from_env()?;
//! let project = gitlab.project_by_name("ops", "app")?;
//! let branch = gitlab.branch(&project.id.to_string(), "main")?;
//! println!("{} is at {}", project.path_with_namespace, branch.commit.id);
//! # Ok::<(), gitdeploy::error::DeployError>(())
//! ```

pub mod config;
pub mod error;
pub mod fs;
pub mod git;
pub mod gitlab;
pub mod pipeline;
pub mod probe;
pub mod process;
pub mod script;

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::config::{DeployConfig, GitLabConfig, ProbeConfig};
    pub use crate::error::{DeployError, ErrorKind, Result};
    pub use crate::git::{CloneOps, CommitInfo, GitDeployer, LogOps, RefOps, SyncOps};
    pub use crate::gitlab::{
        Branch, BranchOps, FileOps, GitLabClient, Project, ProjectOps, RepoFile, TreeEntry, User,
        UserOps,
    };
    pub use crate::pipeline::{Pipeline, PipelineOutcome, PipelineStep};
    pub use crate::probe::{Prober, SshTarget};
    pub use crate::process::{CommandRunner, CommandSpec, ExecutionResult, Outcome, SystemRunner};
    pub use crate::script::ScriptRunner;
}

pub use prelude::*;
