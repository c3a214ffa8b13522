//! GitLab API integration for managing projects, branches, and repository files.
//!
//! This is thin request/response glue: one HTTP call per operation, no
//! retries, JSON mapped onto small serde structs.
//!
//! # Example
//!
//! ```rust,no_run
//! use gitdeploy::gitlab::{BranchOps, GitLabClient, ProjectOps};
//!
//! let client = GitLabClient::new("https://gitlab.example.com", "glpat-your-token");
//!
//! let project = client.project_by_name("ops", "app")?;
//! let branch = client.branch(&project.id.to_string(), "main")?;
//! println!("{} is at {}", project.ssh_url_to_repo, branch.commit.id);
//! # Ok::<(), gitdeploy::error::DeployError>(())
//! ```

mod branches;
mod client;
mod files;
mod projects;
mod users;

pub use branches::{Branch, BranchCommit, BranchOps};
pub use client::GitLabClient;
pub use files::{FileChange, FileOps, RepoFile, TreeEntry};
pub use projects::{Project, ProjectOps};
pub use users::{User, UserOps};
