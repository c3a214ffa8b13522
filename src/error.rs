//! Error types for deploy operations.
//!
//! Every error carries the operation that produced it (`op`), attached where
//! the error is constructed, plus a [`ErrorKind`] describing what went wrong.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// The main error type for deploy operations.
#[derive(Error, Debug)]
#[error("{op}: {kind}")]
pub struct DeployError {
    /// Operation that raised the error, e.g. `"git.pull"`.
    pub op: &'static str,
    /// What went wrong.
    pub kind: ErrorKind,
}

/// The kinds of failure a deploy operation can report.
#[derive(Error, Debug)]
pub enum ErrorKind {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Not found: {0}")]
    NotFound(PathBuf),

    #[error("Already exists: {0}")]
    AlreadyExists(PathBuf),

    #[error("Remote {host} unreachable after {attempts} attempts: {last_error}")]
    RemoteUnreachable {
        host: String,
        attempts: u32,
        last_error: String,
    },

    #[error("Command `{command}` failed: {message}")]
    ProcessFailure { command: String, message: String },

    #[error("Command `{command}` wrote to stderr: {stderr}")]
    StderrNonEmpty { command: String, stderr: String },

    #[error("Command `{command}` timed out after {}s and was killed", deadline.as_secs())]
    Timeout { command: String, deadline: Duration },

    #[error("Command `{command}` timed out after {}s and could not be killed: {message}", deadline.as_secs())]
    TimeoutKillFailed {
        command: String,
        deadline: Duration,
        message: String,
    },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("GitLab API error ({status}): {message}")]
    GitLab { status: u16, message: String },
}

impl DeployError {
    /// Create an error for the given operation.
    pub fn new(op: &'static str, kind: impl Into<ErrorKind>) -> Self {
        Self {
            op,
            kind: kind.into(),
        }
    }

    pub fn invalid_argument(op: &'static str, message: impl Into<String>) -> Self {
        Self::new(op, ErrorKind::InvalidArgument(message.into()))
    }

    pub fn not_found(op: &'static str, path: impl Into<PathBuf>) -> Self {
        Self::new(op, ErrorKind::NotFound(path.into()))
    }

    pub fn already_exists(op: &'static str, path: impl Into<PathBuf>) -> Self {
        Self::new(op, ErrorKind::AlreadyExists(path.into()))
    }

    pub fn parse(op: &'static str, message: impl Into<String>) -> Self {
        Self::new(op, ErrorKind::Parse(message.into()))
    }

    pub fn config(op: &'static str, message: impl Into<String>) -> Self {
        Self::new(op, ErrorKind::Config(message.into()))
    }

    /// The kind of this error.
    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self.kind, ErrorKind::NotFound(_))
    }

    pub fn is_already_exists(&self) -> bool {
        matches!(self.kind, ErrorKind::AlreadyExists(_))
    }

    pub fn is_invalid_argument(&self) -> bool {
        matches!(self.kind, ErrorKind::InvalidArgument(_))
    }

    pub fn is_timeout(&self) -> bool {
        matches!(
            self.kind,
            ErrorKind::Timeout { .. } | ErrorKind::TimeoutKillFailed { .. }
        )
    }

    pub fn is_parse(&self) -> bool {
        matches!(self.kind, ErrorKind::Parse(_))
    }
}

/// Attach an operation tag to foreign errors at the `?` site.
///
/// ```rust,no_run
/// use gitdeploy::error::{ResultExt, Result};
///
/// fn read_head(path: &std::path::Path) -> Result<String> {
///     std::fs::read_to_string(path).at("git.head")
/// }
/// ```
pub trait ResultExt<T> {
    fn at(self, op: &'static str) -> Result<T>;
}

impl<T, E: Into<ErrorKind>> ResultExt<T> for std::result::Result<T, E> {
    fn at(self, op: &'static str) -> Result<T> {
        self.map_err(|e| DeployError::new(op, e))
    }
}

/// A specialized Result type for deploy operations.
pub type Result<T> = std::result::Result<T, DeployError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_operation() {
        let err = DeployError::not_found("git.pull", "/deploy/proj1");
        assert_eq!(err.to_string(), "git.pull: Not found: /deploy/proj1");
    }

    #[test]
    fn test_result_ext_tags_io_errors() {
        let result: Result<String> = std::fs::read_to_string("/definitely/not/here").at("fs.read");
        let err = result.unwrap_err();
        assert_eq!(err.op, "fs.read");
        assert!(matches!(err.kind(), ErrorKind::Io(_)));
    }

    #[test]
    fn test_timeout_predicate() {
        let err = DeployError::new(
            "process.run",
            ErrorKind::Timeout {
                command: "sleep 10".into(),
                deadline: Duration::from_secs(1),
            },
        );
        assert!(err.is_timeout());
        assert!(err.to_string().contains("timed out after 1s"));
    }
}
