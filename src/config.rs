//! Deploy configuration.
//!
//! Loaded from YAML, overridable from the environment, and buildable in
//! code with chained setters:
//!
//! ```rust
//! use gitdeploy::config::DeployConfig;
//!
//! let config = DeployConfig::new("/srv/deploy")
//!     .git_binary("/usr/bin/git")
//!     .step_timeout(300);
//! assert_eq!(config.git, "/usr/bin/git");
//! ```

use crate::error::{DeployError, Result, ResultExt};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable naming a config file.
pub const CONFIG_ENV: &str = "GITDEPLOY_CONFIG";
/// Environment variable overriding `deploy_root`.
pub const ROOT_ENV: &str = "GITDEPLOY_ROOT";
/// Environment variable overriding `gitlab.url`.
pub const GITLAB_URL_ENV: &str = "GITLAB_URL";
/// Environment variable overriding `gitlab.token`.
pub const GITLAB_TOKEN_ENV: &str = "GITLAB_TOKEN";

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeployConfig {
    /// Absolute directory holding one working tree per project.
    pub deploy_root: PathBuf,
    /// git executable.
    pub git: String,
    /// ssh executable used for reachability probes.
    pub ssh: String,
    /// Interpreter for ad-hoc scripts.
    pub shell: String,
    /// Deadline for each git step; `None` lets steps run unbounded.
    pub step_timeout_secs: Option<u64>,
    pub probe: ProbeConfig,
    pub gitlab: GitLabConfig,
}

impl Default for DeployConfig {
    fn default() -> Self {
        Self {
            deploy_root: PathBuf::new(),
            git: "git".into(),
            ssh: "ssh".into(),
            shell: crate::script::DEFAULT_SHELL.into(),
            step_timeout_secs: None,
            probe: ProbeConfig::default(),
            gitlab: GitLabConfig::default(),
        }
    }
}

impl DeployConfig {
    /// Creates a configuration rooted at `deploy_root` with defaults elsewhere.
    pub fn new(deploy_root: impl Into<PathBuf>) -> Self {
        Self {
            deploy_root: deploy_root.into(),
            ..Self::default()
        }
    }

    /// Sets the git executable.
    pub fn git_binary(mut self, git: impl Into<String>) -> Self {
        self.git = git.into();
        self
    }

    /// Sets the ssh executable.
    pub fn ssh_binary(mut self, ssh: impl Into<String>) -> Self {
        self.ssh = ssh.into();
        self
    }

    /// Sets the script interpreter.
    pub fn shell(mut self, shell: impl Into<String>) -> Self {
        self.shell = shell.into();
        self
    }

    /// Bounds every git step by `secs`.
    pub fn step_timeout(mut self, secs: u64) -> Self {
        self.step_timeout_secs = Some(secs);
        self
    }

    /// Replaces the probe settings.
    pub fn probe(mut self, probe: ProbeConfig) -> Self {
        self.probe = probe;
        self
    }

    /// Replaces the GitLab settings.
    pub fn gitlab(mut self, gitlab: GitLabConfig) -> Self {
        self.gitlab = gitlab;
        self
    }

    /// Step deadline as a duration.
    pub fn step_deadline(&self) -> Option<Duration> {
        self.step_timeout_secs.map(Duration::from_secs)
    }

    /// Reads a YAML config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        const OP: &str = "config.load";
        let content = std::fs::read_to_string(path.as_ref()).at(OP)?;
        serde_yaml::from_str(&content).at(OP)
    }

    /// Finds and loads the config, then applies environment overrides.
    ///
    /// Looks at `$GITDEPLOY_CONFIG`, then `<config dir>/gitdeploy/config.yaml`.
    /// With no file, defaults plus environment are used.
    pub fn discover() -> Result<Self> {
        let path = std::env::var_os(CONFIG_ENV)
            .map(PathBuf::from)
            .or_else(default_config_path);

        let config = match path {
            Some(path) if path.exists() => {
                tracing::debug!(path = %path.display(), "loading config");
                Self::load(&path)?
            }
            _ => Self::default(),
        };
        Ok(config.with_env_overrides())
    }

    /// Applies `GITDEPLOY_ROOT`, `GITLAB_URL` and `GITLAB_TOKEN` if set.
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(|name| std::env::var(name).ok())
    }

    fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(root) = lookup(ROOT_ENV) {
            self.deploy_root = PathBuf::from(root);
        }
        if let Some(url) = lookup(GITLAB_URL_ENV) {
            self.gitlab.url = url;
        }
        if let Some(token) = lookup(GITLAB_TOKEN_ENV) {
            self.gitlab.token = token;
        }
        self
    }

    /// Checks the settings the git workflows depend on.
    pub fn validate(&self) -> Result<()> {
        const OP: &str = "config.validate";

        if self.deploy_root.as_os_str().is_empty() {
            return Err(DeployError::config(OP, "deploy_root is not set"));
        }
        if !self.deploy_root.is_absolute() {
            return Err(DeployError::config(
                OP,
                format!("deploy_root must be absolute: {}", self.deploy_root.display()),
            ));
        }
        if self.git.is_empty() {
            return Err(DeployError::config(OP, "git executable is empty"));
        }
        if self.probe.attempts == 0 {
            return Err(DeployError::config(OP, "probe.attempts must be at least 1"));
        }
        if self.probe.attempt_timeout_secs == 0 {
            return Err(DeployError::config(OP, "probe.attempt_timeout_secs must be at least 1"));
        }
        if self.step_timeout_secs == Some(0) {
            return Err(DeployError::config(
                OP,
                "step_timeout_secs must be at least 1; omit it for no deadline",
            ));
        }
        Ok(())
    }
}

/// Default config file location.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("gitdeploy").join("config.yaml"))
}

/// Reachability probe settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    pub attempts: u32,
    pub attempt_timeout_secs: u64,
    pub delay_secs: u64,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            attempts: 5,
            attempt_timeout_secs: 12,
            delay_secs: 1,
        }
    }
}

impl ProbeConfig {
    pub fn attempt_timeout(&self) -> Duration {
        Duration::from_secs(self.attempt_timeout_secs)
    }

    pub fn delay(&self) -> Duration {
        Duration::from_secs(self.delay_secs)
    }
}

/// GitLab API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GitLabConfig {
    /// Base URL, e.g. `https://gitlab.example.com`.
    pub url: String,
    /// API path prefix appended to `url`.
    pub api_prefix: String,
    /// Private token sent as `PRIVATE-TOKEN`.
    pub token: String,
    /// Namespace new projects are created in.
    pub namespace_id: Option<u64>,
}

impl Default for GitLabConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            api_prefix: "/api/v4".into(),
            token: String::new(),
            namespace_id: None,
        }
    }
}
