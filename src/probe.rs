//! SSH reachability probing with a fixed number of attempts.

use crate::config::ProbeConfig;
use crate::error::{DeployError, ErrorKind, Result};
use crate::process::{CommandRunner, CommandSpec};

/// An SSH endpoint extracted from a remote URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SshTarget {
    /// `user@host` or bare `host`.
    pub host: String,
    pub port: Option<u16>,
}

impl SshTarget {
    /// Extracts the SSH endpoint from a git remote URL.
    ///
    /// Handles scp-style (`git@host:group/repo.git`) and `ssh://` URLs.
    /// Returns `None` for remotes that are not reached over SSH
    /// (http(s), `file://`, plain local paths).
    pub fn from_remote_url(url: &str) -> Option<Self> {
        let url = url.trim();

        if let Some(rest) = url
            .strip_prefix("ssh://")
            .or_else(|| url.strip_prefix("git+ssh://"))
        {
            let authority = rest.split('/').next().unwrap_or_default();
            let (host, port) = match authority.rsplit_once(':') {
                Some((host, port)) => (host, port.parse().ok()),
                None => (authority, None),
            };
            return (!host.is_empty()).then(|| Self {
                host: host.to_string(),
                port,
            });
        }

        if url.contains("://") {
            return None;
        }

        // scp-style: the part before the first ':' is the host, as long as it
        // is not itself a path.
        let (host, _) = url.split_once(':')?;
        if host.is_empty() || host.contains('/') {
            return None;
        }
        Some(Self {
            host: host.to_string(),
            port: None,
        })
    }
}

/// Probes an SSH endpoint until it answers or attempts run out.
pub struct Prober<R> {
    runner: R,
    ssh: String,
    config: ProbeConfig,
}

impl<R: CommandRunner> Prober<R> {
    pub fn new(runner: R, ssh: impl Into<String>, config: ProbeConfig) -> Self {
        Self {
            runner,
            ssh: ssh.into(),
            config,
        }
    }

    /// The connection test run on each attempt.
    pub fn command(&self, target: &SshTarget) -> CommandSpec {
        let mut spec = CommandSpec::new(&self.ssh)
            .args(["-o", "StrictHostKeyChecking=no", "-o", "BatchMode=yes"]);
        if let Some(port) = target.port {
            spec = spec.arg("-p").arg(port.to_string());
        }
        spec.arg(&target.host)
    }

    /// Attempts the connection test, pausing between failures.
    ///
    /// Succeeds on the first clean attempt. After the last failed attempt
    /// the error carries that attempt's failure; there is no pause after it.
    pub fn probe(&self, target: &SshTarget) -> Result<()> {
        const OP: &str = "probe";

        if target.host.starts_with('-') {
            return Err(DeployError::invalid_argument(
                OP,
                format!("ssh host must not start with '-': {}", target.host),
            ));
        }

        let spec = self.command(target);
        let attempts = self.config.attempts;
        let mut last_error = String::from("no attempts made");

        for attempt in 1..=attempts {
            let result = self.runner.run(&spec, Some(self.config.attempt_timeout()));
            match result.error(OP) {
                None => {
                    tracing::debug!(host = %target.host, attempt, "remote reachable");
                    return Ok(());
                }
                Some(err) => {
                    tracing::warn!(host = %target.host, attempt, attempts, error = %err.kind, "probe attempt failed");
                    last_error = match result.stderr.trim() {
                        "" => err.kind.to_string(),
                        stderr => format!("{} ({})", err.kind, stderr),
                    };
                }
            }
            if attempt < attempts {
                self.runner.pause(self.config.delay());
            }
        }

        Err(DeployError::new(
            OP,
            ErrorKind::RemoteUnreachable {
                host: target.host.clone(),
                attempts,
                last_error,
            },
        ))
    }

    /// Probes the remote behind `url`; non-SSH remotes pass without a probe.
    pub fn probe_url(&self, url: &str) -> Result<()> {
        match SshTarget::from_remote_url(url) {
            Some(target) => self.probe(&target),
            None => {
                tracing::debug!(url, "remote is not ssh, skipping probe");
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::{ExecutionResult, Outcome};
    use std::cell::Cell;
    use std::time::Duration;

    #[test]
    fn test_scp_style_target() {
        let target = SshTarget::from_remote_url("git@gitlab.example.com:group/app.git").unwrap();
        assert_eq!(target.host, "git@gitlab.example.com");
        assert_eq!(target.port, None);
    }

    #[test]
    fn test_ssh_url_target_with_port() {
        let target = SshTarget::from_remote_url("ssh://git@gitlab.example.com:2222/group/app.git")
            .unwrap();
        assert_eq!(target.host, "git@gitlab.example.com");
        assert_eq!(target.port, Some(2222));
    }

    #[test]
    fn test_non_ssh_remotes_have_no_target() {
        assert_eq!(SshTarget::from_remote_url("https://gitlab.example.com/group/app.git"), None);
        assert_eq!(SshTarget::from_remote_url("file:///srv/repos/app.git"), None);
        assert_eq!(SshTarget::from_remote_url("/srv/repos/app.git"), None);
        assert_eq!(SshTarget::from_remote_url("./relative/app"), None);
    }

    struct Counting(Cell<usize>);

    impl CommandRunner for Counting {
        fn run(&self, spec: &CommandSpec, _deadline: Option<Duration>) -> ExecutionResult {
            self.0.set(self.0.get() + 1);
            ExecutionResult::new(spec.to_string(), "", "", Outcome::Completed)
        }
    }

    #[test]
    fn test_option_like_host_is_rejected_without_ssh() {
        let runner = Counting(Cell::new(0));
        let prober = Prober::new(&runner, "ssh", ProbeConfig::default());

        let err = prober
            .probe_url("ssh://-oProxyCommand=touch%20pwned/group/app.git")
            .unwrap_err();

        assert!(err.is_invalid_argument());
        assert_eq!(runner.0.get(), 0);
    }
}
