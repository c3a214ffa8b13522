//! GitLab user lookups.

use crate::error::Result;
use crate::gitlab::GitLabClient;
use serde::{Deserialize, Serialize};

/// A GitLab user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: u64,
    pub username: String,
    #[serde(default)]
    pub email: Option<String>,
    pub name: String,
}

/// User operations.
pub trait UserOps {
    /// The user the token authenticates as (or the `SUDO` user, if set).
    fn current_user(&self) -> Result<User>;
}

impl UserOps for GitLabClient {
    fn current_user(&self) -> Result<User> {
        self.get("gitlab.current_user", "/user", &[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_user() {
        let json = r#"{"id": 3, "username": "alice", "name": "Alice", "state": "active"}"#;
        let user: User = serde_json::from_str(json).unwrap();

        assert_eq!(user.id, 3);
        assert_eq!(user.username, "alice");
        assert_eq!(user.email, None);
    }
}
