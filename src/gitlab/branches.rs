//! GitLab branch lookups.

use crate::error::Result;
use crate::gitlab::GitLabClient;
use crate::gitlab::client::project_segment;
use serde::{Deserialize, Serialize};

/// A branch and the commit at its tip.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Branch {
    pub name: String,
    pub commit: BranchCommit,
}

/// The tip commit of a branch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BranchCommit {
    pub id: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub parent_ids: Vec<String>,
}

/// Branch operations.
pub trait BranchOps {
    /// Get `branch` of `project` (numeric id or `namespace/name`).
    fn branch(&self, project: &str, branch: &str) -> Result<Branch>;
}

impl BranchOps for GitLabClient {
    fn branch(&self, project: &str, branch: &str) -> Result<Branch> {
        let endpoint = format!(
            "/projects/{}/repository/branches/{}",
            project_segment(project),
            urlencoding::encode(branch)
        );
        self.get("gitlab.branch", &endpoint, &[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_branch() {
        let json = r#"{
            "name": "main",
            "merged": false,
            "commit": {
                "id": "7b5c3cc8be40ee161ae89a06bba6229da1032a0c",
                "message": "add projects API",
                "parent_ids": ["4ad91d3c1144c406e50c7b33bae684bd6837faf8"]
            }
        }"#;

        let branch: Branch = serde_json::from_str(json).unwrap();

        assert_eq!(branch.name, "main");
        assert_eq!(branch.commit.message, "add projects API");
        assert_eq!(branch.commit.parent_ids.len(), 1);
    }
}
