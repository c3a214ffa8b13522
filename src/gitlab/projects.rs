//! GitLab project operations.

use crate::error::{DeployError, Result};
use crate::gitlab::GitLabClient;
use crate::gitlab::client::project_segment;
use serde::{Deserialize, Serialize};

/// Project information from the GitLab API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub path_with_namespace: String,
    pub ssh_url_to_repo: String,
    #[serde(default)]
    pub http_url_to_repo: String,
    pub default_branch: Option<String>,
}

/// Project lookup and management.
pub trait ProjectOps {
    /// Create a private project in the client's namespace.
    fn create_project(&self, name: &str) -> Result<Project>;

    /// Rename a project, updating both its name and path.
    fn rename_project(&self, project: &str, new_name: &str) -> Result<Project>;

    /// Get a project by numeric id or `namespace/name` path.
    fn project(&self, project: &str) -> Result<Project>;

    /// Get a project by namespace and name.
    fn project_by_name(&self, namespace: &str, name: &str) -> Result<Project> {
        self.project(&format!("{}/{}", namespace, name))
    }
}

impl ProjectOps for GitLabClient {
    fn create_project(&self, name: &str) -> Result<Project> {
        const OP: &str = "gitlab.create_project";

        #[derive(Serialize)]
        struct CreateProject<'a> {
            name: &'a str,
            #[serde(skip_serializing_if = "Option::is_none")]
            namespace_id: Option<u64>,
            visibility: &'a str,
        }

        if name.trim().is_empty() {
            return Err(DeployError::invalid_argument(OP, "empty project name"));
        }
        let body = CreateProject {
            name,
            namespace_id: self.namespace_id,
            visibility: "private",
        };
        self.post(OP, "/projects", &body)
    }

    fn rename_project(&self, project: &str, new_name: &str) -> Result<Project> {
        const OP: &str = "gitlab.rename_project";

        #[derive(Serialize)]
        struct RenameProject<'a> {
            name: &'a str,
            path: &'a str,
        }

        if new_name.trim().is_empty() {
            return Err(DeployError::invalid_argument(OP, "empty project name"));
        }
        let endpoint = format!("/projects/{}", project_segment(project));
        self.put(
            OP,
            &endpoint,
            &RenameProject {
                name: new_name,
                path: new_name,
            },
        )
    }

    fn project(&self, project: &str) -> Result<Project> {
        let endpoint = format!("/projects/{}", project_segment(project));
        self.get("gitlab.project", &endpoint, &[])
    }
}
