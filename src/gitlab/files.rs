//! Repository files and trees through the GitLab API.

use crate::error::{DeployError, Result};
use crate::gitlab::GitLabClient;
use crate::gitlab::client::project_segment;
use serde::{Deserialize, Serialize};

/// A file as returned by the files API. `content` is in `encoding`
/// (usually base64).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepoFile {
    pub file_name: String,
    pub file_path: String,
    pub size: u64,
    pub encoding: String,
    pub content: String,
    #[serde(rename = "ref")]
    pub ref_name: String,
    pub commit_id: String,
    #[serde(default)]
    pub last_commit_id: Option<String>,
}

/// Result of creating or updating a file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileChange {
    pub file_path: String,
    pub branch: String,
}

/// One entry of a repository tree listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeEntry {
    pub id: String,
    pub name: String,
    /// `blob` or `tree`.
    #[serde(rename = "type")]
    pub kind: String,
    pub path: String,
    pub mode: String,
}

impl TreeEntry {
    pub fn is_dir(&self) -> bool {
        self.kind == "tree"
    }
}

#[derive(Serialize)]
struct WriteFile<'a> {
    branch: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    encoding: Option<&'a str>,
    commit_message: &'a str,
}

/// File and tree operations.
pub trait FileOps {
    /// File metadata and encoded content at `ref_name`.
    fn file(&self, project: &str, ref_name: &str, path: &str) -> Result<RepoFile>;

    /// Raw file content at `ref_name` (a branch, tag, or commit id).
    fn raw_file(&self, project: &str, ref_name: &str, path: &str) -> Result<String>;

    /// Raw file content as of commit `sha`.
    fn file_at_commit(&self, project: &str, sha: &str, path: &str) -> Result<String> {
        self.raw_file(project, sha, path)
    }

    /// Create a new text file on `branch`.
    fn create_file(
        &self,
        project: &str,
        branch: &str,
        path: &str,
        content: &str,
        message: &str,
    ) -> Result<FileChange>;

    /// Replace the content of an existing text file on `branch`.
    fn update_file(
        &self,
        project: &str,
        branch: &str,
        path: &str,
        content: &str,
        message: &str,
    ) -> Result<()>;

    /// Delete a file on `branch`.
    fn delete_file(&self, project: &str, branch: &str, path: &str, message: &str) -> Result<()>;

    /// Entries directly under `path` (the root when `None`); not recursive.
    fn tree(&self, project: &str, ref_name: &str, path: Option<&str>) -> Result<Vec<TreeEntry>>;
}

fn file_endpoint(project: &str, path: &str) -> String {
    format!(
        "/projects/{}/repository/files/{}",
        project_segment(project),
        urlencoding::encode(path.trim_start_matches('/'))
    )
}

fn check_path(op: &'static str, path: &str) -> Result<()> {
    if path.trim_matches('/').is_empty() {
        return Err(DeployError::invalid_argument(op, "empty file path"));
    }
    Ok(())
}

impl FileOps for GitLabClient {
    fn file(&self, project: &str, ref_name: &str, path: &str) -> Result<RepoFile> {
        const OP: &str = "gitlab.file";
        check_path(OP, path)?;
        self.get(OP, &file_endpoint(project, path), &[("ref", ref_name)])
    }

    fn raw_file(&self, project: &str, ref_name: &str, path: &str) -> Result<String> {
        const OP: &str = "gitlab.raw_file";
        check_path(OP, path)?;
        let endpoint = format!("{}/raw", file_endpoint(project, path));
        self.get_text(OP, &endpoint, &[("ref", ref_name)])
    }

    fn create_file(
        &self,
        project: &str,
        branch: &str,
        path: &str,
        content: &str,
        message: &str,
    ) -> Result<FileChange> {
        const OP: &str = "gitlab.create_file";
        check_path(OP, path)?;
        let body = WriteFile {
            branch,
            content: Some(content),
            encoding: Some("text"),
            commit_message: message,
        };
        self.post(OP, &file_endpoint(project, path), &body)
    }

    fn update_file(
        &self,
        project: &str,
        branch: &str,
        path: &str,
        content: &str,
        message: &str,
    ) -> Result<()> {
        const OP: &str = "gitlab.update_file";
        check_path(OP, path)?;
        let body = WriteFile {
            branch,
            content: Some(content),
            encoding: Some("text"),
            commit_message: message,
        };
        let _: FileChange = self.put(OP, &file_endpoint(project, path), &body)?;
        Ok(())
    }

    fn delete_file(&self, project: &str, branch: &str, path: &str, message: &str) -> Result<()> {
        const OP: &str = "gitlab.delete_file";
        check_path(OP, path)?;
        let body = WriteFile {
            branch,
            content: None,
            encoding: None,
            commit_message: message,
        };
        self.delete(OP, &file_endpoint(project, path), &body)
    }

    fn tree(&self, project: &str, ref_name: &str, path: Option<&str>) -> Result<Vec<TreeEntry>> {
        let endpoint = format!("/projects/{}/repository/tree", project_segment(project));
        let mut query = vec![("ref", ref_name), ("per_page", "100")];
        if let Some(path) = path {
            query.push(("path", path));
        }
        self.get("gitlab.tree", &endpoint, &query)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_endpoint_encodes_path() {
        assert_eq!(
            file_endpoint("ops/app", "/config/app.yaml"),
            "/projects/ops%2Fapp/repository/files/config%2Fapp.yaml"
        );
    }

    #[test]
    fn test_write_body_omits_content_for_delete() {
        let body = WriteFile {
            branch: "main",
            content: None,
            encoding: None,
            commit_message: "remove",
        };
        let json = serde_json::to_value(&body).unwrap();

        assert_eq!(json, serde_json::json!({"branch": "main", "commit_message": "remove"}));
    }

    #[test]
    fn test_parse_repo_file() {
        let json = r#"{
            "file_name": "app.yaml",
            "file_path": "config/app.yaml",
            "size": 12,
            "encoding": "base64",
            "content": "a2V5OiB2YWx1ZQo=",
            "ref": "main",
            "blob_id": "79f7bbd25901e8334750839545a9bd021f0e4c83",
            "commit_id": "d5a3ff139356ce33e37e73add446f16869741b50",
            "last_commit_id": "570e7b2abdd848b95f2f578043fc23bd6f6fd24d"
        }"#;

        let file: RepoFile = serde_json::from_str(json).unwrap();

        assert_eq!(file.ref_name, "main");
        assert_eq!(file.encoding, "base64");
        assert_eq!(file.size, 12);
    }

    #[test]
    fn test_parse_tree() {
        let json = r#"[
            {"id": "a1e8f8d745cc87e3a9248358d9352bb7f9a0aeba", "name": "config", "type": "tree", "path": "config", "mode": "040000"},
            {"id": "4535904260b1082e14f867f7a24fd8c21495bde3", "name": "README.md", "type": "blob", "path": "README.md", "mode": "100644"}
        ]"#;

        let entries: Vec<TreeEntry> = serde_json::from_str(json).unwrap();

        assert!(entries[0].is_dir());
        assert!(!entries[1].is_dir());
    }

    #[test]
    fn test_empty_path_rejected_before_request() {
        let client = GitLabClient::new("http://127.0.0.1:9", "t");
        assert!(client.raw_file("1", "main", "/").unwrap_err().is_invalid_argument());
    }
}
