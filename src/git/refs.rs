//! Resolving HEAD and branch tips by reading ref files directly.
//!
//! No git process is involved: `.git/HEAD` and `.git/refs/heads/<branch>`
//! are plain text, read fresh on every call. Branches missing as loose refs
//! are looked up in `.git/packed-refs`.

use crate::error::{DeployError, Result, ResultExt};
use crate::fs;
use crate::git::{GitDeployer, check_token};
use crate::process::CommandRunner;
use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;

static SYMBOLIC_REF: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"ref:\s(\S+)").expect("invalid regex"));

/// Contents of a ref file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefPointer {
    /// `ref: <path>`, naming another ref relative to the git dir.
    Symbolic(String),
    /// A commit id.
    Id(String),
}

impl RefPointer {
    /// Parses ref file contents; `None` if it is neither form.
    pub fn parse(content: &str) -> Option<Self> {
        if let Some(captures) = SYMBOLIC_REF.captures(content) {
            return Some(Self::Symbolic(captures[1].to_string()));
        }
        let id = content.trim();
        is_object_id(id).then(|| Self::Id(id.to_string()))
    }
}

/// SHA-1 or SHA-256 object id in hex.
fn is_object_id(value: &str) -> bool {
    matches!(value.len(), 40 | 64) && value.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Ref lookups for GitDeployer.
pub trait RefOps {
    /// Commit id that HEAD of `project` points at.
    fn head_commit(&self, project: &str) -> Result<String>;

    /// Commit id at the tip of `branch` in `project`.
    fn branch_commit(&self, project: &str, branch: &str) -> Result<String>;
}

impl<R: CommandRunner> RefOps for GitDeployer<R> {
    fn head_commit(&self, project: &str) -> Result<String> {
        let dir = self.existing_project_dir("git.head", project)?;
        resolve_head(&dir)
    }

    fn branch_commit(&self, project: &str, branch: &str) -> Result<String> {
        check_token("git.branch_head", "branch", branch)?;
        let dir = self.existing_project_dir("git.branch_head", project)?;
        resolve_branch(&dir, branch)
    }
}

/// Resolves HEAD of the working tree at `work_tree`.
///
/// A symbolic HEAD is followed one hop to its target ref; a detached HEAD
/// already holds the id.
pub fn resolve_head(work_tree: &Path) -> Result<String> {
    const OP: &str = "git.head";

    let git_dir = git_dir(OP, work_tree)?;
    let head = git_dir.join("HEAD");
    if !fs::exists(&head) {
        return Err(DeployError::not_found(OP, head));
    }
    let content = std::fs::read_to_string(&head).at(OP)?;

    match RefPointer::parse(&content) {
        Some(RefPointer::Id(id)) => Ok(id),
        Some(RefPointer::Symbolic(target)) => match read_ref(OP, &git_dir, &target)? {
            Some(RefPointer::Id(id)) => Ok(id),
            Some(RefPointer::Symbolic(next)) => Err(DeployError::parse(
                OP,
                format!("{} points at another symbolic ref: {}", target, next),
            )),
            None => Err(DeployError::not_found(OP, git_dir.join(target))),
        },
        None => Err(DeployError::parse(
            OP,
            format!("HEAD is neither a symbolic ref nor a commit id: {:?}", content.trim()),
        )),
    }
}

/// Resolves the tip of `branch` in the working tree at `work_tree`.
pub fn resolve_branch(work_tree: &Path, branch: &str) -> Result<String> {
    const OP: &str = "git.branch_head";

    let git_dir = git_dir(OP, work_tree)?;
    let refname = fs::join_within(Path::new("refs/heads"), branch, OP)?;
    let refname = refname.to_string_lossy();

    match read_ref(OP, &git_dir, &refname)? {
        Some(RefPointer::Id(id)) => Ok(id),
        Some(RefPointer::Symbolic(target)) => Err(DeployError::parse(
            OP,
            format!("branch {} is a symbolic ref to {}", branch, target),
        )),
        None => Err(DeployError::not_found(OP, git_dir.join(&*refname))),
    }
}

fn git_dir(op: &'static str, work_tree: &Path) -> Result<std::path::PathBuf> {
    match fs::is_dir(work_tree) {
        Ok(true) => Ok(work_tree.join(".git")),
        Ok(false) => Err(DeployError::not_found(op, work_tree)),
        Err(e) => Err(DeployError::new(op, e.kind)),
    }
}

/// Reads `refname` as a loose ref, falling back to `packed-refs`.
fn read_ref(op: &'static str, git_dir: &Path, refname: &str) -> Result<Option<RefPointer>> {
    let loose = fs::join_within(git_dir, refname, op)?;
    if fs::exists(&loose) {
        let content = std::fs::read_to_string(&loose).at(op)?;
        return match RefPointer::parse(&content) {
            Some(pointer) => Ok(Some(pointer)),
            None => Err(DeployError::parse(
                op,
                format!("{} does not hold a ref: {:?}", loose.display(), content.trim()),
            )),
        };
    }

    let packed = git_dir.join("packed-refs");
    if !fs::exists(&packed) {
        return Ok(None);
    }
    let content = std::fs::read_to_string(&packed).at(op)?;
    Ok(find_packed_ref(&content, refname).map(|id| RefPointer::Id(id.to_string())))
}

/// Looks up `refname` in `packed-refs` content (`<id> <refname>` lines).
fn find_packed_ref<'a>(content: &'a str, refname: &str) -> Option<&'a str> {
    content
        .lines()
        .filter(|line| !line.starts_with('#') && !line.starts_with('^'))
        .filter_map(|line| line.split_once(' '))
        .find(|(id, name)| *name == refname && is_object_id(id))
        .map(|(id, _)| id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const ID_A: &str = "0123456789abcdef0123456789abcdef01234567";
    const ID_B: &str = "89abcdef0123456789abcdef0123456789abcdef";

    fn repo_with_head(head: &str) -> TempDir {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join(".git/refs/heads")).unwrap();
        std::fs::write(dir.path().join(".git/HEAD"), head).unwrap();
        dir
    }

    #[test]
    fn test_parse_pointer_forms() {
        assert_eq!(
            RefPointer::parse("ref: refs/heads/main\n"),
            Some(RefPointer::Symbolic("refs/heads/main".into()))
        );
        assert_eq!(RefPointer::parse(&format!("{}\n", ID_A)), Some(RefPointer::Id(ID_A.into())));
        assert_eq!(RefPointer::parse("garbage"), None);
        assert_eq!(RefPointer::parse("abc123"), None);
    }

    #[test]
    fn test_resolve_symbolic_head() {
        let dir = repo_with_head("ref: refs/heads/main\n");
        std::fs::write(dir.path().join(".git/refs/heads/main"), format!("{}\n", ID_A)).unwrap();

        assert_eq!(resolve_head(dir.path()).unwrap(), ID_A);
        // Nothing changed, same answer.
        assert_eq!(resolve_head(dir.path()).unwrap(), ID_A);
    }

    #[test]
    fn test_resolve_detached_head() {
        let dir = repo_with_head(&format!("{}\n", ID_B));
        assert_eq!(resolve_head(dir.path()).unwrap(), ID_B);
    }

    #[test]
    fn test_head_garbage_is_parse_error() {
        let dir = repo_with_head("not a ref\n");
        assert!(resolve_head(dir.path()).unwrap_err().is_parse());
    }

    #[test]
    fn test_head_target_missing_is_not_found() {
        let dir = repo_with_head("ref: refs/heads/ghost\n");
        assert!(resolve_head(dir.path()).unwrap_err().is_not_found());
    }

    #[test]
    fn test_missing_work_tree_is_not_found() {
        let dir = TempDir::new().unwrap();
        let err = resolve_head(&dir.path().join("nope")).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_resolve_branch_loose_and_packed() {
        let dir = repo_with_head("ref: refs/heads/main\n");
        std::fs::write(dir.path().join(".git/refs/heads/main"), ID_A).unwrap();
        std::fs::write(
            dir.path().join(".git/packed-refs"),
            format!(
                "# pack-refs with: peeled fully-peeled sorted\n{} refs/heads/release\n^{}\n",
                ID_B, ID_A
            ),
        )
        .unwrap();

        assert_eq!(resolve_branch(dir.path(), "main").unwrap(), ID_A);
        assert_eq!(resolve_branch(dir.path(), "release").unwrap(), ID_B);
        assert!(resolve_branch(dir.path(), "missing").unwrap_err().is_not_found());
    }

    #[test]
    fn test_resolve_branch_with_slash() {
        let dir = repo_with_head("ref: refs/heads/feature/x\n");
        std::fs::create_dir_all(dir.path().join(".git/refs/heads/feature")).unwrap();
        std::fs::write(dir.path().join(".git/refs/heads/feature/x"), ID_B).unwrap();

        assert_eq!(resolve_branch(dir.path(), "feature/x").unwrap(), ID_B);
        assert_eq!(resolve_head(dir.path()).unwrap(), ID_B);
    }

    #[test]
    fn test_branch_escape_rejected() {
        let dir = repo_with_head("ref: refs/heads/main\n");
        assert!(resolve_branch(dir.path(), "../../HEAD").unwrap_err().is_invalid_argument());
    }
}
