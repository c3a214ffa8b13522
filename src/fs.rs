//! Filesystem checks and writes used by the deploy workflows.

use crate::error::{DeployError, Result, ResultExt};
use std::fs;
use std::io::Write;
use std::os::unix::fs::{DirBuilderExt, OpenOptionsExt, PermissionsExt};
use std::path::{Component, Path, PathBuf};

/// Default mode for files written by [`write_file`].
pub const DEFAULT_FILE_MODE: u32 = 0o664;

/// Mode for directories created on the way to a written file.
pub const DIR_MODE: u32 = 0o700;

/// Returns whether `path` is a regular file.
///
/// An empty path is an invalid argument and a missing path is not found;
/// an existing directory yields `Ok(false)`.
pub fn is_file(path: &Path) -> Result<bool> {
    Ok(!stat(path, "fs.is_file")?.is_dir())
}

/// Returns whether `path` is a directory.
pub fn is_dir(path: &Path) -> Result<bool> {
    Ok(stat(path, "fs.is_dir")?.is_dir())
}

/// Returns whether anything exists at `path`.
pub fn exists(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok()
}

fn stat(path: &Path, op: &'static str) -> Result<fs::Metadata> {
    if path.as_os_str().is_empty() {
        return Err(DeployError::invalid_argument(op, "empty path"));
    }
    fs::metadata(path).map_err(|_| DeployError::not_found(op, path))
}

/// Writes `content` to `path`, creating parent directories as needed.
///
/// Parents are created with mode `0700`; the file gets `mode` or
/// [`DEFAULT_FILE_MODE`].
pub fn write_file(path: &Path, content: &[u8], mode: Option<u32>) -> Result<()> {
    const OP: &str = "fs.write_file";

    if path.as_os_str().is_empty() {
        return Err(DeployError::invalid_argument(OP, "empty path"));
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        create_dirs(parent).at(OP)?;
    }

    let mode = mode.unwrap_or(DEFAULT_FILE_MODE);
    let mut file = fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(mode)
        .open(path)
        .at(OP)?;
    file.write_all(content).at(OP)?;
    // `mode` only applies on creation; an existing file keeps its bits otherwise.
    file.set_permissions(fs::Permissions::from_mode(mode)).at(OP)?;
    Ok(())
}

/// Creates `dir` and its missing ancestors with mode `0700`.
pub fn create_dirs(dir: &Path) -> std::io::Result<()> {
    fs::DirBuilder::new()
        .recursive(true)
        .mode(DIR_MODE)
        .create(dir)
}

/// Joins a project name onto the deploy root.
///
/// Names must be non-empty relative paths without `..`, so a project can
/// never resolve outside the root.
pub fn project_dir(root: &Path, project: &str) -> Result<PathBuf> {
    join_within(root, project, "fs.project_dir")
}

/// Joins `relative` onto `base`, refusing empty, absolute or `..` paths and
/// paths such as `.` that resolve to `base` itself.
pub fn join_within(base: &Path, relative: &str, op: &'static str) -> Result<PathBuf> {
    if relative.trim().is_empty() {
        return Err(DeployError::invalid_argument(op, "empty path"));
    }
    let rel = Path::new(relative);
    let escapes = rel
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
    let names_nothing = !rel.components().any(|c| matches!(c, Component::Normal(_)));
    if escapes || names_nothing {
        return Err(DeployError::invalid_argument(
            op,
            format!("path must stay inside {}: {}", base.display(), relative),
        ));
    }
    Ok(base.join(rel))
}
