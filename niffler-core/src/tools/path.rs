//! Path validation shared by every file-touching tool (spec §8: "the
//! normalized form contains no `..` segment").

use std::path::{Component, Path, PathBuf};

use crate::error::ToolSourceError;

fn normalize_path(path: &Path) -> PathBuf {
    let mut buf = PathBuf::new();
    for comp in path.components() {
        match comp {
            Component::Prefix(p) => buf = PathBuf::from(p.as_os_str()),
            Component::RootDir => buf.push(comp),
            Component::CurDir => {}
            Component::ParentDir => {
                buf.pop();
            }
            Component::Normal(s) => buf.push(s),
        }
    }
    buf
}

/// Resolves `path_param` under `root`, rejecting any result that would
/// escape `root` once `.`/`..` segments are normalized away. Returns the
/// canonical path if it exists on disk, otherwise the normalized (but
/// unresolved-symlink) path so creation tools can still validate a
/// not-yet-existing target.
pub fn resolve_path_under(root: &Path, path_param: &str) -> Result<PathBuf, ToolSourceError> {
    let root_canonical = root.canonicalize().map_err(|e| {
        ToolSourceError::PathSafety(format!("working directory not found: {e}"))
    })?;

    let path_param = path_param.trim();
    let path_param = if path_param.is_empty() { "." } else { path_param };
    let joined = root_canonical.join(path_param);
    let normalized = normalize_path(&joined);

    if !normalized.starts_with(&root_canonical) {
        return Err(ToolSourceError::PathSafety(format!(
            "path escapes working directory: {path_param}"
        )));
    }

    if normalized.exists() {
        normalized
            .canonicalize()
            .map_err(|e| ToolSourceError::Execution(format!("failed to resolve path: {e}")))
    } else {
        Ok(normalized)
    }
}

/// Relative-path form of a resolved path under `root`, used to key
/// plan-mode's `createdFiles` set (spec §3 `ModeState`).
pub fn relative_to(root: &Path, path: &Path) -> PathBuf {
    path.strip_prefix(root).unwrap_or(path).to_path_buf()
}
