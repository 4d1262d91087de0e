//! Forward-slash path handling.
//!
//! Both the decoder's raw entries and our canonical paths use `/` whatever
//! the host OS is. These helpers turn them into host paths below a base
//! directory, one component at a time, so a stray leading `/` can never
//! turn the join into an absolute path.

use crate::error::{IoContext, PakError, Result};
use std::path::{Path, PathBuf};

/// Split a slash path into its meaningful components.
///
/// Empty and `.` segments are dropped; `..` is refused.
pub fn components(path: &str) -> Result<Vec<&str>> {
    let mut parts = Vec::new();
    for part in path.split(['/', '\\']) {
        match part {
            "" | "." => continue,
            ".." => return Err(PakError::EscapingPath(path.to_string())),
            _ => parts.push(part),
        }
    }
    Ok(parts)
}

/// Join a forward-slash relative path onto `base`.
pub fn join_slash_path(base: &Path, relative: &str) -> Result<PathBuf> {
    let mut joined = base.to_path_buf();
    joined.extend(components(relative)?);
    Ok(joined)
}

/// Create parent directories for a path if they don't exist
pub fn ensure_parent_dirs(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.exists() {
            std::fs::create_dir_all(parent).at(parent)?;
        }
    }
    Ok(())
}
