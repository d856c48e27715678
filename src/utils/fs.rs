//! Filesystem helpers shared by the loader, router and build pass.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// Join an untrusted, slash-separated suffix onto a base directory.
///
/// Rejects any component that could climb out of `base` (`..`, backslash
/// separators, drive-style colons). Empty and `.` components are dropped.
/// Returns `None` for rejected input; a rejected candidate is treated as
/// not-found by every caller, never as an error.
pub fn safe_join(base: &Path, untrusted: &str) -> Option<PathBuf> {
    let mut joined = base.to_path_buf();
    for part in untrusted.split('/') {
        if part.is_empty() || part == "." {
            continue;
        }
        if part == ".." || part.contains('\\') || part.contains(':') {
            return None;
        }
        joined.push(part);
    }
    Some(joined)
}

/// Copy everything inside `src` into `dst`, recursively, creating `dst`
/// as needed. A missing `src` is a no-op, matching the loader's
/// missing-directory-is-empty rule.
pub fn copy_dir_contents(src: &Path, dst: &Path) -> Result<()> {
    if !src.is_dir() {
        return Ok(());
    }
    fs::create_dir_all(dst).with_context(|| format!("Failed to create {}", dst.display()))?;
    for entry in fs::read_dir(src).with_context(|| format!("Failed to list {}", src.display()))? {
        let entry = entry?;
        let target = dst.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copy_dir_contents(&entry.path(), &target)?;
        } else {
            fs::copy(entry.path(), &target)
                .with_context(|| format!("Failed to copy {}", entry.path().display()))?;
        }
    }
    Ok(())
}
