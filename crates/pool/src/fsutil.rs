// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Small filesystem helpers for host-side volume management.
//!
//! All helpers are idempotent: missing sources and targets are
//! tolerated where the caller's operation is logically a no-op.

use std::io;
use std::path::Path;

use tracing::warn;

/// Recursively copy the *contents* of `src` into `dst`, overwriting
/// existing files. A missing `src` is a no-op.
pub fn copy_tree(src: &Path, dst: &Path) -> io::Result<()> {
    if !src.exists() {
        return Ok(());
    }
    std::fs::create_dir_all(dst)?;
    for entry in std::fs::read_dir(src)? {
        let entry = entry?;
        let target = dst.join(entry.file_name());
        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            copy_tree(&entry.path(), &target)?;
        } else if file_type.is_file() {
            std::fs::copy(entry.path(), &target)?;
        }
        // Symlinks in seed directories are skipped: a link escaping the
        // seed tree must not end up inside a tenant volume.
    }
    Ok(())
}

/// Recursively chown to `uid` (group = uid). Best effort: rootless
/// setups cannot chown to foreign uids, and the workload still runs.
pub fn chown_tree(path: &Path, uid: u32) {
    fn walk(path: &Path, uid: u32) -> io::Result<()> {
        std::os::unix::fs::chown(path, Some(uid), Some(uid))?;
        if path.is_dir() {
            for entry in std::fs::read_dir(path)? {
                walk(&entry?.path(), uid)?;
            }
        }
        Ok(())
    }
    if let Err(e) = walk(path, uid) {
        warn!(path = %path.display(), uid, error = %e, "chown failed");
    }
}

/// Remove a directory tree, tolerating absence.
pub fn remove_dir_if_exists(path: &Path) -> io::Result<()> {
    match std::fs::remove_dir_all(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
#[path = "fsutil_tests.rs"]
mod tests;
