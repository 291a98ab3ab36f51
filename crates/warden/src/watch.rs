// SPDX-License-Identifier: MIT OR Apache-2.0
//! Filesystem change detection for watched processes.
//!
//! Polling model: walk the working directory and fold every file's path,
//! size, and mtime into one SHA-256 digest. Two scans produce the same
//! digest iff nothing was added, removed, resized, or touched in between.
//! File contents are never read, so a scan stays cheap on large trees.

use sha2::{Digest, Sha256};
use std::path::Path;
use std::time::UNIX_EPOCH;
use walkdir::WalkDir;

/// Fingerprint the directory tree rooted at `root`.
pub(crate) fn fingerprint(root: &Path) -> std::io::Result<String> {
    let mut hasher = Sha256::new();

    let walker = WalkDir::new(root).follow_links(false).sort_by_file_name();
    for entry in walker {
        let entry = entry.map_err(std::io::Error::other)?;
        if !entry.file_type().is_file() {
            continue;
        }
        let meta = entry.metadata().map_err(std::io::Error::other)?;
        let mtime_nanos = meta
            .modified()
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map_or(0u128, |d| d.as_nanos());

        hasher.update(entry.path().to_string_lossy().as_bytes());
        hasher.update(meta.len().to_le_bytes());
        hasher.update(mtime_nanos.to_le_bytes());
    }

    Ok(format!("{:x}", hasher.finalize()))
}
