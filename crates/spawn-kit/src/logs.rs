// SPDX-License-Identifier: MIT OR Apache-2.0
//! Log destinations for child stdout and stderr.
//!
//! Destinations are opened in append mode so restarts extend the existing
//! file rather than truncating it. When a spec asks for merged logs the
//! stdout file is opened once and its descriptor cloned for stderr; both
//! streams then share one file description and the kernel keeps their
//! writes ordered.

use std::fs::{File, OpenOptions};
use std::path::Path;
use std::process::Stdio;

use warden_core::ProcessSpec;

use crate::error::LaunchError;

/// Open the stdout and stderr destinations described by `spec`.
///
/// Returns a `(stdout, stderr)` pair ready to hand to the spawned child.
/// A missing path means the stream is discarded.
pub fn open_destinations(spec: &ProcessSpec) -> Result<(Stdio, Stdio), LaunchError> {
    if spec.merge_logs {
        let Some(path) = spec.stdout_path.as_deref().or(spec.stderr_path.as_deref()) else {
            return Ok((Stdio::null(), Stdio::null()));
        };
        let file = open_log_file(path)?;
        let clone = file.try_clone().map_err(|source| LaunchError::LogOpen {
            path: path.to_path_buf(),
            source,
        })?;
        return Ok((Stdio::from(file), Stdio::from(clone)));
    }

    let stdout = stream_destination(spec.stdout_path.as_deref())?;
    let stderr = stream_destination(spec.stderr_path.as_deref())?;
    Ok((stdout, stderr))
}

fn stream_destination(path: Option<&Path>) -> Result<Stdio, LaunchError> {
    match path {
        Some(path) => Ok(Stdio::from(open_log_file(path)?)),
        None => Ok(Stdio::null()),
    }
}

fn open_log_file(path: &Path) -> Result<File, LaunchError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|source| LaunchError::LogOpen {
                path: path.to_path_buf(),
                source,
            })?;
        }
    }
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|source| LaunchError::LogOpen {
            path: path.to_path_buf(),
            source,
        })
}
