// SPDX-License-Identifier: MIT OR Apache-2.0
//! Errors surfaced while launching or terminating a child process.

use std::path::PathBuf;

/// A launch attempt failed before the child reached a running state.
#[derive(Debug, thiserror::Error)]
pub enum LaunchError {
    /// The configured working directory does not exist or is not a directory.
    #[error("working directory {path:?} does not exist or is not a directory")]
    WorkingDir {
        /// The directory that failed validation.
        path: PathBuf,
    },

    /// A log destination could not be opened for appending.
    #[error("failed to open log destination {path:?}")]
    LogOpen {
        /// The log file that could not be opened.
        path: PathBuf,
        /// The underlying filesystem error.
        #[source]
        source: std::io::Error,
    },

    /// The command itself could not be spawned.
    #[error("failed to spawn command {command:?}")]
    Spawn {
        /// The command that failed to start.
        command: String,
        /// The underlying spawn error.
        #[source]
        source: std::io::Error,
    },
}

/// A termination request could not be delivered or did not complete.
#[derive(Debug, thiserror::Error)]
pub enum TerminateError {
    /// The graceful signal could not be sent to the child.
    #[error("failed to signal pid {pid}")]
    Signal {
        /// The process id the signal was aimed at.
        pid: u32,
        /// The underlying error from the signal call.
        #[source]
        source: std::io::Error,
    },

    /// The forceful kill failed or the child never reaped.
    #[error("failed to kill child process")]
    Kill {
        /// The underlying error from the kill call.
        #[source]
        source: std::io::Error,
    },
}
