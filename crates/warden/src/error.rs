// SPDX-License-Identifier: MIT OR Apache-2.0
//! Errors from supervisor operations.

use spawn_kit::{LaunchError, TerminateError};
use thiserror::Error;

/// Errors surfaced by [`Supervisor`](crate::Supervisor) operations.
///
/// A crash of a supervised process is never an error; crashes show up as
/// state transitions on the snapshot. Errors are reserved for requests the
/// supervisor could not carry out.
#[derive(Debug, Error)]
pub enum SupervisorError {
    /// The process could not be launched.
    #[error("failed to launch process: {0}")]
    Launch(#[from] LaunchError),

    /// Another process is already registered under this name.
    #[error("a process named {0:?} is already supervised")]
    NameTaken(String),

    /// No process is registered under this name.
    #[error("no supervised process named {0:?}")]
    UnknownProcess(String),

    /// Forceful termination failed; the process may still be running.
    #[error("process {name:?} did not terminate")]
    StopTimeout {
        /// Name of the process that refused to die.
        name: String,
        /// Why the forceful path failed.
        #[source]
        source: TerminateError,
    },

    /// The process's monitor task has already ended.
    #[error("supervision of {0:?} has ended")]
    Shutdown(String),
}
