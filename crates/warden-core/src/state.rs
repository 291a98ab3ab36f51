// SPDX-License-Identifier: MIT OR Apache-2.0
//! Supervision state machine: the states a process moves through and the
//! transitions the supervisor accepts.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Supervision state of a managed process.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessState {
    /// The process is not running: never started, cleanly exited, or
    /// deliberately stopped.
    Stopped,
    /// The process is being launched.
    Starting,
    /// The process is running under supervision.
    Running,
    /// A deliberate stop is in progress; the process has been signalled.
    Stopping,
    /// The process terminated abnormally and will not be relaunched until an
    /// explicit restart.
    Crashed,
    /// The process exited and a relaunch is pending (backoff may apply).
    Restarting,
}

impl fmt::Display for ProcessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Stopped => "stopped",
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Stopping => "stopping",
            Self::Crashed => "crashed",
            Self::Restarting => "restarting",
        };
        f.write_str(s)
    }
}

impl ProcessState {
    /// Returns `true` if transitioning from `self` to `to` is valid.
    pub fn can_transition(&self, to: &ProcessState) -> bool {
        matches!(
            (self, to),
            (ProcessState::Stopped, ProcessState::Starting)
                | (ProcessState::Crashed, ProcessState::Starting)
                | (ProcessState::Starting, ProcessState::Running)
                | (ProcessState::Starting, ProcessState::Crashed)
                | (ProcessState::Running, ProcessState::Stopping)
                | (ProcessState::Running, ProcessState::Restarting)
                | (ProcessState::Running, ProcessState::Crashed)
                | (ProcessState::Running, ProcessState::Stopped)
                | (ProcessState::Stopping, ProcessState::Stopped)
                | (ProcessState::Stopping, ProcessState::Restarting)
                | (ProcessState::Restarting, ProcessState::Starting)
                | (ProcessState::Restarting, ProcessState::Stopped)
        )
    }

    /// Returns `true` if an OS pid may be associated with this state.
    pub fn allows_pid(&self) -> bool {
        matches!(self, ProcessState::Running | ProcessState::Stopping)
    }

    /// Returns `true` for states that persist until an explicit restart.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ProcessState::Stopped | ProcessState::Crashed)
    }
}

/// Record of a single state transition.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StateTransition {
    /// State before the transition.
    pub from: ProcessState,
    /// State after the transition.
    pub to: ProcessState,
    /// ISO-8601 timestamp of when the transition occurred.
    pub timestamp: String,
    /// Optional human-readable reason for the transition.
    pub reason: Option<String>,
}

/// Errors produced when a requested transition is invalid.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StateError {
    /// The requested transition is not allowed by the state machine.
    InvalidTransition {
        /// Current state.
        from: ProcessState,
        /// Requested target state.
        to: ProcessState,
    },
    /// The handle is already in the requested state.
    AlreadyInState(ProcessState),
}

impl fmt::Display for StateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidTransition { from, to } => {
                write!(f, "invalid state transition from {from} to {to}")
            }
            Self::AlreadyInState(s) => write!(f, "already in state {s}"),
        }
    }
}

impl std::error::Error for StateError {}
