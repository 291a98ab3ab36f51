// SPDX-License-Identifier: MIT OR Apache-2.0
//! Mutable per-process runtime record and its read-only snapshot form.

use crate::health::ProcessHealth;
use crate::state::{ProcessState, StateError, StateTransition};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Maximum number of transitions retained in a handle's history.
const HISTORY_LIMIT: usize = 64;

/// How a process most recently terminated.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExitStatus {
    /// Exit code, when the process exited on its own.
    pub code: Option<i32>,
    /// Terminating signal number, when the process was killed by a signal.
    pub signal: Option<i32>,
}

impl ExitStatus {
    /// Returns `true` for a clean exit (code zero).
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// Returns `true` if the process was terminated by a signal.
    pub fn signaled(&self) -> bool {
        self.signal.is_some()
    }
}

impl fmt::Display for ExitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.code, self.signal) {
            (Some(code), _) => write!(f, "exit code {code}"),
            (None, Some(signal)) => write!(f, "terminated by signal {signal}"),
            (None, None) => f.write_str("unknown exit"),
        }
    }
}

impl From<std::process::ExitStatus> for ExitStatus {
    fn from(status: std::process::ExitStatus) -> Self {
        #[cfg(unix)]
        let signal = {
            use std::os::unix::process::ExitStatusExt;
            status.signal()
        };
        #[cfg(not(unix))]
        let signal = None;

        Self {
            code: status.code(),
            signal,
        }
    }
}

/// Read-only copy of a handle's current state fields.
///
/// Snapshots are what the supervisor publishes to callers; they are cheap to
/// clone and safe to hold across await points.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProcessSnapshot {
    /// Name of the supervised process.
    pub name: String,
    /// Current supervision state.
    pub state: ProcessState,
    /// OS pid, present iff the state allows one.
    pub pid: Option<u32>,
    /// Most recent termination, if any.
    pub exit: Option<ExitStatus>,
    /// Number of automatic restarts performed so far.
    pub restart_count: u32,
    /// When the process was last launched.
    pub last_started_at: Option<DateTime<Utc>>,
    /// When the process last terminated.
    pub last_exited_at: Option<DateTime<Utc>>,
    /// Health signal (degraded on restart loops).
    pub health: ProcessHealth,
}

impl ProcessSnapshot {
    /// Returns `true` if the process is currently running.
    pub fn is_running(&self) -> bool {
        matches!(self.state, ProcessState::Running)
    }

    /// Returns `true` if the process is settled in a terminal state.
    pub fn is_terminated(&self) -> bool {
        self.state.is_terminal()
    }
}

/// Mutable runtime record for one supervised process.
///
/// Exactly one handle exists per spec; ownership is confined to the process's
/// monitor task, which is the single writer. Everyone else observes the
/// handle through [`ProcessSnapshot`] copies.
#[derive(Debug)]
pub struct ProcessHandle {
    name: String,
    state: ProcessState,
    pid: Option<u32>,
    exit: Option<ExitStatus>,
    restart_count: u32,
    last_started_at: Option<DateTime<Utc>>,
    last_exited_at: Option<DateTime<Utc>>,
    health: ProcessHealth,
    history: Vec<StateTransition>,
}

impl ProcessHandle {
    /// Create a handle in the [`ProcessState::Stopped`] state.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: ProcessState::Stopped,
            pid: None,
            exit: None,
            restart_count: 0,
            last_started_at: None,
            last_exited_at: None,
            health: ProcessHealth::Healthy,
            history: Vec::new(),
        }
    }

    /// Name of the supervised process.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current supervision state.
    pub fn state(&self) -> &ProcessState {
        &self.state
    }

    /// Current pid, present iff the state allows one.
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Number of automatic restarts performed so far.
    pub fn restart_count(&self) -> u32 {
        self.restart_count
    }

    /// Current health signal.
    pub fn health(&self) -> &ProcessHealth {
        &self.health
    }

    /// History of state transitions, oldest first, capped at a fixed length.
    pub fn history(&self) -> &[StateTransition] {
        &self.history
    }

    /// Attempt to transition to a new state.
    ///
    /// On success the transition is recorded in the history and the pid is
    /// cleared whenever the target state does not allow one.
    pub fn transition(
        &mut self,
        to: ProcessState,
        reason: Option<String>,
    ) -> Result<(), StateError> {
        if self.state == to {
            return Err(StateError::AlreadyInState(to));
        }
        if !self.state.can_transition(&to) {
            return Err(StateError::InvalidTransition {
                from: self.state.clone(),
                to,
            });
        }

        let from = self.state.clone();
        self.state = to.clone();
        if !self.state.allows_pid() {
            self.pid = None;
        }

        self.history.push(StateTransition {
            from,
            to,
            timestamp: Utc::now().to_rfc3339(),
            reason,
        });
        if self.history.len() > HISTORY_LIMIT {
            self.history.remove(0);
        }

        Ok(())
    }

    /// Transition to `Running` and record the launched process's pid.
    pub fn mark_running(&mut self, pid: u32) -> Result<(), StateError> {
        self.transition(ProcessState::Running, None)?;
        self.pid = Some(pid);
        self.last_started_at = Some(Utc::now());
        Ok(())
    }

    /// Record the most recent termination. Does not change state.
    pub fn record_exit(&mut self, exit: ExitStatus) {
        self.exit = Some(exit);
        self.last_exited_at = Some(Utc::now());
    }

    /// Count one automatic restart attempt.
    pub fn increment_restart(&mut self) {
        self.restart_count = self.restart_count.saturating_add(1);
    }

    /// Replace the health signal.
    pub fn set_health(&mut self, health: ProcessHealth) {
        self.health = health;
    }

    /// Produce a read-only copy of the current state fields.
    pub fn snapshot(&self) -> ProcessSnapshot {
        ProcessSnapshot {
            name: self.name.clone(),
            state: self.state.clone(),
            pid: self.pid,
            exit: self.exit,
            restart_count: self.restart_count,
            last_started_at: self.last_started_at,
            last_exited_at: self.last_exited_at,
            health: self.health.clone(),
        }
    }
}
