// SPDX-License-Identifier: MIT OR Apache-2.0
//! Health signal carried on process snapshots.

use serde::{Deserialize, Serialize};

/// Health of a supervised process.
///
/// Health is orthogonal to [`ProcessState`](crate::ProcessState): a process
/// stuck in a restart loop is `Degraded` yet still supervised, cycling
/// through `Restarting`/`Running` at the backoff cap.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ProcessHealth {
    /// The process is operating normally.
    Healthy,
    /// The process is still supervised but misbehaving.
    Degraded {
        /// Description of the degradation.
        reason: String,
    },
}

impl ProcessHealth {
    /// Shorthand constructor for the degraded variant.
    pub fn degraded(reason: impl Into<String>) -> Self {
        Self::Degraded {
            reason: reason.into(),
        }
    }

    /// Returns `true` if the health signal is degraded.
    pub fn is_degraded(&self) -> bool {
        matches!(self, Self::Degraded { .. })
    }
}

impl Default for ProcessHealth {
    fn default() -> Self {
        Self::Healthy
    }
}
