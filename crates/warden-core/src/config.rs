// SPDX-License-Identifier: MIT OR Apache-2.0
//! Supervisor-wide configuration.

use crate::policy::RestartPolicy;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Tunables applied to every process of one supervisor instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupervisorConfig {
    /// Backoff policy for automatic restarts.
    pub restart: RestartPolicy,
    /// Graceful-termination window used by restarts, watch-triggered
    /// restarts, and shutdown. Explicit stop calls pass their own timeout.
    #[serde(with = "crate::serde_duration::duration_millis")]
    pub stop_grace: Duration,
    /// How long a forceful kill may take before it is reported as failed.
    #[serde(with = "crate::serde_duration::duration_millis")]
    pub kill_grace: Duration,
    /// Poll interval for filesystem watching.
    #[serde(with = "crate::serde_duration::duration_millis")]
    pub watch_poll_interval: Duration,
    /// Quiet period after a detected change before the restart fires.
    #[serde(with = "crate::serde_duration::duration_millis")]
    pub watch_debounce: Duration,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            restart: RestartPolicy::default(),
            stop_grace: Duration::from_millis(1600),
            kill_grace: Duration::from_secs(5),
            watch_poll_interval: Duration::from_secs(2),
            watch_debounce: Duration::from_millis(200),
        }
    }
}
