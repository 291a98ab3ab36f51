// SPDX-License-Identifier: MIT OR Apache-2.0
//! Restart backoff policy.
//!
//! Rapid-crash loops must never trigger immediate relaunch: each consecutive
//! crash doubles the delay before the next attempt, capped at a maximum. A
//! sustained healthy run resets the schedule; repeatedly hitting the cap is
//! surfaced as a degraded-health signal by the runtime.

use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime};

/// Configuration for restart backoff behaviour.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestartPolicy {
    /// Base delay for exponential backoff.
    #[serde(with = "crate::serde_duration::duration_millis")]
    pub base_delay: Duration,
    /// Maximum delay cap for exponential backoff.
    #[serde(with = "crate::serde_duration::duration_millis")]
    pub max_delay: Duration,
    /// Jitter factor in `[0.0, 1.0]`. 0 = no jitter, 1 = full jitter.
    pub jitter_factor: f64,
    /// A run at least this long counts as healthy and resets the schedule.
    #[serde(with = "crate::serde_duration::duration_millis")]
    pub healthy_uptime: Duration,
    /// Consecutive at-cap delays before the process is flagged as looping.
    /// `0` disables loop detection.
    pub loop_threshold: u32,
}

impl Default for RestartPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(15),
            jitter_factor: 0.5,
            healthy_uptime: Duration::from_secs(5),
            loop_threshold: 5,
        }
    }
}

/// Compute the backoff delay for a given zero-indexed attempt number.
pub fn compute_delay(policy: &RestartPolicy, attempt: u32) -> Duration {
    let exp = 2u64.saturating_pow(attempt);
    let delay_ms = (policy.base_delay.as_millis() as u64).saturating_mul(exp);
    let capped_ms = delay_ms.min(policy.max_delay.as_millis() as u64);

    let jitter_factor = policy.jitter_factor.clamp(0.0, 1.0);
    if jitter_factor > 0.0 && capped_ms > 0 {
        let jitter_range = (capped_ms as f64 * jitter_factor) as u64;
        // Cheap pseudo-random: use system-clock nanos mixed with attempt index.
        let nanos = SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .unwrap_or_default()
            .subsec_nanos() as u64;
        let pseudo = nanos.wrapping_mul(attempt as u64 + 1);
        let jitter = if jitter_range > 0 {
            pseudo % jitter_range
        } else {
            0
        };
        // Subtract up to `jitter_range` from the nominal delay.
        Duration::from_millis(capped_ms.saturating_sub(jitter))
    } else {
        Duration::from_millis(capped_ms)
    }
}

/// Tracks the crash streak of one process and produces backoff delays.
///
/// The streak advances on every [`next_delay`](RestartTracker::next_delay)
/// call and resets when [`record_run`](RestartTracker::record_run) observes
/// an uptime of at least `healthy_uptime`, or on [`reset`](RestartTracker::reset)
/// after a deliberate stop.
#[derive(Debug)]
pub struct RestartTracker {
    policy: RestartPolicy,
    streak: u32,
    capped: u32,
}

impl RestartTracker {
    /// Create a tracker with a clean schedule.
    pub fn new(policy: RestartPolicy) -> Self {
        Self {
            policy,
            streak: 0,
            capped: 0,
        }
    }

    /// Record the uptime of the run that just ended.
    ///
    /// Returns `true` when the run was long enough to count as healthy, in
    /// which case the schedule resets.
    pub fn record_run(&mut self, uptime: Duration) -> bool {
        if uptime >= self.policy.healthy_uptime {
            self.streak = 0;
            self.capped = 0;
            true
        } else {
            false
        }
    }

    /// Produce the delay to apply before the next restart attempt and
    /// advance the streak.
    pub fn next_delay(&mut self) -> Duration {
        let nominal_ms = (self.policy.base_delay.as_millis() as u64)
            .saturating_mul(2u64.saturating_pow(self.streak));
        if nominal_ms >= self.policy.max_delay.as_millis() as u64 {
            self.capped = self.capped.saturating_add(1);
        } else {
            self.capped = 0;
        }

        let delay = compute_delay(&self.policy, self.streak);
        self.streak = self.streak.saturating_add(1);
        delay
    }

    /// Returns `true` when the backoff cap has been hit for at least
    /// `loop_threshold` consecutive attempts.
    pub fn looping(&self) -> bool {
        self.policy.loop_threshold > 0 && self.capped >= self.policy.loop_threshold
    }

    /// Consecutive crashes since the last healthy run or reset.
    pub fn streak(&self) -> u32 {
        self.streak
    }

    /// Clear the schedule, as after a deliberate stop.
    pub fn reset(&mut self) {
        self.streak = 0;
        self.capped = 0;
    }
}
