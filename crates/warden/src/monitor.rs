// SPDX-License-Identifier: MIT OR Apache-2.0
//! The per-process monitor task.
//!
//! Every supervised process is driven by exactly one monitor task, spawned
//! when the process is registered. The task owns the mutable
//! [`ProcessHandle`] (single-writer discipline by confinement) and publishes
//! read-only snapshots through a watch channel after every change. Control
//! requests arrive over an mpsc channel and answer on oneshot replies, so
//! both the stop timeout and the restart backoff are waits the caller can
//! interrupt.

use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{Instant, Interval};
use tracing::{debug, info, warn};

use spawn_kit::{ChildProcess, TerminateError};
use warden_core::{
    ExitStatus, ProcessHandle, ProcessHealth, ProcessSnapshot, ProcessSpec, ProcessState,
    RestartTracker, SupervisorConfig,
};

use crate::error::SupervisorError;
use crate::watch::fingerprint;

/// Control requests a monitor task accepts from the supervisor.
#[derive(Debug)]
pub(crate) enum Control {
    /// Stop the child and keep it stopped.
    Stop {
        /// Graceful-termination window; `None` uses the configured default.
        grace: Option<Duration>,
        reply: oneshot::Sender<Result<(), SupervisorError>>,
    },
    /// Stop the child if running, then start it again.
    Restart {
        reply: oneshot::Sender<Result<(), SupervisorError>>,
    },
    /// Stop the child and end the monitor task.
    Shutdown {
        reply: oneshot::Sender<Result<(), SupervisorError>>,
    },
}

/// What the monitor does next.
enum Phase {
    /// A child is alive and being awaited.
    Supervise(ChildProcess),
    /// Waiting out a restart delay before relaunching.
    Backoff(Duration),
    /// No child and no pending relaunch; waiting for control requests.
    Idle,
    /// The monitor is finished and the task exits.
    Done,
}

/// Events observed while a child is alive. `select!` produces one of these
/// so the child can be borrowed again once the racing futures are dropped.
enum Event {
    Exited(std::io::Result<ExitStatus>),
    Control(Option<Control>),
    WatchTick,
}

/// Next watch-poll tick; pends forever when the tree is not watched.
async fn next_tick(poll: &mut Option<Interval>) {
    match poll {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

pub(crate) struct Monitor {
    spec: ProcessSpec,
    config: SupervisorConfig,
    handle: ProcessHandle,
    tracker: RestartTracker,
    snapshots: watch::Sender<ProcessSnapshot>,
    control: mpsc::Receiver<Control>,
    /// Fingerprint of the watched tree, rescanned at every launch.
    tree: Option<String>,
    /// When the current child was launched.
    started: Option<Instant>,
}

impl Monitor {
    pub(crate) fn new(
        spec: ProcessSpec,
        config: SupervisorConfig,
        handle: ProcessHandle,
        snapshots: watch::Sender<ProcessSnapshot>,
        control: mpsc::Receiver<Control>,
    ) -> Self {
        let tracker = RestartTracker::new(config.restart.clone());
        Self {
            spec,
            config,
            handle,
            tracker,
            snapshots,
            control,
            tree: None,
            started: None,
        }
    }

    /// Drive the process until it is shut down or the supervisor goes away.
    ///
    /// The result of the first launch is reported through `ready` so the
    /// caller can surface launch errors from `start` itself.
    pub(crate) async fn run(mut self, ready: oneshot::Sender<Result<(), SupervisorError>>) {
        let mut phase = match self.launch("initial start") {
            Ok(child) => {
                let _ = ready.send(Ok(()));
                Phase::Supervise(child)
            }
            Err(err) => {
                let _ = ready.send(Err(err));
                return;
            }
        };

        loop {
            phase = match phase {
                Phase::Supervise(child) => self.supervise(child).await,
                Phase::Backoff(delay) => self.backoff(delay).await,
                Phase::Idle => self.idle().await,
                Phase::Done => break,
            };
        }
        debug!(target: "warden.monitor", name = %self.spec.name, "monitor task finished");
    }

    /// Transition to `Starting` and spawn the child.
    fn launch(&mut self, reason: &str) -> Result<ChildProcess, SupervisorError> {
        self.apply(ProcessState::Starting, reason);
        if self.spec.watch {
            // Baseline for change detection, taken before the child runs.
            self.tree = match fingerprint(&self.spec.working_dir) {
                Ok(digest) => Some(digest),
                Err(err) => {
                    warn!(target: "warden.watch", name = %self.spec.name, error = %err, "baseline scan failed");
                    None
                }
            };
        }

        match ChildProcess::spawn(&self.spec) {
            Ok(child) => {
                if let Err(err) = self.handle.mark_running(child.pid()) {
                    debug_assert!(false, "running transition refused: {err}");
                    warn!(target: "warden.monitor", name = %self.spec.name, error = %err, "refused state transition");
                }
                self.started = Some(Instant::now());
                self.publish();
                info!(target: "warden.monitor", name = %self.spec.name, pid = child.pid(), "process started");
                Ok(child)
            }
            Err(err) => {
                warn!(target: "warden.monitor", name = %self.spec.name, error = %err, "launch failed");
                self.apply(ProcessState::Crashed, "launch failed");
                Err(SupervisorError::Launch(err))
            }
        }
    }

    /// Wait on the running child, the control channel, and the watch poll.
    async fn supervise(&mut self, mut child: ChildProcess) -> Phase {
        let mut poll = self.watch_poll();

        loop {
            let event = tokio::select! {
                exit = child.wait() => Event::Exited(exit),
                msg = self.control.recv() => Event::Control(msg),
                _ = next_tick(&mut poll) => Event::WatchTick,
            };

            match event {
                Event::Exited(Ok(exit)) => return self.on_exit(exit),
                Event::Exited(Err(err)) => {
                    warn!(target: "warden.monitor", name = %self.spec.name, error = %err, "wait on child failed");
                    return self.on_exit(ExitStatus {
                        code: None,
                        signal: None,
                    });
                }

                Event::Control(Some(Control::Stop { grace, reply })) => {
                    let grace = grace.unwrap_or(self.config.stop_grace);
                    match self.stop_child(&mut child, grace, "stop requested").await {
                        Ok(()) => {
                            self.apply(ProcessState::Stopped, "stop requested");
                            self.tracker.reset();
                            let _ = reply.send(Ok(()));
                            return Phase::Idle;
                        }
                        Err(err) => {
                            // The child survived the kill; keep supervising it.
                            let _ = reply.send(Err(err));
                        }
                    }
                }
                Event::Control(Some(Control::Restart { reply })) => {
                    match self
                        .stop_child(&mut child, self.config.stop_grace, "restart requested")
                        .await
                    {
                        Ok(()) => return self.relaunch("restart requested", reply),
                        Err(err) => {
                            let _ = reply.send(Err(err));
                        }
                    }
                }
                Event::Control(Some(Control::Shutdown { reply })) => {
                    let result = self
                        .stop_child(&mut child, self.config.stop_grace, "shutdown")
                        .await;
                    if result.is_ok() {
                        self.apply(ProcessState::Stopped, "shutdown");
                    }
                    let _ = reply.send(result);
                    return Phase::Done;
                }
                Event::Control(None) => {
                    // Supervisor dropped without shutdown; do not leak the child.
                    debug!(target: "warden.monitor", name = %self.spec.name, "control channel closed; stopping child");
                    let result = self
                        .stop_child(&mut child, self.config.stop_grace, "supervisor dropped")
                        .await;
                    if result.is_ok() {
                        self.apply(ProcessState::Stopped, "supervisor dropped");
                    }
                    return Phase::Done;
                }

                Event::WatchTick => {
                    if !self.tree_changed() {
                        continue;
                    }
                    info!(target: "warden.watch", name = %self.spec.name, "watched tree changed; restarting");
                    // Quiet period so a burst of writes lands as one restart.
                    tokio::time::sleep(self.config.watch_debounce).await;
                    match self
                        .stop_child(&mut child, self.config.stop_grace, "watched tree changed")
                        .await
                    {
                        Ok(()) => {
                            let (reply, _seen) = oneshot::channel();
                            return self.relaunch("watched tree changed", reply);
                        }
                        Err(err) => {
                            // Old fingerprint is kept, so the next tick retries.
                            warn!(target: "warden.watch", name = %self.spec.name, error = %err, "stop for watch restart failed");
                        }
                    }
                }
            }
        }
    }

    /// Deliberate relaunch after a completed stop: counts as a restart,
    /// resets the backoff schedule, and reports the launch result.
    fn relaunch(
        &mut self,
        reason: &str,
        reply: oneshot::Sender<Result<(), SupervisorError>>,
    ) -> Phase {
        self.handle.increment_restart();
        self.apply(ProcessState::Restarting, reason);
        self.tracker.reset();
        match self.launch(reason) {
            Ok(child) => {
                let _ = reply.send(Ok(()));
                Phase::Supervise(child)
            }
            Err(err) => {
                let _ = reply.send(Err(err));
                Phase::Idle
            }
        }
    }

    /// Decide what follows a child exit the monitor did not request.
    fn on_exit(&mut self, exit: ExitStatus) -> Phase {
        self.handle.record_exit(exit);
        let uptime = self
            .started
            .take()
            .map_or(Duration::ZERO, |since| since.elapsed());

        // A stop was already in flight (its kill path failed); the late
        // exit completes that stop instead of triggering a relaunch.
        if matches!(self.handle.state(), ProcessState::Stopping) {
            info!(target: "warden.monitor", name = %self.spec.name, exit = %exit, "process stopped");
            self.apply(ProcessState::Stopped, "deliberate stop completed");
            self.tracker.reset();
            return Phase::Idle;
        }

        if self.spec.autorestart {
            if self.tracker.record_run(uptime) && self.handle.health().is_degraded() {
                info!(target: "warden.monitor", name = %self.spec.name, "healthy run completed; clearing degraded state");
                self.handle.set_health(ProcessHealth::Healthy);
            }
            let delay = self.tracker.next_delay();
            if self.tracker.looping() {
                let streak = self.tracker.streak();
                warn!(target: "warden.monitor", name = %self.spec.name, streak, "restart loop detected; attempts throttled at the backoff cap");
                self.handle.set_health(ProcessHealth::degraded(format!(
                    "restart loop: {streak} rapid exits in a row"
                )));
            }
            self.handle.increment_restart();
            warn!(
                target: "warden.monitor",
                name = %self.spec.name,
                exit = %exit,
                uptime_ms = uptime.as_millis() as u64,
                delay_ms = delay.as_millis() as u64,
                "process exited; relaunching after backoff"
            );
            self.apply(ProcessState::Restarting, "relaunch after exit");
            return Phase::Backoff(delay);
        }

        if exit.success() {
            info!(target: "warden.monitor", name = %self.spec.name, "process exited cleanly");
            self.apply(ProcessState::Stopped, "clean exit");
        } else {
            warn!(target: "warden.monitor", name = %self.spec.name, exit = %exit, "process crashed");
            self.apply(ProcessState::Crashed, "abnormal exit");
        }
        Phase::Idle
    }

    /// Wait out the backoff delay, unless a control request cuts it short.
    async fn backoff(&mut self, delay: Duration) -> Phase {
        debug!(target: "warden.monitor", name = %self.spec.name, delay_ms = delay.as_millis() as u64, "backing off before relaunch");
        let sleep = tokio::time::sleep(delay);
        tokio::pin!(sleep);

        tokio::select! {
            _ = &mut sleep => {
                match self.launch("relaunch after backoff") {
                    Ok(child) => Phase::Supervise(child),
                    Err(_) => {
                        // Nobody is listening for this launch result; flag it
                        // on the snapshot instead.
                        self.handle
                            .set_health(ProcessHealth::degraded("relaunch failed"));
                        self.publish();
                        Phase::Idle
                    }
                }
            }
            msg = self.control.recv() => match msg {
                Some(Control::Stop { reply, .. }) => {
                    self.apply(ProcessState::Stopped, "stop requested during backoff");
                    self.tracker.reset();
                    let _ = reply.send(Ok(()));
                    Phase::Idle
                }
                Some(Control::Restart { reply }) => {
                    // Skip the remaining delay.
                    self.tracker.reset();
                    match self.launch("restart requested") {
                        Ok(child) => {
                            let _ = reply.send(Ok(()));
                            Phase::Supervise(child)
                        }
                        Err(err) => {
                            let _ = reply.send(Err(err));
                            Phase::Idle
                        }
                    }
                }
                Some(Control::Shutdown { reply }) => {
                    self.apply(ProcessState::Stopped, "shutdown during backoff");
                    let _ = reply.send(Ok(()));
                    Phase::Done
                }
                None => {
                    // Supervisor dropped; cancel the pending relaunch.
                    self.apply(ProcessState::Stopped, "supervisor dropped");
                    Phase::Done
                }
            },
        }
    }

    /// No child and nothing pending; wait for control requests.
    async fn idle(&mut self) -> Phase {
        match self.control.recv().await {
            Some(Control::Stop { reply, .. }) => {
                // Already stopped or crashed; stopping again is a no-op.
                let _ = reply.send(Ok(()));
                Phase::Idle
            }
            Some(Control::Restart { reply }) => {
                self.handle.increment_restart();
                self.tracker.reset();
                match self.launch("restart requested") {
                    Ok(child) => {
                        let _ = reply.send(Ok(()));
                        Phase::Supervise(child)
                    }
                    Err(err) => {
                        let _ = reply.send(Err(err));
                        Phase::Idle
                    }
                }
            }
            Some(Control::Shutdown { reply }) => {
                let _ = reply.send(Ok(()));
                Phase::Done
            }
            None => Phase::Done,
        }
    }

    /// Graceful-then-forceful termination of the running child.
    ///
    /// Applies `Stopping`, delivers the graceful signal, and waits up to
    /// `grace` for the exit; past that the child is killed outright. Err is
    /// returned only when the forceful path itself fails, in which case the
    /// child must be assumed alive.
    async fn stop_child(
        &mut self,
        child: &mut ChildProcess,
        grace: Duration,
        reason: &str,
    ) -> Result<(), SupervisorError> {
        // Already Stopping when an earlier stop attempt failed and the
        // caller retries.
        if !matches!(self.handle.state(), ProcessState::Stopping) {
            self.apply(ProcessState::Stopping, reason);
        }

        if let Err(err) = child.terminate() {
            warn!(target: "warden.monitor", name = %self.spec.name, error = %err, "graceful signal failed; escalating");
        }

        let exit = match tokio::time::timeout(grace, child.wait()).await {
            Ok(Ok(exit)) => exit,
            Ok(Err(err)) => {
                warn!(target: "warden.monitor", name = %self.spec.name, error = %err, "wait failed during stop");
                ExitStatus {
                    code: None,
                    signal: None,
                }
            }
            Err(_elapsed) => {
                warn!(
                    target: "warden.monitor",
                    name = %self.spec.name,
                    grace_ms = grace.as_millis() as u64,
                    "graceful stop timed out; killing"
                );
                match tokio::time::timeout(self.config.kill_grace, child.kill()).await {
                    Ok(Ok(exit)) => exit,
                    Ok(Err(source)) => {
                        return Err(SupervisorError::StopTimeout {
                            name: self.spec.name.clone(),
                            source,
                        });
                    }
                    Err(_elapsed) => {
                        return Err(SupervisorError::StopTimeout {
                            name: self.spec.name.clone(),
                            source: TerminateError::Kill {
                                source: std::io::Error::new(
                                    std::io::ErrorKind::TimedOut,
                                    "forceful kill did not complete in time",
                                ),
                            },
                        });
                    }
                }
            }
        };

        self.handle.record_exit(exit);
        self.started = None;
        info!(target: "warden.monitor", name = %self.spec.name, exit = %exit, "process stopped");
        Ok(())
    }

    /// Poll ticker for the watched tree, absent when the spec does not
    /// watch. The period is floored at one millisecond; the runtime timer
    /// refuses zero.
    fn watch_poll(&self) -> Option<Interval> {
        if !self.spec.watch {
            return None;
        }
        let period = self
            .config
            .watch_poll_interval
            .max(Duration::from_millis(1));
        Some(tokio::time::interval_at(Instant::now() + period, period))
    }

    /// Rescan the watched tree; `true` when the fingerprint moved.
    fn tree_changed(&self) -> bool {
        match fingerprint(&self.spec.working_dir) {
            Ok(current) => self
                .tree
                .as_deref()
                .is_some_and(|baseline| baseline != current),
            Err(err) => {
                warn!(target: "warden.watch", name = %self.spec.name, error = %err, "scan failed; keeping previous fingerprint");
                false
            }
        }
    }

    /// Apply a state transition and publish. The monitor is the only
    /// writer, so a refused transition is a bug in the phase logic.
    fn apply(&mut self, to: ProcessState, reason: &str) {
        if let Err(err) = self.handle.transition(to, Some(reason.to_string())) {
            debug_assert!(false, "monitor drove an invalid transition: {err}");
            warn!(target: "warden.monitor", name = %self.spec.name, error = %err, "refused state transition");
            return;
        }
        self.publish();
    }

    /// Push the current handle state to every snapshot observer.
    fn publish(&self) {
        self.snapshots.send_replace(self.handle.snapshot());
    }
}
