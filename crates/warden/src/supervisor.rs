// SPDX-License-Identifier: MIT OR Apache-2.0
//! The supervisor: a registry of named processes and the operations on them.

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use warden_core::{ProcessHandle, ProcessSnapshot, ProcessSpec, ProcessState, SupervisorConfig};

use crate::error::SupervisorError;
use crate::monitor::{Control, Monitor};

/// Capacity of each monitor's control channel. Requests beyond this apply
/// backpressure on the caller.
const CONTROL_QUEUE: usize = 8;

/// One registered process: the way in (control) and the way out (snapshots).
#[derive(Debug)]
struct ProcessEntry {
    control: mpsc::Sender<Control>,
    snapshots: watch::Receiver<ProcessSnapshot>,
    task: JoinHandle<()>,
}

/// Caller-side reference to one supervised process.
///
/// Cheap to clone; reading a snapshot never blocks on process I/O.
#[derive(Debug, Clone)]
pub struct ProcessRef {
    name: String,
    snapshots: watch::Receiver<ProcessSnapshot>,
}

impl ProcessRef {
    /// Name of the supervised process.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Latest published snapshot.
    pub fn snapshot(&self) -> ProcessSnapshot {
        self.snapshots.borrow().clone()
    }

    /// Wait for the next published snapshot after the last one seen by this
    /// reference.
    pub async fn changed(&mut self) -> Result<ProcessSnapshot, SupervisorError> {
        self.snapshots
            .changed()
            .await
            .map_err(|_| SupervisorError::Shutdown(self.name.clone()))?;
        Ok(self.snapshots.borrow_and_update().clone())
    }

    /// Wait until a published snapshot satisfies `predicate`, returning it.
    /// Resolves immediately when the current snapshot already does.
    ///
    /// Intermediate snapshots can be skipped when they are published faster
    /// than the caller observes them, so the predicate should describe a
    /// condition that persists (a settled state, a count threshold).
    pub async fn wait_for(
        &mut self,
        predicate: impl FnMut(&ProcessSnapshot) -> bool,
    ) -> Result<ProcessSnapshot, SupervisorError> {
        let snap = self
            .snapshots
            .wait_for(predicate)
            .await
            .map_err(|_| SupervisorError::Shutdown(self.name.clone()))?;
        Ok(snap.clone())
    }

    /// Wait until the process is in the given state, returning the snapshot
    /// that satisfied it.
    pub async fn wait_for_state(
        &mut self,
        state: ProcessState,
    ) -> Result<ProcessSnapshot, SupervisorError> {
        self.wait_for(move |snap| snap.state == state).await
    }
}

/// Supervises a set of named processes.
///
/// Each call to [`start`](Supervisor::start) spawns a dedicated monitor task
/// that owns the process for its whole life. The supervisor itself only
/// routes requests and reads published snapshots, so no operation on one
/// process can block another.
#[derive(Debug)]
pub struct Supervisor {
    config: SupervisorConfig,
    registry: Mutex<BTreeMap<String, ProcessEntry>>,
}

impl Default for Supervisor {
    fn default() -> Self {
        Self::new(SupervisorConfig::default())
    }
}

impl Supervisor {
    /// Create a supervisor with the given configuration.
    pub fn new(config: SupervisorConfig) -> Self {
        Self {
            config,
            registry: Mutex::new(BTreeMap::new()),
        }
    }

    /// The configuration applied to every supervised process.
    pub fn config(&self) -> &SupervisorConfig {
        &self.config
    }

    /// Register `spec` and launch its process.
    ///
    /// The name is reserved before the launch is attempted, so two
    /// concurrent starts with the same name cannot both succeed. If the
    /// launch fails the reservation is released and nothing stays
    /// registered.
    pub async fn start(&self, spec: ProcessSpec) -> Result<ProcessRef, SupervisorError> {
        let name = spec.name.clone();
        let handle = ProcessHandle::new(&name);
        let (snap_tx, snap_rx) = watch::channel(handle.snapshot());
        let (ctl_tx, ctl_rx) = mpsc::channel(CONTROL_QUEUE);
        let (ready_tx, ready_rx) = oneshot::channel();

        {
            let mut registry = self.registry.lock().expect("registry lock poisoned");
            if registry.contains_key(&name) {
                return Err(SupervisorError::NameTaken(name));
            }
            let monitor = Monitor::new(spec, self.config.clone(), handle, snap_tx, ctl_rx);
            let task = tokio::spawn(monitor.run(ready_tx));
            registry.insert(
                name.clone(),
                ProcessEntry {
                    control: ctl_tx,
                    snapshots: snap_rx.clone(),
                    task,
                },
            );
        }

        match ready_rx.await {
            Ok(Ok(())) => {
                info!(target: "warden.supervisor", name = %name, "process registered");
                Ok(ProcessRef {
                    name,
                    snapshots: snap_rx,
                })
            }
            Ok(Err(err)) => {
                self.remove(&name);
                Err(err)
            }
            Err(_) => {
                self.remove(&name);
                Err(SupervisorError::Shutdown(name))
            }
        }
    }

    /// Stop a process gracefully, escalating to a forceful kill after
    /// `grace` (the configured default when `None`).
    ///
    /// Stopping a process that is not running is a no-op; stopping one that
    /// is waiting out a restart backoff cancels the pending relaunch.
    pub async fn stop(&self, name: &str, grace: Option<Duration>) -> Result<(), SupervisorError> {
        debug!(target: "warden.supervisor", name, "stop requested");
        self.request(name, |reply| Control::Stop { grace, reply })
            .await
    }

    /// Deliberately stop (if running) and relaunch a process.
    ///
    /// Counted in `restart_count`; never treated as a crash.
    pub async fn restart(&self, name: &str) -> Result<(), SupervisorError> {
        debug!(target: "warden.supervisor", name, "restart requested");
        self.request(name, |reply| Control::Restart { reply }).await
    }

    /// Latest snapshot of one process. Never blocks on process I/O.
    pub fn status(&self, name: &str) -> Result<ProcessSnapshot, SupervisorError> {
        let registry = self.registry.lock().expect("registry lock poisoned");
        registry
            .get(name)
            .map(|entry| entry.snapshots.borrow().clone())
            .ok_or_else(|| SupervisorError::UnknownProcess(name.to_string()))
    }

    /// A [`ProcessRef`] for one registered process.
    pub fn get(&self, name: &str) -> Option<ProcessRef> {
        let registry = self.registry.lock().expect("registry lock poisoned");
        registry.get(name).map(|entry| ProcessRef {
            name: name.to_string(),
            snapshots: entry.snapshots.clone(),
        })
    }

    /// Names of all registered processes, sorted.
    pub fn names(&self) -> Vec<String> {
        let registry = self.registry.lock().expect("registry lock poisoned");
        registry.keys().cloned().collect()
    }

    /// Latest snapshot of every registered process, sorted by name.
    pub fn snapshots(&self) -> Vec<ProcessSnapshot> {
        let registry = self.registry.lock().expect("registry lock poisoned");
        registry
            .values()
            .map(|entry| entry.snapshots.borrow().clone())
            .collect()
    }

    /// Stop every process and tear down the registry.
    ///
    /// Processes are stopped with the configured grace, one after another,
    /// and every monitor task is awaited. The first failure is reported
    /// after all processes have been dealt with.
    pub async fn shutdown(&self) -> Result<(), SupervisorError> {
        let entries: Vec<(String, ProcessEntry)> = {
            let mut registry = self.registry.lock().expect("registry lock poisoned");
            std::mem::take(&mut *registry).into_iter().collect()
        };
        info!(target: "warden.supervisor", count = entries.len(), "shutting down");

        let mut first_err = None;
        for (name, entry) in entries {
            let (reply_tx, reply_rx) = oneshot::channel();
            if entry
                .control
                .send(Control::Shutdown { reply: reply_tx })
                .await
                .is_ok()
            {
                if let Ok(Err(err)) = reply_rx.await {
                    warn!(target: "warden.supervisor", name = %name, error = %err, "process did not shut down cleanly");
                    first_err.get_or_insert(err);
                }
            }
            if let Err(err) = entry.task.await {
                warn!(target: "warden.supervisor", name = %name, error = %err, "monitor task did not finish cleanly");
            }
        }

        match first_err {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Send one control request and wait for the monitor's reply.
    async fn request(
        &self,
        name: &str,
        make: impl FnOnce(oneshot::Sender<Result<(), SupervisorError>>) -> Control,
    ) -> Result<(), SupervisorError> {
        let control = {
            let registry = self.registry.lock().expect("registry lock poisoned");
            registry
                .get(name)
                .map(|entry| entry.control.clone())
                .ok_or_else(|| SupervisorError::UnknownProcess(name.to_string()))?
        };

        let (reply_tx, reply_rx) = oneshot::channel();
        control
            .send(make(reply_tx))
            .await
            .map_err(|_| SupervisorError::Shutdown(name.to_string()))?;
        reply_rx
            .await
            .map_err(|_| SupervisorError::Shutdown(name.to_string()))?
    }

    fn remove(&self, name: &str) {
        let mut registry = self.registry.lock().expect("registry lock poisoned");
        registry.remove(name);
    }
}
