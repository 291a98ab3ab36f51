// SPDX-License-Identifier: MIT OR Apache-2.0
//! Spawning and terminating a single child process.

use std::process::Stdio;

use tokio::process::{Child, Command};
use tracing::debug;

use warden_core::{ExitStatus, ProcessSpec};

use crate::error::{LaunchError, TerminateError};
use crate::logs::open_destinations;

/// A spawned child process with its stdio already redirected.
#[derive(Debug)]
pub struct ChildProcess {
    child: Child,
    pid: u32,
}

impl ChildProcess {
    /// Validate the spec and spawn its command.
    ///
    /// The working directory is checked before the spawn so a missing
    /// directory reports as [`LaunchError::WorkingDir`] rather than an
    /// opaque spawn failure.
    pub fn spawn(spec: &ProcessSpec) -> Result<Self, LaunchError> {
        if !spec.working_dir.is_dir() {
            return Err(LaunchError::WorkingDir {
                path: spec.working_dir.clone(),
            });
        }

        let (stdout, stderr) = open_destinations(spec)?;

        let mut command = Command::new(&spec.command);
        command
            .args(&spec.args)
            .current_dir(&spec.working_dir)
            .stdin(Stdio::null())
            .stdout(stdout)
            .stderr(stderr);
        for (key, value) in &spec.env {
            command.env(key, value);
        }

        let child = command.spawn().map_err(|source| LaunchError::Spawn {
            command: spec.command.clone(),
            source,
        })?;
        let pid = child
            .id()
            .ok_or_else(|| LaunchError::Spawn {
                command: spec.command.clone(),
                source: std::io::Error::other("process id unavailable"),
            })?;

        debug!(target: "spawn_kit", name = %spec.name, pid, "spawned child");
        Ok(Self { child, pid })
    }

    /// The child's OS process id.
    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Wait for the child to exit and report how it finished.
    pub async fn wait(&mut self) -> std::io::Result<ExitStatus> {
        let status = self.child.wait().await?;
        Ok(ExitStatus::from(status))
    }

    /// Ask the child to shut down gracefully.
    ///
    /// On unix this delivers SIGTERM; a child that already exited is not
    /// an error. Elsewhere there is no graceful signal, so this begins a
    /// forceful kill without waiting for it.
    pub fn terminate(&mut self) -> Result<(), TerminateError> {
        #[cfg(unix)]
        {
            use nix::errno::Errno;
            use nix::sys::signal::{Signal, kill};
            use nix::unistd::Pid;

            debug!(target: "spawn_kit", pid = self.pid, "sending SIGTERM");
            match kill(Pid::from_raw(self.pid as i32), Signal::SIGTERM) {
                Ok(()) | Err(Errno::ESRCH) => Ok(()),
                Err(errno) => Err(TerminateError::Signal {
                    pid: self.pid,
                    source: std::io::Error::from(errno),
                }),
            }
        }
        #[cfg(not(unix))]
        {
            debug!(target: "spawn_kit", pid = self.pid, "requesting kill");
            self.child
                .start_kill()
                .map_err(|source| TerminateError::Kill { source })
        }
    }

    /// Kill the child outright and reap it.
    pub async fn kill(&mut self) -> Result<ExitStatus, TerminateError> {
        debug!(target: "spawn_kit", pid = self.pid, "killing child");
        self.child
            .kill()
            .await
            .map_err(|source| TerminateError::Kill { source })?;
        let status = self
            .child
            .wait()
            .await
            .map_err(|source| TerminateError::Kill { source })?;
        Ok(ExitStatus::from(status))
    }
}
