// SPDX-License-Identifier: MIT OR Apache-2.0
//! Process specification types.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Immutable description of how to launch and supervise one process.
///
/// A spec is supplied once, when supervision of the process begins, and never
/// mutated afterwards. Field names follow the usual process-manager
/// configuration vocabulary (`autorestart`, `watch`, `merge_logs`).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProcessSpec {
    /// Identifier for the process, unique within a supervisor instance.
    pub name: String,
    /// Executable invoked at start.
    pub command: String,
    /// Arguments passed to the command.
    #[serde(default)]
    pub args: Vec<String>,
    /// Additional environment variables for the process.
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    /// Working directory the process is launched in. Must exist at start.
    pub working_dir: PathBuf,
    /// Relaunch the process when it terminates.
    #[serde(default)]
    pub autorestart: bool,
    /// Restart the process when files under `working_dir` change.
    #[serde(default)]
    pub watch: bool,
    /// Destination file for captured stdout. `None` discards the stream.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stdout_path: Option<PathBuf>,
    /// Destination file for captured stderr. Ignored when `merge_logs` is set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stderr_path: Option<PathBuf>,
    /// Interleave stdout and stderr into the single stdout destination.
    #[serde(default)]
    pub merge_logs: bool,
}

impl ProcessSpec {
    /// Create a spec with the given name and command.
    ///
    /// Defaults: current directory as `working_dir`, no args or extra env,
    /// restart and watch disabled, both output streams discarded.
    pub fn new(name: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            command: command.into(),
            args: Vec::new(),
            env: BTreeMap::new(),
            working_dir: PathBuf::from("."),
            autorestart: false,
            watch: false,
            stdout_path: None,
            stderr_path: None,
            merge_logs: false,
        }
    }
}
