// SPDX-License-Identifier: MIT OR Apache-2.0
#![doc = include_str!("../README.md")]
//! warden-core
#![deny(unsafe_code)]
#![warn(missing_docs)]
//!
//! Core data model for the Process Warden supervisor. Everything here is
//! plain data plus transition rules: the runtime crates decide *when* to act,
//! these types decide *what is valid*.

pub mod config;
pub mod handle;
pub mod health;
pub mod policy;
pub mod serde_duration;
pub mod spec;
pub mod state;

pub use config::SupervisorConfig;
pub use handle::{ExitStatus, ProcessHandle, ProcessSnapshot};
pub use health::ProcessHealth;
pub use policy::{RestartPolicy, RestartTracker, compute_delay};
pub use spec::ProcessSpec;
pub use state::{ProcessState, StateError, StateTransition};
