//! warden
//!
//! Supervision runtime for Process Warden.
//!
//! A [`Supervisor`] keeps a registry of named processes. Each registered
//! process is owned by one monitor task which launches the child, observes
//! its exits, enforces restart policy, and publishes [`ProcessSnapshot`]
//! copies that [`Supervisor::status`] reads without ever touching process
//! I/O.

pub mod error;
pub mod supervisor;

mod monitor;
mod watch;

pub use error::SupervisorError;
pub use supervisor::{ProcessRef, Supervisor};

// Re-export the data model so most callers need only this crate.
pub use warden_core::{
    ExitStatus, ProcessHealth, ProcessSnapshot, ProcessSpec, ProcessState, RestartPolicy,
    SupervisorConfig,
};
