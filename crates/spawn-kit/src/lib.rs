// SPDX-License-Identifier: MIT OR Apache-2.0
#![doc = include_str!("../README.md")]
//! spawn-kit
#![deny(unsafe_code)]
#![warn(missing_docs)]
//!
//! The OS-facing half of Process Warden. Everything here is mechanism:
//! validate a working directory, open the configured log destinations,
//! spawn the child with its stdio redirected, deliver termination signals,
//! and report how the child exited.

pub mod error;
pub mod logs;
pub mod process;

pub use error::{LaunchError, TerminateError};
pub use logs::open_destinations;
pub use process::ChildProcess;
