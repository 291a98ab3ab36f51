// SPDX-License-Identifier: MIT OR Apache-2.0
//! Serde helpers for `Duration` fields expressed as integer milliseconds.
//!
//! Usage: `#[serde(with = "warden_core::serde_duration::duration_millis")]`.

/// `Duration` as integer milliseconds.
pub mod duration_millis {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    /// Serialize a `Duration` as integer milliseconds.
    pub fn serialize<S: Serializer>(val: &Duration, ser: S) -> Result<S::Ok, S::Error> {
        val.as_millis().serialize(ser)
    }

    /// Deserialize a `Duration` from integer milliseconds.
    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<Duration, D::Error> {
        let ms: u64 = u64::deserialize(de)?;
        Ok(Duration::from_millis(ms))
    }
}
