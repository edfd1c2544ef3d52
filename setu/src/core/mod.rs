//! Core types and time helpers.

pub mod types;

use std::time::{SystemTime, UNIX_EPOCH};

/// Current wall-clock time in microseconds since epoch.
#[inline]
pub fn now_us() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_micros() as u64)
        .unwrap_or(0)
}
