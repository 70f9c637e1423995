//! Time capture for send/receive stamps
//!
//! Delays are computed from a process-wide monotonic clock expressed as
//! seconds since the clock origin. The same process both sends and receives,
//! so the origin is shared by every stamp that gets compared.

use chrono::{SecondsFormat, Utc};
use std::sync::OnceLock;
use std::time::Instant;

static ORIGIN: OnceLock<Instant> = OnceLock::new();

/// Seconds elapsed on the monotonic clock since the process origin
pub fn monotonic_seconds() -> f64 {
    let origin = ORIGIN.get_or_init(Instant::now);
    origin.elapsed().as_secs_f64()
}

/// Current UTC wall-clock time in ISO-8601 with millisecond precision
pub fn wall_clock_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, false)
}

/// Human-readable UTC timestamp for start/end banners
pub fn banner_timestamp() -> String {
    Utc::now().format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

/// Pair of stamps captured at the same instant of a send
#[derive(Debug, Clone, PartialEq)]
pub struct SendStamp {
    pub wall_clock: String,
    pub monotonic: f64,
}

impl SendStamp {
    pub fn now() -> Self {
        Self {
            wall_clock: wall_clock_iso(),
            monotonic: monotonic_seconds(),
        }
    }
}

/// Round-trip delay in milliseconds between two monotonic stamps
pub fn delay_ms(send_monotonic: f64, receive_monotonic: f64) -> f64 {
    (receive_monotonic - send_monotonic) * 1000.0
}
