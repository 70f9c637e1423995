//! Terminal outcomes and their persisted row form

use crate::{clock, types::OutcomeKind};
use serde::{Deserialize, Serialize};

/// Timing of a successful round trip
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RoundTrip {
    pub send_monotonic: f64,
    pub receive_monotonic: f64,
    pub delay_ms: f64,
}

/// Terminal classification of one message, produced exactly once
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Outcome {
    pub index: u32,
    pub kind: OutcomeKind,
    /// Wall-clock publish time, kept on every outcome for diagnosis
    pub publish_wall_clock: String,
    /// Present only for successes
    pub timing: Option<RoundTrip>,
}

impl Outcome {
    /// Echo received in time
    pub fn success(index: u32, publish_wall_clock: String, send_monotonic: f64, receive_monotonic: f64) -> Self {
        Self {
            index,
            kind: OutcomeKind::Success,
            publish_wall_clock,
            timing: Some(RoundTrip {
                send_monotonic,
                receive_monotonic,
                delay_ms: clock::delay_ms(send_monotonic, receive_monotonic),
            }),
        }
    }

    /// No echo within the window
    pub fn timeout(index: u32, publish_wall_clock: String) -> Self {
        Self {
            index,
            kind: OutcomeKind::Timeout,
            publish_wall_clock,
            timing: None,
        }
    }

    /// Publish attempt failed
    pub fn failed(index: u32, publish_wall_clock: String) -> Self {
        Self {
            index,
            kind: OutcomeKind::Failed,
            publish_wall_clock,
            timing: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.kind == OutcomeKind::Success
    }

    pub fn delay_ms(&self) -> Option<f64> {
        self.timing.map(|t| t.delay_ms)
    }
}

/// One row of the `results` table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRecord {
    pub message_index: u32,
    pub publish_date_time_utc: String,
    /// Send monotonic stamp, as text
    pub high_res_publish_time: Option<String>,
    /// Receive monotonic stamp, as text
    pub high_res_subscribe_time: Option<String>,
    /// Delay in milliseconds, rounded to 4 decimals
    pub delay_ms: Option<f64>,
    pub failed: bool,
    pub status: OutcomeKind,
}

impl ResultRecord {
    /// Round a delay to the 4-decimal precision kept in storage
    pub fn round_delay(delay_ms: f64) -> f64 {
        (delay_ms * 10_000.0).round() / 10_000.0
    }
}

impl From<&Outcome> for ResultRecord {
    fn from(outcome: &Outcome) -> Self {
        Self {
            message_index: outcome.index,
            publish_date_time_utc: outcome.publish_wall_clock.clone(),
            high_res_publish_time: outcome.timing.map(|t| t.send_monotonic.to_string()),
            high_res_subscribe_time: outcome.timing.map(|t| t.receive_monotonic.to_string()),
            delay_ms: outcome.timing.map(|t| Self::round_delay(t.delay_ms)),
            failed: outcome.kind.failed_flag() == 1,
            status: outcome.kind,
        }
    }
}
