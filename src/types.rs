//! Type definitions and aliases

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// Re-export commonly used types
pub use crate::error::{AppError, Result};

/// Transport used to reach the broker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Protocol {
    /// Plain MQTT over TCP
    Mqtt,
    /// MQTT over websockets
    Ws,
}

impl Protocol {
    /// Name as accepted on the command line
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Mqtt => "mqtt",
            Protocol::Ws => "ws",
        }
    }

    /// Port on which this protocol is expected to run TLS
    pub fn tls_port(&self) -> u16 {
        match self {
            Protocol::Mqtt => 8883,
            Protocol::Ws => 443,
        }
    }

    /// Human-readable protocol label used in validation messages
    pub fn label(&self) -> &'static str {
        match self {
            Protocol::Mqtt => "MQTT",
            Protocol::Ws => "WebSocket",
        }
    }
}

impl FromStr for Protocol {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "mqtt" => Ok(Protocol::Mqtt),
            "ws" => Ok(Protocol::Ws),
            other => Err(AppError::config(format!("Unsupported protocol: {}", other))),
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// TLS settings for the broker session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TlsMode {
    /// No TLS
    Off,
    /// TLS without certificate verification (test mode)
    Insecure,
    /// TLS verified against the platform root certificates
    Verified,
}

impl TlsMode {
    /// Derive the mode from the two TLS flags
    pub fn from_flags(ssl_enabled: bool, verify_certificate: bool) -> Self {
        match (ssl_enabled, verify_certificate) {
            (false, _) => TlsMode::Off,
            (true, false) => TlsMode::Insecure,
            (true, true) => TlsMode::Verified,
        }
    }

    pub fn is_enabled(&self) -> bool {
        !matches!(self, TlsMode::Off)
    }
}

/// Terminal classification of one message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OutcomeKind {
    /// Echo received before the timeout
    Success,
    /// No echo within the timeout window
    Timeout,
    /// The publish attempt itself failed
    Failed,
}

impl OutcomeKind {
    /// Value stored in the `Status` column
    pub fn as_str(&self) -> &'static str {
        match self {
            OutcomeKind::Success => "success",
            OutcomeKind::Timeout => "timeout",
            OutcomeKind::Failed => "failed",
        }
    }

    /// Value stored in the `Failed` column
    pub fn failed_flag(&self) -> i64 {
        match self {
            OutcomeKind::Success => 0,
            OutcomeKind::Timeout | OutcomeKind::Failed => 1,
        }
    }
}

impl FromStr for OutcomeKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "success" => Ok(OutcomeKind::Success),
            "timeout" => Ok(OutcomeKind::Timeout),
            "failed" => Ok(OutcomeKind::Failed),
            other => Err(AppError::parse(format!("Unknown outcome status: {}", other))),
        }
    }
}

impl fmt::Display for OutcomeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protocol_parsing() {
        assert_eq!("mqtt".parse::<Protocol>().unwrap(), Protocol::Mqtt);
        assert_eq!("WS".parse::<Protocol>().unwrap(), Protocol::Ws);
        assert!("amqp".parse::<Protocol>().is_err());
    }

    #[test]
    fn test_tls_mode_from_flags() {
        assert_eq!(TlsMode::from_flags(false, true), TlsMode::Off);
        assert_eq!(TlsMode::from_flags(true, false), TlsMode::Insecure);
        assert_eq!(TlsMode::from_flags(true, true), TlsMode::Verified);
        assert!(!TlsMode::Off.is_enabled());
    }

    #[test]
    fn test_outcome_kind_columns() {
        assert_eq!(OutcomeKind::Success.failed_flag(), 0);
        assert_eq!(OutcomeKind::Timeout.failed_flag(), 1);
        assert_eq!(OutcomeKind::Failed.failed_flag(), 1);
        assert_eq!("timeout".parse::<OutcomeKind>().unwrap(), OutcomeKind::Timeout);
    }
}
