//! Command-line interface
//!
//! Every option is optional here; unset options fall back to the
//! `MQTT_TESTERI_*` environment, then the `.env` file, then the defaults.

use crate::config::env::parse_bool;
use clap::Parser;
use std::path::PathBuf;

/// MQTT Load Tester - publish timestamped messages and measure their round trip
#[derive(Parser, Debug, Clone, Default)]
#[command(name = "mqtt-load-tester")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Broker username
    #[arg(long)]
    pub username: Option<String>,

    /// Broker password
    #[arg(long)]
    pub password: Option<String>,

    /// Broker host name or address
    #[arg(long)]
    pub host: Option<String>,

    /// Base client id (a random 3-digit suffix is appended)
    #[arg(long)]
    pub client_id: Option<String>,

    /// Base topic to publish test messages on
    #[arg(long)]
    pub topic: Option<String>,

    /// Broker port
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Connect with TLS (yes/no, true/false, 1/0)
    #[arg(long, value_name = "BOOL", value_parser = parse_bool, num_args = 0..=1, default_missing_value = "true")]
    pub ssl_enabled: Option<bool>,

    /// Verify the broker certificate against the platform roots
    #[arg(long, value_name = "BOOL", value_parser = parse_bool, num_args = 0..=1, default_missing_value = "true")]
    pub ssl_verify_certificate: Option<bool>,

    /// Transport protocol: mqtt or ws
    #[arg(long)]
    pub protocol: Option<String>,

    /// Print every stored result instead of a single progress line
    #[arg(long, value_name = "BOOL", value_parser = parse_bool, num_args = 0..=1, default_missing_value = "true")]
    pub verbose: Option<bool>,

    /// Number of messages to send
    #[arg(short = 'n', long)]
    pub message_count: Option<u32>,

    /// Seconds between consecutive messages
    #[arg(short, long, value_parser = parse_interval)]
    pub interval: Option<f64>,

    /// Length of the data string carried by every message
    #[arg(long)]
    pub data_string_length: Option<usize>,

    /// Seconds to wait for the echo of a message
    #[arg(short, long, value_parser = parse_duration)]
    pub timeout: Option<u64>,

    /// Seconds to wait for the broker session before giving up
    #[arg(long, value_parser = parse_duration)]
    pub connect_timeout: Option<u64>,

    /// Directory for the results database and report
    #[arg(long, value_name = "DIR")]
    pub results_dir: Option<PathBuf>,

    /// Skip the report after the run
    #[arg(long)]
    pub no_report: bool,

    /// Force colored output
    #[arg(long)]
    pub color: bool,

    /// Disable colored output
    #[arg(long)]
    pub no_color: bool,

    /// Enable debug output (JSON logs)
    #[arg(long)]
    pub debug: bool,
}

impl Cli {
    /// Validate CLI arguments for conflicts and requirements
    pub fn validate(&self) -> Result<(), String> {
        if self.color && self.no_color {
            return Err("Cannot specify both --color and --no-color".to_string());
        }

        if let Some(ref topic) = self.topic {
            if topic.trim().is_empty() {
                return Err("--topic cannot be empty".to_string());
            }
        }

        Ok(())
    }

    /// Check if colors should be enabled
    pub fn use_colors(&self) -> bool {
        if self.color {
            true
        } else if self.no_color {
            false
        } else {
            supports_color()
        }
    }

    /// Whether verbose output was requested on the command line
    pub fn is_verbose(&self) -> bool {
        self.verbose.unwrap_or(false)
    }
}

/// Parse a whole number of seconds
fn parse_duration(s: &str) -> Result<u64, String> {
    if s.starts_with('+') || s.starts_with("0x") || s.starts_with("0X") {
        return Err(format!("Invalid duration: {}", s));
    }

    s.parse::<u64>()
        .map_err(|_| format!("Invalid duration: {}", s))
        .and_then(|secs| {
            if secs == 0 {
                Err("Duration must be greater than 0".to_string())
            } else {
                Ok(secs)
            }
        })
}

/// Parse a non-negative, possibly fractional, number of seconds
fn parse_interval(s: &str) -> Result<f64, String> {
    let secs: f64 = s
        .parse()
        .map_err(|_| format!("Invalid interval: {}", s))?;

    if !secs.is_finite() || secs < 0.0 {
        return Err(format!("Interval must be a non-negative number of seconds: {}", s));
    }

    Ok(secs)
}

/// Check if the terminal supports color output
fn supports_color() -> bool {
    if let Ok(term) = std::env::var("TERM") {
        if term == "dumb" {
            return false;
        }
    }

    if std::env::var("NO_COLOR").is_ok() {
        return false;
    }

    if std::env::var("FORCE_COLOR").is_ok() {
        return true;
    }

    #[cfg(target_os = "windows")]
    {
        if std::env::var("ANSICON").is_ok() || std::env::var("ConEmuANSI").is_ok() {
            return true;
        }
    }

    #[cfg(unix)]
    {
        true
    }
    #[cfg(not(unix))]
    {
        false
    }
}
