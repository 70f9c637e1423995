//! Configuration data model and validation

use crate::config::env::parse_bool;
use crate::defaults::{ENV_PREFIX, MAX_WAIT};
use crate::types::{AppError, Protocol, Result, TlsMode};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Broker host name or address
    #[serde(default)]
    pub host: String,

    /// Broker port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Transport protocol name (`mqtt` or `ws`)
    #[serde(default = "default_protocol")]
    pub protocol: String,

    #[serde(default)]
    pub username: Option<String>,

    #[serde(default)]
    pub password: Option<String>,

    /// Base client id; a random suffix is appended on connect
    #[serde(default = "default_client_id")]
    pub client_id: String,

    /// Base topic that test traffic is published on
    #[serde(default)]
    pub topic: String,

    #[serde(default)]
    pub ssl_enabled: bool,

    #[serde(default)]
    pub ssl_verify_certificate: bool,

    /// Number of messages to send
    #[serde(default = "default_message_count")]
    pub message_count: u32,

    /// Pause between consecutive sends, in seconds
    #[serde(default = "default_interval_secs")]
    pub interval_secs: f64,

    /// Length of the `Data` field in every message
    #[serde(default = "default_data_string_length")]
    pub data_string_length: usize,

    /// Per-message echo timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_seconds: u64,

    /// How long the sender waits for the broker session, in seconds
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_seconds: u64,

    /// Directory the results database and report are written to
    #[serde(default = "default_results_dir")]
    pub results_dir: PathBuf,

    /// Render the report after the run
    #[serde(default = "default_generate_report")]
    pub generate_report: bool,

    /// Enable colored terminal output
    #[serde(default = "default_enable_color")]
    pub enable_color: bool,

    /// Enable verbose output
    #[serde(default)]
    pub verbose: bool,

    /// Enable debug output
    #[serde(default)]
    pub debug: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: default_port(),
            protocol: default_protocol(),
            username: None,
            password: None,
            client_id: default_client_id(),
            topic: String::new(),
            ssl_enabled: false,
            ssl_verify_certificate: false,
            message_count: default_message_count(),
            interval_secs: default_interval_secs(),
            data_string_length: default_data_string_length(),
            timeout_seconds: default_timeout_secs(),
            connect_timeout_seconds: default_connect_timeout_secs(),
            results_dir: default_results_dir(),
            generate_report: default_generate_report(),
            enable_color: default_enable_color(),
            verbose: false,
            debug: false,
        }
    }
}

impl Config {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Per-message echo timeout
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds.min(MAX_WAIT.as_secs()))
    }

    /// Maximum wait for the broker session before sending starts
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_seconds.min(MAX_WAIT.as_secs()))
    }

    /// Pause between consecutive sends
    pub fn interval(&self) -> Duration {
        // NaN falls through the clamp and lands on zero
        Duration::try_from_secs_f64(self.interval_secs.clamp(0.0, MAX_WAIT.as_secs_f64())).unwrap_or(Duration::ZERO)
    }

    /// Parsed transport protocol
    pub fn protocol_kind(&self) -> Result<Protocol> {
        Protocol::from_str(&self.protocol)
    }

    /// TLS mode derived from the two TLS flags
    pub fn tls_mode(&self) -> TlsMode {
        TlsMode::from_flags(self.ssl_enabled, self.ssl_verify_certificate)
    }

    /// Validate the configuration and return any errors
    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(AppError::config(
                "Broker host is required (use --host or MQTT_TESTERI_HOST)",
            ));
        }

        if self.topic.trim().is_empty() {
            return Err(AppError::config(
                "Topic is required (use --topic or MQTT_TESTERI_TOPIC)",
            ));
        }

        if self.topic.contains('+') || self.topic.contains('#') {
            return Err(AppError::config(format!(
                "Topic '{}' must not contain wildcards",
                self.topic
            )));
        }

        if self.client_id.trim().is_empty() {
            return Err(AppError::config("Client id cannot be empty"));
        }

        if self.port == 0 {
            return Err(AppError::config("Port must be greater than 0"));
        }

        let protocol = self.protocol_kind()?;
        check_tls_settings(protocol, self.port, self.ssl_enabled)?;

        // Validate numeric parameters
        if self.message_count == 0 {
            return Err(AppError::config("Message count must be greater than 0"));
        }

        if !self.interval_secs.is_finite() || self.interval_secs < 0.0 {
            return Err(AppError::config(format!(
                "Interval must be a non-negative number of seconds, got: {}",
                self.interval_secs
            )));
        }

        if self.interval_secs > MAX_WAIT.as_secs_f64() {
            return Err(AppError::config(format!(
                "Interval must be at most {} seconds, got: {}",
                MAX_WAIT.as_secs(),
                self.interval_secs
            )));
        }

        check_wait_seconds("Timeout", self.timeout_seconds)?;
        check_wait_seconds("Connect timeout", self.connect_timeout_seconds)?;

        Ok(())
    }

    /// Merge `MQTT_TESTERI_*` environment variables into this configuration
    pub fn merge_from_env(&mut self) -> Result<()> {
        if let Some(host) = env_value("HOST") {
            self.host = host;
        }

        if let Some(port) = env_value("PORT") {
            self.port = parse_env("PORT", &port)?;
        }

        if let Some(protocol) = env_value("PROTOCOL") {
            self.protocol = protocol;
        }

        if let Some(username) = env_value("USERNAME") {
            self.username = Some(username);
        }

        if let Some(password) = env_value("PASSWORD") {
            self.password = Some(password);
        }

        if let Some(client_id) = env_value("CLIENT_ID") {
            self.client_id = client_id;
        }

        if let Some(topic) = env_value("TOPIC") {
            self.topic = topic;
        }

        if let Some(ssl_enabled) = env_value("SSL_ENABLED") {
            self.ssl_enabled = parse_env_bool("SSL_ENABLED", &ssl_enabled)?;
        }

        if let Some(verify) = env_value("SSL_VERIFY_CERTIFICATE") {
            self.ssl_verify_certificate = parse_env_bool("SSL_VERIFY_CERTIFICATE", &verify)?;
        }

        if let Some(count) = env_value("MESSAGE_COUNT") {
            self.message_count = parse_env("MESSAGE_COUNT", &count)?;
        }

        if let Some(interval) = env_value("INTERVAL") {
            self.interval_secs = parse_env("INTERVAL", &interval)?;
        }

        if let Some(length) = env_value("DATA_STRING_LENGTH") {
            self.data_string_length = parse_env("DATA_STRING_LENGTH", &length)?;
        }

        if let Some(timeout) = env_value("TIMEOUT") {
            self.timeout_seconds = parse_env("TIMEOUT", &timeout)?;
        }

        if let Some(timeout) = env_value("CONNECT_TIMEOUT") {
            self.connect_timeout_seconds = parse_env("CONNECT_TIMEOUT", &timeout)?;
        }

        if let Some(dir) = env_value("RESULTS_DIR") {
            self.results_dir = PathBuf::from(dir);
        }

        if let Some(verbose) = env_value("VERBOSE") {
            self.verbose = parse_env_bool("VERBOSE", &verbose)?;
        }

        if let Some(enable_color) = env_value("ENABLE_COLOR") {
            self.enable_color = parse_env_bool("ENABLE_COLOR", &enable_color)?;
        }

        Ok(())
    }
}

/// Check that the TLS flag matches what the protocol expects on this port
pub fn check_tls_settings(protocol: Protocol, port: u16, ssl_enabled: bool) -> Result<()> {
    let tls_required = port == protocol.tls_port();

    if tls_required && !ssl_enabled {
        return Err(AppError::config(format!(
            "SSL must be enabled for {} on port {}. Please use --ssl-enabled true.",
            protocol.label(),
            port
        )));
    }

    if !tls_required && ssl_enabled {
        return Err(AppError::config(format!(
            "No SSL on port {} for {}. Please use --ssl-enabled false.",
            port,
            protocol.label()
        )));
    }

    Ok(())
}

fn env_value(name: &str) -> Option<String> {
    std::env::var(format!("{}{}", ENV_PREFIX, name))
        .ok()
        .filter(|value| !value.trim().is_empty())
}

fn parse_env<T>(name: &str, value: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e| {
        AppError::config(format!("Invalid {}{} value '{}': {}", ENV_PREFIX, name, value, e))
    })
}

fn parse_env_bool(name: &str, value: &str) -> Result<bool> {
    parse_bool(value).map_err(|e| {
        AppError::config(format!("Invalid {}{} value '{}': {}", ENV_PREFIX, name, value, e))
    })
}

// Default value functions for serde
fn default_port() -> u16 {
    crate::defaults::DEFAULT_PORT
}

fn default_protocol() -> String {
    crate::defaults::DEFAULT_PROTOCOL.to_string()
}

fn default_client_id() -> String {
    crate::defaults::DEFAULT_CLIENT_ID.to_string()
}

fn default_message_count() -> u32 {
    crate::defaults::DEFAULT_MESSAGE_COUNT
}

fn check_wait_seconds(name: &str, seconds: u64) -> Result<()> {
    if seconds == 0 {
        return Err(AppError::config(format!("{} must be greater than 0", name)));
    }
    if seconds > MAX_WAIT.as_secs() {
        return Err(AppError::config(format!(
            "{} must be at most {} seconds, got: {}",
            name,
            MAX_WAIT.as_secs(),
            seconds
        )));
    }
    Ok(())
}

fn default_interval_secs() -> f64 {
    crate::defaults::DEFAULT_INTERVAL_SECS
}

fn default_data_string_length() -> usize {
    crate::defaults::DEFAULT_DATA_STRING_LENGTH
}

fn default_timeout_secs() -> u64 {
    crate::defaults::DEFAULT_TIMEOUT.as_secs()
}

fn default_connect_timeout_secs() -> u64 {
    crate::defaults::DEFAULT_CONNECT_TIMEOUT.as_secs()
}

fn default_results_dir() -> PathBuf {
    PathBuf::from(crate::defaults::DEFAULT_RESULTS_DIR)
}

fn default_generate_report() -> bool {
    true
}

fn default_enable_color() -> bool {
    crate::defaults::DEFAULT_ENABLE_COLOR
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> Config {
        Config {
            host: "broker.local".to_string(),
            topic: "loadtest".to_string(),
            ..Config::default()
        }
    }

    #[test]
    fn test_default_config_needs_host_and_topic() {
        let config = Config::default();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("host"));

        let config = Config {
            host: "broker.local".to_string(),
            ..Config::default()
        };
        assert!(config.validate().unwrap_err().to_string().contains("Topic"));
    }

    #[test]
    fn test_minimal_config_is_valid() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.port, 1883);
        assert_eq!(config.protocol, "mqtt");
        assert_eq!(config.message_count, 10);
        assert_eq!(config.interval_secs, 1.0);
        assert_eq!(config.data_string_length, 55);
        assert_eq!(config.timeout(), Duration::from_secs(60));
        assert_eq!(config.connect_timeout(), Duration::from_secs(30));
        assert!(!config.ssl_enabled);
        assert!(!config.ssl_verify_certificate);
        assert_eq!(config.tls_mode(), TlsMode::Off);
    }

    #[test]
    fn test_wildcard_topic_invalid() {
        let mut config = valid_config();
        config.topic = "loadtest/#".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_message_count_invalid() {
        let mut config = valid_config();
        config.message_count = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_negative_interval_invalid() {
        let mut config = valid_config();
        config.interval_secs = -1.0;
        assert!(config.validate().is_err());

        config.interval_secs = 0.0;
        assert!(config.validate().is_ok());
        assert_eq!(config.interval(), Duration::ZERO);
    }

    #[test]
    fn test_huge_interval_rejected_without_panicking() {
        let mut config = valid_config();
        config.interval_secs = 1e30;
        assert!(config.validate().unwrap_err().to_string().contains("Interval must be at most"));
        assert_eq!(config.interval(), MAX_WAIT);

        config.interval_secs = f64::NAN;
        assert!(config.validate().is_err());
        assert_eq!(config.interval(), Duration::ZERO);
    }

    #[test]
    fn test_timeouts_have_an_upper_bound() {
        let mut config = valid_config();
        config.timeout_seconds = u64::MAX;
        let err = config.validate().unwrap_err();
        assert_eq!(err.exit_code(), 1);
        assert!(err.to_string().contains("Timeout must be at most 604800 seconds"));
        assert_eq!(config.timeout(), MAX_WAIT);

        config.timeout_seconds = MAX_WAIT.as_secs();
        assert!(config.validate().is_ok());

        config.connect_timeout_seconds = MAX_WAIT.as_secs() + 1;
        assert!(config.validate().unwrap_err().to_string().contains("Connect timeout must be at most"));
        assert_eq!(config.connect_timeout(), MAX_WAIT);

        config.connect_timeout_seconds = 0;
        assert!(config.validate().unwrap_err().to_string().contains("Connect timeout must be greater than 0"));
    }

    #[test]
    fn test_unsupported_protocol() {
        let mut config = valid_config();
        config.protocol = "amqp".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("Unsupported protocol"));
    }

    #[test]
    fn test_tls_port_rules() {
        assert!(check_tls_settings(Protocol::Mqtt, 8883, true).is_ok());
        assert!(check_tls_settings(Protocol::Mqtt, 1883, false).is_ok());
        assert!(check_tls_settings(Protocol::Ws, 443, true).is_ok());
        assert!(check_tls_settings(Protocol::Ws, 8080, false).is_ok());

        let err = check_tls_settings(Protocol::Mqtt, 8883, false).unwrap_err();
        assert!(err.to_string().contains("SSL must be enabled for MQTT on port 8883"));

        let err = check_tls_settings(Protocol::Mqtt, 1883, true).unwrap_err();
        assert!(err.to_string().contains("No SSL on port 1883 for MQTT"));

        assert!(check_tls_settings(Protocol::Ws, 443, false).is_err());
        assert!(check_tls_settings(Protocol::Ws, 80, true).is_err());
    }

    #[test]
    fn test_tls_mismatch_is_config_error() {
        let mut config = valid_config();
        config.port = 8883;
        let err = config.validate().unwrap_err();
        assert_eq!(err.exit_code(), 1);
    }
}
