//! Environment variable handling and .env file management

use crate::defaults::ENV_PREFIX;
use crate::error::{AppError, Result};
use std::path::Path;

/// Parse the boolean spellings accepted for flags and environment values
pub fn parse_bool(value: &str) -> std::result::Result<bool, String> {
    match value.trim().to_lowercase().as_str() {
        "yes" | "true" | "t" | "y" | "1" => Ok(true),
        "no" | "false" | "f" | "n" | "0" => Ok(false),
        _ => Err(format!("Boolean value expected, got '{}'", value)),
    }
}

/// Environment variable configuration manager
pub struct EnvManager;

impl EnvManager {
    /// Load .env file if it exists
    pub fn load_env_file(debug: bool) -> Result<()> {
        Self::load_env_file_from(Path::new(".env"), debug)
    }

    /// Load a specific env file if it exists; process variables win over file values
    pub fn load_env_file_from(path: &Path, debug: bool) -> Result<()> {
        if path.exists() {
            dotenv::from_path(path)
                .map_err(|e| AppError::config(format!("Failed to load {} file: {}", path.display(), e)))?;

            if debug {
                eprintln!("Loaded configuration from {}", path.display());
            }
        } else if debug {
            eprintln!("No .env file found, using defaults and CLI arguments");
        }

        Ok(())
    }

    /// Create example .env file content
    pub fn create_example_env_content() -> String {
        r#"# MQTT Load Tester Configuration
#
# Values specified here are used as defaults and can be overridden by
# process environment variables and command-line arguments.

# Broker connection
# MQTT_TESTERI_HOST=broker.example.com
# MQTT_TESTERI_PORT=1883
# MQTT_TESTERI_PROTOCOL=mqtt
# MQTT_TESTERI_USERNAME=loadtest
# MQTT_TESTERI_PASSWORD=secret
# MQTT_TESTERI_CLIENT_ID=mqtt-load-tester

# Topic the test messages are published on; echoes use <topic>/return
# MQTT_TESTERI_TOPIC=loadtest

# TLS (port 8883 for mqtt and 443 for ws require TLS)
# MQTT_TESTERI_SSL_ENABLED=false
# MQTT_TESTERI_SSL_VERIFY_CERTIFICATE=false

# Run shape
# MQTT_TESTERI_MESSAGE_COUNT=10
# MQTT_TESTERI_INTERVAL=1.0
# MQTT_TESTERI_DATA_STRING_LENGTH=55
# MQTT_TESTERI_TIMEOUT=60
# MQTT_TESTERI_CONNECT_TIMEOUT=30
# MQTT_TESTERI_RESULTS_DIR=.
# MQTT_TESTERI_VERBOSE=false
"#
        .to_string()
    }

    /// Save example .env file to disk
    pub fn save_example_env_file(path: &Path) -> Result<()> {
        let content = Self::create_example_env_content();
        std::fs::write(path, content)
            .map_err(|e| AppError::config(format!("Failed to write example .env file: {}", e)))?;

        Ok(())
    }

    /// Validate environment variable format before parsing
    pub fn validate_env_var(key: &str, value: &str) -> Result<()> {
        let Some(name) = key.strip_prefix(ENV_PREFIX) else {
            return Ok(());
        };

        let invalid = |e: String| AppError::config(format!("Invalid {} value '{}': {}", key, value, e));

        match name {
            "PORT" => {
                let port: u16 = value.trim().parse().map_err(|e: std::num::ParseIntError| invalid(e.to_string()))?;
                if port == 0 {
                    return Err(invalid("port must be greater than 0".to_string()));
                }
            }
            "PROTOCOL" => {
                value.parse::<crate::types::Protocol>().map_err(|e| invalid(e.to_string()))?;
            }
            "SSL_ENABLED" | "SSL_VERIFY_CERTIFICATE" | "VERBOSE" | "ENABLE_COLOR" => {
                parse_bool(value).map_err(invalid)?;
            }
            "MESSAGE_COUNT" => {
                let count: u32 = value.trim().parse().map_err(|e: std::num::ParseIntError| invalid(e.to_string()))?;
                if count == 0 {
                    return Err(invalid("must be greater than 0".to_string()));
                }
            }
            "TIMEOUT" | "CONNECT_TIMEOUT" => {
                let secs: u64 = value.trim().parse().map_err(|e: std::num::ParseIntError| invalid(e.to_string()))?;
                if secs == 0 {
                    return Err(invalid("must be greater than 0".to_string()));
                }
            }
            "DATA_STRING_LENGTH" => {
                value.trim().parse::<usize>().map_err(|e| invalid(e.to_string()))?;
            }
            "INTERVAL" => {
                let secs: f64 = value.trim().parse().map_err(|e: std::num::ParseFloatError| invalid(e.to_string()))?;
                if !secs.is_finite() || secs < 0.0 {
                    return Err(invalid("must be a non-negative number of seconds".to_string()));
                }
            }
            _ => {}
        }

        Ok(())
    }

    /// Get list of all supported environment variables with descriptions
    pub fn get_supported_env_vars() -> Vec<(&'static str, &'static str, &'static str)> {
        vec![
            ("MQTT_TESTERI_HOST", "Broker host name or address", "broker.example.com"),
            ("MQTT_TESTERI_PORT", "Broker port", "1883"),
            ("MQTT_TESTERI_PROTOCOL", "Transport protocol (mqtt or ws)", "mqtt"),
            ("MQTT_TESTERI_USERNAME", "Broker username", "loadtest"),
            ("MQTT_TESTERI_PASSWORD", "Broker password", "secret"),
            ("MQTT_TESTERI_CLIENT_ID", "Base client id", "mqtt-load-tester"),
            ("MQTT_TESTERI_TOPIC", "Base topic for test messages", "loadtest"),
            ("MQTT_TESTERI_SSL_ENABLED", "Connect with TLS", "false"),
            ("MQTT_TESTERI_SSL_VERIFY_CERTIFICATE", "Verify the broker certificate", "false"),
            ("MQTT_TESTERI_MESSAGE_COUNT", "Number of messages to send", "10"),
            ("MQTT_TESTERI_INTERVAL", "Seconds between messages", "1.0"),
            ("MQTT_TESTERI_DATA_STRING_LENGTH", "Length of the data string", "55"),
            ("MQTT_TESTERI_TIMEOUT", "Seconds to wait for each echo", "60"),
            ("MQTT_TESTERI_CONNECT_TIMEOUT", "Seconds to wait for the broker session", "30"),
            ("MQTT_TESTERI_RESULTS_DIR", "Directory for results and report", "."),
            ("MQTT_TESTERI_VERBOSE", "Print every stored result", "false"),
            ("MQTT_TESTERI_ENABLE_COLOR", "Enable colored output", "true"),
        ]
    }

    /// Display environment variable help
    pub fn display_env_help() -> String {
        let mut help = String::new();
        help.push_str("Supported Environment Variables:\n\n");

        for (var, description, example) in Self::get_supported_env_vars() {
            help.push_str(&format!("  {:<36} {}\n", var, description));
            help.push_str(&format!("  {:<36} Example: {}\n\n", "", example));
        }

        help.push_str("Configuration Priority (highest to lowest):\n");
        help.push_str("  1. Command-line arguments\n");
        help.push_str("  2. Environment variables\n");
        help.push_str("  3. .env file values\n");
        help.push_str("  4. Default values\n");

        help
    }

    /// Validate all currently set environment variables
    pub fn validate_current_env() -> Result<Vec<String>> {
        let mut warnings = Vec::new();

        for (var_name, _, _) in Self::get_supported_env_vars() {
            if let Ok(value) = std::env::var(var_name) {
                if let Err(e) = Self::validate_env_var(var_name, &value) {
                    warnings.push(format!("Warning: {}", e));
                }
            }
        }

        Ok(warnings)
    }
}
