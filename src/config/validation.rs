//! Configuration validation utilities and rules

use crate::{
    error::Result,
    models::Config,
    types::{Protocol, TlsMode},
};

/// Payload size above which a warning is issued
const LARGE_PAYLOAD_BYTES: usize = 256 * 1024;

/// Configuration validator with advisory checks on top of `Config::validate`
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate configuration with comprehensive checks
    pub fn validate_comprehensive(config: &Config) -> Result<Vec<ValidationWarning>> {
        let mut warnings = Vec::new();

        // Hard errors first
        config.validate()?;

        warnings.extend(Self::validate_connection(config)?);
        warnings.extend(Self::validate_tls(config));
        warnings.extend(Self::validate_run_shape(config));
        warnings.extend(Self::validate_results_dir(config));

        Ok(warnings)
    }

    fn validate_connection(config: &Config) -> Result<Vec<ValidationWarning>> {
        let mut warnings = Vec::new();

        if config.password.is_some() && config.username.is_none() {
            warnings.push(ValidationWarning::new(
                ValidationLevel::Warning,
                "A password is set without a username; credentials will not be sent".to_string(),
            ));
        }

        if matches!(config.host.as_str(), "localhost" | "127.0.0.1" | "::1") {
            warnings.push(ValidationWarning::new(
                ValidationLevel::Info,
                format!("Broker '{}' is on the local machine; delays will not include network latency", config.host),
            ));
        }

        if config.protocol_kind()? == Protocol::Ws {
            warnings.push(ValidationWarning::new(
                ValidationLevel::Info,
                format!("Websocket transport connects to the root path of {}:{}", config.host, config.port),
            ));
        }

        Ok(warnings)
    }

    fn validate_tls(config: &Config) -> Vec<ValidationWarning> {
        let mut warnings = Vec::new();

        match config.tls_mode() {
            TlsMode::Insecure => warnings.push(ValidationWarning::new(
                ValidationLevel::Warning,
                "TLS certificate verification is disabled".to_string(),
            )),
            TlsMode::Off if config.ssl_verify_certificate => warnings.push(ValidationWarning::new(
                ValidationLevel::Info,
                "Certificate verification is ignored because TLS is disabled".to_string(),
            )),
            _ => {}
        }

        warnings
    }

    fn validate_run_shape(config: &Config) -> Vec<ValidationWarning> {
        let mut warnings = Vec::new();

        if config.interval_secs == 0.0 && config.message_count > 1000 {
            warnings.push(ValidationWarning::new(
                ValidationLevel::Warning,
                format!(
                    "Sending {} messages with no interval may overload the broker",
                    config.message_count
                ),
            ));
        }

        let send_phase = config.message_count as f64 * config.interval_secs;
        if send_phase > 3600.0 {
            warnings.push(ValidationWarning::new(
                ValidationLevel::Info,
                format!("The send phase alone will take about {:.1} hours", send_phase / 3600.0),
            ));
        }

        if config.timeout_seconds > 300 {
            warnings.push(ValidationWarning::new(
                ValidationLevel::Info,
                format!(
                    "Long timeout of {}s will delay the end of the run when messages are lost",
                    config.timeout_seconds
                ),
            ));
        }

        if config.data_string_length == 0 {
            warnings.push(ValidationWarning::new(
                ValidationLevel::Info,
                "Messages will carry an empty data string".to_string(),
            ));
        } else if config.data_string_length > LARGE_PAYLOAD_BYTES {
            warnings.push(ValidationWarning::new(
                ValidationLevel::Warning,
                format!(
                    "Data string of {} bytes may exceed the broker's maximum packet size",
                    config.data_string_length
                ),
            ));
        }

        warnings
    }

    fn validate_results_dir(config: &Config) -> Vec<ValidationWarning> {
        if config.results_dir.exists() {
            return Vec::new();
        }

        vec![ValidationWarning::new(
            ValidationLevel::Info,
            format!("Results directory {} will be created", config.results_dir.display()),
        )]
    }
}

/// Validation warning levels
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationLevel {
    Info,
    Warning,
    Error,
}

impl ValidationLevel {
    /// Get display string for level
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "INFO",
            Self::Warning => "WARNING",
            Self::Error => "ERROR",
        }
    }
}

/// Configuration validation warning
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    pub level: ValidationLevel,
    pub message: String,
}

impl ValidationWarning {
    /// Create a new validation warning
    pub fn new(level: ValidationLevel, message: String) -> Self {
        Self { level, message }
    }

    /// Format warning for display
    pub fn format(&self, use_color: bool) -> String {
        use colored::Colorize;

        let tag = format!("[{}]", self.level.as_str());
        if !use_color {
            return format!("{} {}", tag, self.message);
        }

        let tag = match self.level {
            ValidationLevel::Info => tag.blue(),
            ValidationLevel::Warning => tag.yellow(),
            ValidationLevel::Error => tag.red(),
        };
        format!("{} {}", tag, self.message)
    }
}

/// Convenience function for comprehensive configuration validation
pub fn validate_config(config: &Config) -> Result<Vec<ValidationWarning>> {
    ConfigValidator::validate_comprehensive(config)
}
