//! Configuration parsing from CLI arguments and environment variables

use crate::{
    cli::Cli,
    config::env::EnvManager,
    error::Result,
    models::Config,
};

/// Configuration parser that combines CLI arguments with environment variables
pub struct ConfigParser {
    cli: Cli,
}

impl ConfigParser {
    /// Create a new configuration parser with CLI arguments
    pub fn new(cli: Cli) -> Self {
        Self { cli }
    }

    /// Parse and build the complete configuration
    pub fn parse(&self) -> Result<Config> {
        let mut config = Config::default();

        EnvManager::load_env_file(self.cli.debug)?;

        config.merge_from_env()?;

        self.apply_cli_overrides(&mut config);

        config.validate()?;

        Ok(config)
    }

    /// Apply CLI argument overrides to configuration
    fn apply_cli_overrides(&self, config: &mut Config) {
        let cli = &self.cli;

        if let Some(ref host) = cli.host {
            config.host = host.clone();
        }
        if let Some(port) = cli.port {
            config.port = port;
        }
        if let Some(ref protocol) = cli.protocol {
            config.protocol = protocol.clone();
        }
        if let Some(ref username) = cli.username {
            config.username = Some(username.clone());
        }
        if let Some(ref password) = cli.password {
            config.password = Some(password.clone());
        }
        if let Some(ref client_id) = cli.client_id {
            config.client_id = client_id.clone();
        }
        if let Some(ref topic) = cli.topic {
            config.topic = topic.clone();
        }
        if let Some(ssl_enabled) = cli.ssl_enabled {
            config.ssl_enabled = ssl_enabled;
        }
        if let Some(verify) = cli.ssl_verify_certificate {
            config.ssl_verify_certificate = verify;
        }
        if let Some(count) = cli.message_count {
            config.message_count = count;
        }
        if let Some(interval) = cli.interval {
            config.interval_secs = interval;
        }
        if let Some(length) = cli.data_string_length {
            config.data_string_length = length;
        }
        if let Some(timeout) = cli.timeout {
            config.timeout_seconds = timeout;
        }
        if let Some(timeout) = cli.connect_timeout {
            config.connect_timeout_seconds = timeout;
        }
        if let Some(ref dir) = cli.results_dir {
            config.results_dir = dir.clone();
        }
        if let Some(verbose) = cli.verbose {
            config.verbose = verbose;
        }

        if cli.no_report {
            config.generate_report = false;
        }

        if cli.no_color {
            config.enable_color = false;
        } else if cli.color {
            config.enable_color = true;
        }

        config.debug = cli.debug;
    }
}

/// Convenience function to load complete configuration from CLI arguments
pub fn load_config(cli: Cli) -> Result<Config> {
    ConfigParser::new(cli).parse()
}

/// Display configuration summary for debug purposes
pub fn display_config_summary(config: &Config) -> String {
    let mut summary = Vec::new();

    summary.push(format!("Broker: {}://{}:{}", config.protocol, config.host, config.port));
    summary.push(format!("Client ID: {}", config.client_id));
    summary.push(format!("Topic: {}", config.topic));
    summary.push(format!(
        "Username: {}",
        config.username.as_deref().unwrap_or("(none)")
    ));
    summary.push(format!("TLS: {:?}", config.tls_mode()));
    summary.push(format!("Message Count: {}", config.message_count));
    summary.push(format!("Interval: {}s", config.interval_secs));
    summary.push(format!("Data String Length: {}", config.data_string_length));
    summary.push(format!("Timeout: {}s", config.timeout_seconds));
    summary.push(format!("Connect Timeout: {}s", config.connect_timeout_seconds));
    summary.push(format!("Results Dir: {}", config.results_dir.display()));
    summary.push(format!("Report: {}", config.generate_report));
    summary.push(format!("Color Output: {}", config.enable_color));
    summary.push(format!("Verbose: {}", config.verbose));
    summary.push(format!("Debug: {}", config.debug));

    summary.join("\n")
}
