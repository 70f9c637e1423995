//! MQTT Load Tester
//!
//! Connects to an MQTT broker, publishes a configured number of timestamped
//! messages, echoes every received message back on a return sub-topic and
//! measures the round-trip delay of each one. Every message resolves to
//! exactly one outcome (success, timeout or failed) which is persisted to a
//! SQLite file and summarized in a report after the run.

pub mod app;
pub mod broker;
pub mod cli;
pub mod clock;
pub mod config;
pub mod error;
pub mod executor;
pub mod logging;
pub mod models;
pub mod output;
pub mod report;
pub mod stats;
pub mod storage;
pub mod tracker;
pub mod types;

// Re-export commonly used types
pub use error::{AppError, Result};
pub use models::{Config, Outcome, ResultRecord};
pub use tracker::{MessageTracker, RunCounts};
pub use storage::{ResultSink, SqliteResultSink, MemoryResultSink};
pub use stats::DelayStatistics;
pub use output::{OutputFormatter, ColoredFormatter, PlainFormatter, OutputFormatterFactory};

/// Application version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const PKG_NAME: &str = env!("CARGO_PKG_NAME");
pub const PKG_DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");
pub const BUILD_TIME: &str = env!("BUILD_TIME");
pub const GIT_COMMIT: &str = env!("GIT_COMMIT");

/// Default configuration values
pub mod defaults {
    use std::time::Duration;

    pub const DEFAULT_CLIENT_ID: &str = "mqtt-load-tester";
    pub const DEFAULT_PORT: u16 = 1883;
    pub const DEFAULT_PROTOCOL: &str = "mqtt";
    pub const DEFAULT_MESSAGE_COUNT: u32 = 10;
    pub const DEFAULT_INTERVAL_SECS: f64 = 1.0;
    pub const DEFAULT_DATA_STRING_LENGTH: usize = 55;
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);
    pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
    pub const DEFAULT_KEEP_ALIVE: Duration = Duration::from_secs(60);

    /// Upper bound for the timeouts and the send interval (one week)
    pub const MAX_WAIT: Duration = Duration::from_secs(7 * 24 * 60 * 60);
    pub const DEFAULT_RESULTS_DIR: &str = ".";
    pub const DEFAULT_ENABLE_COLOR: bool = true;

    /// Capacity of the inbound event channel and the persistence queue
    pub const CHANNEL_CAPACITY: usize = 1024;

    /// Text used for the message `Data` field
    pub const PAYLOAD_TEXT: &str = "Lorem ipsum dolor sit amet";

    /// Suffix of the sub-topic that carries round-trip echoes
    pub const RETURN_SUFFIX: &str = "return";

    /// Prefix shared by every environment variable the tool reads
    pub const ENV_PREFIX: &str = "MQTT_TESTERI_";
}
