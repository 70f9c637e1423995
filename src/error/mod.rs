//! Error type shared by every layer of the load tester
//!
//! Each variant maps to one row of [`PROFILES`]: a category used in logs,
//! the process exit code, whether a run survives it, and the hint printed
//! under the error on the console.

use colored::{Color, Colorize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    /// Bad or conflicting settings; nothing was sent
    #[error("Configuration error: {0}")]
    Config(String),

    /// Transport, TLS or authentication failure, refused CONNACK
    #[error("Connection error: {0}")]
    Connection(String),

    /// A publish request was not accepted by the session
    #[error("Publish error: {0}")]
    Publish(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Timeout error: {0}")]
    Timeout(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("I/O error: {0}")]
    Io(String),

    /// Undecodable payloads and malformed numbers
    #[error("Parsing error: {0}")]
    Parse(String),

    #[error("Report error: {0}")]
    Report(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

struct Profile {
    category: &'static str,
    exit_code: i32,
    recoverable: bool,
    color: Color,
    headline: &'static str,
    hint: &'static str,
}

const PROFILES: [Profile; 10] = [
    Profile {
        category: "CONFIG",
        exit_code: 1,
        recoverable: false,
        color: Color::Red,
        headline: "Configuration problem",
        hint: "Suggestion: Check your .env file or command line arguments.",
    },
    Profile {
        category: "CONNECTION",
        exit_code: 2,
        recoverable: false,
        color: Color::Yellow,
        headline: "Could not connect to the broker",
        hint: "Suggestion: Check host, port, credentials and the protocol/TLS combination.",
    },
    Profile {
        category: "PUBLISH",
        exit_code: 2,
        recoverable: true,
        color: Color::Yellow,
        headline: "Publishing failed",
        hint: "Suggestion: The broker session may have dropped. Check broker logs and connectivity.",
    },
    Profile {
        category: "STORAGE",
        exit_code: 5,
        recoverable: true,
        color: Color::Cyan,
        headline: "Result storage failed",
        hint: "Suggestion: Check write permissions and free space in the results directory.",
    },
    Profile {
        category: "TIMEOUT",
        exit_code: 3,
        recoverable: true,
        color: Color::Blue,
        headline: "Operation timed out",
        hint: "Suggestion: Increase --timeout or --connect-timeout, or check the broker's responsiveness.",
    },
    Profile {
        category: "VALIDATION",
        exit_code: 1,
        recoverable: false,
        color: Color::Red,
        headline: "Invalid input",
        hint: "Suggestion: Check the format of your configuration values.",
    },
    Profile {
        category: "IO",
        exit_code: 5,
        recoverable: false,
        color: Color::Cyan,
        headline: "File operation failed",
        hint: "Suggestion: Check file permissions and disk space.",
    },
    Profile {
        category: "PARSE",
        exit_code: 1,
        recoverable: true,
        color: Color::Red,
        headline: "Failed to parse data",
        hint: "Suggestion: Another client may be publishing on the test topic.",
    },
    Profile {
        category: "REPORT",
        exit_code: 6,
        recoverable: false,
        color: Color::Cyan,
        headline: "Report generation failed",
        hint: "Suggestion: The results file is still available for manual inspection.",
    },
    Profile {
        category: "INTERNAL",
        exit_code: 99,
        recoverable: false,
        color: Color::BrightRed,
        headline: "Internal error",
        hint: "This is likely a bug. Please report this issue with the error details.",
    },
];

impl AppError {
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config(message.into())
    }

    pub fn connection<S: Into<String>>(message: S) -> Self {
        Self::Connection(message.into())
    }

    pub fn publish<S: Into<String>>(message: S) -> Self {
        Self::Publish(message.into())
    }

    pub fn storage<S: Into<String>>(message: S) -> Self {
        Self::Storage(message.into())
    }

    pub fn timeout<S: Into<String>>(message: S) -> Self {
        Self::Timeout(message.into())
    }

    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation(message.into())
    }

    pub fn io<S: Into<String>>(message: S) -> Self {
        Self::Io(message.into())
    }

    pub fn parse<S: Into<String>>(message: S) -> Self {
        Self::Parse(message.into())
    }

    pub fn report<S: Into<String>>(message: S) -> Self {
        Self::Report(message.into())
    }

    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal(message.into())
    }

    fn slot(&self) -> usize {
        match self {
            Self::Config(_) => 0,
            Self::Connection(_) => 1,
            Self::Publish(_) => 2,
            Self::Storage(_) => 3,
            Self::Timeout(_) => 4,
            Self::Validation(_) => 5,
            Self::Io(_) => 6,
            Self::Parse(_) => 7,
            Self::Report(_) => 8,
            Self::Internal(_) => 9,
        }
    }

    fn profile(&self) -> &'static Profile {
        &PROFILES[self.slot()]
    }

    /// The bare message, without the variant prefix
    pub fn message(&self) -> &str {
        match self {
            Self::Config(msg)
            | Self::Connection(msg)
            | Self::Publish(msg)
            | Self::Storage(msg)
            | Self::Timeout(msg)
            | Self::Validation(msg)
            | Self::Io(msg)
            | Self::Parse(msg)
            | Self::Report(msg)
            | Self::Internal(msg) => msg,
        }
    }

    /// Same variant, message rewritten
    fn map_message(self, f: impl FnOnce(String) -> String) -> Self {
        match self {
            Self::Config(msg) => Self::Config(f(msg)),
            Self::Connection(msg) => Self::Connection(f(msg)),
            Self::Publish(msg) => Self::Publish(f(msg)),
            Self::Storage(msg) => Self::Storage(f(msg)),
            Self::Timeout(msg) => Self::Timeout(f(msg)),
            Self::Validation(msg) => Self::Validation(f(msg)),
            Self::Io(msg) => Self::Io(f(msg)),
            Self::Parse(msg) => Self::Parse(f(msg)),
            Self::Report(msg) => Self::Report(f(msg)),
            Self::Internal(msg) => Self::Internal(f(msg)),
        }
    }

    /// Upper-case category used in logs and on the console
    pub fn category(&self) -> &'static str {
        self.profile().category
    }

    /// Whether the run goes on after this error
    pub fn is_recoverable(&self) -> bool {
        self.profile().recoverable
    }

    pub fn exit_code(&self) -> i32 {
        self.profile().exit_code
    }

    /// Headline, message and a hint on what to check
    pub fn user_friendly_message(&self) -> String {
        let profile = self.profile();
        format!("{}: {}\n\n{}", profile.headline, self.message(), profile.hint)
    }

    /// `[CATEGORY] message`, colored by category when asked to
    pub fn format_for_console(&self, use_color: bool) -> String {
        let profile = self.profile();
        let text = self.to_string();
        if use_color {
            format!(
                "[{}] {}",
                profile.category.color(profile.color).bold(),
                text.color(profile.color)
            )
        } else {
            format!("[{}] {}", profile.category, text)
        }
    }
}

impl From<std::io::Error> for AppError {
    fn from(error: std::io::Error) -> Self {
        Self::io(error.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(error: serde_json::Error) -> Self {
        Self::parse(format!("JSON parse error: {}", error))
    }
}

impl From<rusqlite::Error> for AppError {
    fn from(error: rusqlite::Error) -> Self {
        Self::storage(error.to_string())
    }
}

impl From<rumqttc::ClientError> for AppError {
    fn from(error: rumqttc::ClientError) -> Self {
        Self::publish(error.to_string())
    }
}

impl From<rumqttc::ConnectionError> for AppError {
    fn from(error: rumqttc::ConnectionError) -> Self {
        Self::connection(error.to_string())
    }
}

impl From<url::ParseError> for AppError {
    fn from(error: url::ParseError) -> Self {
        Self::config(format!("Invalid broker URL: {}", error))
    }
}

impl From<dotenv::Error> for AppError {
    fn from(error: dotenv::Error) -> Self {
        Self::config(format!("Environment file error: {}", error))
    }
}

impl From<std::num::ParseIntError> for AppError {
    fn from(error: std::num::ParseIntError) -> Self {
        Self::parse(format!("Integer parse error: {}", error))
    }
}

impl From<std::num::ParseFloatError> for AppError {
    fn from(error: std::num::ParseFloatError) -> Self {
        Self::parse(format!("Float parse error: {}", error))
    }
}

impl From<tokio::task::JoinError> for AppError {
    fn from(error: tokio::task::JoinError) -> Self {
        Self::internal(format!("Background task failed: {}", error))
    }
}

impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        Self::internal(format!("{:#}", error))
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

/// Prefix an error with what was being done, keeping its variant (and so
/// its exit code)
pub trait ErrorContext<T> {
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;

    fn context(self, message: &'static str) -> Result<T>;
}

impl<T, E> ErrorContext<T> for std::result::Result<T, E>
where
    E: Into<AppError>,
{
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| {
            let context = f();
            e.into().map_message(|msg| format!("{}: {}", context, msg))
        })
    }

    fn context(self, message: &'static str) -> Result<T> {
        self.with_context(|| message.to_string())
    }
}

/// Prints the error that ended the process
pub struct ErrorReporter {
    pub use_color: bool,
    /// Also print the headline and hint
    pub explain: bool,
}

impl ErrorReporter {
    pub fn new(use_color: bool, explain: bool) -> Self {
        Self { use_color, explain }
    }

    /// Text written to stderr for `error`
    pub fn render(&self, error: &AppError) -> String {
        let mut text = error.format_for_console(self.use_color);
        if self.explain {
            text.push_str("\n\n");
            text.push_str(&error.user_friendly_message());
        }
        text
    }

    pub fn report_error(&self, error: &AppError) {
        eprintln!("{}", self.render(error));
    }
}
