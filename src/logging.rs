//! Component loggers for a load-test run
//!
//! Every logger created by one [`LoggerFactory`] shares the run's session id
//! and any context fields added later (the broker adds its client id). Lines
//! are written synchronously, so async tasks, the timer wheel and the
//! blocking persistence thread all log the same way.
//!
//! Console lines look like
//! `2024-01-01 12:00:00.000  WARN [TRACK] message {index=3}`; `--debug`
//! switches to one JSON object per line.

use crate::error::AppError;
use crate::models::Config;
use chrono::{DateTime, Utc};
use colored::{Color, Colorize};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::io::{self, Write};
use std::sync::{Arc, RwLock};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn label(self) -> &'static str {
        match self {
            LogLevel::Trace => "TRACE",
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
        }
    }

    fn color(self) -> Color {
        match self {
            LogLevel::Trace => Color::White,
            LogLevel::Debug => Color::Cyan,
            LogLevel::Info => Color::Green,
            LogLevel::Warn => Color::Yellow,
            LogLevel::Error => Color::Red,
        }
    }
}

/// How a logger renders its lines
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogStyle {
    Console,
    Json,
}

/// One log line before rendering
#[derive(Debug, Clone, Serialize)]
pub struct Record {
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub logger: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub fields: BTreeMap<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

/// State shared by a logger and its clones
#[derive(Debug, Default)]
struct Shared {
    session_id: Option<String>,
    fields: BTreeMap<String, Value>,
}

#[derive(Debug, Clone)]
pub struct Logger {
    name: String,
    /// `None` drops every line
    threshold: Option<LogLevel>,
    style: LogStyle,
    use_color: bool,
    with_source: bool,
    shared: Arc<RwLock<Shared>>,
}

impl Logger {
    /// Console logger at `Info`
    pub fn new(name: String) -> Self {
        Self {
            name,
            threshold: Some(LogLevel::Info),
            style: LogStyle::Console,
            use_color: true,
            with_source: false,
            shared: Arc::default(),
        }
    }

    /// Level and style follow `--verbose` and `--debug`
    pub fn with_config(name: String, config: &Config) -> Self {
        let threshold = if config.debug || config.verbose {
            LogLevel::Debug
        } else {
            LogLevel::Warn
        };

        Self {
            threshold: Some(threshold),
            style: if config.debug { LogStyle::Json } else { LogStyle::Console },
            use_color: config.enable_color,
            with_source: config.debug,
            ..Self::new(name)
        }
    }

    /// A logger that writes nothing, for tests and embedding
    pub fn quiet(name: &str) -> Self {
        Self {
            threshold: None,
            ..Self::new(name.to_string())
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_level(&mut self, level: LogLevel) {
        self.threshold = Some(level);
    }

    pub fn set_style(&mut self, style: LogStyle) {
        self.style = style;
    }

    pub fn set_color(&mut self, use_color: bool) {
        self.use_color = use_color;
    }

    pub fn set_session_id(&self, session_id: String) {
        if let Ok(mut shared) = self.shared.write() {
            shared.session_id = Some(session_id);
        }
    }

    /// Attach a field to every later line of this logger and its clones
    pub fn add_context_field<T: Serialize>(&self, key: String, value: T) {
        let Ok(value) = serde_json::to_value(value) else {
            return;
        };
        if let Ok(mut shared) = self.shared.write() {
            shared.fields.insert(key, value);
        }
    }

    pub fn enabled(&self, level: LogLevel) -> bool {
        self.threshold.is_some_and(|threshold| level >= threshold)
    }

    /// Start a line at `level`; nothing is built when the level is filtered
    pub fn log(&self, level: LogLevel, message: &str) -> EntryBuilder<'_> {
        let record = self.enabled(level).then(|| Record {
            timestamp: Utc::now(),
            level,
            logger: self.name.clone(),
            message: message.to_string(),
            correlation_id: None,
            fields: BTreeMap::new(),
            source: None,
        });
        EntryBuilder { logger: self, record }
    }

    pub fn trace(&self, message: &str) -> EntryBuilder<'_> {
        self.log(LogLevel::Trace, message)
    }

    pub fn debug(&self, message: &str) -> EntryBuilder<'_> {
        self.log(LogLevel::Debug, message)
    }

    pub fn info(&self, message: &str) -> EntryBuilder<'_> {
        self.log(LogLevel::Info, message)
    }

    pub fn warn(&self, message: &str) -> EntryBuilder<'_> {
        self.log(LogLevel::Warn, message)
    }

    pub fn error(&self, message: &str) -> EntryBuilder<'_> {
        self.log(LogLevel::Error, message)
    }

    fn emit(&self, mut record: Record) {
        if let Ok(shared) = self.shared.read() {
            if let Some(session_id) = &shared.session_id {
                record
                    .fields
                    .insert("session_id".to_string(), Value::String(session_id.clone()));
            }
            record.fields.extend(shared.fields.iter().map(|(k, v)| (k.clone(), v.clone())));
        }

        let line = self.render(&record);
        // stdout stays free for progress and the report
        if record.level >= LogLevel::Warn {
            let _ = writeln!(io::stderr(), "{}", line);
        } else {
            let _ = writeln!(io::stdout(), "{}", line);
        }
    }

    fn render(&self, record: &Record) -> String {
        match self.style {
            LogStyle::Json => serde_json::to_string(record)
                .unwrap_or_else(|e| format!("{{\"logger\":{:?},\"error\":\"{}\"}}", record.logger, e)),
            LogStyle::Console => self.render_console(record),
        }
    }

    fn render_console(&self, record: &Record) -> String {
        let level = format!("{:>5}", record.level.label());
        let level = if self.use_color {
            level.color(record.level.color()).to_string()
        } else {
            level
        };

        let mut line = format!(
            "{} {} [{}] {}",
            record.timestamp.format("%Y-%m-%d %H:%M:%S%.3f"),
            level,
            record.logger,
            record.message
        );

        if let Some(id) = &record.correlation_id {
            let short: String = id.chars().take(8).collect();
            line.push_str(&format!(" [{}]", short));
        }

        // The session id is the same on every line, so the console omits it
        let fields: Vec<String> = record
            .fields
            .iter()
            .filter(|(key, _)| key.as_str() != "session_id")
            .map(|(key, value)| format!("{}={}", key, value))
            .collect();
        if !fields.is_empty() {
            line.push_str(&format!(" {{{}}}", fields.join(", ")));
        }

        if self.with_source {
            if let Some(source) = &record.source {
                line.push_str(&format!(" @ {}", source));
            }
        }

        line
    }
}

/// A line being assembled; [`EntryBuilder::log`] writes it
pub struct EntryBuilder<'a> {
    logger: &'a Logger,
    record: Option<Record>,
}

impl EntryBuilder<'_> {
    pub fn correlation_id(mut self, id: &str) -> Self {
        if let Some(record) = &mut self.record {
            record.correlation_id = Some(id.to_string());
        }
        self
    }

    pub fn field<T: Serialize>(mut self, key: &str, value: T) -> Self {
        if let Some(record) = &mut self.record {
            if let Ok(value) = serde_json::to_value(value) {
                record.fields.insert(key.to_string(), value);
            }
        }
        self
    }

    pub fn at(mut self, file: &str, line: u32) -> Self {
        if let Some(record) = &mut self.record {
            record.source = Some(format!("{}:{}", file, line));
        }
        self
    }

    pub fn error_info(self, error: &AppError) -> Self {
        self.field("error_category", error.category())
            .field("error_recoverable", error.is_recoverable())
            .field("error_exit_code", error.exit_code())
    }

    pub fn log(self) {
        if let Some(record) = self.record {
            self.logger.emit(record);
        }
    }
}

/// Logs an [`AppError`] together with its category and exit code
#[derive(Debug, Clone)]
pub struct ErrorEventLogger {
    logger: Logger,
}

impl ErrorEventLogger {
    pub fn new(logger: Logger) -> Self {
        Self { logger }
    }

    pub fn log_error(&self, error: &AppError, context: Option<&str>, correlation_id: Option<&str>) {
        let message = match context {
            Some(context) => format!("{}: {}", context, error),
            None => error.to_string(),
        };

        let mut entry = self.logger.error(&message).error_info(error);
        if let Some(id) = correlation_id {
            entry = entry.correlation_id(id);
        }
        entry.log();
    }
}

/// Hands out loggers that share one session id
pub struct LoggerFactory {
    config: Config,
    session_id: String,
}

impl LoggerFactory {
    pub const BROKER: &'static str = "MQTT";
    pub const TRACKER: &'static str = "TRACK";
    pub const STORAGE: &'static str = "STORE";
    pub const REPORT: &'static str = "REPORT";
    const ERRORS: &'static str = "ERR";

    pub fn new(config: Config) -> Self {
        Self {
            config,
            session_id: Uuid::new_v4().to_string(),
        }
    }

    pub fn create_logger(&self, name: &str) -> Logger {
        let logger = Logger::with_config(name.to_string(), &self.config);
        logger.set_session_id(self.session_id.clone());
        logger
    }

    pub fn create_error_logger(&self) -> ErrorEventLogger {
        ErrorEventLogger::new(self.create_logger(Self::ERRORS))
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }
}

/// Trace line tagged with its source location
#[macro_export]
macro_rules! log_trace {
    ($logger:expr, $($arg:tt)*) => {
        $logger.trace(&format!($($arg)*)).at(file!(), line!()).log()
    };
}

/// Debug line tagged with its source location
#[macro_export]
macro_rules! log_debug {
    ($logger:expr, $($arg:tt)*) => {
        $logger.debug(&format!($($arg)*)).at(file!(), line!()).log()
    };
}
