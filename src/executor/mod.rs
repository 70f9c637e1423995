//! Load test execution
//!
//! Wires one run together: result database, broker session, tracker and
//! report. Ctrl-C ends the run at once: the session is disconnected and the
//! run reports itself as interrupted.

use crate::{
    broker::{BrokerSession, MessageTransport},
    clock,
    defaults::CHANNEL_CAPACITY,
    error::Result,
    logging::LoggerFactory,
    models::Config,
    output::OutputFormatter,
    report::{GeneratedReport, ReportGenerator},
    storage::{ProgressMode, SqliteResultSink},
    tracker::{MessageTracker, RunSummary, TrackerSettings},
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;

/// A run that reached its end
#[derive(Debug)]
pub struct CompletedRun {
    pub summary: RunSummary,
    pub db_path: PathBuf,
    pub started_at: String,
    pub ended_at: String,
    pub report: Option<GeneratedReport>,
}

/// How a run ended
#[derive(Debug)]
pub enum RunOutcome {
    Completed(Box<CompletedRun>),
    /// Stopped by Ctrl-C
    Interrupted,
}

/// Executes one load test for a validated configuration
pub struct LoadTestExecutor {
    config: Config,
    loggers: LoggerFactory,
}

impl LoadTestExecutor {
    pub fn new(config: Config) -> Self {
        let loggers = LoggerFactory::new(config.clone());
        Self { config, loggers }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn session_id(&self) -> &str {
        self.loggers.session_id()
    }

    fn progress_mode(&self) -> ProgressMode {
        if self.config.verbose {
            ProgressMode::Verbose
        } else {
            ProgressMode::Line
        }
    }

    /// Run the test, printing banners and the report through `formatter`
    pub async fn execute(&self, formatter: &dyn OutputFormatter) -> Result<RunOutcome> {
        let config = &self.config;

        let sink = SqliteResultSink::create_in(&config.results_dir)?;
        let db_path = sink.path().to_path_buf();
        self.loggers
            .create_logger(LoggerFactory::STORAGE)
            .info("Results database created")
            .field("path", db_path.display().to_string())
            .log();

        let (inbound_tx, inbound_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let mut session = BrokerSession::start(config, inbound_tx, self.loggers.create_logger(LoggerFactory::BROKER))?;

        let transport: Arc<dyn MessageTransport> = Arc::new(session.transport());
        let tracker = MessageTracker::start(
            TrackerSettings::from_config(config),
            transport,
            inbound_rx,
            Box::new(sink),
            self.progress_mode(),
            self.loggers.create_logger(LoggerFactory::TRACKER),
        );

        let started_at = clock::banner_timestamp();
        println!(
            "{}",
            formatter.format_start_banner(&started_at, config.message_count, config.interval_secs)?
        );

        let connected = session.connected();
        let result = tokio::select! {
            result = tracker.run(connected) => result,
            _ = tokio::signal::ctrl_c() => {
                println!();
                println!("Signal received, initiating graceful shutdown...");
                session.disconnect().await;
                return Ok(RunOutcome::Interrupted);
            }
        };

        session.disconnect().await;
        let summary = result?;

        let report = if config.generate_report {
            self.generate_report(&db_path, formatter)
        } else {
            None
        };

        Ok(RunOutcome::Completed(Box::new(CompletedRun {
            summary,
            db_path,
            started_at,
            ended_at: clock::banner_timestamp(),
            report,
        })))
    }

    /// Report failures are shown but never fail the run; the rows are
    /// already on disk
    fn generate_report(&self, db_path: &Path, formatter: &dyn OutputFormatter) -> Option<GeneratedReport> {
        let generator = ReportGenerator::new(db_path, self.loggers.create_logger(LoggerFactory::REPORT));
        match generator.generate(formatter, self.config.verbose) {
            Ok(report) => Some(report),
            Err(e) => {
                self.loggers
                    .create_error_logger()
                    .log_error(&e, Some("Report generation failed"), Some(self.session_id()));
                if let Ok(line) = formatter.format_warning(&format!("Report not generated: {}", e)) {
                    eprintln!("{}", line);
                }
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::OutputFormatterFactory;
    use tempfile::TempDir;

    fn config(dir: &TempDir) -> Config {
        Config {
            // Nothing listens on port 1 of the loopback interface
            host: "127.0.0.1".to_string(),
            port: 1,
            topic: "load".to_string(),
            message_count: 2,
            interval_secs: 0.0,
            connect_timeout_seconds: 1,
            results_dir: dir.path().to_path_buf(),
            generate_report: false,
            ..Config::default()
        }
    }

    #[test]
    fn test_progress_mode_follows_verbose() {
        let dir = TempDir::new().unwrap();
        let mut cfg = config(&dir);
        assert_eq!(LoadTestExecutor::new(cfg.clone()).progress_mode(), ProgressMode::Line);
        cfg.verbose = true;
        assert_eq!(LoadTestExecutor::new(cfg).progress_mode(), ProgressMode::Verbose);
    }

    #[tokio::test]
    async fn test_unreachable_broker_is_a_connection_error() {
        let dir = TempDir::new().unwrap();
        let executor = LoadTestExecutor::new(config(&dir));
        let formatter = OutputFormatterFactory::create_formatter(false, false);

        let err = executor.execute(formatter.as_ref()).await.unwrap_err();
        assert_eq!(err.exit_code(), 2);

        // The results database exists even though nothing was sent
        let files: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(files.len(), 1);
    }
}
