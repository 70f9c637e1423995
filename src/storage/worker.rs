//! Single consumer of the persistence queue
//!
//! Runs on a blocking thread so SQLite I/O never stalls the async tasks that
//! classify outcomes. A failed insert is logged and skipped; it never ends
//! the run.

use super::ResultSink;
use crate::logging::Logger;
use crate::models::{Outcome, ResultRecord};
use std::io::{self, Write};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Item on the persistence queue
#[derive(Debug, Clone, PartialEq)]
pub enum PersistCommand {
    Record(Outcome),
    /// Enqueued after the last outcome; the worker stops when it sees it
    Shutdown,
}

/// How the worker reports inserts on stdout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressMode {
    Silent,
    /// Rewrite a single status line after every insert
    Line,
    /// One line per stored row
    Verbose,
}

/// What the worker hands back once it stops
pub struct WorkerReport {
    pub sink: Box<dyn ResultSink>,
    pub written: usize,
    pub errors: usize,
    pub last_index: Option<u32>,
}

impl std::fmt::Debug for WorkerReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerReport")
            .field("location", &self.sink.location())
            .field("written", &self.written)
            .field("errors", &self.errors)
            .field("last_index", &self.last_index)
            .finish()
    }
}

pub struct PersistenceWorker {
    sink: Box<dyn ResultSink>,
    progress: ProgressMode,
    logger: Logger,
    written: usize,
    errors: usize,
    last_index: Option<u32>,
    line_open: bool,
}

impl PersistenceWorker {
    pub fn new(sink: Box<dyn ResultSink>, progress: ProgressMode, logger: Logger) -> Self {
        Self {
            sink,
            progress,
            logger,
            written: 0,
            errors: 0,
            last_index: None,
            line_open: false,
        }
    }

    /// Consume the queue on a blocking thread until `Shutdown` or until
    /// every sender is dropped
    pub fn spawn(self, rx: mpsc::Receiver<PersistCommand>) -> JoinHandle<WorkerReport> {
        tokio::task::spawn_blocking(move || self.run(rx))
    }

    fn run(mut self, mut rx: mpsc::Receiver<PersistCommand>) -> WorkerReport {
        while let Some(command) = rx.blocking_recv() {
            match command {
                PersistCommand::Record(outcome) => self.store(&outcome),
                PersistCommand::Shutdown => break,
            }
        }

        self.close_line();
        self.logger
            .debug("Persistence worker stopped")
            .field("written", self.written)
            .field("errors", self.errors)
            .log();

        WorkerReport {
            sink: self.sink,
            written: self.written,
            errors: self.errors,
            last_index: self.last_index,
        }
    }

    /// Write one outcome; errors are logged and counted
    pub fn store(&mut self, outcome: &Outcome) {
        let record = ResultRecord::from(outcome);
        match self.sink.insert(&record) {
            Ok(()) => {
                self.written += 1;
                self.last_index = Some(record.message_index);
                self.report_progress(&record);
            }
            Err(e) => {
                self.errors += 1;
                self.close_line();
                let last = self
                    .last_index
                    .map(|i| i.to_string())
                    .unwrap_or_else(|| "none".to_string());
                self.logger
                    .error(&format!(
                        "Error inserting into results table: {}, Last successful MessageIndex: {}",
                        e, last
                    ))
                    .field("message_index", record.message_index)
                    .log();
            }
        }
    }

    fn report_progress(&mut self, record: &ResultRecord) {
        let mut out = io::stdout().lock();
        match self.progress {
            ProgressMode::Silent => {}
            ProgressMode::Line => {
                let _ = write!(out, "\r\x1b[KLatest Result Insert: MessageIndex {}. ", record.message_index);
                let _ = out.flush();
                self.line_open = true;
            }
            ProgressMode::Verbose => {
                let delay = record
                    .delay_ms
                    .map(|d| format!("{:.4} ms", d))
                    .unwrap_or_else(|| "-".to_string());
                let _ = writeln!(
                    out,
                    "Stored MessageIndex {}: {} ({})",
                    record.message_index, record.status, delay
                );
            }
        }
    }

    /// Terminate the status line so later output starts on a fresh line
    fn close_line(&mut self) {
        if self.line_open {
            let mut out = io::stdout().lock();
            let _ = writeln!(out);
            let _ = out.flush();
            self.line_open = false;
        }
    }
}
