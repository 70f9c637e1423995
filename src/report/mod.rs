//! Post-run report
//!
//! Runs after the result sink is closed: reads every stored row back,
//! computes the delay statistics and renders the chart and tables. The text
//! goes to the terminal and, uncolored, to `<db stem>_report.txt` next to
//! the database.

pub mod chart;

pub use chart::{chart_bars, ChartBar, PLACEHOLDER_RATIO};

use crate::error::{AppError, Result};
use crate::logging::Logger;
use crate::models::ResultRecord;
use crate::output::{OutputFormatter, OutputFormatterFactory};
use crate::stats::{DelayStatistics, MessageTally};
use crate::storage::load_records;
use std::path::{Path, PathBuf};

/// Everything a rendered report shows
#[derive(Debug, Clone, PartialEq)]
pub struct LoadTestReport {
    pub title: String,
    pub bars: Vec<ChartBar>,
    pub stats: Option<DelayStatistics>,
    pub tally: MessageTally,
}

impl LoadTestReport {
    pub fn from_records(title: impl Into<String>, records: &[ResultRecord]) -> Self {
        Self {
            title: title.into(),
            bars: chart_bars(records),
            stats: DelayStatistics::from_records(records),
            tally: MessageTally::from_records(records),
        }
    }

    pub fn render(&self, formatter: &dyn OutputFormatter) -> Result<String> {
        let sections = [
            formatter.format_header(&self.title)?,
            formatter.format_delay_chart(&self.bars)?,
            formatter.format_delay_summary(self.stats.as_ref())?,
            formatter.format_message_table(&self.tally)?,
        ];
        Ok(sections.join("\n\n"))
    }
}

/// A report written to disk
#[derive(Debug, Clone)]
pub struct GeneratedReport {
    pub report: LoadTestReport,
    /// Rendered with the terminal formatter
    pub terminal_text: String,
    pub file_path: PathBuf,
}

/// Builds the report of one results database
pub struct ReportGenerator {
    db_path: PathBuf,
    logger: Logger,
}

impl ReportGenerator {
    pub fn new(db_path: impl Into<PathBuf>, logger: Logger) -> Self {
        Self {
            db_path: db_path.into(),
            logger,
        }
    }

    /// Database file name without its extension
    pub fn db_stem(&self) -> String {
        self.db_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "results".to_string())
    }

    /// `<db stem>_report.txt` beside the database
    pub fn report_path(&self) -> PathBuf {
        let file_name = format!("{}_report.txt", self.db_stem());
        match self.db_path.parent() {
            Some(dir) => dir.join(file_name),
            None => PathBuf::from(file_name),
        }
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    /// Read the database, render the report and write the text file
    pub fn generate(&self, terminal: &dyn OutputFormatter, verbose: bool) -> Result<GeneratedReport> {
        let records = load_records(&self.db_path)
            .map_err(|e| AppError::report(format!("Cannot read {}: {}", self.db_path.display(), e)))?;

        let report = LoadTestReport::from_records(
            format!("Message Delay Visualization - {}", self.db_stem()),
            &records,
        );

        let file_text = report.render(OutputFormatterFactory::create_file_formatter(verbose).as_ref())?;
        let file_path = self.report_path();
        std::fs::write(&file_path, format!("{}\n", file_text))
            .map_err(|e| AppError::report(format!("Cannot write {}: {}", file_path.display(), e)))?;

        self.logger
            .info("Report written")
            .field("path", file_path.display().to_string())
            .field("rows", records.len())
            .log();

        Ok(GeneratedReport {
            terminal_text: report.render(terminal)?,
            report,
            file_path,
        })
    }
}
