//! Core formatting traits and implementations
//!
//! This module defines the output formatting interface and provides
//! a plain text implementation with table formatting capabilities.

use crate::{
    error::{AppError, Result},
    report::ChartBar,
    stats::{DelayStatistics, MessageTally},
    tracker::RunCounts,
    types::OutcomeKind,
};
use std::fmt::Write as _;

/// Main trait for output formatting
pub trait OutputFormatter {
    /// Format a header section
    fn format_header(&self, title: &str) -> Result<String>;

    /// Line printed when sending starts
    fn format_start_banner(&self, started_at: &str, message_count: u32, interval_secs: f64) -> Result<String>;

    /// Line printed once every outcome is known
    fn format_end_banner(&self, ended_at: &str, counts: &RunCounts) -> Result<String>;

    /// One bar per message index
    fn format_delay_chart(&self, bars: &[ChartBar]) -> Result<String>;

    /// Min/max/mean/median (plus spread) of successful delays
    fn format_delay_summary(&self, stats: Option<&DelayStatistics>) -> Result<String>;

    /// Success/failed/total/rate table
    fn format_message_table(&self, tally: &MessageTally) -> Result<String>;

    /// Format error messages
    fn format_error(&self, error: &str) -> Result<String>;

    /// Format warning messages
    fn format_warning(&self, warning: &str) -> Result<String>;

    /// Format success messages
    fn format_success(&self, message: &str) -> Result<String>;
}

/// Configuration options for formatting
#[derive(Debug, Clone)]
pub struct FormattingOptions {
    /// Enable colored output
    pub enable_color: bool,
    /// Enable verbose mode with detailed information
    pub verbose_mode: bool,
    /// Show table borders
    pub table_borders: bool,
    /// Width of the longest chart bar, in characters
    pub chart_width: usize,
}

impl Default for FormattingOptions {
    fn default() -> Self {
        Self {
            enable_color: true,
            verbose_mode: false,
            table_borders: true,
            chart_width: 50,
        }
    }
}

/// Table formatting configuration
#[derive(Debug, Clone)]
pub struct TableFormat {
    /// Column definitions
    pub columns: Vec<Column>,
    /// Show borders around table
    pub show_borders: bool,
    /// Show header row
    pub show_header: bool,
    /// Minimum column width
    pub min_column_width: usize,
    /// Maximum column width
    pub max_column_width: usize,
}

/// Column definition for table formatting
#[derive(Debug, Clone)]
pub struct Column {
    pub header: String,
    pub alignment: Alignment,
    pub min_width: usize,
    pub max_width: usize,
}

impl Column {
    fn right(header: &str, min_width: usize) -> Self {
        Self {
            header: header.to_string(),
            alignment: Alignment::Right,
            min_width,
            max_width: 24,
        }
    }
}

/// Text alignment options
#[derive(Debug, Clone)]
pub enum Alignment {
    Left,
    Right,
    Center,
}

/// Row data for table formatting
pub type RowData = Vec<String>;

/// Interval as the banner prints it: `1.0`, `0.5`, `2.25`
pub fn format_interval(interval_secs: f64) -> String {
    if interval_secs.fract() == 0.0 {
        format!("{:.1}", interval_secs)
    } else {
        format!("{}", interval_secs)
    }
}

/// Delay figure as shown in report tables
pub fn format_ms(value: f64) -> String {
    format!("{:.3}", value)
}

pub(crate) fn start_banner_text(started_at: &str, message_count: u32, interval_secs: f64) -> String {
    format!(
        "Beginning loadtest at {}: Sending {} messages with {} second interval.",
        started_at,
        message_count,
        format_interval(interval_secs)
    )
}

pub(crate) fn end_banner_text(ended_at: &str, counts: &RunCounts) -> String {
    format!(
        "Ending loadtest at {} - Sent {} messages successfully, {} failed and {} timeout messages.",
        ended_at, counts.succeeded, counts.failed, counts.timed_out
    )
}

/// Length of a bar in characters; any non-zero value gets at least one
pub(crate) fn bar_length(value: f64, scale_max: f64, width: usize) -> usize {
    if value <= 0.0 || scale_max <= 0.0 {
        return 0;
    }
    let length = (value / scale_max * width as f64).round() as usize;
    length.clamp(1, width)
}

pub(crate) fn chart_scale(bars: &[ChartBar]) -> f64 {
    bars.iter().map(|b| b.height_ms).fold(0.0, f64::max)
}

pub(crate) fn bar_label(bar: &ChartBar) -> String {
    match bar.status {
        OutcomeKind::Success => bar.delay_ms.map(format_ms).map(|d| format!("{} ms", d)).unwrap_or_default(),
        OutcomeKind::Timeout => "timeout".to_string(),
        OutcomeKind::Failed => "failed".to_string(),
    }
}

/// Plain text formatter implementation
pub struct PlainFormatter {
    options: FormattingOptions,
}

impl PlainFormatter {
    /// Create a new plain formatter with options
    pub fn new(options: FormattingOptions) -> Self {
        Self { options }
    }

    pub(crate) fn delay_table(&self, stats: Option<&DelayStatistics>) -> Result<String> {
        let mut columns = vec![
            Column::right("Min (ms)", 8),
            Column::right("Max (ms)", 8),
            Column::right("Average (ms)", 12),
            Column::right("Median (ms)", 11),
        ];
        if self.options.verbose_mode {
            columns.push(Column::right("Std dev (ms)", 12));
            columns.push(Column::right("P95 (ms)", 8));
        }

        let row = match stats {
            Some(stats) => {
                let mut row = vec![
                    format_ms(stats.min_ms),
                    format_ms(stats.max_ms),
                    format_ms(stats.mean_ms),
                    format_ms(stats.median_ms),
                ];
                if self.options.verbose_mode {
                    row.push(format_ms(stats.std_dev_ms));
                    row.push(format_ms(stats.p95_ms));
                }
                row
            }
            None => vec!["N/A".to_string(); columns.len()],
        };

        self.create_table(&self.table_format(columns), &[row])
    }

    pub(crate) fn tally_table(&self, tally: &MessageTally) -> Result<String> {
        let mut columns = vec![
            Column::right("Msg success", 11),
            Column::right("Msg failed", 10),
            Column::right("Total msgs", 10),
            Column::right("Success rate (%)", 16),
        ];
        let mut row = vec![
            tally.success.to_string(),
            tally.unsuccessful().to_string(),
            tally.total().to_string(),
            format!("{:.2}", tally.success_rate()),
        ];
        if self.options.verbose_mode {
            columns.insert(2, Column::right("of which timeout", 16));
            row.insert(2, tally.timeout.to_string());
        }

        self.create_table(&self.table_format(columns), &[row])
    }

    fn table_format(&self, columns: Vec<Column>) -> TableFormat {
        TableFormat {
            columns,
            show_borders: self.options.table_borders,
            show_header: true,
            min_column_width: 8,
            max_column_width: 24,
        }
    }

    /// Create a table with the given format and data
    fn create_table(&self, format: &TableFormat, rows: &[RowData]) -> Result<String> {
        if rows.is_empty() {
            return Ok(String::new());
        }

        let column_widths = self.calculate_column_widths(format, rows);

        let mut output = String::new();

        if format.show_header && !format.columns.is_empty() {
            if format.show_borders {
                output.push_str(&self.create_horizontal_border(&column_widths));
                output.push('\n');
            }

            let headers: Vec<String> = format.columns.iter().map(|c| c.header.clone()).collect();
            output.push_str(&self.create_row(&headers, &column_widths, format));
            output.push('\n');

            if format.show_borders {
                output.push_str(&self.create_horizontal_border(&column_widths));
                output.push('\n');
            }
        }

        for row in rows {
            output.push_str(&self.create_row(row, &column_widths, format));
            output.push('\n');
        }

        if format.show_borders {
            output.push_str(&self.create_horizontal_border(&column_widths));
        }

        Ok(output)
    }

    /// Calculate optimal column widths
    fn calculate_column_widths(&self, format: &TableFormat, rows: &[RowData]) -> Vec<usize> {
        let num_columns = format.columns.len().max(rows.iter().map(|r| r.len()).max().unwrap_or(0));

        (0..num_columns)
            .map(|col_idx| {
                let column = format.columns.get(col_idx);
                let mut width = column
                    .map(|c| c.min_width.max(c.header.len()))
                    .unwrap_or(format.min_column_width);

                for row in rows {
                    if let Some(cell) = row.get(col_idx) {
                        width = width.max(cell.len());
                    }
                }

                width.min(column.map(|c| c.max_width).unwrap_or(format.max_column_width))
            })
            .collect()
    }

    /// Create a table row
    fn create_row(&self, data: &[String], widths: &[usize], format: &TableFormat) -> String {
        let mut row = String::new();

        if format.show_borders {
            row.push('|');
        }

        for (idx, (cell, &width)) in data.iter().zip(widths.iter()).enumerate() {
            let alignment = format.columns.get(idx).map(|c| &c.alignment).unwrap_or(&Alignment::Left);
            let padded_cell = self.align_text(cell, width, alignment);

            if format.show_borders {
                row.push(' ');
            }
            row.push_str(&padded_cell);
            if format.show_borders {
                row.push_str(" |");
            } else {
                row.push_str("  ");
            }
        }

        row.trim_end().to_string()
    }

    /// Create horizontal border for table
    fn create_horizontal_border(&self, widths: &[usize]) -> String {
        let mut border = String::new();

        if !widths.is_empty() {
            border.push('+');
            for &width in widths {
                border.push_str(&"-".repeat(width + 2));
                border.push('+');
            }
        }

        border
    }

    /// Align text within specified width
    fn align_text(&self, text: &str, width: usize, alignment: &Alignment) -> String {
        if text.len() >= width {
            return text.chars().take(width).collect();
        }

        let padding = width - text.len();
        match alignment {
            Alignment::Left => format!("{}{}", text, " ".repeat(padding)),
            Alignment::Right => format!("{}{}", " ".repeat(padding), text),
            Alignment::Center => {
                let left_pad = padding / 2;
                let right_pad = padding - left_pad;
                format!("{}{}{}", " ".repeat(left_pad), text, " ".repeat(right_pad))
            }
        }
    }

    fn bar_glyph(status: OutcomeKind) -> char {
        match status {
            OutcomeKind::Success => '#',
            OutcomeKind::Timeout => '~',
            OutcomeKind::Failed => 'x',
        }
    }
}

impl OutputFormatter for PlainFormatter {
    fn format_header(&self, title: &str) -> Result<String> {
        let mut output = String::new();
        let border = "=".repeat(title.len() + 4);

        writeln!(output, "{}", border).map_err(|e| AppError::io(format!("Failed to format header: {}", e)))?;
        writeln!(output, "  {}  ", title).map_err(|e| AppError::io(format!("Failed to format header: {}", e)))?;
        write!(output, "{}", border).map_err(|e| AppError::io(format!("Failed to format header: {}", e)))?;

        Ok(output)
    }

    fn format_start_banner(&self, started_at: &str, message_count: u32, interval_secs: f64) -> Result<String> {
        Ok(start_banner_text(started_at, message_count, interval_secs))
    }

    fn format_end_banner(&self, ended_at: &str, counts: &RunCounts) -> Result<String> {
        Ok(end_banner_text(ended_at, counts))
    }

    fn format_delay_chart(&self, bars: &[ChartBar]) -> Result<String> {
        if bars.is_empty() {
            return Ok("No results stored.".to_string());
        }

        let mut output = String::new();
        let scale = chart_scale(bars);
        let index_width = bars.iter().map(|b| b.index.to_string().len()).max().unwrap_or(1);

        writeln!(output, "Message Delay Visualization (# success, ~ timeout, x failed)")
            .map_err(|e| AppError::io(format!("Failed to format chart: {}", e)))?;
        for bar in bars {
            let length = bar_length(bar.height_ms, scale, self.options.chart_width);
            let glyphs: String = std::iter::repeat(Self::bar_glyph(bar.status)).take(length).collect();
            writeln!(
                output,
                "{:>width$} | {:<bar_width$} {}",
                bar.index,
                glyphs,
                bar_label(bar),
                width = index_width,
                bar_width = self.options.chart_width
            )
            .map_err(|e| AppError::io(format!("Failed to format chart: {}", e)))?;
        }

        Ok(output.trim_end().to_string())
    }

    fn format_delay_summary(&self, stats: Option<&DelayStatistics>) -> Result<String> {
        let mut output = String::new();
        writeln!(output, "Delay Summary:").map_err(|e| AppError::io(format!("Failed to format summary: {}", e)))?;
        output.push_str(&self.delay_table(stats)?);
        Ok(output)
    }

    fn format_message_table(&self, tally: &MessageTally) -> Result<String> {
        let mut output = String::new();
        writeln!(output, "Messages:").map_err(|e| AppError::io(format!("Failed to format table: {}", e)))?;
        output.push_str(&self.tally_table(tally)?);
        Ok(output)
    }

    fn format_error(&self, error: &str) -> Result<String> {
        Ok(format!("ERROR: {}", error))
    }

    fn format_warning(&self, warning: &str) -> Result<String> {
        Ok(format!("WARNING: {}", warning))
    }

    fn format_success(&self, message: &str) -> Result<String> {
        Ok(format!("SUCCESS: {}", message))
    }
}
