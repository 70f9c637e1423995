//! Colored formatter implementation with terminal color support
//!
//! Bars and status words are colored by outcome: green for successes,
//! yellow for timeouts and red for publish failures.

use super::formatter::{
    bar_label, bar_length, chart_scale, end_banner_text, start_banner_text, FormattingOptions, OutputFormatter,
    PlainFormatter,
};
use crate::{
    error::{AppError, Result},
    report::ChartBar,
    stats::{DelayStatistics, MessageTally},
    tracker::RunCounts,
    types::OutcomeKind,
};
use colored::*;
use std::fmt::Write as _;

/// Color scheme configuration
#[derive(Debug, Clone)]
pub struct ColorScheme {
    pub header: Color,
    pub success: Color,
    pub warning: Color,
    pub error: Color,
    pub muted: Color,
}

impl Default for ColorScheme {
    fn default() -> Self {
        Self {
            header: Color::Blue,
            success: Color::Green,
            warning: Color::Yellow,
            error: Color::Red,
            muted: Color::BrightBlack,
        }
    }
}

impl ColorScheme {
    /// Color used for an outcome
    pub fn outcome(&self, status: OutcomeKind) -> Color {
        match status {
            OutcomeKind::Success => self.success,
            OutcomeKind::Timeout => self.warning,
            OutcomeKind::Failed => self.error,
        }
    }
}

/// Colored formatter implementation
pub struct ColoredFormatter {
    plain_formatter: PlainFormatter,
    options: FormattingOptions,
    color_scheme: ColorScheme,
}

impl ColoredFormatter {
    /// Create a new colored formatter with options
    pub fn new(options: FormattingOptions) -> Self {
        Self::with_color_scheme(options, ColorScheme::default())
    }

    /// Create a colored formatter with custom color scheme
    pub fn with_color_scheme(options: FormattingOptions, color_scheme: ColorScheme) -> Self {
        let plain_formatter = PlainFormatter::new(options.clone());
        Self {
            plain_formatter,
            options,
            color_scheme,
        }
    }

    /// Apply color to text if colors are enabled
    fn colorize(&self, text: &str, color: Color) -> ColoredString {
        if self.options.enable_color {
            text.color(color)
        } else {
            text.normal()
        }
    }

    /// Apply bold formatting if colors are enabled
    fn bold(&self, text: &str) -> ColoredString {
        if self.options.enable_color {
            text.bold()
        } else {
            text.normal()
        }
    }

    fn section_title(&self, title: &str) -> String {
        self.emphasize(title, self.color_scheme.header)
    }

    /// Bold and colored, or untouched when colors are off
    fn emphasize(&self, text: &str, color: Color) -> String {
        if self.options.enable_color {
            text.bold().color(color).to_string()
        } else {
            text.to_string()
        }
    }

    /// Success rate colored by how close it is to 100%
    fn rate_color(&self, rate: f64) -> Color {
        if rate >= 95.0 {
            self.color_scheme.success
        } else if rate >= 80.0 {
            self.color_scheme.warning
        } else {
            self.color_scheme.error
        }
    }
}

impl OutputFormatter for ColoredFormatter {
    fn format_header(&self, title: &str) -> Result<String> {
        let mut output = String::new();
        let border = "═".repeat(title.chars().count() + 4);

        writeln!(output, "{}", self.colorize(&border, self.color_scheme.header))
            .map_err(|e| AppError::io(format!("Failed to format header: {}", e)))?;
        writeln!(output, "  {}  ", self.section_title(title))
            .map_err(|e| AppError::io(format!("Failed to format header: {}", e)))?;
        write!(output, "{}", self.colorize(&border, self.color_scheme.header))
            .map_err(|e| AppError::io(format!("Failed to format header: {}", e)))?;

        Ok(output)
    }

    fn format_start_banner(&self, started_at: &str, message_count: u32, interval_secs: f64) -> Result<String> {
        Ok(self.bold(&start_banner_text(started_at, message_count, interval_secs)).to_string())
    }

    fn format_end_banner(&self, ended_at: &str, counts: &RunCounts) -> Result<String> {
        let text = end_banner_text(ended_at, counts);
        let color = if counts.resolved() == counts.succeeded {
            self.color_scheme.success
        } else {
            self.color_scheme.warning
        };
        Ok(self.emphasize(&text, color))
    }

    fn format_delay_chart(&self, bars: &[ChartBar]) -> Result<String> {
        if bars.is_empty() {
            return Ok(self.colorize("No results stored.", self.color_scheme.muted).to_string());
        }

        let mut output = String::new();
        let scale = chart_scale(bars);
        let index_width = bars.iter().map(|b| b.index.to_string().len()).max().unwrap_or(1);

        writeln!(
            output,
            "{} ({} success, {} timeout, {} failed)",
            self.section_title("Message Delay Visualization"),
            self.colorize("█", self.color_scheme.success),
            self.colorize("█", self.color_scheme.warning),
            self.colorize("█", self.color_scheme.error),
        )
        .map_err(|e| AppError::io(format!("Failed to format chart: {}", e)))?;

        for bar in bars {
            let length = bar_length(bar.height_ms, scale, self.options.chart_width);
            let filled = "█".repeat(length);
            let empty = " ".repeat(self.options.chart_width - length);
            let color = self.color_scheme.outcome(bar.status);

            writeln!(
                output,
                "{:>width$} │ {}{} {}",
                bar.index,
                self.colorize(&filled, color),
                empty,
                self.colorize(&bar_label(bar), color),
                width = index_width
            )
            .map_err(|e| AppError::io(format!("Failed to format chart: {}", e)))?;
        }

        Ok(output.trim_end().to_string())
    }

    fn format_delay_summary(&self, stats: Option<&DelayStatistics>) -> Result<String> {
        let mut output = String::new();
        writeln!(output, "{}", self.section_title("Delay Summary:"))
            .map_err(|e| AppError::io(format!("Failed to format summary: {}", e)))?;
        output.push_str(&self.plain_formatter.delay_table(stats)?);
        Ok(output)
    }

    fn format_message_table(&self, tally: &MessageTally) -> Result<String> {
        let mut output = String::new();
        writeln!(output, "{}", self.section_title("Messages:"))
            .map_err(|e| AppError::io(format!("Failed to format table: {}", e)))?;
        output.push_str(&self.plain_formatter.tally_table(tally)?);
        writeln!(output).map_err(|e| AppError::io(format!("Failed to format table: {}", e)))?;

        let rate = tally.success_rate();
        write!(
            output,
            "Success rate: {}",
            self.colorize(&format!("{:.2}%", rate), self.rate_color(rate))
        )
        .map_err(|e| AppError::io(format!("Failed to format table: {}", e)))?;
        Ok(output)
    }

    fn format_error(&self, error: &str) -> Result<String> {
        Ok(format!("{} {}", self.colorize("✗", self.color_scheme.error), error))
    }

    fn format_warning(&self, warning: &str) -> Result<String> {
        Ok(format!("{} {}", self.colorize("⚠", self.color_scheme.warning), warning))
    }

    fn format_success(&self, message: &str) -> Result<String> {
        Ok(format!("{} {}", self.colorize("✓", self.color_scheme.success), message))
    }
}
