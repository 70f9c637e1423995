//! Output formatting and display system
//!
//! Console banners and the post-run report are rendered through the
//! [`OutputFormatter`] trait, with colored and plain text implementations.

mod colored;
mod formatter;

pub use colored::{ColorScheme, ColoredFormatter};
pub use formatter::{
    format_interval, format_ms, Alignment, Column, FormattingOptions, OutputFormatter, PlainFormatter, RowData,
    TableFormat,
};

/// Output formatting factory for creating appropriate formatters
pub struct OutputFormatterFactory;

impl OutputFormatterFactory {
    /// Create a formatter based on color support and preferences
    pub fn create_formatter(enable_color: bool, verbose: bool) -> Box<dyn OutputFormatter> {
        let options = FormattingOptions {
            enable_color,
            verbose_mode: verbose,
            ..FormattingOptions::default()
        };

        if enable_color {
            Box::new(ColoredFormatter::new(options))
        } else {
            Box::new(PlainFormatter::new(options))
        }
    }

    /// Formatter for text written to files: never colored
    pub fn create_file_formatter(verbose: bool) -> Box<dyn OutputFormatter> {
        Self::create_formatter(false, verbose)
    }
}
