//! Main application orchestration and execution

use crate::{
    cli::Cli,
    config::{display_config_summary, load_config, validate_config},
    error::{AppError, Result},
    executor::{LoadTestExecutor, RunOutcome},
    output::OutputFormatterFactory,
};

/// Main application struct that coordinates all components
pub struct App {
    cli: Cli,
}

impl App {
    /// Create a new application instance with CLI configuration
    pub fn new(cli: Cli) -> Result<Self> {
        cli.validate().map_err(AppError::config)?;
        Ok(Self { cli })
    }

    /// Run the application; returns once the run ended or was interrupted
    pub async fn run(self) -> Result<()> {
        let config = load_config(self.cli.clone())?;
        let warnings = validate_config(&config)?;

        if config.debug {
            println!(
                "{} v{} ({}, {}, built {})",
                crate::PKG_NAME,
                crate::VERSION,
                crate::GIT_COMMIT,
                env!("TARGET_TRIPLE"),
                crate::BUILD_TIME
            );
            println!("\nConfiguration Summary:");
            println!("{}", display_config_summary(&config));
        }

        if !warnings.is_empty() {
            eprintln!("Configuration Warnings:");
            for warning in &warnings {
                eprintln!("  {}", warning.format(config.enable_color));
            }
        }

        let formatter = OutputFormatterFactory::create_formatter(config.enable_color, config.verbose);
        let executor = LoadTestExecutor::new(config);

        let run = match executor.execute(formatter.as_ref()).await? {
            RunOutcome::Completed(run) => run,
            RunOutcome::Interrupted => return Ok(()),
        };

        if let Some(ref report) = run.report {
            println!();
            println!("{}", report.terminal_text);
            println!();
            println!("Report saved to {}", report.file_path.display());
        }

        if !run.summary.integrity_timeouts.is_empty() {
            eprintln!(
                "{}",
                formatter.format_warning(&format!(
                    "Messages never received, recorded as timeout: {:?}",
                    run.summary.integrity_timeouts
                ))?
            );
        }

        if executor.config().verbose {
            println!("Results stored in {}", run.db_path.display());
            println!(
                "Rows written: {}, storage errors: {}, late echoes: {}",
                run.summary.rows_written, run.summary.storage_errors, run.summary.counts.late_echoes
            );
        }

        println!("{}", formatter.format_end_banner(&run.ended_at, &run.summary.counts)?);

        Ok(())
    }
}
