//! MQTT Load Tester - Main CLI Application
//!
//! Publishes numbered, timestamped messages to an MQTT broker, measures the
//! round trip of each one and stores every outcome in a SQLite file.

use clap::Parser;
use mqtt_load_tester::{
    app::App,
    cli::Cli,
    error::{AppError, ErrorReporter},
};
use std::process;

#[tokio::main]
async fn main() {
    std::panic::set_hook(Box::new(|panic_info| {
        eprintln!("Application panic: {}", panic_info);
        process::exit(99);
    }));

    let cli = Cli::parse();
    let use_color = cli.use_colors();
    let verbose = cli.is_verbose() || cli.debug;

    let result = match App::new(cli) {
        Ok(app) => app.run().await,
        Err(e) => Err(e),
    };

    if let Err(e) = result {
        // Configuration mistakes always get the suggestion text
        let explain = verbose || matches!(e, AppError::Config(_) | AppError::Validation(_));
        ErrorReporter::new(use_color, explain).report_error(&e);
        process::exit(e.exit_code());
    }
}
