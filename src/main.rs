//! bugsnag-cli - upload debug symbols, mapping files and source maps.

use bugsnag_cli::cli;
use bugsnag_cli::cli::{LogLevel, OutputManager};
use std::process;

#[tokio::main]
async fn main() {
    env_logger::init();

    match cli::run().await {
        Ok(exit_code) => {
            process::exit(exit_code);
        }
        Err(e) => {
            // Never filtered: fatal errors always print
            let output = OutputManager::new(LogLevel::Debug);
            output.error(&format!("Fatal error: {e}"));
            for suggestion in e.recovery_suggestions() {
                output.info(&format!("  • {suggestion}"));
            }
            process::exit(1);
        }
    }
}
