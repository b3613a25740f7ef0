//! Command line interface for bugsnag-cli.
//!
//! Argument parsing, verb dispatch and user-facing output.

mod args;
pub mod commands;
mod output;

pub use args::{Args, Command, RuntimeConfig, UploadArgs, UploadKind};
pub use commands::execute_command;
pub use output::{LogLevel, LogRecord, OutputManager, Tag};

use crate::error::Result;

/// Main CLI entry point.
///
/// Ctrl-C cancels the run; in-flight tools and requests are aborted and
/// scratch directories are removed before the exit code is returned.
pub async fn run() -> Result<i32> {
    let args = Args::parse_args();
    let config = RuntimeConfig::from(&args);

    let cancel = config.cancel().clone();
    let watcher = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::debug!("interrupt received, cancelling");
            cancel.cancel();
        }
    });

    let exit_code = execute_command(args, &config).await;
    watcher.abort();
    exit_code
}
