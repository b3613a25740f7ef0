//! Command execution.
//!
//! Maps each verb to its resolver, hands the resulting plans to the uploader
//! and turns errors into an exit status with recovery hints.

mod android_build_id;
mod create_build;
mod upload;

use crate::cli::{Args, Command, RuntimeConfig};
use crate::error::{AppError, Result};

use android_build_id::execute_android_build_id;
use create_build::execute_create_build;
use upload::execute_upload;

/// Execute the parsed command and return the process exit code
pub async fn execute_command(args: Args, config: &RuntimeConfig) -> Result<i32> {
    let result = match &args.command {
        Command::Upload(upload) => execute_upload(upload, config).await,
        Command::CreateBuild(options) => execute_create_build(options, config).await,
        Command::CreateAndroidBuildId { paths } => execute_android_build_id(paths, config),
    };

    match result {
        Ok(()) => Ok(0),
        Err(e) => {
            report_failure(config, args.command.name(), &e);
            Ok(1)
        }
    }
}

/// One error line plus any recovery hints
fn report_failure(config: &RuntimeConfig, verb: &str, error: &AppError) {
    let output = config.output();
    match error {
        AppError::Cancelled => output.error(&format!("{verb} cancelled")),
        _ => output.error(&format!("{verb} failed: {error}")),
    }
    for suggestion in error.recovery_suggestions() {
        output.info(&format!("  • {suggestion}"));
    }
}
