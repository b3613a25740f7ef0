//! `create-build`

use crate::cli::RuntimeConfig;
use crate::error::{AppError, Result};
use crate::resolvers::build::{self, CreateBuildOptions};
use crate::upload::{FileOutcome, ReqwestTransport, Uploader};

/// Merge build information and send it to the build service
pub(super) async fn execute_create_build(
    options: &CreateBuildOptions,
    config: &RuntimeConfig,
) -> Result<()> {
    let output = config.output();
    let ctx = config.context(None, false);
    let request = tokio::select! {
        _ = config.cancel().cancelled() => return Err(AppError::Cancelled),
        request = build::resolve(&ctx, options) => request?,
    };

    let upload_options = config.upload_options(options.retries, options.timeout, false);
    let transport = ReqwestTransport::new();
    let uploader = Uploader::new(&transport, &upload_options, output, config.cancel());
    match uploader.send_json(&request.url, &request.payload).await? {
        FileOutcome::Uploaded => output.success("Build created"),
        FileOutcome::Duplicate => output.warn("Build information was already sent"),
        FileOutcome::Skipped => {}
    }
    Ok(())
}
