//! Upload plans and their execution.
//!
//! A resolver produces an [`UploadPlan`]; the [`Uploader`] sends its files in
//! order, one request each, and folds the per-file outcomes into one result
//! according to the fail policy.

pub mod fields;
pub mod form;
pub mod retry;
pub mod transport;

pub use fields::{
    BreakpadFields, CustomFields, DartFields, DsymFields, FormFields, JsFields, LineMappingFields,
    ProguardFields, ReactNativeFields, SoFileFields,
};
pub use form::{ArtifactFile, FilePart, PartSource};
pub use retry::{Delivery, RetryPolicy};
pub use transport::{HttpResponse, OutgoingRequest, Payload, ReqwestTransport, Transport};

use crate::cli::OutputManager;
use crate::endpoint::Endpoint;
use crate::error::{AppError, Result};
use crate::files::ScratchDir;
use crate::model::{ArtifactKind, BuildDescriptor};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Default per-request timeout in seconds
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// Run-wide upload settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadOptions {
    /// Additional attempts after the first
    pub retries: u32,
    /// Per-request timeout
    pub timeout: Duration,
    /// Replace files the server already has
    pub overwrite: bool,
    /// Log what would be sent without opening a connection
    pub dry_run: bool,
    /// Stop at the first failed file when a plan has several
    pub fail_on_upload_error: bool,
    /// First backoff delay between retries
    pub retry_delay: Duration,
}

impl Default for UploadOptions {
    fn default() -> Self {
        Self {
            retries: 0,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            overwrite: false,
            dry_run: false,
            fail_on_upload_error: false,
            retry_delay: Duration::from_secs(1),
        }
    }
}

impl UploadOptions {
    fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            retries: self.retries,
            base_delay: self.retry_delay,
        }
    }
}

/// Files to send for one artifact kind, plus the scratch space they live in.
///
/// Scratch directories are held until the plan is dropped, so extracted
/// files stay readable for the whole upload and are removed on every exit
/// path afterwards.
#[derive(Debug)]
pub struct UploadPlan {
    /// Kind being uploaded
    pub kind: ArtifactKind,
    /// Merged identity used to build the files' fields
    pub descriptor: BuildDescriptor,
    /// Base URL
    pub endpoint: Endpoint,
    /// Uploads, in send order
    pub files: Vec<ArtifactFile>,
    scratch: Vec<ScratchDir>,
}

impl UploadPlan {
    /// Empty plan
    pub fn new(kind: ArtifactKind, descriptor: BuildDescriptor, endpoint: Endpoint) -> Self {
        Self {
            kind,
            descriptor,
            endpoint,
            files: Vec::new(),
            scratch: Vec::new(),
        }
    }

    /// Append an upload
    pub fn push(&mut self, file: ArtifactFile) {
        self.files.push(file);
    }

    /// Keep a scratch directory alive for the plan's lifetime
    pub fn hold(&mut self, scratch: ScratchDir) {
        self.scratch.push(scratch);
    }

    /// Nothing to send
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// Per-file result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileOutcome {
    /// Sent and accepted
    Uploaded,
    /// Server already had it
    Duplicate,
    /// Dry run, nothing sent
    Skipped,
}

/// Counts for a finished plan
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Accepted uploads
    pub uploaded: usize,
    /// 409 responses
    pub duplicates: usize,
    /// Dry-run skips
    pub skipped: usize,
    /// Files that failed
    pub failed: usize,
}

/// Sends plans through a transport
#[derive(Debug)]
pub struct Uploader<'a, T: Transport> {
    transport: &'a T,
    options: &'a UploadOptions,
    output: &'a OutputManager,
    cancel: &'a CancellationToken,
}

impl<'a, T: Transport> Uploader<'a, T> {
    /// Bind a transport to run settings
    pub fn new(
        transport: &'a T,
        options: &'a UploadOptions,
        output: &'a OutputManager,
        cancel: &'a CancellationToken,
    ) -> Self {
        Self {
            transport,
            options,
            output,
            cancel,
        }
    }

    /// Send every file of `plan` in order.
    ///
    /// With `fail_on_upload_error` and more than one file, the first failure
    /// stops the run. Otherwise failures are logged and the run continues;
    /// the first one is returned once every file has been tried.
    pub async fn execute(&self, plan: &UploadPlan) -> Result<RunSummary> {
        let mut summary = RunSummary::default();
        if plan.is_empty() {
            self.output
                .info(&format!("No {} files found to upload", plan.kind));
            return Ok(summary);
        }

        let abort_early = self.options.fail_on_upload_error && plan.files.len() > 1;
        let mut first_error: Option<AppError> = None;

        for file in &plan.files {
            match self.upload_file(&plan.endpoint, file).await {
                Ok(FileOutcome::Uploaded) => summary.uploaded += 1,
                Ok(FileOutcome::Duplicate) => summary.duplicates += 1,
                Ok(FileOutcome::Skipped) => summary.skipped += 1,
                Err(AppError::Cancelled) => return Err(AppError::Cancelled),
                Err(e) => {
                    summary.failed += 1;
                    if abort_early {
                        return Err(e);
                    }
                    if plan.files.len() > 1 {
                        self.output.warn(&format!(
                            "Failed to upload {}: {}",
                            file.display_name, e
                        ));
                    }
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(summary),
        }
    }

    /// Send one file
    pub async fn upload_file(&self, endpoint: &Endpoint, file: &ArtifactFile) -> Result<FileOutcome> {
        let url = file.url_for(&endpoint.url(file.route));

        if self.options.dry_run {
            self.output.info(&format!(
                "(dryrun) Skipping upload of {} to {}",
                file.display_name, url
            ));
            self.output.debug("(dryrun) Upload payload:");
            for (key, value) in &file.fields {
                self.output.debug(&format!("  {key}: {value}"));
            }
            for part in &file.parts {
                self.output
                    .debug(&format!("  {}: @{}", part.field, part.file_name()));
            }
            return Ok(FileOutcome::Skipped);
        }

        let fallback = file
            .route
            .falls_back_to_base()
            .then(|| file.url_for(endpoint.base()));

        self.output
            .info(&format!("Uploading {} to {}", file.display_name, url));
        let request = OutgoingRequest {
            url,
            payload: Payload::Multipart(file),
            timeout: self.options.timeout,
        };
        let delivery = retry::send_with_retry(
            self.transport,
            request,
            fallback.as_deref(),
            self.options.retry_policy(),
            self.output,
            self.cancel,
        )
        .await?;

        Ok(match delivery {
            Delivery::Delivered => {
                self.output.success(&format!("Uploaded {}", file.display_name));
                FileOutcome::Uploaded
            }
            Delivery::Duplicate => {
                self.output.warn(&format!(
                    "Duplicate file detected, skipping upload of {}",
                    file.display_name
                ));
                FileOutcome::Duplicate
            }
        })
    }

    /// POST a JSON document (build information)
    pub async fn send_json(&self, url: &str, payload: &serde_json::Value) -> Result<FileOutcome> {
        if self.options.dry_run {
            self.output.info(&format!(
                "(dryrun) Skipping sending build information to {url}"
            ));
            self.output.info("(dryrun) Build payload:");
            let pretty = serde_json::to_string_pretty(payload)?;
            self.output.info(&pretty);
            return Ok(FileOutcome::Skipped);
        }

        self.output
            .info(&format!("Sending build information to {url}"));
        let request = OutgoingRequest {
            url: url.to_string(),
            payload: Payload::Json(payload),
            timeout: self.options.timeout,
        };
        match retry::send_with_retry(
            self.transport,
            request,
            None,
            self.options.retry_policy(),
            self.output,
            self.cancel,
        )
        .await?
        {
            Delivery::Delivered => Ok(FileOutcome::Uploaded),
            Delivery::Duplicate => Ok(FileOutcome::Duplicate),
        }
    }
}
