//! Artifact resolvers.
//!
//! A resolver turns command-line inputs and the files they point at into one
//! or more [`UploadPlan`]s. Resolvers never send anything themselves; plans
//! are handed to the [`crate::upload::Uploader`] in the order returned.

pub mod android;
pub mod apple;
pub mod breakpad;
pub mod build;
pub mod dart;
pub mod discover;
pub mod js;
pub mod linux;
pub mod react_native;
pub mod unity;

use crate::cli::OutputManager;
use crate::endpoint::{Endpoint, Service};
use crate::error::{AppError, Result};
use crate::merge::compose;
use crate::model::{ArtifactKind, BuildDescriptor, NO_BUILD_UUID};
use crate::upload::UploadPlan;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;

/// Run-wide inputs every resolver sees
#[derive(Debug, Clone)]
pub struct ResolveContext<'a> {
    /// User-facing logger
    pub output: &'a OutputManager,
    /// Observed at every tool invocation
    pub cancel: &'a CancellationToken,
    /// `--api-key` / `BUGSNAG_API_KEY`
    pub api_key: Option<String>,
    /// `--upload-api-root-url`
    pub upload_root: Option<String>,
    /// `--port`
    pub port: u16,
    /// `--overwrite`
    pub overwrite: bool,
}

impl ResolveContext<'_> {
    /// Upload endpoint for a merged descriptor.
    ///
    /// Resolved after merging so an API key read from a manifest still picks
    /// the right hub.
    pub fn endpoint(&self, descriptor: &BuildDescriptor) -> Result<Endpoint> {
        Endpoint::resolve(
            descriptor.api_key(),
            self.upload_root.as_deref(),
            self.port,
            Service::Upload,
        )
    }

    /// Empty plan for `kind`, bound to the endpoint for `descriptor`
    pub fn plan(&self, kind: ArtifactKind, descriptor: &BuildDescriptor) -> Result<UploadPlan> {
        Ok(UploadPlan::new(kind, descriptor.clone(), self.endpoint(descriptor)?))
    }

    /// Merge a command-line layer and a manifest layer.
    ///
    /// The global API key fills the command-line layer when the kind's own
    /// options leave it empty.
    pub fn merge(&self, cli: &BuildDescriptor, manifest: &BuildDescriptor) -> BuildDescriptor {
        let mut cli = cli.clone();
        if cli.api_key().is_none() {
            cli.api_key = self.api_key.clone();
        }
        compose(&cli, manifest, &BuildDescriptor::default())
    }
}

/// Fail with `MissingOption(--api-key)` unless the merged descriptor has one
pub fn require_api_key(descriptor: &BuildDescriptor) -> Result<&str> {
    descriptor.api_key().ok_or_else(|| AppError::missing("--api-key"))
}

/// True when any layer asked for no build UUID
pub fn build_uuid_suppressed(layers: &[&BuildDescriptor]) -> bool {
    layers
        .iter()
        .any(|layer| layer.build_uuid.as_deref() == Some(NO_BUILD_UUID))
}

/// First candidate that exists
pub fn first_existing(candidates: impl IntoIterator<Item = PathBuf>) -> Option<PathBuf> {
    candidates.into_iter().find(|p| p.exists())
}

/// Lossy display string for a path-valued field
pub fn path_string(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

/// Current directory as a project root, when it can be read
pub fn cwd_string() -> Option<String> {
    std::env::current_dir().ok().map(|p| path_string(&p))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::cli::LogLevel;

    pub(crate) const API_KEY: &str = "1234567890ABCDEF1234567890ABCDEF";

    /// Context pointed at a fixed upload root
    pub(crate) fn context<'a>(
        output: &'a OutputManager,
        cancel: &'a CancellationToken,
    ) -> ResolveContext<'a> {
        ResolveContext {
            output,
            cancel,
            api_key: Some(API_KEY.to_string()),
            upload_root: Some("https://upload.example.com".to_string()),
            port: 0,
            overwrite: false,
        }
    }

    #[test]
    fn test_global_api_key_fills_cli_layer() {
        let output = OutputManager::capture(LogLevel::Debug);
        let cancel = CancellationToken::new();
        let ctx = context(&output, &cancel);

        let manifest = BuildDescriptor {
            api_key: Some("manifest-key".into()),
            version_name: Some("1.0".into()),
            ..Default::default()
        };
        let merged = ctx.merge(&BuildDescriptor::default(), &manifest);
        assert_eq!(merged.api_key(), Some(API_KEY));
        assert_eq!(merged.version_name.as_deref(), Some("1.0"));

        let ctx = ResolveContext { api_key: None, ..ctx };
        assert_eq!(ctx.merge(&BuildDescriptor::default(), &manifest).api_key(), Some("manifest-key"));
    }

    #[test]
    fn test_secondary_hub_endpoint_follows_merged_key() {
        let output = OutputManager::capture(LogLevel::Debug);
        let cancel = CancellationToken::new();
        let ctx = ResolveContext {
            api_key: None,
            upload_root: None,
            ..context(&output, &cancel)
        };
        let descriptor = BuildDescriptor {
            api_key: Some("00000abc".into()),
            ..Default::default()
        };
        assert_eq!(
            ctx.endpoint(&descriptor).unwrap().base(),
            "https://upload.insighthub.smartbear.com"
        );
        assert!(require_api_key(&BuildDescriptor::default()).is_err());
    }
}
