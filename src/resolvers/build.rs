//! Build information for `create-build` and the DEX build id for
//! `create-android-build-id`.
//!
//! Build information is not a file upload: the merged descriptor is
//! projected to a camelCase JSON document and posted to the build service.

use super::ResolveContext;
use crate::endpoint::{Endpoint, Service};
use crate::error::{AppError, Result};
use crate::merge::{compose, parse_metadata, validate_for_build};
use crate::model::{BuildDescriptor, SourceControl};
use crate::readers::dex;
use crate::readers::manifest::{read_manifest, read_manifest_from_aab};
use crate::tools::git;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// `create-build`
#[derive(Debug, Clone, Default, clap::Args)]
pub struct CreateBuildOptions {
    /// Application version
    #[arg(long, alias = "app-version")]
    pub version_name: Option<String>,
    /// Version code (Android only)
    #[arg(long, alias = "app-version-code", conflicts_with = "bundle_version")]
    pub version_code: Option<String>,
    /// Bundle version (Apple platforms only)
    #[arg(long, alias = "app-bundle-version")]
    pub bundle_version: Option<String>,
    /// App Bundle to read build information from
    #[arg(long)]
    pub android_aab: Option<PathBuf>,
    /// AndroidManifest.xml to read build information from
    #[arg(long)]
    pub app_manifest: Option<PathBuf>,
    /// Associate this build with new events for its release stage
    #[arg(long)]
    pub auto_assign_release: bool,
    /// Build server root URL, optionally with a port
    #[arg(long)]
    pub build_api_root_url: Option<String>,
    /// Person or system that built the app
    #[arg(long)]
    pub builder_name: Option<String>,
    /// Custom build information as `key=value,key2=value2`
    #[arg(long)]
    pub metadata: Option<String>,
    /// Source control provider
    #[arg(long)]
    pub provider: Option<String>,
    /// Release stage, e.g. production
    #[arg(long)]
    pub release_stage: Option<String>,
    /// Repository URL
    #[arg(long)]
    pub repository: Option<String>,
    /// Source control revision
    #[arg(long)]
    pub revision: Option<String>,
    /// Additional attempts after the first
    #[arg(long, default_value_t = 0)]
    pub retries: u32,
    /// Seconds to wait for the build service
    #[arg(
        long,
        default_value_t = crate::upload::DEFAULT_TIMEOUT_SECS,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub timeout: u64,
    /// Project directory used for git discovery
    #[arg(default_value = ".")]
    pub path: PathBuf,
}

/// `sourceControl` object
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SourceControlPayload {
    /// Provider wire name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    /// Repository URL
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repository: Option<String>,
    /// Revision
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revision: Option<String>,
}

impl SourceControlPayload {
    fn is_empty(&self) -> bool {
        self.provider.is_none() && self.repository.is_none() && self.revision.is_none()
    }
}

/// JSON body of a build request
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildPayload {
    /// Project API key
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Application version
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app_version: Option<String>,
    /// Android version code
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app_version_code: Option<String>,
    /// Apple bundle version
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app_bundle_version: Option<String>,
    /// Repository and revision
    #[serde(skip_serializing_if = "SourceControlPayload::is_empty")]
    pub source_control: SourceControlPayload,
    /// Who built it
    #[serde(skip_serializing_if = "Option::is_none")]
    pub builder_name: Option<String>,
    /// Release stage
    #[serde(skip_serializing_if = "Option::is_none")]
    pub release_stage: Option<String>,
    /// Only sent when requested
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_assign_release: Option<bool>,
    /// Free-form `key=value` pairs
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
}

fn text(value: &Option<String>) -> Option<String> {
    value.clone().filter(|v| !v.is_empty())
}

impl From<&BuildDescriptor> for BuildPayload {
    fn from(d: &BuildDescriptor) -> Self {
        BuildPayload {
            api_key: text(&d.api_key),
            app_version: text(&d.version_name),
            app_version_code: text(&d.version_code),
            app_bundle_version: text(&d.bundle_version),
            source_control: SourceControlPayload {
                provider: d.source_control.provider.map(|p| p.as_str().to_string()),
                repository: text(&d.source_control.repository),
                revision: text(&d.source_control.revision),
            },
            builder_name: text(&d.builder_name),
            release_stage: text(&d.release_stage),
            auto_assign_release: d.auto_assign_release,
            metadata: d.metadata.clone(),
        }
    }
}

/// Where and what to post
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildRequest {
    /// Build service URL
    pub url: String,
    /// Merged build information
    pub descriptor: BuildDescriptor,
    /// JSON body
    pub payload: serde_json::Value,
}

/// Name of the user running the build
pub fn system_user() -> Option<String> {
    #[cfg(unix)]
    {
        users::get_current_username().map(|name| name.to_string_lossy().into_owned())
    }
    #[cfg(not(unix))]
    {
        std::env::var("USERNAME").ok()
    }
}

async fn git_value(
    ctx: &ResolveContext<'_>,
    what: &str,
    lookup: impl std::future::Future<Output = Result<Option<String>>>,
) -> Result<Option<String>> {
    match lookup.await {
        Ok(value) => Ok(value),
        Err(AppError::Cancelled) => Err(AppError::Cancelled),
        Err(e) => {
            ctx.output
                .debug(&format!("Unable to read the git {what}: {e}"));
            Ok(None)
        }
    }
}

/// Lowest layer: git and the current user
pub async fn environment_layer(ctx: &ResolveContext<'_>, path: &Path) -> Result<BuildDescriptor> {
    let repository = git_value(ctx, "repository", git::repository_url(path, ctx.cancel)).await?;
    let revision = git_value(ctx, "revision", git::revision(path, ctx.cancel)).await?;
    Ok(BuildDescriptor {
        source_control: SourceControl {
            provider: None,
            repository,
            revision,
        },
        builder_name: system_user(),
        ..Default::default()
    })
}

/// Middle layer: an App Bundle's or a manifest file's identity
pub fn manifest_layer(options: &CreateBuildOptions) -> Result<BuildDescriptor> {
    let data = match (&options.android_aab, &options.app_manifest) {
        (Some(aab), _) => read_manifest_from_aab(aab)?,
        (None, Some(manifest)) => read_manifest(manifest)?,
        (None, None) => return Ok(BuildDescriptor::default()),
    };
    let manifest = data.to_descriptor();
    Ok(BuildDescriptor {
        api_key: manifest.api_key,
        version_name: manifest.version_name,
        version_code: manifest.version_code,
        ..Default::default()
    })
}

/// Top layer: flags
pub fn cli_layer(ctx: &ResolveContext<'_>, options: &CreateBuildOptions) -> Result<BuildDescriptor> {
    let metadata = match &options.metadata {
        Some(raw) => parse_metadata(raw)?,
        None => BTreeMap::new(),
    };
    let provider = SourceControl::provider_from_str(options.provider.as_deref())
        .unwrap_or_else(|warning| {
            ctx.output.warn(&warning);
            None
        });
    Ok(BuildDescriptor {
        api_key: ctx.api_key.clone(),
        version_name: options.version_name.clone(),
        version_code: options.version_code.clone(),
        bundle_version: options.bundle_version.clone(),
        metadata,
        source_control: SourceControl {
            provider,
            repository: options.repository.clone(),
            revision: options.revision.clone(),
        },
        builder_name: options.builder_name.clone(),
        release_stage: options.release_stage.clone(),
        auto_assign_release: options.auto_assign_release.then_some(true),
        ..Default::default()
    })
}

/// Merge the three layers and bind the result to the build service
pub async fn resolve(ctx: &ResolveContext<'_>, options: &CreateBuildOptions) -> Result<BuildRequest> {
    let environment = environment_layer(ctx, &options.path).await?;
    let manifest = manifest_layer(options)?;
    let cli = cli_layer(ctx, options)?;
    let descriptor = compose(&cli, &manifest, &environment);
    validate_for_build(&descriptor)?;

    let endpoint = Endpoint::resolve(
        descriptor.api_key(),
        options.build_api_root_url.as_deref(),
        ctx.port,
        Service::Build,
    )?;
    let payload = serde_json::to_value(BuildPayload::from(&descriptor))?;
    Ok(BuildRequest {
        url: endpoint.base().to_string(),
        descriptor,
        payload,
    })
}

/// `create-android-build-id`: the DEX-derived build id of `paths`
pub fn android_build_id(paths: &[PathBuf]) -> Result<String> {
    let dex_files = dex::collect_dex_files(paths)?;
    dex::build_id(&dex_files)?.ok_or_else(|| AppError::NotFound {
        what: "classes.dex files".to_string(),
    })
}
