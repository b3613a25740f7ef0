//! `upload react-native-sourcemaps`: an explicit bundle and source map.

use super::{BundlePair, ReactNativeIdentity, bundle_plan};
use crate::error::{AppError, Result};
use crate::model::{ArtifactKind, BuildDescriptor, Platform, non_empty};
use crate::resolvers::{ResolveContext, require_api_key};
use crate::upload::UploadPlan;
use std::path::PathBuf;

/// `upload react-native-sourcemaps`
#[derive(Debug, Clone, clap::Args)]
pub struct ReactNativeSourceMapOptions {
    #[command(flatten)]
    pub identity: ReactNativeIdentity,
    /// Platform the bundle was built for
    #[arg(long, value_enum)]
    pub platform: Platform,
    /// Android version code
    #[arg(long, alias = "app-version-code")]
    pub version_code: Option<String>,
    /// Apple bundle version
    #[arg(long)]
    pub bundle_version: Option<String>,
    /// Project root used when --project-root is absent
    #[arg(default_value = ".")]
    pub path: PathBuf,
}

fn require_identifiers(descriptor: &BuildDescriptor) -> Result<()> {
    if non_empty(&descriptor.version_name).is_some() || non_empty(&descriptor.code_bundle_id).is_some() {
        return Ok(());
    }
    Err(AppError::invalid(
        "missing required identifiers: you must set at least --version-name or --code-bundle-id to uniquely identify the build",
    ))
}

/// A single plan for the given pair
pub fn resolve(ctx: &ResolveContext<'_>, options: &ReactNativeSourceMapOptions) -> Result<Vec<UploadPlan>> {
    let bundle = options
        .identity
        .bundle
        .clone()
        .ok_or_else(|| AppError::missing("--bundle"))?;
    let source_map = options
        .identity
        .source_map
        .clone()
        .ok_or_else(|| AppError::missing("--source-map"))?;

    let mut cli = options.identity.layer(&options.path);
    match options.platform {
        Platform::Android => cli.version_code = options.version_code.clone(),
        Platform::Ios => cli.bundle_version = options.bundle_version.clone(),
    }
    cli.platform = Some(options.platform);
    let descriptor = ctx.merge(&cli, &BuildDescriptor::default());
    require_api_key(&descriptor)?;
    require_identifiers(&descriptor)?;

    Ok(vec![bundle_plan(
        ctx,
        ArtifactKind::ReactNativeSourceMap,
        &descriptor,
        options.platform,
        &BundlePair { bundle, source_map },
    )?])
}
