//! React Native Android: bundle and source map from a Gradle build.
//!
//! Three output layouts have shipped over React Native releases; the first
//! one that has both files wins.

use super::{BundlePair, ReactNativeIdentity, bundle_plan};
use crate::error::{AppError, Result};
use crate::files;
use crate::model::{ArtifactKind, Platform};
use crate::resolvers::android::{manifest_layer, merged_manifest_path};
use crate::resolvers::{ResolveContext, first_existing, require_api_key};
use crate::upload::UploadPlan;
use std::path::{Path, PathBuf};

const BUNDLE_NAME: &str = "index.android.bundle";

/// `upload react-native-android`
#[derive(Debug, Clone, Default, clap::Args)]
pub struct ReactNativeAndroidOptions {
    #[command(flatten)]
    pub identity: ReactNativeIdentity,
    /// Android version code
    #[arg(long, alias = "app-version-code")]
    pub version_code: Option<String>,
    /// Build variant
    #[arg(long, default_value = "release")]
    pub variant: String,
    /// AndroidManifest.xml to read identity values from
    #[arg(long)]
    pub app_manifest: Option<PathBuf>,
    /// React Native project root, or its `android/app/build` directory
    #[arg(default_value = ".")]
    pub paths: Vec<PathBuf>,
}

/// `android/app/build` below a project root, or the path itself when it is
/// already a build directory
pub fn build_dir(path: &Path) -> Option<PathBuf> {
    first_existing([path.join("android/app/build"), path.join("app/build")]).or_else(|| {
        (files::file_name(path) == "build" && path.is_dir()).then(|| path.to_path_buf())
    })
}

fn title_case(variant: &str) -> String {
    let mut chars = variant.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Candidate (bundle, source map) locations, oldest layout first
pub fn layouts(build_dir: &Path, variant: &str) -> [BundlePair; 3] {
    let create_bundle = format!("createBundle{}JsAndAssets", title_case(variant));
    let generated = build_dir.join("generated");
    let legacy_map = generated
        .join("sourcemaps/react")
        .join(variant)
        .join(format!("{BUNDLE_NAME}.map"));
    [
        BundlePair {
            bundle: generated.join("assets/react").join(variant).join(BUNDLE_NAME),
            source_map: legacy_map.clone(),
        },
        BundlePair {
            bundle: generated.join("assets").join(&create_bundle).join(BUNDLE_NAME),
            source_map: legacy_map,
        },
        BundlePair {
            bundle: generated.join("assets").join(&create_bundle).join(BUNDLE_NAME),
            source_map: build_dir
                .join("intermediates/sourcemaps/react")
                .join(variant)
                .join(format!("{BUNDLE_NAME}.map")),
        },
    ]
}

/// First layout with both files present
pub fn discover(build_dir: &Path, variant: &str) -> Option<BundlePair> {
    layouts(build_dir, variant)
        .into_iter()
        .find(|pair| pair.bundle.is_file() && pair.source_map.is_file())
}

/// One plan per input path
pub fn resolve(ctx: &ResolveContext<'_>, options: &ReactNativeAndroidOptions) -> Result<Vec<UploadPlan>> {
    let mut plans = Vec::new();
    for path in &options.paths {
        files::ensure_exists(path)?;
        let build = build_dir(path);
        let discovered = build.as_deref().and_then(|dir| discover(dir, &options.variant));

        let bundle = options
            .identity
            .bundle
            .clone()
            .or_else(|| discovered.as_ref().map(|p| p.bundle.clone()))
            .ok_or_else(|| {
                AppError::invalid("Could not find a bundle file, please specify the path by using --bundle")
            })?;
        let source_map = options
            .identity
            .source_map
            .clone()
            .or_else(|| discovered.as_ref().map(|p| p.source_map.clone()))
            .ok_or_else(|| {
                AppError::invalid(
                    "Could not find a source map file, please specify the path by using --source-map",
                )
            })?;

        let manifest_path = options.app_manifest.clone().or_else(|| {
            build
                .as_deref()
                .map(|dir| merged_manifest_path(dir, &options.variant))
        });
        let manifest = manifest_layer(ctx, manifest_path.as_deref());
        let mut cli = options.identity.layer(path);
        cli.version_code = options.version_code.clone();
        let descriptor = ctx.merge(&cli, &manifest);
        require_api_key(&descriptor)?;

        plans.push(bundle_plan(
            ctx,
            ArtifactKind::ReactNativeAndroid,
            &descriptor,
            Platform::Android,
            &BundlePair { bundle, source_map },
        )?);
    }
    Ok(plans)
}
