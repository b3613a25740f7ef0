//! React Native iOS: `main.jsbundle` from the latest archive (or the
//! build products), source map from the Xcode build directory.

use super::{BundlePair, ReactNativeIdentity, bundle_plan};
use crate::error::{AppError, Result};
use crate::files;
use crate::model::{ArtifactKind, Platform};
use crate::resolvers::apple::xcode_archive::is_archive;
use crate::resolvers::apple::{plist_layer, project_settings};
use crate::resolvers::{ResolveContext, require_api_key};
use crate::tools::{defaults, xcodebuild};
use crate::upload::UploadPlan;
use std::path::{Path, PathBuf};

const BUNDLE_NAME: &str = "main.jsbundle";

/// `upload react-native-ios`
#[derive(Debug, Clone, Default, clap::Args)]
pub struct ReactNativeIosOptions {
    #[command(flatten)]
    pub identity: ReactNativeIdentity,
    /// Apple bundle version
    #[arg(long)]
    pub bundle_version: Option<String>,
    /// Scheme the app was archived with
    #[arg(long)]
    pub scheme: Option<String>,
    /// Xcode project or workspace
    #[arg(long)]
    pub xcode_project: Option<PathBuf>,
    /// Archive holding the app, overriding discovery
    #[arg(long)]
    pub xcarchive_path: Option<PathBuf>,
    /// Info.plist to read identity values from
    #[arg(long)]
    pub plist: Option<PathBuf>,
    /// React Native project root, its `ios` directory or an `.xcarchive`
    #[arg(default_value = ".")]
    pub paths: Vec<PathBuf>,
}

/// Directories derived from the input path
#[derive(Debug, Default, PartialEq, Eq)]
pub struct IosLayout {
    /// React Native project root
    pub root: PathBuf,
    /// Xcode build directory holding `sourcemaps/`
    pub build_dir: Option<PathBuf>,
    /// Archive given as the input path
    pub archive: Option<PathBuf>,
}

/// Work out the project root and build directory for `path`.
///
/// Without a build directory both `--bundle` and `--source-map` are needed.
pub fn layout(path: &Path, explicit_files: bool) -> Result<IosLayout> {
    files::ensure_exists(path)?;
    if is_archive(path) {
        return Ok(IosLayout {
            root: path.parent().unwrap_or(path).to_path_buf(),
            build_dir: None,
            archive: Some(path.to_path_buf()),
        });
    }
    let ios_build = path.join("ios").join("build");
    if ios_build.is_dir() {
        return Ok(IosLayout {
            root: path.to_path_buf(),
            build_dir: Some(ios_build),
            archive: None,
        });
    }
    let build = path.join("build");
    if build.is_dir() {
        return Ok(IosLayout {
            root: path.parent().unwrap_or(path).to_path_buf(),
            build_dir: Some(build),
            archive: None,
        });
    }
    if explicit_files {
        return Ok(IosLayout {
            root: path.to_path_buf(),
            ..Default::default()
        });
    }
    Err(AppError::NotFound {
        what: format!(
            "an iOS build directory in {} (use --bundle and --source-map to skip discovery)",
            path.display()
        ),
    })
}

/// `Products/Applications/<scheme>.app`, or the only app when the scheme is
/// unknown
pub fn app_in_archive(archive: &Path, scheme: Option<&str>) -> Option<PathBuf> {
    let apps = archive.join("Products").join("Applications");
    match scheme {
        Some(scheme) => Some(apps.join(format!("{scheme}.app"))).filter(|p| p.is_dir()),
        None => files::list_subdirs(&apps)
            .ok()?
            .into_iter()
            .find(|p| files::has_extension(p, "app")),
    }
}

/// Source map from the flag, `$SOURCEMAP_FILE`, or the build directory
pub fn source_map_path(explicit: Option<&Path>, build_dir: Option<&Path>) -> Option<PathBuf> {
    explicit
        .map(Path::to_path_buf)
        .or_else(|| {
            std::env::var_os("SOURCEMAP_FILE")
                .filter(|v| !v.is_empty())
                .map(PathBuf::from)
        })
        .or_else(|| build_dir.map(|dir| dir.join("sourcemaps").join(format!("{BUNDLE_NAME}.map"))))
}

async fn app_dir(
    ctx: &ResolveContext<'_>,
    options: &ReactNativeIosOptions,
    layout: &IosLayout,
) -> Result<Option<PathBuf>> {
    let project = match &options.xcode_project {
        Some(project) => {
            files::ensure_exists(project)?;
            Some(project.clone())
        }
        None => xcodebuild::find_project_or_workspace(&layout.root.join("ios")),
    };
    let (scheme, settings) = match &project {
        Some(project) => project_settings(ctx, project, options.scheme.as_deref(), None).await,
        None => (options.scheme.clone(), None),
    };

    let mut archive = options.xcarchive_path.clone().or_else(|| layout.archive.clone());
    if archive.is_none()
        && let Some(scheme) = &scheme
    {
        archive = match defaults::xcode_archives_dir(ctx.cancel).await {
            Ok(dir) => defaults::latest_archive_for_scheme(&dir, scheme).unwrap_or_else(|e| {
                ctx.output.warn(&e.to_string());
                None
            }),
            Err(e) => {
                ctx.output.warn(&e.to_string());
                None
            }
        };
    }

    if let Some(app) = archive
        .as_deref()
        .and_then(|archive| app_in_archive(archive, scheme.as_deref()))
    {
        return Ok(Some(app));
    }
    Ok(settings
        .and_then(|s| s.info_plist())
        .and_then(|plist| plist.parent().map(Path::to_path_buf)))
}

/// One plan per input path
pub async fn resolve(ctx: &ResolveContext<'_>, options: &ReactNativeIosOptions) -> Result<Vec<UploadPlan>> {
    let explicit = options.identity.bundle.is_some() && options.identity.source_map.is_some();
    let mut plans = Vec::new();
    for path in &options.paths {
        let layout = layout(path, explicit)?;
        let app = if explicit && options.plist.is_some() {
            None
        } else {
            app_dir(ctx, options, &layout).await?
        };

        let bundle = options
            .identity
            .bundle
            .clone()
            .or_else(|| app.as_ref().map(|dir| dir.join(BUNDLE_NAME)))
            .filter(|p| p.is_file())
            .ok_or_else(|| {
                AppError::invalid("Could not find a bundle file, please specify the path by using --bundle")
            })?;
        let source_map = source_map_path(options.identity.source_map.as_deref(), layout.build_dir.as_deref())
            .filter(|p| p.is_file())
            .ok_or_else(|| {
                AppError::invalid(
                    "Could not find a source map file, please specify the path by using --source-map",
                )
            })?;

        let plist_path = options
            .plist
            .clone()
            .or_else(|| app.as_ref().map(|dir| dir.join("Info.plist")));
        let mut plist = plist_layer(ctx, plist_path.as_deref());
        if options.identity.code_bundle_id.is_some() {
            plist.version_name = None;
            plist.bundle_version = None;
        }
        let mut cli = options.identity.layer(&layout.root);
        cli.bundle_version = options.bundle_version.clone();
        let descriptor = ctx.merge(&cli, &plist);
        require_api_key(&descriptor)?;

        plans.push(bundle_plan(
            ctx,
            ArtifactKind::ReactNativeIos,
            &descriptor,
            Platform::Ios,
            &BundlePair { bundle, source_map },
        )?);
    }
    Ok(plans)
}
