//! dSYMs from an Xcode build directory, located through build settings.

use super::xcode_archive::is_archive;
use super::{DsymFlags, find_dsyms, project_parent, project_settings, resolve_locations};
use crate::error::{AppError, Result};
use crate::files;
use crate::model::ArtifactKind;
use crate::resolvers::ResolveContext;
use crate::tools::xcodebuild::is_project_or_workspace;
use crate::upload::UploadPlan;
use std::path::{Path, PathBuf};

/// `upload xcode-build`
#[derive(Debug, Clone, Default, clap::Args)]
pub struct XcodeBuildOptions {
    #[command(flatten)]
    pub flags: DsymFlags,
    /// Scheme whose build settings locate the dSYM
    #[arg(long)]
    pub scheme: Option<String>,
    /// Build configuration, e.g. Release
    #[arg(long)]
    pub configuration: Option<String>,
    /// Xcode project or workspace
    #[arg(long)]
    pub xcode_project: Option<PathBuf>,
    /// dSYM location, or an Xcode project/workspace
    #[arg(default_value = ".")]
    pub paths: Vec<PathBuf>,
}

/// Where to look for dSYMs once build settings have been consulted
#[derive(Debug, Default, PartialEq, Eq)]
pub struct BuildLookup {
    /// dSYM bundle or a directory containing some
    pub dsym_path: Option<PathBuf>,
    /// Info.plist from build settings
    pub plist: Option<PathBuf>,
    /// Default project root
    pub project_root: Option<String>,
}

/// Resolve `path` to a dSYM location, using the project's build settings
/// when `path` does not point at dSYMs itself.
pub async fn lookup(
    ctx: &ResolveContext<'_>,
    path: &Path,
    project: Option<&Path>,
    scheme: Option<&str>,
    configuration: Option<&str>,
) -> Result<BuildLookup> {
    files::ensure_exists(path)?;
    if is_archive(path) {
        ctx.output.warn(&format!(
            "{} is an Xcode archive; use `upload xcode-archive` for archives",
            path.display()
        ));
    }

    let path_is_project = is_project_or_workspace(path);
    let project = match project {
        Some(project) => Some(project.to_path_buf()),
        None if path_is_project => Some(path.to_path_buf()),
        None => None,
    };
    let mut lookup = BuildLookup {
        dsym_path: (!path_is_project).then(|| path.to_path_buf()),
        ..Default::default()
    };

    if let Some(project) = &project {
        lookup.project_root = project_parent(project);
        let (_, settings) = project_settings(ctx, project, scheme, configuration).await;
        if let Some(settings) = settings {
            if lookup.dsym_path.is_none() {
                lookup.dsym_path = settings.dsym_path().filter(|p| p.exists());
            }
            lookup.plist = settings.info_plist();
        }
    }
    Ok(lookup)
}

/// Shared by `xcode-build` and `dsym --scheme`
pub async fn resolve_path(
    ctx: &ResolveContext<'_>,
    kind: ArtifactKind,
    flags: &DsymFlags,
    path: &Path,
    project: Option<&Path>,
    scheme: Option<&str>,
    configuration: Option<&str>,
) -> Result<UploadPlan> {
    let lookup = lookup(ctx, path, project, scheme, configuration).await?;
    let dsym_path = lookup.dsym_path.ok_or_else(|| {
        AppError::invalid(
            "No dSYM locations detected. Provide a dSYM path or an Xcode project/workspace with --scheme",
        )
    })?;
    let found = find_dsyms(&dsym_path)?;
    if found.locations.is_empty() {
        return Err(AppError::NotFound {
            what: format!("dSYM files in {}", dsym_path.display()),
        });
    }
    let (plan, _) = resolve_locations(
        ctx,
        kind,
        flags,
        lookup.project_root,
        lookup.plist.as_deref(),
        found,
    )
    .await?;
    Ok(plan)
}

/// One plan per input path
pub async fn resolve(ctx: &ResolveContext<'_>, options: &XcodeBuildOptions) -> Result<Vec<UploadPlan>> {
    let mut plans = Vec::new();
    for path in &options.paths {
        plans.push(
            resolve_path(
                ctx,
                ArtifactKind::XcodeBuild,
                &options.flags,
                path,
                options.xcode_project.as_deref(),
                options.scheme.as_deref(),
                options.configuration.as_deref(),
            )
            .await?,
        );
    }
    Ok(plans)
}
