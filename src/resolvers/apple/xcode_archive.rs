//! dSYMs from an `.xcarchive`, given directly or found in Xcode's archive
//! directory for a scheme.

use super::{DsymFlags, find_dsyms, project_parent, resolve_locations};
use crate::error::{AppError, Result};
use crate::files;
use crate::model::{ArtifactKind, DwarfInfo};
use crate::resolvers::ResolveContext;
use crate::tools::{defaults, xcodebuild};
use crate::upload::UploadPlan;
use std::path::{Path, PathBuf};

/// `upload xcode-archive`
#[derive(Debug, Clone, Default, clap::Args)]
pub struct XcodeArchiveOptions {
    #[command(flatten)]
    pub flags: DsymFlags,
    /// Scheme whose latest archive is uploaded
    #[arg(long)]
    pub scheme: Option<String>,
    /// Xcode project or workspace
    #[arg(long)]
    pub xcode_project: Option<PathBuf>,
    /// Archive to upload, overriding discovery
    #[arg(long)]
    pub xcarchive_path: Option<PathBuf>,
    /// `.xcarchive` or a directory holding an Xcode project
    #[arg(default_value = ".")]
    pub paths: Vec<PathBuf>,
}

/// An archive and the project it was built from
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ArchiveLookup {
    /// `.xcarchive` directory
    pub archive: PathBuf,
    /// Default project root
    pub project_root: Option<String>,
    /// Scheme the archive was picked for
    pub scheme: Option<String>,
}

/// True for a path named `*.xcarchive`
pub fn is_archive(path: &Path) -> bool {
    files::has_extension(path, "xcarchive")
}

/// Locate the archive to upload for `path`.
///
/// An archive path is used as is. Otherwise the path must hold an Xcode
/// project; the newest archive for its scheme is taken from Xcode's
/// archive directory.
pub async fn locate_archive(
    ctx: &ResolveContext<'_>,
    path: &Path,
    project: Option<&Path>,
    scheme: Option<&str>,
) -> Result<ArchiveLookup> {
    files::ensure_exists(path)?;
    if is_archive(path) {
        return Ok(ArchiveLookup {
            archive: path.to_path_buf(),
            ..Default::default()
        });
    }

    let project = project
        .map(Path::to_path_buf)
        .or_else(|| xcodebuild::find_project_or_workspace(path))
        .ok_or_else(|| AppError::NotFound {
            what: format!("xcarchive in {}", path.display()),
        })?;
    let scheme = match scheme {
        Some(scheme) => {
            xcodebuild::ensure_scheme(&project, scheme, ctx.cancel).await?;
            scheme.to_string()
        }
        None => xcodebuild::default_scheme(&project, ctx.cancel).await?,
    };

    let archives = defaults::xcode_archives_dir(ctx.cancel).await?;
    ctx.output.debug(&format!(
        "Searching {} for {} archives",
        archives.display(),
        scheme
    ));
    let archive = defaults::latest_archive_for_scheme(&archives, &scheme)?.ok_or_else(|| {
        AppError::NotFound {
            what: format!("xcarchive for scheme {} in {}", scheme, archives.display()),
        }
    })?;
    ctx.output
        .info(&format!("Using archive {}", archive.display()));
    Ok(ArchiveLookup {
        archive,
        project_root: project_parent(&project),
        scheme: Some(scheme),
    })
}

/// Plan for one archive; also returns the UUID slices found in it
pub async fn archive_plan(
    ctx: &ResolveContext<'_>,
    kind: ArtifactKind,
    flags: &DsymFlags,
    lookup: ArchiveLookup,
) -> Result<(UploadPlan, Vec<DwarfInfo>)> {
    let found = find_dsyms(&lookup.archive)?;
    if found.locations.is_empty() {
        return Err(AppError::NotFound {
            what: format!("dSYM files in {}", lookup.archive.display()),
        });
    }
    let plist = lookup.archive.join("Info.plist");
    resolve_locations(ctx, kind, flags, lookup.project_root, Some(&plist), found).await
}

/// One plan per input path
pub async fn resolve(ctx: &ResolveContext<'_>, options: &XcodeArchiveOptions) -> Result<Vec<UploadPlan>> {
    let mut plans = Vec::new();
    for path in &options.paths {
        let lookup = match &options.xcarchive_path {
            Some(archive) => {
                files::ensure_exists(archive)?;
                ArchiveLookup {
                    archive: archive.clone(),
                    ..Default::default()
                }
            }
            None => {
                locate_archive(
                    ctx,
                    path,
                    options.xcode_project.as_deref(),
                    options.scheme.as_deref(),
                )
                .await?
            }
        };
        let (plan, _) = archive_plan(ctx, ArtifactKind::XcodeArchive, &options.flags, lookup).await?;
        plans.push(plan);
    }
    Ok(plans)
}
