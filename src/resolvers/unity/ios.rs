//! Unity iOS: dSYMs from the archive of a Unity Xcode export, plus the
//! IL2CPP line mappings for `UnityFramework`.

use super::{Il2cppMappingFlags, ios_candidates, line_mapping_file};
use crate::error::Result;
use crate::files;
use crate::model::{ArtifactKind, DwarfInfo, Platform};
use crate::resolvers::ResolveContext;
use crate::resolvers::apple::DsymFlags;
use crate::resolvers::apple::xcode_archive::{ArchiveLookup, archive_plan, is_archive, locate_archive};
use crate::upload::UploadPlan;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

const FRAMEWORK: &str = "UnityFramework";

/// `upload unity-ios`
#[derive(Debug, Clone, Default, clap::Args)]
pub struct UnityIosOptions {
    #[command(flatten)]
    pub flags: DsymFlags,
    #[command(flatten)]
    pub mapping: Il2cppMappingFlags,
    /// Scheme whose latest archive is uploaded
    #[arg(long)]
    pub scheme: Option<String>,
    /// Xcode project or workspace
    #[arg(long)]
    pub xcode_project: Option<PathBuf>,
    /// Archive to upload, overriding discovery
    #[arg(long)]
    pub xcarchive_path: Option<PathBuf>,
    /// Unity Xcode export directory or `.xcarchive`
    #[arg(default_value = ".")]
    pub paths: Vec<PathBuf>,
}

/// UUIDs of the `UnityFramework` slices, deduplicated
pub fn framework_uuids(dwarf: &[DwarfInfo]) -> Vec<String> {
    let mut seen = BTreeSet::new();
    dwarf
        .iter()
        .filter(|info| info.name == FRAMEWORK)
        .filter(|info| seen.insert(info.uuid.clone()))
        .map(|info| info.uuid.clone())
        .collect()
}

fn mapping_root(path: &Path) -> PathBuf {
    if is_archive(path) || !path.is_dir() {
        path.parent().unwrap_or(path).to_path_buf()
    } else {
        path.to_path_buf()
    }
}

/// One plan per input path holding dSYMs and line mappings
pub async fn resolve(ctx: &ResolveContext<'_>, options: &UnityIosOptions) -> Result<Vec<UploadPlan>> {
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
        let (mut plan, dwarf) = archive_plan(ctx, ArtifactKind::UnityIos, &options.flags, lookup).await?;

        if let Some(mapping) = options.mapping.resolve(ios_candidates(&mapping_root(path)))? {
            let uuids = framework_uuids(&dwarf);
            if uuids.is_empty() {
                ctx.output.warn(&format!(
                    "Skipping line mappings, no {FRAMEWORK} dSYM found"
                ));
            }
            let descriptor = plan.descriptor.clone();
            for uuid in uuids {
                plan.push(line_mapping_file(ctx, &descriptor, Platform::Ios, &uuid, &mapping));
            }
        } else if !options.mapping.no_upload_il2cpp_mapping {
            ctx.output.debug("No LineNumberMappings.json found");
        }
        plans.push(plan);
    }
    Ok(plans)
}
