//! Apple dSYM resolvers.
//!
//! Three entry points share one pipeline: find dSYM bundles (or loose DWARF
//! files), ask `dwarfdump` for their UUID slices, and upload each DWARF file
//! once. They differ only in where the dSYMs and the Info.plist come from:
//! a path tree (`dsym`), Xcode build settings (`xcode-build`) or an
//! `.xcarchive` (`xcode-archive`).

pub mod dsym;
pub mod xcode_archive;
pub mod xcode_build;

use super::{ResolveContext, cwd_string, require_api_key};
use crate::endpoint::Route;
use crate::error::{AppError, ErrorExt, Result};
use crate::files::{self, ScratchDir, extract_zip};
use crate::model::{ArtifactKind, BuildDescriptor, DwarfInfo};
use crate::readers::plist::read_plist;
use crate::tools::dwarfdump;
use crate::tools::xcodebuild::{self, BuildSettings};
use crate::upload::{ArtifactFile, DsymFields, FilePart, UploadPlan};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

const DWARF_DIR: [&str; 3] = ["Contents", "Resources", "DWARF"];

/// Flags shared by every dSYM kind
#[derive(Debug, Clone, Default, clap::Args)]
pub struct DsymFlags {
    /// Path prefix to strip from file names in stack traces
    #[arg(long)]
    pub project_root: Option<String>,
    /// Skip zero-byte DWARF files instead of failing
    #[arg(long)]
    pub ignore_empty_dsym: bool,
    /// Skip files `dwarfdump` finds no UUID in instead of failing
    #[arg(long)]
    pub ignore_missing_dwarf: bool,
    /// Info.plist to read the API key from
    #[arg(long)]
    pub plist: Option<PathBuf>,
}

/// DWARF locations found for one input path
#[derive(Debug, Default)]
pub struct DsymLocations {
    /// `<bundle>.dSYM/Contents/Resources/DWARF` directories, or loose files
    pub locations: Vec<PathBuf>,
    /// Extraction directory when the input was a zip
    pub scratch: Option<ScratchDir>,
}

/// Find dSYM bundles below `path`.
///
/// Directories are walked for `*.dSYM` (any case), ignoring anything under
/// `__MACOSX`. A `.zip` is extracted first. Any other file is taken as a
/// DWARF file.
pub fn find_dsyms(path: &Path) -> Result<DsymLocations> {
    files::ensure_exists(path)?;
    if path.is_dir() {
        return Ok(DsymLocations {
            locations: dwarf_dirs(path)?,
            scratch: None,
        });
    }
    if files::has_extension(path, "zip") {
        let scratch = extract_zip(path, "dsym")?;
        return Ok(DsymLocations {
            locations: dwarf_dirs(scratch.path())?,
            scratch: Some(scratch),
        });
    }
    Ok(DsymLocations {
        locations: vec![path.to_path_buf()],
        scratch: None,
    })
}

fn dwarf_dirs(root: &Path) -> Result<Vec<PathBuf>> {
    Ok(files::find_dirs_with_suffix_ci(root, ".dsym")?
        .into_iter()
        .filter(|dsym| !dsym.to_string_lossy().to_ascii_lowercase().contains("__macosx"))
        .map(|dsym| dsym.join(DWARF_DIR.iter().collect::<PathBuf>()))
        .collect())
}

/// UUID slices of every DWARF file at `locations`
pub async fn collect_dwarf(
    ctx: &ResolveContext<'_>,
    locations: &[PathBuf],
    flags: &DsymFlags,
) -> Result<Vec<DwarfInfo>> {
    let mut found = Vec::new();
    for location in locations {
        let candidates = if location.is_dir() {
            let mut entries = Vec::new();
            for entry in std::fs::read_dir(location).fs_context("reading directory", location)? {
                let path = entry.fs_context("reading directory", location)?.path();
                if path.is_file() {
                    entries.push(path);
                }
            }
            entries.sort();
            entries
        } else {
            vec![location.clone()]
        };

        for file in candidates {
            let size = std::fs::metadata(&file)
                .fs_context("reading metadata", &file)?
                .len();
            if size == 0 {
                let message = format!("{} is empty", file.display());
                if !flags.ignore_empty_dsym {
                    return Err(AppError::invalid(message));
                }
                ctx.output.info(&message);
                continue;
            }

            let slices = dwarfdump::dwarf_info(&file, ctx.cancel).await?;
            if slices.is_empty() {
                let message = format!("{} is not a valid DWARF file", file.display());
                if !flags.ignore_missing_dwarf {
                    return Err(AppError::invalid(message));
                }
                ctx.output.info(&message);
                continue;
            }
            found.extend(slices);
        }
    }
    Ok(found)
}

/// One upload per DWARF file; slices of a universal binary share a file
pub fn dsym_plan(
    ctx: &ResolveContext<'_>,
    kind: ArtifactKind,
    descriptor: &BuildDescriptor,
    dwarf: &[DwarfInfo],
) -> Result<UploadPlan> {
    let mut plan = ctx.plan(kind, descriptor)?;
    let fields = DsymFields {
        api_key: descriptor.api_key.clone(),
        project_root: descriptor.project_root.clone(),
        overwrite: ctx.overwrite,
    };

    let mut seen = BTreeSet::new();
    for info in dwarf {
        ctx.output.debug(&format!(
            "Found UUID {} ({}) in {}",
            info.uuid,
            info.arch,
            info.path().display()
        ));
        let path = info.path();
        if !seen.insert(path.clone()) {
            continue;
        }
        plan.push(
            ArtifactFile::new(Route::Dsym, &fields, FilePart::local("dsym", &path))
                .named(format!("{} ({})", info.name, info.uuid)),
        );
    }
    Ok(plan)
}

/// Plist layer; an unreadable plist only costs the values it would give
pub fn plist_layer(ctx: &ResolveContext<'_>, path: Option<&Path>) -> BuildDescriptor {
    let Some(path) = path else {
        return BuildDescriptor::default();
    };
    if !path.is_file() {
        ctx.output
            .debug(&format!("No Info.plist found at {}", path.display()));
        return BuildDescriptor::default();
    }
    match read_plist(path) {
        Ok(data) => {
            ctx.output
                .debug(&format!("Read identity values from {}", path.display()));
            data.to_descriptor()
        }
        Err(e) => {
            ctx.output
                .warn(&format!("Unable to read {}: {}", path.display(), e));
            BuildDescriptor::default()
        }
    }
}

/// Merge, locate DWARF slices and build the plan for one set of locations
pub async fn resolve_locations(
    ctx: &ResolveContext<'_>,
    kind: ArtifactKind,
    flags: &DsymFlags,
    default_root: Option<String>,
    plist: Option<&Path>,
    found: DsymLocations,
) -> Result<(UploadPlan, Vec<DwarfInfo>)> {
    let cli = BuildDescriptor {
        project_root: flags.project_root.clone().or(default_root).or_else(cwd_string),
        ..Default::default()
    };
    let plist = plist_layer(ctx, flags.plist.as_deref().or(plist));
    let descriptor = ctx.merge(&cli, &plist);
    require_api_key(&descriptor)?;

    if found.locations.is_empty() {
        return Err(AppError::NotFound {
            what: "dSYM files".to_string(),
        });
    }
    let dwarf = collect_dwarf(ctx, &found.locations, flags).await?;
    let mut plan = dsym_plan(ctx, kind, &descriptor, &dwarf)?;
    if let Some(scratch) = found.scratch {
        plan.hold(scratch);
    }
    Ok((plan, dwarf))
}

/// Scheme and build settings for a project; failures become warnings
pub async fn project_settings(
    ctx: &ResolveContext<'_>,
    project: &Path,
    scheme: Option<&str>,
    configuration: Option<&str>,
) -> (Option<String>, Option<BuildSettings>) {
    let scheme = match scheme {
        Some(scheme) => match xcodebuild::ensure_scheme(project, scheme, ctx.cancel).await {
            Ok(()) => Some(scheme.to_string()),
            Err(e) => {
                ctx.output.warn(&e.to_string());
                None
            }
        },
        None => match xcodebuild::default_scheme(project, ctx.cancel).await {
            Ok(scheme) => Some(scheme),
            Err(e) => {
                ctx.output.warn(&e.to_string());
                None
            }
        },
    };
    let Some(scheme) = scheme else {
        return (None, None);
    };
    match xcodebuild::build_settings(project, &scheme, configuration, ctx.cancel).await {
        Ok(settings) => (Some(scheme), Some(settings)),
        Err(e) => {
            ctx.output.warn(&e.to_string());
            (Some(scheme), None)
        }
    }
}

/// Parent directory of a project, as a project root
pub fn project_parent(project: &Path) -> Option<String> {
    project.parent().map(super::path_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{LogLevel, OutputManager, Tag};
    use crate::resolvers::tests::{API_KEY, context};
    use std::fs;
    use std::io::Write;
    use tokio_util::sync::CancellationToken;

    fn dsym_bundle(root: &Path, name: &str) -> PathBuf {
        let dwarf = root.join(name).join("Contents/Resources/DWARF");
        fs::create_dir_all(&dwarf).unwrap();
        fs::write(dwarf.join("App"), "dwarf").unwrap();
        dwarf
    }

    #[test]
    fn test_find_dsyms_skips_macosx() {
        let dir = tempfile::tempdir().unwrap();
        let app = dsym_bundle(dir.path(), "build/App.app.dSYM");
        let framework = dsym_bundle(dir.path(), "build/Lib.framework.DSYM");
        dsym_bundle(dir.path(), "__MACOSX/App.app.dSYM");

        let found = find_dsyms(dir.path()).unwrap();
        assert_eq!(found.locations, vec![app, framework]);
        assert!(found.scratch.is_none());
    }

    #[test]
    fn test_find_dsyms_in_zip() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("dsyms.zip");
        let mut zip = zip::ZipWriter::new(fs::File::create(&archive).unwrap());
        zip.start_file(
            "App.app.dSYM/Contents/Resources/DWARF/App",
            zip::write::SimpleFileOptions::default(),
        )
        .unwrap();
        zip.write_all(b"dwarf").unwrap();
        zip.finish().unwrap();

        let found = find_dsyms(&archive).unwrap();
        let scratch = found.scratch.as_ref().unwrap().path().to_path_buf();
        assert_eq!(
            found.locations,
            vec![scratch.join("App.app.dSYM/Contents/Resources/DWARF")]
        );
        assert!(found.locations[0].join("App").is_file());
    }

    #[test]
    fn test_loose_file_is_a_location() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("App");
        fs::write(&file, "dwarf").unwrap();
        assert_eq!(find_dsyms(&file).unwrap().locations, vec![file]);
    }

    #[tokio::test]
    async fn test_empty_dwarf_file() {
        let dir = tempfile::tempdir().unwrap();
        let dwarf = dir.path().join("App.dSYM/Contents/Resources/DWARF");
        fs::create_dir_all(&dwarf).unwrap();
        fs::write(dwarf.join("App"), "").unwrap();

        let output = OutputManager::capture(LogLevel::Debug);
        let cancel = CancellationToken::new();
        let ctx = context(&output, &cancel);
        let err = collect_dwarf(&ctx, &[dwarf.clone()], &DsymFlags::default())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("is empty"));

        let flags = DsymFlags {
            ignore_empty_dsym: true,
            ..Default::default()
        };
        assert!(collect_dwarf(&ctx, &[dwarf], &flags).await.unwrap().is_empty());
        assert!(output.contains(Tag::Info, "is empty"));
    }

    #[test]
    fn test_plan_has_one_file_per_dwarf() {
        let output = OutputManager::capture(LogLevel::Debug);
        let cancel = CancellationToken::new();
        let ctx = context(&output, &cancel);
        let location = PathBuf::from("/tmp/App.dSYM/Contents/Resources/DWARF");
        let slice = |uuid: &str, arch: &str| DwarfInfo {
            uuid: uuid.to_string(),
            arch: arch.to_string(),
            name: "App".to_string(),
            location: location.clone(),
        };
        let descriptor = BuildDescriptor {
            api_key: Some(API_KEY.into()),
            project_root: Some("/src/app".into()),
            ..Default::default()
        };
        let plan = dsym_plan(
            &ctx,
            ArtifactKind::Dsym,
            &descriptor,
            &[slice("AAAA", "arm64"), slice("BBBB", "x86_64")],
        )
        .unwrap();
        assert_eq!(plan.files.len(), 1);
        let file = &plan.files[0];
        assert_eq!(file.route, Route::Dsym);
        assert_eq!(file.parts[0].field, "dsym");
        assert_eq!(file.fields["projectRoot"], "/src/app");
        assert!(output.contains(Tag::Debug, "BBBB"));
    }

    #[test]
    fn test_plist_layer_is_optional() {
        let output = OutputManager::capture(LogLevel::Debug);
        let cancel = CancellationToken::new();
        let ctx = context(&output, &cancel);
        let dir = tempfile::tempdir().unwrap();
        let broken = dir.path().join("Info.plist");
        fs::write(&broken, "not a plist").unwrap();
        assert_eq!(plist_layer(&ctx, Some(&broken)), BuildDescriptor::default());
        assert!(output.contains(Tag::Warn, "Unable to read"));
        assert_eq!(plist_layer(&ctx, None), BuildDescriptor::default());
    }
}
