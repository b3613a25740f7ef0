//! Unity Android: `.symbols.zip` native symbols, IL2CPP line mappings and
//! the App Bundle built alongside them.

use super::{Il2cppMappingFlags, android_candidates, line_mapping_file};
use crate::endpoint::Route;
use crate::error::{AppError, Result};
use crate::files::{self, extract_zip};
use crate::model::{ArtifactKind, BuildDescriptor, Platform};
use crate::readers::elf;
use crate::readers::manifest::read_manifest_from_aab;
use crate::resolvers::android::AndroidIdentity;
use crate::resolvers::android::aab::{self, AabOptions};
use crate::resolvers::{ResolveContext, require_api_key};
use crate::upload::{ArtifactFile, FilePart, SoFileFields, UploadPlan};
use std::path::{Path, PathBuf};

const SYMBOLS_ZIP: &str = ".symbols.zip";
const IL2CPP_SYM: &str = "libil2cpp.sym.so";
const IL2CPP_DBG: &str = "libil2cpp.dbg.so";

/// `upload unity-android`
#[derive(Debug, Clone, Default, clap::Args)]
pub struct UnityAndroidOptions {
    #[command(flatten)]
    pub identity: AndroidIdentity,
    #[command(flatten)]
    pub mapping: Il2cppMappingFlags,
    /// Architectures to upload; defaults to every one in the archive
    #[arg(long = "arch", value_delimiter = ',')]
    pub arches: Vec<String>,
    /// App Bundle built with the symbols, overriding discovery
    #[arg(long)]
    pub aab_path: Option<PathBuf>,
    /// NDK used for the App Bundle's symbols
    #[arg(long)]
    pub ndk_root: Option<PathBuf>,
    /// Unity build output directory or `.symbols.zip`
    #[arg(default_value = ".")]
    pub paths: Vec<PathBuf>,
}

/// Inputs found for one path
#[derive(Debug, Default, PartialEq, Eq)]
pub struct UnityOutputs {
    /// `.symbols.zip`
    pub symbols_zip: PathBuf,
    /// App Bundle next to it
    pub aab: Option<PathBuf>,
    /// Directory searched for line mappings
    pub build_dir: PathBuf,
}

/// Find the newest `.symbols.zip` (and `.aab`) for one path
pub fn locate_outputs(path: &Path, aab: Option<&Path>) -> Result<UnityOutputs> {
    files::ensure_exists(path)?;
    let (symbols_zip, build_dir) = if path.is_dir() {
        let zip = files::find_latest_file_with_suffix(path, SYMBOLS_ZIP)?.ok_or_else(|| {
            AppError::NotFound {
                what: format!("a {SYMBOLS_ZIP} file in {}", path.display()),
            }
        })?;
        (zip, path.to_path_buf())
    } else if files::file_name(path).ends_with(SYMBOLS_ZIP) {
        let parent = path.parent().unwrap_or(Path::new(".")).to_path_buf();
        (path.to_path_buf(), parent)
    } else {
        return Err(AppError::invalid(format!(
            "{} is not a directory or a {SYMBOLS_ZIP} file",
            path.display()
        )));
    };

    let aab = match aab {
        Some(aab) => {
            files::ensure_exists(aab)?;
            Some(aab.to_path_buf())
        }
        None => files::find_latest_file_with_suffix(&build_dir, ".aab")?,
    };
    Ok(UnityOutputs {
        symbols_zip,
        aab,
        build_dir,
    })
}

/// Shared objects of one architecture directory.
///
/// When both the stripped and the debug IL2CPP library are present only the
/// debug one is kept.
pub fn select_symbol_files(arch_dir: &Path) -> Result<Vec<PathBuf>> {
    let found: Vec<PathBuf> = files::walk_files(arch_dir)?
        .into_iter()
        .filter(|p| files::file_name(p).ends_with(".so"))
        .collect();
    let has_dbg = found.iter().any(|p| files::file_name(p) == IL2CPP_DBG);
    Ok(found
        .into_iter()
        .filter(|p| !(has_dbg && files::file_name(p) == IL2CPP_SYM))
        .collect())
}

/// `libfoo.sym.so` and `libfoo.dbg.so` are both `libfoo.so` on device
pub fn shared_object_name(file: &Path) -> String {
    let name = files::file_name(file);
    for suffix in [".sym.so", ".dbg.so"] {
        if let Some(stem) = name.strip_suffix(suffix) {
            return format!("{stem}.so");
        }
    }
    name
}

fn manifest_layer(ctx: &ResolveContext<'_>, aab: Option<&Path>) -> BuildDescriptor {
    let Some(aab) = aab else {
        return BuildDescriptor::default();
    };
    match read_manifest_from_aab(aab) {
        Ok(data) => data.to_descriptor(),
        Err(e) => {
            ctx.output
                .warn(&format!("Unable to read the manifest in {}: {}", aab.display(), e));
            BuildDescriptor::default()
        }
    }
}

/// Symbol and line-mapping plans, followed by the App Bundle's plans
pub async fn resolve(ctx: &ResolveContext<'_>, options: &UnityAndroidOptions) -> Result<Vec<UploadPlan>> {
    let mut plans = Vec::new();
    for path in &options.paths {
        let outputs = locate_outputs(path, options.aab_path.as_deref())?;
        let manifest = manifest_layer(ctx, outputs.aab.as_deref());
        let descriptor = ctx.merge(&options.identity.layer(), &manifest);
        require_api_key(&descriptor)?;

        ctx.output.info(&format!(
            "Extracting {} into a temporary directory",
            files::file_name(&outputs.symbols_zip)
        ));
        let scratch = extract_zip(&outputs.symbols_zip, "unity-android")?;
        let arches = if options.arches.is_empty() {
            files::list_subdirs(scratch.path())?
                .iter()
                .map(|p| files::file_name(p))
                .collect()
        } else {
            options.arches.clone()
        };

        let mut plan = ctx.plan(ArtifactKind::UnityAndroid, &descriptor)?;
        let mut il2cpp = None;
        for arch in &arches {
            let arch_dir = scratch.path().join(arch);
            if !arch_dir.is_dir() {
                ctx.output
                    .warn(&format!("No symbols for architecture {arch}"));
                continue;
            }
            for file in select_symbol_files(&arch_dir)? {
                let name = shared_object_name(&file);
                if name == "libil2cpp.so" && il2cpp.is_none() {
                    il2cpp = Some(file.clone());
                }
                let fields = SoFileFields::new(&descriptor, &name, ctx.overwrite);
                plan.push(
                    ArtifactFile::new(Route::NdkSymbol, &fields, FilePart::local("soFile", &file))
                        .named(format!("{arch}/{}", files::file_name(&file))),
                );
            }
        }

        if let Some(mapping) = options.mapping.resolve(android_candidates(&outputs.build_dir))? {
            match il2cpp.as_deref().map(elf::build_id) {
                Some(Ok(build_id)) => {
                    plan.push(line_mapping_file(ctx, &descriptor, Platform::Android, &build_id, &mapping));
                }
                Some(Err(e)) => ctx
                    .output
                    .warn(&format!("Skipping line mappings, no libil2cpp build id: {e}")),
                None => ctx
                    .output
                    .warn("Skipping line mappings, libil2cpp.so not found in the symbols"),
            }
        }
        plan.hold(scratch);
        plans.push(plan);

        if let Some(aab) = outputs.aab {
            ctx.output.info(&format!("Uploading App Bundle {}", aab.display()));
            let aab_options = AabOptions {
                identity: options.identity.clone(),
                ndk_root: options.ndk_root.clone(),
                paths: vec![aab],
            };
            plans.extend(aab::resolve(ctx, &aab_options).await?);
        }
    }
    Ok(plans)
}
