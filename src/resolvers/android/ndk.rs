//! NDK shared-object symbols from a Gradle build.

use super::{AndroidIdentity, find_intermediates, manifest_layer, merged_manifest_path, select_variant};
use crate::endpoint::Route;
use crate::error::{AppError, ErrorExt, Result};
use crate::files::{self, ScratchDir};
use crate::model::{ArtifactKind, BuildDescriptor};
use crate::resolvers::{ResolveContext, require_api_key};
use crate::tools::{Tool, objcopy};
use crate::upload::{ArtifactFile, FilePart, SoFileFields, UploadPlan};
use std::path::{Path, PathBuf};

const NATIVE_LIBS: &str = "merged_native_libs";

/// `upload android-ndk`
#[derive(Debug, Clone, Default, clap::Args)]
pub struct NdkOptions {
    #[command(flatten)]
    pub identity: AndroidIdentity,
    /// Build variant, required when more than one was built
    #[arg(long)]
    pub variant: Option<String>,
    /// NDK used to extract debug sections
    #[arg(long, env = "ANDROID_NDK_ROOT")]
    pub ndk_root: Option<PathBuf>,
    /// AndroidManifest.xml to read identity values from
    #[arg(long)]
    pub app_manifest: Option<PathBuf>,
    /// Project directory, `merged_native_libs` directory or `.so` file
    #[arg(default_value = ".")]
    pub paths: Vec<PathBuf>,
}

/// Shared objects to upload and where their identity comes from
#[derive(Debug, Default, PartialEq, Eq)]
pub struct NativeLibs {
    /// `.so` files in walk order
    pub files: Vec<PathBuf>,
    /// Merged manifest for the chosen variant, when one is expected
    pub manifest: Option<PathBuf>,
}

fn is_shared_object(path: &Path) -> bool {
    let name = files::file_name(path);
    name.ends_with(".so") || name.ends_with(".so.sym")
}

/// Find the shared objects for one input path
pub fn locate_native_libs(path: &Path, variant: Option<&str>) -> Result<NativeLibs> {
    files::ensure_exists(path)?;
    if !path.is_dir() {
        return Ok(NativeLibs {
            files: vec![path.to_path_buf()],
            manifest: None,
        });
    }

    let libs_dir = find_intermediates(path, NATIVE_LIBS)?.ok_or_else(|| AppError::NotFound {
        what: format!("{NATIVE_LIBS} below {}", path.display()),
    })?;
    let variant = select_variant(&libs_dir, variant)?;
    let lib_dir = libs_dir.join(&variant).join("out").join("lib");
    files::ensure_exists(&lib_dir)?;

    let manifest = libs_dir
        .parent()
        .and_then(Path::parent)
        .map(|build_dir| merged_manifest_path(build_dir, &variant));
    Ok(NativeLibs {
        files: files::walk_files(&lib_dir)?
            .into_iter()
            .filter(|p| is_shared_object(p))
            .collect(),
        manifest,
    })
}

/// Plan for a list of shared objects.
///
/// With `objcopy` each file is reduced to its compressed debug sections in
/// scratch space, grouped by the architecture directory it came from.
/// `sharedObjectName` is always the original file name.
pub async fn symbol_plan(
    ctx: &ResolveContext<'_>,
    descriptor: &BuildDescriptor,
    symbols: Vec<PathBuf>,
    objcopy: Option<&Tool>,
) -> Result<UploadPlan> {
    let mut plan = ctx.plan(ArtifactKind::AndroidNdk, descriptor)?;
    if symbols.is_empty() {
        return Ok(plan);
    }

    let scratch = match objcopy {
        Some(_) => Some(ScratchDir::new("ndk")?),
        None => None,
    };
    for symbol in symbols {
        let name = files::file_name(&symbol);
        let upload_path = match (objcopy, &scratch) {
            (Some(tool), Some(scratch)) => {
                let arch_dir = scratch.path().join(arch_of(&symbol));
                std::fs::create_dir_all(&arch_dir).fs_context("creating directory", &arch_dir)?;
                ctx.output.debug(&format!("Extracting debug info from {name}"));
                objcopy::extract_debug(tool, &symbol, &arch_dir, ctx.cancel).await?
            }
            _ => symbol.clone(),
        };
        let fields = SoFileFields::new(descriptor, &name, ctx.overwrite);
        plan.push(ArtifactFile::new(
            Route::NdkSymbol,
            &fields,
            FilePart::local("soFile", upload_path),
        ));
    }
    if let Some(scratch) = scratch {
        plan.hold(scratch);
    }
    Ok(plan)
}

fn arch_of(symbol: &Path) -> String {
    symbol.parent().map(files::file_name).unwrap_or_default()
}

/// One plan per input path; requires an NDK r24+ toolchain
pub async fn resolve(ctx: &ResolveContext<'_>, options: &NdkOptions) -> Result<Vec<UploadPlan>> {
    let root = objcopy::ndk_root(options.ndk_root.as_deref())?;
    let tool = objcopy::locate_objcopy(&root)?;
    ctx.output
        .debug(&format!("Using {} from {}", tool.name(), tool.path().display()));

    let mut plans = Vec::new();
    for path in &options.paths {
        let libs = locate_native_libs(path, options.variant.as_deref())?;
        let manifest_path = options.app_manifest.clone().or(libs.manifest);
        let manifest = manifest_layer(ctx, manifest_path.as_deref());
        let descriptor = ctx.merge(&options.identity.layer(), &manifest);
        require_api_key(&descriptor)?;
        plans.push(symbol_plan(ctx, &descriptor, libs.files, Some(&tool)).await?);
    }
    Ok(plans)
}
