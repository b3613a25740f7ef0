//! Flutter split-debug-info symbols (`app.<platform>-<arch>.symbols`).
//!
//! Android symbols are keyed by their own GNU build id. iOS symbols are keyed
//! by the UUID of the matching architecture slice of the built `App`
//! framework binary, read with `dwarfdump`.

use super::{ResolveContext, require_api_key};
use crate::endpoint::Route;
use crate::error::{AppError, Result};
use crate::files;
use crate::model::{ArtifactKind, BuildDescriptor, Platform};
use crate::readers::elf;
use crate::tools::dwarfdump;
use crate::upload::{ArtifactFile, DartFields, FilePart, UploadPlan};
use regex::Regex;
use std::path::{Path, PathBuf};

/// `upload dart`
#[derive(Debug, Clone, Default, clap::Args)]
pub struct DartOptions {
    /// Application version
    #[arg(long, alias = "app-version")]
    pub version_name: Option<String>,
    /// Version code (Android only)
    #[arg(long, alias = "app-version-code")]
    pub version_code: Option<String>,
    /// Bundle version (iOS only)
    #[arg(long, alias = "app-bundle-version")]
    pub bundle_version: Option<String>,
    /// Built iOS `App` framework binary, overriding discovery
    #[arg(long)]
    pub ios_app_path: Option<PathBuf>,
    /// Symbol files or directories holding them
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,
}

/// Platform encoded in a symbol file name
pub fn symbol_platform(file: &Path) -> Result<Option<Platform>> {
    let name = files::file_name(file);
    let matches = |platform: &str| -> Result<bool> {
        Regex::new(&format!("{platform}-([^;]*).symbols"))
            .map(|re| re.is_match(&name))
            .map_err(|e| AppError::invalid(e.to_string()))
    };
    if matches("android")? {
        Ok(Some(Platform::Android))
    } else if matches("ios")? {
        Ok(Some(Platform::Ios))
    } else {
        Ok(None)
    }
}

/// `App` binary of the Flutter project two levels above `symbol_file`
pub fn find_ios_app_binary(symbol_file: &Path) -> Result<PathBuf> {
    let project = symbol_file
        .ancestors()
        .nth(2)
        .unwrap_or(Path::new("."));
    let iphoneos = project.join("build").join("ios").join("iphoneos");
    let apps = files::list_subdirs(&iphoneos).unwrap_or_default();
    apps.iter()
        .find(|dir| files::file_name(dir).contains(".app"))
        .map(|app| app.join("Frameworks").join("App.framework").join("App"))
        .filter(|binary| binary.is_file())
        .ok_or_else(|| {
            AppError::NotFound {
                what: "the iOS app binary, try adding --ios-app-path".to_string(),
            }
        })
}

fn symbol_arch(ctx: &ResolveContext<'_>, file: &Path) -> Result<elf::Arch> {
    let arch = elf::arch(file)?;
    if let elf::Arch::Unknown(name) = &arch {
        ctx.output.warn(&format!(
            "Unknown ELF architecture {} in {}",
            name,
            file.display()
        ));
    }
    Ok(arch)
}

async fn ios_build_id(ctx: &ResolveContext<'_>, file: &Path, app: Option<&Path>) -> Result<String> {
    let app = match app {
        Some(app) => app.to_path_buf(),
        None => find_ios_app_binary(file)?,
    };
    let arch = symbol_arch(ctx, file)?;
    dwarfdump::uuid_for_arch(&app, arch.as_str(), ctx.cancel)
        .await?
        .ok_or_else(|| AppError::NotFound {
            what: format!("a {} UUID in {}", arch.as_str(), app.display()),
        })
}

/// One plan covering every symbol file
pub async fn resolve(ctx: &ResolveContext<'_>, options: &DartOptions) -> Result<Vec<UploadPlan>> {
    let cli = BuildDescriptor {
        version_name: options.version_name.clone(),
        version_code: options.version_code.clone(),
        bundle_version: options.bundle_version.clone(),
        ..Default::default()
    };
    let descriptor = ctx.merge(&cli, &BuildDescriptor::default());
    require_api_key(&descriptor)?;

    let mut plan = ctx.plan(ArtifactKind::Dart, &descriptor)?;
    for file in files::build_file_list(&options.paths)? {
        let Some(platform) = symbol_platform(&file)? else {
            ctx.output.info(&format!("Skipping {}", file.display()));
            continue;
        };
        ctx.output.info(&format!(
            "Processing {} symbol file: {}",
            platform,
            file.display()
        ));
        let (build_id, extra_version) = match platform {
            Platform::Android => (elf::build_id(&file)?, descriptor.version_code.clone()),
            Platform::Ios => (
                ios_build_id(ctx, &file, options.ios_app_path.as_deref()).await?,
                descriptor.bundle_version.clone(),
            ),
        };
        let fields = DartFields {
            api_key: descriptor.api_key.clone(),
            build_id,
            platform,
            app_version: descriptor.version_name.clone(),
            extra_version,
            overwrite: ctx.overwrite,
        };
        plan.push(ArtifactFile::new(
            Route::DartSymbol,
            &fields,
            FilePart::local("symbolFile", &file),
        ));
    }
    Ok(vec![plan])
}
