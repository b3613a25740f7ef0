//! Linux ELF symbol files, found under `<build>/<arch>-<variant>/debug`.

use super::{ResolveContext, cwd_string, require_api_key};
use crate::endpoint::Route;
use crate::error::{AppError, Result};
use crate::files;
use crate::model::{ArtifactKind, BuildDescriptor};
use crate::readers::elf::is_symbol_file;
use crate::readers::linux_manifest::read_linux_manifest;
use crate::upload::{ArtifactFile, FilePart, SoFileFields, UploadPlan};
use regex::Regex;
use std::path::{Path, PathBuf};

const MANIFEST: &str = "manifest.toml";

/// `upload linux`
#[derive(Debug, Clone, clap::Args)]
pub struct LinuxOptions {
    /// Application id, usually the package name
    #[arg(long, alias = "app-id")]
    pub application_id: Option<String>,
    /// Application version
    #[arg(long, alias = "app-version")]
    pub version_name: Option<String>,
    /// Version code of this build
    #[arg(long)]
    pub version_code: Option<String>,
    /// Path prefix to strip from file names in stack traces
    #[arg(long)]
    pub project_root: Option<String>,
    /// Build variant whose `<arch>-<variant>` folders are searched
    #[arg(long, default_value = "release")]
    pub variant: String,
    /// Build folder, overriding discovery
    #[arg(long)]
    pub build_folder: Option<PathBuf>,
    /// Project directory, build folder or symbol file
    #[arg(default_value = ".")]
    pub paths: Vec<PathBuf>,
}

impl Default for LinuxOptions {
    fn default() -> Self {
        Self {
            application_id: None,
            version_name: None,
            version_code: None,
            project_root: None,
            variant: "release".to_string(),
            build_folder: None,
            paths: vec![PathBuf::from(".")],
        }
    }
}

/// `debug` folders of every `<arch>-<variant>` directory in `build_dir`
pub fn arch_variant_dirs(build_dir: &Path, variant: &str) -> Result<Vec<PathBuf>> {
    let pattern = format!("^[a-zA-Z0-9_]+-{}$", regex::escape(variant));
    let re = Regex::new(&pattern)
        .map_err(|e| AppError::invalid(format!("bad variant {variant}: {e}")))?;
    Ok(files::list_subdirs(build_dir)?
        .into_iter()
        .filter(|d| re.is_match(&files::file_name(d)))
        .map(|d| d.join("debug"))
        .collect())
}

fn search_dir(path: &Path, build_folder: Option<&Path>) -> Option<PathBuf> {
    if let Some(folder) = build_folder {
        return Some(folder.to_path_buf());
    }
    let build = path.join("build");
    if build.is_dir() {
        return Some(build);
    }
    (files::file_name(path) == "build").then(|| path.to_path_buf())
}

/// Symbol files for one input path
pub fn symbol_files(ctx: &ResolveContext<'_>, path: &Path, options: &LinuxOptions) -> Result<Vec<PathBuf>> {
    files::ensure_exists(path)?;
    if !path.is_dir() {
        return Ok(if is_symbol_file(path) {
            vec![path.to_path_buf()]
        } else {
            ctx.output
                .warn(&format!("{} is not an ELF symbol file", path.display()));
            Vec::new()
        });
    }

    let dirs = match search_dir(path, options.build_folder.as_deref()) {
        Some(build) => {
            ctx.output.info(&format!(
                "Scanning {} for symbol files (variant: {})",
                build.display(),
                options.variant
            ));
            arch_variant_dirs(&build, &options.variant)?
        }
        None => vec![path.to_path_buf()],
    };

    let mut found = Vec::new();
    for dir in dirs.iter().filter(|d| d.is_dir()) {
        for file in files::walk_files(dir)? {
            if is_symbol_file(&file) {
                found.push(file);
            } else {
                ctx.output
                    .debug(&format!("Skipping {} (no symbols)", file.display()));
            }
        }
    }
    Ok(found)
}

fn manifest_layer(ctx: &ResolveContext<'_>, path: &Path) -> BuildDescriptor {
    let dir = if path.is_dir() {
        path
    } else {
        path.parent().unwrap_or(Path::new("."))
    };
    let manifest = dir.join(MANIFEST);
    ctx.output.debug(&format!(
        "Attempting to read metadata from {}",
        manifest.display()
    ));
    match read_linux_manifest(&manifest) {
        Ok(package) => BuildDescriptor {
            application_id: Some(package.id),
            version_name: Some(package.version),
            ..Default::default()
        },
        Err(e) => {
            ctx.output.warn(&format!(
                "Unable to read {} at {}: {}",
                MANIFEST,
                manifest.display(),
                e
            ));
            BuildDescriptor::default()
        }
    }
}

/// One plan per input path
pub fn resolve(ctx: &ResolveContext<'_>, options: &LinuxOptions) -> Result<Vec<UploadPlan>> {
    let mut plans = Vec::new();
    for path in &options.paths {
        let symbols = symbol_files(ctx, path, options)?;
        ctx.output
            .info(&format!("Found {} symbol files to upload", symbols.len()));

        let cli = BuildDescriptor {
            application_id: options.application_id.clone(),
            version_name: options.version_name.clone(),
            version_code: options.version_code.clone(),
            project_root: options.project_root.clone().or_else(cwd_string),
            ..Default::default()
        };
        let needs_manifest = cli.application_id.is_none() || cli.version_name.is_none();
        let manifest = if needs_manifest {
            manifest_layer(ctx, path)
        } else {
            BuildDescriptor::default()
        };
        let descriptor = ctx.merge(&cli, &manifest);
        require_api_key(&descriptor)?;

        let mut plan = ctx.plan(ArtifactKind::Linux, &descriptor)?;
        for file in symbols {
            let fields = SoFileFields::new(&descriptor, &files::file_name(&file), ctx.overwrite);
            plan.push(ArtifactFile::new(
                Route::Linux,
                &fields,
                FilePart::local("soFile", &file),
            ));
        }
        plans.push(plan);
    }
    Ok(plans)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{LogLevel, OutputManager};
    use crate::readers::elf::tests::{build_id_note, synthetic_elf, synthetic_symbol_elf};
    use crate::resolvers::tests::context;
    use goblin::elf::header::EM_X86_64;
    use std::fs;
    use tokio_util::sync::CancellationToken;

    #[test]
    fn test_arch_variant_dirs() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["x86_64-release", "arm64-release", "x86_64-debug", "odd-name-release"] {
            fs::create_dir_all(dir.path().join(name)).unwrap();
        }
        let found = arch_variant_dirs(dir.path(), "release").unwrap();
        assert_eq!(
            found,
            vec![
                dir.path().join("arm64-release/debug"),
                dir.path().join("x86_64-release/debug"),
            ]
        );
    }

    #[test]
    fn test_build_folder_scan_with_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let debug = dir.path().join("build/x86_64-release/debug");
        fs::create_dir_all(&debug).unwrap();
        let note = build_id_note(&[0x11; 20]);
        fs::write(debug.join("libgame.so"), synthetic_symbol_elf(EM_X86_64, &note)).unwrap();
        fs::write(debug.join("stripped.so"), synthetic_elf(EM_X86_64, &note)).unwrap();
        fs::write(debug.join("notes.txt"), "text").unwrap();
        fs::write(
            dir.path().join(MANIFEST),
            "[package]\nid = \"com.example.game\"\nversion = \"1.4.2\"\n",
        )
        .unwrap();

        let output = OutputManager::capture(LogLevel::Debug);
        let cancel = CancellationToken::new();
        let ctx = context(&output, &cancel);
        let options = LinuxOptions {
            version_name: Some("2.0".into()),
            paths: vec![dir.path().to_path_buf()],
            ..Default::default()
        };
        let plans = resolve(&ctx, &options).unwrap();
        let uploads = &plans[0].files;
        assert_eq!(uploads.len(), 1);
        assert_eq!(uploads[0].route, Route::Linux);
        assert_eq!(uploads[0].parts[0].field, "soFile");
        assert_eq!(uploads[0].fields["sharedObjectName"], "libgame.so");
        assert_eq!(uploads[0].fields["appId"], "com.example.game");
        assert_eq!(uploads[0].fields["versionName"], "2.0");
    }

    #[test]
    fn test_plain_directory_is_scanned_directly() {
        let dir = tempfile::tempdir().unwrap();
        let note = build_id_note(&[0x22; 20]);
        fs::write(dir.path().join("app.debug"), synthetic_symbol_elf(EM_X86_64, &note)).unwrap();

        let output = OutputManager::capture(LogLevel::Debug);
        let cancel = CancellationToken::new();
        let ctx = context(&output, &cancel);
        let found = symbol_files(&ctx, dir.path(), &LinuxOptions::default()).unwrap();
        assert_eq!(found, vec![dir.path().join("app.debug")]);
    }
}
