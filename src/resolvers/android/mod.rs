//! Android resolvers: App Bundles, NDK symbols and Proguard mappings.
//!
//! Gradle output is located by trying progressively shorter suffixes of the
//! standard `app/build/...` layout below the given path, so the user can
//! point at the project root, the app module or the build directory itself.

pub mod aab;
pub mod ndk;
pub mod proguard;

use super::ResolveContext;
use crate::error::{AppError, Result};
use crate::files;
use crate::model::BuildDescriptor;
use crate::readers::manifest::read_manifest;
use std::path::{Path, PathBuf};

/// Identity flags shared by the Android kinds
#[derive(Debug, Clone, Default, clap::Args)]
pub struct AndroidIdentity {
    /// Module application identifier
    #[arg(long, alias = "app-id")]
    pub application_id: Option<String>,
    /// Module version name
    #[arg(long, alias = "app-version")]
    pub version_name: Option<String>,
    /// Module version code
    #[arg(long, alias = "app-version-code")]
    pub version_code: Option<String>,
    /// Build UUID; `none` suppresses it
    #[arg(long)]
    pub build_uuid: Option<String>,
    /// Path prefix to strip from file names in stack traces
    #[arg(long)]
    pub project_root: Option<String>,
}

impl AndroidIdentity {
    /// Command-line layer for the merger
    pub fn layer(&self) -> BuildDescriptor {
        BuildDescriptor {
            application_id: self.application_id.clone(),
            version_name: self.version_name.clone(),
            version_code: self.version_code.clone(),
            build_uuid: self.build_uuid.clone(),
            project_root: self.project_root.clone(),
            ..Default::default()
        }
    }
}

/// Find `segments` below `root`, dropping leading segments until a match
/// exists. The last segment may be a glob; more than one match is an error.
pub(crate) fn find_suffix_path(root: &Path, segments: &[&str]) -> Result<Option<PathBuf>> {
    for start in 0..segments.len() {
        let mut pattern = root.to_path_buf();
        pattern.extend(&segments[start..]);
        let pattern = pattern.to_string_lossy().into_owned();
        let matches: Vec<PathBuf> = glob::glob(&pattern)
            .map_err(|e| AppError::invalid(format!("bad search pattern {pattern}: {e}")))?
            .filter_map(|entry| entry.ok())
            .collect();
        match matches.as_slice() {
            [] => continue,
            [only] => return Ok(Some(only.clone())),
            many => {
                let names: Vec<String> = many.iter().map(|p| p.display().to_string()).collect();
                return Err(AppError::invalid(format!(
                    "found more than one match for {}: {}",
                    segments[start..].join("/"),
                    names.join(", ")
                )));
            }
        }
    }
    Ok(None)
}

/// Locate `app/build/intermediates/<leaf>` relative to `path`.
///
/// Also accepts a path inside `<leaf>` (up to six levels deep).
pub(crate) fn find_intermediates(path: &Path, leaf: &str) -> Result<Option<PathBuf>> {
    if let Some(found) = find_suffix_path(path, &["app", "build", "intermediates", leaf])? {
        return Ok(Some(found));
    }
    Ok(path
        .ancestors()
        .take(6)
        .find(|p| files::file_name(p) == leaf)
        .map(Path::to_path_buf))
}

/// Pick the build variant under `dir`.
///
/// An explicit variant must exist. Without one, exactly one subdirectory
/// must be present.
pub(crate) fn select_variant(dir: &Path, requested: Option<&str>) -> Result<String> {
    if let Some(variant) = requested.filter(|v| !v.is_empty()) {
        let path = dir.join(variant);
        files::ensure_exists(&path)?;
        return Ok(variant.to_string());
    }
    let variants: Vec<String> = files::list_subdirs(dir)?
        .iter()
        .map(|p| files::file_name(p))
        .collect();
    match variants.as_slice() {
        [] => Err(AppError::NotFound {
            what: format!("build variants in {}", dir.display()),
        }),
        [only] => Ok(only.clone()),
        many => Err(AppError::invalid(format!(
            "more than one variant found in {}: {}. Use --variant to pick one",
            dir.display(),
            many.join(", ")
        ))),
    }
}

/// Manifest layer from an AndroidManifest file.
///
/// The manifest is optional input: a missing or unreadable file is logged
/// and yields an empty layer.
pub(crate) fn manifest_layer(ctx: &ResolveContext<'_>, path: Option<&Path>) -> BuildDescriptor {
    let Some(path) = path else {
        return BuildDescriptor::default();
    };
    if !path.is_file() {
        ctx.output
            .debug(&format!("No manifest found at {}", path.display()));
        return BuildDescriptor::default();
    }
    ctx.output
        .info(&format!("Reading data from {}", path.display()));
    match read_manifest(path) {
        Ok(data) => data.to_descriptor(),
        Err(e) => {
            ctx.output
                .warn(&format!("Unable to read {}: {}", path.display(), e));
            BuildDescriptor::default()
        }
    }
}

/// Merged manifest for a variant, next to `merged_native_libs` or `mapping`
pub(crate) fn merged_manifest_path(build_dir: &Path, variant: &str) -> PathBuf {
    build_dir
        .join("intermediates")
        .join("merged_manifests")
        .join(variant)
        .join("AndroidManifest.xml")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_find_suffix_path_accepts_any_level() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("app/build/intermediates/merged_native_libs");
        fs::create_dir_all(&target).unwrap();

        assert_eq!(
            find_intermediates(dir.path(), "merged_native_libs").unwrap(),
            Some(target.clone())
        );
        assert_eq!(
            find_intermediates(&dir.path().join("app"), "merged_native_libs").unwrap(),
            Some(target.clone())
        );
        assert_eq!(
            find_intermediates(&target.join("release/out"), "merged_native_libs").unwrap(),
            Some(target)
        );
    }

    #[test]
    fn test_find_suffix_path_rejects_ambiguous_glob() {
        let dir = tempfile::tempdir().unwrap();
        let release = dir.path().join("build/outputs/bundle/release");
        fs::create_dir_all(&release).unwrap();
        fs::write(release.join("a-release.aab"), "a").unwrap();
        fs::write(release.join("b-release.aab"), "b").unwrap();

        let segments = ["app", "build", "outputs", "bundle", "release", "*-release*.aab"];
        assert!(find_suffix_path(dir.path(), &segments).is_err());
        fs::remove_file(release.join("b-release.aab")).unwrap();
        assert_eq!(
            find_suffix_path(dir.path(), &segments).unwrap(),
            Some(release.join("a-release.aab"))
        );
    }

    #[test]
    fn test_select_variant() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(select_variant(dir.path(), None), Err(AppError::NotFound { .. })));

        fs::create_dir_all(dir.path().join("release")).unwrap();
        assert_eq!(select_variant(dir.path(), None).unwrap(), "release");

        fs::create_dir_all(dir.path().join("debug")).unwrap();
        let err = select_variant(dir.path(), None).unwrap_err();
        assert!(err.to_string().contains("debug, release"));
        assert_eq!(select_variant(dir.path(), Some("debug")).unwrap(), "debug");
        assert!(select_variant(dir.path(), Some("staging")).is_err());
    }
}
