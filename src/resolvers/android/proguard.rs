//! Proguard / R8 mapping files.

use super::{AndroidIdentity, find_suffix_path, manifest_layer, merged_manifest_path, select_variant};
use crate::endpoint::Route;
use crate::error::{AppError, Result};
use crate::files::{self, ScratchDir, gzip_file};
use crate::model::{ArtifactKind, BuildDescriptor};
use crate::readers::dex;
use crate::resolvers::{ResolveContext, build_uuid_suppressed, require_api_key};
use crate::upload::{ArtifactFile, FilePart, ProguardFields, UploadPlan};
use std::path::{Path, PathBuf};

const MAPPING_DIR: [&str; 4] = ["app", "build", "outputs", "mapping"];
const MAPPING_FILE: &str = "mapping.txt";

/// `upload android-proguard`
#[derive(Debug, Clone, Default, clap::Args)]
pub struct ProguardOptions {
    #[command(flatten)]
    pub identity: AndroidIdentity,
    /// Build variant, required when more than one was built
    #[arg(long)]
    pub variant: Option<String>,
    /// AndroidManifest.xml to read identity values from
    #[arg(long)]
    pub app_manifest: Option<PathBuf>,
    /// classesN.dex files or directories used to compute the build UUID
    #[arg(long, value_delimiter = ',')]
    pub dex_files: Vec<PathBuf>,
    /// Project directory, `mapping` directory or mapping file
    #[arg(default_value = ".")]
    pub paths: Vec<PathBuf>,
}

/// A mapping file and the build outputs next to it
#[derive(Debug, Default, PartialEq, Eq)]
pub struct MappingSource {
    /// `mapping.txt`
    pub mapping: PathBuf,
    /// Merged manifest for the variant
    pub manifest: Option<PathBuf>,
    /// Directory holding the variant's `classes.dex`
    pub dex_dir: Option<PathBuf>,
}

/// Find the mapping file for one input path
pub fn locate_mapping(path: &Path, variant: Option<&str>) -> Result<MappingSource> {
    files::ensure_exists(path)?;
    if !path.is_dir() {
        return Ok(MappingSource {
            mapping: path.to_path_buf(),
            ..Default::default()
        });
    }

    let mapping_dir = match find_suffix_path(path, &MAPPING_DIR)? {
        Some(dir) => dir,
        None if files::file_name(path) == "mapping" => path.to_path_buf(),
        None => {
            return Err(AppError::NotFound {
                what: format!("{} below {}", MAPPING_DIR.join("/"), path.display()),
            });
        }
    };
    let variant = select_variant(&mapping_dir, variant)?;
    let mapping = mapping_dir.join(&variant).join(MAPPING_FILE);
    files::ensure_exists(&mapping)?;

    let build_dir = mapping_dir.parent().and_then(Path::parent);
    Ok(MappingSource {
        mapping,
        manifest: build_dir.map(|dir| merged_manifest_path(dir, &variant)),
        dex_dir: build_dir.and_then(|dir| variant_dex_dir(dir, &variant)),
    })
}

/// First directory below `intermediates/dex/<variant>` holding `classes.dex`
fn variant_dex_dir(build_dir: &Path, variant: &str) -> Option<PathBuf> {
    let root = build_dir.join("intermediates").join("dex").join(variant);
    if !root.is_dir() {
        return None;
    }
    files::walk_files(&root)
        .ok()?
        .into_iter()
        .find(|p| files::file_name(p) == "classes.dex")
        .and_then(|p| p.parent().map(Path::to_path_buf))
}

/// Gzip `map` into scratch space and wrap it in a one-file plan.
///
/// The backend matches a mapping by application id, version or build UUID,
/// so at least one of them must be known.
pub fn mapping_plan(ctx: &ResolveContext<'_>, descriptor: &BuildDescriptor, map: &Path) -> Result<UploadPlan> {
    let mut plan = ctx.plan(ArtifactKind::AndroidProguard, descriptor)?;
    let fields = ProguardFields::new(descriptor, ctx.overwrite);
    if !fields.has_identity() {
        return Err(AppError::missing(
            "--application-id, --version-name, --version-code or --build-uuid",
        ));
    }

    let scratch = ScratchDir::new("proguard")?;
    ctx.output
        .debug(&format!("Compressing {}", map.display()));
    let gz = gzip_file(map, scratch.path())?;
    plan.push(
        ArtifactFile::new(Route::AndroidProguard, &fields, FilePart::local("proguard", gz))
            .named(files::file_name(map)),
    );
    plan.hold(scratch);
    Ok(plan)
}

fn dex_build_uuid(
    ctx: &ResolveContext<'_>,
    explicit: &[PathBuf],
    discovered: Option<&Path>,
) -> Result<Option<String>> {
    if !explicit.is_empty() {
        return dex::build_id(&dex::collect_dex_files(explicit)?);
    }
    let Some(dir) = discovered else {
        return Ok(None);
    };
    match dex::build_id_from_dir(dir) {
        Ok(id) => Ok(id),
        Err(e) => {
            ctx.output
                .warn(&format!("Unable to compute build UUID from {}: {}", dir.display(), e));
            Ok(None)
        }
    }
}

/// One plan per input path
pub fn resolve(ctx: &ResolveContext<'_>, options: &ProguardOptions) -> Result<Vec<UploadPlan>> {
    let mut plans = Vec::new();
    for path in &options.paths {
        let source = locate_mapping(path, options.variant.as_deref())?;
        let manifest_path = options.app_manifest.clone().or(source.manifest);
        let manifest = manifest_layer(ctx, manifest_path.as_deref());

        let cli = options.identity.layer();
        let mut descriptor = ctx.merge(&cli, &manifest);
        require_api_key(&descriptor)?;
        if descriptor.build_uuid().is_none() && !build_uuid_suppressed(&[&cli, &manifest]) {
            if let Some(id) = dex_build_uuid(ctx, &options.dex_files, source.dex_dir.as_deref())? {
                ctx.output.debug(&format!("Using build UUID from DEX files: {id}"));
                descriptor.build_uuid = Some(id);
            }
        }
        plans.push(mapping_plan(ctx, &descriptor, &source.mapping)?);
    }
    Ok(plans)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{LogLevel, OutputManager};
    use crate::readers::dex::tests::write_dex;
    use crate::readers::manifest::tests::XML_MANIFEST;
    use crate::resolvers::tests::context;
    use std::fs;
    use tokio_util::sync::CancellationToken;

    fn gradle_tree(root: &Path) {
        let build = root.join("app/build");
        let mapping = build.join("outputs/mapping/release");
        fs::create_dir_all(&mapping).unwrap();
        fs::write(mapping.join(MAPPING_FILE), "com.example.Foo -> a:\n").unwrap();

        let dex = build.join("intermediates/dex/release/minifyReleaseWithR8");
        fs::create_dir_all(&dex).unwrap();
        write_dex(&dex.join("classes.dex"), 0x01);
        write_dex(&dex.join("classes2.dex"), 0x03);
    }

    #[test]
    fn test_locate_mapping_in_project() {
        let dir = tempfile::tempdir().unwrap();
        gradle_tree(dir.path());
        let source = locate_mapping(dir.path(), None).unwrap();
        assert_eq!(
            source.mapping,
            dir.path().join("app/build/outputs/mapping/release/mapping.txt")
        );
        assert_eq!(
            source.dex_dir.unwrap(),
            dir.path().join("app/build/intermediates/dex/release/minifyReleaseWithR8")
        );
    }

    #[test]
    fn test_manifest_build_uuid_none_skips_dex() {
        let dir = tempfile::tempdir().unwrap();
        gradle_tree(dir.path());
        let manifest = dir
            .path()
            .join("app/build/intermediates/merged_manifests/release/AndroidManifest.xml");
        fs::create_dir_all(manifest.parent().unwrap()).unwrap();
        fs::write(&manifest, XML_MANIFEST.replace("build-123", "none")).unwrap();

        let output = OutputManager::capture(LogLevel::Debug);
        let cancel = CancellationToken::new();
        let ctx = context(&output, &cancel);
        let options = ProguardOptions {
            paths: vec![dir.path().to_path_buf()],
            ..Default::default()
        };
        let plans = resolve(&ctx, &options).unwrap();
        let file = &plans[0].files[0];
        assert_eq!(file.route, Route::AndroidProguard);
        assert_eq!(file.display_name, "mapping.txt");
        assert_eq!(file.parts[0].file_name(), "mapping.txt.gz");
        assert_eq!(file.fields["appId"], "com.example");
        assert_eq!(file.fields["versionCode"], "42");
        assert!(!file.fields.contains_key("buildUUID"));
    }

    #[test]
    fn test_dex_fills_build_uuid_without_manifest() {
        let dir = tempfile::tempdir().unwrap();
        gradle_tree(dir.path());

        let output = OutputManager::capture(LogLevel::Debug);
        let cancel = CancellationToken::new();
        let ctx = context(&output, &cancel);
        let options = ProguardOptions {
            identity: AndroidIdentity {
                version_name: Some("2.0".into()),
                ..Default::default()
            },
            paths: vec![dir.path().to_path_buf()],
            ..Default::default()
        };
        let plans = resolve(&ctx, &options).unwrap();
        assert_eq!(plans[0].files[0].fields["buildUUID"], "02".repeat(20));
        assert_eq!(plans[0].files[0].fields["versionName"], "2.0");
    }

    #[test]
    fn test_mapping_without_identity_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let map = dir.path().join("mapping.txt");
        fs::write(&map, "a -> b:\n").unwrap();

        let output = OutputManager::capture(LogLevel::Debug);
        let cancel = CancellationToken::new();
        let ctx = context(&output, &cancel);
        let options = ProguardOptions {
            paths: vec![map],
            ..Default::default()
        };
        let err = resolve(&ctx, &options).unwrap_err();
        assert!(err.to_string().contains("--build-uuid"));
    }
}
