//! Android App Bundle resolver.
//!
//! A bundle carries everything needed for both child uploads: the manifest
//! gives identity, `BUNDLE-METADATA` holds native debug symbols and the
//! Proguard map, and `base/dex` yields the build UUID.

use super::ndk::symbol_plan;
use super::proguard::mapping_plan;
use super::{AndroidIdentity, find_suffix_path};
use crate::error::{AppError, Result};
use crate::files::{self, ScratchDir, extract_zip};
use crate::model::{ArtifactKind, BuildDescriptor};
use crate::readers::dex;
use crate::readers::manifest::{AAB_MANIFEST_ENTRY, read_manifest};
use crate::resolvers::{ResolveContext, build_uuid_suppressed, require_api_key};
use crate::tools::{Tool, objcopy};
use crate::upload::UploadPlan;
use std::path::{Path, PathBuf};

const BUNDLE_METADATA: &str = "BUNDLE-METADATA";
const DEBUG_SYMBOLS: &str = "com.android.tools.build.debugsymbols";
const OBFUSCATION_MAP: &str = "com.android.tools.build.obfuscation/proguard.map";
const RELEASE_BUNDLE: [&str; 6] = ["app", "build", "outputs", "bundle", "release", "*-release*.aab"];

/// `upload android-aab`
#[derive(Debug, Clone, Default, clap::Args)]
pub struct AabOptions {
    #[command(flatten)]
    pub identity: AndroidIdentity,
    /// NDK used to strip bundled symbols; falls back to ANDROID_NDK_ROOT
    #[arg(long)]
    pub ndk_root: Option<PathBuf>,
    /// Path to an .aab file, an extracted bundle or a project directory
    #[arg(default_value = ".")]
    pub paths: Vec<PathBuf>,
}

/// Where the extracted bundle lives
#[derive(Debug)]
pub struct BundleRoot {
    /// Directory containing `BUNDLE-METADATA` and `base/`
    pub dir: PathBuf,
    /// Scratch space when the bundle was extracted
    pub scratch: Option<ScratchDir>,
}

/// Resolve one input path to an extracted bundle
pub fn locate_bundle(ctx: &ResolveContext<'_>, path: &Path) -> Result<BundleRoot> {
    files::ensure_exists(path)?;
    if path.is_dir() && path.join(BUNDLE_METADATA).is_dir() {
        return Ok(BundleRoot {
            dir: path.to_path_buf(),
            scratch: None,
        });
    }

    let archive = if path.is_dir() {
        find_suffix_path(path, &RELEASE_BUNDLE)?.ok_or_else(|| AppError::NotFound {
            what: format!("a release .aab below {}", path.display()),
        })?
    } else if files::has_extension(path, "aab") {
        path.to_path_buf()
    } else {
        return Err(AppError::invalid(format!(
            "{} is not an .aab file or bundle directory",
            path.display()
        )));
    };

    ctx.output.info(&format!(
        "Extracting {} into a temporary directory",
        files::file_name(&archive)
    ));
    let scratch = extract_zip(&archive, "aab")?;
    Ok(BundleRoot {
        dir: scratch.path().to_path_buf(),
        scratch: Some(scratch),
    })
}

/// Identity of an extracted bundle: command line over packaged manifest,
/// with the build UUID computed from DEX files when still absent.
pub fn bundle_descriptor(
    ctx: &ResolveContext<'_>,
    bundle: &Path,
    identity: &AndroidIdentity,
) -> Result<BuildDescriptor> {
    let cli = identity.layer();
    let manifest_path = bundle.join(AAB_MANIFEST_ENTRY);
    let manifest = if manifest_path.is_file() {
        ctx.output.info("Reading data from AndroidManifest.xml");
        read_manifest(&manifest_path)?.to_descriptor()
    } else {
        ctx.output.warn(&format!(
            "No AndroidManifest.xml found in {}",
            bundle.display()
        ));
        BuildDescriptor::default()
    };

    let mut merged = ctx.merge(&cli, &manifest);
    if merged.build_uuid().is_none() && !build_uuid_suppressed(&[&cli, &manifest]) {
        let dex_dir = bundle.join("base").join("dex");
        if dex_dir.is_dir() {
            match dex::build_id_from_dir(&dex_dir) {
                Ok(Some(id)) => {
                    ctx.output.debug(&format!("Using build UUID from DEX files: {id}"));
                    merged.build_uuid = Some(id);
                }
                Ok(None) => {}
                Err(e) => ctx
                    .output
                    .warn(&format!("Unable to compute build UUID from {}: {}", dex_dir.display(), e)),
            }
        }
    }
    Ok(merged)
}

/// Shared objects below `BUNDLE-METADATA/com.android.tools.build.debugsymbols`
pub fn bundled_symbol_files(bundle: &Path) -> Result<Vec<PathBuf>> {
    let dir = bundle.join(BUNDLE_METADATA).join(DEBUG_SYMBOLS);
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    Ok(files::walk_files(&dir)?
        .into_iter()
        .filter(|p| {
            let name = files::file_name(p);
            name.ends_with(".so.sym") || name.ends_with(".so") || name.ends_with(".so.dbg")
        })
        .collect())
}

/// NDK plan from bundled symbols.
///
/// With an objcopy available the symbols are re-stripped into scratch space,
/// otherwise the bundled files are sent as they are.
pub async fn ndk_plan(
    ctx: &ResolveContext<'_>,
    bundle: &Path,
    descriptor: &BuildDescriptor,
    objcopy: Option<&Tool>,
) -> Result<UploadPlan> {
    symbol_plan(ctx, descriptor, bundled_symbol_files(bundle)?, objcopy).await
}

/// Proguard plan from the bundled obfuscation map, gzipped into scratch
pub fn proguard_plan(
    ctx: &ResolveContext<'_>,
    bundle: &Path,
    descriptor: &BuildDescriptor,
) -> Result<UploadPlan> {
    let map = bundle.join(BUNDLE_METADATA).join(OBFUSCATION_MAP);
    if !map.is_file() {
        return ctx.plan(ArtifactKind::AndroidProguard, descriptor);
    }
    mapping_plan(ctx, descriptor, &map)
}

/// Objcopy from `--ndk-root` / `ANDROID_NDK_ROOT`, or `None` when neither is set
pub fn optional_objcopy(ndk_root: Option<&Path>) -> Result<Option<Tool>> {
    match objcopy::ndk_root(ndk_root) {
        Ok(root) => Ok(Some(objcopy::locate_objcopy(&root)?)),
        Err(AppError::Option(_)) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Plans for every bundle: NDK symbols first, then the Proguard map
pub async fn resolve(ctx: &ResolveContext<'_>, options: &AabOptions) -> Result<Vec<UploadPlan>> {
    let objcopy = optional_objcopy(options.ndk_root.as_deref())?;
    if objcopy.is_none() {
        log::debug!("No NDK configured, uploading bundled symbols unmodified");
    }

    let mut plans = Vec::new();
    for path in &options.paths {
        let bundle = locate_bundle(ctx, path)?;
        let descriptor = bundle_descriptor(ctx, &bundle.dir, &options.identity)?;
        require_api_key(&descriptor)?;

        let ndk = ndk_plan(ctx, &bundle.dir, &descriptor, objcopy.as_ref()).await?;
        let mut proguard = proguard_plan(ctx, &bundle.dir, &descriptor)?;
        if ndk.is_empty() && proguard.is_empty() {
            ctx.output.warn(&format!(
                "No NDK symbols or Proguard mapping found in {}",
                path.display()
            ));
        }
        if let Some(scratch) = bundle.scratch {
            proguard.hold(scratch);
        }
        plans.push(ndk);
        plans.push(proguard);
    }
    Ok(plans)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::cli::{LogLevel, OutputManager};
    use crate::endpoint::Route;
    use crate::readers::dex::tests::{dex_bytes, write_dex};
    use crate::readers::manifest::tests::proto_manifest;
    use crate::resolvers::tests::{API_KEY, context};
    use std::io::Write;
    use tokio_util::sync::CancellationToken;

    /// Write an `.aab` with a manifest, one NDK symbol file, a Proguard map
    /// and two DEX files.
    pub(crate) fn write_aab(path: &Path) {
        let file = std::fs::File::create(path).unwrap();
        let mut zip = zip::ZipWriter::new(file);
        let options = zip::write::SimpleFileOptions::default();
        let mut add = |name: &str, bytes: &[u8]| {
            zip.start_file(name, options).unwrap();
            zip.write_all(bytes).unwrap();
        };
        add(AAB_MANIFEST_ENTRY, &proto_manifest());
        add(
            "BUNDLE-METADATA/com.android.tools.build.debugsymbols/arm64-v8a/libfoo.so.sym",
            b"\x7fELF symbols",
        );
        add(
            "BUNDLE-METADATA/com.android.tools.build.obfuscation/proguard.map",
            b"com.example.Foo -> a:\n",
        );
        add("base/dex/classes.dex", &dex_bytes(0x01));
        add("base/dex/classes2.dex", &dex_bytes(0x03));
        zip.finish().unwrap();
    }

    #[tokio::test]
    async fn test_bundle_produces_ndk_then_proguard() {
        let dir = tempfile::tempdir().unwrap();
        let aab = dir.path().join("app-release.aab");
        write_aab(&aab);

        let output = OutputManager::capture(LogLevel::Debug);
        let cancel = CancellationToken::new();
        let ctx = context(&output, &cancel);
        let options = AabOptions {
            paths: vec![aab],
            ..Default::default()
        };

        let plans = resolve(&ctx, &options).await.unwrap();
        assert_eq!(plans.len(), 2);

        let ndk = &plans[0].files;
        assert_eq!(ndk.len(), 1);
        assert_eq!(ndk[0].route, Route::NdkSymbol);
        assert_eq!(ndk[0].parts[0].field, "soFile");
        assert_eq!(ndk[0].parts[0].file_name(), "libfoo.so.sym");
        assert_eq!(ndk[0].fields["appId"], "com.example");
        assert_eq!(ndk[0].fields["versionCode"], "42");
        assert_eq!(ndk[0].fields["versionName"], "1.0");
        assert_eq!(ndk[0].fields["apiKey"], API_KEY);

        let proguard = &plans[1].files;
        assert_eq!(proguard.len(), 1);
        assert_eq!(proguard[0].route, Route::AndroidProguard);
        assert_eq!(proguard[0].parts[0].field, "proguard");
        assert_eq!(proguard[0].parts[0].file_name(), "proguard.map.gz");
        assert_eq!(proguard[0].fields["buildUUID"], "build-123");
        for path in proguard[0].local_paths() {
            assert!(path.exists());
        }
    }

    #[tokio::test]
    async fn test_build_uuid_none_skips_dex() {
        let dir = tempfile::tempdir().unwrap();
        let aab = dir.path().join("app-release.aab");
        write_aab(&aab);

        let output = OutputManager::capture(LogLevel::Debug);
        let cancel = CancellationToken::new();
        let ctx = context(&output, &cancel);
        let options = AabOptions {
            identity: AndroidIdentity {
                build_uuid: Some("none".into()),
                ..Default::default()
            },
            paths: vec![aab],
            ..Default::default()
        };
        let plans = resolve(&ctx, &options).await.unwrap();
        assert!(!plans[1].files[0].fields.contains_key("buildUUID"));
    }

    #[test]
    fn test_dex_build_uuid_when_manifest_has_none() {
        let dir = tempfile::tempdir().unwrap();
        let dex_dir = dir.path().join("base/dex");
        std::fs::create_dir_all(&dex_dir).unwrap();
        std::fs::create_dir_all(dir.path().join(BUNDLE_METADATA)).unwrap();
        write_dex(&dex_dir.join("classes.dex"), 0x01);
        write_dex(&dex_dir.join("classes2.dex"), 0x03);

        let output = OutputManager::capture(LogLevel::Debug);
        let cancel = CancellationToken::new();
        let ctx = context(&output, &cancel);
        let bundle = locate_bundle(&ctx, dir.path()).unwrap();
        assert!(bundle.scratch.is_none());

        let descriptor = bundle_descriptor(&ctx, &bundle.dir, &AndroidIdentity::default()).unwrap();
        assert_eq!(descriptor.build_uuid(), Some("02".repeat(20).as_str()));
    }

    #[tokio::test]
    async fn test_packaged_build_uuid_kept_with_full_command_line_identity() {
        let dir = tempfile::tempdir().unwrap();
        let aab = dir.path().join("app-release.aab");
        write_aab(&aab);

        let output = OutputManager::capture(LogLevel::Debug);
        let cancel = CancellationToken::new();
        let ctx = context(&output, &cancel);
        let options = AabOptions {
            identity: AndroidIdentity {
                application_id: Some("com.cli".into()),
                version_name: Some("9.9".into()),
                version_code: Some("99".into()),
                ..Default::default()
            },
            paths: vec![aab],
            ..Default::default()
        };
        let plans = resolve(&ctx, &options).await.unwrap();
        let fields = &plans[1].files[0].fields;
        assert_eq!(fields["buildUUID"], "build-123");
        assert_eq!(fields["appId"], "com.cli");
        assert_eq!(fields["versionCode"], "99");
    }

    #[test]
    fn test_packaged_none_suppresses_dex_build_uuid() {
        let dir = tempfile::tempdir().unwrap();
        let dex_dir = dir.path().join("base/dex");
        let manifest_dir = dir.path().join("base/manifest");
        std::fs::create_dir_all(&dex_dir).unwrap();
        std::fs::create_dir_all(&manifest_dir).unwrap();
        std::fs::create_dir_all(dir.path().join(BUNDLE_METADATA)).unwrap();
        write_dex(&dex_dir.join("classes.dex"), 0x01);
        std::fs::write(
            manifest_dir.join("AndroidManifest.xml"),
            r#"<manifest xmlns:android="http://schemas.android.com/apk/res/android"
    package="com.example" android:versionCode="3" android:versionName="1.0">
  <application>
    <meta-data android:name="com.bugsnag.android.BUILD_UUID" android:value="none"/>
  </application>
</manifest>"#,
        )
        .unwrap();

        let output = OutputManager::capture(LogLevel::Debug);
        let cancel = CancellationToken::new();
        let ctx = context(&output, &cancel);
        let identity = AndroidIdentity {
            application_id: Some("com.cli".into()),
            version_name: Some("2.0".into()),
            version_code: Some("4".into()),
            ..Default::default()
        };
        let descriptor = bundle_descriptor(&ctx, dir.path(), &identity).unwrap();
        assert_eq!(descriptor.build_uuid(), None);
        assert_eq!(descriptor.application_id.as_deref(), Some("com.cli"));
    }

    #[test]
    fn test_locate_bundle_rejects_other_files() {
        let dir = tempfile::tempdir().unwrap();
        let other = dir.path().join("notes.txt");
        std::fs::write(&other, "x").unwrap();
        let output = OutputManager::capture(LogLevel::Debug);
        let cancel = CancellationToken::new();
        let ctx = context(&output, &cancel);
        assert!(locate_bundle(&ctx, &other).is_err());
        assert!(matches!(
            locate_bundle(&ctx, dir.path()),
            Err(AppError::NotFound { .. })
        ));
    }
}
