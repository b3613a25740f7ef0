//! Unity resolvers and IL2CPP line mappings.
//!
//! IL2CPP builds write a `LineNumberMappings.json` that maps generated C++
//! lines back to C#. It is uploaded next to the native symbols, keyed by
//! the build id of the binary it belongs to.

pub mod android;
pub mod ios;

use crate::endpoint::Route;
use crate::error::Result;
use crate::files;
use crate::model::{BuildDescriptor, Platform};
use crate::resolvers::{ResolveContext, first_existing};
use crate::upload::{ArtifactFile, FilePart, LineMappingFields};
use std::path::{Path, PathBuf};

const MAPPING_FILE: &str = "LineNumberMappings.json";

/// `LineNumberMappings.json` locations for iOS exports, in lookup order
pub const IOS_MAPPING_DIRS: [&str; 4] = [
    "Library/Bee/artifacts/iOS/il2cppOutput/cpp/Symbols",
    "Il2CppOutputProject/Source/il2cppOutput/Symbols",
    "Temp/il2cppOutput/Symbols",
    "Library/Il2cppBuildCache/iOS/il2cppOutput/Symbols",
];

const ANDROID_MAPPING_DIR: &str = "Library/Bee/artifacts/Android/il2cppOutput/cpp/Symbols";
const BACKUP_FOLDER_SUFFIX: &str = "BackUpThisFolder_ButDontShipItWithYourGame";

/// Line-mapping flags shared by both platforms
#[derive(Debug, Clone, Default, clap::Args)]
pub struct Il2cppMappingFlags {
    /// Do not upload IL2CPP line mappings
    #[arg(long, conflicts_with = "upload_il2cpp_mapping")]
    pub no_upload_il2cpp_mapping: bool,
    /// LineNumberMappings.json to upload, overriding discovery
    #[arg(long)]
    pub upload_il2cpp_mapping: Option<PathBuf>,
}

impl Il2cppMappingFlags {
    /// The mapping file to upload, if any.
    ///
    /// An explicit path must exist; otherwise the first existing candidate
    /// is used.
    pub fn resolve(&self, candidates: impl IntoIterator<Item = PathBuf>) -> Result<Option<PathBuf>> {
        if self.no_upload_il2cpp_mapping {
            return Ok(None);
        }
        if let Some(path) = &self.upload_il2cpp_mapping {
            files::ensure_exists(path)?;
            return Ok(Some(path.clone()));
        }
        Ok(first_existing(candidates))
    }
}

/// iOS candidates below a Unity project or Xcode export
pub fn ios_candidates(root: &Path) -> Vec<PathBuf> {
    IOS_MAPPING_DIRS
        .iter()
        .map(|dir| root.join(dir).join(MAPPING_FILE))
        .collect()
}

/// Android candidates: the Bee artifacts folder, then any
/// `*BackUpThisFolder_ButDontShipItWithYourGame` folder next to the build
pub fn android_candidates(root: &Path) -> Vec<PathBuf> {
    let mut candidates = vec![root.join(ANDROID_MAPPING_DIR).join(MAPPING_FILE)];
    if let Ok(dirs) = files::list_subdirs(root) {
        candidates.extend(
            dirs.into_iter()
                .filter(|d| files::file_name(d).ends_with(BACKUP_FOLDER_SUFFIX))
                .map(|d| d.join("il2cppOutput").join("Symbols").join(MAPPING_FILE)),
        );
    }
    candidates
}

/// Upload of a mapping file keyed by `build_id`
pub fn line_mapping_file(
    ctx: &ResolveContext<'_>,
    descriptor: &BuildDescriptor,
    platform: Platform,
    build_id: &str,
    mapping: &Path,
) -> ArtifactFile {
    let extra_version = match platform {
        Platform::Android => descriptor.version_code.clone(),
        Platform::Ios => descriptor.bundle_version.clone(),
    };
    let fields = LineMappingFields {
        api_key: descriptor.api_key.clone(),
        app_id: descriptor.application_id.clone(),
        app_version: descriptor.version_name.clone(),
        platform,
        build_id: build_id.to_string(),
        extra_version,
        project_root: descriptor.project_root.clone(),
        overwrite: ctx.overwrite,
    };
    ArtifactFile::new(
        Route::UnityLineMappings,
        &fields,
        FilePart::local("mappingFile", mapping),
    )
    .named(format!("{} ({})", files::file_name(mapping), build_id))
}
