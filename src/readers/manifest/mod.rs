//! AndroidManifest reader.
//!
//! Gradle leaves the manifest as text XML in intermediate directories, while
//! an AAB stores it as a protobuf `XmlNode`. Both are decoded into the same
//! small element tree and a single extraction pass reads identity from it.

mod proto;
mod xml;

use crate::error::{AppError, ErrorExt, FormatError, Result};
use crate::model::BuildDescriptor;
use std::io::Read;
use std::path::Path;

/// `android.R.attr.versionCode`
pub const VERSION_CODE_RESOURCE_ID: u32 = 16843291;
/// `android.R.attr.versionName`
pub const VERSION_NAME_RESOURCE_ID: u32 = 16843292;

const API_KEY_META: &str = "com.bugsnag.android.API_KEY";
const BUILD_UUID_META: &str = "com.bugsnag.android.BUILD_UUID";

const SNIFF_LEN: usize = 512;

/// Path of the manifest inside an AAB
pub const AAB_MANIFEST_ENTRY: &str = "base/manifest/AndroidManifest.xml";

/// Attribute of a decoded element
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct Attribute {
    pub name: String,
    pub value: String,
    pub resource_id: u32,
}

/// Decoded element; text nodes are dropped
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct Element {
    pub name: String,
    pub attributes: Vec<Attribute>,
    pub children: Vec<Element>,
}

/// Identity values found in a manifest
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ManifestData {
    /// `com.bugsnag.android.API_KEY` meta-data
    pub api_key: Option<String>,
    /// `package` attribute
    pub application_id: Option<String>,
    /// `versionName` attribute
    pub version_name: Option<String>,
    /// `versionCode` attribute
    pub version_code: Option<String>,
    /// `com.bugsnag.android.BUILD_UUID` meta-data
    pub build_uuid: Option<String>,
}

impl ManifestData {
    fn from_root(root: &Element) -> Self {
        let mut data = ManifestData::default();

        for attr in &root.attributes {
            if attr.resource_id == VERSION_CODE_RESOURCE_ID || attr.name == "versionCode" {
                data.version_code = Some(attr.value.clone());
            } else if attr.name == "package" {
                data.application_id = Some(attr.value.clone());
            } else if attr.resource_id == VERSION_NAME_RESOURCE_ID || attr.name == "versionName" {
                data.version_name = Some(attr.value.clone());
            }
        }

        let meta = root
            .children
            .iter()
            .flat_map(|level1| level1.children.iter())
            .filter(|level2| level2.name == "meta-data");
        for element in meta {
            let [key, value, ..] = element.attributes.as_slice() else {
                continue;
            };
            match key.value.as_str() {
                API_KEY_META => data.api_key = Some(value.value.clone()),
                BUILD_UUID_META => data.build_uuid = Some(value.value.clone()),
                _ => {}
            }
        }

        data
    }

    /// Manifest layer for the metadata merger
    pub fn to_descriptor(&self) -> BuildDescriptor {
        BuildDescriptor {
            api_key: self.api_key.clone(),
            application_id: self.application_id.clone(),
            version_name: self.version_name.clone(),
            version_code: self.version_code.clone(),
            build_uuid: self.build_uuid.clone(),
            ..Default::default()
        }
    }
}

/// Decode manifest bytes, sniffing XML versus protobuf
pub fn parse_manifest(bytes: &[u8], path: &Path) -> Result<ManifestData> {
    let head = &bytes[..bytes.len().min(SNIFF_LEN)];
    let root = if contains(head, b"<manifest xmlns") {
        xml::parse(bytes).map_err(|reason| invalid(path, reason))?
    } else if head.first() == Some(&0x0A) {
        proto::parse(bytes).map_err(|reason| invalid(path, reason))?
    } else {
        return Err(invalid(path, "unsupported file type".to_string()));
    };
    Ok(ManifestData::from_root(&root))
}

/// Read a manifest file from disk
pub fn read_manifest(path: &Path) -> Result<ManifestData> {
    let bytes = std::fs::read(path).fs_context("reading manifest", path)?;
    parse_manifest(&bytes, path)
}

/// Read `base/manifest/AndroidManifest.xml` straight out of an `.aab`
pub fn read_manifest_from_aab(aab: &Path) -> Result<ManifestData> {
    let file = std::fs::File::open(aab).fs_context("opening bundle", aab)?;
    let mut zip = zip::ZipArchive::new(std::io::BufReader::new(file))?;
    let mut entry = zip.by_name(AAB_MANIFEST_ENTRY).map_err(|_| AppError::NotFound {
        what: format!("{AAB_MANIFEST_ENTRY} in {}", aab.display()),
    })?;
    let mut bytes = Vec::new();
    entry
        .read_to_end(&mut bytes)
        .fs_context("reading bundle manifest", aab)?;
    parse_manifest(&bytes, &aab.join(AAB_MANIFEST_ENTRY))
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|w| w == needle)
}

fn invalid(path: &Path, reason: String) -> AppError {
    AppError::Format(FormatError::InvalidManifest {
        path: path.to_path_buf(),
        reason,
    })
}
