//! Apple `Info.plist` reader (XML or binary).

use crate::error::{AppError, FormatError, Result};
use crate::model::BuildDescriptor;
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Default, Deserialize)]
struct BugsnagDetails {
    #[serde(rename = "apiKey", default)]
    api_key: String,
}

/// Identity values read from an Info.plist.
///
/// Absent keys are empty strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct PlistData {
    /// `CFBundleIdentifier`
    #[serde(rename = "CFBundleIdentifier", default)]
    pub bundle_identifier: String,
    /// `CFBundleShortVersionString`
    #[serde(rename = "CFBundleShortVersionString", default)]
    pub version_name: String,
    /// `CFBundleVersion`
    #[serde(rename = "CFBundleVersion", default)]
    pub bundle_version: String,
    /// `bugsnag.apiKey`
    #[serde(rename = "bugsnag", default, deserialize_with = "api_key_from_details")]
    pub api_key: String,
}

fn api_key_from_details<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(BugsnagDetails::deserialize(deserializer)?.api_key)
}

impl PlistData {
    /// Manifest layer for the metadata merger
    pub fn to_descriptor(&self) -> BuildDescriptor {
        let some = |s: &str| Some(s.to_string()).filter(|s| !s.is_empty());
        BuildDescriptor {
            api_key: some(&self.api_key),
            version_name: some(&self.version_name),
            bundle_version: some(&self.bundle_version),
            ..Default::default()
        }
    }
}

/// Parse the plist at `path`
pub fn read_plist(path: &Path) -> Result<PlistData> {
    if !path.exists() {
        return Err(AppError::PathNotFound {
            path: path.to_path_buf(),
        });
    }
    plist::from_file(path).map_err(|e| {
        AppError::Format(FormatError::InvalidPlist {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) const INFO_PLIST: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE plist PUBLIC "-//Apple//DTD PLIST 1.0//EN" "http://www.apple.com/DTDs/PropertyList-1.0.dtd">
<plist version="1.0">
<dict>
    <key>CFBundleIdentifier</key>
    <string>com.example.app</string>
    <key>CFBundleShortVersionString</key>
    <string>2.1.0</string>
    <key>CFBundleVersion</key>
    <string>210</string>
    <key>bugsnag</key>
    <dict>
        <key>apiKey</key>
        <string>0123456789abcdef0123456789abcdef</string>
    </dict>
</dict>
</plist>
"#;

    #[test]
    fn test_xml_plist() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Info.plist");
        std::fs::write(&path, INFO_PLIST).unwrap();

        let data = read_plist(&path).unwrap();
        assert_eq!(data.bundle_identifier, "com.example.app");
        assert_eq!(data.version_name, "2.1.0");
        assert_eq!(data.bundle_version, "210");
        assert_eq!(data.api_key, "0123456789abcdef0123456789abcdef");
    }

    #[test]
    fn test_binary_plist_matches_xml() {
        let dir = tempfile::tempdir().unwrap();
        let xml_path = dir.path().join("Info.plist");
        std::fs::write(&xml_path, INFO_PLIST).unwrap();

        let value = plist::Value::from_file(&xml_path).unwrap();
        let bin_path = dir.path().join("Info.bin.plist");
        value.to_file_binary(&bin_path).unwrap();

        assert_eq!(read_plist(&bin_path).unwrap(), read_plist(&xml_path).unwrap());
    }

    #[test]
    fn test_missing_fields_are_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Info.plist");
        std::fs::write(
            &path,
            r#"<?xml version="1.0" encoding="UTF-8"?>
<plist version="1.0"><dict><key>CFBundleVersion</key><string>3</string></dict></plist>"#,
        )
        .unwrap();

        let data = read_plist(&path).unwrap();
        assert_eq!(data.bundle_version, "3");
        assert!(data.api_key.is_empty());
        assert_eq!(data.to_descriptor().api_key, None);
    }

    #[test]
    fn test_garbage_is_invalid_plist() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Info.plist");
        std::fs::write(&path, "not a plist").unwrap();
        assert!(matches!(
            read_plist(&path),
            Err(AppError::Format(FormatError::InvalidPlist { .. }))
        ));
    }
}
