//! Typed form-field records, one per upload kind.
//!
//! Each record serialises to the exact field names its endpoint expects.
//! Empty values are left out; `overwrite` is only sent when set.

use crate::model::{BuildDescriptor, Platform};
use std::collections::BTreeMap;

/// Serialise a record into multipart text fields
pub trait FormFields {
    /// Field name → value, sorted by name
    fn form_fields(&self) -> BTreeMap<String, String>;
}

#[derive(Default)]
struct Fields(BTreeMap<String, String>);

impl Fields {
    fn text(mut self, key: &str, value: Option<&str>) -> Self {
        if let Some(value) = value.filter(|v| !v.is_empty()) {
            self.0.insert(key.to_string(), value.to_string());
        }
        self
    }

    fn flag(mut self, key: &str, value: bool) -> Self {
        if value {
            self.0.insert(key.to_string(), "true".to_string());
        }
        self
    }

    fn done(self) -> BTreeMap<String, String> {
        self.0
    }
}

/// Shared-object symbols (`/ndk-symbol`, `/linux`)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SoFileFields {
    /// `apiKey`
    pub api_key: Option<String>,
    /// `appId`
    pub app_id: Option<String>,
    /// `versionName`
    pub version_name: Option<String>,
    /// `versionCode`
    pub version_code: Option<String>,
    /// `projectRoot`
    pub project_root: Option<String>,
    /// `sharedObjectName`
    pub shared_object_name: Option<String>,
    /// `overwrite`
    pub overwrite: bool,
}

impl SoFileFields {
    /// Fields for one shared object
    pub fn new(descriptor: &BuildDescriptor, shared_object_name: &str, overwrite: bool) -> Self {
        Self {
            api_key: descriptor.api_key.clone(),
            app_id: descriptor.application_id.clone(),
            version_name: descriptor.version_name.clone(),
            version_code: descriptor.version_code.clone(),
            project_root: descriptor.project_root.clone(),
            shared_object_name: Some(shared_object_name.to_string()),
            overwrite,
        }
    }
}

impl FormFields for SoFileFields {
    fn form_fields(&self) -> BTreeMap<String, String> {
        Fields::default()
            .text("apiKey", self.api_key.as_deref())
            .text("appId", self.app_id.as_deref())
            .text("versionName", self.version_name.as_deref())
            .text("versionCode", self.version_code.as_deref())
            .text("projectRoot", self.project_root.as_deref())
            .text("sharedObjectName", self.shared_object_name.as_deref())
            .flag("overwrite", self.overwrite)
            .done()
    }
}

/// Proguard / R8 mapping (`/android-proguard`)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProguardFields {
    /// `apiKey`
    pub api_key: Option<String>,
    /// `appId`
    pub app_id: Option<String>,
    /// `versionName`
    pub version_name: Option<String>,
    /// `versionCode`
    pub version_code: Option<String>,
    /// `buildUUID`
    pub build_uuid: Option<String>,
    /// `overwrite`
    pub overwrite: bool,
}

impl ProguardFields {
    /// Fields from a merged descriptor; the `none` sentinel suppresses `buildUUID`
    pub fn new(descriptor: &BuildDescriptor, overwrite: bool) -> Self {
        Self {
            api_key: descriptor.api_key.clone(),
            app_id: descriptor.application_id.clone(),
            version_name: descriptor.version_name.clone(),
            version_code: descriptor.version_code.clone(),
            build_uuid: descriptor.build_uuid().map(str::to_string),
            overwrite,
        }
    }

    /// The backend matches a mapping by at least one of these
    pub fn has_identity(&self) -> bool {
        [&self.app_id, &self.version_name, &self.version_code, &self.build_uuid]
            .iter()
            .any(|v| v.as_deref().is_some_and(|s| !s.is_empty()))
    }
}

impl FormFields for ProguardFields {
    fn form_fields(&self) -> BTreeMap<String, String> {
        Fields::default()
            .text("apiKey", self.api_key.as_deref())
            .text("appId", self.app_id.as_deref())
            .text("versionName", self.version_name.as_deref())
            .text("versionCode", self.version_code.as_deref())
            .text("buildUUID", self.build_uuid.as_deref())
            .flag("overwrite", self.overwrite)
            .done()
    }
}

/// Apple dSYM (`/dsym`)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DsymFields {
    /// `apiKey`
    pub api_key: Option<String>,
    /// `projectRoot`
    pub project_root: Option<String>,
    /// `overwrite`
    pub overwrite: bool,
}

impl FormFields for DsymFields {
    fn form_fields(&self) -> BTreeMap<String, String> {
        Fields::default()
            .text("apiKey", self.api_key.as_deref())
            .text("projectRoot", self.project_root.as_deref())
            .flag("overwrite", self.overwrite)
            .done()
    }
}

/// Flutter symbols (`/dart-symbol`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DartFields {
    /// `apiKey`
    pub api_key: Option<String>,
    /// `buildId`
    pub build_id: String,
    /// `platform`
    pub platform: Platform,
    /// `appVersion`
    pub app_version: Option<String>,
    /// `appVersionCode` on Android, `appBundleVersion` on iOS
    pub extra_version: Option<String>,
    /// `overwrite`
    pub overwrite: bool,
}

impl FormFields for DartFields {
    fn form_fields(&self) -> BTreeMap<String, String> {
        let extra_key = match self.platform {
            Platform::Android => "appVersionCode",
            Platform::Ios => "appBundleVersion",
        };
        Fields::default()
            .text("apiKey", self.api_key.as_deref())
            .text("buildId", Some(&self.build_id))
            .text("platform", Some(self.platform.as_str()))
            .text("appVersion", self.app_version.as_deref())
            .text(extra_key, self.extra_version.as_deref())
            .flag("overwrite", self.overwrite)
            .done()
    }
}

/// React Native bundle and source map (`/react-native-source-map`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReactNativeFields {
    /// `apiKey`
    pub api_key: Option<String>,
    /// `platform`
    pub platform: Platform,
    /// `appVersion`
    pub app_version: Option<String>,
    /// `appVersionCode` (Android)
    pub app_version_code: Option<String>,
    /// `appBundleVersion` (iOS)
    pub app_bundle_version: Option<String>,
    /// `codeBundleId`, which replaces the version fields
    pub code_bundle_id: Option<String>,
    /// `dev`
    pub dev: bool,
    /// `projectRoot`
    pub project_root: Option<String>,
    /// `overwrite`
    pub overwrite: bool,
}

impl ReactNativeFields {
    /// Fields from a merged descriptor
    pub fn new(descriptor: &BuildDescriptor, platform: Platform, overwrite: bool) -> Self {
        Self {
            api_key: descriptor.api_key.clone(),
            platform,
            app_version: descriptor.version_name.clone(),
            app_version_code: descriptor.version_code.clone(),
            app_bundle_version: descriptor.bundle_version.clone(),
            code_bundle_id: descriptor.code_bundle_id.clone(),
            dev: descriptor.dev.unwrap_or(false),
            project_root: descriptor.project_root.clone(),
            overwrite,
        }
    }
}

impl FormFields for ReactNativeFields {
    fn form_fields(&self) -> BTreeMap<String, String> {
        let mut fields = Fields::default().text("apiKey", self.api_key.as_deref());
        fields = match self.code_bundle_id.as_deref().filter(|id| !id.is_empty()) {
            Some(id) => fields.text("codeBundleId", Some(id)),
            None => {
                let fields = fields.text("appVersion", self.app_version.as_deref());
                match self.platform {
                    Platform::Android => {
                        fields.text("appVersionCode", self.app_version_code.as_deref())
                    }
                    Platform::Ios => {
                        fields.text("appBundleVersion", self.app_bundle_version.as_deref())
                    }
                }
            }
        };
        fields
            .flag("dev", self.dev)
            .text("projectRoot", self.project_root.as_deref())
            .text("platform", Some(self.platform.as_str()))
            .flag("overwrite", self.overwrite)
            .done()
    }
}

/// Browser / Node source map (`/sourcemap`)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JsFields {
    /// `apiKey`
    pub api_key: Option<String>,
    /// `appVersion`
    pub app_version: Option<String>,
    /// `codeBundleId`
    pub code_bundle_id: Option<String>,
    /// `minifiedUrl`
    pub minified_url: String,
    /// `projectRoot`
    pub project_root: Option<String>,
    /// `overwrite`
    pub overwrite: bool,
}

impl FormFields for JsFields {
    fn form_fields(&self) -> BTreeMap<String, String> {
        Fields::default()
            .text("apiKey", self.api_key.as_deref())
            .text("appVersion", self.app_version.as_deref())
            .text("codeBundleId", self.code_bundle_id.as_deref())
            .text("minifiedUrl", Some(&self.minified_url))
            .text("projectRoot", self.project_root.as_deref())
            .flag("overwrite", self.overwrite)
            .done()
    }
}

/// Unity IL2CPP line mappings (`/unity-line-mappings`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineMappingFields {
    /// `apiKey`
    pub api_key: Option<String>,
    /// `appId`
    pub app_id: Option<String>,
    /// `appVersion`
    pub app_version: Option<String>,
    /// Target platform, which picks the id and version field names
    pub platform: Platform,
    /// `soBuildId` (Android) or `dsymUUID` (iOS)
    pub build_id: String,
    /// `appVersionCode` (Android) or `appBundleVersion` (iOS)
    pub extra_version: Option<String>,
    /// `projectRoot`
    pub project_root: Option<String>,
    /// `overwrite`
    pub overwrite: bool,
}

impl FormFields for LineMappingFields {
    fn form_fields(&self) -> BTreeMap<String, String> {
        let (id_key, version_key) = match self.platform {
            Platform::Android => ("soBuildId", "appVersionCode"),
            Platform::Ios => ("dsymUUID", "appBundleVersion"),
        };
        Fields::default()
            .text("apiKey", self.api_key.as_deref())
            .text("appId", self.app_id.as_deref())
            .text("appVersion", self.app_version.as_deref())
            .text(id_key, Some(&self.build_id))
            .text(version_key, self.extra_version.as_deref())
            .text("projectRoot", self.project_root.as_deref())
            .flag("overwrite", self.overwrite)
            .done()
    }
}

/// Breakpad `.sym` (`/breakpad-symbol`).
///
/// Identity travels in the query string; the optional module details are
/// form fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BreakpadFields {
    /// `api_key` query parameter
    pub api_key: Option<String>,
    /// `project_root` query parameter
    pub project_root: Option<String>,
    /// `overwrite` query parameter
    pub overwrite: bool,
    /// `cpu_arch`
    pub cpu_arch: Option<String>,
    /// `code_file`
    pub code_file: Option<String>,
    /// `debug_file`
    pub debug_file: Option<String>,
    /// `debug_identifier`
    pub debug_identifier: Option<String>,
    /// `product_name`
    pub product_name: Option<String>,
    /// `os_name`
    pub os_name: Option<String>,
    /// `version`
    pub version: Option<String>,
}

impl BreakpadFields {
    /// Query-string pairs
    pub fn query(&self) -> Vec<(String, String)> {
        let mut query = Vec::new();
        if let Some(key) = self.api_key.as_deref().filter(|k| !k.is_empty()) {
            query.push(("api_key".to_string(), key.to_string()));
        }
        if self.overwrite {
            query.push(("overwrite".to_string(), "true".to_string()));
        }
        if let Some(root) = self.project_root.as_deref().filter(|r| !r.is_empty()) {
            query.push(("project_root".to_string(), root.to_string()));
        }
        query
    }
}

impl FormFields for BreakpadFields {
    fn form_fields(&self) -> BTreeMap<String, String> {
        Fields::default()
            .text("cpu_arch", self.cpu_arch.as_deref())
            .text("code_file", self.code_file.as_deref())
            .text("debug_file", self.debug_file.as_deref())
            .text("debug_identifier", self.debug_identifier.as_deref())
            .text("product_name", self.product_name.as_deref())
            .text("os_name", self.os_name.as_deref())
            .text("version", self.version.as_deref())
            .done()
    }
}

/// Caller-provided fields for the generic resolver
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CustomFields {
    /// Arbitrary text fields
    pub fields: BTreeMap<String, String>,
    /// `overwrite`
    pub overwrite: bool,
}

impl FormFields for CustomFields {
    fn form_fields(&self) -> BTreeMap<String, String> {
        let mut fields = Fields(self.fields.clone()).flag("overwrite", self.overwrite);
        fields.0.retain(|_, v| !v.is_empty());
        fields.done()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor() -> BuildDescriptor {
        BuildDescriptor {
            api_key: Some("1234567890ABCDEF1234567890ABCDEF".into()),
            application_id: Some("com.example".into()),
            version_name: Some("1.0".into()),
            version_code: Some("42".into()),
            bundle_version: Some("42.1".into()),
            build_uuid: Some("none".into()),
            project_root: Some("/src/app".into()),
            ..Default::default()
        }
    }

    #[test]
    fn test_so_file_fields() {
        let fields = SoFileFields::new(&descriptor(), "libfoo.so", false).form_fields();
        assert_eq!(fields["appId"], "com.example");
        assert_eq!(fields["versionCode"], "42");
        assert_eq!(fields["sharedObjectName"], "libfoo.so");
        assert!(!fields.contains_key("overwrite"));
        assert!(!fields.contains_key("applicationId"));
    }

    #[test]
    fn test_proguard_sentinel_suppresses_build_uuid() {
        let record = ProguardFields::new(&descriptor(), true);
        let fields = record.form_fields();
        assert!(!fields.contains_key("buildUUID"));
        assert_eq!(fields["overwrite"], "true");
        assert!(record.has_identity());
        assert!(!ProguardFields::default().has_identity());
    }

    #[test]
    fn test_react_native_code_bundle_id_replaces_versions() {
        let mut d = descriptor();
        let fields = ReactNativeFields::new(&d, Platform::Ios, false).form_fields();
        assert_eq!(fields["appBundleVersion"], "42.1");
        assert!(!fields.contains_key("appVersionCode"));

        d.code_bundle_id = Some("bundle-7".into());
        d.dev = Some(true);
        let fields = ReactNativeFields::new(&d, Platform::Android, false).form_fields();
        assert_eq!(fields["codeBundleId"], "bundle-7");
        assert_eq!(fields["dev"], "true");
        assert!(!fields.contains_key("appVersion"));
        assert_eq!(fields["platform"], "android");
    }

    #[test]
    fn test_platform_specific_names() {
        let dart = DartFields {
            api_key: None,
            build_id: "abc".into(),
            platform: Platform::Ios,
            app_version: Some("1.0".into()),
            extra_version: Some("7".into()),
            overwrite: false,
        };
        assert_eq!(dart.form_fields()["appBundleVersion"], "7");

        let mappings = LineMappingFields {
            api_key: None,
            app_id: None,
            app_version: None,
            platform: Platform::Android,
            build_id: "c3a9".into(),
            extra_version: Some("42".into()),
            project_root: None,
            overwrite: false,
        };
        let fields = mappings.form_fields();
        assert_eq!(fields["soBuildId"], "c3a9");
        assert_eq!(fields["appVersionCode"], "42");
    }

    #[test]
    fn test_breakpad_query() {
        let record = BreakpadFields {
            api_key: Some("key".into()),
            project_root: Some("/my project".into()),
            overwrite: true,
            cpu_arch: Some("x86_64".into()),
            ..Default::default()
        };
        assert_eq!(
            record.query(),
            vec![
                ("api_key".to_string(), "key".to_string()),
                ("overwrite".to_string(), "true".to_string()),
                ("project_root".to_string(), "/my project".to_string()),
            ]
        );
        assert_eq!(record.form_fields().len(), 1);
    }
}
