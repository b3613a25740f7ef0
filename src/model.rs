//! Data model shared by resolvers, the merger and the transport.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

/// Kind of artifact a command deals with.
///
/// Each kind maps to the CLI verb that produces it and to the upload route
/// its files are sent to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactKind {
    /// Android App Bundle (NDK symbols + Proguard map inside)
    AndroidAab,
    /// Proguard / R8 mapping file
    AndroidProguard,
    /// NDK shared-object symbols
    AndroidNdk,
    /// Apple dSYM bundles
    Dsym,
    /// dSYMs resolved from an Xcode build
    XcodeBuild,
    /// dSYMs resolved from an Xcode archive
    XcodeArchive,
    /// React Native Android bundle + source map
    ReactNativeAndroid,
    /// React Native iOS bundle + source map
    ReactNativeIos,
    /// Explicit React Native bundle + source map pair
    ReactNativeSourceMap,
    /// Flutter / Dart symbol files
    Dart,
    /// Unity Android symbols.zip
    UnityAndroid,
    /// Unity iOS dSYMs and line mappings
    UnityIos,
    /// Breakpad .sym files
    Breakpad,
    /// Linux ELF symbol files
    Linux,
    /// Browser / Node JavaScript source maps
    JsSourceMap,
    /// Arbitrary files with caller-provided fields
    DiscoverAny,
    /// Build information (JSON, not multipart)
    CreateBuild,
    /// DEX-derived Android build id (local only)
    AndroidBuildId,
}

impl ArtifactKind {
    /// Name of the CLI verb for this kind
    pub fn verb(&self) -> &'static str {
        match self {
            ArtifactKind::AndroidAab => "android-aab",
            ArtifactKind::AndroidProguard => "android-proguard",
            ArtifactKind::AndroidNdk => "android-ndk",
            ArtifactKind::Dsym => "dsym",
            ArtifactKind::XcodeBuild => "xcode-build",
            ArtifactKind::XcodeArchive => "xcode-archive",
            ArtifactKind::ReactNativeAndroid => "react-native-android",
            ArtifactKind::ReactNativeIos => "react-native-ios",
            ArtifactKind::ReactNativeSourceMap => "react-native-sourcemaps",
            ArtifactKind::Dart => "dart",
            ArtifactKind::UnityAndroid => "unity-android",
            ArtifactKind::UnityIos => "unity-ios",
            ArtifactKind::Breakpad => "breakpad",
            ArtifactKind::Linux => "linux",
            ArtifactKind::JsSourceMap => "js",
            ArtifactKind::DiscoverAny => "all",
            ArtifactKind::CreateBuild => "create-build",
            ArtifactKind::AndroidBuildId => "create-android-build-id",
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.verb())
    }
}

/// Target platform for cross-platform kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Platform {
    /// Android
    Android,
    /// iOS
    Ios,
}

impl Platform {
    /// Lower-case wire name
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Android => "android",
            Platform::Ios => "ios",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Source control providers accepted by the build endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    /// github.com
    GitHub,
    /// GitHub Enterprise
    GitHubEnterprise,
    /// bitbucket.org
    Bitbucket,
    /// Bitbucket Server
    BitbucketServer,
    /// gitlab.com
    GitLab,
    /// Self-hosted GitLab
    GitLabOnPremise,
}

impl Provider {
    /// Parse a provider name, returning `None` for anything outside the allowed set
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "github" => Some(Provider::GitHub),
            "github-enterprise" => Some(Provider::GitHubEnterprise),
            "bitbucket" => Some(Provider::Bitbucket),
            "bitbucket-server" => Some(Provider::BitbucketServer),
            "gitlab" => Some(Provider::GitLab),
            "gitlab-onpremise" => Some(Provider::GitLabOnPremise),
            _ => None,
        }
    }

    /// Wire name
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::GitHub => "github",
            Provider::GitHubEnterprise => "github-enterprise",
            Provider::Bitbucket => "bitbucket",
            Provider::BitbucketServer => "bitbucket-server",
            Provider::GitLab => "gitlab",
            Provider::GitLabOnPremise => "gitlab-onpremise",
        }
    }
}

/// Source control details attached to a build
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceControl {
    /// Hosting provider
    pub provider: Option<Provider>,
    /// Repository URL
    pub repository: Option<String>,
    /// Commit SHA
    pub revision: Option<String>,
}

impl SourceControl {
    /// Interpret a raw provider string.
    ///
    /// Blank input is `Ok(None)`. Values outside the allowed set are returned
    /// as an `Err` message for the caller to report before discarding.
    pub fn provider_from_str(raw: Option<&str>) -> std::result::Result<Option<Provider>, String> {
        let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
            return Ok(None);
        };
        Provider::parse(raw).map(Some).ok_or_else(|| {
            format!(
                "Ignoring unsupported source control provider '{raw}'; expected one of github, \
                 github-enterprise, bitbucket, bitbucket-server, gitlab, gitlab-onpremise"
            )
        })
    }
}

/// Identity and build metadata for one invocation.
///
/// Every field is optional; a field counts as absent when it is `None` or an
/// empty string. Layers of this shape are composed by [`crate::merge`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildDescriptor {
    /// Project API key
    pub api_key: Option<String>,
    /// Android package name
    pub application_id: Option<String>,
    /// Human-readable version
    pub version_name: Option<String>,
    /// Android version code
    pub version_code: Option<String>,
    /// Apple bundle version
    pub bundle_version: Option<String>,
    /// Build UUID, or the sentinel `none`
    pub build_uuid: Option<String>,
    /// Path prefix stripped from stack frames
    pub project_root: Option<String>,
    /// React Native code bundle id
    pub code_bundle_id: Option<String>,
    /// React Native debug build
    pub dev: Option<bool>,
    /// Target platform
    pub platform: Option<Platform>,
    /// Free-form build metadata
    pub metadata: BTreeMap<String, String>,
    /// Source control details
    pub source_control: SourceControl,
    /// Who produced the build
    pub builder_name: Option<String>,
    /// Release stage, e.g. production
    pub release_stage: Option<String>,
    /// Associate the build with new events automatically
    pub auto_assign_release: Option<bool>,
}

/// Sentinel that suppresses a build UUID
pub const NO_BUILD_UUID: &str = "none";

impl BuildDescriptor {
    /// API key, when present and non-empty
    pub fn api_key(&self) -> Option<&str> {
        non_empty(&self.api_key)
    }

    /// Build UUID after sentinel interpretation
    pub fn build_uuid(&self) -> Option<&str> {
        non_empty(&self.build_uuid).filter(|u| *u != NO_BUILD_UUID)
    }
}

/// Borrow an optional string, treating the empty string as absent
pub fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.is_empty())
}

/// One architecture slice of a dSYM bundle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DwarfInfo {
    /// Slice UUID
    pub uuid: String,
    /// Architecture, e.g. arm64
    pub arch: String,
    /// DWARF file name
    pub name: String,
    /// Directory holding the DWARF file
    pub location: PathBuf,
}

impl DwarfInfo {
    /// Full path of the DWARF file
    pub fn path(&self) -> PathBuf {
        self.location.join(&self.name)
    }
}
