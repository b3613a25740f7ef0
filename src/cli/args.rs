//! Command line argument parsing.
//!
//! Global flags sit on [`Args`]; transport flags shared by every upload kind
//! sit on the `upload` verb; each kind flattens its own option struct from
//! the resolver that consumes it.

use super::{LogLevel, OutputManager};
use crate::resolvers::ResolveContext;
use crate::resolvers::android::{aab::AabOptions, ndk::NdkOptions, proguard::ProguardOptions};
use crate::resolvers::apple::{
    dsym::DsymOptions, xcode_archive::XcodeArchiveOptions, xcode_build::XcodeBuildOptions,
};
use crate::resolvers::breakpad::BreakpadOptions;
use crate::resolvers::build::CreateBuildOptions;
use crate::resolvers::dart::DartOptions;
use crate::resolvers::discover::DiscoverOptions;
use crate::resolvers::js::JsOptions;
use crate::resolvers::linux::LinuxOptions;
use crate::resolvers::react_native::{
    android::ReactNativeAndroidOptions, ios::ReactNativeIosOptions,
    sourcemaps::ReactNativeSourceMapOptions,
};
use crate::resolvers::unity::{android::UnityAndroidOptions, ios::UnityIosOptions};
use crate::upload::{DEFAULT_TIMEOUT_SECS, UploadOptions};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Upload debug symbols, mapping files and source maps for crash symbolication
#[derive(Parser, Debug)]
#[command(
    name = "bugsnag-cli",
    version,
    about = "Upload debug symbols, mapping files and source maps",
    long_about = "Discover build artifacts, read their identity from the files themselves,
and upload them for crash symbolication.

Usage:
  bugsnag-cli upload android-aab app/build/outputs/bundle/release/app-release.aab
  bugsnag-cli upload xcode-build --scheme MyApp ios/
  bugsnag-cli create-build --version-name 1.2.0 ."
)]
pub struct Args {
    /// Project API key
    #[arg(long, global = true, env = "BUGSNAG_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Port number for the upload and build servers
    #[arg(long, global = true, default_value_t = 443)]
    pub port: u16,

    /// Minimum level of messages to print
    #[arg(long, global = true, value_enum, default_value_t = LogLevel::Info)]
    pub log_level: LogLevel,

    /// Print debug messages
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    /// Resolve everything but send nothing
    #[arg(long, global = true)]
    pub dry_run: bool,

    /// Stop at the first failed file
    #[arg(long, global = true)]
    pub fail_on_upload_error: bool,

    /// Command to run
    #[command(subcommand)]
    pub command: Command,
}

/// Top-level verbs
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Upload files for one artifact kind
    Upload(UploadArgs),

    /// Send build information
    CreateBuild(CreateBuildOptions),

    /// Print the build id derived from classes*.dex files
    CreateAndroidBuildId {
        /// Directories holding classes*.dex files, or the files themselves
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
}

impl Command {
    /// Verb name for messages
    pub fn name(&self) -> &'static str {
        match self {
            Command::Upload(upload) => upload.kind.name(),
            Command::CreateBuild(_) => "create-build",
            Command::CreateAndroidBuildId { .. } => "create-android-build-id",
        }
    }
}

/// `upload` flags shared by every kind
#[derive(clap::Args, Debug)]
pub struct UploadArgs {
    /// Replace files the server already has
    #[arg(long, global = true)]
    pub overwrite: bool,

    /// Additional attempts after a failed request
    #[arg(long, global = true, default_value_t = 0)]
    pub retries: u32,

    /// Seconds to wait for each request
    #[arg(
        long,
        global = true,
        default_value_t = DEFAULT_TIMEOUT_SECS,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub timeout: u64,

    /// Upload server root URL, optionally with a port
    #[arg(long, global = true)]
    pub upload_api_root_url: Option<String>,

    /// Artifact kind
    #[command(subcommand)]
    pub kind: UploadKind,
}

/// Artifact kinds accepted by `upload`
#[derive(Subcommand, Debug)]
pub enum UploadKind {
    /// Android App Bundle: native symbols and the Proguard mapping inside it
    #[command(name = "android-aab")]
    AndroidAab(AabOptions),
    /// Android NDK shared objects
    #[command(name = "android-ndk")]
    AndroidNdk(NdkOptions),
    /// Android Proguard/R8 mapping file
    #[command(name = "android-proguard")]
    AndroidProguard(ProguardOptions),
    /// dSYM bundles
    #[command(name = "dsym")]
    Dsym(DsymOptions),
    /// dSYMs from an Xcode build directory
    #[command(name = "xcode-build")]
    XcodeBuild(XcodeBuildOptions),
    /// dSYMs from an Xcode archive
    #[command(name = "xcode-archive")]
    XcodeArchive(XcodeArchiveOptions),
    /// React Native Android source map
    #[command(name = "react-native-android")]
    ReactNativeAndroid(ReactNativeAndroidOptions),
    /// React Native iOS source map
    #[command(name = "react-native-ios")]
    ReactNativeIos(ReactNativeIosOptions),
    /// An explicit React Native source map and bundle
    #[command(name = "react-native-sourcemaps")]
    ReactNativeSourcemaps(ReactNativeSourceMapOptions),
    /// Flutter split-debug-info symbols
    #[command(name = "dart")]
    Dart(DartOptions),
    /// Unity Android symbols, line mappings and App Bundle
    #[command(name = "unity-android")]
    UnityAndroid(UnityAndroidOptions),
    /// Unity iOS dSYMs and line mappings
    #[command(name = "unity-ios")]
    UnityIos(UnityIosOptions),
    /// Breakpad .sym files
    #[command(name = "breakpad")]
    Breakpad(BreakpadOptions),
    /// Linux ELF symbol files
    #[command(name = "linux")]
    Linux(LinuxOptions),
    /// JavaScript source maps
    #[command(name = "js")]
    Js(JsOptions),
    /// Any files, with caller-supplied form fields
    #[command(name = "all")]
    All(DiscoverOptions),
}

impl UploadKind {
    /// Verb name for messages
    pub fn name(&self) -> &'static str {
        match self {
            UploadKind::AndroidAab(_) => "android-aab",
            UploadKind::AndroidNdk(_) => "android-ndk",
            UploadKind::AndroidProguard(_) => "android-proguard",
            UploadKind::Dsym(_) => "dsym",
            UploadKind::XcodeBuild(_) => "xcode-build",
            UploadKind::XcodeArchive(_) => "xcode-archive",
            UploadKind::ReactNativeAndroid(_) => "react-native-android",
            UploadKind::ReactNativeIos(_) => "react-native-ios",
            UploadKind::ReactNativeSourcemaps(_) => "react-native-sourcemaps",
            UploadKind::Dart(_) => "dart",
            UploadKind::UnityAndroid(_) => "unity-android",
            UploadKind::UnityIos(_) => "unity-ios",
            UploadKind::Breakpad(_) => "breakpad",
            UploadKind::Linux(_) => "linux",
            UploadKind::Js(_) => "js",
            UploadKind::All(_) => "all",
        }
    }
}

impl Args {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Effective output level
    pub fn level(&self) -> LogLevel {
        if self.verbose {
            LogLevel::Debug
        } else {
            self.log_level
        }
    }
}

/// Configuration derived from command line arguments
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    output: OutputManager,
    cancel: CancellationToken,
    api_key: Option<String>,
    port: u16,
    dry_run: bool,
    fail_on_upload_error: bool,
}

impl RuntimeConfig {
    /// Runtime configuration around an existing output manager
    pub fn new(args: &Args, output: OutputManager) -> Self {
        Self {
            output,
            cancel: CancellationToken::new(),
            api_key: args.api_key.clone().filter(|k| !k.is_empty()),
            port: args.port,
            dry_run: args.dry_run,
            fail_on_upload_error: args.fail_on_upload_error,
        }
    }

    /// Get a reference to the output manager
    pub fn output(&self) -> &OutputManager {
        &self.output
    }

    /// Token cancelled on Ctrl-C
    pub fn cancel(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Resolver context for one verb
    pub fn context(&self, upload_root: Option<String>, overwrite: bool) -> ResolveContext<'_> {
        ResolveContext {
            output: &self.output,
            cancel: &self.cancel,
            api_key: self.api_key.clone(),
            upload_root,
            port: self.port,
            overwrite,
        }
    }

    /// Transport settings for one verb
    pub fn upload_options(&self, retries: u32, timeout: u64, overwrite: bool) -> UploadOptions {
        UploadOptions {
            retries,
            timeout: Duration::from_secs(timeout),
            overwrite,
            dry_run: self.dry_run,
            fail_on_upload_error: self.fail_on_upload_error,
            ..Default::default()
        }
    }

    /// Whether nothing will be sent
    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }
}

impl From<&Args> for RuntimeConfig {
    fn from(args: &Args) -> Self {
        Self::new(args, OutputManager::new(args.level()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_command_definition_is_valid() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_global_flags_after_the_verb() {
        let args = Args::try_parse_from([
            "bugsnag-cli",
            "upload",
            "android-proguard",
            "--api-key",
            "abc",
            "--retries",
            "2",
            "--dry-run",
            "mapping.txt",
        ])
        .unwrap();
        assert_eq!(args.api_key.as_deref(), Some("abc"));
        assert!(args.dry_run);
        let Command::Upload(upload) = &args.command else {
            panic!("expected upload");
        };
        assert_eq!(upload.retries, 2);
        assert_eq!(upload.timeout, DEFAULT_TIMEOUT_SECS);
        assert_eq!(upload.kind.name(), "android-proguard");
    }

    #[test]
    fn test_verbose_forces_debug() {
        let args = Args::try_parse_from([
            "bugsnag-cli",
            "--log-level",
            "error",
            "--verbose",
            "create-android-build-id",
            ".",
        ])
        .unwrap();
        assert_eq!(args.level(), LogLevel::Debug);
        assert_eq!(args.command.name(), "create-android-build-id");
    }

    #[test]
    fn test_unknown_kind_is_a_usage_error() {
        let err = Args::try_parse_from(["bugsnag-cli", "upload", "nope"]).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn test_timeout_must_be_positive() {
        let upload = Args::try_parse_from(["bugsnag-cli", "upload", "--timeout", "0", "breakpad", "x.sym"]);
        assert_eq!(upload.unwrap_err().exit_code(), 2);

        let build = Args::try_parse_from([
            "bugsnag-cli",
            "create-build",
            "--timeout",
            "0",
            "--version-name",
            "1.0",
        ]);
        assert_eq!(build.unwrap_err().exit_code(), 2);

        let args = Args::try_parse_from(["bugsnag-cli", "upload", "--timeout", "5", "breakpad", "x.sym"])
            .unwrap();
        let Command::Upload(upload) = args.command else {
            panic!("expected upload");
        };
        assert_eq!(upload.timeout, 5);
    }
}
