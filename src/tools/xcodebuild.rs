//! `xcodebuild` schemes and build settings.

use super::Tool;
use crate::error::{AppError, OptionError, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;

const SCHEMES_HEADER: &str = "Schemes:\n";
const SETTINGS_HEADER: &str = "Build settings for action build and target ";

/// Settings consumed by the Xcode resolvers
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildSettings {
    /// `CONFIGURATION_BUILD_DIR`
    pub configuration_build_dir: Option<PathBuf>,
    /// `INFOPLIST_PATH`, relative to the build directory
    pub infoplist_path: Option<PathBuf>,
    /// `BUILT_PRODUCTS_DIR`
    pub built_products_dir: Option<PathBuf>,
    /// `DWARF_DSYM_FILE_NAME`
    pub dsym_name: Option<String>,
    /// `PROJECT_TEMP_ROOT`
    pub project_temp_root: Option<PathBuf>,
}

impl BuildSettings {
    /// Absolute Info.plist path
    pub fn info_plist(&self) -> Option<PathBuf> {
        let dir = self.configuration_build_dir.as_ref()?;
        let plist = self.infoplist_path.as_ref()?;
        Some(dir.join(plist))
    }

    /// Absolute dSYM bundle path
    pub fn dsym_path(&self) -> Option<PathBuf> {
        let dir = self.built_products_dir.as_ref()?;
        let name = self.dsym_name.as_ref()?;
        Some(dir.join(name))
    }
}

/// Scheme names listed after `Schemes:` in `xcodebuild -list` output
pub fn parse_schemes(output: &str) -> Vec<String> {
    let Some(idx) = output.find(SCHEMES_HEADER) else {
        return Vec::new();
    };
    output[idx + SCHEMES_HEADER.len()..]
        .lines()
        .map(str::trim)
        .take_while(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parse `-showBuildSettings` output for the first build target
pub fn parse_build_settings(output: &str) -> BuildSettings {
    let body = match output.find(SETTINGS_HEADER) {
        Some(idx) => &output[idx + SETTINGS_HEADER.len()..],
        None => output,
    };
    // a second target block starts a new section
    let body = match body.find(SETTINGS_HEADER) {
        Some(idx) => &body[..idx],
        None => body,
    };

    let values: HashMap<&str, &str> = body
        .lines()
        .filter_map(|line| line.split_once(" = "))
        .map(|(k, v)| (k.trim(), v.trim()))
        .collect();
    let value = |key: &str| {
        values
            .get(key)
            .copied()
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    };

    BuildSettings {
        configuration_build_dir: value("CONFIGURATION_BUILD_DIR").map(PathBuf::from),
        infoplist_path: value("INFOPLIST_PATH").map(PathBuf::from),
        built_products_dir: value("BUILT_PRODUCTS_DIR").map(PathBuf::from),
        dsym_name: value("DWARF_DSYM_FILE_NAME"),
        project_temp_root: value("PROJECT_TEMP_ROOT").map(PathBuf::from),
    }
}

/// True for `.xcodeproj` and `.xcworkspace` bundles
pub fn is_project_or_workspace(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e == "xcodeproj" || e == "xcworkspace")
}

/// Find an Xcode project or workspace at `path` or one level below.
///
/// A workspace wins over a project in the same directory.
pub fn find_project_or_workspace(path: &Path) -> Option<PathBuf> {
    if is_project_or_workspace(path) {
        return Some(path.to_path_buf());
    }
    let search = |dir: &Path| -> Option<PathBuf> {
        let mut entries: Vec<PathBuf> = std::fs::read_dir(dir)
            .ok()?
            .filter_map(|e| e.ok().map(|e| e.path()))
            .filter(|p| is_project_or_workspace(p))
            .collect();
        entries.sort();
        entries
            .iter()
            .find(|p| p.extension().is_some_and(|e| e == "xcworkspace"))
            .or_else(|| entries.first())
            .cloned()
    };

    if let Some(found) = search(path) {
        return Some(found);
    }
    let mut subdirs: Vec<PathBuf> = std::fs::read_dir(path)
        .ok()?
        .filter_map(|e| e.ok().map(|e| e.path()))
        .filter(|p| p.is_dir())
        .collect();
    subdirs.sort();
    subdirs.iter().find_map(|dir| search(dir))
}

fn project_args(project: &Path) -> Vec<String> {
    let flag = if project.extension().is_some_and(|e| e == "xcworkspace") {
        "-workspace"
    } else {
        "-project"
    };
    vec![flag.to_string(), project.display().to_string()]
}

/// List the schemes of a project or workspace
pub async fn list_schemes(project: &Path, cancel: &CancellationToken) -> Result<Vec<String>> {
    let xcodebuild = Tool::locate("xcodebuild")?;
    let mut args = project_args(project);
    args.push("-list".to_string());
    let output = xcodebuild.stdout(&args, None, cancel).await?;
    Ok(parse_schemes(&output))
}

/// The single scheme of a project; zero or several schemes is an error
pub async fn default_scheme(project: &Path, cancel: &CancellationToken) -> Result<String> {
    let schemes = list_schemes(project, cancel).await?;
    pick_default_scheme(schemes, project)
}

fn pick_default_scheme(mut schemes: Vec<String>, project: &Path) -> Result<String> {
    match schemes.len() {
        1 => Ok(schemes.remove(0)),
        0 => Err(AppError::Option(OptionError::MissingOption {
            option: format!("--scheme (no schemes found in {})", project.display()),
        })),
        _ => Err(AppError::Option(OptionError::InvalidArguments {
            reason: format!(
                "{} has multiple schemes ({}); pass --scheme to choose one",
                project.display(),
                schemes.join(", ")
            ),
        })),
    }
}

/// Check `scheme` exists in the project
pub async fn ensure_scheme(project: &Path, scheme: &str, cancel: &CancellationToken) -> Result<()> {
    let schemes = list_schemes(project, cancel).await?;
    if schemes.iter().any(|s| s == scheme) {
        Ok(())
    } else {
        Err(AppError::invalid(format!(
            "Scheme '{}' not found in {}",
            scheme,
            project.display()
        )))
    }
}

/// Run `-showBuildSettings` for a scheme
pub async fn build_settings(
    project: &Path,
    scheme: &str,
    configuration: Option<&str>,
    cancel: &CancellationToken,
) -> Result<BuildSettings> {
    let xcodebuild = Tool::locate("xcodebuild")?;
    let mut args = project_args(project);
    args.extend(["-scheme".to_string(), scheme.to_string(), "-showBuildSettings".to_string()]);
    if let Some(configuration) = configuration {
        args.extend(["-configuration".to_string(), configuration.to_string()]);
    }
    let output = xcodebuild.stdout(&args, None, cancel).await?;
    Ok(parse_build_settings(&output))
}

#[cfg(test)]
mod tests {
    use super::*;

    const LIST_OUTPUT: &str = "Information about project \"Example\":
    Targets:
        Example
        ExampleTests

    Build Configurations:
        Debug
        Release

    Schemes:
        Example
        Example-Staging

";

    const SETTINGS_OUTPUT: &str = "Command line invocation:
    /usr/bin/xcodebuild -showBuildSettings

Build settings for action build and target Example:
    BUILT_PRODUCTS_DIR = /Users/dev/DerivedData/Build/Products/Release-iphoneos
    CONFIGURATION_BUILD_DIR = /Users/dev/DerivedData/Build/Products/Release-iphoneos
    DWARF_DSYM_FILE_NAME = Example.app.dSYM
    INFOPLIST_PATH = Example.app/Info.plist
    PROJECT_TEMP_ROOT = /Users/dev/DerivedData/Build/Intermediates.noindex

Build settings for action build and target ExampleTests:
    DWARF_DSYM_FILE_NAME = ExampleTests.xctest.dSYM
";

    #[test]
    fn test_parse_schemes() {
        assert_eq!(parse_schemes(LIST_OUTPUT), vec!["Example", "Example-Staging"]);
        assert!(parse_schemes("no schemes here").is_empty());
    }

    #[test]
    fn test_parse_build_settings_uses_first_target() {
        let settings = parse_build_settings(SETTINGS_OUTPUT);
        assert_eq!(settings.dsym_name.as_deref(), Some("Example.app.dSYM"));
        assert_eq!(
            settings.info_plist(),
            Some(PathBuf::from(
                "/Users/dev/DerivedData/Build/Products/Release-iphoneos/Example.app/Info.plist"
            ))
        );
        assert_eq!(
            settings.dsym_path(),
            Some(PathBuf::from(
                "/Users/dev/DerivedData/Build/Products/Release-iphoneos/Example.app.dSYM"
            ))
        );
        assert!(settings.project_temp_root.is_some());
    }

    #[test]
    fn test_default_scheme_requires_exactly_one() {
        let project = Path::new("Example.xcodeproj");
        assert_eq!(
            pick_default_scheme(vec!["A".into()], project).unwrap(),
            "A"
        );
        assert!(pick_default_scheme(vec![], project).is_err());
        let err = pick_default_scheme(vec!["A".into(), "B".into()], project).unwrap_err();
        assert!(err.to_string().contains("A, B"));
    }

    #[test]
    fn test_find_project_prefers_workspace() {
        let dir = tempfile::tempdir().unwrap();
        let ios = dir.path().join("ios");
        std::fs::create_dir_all(ios.join("Example.xcodeproj")).unwrap();
        std::fs::create_dir_all(ios.join("Example.xcworkspace")).unwrap();

        assert_eq!(
            find_project_or_workspace(dir.path()),
            Some(ios.join("Example.xcworkspace"))
        );
        assert_eq!(
            find_project_or_workspace(&ios.join("Example.xcodeproj")),
            Some(ios.join("Example.xcodeproj"))
        );
        let empty = tempfile::tempdir().unwrap();
        assert_eq!(find_project_or_workspace(empty.path()), None);
    }
}
