//! NDK `llvm-objcopy` discovery and debug-section extraction.

use super::Tool;
use crate::error::{AppError, ErrorExt, Result};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;

/// Oldest NDK whose `llvm-objcopy` supports zlib-compressed debug sections
pub const MIN_NDK_VERSION: u64 = 24;

const OBJCOPY: &str = "llvm-objcopy";

/// NDK root from the option, else `ANDROID_NDK_ROOT`
pub fn ndk_root(option: Option<&Path>) -> Result<PathBuf> {
    let root = match option {
        Some(path) => path.to_path_buf(),
        None => std::env::var_os("ANDROID_NDK_ROOT")
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
            .ok_or_else(|| AppError::missing("--ndk-root (or ANDROID_NDK_ROOT)"))?,
    };
    if !root.is_dir() {
        return Err(AppError::PathNotFound { path: root });
    }
    Ok(root)
}

/// Major NDK version.
///
/// Read from the numeric prefix of the directory name (`25.1.8937393`), else
/// from `Pkg.Revision` in `source.properties`.
pub fn ndk_version(ndk_root: &Path) -> Result<u64> {
    if let Some(major) = ndk_root
        .file_name()
        .and_then(|n| n.to_str())
        .and_then(leading_number)
    {
        return Ok(major);
    }

    let props = ndk_root.join("source.properties");
    let text = std::fs::read_to_string(&props).fs_context("reading NDK version from", &props)?;
    text.lines()
        .filter_map(|line| line.split_once('='))
        .find(|(key, _)| key.trim() == "Pkg.Revision")
        .and_then(|(_, value)| revision_major(value.trim()))
        .ok_or_else(|| AppError::NotFound {
            what: format!("NDK version in {}", props.display()),
        })
}

fn leading_number(s: &str) -> Option<u64> {
    let digits: String = s.chars().take_while(char::is_ascii_digit).collect();
    digits.parse().ok()
}

fn revision_major(revision: &str) -> Option<u64> {
    match semver::Version::parse(revision) {
        Ok(version) => Some(version.major),
        Err(_) => leading_number(revision),
    }
}

/// Locate `llvm-objcopy` inside an NDK (r24 or newer)
pub fn locate_objcopy(ndk_root: &Path) -> Result<Tool> {
    let version = ndk_version(ndk_root)?;
    if version < MIN_NDK_VERSION {
        return Err(AppError::invalid(format!(
            "Unsupported NDK version {version}; upgrade to r{MIN_NDK_VERSION} or newer"
        )));
    }

    let pattern = ndk_root.join("toolchains/llvm/prebuilt/*/bin");
    let pattern = pattern.to_string_lossy();
    let bin_dir = glob::glob(&pattern)
        .map_err(|e| AppError::invalid(format!("Bad NDK path {}: {}", ndk_root.display(), e)))?
        .filter_map(|entry| entry.ok())
        .find(|p| p.is_dir())
        .ok_or_else(|| AppError::NotFound {
            what: format!("{OBJCOPY} within {}", ndk_root.display()),
        })?;

    let binary = if cfg!(windows) {
        format!("{OBJCOPY}.exe")
    } else {
        OBJCOPY.to_string()
    };
    Tool::at(OBJCOPY, bin_dir.join(binary))
}

/// `libfoo.so` → `libfoo.so.sym`; an existing `.so.sym` keeps its name
pub fn output_name(input: &Path) -> String {
    let name = crate::files::file_name(input);
    if name.ends_with(".so.sym") {
        return name;
    }
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or(name);
    format!("{stem}.so.sym")
}

/// Strip everything but compressed debug sections into `out_dir`
pub async fn extract_debug(
    objcopy: &Tool,
    input: &Path,
    out_dir: &Path,
    cancel: &CancellationToken,
) -> Result<PathBuf> {
    let output = out_dir.join(output_name(input));
    objcopy
        .stdout(
            [
                OsStr::new("--compress-debug-sections=zlib"),
                OsStr::new("--only-keep-debug"),
                input.as_os_str(),
                output.as_os_str(),
            ],
            None,
            cancel,
        )
        .await?;
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_from_directory_name() {
        let dir = tempfile::tempdir().unwrap();
        let ndk = dir.path().join("25.1.8937393");
        std::fs::create_dir(&ndk).unwrap();
        assert_eq!(ndk_version(&ndk).unwrap(), 25);
    }

    #[test]
    fn test_version_from_source_properties() {
        let dir = tempfile::tempdir().unwrap();
        let ndk = dir.path().join("ndk-bundle");
        std::fs::create_dir(&ndk).unwrap();
        std::fs::write(
            ndk.join("source.properties"),
            "Pkg.Desc = Android NDK\nPkg.Revision = 23.1.7779620\n",
        )
        .unwrap();
        assert_eq!(ndk_version(&ndk).unwrap(), 23);
    }

    #[test]
    fn test_old_ndk_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let ndk = dir.path().join("21.4.7075529");
        std::fs::create_dir(&ndk).unwrap();
        let err = locate_objcopy(&ndk).unwrap_err();
        assert!(err.to_string().contains("r24"));
    }

    #[test]
    fn test_objcopy_is_found_under_prebuilt() {
        let dir = tempfile::tempdir().unwrap();
        let ndk = dir.path().join("26.0.10792818");
        let bin = ndk.join("toolchains/llvm/prebuilt/linux-x86_64/bin");
        std::fs::create_dir_all(&bin).unwrap();
        let name = if cfg!(windows) { "llvm-objcopy.exe" } else { "llvm-objcopy" };
        std::fs::write(bin.join(name), "").unwrap();

        let tool = locate_objcopy(&ndk).unwrap();
        assert_eq!(tool.path(), bin.join(name));
    }

    #[test]
    fn test_output_name() {
        assert_eq!(output_name(Path::new("lib/arm64-v8a/libfoo.so")), "libfoo.so.sym");
        assert_eq!(output_name(Path::new("libfoo.so.sym")), "libfoo.so.sym");
    }
}
