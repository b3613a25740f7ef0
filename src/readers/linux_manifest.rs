//! `manifest.toml` shipped alongside Linux builds.

use crate::error::{AppError, ErrorExt, FormatError, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Default, Deserialize)]
struct Manifest {
    #[serde(default)]
    package: PackageInfo,
}

/// `[package]` table
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct PackageInfo {
    /// Application id
    #[serde(default)]
    pub id: String,
    /// Display title
    #[serde(default)]
    pub title: String,
    /// Version string
    #[serde(default)]
    pub version: String,
}

/// Read the `[package]` table of a `manifest.toml`
pub fn read_linux_manifest(path: &Path) -> Result<PackageInfo> {
    let text = std::fs::read_to_string(path).fs_context("reading manifest", path)?;
    let manifest: Manifest = toml::from_str(&text).map_err(|e| {
        AppError::Format(FormatError::InvalidToml {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    })?;
    Ok(manifest.package)
}
