//! Xcode archive location from the user's `defaults` domain.

use super::Tool;
use crate::error::{AppError, Result, ToolError};
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tokio_util::sync::CancellationToken;
use walkdir::WalkDir;

const XCODE_DOMAIN: &str = "com.apple.dt.Xcode";
const ARCHIVES_KEY: &str = "IDECustomDistributionArchivesLocation";

/// `~/Library/Developer/Xcode/Archives`
pub fn default_archives_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join("Library/Developer/Xcode/Archives"))
}

/// Directory Xcode writes archives to.
///
/// Uses the custom location when set and non-empty, else the default one.
pub async fn xcode_archives_dir(cancel: &CancellationToken) -> Result<PathBuf> {
    let defaults = Tool::locate("defaults")?;
    let output = defaults
        .output(["read", XCODE_DOMAIN, ARCHIVES_KEY], None, cancel)
        .await?;

    let custom = if output.status.success() {
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    } else {
        Err(String::from_utf8_lossy(&output.stderr).trim().to_string())
    };
    choose_archives_dir(custom, default_archives_dir())
}

/// Pick between the `defaults read` result and the default directory
fn choose_archives_dir(
    custom: std::result::Result<String, String>,
    default: Option<PathBuf>,
) -> Result<PathBuf> {
    match custom {
        Ok(value) if !value.is_empty() => return Ok(PathBuf::from(value)),
        Ok(_) => {}
        Err(stderr) if stderr.contains("does not exist") => {}
        Err(stderr) => {
            return Err(AppError::Tool(ToolError::ToolFailed {
                tool: "defaults".to_string(),
                reason: stderr,
            }));
        }
    }
    match default.filter(|d| d.is_dir()) {
        Some(dir) => {
            log::debug!("No custom archive location, using {}", dir.display());
            Ok(dir)
        }
        None => Err(AppError::NotFound {
            what: "the Xcode archives directory".to_string(),
        }),
    }
}

/// Most recently modified `<scheme>*.xcarchive` under `dir`
pub fn latest_archive_for_scheme(dir: &Path, scheme: &str) -> Result<Option<PathBuf>> {
    let mut latest: Option<(SystemTime, PathBuf)> = None;
    for entry in WalkDir::new(dir) {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy();
        if !entry.file_type().is_dir() || !name.ends_with(".xcarchive") || !name.starts_with(scheme) {
            continue;
        }
        let modified = entry
            .metadata()?
            .modified()
            .unwrap_or(SystemTime::UNIX_EPOCH);
        if latest.as_ref().is_none_or(|(t, _)| modified > *t) {
            latest = Some((modified, entry.into_path()));
        }
    }
    Ok(latest.map(|(_, path)| path))
}
