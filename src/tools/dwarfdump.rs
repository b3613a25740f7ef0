//! UUID and architecture slices from `dwarfdump`.

use super::Tool;
use crate::error::{AppError, Result};
use crate::model::DwarfInfo;
use std::path::Path;
use tokio_util::sync::CancellationToken;

/// Parse `dwarfdump -u` output.
///
/// Lines look like `UUID: <uuid> (<arch>) <name>`; the name may contain
/// spaces.
pub fn parse_uuid_output(output: &str, location: &Path) -> Vec<DwarfInfo> {
    output
        .lines()
        .filter(|line| line.contains("UUID: "))
        .filter_map(|line| {
            let line = line.replace(['(', ')'], "");
            let tokens: Vec<&str> = line.split_whitespace().collect();
            if tokens.len() < 4 {
                log::debug!("Skipping unexpected dwarfdump line: {}", line);
                return None;
            }
            Some(DwarfInfo {
                uuid: tokens[1].to_string(),
                arch: tokens[2].to_string(),
                name: tokens[3..].join(" "),
                location: location.to_path_buf(),
            })
        })
        .collect()
}

/// UUID slices of one DWARF file
pub async fn dwarf_info(file: &Path, cancel: &CancellationToken) -> Result<Vec<DwarfInfo>> {
    let dwarfdump = Tool::locate("dwarfdump")?;
    let dir = file.parent().unwrap_or(Path::new("."));
    let name = file
        .file_name()
        .ok_or_else(|| AppError::invalid(format!("Not a file: {}", file.display())))?;
    let output = dwarfdump
        .stdout([std::ffi::OsStr::new("-u"), name], Some(dir), cancel)
        .await?;
    Ok(parse_uuid_output(&output, dir))
}

/// UUID of one architecture slice of an app binary
pub async fn uuid_for_arch(
    binary: &Path,
    arch: &str,
    cancel: &CancellationToken,
) -> Result<Option<String>> {
    let dwarfdump = Tool::locate("dwarfdump")?;
    let binary_arg = binary.display().to_string();
    let output = dwarfdump
        .stdout(["--uuid", binary_arg.as_str(), "--arch", arch], None, cancel)
        .await?;
    let location = binary.parent().unwrap_or(Path::new("."));
    Ok(parse_uuid_output(&output, location)
        .into_iter()
        .next()
        .map(|info| info.uuid))
}
