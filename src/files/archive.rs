//! Scratch directories, zip extraction and gzip compression.

use crate::error::{AppError, ErrorExt, Result};
use flate2::Compression;
use flate2::write::GzEncoder;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Component, Path, PathBuf};

/// RAII guard for a temporary working directory.
///
/// The directory and its contents are removed when the guard is dropped,
/// including during unwinding.
#[derive(Debug)]
pub struct ScratchDir {
    dir: Option<tempfile::TempDir>,
    tag: String,
}

impl ScratchDir {
    /// Create `bugsnag-cli-<tag>-unpacking-*` in the system temp directory
    pub fn new(tag: &str) -> Result<Self> {
        let dir = tempfile::Builder::new()
            .prefix(&format!("bugsnag-cli-{tag}-unpacking-"))
            .tempdir()
            .fs_context("creating temporary directory", std::env::temp_dir())?;
        log::debug!("Created temporary directory {}", dir.path().display());
        Ok(Self {
            dir: Some(dir),
            tag: tag.to_string(),
        })
    }

    /// Directory path
    pub fn path(&self) -> &Path {
        self.dir
            .as_ref()
            .map(|d| d.path())
            .unwrap_or_else(|| Path::new(""))
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        if let Some(dir) = self.dir.take() {
            let path = dir.path().to_path_buf();
            if let Err(e) = dir.close() {
                log::warn!(
                    "Failed to remove temporary {} directory {}: {}",
                    self.tag,
                    path.display(),
                    e
                );
            } else {
                log::debug!("Removed temporary directory {}", path.display());
            }
        }
    }
}

/// Extract `archive` into a fresh scratch directory tagged `tag`
pub fn extract_zip(archive: &Path, tag: &str) -> Result<ScratchDir> {
    let scratch = ScratchDir::new(tag)?;
    unzip_into(archive, scratch.path())?;
    Ok(scratch)
}

/// Extract every entry of `archive` below `dest`.
///
/// All entry names are validated before anything is written, so an archive
/// with a single escaping entry leaves `dest` untouched.
pub fn unzip_into(archive: &Path, dest: &Path) -> Result<()> {
    let file = File::open(archive).fs_context("opening archive", archive)?;
    let mut zip = zip::ZipArchive::new(BufReader::new(file))?;

    let mut targets = Vec::with_capacity(zip.len());
    for i in 0..zip.len() {
        let entry = zip.by_index(i)?;
        let name = entry.name().to_string();
        let target = safe_join(dest, &name).ok_or_else(|| AppError::ZipSlip {
            archive: archive.to_path_buf(),
            entry: name.clone(),
        })?;
        targets.push((target, entry.is_dir()));
    }

    for (i, (target, is_dir)) in targets.into_iter().enumerate() {
        if is_dir {
            std::fs::create_dir_all(&target).fs_context("creating directory", &target)?;
            continue;
        }
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent).fs_context("creating directory", parent)?;
        }
        let mut entry = zip.by_index(i)?;
        let mut out = File::create(&target).fs_context("creating file", &target)?;
        std::io::copy(&mut entry, &mut out).fs_context("writing file", &target)?;
    }

    log::debug!("Extracted {} into {}", archive.display(), dest.display());
    Ok(())
}

/// Lexically join an archive entry name onto `dest`.
///
/// Returns `None` when the cleaned path would leave `dest`.
fn safe_join(dest: &Path, name: &str) -> Option<PathBuf> {
    let normalized = name.replace('\\', "/");
    let mut parts: Vec<&std::ffi::OsStr> = Vec::new();
    for component in Path::new(&normalized).components() {
        match component {
            Component::Normal(part) => parts.push(part),
            Component::CurDir => {}
            Component::ParentDir => {
                parts.pop()?;
            }
            Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    if parts.is_empty() {
        return None;
    }
    let mut joined = dest.to_path_buf();
    joined.extend(parts);
    Some(joined)
}

/// Gzip `source` into `<dest_dir>/<file name>.gz`
pub fn gzip_file(source: &Path, dest_dir: &Path) -> Result<PathBuf> {
    let name = super::file_name(source);
    let target = dest_dir.join(format!("{name}.gz"));

    let mut input = BufReader::new(File::open(source).fs_context("opening file", source)?);
    let output = BufWriter::new(File::create(&target).fs_context("creating file", &target)?);
    let mut encoder = GzEncoder::new(output, Compression::default());
    std::io::copy(&mut input, &mut encoder).fs_context("compressing file", source)?;
    encoder.finish().fs_context("compressing file", &target)?;

    Ok(target)
}
