//! Path and filesystem primitives.
//!
//! Directory walks here are sorted by file name so every resolver sees the
//! same file order on every platform.

mod archive;

pub use archive::{ScratchDir, extract_zip, gzip_file, unzip_into};

use crate::error::{AppError, ErrorExt, Result};
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use walkdir::WalkDir;

/// True when `path` is an existing directory
pub fn is_dir(path: &Path) -> bool {
    path.is_dir()
}

/// True when `path` exists (file or directory)
pub fn file_exists(path: &Path) -> bool {
    path.exists()
}

/// Fail with `PathNotFound` unless `path` exists
pub fn ensure_exists(path: &Path) -> Result<()> {
    if file_exists(path) {
        Ok(())
    } else {
        Err(AppError::PathNotFound {
            path: path.to_path_buf(),
        })
    }
}

/// All regular files below `root`, sorted lexicographically by path
pub fn walk_files(root: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry?;
        if entry.file_type().is_file() {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

/// Flatten a list of files and directories into files.
///
/// Directories expand to their sorted contents; explicit files are kept in
/// the order given.
pub fn build_file_list(paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for path in paths {
        ensure_exists(path)?;
        if path.is_dir() {
            files.extend(walk_files(path)?);
        } else {
            files.push(path.clone());
        }
    }
    Ok(files)
}

/// Immediate subdirectories of `root`, sorted
pub fn list_subdirs(root: &Path) -> Result<Vec<PathBuf>> {
    let mut dirs = Vec::new();
    for entry in std::fs::read_dir(root).fs_context("reading directory", root)? {
        let path = entry.fs_context("reading directory", root)?.path();
        if path.is_dir() {
            dirs.push(path);
        }
    }
    dirs.sort();
    Ok(dirs)
}

/// Most recently modified file below `root` whose name ends with `suffix`
pub fn find_latest_file_with_suffix(root: &Path, suffix: &str) -> Result<Option<PathBuf>> {
    let mut latest: Option<(SystemTime, PathBuf)> = None;
    for path in walk_files(root)? {
        if !file_name(&path).ends_with(suffix) {
            continue;
        }
        let modified = std::fs::metadata(&path)
            .and_then(|m| m.modified())
            .fs_context("reading metadata", &path)?;
        if latest.as_ref().is_none_or(|(t, _)| modified > *t) {
            latest = Some((modified, path));
        }
    }
    Ok(latest.map(|(_, path)| path))
}

/// First directory (in walk order) below `root` whose name ends with `suffix`
pub fn find_folder_with_suffix(root: &Path, suffix: &str) -> Result<Option<PathBuf>> {
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry?;
        if entry.file_type().is_dir() && file_name(entry.path()).ends_with(suffix) {
            return Ok(Some(entry.into_path()));
        }
    }
    Ok(None)
}

/// Directories below `root` whose name ends with `suffix`, ignoring case.
///
/// Matches are not descended into.
pub fn find_dirs_with_suffix_ci(root: &Path, suffix: &str) -> Result<Vec<PathBuf>> {
    let suffix = suffix.to_ascii_lowercase();
    let mut found = Vec::new();
    let mut walker = WalkDir::new(root).sort_by_file_name().into_iter();
    while let Some(entry) = walker.next() {
        let entry = entry?;
        if entry.file_type().is_dir()
            && file_name(entry.path()).to_ascii_lowercase().ends_with(&suffix)
        {
            found.push(entry.into_path());
            walker.skip_current_dir();
        }
    }
    Ok(found)
}

/// File name as a lossy string (empty when absent)
pub fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Path with a case-insensitive extension check
pub fn has_extension(path: &Path, ext: &str) -> bool {
    path.extension()
        .is_some_and(|e| e.to_string_lossy().eq_ignore_ascii_case(ext))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::time::Duration;

    #[test]
    fn test_build_file_list_sorts_directories_and_keeps_explicit_order() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("nested");
        fs::create_dir_all(&nested).unwrap();
        fs::write(nested.join("b.sym"), "b").unwrap();
        fs::write(nested.join("a.sym"), "a").unwrap();
        let explicit = dir.path().join("z.sym");
        fs::write(&explicit, "z").unwrap();

        let files = build_file_list(&[explicit.clone(), nested.clone()]).unwrap();
        assert_eq!(files, vec![explicit, nested.join("a.sym"), nested.join("b.sym")]);
    }

    #[test]
    fn test_build_file_list_missing_path() {
        let err = build_file_list(&[PathBuf::from("/definitely/not/here")]).unwrap_err();
        assert!(matches!(err, AppError::PathNotFound { .. }));
    }

    #[test]
    fn test_find_latest_file_with_suffix_uses_mtime() {
        let dir = tempfile::tempdir().unwrap();
        let old = dir.path().join("old.aab");
        let new = dir.path().join("sub").join("new.aab");
        fs::create_dir_all(new.parent().unwrap()).unwrap();
        fs::write(&old, "old").unwrap();
        std::thread::sleep(Duration::from_millis(20));
        fs::write(&new, "new").unwrap();
        fs::write(dir.path().join("other.txt"), "x").unwrap();

        let old_time = SystemTime::now() - Duration::from_secs(3600);
        fs::File::options()
            .write(true)
            .open(&old)
            .unwrap()
            .set_modified(old_time)
            .unwrap();

        assert_eq!(find_latest_file_with_suffix(dir.path(), ".aab").unwrap(), Some(new));
        assert_eq!(find_latest_file_with_suffix(dir.path(), ".zip").unwrap(), None);
    }

    #[test]
    fn test_find_dirs_with_suffix_is_case_insensitive() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("A.dSYM/Contents")).unwrap();
        fs::create_dir_all(dir.path().join("b.DSYM")).unwrap();
        fs::create_dir_all(dir.path().join("c.app")).unwrap();

        let found = find_dirs_with_suffix_ci(dir.path(), ".dsym").unwrap();
        assert_eq!(found.len(), 2);
        assert!(found[0].ends_with("A.dSYM"));
    }

    #[test]
    fn test_find_folder_with_suffix() {
        let dir = tempfile::tempdir().unwrap();
        let backup = dir.path().join("Game_BackUpThisFolder_ButDontShipItWithYourGame");
        fs::create_dir_all(&backup).unwrap();
        assert_eq!(
            find_folder_with_suffix(dir.path(), "BackUpThisFolder_ButDontShipItWithYourGame")
                .unwrap(),
            Some(backup)
        );
    }
}
