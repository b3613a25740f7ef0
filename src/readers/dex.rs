//! Android build id derived from DEX header signatures.
//!
//! A DEX header starts with an 8 byte magic, a 4 byte checksum and a 20 byte
//! SHA-1 signature. The app signature XORs the signatures of `classes.dex`,
//! `classes2.dex`, ... together, so it does not depend on file order.

use crate::error::{AppError, ErrorExt, FormatError, Result};
use std::io::Read;
use std::path::{Path, PathBuf};

const MAGIC_LEN: usize = 8;
const CHECKSUM_LEN: usize = 4;
const SIGNATURE_START: usize = MAGIC_LEN + CHECKSUM_LEN;

/// Length of the SHA-1 signature in a DEX header
pub const SIGNATURE_LEN: usize = 20;

/// Bytes read from the start of each DEX file
pub const HEADER_LEN: usize = SIGNATURE_START + SIGNATURE_LEN;

/// A DEX signature, or the XOR of several
pub type Signature = [u8; SIGNATURE_LEN];

/// Check the `dex\n???\0` magic
pub fn validate_header(header: &[u8], path: &Path) -> Result<()> {
    let magic_ok = header.len() >= MAGIC_LEN && header.starts_with(b"dex\n") && header[7] == 0;
    if magic_ok {
        Ok(())
    } else {
        Err(invalid(
            path,
            format!(
                "bad magic number {}",
                hex::encode(&header[..header.len().min(MAGIC_LEN)])
            ),
        ))
    }
}

/// Read and validate the signature of one DEX file
pub fn read_signature(path: &Path) -> Result<Signature> {
    let mut file = std::fs::File::open(path).fs_context("opening dex file", path)?;
    let mut header = Vec::with_capacity(HEADER_LEN);
    (&mut file)
        .take(HEADER_LEN as u64)
        .read_to_end(&mut header)
        .fs_context("reading dex header", path)?;

    if header.len() != HEADER_LEN {
        return Err(invalid(
            path,
            format!(
                "expected a {HEADER_LEN} byte header but could only read {} bytes",
                header.len()
            ),
        ));
    }
    validate_header(&header, path)?;

    let mut signature = [0u8; SIGNATURE_LEN];
    signature.copy_from_slice(&header[SIGNATURE_START..HEADER_LEN]);
    Ok(signature)
}

/// Byte-wise XOR of two signatures
pub fn merge_signatures(acc: &Signature, other: &Signature) -> Signature {
    let mut out = [0u8; SIGNATURE_LEN];
    for (i, byte) in out.iter_mut().enumerate() {
        *byte = acc[i] ^ other[i];
    }
    out
}

/// `classes.dex`, `classes2.dex`, ... in `dir`, stopping at the first gap
pub fn classes_dex_files(dir: &Path) -> Vec<PathBuf> {
    let first = dir.join("classes.dex");
    if !first.is_file() {
        return Vec::new();
    }
    let mut files = vec![first];
    for index in 2.. {
        let next = dir.join(format!("classes{index}.dex"));
        if !next.is_file() {
            break;
        }
        files.push(next);
    }
    files
}

/// Expand directories into their `classesN.dex` files; keep explicit `.dex` files
pub fn collect_dex_files(paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for path in paths {
        crate::files::ensure_exists(path)?;
        if path.is_dir() {
            files.extend(classes_dex_files(path));
        } else if crate::files::has_extension(path, "dex") {
            files.push(path.clone());
        } else {
            return Err(AppError::invalid(format!(
                "not a classesN.dex file: {}",
                path.display()
            )));
        }
    }
    Ok(files)
}

/// XOR of the signatures of every file, starting from zero
pub fn app_signature(files: &[PathBuf]) -> Result<Signature> {
    let mut acc = [0u8; SIGNATURE_LEN];
    for file in files {
        acc = merge_signatures(&acc, &read_signature(file)?);
    }
    Ok(acc)
}

/// Lower-case hex app signature, or `None` when `files` is empty
pub fn build_id(files: &[PathBuf]) -> Result<Option<String>> {
    if files.is_empty() {
        return Ok(None);
    }
    Ok(Some(hex::encode(app_signature(files)?)))
}

/// Build id of the `classesN.dex` files in `dir`
pub fn build_id_from_dir(dir: &Path) -> Result<Option<String>> {
    build_id(&classes_dex_files(dir))
}

fn invalid(path: &Path, reason: String) -> AppError {
    AppError::Format(FormatError::InvalidDex {
        path: path.to_path_buf(),
        reason,
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn dex_bytes(fill: u8) -> Vec<u8> {
        let mut bytes = b"dex\n035\0".to_vec();
        bytes.extend_from_slice(&[0xAA; CHECKSUM_LEN]);
        bytes.extend_from_slice(&[fill; SIGNATURE_LEN]);
        bytes.extend_from_slice(&[0u8; 80]);
        bytes
    }

    pub(crate) fn write_dex(path: &Path, fill: u8) {
        std::fs::write(path, dex_bytes(fill)).unwrap();
    }

    #[test]
    fn test_two_files_xor_to_expected_hex() {
        let dir = tempfile::tempdir().unwrap();
        write_dex(&dir.path().join("classes.dex"), 0x01);
        write_dex(&dir.path().join("classes2.dex"), 0x03);

        let id = build_id_from_dir(dir.path()).unwrap();
        assert_eq!(id, Some("02".repeat(20)));
    }

    #[test]
    fn test_order_does_not_matter() {
        let dir = tempfile::tempdir().unwrap();
        let paths: Vec<PathBuf> = [0x11u8, 0x5A, 0xF0]
            .iter()
            .enumerate()
            .map(|(i, fill)| {
                let p = dir.path().join(format!("f{i}.dex"));
                write_dex(&p, *fill);
                p
            })
            .collect();
        let mut reversed = paths.clone();
        reversed.reverse();
        assert_eq!(app_signature(&paths).unwrap(), app_signature(&reversed).unwrap());
    }

    #[test]
    fn test_numbering_stops_at_first_gap() {
        let dir = tempfile::tempdir().unwrap();
        write_dex(&dir.path().join("classes.dex"), 0x01);
        write_dex(&dir.path().join("classes2.dex"), 0x02);
        write_dex(&dir.path().join("classes4.dex"), 0x04);
        assert_eq!(classes_dex_files(dir.path()).len(), 2);
    }

    #[test]
    fn test_version_bytes_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("classes.dex");
        let mut bytes = b"dex\n039\0".to_vec();
        bytes.extend_from_slice(&[0u8; CHECKSUM_LEN]);
        bytes.extend_from_slice(&[0x7F; SIGNATURE_LEN]);
        std::fs::write(&path, bytes).unwrap();
        assert_eq!(read_signature(&path).unwrap(), [0x7F; SIGNATURE_LEN]);
    }

    #[test]
    fn test_bad_magic_is_invalid_dex() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("classes.dex");
        let mut bytes = b"dey\n035\0".to_vec();
        bytes.extend_from_slice(&[0u8; 24]);
        std::fs::write(&path, &bytes).unwrap();
        assert!(matches!(
            read_signature(&path),
            Err(AppError::Format(FormatError::InvalidDex { .. }))
        ));

        bytes[0] = b'd';
        bytes[2] = b'x';
        bytes[7] = 1;
        std::fs::write(&path, &bytes).unwrap();
        assert!(read_signature(&path).is_err());
    }

    #[test]
    fn test_short_file_is_invalid_dex() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("classes.dex");
        std::fs::write(&path, b"dex\n035\0").unwrap();
        assert!(matches!(
            read_signature(&path),
            Err(AppError::Format(FormatError::InvalidDex { .. }))
        ));
    }

    #[test]
    fn test_collect_rejects_other_files() {
        let dir = tempfile::tempdir().unwrap();
        let other = dir.path().join("classes.jar");
        std::fs::write(&other, "x").unwrap();
        assert!(collect_dex_files(&[other]).is_err());
        assert!(build_id(&[]).unwrap().is_none());
    }
}
