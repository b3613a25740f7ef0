//! ELF architecture, GNU build id and symbol-file detection.

use crate::error::{AppError, ErrorExt, FormatError, Result};
use goblin::elf::Elf;
use goblin::elf::header::{EM_386, EM_AARCH64, EM_ARM, EM_X86_64, machine_to_str};
use goblin::elf::program_header::PT_NOTE;
use std::path::Path;

const NT_GNU_BUILD_ID: u32 = 3;
const NOTE_HEADER_LEN: usize = 12;

/// CPU architecture of an ELF file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Arch {
    /// One of arm64, x86, x86_64, armv7
    Known(&'static str),
    /// Raw machine name for anything else
    Unknown(String),
}

impl Arch {
    /// Name used in upload fields and dwarfdump lookups
    pub fn as_str(&self) -> &str {
        match self {
            Arch::Known(name) => name,
            Arch::Unknown(name) => name,
        }
    }
}

fn read(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).fs_context("reading ELF file", path)
}

fn parse<'a>(bytes: &'a [u8], path: &Path) -> Result<Elf<'a>> {
    Elf::parse(bytes).map_err(|e| {
        AppError::Format(FormatError::InvalidElf {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    })
}

/// Map an ELF machine to an architecture name
pub fn arch_for_machine(machine: u16) -> Arch {
    match machine {
        EM_AARCH64 => Arch::Known("arm64"),
        EM_386 => Arch::Known("x86"),
        EM_X86_64 => Arch::Known("x86_64"),
        EM_ARM => Arch::Known("armv7"),
        other => Arch::Unknown(machine_to_str(other).to_string()),
    }
}

/// Architecture of the ELF file at `path`.
///
/// Unrecognised machines come back as [`Arch::Unknown`] for the caller to
/// report.
pub fn arch(path: &Path) -> Result<Arch> {
    let bytes = read(path)?;
    let elf = parse(&bytes, path)?;
    Ok(arch_for_machine(elf.header.e_machine))
}

/// Hex-encoded GNU build id of the ELF file at `path`.
///
/// Fails with `NotFound` when the file carries no build id note.
pub fn build_id(path: &Path) -> Result<String> {
    let bytes = read(path)?;
    let elf = parse(&bytes, path)?;

    for header in elf.program_headers.iter().filter(|h| h.p_type == PT_NOTE) {
        let start = header.p_offset as usize;
        let end = start.saturating_add(header.p_filesz as usize);
        let Some(segment) = bytes.get(start..end) else {
            continue;
        };
        if let Some(id) = find_gnu_build_id(segment) {
            return Ok(id);
        }
    }

    Err(AppError::NotFound {
        what: format!("GNU build id in {}", path.display()),
    })
}

/// Scan a note segment for an `NT_GNU_BUILD_ID` note
pub(crate) fn find_gnu_build_id(data: &[u8]) -> Option<String> {
    let word = |at: usize| -> Option<usize> {
        let raw: [u8; 4] = data.get(at..at + 4)?.try_into().ok()?;
        Some(u32::from_le_bytes(raw) as usize)
    };

    let mut offset = 0;
    while offset + NOTE_HEADER_LEN <= data.len() {
        let namesz = word(offset)?;
        let descsz = word(offset + 4)?;
        let note_type = word(offset + 8)? as u32;
        offset += NOTE_HEADER_LEN;

        let name = data.get(offset..offset.checked_add(namesz)?)?;
        offset += align4(namesz);
        let desc = data.get(offset..offset.checked_add(descsz)?)?;
        offset += align4(descsz);

        let name = name.strip_suffix(&[0]).unwrap_or(name);
        if name == b"GNU" && note_type == NT_GNU_BUILD_ID {
            return Some(hex::encode(desc));
        }
    }
    None
}

fn align4(n: usize) -> usize {
    (n + 3) & !3
}

/// True for ELF files that carry a symbol table or DWARF sections
pub fn is_symbol_file(path: &Path) -> bool {
    let Ok(bytes) = std::fs::read(path) else {
        return false;
    };
    let Ok(elf) = Elf::parse(&bytes) else {
        return false;
    };
    elf.section_headers.iter().any(|section| {
        elf.shdr_strtab
            .get_at(section.sh_name)
            .is_some_and(|name| name == ".symtab" || name.starts_with(".debug"))
    })
}
