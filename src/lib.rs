//! # binkit
//!
//! A cross-platform binary-format toolkit for build systems:
//!
//! - format detection across COFF, PE, ELF, Mach-O, `ar`/MSVC `.lib`
//!   archives and WebAssembly
//! - per-format symbol readers with nm-style type letters, plus
//!   archive-level aggregation
//! - dependent-library enumeration and RPATH listing/manipulation for ELF
//!   and Mach-O, DLL imports for PE/COFF
//! - binary-to-object synthesis (`bin2coff`/`bin2elf`/`bin2macho`) that
//!   wraps an arbitrary byte blob in `_binary_<name>_start`/`_end` symbols
//! - archive extraction with collision renaming
//! - a semantic-version engine: parsing, total ordering, range matching
//!   and selection
//!
//! The path-based entry points live in [`tools`]; the per-format modules
//! expose the underlying zero-copy parsers for callers that already hold
//! the bytes.
//!
//! ```no_run
//! # fn run() -> binkit::error::Result<()> {
//! let groups = binkit::tools::readsyms("libfoo.a")?;
//! for group in &groups {
//!     for sym in &group.symbols {
//!         println!("{} {} {}", group.objectfile, sym.kind, sym.name);
//!     }
//! }
//! # Ok(())
//! # }
//! ```

#[macro_use]
extern crate log;
#[macro_use]
extern crate quick_error;

pub mod arch;
pub mod archive;
pub mod container;
pub mod elf;
pub mod error;
pub mod mach;
pub mod pe;
pub mod semver;
pub mod strtab;
pub mod symbol;
pub mod tools;
pub mod wasm;

use scroll::Pread;

/// The file format a probe of the leading bytes identified
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Coff,
    Pe,
    Elf,
    MachO,
    Ar,
    Wasm,
    Unknown,
}

/// Minimum size of the DOS stub preceding a PE image
const PE_DOS_STUB_MIN_SIZE: u32 = 0x40;
/// Offset of `e_lfanew` inside the DOS header
const PE_DOS_LFANEW_OFFSET: usize = 0x3c;
/// How far into the file we will chase `e_lfanew`
const PE_LFANEW_PROBE_MAX: usize = 4096;

impl Format {
    /// The lowercase tag the dispatcher reports for this format
    pub fn name(&self) -> &'static str {
        match self {
            Format::Coff => "coff",
            Format::Pe => "pe",
            Format::Elf => "elf",
            Format::MachO => "macho",
            Format::Ar => "ar",
            Format::Wasm => "wasm",
            Format::Unknown => "unknown",
        }
    }

    /// Identify the format of `bytes` from its leading 8 bytes, following
    /// `e_lfanew` for PE images. First match wins: ar, PE, ELF, Mach-O,
    /// WASM, COFF. Anything shorter than 8 bytes is `Unknown`.
    pub fn detect(bytes: &[u8]) -> Format {
        if bytes.len() < 8 {
            return Format::Unknown;
        }
        let p = &bytes[..8];
        if p[0] == b'!'
            && p[1] == b'<'
            && p[2] == b'a'
            && p[3] == b'r'
            && p[4] == b'c'
            && p[5] == b'h'
            && (p[6] == b'>' || p[6] == b'\n')
            && (p[7] == b'\n' || p[7] == b'\r')
        {
            return Format::Ar;
        }
        if is_pe(bytes) {
            return Format::Pe;
        }
        if p[0] == 0x7f && p[1] == b'E' && p[2] == b'L' && p[3] == b'F' {
            return Format::Elf;
        }
        if is_macho(p) {
            return Format::MachO;
        }
        if p[0] == 0x00 && p[1] == 0x61 && p[2] == 0x73 && p[3] == 0x6d {
            return Format::Wasm;
        }
        if is_coff(p) {
            return Format::Coff;
        }
        Format::Unknown
    }
}

fn is_pe(bytes: &[u8]) -> bool {
    let mz = (bytes[0] == b'M' && bytes[1] == b'Z') || (bytes[0] == b'Z' && bytes[1] == b'M');
    if !mz {
        return false;
    }
    if bytes.len() < PE_DOS_STUB_MIN_SIZE as usize + 4 {
        return false;
    }
    let probe = core::cmp::min(bytes.len(), PE_LFANEW_PROBE_MAX);
    let e_lfanew = match bytes.pread_with::<u32>(PE_DOS_LFANEW_OFFSET, scroll::LE) {
        Ok(e_lfanew) => e_lfanew,
        Err(_) => return false,
    };
    if e_lfanew < PE_DOS_STUB_MIN_SIZE {
        return false;
    }
    let signature_end = e_lfanew as usize + 4;
    if signature_end > probe || signature_end > bytes.len() {
        return false;
    }
    &bytes[e_lfanew as usize..signature_end] == b"PE\0\0"
}

fn is_macho(p: &[u8]) -> bool {
    // thin magics in either byte order, plus the fat magic
    (p[0] == 0xfe && p[1] == 0xed && p[2] == 0xfa && (p[3] == 0xce || p[3] == 0xcf))
        || (p[0] == 0xce && p[1] == 0xfa && p[2] == 0xed && p[3] == 0xfe)
        || (p[0] == 0xcf && p[1] == 0xfa && p[2] == 0xed && p[3] == 0xfe)
        || (p[0] == 0xca && p[1] == 0xfe && p[2] == 0xba && p[3] == 0xbe)
}

fn is_coff(p: &[u8]) -> bool {
    // objects start with a machine type rather than a magic; accept the
    // known machines and the 0x0000/0xffff import-header sentinel
    let machine = u16::from_le_bytes([p[0], p[1]]);
    if machine == 0x0000 {
        let machine2 = u16::from_le_bytes([p[2], p[3]]);
        return machine2 == 0xffff;
    }
    matches!(
        machine,
        arch::coff_machine::IMAGE_FILE_MACHINE_I386
            | arch::coff_machine::IMAGE_FILE_MACHINE_AMD64
            | arch::coff_machine::IMAGE_FILE_MACHINE_ARM
            | arch::coff_machine::IMAGE_FILE_MACHINE_ARM64
    )
}
