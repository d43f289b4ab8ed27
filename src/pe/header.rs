//! The COFF file header, shared by object files and (behind the DOS stub
//! and `PE\0\0` signature) PE images.

use crate::error::{Error, Result};
use scroll::{Pread, Pwrite, SizeWith};

/// `MZ`, the DOS header magic
pub const DOS_MAGIC: u16 = 0x5a4d;
/// Byte-swapped `MZ`, also accepted by loaders
pub const DOS_MAGIC_ZM: u16 = 0x4d5a;
/// Offset of `e_lfanew` inside the DOS header
pub const PE_POINTER_OFFSET: usize = 0x3c;
/// `PE\0\0`
pub const PE_MAGIC: &[u8; 4] = b"PE\0\0";

#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pread, Pwrite, SizeWith)]
pub struct CoffHeader {
    pub machine: u16,
    pub number_of_sections: u16,
    pub time_date_stamp: u32,
    /// file offset of the symbol table; the string table follows it
    pub pointer_to_symbol_table: u32,
    /// number of symbol table entries, auxiliary entries included
    pub number_of_symbols: u32,
    pub size_of_optional_header: u16,
    pub characteristics: u16,
}

pub const SIZEOF_COFF_HEADER: usize = 20;

impl CoffHeader {
    pub fn parse(bytes: &[u8], offset: usize) -> Result<CoffHeader> {
        bytes.pread_with(offset, scroll::LE).map_err(|_| {
            Error::Malformed(format!("COFF header at {:#x} extends past the end of the file", offset))
        })
    }
}

/// For a PE image, the file offset of the COFF header: `e_lfanew` plus the
/// four signature bytes. Fails when the signature is absent.
pub fn coff_offset_of_pe(bytes: &[u8]) -> Result<usize> {
    let e_lfanew: u32 = bytes.pread_with(PE_POINTER_OFFSET, scroll::LE)?;
    let signature_offset = e_lfanew as usize;
    if signature_offset + 4 > bytes.len() {
        return Err(Error::Malformed(format!(
            "e_lfanew {:#x} extends past the end of the file",
            e_lfanew
        )));
    }
    if &bytes[signature_offset..signature_offset + 4] != PE_MAGIC {
        return Err(Error::BadMagic(u64::from(
            bytes.pread_with::<u32>(signature_offset, scroll::LE)?,
        )));
    }
    Ok(signature_offset + 4)
}
