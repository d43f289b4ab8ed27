//! The import directory walk used by `deplibs`: find `.idata`, iterate
//! `IMAGE_IMPORT_DESCRIPTOR` records until the all-zero terminator, and
//! resolve each DLL-name RVA to a file offset.

use crate::error::Result;
use crate::pe::section_table::SectionTable;
use scroll::{Pread, Pwrite, SizeWith};

#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pread, Pwrite, SizeWith)]
pub struct ImportDirectoryEntry {
    /// RVA of the unbound import lookup table
    pub import_lookup_table_rva: u32,
    pub time_date_stamp: u32,
    pub forwarder_chain: u32,
    /// RVA of the NUL-terminated DLL name
    pub name_rva: u32,
    /// RVA of the import address table
    pub import_address_table_rva: u32,
}

pub const SIZEOF_IMPORT_DIRECTORY_ENTRY: usize = 20;

impl ImportDirectoryEntry {
    pub fn is_null(&self) -> bool {
        self.import_lookup_table_rva == 0 && self.name_rva == 0
    }
}

/// Walk the import directory found in `idata`, pushing each referenced DLL
/// name. `base` is the COFF base offset (zero for objects, `e_lfanew + 4`
/// for PE images); every file offset in the walk is taken relative to it.
pub fn walk(
    bytes: &[u8],
    base: usize,
    idata: &SectionTable,
    sections: &[SectionTable],
) -> Result<Vec<String>> {
    let mut dlls = Vec::new();
    let mut offset = base + idata.pointer_to_raw_data as usize;
    loop {
        let entry: ImportDirectoryEntry = match bytes.pread_with(offset, scroll::LE) {
            Ok(entry) => entry,
            Err(_) => break,
        };
        if entry.is_null() {
            break;
        }
        offset += SIZEOF_IMPORT_DIRECTORY_ENTRY;
        if entry.name_rva == 0 {
            continue;
        }
        // the name usually lives in .idata itself; scan the other sections
        // when it does not
        let file_offset = if idata.contains_rva(entry.name_rva) {
            Some(idata.rva_to_offset(entry.name_rva))
        } else {
            sections
                .iter()
                .find(|s| s.contains_rva(entry.name_rva))
                .map(|s| s.rva_to_offset(entry.name_rva))
        };
        let file_offset = match file_offset {
            Some(file_offset) => base + file_offset as usize,
            None => continue,
        };
        if let Some(name) = read_cstr(bytes, file_offset) {
            if !name.is_empty() {
                dlls.push(name);
            }
        }
    }
    Ok(dlls)
}

fn read_cstr(bytes: &[u8], offset: usize) -> Option<String> {
    if offset >= bytes.len() {
        return None;
    }
    let region = &bytes[offset..];
    let len = region.iter().position(|&b| b == 0).unwrap_or(region.len());
    core::str::from_utf8(&region[..len]).ok().map(str::to_string)
}
