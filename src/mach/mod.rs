//! The Mach-O reader and writer.
//!
//! [`MachO::parse`] identifies one of the four thin magics (32/64 bit,
//! either byte order) and yields an iterator-style walk over the load
//! commands; symbols, dylib dependencies and rpaths read from there. Fat
//! containers are recognised by the detector but not sliced. The in-place
//! rpath mutations and `bin2macho` synthesis live in [`writer`].

pub mod header;
pub mod load_command;
pub mod symbols;
pub mod writer;

use crate::container::Ctx;
use crate::error::{Error, Result};
use crate::symbol::Symbol;
use scroll::ctx::SizeWith;
use scroll::Pread;

use self::header::Header;
use self::load_command::{
    DylibCommand, LoadCommandHeader, RpathCommand, SymtabCommand, LC_ID_DYLIB, LC_LOAD_DYLIB,
    LC_LOAD_WEAK_DYLIB, LC_REEXPORT_DYLIB, LC_RPATH, LC_SEGMENT, LC_SEGMENT_64, LC_SYMTAB,
    SIZEOF_LOAD_COMMAND,
};
use self::symbols::Nlist;

/// A load command paired with its absolute file offset
#[derive(Debug, Clone, Copy)]
pub struct LoadCommand {
    pub offset: usize,
    pub header: LoadCommandHeader,
}

/// A parsed thin Mach-O binary
#[derive(Debug, Clone, Copy)]
pub struct MachO {
    pub header: Header,
    pub ctx: Ctx,
    pub is_64: bool,
}

impl MachO {
    pub fn parse(bytes: &[u8]) -> Result<MachO> {
        let (header, ctx) = Header::parse(bytes)?;
        Ok(MachO {
            header,
            ctx,
            is_64: ctx.is_big(),
        })
    }

    /// Walk the `ncmds` load commands following the header. A command whose
    /// `cmdsize` is smaller than the command header is malformed; the walk
    /// stops at the first truncated command.
    pub fn load_commands(&self, bytes: &[u8]) -> Result<Vec<LoadCommand>> {
        let mut cmds = Vec::with_capacity(self.header.ncmds as usize);
        let mut offset = Header::size(&self.ctx);
        for i in 0..self.header.ncmds {
            let lc: LoadCommandHeader = bytes.pread_with(offset, self.ctx.le).map_err(|_| {
                Error::Malformed(format!("load command {} at {:#x} is truncated", i, offset))
            })?;
            if (lc.cmdsize as usize) < SIZEOF_LOAD_COMMAND {
                return Err(Error::Malformed(format!(
                    "load command {} at {:#x} has impossible size {}",
                    i, offset, lc.cmdsize
                )));
            }
            cmds.push(LoadCommand { offset, header: lc });
            offset += lc.cmdsize as usize;
        }
        Ok(cmds)
    }

    /// Read the `LC_SYMTAB` nlists, mapped to nm-style letters by the
    /// section-number heuristic; empty names are skipped
    pub fn symbols(&self, bytes: &[u8]) -> Result<Vec<Symbol>> {
        let mut syms = Vec::new();
        let symtab = match self.find_symtab(bytes)? {
            Some(symtab) => symtab,
            None => return Ok(syms),
        };
        let nlist_size = Nlist::size_with(&self.ctx);
        for i in 0..symtab.nsyms as usize {
            let offset = symtab.symoff as usize + i * nlist_size;
            let nlist: Nlist = match bytes.pread_with(offset, self.ctx) {
                Ok(nlist) => nlist,
                Err(_) => break,
            };
            let name = match read_strtab_str(bytes, symtab, nlist.n_strx) {
                Some(name) if !name.is_empty() => name,
                _ => continue,
            };
            let mut symbol = Symbol::new(name, nlist.type_char());
            symbol.value = Some(nlist.n_value);
            symbol.section = Some(i32::from(nlist.n_sect));
            syms.push(symbol);
        }
        Ok(syms)
    }

    fn find_symtab(&self, bytes: &[u8]) -> Result<Option<SymtabCommand>> {
        for lc in self.load_commands(bytes)? {
            if lc.header.cmd == LC_SYMTAB {
                let symtab: SymtabCommand = bytes.pread_with(lc.offset, self.ctx.le)?;
                return Ok(Some(symtab));
            }
        }
        Ok(None)
    }

    /// The path of every `LC_LOAD_DYLIB`, `LC_ID_DYLIB`,
    /// `LC_LOAD_WEAK_DYLIB` and `LC_REEXPORT_DYLIB` command
    pub fn libraries(&self, bytes: &[u8]) -> Result<Vec<String>> {
        let mut libs = Vec::new();
        for lc in self.load_commands(bytes)? {
            match lc.header.cmd {
                LC_LOAD_DYLIB | LC_ID_DYLIB | LC_LOAD_WEAK_DYLIB | LC_REEXPORT_DYLIB => {
                    let dylib: DylibCommand = bytes.pread_with(lc.offset, self.ctx.le)?;
                    if let Some(path) = read_command_str(bytes, &lc, dylib.dylib.name) {
                        libs.push(path);
                    }
                }
                _ => {}
            }
        }
        Ok(libs)
    }

    /// The path of every `LC_RPATH` command
    pub fn rpaths(&self, bytes: &[u8]) -> Result<Vec<String>> {
        let mut rpaths = Vec::new();
        for lc in self.load_commands(bytes)? {
            if lc.header.cmd == LC_RPATH {
                let rpath: RpathCommand = bytes.pread_with(lc.offset, self.ctx.le)?;
                if let Some(path) = read_command_str(bytes, &lc, rpath.path) {
                    rpaths.push(path);
                }
            }
        }
        Ok(rpaths)
    }

    /// The lowest file offset referenced by any section of any segment, the
    /// boundary new load commands must not cross
    pub fn find_low_fileoff(&self, bytes: &[u8]) -> Result<Option<u64>> {
        use self::load_command::{
            Section32, Section64, SegmentCommand32, SegmentCommand64, SIZEOF_SECTION_32,
            SIZEOF_SECTION_64, SIZEOF_SEGMENT_COMMAND_32, SIZEOF_SEGMENT_COMMAND_64,
        };
        let mut low: Option<u64> = None;
        let mut observe = |offset: u64| {
            if offset > 0 && low.map_or(true, |low| offset < low) {
                low = Some(offset);
            }
        };
        for lc in self.load_commands(bytes)? {
            match lc.header.cmd {
                LC_SEGMENT => {
                    let seg: SegmentCommand32 = bytes.pread_with(lc.offset, self.ctx.le)?;
                    let mut offset = lc.offset + SIZEOF_SEGMENT_COMMAND_32;
                    for _ in 0..seg.nsects {
                        let section: Section32 = bytes.pread_with(offset, self.ctx.le)?;
                        observe(u64::from(section.offset));
                        offset += SIZEOF_SECTION_32;
                    }
                }
                LC_SEGMENT_64 => {
                    let seg: SegmentCommand64 = bytes.pread_with(lc.offset, self.ctx.le)?;
                    let mut offset = lc.offset + SIZEOF_SEGMENT_COMMAND_64;
                    for _ in 0..seg.nsects {
                        let section: Section64 = bytes.pread_with(offset, self.ctx.le)?;
                        observe(u64::from(section.offset));
                        offset += SIZEOF_SECTION_64;
                    }
                }
                _ => {}
            }
        }
        Ok(low)
    }
}

/// Read the NUL-terminated string a load command embeds at `str_offset`
/// from its own start, bounded by the command size
fn read_command_str(bytes: &[u8], lc: &LoadCommand, str_offset: u32) -> Option<String> {
    let str_offset = str_offset as usize;
    if str_offset >= lc.header.cmdsize as usize {
        return None;
    }
    let start = lc.offset + str_offset;
    let end = (lc.offset + lc.header.cmdsize as usize).min(bytes.len());
    if start >= end {
        return None;
    }
    let region = &bytes[start..end];
    let len = region.iter().position(|&b| b == 0).unwrap_or(region.len());
    if len == 0 {
        return None;
    }
    core::str::from_utf8(&region[..len]).ok().map(str::to_string)
}

/// Resolve `n_strx` against the symtab command's string table. The index
/// is relative to the table start; index 0 conventionally means no name.
fn read_strtab_str(bytes: &[u8], symtab: SymtabCommand, n_strx: u32) -> Option<String> {
    if n_strx as usize >= symtab.strsize as usize {
        return None;
    }
    let start = symtab.stroff as usize + n_strx as usize;
    let end = (symtab.stroff as usize + symtab.strsize as usize).min(bytes.len());
    if start >= end {
        return None;
    }
    let region = &bytes[start..end];
    let len = region.iter().position(|&b| b == 0).unwrap_or(region.len());
    core::str::from_utf8(&region[..len]).ok().map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::BinObjectOptions;

    #[test]
    fn reads_back_writer_symbols() {
        let opts = BinObjectOptions {
            arch: Some("arm64".into()),
            basename: Some("blob".into()),
            ..Default::default()
        };
        let object = writer::write_object(b"data!", &opts).unwrap();
        let macho = MachO::parse(&object).unwrap();
        assert!(macho.is_64);
        let symbols = macho.symbols(&object).unwrap();
        assert_eq!(symbols.len(), 2);
        assert_eq!(symbols[0].name, "__binary_blob_start");
        assert_eq!(symbols[0].kind, 'T');
        assert_eq!(symbols[1].name, "__binary_blob_end");
        assert_eq!(symbols[1].value, Some(5));
    }
}
