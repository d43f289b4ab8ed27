//! The ELF reader and writer.
//!
//! [`Elf::parse`] builds a per-file context: the file offsets and sizes of
//! the dynamic table, `.dynstr`, `.symtab` and `.strtab`, preferring the
//! section-header table and falling back to program headers (translating
//! the `DT_STRTAB` virtual address through `PT_LOAD`) for stripped
//! binaries. The readers for symbols, needed libraries and rpaths all walk
//! from that context; the in-place rpath mutations and `bin2elf` synthesis
//! live in [`writer`].

pub mod dynamic;
pub mod header;
pub mod program_header;
pub mod section_header;
pub mod sym;
pub mod writer;

use crate::container::Ctx;
use crate::error::{Error, Result};
use crate::strtab::Strtab;
use crate::symbol::Symbol;
use scroll::ctx::SizeWith;
use scroll::Pread;

use self::dynamic::Dyn;
use self::header::Header;
use self::program_header::{ProgramHeader, PT_DYNAMIC, PT_INTERP};
use self::section_header::{SectionHeader, SHT_DYNAMIC, SHT_SYMTAB};

/// A parsed ELF context: the header plus every table location the readers
/// need. Offsets are absolute file offsets; a zero offset means the table
/// was not found.
#[derive(Debug, Clone, Copy)]
pub struct Elf {
    pub header: Header,
    pub ctx: Ctx,
    pub is_64: bool,
    /// file offset and size of the dynamic table
    pub dynamic_offset: u64,
    pub dynamic_size: u64,
    /// file offset and size of `.dynstr`
    pub dynstr_offset: u64,
    pub dynstr_size: u64,
    /// file offset and size of `.symtab`
    pub symtab_offset: u64,
    pub symtab_size: u64,
    /// file offset and size of `.strtab` (the one `.symtab` links to)
    pub symstr_offset: u64,
    pub symstr_size: u64,
}

impl Elf {
    /// Parse the header and locate the dynamic, string and symbol tables.
    /// Missing tables leave their offsets at zero; only a bad header is an
    /// error.
    pub fn parse(bytes: &[u8]) -> Result<Elf> {
        let header = Header::parse(bytes)?;
        let ctx = header.ctx()?;
        let mut elf = Elf {
            header,
            ctx,
            is_64: ctx.is_big(),
            dynamic_offset: 0,
            dynamic_size: 0,
            dynstr_offset: 0,
            dynstr_size: 0,
            symtab_offset: 0,
            symtab_size: 0,
            symstr_offset: 0,
            symstr_size: 0,
        };
        elf.locate_from_sections(bytes);
        if elf.dynamic_offset == 0 || elf.dynstr_offset == 0 {
            elf.locate_from_program_headers(bytes);
        }
        Ok(elf)
    }

    fn section_header(&self, bytes: &[u8], index: u32) -> Option<SectionHeader> {
        let size = SectionHeader::size_with(&self.ctx);
        let offset = self.header.e_shoff as usize + index as usize * size;
        bytes.pread_with::<SectionHeader>(offset, self.ctx).ok()
    }

    fn locate_from_sections(&mut self, bytes: &[u8]) {
        if self.header.e_shoff == 0 || self.header.e_shnum == 0 {
            return;
        }
        for i in 0..u32::from(self.header.e_shnum) {
            let section = match self.section_header(bytes, i) {
                Some(section) => section,
                None => break,
            };
            match section.sh_type {
                SHT_DYNAMIC => {
                    self.dynamic_offset = section.sh_offset;
                    self.dynamic_size = section.sh_size;
                    if let Some(strtab) = self.section_header(bytes, section.sh_link) {
                        self.dynstr_offset = strtab.sh_offset;
                        self.dynstr_size = strtab.sh_size;
                    }
                }
                SHT_SYMTAB => {
                    self.symtab_offset = section.sh_offset;
                    self.symtab_size = section.sh_size;
                    if let Some(strtab) = self.section_header(bytes, section.sh_link) {
                        self.symstr_offset = strtab.sh_offset;
                        self.symstr_size = strtab.sh_size;
                    }
                }
                _ => {}
            }
        }
    }

    /// Stripped binaries keep no section headers; recover the dynamic table
    /// from `PT_DYNAMIC` and translate `DT_STRTAB` through the containing
    /// `PT_LOAD` segment.
    fn locate_from_program_headers(&mut self, bytes: &[u8]) {
        let phdrs = self.program_headers(bytes);
        if phdrs.is_empty() {
            return;
        }
        if self.dynamic_offset == 0 {
            if let Some(dynamic) = phdrs.iter().find(|ph| ph.p_type == PT_DYNAMIC) {
                self.dynamic_offset = dynamic.p_offset;
                self.dynamic_size = dynamic.p_memsz;
            }
        }
        if self.dynamic_offset == 0 || self.dynamic_size == 0 {
            return;
        }
        debug!("no .dynstr section, recovering DT_STRTAB from the dynamic table");
        let mut strtab_vaddr = 0u64;
        let mut strtab_size = 0u64;
        for dyn_entry in self.dynamic_entries(bytes) {
            match dyn_entry.d_tag {
                dynamic::DT_STRTAB => strtab_vaddr = dyn_entry.d_val,
                dynamic::DT_STRSZ => strtab_size = dyn_entry.d_val,
                _ => {}
            }
        }
        if strtab_vaddr == 0 {
            return;
        }
        if let Some(load) = phdrs.iter().find(|ph| ph.contains_vaddr(strtab_vaddr)) {
            self.dynstr_offset = load.vaddr_to_offset(strtab_vaddr);
            self.dynstr_size = strtab_size;
        }
    }

    /// Every program header, stopping early on a truncated table
    pub fn program_headers(&self, bytes: &[u8]) -> Vec<ProgramHeader> {
        let mut phdrs = Vec::new();
        if self.header.e_phoff == 0 || self.header.e_phnum == 0 {
            return phdrs;
        }
        let size = ProgramHeader::size_with(&self.ctx);
        for i in 0..usize::from(self.header.e_phnum) {
            let offset = self.header.e_phoff as usize + i * size;
            match bytes.pread_with::<ProgramHeader>(offset, self.ctx) {
                Ok(phdr) => phdrs.push(phdr),
                Err(_) => break,
            }
        }
        phdrs
    }

    /// The dynamic table up to and excluding `DT_NULL`, empty when the file
    /// has none
    pub fn dynamic_entries(&self, bytes: &[u8]) -> Vec<Dyn> {
        let mut dyns = Vec::new();
        if self.dynamic_offset == 0 || self.dynamic_size == 0 {
            return dyns;
        }
        let size = Dyn::size_with(&self.ctx);
        let count = (self.dynamic_size as usize) / size;
        for i in 0..count {
            let offset = self.dynamic_offset as usize + i * size;
            let dyn_entry = match bytes.pread_with::<Dyn>(offset, self.ctx) {
                Ok(dyn_entry) => dyn_entry,
                Err(_) => break,
            };
            if dyn_entry.d_tag == dynamic::DT_NULL {
                break;
            }
            dyns.push(dyn_entry);
        }
        dyns
    }

    fn dynstr<'a>(&self, bytes: &'a [u8]) -> Option<Strtab<'a>> {
        if self.dynstr_offset == 0 {
            return None;
        }
        Strtab::parse(bytes, self.dynstr_offset as usize, self.dynstr_size as usize, 0).ok()
    }

    /// Read `.symtab`, skipping section/file symbols, empties, compiler
    /// locals (`.`/`$` prefixes) and local symbols in defined sections
    pub fn symbols(&self, bytes: &[u8]) -> Result<Vec<Symbol>> {
        let mut symbols = Vec::new();
        if self.symtab_offset == 0 || self.symstr_offset == 0 {
            return Ok(symbols);
        }
        let strtab = Strtab::parse(bytes, self.symstr_offset as usize, self.symstr_size as usize, 0)?;
        let size = sym::Sym::size_with(&self.ctx);
        let count = (self.symtab_size as usize) / size;
        for i in 0..count {
            let offset = self.symtab_offset as usize + i * size;
            let sym: sym::Sym = match bytes.pread_with(offset, self.ctx) {
                Ok(sym) => sym,
                Err(_) => {
                    return Err(Error::Malformed(format!(
                        "symtab entry {} at {:#x} extends past the end of the file",
                        i, offset
                    )))
                }
            };
            if sym.st_name == 0 && sym.st_value == 0 && sym.st_size == 0 {
                continue;
            }
            let typ = sym.st_type();
            if typ == sym::STT_SECTION || typ == sym::STT_FILE {
                continue;
            }
            let name = match strtab.get_at(sym.st_name as usize) {
                Some(name) if !name.is_empty() => name,
                _ => continue,
            };
            if name.starts_with('.') || name.starts_with('$') {
                continue;
            }
            if sym.st_bind() == sym::STB_LOCAL && !sym.is_undefined() {
                continue;
            }
            let mut symbol = Symbol::new(name, sym.type_char());
            symbol.value = Some(sym.st_value);
            symbol.section = Some(i32::from(sym.st_shndx as i16));
            symbols.push(symbol);
        }
        Ok(symbols)
    }

    /// The program interpreter (if any) followed by every `DT_NEEDED`,
    /// `DT_SONAME`, `DT_AUXILIARY` and `DT_FILTER` string
    pub fn libraries(&self, bytes: &[u8]) -> Result<Vec<String>> {
        let mut libs = Vec::new();
        if let Some(interp) = self.interpreter(bytes) {
            libs.push(interp);
        }
        let strtab = match self.dynstr(bytes) {
            Some(strtab) => strtab,
            None => return Ok(libs),
        };
        for dyn_entry in self.dynamic_entries(bytes) {
            match dyn_entry.d_tag {
                dynamic::DT_NEEDED
                | dynamic::DT_SONAME
                | dynamic::DT_AUXILIARY
                | dynamic::DT_FILTER => {
                    if let Some(name) = strtab.get_at(dyn_entry.d_val as usize) {
                        if !name.is_empty() {
                            libs.push(name.to_string());
                        }
                    }
                }
                _ => {}
            }
        }
        Ok(libs)
    }

    /// The `PT_INTERP` path, when present and non-empty
    pub fn interpreter(&self, bytes: &[u8]) -> Option<String> {
        let interp = self
            .program_headers(bytes)
            .into_iter()
            .find(|ph| ph.p_type == PT_INTERP)?;
        let offset = interp.p_offset as usize;
        if offset >= bytes.len() {
            return None;
        }
        let path = bytes
            .pread_with::<&str>(offset, scroll::ctx::StrCtx::DelimiterUntil(0, bytes.len() - offset))
            .ok()?;
        if path.is_empty() {
            None
        } else {
            Some(path.to_string())
        }
    }

    /// Colon-split rpath entries. `DT_RUNPATH` shadows `DT_RPATH` when both
    /// are present, per the ELF standard.
    pub fn rpaths(&self, bytes: &[u8]) -> Result<Vec<String>> {
        let strtab = match self.dynstr(bytes) {
            Some(strtab) => strtab,
            None => return Ok(Vec::new()),
        };
        let mut rpath = String::new();
        let mut runpath = String::new();
        for dyn_entry in self.dynamic_entries(bytes) {
            match dyn_entry.d_tag {
                dynamic::DT_RPATH => {
                    if let Some(s) = strtab.get_at(dyn_entry.d_val as usize) {
                        rpath = s.to_string();
                    }
                }
                dynamic::DT_RUNPATH => {
                    if let Some(s) = strtab.get_at(dyn_entry.d_val as usize) {
                        runpath = s.to_string();
                    }
                }
                _ => {}
            }
        }
        let chosen = if !runpath.is_empty() { runpath } else { rpath };
        Ok(split_rpath(&chosen))
    }
}

/// Split a colon list, dropping empty elements
pub(crate) fn split_rpath(rpath: &str) -> Vec<String> {
    rpath
        .split(':')
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_drops_empty_elements() {
        assert_eq!(
            split_rpath("/usr/lib::$ORIGIN/../lib"),
            vec!["/usr/lib".to_string(), "$ORIGIN/../lib".to_string()]
        );
        assert!(split_rpath("").is_empty());
    }

    #[test]
    fn parses_writer_output_context() {
        let object = writer::write_object(b"hi", &crate::tools::BinObjectOptions::default()).unwrap();
        let elf = Elf::parse(&object).unwrap();
        assert!(elf.is_64);
        assert_eq!(elf.header.e_shnum, 6);
        assert!(elf.symtab_offset != 0);
        assert!(elf.symstr_offset != 0);
    }
}
