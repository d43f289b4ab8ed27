//! The COFF/PE reader and writer.
//!
//! Plain COFF objects parse at base offset zero; PE images route through
//! [`header::coff_offset_of_pe`] so the same walkers run against the COFF
//! header behind the DOS stub. `bin2coff` synthesis lives in [`writer`].

pub mod header;
pub mod import;
pub mod section_table;
pub mod symbol;
pub mod writer;

use crate::error::Result;
use crate::symbol::Symbol as NmSymbol;
use scroll::Pread;

use self::header::{CoffHeader, SIZEOF_COFF_HEADER};
use self::section_table::{SectionTable, SIZEOF_SECTION_TABLE};
use self::symbol::{Symbol, SIZEOF_SYMBOL};

/// A parsed COFF object (or the COFF view of a PE image)
#[derive(Debug, Clone, Copy)]
pub struct Coff {
    pub header: CoffHeader,
    /// base file offset of the COFF header: zero for objects,
    /// `e_lfanew + 4` for PE images
    pub base: usize,
}

impl Coff {
    pub fn parse(bytes: &[u8]) -> Result<Coff> {
        Coff::parse_at(bytes, 0)
    }

    pub fn parse_at(bytes: &[u8], base: usize) -> Result<Coff> {
        let header = CoffHeader::parse(bytes, base)?;
        Ok(Coff { header, base })
    }

    /// Parse a PE image by chasing `e_lfanew` to the COFF header behind the
    /// signature
    pub fn parse_pe(bytes: &[u8]) -> Result<Coff> {
        let base = header::coff_offset_of_pe(bytes)?;
        Coff::parse_at(bytes, base)
    }

    /// The section table, following the header and any optional header
    pub fn sections(&self, bytes: &[u8]) -> Result<Vec<SectionTable>> {
        let mut sections = Vec::with_capacity(self.header.number_of_sections as usize);
        let mut offset =
            self.base + SIZEOF_COFF_HEADER + self.header.size_of_optional_header as usize;
        for _ in 0..self.header.number_of_sections {
            let section: SectionTable = match bytes.pread_with(offset, scroll::LE) {
                Ok(section) => section,
                Err(_) => break,
            };
            sections.push(section);
            offset += SIZEOF_SECTION_TABLE;
        }
        Ok(sections)
    }

    /// Walk the symbol table, resolving long names against the string table
    /// that follows it and skipping auxiliary records via `naux`
    pub fn symbols(&self, bytes: &[u8]) -> Result<Vec<NmSymbol>> {
        let mut symbols = Vec::new();
        if self.header.number_of_symbols == 0 || self.header.pointer_to_symbol_table == 0 {
            return Ok(symbols);
        }
        let sections = self.sections(bytes)?;
        let symtab_offset = self.base + self.header.pointer_to_symbol_table as usize;
        let strtab_offset =
            symtab_offset + self.header.number_of_symbols as usize * SIZEOF_SYMBOL;
        let mut index = 0usize;
        while index < self.header.number_of_symbols as usize {
            let offset = symtab_offset + index * SIZEOF_SYMBOL;
            let sym: Symbol = match bytes.pread_with(offset, scroll::LE) {
                Ok(sym) => sym,
                Err(_) => break,
            };
            index += 1 + sym.number_of_aux_symbols as usize;
            let name = match sym.name(bytes, strtab_offset)? {
                Some(name) if !name.is_empty() => name,
                _ => continue,
            };
            let mut symbol = NmSymbol::new(name, sym.type_char(&sections));
            symbol.value = Some(u64::from(sym.value));
            symbol.section = Some(i32::from(sym.section_number));
            symbol.storage_class = Some(sym.storage_class);
            symbols.push(symbol);
        }
        Ok(symbols)
    }

    /// DLL names from the import directory in `.idata`; an empty list when
    /// the section is absent
    pub fn import_libraries(&self, bytes: &[u8]) -> Result<Vec<String>> {
        let sections = self.sections(bytes)?;
        let idata = match sections.iter().find(|s| s.name().starts_with(".idata")) {
            Some(idata) => idata,
            None => {
                debug!("no .idata section, no import directory to walk");
                return Ok(Vec::new());
            }
        };
        import::walk(bytes, self.base, idata, &sections)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::BinObjectOptions;

    #[test]
    fn reads_back_writer_symbols() {
        let opts = BinObjectOptions {
            arch: Some("x86_64".into()),
            basename: Some("blob".into()),
            ..Default::default()
        };
        let object = writer::write_object(b"abc", &opts).unwrap();
        let coff = Coff::parse(&object).unwrap();
        assert_eq!(coff.header.number_of_sections, 1);
        assert_eq!(coff.header.number_of_symbols, 4);
        let symbols = coff.symbols(&object).unwrap();
        // the .rdata section symbol plus the two blob markers
        assert_eq!(symbols.len(), 3);
        assert_eq!(symbols[0].name, ".rdata");
        assert_eq!(symbols[1].name, "_binary_blob_start");
        assert_eq!(symbols[1].kind, 'D');
        assert_eq!(symbols[2].name, "_binary_blob_end");
        assert_eq!(symbols[2].value, Some(3));
    }
}
