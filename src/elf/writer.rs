//! ELF write paths: in-place rpath removal and cleaning of the dynamic
//! table, and synthesis of a relocatable object wrapping an arbitrary byte
//! blob (`bin2elf`).

use crate::arch;
use crate::container::{Container, Ctx};
use crate::error::{Error, Result};
use crate::tools::BinObjectOptions;
use scroll::ctx::SizeWith;
use scroll::{Endian, Pread, Pwrite};

use super::dynamic::{Dyn, DT_NULL, DT_RPATH, DT_RUNPATH};
use super::header::{Header, ET_REL};
use super::section_header::{SectionHeader, SHF_ALLOC, SHT_PROGBITS, SHT_STRTAB, SHT_SYMTAB};
use super::sym::{st_info, Sym, STB_GLOBAL, STT_OBJECT};
use super::{split_rpath, Elf};

/// Remove every `DT_RPATH`/`DT_RUNPATH` entry by compacting the dynamic
/// table in place: surviving entries slide down, `DT_NULL` is copied, and
/// the freed tail is zeroed so downstream loaders still scan the original
/// number of slots. Segment and section sizes are left untouched.
pub fn rpath_clean(bytes: &mut [u8]) -> Result<()> {
    let elf = Elf::parse(bytes)?;
    if elf.dynamic_offset == 0 || elf.dynstr_offset == 0 {
        return Err(Error::Malformed("no dynamic table".into()));
    }
    let entry_size = Dyn::size_with(&elf.ctx);
    let table_offset = elf.dynamic_offset as usize;
    let table_size = elf.dynamic_size as usize;
    if table_offset + table_size > bytes.len() {
        return Err(Error::Malformed(format!(
            "dynamic table at {:#x} with size {} extends past the end of the file",
            table_offset, table_size
        )));
    }
    let count = table_size / entry_size;
    let mut kept = Vec::with_capacity(count);
    for i in 0..count {
        let dyn_entry: Dyn = bytes.pread_with(table_offset + i * entry_size, elf.ctx)?;
        if dyn_entry.d_tag == DT_NULL {
            kept.push(dyn_entry);
            break;
        }
        if dyn_entry.d_tag != DT_RPATH && dyn_entry.d_tag != DT_RUNPATH {
            kept.push(dyn_entry);
        }
    }
    for b in bytes[table_offset..table_offset + table_size].iter_mut() {
        *b = 0;
    }
    let mut offset = table_offset;
    for dyn_entry in kept {
        bytes.pwrite_with(dyn_entry, offset, elf.ctx)?;
        offset += entry_size;
    }
    Ok(())
}

/// Remove one path element from every rpath string. The colon list is
/// rebuilt without the element and written back over the old string in
/// `.dynstr`; the rebuilt list is never longer than the original.
pub fn rpath_remove(bytes: &mut [u8], rpath: &str) -> Result<()> {
    let elf = Elf::parse(bytes)?;
    if elf.dynamic_offset == 0 || elf.dynstr_offset == 0 {
        return Err(Error::Malformed("no dynamic table".into()));
    }
    for dyn_entry in elf.dynamic_entries(bytes) {
        if dyn_entry.d_tag != DT_RPATH && dyn_entry.d_tag != DT_RUNPATH {
            continue;
        }
        let str_offset = elf.dynstr_offset as usize + dyn_entry.d_val as usize;
        if str_offset >= bytes.len() {
            continue;
        }
        let current = match bytes.pread_with::<&str>(
            str_offset,
            scroll::ctx::StrCtx::DelimiterUntil(0, bytes.len() - str_offset),
        ) {
            Ok(s) => s.to_string(),
            Err(_) => continue,
        };
        if !current.split(':').any(|p| p == rpath) {
            continue;
        }
        let rebuilt = split_rpath(&current)
            .into_iter()
            .filter(|p| p != rpath)
            .collect::<Vec<_>>()
            .join(":");
        debug!("rewriting rpath string {:?} as {:?}", current, rebuilt);
        let region_end = (str_offset + current.len() + 1).min(bytes.len());
        let region = &mut bytes[str_offset..region_end];
        for b in region.iter_mut() {
            *b = 0;
        }
        region[..rebuilt.len()].copy_from_slice(rebuilt.as_bytes());
    }
    Ok(())
}

/// Adding an rpath would require growing a string in `.dynstr`, and the
/// slack after the existing strings cannot be proven without relocating the
/// table; growth is refused rather than risking an overlapping write.
pub fn rpath_insert(_bytes: &mut [u8], _rpath: &str) -> Result<()> {
    Err(Error::Unsupported(
        "inserting an ELF rpath would require growing .dynstr".into(),
    ))
}

// section name offsets inside .shstrtab, in emission order
const SHSTRTAB_RODATA: u32 = 1;
const SHSTRTAB_SYMTAB: u32 = 9;
const SHSTRTAB_STRTAB: u32 = 17;
const SHSTRTAB_SHSTRTAB: u32 = 25;
const SHSTRTAB_NOTE_GNU_STACK: u32 = 35;
const SHSTRTAB_SIZE: u32 = 51;

const SECTION_COUNT: u16 = 6;

/// Emit a relocatable ELF object whose `.rodata` holds `data`, bracketed by
/// global `<symbol>_start`/`<symbol>_end` object symbols. The section order
/// is NULL, `.rodata`, `.symtab`, `.strtab`, `.shstrtab`,
/// `.note.GNU-stack` (the empty trailer marking the stack non-executable).
pub fn write_object(data: &[u8], opts: &BinObjectOptions) -> Result<Vec<u8>> {
    let is_64 = arch::is_64bit(opts.arch.as_deref());
    let ctx = Ctx::new(
        if is_64 { Container::Big } else { Container::Little },
        Endian::Little,
    );
    let align: u32 = if is_64 { 8 } else { 4 };
    if data.len() as u64 > u64::from(u32::MAX) - 1 {
        return Err(Error::Malformed("input too large for an ELF32 layout".into()));
    }
    let mut rodata_size = data.len() as u32;
    if opts.zeroend {
        rodata_size += 1;
    }

    let symbol = opts.symbol_name();
    let symbol_start = format!("{}_start", symbol);
    let symbol_end = format!("{}_end", symbol);

    let header_size = Header::size_with(&ctx) as u32;
    let shdr_size = SectionHeader::size_with(&ctx) as u32;
    let sym_size = Sym::size_with(&ctx) as u32;

    let shdrs_offset = header_size;
    let rodata_offset = shdrs_offset + u32::from(SECTION_COUNT) * shdr_size;
    let rodata_padding = align.wrapping_sub(rodata_size) & (align - 1);
    let symtab_offset = rodata_offset + rodata_size + rodata_padding;
    let symtab_size = 3 * sym_size;
    let symtab_padding = align.wrapping_sub(symtab_size) & (align - 1);
    let strtab_offset = symtab_offset + symtab_size + symtab_padding;
    let strtab_size = 1 + (symbol_start.len() as u32 + 1) + (symbol_end.len() as u32 + 1);
    let strtab_padding = align.wrapping_sub(strtab_size) & (align - 1);
    let shstrtab_offset = strtab_offset + strtab_size + strtab_padding;
    let total = (shstrtab_offset + SHSTRTAB_SIZE) as usize;

    let mut out = vec![0u8; total];

    let mut header = Header::new(ctx);
    header.e_type = ET_REL;
    header.e_machine = arch::elf_machine(opts.arch.as_deref());
    header.e_shoff = u64::from(shdrs_offset);
    header.e_shnum = SECTION_COUNT;
    header.e_shstrndx = 4;
    out.pwrite_with(header, 0, ctx)?;

    let sections = [
        // NULL section
        SectionHeader::default(),
        SectionHeader {
            sh_name: SHSTRTAB_RODATA,
            sh_type: SHT_PROGBITS,
            sh_flags: SHF_ALLOC,
            sh_offset: u64::from(rodata_offset),
            sh_size: u64::from(rodata_size),
            sh_addralign: u64::from(align),
            ..Default::default()
        },
        SectionHeader {
            sh_name: SHSTRTAB_SYMTAB,
            sh_type: SHT_SYMTAB,
            sh_offset: u64::from(symtab_offset),
            sh_size: u64::from(symtab_size),
            sh_link: 3,
            // index of the first global symbol
            sh_info: 1,
            sh_addralign: u64::from(align),
            sh_entsize: u64::from(sym_size),
            ..Default::default()
        },
        SectionHeader {
            sh_name: SHSTRTAB_STRTAB,
            sh_type: SHT_STRTAB,
            sh_offset: u64::from(strtab_offset),
            sh_size: u64::from(strtab_size),
            sh_addralign: 1,
            ..Default::default()
        },
        SectionHeader {
            sh_name: SHSTRTAB_SHSTRTAB,
            sh_type: SHT_STRTAB,
            sh_offset: u64::from(shstrtab_offset),
            sh_size: u64::from(SHSTRTAB_SIZE),
            sh_addralign: 1,
            ..Default::default()
        },
        SectionHeader {
            sh_name: SHSTRTAB_NOTE_GNU_STACK,
            sh_type: SHT_PROGBITS,
            sh_offset: u64::from(shstrtab_offset + SHSTRTAB_SIZE),
            sh_addralign: 1,
            ..Default::default()
        },
    ];
    let mut offset = shdrs_offset as usize;
    for section in sections {
        out.pwrite_with(section, offset, ctx)?;
        offset += shdr_size as usize;
    }

    out[rodata_offset as usize..rodata_offset as usize + data.len()].copy_from_slice(data);
    // a zeroend terminator and the alignment padding are already zero

    let sym_start = Sym {
        st_name: 1,
        st_info: st_info(STB_GLOBAL, STT_OBJECT),
        st_shndx: 1,
        st_value: 0,
        ..Default::default()
    };
    let sym_end = Sym {
        st_name: 1 + symbol_start.len() as u32 + 1,
        st_info: st_info(STB_GLOBAL, STT_OBJECT),
        st_shndx: 1,
        st_value: u64::from(rodata_size),
        ..Default::default()
    };
    out.pwrite_with(Sym::default(), symtab_offset as usize, ctx)?;
    out.pwrite_with(sym_start, symtab_offset as usize + sym_size as usize, ctx)?;
    out.pwrite_with(sym_end, symtab_offset as usize + 2 * sym_size as usize, ctx)?;

    let mut offset = strtab_offset as usize + 1;
    for name in [&symbol_start, &symbol_end] {
        out[offset..offset + name.len()].copy_from_slice(name.as_bytes());
        offset += name.len() + 1;
    }

    let mut offset = shstrtab_offset as usize + 1;
    for name in [
        &b".rodata"[..],
        &b".symtab"[..],
        &b".strtab"[..],
        &b".shstrtab"[..],
        &b".note.GNU-stack"[..],
    ] {
        out[offset..offset + name.len()].copy_from_slice(name);
        offset += name.len() + 1;
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::elf::Elf;

    fn options(arch: &str, basename: &str) -> BinObjectOptions {
        BinObjectOptions {
            arch: Some(arch.into()),
            basename: Some(basename.into()),
            ..Default::default()
        }
    }

    #[test]
    fn emits_the_documented_64bit_layout() {
        let object = write_object(b"hi", &options("x86_64", "hello")).unwrap();
        let elf = Elf::parse(&object).unwrap();
        assert!(elf.is_64);
        assert_eq!(elf.header.e_type, ET_REL);
        assert_eq!(elf.header.e_machine, arch::elf_machine::EM_X86_64);
        assert_eq!(elf.header.e_shstrndx, 4);

        // .rodata carries exactly the payload
        let rodata = elf
            .section_header(&object, 1)
            .expect("rodata section header");
        assert_eq!(rodata.sh_size, 2);
        let start = rodata.sh_offset as usize;
        assert_eq!(&object[start..start + 2], b"hi");

        // .shstrtab names the non-executable stack trailer
        let shstrtab = elf.section_header(&object, 4).unwrap();
        let names = crate::strtab::Strtab::parse(
            &object,
            shstrtab.sh_offset as usize,
            shstrtab.sh_size as usize,
            0,
        )
        .unwrap();
        assert_eq!(names.get_at(SHSTRTAB_NOTE_GNU_STACK as usize), Some(".note.GNU-stack"));
    }

    #[test]
    fn start_and_end_symbols_bracket_the_payload() {
        let object = write_object(b"hi", &options("x86_64", "hello")).unwrap();
        let elf = Elf::parse(&object).unwrap();
        let symbols = elf.symbols(&object).unwrap();
        assert_eq!(symbols.len(), 2);
        assert_eq!(symbols[0].name, "_binary_hello_start");
        assert_eq!(symbols[0].kind, 'D');
        assert_eq!(symbols[0].value, Some(0));
        assert_eq!(symbols[1].name, "_binary_hello_end");
        assert_eq!(symbols[1].value, Some(2));
    }

    #[test]
    fn zeroend_extends_the_end_symbol() {
        let mut opts = options("i386", "blob");
        opts.zeroend = true;
        let object = write_object(b"abc", &opts).unwrap();
        let elf = Elf::parse(&object).unwrap();
        assert!(!elf.is_64);
        let symbols = elf.symbols(&object).unwrap();
        assert_eq!(symbols[1].value, Some(4));
        let rodata = elf.section_header(&object, 1).unwrap();
        assert_eq!(rodata.sh_size, 4);
        assert_eq!(object[rodata.sh_offset as usize + 3], 0);
    }

    #[test]
    fn insert_is_refused() {
        let mut object = write_object(b"hi", &options("x86_64", "x")).unwrap();
        assert!(matches!(
            rpath_insert(&mut object, "/usr/lib"),
            Err(Error::Unsupported(_))
        ));
    }
}
