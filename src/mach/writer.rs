//! Mach-O write paths: in-place `LC_RPATH` insertion/removal/cleaning with
//! load-command sliding, and synthesis of a thin object wrapping an
//! arbitrary byte blob (`bin2macho`).

use crate::arch;
use crate::container::{Container, Ctx};
use crate::error::{Error, Result};
use crate::tools::BinObjectOptions;
use scroll::{Endian, Pread, Pwrite};

use super::header::{Header, MH_MAGIC, MH_MAGIC_64, MH_OBJECT};
use super::load_command::{
    pad_name, BuildVersionCommand, RpathCommand, Section32, Section64,
    SegmentCommand32, SegmentCommand64, SymtabCommand, LC_BUILD_VERSION, LC_RPATH, LC_SEGMENT,
    LC_SEGMENT_64, LC_SYMTAB, SECTION_ATTR_SOME_INSTRUCTIONS, SECTION_TYPE_REGULAR,
    SIZEOF_BUILD_VERSION_COMMAND, SIZEOF_RPATH_COMMAND, SIZEOF_SECTION_32, SIZEOF_SECTION_64,
    SIZEOF_SEGMENT_COMMAND_32, SIZEOF_SEGMENT_COMMAND_64, SIZEOF_SYMTAB_COMMAND, VM_PROT_EXECUTE,
    VM_PROT_READ,
};
use super::symbols::{Nlist, Nlist32, Nlist64, N_EXT, N_SECT};
use super::MachO;

#[inline]
fn align_up(value: u32, align: u32) -> u32 {
    (value + align - 1) & !(align - 1)
}

fn write_header(bytes: &mut [u8], macho: &MachO, ncmds: u32, sizeofcmds: u32) -> Result<()> {
    let mut header = macho.header;
    header.ncmds = ncmds;
    header.sizeofcmds = sizeofcmds;
    bytes.pwrite_with(header, 0, macho.ctx)?;
    Ok(())
}

/// Append an `LC_RPATH` command carrying `rpath`, if it is not already
/// present. The command lands in the slack between the existing load
/// commands and the lowest section file offset; when that slack is too
/// small the insertion is refused with [`Error::NoSpace`] rather than
/// shifting section data.
pub fn rpath_insert(bytes: &mut [u8], rpath: &str) -> Result<()> {
    let macho = MachO::parse(bytes)?;
    if macho.rpaths(bytes)?.iter().any(|existing| existing == rpath) {
        debug!("rpath {:?} already present", rpath);
        return Ok(());
    }
    let cmdsize = align_up((SIZEOF_RPATH_COMMAND + rpath.len() + 1) as u32, 4);
    let header_size = Header::size(&macho.ctx) as u64;
    let insert_at = header_size + u64::from(macho.header.sizeofcmds);
    let low = macho
        .find_low_fileoff(bytes)?
        .ok_or_else(|| Error::NoSpace("no section data bounds the load commands".into()))?;
    if insert_at + u64::from(cmdsize) > low {
        return Err(Error::NoSpace(format!(
            "load commands end at {:#x}, section data starts at {:#x}, need {} bytes",
            insert_at, low, cmdsize
        )));
    }
    let insert_at = insert_at as usize;
    let command = RpathCommand {
        cmd: LC_RPATH,
        cmdsize,
        path: SIZEOF_RPATH_COMMAND as u32,
    };
    bytes.pwrite_with(command, insert_at, macho.ctx.le)?;
    let str_start = insert_at + SIZEOF_RPATH_COMMAND;
    let str_end = insert_at + cmdsize as usize;
    for b in bytes[str_start..str_end].iter_mut() {
        *b = 0;
    }
    bytes[str_start..str_start + rpath.len()].copy_from_slice(rpath.as_bytes());
    write_header(
        bytes,
        &macho,
        macho.header.ncmds + 1,
        macho.header.sizeofcmds + cmdsize,
    )
}

/// Remove the `LC_RPATH` command whose path equals `rpath`; absent paths
/// are not an error
pub fn rpath_remove(bytes: &mut [u8], rpath: &str) -> Result<()> {
    compact_load_commands(bytes, |path| path == rpath)
}

/// Remove every `LC_RPATH` command
pub fn rpath_clean(bytes: &mut [u8]) -> Result<()> {
    compact_load_commands(bytes, |_| true)
}

/// Slide every surviving load command down over the removed ones, zero the
/// freed tail, and rewrite `ncmds`/`sizeofcmds`
fn compact_load_commands(bytes: &mut [u8], remove: impl Fn(&str) -> bool) -> Result<()> {
    let macho = MachO::parse(bytes)?;
    let commands = macho.load_commands(bytes)?;
    let mut kept: Vec<u8> = Vec::with_capacity(macho.header.sizeofcmds as usize);
    let mut new_ncmds = 0u32;
    let mut found = false;
    let mut read_end = Header::size(&macho.ctx);
    for lc in &commands {
        let start = lc.offset;
        let end = start + lc.header.cmdsize as usize;
        if end > bytes.len() {
            return Err(Error::Malformed(format!(
                "load command at {:#x} extends past the end of the file",
                start
            )));
        }
        read_end = end;
        let mut removing = false;
        if lc.header.cmd == LC_RPATH {
            let command: RpathCommand = bytes.pread_with(start, macho.ctx.le)?;
            if let Some(path) = super::read_command_str(bytes, lc, command.path) {
                removing = remove(&path);
            }
        }
        if removing {
            debug!("dropping LC_RPATH at {:#x}", start);
            found = true;
        } else {
            kept.extend_from_slice(&bytes[start..end]);
            new_ncmds += 1;
        }
    }
    if !found {
        return Ok(());
    }
    let base = Header::size(&macho.ctx);
    let new_sizeofcmds = kept.len() as u32;
    bytes[base..base + kept.len()].copy_from_slice(&kept);
    for b in bytes[base + kept.len()..read_end].iter_mut() {
        *b = 0;
    }
    write_header(bytes, &macho, new_ncmds, new_sizeofcmds)
}

/// Emit a thin Mach-O object with one `__TEXT,__const` section holding
/// `data`, bracketed by external `<symbol>_start`/`<symbol>_end` symbols.
/// Layout:
/// `[header][segment cmd + section][symtab cmd][build_version cmd] | data |
/// symtab | strtab`, padded at each boundary to 8 bytes (64-bit) or 4
/// (32-bit). The platform C ABI prepends `_` to every C identifier, so the
/// generated symbols carry one more leading underscore than their ELF
/// counterparts.
pub fn write_object(data: &[u8], opts: &BinObjectOptions) -> Result<Vec<u8>> {
    let is_64 = arch::mach_is_64bit(opts.arch.as_deref());
    let ctx = Ctx::new(
        if is_64 { Container::Big } else { Container::Little },
        Endian::Little,
    );
    let align: u32 = if is_64 { 8 } else { 4 };
    if data.len() as u64 > u64::from(u32::MAX) - 1 {
        return Err(Error::Malformed("input too large for a Mach-O object".into()));
    }
    let mut data_size = data.len() as u32;
    if opts.zeroend {
        data_size += 1;
    }

    let symbol = {
        let base = opts.basename.as_deref().filter(|b| !b.is_empty()).unwrap_or("data");
        let name = match opts.symbol_prefix.as_deref() {
            Some(prefix) => format!("_{}{}", prefix, base),
            None => format!("__binary_{}", base),
        };
        arch::sanitize_symbol_name(&name)
    };
    let symbol_start = format!("{}_start", symbol);
    let symbol_end = format!("{}_end", symbol);

    let header_size = Header::size(&ctx) as u32;
    let (segment_cmd_size, section_size, nlist_size) = if is_64 {
        (
            SIZEOF_SEGMENT_COMMAND_64 as u32,
            SIZEOF_SECTION_64 as u32,
            super::symbols::SIZEOF_NLIST_64 as u32,
        )
    } else {
        (
            SIZEOF_SEGMENT_COMMAND_32 as u32,
            SIZEOF_SECTION_32 as u32,
            super::symbols::SIZEOF_NLIST_32 as u32,
        )
    };
    let segment_total = segment_cmd_size + section_size;
    let sizeofcmds =
        segment_total + SIZEOF_SYMTAB_COMMAND as u32 + SIZEOF_BUILD_VERSION_COMMAND as u32;
    let data_offset = align_up(header_size + sizeofcmds, align);
    let data_end = data_offset + data_size;
    let symtab_offset = align_up(data_end, align);
    let strtab_offset = symtab_offset + 2 * nlist_size;
    let strtab_size = align_up(
        4 + (symbol_start.len() as u32 + 1) + (symbol_end.len() as u32 + 1),
        align,
    );
    let total = (strtab_offset + strtab_size) as usize;

    let mut out = vec![0u8; total];
    let (cputype, cpusubtype) = arch::mach_cputype(opts.arch.as_deref());
    let header = Header {
        magic: if is_64 { MH_MAGIC_64 } else { MH_MAGIC },
        cputype,
        cpusubtype,
        filetype: MH_OBJECT,
        ncmds: 3,
        sizeofcmds,
        flags: 0,
        reserved: 0,
    };
    out.pwrite_with(header, 0, ctx)?;

    let mut offset = header_size as usize;
    let prot = VM_PROT_READ | VM_PROT_EXECUTE;
    let section_flags = SECTION_TYPE_REGULAR | SECTION_ATTR_SOME_INSTRUCTIONS;
    if is_64 {
        let segment = SegmentCommand64 {
            cmd: LC_SEGMENT_64,
            cmdsize: segment_total,
            segname: pad_name("__TEXT"),
            vmsize: u64::from(data_size),
            fileoff: u64::from(data_offset),
            filesize: u64::from(data_size),
            maxprot: prot,
            initprot: prot,
            nsects: 1,
            ..Default::default()
        };
        offset += out.pwrite_with(segment, offset, ctx.le)?;
        let section = Section64 {
            sectname: pad_name("__const"),
            segname: pad_name("__TEXT"),
            size: u64::from(data_size),
            offset: data_offset,
            align: 3,
            flags: section_flags,
            ..Default::default()
        };
        out.pwrite_with(section, offset, ctx.le)?;
        offset += SIZEOF_SECTION_64;
    } else {
        let segment = SegmentCommand32 {
            cmd: LC_SEGMENT,
            cmdsize: segment_total,
            segname: pad_name("__TEXT"),
            vmsize: data_size,
            fileoff: data_offset,
            filesize: data_size,
            maxprot: prot,
            initprot: prot,
            nsects: 1,
            ..Default::default()
        };
        offset += out.pwrite_with(segment, offset, ctx.le)?;
        let section = Section32 {
            sectname: pad_name("__const"),
            segname: pad_name("__TEXT"),
            size: data_size,
            offset: data_offset,
            align: 2,
            flags: section_flags,
            ..Default::default()
        };
        out.pwrite_with(section, offset, ctx.le)?;
        offset += SIZEOF_SECTION_32;
    }

    let symtab = SymtabCommand {
        cmd: LC_SYMTAB,
        cmdsize: SIZEOF_SYMTAB_COMMAND as u32,
        symoff: symtab_offset,
        nsyms: 2,
        stroff: strtab_offset,
        strsize: strtab_size,
    };
    out.pwrite_with(symtab, offset, ctx.le)?;
    offset += SIZEOF_SYMTAB_COMMAND;

    let build_version = BuildVersionCommand {
        cmd: LC_BUILD_VERSION,
        cmdsize: SIZEOF_BUILD_VERSION_COMMAND as u32,
        platform: arch::mach_platform(opts.platform.as_deref()),
        minos: arch::mach_version(opts.minos.as_deref()),
        sdk: arch::mach_version(opts.sdk.as_deref()),
        ntools: 0,
    };
    out.pwrite_with(build_version, offset, ctx.le)?;

    out[data_offset as usize..data_offset as usize + data.len()].copy_from_slice(data);
    // a zeroend terminator and all alignment padding are already zero

    let nlist_start = Nlist {
        n_strx: 4,
        n_type: N_SECT | N_EXT,
        n_sect: 1,
        n_desc: 0,
        n_value: 0,
    };
    let nlist_end = Nlist {
        n_strx: 4 + symbol_start.len() as u32 + 1,
        n_type: N_SECT | N_EXT,
        n_sect: 1,
        n_desc: 0,
        n_value: u64::from(data_size),
    };
    if is_64 {
        out.pwrite_with(Nlist64::from(nlist_start), symtab_offset as usize, ctx.le)?;
        out.pwrite_with(
            Nlist64::from(nlist_end),
            symtab_offset as usize + nlist_size as usize,
            ctx.le,
        )?;
    } else {
        out.pwrite_with(Nlist32::from(nlist_start), symtab_offset as usize, ctx.le)?;
        out.pwrite_with(
            Nlist32::from(nlist_end),
            symtab_offset as usize + nlist_size as usize,
            ctx.le,
        )?;
    }

    out.pwrite_with(strtab_size, strtab_offset as usize, ctx.le)?;
    let mut offset = strtab_offset as usize + 4;
    for name in [&symbol_start, &symbol_end] {
        out[offset..offset + name.len()].copy_from_slice(name.as_bytes());
        offset += name.len() + 1;
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mach::MachO;

    fn options() -> BinObjectOptions {
        BinObjectOptions {
            arch: Some("x86_64".into()),
            basename: Some("payload".into()),
            platform: Some("macosx".into()),
            minos: Some("11.0".into()),
            sdk: Some("13.1".into()),
            ..Default::default()
        }
    }

    #[test]
    fn emits_three_commands_with_build_version() {
        let object = write_object(b"abcd", &options()).unwrap();
        let macho = MachO::parse(&object).unwrap();
        assert_eq!(macho.header.ncmds, 3);
        assert_eq!(macho.header.filetype, MH_OBJECT);
        let commands = macho.load_commands(&object).unwrap();
        let build: BuildVersionCommand = object
            .pread_with(commands[2].offset, macho.ctx.le)
            .unwrap();
        assert_eq!(build.cmd, LC_BUILD_VERSION);
        assert_eq!(build.platform, arch::mach_platform::PLATFORM_MACOS);
        assert_eq!(build.minos, 0x000b_0000);
        assert_eq!(build.sdk, 0x000d_0100);
        assert_eq!(build.ntools, 0);
    }

    #[test]
    fn thirty_two_bit_arm_object() {
        let mut opts = options();
        opts.arch = Some("arm".into());
        let object = write_object(b"xyz", &opts).unwrap();
        let macho = MachO::parse(&object).unwrap();
        assert!(!macho.is_64);
        let symbols = macho.symbols(&object).unwrap();
        assert_eq!(symbols[0].name, "__binary_payload_start");
        assert_eq!(symbols[1].value, Some(3));
    }

    /// A dylib-shaped fixture: one `__TEXT` segment whose section data
    /// starts at 0x1000, leaving generous load-command slack
    fn fixture_with_slack() -> Vec<u8> {
        let ctx = Ctx::new(Container::Big, Endian::Little);
        let mut bytes = vec![0u8; 0x1100];
        let segment_total = (SIZEOF_SEGMENT_COMMAND_64 + SIZEOF_SECTION_64) as u32;
        let header = Header {
            magic: MH_MAGIC_64,
            cputype: arch::mach_cputype::CPU_TYPE_X86_64,
            cpusubtype: arch::mach_cputype::CPU_SUBTYPE_X86_64,
            filetype: super::super::header::MH_DYLIB,
            ncmds: 1,
            sizeofcmds: segment_total,
            flags: 0,
            reserved: 0,
        };
        bytes.pwrite_with(header, 0, ctx).unwrap();
        let segment = SegmentCommand64 {
            cmd: LC_SEGMENT_64,
            cmdsize: segment_total,
            segname: pad_name("__TEXT"),
            vmsize: 0x100,
            fileoff: 0x1000,
            filesize: 0x100,
            maxprot: VM_PROT_READ | VM_PROT_EXECUTE,
            initprot: VM_PROT_READ | VM_PROT_EXECUTE,
            nsects: 1,
            ..Default::default()
        };
        let mut offset = Header::size(&ctx);
        offset += bytes.pwrite_with(segment, offset, ctx.le).unwrap();
        let section = Section64 {
            sectname: pad_name("__text"),
            segname: pad_name("__TEXT"),
            size: 0x100,
            offset: 0x1000,
            align: 4,
            ..Default::default()
        };
        bytes.pwrite_with(section, offset, ctx.le).unwrap();
        bytes
    }

    #[test]
    fn rpath_insert_list_remove_roundtrip() {
        let mut object = fixture_with_slack();
        let rpath = "@loader_path/../lib";
        rpath_insert(&mut object, rpath).unwrap();
        let macho = MachO::parse(&object).unwrap();
        assert_eq!(macho.header.ncmds, 2);
        assert_eq!(macho.rpaths(&object).unwrap(), vec![rpath.to_string()]);
        // inserting the same path again is a no-op
        rpath_insert(&mut object, rpath).unwrap();
        assert_eq!(MachO::parse(&object).unwrap().header.ncmds, 2);
        rpath_remove(&mut object, rpath).unwrap();
        let macho = MachO::parse(&object).unwrap();
        assert_eq!(macho.header.ncmds, 1);
        assert!(macho.rpaths(&object).unwrap().is_empty());
    }

    #[test]
    fn rpath_clean_is_idempotent() {
        let mut object = fixture_with_slack();
        rpath_insert(&mut object, "/opt/lib").unwrap();
        rpath_insert(&mut object, "/usr/local/lib").unwrap();
        rpath_clean(&mut object).unwrap();
        let cleaned = object.clone();
        rpath_clean(&mut object).unwrap();
        assert_eq!(object, cleaned);
        assert!(MachO::parse(&object)
            .unwrap()
            .rpaths(&object)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn insert_without_slack_is_refused() {
        let mut object = write_object(b"hi", &options()).unwrap();
        assert!(matches!(
            rpath_insert(&mut object, "@loader_path/../a/rather/long/rpath"),
            Err(Error::NoSpace(_))
        ));
    }

    #[test]
    fn clean_without_rpaths_is_a_no_op() {
        let mut object = write_object(b"hi", &options()).unwrap();
        let before = object.clone();
        rpath_clean(&mut object).unwrap();
        assert_eq!(object, before);
    }
}
