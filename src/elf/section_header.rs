//! Section headers: the preferred source for the dynamic table, the symbol
//! table, and their linked string tables.

use crate::container::{Container, Ctx};
use scroll::{ctx, Pread, Pwrite, SizeWith};

/// Program data
pub const SHT_PROGBITS: u32 = 1;
/// Symbol table
pub const SHT_SYMTAB: u32 = 2;
/// String table
pub const SHT_STRTAB: u32 = 3;
/// Dynamic linking information
pub const SHT_DYNAMIC: u32 = 6;

/// Writable
pub const SHF_WRITE: u64 = 0x1;
/// Occupies memory during execution
pub const SHF_ALLOC: u64 = 0x2;

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, Pread, Pwrite, SizeWith)]
pub struct SectionHeader32 {
    pub sh_name: u32,
    pub sh_type: u32,
    pub sh_flags: u32,
    pub sh_addr: u32,
    pub sh_offset: u32,
    pub sh_size: u32,
    pub sh_link: u32,
    pub sh_info: u32,
    pub sh_addralign: u32,
    pub sh_entsize: u32,
}

pub const SIZEOF_SHDR32: usize = 40;

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, Pread, Pwrite, SizeWith)]
pub struct SectionHeader64 {
    pub sh_name: u32,
    pub sh_type: u32,
    pub sh_flags: u64,
    pub sh_addr: u64,
    pub sh_offset: u64,
    pub sh_size: u64,
    pub sh_link: u32,
    pub sh_info: u32,
    pub sh_addralign: u64,
    pub sh_entsize: u64,
}

pub const SIZEOF_SHDR64: usize = 64;

/// A unified section header
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SectionHeader {
    pub sh_name: u32,
    pub sh_type: u32,
    pub sh_flags: u64,
    pub sh_addr: u64,
    pub sh_offset: u64,
    pub sh_size: u64,
    pub sh_link: u32,
    pub sh_info: u32,
    pub sh_addralign: u64,
    pub sh_entsize: u64,
}

impl From<SectionHeader32> for SectionHeader {
    fn from(sh: SectionHeader32) -> Self {
        SectionHeader {
            sh_name: sh.sh_name,
            sh_type: sh.sh_type,
            sh_flags: u64::from(sh.sh_flags),
            sh_addr: u64::from(sh.sh_addr),
            sh_offset: u64::from(sh.sh_offset),
            sh_size: u64::from(sh.sh_size),
            sh_link: sh.sh_link,
            sh_info: sh.sh_info,
            sh_addralign: u64::from(sh.sh_addralign),
            sh_entsize: u64::from(sh.sh_entsize),
        }
    }
}

impl From<SectionHeader64> for SectionHeader {
    fn from(sh: SectionHeader64) -> Self {
        SectionHeader {
            sh_name: sh.sh_name,
            sh_type: sh.sh_type,
            sh_flags: sh.sh_flags,
            sh_addr: sh.sh_addr,
            sh_offset: sh.sh_offset,
            sh_size: sh.sh_size,
            sh_link: sh.sh_link,
            sh_info: sh.sh_info,
            sh_addralign: sh.sh_addralign,
            sh_entsize: sh.sh_entsize,
        }
    }
}

impl From<SectionHeader> for SectionHeader32 {
    fn from(sh: SectionHeader) -> Self {
        SectionHeader32 {
            sh_name: sh.sh_name,
            sh_type: sh.sh_type,
            sh_flags: sh.sh_flags as u32,
            sh_addr: sh.sh_addr as u32,
            sh_offset: sh.sh_offset as u32,
            sh_size: sh.sh_size as u32,
            sh_link: sh.sh_link,
            sh_info: sh.sh_info,
            sh_addralign: sh.sh_addralign as u32,
            sh_entsize: sh.sh_entsize as u32,
        }
    }
}

impl From<SectionHeader> for SectionHeader64 {
    fn from(sh: SectionHeader) -> Self {
        SectionHeader64 {
            sh_name: sh.sh_name,
            sh_type: sh.sh_type,
            sh_flags: sh.sh_flags,
            sh_addr: sh.sh_addr,
            sh_offset: sh.sh_offset,
            sh_size: sh.sh_size,
            sh_link: sh.sh_link,
            sh_info: sh.sh_info,
            sh_addralign: sh.sh_addralign,
            sh_entsize: sh.sh_entsize,
        }
    }
}

impl ctx::SizeWith<Ctx> for SectionHeader {
    fn size_with(ctx: &Ctx) -> usize {
        match ctx.container {
            Container::Little => SIZEOF_SHDR32,
            Container::Big => SIZEOF_SHDR64,
        }
    }
}

impl<'a> ctx::TryFromCtx<'a, Ctx> for SectionHeader {
    type Error = scroll::Error;
    fn try_from_ctx(bytes: &'a [u8], Ctx { container, le }: Ctx) -> Result<(Self, usize), Self::Error> {
        match container {
            Container::Little => Ok((bytes.pread_with::<SectionHeader32>(0, le)?.into(), SIZEOF_SHDR32)),
            Container::Big => Ok((bytes.pread_with::<SectionHeader64>(0, le)?.into(), SIZEOF_SHDR64)),
        }
    }
}

impl ctx::TryIntoCtx<Ctx> for SectionHeader {
    type Error = scroll::Error;
    fn try_into_ctx(self, bytes: &mut [u8], Ctx { container, le }: Ctx) -> Result<usize, Self::Error> {
        match container {
            Container::Little => bytes.pwrite_with(SectionHeader32::from(self), 0, le),
            Container::Big => bytes.pwrite_with(SectionHeader64::from(self), 0, le),
        }
    }
}
