//! Program headers, consulted for `PT_INTERP`, `PT_DYNAMIC` and for
//! translating dynamic-table virtual addresses to file offsets via
//! `PT_LOAD` when sections are stripped.

use crate::container::{Container, Ctx};
use scroll::{ctx, Pread, Pwrite, SizeWith};

/// Loadable program segment
pub const PT_LOAD: u32 = 1;
/// Dynamic linking information
pub const PT_DYNAMIC: u32 = 2;
/// Program interpreter
pub const PT_INTERP: u32 = 3;

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, Pread, Pwrite, SizeWith)]
pub struct ProgramHeader32 {
    pub p_type: u32,
    pub p_offset: u32,
    pub p_vaddr: u32,
    pub p_paddr: u32,
    pub p_filesz: u32,
    pub p_memsz: u32,
    pub p_flags: u32,
    pub p_align: u32,
}

pub const SIZEOF_PHDR32: usize = 32;

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, Pread, Pwrite, SizeWith)]
pub struct ProgramHeader64 {
    pub p_type: u32,
    pub p_flags: u32,
    pub p_offset: u64,
    pub p_vaddr: u64,
    pub p_paddr: u64,
    pub p_filesz: u64,
    pub p_memsz: u64,
    pub p_align: u64,
}

pub const SIZEOF_PHDR64: usize = 56;

/// A unified program header
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ProgramHeader {
    pub p_type: u32,
    pub p_flags: u32,
    pub p_offset: u64,
    pub p_vaddr: u64,
    pub p_paddr: u64,
    pub p_filesz: u64,
    pub p_memsz: u64,
    pub p_align: u64,
}

impl ProgramHeader {
    /// Whether `vaddr` falls inside this segment's memory image
    pub fn contains_vaddr(&self, vaddr: u64) -> bool {
        self.p_type == PT_LOAD && vaddr >= self.p_vaddr && vaddr < self.p_vaddr + self.p_memsz
    }

    /// Translate a virtual address inside this segment to a file offset
    pub fn vaddr_to_offset(&self, vaddr: u64) -> u64 {
        self.p_offset + (vaddr - self.p_vaddr)
    }
}

impl From<ProgramHeader32> for ProgramHeader {
    fn from(ph: ProgramHeader32) -> Self {
        ProgramHeader {
            p_type: ph.p_type,
            p_flags: ph.p_flags,
            p_offset: u64::from(ph.p_offset),
            p_vaddr: u64::from(ph.p_vaddr),
            p_paddr: u64::from(ph.p_paddr),
            p_filesz: u64::from(ph.p_filesz),
            p_memsz: u64::from(ph.p_memsz),
            p_align: u64::from(ph.p_align),
        }
    }
}

impl From<ProgramHeader64> for ProgramHeader {
    fn from(ph: ProgramHeader64) -> Self {
        ProgramHeader {
            p_type: ph.p_type,
            p_flags: ph.p_flags,
            p_offset: ph.p_offset,
            p_vaddr: ph.p_vaddr,
            p_paddr: ph.p_paddr,
            p_filesz: ph.p_filesz,
            p_memsz: ph.p_memsz,
            p_align: ph.p_align,
        }
    }
}

impl ctx::SizeWith<Ctx> for ProgramHeader {
    fn size_with(ctx: &Ctx) -> usize {
        match ctx.container {
            Container::Little => SIZEOF_PHDR32,
            Container::Big => SIZEOF_PHDR64,
        }
    }
}

impl<'a> ctx::TryFromCtx<'a, Ctx> for ProgramHeader {
    type Error = scroll::Error;
    fn try_from_ctx(bytes: &'a [u8], Ctx { container, le }: Ctx) -> Result<(Self, usize), Self::Error> {
        match container {
            Container::Little => Ok((bytes.pread_with::<ProgramHeader32>(0, le)?.into(), SIZEOF_PHDR32)),
            Container::Big => Ok((bytes.pread_with::<ProgramHeader64>(0, le)?.into(), SIZEOF_PHDR64)),
        }
    }
}
