//! "Nlist" style symbols, with the section-number heuristic that maps them
//! onto nm-style type letters.

use crate::container::{Container, Ctx};
use scroll::{ctx, Pread, Pwrite, SizeWith};

/// External (global) bit
pub const N_EXT: u8 = 0x01;
/// Mask for the type bits
pub const N_TYPE_MASK: u8 = 0x0e;
/// Defined in the section numbered by `n_sect`
pub const N_SECT: u8 = 0x0e;

#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pread, Pwrite, SizeWith)]
pub struct Nlist32 {
    /// index into the string table
    pub n_strx: u32,
    pub n_type: u8,
    /// section number, 1-based, or NO_SECT
    pub n_sect: u8,
    pub n_desc: u16,
    pub n_value: u32,
}

pub const SIZEOF_NLIST_32: usize = 12;

#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pread, Pwrite, SizeWith)]
pub struct Nlist64 {
    /// index into the string table
    pub n_strx: u32,
    pub n_type: u8,
    /// section number, 1-based, or NO_SECT
    pub n_sect: u8,
    pub n_desc: u16,
    pub n_value: u64,
}

pub const SIZEOF_NLIST_64: usize = 16;

/// A unified nlist entry
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Nlist {
    pub n_strx: u32,
    pub n_type: u8,
    pub n_sect: u8,
    pub n_desc: u16,
    pub n_value: u64,
}

impl Nlist {
    pub fn is_external(&self) -> bool {
        self.n_type & N_EXT != 0
    }

    /// The nm-style type letter. Section 1 is conventionally
    /// `__TEXT,__text`, 2 `__DATA,__data`, 3 `__DATA,__bss`; anything else
    /// defined maps to `S`/`s`, non-section types to `?`.
    pub fn type_char(&self) -> char {
        if self.n_sect == 0 {
            return 'U';
        }
        if self.n_type & N_TYPE_MASK != N_SECT {
            return '?';
        }
        let c = match self.n_sect {
            1 => 'T',
            2 => 'D',
            3 => 'B',
            _ => 'S',
        };
        if self.is_external() {
            c
        } else {
            c.to_ascii_lowercase()
        }
    }
}

impl From<Nlist32> for Nlist {
    fn from(n: Nlist32) -> Self {
        Nlist {
            n_strx: n.n_strx,
            n_type: n.n_type,
            n_sect: n.n_sect,
            n_desc: n.n_desc,
            n_value: u64::from(n.n_value),
        }
    }
}

impl From<Nlist64> for Nlist {
    fn from(n: Nlist64) -> Self {
        Nlist {
            n_strx: n.n_strx,
            n_type: n.n_type,
            n_sect: n.n_sect,
            n_desc: n.n_desc,
            n_value: n.n_value,
        }
    }
}

impl From<Nlist> for Nlist32 {
    fn from(n: Nlist) -> Self {
        Nlist32 {
            n_strx: n.n_strx,
            n_type: n.n_type,
            n_sect: n.n_sect,
            n_desc: n.n_desc,
            n_value: n.n_value as u32,
        }
    }
}

impl From<Nlist> for Nlist64 {
    fn from(n: Nlist) -> Self {
        Nlist64 {
            n_strx: n.n_strx,
            n_type: n.n_type,
            n_sect: n.n_sect,
            n_desc: n.n_desc,
            n_value: n.n_value,
        }
    }
}

impl ctx::SizeWith<Ctx> for Nlist {
    fn size_with(ctx: &Ctx) -> usize {
        match ctx.container {
            Container::Little => SIZEOF_NLIST_32,
            Container::Big => SIZEOF_NLIST_64,
        }
    }
}

impl<'a> ctx::TryFromCtx<'a, Ctx> for Nlist {
    type Error = scroll::Error;
    fn try_from_ctx(bytes: &'a [u8], Ctx { container, le }: Ctx) -> Result<(Self, usize), Self::Error> {
        match container {
            Container::Little => Ok((bytes.pread_with::<Nlist32>(0, le)?.into(), SIZEOF_NLIST_32)),
            Container::Big => Ok((bytes.pread_with::<Nlist64>(0, le)?.into(), SIZEOF_NLIST_64)),
        }
    }
}

impl ctx::TryIntoCtx<Ctx> for Nlist {
    type Error = scroll::Error;
    fn try_into_ctx(self, bytes: &mut [u8], Ctx { container, le }: Ctx) -> Result<usize, Self::Error> {
        match container {
            Container::Little => bytes.pwrite_with(Nlist32::from(self), 0, le),
            Container::Big => bytes.pwrite_with(Nlist64::from(self), 0, le),
        }
    }
}
