//! The dynamic table: a `(tag, value)` sequence terminated by `DT_NULL`,
//! carrying needed libraries, string-table location and the rpath entries.

use crate::container::{Container, Ctx};
use scroll::{ctx, Pread, Pwrite, SizeWith};

pub const DT_NULL: u64 = 0;
pub const DT_NEEDED: u64 = 1;
pub const DT_STRTAB: u64 = 5;
pub const DT_STRSZ: u64 = 10;
pub const DT_SONAME: u64 = 14;
pub const DT_RPATH: u64 = 15;
pub const DT_RUNPATH: u64 = 29;
pub const DT_AUXILIARY: u64 = 0x7fff_fffd;
pub const DT_FILTER: u64 = 0x7fff_ffff;

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, Pread, Pwrite, SizeWith)]
pub struct Dyn32 {
    pub d_tag: u32,
    pub d_val: u32,
}

pub const SIZEOF_DYN32: usize = 8;

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, Pread, Pwrite, SizeWith)]
pub struct Dyn64 {
    pub d_tag: u64,
    pub d_val: u64,
}

pub const SIZEOF_DYN64: usize = 16;

/// A unified dynamic entry
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Dyn {
    pub d_tag: u64,
    pub d_val: u64,
}

impl From<Dyn32> for Dyn {
    fn from(d: Dyn32) -> Self {
        Dyn {
            d_tag: u64::from(d.d_tag),
            d_val: u64::from(d.d_val),
        }
    }
}

impl From<Dyn64> for Dyn {
    fn from(d: Dyn64) -> Self {
        Dyn {
            d_tag: d.d_tag,
            d_val: d.d_val,
        }
    }
}

impl From<Dyn> for Dyn32 {
    fn from(d: Dyn) -> Self {
        Dyn32 {
            d_tag: d.d_tag as u32,
            d_val: d.d_val as u32,
        }
    }
}

impl From<Dyn> for Dyn64 {
    fn from(d: Dyn) -> Self {
        Dyn64 {
            d_tag: d.d_tag,
            d_val: d.d_val,
        }
    }
}

impl ctx::SizeWith<Ctx> for Dyn {
    fn size_with(ctx: &Ctx) -> usize {
        match ctx.container {
            Container::Little => SIZEOF_DYN32,
            Container::Big => SIZEOF_DYN64,
        }
    }
}

impl<'a> ctx::TryFromCtx<'a, Ctx> for Dyn {
    type Error = scroll::Error;
    fn try_from_ctx(bytes: &'a [u8], Ctx { container, le }: Ctx) -> Result<(Self, usize), Self::Error> {
        match container {
            Container::Little => Ok((bytes.pread_with::<Dyn32>(0, le)?.into(), SIZEOF_DYN32)),
            Container::Big => Ok((bytes.pread_with::<Dyn64>(0, le)?.into(), SIZEOF_DYN64)),
        }
    }
}

impl ctx::TryIntoCtx<Ctx> for Dyn {
    type Error = scroll::Error;
    fn try_into_ctx(self, bytes: &mut [u8], Ctx { container, le }: Ctx) -> Result<usize, Self::Error> {
        match container {
            Container::Little => bytes.pwrite_with(Dyn32::from(self), 0, le),
            Container::Big => bytes.pwrite_with(Dyn64::from(self), 0, le),
        }
    }
}

/// Printable tag name, for trace logging
pub fn tag_to_str(tag: u64) -> &'static str {
    match tag {
        DT_NULL => "DT_NULL",
        DT_NEEDED => "DT_NEEDED",
        DT_STRTAB => "DT_STRTAB",
        DT_STRSZ => "DT_STRSZ",
        DT_SONAME => "DT_SONAME",
        DT_RPATH => "DT_RPATH",
        DT_RUNPATH => "DT_RUNPATH",
        DT_AUXILIARY => "DT_AUXILIARY",
        DT_FILTER => "DT_FILTER",
        _ => "UNKNOWN_TAG",
    }
}
