//! The Mach-O file header: four thin magics (32/64 bit, either byte
//! order) plus the fat magic. Big-endian variants are byte-swapped on load
//! by parsing with the ctx endianness; all downstream logic sees host
//! order.

use crate::container::{Container, Ctx};
use crate::error;
use scroll::{ctx, Endian, Pread, Pwrite, SizeWith};

/// 32-bit magic, file in little-endian byte order
pub const MH_MAGIC: u32 = 0xfeed_face;
/// 64-bit magic, file in little-endian byte order
pub const MH_MAGIC_64: u32 = 0xfeed_facf;
/// 32-bit magic as read from a big-endian file
pub const MH_CIGAM: u32 = 0xcefa_edfe;
/// 64-bit magic as read from a big-endian file
pub const MH_CIGAM_64: u32 = 0xcffa_edfe;
/// Universal (fat) container magic, stored big-endian
pub const FAT_MAGIC: u32 = 0xcafe_babe;
pub const FAT_CIGAM: u32 = 0xbeba_feca;

/// Relocatable object file
pub const MH_OBJECT: u32 = 0x1;
/// Dynamically bound shared library
pub const MH_DYLIB: u32 = 0x6;

#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pread, Pwrite, SizeWith)]
pub struct Header32 {
    pub magic: u32,
    pub cputype: u32,
    pub cpusubtype: u32,
    pub filetype: u32,
    pub ncmds: u32,
    pub sizeofcmds: u32,
    pub flags: u32,
}

pub const SIZEOF_HEADER_32: usize = 28;

#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pread, Pwrite, SizeWith)]
pub struct Header64 {
    pub magic: u32,
    pub cputype: u32,
    pub cpusubtype: u32,
    pub filetype: u32,
    pub ncmds: u32,
    pub sizeofcmds: u32,
    pub flags: u32,
    pub reserved: u32,
}

pub const SIZEOF_HEADER_64: usize = 32;

/// A unified Mach-O header
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Header {
    pub magic: u32,
    pub cputype: u32,
    pub cpusubtype: u32,
    pub filetype: u32,
    pub ncmds: u32,
    pub sizeofcmds: u32,
    pub flags: u32,
    pub reserved: u32,
}

impl Header {
    /// Classify the four thin magics into `(container, endianness)`; fat
    /// containers and anything else are rejected here
    pub fn ctx_for_magic(magic: u32) -> error::Result<Ctx> {
        match magic {
            MH_MAGIC => Ok(Ctx::new(Container::Little, Endian::Little)),
            MH_MAGIC_64 => Ok(Ctx::new(Container::Big, Endian::Little)),
            MH_CIGAM => Ok(Ctx::new(Container::Little, Endian::Big)),
            MH_CIGAM_64 => Ok(Ctx::new(Container::Big, Endian::Big)),
            FAT_MAGIC | FAT_CIGAM => Err(error::Error::Unsupported(
                "fat Mach-O container; only thin binaries are handled".into(),
            )),
            magic => Err(error::Error::BadMagic(u64::from(magic))),
        }
    }

    /// Parse the header at the start of `bytes`, returning it with the ctx
    /// every later read must use
    pub fn parse(bytes: &[u8]) -> error::Result<(Header, Ctx)> {
        let magic: u32 = bytes.pread_with(0, scroll::LE)?;
        let ctx = Header::ctx_for_magic(magic)?;
        let header = if ctx.is_big() {
            Header::from(bytes.pread_with::<Header64>(0, ctx.le)?)
        } else {
            Header::from(bytes.pread_with::<Header32>(0, ctx.le)?)
        };
        Ok((header, ctx))
    }

    /// Header size for this word size: the 64-bit variant carries a trailing
    /// reserved word
    pub fn size(ctx: &Ctx) -> usize {
        match ctx.container {
            Container::Little => SIZEOF_HEADER_32,
            Container::Big => SIZEOF_HEADER_64,
        }
    }
}

impl From<Header32> for Header {
    fn from(h: Header32) -> Self {
        Header {
            magic: h.magic,
            cputype: h.cputype,
            cpusubtype: h.cpusubtype,
            filetype: h.filetype,
            ncmds: h.ncmds,
            sizeofcmds: h.sizeofcmds,
            flags: h.flags,
            reserved: 0,
        }
    }
}

impl From<Header64> for Header {
    fn from(h: Header64) -> Self {
        Header {
            magic: h.magic,
            cputype: h.cputype,
            cpusubtype: h.cpusubtype,
            filetype: h.filetype,
            ncmds: h.ncmds,
            sizeofcmds: h.sizeofcmds,
            flags: h.flags,
            reserved: h.reserved,
        }
    }
}

impl From<Header> for Header32 {
    fn from(h: Header) -> Self {
        Header32 {
            magic: h.magic,
            cputype: h.cputype,
            cpusubtype: h.cpusubtype,
            filetype: h.filetype,
            ncmds: h.ncmds,
            sizeofcmds: h.sizeofcmds,
            flags: h.flags,
        }
    }
}

impl From<Header> for Header64 {
    fn from(h: Header) -> Self {
        Header64 {
            magic: h.magic,
            cputype: h.cputype,
            cpusubtype: h.cpusubtype,
            filetype: h.filetype,
            ncmds: h.ncmds,
            sizeofcmds: h.sizeofcmds,
            flags: h.flags,
            reserved: h.reserved,
        }
    }
}

impl ctx::SizeWith<Ctx> for Header {
    fn size_with(ctx: &Ctx) -> usize {
        Header::size(ctx)
    }
}

impl ctx::TryIntoCtx<Ctx> for Header {
    type Error = scroll::Error;
    fn try_into_ctx(self, bytes: &mut [u8], ctx: Ctx) -> Result<usize, Self::Error> {
        match ctx.container {
            Container::Little => bytes.pwrite_with(Header32::from(self), 0, ctx.le),
            Container::Big => bytes.pwrite_with(Header64::from(self), 0, ctx.le),
        }
    }
}
