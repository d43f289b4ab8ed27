//! The ELF file header, in both widths, plus the ident constants the
//! detector and context builder key off.

use crate::container::{Container, Ctx};
use crate::error;
use scroll::{ctx, Endian, Pread, Pwrite, SizeWith};

/// ELF magic number
pub const ELFMAG: &[u8; 4] = b"\x7fELF";

/// File class byte index
pub const EI_CLASS: usize = 4;
pub const ELFCLASS32: u8 = 1;
pub const ELFCLASS64: u8 = 2;

/// Data encoding byte index
pub const EI_DATA: usize = 5;
pub const ELFDATA2LSB: u8 = 1;
pub const ELFDATA2MSB: u8 = 2;

/// File version byte index
pub const EI_VERSION: usize = 6;
pub const EV_CURRENT: u8 = 1;

pub const SIZEOF_IDENT: usize = 16;

/// Relocatable file
pub const ET_REL: u16 = 1;
/// Executable file
pub const ET_EXEC: u16 = 2;
/// Shared object file
pub const ET_DYN: u16 = 3;

#[repr(C)]
#[derive(Clone, Copy, Default, PartialEq, Debug, Pread, Pwrite, SizeWith)]
pub struct Header32 {
    pub e_ident: [u8; 16],
    pub e_type: u16,
    pub e_machine: u16,
    pub e_version: u32,
    pub e_entry: u32,
    pub e_phoff: u32,
    pub e_shoff: u32,
    pub e_flags: u32,
    pub e_ehsize: u16,
    pub e_phentsize: u16,
    pub e_phnum: u16,
    pub e_shentsize: u16,
    pub e_shnum: u16,
    pub e_shstrndx: u16,
}

pub const SIZEOF_EHDR32: usize = 52;

#[repr(C)]
#[derive(Clone, Copy, Default, PartialEq, Debug, Pread, Pwrite, SizeWith)]
pub struct Header64 {
    pub e_ident: [u8; 16],
    pub e_type: u16,
    pub e_machine: u16,
    pub e_version: u32,
    pub e_entry: u64,
    pub e_phoff: u64,
    pub e_shoff: u64,
    pub e_flags: u32,
    pub e_ehsize: u16,
    pub e_phentsize: u16,
    pub e_phnum: u16,
    pub e_shentsize: u16,
    pub e_shnum: u16,
    pub e_shstrndx: u16,
}

pub const SIZEOF_EHDR64: usize = 64;

/// A unified ELF header, independent of the file's word size
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Header {
    pub e_ident: [u8; SIZEOF_IDENT],
    pub e_type: u16,
    pub e_machine: u16,
    pub e_version: u32,
    pub e_entry: u64,
    pub e_phoff: u64,
    pub e_shoff: u64,
    pub e_flags: u32,
    pub e_ehsize: u16,
    pub e_phentsize: u16,
    pub e_phnum: u16,
    pub e_shentsize: u16,
    pub e_shnum: u16,
    pub e_shstrndx: u16,
}

impl Header {
    /// The word size recorded in the ident
    pub fn container(&self) -> error::Result<Container> {
        match self.e_ident[EI_CLASS] {
            ELFCLASS32 => Ok(Container::Little),
            ELFCLASS64 => Ok(Container::Big),
            class => Err(error::Error::Malformed(format!(
                "Invalid ELF class {:#x}",
                class
            ))),
        }
    }

    /// The byte order recorded in the ident
    pub fn endianness(&self) -> error::Result<Endian> {
        match self.e_ident[EI_DATA] {
            ELFDATA2LSB => Ok(Endian::Little),
            ELFDATA2MSB => Ok(Endian::Big),
            data => Err(error::Error::Malformed(format!(
                "Invalid ELF data encoding {:#x}",
                data
            ))),
        }
    }

    pub fn ctx(&self) -> error::Result<Ctx> {
        Ok(Ctx::new(self.container()?, self.endianness()?))
    }

    /// Parse the header at the start of `bytes`, picking the 32- or 64-bit
    /// layout and byte order from the ident
    pub fn parse(bytes: &[u8]) -> error::Result<Header> {
        if bytes.len() < SIZEOF_IDENT {
            return Err(error::Error::Malformed(
                "ELF ident extends past the end of the file".into(),
            ));
        }
        if &bytes[0..4] != ELFMAG {
            let magic: u64 = bytes.pread_with(0, scroll::LE)?;
            return Err(error::Error::BadMagic(magic));
        }
        let le = match bytes[EI_DATA] {
            ELFDATA2LSB => Endian::Little,
            ELFDATA2MSB => Endian::Big,
            data => {
                return Err(error::Error::Malformed(format!(
                    "Invalid ELF data encoding {:#x}",
                    data
                )))
            }
        };
        match bytes[EI_CLASS] {
            ELFCLASS32 => Ok(Header::from(bytes.pread_with::<Header32>(0, le)?)),
            ELFCLASS64 => Ok(Header::from(bytes.pread_with::<Header64>(0, le)?)),
            class => Err(error::Error::Malformed(format!(
                "Invalid ELF class {:#x}",
                class
            ))),
        }
    }

    /// A fresh little-endian header with the ident and size fields filled in
    /// for the given word size, used by the object writer
    pub fn new(ctx: Ctx) -> Header {
        let mut e_ident = [0; SIZEOF_IDENT];
        e_ident[0..4].copy_from_slice(ELFMAG);
        e_ident[EI_CLASS] = if ctx.is_big() { ELFCLASS64 } else { ELFCLASS32 };
        e_ident[EI_DATA] = ELFDATA2LSB;
        e_ident[EI_VERSION] = EV_CURRENT;
        let (e_ehsize, e_shentsize) = if ctx.is_big() {
            (
                SIZEOF_EHDR64 as u16,
                super::section_header::SIZEOF_SHDR64 as u16,
            )
        } else {
            (
                SIZEOF_EHDR32 as u16,
                super::section_header::SIZEOF_SHDR32 as u16,
            )
        };
        Header {
            e_ident,
            e_version: 1,
            e_ehsize,
            e_shentsize,
            ..Default::default()
        }
    }
}

impl From<Header32> for Header {
    fn from(h: Header32) -> Self {
        Header {
            e_ident: h.e_ident,
            e_type: h.e_type,
            e_machine: h.e_machine,
            e_version: h.e_version,
            e_entry: u64::from(h.e_entry),
            e_phoff: u64::from(h.e_phoff),
            e_shoff: u64::from(h.e_shoff),
            e_flags: h.e_flags,
            e_ehsize: h.e_ehsize,
            e_phentsize: h.e_phentsize,
            e_phnum: h.e_phnum,
            e_shentsize: h.e_shentsize,
            e_shnum: h.e_shnum,
            e_shstrndx: h.e_shstrndx,
        }
    }
}

impl From<Header64> for Header {
    fn from(h: Header64) -> Self {
        Header {
            e_ident: h.e_ident,
            e_type: h.e_type,
            e_machine: h.e_machine,
            e_version: h.e_version,
            e_entry: h.e_entry,
            e_phoff: h.e_phoff,
            e_shoff: h.e_shoff,
            e_flags: h.e_flags,
            e_ehsize: h.e_ehsize,
            e_phentsize: h.e_phentsize,
            e_phnum: h.e_phnum,
            e_shentsize: h.e_shentsize,
            e_shnum: h.e_shnum,
            e_shstrndx: h.e_shstrndx,
        }
    }
}

impl From<Header> for Header32 {
    fn from(h: Header) -> Self {
        Header32 {
            e_ident: h.e_ident,
            e_type: h.e_type,
            e_machine: h.e_machine,
            e_version: h.e_version,
            e_entry: h.e_entry as u32,
            e_phoff: h.e_phoff as u32,
            e_shoff: h.e_shoff as u32,
            e_flags: h.e_flags,
            e_ehsize: h.e_ehsize,
            e_phentsize: h.e_phentsize,
            e_phnum: h.e_phnum,
            e_shentsize: h.e_shentsize,
            e_shnum: h.e_shnum,
            e_shstrndx: h.e_shstrndx,
        }
    }
}

impl From<Header> for Header64 {
    fn from(h: Header) -> Self {
        Header64 {
            e_ident: h.e_ident,
            e_type: h.e_type,
            e_machine: h.e_machine,
            e_version: h.e_version,
            e_entry: h.e_entry,
            e_phoff: h.e_phoff,
            e_shoff: h.e_shoff,
            e_flags: h.e_flags,
            e_ehsize: h.e_ehsize,
            e_phentsize: h.e_phentsize,
            e_phnum: h.e_phnum,
            e_shentsize: h.e_shentsize,
            e_shnum: h.e_shnum,
            e_shstrndx: h.e_shstrndx,
        }
    }
}

impl ctx::SizeWith<Ctx> for Header {
    fn size_with(ctx: &Ctx) -> usize {
        match ctx.container {
            Container::Little => SIZEOF_EHDR32,
            Container::Big => SIZEOF_EHDR64,
        }
    }
}

impl ctx::TryIntoCtx<Ctx> for Header {
    type Error = scroll::Error;
    fn try_into_ctx(self, bytes: &mut [u8], Ctx { container, le }: Ctx) -> Result<usize, Self::Error> {
        match container {
            Container::Little => bytes.pwrite_with(Header32::from(self), 0, le),
            Container::Big => bytes.pwrite_with(Header64::from(self), 0, le),
        }
    }
}
