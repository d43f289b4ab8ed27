//! ELF symbol table entries and the nm-style classification applied to
//! them.

use crate::container::{Container, Ctx};
use scroll::{ctx, Pread, Pwrite, SizeWith};

/// Local symbol
pub const STB_LOCAL: u8 = 0;
/// Global symbol
pub const STB_GLOBAL: u8 = 1;
/// Weak symbol
pub const STB_WEAK: u8 = 2;

/// Symbol type is unspecified
pub const STT_NOTYPE: u8 = 0;
/// Symbol is a data object
pub const STT_OBJECT: u8 = 1;
/// Symbol is a code object
pub const STT_FUNC: u8 = 2;
/// Symbol associated with a section
pub const STT_SECTION: u8 = 3;
/// Symbol's name is a file name
pub const STT_FILE: u8 = 4;

#[inline(always)]
pub fn st_bind(info: u8) -> u8 {
    info >> 4
}

#[inline(always)]
pub fn st_type(info: u8) -> u8 {
    info & 0xf
}

#[inline(always)]
pub fn st_info(bind: u8, typ: u8) -> u8 {
    (bind << 4) | (typ & 0xf)
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, Pread, Pwrite, SizeWith)]
pub struct Sym32 {
    pub st_name: u32,
    pub st_value: u32,
    pub st_size: u32,
    pub st_info: u8,
    pub st_other: u8,
    pub st_shndx: u16,
}

pub const SIZEOF_SYM32: usize = 16;

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, Pread, Pwrite, SizeWith)]
pub struct Sym64 {
    pub st_name: u32,
    pub st_info: u8,
    pub st_other: u8,
    pub st_shndx: u16,
    pub st_value: u64,
    pub st_size: u64,
}

pub const SIZEOF_SYM64: usize = 24;

/// A unified symbol table entry
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Sym {
    pub st_name: u32,
    pub st_info: u8,
    pub st_other: u8,
    pub st_shndx: u16,
    pub st_value: u64,
    pub st_size: u64,
}

impl Sym {
    pub fn st_bind(&self) -> u8 {
        st_bind(self.st_info)
    }

    pub fn st_type(&self) -> u8 {
        st_type(self.st_info)
    }

    pub fn is_undefined(&self) -> bool {
        self.st_shndx == 0
    }

    /// The nm-style type letter. Undefined symbols are `U`; functions map to
    /// `T`/`t`, data objects to `D`/`d`, everything else to `S`/`s`, with
    /// case selected by the global bind.
    pub fn type_char(&self) -> char {
        if self.is_undefined() {
            return 'U';
        }
        let global = self.st_bind() == STB_GLOBAL;
        match self.st_type() {
            STT_FUNC => {
                if global {
                    'T'
                } else {
                    't'
                }
            }
            STT_OBJECT => {
                if global {
                    'D'
                } else {
                    'd'
                }
            }
            _ => {
                if global {
                    'S'
                } else {
                    's'
                }
            }
        }
    }
}

impl From<Sym32> for Sym {
    fn from(sym: Sym32) -> Self {
        Sym {
            st_name: sym.st_name,
            st_info: sym.st_info,
            st_other: sym.st_other,
            st_shndx: sym.st_shndx,
            st_value: u64::from(sym.st_value),
            st_size: u64::from(sym.st_size),
        }
    }
}

impl From<Sym64> for Sym {
    fn from(sym: Sym64) -> Self {
        Sym {
            st_name: sym.st_name,
            st_info: sym.st_info,
            st_other: sym.st_other,
            st_shndx: sym.st_shndx,
            st_value: sym.st_value,
            st_size: sym.st_size,
        }
    }
}

impl From<Sym> for Sym32 {
    fn from(sym: Sym) -> Self {
        Sym32 {
            st_name: sym.st_name,
            st_value: sym.st_value as u32,
            st_size: sym.st_size as u32,
            st_info: sym.st_info,
            st_other: sym.st_other,
            st_shndx: sym.st_shndx,
        }
    }
}

impl From<Sym> for Sym64 {
    fn from(sym: Sym) -> Self {
        Sym64 {
            st_name: sym.st_name,
            st_info: sym.st_info,
            st_other: sym.st_other,
            st_shndx: sym.st_shndx,
            st_value: sym.st_value,
            st_size: sym.st_size,
        }
    }
}

impl ctx::SizeWith<Ctx> for Sym {
    fn size_with(ctx: &Ctx) -> usize {
        match ctx.container {
            Container::Little => SIZEOF_SYM32,
            Container::Big => SIZEOF_SYM64,
        }
    }
}

impl<'a> ctx::TryFromCtx<'a, Ctx> for Sym {
    type Error = scroll::Error;
    fn try_from_ctx(bytes: &'a [u8], Ctx { container, le }: Ctx) -> Result<(Self, usize), Self::Error> {
        match container {
            Container::Little => Ok((bytes.pread_with::<Sym32>(0, le)?.into(), SIZEOF_SYM32)),
            Container::Big => Ok((bytes.pread_with::<Sym64>(0, le)?.into(), SIZEOF_SYM64)),
        }
    }
}

impl ctx::TryIntoCtx<Ctx> for Sym {
    type Error = scroll::Error;
    fn try_into_ctx(self, bytes: &mut [u8], Ctx { container, le }: Ctx) -> Result<usize, Self::Error> {
        match container {
            Container::Little => bytes.pwrite_with(Sym32::from(self), 0, le),
            Container::Big => bytes.pwrite_with(Sym64::from(self), 0, le),
        }
    }
}
