//! A container for the word size and endianness of the binary being parsed,
//! threaded through every 32/64-bit unified reader and writer.

use scroll::Endian;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
/// The binary's word size: `Little` is a 32-bit container, `Big` a 64-bit one
pub enum Container {
    Little,
    Big,
}

#[cfg(target_pointer_width = "32")]
/// The default word size of the machine this was compiled on
pub const CONTAINER: Container = Container::Little;

#[cfg(target_pointer_width = "64")]
/// The default word size of the machine this was compiled on
pub const CONTAINER: Container = Container::Big;

impl Container {
    /// Is this a 64-bit container?
    pub fn is_big(self) -> bool {
        self == Container::Big
    }
}

impl Default for Container {
    #[inline]
    fn default() -> Self {
        CONTAINER
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
/// A parsing context: word size plus byte order
pub struct Ctx {
    pub container: Container,
    pub le: Endian,
}

impl Ctx {
    pub fn new(container: Container, le: Endian) -> Self {
        Ctx { container, le }
    }
    /// The word size, in bytes
    pub fn size(self) -> usize {
        match self.container {
            Container::Little => 4,
            Container::Big => 8,
        }
    }
    pub fn is_big(self) -> bool {
        self.container.is_big()
    }
    pub fn is_little_endian(self) -> bool {
        self.le.is_little()
    }
}

impl From<Container> for Ctx {
    fn from(container: Container) -> Self {
        Ctx {
            container,
            le: Endian::default(),
        }
    }
}

impl From<Endian> for Ctx {
    fn from(le: Endian) -> Self {
        Ctx {
            container: CONTAINER,
            le,
        }
    }
}
