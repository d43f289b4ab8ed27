//! Load commands: the `(cmd, cmdsize)` tagged records following the
//! header, of which we walk segments, the symtab, dylib references, rpaths
//! and the build-version stamp.

use scroll::{Pread, Pwrite, SizeWith};

/// Set on commands the dynamic linker must understand
pub const LC_REQ_DYLD: u32 = 0x8000_0000;

pub const LC_SEGMENT: u32 = 0x1;
pub const LC_SYMTAB: u32 = 0x2;
pub const LC_LOAD_DYLIB: u32 = 0xc;
pub const LC_ID_DYLIB: u32 = 0xd;
pub const LC_LOAD_WEAK_DYLIB: u32 = 0x18 | LC_REQ_DYLD;
pub const LC_SEGMENT_64: u32 = 0x19;
pub const LC_RPATH: u32 = 0x1c | LC_REQ_DYLD;
pub const LC_REEXPORT_DYLIB: u32 = 0x1f | LC_REQ_DYLD;
pub const LC_BUILD_VERSION: u32 = 0x32;

pub const VM_PROT_READ: u32 = 0x1;
pub const VM_PROT_WRITE: u32 = 0x2;
pub const VM_PROT_EXECUTE: u32 = 0x4;

pub const SECTION_TYPE_REGULAR: u32 = 0x0;
pub const SECTION_ATTR_SOME_INSTRUCTIONS: u32 = 0x400;

#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pread, Pwrite, SizeWith)]
/// Occurs at the beginning of every load command, a sort of tagged-union
/// discriminant
pub struct LoadCommandHeader {
    pub cmd: u32,
    pub cmdsize: u32,
}

pub const SIZEOF_LOAD_COMMAND: usize = 8;

pub fn cmd_to_str(cmd: u32) -> &'static str {
    match cmd {
        LC_SEGMENT => "LC_SEGMENT",
        LC_SYMTAB => "LC_SYMTAB",
        LC_LOAD_DYLIB => "LC_LOAD_DYLIB",
        LC_ID_DYLIB => "LC_ID_DYLIB",
        LC_LOAD_WEAK_DYLIB => "LC_LOAD_WEAK_DYLIB",
        LC_SEGMENT_64 => "LC_SEGMENT_64",
        LC_RPATH => "LC_RPATH",
        LC_REEXPORT_DYLIB => "LC_REEXPORT_DYLIB",
        LC_BUILD_VERSION => "LC_BUILD_VERSION",
        _ => "LC_UNKNOWN",
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pread, Pwrite, SizeWith)]
pub struct SegmentCommand32 {
    pub cmd: u32,
    pub cmdsize: u32,
    pub segname: [u8; 16],
    pub vmaddr: u32,
    pub vmsize: u32,
    pub fileoff: u32,
    pub filesize: u32,
    pub maxprot: u32,
    pub initprot: u32,
    pub nsects: u32,
    pub flags: u32,
}

pub const SIZEOF_SEGMENT_COMMAND_32: usize = 56;

#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pread, Pwrite, SizeWith)]
pub struct SegmentCommand64 {
    pub cmd: u32,
    pub cmdsize: u32,
    pub segname: [u8; 16],
    pub vmaddr: u64,
    pub vmsize: u64,
    pub fileoff: u64,
    pub filesize: u64,
    pub maxprot: u32,
    pub initprot: u32,
    pub nsects: u32,
    pub flags: u32,
}

pub const SIZEOF_SEGMENT_COMMAND_64: usize = 72;

#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pread, Pwrite, SizeWith)]
pub struct Section32 {
    /// name of this section
    pub sectname: [u8; 16],
    /// segment this section goes in
    pub segname: [u8; 16],
    pub addr: u32,
    pub size: u32,
    pub offset: u32,
    /// section alignment (power of 2)
    pub align: u32,
    pub reloff: u32,
    pub nreloc: u32,
    pub flags: u32,
    pub reserved1: u32,
    pub reserved2: u32,
}

pub const SIZEOF_SECTION_32: usize = 68;

#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pread, Pwrite, SizeWith)]
pub struct Section64 {
    pub sectname: [u8; 16],
    pub segname: [u8; 16],
    pub addr: u64,
    pub size: u64,
    pub offset: u32,
    pub align: u32,
    pub reloff: u32,
    pub nreloc: u32,
    pub flags: u32,
    pub reserved1: u32,
    pub reserved2: u32,
    pub reserved3: u32,
}

pub const SIZEOF_SECTION_64: usize = 80;

#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pread, Pwrite, SizeWith)]
pub struct SymtabCommand {
    pub cmd: u32,
    pub cmdsize: u32,
    /// file offset of the nlist array
    pub symoff: u32,
    pub nsyms: u32,
    /// file offset of the string table
    pub stroff: u32,
    pub strsize: u32,
}

pub const SIZEOF_SYMTAB_COMMAND: usize = 24;

#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pread, Pwrite, SizeWith)]
pub struct Dylib {
    /// offset of the path string, from the start of the containing command
    pub name: u32,
    pub timestamp: u32,
    pub current_version: u32,
    pub compatibility_version: u32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pread, Pwrite, SizeWith)]
pub struct DylibCommand {
    pub cmd: u32,
    pub cmdsize: u32,
    pub dylib: Dylib,
}

pub const SIZEOF_DYLIB_COMMAND: usize = 24;

#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pread, Pwrite, SizeWith)]
pub struct RpathCommand {
    pub cmd: u32,
    pub cmdsize: u32,
    /// offset of the path string, from the start of this command
    pub path: u32,
}

pub const SIZEOF_RPATH_COMMAND: usize = 12;

#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pread, Pwrite, SizeWith)]
pub struct BuildVersionCommand {
    pub cmd: u32,
    pub cmdsize: u32,
    pub platform: u32,
    /// minimum OS version, nibble-packed `(major << 16) | (minor << 8) | patch`
    pub minos: u32,
    pub sdk: u32,
    pub ntools: u32,
}

pub const SIZEOF_BUILD_VERSION_COMMAND: usize = 24;

/// NUL-pad a segment or section name into its fixed 16-byte field
pub fn pad_name(name: &str) -> [u8; 16] {
    let mut padded = [0u8; 16];
    let len = name.len().min(16);
    padded[..len].copy_from_slice(&name.as_bytes()[..len]);
    padded
}
