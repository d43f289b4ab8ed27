//! A byte-offset based string table.
//! Commonly used in ELF binaries, Unix archives, and COFF symbol tables.

use crate::error;
use core::fmt;
use core::str;
use scroll::{ctx, Pread};

/// A common string table format which is indexed by byte offsets (and not
/// member index). Constructed using [`parse`](Strtab::parse) with your choice
/// of delimiter.
pub struct Strtab<'a> {
    bytes: &'a [u8],
    delim: u8,
}

impl<'a> Strtab<'a> {
    /// Construct a new strtab over `bytes`, with the given `delim` terminator
    pub fn new(bytes: &'a [u8], delim: u8) -> Self {
        Strtab { bytes, delim }
    }

    /// Parse a strtab of `len` bytes from `bytes` at `offset`
    pub fn parse(bytes: &'a [u8], offset: usize, len: usize, delim: u8) -> error::Result<Strtab<'a>> {
        let end = offset
            .checked_add(len)
            .ok_or_else(|| error::Error::Malformed(format!("strtab size overflow at {:#x}", offset)))?;
        if end > bytes.len() {
            return Err(error::Error::Malformed(format!(
                "strtab at {:#x} with size {} extends past the end of the file",
                offset, len
            )));
        }
        Ok(Strtab::new(&bytes[offset..end], delim))
    }

    /// The length of the underlying byte region
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Get the string beginning at byte offset `offset`, if the offset is in
    /// bounds and the contents are valid UTF-8. A string running off the end
    /// of the table without a terminator is truncated at the table boundary.
    pub fn get_at(&self, offset: usize) -> Option<&'a str> {
        if offset >= self.bytes.len() {
            return None;
        }
        self.bytes
            .pread_with::<&str>(
                offset,
                ctx::StrCtx::DelimiterUntil(self.delim, self.bytes.len() - offset),
            )
            .ok()
    }

    /// Converts the strtab to an owned vector, splitting on the delimiter
    pub fn to_vec(&self) -> Vec<String> {
        let len = self.bytes.len();
        let mut strings = Vec::new();
        let mut i = 0;
        while i < len {
            match self.get_at(i) {
                Some(string) => {
                    i += string.len() + 1;
                    strings.push(string.to_string());
                }
                None => break,
            }
        }
        strings
    }
}

impl<'a> fmt::Debug for Strtab<'a> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Strtab")
            .field("delim", &self.delim)
            .field("bytes", &str::from_utf8(self.bytes))
            .finish()
    }
}

impl<'a> Default for Strtab<'a> {
    fn default() -> Strtab<'a> {
        Strtab::new(&[], 0x0)
    }
}
