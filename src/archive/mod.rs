//! Implements a parser and extractor for Unix archives and their MSVC
//! `.lib` descendant.
//!
//! All dialects share the 60-byte member header; they differ in name
//! semantics: SysV/MSVC short names end in `/`, `//` holds the long-name
//! string table that `/<offset>` members reference, `/` is a symbol-table
//! member, and BSD/Xcode archives store `#1/N` names in the first `N`
//! bytes of the member data. The MSVC second linker member additionally
//! maps each exported symbol to the archive offset of its defining member;
//! that map backs symbol synthesis for import-library members whose COFF
//! payload carries no symbol table of its own.

use crate::error::{Error, Result};
use crate::symbol::{ObjectSymbols, Symbol};
use crate::{elf, mach, pe, Format};
use scroll::Pread;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

pub const SIZEOF_MAGIC: usize = 8;
/// The magic number of a Unix archive
pub const MAGIC: &[u8; SIZEOF_MAGIC] = b"!<arch>\x0A";

#[repr(C)]
#[derive(Debug, Clone, Copy)]
/// A Unix archive member header: all fields are right-padded ASCII, the
/// size decimal, the mode octal, ending in the `` `\n `` terminator
pub struct MemberHeader {
    /// member name, `/`-terminated in SysV archives
    pub identifier: [u8; 16],
    /// modification timestamp, decimal
    pub timestamp: [u8; 12],
    pub owner_id: [u8; 6],
    pub group_id: [u8; 6],
    /// permissions, octal
    pub mode: [u8; 8],
    /// member size in bytes, decimal; BSD extended names count toward it
    pub size: [u8; 10],
    /// always `` `\n ``
    pub terminator: [u8; 2],
}

// an all-bytes record, safe to view in place
unsafe impl plain::Plain for MemberHeader {}

pub const SIZEOF_MEMBER_HEADER: usize = 60;
pub const MEMBER_TERMINATOR: [u8; 2] = [0x60, 0x0a];

impl MemberHeader {
    pub fn parse(bytes: &[u8], offset: usize) -> Result<&MemberHeader> {
        let end = offset
            .checked_add(SIZEOF_MEMBER_HEADER)
            .filter(|&end| end <= bytes.len())
            .ok_or_else(|| {
                Error::Malformed(format!("archive member header at {:#x} is truncated", offset))
            })?;
        plain::from_bytes(&bytes[offset..end])
            .map_err(|_| Error::Malformed(format!("archive member header at {:#x}", offset)))
    }

    /// The decimal size field, tolerating space and NUL padding
    pub fn size(&self) -> Result<usize> {
        parse_decimal(&self.size).ok_or_else(|| {
            Error::Malformed(format!(
                "invalid archive member size {:?}",
                String::from_utf8_lossy(&self.size)
            ))
        })
    }

    fn raw_name(&self) -> &str {
        core::str::from_utf8(&self.identifier).unwrap_or("")
    }
}

fn parse_decimal(field: &[u8]) -> Option<usize> {
    let mut value: usize = 0;
    let mut digits = 0;
    for &b in field {
        match b {
            b' ' | 0 => break,
            b'0'..=b'9' => {
                value = value.checked_mul(10)?.checked_add((b - b'0') as usize)?;
                digits += 1;
            }
            _ => return None,
        }
    }
    if digits == 0 {
        None
    } else {
        Some(value)
    }
}

/// One parsed archive member
#[derive(Debug, Clone)]
pub struct Member {
    pub name: String,
    /// archive offset of the 60-byte header; the MSVC symbol map keys on
    /// this, not on the data offset
    pub header_offset: usize,
    /// archive offset of the payload (past any BSD inline name)
    pub data_offset: usize,
    /// payload size, BSD inline name excluded
    pub size: usize,
}

impl Member {
    pub fn data<'a>(&self, bytes: &'a [u8]) -> Result<&'a [u8]> {
        let end = self
            .data_offset
            .checked_add(self.size)
            .filter(|&end| end <= bytes.len())
            .ok_or_else(|| {
                Error::Malformed(format!(
                    "member {} extends past the end of the archive",
                    self.name
                ))
            })?;
        Ok(&bytes[self.data_offset..end])
    }
}

#[derive(Debug, Default)]
pub struct Archive {
    pub members: Vec<Member>,
    /// MSVC second-linker-member index: member header offset to the symbol
    /// names attributed to it
    symbol_map: HashMap<u32, Vec<String>>,
}

impl Archive {
    pub fn parse(bytes: &[u8]) -> Result<Archive> {
        let mut offset = check_magic(bytes)?;
        let mut archive = Archive::default();
        let mut longnames: Vec<u8> = Vec::new();
        while offset + SIZEOF_MEMBER_HEADER <= bytes.len() {
            let header_offset = offset;
            let header = MemberHeader::parse(bytes, offset)?;
            if header.terminator != MEMBER_TERMINATOR {
                break;
            }
            let member_size = match header.size() {
                Ok(size) => size,
                Err(_) => break,
            };
            offset += SIZEOF_MEMBER_HEADER;
            let mut data_offset = offset;
            let mut data_size = member_size;
            let raw = header.raw_name();

            let name = if raw.starts_with("//") {
                // the long-name string table; later members reference into it
                let end = (data_offset + member_size).min(bytes.len());
                longnames = bytes[data_offset..end].to_vec();
                None
            } else if raw.starts_with('/') && raw[1..].starts_with(|c: char| c.is_ascii_digit()) {
                let table_offset = parse_decimal(&raw.as_bytes()[1..]).unwrap_or(0);
                Some(longname_at(&longnames, table_offset))
            } else if raw.starts_with('/') {
                // the symbol-table member
                Some("/".to_string())
            } else if raw.starts_with('#') {
                // BSD `#1/N`: the name occupies the first N bytes of the data
                match bsd_name(bytes, data_offset, raw, member_size) {
                    Some((name, name_len)) => {
                        data_offset += name_len;
                        data_size = member_size.saturating_sub(name_len);
                        Some(name)
                    }
                    None => None,
                }
            } else {
                let end = raw
                    .find(|c| c == '/' || c == ' ' || c == '\0')
                    .unwrap_or(raw.len());
                Some(raw[..end].to_string())
            };

            match name {
                Some(name) if is_symbol_table(&name) || name.is_empty() => {
                    if name == "/" {
                        // maybe the MSVC second linker member; the sanity
                        // checks reject the big-endian first one
                        let end = (data_offset + data_size).min(bytes.len());
                        if let Some(map) = parse_msvc_symbol_map(&bytes[data_offset..end]) {
                            archive.symbol_map = map;
                        }
                    }
                    debug!("skipping archive symbol table member {:?}", name);
                }
                Some(name) => {
                    if data_size > 0 {
                        archive.members.push(Member {
                            name,
                            header_offset,
                            data_offset,
                            size: data_size,
                        });
                    }
                }
                None => {}
            }

            offset += member_size;
            // members start on even boundaries; a newline pads odd sizes
            if offset & 1 == 1 {
                offset += 1;
            }
        }
        Ok(archive)
    }

    /// The member a given exported symbol is defined in, from the MSVC
    /// symbol map
    pub fn member_of_symbol(&self, symbol: &str) -> Option<&str> {
        for (offset, names) in &self.symbol_map {
            if names.iter().any(|n| n == symbol) {
                return self
                    .members
                    .iter()
                    .find(|m| m.header_offset == *offset as usize)
                    .map(|m| m.name.as_str());
            }
        }
        None
    }

    /// Per-member symbol groups. Each member is format-detected and read
    /// with the matching single-file reader; a member yielding no symbols
    /// falls back to the names the MSVC symbol map attributes to it. Corrupt
    /// members are skipped, not fatal.
    pub fn symbols(&self, bytes: &[u8]) -> Result<Vec<ObjectSymbols>> {
        let mut groups = Vec::new();
        for member in &self.members {
            let data = match member.data(bytes) {
                Ok(data) => data,
                Err(_) => {
                    warn!("archive member {} is truncated, skipping", member.name);
                    continue;
                }
            };
            let symbols = match Format::detect(data) {
                Format::Coff => pe::Coff::parse(data).and_then(|coff| coff.symbols(data)),
                Format::Elf => elf::Elf::parse(data).and_then(|elf| elf.symbols(data)),
                Format::MachO => mach::MachO::parse(data).and_then(|macho| macho.symbols(data)),
                _ => Ok(Vec::new()),
            };
            let mut symbols = match symbols {
                Ok(symbols) => symbols,
                Err(err) => {
                    warn!("cannot read symbols of member {}: {}", member.name, err);
                    Vec::new()
                }
            };
            if symbols.is_empty() {
                if let Some(names) = self.symbol_map.get(&(member.header_offset as u32)) {
                    symbols = names.iter().map(|name| Symbol::new(name.clone(), 'T')).collect();
                }
            }
            if !symbols.is_empty() {
                groups.push(ObjectSymbols {
                    objectfile: member.name.clone(),
                    symbols,
                });
            }
        }
        Ok(groups)
    }

    /// Extract every member into `outdir`, creating it (and any parent
    /// directories a member path needs) as necessary. An existing target
    /// gets `_<N>` appended before its extension, giving up after 10000
    /// attempts.
    pub fn extract(&self, bytes: &[u8], outdir: &Path) -> Result<()> {
        fs::create_dir_all(outdir)?;
        for member in &self.members {
            let data = member.data(bytes)?;
            let path = unique_output_path(outdir, &member.name)?;
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(&path, data)?;
        }
        Ok(())
    }
}

fn check_magic(bytes: &[u8]) -> Result<usize> {
    if bytes.len() < SIZEOF_MAGIC {
        return Err(Error::Malformed("archive shorter than its magic".into()));
    }
    if &bytes[..7] != b"!<arch>" {
        let magic: u64 = bytes.pread_with(0, scroll::LE)?;
        return Err(Error::BadMagic(magic));
    }
    match bytes[7] {
        b'\n' => Ok(SIZEOF_MAGIC),
        // archives produced on Windows may carry a CRLF
        b'\r' if bytes.get(8) == Some(&b'\n') => Ok(SIZEOF_MAGIC + 1),
        _ => {
            let magic: u64 = bytes.pread_with(0, scroll::LE)?;
            Err(Error::BadMagic(magic))
        }
    }
}

fn is_symbol_table(name: &str) -> bool {
    name == "/" || name == "//" || name.starts_with("__.SYMDEF")
}

/// A NUL- (or `\n`-) delimited name out of the `//` long-name table
fn longname_at(longnames: &[u8], offset: usize) -> String {
    if offset >= longnames.len() {
        return String::new();
    }
    let region = &longnames[offset..];
    let len = region
        .iter()
        .position(|&b| b == 0 || b == b'\n')
        .unwrap_or(region.len());
    let name = String::from_utf8_lossy(&region[..len]);
    // SysV long names are `/`-terminated inside the table
    name.strip_suffix('/').unwrap_or(&name).to_string()
}

/// Decode a BSD `#1/N` name stored at the head of the member data,
/// returning the name and how many data bytes it consumed
fn bsd_name(bytes: &[u8], data_offset: usize, raw: &str, member_size: usize) -> Option<(String, usize)> {
    let slash = raw.find('/')?;
    let name_len = parse_decimal(raw.as_bytes().get(slash + 1..)?)?;
    if name_len == 0 || name_len > member_size {
        return None;
    }
    let end = data_offset.checked_add(name_len)?;
    if end > bytes.len() {
        return None;
    }
    let region = &bytes[data_offset..end];
    let trimmed = region.iter().position(|&b| b == 0).unwrap_or(region.len());
    Some((String::from_utf8_lossy(&region[..trimmed]).into_owned(), name_len))
}

/// Parse the MSVC second linker member:
/// `(num_members u32 LE, offsets[], num_symbols u32 LE, indices[] u16 LE,
/// string table)`. Returns `None` (leaving the caller to skip the member)
/// when the sanity checks reject the layout, which is how the big-endian
/// first linker member falls through.
fn parse_msvc_symbol_map(data: &[u8]) -> Option<HashMap<u32, Vec<String>>> {
    let mut offset = 0usize;
    let num_members: u32 = data.pread_with(offset, scroll::LE).ok()?;
    offset += 4;
    if num_members == 0 || num_members > 65536 || num_members as usize * 4 >= data.len() {
        return None;
    }
    let mut offsets = Vec::with_capacity(num_members as usize);
    for _ in 0..num_members {
        offsets.push(data.pread_with::<u32>(offset, scroll::LE).ok()?);
        offset += 4;
    }
    let num_symbols: u32 = data.pread_with(offset, scroll::LE).ok()?;
    offset += 4;
    if num_symbols == 0 || num_symbols > 1_000_000 {
        return None;
    }
    let mut indices = Vec::with_capacity(num_symbols as usize);
    for _ in 0..num_symbols {
        indices.push(data.pread_with::<u16>(offset, scroll::LE).ok()?);
        offset += 2;
    }
    let strings = data.get(offset..)?;
    let mut map: HashMap<u32, Vec<String>> = HashMap::new();
    let mut cursor = 0usize;
    for &index in &indices {
        if cursor >= strings.len() {
            break;
        }
        let region = &strings[cursor..];
        let len = region.iter().position(|&b| b == 0).unwrap_or(region.len());
        let name = String::from_utf8_lossy(&region[..len]).into_owned();
        cursor += len + 1;
        if index > 0 && u32::from(index) <= num_members {
            let member_offset = offsets[index as usize - 1];
            map.entry(member_offset).or_default().push(name);
        }
    }
    Some(map)
}

/// First free output path for `name` under `outdir`: the name itself, then
/// `name_1`, `name_2`, ... before the extension, giving up at 10000
fn unique_output_path(outdir: &Path, name: &str) -> Result<PathBuf> {
    let candidate = outdir.join(name);
    if !candidate.exists() {
        return Ok(candidate);
    }
    let (stem, ext) = match name.rfind('.') {
        Some(dot) => (&name[..dot], &name[dot..]),
        None => (name, ""),
    };
    for id in 1..10000u32 {
        let candidate = outdir.join(format!("{}_{}{}", stem, id, ext));
        if !candidate.exists() {
            return Ok(candidate);
        }
    }
    Err(Error::Conflict(format!(
        "no free output name for archive member {} in {}",
        name,
        outdir.display()
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn member(name_field: &str, data: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(format!("{:<16}", name_field).as_bytes());
        out.extend_from_slice(b"0           ");
        out.extend_from_slice(b"0     ");
        out.extend_from_slice(b"0     ");
        out.extend_from_slice(b"644     ");
        out.extend_from_slice(format!("{:<10}", data.len()).as_bytes());
        out.extend_from_slice(&MEMBER_TERMINATOR);
        out.extend_from_slice(data);
        if data.len() & 1 == 1 {
            out.push(b'\n');
        }
        out
    }

    fn archive_of(members: &[(&str, &[u8])]) -> Vec<u8> {
        let mut out = MAGIC.to_vec();
        for (name, data) in members {
            out.extend(member(name, data));
        }
        out
    }

    #[test]
    fn parses_sysv_short_names() {
        let bytes = archive_of(&[("a.o/", b"xx"), ("b.o/", b"yyy")]);
        let archive = Archive::parse(&bytes).unwrap();
        assert_eq!(archive.members.len(), 2);
        assert_eq!(archive.members[0].name, "a.o");
        assert_eq!(archive.members[1].name, "b.o");
        assert_eq!(archive.members[1].size, 3);
        // odd member data is newline-padded to an even boundary
        assert_eq!(archive.members[1].data_offset % 2, 0);
    }

    #[test]
    fn resolves_longnames() {
        let table = b"very_long_member_name.o/\nanother_long_one.o/\n";
        let bytes = archive_of(&[("//", table), ("/0", b"ab"), ("/25", b"cd")]);
        let archive = Archive::parse(&bytes).unwrap();
        assert_eq!(archive.members.len(), 2);
        assert_eq!(archive.members[0].name, "very_long_member_name.o");
        assert_eq!(archive.members[1].name, "another_long_one.o");
    }

    #[test]
    fn reads_bsd_inline_names() {
        let mut data = b"bsd_member.o\0\0\0\0".to_vec();
        data.extend_from_slice(b"PAYLOAD!");
        let bytes = archive_of(&[("#1/16", &data)]);
        let archive = Archive::parse(&bytes).unwrap();
        assert_eq!(archive.members.len(), 1);
        assert_eq!(archive.members[0].name, "bsd_member.o");
        assert_eq!(archive.members[0].size, 8);
        assert_eq!(archive.members[0].data(&bytes).unwrap(), b"PAYLOAD!");
    }

    #[test]
    fn msvc_symbol_map_attributes_members() {
        // second linker member: 1 member at header offset 100, 2 symbols
        let mut linker = Vec::new();
        linker.extend_from_slice(&1u32.to_le_bytes());
        linker.extend_from_slice(&100u32.to_le_bytes());
        linker.extend_from_slice(&2u32.to_le_bytes());
        linker.extend_from_slice(&1u16.to_le_bytes());
        linker.extend_from_slice(&1u16.to_le_bytes());
        linker.extend_from_slice(b"ExportedA\0ExportedB\0");
        let map = parse_msvc_symbol_map(&linker).unwrap();
        assert_eq!(
            map.get(&100).unwrap(),
            &vec!["ExportedA".to_string(), "ExportedB".to_string()]
        );
    }

    #[test]
    fn first_linker_member_is_rejected_by_sanity_checks() {
        // the SysV/first linker member is big-endian; a huge LE count trips
        // the bounds
        let mut linker = Vec::new();
        linker.extend_from_slice(&2u32.to_be_bytes());
        linker.extend_from_slice(&100u32.to_be_bytes());
        linker.extend_from_slice(&200u32.to_be_bytes());
        linker.extend_from_slice(b"a\0b\0");
        assert!(parse_msvc_symbol_map(&linker).is_none());
    }

    #[test]
    fn symbol_table_members_are_skipped() {
        let bytes = archive_of(&[("/", b"\0\0\0\0"), ("__.SYMDEF", b"xx"), ("real.o/", b"zz")]);
        let archive = Archive::parse(&bytes).unwrap();
        assert_eq!(archive.members.len(), 1);
        assert_eq!(archive.members[0].name, "real.o");
    }

    #[test]
    fn crlf_magic_is_accepted() {
        let mut bytes = b"!<arch>\r\n".to_vec();
        bytes.extend(member("m.o/", b"qq"));
        let archive = Archive::parse(&bytes).unwrap();
        assert_eq!(archive.members.len(), 1);
    }
}
