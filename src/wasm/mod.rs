//! The WebAssembly reader: a section iterator over the LEB128-framed
//! module, extracting nm-style symbols from imports, exports and the
//! `linking`/`name` custom sections.

use crate::error::{Error, Result};
use crate::symbol::Symbol;
use scroll::Uleb128;

/// `\0asm` followed by version 1
pub const WASM_MAGIC: &[u8; 8] = b"\0asm\x01\0\0\0";

pub const SECTION_CUSTOM: u8 = 0;
pub const SECTION_IMPORT: u8 = 2;
pub const SECTION_EXPORT: u8 = 7;

pub const KIND_FUNC: u8 = 0;
pub const KIND_TABLE: u8 = 1;
pub const KIND_MEMORY: u8 = 2;
pub const KIND_GLOBAL: u8 = 3;
pub const KIND_TAG: u8 = 4;

/// limits flag: a maximum follows the minimum
pub const LIMITS_HAS_MAX: u32 = 0x01;
/// limits flag: memory64, lengths are 64-bit LEBs
pub const LIMITS_MEM64: u32 = 0x04;

pub const LINKING_SUBSEC_SYMTAB: u8 = 8;

pub const SYMTAB_KIND_FUNCTION: u8 = 0;
pub const SYMTAB_KIND_DATA: u8 = 1;
pub const SYMTAB_KIND_GLOBAL: u8 = 2;
pub const SYMTAB_KIND_SECTION: u8 = 3;
pub const SYMTAB_KIND_EVENT: u8 = 4;
pub const SYMTAB_KIND_TABLE: u8 = 5;
pub const SYMTAB_KIND_TAG: u8 = 6;

pub const SYMTAB_FLAG_UNDEFINED: u32 = 0x10;

/// A `u32` LEB must terminate within 5 bytes
fn read_leb_u32(bytes: &[u8], offset: &mut usize) -> Result<u32> {
    let start = *offset;
    let value = Uleb128::read(bytes, offset)?;
    if *offset - start > 5 || value > u64::from(u32::MAX) {
        return Err(Error::Malformed(format!(
            "LEB128 u32 at {:#x} is out of range",
            start
        )));
    }
    Ok(value as u32)
}

/// A `u64` LEB must terminate within 10 bytes
fn read_leb_u64(bytes: &[u8], offset: &mut usize) -> Result<u64> {
    let start = *offset;
    let value = Uleb128::read(bytes, offset)?;
    if *offset - start > 10 {
        return Err(Error::Malformed(format!(
            "LEB128 u64 at {:#x} is out of range",
            start
        )));
    }
    Ok(value)
}

fn read_u8(bytes: &[u8], offset: &mut usize) -> Result<u8> {
    let byte = *bytes
        .get(*offset)
        .ok_or_else(|| Error::Malformed(format!("unexpected end of module at {:#x}", offset)))?;
    *offset += 1;
    Ok(byte)
}

/// A LEB-length-prefixed UTF-8 name
fn read_name(bytes: &[u8], offset: &mut usize) -> Result<String> {
    let len = read_leb_u32(bytes, offset)? as usize;
    let end = offset
        .checked_add(len)
        .filter(|&end| end <= bytes.len())
        .ok_or_else(|| Error::Malformed(format!("name at {:#x} extends past the module", offset)))?;
    let name = String::from_utf8_lossy(&bytes[*offset..end]).into_owned();
    *offset = end;
    Ok(name)
}

/// Table and memory limits; memory64 lengths are 64-bit LEBs
fn skip_limits(bytes: &[u8], offset: &mut usize) -> Result<()> {
    let flags = read_leb_u32(bytes, offset)?;
    if flags & LIMITS_MEM64 != 0 {
        read_leb_u64(bytes, offset)?;
        if flags & LIMITS_HAS_MAX != 0 {
            read_leb_u64(bytes, offset)?;
        }
    } else {
        read_leb_u32(bytes, offset)?;
        if flags & LIMITS_HAS_MAX != 0 {
            read_leb_u32(bytes, offset)?;
        }
    }
    Ok(())
}

/// Extract symbols from a WebAssembly module: the `linking` symbol table
/// when present, imports as undefined and exports as defined symbols, and
/// the `name` section as a last-resort fallback.
pub fn read_symbols(bytes: &[u8]) -> Result<Vec<Symbol>> {
    if bytes.len() < WASM_MAGIC.len() || &bytes[..WASM_MAGIC.len()] != WASM_MAGIC {
        let magic: u64 = if bytes.len() >= 8 {
            u64::from_le_bytes(bytes[..8].try_into().unwrap())
        } else {
            0
        };
        return Err(Error::BadMagic(magic));
    }
    let mut symbols = Vec::new();
    let mut offset = WASM_MAGIC.len();
    while offset < bytes.len() {
        let section_id = read_u8(bytes, &mut offset)?;
        let payload_len = match read_leb_u32(bytes, &mut offset) {
            Ok(len) => len as usize,
            Err(_) => break,
        };
        let payload_end = match offset.checked_add(payload_len) {
            Some(end) if end <= bytes.len() => end,
            _ => break,
        };
        if payload_len == 0 {
            continue;
        }
        let parsed = match section_id {
            SECTION_CUSTOM => parse_custom(bytes, offset, payload_end, &mut symbols),
            SECTION_IMPORT => parse_imports(bytes, offset, payload_end, &mut symbols),
            SECTION_EXPORT => parse_exports(bytes, offset, payload_end, &mut symbols),
            _ => Ok(()),
        };
        if parsed.is_err() {
            warn!("wasm section {} is malformed, stopping the scan", section_id);
            break;
        }
        offset = payload_end;
    }
    Ok(symbols)
}

fn parse_custom(
    bytes: &[u8],
    mut offset: usize,
    payload_end: usize,
    symbols: &mut Vec<Symbol>,
) -> Result<()> {
    let name = read_name(bytes, &mut offset)?;
    match name.as_str() {
        "linking" => parse_linking(bytes, offset, payload_end, symbols),
        // only a fallback when no real symbols were discovered
        "name" if symbols.is_empty() => parse_name_section(bytes, offset, payload_end, symbols),
        _ => Ok(()),
    }
}

fn parse_linking(
    bytes: &[u8],
    mut offset: usize,
    payload_end: usize,
    symbols: &mut Vec<Symbol>,
) -> Result<()> {
    let version = read_leb_u32(bytes, &mut offset)?;
    if version == 0 {
        return Err(Error::Malformed("linking section version 0".into()));
    }
    while offset < payload_end {
        let subsec_type = read_u8(bytes, &mut offset)?;
        let subsec_size = read_leb_u32(bytes, &mut offset)? as usize;
        let subsec_end = offset
            .checked_add(subsec_size)
            .filter(|&end| end <= payload_end)
            .ok_or_else(|| {
                Error::Malformed(format!("linking subsection at {:#x} overruns its parent", offset))
            })?;
        if subsec_type == LINKING_SUBSEC_SYMTAB {
            parse_linking_symtab(bytes, offset, subsec_end, symbols)?;
        }
        offset = subsec_end;
    }
    Ok(())
}

fn parse_linking_symtab(
    bytes: &[u8],
    mut offset: usize,
    subsec_end: usize,
    symbols: &mut Vec<Symbol>,
) -> Result<()> {
    let count = read_leb_u32(bytes, &mut offset)?;
    for _ in 0..count {
        let kind = read_u8(bytes, &mut offset)?;
        let flags = read_leb_u32(bytes, &mut offset)?;
        let undefined = flags & SYMTAB_FLAG_UNDEFINED != 0;
        let name = match kind {
            SYMTAB_KIND_FUNCTION | SYMTAB_KIND_GLOBAL | SYMTAB_KIND_EVENT | SYMTAB_KIND_TABLE
            | SYMTAB_KIND_TAG => {
                if !undefined {
                    read_leb_u32(bytes, &mut offset)?;
                }
                read_name(bytes, &mut offset)?
            }
            SYMTAB_KIND_DATA => {
                let name = read_name(bytes, &mut offset)?;
                if !undefined {
                    // segment, offset, size
                    read_leb_u32(bytes, &mut offset)?;
                    read_leb_u32(bytes, &mut offset)?;
                    read_leb_u32(bytes, &mut offset)?;
                }
                name
            }
            SYMTAB_KIND_SECTION => {
                read_leb_u32(bytes, &mut offset)?;
                read_name(bytes, &mut offset)?
            }
            kind => {
                return Err(Error::Malformed(format!("unknown wasm symbol kind {}", kind)));
            }
        };
        if offset > subsec_end {
            return Err(Error::Malformed("symbol table overruns its subsection".into()));
        }
        if !name.is_empty() {
            let kind_char = if undefined {
                'U'
            } else if kind == SYMTAB_KIND_FUNCTION {
                'T'
            } else {
                'D'
            };
            symbols.push(Symbol::new(name, kind_char));
        }
    }
    Ok(())
}

fn parse_name_section(
    bytes: &[u8],
    mut offset: usize,
    payload_end: usize,
    symbols: &mut Vec<Symbol>,
) -> Result<()> {
    while offset < payload_end {
        let subsec_type = read_u8(bytes, &mut offset)?;
        let subsec_size = read_leb_u32(bytes, &mut offset)? as usize;
        let subsec_end = offset
            .checked_add(subsec_size)
            .filter(|&end| end <= payload_end)
            .ok_or_else(|| {
                Error::Malformed(format!("name subsection at {:#x} overruns its parent", offset))
            })?;
        // subsection 1 holds function names
        if subsec_type == 1 {
            let count = read_leb_u32(bytes, &mut offset)?;
            for _ in 0..count {
                read_leb_u32(bytes, &mut offset)?;
                let name = read_name(bytes, &mut offset)?;
                if offset > subsec_end {
                    return Err(Error::Malformed("name map overruns its subsection".into()));
                }
                if !name.is_empty() {
                    symbols.push(Symbol::new(name, 'T'));
                }
            }
        }
        offset = subsec_end;
    }
    Ok(())
}

fn parse_imports(
    bytes: &[u8],
    mut offset: usize,
    _payload_end: usize,
    symbols: &mut Vec<Symbol>,
) -> Result<()> {
    let count = read_leb_u32(bytes, &mut offset)?;
    for _ in 0..count {
        let module = read_name(bytes, &mut offset)?;
        let field = read_name(bytes, &mut offset)?;
        let kind = read_u8(bytes, &mut offset)?;
        match kind {
            KIND_FUNC => {
                read_leb_u32(bytes, &mut offset)?;
            }
            KIND_TABLE => {
                read_u8(bytes, &mut offset)?;
                skip_limits(bytes, &mut offset)?;
            }
            KIND_MEMORY => {
                skip_limits(bytes, &mut offset)?;
            }
            KIND_GLOBAL => {
                read_u8(bytes, &mut offset)?;
                read_u8(bytes, &mut offset)?;
            }
            KIND_TAG => {
                read_leb_u32(bytes, &mut offset)?;
            }
            kind => {
                return Err(Error::Malformed(format!("unknown wasm import kind {}", kind)));
            }
        }
        // nm-style output keys on the imported field name
        if !field.is_empty() {
            symbols.push(Symbol::new(field, 'U'));
        } else if !module.is_empty() {
            symbols.push(Symbol::new(module, 'U'));
        }
    }
    Ok(())
}

fn parse_exports(
    bytes: &[u8],
    mut offset: usize,
    _payload_end: usize,
    symbols: &mut Vec<Symbol>,
) -> Result<()> {
    let count = read_leb_u32(bytes, &mut offset)?;
    for _ in 0..count {
        let name = read_name(bytes, &mut offset)?;
        let kind = read_u8(bytes, &mut offset)?;
        read_leb_u32(bytes, &mut offset)?;
        if !name.is_empty() {
            let kind_char = if kind == KIND_FUNC { 'T' } else { 'D' };
            symbols.push(Symbol::new(name, kind_char));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leb(mut value: u32) -> Vec<u8> {
        let mut out = Vec::new();
        loop {
            let mut byte = (value & 0x7f) as u8;
            value >>= 7;
            if value != 0 {
                byte |= 0x80;
            }
            out.push(byte);
            if value == 0 {
                return out;
            }
        }
    }

    fn name(s: &str) -> Vec<u8> {
        let mut out = leb(s.len() as u32);
        out.extend_from_slice(s.as_bytes());
        out
    }

    fn section(id: u8, payload: &[u8]) -> Vec<u8> {
        let mut out = vec![id];
        out.extend(leb(payload.len() as u32));
        out.extend_from_slice(payload);
        out
    }

    #[test]
    fn imports_become_undefined_symbols() {
        let mut payload = leb(2);
        // (import "env" "puts" (func 0))
        payload.extend(name("env"));
        payload.extend(name("puts"));
        payload.push(KIND_FUNC);
        payload.extend(leb(0));
        // (import "env" "mem" (memory 1))
        payload.extend(name("env"));
        payload.extend(name("mem"));
        payload.push(KIND_MEMORY);
        payload.extend(leb(0)); // flags: no max
        payload.extend(leb(1)); // min
        let mut module = WASM_MAGIC.to_vec();
        module.extend(section(SECTION_IMPORT, &payload));
        let symbols = read_symbols(&module).unwrap();
        assert_eq!(symbols.len(), 2);
        assert_eq!(symbols[0].name, "puts");
        assert_eq!(symbols[0].kind, 'U');
        assert_eq!(symbols[1].name, "mem");
    }

    #[test]
    fn exports_classify_functions_as_text() {
        let mut payload = leb(2);
        payload.extend(name("run"));
        payload.push(KIND_FUNC);
        payload.extend(leb(0));
        payload.extend(name("table"));
        payload.push(KIND_TABLE);
        payload.extend(leb(0));
        let mut module = WASM_MAGIC.to_vec();
        module.extend(section(SECTION_EXPORT, &payload));
        let symbols = read_symbols(&module).unwrap();
        assert_eq!(symbols[0].kind, 'T');
        assert_eq!(symbols[1].kind, 'D');
    }

    #[test]
    fn linking_symtab_takes_priority_over_names() {
        // linking section: version 2, SYMTAB subsection with one defined
        // function and one undefined data symbol
        let mut symtab = leb(2);
        symtab.push(SYMTAB_KIND_FUNCTION);
        symtab.extend(leb(0)); // flags: defined
        symtab.extend(leb(0)); // index
        symtab.extend(name("compute"));
        symtab.push(SYMTAB_KIND_DATA);
        symtab.extend(leb(SYMTAB_FLAG_UNDEFINED));
        symtab.extend(name("shared_buf"));
        let mut linking = name("linking");
        linking.extend(leb(2)); // version
        linking.push(LINKING_SUBSEC_SYMTAB);
        linking.extend(leb(symtab.len() as u32));
        linking.extend(&symtab);
        let mut module = WASM_MAGIC.to_vec();
        module.extend(section(SECTION_CUSTOM, &linking));
        let symbols = read_symbols(&module).unwrap();
        assert_eq!(symbols.len(), 2);
        assert_eq!(symbols[0].name, "compute");
        assert_eq!(symbols[0].kind, 'T');
        assert_eq!(symbols[1].name, "shared_buf");
        assert_eq!(symbols[1].kind, 'U');
    }

    #[test]
    fn memory64_limits_are_skipped() {
        let mut payload = leb(1);
        payload.extend(name("env"));
        payload.extend(name("mem64"));
        payload.push(KIND_MEMORY);
        payload.extend(leb(LIMITS_MEM64 | LIMITS_HAS_MAX));
        payload.extend(leb(1)); // min, 64-bit leb but small
        payload.extend(leb(16)); // max
        let mut module = WASM_MAGIC.to_vec();
        module.extend(section(SECTION_IMPORT, &payload));
        let symbols = read_symbols(&module).unwrap();
        assert_eq!(symbols[0].name, "mem64");
    }

    #[test]
    fn rejects_a_bad_magic() {
        assert!(matches!(
            read_symbols(b"\0asm\x02\0\0\0"),
            Err(Error::BadMagic(_))
        ));
    }
}
