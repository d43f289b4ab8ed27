//! COFF object synthesis (`bin2coff`): a single `.rdata` section holding
//! the payload, a four-entry symbol table (section symbol with its
//! auxiliary record, then the start/end markers), and a 4-byte-size-prefixed
//! string table for names longer than eight bytes.

use crate::arch;
use crate::error::{Error, Result};
use crate::tools::BinObjectOptions;
use scroll::Pwrite;

use super::header::{CoffHeader, SIZEOF_COFF_HEADER};
use super::section_table::{pad_section_name, SectionTable, RDATA_CHARACTERISTICS, SIZEOF_SECTION_TABLE};
use super::symbol::{
    AuxSectionDefinition, Symbol, IMAGE_SYM_CLASS_EXTERNAL, IMAGE_SYM_CLASS_STATIC, SIZEOF_SYMBOL,
};

/// A symbol-name field: inline when it fits eight bytes, otherwise a
/// string-table reference whose offset accounts for the table's 4-byte
/// size field
fn name_field(name: &str, strtab_offset: &mut u32) -> [u8; 8] {
    let mut field = [0u8; 8];
    if name.len() <= 8 {
        field[..name.len()].copy_from_slice(name.as_bytes());
    } else {
        field[4..8].copy_from_slice(&strtab_offset.to_le_bytes());
        *strtab_offset += name.len() as u32 + 1;
    }
    field
}

/// Emit a COFF object whose `.rdata` section holds `data`, bracketed by
/// external `<symbol>_start`/`<symbol>_end` symbols.
///
/// On i386 the C compiler prepends `_` to every external identifier, so a
/// default or single-underscore prefix is doubled up: C code declaring
/// `_binary_x_start` links against the `__binary_x_start` emitted here.
pub fn write_object(data: &[u8], opts: &BinObjectOptions) -> Result<Vec<u8>> {
    let machine = arch::coff_machine(opts.arch.as_deref());
    let is_i386 = machine == arch::coff_machine::IMAGE_FILE_MACHINE_I386;
    if data.len() as u64 > u64::from(u32::MAX) - 1 {
        return Err(Error::Malformed("input too large for a COFF object".into()));
    }
    let mut data_size = data.len() as u32;
    if opts.zeroend {
        data_size += 1;
    }

    let base = opts.basename.as_deref().filter(|b| !b.is_empty()).unwrap_or("data");
    let symbol = match opts.symbol_prefix.as_deref() {
        Some(prefix) => {
            if is_i386 && prefix.starts_with('_') && !prefix.starts_with("__") {
                format!("_{}{}", prefix, base)
            } else {
                format!("{}{}", prefix, base)
            }
        }
        None => {
            if is_i386 {
                format!("__binary_{}", base)
            } else {
                format!("_binary_{}", base)
            }
        }
    };
    let symbol = arch::sanitize_symbol_name(&symbol);
    let symbol_start = format!("{}_start", symbol);
    let symbol_end = format!("{}_end", symbol);

    let data_offset = (SIZEOF_COFF_HEADER + SIZEOF_SECTION_TABLE) as u32;
    let data_padding = 4u32.wrapping_sub(data_size) & 3;
    let symtab_offset = data_offset + data_size + data_padding;
    let mut strtab_content = 0u32;
    if symbol_start.len() > 8 {
        strtab_content += symbol_start.len() as u32 + 1;
    }
    if symbol_end.len() > 8 {
        strtab_content += symbol_end.len() as u32 + 1;
    }
    let strtab_size = 4 + strtab_content;
    let strtab_offset = symtab_offset + 4 * SIZEOF_SYMBOL as u32;
    let total = (strtab_offset + strtab_size) as usize;

    let mut out = vec![0u8; total];
    let header = CoffHeader {
        machine,
        number_of_sections: 1,
        time_date_stamp: 0,
        pointer_to_symbol_table: symtab_offset,
        // three symbols plus the section's auxiliary record
        number_of_symbols: 4,
        size_of_optional_header: 0,
        characteristics: 0,
    };
    out.pwrite_with(header, 0, scroll::LE)?;

    let section = SectionTable {
        name: pad_section_name(".rdata"),
        virtual_size: data_size,
        virtual_address: 0,
        size_of_raw_data: data_size,
        pointer_to_raw_data: data_offset,
        characteristics: RDATA_CHARACTERISTICS,
        ..Default::default()
    };
    out.pwrite_with(section, SIZEOF_COFF_HEADER, scroll::LE)?;

    out[data_offset as usize..data_offset as usize + data.len()].copy_from_slice(data);
    // a zeroend terminator and the alignment padding are already zero

    let mut offset = symtab_offset as usize;
    let section_symbol = Symbol {
        name: pad_section_name(".rdata"),
        value: 0,
        section_number: 1,
        typ: 0,
        storage_class: IMAGE_SYM_CLASS_STATIC,
        // the i386 linker requires section symbols to carry an aux record
        number_of_aux_symbols: 1,
    };
    offset += out.pwrite_with(section_symbol, offset, scroll::LE)?;
    let aux = AuxSectionDefinition {
        length: data_size,
        ..Default::default()
    };
    offset += out.pwrite_with(aux, offset, scroll::LE)?;

    let mut strtab_cursor = 4u32;
    let start_symbol = Symbol {
        name: name_field(&symbol_start, &mut strtab_cursor),
        value: 0,
        section_number: 1,
        storage_class: IMAGE_SYM_CLASS_EXTERNAL,
        ..Default::default()
    };
    offset += out.pwrite_with(start_symbol, offset, scroll::LE)?;
    let end_symbol = Symbol {
        name: name_field(&symbol_end, &mut strtab_cursor),
        value: data_size,
        section_number: 1,
        storage_class: IMAGE_SYM_CLASS_EXTERNAL,
        ..Default::default()
    };
    out.pwrite_with(end_symbol, offset, scroll::LE)?;

    let mut offset = strtab_offset as usize;
    offset += out.pwrite_with(strtab_size, offset, scroll::LE)?;
    for name in [&symbol_start, &symbol_end] {
        if name.len() > 8 {
            out[offset..offset + name.len()].copy_from_slice(name.as_bytes());
            offset += name.len() + 1;
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pe::Coff;

    #[test]
    fn i386_doubles_the_underscore() {
        let opts = BinObjectOptions {
            arch: Some("i386".into()),
            basename: Some("cfg".into()),
            ..Default::default()
        };
        let object = write_object(b"x", &opts).unwrap();
        let coff = Coff::parse(&object).unwrap();
        let symbols = coff.symbols(&object).unwrap();
        assert_eq!(symbols[1].name, "__binary_cfg_start");
        assert_eq!(symbols[2].name, "__binary_cfg_end");
    }

    #[test]
    fn single_underscore_prefix_is_doubled_only_on_i386() {
        let opts = BinObjectOptions {
            symbol_prefix: Some("_blob_".into()),
            arch: Some("i386".into()),
            basename: Some("a".into()),
            ..Default::default()
        };
        let object = write_object(b"x", &opts).unwrap();
        let coff = Coff::parse(&object).unwrap();
        assert_eq!(coff.symbols(&object).unwrap()[1].name, "__blob_a_start");

        let opts = BinObjectOptions {
            symbol_prefix: Some("_blob_".into()),
            arch: Some("x86_64".into()),
            basename: Some("a".into()),
            ..Default::default()
        };
        let object = write_object(b"x", &opts).unwrap();
        let coff = Coff::parse(&object).unwrap();
        assert_eq!(coff.symbols(&object).unwrap()[1].name, "_blob_a_start");
    }

    #[test]
    fn zeroend_reflects_in_sizes() {
        let opts = BinObjectOptions {
            arch: Some("x86_64".into()),
            basename: Some("z".into()),
            zeroend: true,
            ..Default::default()
        };
        let object = write_object(b"abc", &opts).unwrap();
        let coff = Coff::parse(&object).unwrap();
        let sections = coff.sections(&object).unwrap();
        assert_eq!(sections[0].size_of_raw_data, 4);
        let symbols = coff.symbols(&object).unwrap();
        assert_eq!(symbols[2].value, Some(4));
    }
}
