//! ELF dependency and rpath behaviour against a synthesised shared object
//! carrying a real dynamic table.

use binkit::container::{Container, Ctx};
use binkit::elf::dynamic::{Dyn, DT_NEEDED, DT_NULL, DT_RPATH, DT_RUNPATH, SIZEOF_DYN64};
use binkit::elf::header::{Header, ET_DYN, SIZEOF_EHDR64};
use binkit::elf::section_header::{SectionHeader, SHT_DYNAMIC, SHT_STRTAB, SIZEOF_SHDR64};
use binkit::tools;
use binkit::Format;
use scroll::{Endian, Pwrite};
use std::env;
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};

static COUNTER: AtomicU32 = AtomicU32::new(0);

fn temp_path(name: &str) -> PathBuf {
    let id = COUNTER.fetch_add(1, Ordering::Relaxed);
    env::temp_dir().join(format!("binkit_elf_{}_{}_{}", std::process::id(), id, name))
}

const DYNSTR: &[u8] = b"\0libfoo.so.1\0/opt/lib:/usr/lib\0/run/path\0";
const NEEDED_OFF: u64 = 1;
const RPATH_OFF: u64 = 13;
const RUNPATH_OFF: u64 = 31;

/// A minimal ELF64 shared object: NULL + `.dynstr` + `.dynamic` sections,
/// the dynamic table holding one needed library, an rpath, a runpath, the
/// terminator and one spare NULL slot
fn shared_object_fixture() -> Vec<u8> {
    let ctx = Ctx::new(Container::Big, Endian::Little);
    let shdrs_offset = SIZEOF_EHDR64;
    let dynstr_offset = shdrs_offset + 3 * SIZEOF_SHDR64;
    let dynamic_offset = (dynstr_offset + DYNSTR.len() + 7) & !7;
    let entries = [
        Dyn { d_tag: DT_NEEDED, d_val: NEEDED_OFF },
        Dyn { d_tag: DT_RPATH, d_val: RPATH_OFF },
        Dyn { d_tag: DT_RUNPATH, d_val: RUNPATH_OFF },
        Dyn { d_tag: DT_NULL, d_val: 0 },
        Dyn { d_tag: DT_NULL, d_val: 0 },
        Dyn { d_tag: DT_NULL, d_val: 0 },
    ];
    let dynamic_size = entries.len() * SIZEOF_DYN64;
    let mut bytes = vec![0u8; dynamic_offset + dynamic_size];

    let mut header = Header::new(ctx);
    header.e_type = ET_DYN;
    header.e_machine = 0x3e;
    header.e_shoff = shdrs_offset as u64;
    header.e_shnum = 3;
    bytes.pwrite_with(header, 0, ctx).unwrap();

    let sections = [
        SectionHeader::default(),
        SectionHeader {
            sh_type: SHT_STRTAB,
            sh_offset: dynstr_offset as u64,
            sh_size: DYNSTR.len() as u64,
            sh_addralign: 1,
            ..Default::default()
        },
        SectionHeader {
            sh_type: SHT_DYNAMIC,
            sh_offset: dynamic_offset as u64,
            sh_size: dynamic_size as u64,
            sh_link: 1,
            sh_entsize: SIZEOF_DYN64 as u64,
            sh_addralign: 8,
            ..Default::default()
        },
    ];
    let mut offset = shdrs_offset;
    for section in sections {
        offset += bytes.pwrite_with(section, offset, ctx).unwrap();
    }

    bytes[dynstr_offset..dynstr_offset + DYNSTR.len()].copy_from_slice(DYNSTR);
    let mut offset = dynamic_offset;
    for entry in entries {
        offset += bytes.pwrite_with(entry, offset, ctx).unwrap();
    }
    bytes
}

#[test]
fn deplibs_and_runpath_shadowing() {
    let path = temp_path("libfixture.so");
    fs::write(&path, shared_object_fixture()).unwrap();

    assert_eq!(tools::format(&path).unwrap(), Format::Elf);
    assert_eq!(tools::deplibs(&path).unwrap(), vec!["libfoo.so.1".to_string()]);
    // DT_RUNPATH shadows DT_RPATH
    assert_eq!(tools::rpath_list(&path).unwrap(), vec!["/run/path".to_string()]);

    fs::remove_file(&path).unwrap();
}

#[test]
fn removing_the_runpath_uncovers_the_rpath() {
    let path = temp_path("libfixture.so");
    fs::write(&path, shared_object_fixture()).unwrap();

    tools::rpath_remove(&path, "/run/path").unwrap();
    assert_eq!(
        tools::rpath_list(&path).unwrap(),
        vec!["/opt/lib".to_string(), "/usr/lib".to_string()]
    );

    tools::rpath_remove(&path, "/opt/lib").unwrap();
    assert_eq!(tools::rpath_list(&path).unwrap(), vec!["/usr/lib".to_string()]);

    fs::remove_file(&path).unwrap();
}

#[test]
fn clean_strips_both_tags_and_is_idempotent() {
    let path = temp_path("libfixture.so");
    fs::write(&path, shared_object_fixture()).unwrap();

    tools::rpath_clean(&path).unwrap();
    assert!(tools::rpath_list(&path).unwrap().is_empty());
    // the surviving entries still resolve
    assert_eq!(tools::deplibs(&path).unwrap(), vec!["libfoo.so.1".to_string()]);

    let once = fs::read(&path).unwrap();
    tools::rpath_clean(&path).unwrap();
    assert_eq!(fs::read(&path).unwrap(), once);

    fs::remove_file(&path).unwrap();
}

#[test]
fn elf_rpath_insert_is_refused() {
    let path = temp_path("libfixture.so");
    fs::write(&path, shared_object_fixture()).unwrap();
    assert!(matches!(
        tools::rpath_insert(&path, "/new/path"),
        Err(binkit::error::Error::Unsupported(_))
    ));
    fs::remove_file(&path).unwrap();
}
