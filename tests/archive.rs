//! Archive extraction and symbol aggregation, end to end: fixtures are
//! assembled in memory, written to a temp file, and pushed through the
//! path-based API.

use binkit::tools;
use std::env;
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};

static COUNTER: AtomicU32 = AtomicU32::new(0);

fn temp_dir(name: &str) -> PathBuf {
    let id = COUNTER.fetch_add(1, Ordering::Relaxed);
    let dir = env::temp_dir().join(format!("binkit_ar_{}_{}_{}", std::process::id(), id, name));
    fs::create_dir_all(&dir).unwrap();
    dir
}

fn member(name_field: &str, data: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(format!("{:<16}", name_field).as_bytes());
    out.extend_from_slice(b"0           ");
    out.extend_from_slice(b"0     ");
    out.extend_from_slice(b"0     ");
    out.extend_from_slice(b"644     ");
    out.extend_from_slice(format!("{:<10}", data.len()).as_bytes());
    out.extend_from_slice(&[0x60, 0x0a]);
    out.extend_from_slice(data);
    if data.len() & 1 == 1 {
        out.push(b'\n');
    }
    out
}

fn archive_of(members: &[(&str, &[u8])]) -> Vec<u8> {
    let mut out = b"!<arch>\n".to_vec();
    for (name, data) in members {
        out.extend(member(name, data));
    }
    out
}

#[test]
fn extract_renames_duplicate_members() {
    let dir = temp_dir("dup");
    let archive_path = dir.join("lib.a");
    fs::write(
        &archive_path,
        archive_of(&[("a.o/", b"first "), ("a.o/", b"second")]),
    )
    .unwrap();

    let outdir = dir.join("out");
    tools::extractlib(&archive_path, &outdir).unwrap();
    assert_eq!(fs::read(outdir.join("a.o")).unwrap(), b"first ");
    // the collision counter lands before the extension
    assert_eq!(fs::read(outdir.join("a_1.o")).unwrap(), b"second");

    fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn extract_twice_is_stable() {
    let dir = temp_dir("stable");
    let archive_path = dir.join("lib.a");
    fs::write(
        &archive_path,
        archive_of(&[("one.o/", b"AAAA"), ("two.o/", b"BBBBBB")]),
    )
    .unwrap();

    let fresh_a = dir.join("fresh_a");
    let fresh_b = dir.join("fresh_b");
    tools::extractlib(&archive_path, &fresh_a).unwrap();
    tools::extractlib(&archive_path, &fresh_b).unwrap();
    for name in ["one.o", "two.o"] {
        assert_eq!(
            fs::read(fresh_a.join(name)).unwrap(),
            fs::read(fresh_b.join(name)).unwrap()
        );
    }

    // the second extraction into the same directory adds renamed copies
    tools::extractlib(&archive_path, &fresh_a).unwrap();
    assert_eq!(fs::read(fresh_a.join("one_1.o")).unwrap(), b"AAAA");
    assert_eq!(fs::read(fresh_a.join("two_1.o")).unwrap(), b"BBBBBB");

    fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn readsyms_groups_per_member() {
    // two real ELF members produced by the object writer
    let dir = temp_dir("syms");
    let blob = dir.join("blob.bin");
    fs::write(&blob, b"xy").unwrap();
    let obj_a = dir.join("a.o");
    let obj_b = dir.join("b.o");
    let opts = |name: &str| tools::BinObjectOptions {
        arch: Some("x86_64".into()),
        basename: Some(name.into()),
        ..Default::default()
    };
    tools::bin2elf(&blob, &obj_a, &opts("alpha")).unwrap();
    tools::bin2elf(&blob, &obj_b, &opts("beta")).unwrap();

    let archive_path = dir.join("lib.a");
    let a = fs::read(&obj_a).unwrap();
    let b = fs::read(&obj_b).unwrap();
    fs::write(&archive_path, archive_of(&[("a.o/", &a), ("b.o/", &b)])).unwrap();

    let groups = tools::readsyms(&archive_path).unwrap();
    assert_eq!(groups.len(), 2);
    assert_eq!(groups[0].objectfile, "a.o");
    assert_eq!(groups[0].symbols[0].name, "_binary_alpha_start");
    assert_eq!(groups[1].objectfile, "b.o");
    assert_eq!(groups[1].symbols[1].name, "_binary_beta_end");

    fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn mslib_symbol_map_backs_empty_members() {
    // an import-library-shaped archive: the second linker member maps
    // "ImportedSym" to the one member, whose COFF payload carries no
    // symbol table of its own
    let coff_stub = {
        // machine 0x8664, no sections, no symbols
        let mut h = Vec::new();
        h.extend_from_slice(&0x8664u16.to_le_bytes());
        h.extend_from_slice(&0u16.to_le_bytes());
        h.extend_from_slice(&[0u8; 16]);
        h
    };

    // header offset of the member the map points at: magic + two linker
    // members (each 60 + data, even-aligned)
    let first_linker = b"\0\0\0\0".to_vec();
    let mut second_linker = Vec::new();
    second_linker.extend_from_slice(&1u32.to_le_bytes());
    let mut bytes = b"!<arch>\n".to_vec();
    bytes.extend(member("/", &first_linker));
    let second_start = bytes.len();
    // the second linker member's payload references the object's header
    // offset, which we can compute before writing it
    let second_payload_len = 4 + 4 + 4 + 2 + "ImportedSym\0".len();
    let mut object_header_offset = second_start + 60 + second_payload_len;
    if object_header_offset & 1 == 1 {
        object_header_offset += 1;
    }
    second_linker.extend_from_slice(&(object_header_offset as u32).to_le_bytes());
    second_linker.extend_from_slice(&1u32.to_le_bytes());
    second_linker.extend_from_slice(&1u16.to_le_bytes());
    second_linker.extend_from_slice(b"ImportedSym\0");
    bytes.extend(member("/", &second_linker));
    assert_eq!(bytes.len(), object_header_offset);
    bytes.extend(member("imp.obj/", &coff_stub));

    let dir = temp_dir("mslib");
    let lib_path = dir.join("imports.lib");
    fs::write(&lib_path, &bytes).unwrap();

    let groups = tools::readsyms(&lib_path).unwrap();
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].objectfile, "imp.obj");
    assert_eq!(groups[0].symbols.len(), 1);
    assert_eq!(groups[0].symbols[0].name, "ImportedSym");
    assert_eq!(groups[0].symbols[0].kind, 'T');

    let archive = binkit::archive::Archive::parse(&bytes).unwrap();
    assert_eq!(archive.member_of_symbol("ImportedSym"), Some("imp.obj"));

    fs::remove_dir_all(&dir).unwrap();
}
