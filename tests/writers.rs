//! End-to-end checks of the object writers through the path-based API:
//! every synthesised object must detect as its own format and read back
//! the `_start`/`_end` markers it was given.

use binkit::tools::{self, BinObjectOptions};
use binkit::Format;
use std::env;
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Once;

static COUNTER: AtomicU32 = AtomicU32::new(0);
static LOGGER: Once = Once::new();

fn temp_path(name: &str) -> PathBuf {
    LOGGER.call_once(|| {
        let _ = stderrlog::new().verbosity(2).init();
    });
    let id = COUNTER.fetch_add(1, Ordering::Relaxed);
    env::temp_dir().join(format!("binkit_test_{}_{}_{}", std::process::id(), id, name))
}

fn options(arch: &str, basename: &str) -> BinObjectOptions {
    BinObjectOptions {
        arch: Some(arch.to_string()),
        basename: Some(basename.to_string()),
        ..Default::default()
    }
}

#[test]
fn bin2elf_detects_and_reads_back() {
    let src = temp_path("payload.bin");
    let dst = temp_path("payload.o");
    fs::write(&src, b"hi").unwrap();
    tools::bin2elf(&src, &dst, &options("x86_64", "hello")).unwrap();

    assert_eq!(tools::format(&dst).unwrap(), Format::Elf);
    let groups = tools::readsyms(&dst).unwrap();
    assert_eq!(groups.len(), 1);
    let symbols = &groups[0].symbols;
    assert_eq!(symbols.len(), 2);
    assert_eq!(symbols[0].name, "_binary_hello_start");
    assert_eq!(symbols[0].value, Some(0));
    assert_eq!(symbols[1].name, "_binary_hello_end");
    assert_eq!(symbols[1].value, Some(2));
    assert!(symbols.iter().all(|s| s.is_global()));

    fs::remove_file(&src).unwrap();
    fs::remove_file(&dst).unwrap();
}

#[test]
fn bin2coff_detects_and_reads_back() {
    let src = temp_path("payload.bin");
    let dst = temp_path("payload.obj");
    fs::write(&src, b"abcd").unwrap();
    tools::bin2coff(&src, &dst, &options("x86_64", "res")).unwrap();

    assert_eq!(tools::format(&dst).unwrap(), Format::Coff);
    let groups = tools::readsyms(&dst).unwrap();
    let names: Vec<&str> = groups[0].symbols.iter().map(|s| s.name.as_str()).collect();
    assert!(names.contains(&"_binary_res_start"));
    assert!(names.contains(&"_binary_res_end"));

    fs::remove_file(&src).unwrap();
    fs::remove_file(&dst).unwrap();
}

#[test]
fn bin2macho_detects_and_reads_back() {
    let src = temp_path("payload.bin");
    let dst = temp_path("payload.o");
    fs::write(&src, b"123456789").unwrap();
    let mut opts = options("arm64", "blob");
    opts.platform = Some("macosx".to_string());
    opts.minos = Some("11.0".to_string());
    opts.sdk = Some("13.0".to_string());
    tools::bin2macho(&src, &dst, &opts).unwrap();

    assert_eq!(tools::format(&dst).unwrap(), Format::MachO);
    let groups = tools::readsyms(&dst).unwrap();
    let symbols = &groups[0].symbols;
    assert_eq!(symbols[0].name, "__binary_blob_start");
    assert_eq!(symbols[1].name, "__binary_blob_end");
    assert_eq!(symbols[1].value, Some(9));

    fs::remove_file(&src).unwrap();
    fs::remove_file(&dst).unwrap();
}

#[test]
fn zeroend_grows_every_format_by_one() {
    let src = temp_path("payload.bin");
    fs::write(&src, b"xyz").unwrap();
    for format in ["elf", "coff", "macho"] {
        let dst = temp_path("zeroend.o");
        let mut opts = options("x86_64", "z");
        opts.zeroend = true;
        match format {
            "elf" => tools::bin2elf(&src, &dst, &opts).unwrap(),
            "coff" => tools::bin2coff(&src, &dst, &opts).unwrap(),
            _ => tools::bin2macho(&src, &dst, &opts).unwrap(),
        }
        let groups = tools::readsyms(&dst).unwrap();
        let end = groups[0]
            .symbols
            .iter()
            .find(|s| s.name.ends_with("_end"))
            .unwrap();
        assert_eq!(end.value, Some(4), "{} zeroend", format);
        fs::remove_file(&dst).unwrap();
    }
    fs::remove_file(&src).unwrap();
}

#[test]
fn symbol_names_are_sanitized() {
    let src = temp_path("payload.bin");
    let dst = temp_path("weird.o");
    fs::write(&src, b"!").unwrap();
    tools::bin2elf(&src, &dst, &options("x86_64", "lib-1.2+x")).unwrap();
    let groups = tools::readsyms(&dst).unwrap();
    assert_eq!(groups[0].symbols[0].name, "_binary_lib_1_2_x_start");
    fs::remove_file(&src).unwrap();
    fs::remove_file(&dst).unwrap();
}
