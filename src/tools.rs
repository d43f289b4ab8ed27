//! Path-based entry points: detect the format of a file and route each
//! operation to the matching backend. These are the functions a build
//! system calls; the per-format modules stay usable on raw bytes.

use std::fs;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use crate::error::{Error, Result};
use crate::symbol::ObjectSymbols;
use crate::{arch, archive, elf, mach, pe, wasm, Format};

/// Options for the `bin2coff`/`bin2elf`/`bin2macho` object writers; the
/// Mach-O-only fields are ignored by the other two
#[derive(Debug, Clone, Default)]
pub struct BinObjectOptions {
    /// overrides the default `_binary_` symbol prefix
    pub symbol_prefix: Option<String>,
    pub arch: Option<String>,
    /// the `<name>` in `_binary_<name>_start`; defaults to `data`
    pub basename: Option<String>,
    /// append a trailing NUL to the payload, extending the end symbol
    pub zeroend: bool,
    /// Mach-O build-version platform (`macosx`, `ios`, `tvos`, `watchos`)
    pub platform: Option<String>,
    /// Mach-O minimum OS version, dotted
    pub minos: Option<String>,
    /// Mach-O SDK version, dotted
    pub sdk: Option<String>,
}

impl BinObjectOptions {
    /// The sanitized base symbol name the ELF and COFF writers build on
    pub(crate) fn symbol_name(&self) -> String {
        let base = self
            .basename
            .as_deref()
            .filter(|b| !b.is_empty())
            .unwrap_or("data");
        let name = match self.symbol_prefix.as_deref() {
            Some(prefix) => format!("{}{}", prefix, base),
            None => format!("_binary_{}", base),
        };
        arch::sanitize_symbol_name(&name)
    }
}

/// Detect the format of the file at `path`
pub fn format(path: impl AsRef<Path>) -> Result<Format> {
    let bytes = fs::read(path.as_ref())?;
    Ok(Format::detect(&bytes))
}

/// Read the symbols of an object, archive, executable or wasm module,
/// grouped per object file
pub fn readsyms(path: impl AsRef<Path>) -> Result<Vec<ObjectSymbols>> {
    let path = path.as_ref();
    let bytes = fs::read(path)?;
    let format = Format::detect(&bytes);
    debug!("readsyms {}: {}", path.display(), format.name());
    let symbols = match format {
        Format::Ar => {
            let archive = archive::Archive::parse(&bytes)?;
            return archive.symbols(&bytes);
        }
        Format::Coff => pe::Coff::parse(&bytes)?.symbols(&bytes)?,
        Format::Pe => pe::Coff::parse_pe(&bytes)?.symbols(&bytes)?,
        Format::Elf => elf::Elf::parse(&bytes)?.symbols(&bytes)?,
        Format::MachO => mach::MachO::parse(&bytes)?.symbols(&bytes)?,
        Format::Wasm => wasm::read_symbols(&bytes)?,
        Format::Unknown => {
            return Err(Error::Unsupported(format!(
                "cannot detect the format of {}",
                path.display()
            )))
        }
    };
    Ok(vec![ObjectSymbols {
        objectfile: basename(path),
        symbols,
    }])
}

/// The libraries a binary depends on: `DT_NEEDED` and friends for ELF,
/// dylib load commands for Mach-O, imported DLLs for COFF objects and PE
/// images
pub fn deplibs(path: impl AsRef<Path>) -> Result<Vec<String>> {
    let path = path.as_ref();
    let bytes = fs::read(path)?;
    match Format::detect(&bytes) {
        Format::Coff => pe::Coff::parse(&bytes)?.import_libraries(&bytes),
        Format::Pe => pe::Coff::parse_pe(&bytes)?.import_libraries(&bytes),
        Format::Elf => elf::Elf::parse(&bytes)?.libraries(&bytes),
        Format::MachO => mach::MachO::parse(&bytes)?.libraries(&bytes),
        // wasm modules have no dependency records we report
        Format::Wasm => Ok(Vec::new()),
        format => Err(Error::Unsupported(format!(
            "no dependency list for {} files",
            format.name()
        ))),
    }
}

/// The rpath entries of an ELF binary (`DT_RUNPATH` shadowing `DT_RPATH`)
/// or Mach-O binary (`LC_RPATH` commands)
pub fn rpath_list(path: impl AsRef<Path>) -> Result<Vec<String>> {
    let bytes = fs::read(path.as_ref())?;
    match Format::detect(&bytes) {
        Format::Elf => elf::Elf::parse(&bytes)?.rpaths(&bytes),
        Format::MachO => mach::MachO::parse(&bytes)?.rpaths(&bytes),
        format => Err(Error::Unsupported(format!(
            "no rpaths in {} files",
            format.name()
        ))),
    }
}

/// Add an rpath. Mach-O appends an `LC_RPATH` command when slack allows;
/// ELF insertion would require growing `.dynstr` and is refused.
pub fn rpath_insert(path: impl AsRef<Path>, rpath: &str) -> Result<()> {
    rewrite_in_place(path.as_ref(), |bytes| match Format::detect(bytes) {
        Format::Elf => elf::writer::rpath_insert(bytes, rpath),
        Format::MachO => mach::writer::rpath_insert(bytes, rpath),
        format => Err(Error::Unsupported(format!(
            "cannot edit rpaths of {} files",
            format.name()
        ))),
    })
}

/// Remove one rpath element wherever it appears
pub fn rpath_remove(path: impl AsRef<Path>, rpath: &str) -> Result<()> {
    rewrite_in_place(path.as_ref(), |bytes| match Format::detect(bytes) {
        Format::Elf => elf::writer::rpath_remove(bytes, rpath),
        Format::MachO => mach::writer::rpath_remove(bytes, rpath),
        format => Err(Error::Unsupported(format!(
            "cannot edit rpaths of {} files",
            format.name()
        ))),
    })
}

/// Strip every rpath entry
pub fn rpath_clean(path: impl AsRef<Path>) -> Result<()> {
    rewrite_in_place(path.as_ref(), |bytes| match Format::detect(bytes) {
        Format::Elf => elf::writer::rpath_clean(bytes),
        Format::MachO => mach::writer::rpath_clean(bytes),
        format => Err(Error::Unsupported(format!(
            "cannot edit rpaths of {} files",
            format.name()
        ))),
    })
}

/// Extract every member of an `ar` or MSVC `.lib` archive into `outdir`,
/// renaming collisions
pub fn extractlib(path: impl AsRef<Path>, outdir: impl AsRef<Path>) -> Result<()> {
    let bytes = fs::read(path.as_ref())?;
    if Format::detect(&bytes) != Format::Ar {
        return Err(Error::Unsupported(format!(
            "{} is not an archive",
            path.as_ref().display()
        )));
    }
    let archive = archive::Archive::parse(&bytes)?;
    archive.extract(&bytes, outdir.as_ref())
}

/// Wrap the bytes of `src` in a COFF object at `dst`
pub fn bin2coff(src: impl AsRef<Path>, dst: impl AsRef<Path>, opts: &BinObjectOptions) -> Result<()> {
    let data = fs::read(src.as_ref())?;
    let object = pe::writer::write_object(&data, opts)?;
    fs::write(dst.as_ref(), object)?;
    Ok(())
}

/// Wrap the bytes of `src` in a relocatable ELF object at `dst`
pub fn bin2elf(src: impl AsRef<Path>, dst: impl AsRef<Path>, opts: &BinObjectOptions) -> Result<()> {
    let data = fs::read(src.as_ref())?;
    let object = elf::writer::write_object(&data, opts)?;
    fs::write(dst.as_ref(), object)?;
    Ok(())
}

/// Wrap the bytes of `src` in a thin Mach-O object at `dst`
pub fn bin2macho(src: impl AsRef<Path>, dst: impl AsRef<Path>, opts: &BinObjectOptions) -> Result<()> {
    let data = fs::read(src.as_ref())?;
    let object = mach::writer::write_object(&data, opts)?;
    fs::write(dst.as_ref(), object)?;
    Ok(())
}

/// Open `path` read-write, run `mutate` over its bytes, and write the
/// mutated image back over the original. The caller must hold exclusive
/// access for the duration; a failed mutation leaves the file untouched.
fn rewrite_in_place(path: &Path, mutate: impl FnOnce(&mut Vec<u8>) -> Result<()>) -> Result<()> {
    let mut file = fs::OpenOptions::new().read(true).write(true).open(path)?;
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes)?;
    mutate(&mut bytes)?;
    file.seek(SeekFrom::Start(0))?;
    file.write_all(&bytes)?;
    Ok(())
}

fn basename(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
