//! The nm-style symbol record every reader lowers its format-specific
//! symbol entries into.

/// One symbol, with its `nm`-style type letter: `U` undefined, `T`/`t` text,
/// `D`/`d` data, `B`/`b` bss, `S`/`s` other; uppercase marks a global
/// (external) symbol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Symbol {
    pub name: String,
    pub kind: char,
    /// Section index, where the format carries one (COFF: 1-based, signed)
    pub section: Option<i32>,
    pub value: Option<u64>,
    /// COFF storage class
    pub storage_class: Option<u8>,
}

impl Symbol {
    pub fn new(name: impl Into<String>, kind: char) -> Self {
        Symbol {
            name: name.into(),
            kind,
            section: None,
            value: None,
            storage_class: None,
        }
    }

    pub fn is_undefined(&self) -> bool {
        self.kind == 'U'
    }

    pub fn is_global(&self) -> bool {
        self.kind.is_ascii_uppercase()
    }
}

/// The symbols of one object file; inside an archive there is one group per
/// member, for a single object exactly one group named after the file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectSymbols {
    pub objectfile: String,
    pub symbols: Vec<Symbol>,
}
