//! Semantic versions: parsing (strict and permissive), the total order
//! over versions, range matching in [`range`] and version selection in
//! [`select`].

pub mod range;
pub mod select;

pub use self::range::{Comparator, Op, Range};
pub use self::select::{select, Selection};

use crate::error::{Error, Result};
use core::cmp::Ordering;
use core::fmt;

/// Compare two version strings by semver precedence
pub fn compare(a: &str, b: &str) -> Result<Ordering> {
    Ok(Version::parse(a)?.cmp(&Version::parse(b)?))
}

/// Whether `version` satisfies the range expression `range`
pub fn satisfies(version: &str, range: &str) -> Result<bool> {
    Ok(Range::parse(range)?.matches(&Version::parse(version)?))
}

/// One dot-separated prerelease or build identifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Id {
    Numeric(u64),
    Alphanum(String),
}

impl Id {
    /// Numeric identifiers order below alphanumeric ones; numerics compare
    /// by value, alphanumerics lexicographically
    fn cmp_id(&self, other: &Id) -> Ordering {
        match (self, other) {
            (Id::Numeric(a), Id::Numeric(b)) => a.cmp(b),
            (Id::Alphanum(a), Id::Alphanum(b)) => a.cmp(b),
            (Id::Numeric(_), Id::Alphanum(_)) => Ordering::Less,
            (Id::Alphanum(_), Id::Numeric(_)) => Ordering::Greater,
        }
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Id::Numeric(n) => write!(f, "{}", n),
            Id::Alphanum(s) => f.write_str(s),
        }
    }
}

/// A parsed semantic version. `build` never participates in ordering or
/// equality, matching the precedence rules.
#[derive(Debug, Clone, Default)]
pub struct Version {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
    pub prerelease: Vec<Id>,
    pub build: Vec<Id>,
}

impl Version {
    pub fn new(major: u64, minor: u64, patch: u64) -> Version {
        Version {
            major,
            minor,
            patch,
            prerelease: Vec::new(),
            build: Vec::new(),
        }
    }

    /// Strict parse: `v`? major `.` minor `.` patch, optional `-prerelease`
    /// and `+build`, nothing left over
    pub fn parse(input: &str) -> Result<Version> {
        let mut p = Parser::new(input);
        let version = p.version(true)?;
        if !p.at_end() {
            return Err(Error::SemverParse(input.to_string()));
        }
        Ok(version)
    }

    /// Permissive parse used when sifting candidate strings: missing minor
    /// and patch default to zero and trailing junk after a parsed
    /// component is tolerated
    pub fn try_parse(input: &str) -> Result<Version> {
        let mut p = Parser::new(input);
        p.version(false)
    }

    pub fn is_prerelease(&self) -> bool {
        !self.prerelease.is_empty()
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)?;
        if !self.prerelease.is_empty() {
            write!(f, "-")?;
            for (i, id) in self.prerelease.iter().enumerate() {
                if i > 0 {
                    write!(f, ".")?;
                }
                write!(f, "{}", id)?;
            }
        }
        if !self.build.is_empty() {
            write!(f, "+")?;
            for (i, id) in self.build.iter().enumerate() {
                if i > 0 {
                    write!(f, ".")?;
                }
                write!(f, "{}", id)?;
            }
        }
        Ok(())
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Version) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Version {}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Version) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Version {
    /// The semver precedence order: numeric core first; at an equal core a
    /// prerelease sorts below the release; prerelease identifiers compare
    /// pairwise, a longer list winning when the shared prefix is equal
    fn cmp(&self, other: &Version) -> Ordering {
        self.major
            .cmp(&other.major)
            .then_with(|| self.minor.cmp(&other.minor))
            .then_with(|| self.patch.cmp(&other.patch))
            .then_with(|| match (self.prerelease.is_empty(), other.prerelease.is_empty()) {
                (true, true) => Ordering::Equal,
                (true, false) => Ordering::Greater,
                (false, true) => Ordering::Less,
                (false, false) => {
                    for (a, b) in self.prerelease.iter().zip(other.prerelease.iter()) {
                        match a.cmp_id(b) {
                            Ordering::Equal => continue,
                            other => return other,
                        }
                    }
                    self.prerelease.len().cmp(&other.prerelease.len())
                }
            })
    }
}

/// A hand-rolled cursor over the input; both the strict version grammar
/// and the permissive variant run on it, as do the partials in [`range`]
pub(crate) struct Parser<'a> {
    input: &'a str,
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Parser<'a> {
    pub(crate) fn new(input: &'a str) -> Parser<'a> {
        Parser {
            input,
            bytes: input.as_bytes(),
            pos: 0,
        }
    }

    pub(crate) fn at_end(&self) -> bool {
        self.pos >= self.bytes.len()
    }

    pub(crate) fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    pub(crate) fn eat(&mut self, b: u8) -> bool {
        if self.peek() == Some(b) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn fail(&self) -> Error {
        Error::SemverParse(self.input.to_string())
    }

    /// A run of decimal digits
    pub(crate) fn number(&mut self) -> Result<u64> {
        let start = self.pos;
        while matches!(self.peek(), Some(b'0'..=b'9')) {
            self.pos += 1;
        }
        if self.pos == start {
            return Err(self.fail());
        }
        self.input[start..self.pos]
            .parse()
            .map_err(|_| self.fail())
    }

    /// `v`? num `.` num `.` num (`-` prerel)? (`+` build)?; with
    /// `strict` unset, missing components default to zero
    fn version(&mut self, strict: bool) -> Result<Version> {
        self.eat(b'v');
        let major = self.number()?;
        let mut minor = 0;
        let mut patch = 0;
        if self.eat(b'.') {
            minor = if strict {
                self.number()?
            } else {
                self.number().unwrap_or(0)
            };
            if self.eat(b'.') {
                patch = if strict {
                    self.number()?
                } else {
                    self.number().unwrap_or(0)
                };
            } else if strict {
                return Err(self.fail());
            }
        } else if strict {
            return Err(self.fail());
        }
        let mut version = Version::new(major, minor, patch);
        if self.eat(b'-') {
            version.prerelease = self.ids(strict)?;
        }
        if self.eat(b'+') {
            version.build = self.ids(strict)?;
        }
        Ok(version)
    }

    /// Dot-separated identifiers: alphanumerics and hyphens; an all-digit
    /// identifier is numeric, and must not carry a leading zero
    pub(crate) fn ids(&mut self, strict: bool) -> Result<Vec<Id>> {
        let mut ids = Vec::new();
        loop {
            let start = self.pos;
            while matches!(self.peek(), Some(b) if b.is_ascii_alphanumeric() || b == b'-') {
                self.pos += 1;
            }
            if self.pos == start {
                if strict {
                    return Err(self.fail());
                }
                break;
            }
            let raw = &self.input[start..self.pos];
            if raw.bytes().all(|b| b.is_ascii_digit()) {
                if strict && raw.len() >= 2 && raw.starts_with('0') {
                    return Err(self.fail());
                }
                ids.push(Id::Numeric(raw.parse().map_err(|_| self.fail())?));
            } else {
                ids.push(Id::Alphanum(raw.to_string()));
            }
            if !self.eat(b'.') {
                break;
            }
        }
        if ids.is_empty() {
            return Err(self.fail());
        }
        Ok(ids)
    }
}
