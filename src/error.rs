//! A custom binkit error and a `Result` type alias, means of which the
//! readers and writers report every failure in this crate.

use core::result;
use std::io;

quick_error! {
    #[derive(Debug)]
    /// A custom binkit error
    pub enum Error {
        Io(err: io::Error) {
            from()
            source(err)
            display("{}", err)
        }
        Scroll(err: scroll::Error) {
            from()
            source(err)
            display("{}", err)
        }
        BadMagic(magic: u64) {
            display("Invalid magic number: 0x{:x}", magic)
        }
        Malformed(msg: String) {
            display("Malformed entity: {}", msg)
        }
        Unsupported(msg: String) {
            display("Unsupported: {}", msg)
        }
        SemverParse(input: String) {
            display("Invalid semantic version: {}", input)
        }
        Conflict(msg: String) {
            display("Name conflict: {}", msg)
        }
        NoSpace(msg: String) {
            display("No space: {}", msg)
        }
    }
}

/// An impish result
pub type Result<T> = result::Result<T, Error>;
