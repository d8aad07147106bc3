//! Host side of the device.
//!
//! - `charset`: PETSCII <-> host text conversion
//! - `p00`: PC64 container codec
//! - `FileIo`: rename/scratch policy (`HostFileIo`)
//! - `DirectoryStore`: per-unit directory persistence (`MemoryDirectoryStore`)

pub mod charset;
mod host_io;
pub mod p00;
mod store;

pub use host_io::{FileIo, FormatFlags, HostFileIo};
pub use store::{unit_index, DirectoryStore, MemoryDirectoryStore, FIRST_UNIT, UNIT_COUNT};
