//! Commodore DOS filesystem device
//!
//! This crate emulates a CBM disk drive (units 8-11) on top of host
//! directories:
//! - CBM DOS wire vocabulary: status codes, OPEN name parsing, wildcards
//! - PC64 (P00) containers that keep real CBM names on a host filesystem
//! - `$` directory listings rendered as BASIC programs
//! - The command channel (`CD`, `MD`, `RD`, `R`, `S`, `M-R`, `UI`, ...)
//!
//! # Architecture
//!
//! - `FsDeviceManager`: the bus-facing device, one `UnitState` per unit
//! - `DirectoryStore` trait: where each unit's directory is remembered
//! - `FileIo` trait: rename/scratch policy for P00 and plain files
//! - `DriveMemory` trait: memory served to `M-R`
//!
//! ```no_run
//! use fsdev_core::FsDeviceManager;
//!
//! let mut device = FsDeviceManager::with_directory("/home/me/c64");
//! device.open(8, 0, b"$").unwrap();
//! while !device.read_byte(8, 0).unwrap().eof {}
//! device.close(8, 0).unwrap();
//! ```

pub mod config;
pub mod device;
pub mod dos;
pub mod error;
pub mod fs;

pub use config::{ConfigStore, DeviceConfig, UnitConfig};
pub use device::{
    DosCommand, DriveMemory, DriveRam, FsDeviceManager, UnitOptions, COMMAND_CHANNEL,
};
pub use dos::{parse_command, AccessMode, DosStatus, FileType, ParsedCommand, ReadByte};
pub use error::{DosError, FsResult, FsdevError};
pub use fs::{DirectoryStore, FileIo, FormatFlags, HostFileIo, MemoryDirectoryStore};
