//! CBM DOS wire vocabulary.
//!
//! This module holds everything that must match real drive firmware byte for
//! byte: status codes and their texts, the command-string parser, the status
//! channel and the wildcard rules.

pub mod command;
pub mod status;
pub mod wildcard;

pub use command::{parse_command, AccessMode, FileType, ParsedCommand};
pub use status::StatusChannel;
pub use wildcard::{cbm_wildcard_match, dirmask_match, host_wildcard_match};

/// Byte handed to the bus together with an end-of-file signal.
pub const EOF_SENTINEL: u8 = 0xC7;

/// PETSCII shifted space, used to pad names on real disks.
pub const PAD_BYTE: u8 = 0xA0;

/// Length of a CBM file name.
pub const NAME_LENGTH: usize = 16;

/// Text reported for the DOS version pseudo status.
pub const DOS_VERSION_TEXT: &str = "VICE FS DRIVER V2.0";

/// Text reported for codes missing from the message table.
pub const UNKNOWN_ERROR_TEXT: &str = "UNKNOWN ERROR NUMBER";

/// CBM DOS status codes as reported on channel 15.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum DosStatus {
    /// 00: everything fine
    Ok = 0,
    /// 01: scratch succeeded
    Deleted = 1,
    /// 02: partition selected
    SelectedPartition = 2,
    /// 03: command not implemented
    Unimplemented = 3,
    /// 04: pseudo code, buffer carries raw memory-read bytes
    MemoryRead = 4,
    /// 26: write protect on
    WriteProtect = 26,
    /// 30: syntax error
    Syntax = 30,
    /// 31: invalid command
    Inval = 31,
    /// 32: command line too long
    LongLine = 32,
    /// 33: invalid file name
    BadName = 33,
    /// 34: no file name given
    NoName = 34,
    /// 51: overflow in record
    Overflow = 51,
    /// 60: write file open
    NotWrite = 60,
    /// 61: file not open
    NotOpen = 61,
    /// 62: file not found
    NotFound = 62,
    /// 63: file exists
    FileExists = 63,
    /// 64: file type mismatch
    BadType = 64,
    /// 70: no channel
    NoChannel = 70,
    /// 72: disk full
    DiskFull = 72,
    /// 73: pseudo code, reports the driver version
    DosVersion = 73,
    /// 74: drive not ready
    NotReady = 74,
    /// 77: selected partition illegal
    BadPartition = 77,
    /// 80: directory not empty
    NotEmpty = 80,
    /// 81: permission denied
    Permission = 81,
}

impl DosStatus {
    /// Numeric code as printed in the status line.
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Text printed after the code in the status line.
    pub fn message(self) -> &'static str {
        match self {
            DosStatus::DosVersion => DOS_VERSION_TEXT,
            other => message_for(other.code()),
        }
    }

    /// True for the codes that the status channel debounce lets through.
    pub fn is_overwritable(self) -> bool {
        matches!(self, DosStatus::Ok | DosStatus::DosVersion)
    }
}

impl TryFrom<u8> for DosStatus {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Ok),
            1 => Ok(Self::Deleted),
            2 => Ok(Self::SelectedPartition),
            3 => Ok(Self::Unimplemented),
            4 => Ok(Self::MemoryRead),
            26 => Ok(Self::WriteProtect),
            30 => Ok(Self::Syntax),
            31 => Ok(Self::Inval),
            32 => Ok(Self::LongLine),
            33 => Ok(Self::BadName),
            34 => Ok(Self::NoName),
            51 => Ok(Self::Overflow),
            60 => Ok(Self::NotWrite),
            61 => Ok(Self::NotOpen),
            62 => Ok(Self::NotFound),
            63 => Ok(Self::FileExists),
            64 => Ok(Self::BadType),
            70 => Ok(Self::NoChannel),
            72 => Ok(Self::DiskFull),
            73 => Ok(Self::DosVersion),
            74 => Ok(Self::NotReady),
            77 => Ok(Self::BadPartition),
            80 => Ok(Self::NotEmpty),
            81 => Ok(Self::Permission),
            _ => Err(value),
        }
    }
}

/// Drive firmware message table.
const MESSAGES: &[(u8, &str)] = &[
    (0, "OK"),
    (1, "FILES SCRATCHED"),
    (2, "SELECTED PARTITION"),
    (3, "UNIMPLEMENTED"),
    (26, "WRITE PROTECT ON"),
    (30, "SYNTAX ERROR"),
    (31, "SNERR INVALID COMMAND"),
    (32, "SNERR LINE TOO LONG"),
    (33, "SNERR INVAL FILE NAME"),
    (34, "SNERR NO FILE NAME"),
    (51, "OVERFLOW IN RECORD"),
    (60, "WRITE FILE OPEN"),
    (61, "FILE NOT OPEN"),
    (62, "FILE NOT FOUND"),
    (63, "FILE EXISTS"),
    (64, "FILE TYPE MISMATCH"),
    (65, "NO BLOCK"),
    (66, "ILLEGAL TRACK OR SECTOR"),
    (67, "ILLEGAL SYSTEM T OR S"),
    (70, "NO CHANNEL"),
    (72, "DISK FULL"),
    (73, "VIRTUAL DRIVE EMULATION V2.2"),
    (74, "DRIVE NOT READY"),
    (77, "SELECTED PARTITION ILLEGAL"),
    (80, "DIRECTORY NOT EMPTY"),
    (81, "PERMISSION DENIED"),
];

/// Look up the firmware text for a raw status number.
pub fn message_for(code: u8) -> &'static str {
    MESSAGES
        .iter()
        .find(|(nr, _)| *nr == code)
        .map(|(_, text)| *text)
        .unwrap_or(UNKNOWN_ERROR_TEXT)
}

/// One byte read from a channel.
///
/// When `eof` is set the transfer is over and `data` holds
/// [`EOF_SENTINEL`]. Callers must test the flag, since `0xC7` is also a
/// legal data byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadByte {
    pub data: u8,
    pub eof: bool,
}

impl ReadByte {
    pub fn data(data: u8) -> Self {
        Self { data, eof: false }
    }

    pub fn eof() -> Self {
        Self {
            data: EOF_SENTINEL,
            eof: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trip_through_code() {
        for code in 0..=255u8 {
            if let Ok(status) = DosStatus::try_from(code) {
                assert_eq!(status.code(), code);
            }
        }
    }

    #[test]
    fn test_messages() {
        assert_eq!(DosStatus::Ok.message(), "OK");
        assert_eq!(DosStatus::NotFound.message(), "FILE NOT FOUND");
        assert_eq!(DosStatus::DosVersion.message(), "VICE FS DRIVER V2.0");
        assert_eq!(message_for(99), "UNKNOWN ERROR NUMBER");
        assert_eq!(DosStatus::MemoryRead.message(), "UNKNOWN ERROR NUMBER");
    }

    #[test]
    fn test_read_byte() {
        assert_eq!(ReadByte::eof().data, 0xC7);
        assert!(ReadByte::eof().eof);
        assert!(!ReadByte::data(0xC7).eof);
    }
}
