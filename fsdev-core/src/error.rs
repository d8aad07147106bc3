//! Error types for the filesystem device.

use std::io;

use thiserror::Error;

use crate::dos::DosStatus;

/// A failing CBM DOS outcome.
///
/// Every variant corresponds to a status code the emulated program can read
/// back from channel 15. `FloppyError` is the bus-level refusal used when a
/// channel is asked for an operation its mode does not allow.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DosError {
    #[error("no file name")]
    NoName,

    #[error("syntax error")]
    Syntax,

    #[error("invalid command")]
    Inval,

    #[error("record length overflow")]
    Overflow,

    #[error("command line too long")]
    LongLine,

    #[error("invalid file name")]
    BadName,

    #[error("file not found")]
    NotFound,

    #[error("file exists")]
    FileExists,

    #[error("permission denied")]
    Permission,

    #[error("directory not empty")]
    NotEmpty,

    #[error("write file open")]
    NotWrite,

    #[error("no channel")]
    NoChannel,

    #[error("file type mismatch")]
    BadType,

    #[error("unimplemented")]
    Unimplemented,

    #[error("drive not ready")]
    NotReady,

    #[error("channel cannot perform this operation")]
    FloppyError,
}

impl DosError {
    /// Status code reported on the error channel for this failure.
    pub fn status(self) -> DosStatus {
        match self {
            DosError::NoName => DosStatus::NoName,
            DosError::Syntax => DosStatus::Syntax,
            DosError::Inval => DosStatus::Inval,
            DosError::Overflow => DosStatus::Overflow,
            DosError::LongLine => DosStatus::LongLine,
            DosError::BadName => DosStatus::BadName,
            DosError::NotFound => DosStatus::NotFound,
            DosError::FileExists => DosStatus::FileExists,
            DosError::Permission => DosStatus::Permission,
            DosError::NotEmpty => DosStatus::NotEmpty,
            DosError::NotWrite => DosStatus::NotWrite,
            DosError::NoChannel => DosStatus::NoChannel,
            DosError::BadType => DosStatus::BadType,
            DosError::Unimplemented => DosStatus::Unimplemented,
            DosError::NotReady => DosStatus::NotReady,
            DosError::FloppyError => DosStatus::NotOpen,
        }
    }

    /// Map a host I/O failure onto a DOS error.
    ///
    /// `fallback` is used for error kinds without a natural DOS counterpart;
    /// each call site picks it to match the command being executed.
    pub fn from_io(err: &io::Error, fallback: DosError) -> DosError {
        match err.kind() {
            io::ErrorKind::AlreadyExists => DosError::FileExists,
            io::ErrorKind::PermissionDenied => DosError::Permission,
            io::ErrorKind::NotFound => DosError::NotFound,
            _ => fallback,
        }
    }
}

/// Errors from the host-side plumbing around the device (configuration,
/// directory persistence).
#[derive(Error, Debug)]
pub enum FsdevError {
    #[error("DOS error: {0}")]
    Dos(#[from] DosError),

    #[error("Invalid unit: {0}")]
    InvalidUnit(u8),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for host-side device operations.
pub type FsResult<T> = Result<T, FsdevError>;
