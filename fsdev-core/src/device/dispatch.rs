//! Command channel (secondary address 15).
//!
//! The bytes written to channel 15 are collected until `flush`, then parsed
//! into a [`DosCommand`] and executed against the unit's host directory.

use std::fs;
use std::io;
use std::path::Path;

use super::{FsDeviceManager, UnitOptions};
use crate::dos::DosStatus;
use crate::error::{DosError, FsdevError};
use crate::fs::charset::petscii_to_host_string;
use crate::fs::{DirectoryStore, FileIo, FormatFlags};

/// Capacity of the command buffer.
pub const COMMAND_BUFFER_SIZE: usize = 256;

/// A parsed channel-15 command. Names for rename and scratch stay PETSCII;
/// paths are host text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DosCommand {
    /// `M-R<lo><hi>[len]`: memory read
    MemoryRead { addr: u16, len: usize },
    /// `CD:path`
    ChangeDir(String),
    /// `CD_`: parent directory
    ParentDir,
    /// `/path,SSSS,C`: create a partition directory
    CreatePartition(String),
    /// `MD:path`
    MakeDir(String),
    /// `RD:path`
    RemoveDir(String),
    /// `UI`: reset, answers with the DOS version
    Reset,
    /// `I:...`: initialize, nothing to do on a host directory
    Initialize,
    /// `R:new=old`
    Rename { new: Vec<u8>, old: Vec<u8> },
    /// `S:pattern`
    Scratch(Vec<u8>),
}

impl DosCommand {
    /// Parse a command line with trailing CRs already removed.
    ///
    /// Tokens are compared on host text; `M-R` and the rename/scratch names
    /// use the raw bytes.
    pub fn parse(raw: &[u8]) -> Result<Self, DosError> {
        use DosCommand::*;

        if raw.starts_with(b"M-R") {
            let addr = u16::from_le_bytes([
                raw.get(3).copied().unwrap_or(0),
                raw.get(4).copied().unwrap_or(0),
            ]);
            let len = match raw.get(5) {
                None => 1,
                Some(0) => 256,
                Some(&n) => usize::from(n),
            };
            return Ok(MemoryRead { addr, len });
        }

        let text = petscii_to_host_string(raw);
        let text = text.trim_start_matches(' ');
        let (cmd, arg) = match text.split_once(':') {
            Some((cmd, arg)) => (cmd, Some(arg)),
            None => (text, None),
        };
        let raw_arg = raw
            .iter()
            .position(|&b| b == b':')
            .map(|colon| &raw[colon + 1..]);
        let non_empty = |arg: Option<&str>| arg.filter(|a| !a.is_empty()).map(str::to_string);

        if cmd == "cd" {
            if let Some(arg) = arg {
                return Ok(ChangeDir(arg.to_string()));
            }
        }
        if cmd.eq_ignore_ascii_case("cd_") {
            return Ok(ParentDir);
        }
        if let Some(rest) = cmd.strip_prefix('/') {
            return parse_partition(arg.unwrap_or(rest));
        }
        if cmd == "md" {
            if let Some(arg) = non_empty(arg) {
                return Ok(MakeDir(arg));
            }
        }
        if cmd == "rd" {
            if let Some(arg) = non_empty(arg) {
                return Ok(RemoveDir(arg));
            }
        }
        if cmd == "ui" {
            return Ok(Reset);
        }
        if cmd.starts_with('i') && non_empty(arg).is_some() {
            return Ok(Initialize);
        }
        if let Some(raw_arg) = raw_arg.filter(|a| !a.is_empty()) {
            if cmd.starts_with('r') {
                return match raw_arg.iter().position(|&b| b == b'=') {
                    Some(eq) if eq > 0 && eq + 1 < raw_arg.len() => Ok(Rename {
                        new: raw_arg[..eq].to_vec(),
                        old: raw_arg[eq + 1..].to_vec(),
                    }),
                    _ => Err(DosError::Syntax),
                };
            }
            if cmd.starts_with('s') {
                return Ok(Scratch(raw_arg.to_vec()));
            }
        }

        Err(DosError::Syntax)
    }
}

/// `path` alone changes directory; `path,SSSS,C` with four hex digits
/// creates one.
fn parse_partition(text: &str) -> Result<DosCommand, DosError> {
    let parts: Vec<&str> = text.split(',').collect();
    match parts.as_slice() {
        [path] if !path.is_empty() => Ok(DosCommand::ChangeDir(path.to_string())),
        [path, size, kind]
            if !path.is_empty()
                && size.len() == 4
                && size.chars().all(|c| c.is_ascii_hexdigit())
                && kind.eq_ignore_ascii_case("c") =>
        {
            Ok(DosCommand::CreatePartition(path.to_string()))
        }
        _ => Err(DosError::Syntax),
    }
}

/// What a successful command leaves on the status channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Status(DosStatus),
    Memory(Vec<u8>),
}

/// Bytes collected from channel 15.
#[derive(Debug, Default)]
pub struct CommandBuffer {
    bytes: Vec<u8>,
    overflowed: bool,
}

impl CommandBuffer {
    /// Append one byte. A full buffer marks the command as failed.
    pub fn push(&mut self, byte: u8) -> Result<(), DosError> {
        if self.bytes.len() >= COMMAND_BUFFER_SIZE {
            self.overflowed = true;
            return Err(DosError::LongLine);
        }
        self.bytes.push(byte);
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty() && !self.overflowed
    }

    /// Hand out the collected command and reset. `Err(LongLine)` if it
    /// overflowed.
    pub fn take(&mut self) -> Result<Vec<u8>, DosError> {
        let bytes = std::mem::take(&mut self.bytes);
        if std::mem::take(&mut self.overflowed) {
            return Err(DosError::LongLine);
        }
        Ok(bytes)
    }
}

impl<S: DirectoryStore, F: FileIo> FsDeviceManager<S, F> {
    /// Run one parsed command for `unit`.
    pub(super) fn execute_command(
        &mut self,
        unit: u8,
        options: UnitOptions,
        command: DosCommand,
    ) -> Result<Reply, DosError> {
        use DosCommand::*;

        let dir = self.store.directory(unit);
        let flags = FormatFlags::new(options.convert_p00, options.hide_cbm_files);
        log::debug!("fsdevice: unit {} command {:?}", unit, command);

        let status = match command {
            MemoryRead { addr, len } => return Ok(Reply::Memory(self.memory.read(addr, len))),
            ChangeDir(path) => self.change_dir(unit, &dir, &path)?,
            ParentDir => self.change_dir(unit, &dir, "..")?,
            CreatePartition(path) | MakeDir(path) => make_dir(&dir.join(path))?,
            RemoveDir(path) => remove_dir(&dir.join(path))?,
            Reset => DosStatus::DosVersion,
            Initialize => DosStatus::Ok,
            Rename { new, old } => {
                self.io.rename(&old, &new, &dir, flags)?;
                DosStatus::Ok
            }
            Scratch(pattern) => {
                let count = self.io.scratch(&pattern, &dir, flags)?;
                log::debug!("fsdevice: {} file(s) scratched", count);
                DosStatus::Deleted
            }
        };
        Ok(Reply::Status(status))
    }

    fn change_dir(&mut self, unit: u8, dir: &Path, path: &str) -> Result<DosStatus, DosError> {
        let target = dir
            .join(path)
            .canonicalize()
            .map_err(|e| DosError::from_io(&e, DosError::NotFound))?;
        if !target.is_dir() {
            return Err(DosError::NotFound);
        }
        self.store.set_directory(unit, &target).map_err(|e| {
            log::warn!("fsdevice: storing directory for unit {} failed: {}", unit, e);
            match e {
                FsdevError::Dos(e) => e,
                _ => DosError::NotReady,
            }
        })?;
        log::debug!("fsdevice: unit {} now in {}", unit, target.display());
        Ok(DosStatus::Ok)
    }
}

fn make_dir(path: &Path) -> Result<DosStatus, DosError> {
    fs::create_dir(path).map_err(|e| DosError::from_io(&e, DosError::Inval))?;
    Ok(DosStatus::Ok)
}

fn remove_dir(path: &Path) -> Result<DosStatus, DosError> {
    fs::remove_dir(path).map_err(|e| match e.kind() {
        io::ErrorKind::PermissionDenied => DosError::Permission,
        _ => DosError::NotEmpty,
    })?;
    Ok(DosStatus::Ok)
}
