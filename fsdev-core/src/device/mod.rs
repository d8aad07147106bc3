//! The virtual drive.
//!
//! [`FsDeviceManager`] serves units 8-11 from host directories. The serial
//! bus layer calls five entry points, always with `(unit, secondary)`:
//! `open`, `read_byte`, `write_byte`, `close` and `flush`. Failures are
//! returned to the caller and also recorded on the unit's status channel,
//! where the emulated program reads them with `INPUT#15`.

mod channel;
mod directory;
mod dispatch;
mod memory;

pub use channel::{Channel, ChannelState};
pub use directory::{DirectoryListing, ListingOptions};
pub use dispatch::{CommandBuffer, DosCommand, Reply, COMMAND_BUFFER_SIZE};
pub use memory::{DriveMemory, DriveRam};

use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use crate::config::{DeviceConfig, UnitConfig};
use crate::dos::{
    host_wildcard_match, parse_command, AccessMode, DosStatus, ParsedCommand, ReadByte,
    StatusChannel,
};
use crate::error::{DosError, FsResult, FsdevError};
use crate::fs::charset::petscii_to_host_string;
use crate::fs::{p00, unit_index, DirectoryStore, FileIo, HostFileIo, MemoryDirectoryStore};
use crate::fs::{FIRST_UNIT, UNIT_COUNT};

/// Secondary address of the command/status channel.
pub const COMMAND_CHANNEL: u8 = 15;

/// Number of secondary addresses per unit.
pub const CHANNEL_COUNT: usize = 16;

/// P00 handling for one unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnitOptions {
    pub convert_p00: bool,
    pub save_p00: bool,
    pub hide_cbm_files: bool,
}

impl Default for UnitOptions {
    fn default() -> Self {
        Self::from(&UnitConfig::default())
    }
}

impl From<&UnitConfig> for UnitOptions {
    fn from(config: &UnitConfig) -> Self {
        Self {
            convert_p00: config.convert_p00,
            save_p00: config.save_p00,
            hide_cbm_files: config.hide_cbm_files,
        }
    }
}

impl UnitOptions {
    /// Plain host files are hidden only while P00 conversion is on.
    pub fn hides_plain_files(&self) -> bool {
        self.convert_p00 && self.hide_cbm_files
    }
}

/// Everything one unit owns.
#[derive(Debug, Default)]
struct UnitState {
    channels: [Channel; CHANNEL_COUNT],
    status: StatusChannel,
    command: CommandBuffer,
    options: UnitOptions,
}

impl UnitState {
    fn attached() -> Self {
        let mut unit = Self::default();
        unit.status.push(DosStatus::DosVersion);
        unit
    }
}

/// Units 8-11 backed by host directories.
pub struct FsDeviceManager<S: DirectoryStore = MemoryDirectoryStore, F: FileIo = HostFileIo> {
    units: [UnitState; UNIT_COUNT],
    store: S,
    io: F,
    memory: Box<dyn DriveMemory>,
}

impl FsDeviceManager<MemoryDirectoryStore, HostFileIo> {
    /// All units serve `dir` with default options.
    pub fn with_directory(dir: impl Into<PathBuf>) -> Self {
        Self::new(MemoryDirectoryStore::new(dir), HostFileIo::new())
    }
}

impl<S: DirectoryStore, F: FileIo> FsDeviceManager<S, F> {
    /// Fresh device; every unit starts with the DOS version pending on its
    /// status channel.
    pub fn new(store: S, io: F) -> Self {
        Self {
            units: std::array::from_fn(|_| UnitState::attached()),
            store,
            io,
            memory: Box::new(DriveRam::default()),
        }
    }

    /// Fresh device with per-unit options taken from `config`.
    pub fn with_config(store: S, io: F, config: &DeviceConfig) -> Self {
        let mut device = Self::new(store, io);
        for (index, unit) in device.units.iter_mut().enumerate() {
            unit.options = UnitOptions::from(&config.unit(FIRST_UNIT + index as u8));
        }
        device
    }

    pub fn configure_unit(&mut self, unit: u8, options: UnitOptions) -> FsResult<()> {
        let index = unit_index(unit).ok_or(FsdevError::InvalidUnit(unit))?;
        self.units[index].options = options;
        Ok(())
    }

    pub fn unit_options(&self, unit: u8) -> Option<UnitOptions> {
        unit_index(unit).map(|index| self.units[index].options)
    }

    /// Replace the memory served to `M-R`.
    pub fn set_memory(&mut self, memory: Box<dyn DriveMemory>) {
        self.memory = memory;
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Host directory currently served by `unit`.
    pub fn directory(&self, unit: u8) -> PathBuf {
        self.store.directory(unit)
    }

    /// Channel slot, for inspection.
    pub fn channel(&self, unit: u8, secondary: u8) -> Option<&Channel> {
        let (index, secondary) = address(unit, secondary).ok()?;
        Some(&self.units[index].channels[secondary])
    }

    /// Open `name` on a channel. On secondary 15 the name is a command and
    /// is only collected; `flush` runs it.
    pub fn open(&mut self, unit: u8, secondary: u8, name: &[u8]) -> Result<(), DosError> {
        let (index, slot) = address(unit, secondary)?;

        if secondary == COMMAND_CHANNEL {
            for &byte in name {
                self.write_command_byte(index, byte)?;
            }
            return Ok(());
        }

        if !self.units[index].channels[slot].is_idle() {
            return Err(DosError::FloppyError);
        }

        log::debug!(
            "fsdevice: open unit {} #{} \"{}\"",
            unit,
            secondary,
            petscii_to_host_string(name)
        );
        let result = parse_command(name, secondary).and_then(|command| {
            let (state, command) = self.open_channel(unit, index, command)?;
            self.units[index].channels[slot].open(
                state,
                command.file_type(),
                command.record_length(),
            );
            Ok(())
        });

        let status = &mut self.units[index].status;
        match result {
            Ok(()) => status.push(DosStatus::Ok),
            Err(DosError::FloppyError) => {}
            Err(e) => status.push(e.status()),
        }
        result
    }

    /// Next byte from a channel; on secondary 15 the status line.
    pub fn read_byte(&mut self, unit: u8, secondary: u8) -> Result<ReadByte, DosError> {
        let (index, slot) = address(unit, secondary)?;
        let unit = &mut self.units[index];
        if secondary == COMMAND_CHANNEL {
            return Ok(unit.status.drain_byte());
        }
        unit.channels[slot].read_byte()
    }

    /// Write to an open file; on secondary 15 the byte joins the command.
    pub fn write_byte(&mut self, unit: u8, secondary: u8, byte: u8) -> Result<(), DosError> {
        let (index, slot) = address(unit, secondary)?;
        if secondary == COMMAND_CHANNEL {
            return self.write_command_byte(index, byte);
        }
        self.units[index].channels[slot].write_byte(byte)
    }

    /// Release a channel. Closing 15 re-arms the status channel with `OK`.
    pub fn close(&mut self, unit: u8, secondary: u8) -> Result<(), DosError> {
        let (index, slot) = address(unit, secondary)?;
        let unit = &mut self.units[index];
        if secondary == COMMAND_CHANNEL {
            unit.status.push(DosStatus::Ok);
        } else {
            unit.channels[slot].close();
        }
        Ok(())
    }

    /// Run the collected command. Other secondaries and an empty buffer
    /// are no-ops. The outcome is always pushed to the status channel.
    pub fn flush(&mut self, unit: u8, secondary: u8) -> Result<DosStatus, DosError> {
        let (index, _) = address(unit, secondary)?;
        if secondary != COMMAND_CHANNEL || self.units[index].command.is_empty() {
            return Ok(DosStatus::Ok);
        }

        let mut command = match self.units[index].command.take() {
            Ok(command) => command,
            Err(e) => {
                log::debug!("fsdevice: unit {} discarding overlong command", unit);
                return Err(e);
            }
        };
        while command.last() == Some(&b'\r') {
            command.pop();
        }
        if command.is_empty() {
            return Ok(DosStatus::Ok);
        }

        let options = self.units[index].options;
        let result = DosCommand::parse(&command)
            .and_then(|parsed| self.execute_command(unit, options, parsed));

        let status = &mut self.units[index].status;
        match result {
            Ok(Reply::Memory(bytes)) => {
                status.push_memory_read(&bytes);
                Ok(DosStatus::MemoryRead)
            }
            Ok(Reply::Status(code)) => {
                status.push(code);
                Ok(code)
            }
            Err(e) => {
                status.push(e.status());
                Err(e)
            }
        }
    }

    /// Drain the pending status line of `unit`.
    pub fn read_status(&mut self, unit: u8) -> Result<Vec<u8>, DosError> {
        let (index, _) = address(unit, COMMAND_CHANNEL)?;
        Ok(self.units[index].status.read_line())
    }

    /// Write a whole command to channel 15 and run it.
    pub fn send_command(&mut self, unit: u8, command: &[u8]) -> Result<DosStatus, DosError> {
        self.open(unit, COMMAND_CHANNEL, command)?;
        self.flush(unit, COMMAND_CHANNEL)
    }

    fn write_command_byte(&mut self, index: usize, byte: u8) -> Result<(), DosError> {
        let unit = &mut self.units[index];
        unit.command.push(byte).map_err(|e| {
            unit.status.push(e.status());
            e
        })
    }

    fn open_channel(
        &mut self,
        unit: u8,
        index: usize,
        command: ParsedCommand,
    ) -> Result<(ChannelState, ParsedCommand), DosError> {
        let dir = self.store.directory(unit);
        let options = self.units[index].options;

        let state = if command.is_directory() {
            if command.secondary() != 0 || command.mode() != AccessMode::Read {
                return Err(DosError::NotWrite);
            }
            open_listing(&dir, command.name(), options)?
        } else {
            match command.mode() {
                AccessMode::Write => open_write(&dir, &command, options)?,
                AccessMode::Append => open_append(&dir, &command, options)?,
                AccessMode::Read => open_read(&dir, &command, options)?,
            }
        };
        Ok((state, command))
    }
}

/// Map `(unit, secondary)` to table indices.
fn address(unit: u8, secondary: u8) -> Result<(usize, usize), DosError> {
    let index = unit_index(unit).ok_or(DosError::NotReady)?;
    let slot = usize::from(secondary);
    if slot >= CHANNEL_COUNT {
        return Err(DosError::NotReady);
    }
    Ok((index, slot))
}

fn has_wildcards(text: &str) -> bool {
    text.contains(['*', '?'])
}

/// `$[:path/][mask]`: resolve the listing directory and mask.
fn open_listing(dir: &Path, name: &[u8], options: UnitOptions) -> Result<ChannelState, DosError> {
    let name = petscii_to_host_string(name);
    let (sub_path, mask) = match name.rsplit_once('/') {
        Some((path, mask)) if has_wildcards(mask) => (path, mask),
        None if has_wildcards(&name) => ("", name.as_str()),
        _ => (name.as_str(), ""),
    };

    let listing_options = ListingOptions {
        convert_p00: options.convert_p00,
        hide_cbm_files: options.hide_cbm_files,
    };
    let listing = DirectoryListing::open(&dir.join(sub_path), mask.as_bytes(), listing_options)
        .or_else(|_| {
            DirectoryListing::open(
                &dir.join(sub_path.to_lowercase()),
                mask.as_bytes(),
                listing_options,
            )
        })?;
    Ok(ChannelState::Listing(listing))
}

/// First plain host file matching a wildcard name.
fn find_plain_file(dir: &Path, pattern: &str) -> Option<PathBuf> {
    fs::read_dir(dir).ok()?.flatten().find_map(|entry| {
        let file_name = entry.file_name();
        let name = file_name.to_str()?;
        if !host_wildcard_match(pattern.as_bytes(), name.as_bytes()) {
            return None;
        }
        let path = entry.path();
        let is_container =
            p00::p00_check_name(name).is_some() && p00::read_real_name(&path).is_some();
        (!is_container).then_some(path)
    })
}

fn host_path(dir: &Path, command: &ParsedCommand) -> PathBuf {
    let name = petscii_to_host_string(command.name());
    if command.has_wildcards() {
        if let Some(path) = find_plain_file(dir, &name) {
            return path;
        }
    }
    dir.join(name)
}

fn io_error(e: std::io::Error) -> DosError {
    DosError::from_io(&e, DosError::NotFound)
}

fn open_write(
    dir: &Path,
    command: &ParsedCommand,
    options: UnitOptions,
) -> Result<ChannelState, DosError> {
    if command.has_wildcards() {
        return Err(DosError::BadName);
    }
    let path = host_path(dir, command);
    let container = if options.convert_p00 {
        p00::find_by_wildcard(dir, command.name())
    } else {
        None
    };

    if path.exists() || container.is_some() {
        if !command.is_replace() {
            return Err(DosError::FileExists);
        }
        if path.is_file() {
            fs::remove_file(&path).map_err(io_error)?;
        }
        if let Some((container, _)) = &container {
            fs::remove_file(container).map_err(io_error)?;
        }
    }

    let file = if options.save_p00 {
        if command.file_type().p00_letter().is_none() {
            return Err(DosError::BadType);
        }
        let stem = dir.join(p00::host_stem(command.name()));
        let (path, file) = p00::create_container_with_record_length(
            &stem,
            command.file_type(),
            &p00::pad_name(command.name()),
            command.record_length(),
        )
        .map_err(|e| DosError::from_io(&e, DosError::FileExists))?;
        log::debug!("fsdevice: created {}", path.display());
        file
    } else {
        File::create(&path).map_err(io_error)?
    };
    Ok(ChannelState::Writing(BufWriter::new(file)))
}

fn open_append(
    dir: &Path,
    command: &ParsedCommand,
    options: UnitOptions,
) -> Result<ChannelState, DosError> {
    if command.has_wildcards() {
        return Err(DosError::BadName);
    }
    let path = host_path(dir, command);
    let target = if path.is_file() {
        path
    } else if options.convert_p00 {
        p00::find_by_wildcard(dir, command.name())
            .map(|(container, _)| container)
            .ok_or(DosError::NotFound)?
    } else {
        return Err(DosError::NotFound);
    };
    let file = OpenOptions::new().append(true).open(&target).map_err(io_error)?;
    Ok(ChannelState::Appending(BufWriter::new(file)))
}

fn open_read(
    dir: &Path,
    command: &ParsedCommand,
    options: UnitOptions,
) -> Result<ChannelState, DosError> {
    let path = host_path(dir, command);
    let file = if path.is_file() {
        if options.hides_plain_files() {
            return Err(DosError::NotFound);
        }
        File::open(&path).map_err(io_error)?
    } else if options.convert_p00 {
        let (container, _) =
            p00::find_by_wildcard(dir, command.name()).ok_or(DosError::NotFound)?;
        p00::open_payload(&container).map_err(io_error)?
    } else {
        return Err(DosError::NotFound);
    };
    Ok(ChannelState::Reading(BufReader::new(file)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dos::FileType;
    use crate::testutil::ScratchDir;

    fn device(dir: &ScratchDir) -> FsDeviceManager {
        let mut device = FsDeviceManager::with_directory(dir.path());
        // Discard the version banner.
        device.read_status(8).unwrap();
        device
    }

    fn read_all(device: &mut FsDeviceManager, secondary: u8) -> Vec<u8> {
        let mut out = Vec::new();
        loop {
            let byte = device.read_byte(8, secondary).unwrap();
            if byte.eof {
                return out;
            }
            out.push(byte.data);
        }
    }

    #[test]
    fn test_version_banner_on_attach() {
        let dir = ScratchDir::new("dev-banner");
        let mut device = FsDeviceManager::with_directory(dir.path());
        assert_eq!(device.read_status(9).unwrap(), b"73,VICE FS DRIVER V2.0,00,00\r");
        assert_eq!(device.read_status(9).unwrap(), b"00,OK,00,00\r");
    }

    #[test]
    fn test_bad_address() {
        let dir = ScratchDir::new("dev-address");
        let mut device = device(&dir);
        assert_eq!(device.open(7, 2, b"X"), Err(DosError::NotReady));
        assert_eq!(device.read_byte(12, 0), Err(DosError::NotReady));
        assert_eq!(device.write_byte(8, 16, 0), Err(DosError::NotReady));
        assert_eq!(device.read_status(8).unwrap(), b"00,OK,00,00\r");
    }

    #[test]
    fn test_save_and_load_raw() {
        let dir = ScratchDir::new("dev-raw");
        let mut device = device(&dir);

        device.open(8, 1, b"HELLO").unwrap();
        for &b in b"\x01\x08hi" {
            device.write_byte(8, 1, b).unwrap();
        }
        device.close(8, 1).unwrap();
        assert_eq!(fs::read(dir.path().join("hello")).unwrap(), b"\x01\x08hi");

        device.open(8, 0, b"HELLO").unwrap();
        assert_eq!(read_all(&mut device, 0), b"\x01\x08hi");
        device.close(8, 0).unwrap();
        assert!(device.channel(8, 0).unwrap().is_idle());
    }

    #[test]
    fn test_save_refuses_existing_file() {
        let dir = ScratchDir::new("dev-exists");
        fs::write(dir.path().join("data"), b"old").unwrap();
        let mut device = device(&dir);

        assert_eq!(device.open(8, 1, b"DATA"), Err(DosError::FileExists));
        assert_eq!(device.read_status(8).unwrap(), b"63,FILE EXISTS,00,00\r");

        device.open(8, 1, b"@0:DATA").unwrap();
        device.write_byte(8, 1, b'n').unwrap();
        device.close(8, 1).unwrap();
        assert_eq!(fs::read(dir.path().join("data")).unwrap(), b"n");
    }

    #[test]
    fn test_busy_channel() {
        let dir = ScratchDir::new("dev-busy");
        fs::write(dir.path().join("a"), b"1").unwrap();
        let mut device = device(&dir);
        device.open(8, 2, b"A").unwrap();
        assert_eq!(device.open(8, 2, b"A"), Err(DosError::FloppyError));
    }

    #[test]
    fn test_wildcard_rules() {
        let dir = ScratchDir::new("dev-wildcards");
        fs::write(dir.path().join("longname"), b"xyz").unwrap();
        let mut device = device(&dir);

        assert_eq!(device.open(8, 1, b"LONG*"), Err(DosError::BadName));
        device.read_status(8).unwrap();
        device.open(8, 0, b"LONG*").unwrap();
        assert_eq!(read_all(&mut device, 0), b"xyz");
    }

    #[test]
    fn test_p00_save_and_load() {
        let dir = ScratchDir::new("dev-p00");
        let mut device = device(&dir);
        device
            .configure_unit(
                8,
                UnitOptions {
                    convert_p00: true,
                    save_p00: true,
                    hide_cbm_files: false,
                },
            )
            .unwrap();
        assert!(device.unit_options(8).unwrap().save_p00);
        assert!(!device.unit_options(9).unwrap().save_p00);
        assert_eq!(device.unit_options(12), None);

        device.open(8, 2, b"MY FILE,S,W").unwrap();
        device.write_byte(8, 2, 42).unwrap();
        device.close(8, 2).unwrap();

        let container = dir.path().join("MY_FILE.S00");
        assert_eq!(p00::read_real_name(&container), Some(p00::pad_name(b"MY FILE")));

        device.open(8, 3, b"MY FILE,S,R").unwrap();
        assert_eq!(device.channel(8, 3).unwrap().file_type(), FileType::Seq);
        let mut got = Vec::new();
        loop {
            let byte = device.read_byte(8, 3).unwrap();
            if byte.eof {
                break;
            }
            got.push(byte.data);
        }
        assert_eq!(got, vec![42]);
    }

    #[test]
    fn test_hidden_plain_file() {
        let dir = ScratchDir::new("dev-hidden");
        fs::write(dir.path().join("plain"), b"x").unwrap();
        let mut device = device(&dir);
        device
            .configure_unit(
                8,
                UnitOptions {
                    convert_p00: true,
                    save_p00: false,
                    hide_cbm_files: true,
                },
            )
            .unwrap();
        assert_eq!(device.open(8, 0, b"PLAIN"), Err(DosError::NotFound));
    }

    #[test]
    fn test_read_on_write_channel() {
        let dir = ScratchDir::new("dev-read-write");
        let mut device = device(&dir);
        device.open(8, 1, b"OUT").unwrap();
        assert_eq!(device.read_byte(8, 1), Err(DosError::FloppyError));
        assert_eq!(device.read_status(8).unwrap(), b"00,OK,00,00\r");
    }

    #[test]
    fn test_directory_only_on_secondary_zero() {
        let dir = ScratchDir::new("dev-dir-secondary");
        let mut device = device(&dir);
        assert_eq!(device.open(8, 2, b"$"), Err(DosError::NotWrite));
        assert_eq!(device.read_status(8).unwrap(), b"60,WRITE FILE OPEN,00,00\r");
    }

    #[test]
    fn test_append() {
        let dir = ScratchDir::new("dev-append");
        fs::write(dir.path().join("log"), b"ab").unwrap();
        let mut device = device(&dir);
        device.open(8, 2, b"LOG,S,A").unwrap();
        device.write_byte(8, 2, b'c').unwrap();
        device.close(8, 2).unwrap();
        assert_eq!(fs::read(dir.path().join("log")).unwrap(), b"abc");

        assert_eq!(device.open(8, 3, b"NONE,S,A"), Err(DosError::NotFound));
    }

    #[test]
    fn test_command_overflow_is_discarded() {
        let dir = ScratchDir::new("dev-overflow");
        let mut device = device(&dir);
        let long = vec![b'I'; COMMAND_BUFFER_SIZE + 1];
        assert_eq!(device.open(8, 15, &long), Err(DosError::LongLine));
        assert_eq!(device.flush(8, 15), Err(DosError::LongLine));
        assert_eq!(device.read_status(8).unwrap(), b"32,SNERR LINE TOO LONG,00,00\r");
        assert_eq!(device.send_command(8, b"UI"), Ok(DosStatus::DosVersion));
    }

    #[test]
    fn test_memory_read() {
        let dir = ScratchDir::new("dev-mr");
        let mut device = device(&dir);
        let mut ram = DriveRam::default();
        ram.load(0x0300, &[1, 2, 3]);
        device.set_memory(Box::new(ram));

        assert_eq!(device.send_command(8, b"M-R\x00\x03\x03\r"), Ok(DosStatus::MemoryRead));
        assert_eq!(device.read_status(8).unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn test_listing_retries_lowercase_directory() {
        let dir = ScratchDir::new("dev-listing-case");
        fs::create_dir(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("sub").join("inner"), b"x").unwrap();
        let mut device = device(&dir);

        // Shifted PETSCII "SUB" arrives as host "SUB".
        device.open(8, 0, b"$:\xD3\xD5\xC2").unwrap();
        let program = read_all(&mut device, 0);
        assert!(program.windows(5).any(|w| w == b"INNER"));
        device.close(8, 0).unwrap();
    }

    #[test]
    fn test_append_to_p00_container() {
        let dir = ScratchDir::new("dev-append-p00");
        let (path, mut file) = p00::create_container(
            &dir.path().join("LOG"),
            FileType::Seq,
            &p00::pad_name(b"LOG"),
        )
        .unwrap();
        std::io::Write::write_all(&mut file, b"ab").unwrap();
        drop(file);
        let mut device = device(&dir);

        device.open(8, 2, b"LOG,S,A").unwrap();
        device.write_byte(8, 2, b'c').unwrap();
        device.close(8, 2).unwrap();

        let bytes = fs::read(&path).unwrap();
        assert_eq!(bytes.len(), p00::HEADER_LEN + 3);
        assert!(bytes.ends_with(b"abc"));
        assert_eq!(p00::read_real_name(&path), Some(p00::pad_name(b"LOG")));
    }

    #[test]
    fn test_store_is_shared_with_commands() {
        let dir = ScratchDir::new("dev-store");
        fs::create_dir(dir.path().join("games")).unwrap();
        let mut device = device(&dir);

        assert_eq!(device.send_command(8, b"CD:GAMES"), Ok(DosStatus::Ok));
        let games = dir.path().join("games").canonicalize().unwrap();
        assert_eq!(device.store().directory(8), games);
        assert_eq!(device.store().directory(9), dir.path());
    }
}
