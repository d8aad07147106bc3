//! One open channel of a unit.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};

use super::directory::DirectoryListing;
use crate::dos::{FileType, ReadByte};
use crate::error::DosError;

/// What a channel currently holds.
#[derive(Debug, Default)]
pub enum ChannelState {
    #[default]
    Idle,
    Reading(BufReader<File>),
    Writing(BufWriter<File>),
    Appending(BufWriter<File>),
    Listing(DirectoryListing),
}

/// A channel slot: its state plus the attributes given at OPEN.
#[derive(Debug, Default)]
pub struct Channel {
    state: ChannelState,
    file_type: FileType,
    record_length: u8,
}

impl Channel {
    pub fn is_idle(&self) -> bool {
        matches!(self.state, ChannelState::Idle)
    }

    pub fn file_type(&self) -> FileType {
        self.file_type
    }

    pub fn record_length(&self) -> u8 {
        self.record_length
    }

    /// Take over a freshly opened host resource.
    pub fn open(&mut self, state: ChannelState, file_type: FileType, record_length: u8) {
        self.state = state;
        self.file_type = file_type;
        self.record_length = record_length;
    }

    /// Next byte for the bus. End of file is reported on the call after the
    /// last byte.
    pub fn read_byte(&mut self) -> Result<ReadByte, DosError> {
        match &mut self.state {
            ChannelState::Reading(reader) => {
                let mut byte = [0u8; 1];
                match reader.read(&mut byte) {
                    Ok(0) => Ok(ReadByte::eof()),
                    Ok(_) => Ok(ReadByte::data(byte[0])),
                    Err(e) => {
                        log::warn!("fsdevice: read failed: {}", e);
                        Err(DosError::FloppyError)
                    }
                }
            }
            ChannelState::Listing(listing) => Ok(listing.read_byte()),
            _ => Err(DosError::FloppyError),
        }
    }

    pub fn write_byte(&mut self, byte: u8) -> Result<(), DosError> {
        match &mut self.state {
            ChannelState::Writing(writer) | ChannelState::Appending(writer) => {
                writer.write_all(&[byte]).map_err(|e| {
                    log::warn!("fsdevice: write failed: {}", e);
                    DosError::FloppyError
                })
            }
            _ => Err(DosError::FloppyError),
        }
    }

    /// Release the host resource. Closing an idle channel is a no-op.
    pub fn close(&mut self) {
        match std::mem::take(&mut self.state) {
            ChannelState::Writing(mut writer) | ChannelState::Appending(mut writer) => {
                if let Err(e) = writer.flush() {
                    log::warn!("fsdevice: flush on close failed: {}", e);
                }
            }
            ChannelState::Idle | ChannelState::Reading(_) | ChannelState::Listing(_) => {}
        }
        self.file_type = FileType::default();
        self.record_length = 0;
    }
}
