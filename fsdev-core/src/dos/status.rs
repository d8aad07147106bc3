//! Channel 15 status buffer.
//!
//! Each unit owns one [`StatusChannel`]. Operations push a status code,
//! which is formatted into a firmware style line (`"62,FILE NOT FOUND,00,00\r"`)
//! and drained one byte at a time by reads on secondary address 15.

use super::{DosStatus, ReadByte};

/// Formatted status line plus read cursor for one unit.
#[derive(Debug, Clone)]
pub struct StatusChannel {
    buffer: Vec<u8>,
    cursor: usize,
    last: DosStatus,
}

impl Default for StatusChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl StatusChannel {
    /// An empty channel; the first read will report `OK`.
    pub fn new() -> Self {
        Self {
            buffer: Vec::new(),
            cursor: 0,
            last: DosStatus::Ok,
        }
    }

    /// Code of the status currently held.
    pub fn last(&self) -> DosStatus {
        self.last
    }

    /// True while an unread error would swallow further errors.
    pub fn is_latched(&self) -> bool {
        !self.last.is_overwritable()
    }

    /// Record a status code.
    ///
    /// The first error wins: while a non-OK status other than the version
    /// string is pending, later errors are dropped until the line has been
    /// read to the end.
    pub fn push(&mut self, code: DosStatus) {
        if !self.accepts(code) {
            log::debug!(
                "fsdevice: dropping status {:02}, {:02} pending",
                code.code(),
                self.last.code()
            );
            return;
        }
        self.last = code;
        let message = code.message();
        self.buffer = format!("{:02},{},00,00\r", code.code(), message).into_bytes();
        self.cursor = 0;

        if code != DosStatus::Ok && code != DosStatus::DosVersion {
            log::info!("fsdevice: ERR = {:02}, {}", code.code(), message);
        }
    }

    /// Record a memory-read reply; the bytes are returned verbatim.
    pub fn push_memory_read(&mut self, bytes: &[u8]) {
        if !self.accepts(DosStatus::MemoryRead) {
            return;
        }
        self.last = DosStatus::MemoryRead;
        self.buffer = bytes.to_vec();
        self.cursor = 0;
    }

    /// Next byte of the status line.
    ///
    /// After the last byte the following call signals end of file and
    /// re-arms the channel with a fresh `OK`.
    pub fn drain_byte(&mut self) -> ReadByte {
        if self.buffer.is_empty() {
            self.push(DosStatus::Ok);
        }
        match self.buffer.get(self.cursor) {
            Some(&byte) => {
                self.cursor += 1;
                ReadByte::data(byte)
            }
            None => {
                self.push(DosStatus::Ok);
                ReadByte::eof()
            }
        }
    }

    /// Drain the whole pending line, as a program doing `INPUT#15` would.
    pub fn read_line(&mut self) -> Vec<u8> {
        let mut line = Vec::new();
        loop {
            let byte = self.drain_byte();
            if byte.eof {
                return line;
            }
            line.push(byte.data);
        }
    }

    fn accepts(&self, code: DosStatus) -> bool {
        code == DosStatus::Ok || self.last.is_overwritable()
    }
}
