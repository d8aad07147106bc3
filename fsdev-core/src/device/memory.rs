//! Drive memory seen by `M-R` commands.

/// Read access to the emulated drive's address space.
pub trait DriveMemory: Send {
    /// Read `len` bytes starting at `addr`, wrapping at the end of memory.
    fn read(&self, addr: u16, len: usize) -> Vec<u8>;
}

/// Flat RAM image, addressed modulo its size.
#[derive(Debug, Clone)]
pub struct DriveRam {
    bytes: Vec<u8>,
}

impl Default for DriveRam {
    /// 2 KiB of zeroed RAM, like a 1541.
    fn default() -> Self {
        Self::new(0x800)
    }
}

impl DriveRam {
    pub fn new(size: usize) -> Self {
        Self {
            bytes: vec![0; size],
        }
    }

    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            bytes: bytes.into(),
        }
    }

    /// Copy `data` into RAM at `addr`, wrapping like reads do.
    pub fn load(&mut self, addr: u16, data: &[u8]) {
        if self.bytes.is_empty() {
            return;
        }
        let size = self.bytes.len();
        for (i, &b) in data.iter().enumerate() {
            self.bytes[(usize::from(addr) + i) % size] = b;
        }
    }
}

impl DriveMemory for DriveRam {
    fn read(&self, addr: u16, len: usize) -> Vec<u8> {
        if self.bytes.is_empty() {
            return vec![0; len];
        }
        let size = self.bytes.len();
        (0..len)
            .map(|i| self.bytes[(usize::from(addr) + i) % size])
            .collect()
    }
}
