//! Per-unit directory persistence.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::{FsResult, FsdevError};

/// First unit number served by the device.
pub const FIRST_UNIT: u8 = 8;

/// Number of units served (8 through 11).
pub const UNIT_COUNT: usize = 4;

/// Index of `unit` in per-unit tables, if the unit is served.
pub fn unit_index(unit: u8) -> Option<usize> {
    let index = usize::from(unit.checked_sub(FIRST_UNIT)?);
    (index < UNIT_COUNT).then_some(index)
}

/// Where each unit's host directory is remembered.
pub trait DirectoryStore: Send {
    /// Current host directory of `unit`.
    fn directory(&self, unit: u8) -> PathBuf;

    /// Remember a new directory for `unit`.
    fn set_directory(&mut self, unit: u8, path: &Path) -> FsResult<()>;
}

/// Directory store that lives only as long as the process.
#[derive(Debug, Clone)]
pub struct MemoryDirectoryStore {
    default_dir: PathBuf,
    dirs: HashMap<u8, PathBuf>,
}

impl Default for MemoryDirectoryStore {
    fn default() -> Self {
        Self::new(".")
    }
}

impl MemoryDirectoryStore {
    /// All units start in `default_dir`.
    pub fn new(default_dir: impl Into<PathBuf>) -> Self {
        Self {
            default_dir: default_dir.into(),
            dirs: HashMap::new(),
        }
    }
}

impl DirectoryStore for MemoryDirectoryStore {
    fn directory(&self, unit: u8) -> PathBuf {
        self.dirs
            .get(&unit)
            .cloned()
            .unwrap_or_else(|| self.default_dir.clone())
    }

    fn set_directory(&mut self, unit: u8, path: &Path) -> FsResult<()> {
        if unit_index(unit).is_none() {
            return Err(FsdevError::InvalidUnit(unit));
        }
        self.dirs.insert(unit, path.to_path_buf());
        Ok(())
    }
}
