//! Device configuration and its JSON store.
//!
//! ```json
//! {
//!   "units": {
//!     "8": { "directory": "/home/me/c64", "convertP00": true, "saveP00": false },
//!     "9": { "hideCbmFiles": true }
//!   }
//! }
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{FsResult, FsdevError};
use crate::fs::{unit_index, DirectoryStore};

fn default_true() -> bool {
    true
}

/// Options for one unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitConfig {
    /// Host directory served by the unit; the process directory if unset.
    #[serde(default)]
    pub directory: Option<PathBuf>,
    /// Show and open P00 containers under their real CBM names.
    #[serde(default = "default_true")]
    pub convert_p00: bool,
    /// Save new files as P00 containers.
    #[serde(default)]
    pub save_p00: bool,
    /// Hide files that are not P00 containers (needs `convert_p00`).
    #[serde(default)]
    pub hide_cbm_files: bool,
}

impl Default for UnitConfig {
    fn default() -> Self {
        Self {
            directory: None,
            convert_p00: true,
            save_p00: false,
            hide_cbm_files: false,
        }
    }
}

/// Options for all units, keyed by unit number.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceConfig {
    #[serde(default)]
    pub units: BTreeMap<u8, UnitConfig>,
}

impl DeviceConfig {
    /// Options for `unit`, defaults if it has no entry.
    pub fn unit(&self, unit: u8) -> UnitConfig {
        self.units.get(&unit).cloned().unwrap_or_default()
    }

    /// Mutable options for `unit`, created on first use.
    pub fn unit_mut(&mut self, unit: u8) -> FsResult<&mut UnitConfig> {
        if unit_index(unit).is_none() {
            return Err(FsdevError::InvalidUnit(unit));
        }
        Ok(self.units.entry(unit).or_default())
    }

    pub fn from_json(text: &str) -> FsResult<Self> {
        let config: DeviceConfig = serde_json::from_str(text)?;
        if let Some(&unit) = config.units.keys().find(|&&u| unit_index(u).is_none()) {
            return Err(FsdevError::InvalidUnit(unit));
        }
        Ok(config)
    }

    pub fn to_json(&self) -> FsResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// [`DeviceConfig`] backed by a JSON file.
///
/// Directory changes made through [`DirectoryStore`] are written back to
/// the file immediately.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
    config: DeviceConfig,
}

impl ConfigStore {
    /// Load `path`; a missing file gives the default configuration.
    pub fn load(path: impl Into<PathBuf>) -> FsResult<Self> {
        let path = path.into();
        let config = match fs::read_to_string(&path) {
            Ok(text) => DeviceConfig::from_json(&text)?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                log::debug!("config {} not found, using defaults", path.display());
                DeviceConfig::default()
            }
            Err(e) => return Err(e.into()),
        };
        Ok(Self { path, config })
    }

    pub fn with_config(path: impl Into<PathBuf>, config: DeviceConfig) -> Self {
        Self {
            path: path.into(),
            config,
        }
    }

    pub fn save(&self) -> FsResult<()> {
        fs::write(&self.path, self.config.to_json()?)?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut DeviceConfig {
        &mut self.config
    }
}

impl DirectoryStore for ConfigStore {
    fn directory(&self, unit: u8) -> PathBuf {
        self.config
            .units
            .get(&unit)
            .and_then(|u| u.directory.clone())
            .unwrap_or_else(|| PathBuf::from("."))
    }

    fn set_directory(&mut self, unit: u8, path: &Path) -> FsResult<()> {
        self.config.unit_mut(unit)?.directory = Some(path.to_path_buf());
        self.save()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::ScratchDir;

    #[test]
    fn test_unit_defaults() {
        let unit = UnitConfig::default();
        assert!(unit.convert_p00);
        assert!(!unit.save_p00);
        assert!(!unit.hide_cbm_files);
        assert_eq!(unit.directory, None);
    }

    #[test]
    fn test_parse_camel_case() {
        let config = DeviceConfig::from_json(
            r#"{"units": {
                "8": {"directory": "/c64", "saveP00": true},
                "10": {"convertP00": false}
            }}"#,
        )
        .unwrap();
        let unit8 = config.unit(8);
        assert_eq!(unit8.directory, Some(PathBuf::from("/c64")));
        assert!(unit8.save_p00);
        assert!(unit8.convert_p00);
        assert!(!config.unit(10).convert_p00);
        assert_eq!(config.unit(9), UnitConfig::default());
    }

    #[test]
    fn test_parse_rejects_bad_unit() {
        assert!(matches!(
            DeviceConfig::from_json(r#"{"units": {"12": {}}}"#),
            Err(FsdevError::InvalidUnit(12))
        ));
        assert!(matches!(
            DeviceConfig::from_json("not json"),
            Err(FsdevError::Json(_))
        ));
    }

    #[test]
    fn test_store_persists_directory() {
        let dir = ScratchDir::new("config-store");
        let path = dir.path().join("fsdevice.json");

        let mut store = ConfigStore::load(&path).unwrap();
        assert_eq!(store.directory(8), PathBuf::from("."));
        store.set_directory(8, Path::new("/games")).unwrap();

        let reloaded = ConfigStore::load(&path).unwrap();
        assert_eq!(reloaded.directory(8), PathBuf::from("/games"));
        assert_eq!(reloaded.config().unit(8).directory, Some(PathBuf::from("/games")));
    }

    #[test]
    fn test_store_rejects_bad_unit() {
        let dir = ScratchDir::new("config-store-unit");
        let mut store = ConfigStore::load(dir.path().join("c.json")).unwrap();
        assert!(matches!(
            store.set_directory(3, Path::new("/x")),
            Err(FsdevError::InvalidUnit(3))
        ));
    }
}
