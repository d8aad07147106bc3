//! FileIo trait - rename and scratch policy for files in a unit directory.

use std::fs;
use std::path::{Path, PathBuf};

use super::charset::petscii_to_host_string;
use super::p00;
use crate::dos::{cbm_wildcard_match, host_wildcard_match, NAME_LENGTH, PAD_BYTE};
use crate::error::DosError;

/// Which kinds of files a rename or scratch may see.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatFlags {
    /// P00 containers, matched by their real CBM name.
    pub p00: bool,
    /// Plain host files, matched by their host name.
    pub raw: bool,
}

impl FormatFlags {
    /// Flags for a unit's options. Hiding plain files only applies while
    /// P00 conversion is on.
    pub fn new(convert_p00: bool, hide_cbm_files: bool) -> Self {
        Self {
            p00: convert_p00,
            raw: !(convert_p00 && hide_cbm_files),
        }
    }
}

impl Default for FormatFlags {
    fn default() -> Self {
        Self::new(true, false)
    }
}

/// File operations issued through the command channel.
/// Names are PETSCII, exactly as the CBM side sent them.
pub trait FileIo: Send {
    /// Rename `src` to `dst` inside `dir`.
    fn rename(
        &mut self,
        src: &[u8],
        dst: &[u8],
        dir: &Path,
        flags: FormatFlags,
    ) -> Result<(), DosError>;

    /// Delete every file in `dir` matching `pattern`; returns how many.
    fn scratch(
        &mut self,
        pattern: &[u8],
        dir: &Path,
        flags: FormatFlags,
    ) -> Result<usize, DosError>;
}

/// [`FileIo`] on top of `std::fs`.
#[derive(Debug, Default, Clone, Copy)]
pub struct HostFileIo;

impl HostFileIo {
    pub fn new() -> Self {
        Self
    }

    fn rename_container(&self, path: &Path, dst: &[u8], dir: &Path) -> Result<(), DosError> {
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or(DosError::NotFound)?;
        let file_type = p00::p00_check_name(file_name).ok_or(DosError::NotFound)?;

        let new_stem = p00::host_stem(dst);
        let current_stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or_default();
        let target = if current_stem == new_stem {
            None
        } else {
            Some(
                p00::free_container_path(&dir.join(&new_stem), file_type)
                    .ok_or(DosError::FileExists)?,
            )
        };

        p00::write_real_name(path, dst).map_err(|e| DosError::from_io(&e, DosError::NotFound))?;
        if let Some(target) = target {
            fs::rename(path, &target).map_err(|e| DosError::from_io(&e, DosError::NotFound))?;
            log::debug!("fsdevice: moved {} to {}", path.display(), target.display());
        }
        Ok(())
    }
}

fn host_path(dir: &Path, name: &[u8]) -> PathBuf {
    dir.join(petscii_to_host_string(name))
}

fn pad_cbm_name(name: &[u8]) -> [u8; NAME_LENGTH] {
    let mut out = [PAD_BYTE; NAME_LENGTH];
    let len = name.len().min(NAME_LENGTH);
    out[..len].copy_from_slice(&name[..len]);
    out
}

impl FileIo for HostFileIo {
    fn rename(
        &mut self,
        src: &[u8],
        dst: &[u8],
        dir: &Path,
        flags: FormatFlags,
    ) -> Result<(), DosError> {
        let dst_is_container = flags.p00 && p00::find_by_wildcard(dir, dst).is_some();

        if flags.p00 {
            if let Some((path, _)) = p00::find_by_wildcard(dir, src) {
                if dst_is_container {
                    return Err(DosError::FileExists);
                }
                return self.rename_container(&path, dst, dir);
            }
        }

        if !flags.raw {
            return Err(DosError::NotFound);
        }
        let from = host_path(dir, src);
        let to = host_path(dir, dst);
        if !from.is_file() {
            return Err(DosError::NotFound);
        }
        if to.exists() || dst_is_container {
            return Err(DosError::FileExists);
        }
        fs::rename(&from, &to).map_err(|e| DosError::from_io(&e, DosError::NotFound))
    }

    fn scratch(
        &mut self,
        pattern: &[u8],
        dir: &Path,
        flags: FormatFlags,
    ) -> Result<usize, DosError> {
        let entries =
            fs::read_dir(dir).map_err(|e| DosError::from_io(&e, DosError::NotFound))?;
        let cbm_pattern = pad_cbm_name(pattern);
        let host_pattern = petscii_to_host_string(pattern);

        let mut removed = 0;
        for entry in entries.flatten() {
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let file_name = entry.file_name();
            let Some(name) = file_name.to_str() else { continue };

            // Without P00 conversion a container is just another host file.
            let real_name = if flags.p00 {
                p00::p00_check_name(name).and_then(|_| p00::read_real_name(&path))
            } else {
                None
            };
            let matched = match real_name {
                Some(real_name) => {
                    let real_name = pad_cbm_name(p00::trim_name(&real_name));
                    cbm_wildcard_match(&cbm_pattern, &real_name)
                }
                None => flags.raw && host_wildcard_match(host_pattern.as_bytes(), name.as_bytes()),
            };
            if !matched {
                continue;
            }

            fs::remove_file(&path).map_err(|e| DosError::from_io(&e, DosError::NotFound))?;
            log::debug!("fsdevice: scratched {}", path.display());
            removed += 1;
        }

        if removed == 0 {
            Err(DosError::NotFound)
        } else {
            Ok(removed)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dos::FileType;
    use crate::testutil::ScratchDir;

    fn container(dir: &ScratchDir, name: &[u8]) -> PathBuf {
        let (path, _) = p00::create_container(
            &dir.path().join(p00::host_stem(name)),
            FileType::Prg,
            &p00::pad_name(name),
        )
        .unwrap();
        path
    }

    #[test]
    fn test_flags() {
        assert_eq!(FormatFlags::new(true, true), FormatFlags { p00: true, raw: false });
        assert_eq!(FormatFlags::new(false, true), FormatFlags { p00: false, raw: true });
        assert_eq!(FormatFlags::default(), FormatFlags { p00: true, raw: true });
    }

    #[test]
    fn test_raw_rename() {
        let dir = ScratchDir::new("io-raw-rename");
        fs::write(dir.path().join("old"), b"data").unwrap();
        let mut io = HostFileIo::new();

        io.rename(b"OLD", b"NEW", dir.path(), FormatFlags::default()).unwrap();
        assert!(!dir.path().join("old").exists());
        assert_eq!(fs::read(dir.path().join("new")).unwrap(), b"data");
    }

    #[test]
    fn test_raw_rename_errors() {
        let dir = ScratchDir::new("io-raw-rename-errors");
        let mut io = HostFileIo::new();
        assert_eq!(
            io.rename(b"OLD", b"NEW", dir.path(), FormatFlags::default()),
            Err(DosError::NotFound)
        );

        fs::write(dir.path().join("old"), b"1").unwrap();
        fs::write(dir.path().join("new"), b"2").unwrap();
        assert_eq!(
            io.rename(b"OLD", b"NEW", dir.path(), FormatFlags::default()),
            Err(DosError::FileExists)
        );
        assert_eq!(fs::read(dir.path().join("new")).unwrap(), b"2");
    }

    #[test]
    fn test_hidden_raw_files_cannot_be_renamed() {
        let dir = ScratchDir::new("io-hidden-rename");
        fs::write(dir.path().join("old"), b"1").unwrap();
        let mut io = HostFileIo::new();
        assert_eq!(
            io.rename(b"OLD", b"NEW", dir.path(), FormatFlags::new(true, true)),
            Err(DosError::NotFound)
        );
    }

    #[test]
    fn test_container_rename_moves_file() {
        let dir = ScratchDir::new("io-p00-rename");
        let old = container(&dir, b"FIRST GAME");
        let mut io = HostFileIo::new();

        io.rename(b"FIRST GAME", b"OTHER", dir.path(), FormatFlags::default()).unwrap();
        assert!(!old.exists());
        let moved = dir.path().join("OTHER.P00");
        assert_eq!(p00::read_real_name(&moved), Some(p00::pad_name(b"OTHER")));
    }

    #[test]
    fn test_container_rename_same_stem_stays_put() {
        let dir = ScratchDir::new("io-p00-same-stem");
        let path = container(&dir, b"GAME");
        let mut io = HostFileIo::new();

        io.rename(b"GAME", b"GAME!", dir.path(), FormatFlags::default()).unwrap();
        assert_eq!(p00::read_real_name(&path), Some(p00::pad_name(b"GAME!")));
    }

    #[test]
    fn test_container_rename_refuses_existing_target() {
        let dir = ScratchDir::new("io-p00-exists");
        container(&dir, b"ONE");
        container(&dir, b"TWO");
        let mut io = HostFileIo::new();
        assert_eq!(
            io.rename(b"ONE", b"TWO", dir.path(), FormatFlags::default()),
            Err(DosError::FileExists)
        );
    }

    #[test]
    fn test_scratch_wildcard() {
        let dir = ScratchDir::new("io-scratch");
        container(&dir, b"GAME1");
        container(&dir, b"GAME2");
        container(&dir, b"TOOL");
        fs::write(dir.path().join("gamedata"), b"raw").unwrap();
        let mut io = HostFileIo::new();

        assert_eq!(io.scratch(b"GAME*", dir.path(), FormatFlags::default()), Ok(3));
        assert!(dir.path().join("TOOL.P00").exists());
        assert_eq!(
            io.scratch(b"GAME*", dir.path(), FormatFlags::default()),
            Err(DosError::NotFound)
        );
    }

    #[test]
    fn test_scratch_exact_name() {
        let dir = ScratchDir::new("io-scratch-exact");
        container(&dir, b"GAME");
        container(&dir, b"GAMES");
        let mut io = HostFileIo::new();

        assert_eq!(io.scratch(b"GAME", dir.path(), FormatFlags::default()), Ok(1));
        assert!(dir.path().join("GAMES.P00").exists());
    }

    #[test]
    fn test_scratch_respects_flags() {
        let dir = ScratchDir::new("io-scratch-flags");
        fs::write(dir.path().join("plain"), b"raw").unwrap();
        container(&dir, b"PLAIN");
        let mut io = HostFileIo::new();

        assert_eq!(io.scratch(b"PLAIN", dir.path(), FormatFlags::new(true, true)), Ok(1));
        assert!(dir.path().join("plain").exists());
        assert_eq!(io.scratch(b"PLAIN", dir.path(), FormatFlags::new(false, false)), Ok(1));
        assert!(!dir.path().join("plain").exists());
    }

    #[test]
    fn test_scratch_container_by_host_name_without_conversion() {
        let dir = ScratchDir::new("io-scratch-unconverted");
        let path = container(&dir, b"GAME");
        let mut io = HostFileIo::new();

        // Shifted PETSCII for "GAME.P00", as the listing shows it.
        let host_name = [0xC7, 0xC1, 0xCD, 0xC5, b'.', 0xD0, b'0', b'0'];
        assert_eq!(
            io.scratch(b"GAME", dir.path(), FormatFlags::new(false, false)),
            Err(DosError::NotFound)
        );
        assert_eq!(io.scratch(&host_name, dir.path(), FormatFlags::new(false, false)), Ok(1));
        assert!(!path.exists());
    }
}
