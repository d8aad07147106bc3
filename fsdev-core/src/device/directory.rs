//! `$` listings.
//!
//! A listing is a BASIC program: load address, then one line per file with
//! the block count as line number. Lines are staged one at a time from the
//! host directory iterator as the program reads bytes.

use std::fs::{self, ReadDir};
use std::path::{Path, PathBuf};

use crate::dos::{dirmask_match, FileType, ReadByte, NAME_LENGTH};
use crate::error::DosError;
use crate::fs::charset::host_to_petscii;
use crate::fs::p00;

/// Bytes in a host block as counted by the listing.
const BLOCK_SIZE: u64 = 254;

/// Entry lines are padded to this length before their terminating NUL.
const MIN_ENTRY_LEN: usize = 31;

/// Column after the quoted name where the type starts.
const TYPE_COLUMN: usize = 17;

/// Which P00 rules apply while listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ListingOptions {
    pub convert_p00: bool,
    pub hide_cbm_files: bool,
}

/// An open `$` channel.
#[derive(Debug)]
pub struct DirectoryListing {
    dir: PathBuf,
    entries: ReadDir,
    mask: Vec<u8>,
    options: ListingOptions,
    line: Vec<u8>,
    cursor: usize,
    eof: bool,
}

impl DirectoryListing {
    /// Start listing `dir`, keeping only host names that match `mask`
    /// (an empty mask keeps everything).
    pub fn open(dir: &Path, mask: &[u8], options: ListingOptions) -> Result<Self, DosError> {
        let entries = fs::read_dir(dir).map_err(|_| DosError::NotFound)?;
        let dir = dir.to_path_buf();
        let line = header_line(&dir);
        Ok(Self {
            dir,
            entries,
            mask: mask.to_vec(),
            options,
            line,
            cursor: 0,
            eof: false,
        })
    }

    /// Host directory being listed.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Next byte of the listing program.
    pub fn read_byte(&mut self) -> ReadByte {
        if self.cursor >= self.line.len() {
            if self.eof {
                return ReadByte::eof();
            }
            self.line = match self.next_entry() {
                Some(line) => line,
                None => {
                    self.eof = true;
                    blocks_free_line()
                }
            };
            self.cursor = 0;
        }
        let byte = self.line[self.cursor];
        self.cursor += 1;
        ReadByte::data(byte)
    }

    fn next_entry(&mut self) -> Option<Vec<u8>> {
        loop {
            let entry = match self.entries.next()? {
                Ok(entry) => entry,
                Err(e) => {
                    log::warn!("fsdevice: reading {} failed: {}", self.dir.display(), e);
                    return None;
                }
            };
            let host_name = entry.file_name().to_string_lossy().into_owned();
            let path = entry.path();

            let container = if self.options.convert_p00 {
                p00::p00_check_name(&host_name)
                    .and_then(|file_type| Some((file_type, p00::read_real_name(&path)?)))
            } else {
                None
            };
            if container.is_none() && self.options.convert_p00 && self.options.hide_cbm_files {
                continue;
            }
            if !self.mask.is_empty() && !dirmask_match(&self.mask, host_name.as_bytes()) {
                continue;
            }

            let metadata = fs::metadata(&path).ok();
            let size = metadata.as_ref().map_or(0, |m| m.len());
            let is_dir = metadata.as_ref().is_some_and(|m| m.is_dir());

            let (name, file_type) = match &container {
                Some((file_type, real_name)) => (p00::trim_name(real_name).to_vec(), *file_type),
                None => (host_to_petscii(host_name.as_bytes()), FileType::Prg),
            };
            let kind = if is_dir { "DIR" } else { file_type.code() };
            return Some(entry_line(blocks_for(size), &name, kind));
        }
    }
}

fn blocks_for(size: u64) -> u16 {
    let blocks = (size + BLOCK_SIZE - 1) / BLOCK_SIZE;
    u16::try_from(blocks).unwrap_or(u16::MAX)
}

/// Load address, first line link, line 0, reverse on and the quoted
/// directory name.
fn header_line(dir: &Path) -> Vec<u8> {
    let label = dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| dir.to_string_lossy().into_owned());
    let mut name = host_to_petscii(label.as_bytes());
    name.truncate(NAME_LENGTH);
    name.resize(NAME_LENGTH, b' ');

    let mut line = vec![0x01, 0x04, 0x01, 0x01, 0x00, 0x00, 0x12, b'"'];
    line.extend_from_slice(&name);
    line.extend_from_slice(b"\" VICE \0");
    line
}

/// One file line: link, block count, quoted name and type.
pub(crate) fn entry_line(blocks: u16, name: &[u8], kind: &str) -> Vec<u8> {
    let name = &name[..name.len().min(NAME_LENGTH)];

    let mut line = vec![0x01, 0x01];
    line.extend_from_slice(&blocks.to_le_bytes());
    for limit in [10, 100, 1000] {
        if blocks < limit {
            line.push(b' ');
        }
    }
    line.push(b'"');
    line.extend_from_slice(name);
    line.push(b'"');
    line.resize(line.len() + (TYPE_COLUMN - name.len()), b' ');
    line.extend_from_slice(kind.as_bytes());
    if line.len() < MIN_ENTRY_LEN {
        line.resize(MIN_ENTRY_LEN, b' ');
    }
    line.push(0);
    line
}

/// Final line of every listing.
fn blocks_free_line() -> Vec<u8> {
    let mut line = vec![0x01, 0x01, 0x00, 0x00];
    line.extend_from_slice(b"BLOCKS FREE.");
    line.extend_from_slice(&[b' '; 13]);
    line.extend_from_slice(&[0; 3]);
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dos::EOF_SENTINEL;
    use crate::testutil::ScratchDir;

    fn drain(listing: &mut DirectoryListing) -> Vec<u8> {
        let mut out = Vec::new();
        loop {
            let byte = listing.read_byte();
            if byte.eof {
                assert_eq!(byte.data, EOF_SENTINEL);
                return out;
            }
            out.push(byte.data);
        }
    }

    #[test]
    fn test_entry_line_layout() {
        let line = entry_line(1, b"HELLO", "PRG");
        let mut expected = vec![0x01, 0x01, 0x01, 0x00, b' ', b' ', b' ', b'"'];
        expected.extend_from_slice(b"HELLO\"");
        expected.extend_from_slice(&[b' '; 12]);
        expected.extend_from_slice(b"PRG");
        expected.resize(31, b' ');
        expected.push(0);
        assert_eq!(line, expected);
        assert_eq!(line.len(), 32);
    }

    #[test]
    fn test_entry_line_block_padding() {
        assert_eq!(&entry_line(9, b"A", "SEQ")[4..8], b"   \"");
        assert_eq!(&entry_line(42, b"A", "SEQ")[4..7], b"  \"");
        assert_eq!(&entry_line(664, b"A", "SEQ")[4..6], b" \"");
        assert_eq!(entry_line(1000, b"A", "SEQ")[4], b'"');
        assert_eq!(&entry_line(1000, b"A", "SEQ")[2..4], &1000u16.to_le_bytes());
    }

    #[test]
    fn test_entry_line_long_name() {
        let line = entry_line(100, b"SIXTEEN CHARS!!!", "DIR");
        assert_eq!(&line[5..23], b"\"SIXTEEN CHARS!!!\"");
        assert_eq!(&line[23..27], b" DIR");
        assert_eq!(line.len(), 32);
        assert_eq!(entry_line(1, b"SEVENTEEN CHARS!!", "PRG").len(), 32);
    }

    #[test]
    fn test_blocks_for() {
        assert_eq!(blocks_for(0), 0);
        assert_eq!(blocks_for(1), 1);
        assert_eq!(blocks_for(254), 1);
        assert_eq!(blocks_for(255), 2);
        assert_eq!(blocks_for(u64::MAX / 2), u16::MAX);
    }

    #[test]
    fn test_blocks_free_line() {
        let line = blocks_free_line();
        assert_eq!(line.len(), 32);
        assert_eq!(&line[4..16], b"BLOCKS FREE.");
        assert_eq!(&line[29..], &[0, 0, 0]);
    }

    #[test]
    fn test_header_line() {
        let line = header_line(Path::new("/tmp/games"));
        assert_eq!(&line[..8], &[0x01, 0x04, 0x01, 0x01, 0x00, 0x00, 0x12, b'"']);
        assert_eq!(&line[8..24], b"GAMES           ");
        assert_eq!(&line[24..], b"\" VICE \0");
    }

    #[test]
    fn test_listing_single_file() {
        let dir = ScratchDir::new("listing-single");
        fs::write(dir.path().join("hello"), vec![0u8; 300]).unwrap();
        let mut listing =
            DirectoryListing::open(dir.path(), b"", ListingOptions::default()).unwrap();
        assert_eq!(listing.dir(), dir.path());

        let bytes = drain(&mut listing);
        let header_len = header_line(dir.path()).len();
        let entry = &bytes[header_len..header_len + 32];
        assert_eq!(entry, entry_line(2, b"HELLO", "PRG").as_slice());
        assert_eq!(&bytes[header_len + 32..], blocks_free_line().as_slice());

        // Stays at end of file.
        assert!(listing.read_byte().eof);
    }

    #[test]
    fn test_listing_decodes_p00() {
        let dir = ScratchDir::new("listing-p00");
        p00::create_container(&dir.path().join("MYDATA"), FileType::Seq, &p00::pad_name(b"MY DATA"))
            .unwrap();
        let options = ListingOptions {
            convert_p00: true,
            hide_cbm_files: false,
        };
        let mut listing = DirectoryListing::open(dir.path(), b"", options).unwrap();
        let bytes = drain(&mut listing);
        let header_len = header_line(dir.path()).len();
        assert_eq!(
            &bytes[header_len..header_len + 32],
            entry_line(1, b"MY DATA", "SEQ").as_slice()
        );
    }

    #[test]
    fn test_listing_without_conversion_shows_host_name() {
        let dir = ScratchDir::new("listing-raw-p00");
        p00::create_container(&dir.path().join("X"), FileType::Prg, &p00::pad_name(b"REAL"))
            .unwrap();
        let mut listing =
            DirectoryListing::open(dir.path(), b"", ListingOptions::default()).unwrap();
        let bytes = drain(&mut listing);
        let header_len = header_line(dir.path()).len();
        assert_eq!(
            &bytes[header_len..header_len + 32],
            entry_line(1, &host_to_petscii(b"X.P00"), "PRG").as_slice()
        );
    }

    #[test]
    fn test_listing_hides_plain_files() {
        let dir = ScratchDir::new("listing-hide");
        fs::write(dir.path().join("plain"), b"x").unwrap();
        p00::create_container(
            &dir.path().join("KEEP"),
            FileType::Prg,
            &p00::pad_name(b"KEEP"),
        )
        .unwrap();
        let options = ListingOptions {
            convert_p00: true,
            hide_cbm_files: true,
        };
        let mut listing = DirectoryListing::open(dir.path(), b"", options).unwrap();
        let bytes = drain(&mut listing);
        let header_len = header_line(dir.path()).len();
        assert_eq!(bytes.len(), header_len + 64);
        assert_eq!(&bytes[header_len + 8..header_len + 12], b"KEEP");
    }

    #[test]
    fn test_listing_mask() {
        let dir = ScratchDir::new("listing-mask");
        fs::write(dir.path().join("game.prg"), b"x").unwrap();
        fs::write(dir.path().join("notes.txt"), b"x").unwrap();
        let mut listing =
            DirectoryListing::open(dir.path(), b"*.prg", ListingOptions::default()).unwrap();
        let bytes = drain(&mut listing);
        let header_len = header_line(dir.path()).len();
        assert_eq!(bytes.len(), header_len + 64);
        assert_eq!(
            &bytes[header_len..header_len + 32],
            entry_line(1, &host_to_petscii(b"game.prg"), "PRG").as_slice()
        );
    }

    #[test]
    fn test_listing_marks_directories() {
        let dir = ScratchDir::new("listing-dir");
        fs::create_dir(dir.path().join("sub")).unwrap();
        let mut listing =
            DirectoryListing::open(dir.path(), b"", ListingOptions::default()).unwrap();
        let bytes = drain(&mut listing);
        let header_len = header_line(dir.path()).len();
        let entry = &bytes[header_len..header_len + 32];
        let blocks = u16::from_le_bytes([entry[2], entry[3]]);
        assert_eq!(entry, entry_line(blocks, b"SUB", "DIR").as_slice());
    }

    #[test]
    fn test_open_missing_directory() {
        let dir = ScratchDir::new("listing-missing");
        assert_eq!(
            DirectoryListing::open(&dir.path().join("nope"), b"", ListingOptions::default())
                .unwrap_err(),
            DosError::NotFound
        );
    }
}
