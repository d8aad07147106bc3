//! PC64 (P00) containers.
//!
//! A P00 file keeps a CBM file on a host filesystem together with its real
//! CBM name. Layout (26 byte header, then payload):
//! - Bytes 0-7: magic `"C64File\0"`
//! - Bytes 8-23: real CBM name, NUL padded
//! - Byte 24: always NUL (name terminator)
//! - Byte 25: REL record length, 0 for other types
//!
//! The host name is derived from the CBM name: `<STEM>.<T>NN` where `T` is
//! the type letter and `NN` a collision counter.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::dos::{host_wildcard_match, FileType, NAME_LENGTH};

/// Container magic, including its terminating NUL.
pub const P00_MAGIC: &[u8; 8] = b"C64File\0";

/// Total header size; payload starts here.
pub const HEADER_LEN: usize = 26;

/// Offset of the real name inside the header.
const NAME_OFFSET: u64 = 8;

/// Offset of the REL record length inside the header.
const RECORD_LENGTH_OFFSET: usize = 25;

/// Longest host stem the codec produces.
const MAX_STEM_LEN: usize = 8;

/// Number of `NN` suffixes available per stem.
const MAX_SUFFIXES: u8 = 100;

/// Decoded container header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct P00Header {
    pub real_name: [u8; NAME_LENGTH],
    pub record_length: u8,
}

impl P00Header {
    pub fn new(real_name: &[u8], record_length: u8) -> Self {
        Self {
            real_name: pad_name(real_name),
            record_length,
        }
    }

    /// The real name up to its first NUL.
    pub fn name(&self) -> &[u8] {
        trim_name(&self.real_name)
    }

    pub fn to_bytes(&self) -> [u8; HEADER_LEN] {
        let mut header = [0u8; HEADER_LEN];
        header[..8].copy_from_slice(P00_MAGIC);
        header[8..8 + NAME_LENGTH].copy_from_slice(&self.real_name);
        header[RECORD_LENGTH_OFFSET] = self.record_length;
        header
    }

    /// Parse a header; `None` if the magic does not match.
    pub fn parse(header: &[u8; HEADER_LEN]) -> Option<Self> {
        if &header[..8] != P00_MAGIC {
            return None;
        }
        let mut real_name = [0u8; NAME_LENGTH];
        real_name.copy_from_slice(&header[8..8 + NAME_LENGTH]);
        Some(Self {
            real_name,
            record_length: header[RECORD_LENGTH_OFFSET],
        })
    }

    /// Read and parse a header from the start of `reader`.
    /// Short input or a bad magic yields `None`.
    pub fn read_from<R: Read>(reader: &mut R) -> Option<Self> {
        let mut header = [0u8; HEADER_LEN];
        reader.read_exact(&mut header).ok()?;
        Self::parse(&header)
    }
}

/// NUL-pad (or truncate) a name to the 16 byte header field.
pub fn pad_name(name: &[u8]) -> [u8; NAME_LENGTH] {
    let mut out = [0u8; NAME_LENGTH];
    let len = name.len().min(NAME_LENGTH);
    out[..len].copy_from_slice(&name[..len]);
    out
}

/// The part of a header name before its first NUL.
pub fn trim_name(name: &[u8]) -> &[u8] {
    let end = name.iter().position(|&b| b == 0).unwrap_or(name.len());
    &name[..end]
}

/// Detect a P00 container by its host extension (`.P00`, `.s12`, ...).
pub fn p00_check_name(file_name: &str) -> Option<FileType> {
    let (_, ext) = file_name.rsplit_once('.')?;
    let mut chars = ext.chars();
    let letter = chars.next()?;
    let digits: Vec<char> = chars.collect();
    if digits.len() != 2 || !digits.iter().all(|c| c.is_ascii_digit()) {
        return None;
    }
    FileType::from_p00_letter(letter)
}

/// Derive a host-legal stem from a CBM name.
///
/// Spaces and hyphens become `_`, letters are uppercased, other
/// alphanumerics and `_` are kept, everything else is dropped. An empty
/// result becomes `"_"`.
pub fn name_to_host_stem(cbm_name: &[u8]) -> String {
    let stem: String = cbm_name
        .iter()
        .take(NAME_LENGTH)
        .filter_map(|&b| match b {
            b' ' | b'-' | b'_' => Some('_'),
            _ if b.is_ascii_alphanumeric() => Some(b.to_ascii_uppercase() as char),
            _ => None,
        })
        .collect();
    if stem.is_empty() {
        "_".to_string()
    } else {
        stem
    }
}

fn is_vowel(b: u8) -> bool {
    matches!(b, b'A' | b'E' | b'I' | b'O' | b'U')
}

/// Remove bytes matching `pred`, scanning `range` from its end, until the
/// stem fits. Indices past the shrinking end are skipped.
fn remove_right_to_left<P: Fn(u8) -> bool>(
    s: &mut Vec<u8>,
    range: std::ops::Range<usize>,
    pred: P,
) -> bool {
    for i in range.rev() {
        if i < s.len() && pred(s[i]) {
            s.remove(i);
            if s.len() <= MAX_STEM_LEN {
                return true;
            }
        }
    }
    s.len() <= MAX_STEM_LEN
}

/// Shrink a stem to at most 8 characters.
///
/// Removal order is fixed, since existing P00 collections depend on it:
/// underscores, then vowels (from the end back to the first vowel), then
/// letters, then anything, each pass working right to left and stopping as
/// soon as the stem fits.
pub fn shrink_to_8(stem: &str) -> String {
    let mut s: Vec<u8> = stem.bytes().collect();
    if s.is_empty() {
        return "_".to_string();
    }
    let len = s.len();

    let first_vowel = |s: &[u8]| s.iter().position(|&b| is_vowel(b)).unwrap_or(len);
    if !remove_right_to_left(&mut s, 0..len, |b| b == b'_') {
        let start = first_vowel(&s);
        if !remove_right_to_left(&mut s, start..len, is_vowel)
            && !remove_right_to_left(&mut s, 0..len, |b| b.is_ascii_alphabetic())
        {
            remove_right_to_left(&mut s, 0..len, |_| true);
        }
    }

    String::from_utf8_lossy(&s).into_owned()
}

/// Host stem for a CBM name: [`name_to_host_stem`] followed by
/// [`shrink_to_8`] when needed.
pub fn host_stem(cbm_name: &[u8]) -> String {
    let stem = name_to_host_stem(cbm_name);
    if stem.len() > MAX_STEM_LEN {
        shrink_to_8(&stem)
    } else {
        stem
    }
}

fn container_path(path_stem: &Path, letter: char, index: u8) -> PathBuf {
    let mut name = path_stem.as_os_str().to_owned();
    name.push(format!(".{}{:02}", letter, index));
    PathBuf::from(name)
}

/// First `<stem>.<T>NN` path that does not exist yet.
pub fn free_container_path(path_stem: &Path, file_type: FileType) -> Option<PathBuf> {
    let letter = file_type.p00_letter()?;
    (0..MAX_SUFFIXES)
        .map(|i| container_path(path_stem, letter, i))
        .find(|path| !path.exists())
}

/// Create a new container for `real_name` next to `path_stem`.
///
/// Tries `.T00` through `.T99`; the returned file is positioned for payload
/// writes.
pub fn create_container(
    path_stem: &Path,
    file_type: FileType,
    real_name: &[u8; NAME_LENGTH],
) -> io::Result<(PathBuf, File)> {
    create_container_with_record_length(path_stem, file_type, real_name, 0)
}

/// Like [`create_container`], storing a REL record length in the header.
pub fn create_container_with_record_length(
    path_stem: &Path,
    file_type: FileType,
    real_name: &[u8; NAME_LENGTH],
    record_length: u8,
) -> io::Result<(PathBuf, File)> {
    let letter = file_type.p00_letter().ok_or_else(|| {
        io::Error::new(io::ErrorKind::InvalidInput, "file type has no P00 form")
    })?;
    let header = P00Header::new(real_name, record_length);

    for i in 0..MAX_SUFFIXES {
        let path = container_path(path_stem, letter, i);
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(mut file) => {
                file.write_all(&header.to_bytes())?;
                return Ok((path, file));
            }
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(e),
        }
    }

    Err(io::Error::new(
        io::ErrorKind::AlreadyExists,
        "all P00 suffixes are taken",
    ))
}

/// Read the real name of a container; `None` if it is not one.
pub fn read_real_name(path: &Path) -> Option<[u8; NAME_LENGTH]> {
    read_header(path).map(|header| header.real_name)
}

/// Read the header of a container; `None` if it is not one.
pub fn read_header(path: &Path) -> Option<P00Header> {
    let mut file = File::open(path).ok()?;
    P00Header::read_from(&mut file)
}

/// Open a container for reading with the cursor on the first payload byte.
pub fn open_payload(path: &Path) -> io::Result<File> {
    let mut file = File::open(path)?;
    if P00Header::read_from(&mut file).is_none() {
        return Err(io::Error::new(io::ErrorKind::InvalidData, "not a P00 file"));
    }
    Ok(file)
}

/// Overwrite the real name stored in an existing container.
pub fn write_real_name(path: &Path, real_name: &[u8]) -> io::Result<()> {
    let mut file = OpenOptions::new().read(true).write(true).open(path)?;
    file.seek(SeekFrom::Start(NAME_OFFSET))?;
    file.write_all(&pad_name(real_name))?;
    Ok(())
}

/// Scan `dir` for a container whose real name matches `pattern`.
pub fn find_by_wildcard(dir: &Path, pattern: &[u8]) -> Option<(PathBuf, [u8; NAME_LENGTH])> {
    for entry in fs::read_dir(dir).ok()?.flatten() {
        let file_name = entry.file_name();
        let Some(name) = file_name.to_str() else { continue };
        if p00_check_name(name).is_none() {
            continue;
        }
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        if let Some(real_name) = read_real_name(&path) {
            if host_wildcard_match(pattern, trim_name(&real_name)) {
                return Some((path, real_name));
            }
        }
    }
    None
}
