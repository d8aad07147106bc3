//! OPEN name parsing.
//!
//! A CBM filename command has the shape
//! `[@][drive]:NAME[,modifier[,modifier...]]`, for example `0:DATA,S,W` or
//! `REC,L,<len>`. Parsing is pure byte analysis; nothing here touches the
//! host filesystem.

use crate::error::DosError;

/// Highest record length a REL file may declare.
pub const MAX_RECORD_LENGTH: u8 = 254;

/// CBM file types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FileType {
    Del,
    Seq,
    #[default]
    Prg,
    Usr,
    Rel,
    Cbm,
}

impl FileType {
    /// Three-letter code shown in directory listings.
    pub fn code(self) -> &'static str {
        match self {
            FileType::Del => "DEL",
            FileType::Seq => "SEQ",
            FileType::Prg => "PRG",
            FileType::Usr => "USR",
            FileType::Rel => "REL",
            FileType::Cbm => "CBM",
        }
    }

    /// Letter used in P00 container extensions (`.P00`, `.S00`, ...).
    /// Partitions have no container form.
    pub fn p00_letter(self) -> Option<char> {
        match self {
            FileType::Del => Some('D'),
            FileType::Seq => Some('S'),
            FileType::Prg => Some('P'),
            FileType::Usr => Some('U'),
            FileType::Rel => Some('R'),
            FileType::Cbm => None,
        }
    }

    /// Inverse of [`FileType::p00_letter`], case-insensitive.
    pub fn from_p00_letter(letter: char) -> Option<Self> {
        match letter.to_ascii_uppercase() {
            'D' => Some(FileType::Del),
            'S' => Some(FileType::Seq),
            'P' => Some(FileType::Prg),
            'U' => Some(FileType::Usr),
            'R' => Some(FileType::Rel),
            _ => None,
        }
    }
}

/// Access mode requested by an OPEN.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    Read,
    Write,
    Append,
}

/// Result of parsing one OPEN name. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCommand {
    raw: Vec<u8>,
    secondary: u8,
    name: Vec<u8>,
    mode: AccessMode,
    file_type: FileType,
    record_length: u8,
}

impl ParsedCommand {
    pub fn secondary(&self) -> u8 {
        self.secondary
    }

    /// The file name part, still in PETSCII.
    pub fn name(&self) -> &[u8] {
        &self.name
    }

    pub fn mode(&self) -> AccessMode {
        self.mode
    }

    pub fn file_type(&self) -> FileType {
        self.file_type
    }

    /// REL record length; 0 when none was given.
    pub fn record_length(&self) -> u8 {
        self.record_length
    }

    /// `$` requests a directory listing instead of a file.
    pub fn is_directory(&self) -> bool {
        self.raw.first() == Some(&b'$')
    }

    /// `@0:NAME` asks to replace an existing file on write.
    pub fn is_replace(&self) -> bool {
        self.raw.first() == Some(&b'@') && self.raw.contains(&b':')
    }

    /// True if the name holds a `*` or `?`.
    pub fn has_wildcards(&self) -> bool {
        self.name.iter().any(|&b| b == b'*' || b == b'?')
    }
}

/// Parse an OPEN name for the given secondary address.
pub fn parse_command(raw: &[u8], secondary: u8) -> Result<ParsedCommand, DosError> {
    if raw.is_empty() {
        return Err(DosError::NoName);
    }

    let start = match raw.iter().position(|&b| b == b':') {
        Some(colon) => colon + 1,
        None if raw[0] == b'$' => raw.len(),
        None => 0,
    };
    let name_end = raw[start..]
        .iter()
        .position(|&b| b == b',')
        .map_or(raw.len(), |i| start + i);
    let name = raw[start..name_end].to_vec();

    let mut mode = None;
    let mut file_type = None;
    let mut record_length = 0;

    // `pos` always sits on a comma or at the end.
    let mut pos = name_end;
    while pos < raw.len() {
        pos += 1;
        let Some(&letter) = raw.get(pos) else {
            return Err(DosError::Inval);
        };
        match letter {
            b'S' => file_type = Some(FileType::Seq),
            b'P' => file_type = Some(FileType::Prg),
            b'U' => file_type = Some(FileType::Usr),
            b'C' => file_type = Some(FileType::Cbm),
            b'R' => mode = Some(AccessMode::Read),
            b'W' => mode = Some(AccessMode::Write),
            b'A' => mode = Some(AccessMode::Append),
            b'L' => {
                file_type = Some(FileType::Rel);
                if raw.get(pos + 1) == Some(&b',') {
                    if let Some(&length) = raw.get(pos + 2) {
                        if length > MAX_RECORD_LENGTH {
                            return Err(DosError::Overflow);
                        }
                        record_length = length;
                        // The length byte may itself be a comma.
                        pos += 2;
                    }
                }
            }
            _ if mode.is_none() => return Err(DosError::Inval),
            _ => {}
        }
        pos = raw[pos + 1..]
            .iter()
            .position(|&b| b == b',')
            .map_or(raw.len(), |i| pos + 1 + i);
    }

    let mode = match secondary {
        0 => AccessMode::Read,
        1 => AccessMode::Write,
        _ => mode.unwrap_or(AccessMode::Read),
    };
    let file_type = file_type.unwrap_or(if secondary < 2 {
        FileType::Prg
    } else {
        FileType::Seq
    });

    Ok(ParsedCommand {
        raw: raw.to_vec(),
        secondary,
        name,
        mode,
        file_type,
        record_length,
    })
}
