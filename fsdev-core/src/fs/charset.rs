//! PETSCII <-> host text conversion for file names and commands.

/// Convert one PETSCII byte to host text.
pub fn petscii_to_host_byte(c: u8) -> u8 {
    match c {
        0x41..=0x5A => c + 0x20,
        0x61..=0x7A => c - 0x20,
        0xC1..=0xDA => c - 0x80,
        0xA0 => b' ',
        _ => c,
    }
}

/// Convert one host text byte to PETSCII.
pub fn host_to_petscii_byte(c: u8) -> u8 {
    match c {
        b'a'..=b'z' => c - 0x20,
        b'A'..=b'Z' => c + 0x80,
        _ => c,
    }
}

/// Convert a PETSCII name or command to host text.
pub fn petscii_to_host(bytes: &[u8]) -> Vec<u8> {
    bytes.iter().map(|&c| petscii_to_host_byte(c)).collect()
}

/// Convert a host name to PETSCII for display on the CBM side.
pub fn host_to_petscii(bytes: &[u8]) -> Vec<u8> {
    bytes.iter().map(|&c| host_to_petscii_byte(c)).collect()
}

/// PETSCII bytes to a host `String`, replacing anything that is not UTF-8.
pub fn petscii_to_host_string(bytes: &[u8]) -> String {
    String::from_utf8_lossy(&petscii_to_host(bytes)).into_owned()
}
