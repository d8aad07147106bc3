//! CBM wildcard matching.
//!
//! Three flavours are in use:
//! - [`cbm_wildcard_match`] compares fixed-width, 0xA0-padded names the way
//!   the drive firmware does.
//! - [`host_wildcard_match`] compares a pattern against the NUL-trimmed real
//!   name stored in a P00 header.
//! - [`dirmask_match`] filters host names while producing a `$` listing.

use super::PAD_BYTE;

/// Match two fixed-width padded CBM names.
///
/// `*` ends the comparison with a match, `?` matches any byte. A pad byte
/// that matched in both names means the rest is padding.
pub fn cbm_wildcard_match<const N: usize>(pattern: &[u8; N], name: &[u8; N]) -> bool {
    for (&p, &n) in pattern.iter().zip(name.iter()) {
        match p {
            b'*' => return true,
            b'?' => {}
            _ if p != n => return false,
            _ => {}
        }
        if p == PAD_BYTE {
            return true;
        }
    }
    true
}

/// Match `pattern` against a variable-length name.
///
/// Without a `*` the name must not be longer than the pattern. An empty
/// pattern never matches.
pub fn host_wildcard_match(pattern: &[u8], name: &[u8]) -> bool {
    if pattern.is_empty() {
        return false;
    }
    for (i, &p) in pattern.iter().enumerate() {
        if p == b'*' {
            return true;
        }
        if p != b'?' && Some(&p) != name.get(i) {
            return false;
        }
    }
    name.len() <= pattern.len()
}

/// Match a listing mask (`$:MASK`) against a host file name.
///
/// `*` followed by nothing accepts the rest; `*x` skips ahead to the next
/// `x`. The match succeeds when name and mask run out together.
pub fn dirmask_match(mask: &[u8], name: &[u8]) -> bool {
    let mut p = 0;
    let mut i = 0;
    while p < name.len() && i < mask.len() {
        match mask[i] {
            b'?' => p += 1,
            b'*' => {
                let Some(&next) = mask.get(i + 1) else {
                    return true;
                };
                while p < name.len() && name[p] != next {
                    p += 1;
                }
            }
            m => {
                if name[p] != m {
                    return false;
                }
                p += 1;
            }
        }
        if p >= name.len() && i + 1 >= mask.len() {
            return true;
        }
        i += 1;
    }
    false
}
