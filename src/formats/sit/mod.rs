//! StuffIt archive support: classic (`SIT!` and friends) and SIT5 layouts
//! (spec.md §4.4).
//!
//! Both layouts share a compression-method dispatch table; [`classic`]
//! and [`v5`] only differ in how they walk the entry tree and where
//! they get their header fields from.

mod classic;
mod method1;
mod method13;
mod method15;
mod method2;
mod v5;

use crate::{crc, Entry, ParseError, PeelLimits};

pub fn detect(data: &[u8]) -> bool {
    classic::find(data).is_some() || v5::find(data).is_some()
}

pub fn peel(data: &[u8], limits: &PeelLimits) -> Result<Vec<Entry>, ParseError> {
    let classic_hit = classic::find(data);
    let v5_hit = v5::find(data);

    match (classic_hit, v5_hit) {
        (Some(c), Some(f)) if f < c => v5::parse(data, f, limits),
        (Some(c), _) => classic::parse(data, c, limits),
        (None, Some(f)) => v5::parse(data, f, limits),
        (None, None) => Err(ParseError::BadSignature),
    }
}

/// Decompresses one fork, dispatching on the low nibble of its method
/// byte, and verifies the stored CRC-16/IBM — except for method 15,
/// which is self-integrity-checked and carries no separate fork CRC to
/// compare against (spec.md §4.6).
pub(super) fn decompress_fork(
    method: u8,
    compressed: &[u8],
    raw_len: usize,
    stored_crc: u16,
) -> Result<Vec<u8>, ParseError> {
    if method == 15 {
        return method15::decode(compressed, raw_len);
    }

    let bytes = match method {
        0 => raw_copy(compressed, raw_len)?,
        1 => method1::decode(compressed, raw_len)?,
        2 => method2::decode(compressed, raw_len)?,
        13 => method13::decode(compressed, raw_len)?,
        _ => return Err(ParseError::UnsupportedFeature),
    };
    if crc::ibm(&bytes) != stored_crc {
        return Err(ParseError::CrcMismatch);
    }
    Ok(bytes)
}

fn raw_copy(data: &[u8], raw_len: usize) -> Result<Vec<u8>, ParseError> {
    if data.len() < raw_len {
        return Err(ParseError::Truncated);
    }
    Ok(data[..raw_len].to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_copy_rejects_short_buffer() {
        assert!(raw_copy(&[1, 2], 5).is_err());
    }

    #[test]
    fn raw_copy_truncates_to_raw_len() {
        assert_eq!(raw_copy(&[1, 2, 3, 4], 2).unwrap(), vec![1, 2]);
    }

    #[test]
    fn detect_rejects_unrelated_data() {
        assert!(!detect(b"not a stuffit archive"));
    }
}
