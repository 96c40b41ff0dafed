//! The two CRC-16 variants used across the supported formats.
//!
//! HQX and BIN headers and forks are checked with CRC-16/CCITT
//! (poly 0x1021, unreflected); SIT entries are checked with
//! CRC-16/IBM (poly 0x8005, reflected, aka "CRC-16/ARC" — table-equivalent
//! to the reflected poly 0xA001 form spec.md describes). Both are catalog
//! entries of the `crc` crate, so no hand-rolled table is needed.

use crc::{Crc, CRC_16_ARC, CRC_16_XMODEM};

const CCITT: Crc<u16> = Crc::<u16>::new(&CRC_16_XMODEM);
const IBM: Crc<u16> = Crc::<u16>::new(&CRC_16_ARC);

/// CRC-16/CCITT (poly 0x1021, init 0, no reflection). Used by HQX and BIN.
pub fn ccitt(data: &[u8]) -> u16 {
    CCITT.checksum(data)
}

/// CRC-16/IBM, reflected (poly 0xA001 form of 0x8005, init 0). Used by SIT.
pub fn ibm(data: &[u8]) -> u16 {
    IBM.checksum(data)
}

/// HQX's "self-check" property: `CRC(content ++ stored_be_crc) == 0`.
pub fn ccitt_self_check(content: &[u8], stored: u16) -> bool {
    let mut digest = CCITT.digest();
    digest.update(content);
    digest.update(&stored.to_be_bytes());
    digest.finalize() == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ccitt_known_vector() {
        // CRC-16/XMODEM check value for the ASCII string "123456789"
        assert_eq!(ccitt(b"123456789"), 0x31C3);
    }

    #[test]
    fn ibm_known_vector() {
        // CRC-16/ARC check value for the ASCII string "123456789"
        assert_eq!(ibm(b"123456789"), 0xBB3D);
    }

    #[test]
    fn self_check_property() {
        let content = b"hello";
        let stored = ccitt(content);
        assert!(ccitt_self_check(content, stored));
        assert!(!ccitt_self_check(content, stored ^ 1));
    }
}
