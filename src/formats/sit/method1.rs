//! SIT compression method 1: RLE90, a dialect distinct from HQX's.
//!
//! `0x90 0x00` is a literal `0x90`; `0x90 0x01` emits zero additional
//! copies (not an error, unlike HQX); `0x90 N` with `N > 1` repeats the
//! last emitted byte `N - 1` additional times.

use crate::buffer::GrowBuf;
use crate::ParseError;

pub fn decode(data: &[u8], raw_len: usize) -> Result<Vec<u8>, ParseError> {
    let mut out = GrowBuf::with_target(raw_len);
    let mut prev: Option<u8> = None;
    let mut i = 0;
    while i < data.len() {
        let b = data[i];
        i += 1;
        if b != 0x90 {
            out.push(b)?;
            prev = Some(b);
            continue;
        }
        let n = *data.get(i).ok_or(ParseError::Truncated)?;
        i += 1;
        match n {
            0 => {
                out.push(0x90)?;
                prev = Some(0x90);
            }
            1 => {}
            n => {
                let p = prev.ok_or(ParseError::InvalidBitstream)?;
                for _ in 0..(n - 1) {
                    out.push(p)?;
                }
            }
        }
    }
    out.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_0x90_via_escape() {
        let out = decode(&[0x90, 0x00], 1).unwrap();
        assert_eq!(out, vec![0x90]);
    }

    #[test]
    fn count_one_emits_nothing() {
        let out = decode(&[1, 0x90, 0x01], 1).unwrap();
        assert_eq!(out, vec![1]);
    }

    #[test]
    fn run_expands_against_last_emitted_byte() {
        let out = decode(&[0, 0, 0, 0x90, 0x00, 0x90, 0x01, 0x90, 0x03], 6).unwrap();
        assert_eq!(out, vec![0, 0, 0, 0x90, 0x90, 0x90]);
    }

    #[test]
    fn mismatched_length_is_fatal() {
        assert!(decode(&[1, 2, 3], 2).is_err());
    }
}
