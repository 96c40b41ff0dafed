//! SIT compression method 2: LZW with little-endian bit packing.
//!
//! Codes are packed LSB-first across byte boundaries (the classic
//! GIF-style packing, not MSB-first). Code width starts at 9 bits and
//! widens by one at each power-of-two table fill, capped at 14. Clear
//! code is 256; after a clear the next assigned code skips forward to
//! the next multiple of 8.

use std::collections::HashMap;

use crate::bitstream::LsbBitReader;
use crate::buffer::GrowBuf;
use crate::ParseError;

const CLEAR: u32 = 256;
const FIRST_FREE: u32 = 257;
const MAX_WIDTH: u32 = 14;

fn align8(v: u32) -> u32 {
    (v + 7) / 8 * 8
}

fn expand(code: u32, table: &HashMap<u32, (i32, u8)>) -> Result<Vec<u8>, ParseError> {
    let mut stack = Vec::new();
    let mut cur = code as i32;
    loop {
        if cur < 256 {
            stack.push(cur as u8);
            break;
        }
        let (prev, suffix) = *table
            .get(&(cur as u32))
            .ok_or(ParseError::InvalidBitstream)?;
        stack.push(suffix);
        cur = prev;
    }
    stack.reverse();
    Ok(stack)
}

pub fn decode(data: &[u8], raw_len: usize) -> Result<Vec<u8>, ParseError> {
    let mut bits = LsbBitReader::new(data);
    let mut out = GrowBuf::with_target(raw_len);
    let mut table: HashMap<u32, (i32, u8)> = HashMap::new();
    let mut width = 9u32;
    let mut next_code = FIRST_FREE;
    let mut prev_code: Option<u32> = None;

    while !out.is_full() {
        let code = bits.read_bits(width)?;
        if code == CLEAR {
            table.clear();
            next_code = align8(FIRST_FREE);
            width = 9;
            prev_code = None;
            continue;
        }

        let bytes = if code < 256 {
            vec![code as u8]
        } else if table.contains_key(&code) {
            expand(code, &table)?
        } else if code == next_code {
            let prev = prev_code.ok_or(ParseError::InvalidBitstream)?;
            let mut s = if prev < 256 {
                vec![prev as u8]
            } else {
                expand(prev, &table)?
            };
            let first = s[0];
            s.push(first);
            s
        } else {
            return Err(ParseError::InvalidBitstream);
        };

        out.extend_from_slice(&bytes)?;

        if let Some(prev) = prev_code {
            table.insert(next_code, (prev as i32, bytes[0]));
            next_code += 1;
            if next_code >= (1 << width) && width < MAX_WIDTH {
                width += 1;
            }
        }
        prev_code = Some(code);
    }

    out.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pack_codes(codes: &[(u32, u32)]) -> Vec<u8> {
        let mut bitbuf = 0u32;
        let mut nbits = 0u32;
        let mut out = Vec::new();
        for &(code, width) in codes {
            bitbuf |= code << nbits;
            nbits += width;
            while nbits >= 8 {
                out.push((bitbuf & 0xFF) as u8);
                bitbuf >>= 8;
                nbits -= 8;
            }
        }
        if nbits > 0 {
            out.push((bitbuf & 0xFF) as u8);
        }
        out
    }

    #[test]
    fn literal_codes_pass_through() {
        let data = pack_codes(&[(b'a' as u32, 9), (b'b' as u32, 9), (b'c' as u32, 9)]);
        let out = decode(&data, 3).unwrap();
        assert_eq!(out, b"abc");
    }

    #[test]
    fn repeated_pair_builds_dictionary_entry() {
        // a b a b  -- second "ab" should hit the freshly built code 257.
        let data = pack_codes(&[
            (b'a' as u32, 9),
            (b'b' as u32, 9),
            (FIRST_FREE, 9),
        ]);
        let out = decode(&data, 4).unwrap();
        assert_eq!(out, b"abab");
    }

    #[test]
    fn clear_code_resets_table() {
        let data = pack_codes(&[
            (b'a' as u32, 9),
            (CLEAR, 9),
            (b'b' as u32, 9),
        ]);
        let out = decode(&data, 2).unwrap();
        assert_eq!(out, b"ab");
    }

    #[test]
    fn undefined_code_is_rejected() {
        let data = pack_codes(&[(500, 9)]);
        assert!(decode(&data, 1).is_err());
    }
}
