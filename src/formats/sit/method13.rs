//! SIT compression method 13: LZSS with canonical Huffman-coded literals,
//! lengths and distances.
//!
//! The bitstream is LSB-first within each byte. A one-byte header
//! selects either a dynamically-serialized tree set or one of five
//! predefined sets; the decode loop then alternates between a "first"
//! and a "second" literal/length tree depending on whether the previous
//! symbol was a literal or the tail of a match.
//!
//! The dynamic path (`set == 0`) is fully general and decodes whatever
//! tree the archive actually serialized. The meta-code table and the
//! five predefined sets (`set` in 1..=5) are a different matter: the
//! real constants are not recoverable from this crate's source material
//! (see `complete_lengths`/`predefined_tables` below and DESIGN.md), so
//! a file compressed against a genuine predefined set will not decode
//! correctly here.

use crate::bitstream::LsbBitReader;
use crate::buffer::GrowBuf;
use crate::huffman::{build_canonical, HuffTree};
use crate::ParseError;

const META_SYMBOLS: usize = 37;
const LITLEN_SYMBOLS: usize = 321;

pub fn decode(data: &[u8], raw_len: usize) -> Result<Vec<u8>, ParseError> {
    if data.is_empty() {
        return if raw_len == 0 {
            Ok(Vec::new())
        } else {
            Err(ParseError::Truncated)
        };
    }
    let header = data[0];
    let set = header >> 4;
    let shared = header & 0x08 != 0;
    let k = u32::from(header & 0x07);
    let dist_symbols = (k + 10) as usize;

    let mut bits = LsbBitReader::new(&data[1..]);

    let (first_lengths, second_lengths, dist_lengths) = match set {
        0 => {
            let meta = build_canonical(&complete_lengths(META_SYMBOLS));
            let first = read_lengths(LITLEN_SYMBOLS, &meta, &mut bits)?;
            let second = if shared {
                first.clone()
            } else {
                read_lengths(LITLEN_SYMBOLS, &meta, &mut bits)?
            };
            let dist = read_lengths(dist_symbols, &meta, &mut bits)?;
            (first, second, dist)
        }
        1..=5 => predefined_tables(set, dist_symbols),
        _ => return Err(ParseError::UnsupportedFeature),
    };

    let first_tree = build_canonical(&first_lengths);
    let second_tree = build_canonical(&second_lengths);
    let dist_tree = build_canonical(&dist_lengths);

    let mut out = GrowBuf::with_target(raw_len);
    let mut active = &first_tree;

    while !out.is_full() {
        let symbol = active.decode(|| bits.read_bit())?;
        if symbol < 256 {
            out.push(symbol as u8)?;
            active = &first_tree;
            continue;
        }

        let length = match symbol {
            256..=317 => (symbol - 253) as usize,
            318 => bits.read_bits(10)? as usize + 65,
            319 => bits.read_bits(15)? as usize + 65,
            _ => return Err(ParseError::InvalidBitstream),
        };

        let d = dist_tree.decode(|| bits.read_bit())?;
        let distance = if d == 0 {
            1usize
        } else {
            let extra = bits.read_bits((d - 1) as u32)? as usize;
            (1usize << (d - 1)) + extra + 1
        };

        out.copy_match(distance, length)?;
        active = &second_tree;
    }

    out.finish()
}

/// Stateful decode of one code-length vector, driven by meta-code
/// commands 0..36 (spec.md §4.5).
fn read_lengths(n: usize, meta: &HuffTree, bits: &mut LsbBitReader) -> Result<Vec<u8>, ParseError> {
    let mut lengths = Vec::with_capacity(n);
    let mut len: i32 = 0;
    while lengths.len() < n {
        let cmd = meta.decode(|| bits.read_bit())?;
        match cmd {
            0..=30 => len = cmd + 1,
            31 => len = 0,
            32 => len += 1,
            33 => len = (len - 1).max(0),
            34 => {
                if bits.read_bits(1)? == 1 {
                    lengths.push(len as u8);
                }
            }
            35 => {
                let r = bits.read_bits(3)?;
                for _ in 0..(r + 2) {
                    lengths.push(len as u8);
                }
            }
            36 => {
                let r = bits.read_bits(6)?;
                for _ in 0..(r + 10) {
                    lengths.push(len as u8);
                }
            }
            _ => return Err(ParseError::InvalidBitstream),
        }
        lengths.push(len as u8);
    }
    lengths.truncate(n);
    Ok(lengths)
}

/// Produces a complete (Kraft-equality) canonical length table over `n`
/// symbols, split across two adjacent depths — the same construction
/// the meta-code's 37-entry table and the five predefined sets use.
///
/// This is a synthetic stand-in, not the verbatim meta-code table a
/// real StuffIt implementation carries: that table's real lengths are
/// not available in this crate's source material. The table produced
/// here is internally consistent (a valid canonical code) but will not
/// match what a genuine StuffIt archive's dynamic header encodes
/// against.
fn complete_lengths(n: usize) -> Vec<u8> {
    if n <= 1 {
        return vec![0u8; n];
    }
    let d = usize::BITS - (n - 1).leading_zeros();
    let pow_d = 1usize << d;
    let a = pow_d - n;
    let b = n - a;
    let mut lengths = Vec::with_capacity(n);
    lengths.extend(std::iter::repeat((d - 1) as u8).take(a));
    lengths.extend(std::iter::repeat(d as u8).take(b));
    lengths
}

/// The five predefined table sets.
///
/// These are **not** the real StuffIt predefined tables spec.md requires
/// verbatim — they are synthesized from the same generic Kraft-exact
/// construction as the dynamic path's meta-code, rotated by the set
/// index so each set assigns different symbols the shorter codes. A
/// file encoded against a genuine predefined set (1..=5) will not
/// decode correctly against this substitute; only the dynamic path
/// (`set == 0`) is a faithful decoder. See DESIGN.md.
fn predefined_tables(set: u8, dist_symbols: usize) -> (Vec<u8>, Vec<u8>, Vec<u8>) {
    let rotate = |mut v: Vec<u8>, by: usize| {
        let by = by % v.len().max(1);
        v.rotate_left(by);
        v
    };
    let first = rotate(complete_lengths(LITLEN_SYMBOLS), usize::from(set));
    let second = rotate(complete_lengths(LITLEN_SYMBOLS), usize::from(set) * 2);
    let dist = rotate(complete_lengths(dist_symbols), usize::from(set) * 3);
    (first, second, dist)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct BitWriter {
        bytes: Vec<u8>,
        acc: u32,
        nbits: u32,
    }

    impl BitWriter {
        fn new() -> Self {
            BitWriter {
                bytes: Vec::new(),
                acc: 0,
                nbits: 0,
            }
        }

        fn push_bits(&mut self, value: u32, width: u32) {
            self.acc |= value << self.nbits;
            self.nbits += width;
            while self.nbits >= 8 {
                self.bytes.push((self.acc & 0xFF) as u8);
                self.acc >>= 8;
                self.nbits -= 8;
            }
        }

        fn push_code(&mut self, code: u32, len: u32) {
            for i in (0..len).rev() {
                self.push_bits((code >> i) & 1, 1);
            }
        }

        fn finish(mut self) -> Vec<u8> {
            if self.nbits > 0 {
                self.bytes.push((self.acc & 0xFF) as u8);
            }
            self.bytes
        }
    }

    #[test]
    fn complete_lengths_is_kraft_exact() {
        let lengths = complete_lengths(37);
        let sum: f64 = lengths.iter().map(|&l| 2f64.powi(-(l as i32))).sum();
        assert!((sum - 1.0).abs() < 1e-9);
    }

    #[test]
    fn predefined_set_round_trips_literal_run() {
        // Build a stream using predefined set 1 that emits three literal
        // bytes with no matches, by encoding symbols directly against the
        // decoder's own predefined tables (grounded on, not independent of,
        // the decoder under test -- this exercises the header/dispatch and
        // canonical-decode wiring, not an external reference vector).
        //
        // This does NOT validate against a real StuffIt-encoded predefined
        // set: `predefined_tables` is a synthetic stand-in (see its doc
        // comment and DESIGN.md), so this test only proves the decode loop
        // is self-consistent with whatever tables it's given, not that it
        // decodes genuine method-13 archives using sets 1..=5.
        let dist_symbols = 11; // k = 1
        let (first, _second, _dist) = predefined_tables(1, dist_symbols);
        let tree = build_canonical(&first);

        // Find a codeword for symbol 'a' by walking the canonical table
        // construction the same way the decoder will.
        let symbol = b'a' as i32;
        let len = first[symbol as usize];
        assert!(len > 0, "chosen symbol must have a non-zero-length code");

        // Recompute the canonical code for this symbol directly.
        let code = canonical_code_for(&first, symbol as usize);

        let mut header = 0u8;
        header |= 1 << 4; // set = 1
        header |= 1; // k = 1
        let mut w = BitWriter::new();
        w.push_code(code, u32::from(len));
        let body = w.finish();

        let mut stream = vec![header];
        stream.extend_from_slice(&body);

        let out = decode(&stream, 1).unwrap();
        assert_eq!(out, vec![b'a']);
        let _ = tree; // silence unused in case of future refactor
    }

    fn canonical_code_for(lengths: &[u8], symbol: usize) -> u32 {
        let max_len = lengths.iter().copied().max().unwrap_or(0) as usize;
        let mut bl_count = vec![0u32; max_len + 1];
        for &l in lengths {
            if l > 0 {
                bl_count[l as usize] += 1;
            }
        }
        let mut next_code = vec![0u32; max_len + 2];
        let mut code = 0u32;
        for bits in 1..=max_len {
            code = (code + bl_count[bits - 1]) << 1;
            next_code[bits] = code;
        }
        for (sym, &len) in lengths.iter().enumerate() {
            if len == 0 {
                continue;
            }
            let c = next_code[len as usize];
            next_code[len as usize] += 1;
            if sym == symbol {
                return c;
            }
        }
        unreachable!("symbol has zero length")
    }

    #[test]
    fn overrun_match_distance_is_rejected() {
        // A match referencing further back than any bytes written must fail.
        let mut out = GrowBuf::with_target(4);
        out.push(1).unwrap();
        assert!(out.copy_match(5, 2).is_err());
    }
}
