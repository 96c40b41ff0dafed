//! BinHex 4.0 (`.hqx`) decoder (spec.md §4.2).
//!
//! Three pull-based layers: envelope scan, 6-bit ASCII inversion, RLE90
//! expansion. The expanded stream then holds a small header and two
//! forks, each CRC-16/CCITT checked via the "self-check" property
//! `CRC(content ++ stored_crc) == 0`.

use crate::crc::ccitt_self_check;
use crate::formats::pull::ByteSource;
use crate::{decode_filename, Entry, FileMetadata, FourCC, ParseError};

const PREAMBLE: &[u8] = b"(This file must be converted with BinHex";
const ALPHABET: &[u8; 64] =
    b"!\"#$%&'()*+,-012345689@ABCDEFGHIJKLMNPQRSTUVXYZ[`abcdefhijklmpqr";

/// Finder flag bits masked on output: invisible (14), has-been-inited
/// (7), on-desk (2).
const FLAG_MASK: u16 = !((1 << 14) | (1 << 7) | (1 << 2));

pub fn detect(data: &[u8]) -> bool {
    find_subslice(data, PREAMBLE).is_some()
}

pub fn peel_wrapper(data: &[u8]) -> Result<Vec<u8>, ParseError> {
    let (_, data_fork, _) = decode(data)?;
    Ok(data_fork)
}

pub fn peel_file(data: &[u8]) -> Result<Entry, ParseError> {
    let (metadata, data_fork, resource_fork) = decode(data)?;
    Ok(Entry {
        metadata,
        data_fork,
        resource_fork,
    })
}

fn decode(data: &[u8]) -> Result<(FileMetadata, Vec<u8>, Vec<u8>), ParseError> {
    let payload_start = find_payload_start(data)?;
    let six_bit = SixBitSource::new(&data[payload_start..]);
    let mut src = Rle90Source::new(six_bit);

    let name_len = src.read_u8()?;
    if !(1..=63).contains(&name_len) {
        return Err(ParseError::BadValue);
    }
    let mut header = Vec::with_capacity(24 + usize::from(name_len));
    header.push(name_len);
    let name_bytes = src.read_exact(usize::from(name_len))?;
    header.extend_from_slice(&name_bytes);
    let nul = src.read_u8()?;
    if nul != 0 {
        return Err(ParseError::BadValue);
    }
    header.push(nul);
    let type_bytes = src.read_exact(4)?;
    header.extend_from_slice(&type_bytes);
    let creator_bytes = src.read_exact(4)?;
    header.extend_from_slice(&creator_bytes);
    let flags_bytes = src.read_exact(2)?;
    header.extend_from_slice(&flags_bytes);
    let data_len_bytes = src.read_exact(4)?;
    header.extend_from_slice(&data_len_bytes);
    let rsrc_len_bytes = src.read_exact(4)?;
    header.extend_from_slice(&rsrc_len_bytes);

    let stored_header_crc = src.read_u16be()?;
    if !ccitt_self_check(&header, stored_header_crc) {
        return Err(ParseError::CrcMismatch);
    }

    let file_type = FourCC(u32::from_be_bytes(type_bytes.try_into().unwrap()));
    let file_creator = FourCC(u32::from_be_bytes(creator_bytes.try_into().unwrap()));
    let finder_flags = u16::from_be_bytes(flags_bytes.try_into().unwrap()) & FLAG_MASK;
    let data_len = u32::from_be_bytes(data_len_bytes.try_into().unwrap()) as usize;
    let rsrc_len = u32::from_be_bytes(rsrc_len_bytes.try_into().unwrap()) as usize;

    let data_fork = src.read_exact(data_len)?;
    let data_crc = src.read_u16be()?;
    if !ccitt_self_check(&data_fork, data_crc) {
        return Err(ParseError::CrcMismatch);
    }

    let rsrc_fork = src.read_exact(rsrc_len)?;
    let rsrc_crc = src.read_u16be()?;
    if !ccitt_self_check(&rsrc_fork, rsrc_crc) {
        return Err(ParseError::CrcMismatch);
    }

    let filename = decode_filename(&name_bytes);
    Ok((
        FileMetadata {
            filename,
            file_type,
            file_creator,
            finder_flags,
        },
        data_fork,
        rsrc_fork,
    ))
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn find_payload_start(data: &[u8]) -> Result<usize, ParseError> {
    let preamble_pos = find_subslice(data, PREAMBLE).ok_or(ParseError::BadSignature)?;
    let mut i = preamble_pos + PREAMBLE.len();
    while i < data.len() && data[i] != b'\n' && data[i] != b'\r' {
        i += 1;
    }
    if i >= data.len() {
        return Err(ParseError::Truncated);
    }
    if data[i] == b'\r' && data.get(i + 1) == Some(&b'\n') {
        i += 2;
    } else {
        i += 1;
    }
    let colon_rel = data[i..]
        .iter()
        .position(|&b| b == b':')
        .ok_or(ParseError::BadSignature)?;
    Ok(i + colon_rel + 1)
}

fn sixbit_value(c: u8) -> Option<u8> {
    ALPHABET.iter().position(|&a| a == c).map(|p| p as u8)
}

/// Layer 2: inverts the 64-character alphabet into an 8-bit byte stream,
/// skipping whitespace, stopping at the closing `:`.
struct SixBitSource<'a> {
    data: &'a [u8],
    pos: usize,
    bit_buffer: u32,
    bit_count: u32,
    finished: bool,
}

impl<'a> SixBitSource<'a> {
    fn new(data: &'a [u8]) -> Self {
        SixBitSource {
            data,
            pos: 0,
            bit_buffer: 0,
            bit_count: 0,
            finished: false,
        }
    }
}

impl<'a> ByteSource for SixBitSource<'a> {
    fn next_byte(&mut self) -> Result<Option<u8>, ParseError> {
        loop {
            if self.bit_count >= 8 {
                self.bit_count -= 8;
                let byte = ((self.bit_buffer >> self.bit_count) & 0xFF) as u8;
                return Ok(Some(byte));
            }
            if self.finished {
                return Ok(None);
            }
            let c = *self
                .data
                .get(self.pos)
                .ok_or(ParseError::Truncated)?;
            self.pos += 1;
            match c {
                b'\r' | b'\n' | b'\t' | b' ' => continue,
                b':' => {
                    self.finished = true;
                    continue;
                }
                _ => {
                    let v = sixbit_value(c).ok_or(ParseError::InvalidBitstream)?;
                    self.bit_buffer = (self.bit_buffer << 6) | u32::from(v);
                    self.bit_count += 6;
                }
            }
        }
    }
}

/// Layer 3: RLE90 expansion. `0x90 0x00` is a literal `0x90`; `0x90 0x01`
/// is fatal (illegal count); `0x90 N` (N > 1) repeats the previous byte
/// `N - 1` additional times.
struct Rle90Source<S> {
    inner: S,
    prev: Option<u8>,
    repeat_remaining: u32,
}

impl<S: ByteSource> Rle90Source<S> {
    fn new(inner: S) -> Self {
        Rle90Source {
            inner,
            prev: None,
            repeat_remaining: 0,
        }
    }
}

impl<S: ByteSource> ByteSource for Rle90Source<S> {
    fn next_byte(&mut self) -> Result<Option<u8>, ParseError> {
        if self.repeat_remaining > 0 {
            self.repeat_remaining -= 1;
            return Ok(self.prev);
        }
        let b = match self.inner.next_byte()? {
            Some(b) => b,
            None => return Ok(None),
        };
        if b != 0x90 {
            self.prev = Some(b);
            return Ok(Some(b));
        }
        let n = self
            .inner
            .next_byte()?
            .ok_or(ParseError::Truncated)?;
        match n {
            0x00 => {
                self.prev = Some(0x90);
                Ok(Some(0x90))
            }
            0x01 => Err(ParseError::InvalidBitstream),
            n => {
                let prev = self.prev.ok_or(ParseError::InvalidBitstream)?;
                self.repeat_remaining = u32::from(n) - 1;
                let _ = prev;
                self.next_byte()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build_hqx(name: &str, file_type: [u8; 4], creator: [u8; 4], data: &[u8], rsrc: &[u8]) -> Vec<u8> {
        let mut stream = Vec::new();
        stream.push(name.len() as u8);
        stream.extend_from_slice(name.as_bytes());
        stream.push(0);
        stream.extend_from_slice(&file_type);
        stream.extend_from_slice(&creator);
        stream.extend_from_slice(&[0u8, 0u8]); // finder flags
        stream.extend_from_slice(&(data.len() as u32).to_be_bytes());
        stream.extend_from_slice(&(rsrc.len() as u32).to_be_bytes());
        let header_crc = crate::crc::ccitt(&stream);
        stream.extend_from_slice(&header_crc.to_be_bytes());
        stream.extend_from_slice(data);
        stream.extend_from_slice(&crate::crc::ccitt(data).to_be_bytes());
        stream.extend_from_slice(rsrc);
        stream.extend_from_slice(&crate::crc::ccitt(rsrc).to_be_bytes());

        // RLE90-encode (trivially: no runs) then six-bit encode, then wrap in envelope.
        let rle_encoded = stream; // no literal 0x90 bytes in this synthetic fixture
        let sixbit = sixbit_encode(&rle_encoded);
        let mut out = Vec::new();
        out.extend_from_slice(b"(This file must be converted with BinHex 4.0)\n");
        out.push(b':');
        out.extend_from_slice(&sixbit);
        out.push(b':');
        out
    }

    fn sixbit_encode(data: &[u8]) -> Vec<u8> {
        let mut bits = 0u32;
        let mut nbits = 0u32;
        let mut out = Vec::new();
        for &b in data {
            bits = (bits << 8) | u32::from(b);
            nbits += 8;
            while nbits >= 6 {
                nbits -= 6;
                let v = (bits >> nbits) & 0x3F;
                out.push(ALPHABET[v as usize]);
            }
        }
        if nbits > 0 {
            let v = (bits << (6 - nbits)) & 0x3F;
            out.push(ALPHABET[v as usize]);
        }
        out
    }

    #[test]
    fn empty_fork_round_trip() {
        let fixture = build_hqx("x", *b"TEXT", *b"R*ch", b"", b"");
        assert!(detect(&fixture));
        let entry = peel_file(&fixture).unwrap();
        assert_eq!(entry.metadata.filename, "x");
        assert_eq!(entry.metadata.file_type, FourCC(u32::from_be_bytes(*b"TEXT")));
        assert_eq!(entry.metadata.file_creator, FourCC(u32::from_be_bytes(*b"R*ch")));
        assert!(entry.data_fork.is_empty());
        assert!(entry.resource_fork.is_empty());
    }

    #[test]
    fn data_and_resource_forks_decode() {
        let fixture = build_hqx("hello.txt", *b"TEXT", *b"ttxt", b"hello world", b"\x01\x02\x03");
        let entry = peel_file(&fixture).unwrap();
        assert_eq!(entry.data_fork, b"hello world");
        assert_eq!(entry.resource_fork, b"\x01\x02\x03");
    }

    #[test]
    fn bad_crc_is_rejected() {
        let mut fixture = build_hqx("x", *b"TEXT", *b"R*ch", b"abc", b"");
        // Flip a bit inside the six-bit payload, well before the trailing ':'.
        let idx = fixture.len() - 5;
        fixture[idx] ^= 0x01;
        assert!(peel_file(&fixture).is_err());
    }

    #[test]
    fn rle90_expands_repeats() {
        let mut six = SliceSixBit(vec![0, 0, 0, 0x90, 0, 0x90, 3]);
        let mut rle = Rle90Source::new(&mut six);
        let mut out = Vec::new();
        while let Some(b) = rle.next_byte().unwrap() {
            out.push(b);
        }
        assert_eq!(out, vec![0, 0, 0, 0x90, 0x90, 0x90]);
    }

    struct SliceSixBit(Vec<u8>);
    impl ByteSource for &mut SliceSixBit {
        fn next_byte(&mut self) -> Result<Option<u8>, ParseError> {
            if self.0.is_empty() {
                Ok(None)
            } else {
                Ok(Some(self.0.remove(0)))
            }
        }
    }

    #[test]
    fn illegal_rle_count_one_is_fatal() {
        let mut six = SliceSixBit(vec![1, 0x90, 0x01]);
        let mut rle = Rle90Source::new(&mut six);
        assert_eq!(rle.next_byte(), Ok(Some(1)));
        assert_eq!(rle.next_byte(), Err(ParseError::InvalidBitstream));
    }
}
