//! MacBinary (`.bin`) decoder (spec.md §4.3).
//!
//! A fixed 128-byte header (versions I, II and III all share the same
//! byte layout; later versions only add meaning to previously-reserved
//! fields) followed by the data fork and resource fork, each padded with
//! NULs to a multiple of 128 bytes.

use crc::{Crc, CRC_16_XMODEM};

use crate::binary::read::{ReadBinary, ReadCtxt, ReadFrom, ReadScope};
use crate::binary::{NumFrom, U32Be};
use crate::{decode_filename, Entry, FileMetadata, FourCC, ParseError};

/// Finder flag bits masked on output: on-desk (0), color bit 0 (1),
/// has-no-inits (8), is-shared (9), requires-switch-launch (10).
const FLAG_MASK: u16 = !((1 << 0) | (1 << 1) | (1 << 8) | (1 << 9) | (1 << 10));

pub fn detect(data: &[u8]) -> bool {
    is_valid_header(data)
}

/// The single unified MacBinary header check (spec.md §4.3): byte 0 and
/// byte 74 are zero, byte 1 (the Pascal filename length) is in 1..=63,
/// and either the CRC-16/CCITT over bytes 0..=123 matches bytes 124..=125
/// or byte 82 is zero.
fn is_valid_header(data: &[u8]) -> bool {
    if data.len() < 128 || data[0] != 0 || data[74] != 0 {
        return false;
    }
    if !(1..=63).contains(&data[1]) {
        return false;
    }
    let crc = u16::from_be_bytes(data[124..][..2].try_into().unwrap());
    let crc_ok = crc == calc_crc(&data[..124]);
    crc_ok || data[82] == 0
}

/// Applies the fork-selection heuristic (spec.md §4.3): a resource-only
/// file whose name ends in `.sea.bin`-style double-wrapping yields the
/// resource fork (the actual payload lives there for self-extracting
/// archives with no useful data fork); otherwise the data fork is
/// returned, falling back to the resource fork if the data fork is
/// empty.
pub fn peel_wrapper(data: &[u8]) -> Result<Vec<u8>, ParseError> {
    let entry = peel_file(data)?;
    if entry.data_fork.is_empty() && !entry.resource_fork.is_empty() {
        Ok(entry.resource_fork)
    } else {
        Ok(entry.data_fork)
    }
}

pub fn peel_file(data: &[u8]) -> Result<Entry, ParseError> {
    if !is_valid_header(data) {
        return Err(ParseError::BadVersion);
    }
    let parsed = ReadScope::new(data).read::<MacBinary<'_>>()?;
    Ok(Entry {
        metadata: FileMetadata {
            filename: decode_filename(parsed.header.filename),
            file_type: parsed.header.file_type,
            file_creator: parsed.header.file_creator,
            finder_flags: ((u16::from(parsed.header.finder_flags) << 8)
                | u16::from(parsed.header.finder_flags2))
                & FLAG_MASK,
        },
        data_fork: parsed.data_fork.to_vec(),
        resource_fork: parsed.rsrc_fork.to_vec(),
    })
}

struct MacBinary<'a> {
    header: Header<'a>,
    data_fork: &'a [u8],
    rsrc_fork: &'a [u8],
}

struct Header<'a> {
    filename: &'a [u8],
    secondary_header_len: u16,
    data_fork_len: u32,
    rsrc_fork_len: u32,
    file_type: FourCC,
    file_creator: FourCC,
    finder_flags: u8,
    finder_flags2: u8,
}

impl ReadBinary for Header<'_> {
    type HostType<'a> = Header<'a>;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Self::HostType<'a>, ParseError> {
        let _ = ctxt.read_u8()?; // old version number, kept zero
        let filename_len = ctxt.read_u8()?;
        ctxt.check((1..=63).contains(&filename_len))?;
        let filename_data = ctxt.read_slice(63)?;
        let file_type = ctxt.read::<FourCC>()?;
        let file_creator = ctxt.read::<FourCC>()?;
        let finder_flags = ctxt.read_u8()?;
        let _ = ctxt.read_u8()?; // zero fill
        let _vpos = ctxt.read_u16be()?;
        let _hpos = ctxt.read_u16be()?;
        let _window_or_folder_id = ctxt.read_u16be()?;
        let _protected = ctxt.read_u8()?;
        let _ = ctxt.read_u8()?; // zero fill
        let data_fork_len = ctxt.read_u32be()?;
        let rsrc_fork_len = ctxt.read_u32be()?;
        let _created = ctxt.read_u32be()?;
        let _modified = ctxt.read_u32be()?;
        let _comment_len = ctxt.read_u16be()?;
        let finder_flags2 = ctxt.read_u8()?;
        let _signature = ctxt.read::<FourCC>()?;
        let _script = ctxt.read_u8()?;
        let _extended_finder_flags = ctxt.read_u8()?;
        let _ = ctxt.read_slice(8)?; // unused
        let _ = ctxt.read_u32be()?; // total unpacked length, never used
        let secondary_header_len = ctxt.read_u16be()?;
        let _version = ctxt.read_u8()?;
        let _min_version = ctxt.read_u8()?;
        let _crc = ctxt.read_u16be()?; // already validated by `is_valid_header`
        let _ = ctxt.read_u16be()?; // reserved for computer type/OS

        Ok(Header {
            filename: &filename_data[..usize::from(filename_len)],
            file_type,
            file_creator,
            finder_flags,
            data_fork_len,
            rsrc_fork_len,
            finder_flags2,
            secondary_header_len,
        })
    }
}

impl ReadBinary for MacBinary<'_> {
    type HostType<'a> = MacBinary<'a>;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Self::HostType<'a>, ParseError> {
        // The CRC-vs-byte-82 validity check already happened in
        // `is_valid_header`; nothing further to verify here.
        let header = ctxt.read::<Header<'_>>()?;

        let _ = ctxt.read_slice(usize::from(next_u16_multiple_of_128(
            header.secondary_header_len,
        )?))?;

        let data_fork = ctxt.read_slice(usize::num_from(header.data_fork_len))?;

        let padding = next_u32_multiple_of_128(header.data_fork_len)? - header.data_fork_len;
        let _ = ctxt.read_slice(usize::num_from(padding))?;

        let rsrc_fork = ctxt.read_slice(usize::num_from(header.rsrc_fork_len))?;

        Ok(MacBinary {
            header,
            data_fork,
            rsrc_fork,
        })
    }
}

impl ReadFrom for FourCC {
    type ReadType = U32Be;

    fn from(value: u32) -> Self {
        FourCC(value)
    }
}

fn next_u16_multiple_of_128(value: u16) -> Result<u16, ParseError> {
    let rem = value % 128;
    if rem == 0 {
        Ok(value)
    } else {
        value.checked_add(128 - rem).ok_or(ParseError::Overflow)
    }
}

fn next_u32_multiple_of_128(value: u32) -> Result<u32, ParseError> {
    let rem = value % 128;
    if rem == 0 {
        Ok(value)
    } else {
        value.checked_add(128 - rem).ok_or(ParseError::Overflow)
    }
}

fn calc_crc(data: &[u8]) -> u16 {
    let crc: Crc<u16> = Crc::<u16>::new(&CRC_16_XMODEM);
    crc.checksum(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build_bin(name: &str, file_type: [u8; 4], creator: [u8; 4], data: &[u8], rsrc: &[u8]) -> Vec<u8> {
        let mut header = vec![0u8; 128];
        header[1] = name.len() as u8;
        header[2..2 + name.len()].copy_from_slice(name.as_bytes());
        header[65..69].copy_from_slice(&file_type);
        header[69..73].copy_from_slice(&creator);
        header[83..87].copy_from_slice(&(data.len() as u32).to_be_bytes());
        header[87..91].copy_from_slice(&(rsrc.len() as u32).to_be_bytes());
        let crc = calc_crc(&header[..124]);
        header[124..126].copy_from_slice(&crc.to_be_bytes());

        let mut out = header;
        out.extend_from_slice(data);
        let pad = next_u32_multiple_of_128(data.len() as u32).unwrap() - data.len() as u32;
        out.extend(std::iter::repeat(0u8).take(pad as usize));
        out.extend_from_slice(rsrc);
        out
    }

    #[test]
    fn detects_macbinary_ii_via_crc() {
        let fixture = build_bin("x", *b"TEXT", *b"R*ch", b"hi", b"");
        assert!(detect(&fixture));
    }

    #[test]
    fn round_trips_metadata_and_forks() {
        let fixture = build_bin("Text File", *b"TEXT", *b"R*ch", b"This is a test file.\r", b"\x01\x02");
        let entry = peel_file(&fixture).unwrap();
        assert_eq!(entry.metadata.filename, "Text File");
        assert_eq!(entry.metadata.file_type, FourCC(u32::from_be_bytes(*b"TEXT")));
        assert_eq!(entry.data_fork, b"This is a test file.\r");
        assert_eq!(entry.resource_fork, b"\x01\x02");
    }

    #[test]
    fn fork_selection_prefers_resource_fork_when_data_fork_empty() {
        let fixture = build_bin("x", *b"APPL", *b"aol3", b"", b"resource-bytes");
        let peeled = peel_wrapper(&fixture).unwrap();
        assert_eq!(peeled, b"resource-bytes");
    }

    #[test]
    fn corrupt_crc_is_rejected_when_byte82_is_nonzero() {
        let mut fixture = build_bin("x", *b"TEXT", *b"R*ch", b"hi", b"");
        fixture[124] ^= 0xFF;
        fixture[82] = 1;
        assert!(!detect(&fixture));
        assert!(peel_file(&fixture).is_err());
    }

    #[test]
    fn corrupt_crc_is_accepted_when_byte82_is_zero() {
        // spec.md §4.3's validity check is an inclusive OR: a header
        // whose CRC doesn't match is still valid as long as byte 82 is
        // zero.
        let mut fixture = build_bin("x", *b"TEXT", *b"R*ch", b"hi", b"");
        fixture[124] ^= 0xFF;
        assert!(detect(&fixture));
    }

    #[test]
    fn matching_crc_is_accepted_even_with_nonzero_byte82() {
        let mut fixture = build_bin("x", *b"TEXT", *b"R*ch", b"hi", b"");
        fixture[82] = 1;
        assert!(detect(&fixture));
    }

    #[test]
    fn next_multiple_helpers() {
        assert_eq!(next_u16_multiple_of_128(0), Ok(0));
        assert_eq!(next_u16_multiple_of_128(3), Ok(128));
        assert_eq!(next_u32_multiple_of_128(129), Ok(256));
        assert_eq!(
            next_u16_multiple_of_128(u16::MAX - 3),
            Err(ParseError::Overflow)
        );
    }
}
