//! Compact Pro archive support: a trailer-referenced directory tree over
//! a two-stage (LZH-then-RLE) fork pipeline (spec.md §4.7).

mod lzh;
mod rle;

use crate::{decode_filename, Entry, FileMetadata, FourCC, ParseError, PeelLimits};

const MAGIC: u8 = 0x01;
const SINGLE_VOLUME: u8 = 0x01;
const MAX_DIR_OFFSET: u32 = 256 * 1024 * 1024;

const FLAG_ENCRYPTED: u16 = 1 << 0;
const FLAG_RSRC_LZH: u16 = 1 << 1;
const FLAG_DATA_LZH: u16 = 1 << 2;
const DIR_ENTRY_BIT: u8 = 0x80;

pub fn detect(data: &[u8]) -> bool {
    directory_offset(data).is_some()
}

fn directory_offset(data: &[u8]) -> Option<usize> {
    if data.len() < 8 || data[0] != MAGIC || data[1] != SINGLE_VOLUME {
        return None;
    }
    let offset = u32::from_be_bytes(data[4..8].try_into().ok()?);
    if offset < 8 || offset >= MAX_DIR_OFFSET {
        return None;
    }
    let offset = offset as usize;
    if offset >= data.len() {
        return None;
    }
    Some(offset)
}

pub fn peel(data: &[u8], limits: &PeelLimits) -> Result<Vec<Entry>, ParseError> {
    let dir_offset = directory_offset(data).ok_or(ParseError::BadSignature)?;

    // 4-byte CRC at the directory start is stored but never validated
    // (spec.md §4.7 "Directory").
    let total_entries =
        u16::from_be_bytes(data.get(dir_offset + 4..dir_offset + 6).ok_or(ParseError::BadEof)?.try_into().unwrap())
            as usize;
    if total_entries > limits.max_entries {
        return Err(ParseError::TooManyEntries);
    }
    let comment_len = usize::from(*data.get(dir_offset + 6).ok_or(ParseError::BadEof)?);
    let mut cursor = dir_offset + 7 + comment_len;

    let mut entries = Vec::new();
    let mut remaining = total_entries;
    walk(data, &mut cursor, &mut remaining, "", 0, &mut entries, limits)?;
    Ok(entries)
}

#[allow(clippy::too_many_arguments)]
fn walk(
    data: &[u8],
    cursor: &mut usize,
    remaining: &mut usize,
    prefix: &str,
    depth: usize,
    entries: &mut Vec<Entry>,
    limits: &PeelLimits,
) -> Result<(), ParseError> {
    if depth > 32 {
        return Err(ParseError::TooDeep);
    }
    while *remaining > 0 {
        *remaining -= 1;
        let name_len_byte = *data.get(*cursor).ok_or(ParseError::Truncated)?;
        let is_dir = name_len_byte & DIR_ENTRY_BIT != 0;
        let name_len = usize::from(name_len_byte & !DIR_ENTRY_BIT);
        *cursor += 1;
        let name = decode_filename(
            data.get(*cursor..*cursor + name_len)
                .ok_or(ParseError::Truncated)?,
        );
        *cursor += name_len;

        let path = if prefix.is_empty() {
            name
        } else {
            format!("{prefix}/{name}")
        };
        if path.len() > limits.max_path_len {
            return Err(ParseError::PathTooLong);
        }

        if is_dir {
            let child_count = u16::from_be_bytes(
                data.get(*cursor..*cursor + 2)
                    .ok_or(ParseError::Truncated)?
                    .try_into()
                    .unwrap(),
            ) as usize;
            *cursor += 2;
            let mut child_remaining = child_count;
            walk(data, cursor, &mut child_remaining, &path, depth + 1, entries, limits)?;
            if *remaining < child_count {
                return Err(ParseError::TooManyEntries);
            }
            *remaining -= child_count;
            continue;
        }

        // Volume(1), file offset(4), type(4), creator(4), create date(4),
        // modify date(4), Finder flags(2), data CRC(4, unverified),
        // flags(2), resource raw(4), data raw(4), resource compressed(4),
        // data compressed(4) = 45 bytes (spec.md §4.7 "File entry fields").
        let field = data.get(*cursor..*cursor + 45).ok_or(ParseError::Truncated)?;
        let file_offset = u32::from_be_bytes(field[1..5].try_into().unwrap()) as usize;
        let file_type = FourCC(u32::from_be_bytes(field[5..9].try_into().unwrap()));
        let file_creator = FourCC(u32::from_be_bytes(field[9..13].try_into().unwrap()));
        let finder_flags = u16::from_be_bytes(field[21..23].try_into().unwrap());
        // field[23..27] data CRC: stored but never verified.
        let flags = u16::from_be_bytes(field[27..29].try_into().unwrap());
        let rsrc_raw_len = u32::from_be_bytes(field[29..33].try_into().unwrap()) as usize;
        let data_raw_len = u32::from_be_bytes(field[33..37].try_into().unwrap()) as usize;
        let rsrc_compressed_len = u32::from_be_bytes(field[37..41].try_into().unwrap()) as usize;
        let data_compressed_len = u32::from_be_bytes(field[41..45].try_into().unwrap()) as usize;
        *cursor += 45;

        if flags & FLAG_ENCRYPTED != 0 {
            return Err(ParseError::Encrypted);
        }

        let rsrc_payload = data
            .get(file_offset..file_offset + rsrc_compressed_len)
            .ok_or(ParseError::Truncated)?;
        let data_start = file_offset + rsrc_compressed_len;
        let data_payload = data
            .get(data_start..data_start + data_compressed_len)
            .ok_or(ParseError::Truncated)?;

        let resource_fork = decode_fork(rsrc_payload, rsrc_raw_len, flags & FLAG_RSRC_LZH != 0)?;
        let data_fork = decode_fork(data_payload, data_raw_len, flags & FLAG_DATA_LZH != 0)?;

        entries.push(Entry {
            metadata: FileMetadata {
                filename: path,
                file_type,
                file_creator,
                finder_flags,
            },
            data_fork,
            resource_fork,
        });
    }
    Ok(())
}

/// RLE always runs; LZH, when the entry's flag asks for it, runs first
/// against a buffer whose length is not independently known up front,
/// so it is decoded to completion before RLE is applied (spec.md §4.7
/// "Fork pipeline").
fn decode_fork(payload: &[u8], raw_len: usize, is_lzh: bool) -> Result<Vec<u8>, ParseError> {
    if !is_lzh {
        return rle::decode(payload, raw_len);
    }
    // The LZH stage's own output length is whatever RLE needs as input;
    // it is bounded only by its canonical-Huffman block framing, so we
    // let it grow without a declared target and feed the result to RLE.
    let rle_input = lzh::decode_unbounded(payload)?;
    rle::decode(&rle_input, raw_len)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detect_rejects_missing_magic() {
        assert!(!detect(&[0u8; 16]));
    }

    #[test]
    fn detect_rejects_out_of_range_directory_offset() {
        let mut data = vec![0u8; 16];
        data[0] = MAGIC;
        data[1] = SINGLE_VOLUME;
        data[4..8].copy_from_slice(&4u32.to_be_bytes());
        assert!(!detect(&data));
    }

    #[test]
    fn detect_accepts_plausible_header() {
        let mut data = vec![0u8; 16];
        data[0] = MAGIC;
        data[1] = SINGLE_VOLUME;
        data[4..8].copy_from_slice(&8u32.to_be_bytes());
        assert!(detect(&data));
    }

    #[test]
    fn full_archive_round_trip_single_file() {
        use crate::test_support::{be16, be32, pascal};

        let mut data = Vec::new();
        data.push(MAGIC);
        data.push(SINGLE_VOLUME);
        data.extend_from_slice(&[0, 0]); // reserved
        data.extend_from_slice(&be32(10)); // directory offset
        data.extend_from_slice(b"hi"); // fork payload, stored at offset 8

        data.extend_from_slice(&be32(0)); // directory CRC, unchecked
        data.extend_from_slice(&be16(1)); // entry count
        data.push(0); // comment length

        let name = pascal("abc");
        data.push(name[0]);
        data.extend_from_slice(&name[1..]);

        let mut field = vec![0u8; 45];
        field[1..5].copy_from_slice(&be32(8)); // file offset
        field[33..37].copy_from_slice(&be32(2)); // data raw length
        field[41..45].copy_from_slice(&be32(2)); // data compressed length
        data.extend_from_slice(&field);

        let entries = peel(&data, &PeelLimits::default()).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].metadata.filename, "abc");
        assert_eq!(entries[0].data_fork, b"hi");
        assert!(entries[0].resource_fork.is_empty());
    }
}
