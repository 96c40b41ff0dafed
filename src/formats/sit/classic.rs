//! Classic StuffIt archive layout: a 22-byte header followed by a flat
//! sequence of 112-byte entry headers, each immediately followed by its
//! resource and data fork payloads (spec.md §4.4 "Classic iteration").

use crate::{decode_filename, Entry, FileMetadata, FourCC, ParseError, PeelLimits};

pub const SIGNATURES: [[u8; 4]; 9] = [
    *b"SIT!", *b"ST46", *b"ST50", *b"ST60", *b"ST65", *b"STin", *b"STi2", *b"STi3", *b"STi4",
];

const HEADER_LEN: usize = 22;
const ENTRY_HEADER_LEN: usize = 112;
const MAX_FOLDER_DEPTH: usize = 10;
const SKIP_MASK: u8 = 0xE0;
const FOLDER_OPEN: u8 = 0x20;
const FOLDER_CLOSE: u8 = 0x21;

/// Returns the offset of the earliest classic-SIT signature match, if
/// `rLau` also appears at `offset + 10`.
pub fn find(data: &[u8]) -> Option<usize> {
    if data.len() < HEADER_LEN {
        return None;
    }
    (0..=data.len() - HEADER_LEN).find(|&o| {
        SIGNATURES.iter().any(|sig| &data[o..o + 4] == sig) && &data[o + 10..o + 14] == b"rLau"
    })
}

pub fn parse(data: &[u8], offset: usize, limits: &PeelLimits) -> Result<Vec<Entry>, ParseError> {
    let entry_count = u16::from_be_bytes(
        data.get(offset + 4..offset + 6)
            .ok_or(ParseError::BadEof)?
            .try_into()
            .unwrap(),
    ) as usize;
    if entry_count > limits.max_entries {
        return Err(ParseError::TooManyEntries);
    }

    let mut entries = Vec::new();
    let mut folder_stack: Vec<String> = Vec::new();
    let mut cursor = offset + HEADER_LEN;

    for _ in 0..entry_count {
        let header = data
            .get(cursor..cursor + ENTRY_HEADER_LEN)
            .ok_or(ParseError::Truncated)?;
        let rsrc_method = header[0];
        let data_method = header[1];

        if rsrc_method == FOLDER_OPEN || data_method == FOLDER_OPEN {
            let name_len = usize::from(header[2]);
            let name = decode_filename(&header[3..3 + name_len.min(63)]);
            if folder_stack.len() >= MAX_FOLDER_DEPTH {
                return Err(ParseError::TooDeep);
            }
            folder_stack.push(name);
            cursor += ENTRY_HEADER_LEN;
            continue;
        }
        if rsrc_method == FOLDER_CLOSE || data_method == FOLDER_CLOSE {
            folder_stack.pop();
            cursor += ENTRY_HEADER_LEN;
            continue;
        }

        let name_len = usize::from(header[2]).min(63);
        let name = decode_filename(&header[3..3 + name_len]);
        let file_type = FourCC(u32::from_be_bytes(header[66..70].try_into().unwrap()));
        let file_creator = FourCC(u32::from_be_bytes(header[70..74].try_into().unwrap()));
        let finder_flags = u16::from_be_bytes(header[74..76].try_into().unwrap());
        let rsrc_raw_len = u32::from_be_bytes(header[84..88].try_into().unwrap());
        let data_raw_len = u32::from_be_bytes(header[88..92].try_into().unwrap());
        let rsrc_compressed_len = u32::from_be_bytes(header[92..96].try_into().unwrap()) as usize;
        let data_compressed_len = u32::from_be_bytes(header[96..100].try_into().unwrap()) as usize;
        let rsrc_crc = u16::from_be_bytes(header[100..102].try_into().unwrap());
        let data_crc = u16::from_be_bytes(header[102..104].try_into().unwrap());

        let fork_start = cursor + ENTRY_HEADER_LEN;
        let rsrc_payload = data
            .get(fork_start..fork_start + rsrc_compressed_len)
            .ok_or(ParseError::Truncated)?;
        let data_start = fork_start + rsrc_compressed_len;
        let data_payload = data
            .get(data_start..data_start + data_compressed_len)
            .ok_or(ParseError::Truncated)?;
        cursor = data_start + data_compressed_len;

        let skipped_marker = data_raw_len == u32::MAX || rsrc_raw_len == u32::MAX;
        let skip_emit = skipped_marker || rsrc_method & SKIP_MASK != 0 || data_method & SKIP_MASK != 0;
        if skip_emit {
            continue;
        }

        let filename = if folder_stack.is_empty() {
            name
        } else {
            format!("{}/{}", folder_stack.join("/"), name)
        };
        if filename.len() > limits.max_path_len {
            return Err(ParseError::PathTooLong);
        }

        let resource_fork = super::decompress_fork(
            rsrc_method & 0x0F,
            rsrc_payload,
            rsrc_raw_len as usize,
            rsrc_crc,
        )?;
        let data_fork = super::decompress_fork(
            data_method & 0x0F,
            data_payload,
            data_raw_len as usize,
            data_crc,
        )?;

        entries.push(Entry {
            metadata: FileMetadata {
                filename,
                file_type,
                file_creator,
                finder_flags,
            },
            data_fork,
            resource_fork,
        });
    }

    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_signature_with_rlau_marker() {
        let mut data = vec![0u8; 22];
        data[0..4].copy_from_slice(b"SIT!");
        data[10..14].copy_from_slice(b"rLau");
        assert_eq!(find(&data), Some(0));
    }

    #[test]
    fn rejects_signature_without_rlau() {
        let mut data = vec![0u8; 22];
        data[0..4].copy_from_slice(b"SIT!");
        assert_eq!(find(&data), None);
    }
}
