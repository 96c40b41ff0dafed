//! Sidecar file format: a small fixed-layout container for handing a
//! resource fork and Finder metadata to a consumer that has nowhere
//! else to put them (spec.md §6 "Sidecar format").
//!
//! This is a pure serializer — there is no reader, since sidecars are
//! written by this crate's caller and consumed by whatever external
//! tool understands the layout.

use crate::FileMetadata;

const MAGIC: u32 = 0x0005_1607;
const VERSION: u32 = 0x0002_0000;
const HEADER_LEN: u32 = 26;
const DESCRIPTOR_LEN: u32 = 12;
const FINDER_BLOCK_LEN: u32 = 32;

const ENTRY_ID_RESOURCE: u32 = 2;
const ENTRY_ID_FINDER: u32 = 9;

/// Builds a sidecar file carrying `metadata`'s Finder info and
/// `resource_fork`'s bytes, in the two-entry layout spec.md describes:
/// a 26-byte header, two 12-byte descriptors, a 32-byte Finder info
/// block, then the resource fork payload.
pub fn build(metadata: &FileMetadata, resource_fork: &[u8]) -> Vec<u8> {
    let finder_offset = HEADER_LEN + 2 * DESCRIPTOR_LEN;
    let resource_offset = finder_offset + FINDER_BLOCK_LEN;

    let mut out = Vec::with_capacity(resource_offset as usize + resource_fork.len());

    out.extend_from_slice(&MAGIC.to_be_bytes());
    out.extend_from_slice(&VERSION.to_be_bytes());
    out.extend_from_slice(&[0u8; 16]);
    out.extend_from_slice(&2u16.to_be_bytes());

    out.extend_from_slice(&ENTRY_ID_FINDER.to_be_bytes());
    out.extend_from_slice(&finder_offset.to_be_bytes());
    out.extend_from_slice(&FINDER_BLOCK_LEN.to_be_bytes());

    out.extend_from_slice(&ENTRY_ID_RESOURCE.to_be_bytes());
    out.extend_from_slice(&resource_offset.to_be_bytes());
    out.extend_from_slice(&(resource_fork.len() as u32).to_be_bytes());

    out.extend_from_slice(&metadata.file_type.0.to_be_bytes());
    out.extend_from_slice(&metadata.file_creator.0.to_be_bytes());
    out.extend_from_slice(&metadata.finder_flags.to_be_bytes());
    out.extend_from_slice(&[0u8; 22]);

    out.extend_from_slice(resource_fork);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FourCC;

    #[test]
    fn header_and_descriptors_are_laid_out_as_specified() {
        let metadata = FileMetadata {
            filename: "x".into(),
            file_type: FourCC(u32::from_be_bytes(*b"TEXT")),
            file_creator: FourCC(u32::from_be_bytes(*b"R*ch")),
            finder_flags: 0x1234,
        };
        let sidecar = build(&metadata, b"resource-bytes");

        assert_eq!(&sidecar[0..4], &MAGIC.to_be_bytes());
        assert_eq!(&sidecar[4..8], &VERSION.to_be_bytes());
        assert_eq!(&sidecar[8..24], &[0u8; 16]);
        assert_eq!(&sidecar[24..26], &2u16.to_be_bytes());

        assert_eq!(&sidecar[26..30], &ENTRY_ID_FINDER.to_be_bytes());
        assert_eq!(&sidecar[30..34], &50u32.to_be_bytes());
        assert_eq!(&sidecar[34..38], &32u32.to_be_bytes());

        assert_eq!(&sidecar[38..42], &ENTRY_ID_RESOURCE.to_be_bytes());
        assert_eq!(&sidecar[42..46], &82u32.to_be_bytes());
        assert_eq!(&sidecar[46..50], &14u32.to_be_bytes());

        assert_eq!(&sidecar[50..54], b"TEXT");
        assert_eq!(&sidecar[54..58], b"R*ch");
        assert_eq!(&sidecar[58..60], &0x1234u16.to_be_bytes());
        assert_eq!(&sidecar[60..82], &[0u8; 22]);

        assert_eq!(&sidecar[82..], b"resource-bytes");
    }

    #[test]
    fn empty_resource_fork_still_produces_valid_descriptors() {
        let metadata = FileMetadata::default();
        let sidecar = build(&metadata, &[]);
        assert_eq!(sidecar.len(), 82);
    }
}
