//! Extracts the contents of classic Macintosh archive and
//! transport-encoding files.
//!
//! Four formats are supported: BinHex 4.0 (`.hqx`), MacBinary (`.bin`),
//! StuffIt (`.sit`, both the classic and SIT5 layouts) and Compact Pro
//! (`.cpt`). Inputs may be nested — an archive wrapped in a transport
//! encoding — and [`peel`] automatically strips every layer it can
//! identify, recursing into any archive entry whose data fork is itself
//! detected as a transport encoding.
//!
//! ### References
//!
//! - [BinHex 4.0](https://files.stairways.com/other/binhex-40-specs-info.txt)
//! - [MacBinary](https://web.archive.org/web/20050305042909/http://www.lazerware.com/formats/macbinary/macbinary_ii.html)
//! - [StuffIt](https://www.fileformat.info/format/stuffit/egff.htm)
//! - [Compact Pro](https://www.fileformat.info/format/cpt/egff.htm)

use core::fmt::{self, Display, Formatter};

use crate::macroman::FromMacRoman;

pub(crate) mod binary;
pub mod bitstream;
pub(crate) mod buffer;
pub(crate) mod crc;
pub mod error;
pub mod formats;
pub mod huffman;
pub(crate) mod macroman;
pub mod sidecar;
#[cfg(test)]
pub(crate) mod test_support;

pub use crate::error::ParseError;
pub use crate::formats::{Format, FormatKind};

/// A four-character code.
///
/// A 32-bit number that typically holds 4 8-bit ASCII characters, used
/// for type and creator codes. Eg. 'TEXT', 'R*ch', 'APPL'.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Default)]
pub struct FourCC(pub u32);

impl Display for FourCC {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let bytes = self.0.to_be_bytes();
        if bytes.iter().all(|c| c.is_ascii() && !c.is_ascii_control()) {
            let s = core::str::from_utf8(&bytes).unwrap(); // safe: checked above
            s.fmt(f)
        } else {
            write!(f, "0x{:08x}", self.0)
        }
    }
}

/// Fixed-format Finder metadata carried by every extracted entry.
#[derive(Debug, Clone, Default)]
pub struct FileMetadata {
    /// Decoded filename, up to 255 bytes.
    pub filename: String,
    /// The Mac type code (e.g. 'TEXT').
    pub file_type: FourCC,
    /// The Mac creator code (e.g. 'R*ch').
    pub file_creator: FourCC,
    /// Finder flag bits, already masked per-format as spec.md directs.
    pub finder_flags: u16,
}

/// One file extracted from an archive or transport encoding: its
/// metadata plus its two forks. Either fork may be empty.
#[derive(Debug, Clone, Default)]
pub struct Entry {
    pub metadata: FileMetadata,
    pub data_fork: Vec<u8>,
    pub resource_fork: Vec<u8>,
}

/// Resource limits enforced while peeling, guarding against pathological
/// or adversarial inputs (spec.md §7 "Resource limit").
#[derive(Debug, Copy, Clone)]
pub struct PeelLimits {
    /// Maximum number of wrapper layers `peel` will strip before giving
    /// up and wrapping the remaining buffer as a single unnamed entry.
    pub max_unwrap_depth: u32,
    /// Maximum number of entries an archive may declare.
    pub max_entries: usize,
    /// Maximum length, in bytes, of a reconstructed entry path.
    pub max_path_len: usize,
}

impl Default for PeelLimits {
    fn default() -> Self {
        PeelLimits {
            max_unwrap_depth: 32,
            max_entries: 4096,
            max_path_len: 255,
        }
    }
}

/// Determines which format, if any, `data` looks like.
///
/// Wrappers are probed before archives, so that an archive signature
/// nested inside a transport encoding is not mistaken for the outer
/// format (spec.md §4.1).
pub fn detect(data: &[u8]) -> Option<Format> {
    formats::detect(data)
}

/// Peels every wrapper and archive layer from `data`, using the default
/// [`PeelLimits`].
pub fn peel(data: &[u8]) -> Result<Vec<Entry>, ParseError> {
    peel_with_limits(data, &PeelLimits::default())
}

/// Peels every wrapper and archive layer from `data`.
pub fn peel_with_limits(data: &[u8], limits: &PeelLimits) -> Result<Vec<Entry>, ParseError> {
    formats::peel(data, limits)
}

/// Strips the BinHex 4.0 envelope, 6-bit encoding and RLE90 layer, and
/// the fork/CRC framing, returning the data fork.
pub fn peel_hqx(data: &[u8]) -> Result<Vec<u8>, ParseError> {
    formats::hqx::peel_wrapper(data)
}

/// Decodes a BinHex 4.0 file fully, returning metadata and both forks.
pub fn peel_hqx_file(data: &[u8]) -> Result<Entry, ParseError> {
    formats::hqx::peel_file(data)
}

/// Decodes a MacBinary container, applying the fork-selection heuristic
/// (spec.md §4.3) appropriate for feeding the result to a downstream
/// stage.
pub fn peel_bin(data: &[u8]) -> Result<Vec<u8>, ParseError> {
    formats::bin::peel_wrapper(data)
}

/// Decodes a MacBinary container fully, returning metadata and both
/// forks untouched by the fork-selection heuristic.
pub fn peel_bin_file(data: &[u8]) -> Result<Entry, ParseError> {
    formats::bin::peel_file(data)
}

/// Extracts every entry from a StuffIt archive (classic or SIT5).
pub fn peel_sit(data: &[u8]) -> Result<Vec<Entry>, ParseError> {
    formats::sit::peel(data, &PeelLimits::default())
}

/// Extracts every entry from a Compact Pro archive.
pub fn peel_cpt(data: &[u8]) -> Result<Vec<Entry>, ParseError> {
    formats::cpt::peel(data, &PeelLimits::default())
}

/// Converts a classic Mac OS Roman, NUL/length-prefixed byte slice into
/// a `String`, used for filenames across every format.
pub(crate) fn decode_filename(bytes: &[u8]) -> String {
    String::from_macroman(bytes)
}
