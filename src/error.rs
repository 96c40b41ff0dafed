//! Error types

use core::fmt;

use crate::binary::read::ReadEof;

/// Errors that originate when parsing or decompressing one of the
/// supported archive/transport formats.
#[derive(Clone, Eq, PartialEq, Debug)]
pub enum ParseError {
    /// EOF was reached unexpectedly
    BadEof,
    /// A value was outside the expected range
    BadValue,
    /// A version field contained an unsupported version
    BadVersion,
    /// An offset was outside allowed bounds
    BadOffset,
    /// An index was outside the valid range
    BadIndex,
    /// A value overflowed its storage type
    Overflow,
    /// CRC did not match expected value
    CrcMismatch,
    /// Input too short to hold the format's header
    Truncated,
    /// Signature / magic bytes did not match any known format
    BadSignature,
    /// A compressed bitstream contained an undefined symbol, ran out of
    /// input early, or otherwise violated its own encoding rules
    InvalidBitstream,
    /// The input exercises a feature this decoder intentionally does not
    /// implement (an unknown compression method, an encrypted entry, a
    /// multi-volume archive, ...)
    UnsupportedFeature,
    /// An entry is encrypted and cannot be decoded
    Encrypted,
    /// Wrapper-unwrap recursion exceeded its configured depth cap
    TooDeep,
    /// A stored offset points outside the bounds of the input buffer
    OffsetOutOfRange,
    /// An archive claims more entries than the configured limit allows
    TooManyEntries,
    /// A reconstructed path exceeds the configured maximum length
    PathTooLong,
}

impl From<ReadEof> for ParseError {
    fn from(_error: ReadEof) -> Self {
        ParseError::BadEof
    }
}

impl From<core::num::TryFromIntError> for ParseError {
    fn from(_error: core::num::TryFromIntError) -> Self {
        ParseError::BadValue
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::BadEof => write!(f, "end of data reached unexpectedly"),
            ParseError::BadValue => write!(f, "invalid value"),
            ParseError::BadVersion => write!(f, "unexpected data version"),
            ParseError::BadOffset => write!(f, "invalid data offset"),
            ParseError::BadIndex => write!(f, "invalid data index"),
            ParseError::Overflow => write!(f, "a value overflowed its range"),
            ParseError::CrcMismatch => write!(f, "CRC mismatch"),
            ParseError::Truncated => write!(f, "input too short for declared content"),
            ParseError::BadSignature => write!(f, "signature did not match a known format"),
            ParseError::InvalidBitstream => write!(f, "invalid compressed bitstream"),
            ParseError::UnsupportedFeature => write!(f, "unsupported feature"),
            ParseError::Encrypted => write!(f, "entry is encrypted"),
            ParseError::TooDeep => write!(f, "wrapper recursion exceeded depth limit"),
            ParseError::OffsetOutOfRange => write!(f, "offset out of range"),
            ParseError::TooManyEntries => write!(f, "too many entries"),
            ParseError::PathTooLong => write!(f, "path too long"),
        }
    }
}

impl std::error::Error for ParseError {}
