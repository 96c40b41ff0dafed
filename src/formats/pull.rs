//! Pull-based byte-source composition (spec.md §9): each decoder stage
//! exposes "produce the next byte" and owns a reference to its upstream
//! stage, so that e.g. HQX's envelope → 6-bit → RLE90 chain, or CPT's
//! LZH → RLE chain, never materializes an intermediate buffer of the
//! whole compressed stream.

use crate::error::ParseError;

pub trait ByteSource {
    fn next_byte(&mut self) -> Result<Option<u8>, ParseError>;

    fn read_exact(&mut self, n: usize) -> Result<Vec<u8>, ParseError> {
        let mut buf = Vec::with_capacity(n);
        for _ in 0..n {
            match self.next_byte()? {
                Some(b) => buf.push(b),
                None => return Err(ParseError::Truncated),
            }
        }
        Ok(buf)
    }

    fn read_u8(&mut self) -> Result<u8, ParseError> {
        self.next_byte()?.ok_or(ParseError::Truncated)
    }

    fn read_u16be(&mut self) -> Result<u16, ParseError> {
        let b = self.read_exact(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    fn read_u32be(&mut self) -> Result<u32, ParseError> {
        let b = self.read_exact(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }
}

/// A `ByteSource` over an already-materialized slice, the base case for
/// any pull-based chain.
pub struct SliceSource<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> SliceSource<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        SliceSource { data, pos: 0 }
    }
}

impl<'a> ByteSource for SliceSource<'a> {
    fn next_byte(&mut self) -> Result<Option<u8>, ParseError> {
        if self.pos < self.data.len() {
            let b = self.data[self.pos];
            self.pos += 1;
            Ok(Some(b))
        } else {
            Ok(None)
        }
    }
}
