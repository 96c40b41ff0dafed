//! Growable output buffer shared by every decompressor.
//!
//! Wraps a `Vec<u8>` with the container's declared uncompressed length,
//! enforcing spec.md §8's "bounded output" invariant: a decoder must
//! produce exactly that many bytes, never more, never less.

use crate::error::ParseError;

pub struct GrowBuf {
    data: Vec<u8>,
    target_len: usize,
}

impl GrowBuf {
    pub fn with_target(target_len: usize) -> Self {
        GrowBuf {
            data: Vec::with_capacity(target_len.min(1 << 24)),
            target_len,
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn remaining(&self) -> usize {
        self.target_len.saturating_sub(self.data.len())
    }

    pub fn is_full(&self) -> bool {
        self.data.len() >= self.target_len
    }

    pub fn push(&mut self, byte: u8) -> Result<(), ParseError> {
        if self.data.len() >= self.target_len {
            return Err(ParseError::InvalidBitstream);
        }
        self.data.push(byte);
        Ok(())
    }

    pub fn extend_from_slice(&mut self, bytes: &[u8]) -> Result<(), ParseError> {
        if self.data.len() + bytes.len() > self.target_len {
            return Err(ParseError::InvalidBitstream);
        }
        self.data.extend_from_slice(bytes);
        Ok(())
    }

    pub fn get(&self, index: usize) -> Option<u8> {
        self.data.get(index).copied()
    }

    /// Copies `length` bytes starting `distance` bytes back from the
    /// current write position, one byte at a time so that
    /// `length > distance` overlaps (the usual LZ77-family self-referential
    /// copy) are honored correctly.
    pub fn copy_match(&mut self, distance: usize, length: usize) -> Result<(), ParseError> {
        if distance == 0 || distance > self.data.len() {
            return Err(ParseError::InvalidBitstream);
        }
        if self.data.len() + length > self.target_len {
            return Err(ParseError::InvalidBitstream);
        }
        let mut src = self.data.len() - distance;
        for _ in 0..length {
            let byte = self.data[src];
            self.data.push(byte);
            src += 1;
        }
        Ok(())
    }

    /// Finishes the buffer, failing if it was under-produced.
    pub fn finish(self) -> Result<Vec<u8>, ParseError> {
        if self.data.len() != self.target_len {
            return Err(ParseError::InvalidBitstream);
        }
        Ok(self.data)
    }

    /// Finishes without enforcing the exact-length invariant, for formats
    /// (e.g. Arsenic blocks) whose outer container does not declare a
    /// single target length up front.
    pub fn into_vec(self) -> Vec<u8> {
        self.data
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_overproduction() {
        let mut buf = GrowBuf::with_target(2);
        buf.push(1).unwrap();
        buf.push(2).unwrap();
        assert!(buf.push(3).is_err());
    }

    #[test]
    fn finish_rejects_underproduction() {
        let mut buf = GrowBuf::with_target(2);
        buf.push(1).unwrap();
        assert!(buf.finish().is_err());
    }

    #[test]
    fn overlapping_copy_match() {
        let mut buf = GrowBuf::with_target(5);
        buf.push(b'a').unwrap();
        buf.copy_match(1, 4).unwrap();
        assert_eq!(buf.finish().unwrap(), b"aaaaa");
    }
}
