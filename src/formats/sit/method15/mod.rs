//! SIT compression method 15: Arsenic, an arithmetic-coded BWT pipeline
//! (spec.md §4.6).
//!
//! Self-integrity-checked (the stream carries its own end-of-stream and
//! CRC markers), so callers of [`decode`] skip the outer per-fork CRC
//! check that other methods require.

mod arith;
mod bwt;
mod tables;

use arith::{ArithDecoder, Model};

use crate::buffer::GrowBuf;
use crate::ParseError;

struct Mtf {
    table: Vec<u8>,
}

impl Mtf {
    fn new() -> Self {
        Mtf {
            table: (0..=255u8).collect(),
        }
    }

    fn decode(&mut self, index: usize) -> Result<u8, ParseError> {
        if index >= self.table.len() {
            return Err(ParseError::InvalidBitstream);
        }
        let byte = self.table[index];
        self.table.copy_within(0..index, 1);
        self.table[0] = byte;
        Ok(byte)
    }
}

struct RleState {
    prev: Option<u8>,
    streak: u32,
}

impl RleState {
    fn new() -> Self {
        RleState {
            prev: None,
            streak: 0,
        }
    }

    fn feed(&mut self, bytes: &[u8], out: &mut GrowBuf) -> Result<(), ParseError> {
        for &byte in bytes {
            if self.streak == 4 {
                let extra = byte;
                let prev = self.prev.ok_or(ParseError::InvalidBitstream)?;
                for _ in 0..extra {
                    out.push(prev)?;
                }
                self.streak = 0;
                continue;
            }
            out.push(byte)?;
            if self.prev == Some(byte) {
                self.streak += 1;
            } else {
                self.prev = Some(byte);
                self.streak = 1;
            }
        }
        Ok(())
    }
}

pub fn decode(data: &[u8], raw_len: usize) -> Result<Vec<u8>, ParseError> {
    let mut coder = ArithDecoder::new(data)?;
    let mut primary = Model::new(2, 1, 256);

    let a = coder.decode_bits(&mut primary, 8)? as u8;
    let s = coder.decode_bits(&mut primary, 8)? as u8;
    if a != b'A' || s != b's' {
        return Err(ParseError::BadSignature);
    }
    let block_exp = coder.decode_bits(&mut primary, 4)?;
    let block_capacity = 1usize << (block_exp + 9);
    let index_bits = block_exp + 9;
    let mut end_of_stream = coder.decode_bits(&mut primary, 1)? != 0;

    let mut out = GrowBuf::with_target(raw_len);
    let mut rle = RleState::new();

    while !end_of_stream {
        let block_bytes = decode_block(&mut coder, &mut primary, block_capacity, index_bits)?;
        rle.feed(&block_bytes, &mut out)?;

        if coder.decode_bits(&mut primary, 1)? != 0 {
            let _crc = coder.decode_bits(&mut primary, 32)?;
            end_of_stream = true;
        }

        if out.is_full() {
            break;
        }
        if end_of_stream {
            return Err(ParseError::Truncated);
        }
    }

    out.finish()
}

fn decode_block(
    coder: &mut ArithDecoder,
    primary: &mut Model,
    block_capacity: usize,
    index_bits: u32,
) -> Result<Vec<u8>, ParseError> {
    let randomized = coder.decode_bits(primary, 1)? != 0;
    let primary_index = coder.decode_bits(primary, index_bits)? as usize;

    let mut selector_model = Model::new(11, 8, 1024);
    let mut group_models: Vec<Model> = tables::GROUP_SIZES
        .iter()
        .zip(tables::GROUP_STEPS.iter())
        .map(|(&size, &step)| Model::new(size, step, 1024))
        .collect();
    let mut mtf = Mtf::new();

    let mut block: Vec<u8> = Vec::new();
    let mut selector = coder.decode(&mut selector_model)?;

    loop {
        if selector == 10 {
            break;
        }
        if selector < 2 {
            let mut total: u32 = 0;
            let mut p: u32 = 0;
            loop {
                total += (selector as u32 + 1) << p;
                p += 1;
                if block.len() + total as usize > block_capacity {
                    return Err(ParseError::InvalidBitstream);
                }
                selector = coder.decode(&mut selector_model)?;
                if selector >= 2 {
                    break;
                }
            }
            let byte = mtf.decode(0)?;
            for _ in 0..total {
                block.push(byte);
            }
            continue;
        }

        let index = if selector == 2 {
            1
        } else {
            let g = (selector - 3) as usize;
            let v = coder.decode(&mut group_models[g])?;
            tables::GROUP_LOW[g] + v
        };
        let byte = mtf.decode(index)?;
        if block.len() >= block_capacity {
            return Err(ParseError::InvalidBitstream);
        }
        block.push(byte);
        selector = coder.decode(&mut selector_model)?;
    }

    let transformed = bwt::inverse(&block, primary_index)?;

    if randomized {
        Ok(derandomize(&transformed))
    } else {
        Ok(transformed)
    }
}

/// Undoes the position-scrambling XOR walk over `tables::RANDOM_TABLE`
/// (spec.md §4.6 "Randomization").
fn derandomize(data: &[u8]) -> Vec<u8> {
    let mut out = data.to_vec();
    let mut table_index = 0usize;
    let mut next_scramble = usize::from(tables::RANDOM_TABLE[0]);
    for (i, byte) in out.iter_mut().enumerate() {
        if i == next_scramble {
            *byte ^= 1;
            table_index = (table_index + 1) % tables::RANDOM_TABLE.len();
            next_scramble += usize::from(tables::RANDOM_TABLE[table_index]);
        }
    }
    out
}
