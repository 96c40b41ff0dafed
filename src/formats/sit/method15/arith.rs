//! Arithmetic decoder and adaptive frequency models for Arsenic
//! (spec.md §4.6 "Arithmetic coder" / "Models").

use crate::bitstream::MsbBitReader;
use crate::ParseError;

const PRECISION: u32 = 26;
const ONE: u32 = 1 << 25;
const HALF: u32 = 1 << 24;

/// An adaptive frequency model over a fixed symbol count.
pub struct Model {
    freq: Vec<u32>,
    total: u32,
    step: u32,
    ceiling: u32,
}

impl Model {
    pub fn new(symbols: usize, step: u32, ceiling: u32) -> Self {
        Model {
            freq: vec![1; symbols],
            total: symbols as u32,
            step,
            ceiling,
        }
    }

    fn find(&self, target: u32) -> Result<(usize, u32, u32), ParseError> {
        let mut cum = 0u32;
        for (i, &f) in self.freq.iter().enumerate() {
            if target < cum + f {
                return Ok((i, cum, f));
            }
            cum += f;
        }
        Err(ParseError::InvalidBitstream)
    }

    fn bump(&mut self, symbol: usize) {
        self.freq[symbol] += self.step;
        self.total += self.step;
        if self.total > self.ceiling {
            self.total = 0;
            for f in self.freq.iter_mut() {
                *f = (*f + 1) >> 1;
                self.total += *f;
            }
        }
    }
}

pub struct ArithDecoder<'a> {
    bits: MsbBitReader<'a>,
    range: u32,
    code: u32,
}

impl<'a> ArithDecoder<'a> {
    pub fn new(data: &'a [u8]) -> Result<Self, ParseError> {
        let mut bits = MsbBitReader::new(data);
        let code = bits.read_bits(PRECISION)?;
        Ok(ArithDecoder {
            bits,
            range: ONE,
            code,
        })
    }

    /// Decodes one symbol against `model`, narrowing the range and
    /// updating the model's adaptive frequencies.
    pub fn decode(&mut self, model: &mut Model) -> Result<usize, ParseError> {
        if model.total == 0 {
            return Err(ParseError::InvalidBitstream);
        }
        let scale = self.range / model.total;
        let target = (self.code / scale).min(model.total - 1);
        let (symbol, lo, freq) = model.find(target)?;
        let hi = lo + freq;
        self.code -= scale * lo;
        if hi == model.total {
            self.range -= scale * lo;
        } else {
            self.range = freq * scale;
        }
        while self.range <= HALF {
            self.range <<= 1;
            let bit = self.bits.read_bit()?;
            self.code = (self.code << 1) | bit;
        }
        model.bump(symbol);
        Ok(symbol)
    }

    /// Decodes `n` sequential binary decisions against a 2-symbol model,
    /// MSB-first, used to pull multi-bit fields out of the persistent
    /// model (spec.md §4.6 "Stream header" / "Block decode").
    pub fn decode_bits(&mut self, model: &mut Model, n: u32) -> Result<u32, ParseError> {
        let mut value = 0u32;
        for _ in 0..n {
            let bit = self.decode(model)? as u32;
            value = (value << 1) | bit;
        }
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_renormalizes_past_ceiling() {
        let mut m = Model::new(2, 500, 1000);
        m.bump(0);
        assert!(m.total <= 1000);
    }
}
