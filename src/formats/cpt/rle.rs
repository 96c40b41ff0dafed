//! CPT-RLE: Compact Pro's escape-byte run-length encoding, the first
//! stage of every Compact Pro fork pipeline (spec.md §4.7 "CPT-RLE").

use crate::buffer::GrowBuf;
use crate::ParseError;

const ESCAPE: u8 = 0x81;
const RUN_MARKER: u8 = 0x82;

pub fn decode(data: &[u8], raw_len: usize) -> Result<Vec<u8>, ParseError> {
    let mut out = GrowBuf::with_target(raw_len);
    let mut prev: u8 = 0;
    let mut i = 0usize;
    let mut pending_escape = false;

    while (i < data.len() || pending_escape) && !out.is_full() {
        if pending_escape || data[i] == ESCAPE {
            if !pending_escape {
                i += 1;
            }
            pending_escape = false;

            let x = *data.get(i).ok_or(ParseError::Truncated)?;
            i += 1;
            match x {
                RUN_MARKER => {
                    let n = *data.get(i).ok_or(ParseError::Truncated)?;
                    i += 1;
                    if n == 0 {
                        out.push(ESCAPE)?;
                        out.push(RUN_MARKER)?;
                        prev = RUN_MARKER;
                    } else {
                        out.push(prev)?;
                        for _ in 0..n.saturating_sub(2) {
                            out.push(prev)?;
                        }
                    }
                }
                ESCAPE => {
                    // Half-escape: one literal 0x81 now, and a phantom
                    // 0x81 that re-enters escape detection without
                    // consuming another input byte.
                    out.push(ESCAPE)?;
                    prev = ESCAPE;
                    pending_escape = true;
                }
                other => {
                    out.push(ESCAPE)?;
                    out.push(other)?;
                    prev = other;
                }
            }
        } else {
            let byte = data[i];
            i += 1;
            out.push(byte)?;
            prev = byte;
        }
    }

    out.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn passes_through_plain_bytes() {
        assert_eq!(decode(&[1, 2, 3], 3).unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn escaped_run_marker_literal() {
        let out = decode(&[ESCAPE, RUN_MARKER, 0x00], 2).unwrap();
        assert_eq!(out, vec![ESCAPE, RUN_MARKER]);
    }

    #[test]
    fn run_marker_n_minus_two_rule() {
        // prev = 5, then a run of N=5 -> one copy now plus (5-2)=3 more = 4 total.
        let out = decode(&[5, ESCAPE, RUN_MARKER, 5], 5).unwrap();
        assert_eq!(out, vec![5, 5, 5, 5, 5]);
    }

    #[test]
    fn half_escape_emits_literal_and_reprocesses() {
        // 0x81 0x81 0x82 0x00 -> literal 0x81, then the phantom 0x81
        // pairs with the real 0x82 0x00 to emit a literal 0x81 0x82.
        let out = decode(&[ESCAPE, ESCAPE, RUN_MARKER, 0x00], 3).unwrap();
        assert_eq!(out, vec![ESCAPE, ESCAPE, RUN_MARKER]);
    }

    #[test]
    fn plain_escape_followed_by_other_byte() {
        let out = decode(&[ESCAPE, 0x05], 2).unwrap();
        assert_eq!(out, vec![ESCAPE, 0x05]);
    }

    #[test]
    fn truncated_escape_sequence_is_fatal() {
        assert!(decode(&[ESCAPE], 2).is_err());
    }
}
