//! Canonical Huffman coding for DEFLATE.
//!
//! Decoding walks the canonical code space length by length using
//! per-length counts and symbol offsets; construction of encoder code
//! lengths uses boundary package-merge, which yields optimal
//! length-limited codes deterministically.

use crate::tables::MAX_CODE_LEN;
use packarc_core::bitstream::BitReader;
use packarc_core::error::{PackArcError, Result};
use std::io::Read;

/// A canonical Huffman decoder built from code lengths.
#[derive(Debug, Clone)]
pub struct HuffmanDecoder {
    /// Number of codes of each length.
    counts: [u16; MAX_CODE_LEN + 1],
    /// Symbols ordered by (length, symbol).
    symbols: Vec<u16>,
}

impl HuffmanDecoder {
    /// Build a decoder from per-symbol code lengths (0 = unused).
    ///
    /// Oversubscribed length sets are rejected; incomplete sets are
    /// accepted and simply fail at decode time if a dead code appears.
    pub fn from_lengths(lengths: &[u8]) -> Result<Self> {
        let mut counts = [0u16; MAX_CODE_LEN + 1];
        for &len in lengths {
            if len as usize > MAX_CODE_LEN {
                return Err(PackArcError::invalid_header(format!(
                    "Huffman code length {len} exceeds 15",
                )));
            }
            counts[len as usize] += 1;
        }
        counts[0] = 0;

        // Kraft check: the code space must not be oversubscribed.
        let mut remaining = 1i32;
        for len in 1..=MAX_CODE_LEN {
            remaining <<= 1;
            remaining -= counts[len] as i32;
            if remaining < 0 {
                return Err(PackArcError::invalid_header(
                    "oversubscribed Huffman code set",
                ));
            }
        }

        let mut offsets = [0u16; MAX_CODE_LEN + 2];
        for len in 1..=MAX_CODE_LEN {
            offsets[len + 1] = offsets[len] + counts[len];
        }
        let mut symbols = vec![0u16; offsets[MAX_CODE_LEN + 1] as usize];
        for (symbol, &len) in lengths.iter().enumerate() {
            if len != 0 {
                symbols[offsets[len as usize] as usize] = symbol as u16;
                offsets[len as usize] += 1;
            }
        }
        Ok(Self { counts, symbols })
    }

    /// Whether the decoder has any codes at all.
    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// Decode one symbol, reading bits MSB-of-code-first.
    pub fn decode<R: Read>(&self, reader: &mut BitReader<R>) -> Result<u16> {
        let mut code = 0u32;
        let mut first = 0u32;
        let mut index = 0u32;
        for len in 1..=MAX_CODE_LEN {
            code |= reader.read_bit()?;
            let count = self.counts[len] as u32;
            if code < first + count {
                return Ok(self.symbols[(index + (code - first)) as usize]);
            }
            index += count;
            first = (first + count) << 1;
            code <<= 1;
        }
        Err(PackArcError::invalid_header("invalid Huffman code"))
    }
}

/// An encoder-side code table: per-symbol (code, length) with the code bits
/// already reversed for an LSB-first writer.
#[derive(Debug, Clone)]
pub struct HuffmanEncoder {
    codes: Vec<u16>,
    lengths: Vec<u8>,
}

impl HuffmanEncoder {
    /// Assign canonical codes to the given lengths.
    pub fn from_lengths(lengths: &[u8]) -> Self {
        let mut counts = [0u16; MAX_CODE_LEN + 1];
        for &len in lengths {
            counts[len as usize] += 1;
        }
        counts[0] = 0;
        let mut next_code = [0u16; MAX_CODE_LEN + 1];
        let mut code = 0u16;
        for len in 1..=MAX_CODE_LEN {
            code = (code + counts[len - 1]) << 1;
            next_code[len] = code;
        }
        let mut codes = vec![0u16; lengths.len()];
        for (symbol, &len) in lengths.iter().enumerate() {
            if len != 0 {
                codes[symbol] = reverse_bits(next_code[len as usize], len);
                next_code[len as usize] += 1;
            }
        }
        Self {
            codes,
            lengths: lengths.to_vec(),
        }
    }

    /// The (reversed) code bits of a symbol.
    pub fn code(&self, symbol: u16) -> u16 {
        self.codes[symbol as usize]
    }

    /// The code length of a symbol in bits.
    pub fn len(&self, symbol: u16) -> u8 {
        self.lengths[symbol as usize]
    }
}

fn reverse_bits(code: u16, len: u8) -> u16 {
    code.reverse_bits() >> (16 - len as u16)
}

/// Compute optimal length-limited code lengths for the given frequencies
/// using boundary package-merge. Symbols with zero frequency get length 0.
pub fn build_code_lengths(freqs: &[u32], max_len: usize) -> Vec<u8> {
    let active: Vec<usize> = (0..freqs.len()).filter(|&s| freqs[s] > 0).collect();
    let mut lengths = vec![0u8; freqs.len()];
    match active.len() {
        0 => return lengths,
        1 => {
            lengths[active[0]] = 1;
            return lengths;
        }
        _ => {}
    }

    // Coins are (weight, symbols covered). Each level merges the singles
    // with pairs packaged from the level below.
    let mut singles: Vec<(u64, Vec<usize>)> = active
        .iter()
        .map(|&s| (freqs[s] as u64, vec![s]))
        .collect();
    singles.sort_by_key(|(w, _)| *w);

    let mut level: Vec<(u64, Vec<usize>)> = Vec::new();
    for _ in 0..max_len {
        let mut merged = singles.clone();
        for pair in level.chunks_exact(2) {
            let mut symbols = pair[0].1.clone();
            symbols.extend_from_slice(&pair[1].1);
            merged.push((pair[0].0 + pair[1].0, symbols));
        }
        merged.sort_by_key(|(w, _)| *w);
        level = merged;
    }

    // Taking the cheapest 2(n-1) coins increments each covered symbol's
    // length once per occurrence.
    let take = 2 * (active.len() - 1);
    for (_, symbols) in level.into_iter().take(take) {
        for s in symbols {
            lengths[s] += 1;
        }
    }
    lengths
}
