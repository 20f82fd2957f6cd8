//! DEFLATE compression (RFC 1951).
//!
//! The whole input is tokenized once, then emitted as a single block using
//! whichever representation prices out smallest: stored, fixed Huffman or
//! dynamic Huffman with package-merge code lengths.

use crate::huffman::{HuffmanEncoder, build_code_lengths};
use crate::lz77::{Lz77Params, Token, tokenize};
use crate::tables::{
    CODELEN_ORDER, CODELEN_SYMBOLS, DIST_SYMBOLS, END_OF_BLOCK, LITLEN_SYMBOLS, MAX_CODELEN_LEN,
    MAX_CODE_LEN, distance_to_code, fixed_dist_lengths, fixed_litlen_lengths, length_to_code,
};
use log::trace;
use packarc_core::bitstream::BitWriter;
use packarc_core::error::Result;

const MAX_STORED_BLOCK: usize = 65535;

/// Compress `data` at the given level (0 = stored, 9 = slowest/best).
pub fn deflate(data: &[u8], level: u8) -> Result<Vec<u8>> {
    let level = level.min(9);
    if level == 0 {
        return deflate_stored(data);
    }

    let tokens = tokenize(data, Lz77Params::for_level(level));

    let mut lit_freq = [0u32; LITLEN_SYMBOLS];
    let mut dist_freq = [0u32; DIST_SYMBOLS];
    for token in &tokens {
        match *token {
            Token::Literal(b) => lit_freq[b as usize] += 1,
            Token::Match { len, dist } => {
                let (lcode, _, _) = length_to_code(len);
                lit_freq[257 + lcode as usize] += 1;
                let (dcode, _, _) = distance_to_code(dist);
                dist_freq[dcode as usize] += 1;
            }
        }
    }
    lit_freq[END_OF_BLOCK as usize] += 1;

    let lit_lens = build_code_lengths(&lit_freq, MAX_CODE_LEN);
    let dist_lens = build_code_lengths(&dist_freq, MAX_CODE_LEN);

    let fixed_lit = fixed_litlen_lengths();
    let fixed_dist = fixed_dist_lengths();
    let fixed_bits = 3 + token_bits(&tokens, &fixed_lit, &fixed_dist);

    let hlit = (257..=LITLEN_SYMBOLS)
        .rev()
        .find(|&n| lit_lens[n - 1] != 0)
        .unwrap_or(257)
        .max(257);
    let hdist = (1..=DIST_SYMBOLS)
        .rev()
        .find(|&n| dist_lens[n - 1] != 0)
        .unwrap_or(1)
        .max(1);
    let mut all_lens = Vec::with_capacity(hlit + hdist);
    all_lens.extend_from_slice(&lit_lens[..hlit]);
    all_lens.extend_from_slice(&dist_lens[..hdist]);
    let rle = rle_encode(&all_lens);

    let mut cl_freq = [0u32; CODELEN_SYMBOLS];
    for &(symbol, _, _) in &rle {
        cl_freq[symbol as usize] += 1;
    }
    let cl_lens = build_code_lengths(&cl_freq, MAX_CODELEN_LEN);
    let hclen = (4..=CODELEN_SYMBOLS)
        .rev()
        .find(|&n| cl_lens[CODELEN_ORDER[n - 1]] != 0)
        .unwrap_or(4)
        .max(4);

    let header_bits: u64 = 14
        + 3 * hclen as u64
        + rle
            .iter()
            .map(|&(symbol, extra, _)| cl_lens[symbol as usize] as u64 + extra as u64)
            .sum::<u64>();
    let dynamic_bits = 3 + header_bits + token_bits(&tokens, &lit_lens, &dist_lens);

    let stored_bits = stored_cost_bits(data.len());

    if stored_bits <= fixed_bits && stored_bits <= dynamic_bits {
        trace!("deflate: stored wins ({stored_bits} bits)");
        return deflate_stored(data);
    }

    let mut writer = BitWriter::new(Vec::new());
    writer.write_bits(1, 1)?; // single final block
    if fixed_bits <= dynamic_bits {
        trace!("deflate: fixed block ({fixed_bits} bits)");
        writer.write_bits(1, 2)?;
        let lit_enc = HuffmanEncoder::from_lengths(&fixed_lit);
        let dist_enc = HuffmanEncoder::from_lengths(&fixed_dist);
        write_tokens(&mut writer, &tokens, &lit_enc, &dist_enc)?;
    } else {
        trace!("deflate: dynamic block ({dynamic_bits} bits)");
        writer.write_bits(2, 2)?;
        writer.write_bits(hlit as u32 - 257, 5)?;
        writer.write_bits(hdist as u32 - 1, 5)?;
        writer.write_bits(hclen as u32 - 4, 4)?;
        let cl_enc = HuffmanEncoder::from_lengths(&cl_lens);
        for &slot in CODELEN_ORDER.iter().take(hclen) {
            writer.write_bits(cl_lens[slot] as u32, 3)?;
        }
        for &(symbol, extra, value) in &rle {
            writer.write_bits(cl_enc.code(symbol) as u32, cl_enc.len(symbol) as u32)?;
            if extra > 0 {
                writer.write_bits(value as u32, extra as u32)?;
            }
        }
        let lit_enc = HuffmanEncoder::from_lengths(&lit_lens);
        let dist_enc = HuffmanEncoder::from_lengths(&dist_lens);
        write_tokens(&mut writer, &tokens, &lit_enc, &dist_enc)?;
    }
    writer.finish()
}

fn deflate_stored(data: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(data.len() + data.len() / MAX_STORED_BLOCK * 5 + 6);
    let mut chunks: Vec<&[u8]> = data.chunks(MAX_STORED_BLOCK).collect();
    if chunks.is_empty() {
        chunks.push(&[]);
    }
    let last = chunks.len() - 1;
    for (i, chunk) in chunks.iter().enumerate() {
        out.push(u8::from(i == last)); // BFINAL + BTYPE 00 + pad
        out.extend_from_slice(&(chunk.len() as u16).to_le_bytes());
        out.extend_from_slice(&(!(chunk.len() as u16)).to_le_bytes());
        out.extend_from_slice(chunk);
    }
    Ok(out)
}

fn stored_cost_bits(len: usize) -> u64 {
    let blocks = len.div_ceil(MAX_STORED_BLOCK).max(1) as u64;
    blocks * 40 + len as u64 * 8
}

fn token_bits(tokens: &[Token], lit_lens: &[u8], dist_lens: &[u8]) -> u64 {
    let mut bits = lit_lens[END_OF_BLOCK as usize] as u64;
    for token in tokens {
        match *token {
            Token::Literal(b) => bits += lit_lens[b as usize] as u64,
            Token::Match { len, dist } => {
                let (lcode, lextra, _) = length_to_code(len);
                let (dcode, dextra, _) = distance_to_code(dist);
                bits += lit_lens[257 + lcode as usize] as u64 + lextra as u64;
                bits += dist_lens[dcode as usize] as u64 + dextra as u64;
            }
        }
    }
    bits
}

fn write_tokens<W: std::io::Write>(
    writer: &mut BitWriter<W>,
    tokens: &[Token],
    lit_enc: &HuffmanEncoder,
    dist_enc: &HuffmanEncoder,
) -> Result<()> {
    for token in tokens {
        match *token {
            Token::Literal(b) => {
                writer.write_bits(lit_enc.code(b as u16) as u32, lit_enc.len(b as u16) as u32)?;
            }
            Token::Match { len, dist } => {
                let (lcode, lextra, lvalue) = length_to_code(len);
                let symbol = 257 + lcode;
                writer.write_bits(lit_enc.code(symbol) as u32, lit_enc.len(symbol) as u32)?;
                if lextra > 0 {
                    writer.write_bits(lvalue as u32, lextra as u32)?;
                }
                let (dcode, dextra, dvalue) = distance_to_code(dist);
                writer.write_bits(dist_enc.code(dcode) as u32, dist_enc.len(dcode) as u32)?;
                if dextra > 0 {
                    writer.write_bits(dvalue as u32, dextra as u32)?;
                }
            }
        }
    }
    writer.write_bits(
        lit_enc.code(END_OF_BLOCK) as u32,
        lit_enc.len(END_OF_BLOCK) as u32,
    )?;
    Ok(())
}

// Run-length encode a code-length sequence into code-length symbols:
// (symbol, extra_bit_count, extra_value).
fn rle_encode(lens: &[u8]) -> Vec<(u16, u8, u16)> {
    let mut out = Vec::new();
    let mut i = 0usize;
    while i < lens.len() {
        let value = lens[i];
        let mut run = 1usize;
        while i + run < lens.len() && lens[i + run] == value {
            run += 1;
        }
        if value == 0 {
            let mut rest = run;
            while rest >= 11 {
                let take = rest.min(138);
                out.push((18, 7, (take - 11) as u16));
                rest -= take;
            }
            if rest >= 3 {
                out.push((17, 3, (rest - 3) as u16));
                rest = 0;
            }
            for _ in 0..rest {
                out.push((0, 0, 0));
            }
        } else {
            out.push((value as u16, 0, 0));
            let mut rest = run - 1;
            while rest >= 3 {
                let take = rest.min(6);
                out.push((16, 2, (take - 3) as u16));
                rest -= take;
            }
            for _ in 0..rest {
                out.push((value as u16, 0, 0));
            }
        }
        i += run;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inflate::inflate;

    #[test]
    fn test_rle_encode_runs() {
        // 1, 0 x 15, 5 x 5
        let mut lens = vec![1u8];
        lens.extend(std::iter::repeat_n(0u8, 15));
        lens.extend(std::iter::repeat_n(5u8, 5));
        let rle = rle_encode(&lens);
        assert_eq!(rle[0], (1, 0, 0));
        assert_eq!(rle[1], (18, 7, 4)); // 15 zeros
        assert_eq!(rle[2], (5, 0, 0));
        assert_eq!(rle[3], (16, 2, 1)); // repeat previous 4x
        assert_eq!(rle.len(), 4);
    }

    #[test]
    fn test_stored_roundtrip() {
        let data = b"just store me";
        let packed = deflate(data, 0).unwrap();
        assert_eq!(inflate(&packed).unwrap(), data);
    }

    #[test]
    fn test_stored_chunking() {
        let data = vec![7u8; 100_000];
        let packed = deflate(&data, 0).unwrap();
        assert_eq!(inflate(&packed).unwrap(), data);
    }

    #[test]
    fn test_empty_input() {
        for level in [0u8, 1, 6, 9] {
            let packed = deflate(b"", level).unwrap();
            assert!(inflate(&packed).unwrap().is_empty(), "level {level}");
        }
    }

    #[test]
    fn test_levels_roundtrip() {
        let data = b"It was the best of times, it was the worst of times, it was \
                     the age of wisdom, it was the age of foolishness."
            .repeat(20);
        for level in [1u8, 4, 6, 9] {
            let packed = deflate(&data, level).unwrap();
            assert!(packed.len() < data.len(), "level {level} did not compress");
            assert_eq!(inflate(&packed).unwrap(), data, "level {level}");
        }
    }

    #[test]
    fn test_all_byte_values() {
        let data: Vec<u8> = (0..=255u8).cycle().take(10_000).collect();
        let packed = deflate(&data, 6).unwrap();
        assert_eq!(inflate(&packed).unwrap(), data);
    }

    #[test]
    fn test_no_match_input_roundtrip() {
        // Short incompressible input lands on stored or fixed; both must
        // decode.
        let data = b"abcdefghijklmnop";
        let packed = deflate(data, 9).unwrap();
        assert_eq!(inflate(&packed).unwrap(), data);
    }
}
