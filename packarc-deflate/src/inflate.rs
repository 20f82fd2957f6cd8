//! DEFLATE decompression (RFC 1951).

use crate::huffman::HuffmanDecoder;
use crate::tables::{
    CODELEN_ORDER, CODELEN_SYMBOLS, DIST_BASE, DIST_EXTRA, DIST_SYMBOLS, END_OF_BLOCK,
    LENGTH_BASE, LENGTH_EXTRA, LITLEN_SYMBOLS, fixed_dist_lengths, fixed_litlen_lengths,
};
use log::trace;
use packarc_core::bitstream::BitReader;
use packarc_core::error::{PackArcError, Result};
use std::io::Read;

/// Maximum back-reference distance.
pub const MAX_DISTANCE: usize = 32768;

/// Inflate a raw DEFLATE stream from a bit reader, leaving the reader
/// positioned just past the final block (unaligned).
pub fn inflate_from<R: Read>(reader: &mut BitReader<R>) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    loop {
        let bfinal = reader.read_bit()?;
        let btype = reader.read_bits(2)?;
        match btype {
            0 => inflate_stored(reader, &mut out)?,
            1 => {
                let litlen = HuffmanDecoder::from_lengths(&fixed_litlen_lengths())?;
                let dist = HuffmanDecoder::from_lengths(&fixed_dist_lengths())?;
                inflate_block(reader, &litlen, &dist, &mut out)?;
            }
            2 => {
                let (litlen, dist) = read_dynamic_trees(reader)?;
                inflate_block(reader, &litlen, &dist, &mut out)?;
            }
            _ => {
                return Err(PackArcError::malformed(
                    reader.bytes_read(),
                    "reserved block type",
                ));
            }
        }
        if bfinal == 1 {
            break;
        }
    }
    trace!("inflate: {} bytes out", out.len());
    Ok(out)
}

/// Inflate a whole in-memory DEFLATE stream.
pub fn inflate(data: &[u8]) -> Result<Vec<u8>> {
    let mut reader = BitReader::new(data);
    inflate_from(&mut reader)
}

fn inflate_stored<R: Read>(reader: &mut BitReader<R>, out: &mut Vec<u8>) -> Result<()> {
    let len = reader.read_u16_aligned()?;
    let nlen = reader.read_u16_aligned()?;
    if len != !nlen {
        return Err(PackArcError::malformed(
            reader.bytes_read(),
            "stored block length check failed",
        ));
    }
    let start = out.len();
    out.resize(start + len as usize, 0);
    reader.read_bytes(&mut out[start..])?;
    Ok(())
}

fn inflate_block<R: Read>(
    reader: &mut BitReader<R>,
    litlen: &HuffmanDecoder,
    dist: &HuffmanDecoder,
    out: &mut Vec<u8>,
) -> Result<()> {
    loop {
        let symbol = litlen.decode(reader)?;
        if symbol < 256 {
            out.push(symbol as u8);
            continue;
        }
        if symbol == END_OF_BLOCK {
            return Ok(());
        }
        let code = (symbol - 257) as usize;
        if code >= LENGTH_BASE.len() {
            return Err(PackArcError::malformed(
                reader.bytes_read(),
                format!("invalid length code {symbol}"),
            ));
        }
        let length =
            LENGTH_BASE[code] as usize + reader.read_bits(LENGTH_EXTRA[code] as u32)? as usize;

        let dcode = dist.decode(reader)? as usize;
        if dcode >= DIST_BASE.len() {
            return Err(PackArcError::malformed(
                reader.bytes_read(),
                format!("invalid distance code {dcode}"),
            ));
        }
        let distance =
            DIST_BASE[dcode] as usize + reader.read_bits(DIST_EXTRA[dcode] as u32)? as usize;
        if distance > out.len() || distance > MAX_DISTANCE {
            return Err(PackArcError::malformed(
                reader.bytes_read(),
                format!("back-reference distance {distance} exceeds history"),
            ));
        }

        // Byte-wise copy; distance < length self-overlap repeats the tail.
        let start = out.len() - distance;
        for i in 0..length {
            let byte = out[start + i];
            out.push(byte);
        }
    }
}

fn read_dynamic_trees<R: Read>(
    reader: &mut BitReader<R>,
) -> Result<(HuffmanDecoder, HuffmanDecoder)> {
    let hlit = reader.read_bits(5)? as usize + 257;
    let hdist = reader.read_bits(5)? as usize + 1;
    let hclen = reader.read_bits(4)? as usize + 4;
    if hlit > LITLEN_SYMBOLS || hdist > DIST_SYMBOLS {
        return Err(PackArcError::malformed(
            reader.bytes_read(),
            "dynamic header declares too many codes",
        ));
    }

    let mut cl_lengths = [0u8; CODELEN_SYMBOLS];
    for &slot in CODELEN_ORDER.iter().take(hclen) {
        cl_lengths[slot] = reader.read_bits(3)? as u8;
    }
    let cl_decoder = HuffmanDecoder::from_lengths(&cl_lengths)?;

    let mut lengths = vec![0u8; hlit + hdist];
    let mut i = 0;
    while i < lengths.len() {
        let symbol = cl_decoder.decode(reader)?;
        match symbol {
            0..=15 => {
                lengths[i] = symbol as u8;
                i += 1;
            }
            16 => {
                if i == 0 {
                    return Err(PackArcError::malformed(
                        reader.bytes_read(),
                        "length repeat with no previous length",
                    ));
                }
                let prev = lengths[i - 1];
                let repeat = 3 + reader.read_bits(2)? as usize;
                if i + repeat > lengths.len() {
                    return Err(PackArcError::malformed(
                        reader.bytes_read(),
                        "length repeat overruns the table",
                    ));
                }
                lengths[i..i + repeat].fill(prev);
                i += repeat;
            }
            17 | 18 => {
                let repeat = if symbol == 17 {
                    3 + reader.read_bits(3)? as usize
                } else {
                    11 + reader.read_bits(7)? as usize
                };
                if i + repeat > lengths.len() {
                    return Err(PackArcError::malformed(
                        reader.bytes_read(),
                        "zero-length run overruns the table",
                    ));
                }
                i += repeat;
            }
            _ => {
                return Err(PackArcError::malformed(
                    reader.bytes_read(),
                    format!("invalid code-length symbol {symbol}"),
                ));
            }
        }
    }

    if lengths[END_OF_BLOCK as usize] == 0 {
        return Err(PackArcError::malformed(
            reader.bytes_read(),
            "literal tree is missing the end-of-block code",
        ));
    }
    let litlen = HuffmanDecoder::from_lengths(&lengths[..hlit])?;
    let dist = HuffmanDecoder::from_lengths(&lengths[hlit..])?;
    Ok((litlen, dist))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stored_block() {
        // BFINAL=1, BTYPE=00, aligned, LEN=5, NLEN=!5, "hello".
        let mut data = vec![0b0000_0001];
        data.extend_from_slice(&5u16.to_le_bytes());
        data.extend_from_slice(&(!5u16).to_le_bytes());
        data.extend_from_slice(b"hello");
        assert_eq!(inflate(&data).unwrap(), b"hello");
    }

    #[test]
    fn test_stored_block_bad_nlen() {
        let mut data = vec![0b0000_0001];
        data.extend_from_slice(&5u16.to_le_bytes());
        data.extend_from_slice(&5u16.to_le_bytes());
        data.extend_from_slice(b"hello");
        assert!(matches!(
            inflate(&data),
            Err(PackArcError::Malformed { .. })
        ));
    }

    #[test]
    fn test_fixed_block_known_vector() {
        // zlib-produced fixed-Huffman stream for "abcabcabc" (level 1
        // emits a length-6 match at distance 3).
        // Built by hand: literals 'a','b','c', match(6,3), EOB.
        // 'a'=0x61 -> code 0b10010001 (8 bits), 'b' -> 0b10010010,
        // 'c' -> 0b10010011; length 6 -> symbol 260, code 0b0000100;
        // dist 3 -> code 2, 5 bits 0b00010; EOB -> 0b0000000.
        let mut writer = packarc_core::bitstream::BitWriter::new(Vec::new());
        writer.write_bits(1, 1).unwrap(); // BFINAL
        writer.write_bits(1, 2).unwrap(); // fixed
        let enc = crate::huffman::HuffmanEncoder::from_lengths(&fixed_litlen_lengths());
        let dist_enc = crate::huffman::HuffmanEncoder::from_lengths(&fixed_dist_lengths());
        for &b in b"abc" {
            writer
                .write_bits(enc.code(b as u16) as u32, enc.len(b as u16) as u32)
                .unwrap();
        }
        writer.write_bits(enc.code(260) as u32, enc.len(260) as u32).unwrap();
        writer
            .write_bits(dist_enc.code(2) as u32, dist_enc.len(2) as u32)
            .unwrap();
        writer.write_bits(enc.code(256) as u32, enc.len(256) as u32).unwrap();
        let data = writer.finish().unwrap();

        assert_eq!(inflate(&data).unwrap(), b"abcabcabc");
    }

    #[test]
    fn test_distance_beyond_history_is_malformed() {
        let mut writer = packarc_core::bitstream::BitWriter::new(Vec::new());
        writer.write_bits(1, 1).unwrap();
        writer.write_bits(1, 2).unwrap();
        let enc = crate::huffman::HuffmanEncoder::from_lengths(&fixed_litlen_lengths());
        let dist_enc = crate::huffman::HuffmanEncoder::from_lengths(&fixed_dist_lengths());
        writer.write_bits(enc.code(b'x' as u16) as u32, 8).unwrap();
        // Match at distance 4 with only one byte of history.
        writer.write_bits(enc.code(257) as u32, enc.len(257) as u32).unwrap();
        writer
            .write_bits(dist_enc.code(3) as u32, dist_enc.len(3) as u32)
            .unwrap();
        writer.write_bits(enc.code(256) as u32, enc.len(256) as u32).unwrap();
        let data = writer.finish().unwrap();
        assert!(matches!(
            inflate(&data),
            Err(PackArcError::Malformed { .. })
        ));
    }

    #[test]
    fn test_reserved_block_type() {
        assert!(matches!(
            inflate(&[0b0000_0111]),
            Err(PackArcError::Malformed { .. })
        ));
    }

    #[test]
    fn test_truncated_stream() {
        assert!(matches!(
            inflate(&[0b0000_0101]),
            Err(PackArcError::Malformed { .. })
        ));
    }
}
