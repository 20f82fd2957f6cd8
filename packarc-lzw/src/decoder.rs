//! The `.Z` decoder.
//!
//! Semantics follow the classic Unix tool exactly, including its quirks:
//!
//! - codes are packed LSB-first, starting at 9 bits;
//! - the width grows once the next free code outgrows the current width,
//!   and the reader then skips ahead to the next 8-code group boundary
//!   (the tool writes codes in groups of eight of equal width);
//! - in block mode, code 256 clears the dictionary, also resyncing to a
//!   group boundary, and the next dictionary slot is deliberately burnt;
//! - a trailing partial code is not an error, it is the end of the stream.

use crate::error::{LzwError, Result};
use log::trace;

const INIT_BITS: u32 = 9;
const CLEAR_CODE: u16 = 256;
const FIRST_FREE: u16 = 257;

/// Magic bytes of a `.Z` stream.
pub const MAGIC: [u8; 2] = [0x1F, 0x9D];

/// Mask of the flags byte holding the maximum code width.
pub const BIT_MASK: u8 = 0x1F;

/// Flags bit enabling block (clear-code) mode.
pub const BLOCK_MODE: u8 = 0x80;

/// Decoder for the `compress(1)` LZW format. The format has no encoder
/// counterpart here; the original library is decode-only as well.
#[derive(Debug)]
pub struct LzwDecoder {
    max_bits: u32,
    block_mode: bool,
    prefix: Vec<u16>,
    suffix: Vec<u8>,
}

impl LzwDecoder {
    /// Create a decoder from the header flags byte.
    pub fn from_flags(flags: u8) -> Result<Self> {
        let max_bits = flags & BIT_MASK;
        if !(9..=16).contains(&max_bits) {
            return Err(LzwError::UnsupportedMaxBits { max_bits });
        }
        let table_size = 1usize << max_bits;
        let mut suffix = vec![0u8; table_size];
        for (code, slot) in suffix.iter_mut().enumerate().take(256) {
            *slot = code as u8;
        }
        Ok(Self {
            max_bits: max_bits as u32,
            block_mode: flags & BLOCK_MODE != 0,
            prefix: vec![0u16; table_size],
            suffix,
        })
    }

    /// Decode the code area (everything after the 3-byte header).
    pub fn decode(&mut self, data: &[u8]) -> Result<Vec<u8>> {
        let total_bits = data.len() as u64 * 8;
        let max_max_code = 1u32 << self.max_bits;

        let mut output = Vec::with_capacity(data.len() * 3);
        let mut stack: Vec<u8> = Vec::with_capacity(1 << self.max_bits);

        let mut n_bits = INIT_BITS;
        let mut max_code = (1u32 << n_bits) - 1;
        let mut free_ent: u32 = if self.block_mode {
            FIRST_FREE as u32
        } else {
            256
        };
        let mut bit_pos: u64 = 0;
        let mut old_code: i32 = -1;
        let mut fin_char: u8 = 0;

        loop {
            if free_ent > max_code {
                // The writer pads to a whole group of 8 codes before
                // switching widths; skip the dead bits with it.
                bit_pos = resync(bit_pos, n_bits);
                n_bits += 1;
                max_code = if n_bits == self.max_bits {
                    max_max_code
                } else {
                    (1 << n_bits) - 1
                };
                trace!("lzw: code width now {n_bits} bits");
            }

            if bit_pos + n_bits as u64 > total_bits {
                break;
            }
            let code = read_code(data, bit_pos, n_bits);
            bit_pos += n_bits as u64;

            if old_code == -1 {
                if code >= 256 {
                    return Err(LzwError::CorruptCode {
                        code,
                        dict_len: 256,
                        bit_pos,
                    });
                }
                fin_char = code as u8;
                old_code = code as i32;
                output.push(fin_char);
                continue;
            }

            if code == CLEAR_CODE && self.block_mode {
                free_ent = FIRST_FREE as u32 - 1;
                bit_pos = resync(bit_pos, n_bits);
                n_bits = INIT_BITS;
                max_code = (1 << n_bits) - 1;
                continue;
            }

            let in_code = code;
            let mut code = code as u32;

            if code >= free_ent {
                // KwKwK: the entry being referenced is the one about to be
                // created.
                if code > free_ent {
                    return Err(LzwError::CorruptCode {
                        code: in_code,
                        dict_len: free_ent,
                        bit_pos,
                    });
                }
                stack.push(fin_char);
                code = old_code as u32;
            }

            while code >= 256 {
                stack.push(self.suffix[code as usize]);
                code = self.prefix[code as usize] as u32;
            }
            fin_char = self.suffix[code as usize];
            stack.push(fin_char);
            while let Some(byte) = stack.pop() {
                output.push(byte);
            }

            if free_ent < max_max_code {
                self.prefix[free_ent as usize] = old_code as u16;
                self.suffix[free_ent as usize] = fin_char;
                free_ent += 1;
            }
            old_code = in_code as i32;
        }

        Ok(output)
    }
}

// Round a bit position up to the next multiple of `n_bits` bytes
// (one group of eight codes).
fn resync(bit_pos: u64, n_bits: u32) -> u64 {
    let group = (n_bits as u64) << 3;
    bit_pos.div_ceil(group) * group
}

fn read_code(data: &[u8], bit_pos: u64, n_bits: u32) -> u16 {
    let byte_pos = (bit_pos / 8) as usize;
    let shift = (bit_pos % 8) as u32;
    let mut window = data[byte_pos] as u32;
    if byte_pos + 1 < data.len() {
        window |= (data[byte_pos + 1] as u32) << 8;
    }
    if byte_pos + 2 < data.len() {
        window |= (data[byte_pos + 2] as u32) << 16;
    }
    ((window >> shift) & ((1 << n_bits) - 1)) as u16
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_stream(data: &[u8]) -> Result<Vec<u8>> {
        crate::decompress_bytes(data)
    }

    #[test]
    fn test_two_literals() {
        // "ab" as two 9-bit codes.
        let data = [0x1F, 0x9D, 0x90, 0x61, 0xC4, 0x00];
        assert_eq!(decode_stream(&data).unwrap(), b"ab");
    }

    #[test]
    fn test_kwkwk_run() {
        // "aaaa" compresses to codes 97, 257, 97; 257 is the KwKwK case.
        let data = [0x1F, 0x9D, 0x90, 0x61, 0x02, 0x86, 0x01];
        assert_eq!(decode_stream(&data).unwrap(), b"aaaa");
    }

    #[test]
    fn test_clear_code_resyncs_to_group_boundary() {
        // Codes 97, CLEAR, then 98 after the skip to the 72-bit boundary.
        let data = [
            0x1F, 0x9D, 0x90, 0x61, 0x00, 0x02, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x62, 0x00,
        ];
        assert_eq!(decode_stream(&data).unwrap(), b"ab");
    }

    #[test]
    fn test_code_beyond_dictionary_is_corrupt() {
        // Codes 97, then 300 with only 257 entries live.
        let data = [0x1F, 0x9D, 0x90, 0x61, 0x58, 0x02];
        let err = decode_stream(&data).err().unwrap();
        assert!(matches!(err, LzwError::CorruptCode { code: 300, .. }), "{err:?}");
    }

    #[test]
    fn test_first_code_must_be_literal() {
        // First code 257 makes no sense with an empty dictionary.
        // 257 = 0b100000001, LSB-first: byte0 = 0x01, bit8 = 1.
        let data = [0x1F, 0x9D, 0x90, 0x01, 0x01];
        assert!(decode_stream(&data).is_err());
    }

    #[test]
    fn test_empty_code_area() {
        let data = [0x1F, 0x9D, 0x90];
        assert_eq!(decode_stream(&data).unwrap(), b"");
    }

    #[test]
    fn test_trailing_partial_code_is_end_of_stream() {
        // One full code then four dangling bits.
        let data = [0x1F, 0x9D, 0x90, 0x61, 0x0C];
        assert_eq!(decode_stream(&data).unwrap(), b"a");
    }

    #[test]
    fn test_bad_magic() {
        let err = decode_stream(&[0x1F, 0x8B, 0x90, 0x00]).err().unwrap();
        assert!(matches!(err, LzwError::BadMagic { .. }));
    }

    #[test]
    fn test_unsupported_max_bits() {
        let err = decode_stream(&[0x1F, 0x9D, 0x91, 0x00]).err().unwrap();
        assert!(matches!(err, LzwError::UnsupportedMaxBits { max_bits: 17 }));
    }
}
