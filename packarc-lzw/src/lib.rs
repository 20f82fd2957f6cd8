//! # PackArc LZW
//!
//! Decoder for the Unix `compress(1)` `.Z` format.
//!
//! The format is LZW with 9- to 16-bit codes packed LSB-first, an optional
//! clear code (block mode, bit `0x80` of the flags byte) and the reference
//! tool's 8-code group padding. There is no encoder: the format is obsolete
//! for writing and this crate exists so `.Z` archives remain readable.
//!
//! ```
//! use packarc_lzw::decompress_bytes;
//!
//! // "ab" as a tiny .Z stream.
//! let data = [0x1F, 0x9D, 0x90, 0x61, 0xC4, 0x00];
//! assert_eq!(decompress_bytes(&data).unwrap(), b"ab");
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod decoder;
pub mod error;

pub use decoder::{BIT_MASK, BLOCK_MODE, LzwDecoder, MAGIC};
pub use error::{LzwError, Result};

use std::io::Read;

/// Decompress a whole `.Z` stream (3-byte header plus code area).
pub fn decompress_bytes(data: &[u8]) -> Result<Vec<u8>> {
    if data.len() < 2 || data[0] != MAGIC[0] || data[1] != MAGIC[1] {
        return Err(LzwError::BadMagic {
            found: data.iter().take(2).copied().collect(),
        });
    }
    if data.len() < 3 {
        return Err(LzwError::TruncatedHeader);
    }
    let mut decoder = LzwDecoder::from_flags(data[2])?;
    decoder.decode(&data[3..])
}

/// Decompress a `.Z` stream from a byte source.
pub fn decompress<R: Read>(mut reader: R) -> packarc_core::error::Result<Vec<u8>> {
    let mut data = Vec::new();
    reader.read_to_end(&mut data)?;
    Ok(decompress_bytes(&data)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reader_interface() {
        let data: &[u8] = &[0x1F, 0x9D, 0x90, 0x61, 0xC4, 0x00];
        assert_eq!(decompress(data).unwrap(), b"ab");
    }

    #[test]
    fn test_short_input() {
        assert!(matches!(
            decompress_bytes(&[0x1F]),
            Err(LzwError::BadMagic { .. })
        ));
        assert!(matches!(
            decompress_bytes(&[0x1F, 0x9D]),
            Err(LzwError::TruncatedHeader)
        ));
    }
}
