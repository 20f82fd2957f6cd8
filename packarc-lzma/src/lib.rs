//! # PackArc LZMA
//!
//! LZMA compression and decompression: an LZ match finder over a sliding
//! dictionary, a binary-arithmetic range coder, adaptive probability models
//! and a price-optimal parser.
//!
//! ## Stream format
//!
//! A `.lzma` stream is a 13-byte header followed by the range-coded payload:
//!
//! 1. Properties byte packing `lc`, `lp`, `pb` as `((pb * 5) + lp) * 9 + lc`
//! 2. Dictionary size, 4 bytes little-endian
//! 3. Uncompressed size, 8 bytes little-endian (`0xFFFF_FFFF_FFFF_FFFF`
//!    means unknown; the payload then ends with an end marker)
//! 4. Range-coded payload, starting with one zero byte and four bytes of
//!    initial coder state
//!
//! ## Usage
//!
//! ```
//! use packarc_lzma::{compress, decompress};
//!
//! let data = b"Hello, World! Hello, World!";
//! let packed = compress(data).unwrap();
//! let unpacked = decompress(&packed[..]).unwrap();
//! assert_eq!(unpacked, data);
//! ```
//!
//! Streaming encode with explicit options:
//!
//! ```
//! use packarc_lzma::{LzmaEncoder, LzmaOptions, MatchFinderKind};
//!
//! let options = LzmaOptions {
//!     dict_size: 1 << 16,
//!     nice_len: 64,
//!     match_finder: MatchFinderKind::Bt4,
//!     ..Default::default()
//! };
//! let mut encoder = LzmaEncoder::new(options).unwrap();
//! let mut packed = Vec::new();
//! let data = b"streaming interface";
//! encoder
//!     .encode(&mut &data[..], &mut packed, Some(data.len() as u64))
//!     .unwrap();
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod coders;
pub mod decoder;
pub mod encoder;
pub mod lz;
pub mod model;
pub mod optimal;
#[cfg(feature = "parallel")]
pub mod parallel;
pub mod range_coder;

pub use decoder::{LzmaDecoder, decompress, decompress_raw, parse_header};
pub use encoder::{DICT_SIZE_MAX, LzmaEncoder, LzmaOptions, compress, compress_with};
pub use lz::MatchFinderKind;
pub use model::{LzmaProperties, State};
pub use range_coder::{RangeDecoder, RangeEncoder};

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip_with(data: &[u8], options: LzmaOptions) {
        let packed = compress_with(data, options.clone()).unwrap();
        let unpacked = decompress(&packed[..]).unwrap();
        assert_eq!(unpacked, data, "round trip failed for {options:?}");
    }

    #[test]
    fn test_roundtrip_text() {
        let data = b"The quick brown fox jumps over the lazy dog. \
                     The quick brown fox jumps over the lazy dog again.";
        roundtrip_with(data, LzmaOptions::default());
    }

    #[test]
    fn test_roundtrip_bt2() {
        let data = b"abcabcabcabc, abcabcabcabc, and once more abcabcabcabc".repeat(8);
        roundtrip_with(
            &data,
            LzmaOptions {
                match_finder: MatchFinderKind::Bt2,
                ..Default::default()
            },
        );
    }

    #[test]
    fn test_roundtrip_small_dictionary() {
        // Input larger than the dictionary exercises the window-wrap path.
        let mut data = Vec::new();
        for i in 0..40_000u32 {
            data.push((i % 251) as u8);
            if i % 7 == 0 {
                data.extend_from_slice(b"pattern");
            }
        }
        roundtrip_with(
            &data,
            LzmaOptions {
                dict_size: 1 << 12,
                ..Default::default()
            },
        );
    }

    #[test]
    fn test_roundtrip_property_corners() {
        let data = b"property corner cases: aaaa bbbb aaaa bbbb cccc".repeat(5);
        for (lc, lp, pb) in [(0, 0, 0), (8, 0, 2), (0, 4, 4), (3, 2, 0)] {
            roundtrip_with(
                &data,
                LzmaOptions {
                    lc,
                    lp,
                    pb,
                    dict_size: 1 << 16,
                    ..Default::default()
                },
            );
        }
    }

    #[test]
    fn test_highly_repetitive_ratio() {
        let data = vec![b'a'; 10_000];
        let packed = compress(&data).unwrap();
        assert!(
            packed.len() * 10 < data.len(),
            "expected <0.1x, got {} bytes",
            packed.len()
        );
        assert_eq!(decompress(&packed[..]).unwrap(), data);
    }

    #[test]
    fn test_first_byte_survives_any_config() {
        let data = b"\x80 leading byte must survive";
        for pb in 0..=4 {
            let packed = compress_with(
                data,
                LzmaOptions {
                    pb,
                    lc: (pb + 1).min(8),
                    ..Default::default()
                },
            )
            .unwrap();
            let unpacked = decompress(&packed[..]).unwrap();
            assert_eq!(unpacked[0], data[0]);
        }
    }
}
