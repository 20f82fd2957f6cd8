//! LZW decoder errors.

use packarc_core::error::PackArcError;
use thiserror::Error;

/// Errors produced while decoding a `.Z` stream.
#[derive(Debug, Error)]
pub enum LzwError {
    /// The stream does not start with the `1F 9D` magic.
    #[error("not a compress(1) stream: bad magic {found:02x?}")]
    BadMagic {
        /// The bytes found instead.
        found: Vec<u8>,
    },

    /// The flags byte declares an unusable maximum code width.
    #[error("unsupported maximum code width {max_bits} (expected 9..=16)")]
    UnsupportedMaxBits {
        /// Declared width.
        max_bits: u8,
    },

    /// The stream is shorter than its three-byte header.
    #[error("stream shorter than the 3-byte header")]
    TruncatedHeader,

    /// A code referenced a dictionary entry that cannot exist yet.
    #[error("corrupt input: code {code} beyond dictionary size {dict_len} at bit {bit_pos}")]
    CorruptCode {
        /// The offending code.
        code: u16,
        /// Number of live dictionary entries.
        dict_len: u32,
        /// Bit offset into the code area.
        bit_pos: u64,
    },
}

/// Result alias for LZW operations.
pub type Result<T> = std::result::Result<T, LzwError>;

impl From<LzwError> for PackArcError {
    fn from(err: LzwError) -> Self {
        match err {
            LzwError::BadMagic { found } => PackArcError::invalid_magic(vec![0x1F, 0x9D], found),
            LzwError::UnsupportedMaxBits { max_bits } => {
                PackArcError::unsupported_method(format!("lzw max bits {max_bits}"))
            }
            LzwError::TruncatedHeader => PackArcError::malformed(0, "truncated .Z header"),
            LzwError::CorruptCode { bit_pos, .. } => {
                PackArcError::malformed(bit_pos / 8, "corrupt LZW code")
            }
        }
    }
}
