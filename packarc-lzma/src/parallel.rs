//! Parallel compression of independent chunks.
//!
//! Splits the input into fixed-size chunks and runs one encoder instance
//! per chunk on the rayon pool. Chunks are fully independent streams (each
//! with its own header and dictionary), so no state crosses instances; the
//! price is a slightly worse ratio at every chunk boundary.

use crate::decoder::decompress;
use crate::encoder::{LzmaOptions, compress_with};
use packarc_core::error::Result;
use rayon::prelude::*;

/// Compress `data` as independent chunk streams of `chunk_size` input
/// bytes, in parallel. An empty input yields a single empty-stream chunk.
pub fn compress_chunks(data: &[u8], chunk_size: usize, options: &LzmaOptions) -> Result<Vec<Vec<u8>>> {
    let chunk_size = chunk_size.max(1);
    if data.is_empty() {
        return Ok(vec![compress_with(data, options.clone())?]);
    }
    data.par_chunks(chunk_size)
        .map(|chunk| compress_with(chunk, options.clone()))
        .collect()
}

/// Decompress chunk streams produced by [`compress_chunks`], in parallel,
/// and reassemble the original bytes.
pub fn decompress_chunks(chunks: &[Vec<u8>]) -> Result<Vec<u8>> {
    let parts: Vec<Vec<u8>> = chunks
        .par_iter()
        .map(|chunk| decompress(&chunk[..]))
        .collect::<Result<_>>()?;
    Ok(parts.concat())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunked_roundtrip() {
        let data: Vec<u8> = (0..100_000u32)
            .map(|i| (i % 253) as u8)
            .collect();
        let chunks = compress_chunks(&data, 1 << 14, &LzmaOptions::default()).unwrap();
        assert_eq!(chunks.len(), data.len().div_ceil(1 << 14));
        assert_eq!(decompress_chunks(&chunks).unwrap(), data);
    }

    #[test]
    fn test_chunked_empty() {
        let chunks = compress_chunks(b"", 1 << 14, &LzmaOptions::default()).unwrap();
        assert_eq!(chunks.len(), 1);
        assert!(decompress_chunks(&chunks).unwrap().is_empty());
    }
}
