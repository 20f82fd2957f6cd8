//! GZIP format support (RFC 1952).
//!
//! Single-member reader/writer over the DEFLATE codec, with CRC-32 and
//! ISIZE trailer verification on read.

use log::debug;
use packarc_core::bitstream::BitReader;
use packarc_core::checksum::Crc32;
use packarc_core::error::{PackArcError, Result};
use packarc_deflate::{deflate, inflate_from};
use std::io::{Read, Write};
use std::time::{SystemTime, UNIX_EPOCH};

/// GZIP magic bytes.
pub const MAGIC: [u8; 2] = [0x1F, 0x8B];

/// Compression method: DEFLATE.
pub const CM_DEFLATE: u8 = 8;

/// Header flag bits.
pub mod flags {
    /// File is probably text.
    pub const FTEXT: u8 = 0x01;
    /// Header CRC16 present.
    pub const FHCRC: u8 = 0x02;
    /// Extra field present.
    pub const FEXTRA: u8 = 0x04;
    /// Original file name present.
    pub const FNAME: u8 = 0x08;
    /// Comment present.
    pub const FCOMMENT: u8 = 0x10;
}

/// GZIP member header.
#[derive(Debug, Clone)]
pub struct GzipHeader {
    /// Compression method; only DEFLATE (8) is supported.
    pub method: u8,
    /// Flag bits.
    pub flags: u8,
    /// Modification time (Unix seconds, 0 = unknown).
    pub mtime: u32,
    /// Extra flags (2 = max compression, 4 = fastest).
    pub xfl: u8,
    /// Originating OS (255 = unknown).
    pub os: u8,
    /// Original file name, when the FNAME flag is set.
    pub filename: Option<String>,
    /// Comment, when the FCOMMENT flag is set.
    pub comment: Option<String>,
}

impl Default for GzipHeader {
    fn default() -> Self {
        Self {
            method: CM_DEFLATE,
            flags: 0,
            mtime: 0,
            xfl: 0,
            os: 255,
            filename: None,
            comment: None,
        }
    }
}

impl GzipHeader {
    /// A header carrying the original file name.
    pub fn with_filename(filename: &str) -> Self {
        Self {
            flags: flags::FNAME,
            filename: Some(filename.to_string()),
            ..Self::default()
        }
    }

    /// Stamp the header with the current time.
    pub fn with_mtime_now(mut self) -> Self {
        self.mtime = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as u32)
            .unwrap_or(0);
        self
    }

    /// Serialize the header.
    pub fn write<W: Write>(&self, sink: &mut W) -> Result<()> {
        let mut fixed = [0u8; 10];
        fixed[0] = MAGIC[0];
        fixed[1] = MAGIC[1];
        fixed[2] = self.method;
        fixed[3] = self.flags;
        fixed[4..8].copy_from_slice(&self.mtime.to_le_bytes());
        fixed[8] = self.xfl;
        fixed[9] = self.os;
        sink.write_all(&fixed).map_err(PackArcError::sink_closed)?;
        if let Some(name) = &self.filename {
            sink.write_all(name.as_bytes())
                .and_then(|()| sink.write_all(&[0]))
                .map_err(PackArcError::sink_closed)?;
        }
        if let Some(comment) = &self.comment {
            sink.write_all(comment.as_bytes())
                .and_then(|()| sink.write_all(&[0]))
                .map_err(PackArcError::sink_closed)?;
        }
        Ok(())
    }

    /// Parse a header from a byte source.
    pub fn read<R: Read>(src: &mut R) -> Result<Self> {
        let mut fixed = [0u8; 10];
        src.read_exact(&mut fixed)
            .map_err(|e| PackArcError::from_read(e, 0))?;
        if fixed[0..2] != MAGIC {
            return Err(PackArcError::invalid_magic(MAGIC.to_vec(), fixed[0..2].to_vec()));
        }
        let method = fixed[2];
        if method != CM_DEFLATE {
            return Err(PackArcError::unsupported_method(format!(
                "gzip compression method {method}"
            )));
        }
        let header_flags = fixed[3];
        let mtime = u32::from_le_bytes([fixed[4], fixed[5], fixed[6], fixed[7]]);

        if header_flags & flags::FEXTRA != 0 {
            let mut len_bytes = [0u8; 2];
            src.read_exact(&mut len_bytes)
                .map_err(|e| PackArcError::from_read(e, 10))?;
            let mut extra = vec![0u8; u16::from_le_bytes(len_bytes) as usize];
            src.read_exact(&mut extra)
                .map_err(|e| PackArcError::from_read(e, 12))?;
        }
        let filename = if header_flags & flags::FNAME != 0 {
            Some(read_cstring(src)?)
        } else {
            None
        };
        let comment = if header_flags & flags::FCOMMENT != 0 {
            Some(read_cstring(src)?)
        } else {
            None
        };
        if header_flags & flags::FHCRC != 0 {
            let mut crc = [0u8; 2];
            src.read_exact(&mut crc)
                .map_err(|e| PackArcError::from_read(e, 0))?;
        }

        Ok(Self {
            method,
            flags: header_flags,
            mtime,
            xfl: fixed[8],
            os: fixed[9],
            filename,
            comment,
        })
    }
}

fn read_cstring<R: Read>(src: &mut R) -> Result<String> {
    let mut bytes = Vec::new();
    loop {
        let mut b = [0u8; 1];
        src.read_exact(&mut b)
            .map_err(|e| PackArcError::from_read(e, 0))?;
        if b[0] == 0 {
            break;
        }
        bytes.push(b[0]);
    }
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Compress `data` into a complete GZIP member.
pub fn compress(data: &[u8], level: u8) -> Result<Vec<u8>> {
    compress_with_header(data, level, &GzipHeader::default())
}

/// Compress `data` into a GZIP member with the given header.
pub fn compress_with_header(data: &[u8], level: u8, header: &GzipHeader) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    let mut header = header.clone();
    header.xfl = match level {
        9 => 2,
        1 => 4,
        _ => 0,
    };
    header.write(&mut out)?;
    out.extend_from_slice(&deflate(data, level)?);
    out.extend_from_slice(&Crc32::compute(data).to_le_bytes());
    out.extend_from_slice(&(data.len() as u32).to_le_bytes());
    debug!("gzip: {} -> {} bytes", data.len(), out.len());
    Ok(out)
}

/// Decompress one GZIP member, verifying the trailer.
pub fn decompress<R: Read>(src: &mut R) -> Result<Vec<u8>> {
    let header = GzipHeader::read(src)?;
    let mut reader = BitReader::new(src);
    let data = inflate_from(&mut reader)?;

    let mut trailer = [0u8; 8];
    reader.read_bytes(&mut trailer)?;
    let expected_crc = u32::from_le_bytes([trailer[0], trailer[1], trailer[2], trailer[3]]);
    let expected_size = u32::from_le_bytes([trailer[4], trailer[5], trailer[6], trailer[7]]);

    let computed = Crc32::compute(&data);
    if computed != expected_crc {
        return Err(PackArcError::checksum_mismatch(expected_crc, computed));
    }
    if expected_size != data.len() as u32 {
        return Err(PackArcError::malformed(
            data.len() as u64,
            format!("ISIZE {} does not match {} decoded bytes", expected_size, data.len()),
        ));
    }
    if let Some(name) = &header.filename {
        debug!("gzip: member name {name:?}");
    }
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip() {
        let data = b"gzip round trip payload, gzip round trip payload";
        let packed = compress(data, 6).unwrap();
        assert_eq!(&packed[..2], &MAGIC);
        assert_eq!(decompress(&mut &packed[..]).unwrap(), data);
    }

    #[test]
    fn test_roundtrip_empty() {
        let packed = compress(b"", 6).unwrap();
        assert_eq!(decompress(&mut &packed[..]).unwrap(), b"");
    }

    #[test]
    fn test_filename_header() {
        let header = GzipHeader::with_filename("notes.txt");
        let packed = compress_with_header(b"contents", 6, &header).unwrap();
        let parsed = GzipHeader::read(&mut &packed[..]).unwrap();
        assert_eq!(parsed.filename.as_deref(), Some("notes.txt"));
        assert_eq!(decompress(&mut &packed[..]).unwrap(), b"contents");
    }

    #[test]
    fn test_corrupt_crc_detected() {
        let data = b"checksummed payload";
        let mut packed = compress(data, 6).unwrap();
        let n = packed.len();
        packed[n - 6] ^= 0xFF; // inside the stored CRC
        let err = decompress(&mut &packed[..]).err().unwrap();
        assert!(matches!(err, PackArcError::ChecksumMismatch { .. }), "{err:?}");
    }

    #[test]
    fn test_wrong_magic() {
        let err = decompress(&mut &[0x50u8, 0x4B, 3, 4, 0, 0, 0, 0, 0, 0][..])
            .err()
            .unwrap();
        assert!(matches!(err, PackArcError::InvalidMagic { .. }));
    }

    #[test]
    fn test_bad_method() {
        let mut packed = compress(b"x", 6).unwrap();
        packed[2] = 9;
        let err = decompress(&mut &packed[..]).err().unwrap();
        assert!(matches!(err, PackArcError::UnsupportedMethod { .. }));
    }
}
