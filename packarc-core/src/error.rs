//! Error types for PackArc operations.
//!
//! One error enum covers all crates in the workspace: configuration
//! validation, malformed compressed streams, archive container errors, and
//! the byte-stream failure modes (`SinkClosed`, `SourceExhausted`).

use std::io;
use thiserror::Error;

/// The main error type for PackArc operations.
#[derive(Debug, Error)]
pub enum PackArcError {
    /// I/O error from an underlying reader/writer.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A user-supplied option is out of range.
    ///
    /// Detected during configuration, before any byte is emitted.
    #[error("invalid configuration: {parameter} {message}")]
    Config {
        /// Name of the offending parameter.
        parameter: &'static str,
        /// What is wrong with it.
        message: String,
    },

    /// The decoder encountered a structurally invalid stream.
    #[error("malformed input at offset {offset}: {message}")]
    Malformed {
        /// Byte offset (of decoded output where known, else input) at which
        /// the corruption was detected.
        offset: u64,
        /// Description of the corruption.
        message: String,
    },

    /// The byte sink cannot accept further bytes.
    #[error("sink closed: {0}")]
    SinkClosed(io::Error),

    /// The byte source ended before the declared uncompressed size.
    #[error("source exhausted: expected {expected} bytes, got {actual}")]
    SourceExhausted {
        /// Declared number of bytes.
        expected: u64,
        /// Bytes actually read.
        actual: u64,
    },

    /// API misuse, e.g. encoding before a dictionary size has been set.
    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    /// Invalid magic number in a container header.
    #[error("invalid magic number: expected {expected:02x?}, found {found:02x?}")]
    InvalidMagic {
        /// Expected magic bytes.
        expected: Vec<u8>,
        /// Actual magic bytes found.
        found: Vec<u8>,
    },

    /// Invalid container header.
    #[error("invalid header: {message}")]
    InvalidHeader {
        /// Description of the header error.
        message: String,
    },

    /// Checksum mismatch while verifying decoded data.
    #[error("checksum mismatch: expected {expected:#x}, computed {computed:#x}")]
    ChecksumMismatch {
        /// Expected value from the stream.
        expected: u32,
        /// Value computed from the data.
        computed: u32,
    },

    /// Unsupported compression method in a container.
    #[error("unsupported compression method: {method}")]
    UnsupportedMethod {
        /// The method identifier.
        method: String,
    },

    /// Entry not found in an archive.
    #[error("entry not found: {name}")]
    EntryNotFound {
        /// Name of the missing entry.
        name: String,
    },
}

/// Result type alias for PackArc operations.
pub type Result<T> = std::result::Result<T, PackArcError>;

impl PackArcError {
    /// Create a configuration error for a named parameter.
    pub fn config(parameter: &'static str, message: impl Into<String>) -> Self {
        Self::Config {
            parameter,
            message: message.into(),
        }
    }

    /// Create a malformed-input error.
    pub fn malformed(offset: u64, message: impl Into<String>) -> Self {
        Self::Malformed {
            offset,
            message: message.into(),
        }
    }

    /// Create a sink-closed error from a failed write.
    pub fn sink_closed(source: io::Error) -> Self {
        Self::SinkClosed(source)
    }

    /// Create a source-exhausted error.
    pub fn source_exhausted(expected: u64, actual: u64) -> Self {
        Self::SourceExhausted { expected, actual }
    }

    /// Create an invalid-operation error.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation(message.into())
    }

    /// Create an invalid-magic error.
    pub fn invalid_magic(expected: impl Into<Vec<u8>>, found: impl Into<Vec<u8>>) -> Self {
        Self::InvalidMagic {
            expected: expected.into(),
            found: found.into(),
        }
    }

    /// Create an invalid-header error.
    pub fn invalid_header(message: impl Into<String>) -> Self {
        Self::InvalidHeader {
            message: message.into(),
        }
    }

    /// Create a checksum-mismatch error.
    pub fn checksum_mismatch(expected: u32, computed: u32) -> Self {
        Self::ChecksumMismatch { expected, computed }
    }

    /// Create an unsupported-method error.
    pub fn unsupported_method(method: impl Into<String>) -> Self {
        Self::UnsupportedMethod {
            method: method.into(),
        }
    }

    /// Create an entry-not-found error.
    pub fn entry_not_found(name: impl Into<String>) -> Self {
        Self::EntryNotFound { name: name.into() }
    }

    /// Map an I/O error seen while reading compressed data.
    ///
    /// An unexpected EOF inside a compressed stream means the stream is
    /// truncated, which is a malformed-input condition rather than an
    /// environment failure.
    pub fn from_read(err: io::Error, offset: u64) -> Self {
        if err.kind() == io::ErrorKind::UnexpectedEof {
            Self::malformed(offset, "truncated stream")
        } else {
            Self::Io(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = PackArcError::config("pb", "must be at most 4");
        assert!(err.to_string().contains("pb"));

        let err = PackArcError::malformed(42, "impossible distance");
        assert!(err.to_string().contains("42"));

        let err = PackArcError::checksum_mismatch(0x12345678, 0xDEADBEEF);
        assert!(err.to_string().contains("checksum mismatch"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let err: PackArcError = io_err.into();
        assert!(matches!(err, PackArcError::Io(_)));
    }

    #[test]
    fn test_truncation_maps_to_malformed() {
        let io_err = io::Error::new(io::ErrorKind::UnexpectedEof, "eof");
        let err = PackArcError::from_read(io_err, 7);
        assert!(matches!(err, PackArcError::Malformed { offset: 7, .. }));
    }
}
