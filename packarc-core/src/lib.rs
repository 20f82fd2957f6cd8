//! # PackArc Core
//!
//! Core components for the PackArc compression and archive library:
//!
//! - [`error`]: the workspace-wide error type and `Result` alias
//! - [`checksum`]: CRC-32 and Adler-32
//! - [`bitstream`]: LSB-first bit-level I/O (Deflate, LZW)
//! - [`progress`]: cooperative progress reporting for encoders
//! - [`entry`]: archive entry metadata
//!
//! ## Byte-stream conventions
//!
//! Every codec in the workspace consumes a synchronous [`std::io::Read`]
//! byte source (a zero-byte read means end of input) and produces into a
//! synchronous [`std::io::Write`] byte sink. Write failures surface as
//! [`error::PackArcError::SinkClosed`]; a source that ends before a declared
//! size surfaces as [`error::PackArcError::SourceExhausted`]. Nothing is
//! retried internally.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod bitstream;
pub mod checksum;
pub mod entry;
pub mod error;
pub mod progress;

pub use bitstream::{BitReader, BitWriter};
pub use checksum::{Adler32, CRC32_TABLE, Crc32};
pub use entry::{Entry, EntryKind};
pub use error::{PackArcError, Result};
pub use progress::Progress;
