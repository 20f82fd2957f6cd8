//! Circular output window for the decoder.

use packarc_core::error::{PackArcError, Result};
use std::io::{Read, Write};

/// Decoder-side circular dictionary buffer.
///
/// Every wrap of the write head flushes the completed span to the sink, so
/// the buffer never needs to grow past the window size.
#[derive(Debug)]
pub struct OutputWindow {
    buf: Vec<u8>,
    window_size: u32,
    pos: u32,
    stream_pos: u32,
    train_size: u32,
}

impl OutputWindow {
    /// Allocate a window of `window_size` bytes.
    pub fn new(window_size: u32) -> Self {
        Self {
            buf: vec![0; window_size as usize],
            window_size,
            pos: 0,
            stream_pos: 0,
            train_size: 0,
        }
    }

    /// Reset for a new stream. With `keep_train` the pre-filled training
    /// data (solid mode) survives the reset.
    pub fn reset(&mut self, keep_train: bool) {
        if !keep_train {
            self.pos = 0;
            self.stream_pos = 0;
            self.train_size = 0;
        }
    }

    /// Bytes of training data currently in the window.
    pub fn train_size(&self) -> u32 {
        self.train_size
    }

    /// Pre-fill the window from a companion source (solid mode). Only the
    /// last `window_size` bytes are retained. Returns the retained size.
    pub fn train<R: Read>(&mut self, src: &mut R) -> Result<u32> {
        let mut tail: Vec<u8> = Vec::new();
        let mut chunk = vec![0u8; 1 << 16];
        loop {
            let n = src.read(&mut chunk)?;
            if n == 0 {
                break;
            }
            tail.extend_from_slice(&chunk[..n]);
            let window = self.window_size as usize;
            if tail.len() > 2 * window {
                let cut = tail.len() - window;
                tail.drain(..cut);
            }
        }
        let window = self.window_size as usize;
        let keep = tail.len().min(window);
        let src_tail = &tail[tail.len() - keep..];
        self.buf[..keep].copy_from_slice(src_tail);
        self.train_size = keep as u32;
        self.pos = if keep == window { 0 } else { keep as u32 };
        self.stream_pos = self.pos;
        Ok(self.train_size)
    }

    /// Flush completed bytes to the sink.
    pub fn flush<W: Write>(&mut self, sink: &mut W) -> Result<()> {
        let size = self.pos - self.stream_pos;
        if size > 0 {
            sink.write_all(&self.buf[self.stream_pos as usize..self.pos as usize])
                .map_err(PackArcError::sink_closed)?;
        }
        if self.pos >= self.window_size {
            self.pos = 0;
        }
        self.stream_pos = self.pos;
        Ok(())
    }

    /// Append one byte, flushing on wrap.
    #[inline]
    pub fn put_byte<W: Write>(&mut self, b: u8, sink: &mut W) -> Result<()> {
        self.buf[self.pos as usize] = b;
        self.pos += 1;
        if self.pos >= self.window_size {
            self.flush(sink)?;
        }
        Ok(())
    }

    /// Byte at `distance` (zero-based) behind the write head.
    #[inline]
    pub fn get_byte(&self, distance: u32) -> u8 {
        let idx = if self.pos > distance {
            self.pos - distance - 1
        } else {
            self.window_size - distance - 1 + self.pos
        };
        self.buf[idx as usize]
    }

    /// Copy `len` bytes from `distance` (zero-based) behind the head.
    /// Supports the self-overlapping `distance < len` case byte by byte.
    pub fn copy_block<W: Write>(&mut self, distance: u32, len: u32, sink: &mut W) -> Result<()> {
        let mut src = if self.pos > distance {
            self.pos - distance - 1
        } else {
            self.window_size - distance - 1 + self.pos
        };
        for _ in 0..len {
            if src >= self.window_size {
                src = 0;
            }
            let b = self.buf[src as usize];
            src += 1;
            self.put_byte(b, sink)?;
        }
        Ok(())
    }
}
