//! Sliding input window for the encoder.
//!
//! The window owns one flat buffer. Three logical cursors move through it:
//! `pos` (the read head the match finder works at), `stream_pos` (the first
//! byte not yet read from the source) and `buffer_offset`, the base that maps
//! logical positions to buffer indices. Logical positions only ever grow;
//! `move_block` slides live bytes back to the start of the buffer and folds
//! the distance into `buffer_offset`.
//!
//! `buffer_offset` is kept as wrapping `u32` arithmetic: the match finder
//! shifts all logical positions up by one at init so that position zero can
//! serve as its empty-slot marker, which leaves `buffer_offset` parked at
//! `u32::MAX` until the first `move_block`.

use packarc_core::error::Result;
use std::io::Read;

/// Encoder-side sliding window over a byte source.
#[derive(Debug)]
pub struct InputWindow {
    pub(crate) buf: Vec<u8>,
    block_size: u32,
    /// Read head (logical).
    pub(crate) pos: u32,
    /// First logical position not yet filled from the source.
    pub(crate) stream_pos: u32,
    /// Maps logical positions to buffer indices (wrapping).
    pub(crate) buffer_offset: u32,
    pos_limit: u32,
    keep_size_before: u32,
    keep_size_after: u32,
    /// Highest buffer index the read head may reach before a move.
    last_safe_pos: u32,
    stream_end: bool,
}

impl InputWindow {
    /// Allocate a window keeping `keep_before` bytes of history and
    /// `keep_after` bytes of lookahead, plus slack so moves stay rare.
    pub fn new(keep_before: u32, keep_after: u32, reserve: u32) -> Self {
        let block_size = keep_before + keep_after + reserve;
        Self {
            buf: vec![0; block_size as usize],
            block_size,
            pos: 0,
            stream_pos: 0,
            buffer_offset: 0,
            pos_limit: 0,
            keep_size_before: keep_before,
            keep_size_after: keep_after,
            last_safe_pos: block_size - keep_after,
            stream_end: false,
        }
    }

    /// Reset the cursors and perform the initial fill.
    pub fn init<R: Read>(&mut self, src: &mut R) -> Result<()> {
        self.buffer_offset = 0;
        self.pos = 0;
        self.stream_pos = 0;
        self.pos_limit = 0;
        self.stream_end = false;
        self.read_block(src)
    }

    /// Whether the source has reported end of input.
    pub fn stream_ended(&self) -> bool {
        self.stream_end
    }

    /// Bytes available ahead of the read head.
    #[inline]
    pub fn num_available(&self) -> u32 {
        self.stream_pos - self.pos
    }

    /// Byte at `pos + index`.
    #[inline]
    pub fn get_index_byte(&self, index: i32) -> u8 {
        let idx = self
            .buffer_offset
            .wrapping_add(self.pos)
            .wrapping_add(index as u32);
        self.buf[idx as usize]
    }

    /// Length of the match of `distance` (zero-based) against the bytes
    /// starting at `pos + index`, capped at `limit` and at end of stream.
    pub fn get_match_len(&self, index: i32, distance: u32, mut limit: u32) -> u32 {
        if self.stream_end {
            let head = self.pos as i64 + index as i64;
            if head + limit as i64 > self.stream_pos as i64 {
                limit = (self.stream_pos as i64 - head).max(0) as u32;
            }
        }
        let back = distance as usize + 1;
        let pby = self
            .buffer_offset
            .wrapping_add(self.pos)
            .wrapping_add(index as u32) as usize;
        let mut i = 0usize;
        while (i as u32) < limit && self.buf[pby + i] == self.buf[pby + i - back] {
            i += 1;
        }
        i as u32
    }

    /// Advance the read head, refilling (and possibly sliding) the buffer.
    pub fn move_pos<R: Read>(&mut self, src: &mut R) -> Result<()> {
        self.pos += 1;
        if self.pos > self.pos_limit {
            let head = self.buffer_offset.wrapping_add(self.pos);
            if head > self.last_safe_pos {
                self.move_block();
            }
            self.read_block(src)?;
        }
        Ok(())
    }

    /// Shift all logical cursors down by `sub` (or up, when negative),
    /// compensating through `buffer_offset`.
    pub fn reduce_offsets(&mut self, sub: i32) {
        self.buffer_offset = self.buffer_offset.wrapping_add(sub as u32);
        self.pos_limit = self.pos_limit.wrapping_sub(sub as u32);
        self.pos = self.pos.wrapping_sub(sub as u32);
        self.stream_pos = self.stream_pos.wrapping_sub(sub as u32);
    }

    fn move_block(&mut self) {
        let mut offset = self
            .buffer_offset
            .wrapping_add(self.pos)
            .wrapping_sub(self.keep_size_before);
        // Keep one extra byte so the previous-byte context survives the move.
        if offset > 0 {
            offset -= 1;
        }
        let num_bytes = self
            .buffer_offset
            .wrapping_add(self.stream_pos)
            .wrapping_sub(offset);
        self.buf
            .copy_within(offset as usize..(offset + num_bytes) as usize, 0);
        self.buffer_offset = self.buffer_offset.wrapping_sub(offset);
    }

    fn read_block<R: Read>(&mut self, src: &mut R) -> Result<()> {
        if self.stream_end {
            return Ok(());
        }
        loop {
            let size = (0u32.wrapping_sub(self.buffer_offset))
                .wrapping_add(self.block_size)
                .wrapping_sub(self.stream_pos);
            if size == 0 {
                return Ok(());
            }
            let start = self.buffer_offset.wrapping_add(self.stream_pos) as usize;
            let n = src.read(&mut self.buf[start..start + size as usize])?;
            if n == 0 {
                self.pos_limit = self.stream_pos;
                let head = self.buffer_offset.wrapping_add(self.pos_limit);
                if head > self.last_safe_pos {
                    self.pos_limit = self.last_safe_pos.wrapping_sub(self.buffer_offset);
                }
                self.stream_end = true;
                return Ok(());
            }
            self.stream_pos += n as u32;
            if self.stream_pos >= self.pos + self.keep_size_after {
                self.pos_limit = self.stream_pos - self.keep_size_after;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_basic_fill_and_read() {
        let mut win = InputWindow::new(64, 16, 32);
        let mut src = Cursor::new(b"hello world".to_vec());
        win.init(&mut src).unwrap();
        assert!(win.stream_ended());
        assert_eq!(win.num_available(), 11);
        assert_eq!(win.get_index_byte(0), b'h');
        assert_eq!(win.get_index_byte(6), b'w');
    }

    #[test]
    fn test_match_len_respects_stream_end() {
        let mut win = InputWindow::new(64, 16, 32);
        let mut src = Cursor::new(b"abcabc".to_vec());
        win.init(&mut src).unwrap();
        for _ in 0..3 {
            win.move_pos(&mut src).unwrap();
        }
        // At pos 3, distance 2 (zero-based) matches "abc" but only 3 bytes remain.
        assert_eq!(win.get_match_len(0, 2, 100), 3);
    }

    #[test]
    fn test_move_block_preserves_history() {
        // Tiny buffer forces moves; history within keep_before must survive.
        let data: Vec<u8> = (0..200u8).collect();
        let mut win = InputWindow::new(32, 8, 4);
        let mut src = Cursor::new(data);
        win.init(&mut src).unwrap();
        for _ in 0..150 {
            win.move_pos(&mut src).unwrap();
        }
        assert_eq!(win.get_index_byte(0), 150);
        assert_eq!(win.get_index_byte(-10), 140);
    }
}
