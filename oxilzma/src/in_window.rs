//! Sliding input window for the encoder.
//!
//! The window reads the source in large blocks and keeps `keep_size_before`
//! bytes of history behind the current position and `keep_size_after` bytes
//! of lookahead in front of it. When the position gets too close to the end
//! of the buffer, the live region is moved back to the start.
//!
//! Positions are 32-bit counters relative to `buffer_offset`; the physical
//! index of position `p` is `buffer_offset + p` (wrapping).

use oxilzma_core::error::Result;
use std::io::{self, Read};

/// Input window over a byte source.
#[derive(Debug)]
pub struct InWindow<R> {
    reader: R,
    buffer: Vec<u8>,
    buffer_offset: u32,
    keep_size_before: u32,
    keep_size_after: u32,
    /// Physical index past which the lookahead no longer fits.
    pointer_to_last_safe_position: u32,
    /// Current position.
    pos: u32,
    /// Position after which a refill is needed.
    pos_limit: u32,
    /// Position of the first byte not yet read from the source.
    stream_pos: u32,
    stream_end_reached: bool,
}

impl<R: Read> InWindow<R> {
    /// Allocate a window of `keep_size_before + keep_size_after + keep_size_reserve` bytes.
    pub fn new(reader: R, keep_size_before: u32, keep_size_after: u32, keep_size_reserve: u32) -> Self {
        let block_size = keep_size_before + keep_size_after + keep_size_reserve;
        Self {
            reader,
            buffer: vec![0u8; block_size as usize],
            buffer_offset: 0,
            keep_size_before,
            keep_size_after,
            pointer_to_last_safe_position: block_size - keep_size_after,
            pos: 0,
            pos_limit: 0,
            stream_pos: 0,
            stream_end_reached: false,
        }
    }

    /// Reset positions, place `prefix` in front of the source and fill the buffer.
    ///
    /// `prefix` must be shorter than `keep_size_before`.
    pub fn init(&mut self, prefix: &[u8]) -> Result<()> {
        debug_assert!(prefix.len() < self.keep_size_before as usize);
        self.buffer_offset = 0;
        self.pos = 0;
        self.pos_limit = 0;
        self.buffer[..prefix.len()].copy_from_slice(prefix);
        self.stream_pos = prefix.len() as u32;
        self.stream_end_reached = false;
        self.read_block()
    }

    #[inline]
    fn index(&self, pos: u32) -> usize {
        self.buffer_offset.wrapping_add(pos) as usize
    }

    /// Move the live region to the start of the buffer.
    fn move_block(&mut self) {
        let mut offset = self
            .buffer_offset
            .wrapping_add(self.pos)
            .wrapping_sub(self.keep_size_before);
        // move_pos advances one byte past the kept history
        if offset > 0 {
            offset -= 1;
        }
        let num_bytes = self
            .buffer_offset
            .wrapping_add(self.stream_pos)
            .wrapping_sub(offset) as usize;
        let offset_idx = offset as usize;
        self.buffer.copy_within(offset_idx..offset_idx + num_bytes, 0);
        self.buffer_offset = self.buffer_offset.wrapping_sub(offset);
    }

    /// Read from the source until the buffer is full or the source ends.
    fn read_block(&mut self) -> Result<()> {
        if self.stream_end_reached {
            return Ok(());
        }
        loop {
            let start = self.index(self.stream_pos);
            if start >= self.buffer.len() {
                return Ok(());
            }
            match self.reader.read(&mut self.buffer[start..]) {
                Ok(0) => {
                    self.pos_limit = self.stream_pos;
                    if self.index(self.pos_limit) > self.pointer_to_last_safe_position as usize {
                        self.pos_limit = self
                            .pointer_to_last_safe_position
                            .wrapping_sub(self.buffer_offset);
                    }
                    self.stream_end_reached = true;
                    return Ok(());
                }
                Ok(n) => {
                    self.stream_pos += n as u32;
                    if self.stream_pos >= self.pos + self.keep_size_after {
                        self.pos_limit = self.stream_pos - self.keep_size_after;
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Advance the position by one byte, refilling when needed.
    pub fn move_pos(&mut self) -> Result<()> {
        self.pos += 1;
        if self.pos <= self.pos_limit {
            return Ok(());
        }
        if self.index(self.pos) > self.pointer_to_last_safe_position as usize {
            self.move_block();
        }
        self.read_block()
    }

    /// Byte at `index` relative to the current position.
    #[inline]
    pub fn get_index_byte(&self, index: i32) -> u8 {
        self.buffer[self.index(self.pos.wrapping_add_signed(index))]
    }

    /// Length of the match between `index` and `index - distance - 1`, capped at `limit`.
    ///
    /// Once the source is exhausted the limit is clipped to the available bytes.
    pub fn get_match_len(&self, index: i32, distance: u32, limit: u32) -> u32 {
        let start = self.pos.wrapping_add_signed(index);
        let mut limit = limit;
        if self.stream_end_reached && start + limit > self.stream_pos {
            limit = self.stream_pos - start;
        }
        let cur = self.index(start);
        let back = cur - (distance as usize + 1);
        let limit = limit as usize;
        let cur_bytes = &self.buffer[cur..cur + limit];
        let back_bytes = &self.buffer[back..back + limit];
        cur_bytes
            .iter()
            .zip(back_bytes)
            .take_while(|(a, b)| a == b)
            .count() as u32
    }

    /// Bytes between the current position and the end of the read data.
    #[inline]
    pub fn num_available_bytes(&self) -> u32 {
        self.stream_pos - self.pos
    }

    /// Shift every position down by `sub_value` (negative values shift up).
    pub fn reduce_offsets(&mut self, sub_value: i32) {
        let sub = sub_value as u32;
        self.buffer_offset = self.buffer_offset.wrapping_add(sub);
        self.pos_limit = self.pos_limit.wrapping_sub(sub);
        self.pos = self.pos.wrapping_sub(sub);
        self.stream_pos = self.stream_pos.wrapping_sub(sub);
    }

    /// Current position.
    #[inline]
    pub fn pos(&self) -> u32 {
        self.pos
    }

    /// Position of the first byte not yet read.
    #[inline]
    pub fn stream_pos(&self) -> u32 {
        self.stream_pos
    }

    /// Byte at absolute position `pos`.
    #[inline]
    pub fn byte_at(&self, pos: u32) -> u8 {
        self.buffer[self.index(pos)]
    }

    /// Bytes starting at absolute position `pos`.
    #[inline]
    pub fn bytes_from(&self, pos: u32) -> &[u8] {
        &self.buffer[self.index(pos)..]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    /// Reader that hands out at most `chunk` bytes per call.
    struct Trickle<'a> {
        data: &'a [u8],
        chunk: usize,
    }

    impl Read for Trickle<'_> {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let n = self.chunk.min(buf.len()).min(self.data.len());
            buf[..n].copy_from_slice(&self.data[..n]);
            self.data = &self.data[n..];
            Ok(n)
        }
    }

    #[test]
    fn test_reads_whole_small_input() {
        let data = b"hello window".to_vec();
        let mut window = InWindow::new(Cursor::new(data.clone()), 64, 16, 64);
        window.init(&[]).unwrap();
        assert_eq!(window.num_available_bytes(), data.len() as u32);
        for (i, &b) in data.iter().enumerate() {
            assert_eq!(window.get_index_byte(0), b, "byte {}", i);
            window.move_pos().unwrap();
        }
        assert_eq!(window.num_available_bytes(), 0);
    }

    #[test]
    fn test_sliding_keeps_history() {
        let data: Vec<u8> = (0..10_000u32).map(|i| (i * 7 % 251) as u8).collect();
        let reader = Trickle {
            data: &data,
            chunk: 100,
        };
        let mut window = InWindow::new(reader, 256, 32, 128);
        window.init(&[]).unwrap();
        for i in 0..data.len() {
            assert_eq!(window.get_index_byte(0), data[i]);
            if i >= 200 {
                assert_eq!(window.get_index_byte(-200), data[i - 200]);
            }
            window.move_pos().unwrap();
        }
        assert_eq!(window.num_available_bytes(), 0);
    }

    #[test]
    fn test_match_len() {
        let data = b"abcabcabcX".to_vec();
        let mut window = InWindow::new(Cursor::new(data), 64, 16, 64);
        window.init(&[]).unwrap();
        for _ in 0..3 {
            window.move_pos().unwrap();
        }
        // "abcabcX" matches 3 bytes back for 6 bytes
        assert_eq!(window.get_match_len(0, 2, 16), 6);
        assert_eq!(window.get_match_len(0, 2, 4), 4);
        // clipped to the end of the stream
        assert_eq!(window.get_match_len(0, 2, 100), 6);
        assert_eq!(window.get_match_len(0, 0, 16), 0);
    }

    #[test]
    fn test_prefix_is_visible_before_source() {
        let mut window = InWindow::new(Cursor::new(b"xyz".to_vec()), 64, 16, 64);
        window.init(b"abc").unwrap();
        assert_eq!(window.num_available_bytes(), 6);
        for _ in 0..3 {
            window.move_pos().unwrap();
        }
        assert_eq!(window.get_index_byte(0), b'x');
        assert_eq!(window.get_index_byte(-3), b'a');
    }

    #[test]
    fn test_reduce_offsets_keeps_bytes() {
        let mut window = InWindow::new(Cursor::new(b"0123456789".to_vec()), 64, 16, 64);
        window.init(&[]).unwrap();
        window.reduce_offsets(-1);
        assert_eq!(window.pos(), 1);
        assert_eq!(window.get_index_byte(0), b'0');
        assert_eq!(window.byte_at(1), b'0');
        assert_eq!(window.stream_pos(), 11);
    }
}
