//! Sliding output window for the decoder.
//!
//! A ring buffer of up to the dictionary size. Decoded bytes go into the
//! ring so matches can copy from them, and the ring is flushed to the sink
//! whenever it fills.
//!
//! The buffer starts small and doubles as output arrives, so a header that
//! declares a huge dictionary costs nothing until that much data is decoded.
//! It only wraps once it has reached its full size.

use oxilzma_core::error::{OxiLzmaError, Result};
use std::io::{self, Read, Write};

/// First allocation of the ring.
const INITIAL_SIZE: usize = 1 << 16;

/// Output ring buffer.
#[derive(Debug)]
pub struct OutWindow {
    buffer: Vec<u8>,
    /// Size the ring grows to before it starts wrapping.
    max_size: usize,
    /// Next write position in the ring.
    pos: usize,
    /// First byte not yet written to the sink.
    stream_pos: usize,
    /// Bytes pre-loaded with [`OutWindow::train`].
    train_size: u32,
}

impl OutWindow {
    /// Create a window that holds up to `window_size` bytes of history.
    pub fn new(window_size: u32) -> Self {
        let max_size = (window_size as usize).max(1);
        Self {
            buffer: vec![0u8; max_size.min(INITIAL_SIZE)],
            max_size,
            pos: 0,
            stream_pos: 0,
            train_size: 0,
        }
    }

    /// Bytes currently allocated for the ring.
    pub fn allocated(&self) -> usize {
        self.buffer.len()
    }

    /// Bytes of history pre-loaded before decoding.
    pub fn train_size(&self) -> u32 {
        self.train_size
    }

    /// Forget the history, including any trained bytes.
    pub fn reset(&mut self) {
        self.pos = 0;
        self.stream_pos = 0;
        self.train_size = 0;
    }

    /// Make room at the end of a full buffer: grow it, or wrap to the start
    /// once it is at its full size.
    fn advance_end(&mut self) {
        if self.buffer.len() < self.max_size {
            let new_len = (self.buffer.len() * 2).min(self.max_size);
            self.buffer.resize(new_len, 0);
        } else {
            self.pos = 0;
        }
    }

    /// Pre-load the window with the tail of `reader`.
    ///
    /// Only the last `window_size` bytes are kept. Trained bytes are history
    /// for matches but are never written to the sink.
    pub fn train<R: Read>(&mut self, reader: &mut R) -> Result<u32> {
        self.pos = 0;
        let mut total = 0u64;
        loop {
            if self.pos == self.buffer.len() {
                self.advance_end();
            }
            match reader.read(&mut self.buffer[self.pos..]) {
                Ok(0) => break,
                Ok(n) => {
                    total += n as u64;
                    self.pos += n;
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        if self.pos == self.buffer.len() {
            self.advance_end();
        }
        self.train_size = total.min(self.max_size as u64) as u32;
        self.stream_pos = self.pos;
        Ok(self.train_size)
    }

    /// Write pending bytes to the sink.
    pub fn flush<W: Write>(&mut self, writer: &mut W) -> Result<()> {
        if self.pos > self.stream_pos {
            writer.write_all(&self.buffer[self.stream_pos..self.pos])?;
        }
        if self.pos >= self.buffer.len() {
            self.advance_end();
        }
        self.stream_pos = self.pos;
        Ok(())
    }

    /// Append one byte.
    #[inline]
    pub fn put_byte<W: Write>(&mut self, byte: u8, writer: &mut W) -> Result<()> {
        self.buffer[self.pos] = byte;
        self.pos += 1;
        if self.pos >= self.buffer.len() {
            self.flush(writer)?;
        }
        Ok(())
    }

    /// Byte `distance + 1` positions back.
    #[inline]
    pub fn get_byte(&self, distance: u32) -> u8 {
        let distance = distance as usize + 1;
        let index = if distance <= self.pos {
            self.pos - distance
        } else {
            self.pos + self.buffer.len() - distance
        };
        self.buffer[index]
    }

    /// Copy `len` bytes starting `distance + 1` positions back.
    ///
    /// Copies byte by byte, so a source overlapping the destination repeats
    /// the pattern.
    pub fn copy_block<W: Write>(&mut self, distance: u32, len: u32, writer: &mut W) -> Result<()> {
        let distance = distance as usize + 1;
        if distance > self.buffer.len() {
            return Err(OxiLzmaError::corrupted(
                0,
                format!("match distance {} exceeds the window", distance),
            ));
        }
        let mut src = if distance <= self.pos {
            self.pos - distance
        } else {
            self.pos + self.buffer.len() - distance
        };
        for _ in 0..len {
            if src >= self.buffer.len() {
                src = 0;
            }
            self.buffer[self.pos] = self.buffer[src];
            self.pos += 1;
            src += 1;
            if self.pos >= self.buffer.len() {
                self.flush(writer)?;
            }
        }
        Ok(())
    }
}
