//! Range coder for LZMA compression.
//!
//! The range coder is an entropy coding method similar to arithmetic coding.
//! LZMA uses a specific variant with:
//! - 32-bit range tracking
//! - Normalization when range drops below 2^24
//! - 11-bit probability model (2048 = 50%)
//!
//! Both sides renormalize once after every coded bit. A single shift is
//! always enough because a bit never shrinks the range by more than a
//! factor of 2^6, so `range >= 2^24` holds between operations. It also
//! makes the decoder consume exactly the bytes the encoder produced.

use oxilzma_core::error::{OxiLzmaError, Result};
use std::io::{self, Read, Write};

/// Number of bits in probability model.
pub const PROB_BITS: u32 = 11;

/// Initial probability (50%).
pub const PROB_INIT: u16 = 1 << (PROB_BITS - 1);

/// Probability scale.
pub const PROB_MAX: u16 = 1 << PROB_BITS;

/// Number of bits to shift for probability update.
pub const MOVE_BITS: u32 = 5;

/// Top value for range normalization.
pub const TOP_VALUE: u32 = 1 << 24;

/// Range decoder for LZMA decompression.
#[derive(Debug)]
pub struct RangeDecoder<R: Read> {
    reader: R,
    range: u32,
    code: u32,
    /// Compressed bytes consumed so far.
    position: u64,
}

impl<R: Read> RangeDecoder<R> {
    /// Create a new range decoder, consuming the 5 initial bytes.
    pub fn new(reader: R) -> Result<Self> {
        let mut rc = Self {
            reader,
            range: 0xFFFF_FFFF,
            code: 0,
            position: 0,
        };

        // The first byte is always zero
        if rc.next_byte()? != 0x00 {
            return Err(OxiLzmaError::corrupted(0, "invalid range coder start byte"));
        }
        for _ in 0..4 {
            rc.code = (rc.code << 8) | rc.next_byte()? as u32;
        }

        Ok(rc)
    }

    /// Number of compressed bytes consumed so far.
    pub fn position(&self) -> u64 {
        self.position
    }

    fn next_byte(&mut self) -> Result<u8> {
        let mut buf = [0u8; 1];
        loop {
            match self.reader.read(&mut buf) {
                Ok(0) => return Err(OxiLzmaError::unexpected_eof(self.position)),
                Ok(_) => {
                    self.position += 1;
                    return Ok(buf[0]);
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Normalize the range (refill when range gets small).
    #[inline]
    fn normalize(&mut self) -> Result<()> {
        if self.range < TOP_VALUE {
            self.range <<= 8;
            self.code = (self.code << 8) | self.next_byte()? as u32;
        }
        debug_assert!(self.range >= TOP_VALUE);
        Ok(())
    }

    /// Decode a single bit with the given probability.
    #[inline]
    pub fn decode_bit(&mut self, prob: &mut u16) -> Result<u32> {
        let bound = (self.range >> PROB_BITS) * (*prob as u32);

        let bit = if self.code < bound {
            self.range = bound;
            *prob += (PROB_MAX - *prob) >> MOVE_BITS;
            0
        } else {
            self.range -= bound;
            self.code -= bound;
            *prob -= *prob >> MOVE_BITS;
            1
        };

        self.normalize()?;
        Ok(bit)
    }

    /// Decode a bit with fixed 50% probability.
    pub fn decode_direct_bit(&mut self) -> Result<u32> {
        self.range >>= 1;
        self.code = self.code.wrapping_sub(self.range);

        let bit = if (self.code as i32) < 0 {
            self.code = self.code.wrapping_add(self.range);
            0
        } else {
            1
        };

        self.normalize()?;
        Ok(bit)
    }

    /// Decode multiple bits with fixed probability, most significant first.
    pub fn decode_direct_bits(&mut self, count: u32) -> Result<u32> {
        let mut result = 0u32;
        for _ in 0..count {
            result = (result << 1) | self.decode_direct_bit()?;
        }
        Ok(result)
    }

    /// Decode a bit tree (reverse order).
    pub fn decode_bit_tree_reverse(&mut self, probs: &mut [u16], num_bits: u32) -> Result<u32> {
        let mut result = 0u32;
        let mut index = 1usize;

        for i in 0..num_bits {
            let bit = self.decode_bit(&mut probs[index])?;
            index = (index << 1) | bit as usize;
            result |= bit << i;
        }

        Ok(result)
    }

    /// Decode a bit tree (normal order).
    pub fn decode_bit_tree(&mut self, probs: &mut [u16], num_bits: u32) -> Result<u32> {
        let mut index = 1usize;

        for _ in 0..num_bits {
            let bit = self.decode_bit(&mut probs[index])?;
            index = (index << 1) | bit as usize;
        }

        Ok((index as u32) - (1 << num_bits))
    }

    /// Check if decoding finished on a clean boundary.
    ///
    /// After an end marker the code value must be exactly zero.
    pub fn is_finished_ok(&self) -> bool {
        self.code == 0
    }
}

/// Range encoder for LZMA compression.
///
/// Output accumulates in an internal buffer that the owner drains into its
/// sink with [`RangeEncoder::drain_to`].
#[derive(Debug)]
pub struct RangeEncoder {
    /// Output buffer.
    buffer: Vec<u8>,
    /// Bytes already drained from the buffer.
    drained: u64,
    /// Current range.
    range: u32,
    /// Low value (33 significant bits, bit 32 is the carry).
    low: u64,
    /// Cache byte.
    cache: u8,
    /// Pending bytes: the cache byte plus a run of 0xFF.
    cache_size: u64,
}

impl RangeEncoder {
    /// Create a new range encoder.
    pub fn new() -> Self {
        Self {
            buffer: Vec::with_capacity(1 << 16),
            drained: 0,
            range: 0xFFFF_FFFF,
            low: 0,
            cache: 0,
            cache_size: 1,
        }
    }

    /// Shift low and write bytes.
    ///
    /// A byte whose value could still change through a carry stays in the
    /// cache; runs of 0xFF after it are counted in `cache_size` and resolved
    /// together once the carry is known.
    fn shift_low(&mut self) {
        if self.low < 0xFF00_0000 || self.low > 0xFFFF_FFFF {
            let carry = (self.low >> 32) as u8;
            let mut tmp = self.cache;

            loop {
                self.buffer.push(tmp.wrapping_add(carry));
                tmp = 0xFF;
                self.cache_size -= 1;
                if self.cache_size == 0 {
                    break;
                }
            }

            self.cache = (self.low >> 24) as u8;
        }

        self.cache_size += 1;
        self.low = (self.low << 8) & 0xFFFF_FFFF;
    }

    /// Normalize the range.
    #[inline]
    fn normalize(&mut self) {
        if self.range < TOP_VALUE {
            self.range <<= 8;
            self.shift_low();
        }
        debug_assert!(self.range >= TOP_VALUE);
    }

    /// Encode a single bit with the given probability.
    #[inline]
    pub fn encode_bit(&mut self, prob: &mut u16, bit: u32) {
        let bound = (self.range >> PROB_BITS) * (*prob as u32);

        if bit == 0 {
            self.range = bound;
            *prob += (PROB_MAX - *prob) >> MOVE_BITS;
        } else {
            self.low += bound as u64;
            self.range -= bound;
            *prob -= *prob >> MOVE_BITS;
        }

        self.normalize();
    }

    /// Encode a bit with fixed 50% probability.
    pub fn encode_direct_bit(&mut self, bit: u32) {
        self.range >>= 1;
        if bit != 0 {
            self.low += self.range as u64;
        }
        self.normalize();
    }

    /// Encode multiple bits with fixed probability, most significant first.
    pub fn encode_direct_bits(&mut self, value: u32, count: u32) {
        for i in (0..count).rev() {
            self.encode_direct_bit((value >> i) & 1);
        }
    }

    /// Encode a bit tree (reverse order).
    pub fn encode_bit_tree_reverse(&mut self, probs: &mut [u16], num_bits: u32, value: u32) {
        let mut index = 1usize;

        for i in 0..num_bits {
            let bit = (value >> i) & 1;
            self.encode_bit(&mut probs[index], bit);
            index = (index << 1) | bit as usize;
        }
    }

    /// Encode a bit tree (normal order).
    pub fn encode_bit_tree(&mut self, probs: &mut [u16], num_bits: u32, value: u32) {
        let mut index = 1usize;

        for i in (0..num_bits).rev() {
            let bit = (value >> i) & 1;
            self.encode_bit(&mut probs[index], bit);
            index = (index << 1) | bit as usize;
        }
    }

    /// Push every pending byte out of the coder.
    pub fn flush(&mut self) {
        for _ in 0..5 {
            self.shift_low();
        }
    }

    /// Write buffered output to `writer` and clear the buffer.
    pub fn drain_to<W: Write>(&mut self, writer: &mut W) -> io::Result<()> {
        if !self.buffer.is_empty() {
            writer.write_all(&self.buffer)?;
            self.drained += self.buffer.len() as u64;
            self.buffer.clear();
        }
        Ok(())
    }

    /// Bytes already written out with [`RangeEncoder::drain_to`].
    pub fn drained(&self) -> u64 {
        self.drained
    }

    /// Bytes produced so far, counting the ones still held in the cache.
    pub fn processed_size(&self) -> u64 {
        self.drained + self.buffer.len() as u64 + self.cache_size + 4
    }

    /// Flush and return all encoded data still held by the coder.
    pub fn finish(mut self) -> Vec<u8> {
        self.flush();
        self.buffer
    }
}

impl Default for RangeEncoder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_prob_constants() {
        assert_eq!(PROB_INIT, 1024);
        assert_eq!(PROB_MAX, 2048);
    }

    #[test]
    fn test_range_encoder_basic() {
        let encoder = RangeEncoder::new();
        assert_eq!(encoder.range, 0xFFFF_FFFF);
        assert_eq!(encoder.finish(), vec![0, 0, 0, 0, 0]);
    }

    #[test]
    fn test_encode_decode_bits() {
        let mut encoder = RangeEncoder::new();
        let mut prob = PROB_INIT;

        encoder.encode_bit(&mut prob, 0);
        encoder.encode_bit(&mut prob, 1);
        encoder.encode_bit(&mut prob, 0);
        encoder.encode_bit(&mut prob, 1);

        let encoded = encoder.finish();
        assert_eq!(encoded[0], 0);

        let mut decoder = RangeDecoder::new(Cursor::new(encoded)).unwrap();
        let mut prob = PROB_INIT;

        assert_eq!(decoder.decode_bit(&mut prob).unwrap(), 0);
        assert_eq!(decoder.decode_bit(&mut prob).unwrap(), 1);
        assert_eq!(decoder.decode_bit(&mut prob).unwrap(), 0);
        assert_eq!(decoder.decode_bit(&mut prob).unwrap(), 1);
    }

    #[test]
    fn test_skewed_bits_consume_all_bytes() {
        // A long run of likely bits followed by surprises exercises the
        // carry cache and 0xFF runs.
        let mut bits = Vec::new();
        for i in 0..20_000u32 {
            bits.push(if i % 997 == 0 { 1 } else { 0 });
        }

        let mut encoder = RangeEncoder::new();
        let mut prob = PROB_INIT;
        for &bit in &bits {
            encoder.encode_bit(&mut prob, bit);
        }
        encoder.encode_direct_bits(0x2AD, 10);
        let encoded = encoder.finish();
        let total = encoded.len() as u64;

        let mut decoder = RangeDecoder::new(Cursor::new(encoded)).unwrap();
        let mut prob = PROB_INIT;
        for &bit in &bits {
            assert_eq!(decoder.decode_bit(&mut prob).unwrap(), bit);
        }
        assert_eq!(decoder.decode_direct_bits(10).unwrap(), 0x2AD);
        assert_eq!(decoder.position(), total);
        assert!(decoder.is_finished_ok());
    }

    #[test]
    fn test_bit_trees() {
        let mut encoder = RangeEncoder::new();
        let mut probs = [PROB_INIT; 64];
        let mut rev = [PROB_INIT; 16];
        for v in 0..64 {
            encoder.encode_bit_tree(&mut probs, 6, v);
            encoder.encode_bit_tree_reverse(&mut rev, 4, v & 15);
        }
        let encoded = encoder.finish();

        let mut decoder = RangeDecoder::new(Cursor::new(encoded)).unwrap();
        let mut probs = [PROB_INIT; 64];
        let mut rev = [PROB_INIT; 16];
        for v in 0..64 {
            assert_eq!(decoder.decode_bit_tree(&mut probs, 6).unwrap(), v);
            assert_eq!(decoder.decode_bit_tree_reverse(&mut rev, 4).unwrap(), v & 15);
        }
    }

    #[test]
    fn test_probability_stays_in_range() {
        let mut encoder = RangeEncoder::new();
        let mut zero = PROB_INIT;
        let mut one = PROB_INIT;
        for _ in 0..10_000 {
            encoder.encode_bit(&mut zero, 0);
            encoder.encode_bit(&mut one, 1);
        }
        assert!(zero > 0 && zero < PROB_MAX);
        assert!(one > 0 && one < PROB_MAX);
    }

    #[test]
    fn test_bad_start_byte() {
        let data = vec![1u8, 0, 0, 0, 0];
        let err = RangeDecoder::new(Cursor::new(data)).unwrap_err();
        assert!(matches!(err, OxiLzmaError::CorruptedData { .. }));
    }

    #[test]
    fn test_truncated_input() {
        let err = RangeDecoder::new(Cursor::new(vec![0u8, 0])).unwrap_err();
        assert!(err.is_truncation());
    }

    #[test]
    fn test_drain_and_processed_size() {
        let mut encoder = RangeEncoder::new();
        let mut prob = PROB_INIT;
        for i in 0..4096u32 {
            encoder.encode_bit(&mut prob, i & 1);
        }
        let mut sink = Vec::new();
        encoder.drain_to(&mut sink).unwrap();
        assert!(!sink.is_empty());
        let before = encoder.processed_size();
        assert!(before >= sink.len() as u64);

        let rest = encoder.finish();
        sink.extend_from_slice(&rest);
        assert_eq!(sink[0], 0);
    }
}
