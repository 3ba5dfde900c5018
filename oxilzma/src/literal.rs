//! Literal coding.
//!
//! Each literal is coded as 8 binary decisions walking a 256-leaf tree.
//! The tree is selected by `lp` low bits of the position and `lc` high
//! bits of the previous byte. Right after a match, the byte at `rep0`
//! steers the first decisions ("matched" literal) until the coded byte
//! diverges from it.

use crate::price::get_price;
use crate::range_coder::{PROB_INIT, RangeDecoder, RangeEncoder};
use oxilzma_core::error::Result;
use std::io::Read;

/// Probabilities per literal coder: 0x100 plain plus 2 x 0x100 matched.
const LITERAL_CODER_SIZE: usize = 0x300;

/// Literal decoder/encoder model.
#[derive(Debug, Clone)]
pub struct LiteralModel {
    /// Probability table for each literal state.
    pub probs: Vec<[u16; LITERAL_CODER_SIZE]>,
    lc: u32,
    pos_mask: u32,
}

impl LiteralModel {
    /// Create a new literal model.
    pub fn new(lc: u32, lp: u32) -> Self {
        Self {
            probs: vec![[PROB_INIT; LITERAL_CODER_SIZE]; 1 << (lc + lp)],
            lc,
            pos_mask: (1 << lp) - 1,
        }
    }

    /// Reset the model.
    pub fn reset(&mut self) {
        for state in &mut self.probs {
            state.fill(PROB_INIT);
        }
    }

    /// Get the literal state index.
    #[inline]
    pub fn get_state(&self, pos: u32, prev_byte: u8) -> usize {
        (((pos & self.pos_mask) << self.lc) + ((prev_byte as u32) >> (8 - self.lc))) as usize
    }

    /// Encode a literal with no match context.
    pub fn encode(&mut self, rc: &mut RangeEncoder, state: usize, symbol: u8) {
        let probs = &mut self.probs[state];
        let mut context = 1usize;
        for i in (0..8).rev() {
            let bit = ((symbol >> i) & 1) as u32;
            rc.encode_bit(&mut probs[context], bit);
            context = (context << 1) | bit as usize;
        }
    }

    /// Encode a literal that follows a match, using `match_byte` as context.
    pub fn encode_matched(
        &mut self,
        rc: &mut RangeEncoder,
        state: usize,
        match_byte: u8,
        symbol: u8,
    ) {
        let probs = &mut self.probs[state];
        let mut context = 1usize;
        let mut same = true;
        for i in (0..8).rev() {
            let bit = ((symbol >> i) & 1) as u32;
            let mut index = context;
            if same {
                let match_bit = ((match_byte >> i) & 1) as usize;
                index += (1 + match_bit) << 8;
                same = match_bit == bit as usize;
            }
            rc.encode_bit(&mut probs[index], bit);
            context = (context << 1) | bit as usize;
        }
    }

    /// Decode a normal literal (no match context).
    pub fn decode<R: Read>(&mut self, rc: &mut RangeDecoder<R>, state: usize) -> Result<u8> {
        let probs = &mut self.probs[state];
        let mut symbol = 1usize;

        while symbol < 0x100 {
            let bit = rc.decode_bit(&mut probs[symbol])?;
            symbol = (symbol << 1) | bit as usize;
        }

        Ok((symbol - 0x100) as u8)
    }

    /// Decode a literal with match byte context.
    pub fn decode_matched<R: Read>(
        &mut self,
        rc: &mut RangeDecoder<R>,
        state: usize,
        match_byte: u8,
    ) -> Result<u8> {
        let probs = &mut self.probs[state];
        let mut symbol = 1usize;
        let mut match_byte = match_byte as usize;

        while symbol < 0x100 {
            let match_bit = (match_byte >> 7) & 1;
            match_byte <<= 1;

            let bit = rc.decode_bit(&mut probs[((1 + match_bit) << 8) + symbol])?;
            symbol = (symbol << 1) | bit as usize;

            if bit as usize != match_bit {
                // Mismatch, continue without match context
                while symbol < 0x100 {
                    let bit = rc.decode_bit(&mut probs[symbol])?;
                    symbol = (symbol << 1) | bit as usize;
                }
                break;
            }
        }

        Ok((symbol - 0x100) as u8)
    }

    /// Estimated price of coding `symbol`.
    pub fn price(&self, state: usize, match_mode: bool, match_byte: u8, symbol: u8) -> u32 {
        let probs = &self.probs[state];
        let mut price = 0u32;
        let mut context = 1usize;
        let mut i = 8i32;

        if match_mode {
            while i > 0 {
                i -= 1;
                let match_bit = ((match_byte >> i) & 1) as usize;
                let bit = ((symbol >> i) & 1) as u32;
                price += get_price(probs[((1 + match_bit) << 8) + context], bit);
                context = (context << 1) | bit as usize;
                if match_bit != bit as usize {
                    break;
                }
            }
        }

        while i > 0 {
            i -= 1;
            let bit = ((symbol >> i) & 1) as u32;
            price += get_price(probs[context], bit);
            context = (context << 1) | bit as usize;
        }

        price
    }
}
