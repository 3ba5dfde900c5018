//! Match length coding.
//!
//! Lengths 2..=273 are coded in three tiers: a 3-bit tree per position
//! state for the first 8 values, another 3-bit tree per position state
//! for the next 8, and one shared 8-bit tree for the rest.

use crate::model::POS_STATES_MAX;
use crate::price::{get_bit_tree_price, price0, price1};
use crate::range_coder::{PROB_INIT, RangeDecoder, RangeEncoder};
use oxilzma_core::error::Result;
use std::io::Read;

/// Number of bits for low length coding.
pub const LEN_LOW_BITS: u32 = 3;
/// Number of bits for mid length coding.
pub const LEN_MID_BITS: u32 = 3;
/// Number of bits for high length coding.
pub const LEN_HIGH_BITS: u32 = 8;

/// Number of low length symbols.
pub const LEN_LOW_SYMBOLS: usize = 1 << LEN_LOW_BITS;
/// Number of mid length symbols.
pub const LEN_MID_SYMBOLS: usize = 1 << LEN_MID_BITS;
/// Number of high length symbols.
pub const LEN_HIGH_SYMBOLS: usize = 1 << LEN_HIGH_BITS;

/// Total number of length symbols.
pub const NUM_LEN_SYMBOLS: usize = LEN_LOW_SYMBOLS + LEN_MID_SYMBOLS + LEN_HIGH_SYMBOLS;

/// Length decoder/encoder model.
#[derive(Debug, Clone)]
pub struct LengthModel {
    /// Choice bit (low vs mid+high).
    pub choice: u16,
    /// Choice2 bit (mid vs high).
    pub choice2: u16,
    /// Low length probabilities (per position state).
    pub low: Vec<[u16; LEN_LOW_SYMBOLS]>,
    /// Mid length probabilities (per position state).
    pub mid: Vec<[u16; LEN_MID_SYMBOLS]>,
    /// High length probabilities (shared).
    pub high: [u16; LEN_HIGH_SYMBOLS],
}

impl LengthModel {
    /// Create a new length model.
    pub fn new(num_pos_states: usize) -> Self {
        Self {
            choice: PROB_INIT,
            choice2: PROB_INIT,
            low: vec![[PROB_INIT; LEN_LOW_SYMBOLS]; num_pos_states],
            mid: vec![[PROB_INIT; LEN_MID_SYMBOLS]; num_pos_states],
            high: [PROB_INIT; LEN_HIGH_SYMBOLS],
        }
    }

    /// Reset the model.
    pub fn reset(&mut self) {
        self.choice = PROB_INIT;
        self.choice2 = PROB_INIT;
        for arr in &mut self.low {
            arr.fill(PROB_INIT);
        }
        for arr in &mut self.mid {
            arr.fill(PROB_INIT);
        }
        self.high.fill(PROB_INIT);
    }

    /// Encode `symbol` (length minus 2).
    pub fn encode(&mut self, rc: &mut RangeEncoder, symbol: u32, pos_state: usize) {
        if symbol < LEN_LOW_SYMBOLS as u32 {
            rc.encode_bit(&mut self.choice, 0);
            rc.encode_bit_tree(&mut self.low[pos_state], LEN_LOW_BITS, symbol);
        } else {
            rc.encode_bit(&mut self.choice, 1);
            let symbol = symbol - LEN_LOW_SYMBOLS as u32;
            if symbol < LEN_MID_SYMBOLS as u32 {
                rc.encode_bit(&mut self.choice2, 0);
                rc.encode_bit_tree(&mut self.mid[pos_state], LEN_MID_BITS, symbol);
            } else {
                rc.encode_bit(&mut self.choice2, 1);
                rc.encode_bit_tree(
                    &mut self.high,
                    LEN_HIGH_BITS,
                    symbol - LEN_MID_SYMBOLS as u32,
                );
            }
        }
    }

    /// Decode a symbol (length minus 2).
    pub fn decode<R: Read>(&mut self, rc: &mut RangeDecoder<R>, pos_state: usize) -> Result<u32> {
        if rc.decode_bit(&mut self.choice)? == 0 {
            rc.decode_bit_tree(&mut self.low[pos_state], LEN_LOW_BITS)
        } else if rc.decode_bit(&mut self.choice2)? == 0 {
            let symbol = rc.decode_bit_tree(&mut self.mid[pos_state], LEN_MID_BITS)?;
            Ok(symbol + LEN_LOW_SYMBOLS as u32)
        } else {
            let symbol = rc.decode_bit_tree(&mut self.high, LEN_HIGH_BITS)?;
            Ok(symbol + (LEN_LOW_SYMBOLS + LEN_MID_SYMBOLS) as u32)
        }
    }

    /// Fill `prices[..num_symbols]` with the cost of every symbol.
    fn set_prices(&self, pos_state: usize, num_symbols: usize, prices: &mut [u32]) {
        let a0 = price0(self.choice);
        let a1 = price1(self.choice);
        let b0 = a1 + price0(self.choice2);
        let b1 = a1 + price1(self.choice2);

        for (i, price) in prices.iter_mut().enumerate().take(num_symbols) {
            *price = if i < LEN_LOW_SYMBOLS {
                a0 + get_bit_tree_price(&self.low[pos_state], LEN_LOW_BITS, i as u32)
            } else if i < LEN_LOW_SYMBOLS + LEN_MID_SYMBOLS {
                b0 + get_bit_tree_price(
                    &self.mid[pos_state],
                    LEN_MID_BITS,
                    (i - LEN_LOW_SYMBOLS) as u32,
                )
            } else {
                b1 + get_bit_tree_price(
                    &self.high,
                    LEN_HIGH_BITS,
                    (i - LEN_LOW_SYMBOLS - LEN_MID_SYMBOLS) as u32,
                )
            };
        }
    }
}

/// Cached length prices for the encoder.
///
/// Each position state's row is recomputed after it has been used for
/// `table_size` encodings.
#[derive(Debug, Clone)]
pub struct LengthPriceTable {
    prices: Vec<u32>,
    counters: [u32; POS_STATES_MAX],
    table_size: usize,
}

impl LengthPriceTable {
    /// Create a table covering symbols `0..table_size`.
    pub fn new(table_size: usize) -> Self {
        Self {
            prices: vec![0; NUM_LEN_SYMBOLS * POS_STATES_MAX],
            counters: [0; POS_STATES_MAX],
            table_size,
        }
    }

    /// Price of `symbol` (length minus 2) in `pos_state`.
    #[inline]
    pub fn price(&self, symbol: u32, pos_state: usize) -> u32 {
        self.prices[pos_state * NUM_LEN_SYMBOLS + symbol as usize]
    }

    /// Recompute one position state's row.
    pub fn update(&mut self, model: &LengthModel, pos_state: usize) {
        let start = pos_state * NUM_LEN_SYMBOLS;
        model.set_prices(
            pos_state,
            self.table_size,
            &mut self.prices[start..start + NUM_LEN_SYMBOLS],
        );
        self.counters[pos_state] = self.table_size as u32;
    }

    /// Recompute every row.
    pub fn update_all(&mut self, model: &LengthModel, num_pos_states: usize) {
        for pos_state in 0..num_pos_states {
            self.update(model, pos_state);
        }
    }

    /// Encode through `model` and refresh the row when it went stale.
    pub fn encode(
        &mut self,
        model: &mut LengthModel,
        rc: &mut RangeEncoder,
        symbol: u32,
        pos_state: usize,
    ) {
        model.encode(rc, symbol, pos_state);
        self.counters[pos_state] -= 1;
        if self.counters[pos_state] == 0 {
            self.update(model, pos_state);
        }
    }
}
