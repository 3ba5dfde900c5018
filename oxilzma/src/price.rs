//! Bit price estimation and distance slot tables.
//!
//! The encoder's optimal parser compares candidate parses by their
//! estimated coded size. Prices are in 1/64 bit units and are looked up
//! from a 512-entry table indexed by the probability with its two lowest
//! bits dropped.

use crate::range_coder::{PROB_BITS, PROB_MAX};

/// Fractional bits in a price.
pub const BIT_PRICE_SHIFT_BITS: u32 = 6;

/// Low probability bits ignored when looking up a price.
const MOVE_REDUCING_BITS: u32 = 2;

/// Price used for lattice nodes that are not reachable yet.
pub const INFINITY_PRICE: u32 = 0x0FFF_FFFF;

const PRICE_TABLE_BITS: u32 = PROB_BITS - MOVE_REDUCING_BITS;

/// Pre-computed price table for bit encoding.
///
/// `PROB_PRICES[p >> 2]` approximates `-log2(p / 2048) * 64`.
pub static PROB_PRICES: [u32; (PROB_MAX as usize) >> MOVE_REDUCING_BITS] = {
    let mut prices = [0u32; (PROB_MAX as usize) >> MOVE_REDUCING_BITS];
    let mut i = PRICE_TABLE_BITS as i32 - 1;
    while i >= 0 {
        let start = 1u32 << (PRICE_TABLE_BITS - i as u32 - 1);
        let end = 1u32 << (PRICE_TABLE_BITS - i as u32);
        let mut j = start;
        while j < end {
            prices[j as usize] = ((i as u32) << BIT_PRICE_SHIFT_BITS)
                + (((end - j) << BIT_PRICE_SHIFT_BITS) >> (PRICE_TABLE_BITS - i as u32 - 1));
            j += 1;
        }
        i -= 1;
    }
    prices
};

/// Price of coding a 0 bit.
#[inline(always)]
pub fn price0(prob: u16) -> u32 {
    PROB_PRICES[(prob >> MOVE_REDUCING_BITS) as usize]
}

/// Price of coding a 1 bit.
#[inline(always)]
pub fn price1(prob: u16) -> u32 {
    PROB_PRICES[((PROB_MAX - prob) >> MOVE_REDUCING_BITS) as usize]
}

/// Get the price of encoding a bit with the given probability.
#[inline]
pub fn get_price(prob: u16, bit: u32) -> u32 {
    if bit == 0 { price0(prob) } else { price1(prob) }
}

/// Get the price of encoding a bit tree.
pub fn get_bit_tree_price(probs: &[u16], num_bits: u32, symbol: u32) -> u32 {
    let mut price = 0u32;
    let mut m = 1usize;

    for i in (0..num_bits).rev() {
        let bit = (symbol >> i) & 1;
        price += get_price(probs[m], bit);
        m = (m << 1) | bit as usize;
    }

    price
}

/// Get the price of encoding a bit tree in reverse order.
pub fn get_bit_tree_reverse_price(probs: &[u16], num_bits: u32, symbol: u32) -> u32 {
    let mut price = 0u32;
    let mut m = 1usize;

    for i in 0..num_bits {
        let bit = (symbol >> i) & 1;
        price += get_price(probs[m], bit);
        m = (m << 1) | bit as usize;
    }

    price
}

/// Distance slot of every distance below 2^11.
static FAST_POS: [u8; 1 << 11] = {
    let mut table = [0u8; 1 << 11];
    table[1] = 1;
    let mut c = 2usize;
    let mut slot = 2u32;
    while slot < 22 {
        let k = 1usize << ((slot >> 1) - 1);
        let mut j = 0;
        while j < k {
            table[c] = slot as u8;
            c += 1;
            j += 1;
        }
        slot += 1;
    }
    table
};

/// Distance slot for a zero-based distance.
#[inline]
pub fn get_pos_slot(pos: u32) -> u32 {
    if pos < 1 << 11 {
        FAST_POS[pos as usize] as u32
    } else if pos < 1 << 21 {
        FAST_POS[(pos >> 10) as usize] as u32 + 20
    } else {
        FAST_POS[(pos >> 20) as usize] as u32 + 40
    }
}

/// Distance slot for a distance of at least 128.
#[inline]
pub fn get_pos_slot_large(pos: u32) -> u32 {
    if pos < 1 << 17 {
        FAST_POS[(pos >> 6) as usize] as u32 + 12
    } else if pos < 1 << 27 {
        FAST_POS[(pos >> 16) as usize] as u32 + 32
    } else {
        FAST_POS[(pos >> 26) as usize] as u32 + 52
    }
}
