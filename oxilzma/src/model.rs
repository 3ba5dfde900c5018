//! LZMA probability models.
//!
//! LZMA uses context-dependent probability models for:
//! - Literal encoding (context = previous byte + position)
//! - Match length encoding
//! - Distance encoding
//! - State machine transitions
//!
//! Encoder and decoder share [`LzmaModel`] so both sides always agree on
//! the exact set of adaptive probabilities.

use crate::length::LengthModel;
use crate::literal::LiteralModel;
use crate::range_coder::PROB_INIT;
use oxilzma_core::error::{OxiLzmaError, Result};

/// Default number of literal context bits.
pub const LC_DEFAULT: u32 = 3;

/// Default number of literal position bits.
pub const LP_DEFAULT: u32 = 0;

/// Default number of position bits.
pub const PB_DEFAULT: u32 = 2;

/// Maximum number of position bits.
pub const POS_STATES_BITS_MAX: u32 = 4;

/// Maximum number of position states.
pub const POS_STATES_MAX: usize = 1 << POS_STATES_BITS_MAX;

/// Maximum literal position bits the encoder accepts.
pub const LIT_POS_BITS_ENCODING_MAX: u32 = 4;

/// Maximum literal context bits.
pub const LIT_CONTEXT_BITS_MAX: u32 = 8;

/// Maximum literal position bits the decoder accepts.
pub const LIT_POS_BITS_MAX: u32 = 8;

/// Number of states in the LZMA state machine.
pub const NUM_STATES: usize = 12;

/// Number of repeat distances kept in the MRU cache.
pub const NUM_REP_DISTANCES: usize = 4;

/// Minimum match length.
pub const MATCH_MIN_LEN: u32 = 2;

/// Maximum match length.
pub const MATCH_MAX_LEN: u32 = 273;

/// Number of length-to-position states used to select a slot coder.
pub const NUM_LEN_TO_POS_STATES: usize = 4;

/// Number of bits in a distance slot.
pub const NUM_POS_SLOT_BITS: u32 = 6;

/// Number of distance slots.
pub const NUM_POS_SLOTS: usize = 1 << NUM_POS_SLOT_BITS;

/// Number of alignment bits for distance encoding.
pub const NUM_ALIGN_BITS: u32 = 4;

/// Size of alignment table.
pub const ALIGN_TABLE_SIZE: usize = 1 << NUM_ALIGN_BITS;

/// Mask selecting the aligned low bits of a distance.
pub const ALIGN_MASK: u32 = (1 << NUM_ALIGN_BITS) - 1;

/// First slot that carries footer bits.
pub const START_POS_MODEL_INDEX: u32 = 4;

/// First slot whose footer is coded with direct bits.
pub const END_POS_MODEL_INDEX: u32 = 14;

/// Number of distances coded entirely through modelled bits.
pub const NUM_FULL_DISTANCES: u32 = 1 << (END_POS_MODEL_INDEX >> 1);

/// Probabilities for the reverse-coded footers of slots 4..14.
///
/// Slot trees are addressed at `base - slot + m` with `m >= 1`, so the
/// first entry is never touched.
pub const NUM_SPECIAL_POS_PROBS: usize = (NUM_FULL_DISTANCES - END_POS_MODEL_INDEX) as usize + 1;

/// Distance value that marks the end of the stream.
pub const END_MARKER_DISTANCE: u32 = 0xFFFF_FFFF;

const LITERAL_NEXT: [u8; NUM_STATES] = [0, 0, 0, 0, 1, 2, 3, 4, 5, 6, 4, 5];
const MATCH_NEXT: [u8; NUM_STATES] = [7, 7, 7, 7, 7, 7, 7, 10, 10, 10, 10, 10];
const LONG_REP_NEXT: [u8; NUM_STATES] = [8, 8, 8, 8, 8, 8, 8, 11, 11, 11, 11, 11];
const SHORT_REP_NEXT: [u8; NUM_STATES] = [9, 9, 9, 9, 9, 9, 9, 11, 11, 11, 11, 11];

/// LZMA state machine state.
///
/// States 0..7 mean the previous symbol was a literal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct State(u8);

impl State {
    /// Initial state.
    pub const fn new() -> Self {
        Self(0)
    }

    /// Get state value.
    #[inline]
    pub fn value(self) -> usize {
        self.0 as usize
    }

    /// Check if state represents a literal.
    #[inline]
    pub fn is_literal(self) -> bool {
        self.0 < 7
    }

    /// Update state after literal.
    #[inline]
    pub fn update_literal(&mut self) {
        self.0 = LITERAL_NEXT[self.value()];
    }

    /// Update state after match.
    #[inline]
    pub fn update_match(&mut self) {
        self.0 = MATCH_NEXT[self.value()];
    }

    /// Update state after short rep.
    #[inline]
    pub fn update_short_rep(&mut self) {
        self.0 = SHORT_REP_NEXT[self.value()];
    }

    /// Update state after long rep.
    #[inline]
    pub fn update_long_rep(&mut self) {
        self.0 = LONG_REP_NEXT[self.value()];
    }
}

impl Default for State {
    fn default() -> Self {
        Self::new()
    }
}

/// Map a match length to the slot coder that codes its distance.
#[inline]
pub fn len_to_pos_state(len: u32) -> usize {
    let len = len - MATCH_MIN_LEN;
    if len < NUM_LEN_TO_POS_STATES as u32 {
        len as usize
    } else {
        NUM_LEN_TO_POS_STATES - 1
    }
}

/// Move rep distance `index` to the front; the distances before it shift
/// back one slot.
#[inline]
pub fn rotate_reps(reps: &mut [u32; NUM_REP_DISTANCES], index: usize) {
    let distance = reps[index];
    reps.copy_within(0..index, 1);
    reps[0] = distance;
}

/// Push the distance of a new match, dropping the oldest rep.
#[inline]
pub fn push_rep(reps: &mut [u32; NUM_REP_DISTANCES], distance: u32) {
    reps.copy_within(0..NUM_REP_DISTANCES - 1, 1);
    reps[0] = distance;
}

/// LZMA properties (lc, lp, pb).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LzmaProperties {
    /// Literal context bits.
    pub lc: u32,
    /// Literal position bits.
    pub lp: u32,
    /// Position bits.
    pub pb: u32,
}

impl LzmaProperties {
    /// Create new properties.
    pub fn new(lc: u32, lp: u32, pb: u32) -> Self {
        Self { lc, lp, pb }
    }

    /// Parse from property byte.
    ///
    /// The byte is `(pb * 5 + lp) * 9 + lc`.
    pub fn from_byte(byte: u8) -> Result<Self> {
        let byte = byte as u32;
        let lc = byte % 9;
        let remainder = byte / 9;
        let lp = remainder % 5;
        let pb = remainder / 5;

        let props = Self { lc, lp, pb };
        props.validate_for_decoding()?;
        Ok(props)
    }

    /// Encode to property byte.
    pub fn to_byte(&self) -> u8 {
        ((self.pb * 5 + self.lp) * 9 + self.lc) as u8
    }

    /// Check the limits a decoder accepts.
    pub fn validate_for_decoding(&self) -> Result<()> {
        if self.pb > POS_STATES_BITS_MAX {
            return Err(OxiLzmaError::invalid_header(format!(
                "pb = {} exceeds {}",
                self.pb, POS_STATES_BITS_MAX
            )));
        }
        if self.lc > LIT_CONTEXT_BITS_MAX {
            return Err(OxiLzmaError::invalid_header(format!(
                "lc = {} exceeds {}",
                self.lc, LIT_CONTEXT_BITS_MAX
            )));
        }
        if self.lp > LIT_POS_BITS_MAX {
            return Err(OxiLzmaError::invalid_header(format!(
                "lp = {} exceeds {}",
                self.lp, LIT_POS_BITS_MAX
            )));
        }
        Ok(())
    }

    /// Get number of literal states.
    pub fn num_lit_states(&self) -> usize {
        1 << (self.lc + self.lp)
    }

    /// Get number of position states.
    pub fn num_pos_states(&self) -> usize {
        1 << self.pb
    }

    /// Mask applied to the stream position to get the position state.
    pub fn pos_mask(&self) -> u32 {
        (1 << self.pb) - 1
    }
}

impl Default for LzmaProperties {
    fn default() -> Self {
        Self {
            lc: LC_DEFAULT,
            lp: LP_DEFAULT,
            pb: PB_DEFAULT,
        }
    }
}

/// Complete LZMA model containing all probability tables.
#[derive(Debug, Clone)]
pub struct LzmaModel {
    /// LZMA properties.
    pub props: LzmaProperties,

    /// Is-match probabilities.
    pub is_match: [[u16; POS_STATES_MAX]; NUM_STATES],
    /// Is-rep probabilities.
    pub is_rep: [u16; NUM_STATES],
    /// Rep0 vs rep1..3.
    pub is_rep_g0: [u16; NUM_STATES],
    /// Rep1 vs rep2..3.
    pub is_rep_g1: [u16; NUM_STATES],
    /// Rep2 vs rep3.
    pub is_rep_g2: [u16; NUM_STATES],
    /// Rep0 long vs short rep.
    pub is_rep0_long: [[u16; POS_STATES_MAX]; NUM_STATES],

    /// Match length model.
    pub match_len: LengthModel,
    /// Rep match length model.
    pub rep_len: LengthModel,

    /// Literal model.
    pub literal: LiteralModel,

    /// Distance slot trees, one per length-to-position state.
    pub pos_slot: [[u16; NUM_POS_SLOTS]; NUM_LEN_TO_POS_STATES],
    /// Reverse-coded footer bits for slots 4..14.
    pub pos_special: [u16; NUM_SPECIAL_POS_PROBS],
    /// Aligned low bits of large distances.
    pub align: [u16; ALIGN_TABLE_SIZE],
}

impl LzmaModel {
    /// Create a new LZMA model with the given properties.
    pub fn new(props: LzmaProperties) -> Self {
        let num_pos_states = props.num_pos_states();

        Self {
            props,
            is_match: [[PROB_INIT; POS_STATES_MAX]; NUM_STATES],
            is_rep: [PROB_INIT; NUM_STATES],
            is_rep_g0: [PROB_INIT; NUM_STATES],
            is_rep_g1: [PROB_INIT; NUM_STATES],
            is_rep_g2: [PROB_INIT; NUM_STATES],
            is_rep0_long: [[PROB_INIT; POS_STATES_MAX]; NUM_STATES],
            match_len: LengthModel::new(num_pos_states),
            rep_len: LengthModel::new(num_pos_states),
            literal: LiteralModel::new(props.lc, props.lp),
            pos_slot: [[PROB_INIT; NUM_POS_SLOTS]; NUM_LEN_TO_POS_STATES],
            pos_special: [PROB_INIT; NUM_SPECIAL_POS_PROBS],
            align: [PROB_INIT; ALIGN_TABLE_SIZE],
        }
    }

    /// Reset all probabilities to initial values.
    pub fn reset(&mut self) {
        for state in &mut self.is_match {
            state.fill(PROB_INIT);
        }
        self.is_rep.fill(PROB_INIT);
        self.is_rep_g0.fill(PROB_INIT);
        self.is_rep_g1.fill(PROB_INIT);
        self.is_rep_g2.fill(PROB_INIT);
        for state in &mut self.is_rep0_long {
            state.fill(PROB_INIT);
        }
        self.match_len.reset();
        self.rep_len.reset();
        self.literal.reset();
        for slot in &mut self.pos_slot {
            slot.fill(PROB_INIT);
        }
        self.pos_special.fill(PROB_INIT);
        self.align.fill(PROB_INIT);
    }
}
