//! LZMA compression.
//!
//! The encoder pulls input through a binary-tree match finder, picks a parse
//! with the cost-based optimal parser (see [`crate::optimal`]) and pushes the
//! resulting literals, rep matches and matches through the range coder.
//!
//! Output is produced in blocks of at least 4096 input bytes; after each
//! block the coded bytes go to the sink and progress is reported.

use crate::header::{HEADER_SIZE, LzmaHeader, PROPS_SIZE};
use crate::length::LengthPriceTable;
use crate::match_finder::{BinTree, Match};
use crate::model::{
    ALIGN_MASK, ALIGN_TABLE_SIZE, END_POS_MODEL_INDEX, LzmaModel, MATCH_MAX_LEN, MATCH_MIN_LEN,
    NUM_ALIGN_BITS, NUM_FULL_DISTANCES, NUM_LEN_TO_POS_STATES, NUM_POS_SLOT_BITS,
    NUM_REP_DISTANCES, START_POS_MODEL_INDEX, State, len_to_pos_state, push_rep, rotate_reps,
};
use crate::optimal::{LITERAL, NUM_OPTS, Optimal};
use crate::options::EncoderOptions;
use crate::price::{
    BIT_PRICE_SHIFT_BITS, get_bit_tree_price, get_bit_tree_reverse_price, get_pos_slot,
};
use crate::range_coder::RangeEncoder;
use log::{debug, trace};
use oxilzma_core::error::{OxiLzmaError, Result};
use oxilzma_core::progress::{CodeProgress, NoProgress};
use std::io::{Read, Write};

/// Minimum number of input bytes coded between two progress reports.
const BLOCK_SIZE: u64 = 1 << 12;

/// Distance price refresh interval, in coded matches.
const MATCH_PRICE_REFRESH: u32 = 1 << 7;

/// Largest `log2` of the dictionary size used for the slot price table.
const DICT_LOG_SIZE_MAX: u32 = 30;

/// Streaming LZMA encoder.
///
/// Owns its match finder, range coder and probability model. One encoder
/// codes exactly one stream: [`LzmaEncoder::encode`] consumes it.
pub struct LzmaEncoder<R> {
    pub(crate) options: EncoderOptions,
    pub(crate) match_finder: BinTree<R>,
    pub(crate) rc: RangeEncoder,
    pub(crate) model: LzmaModel,
    pub(crate) state: State,
    pub(crate) rep_distances: [u32; NUM_REP_DISTANCES],
    pub(crate) previous_byte: u8,
    pub(crate) pos_state_mask: u32,

    pub(crate) optimum: Vec<Optimal>,
    pub(crate) optimum_end_index: u32,
    pub(crate) optimum_current_index: u32,
    pub(crate) longest_match_length: u32,
    pub(crate) longest_match_was_found: bool,
    pub(crate) matches: Vec<Match>,
    /// Bytes the match finder is ahead of the coded position.
    pub(crate) additional_offset: u32,

    pub(crate) len_prices: LengthPriceTable,
    pub(crate) rep_len_prices: LengthPriceTable,
    pub(crate) pos_slot_prices: [u32; 1 << (NUM_POS_SLOT_BITS + 2)],
    pub(crate) distances_prices: [u32; NUM_FULL_DISTANCES as usize * NUM_LEN_TO_POS_STATES],
    pub(crate) align_prices: [u32; ALIGN_TABLE_SIZE],
    match_price_count: u32,
    align_price_count: u32,
    dist_table_size: u32,

    /// History placed in front of the input.
    dictionary: Vec<u8>,
    now_pos: u64,
}

impl<R: Read> LzmaEncoder<R> {
    /// Create an encoder reading from `reader`.
    pub fn new(reader: R, options: &EncoderOptions) -> Result<Self> {
        options.validate()?;
        let props = options.properties();

        let match_finder = BinTree::new(
            reader,
            options.match_finder,
            options.dict_size,
            NUM_OPTS,
            options.num_fast_bytes,
            MATCH_MAX_LEN + 1,
        )?;

        let dict_log = (0..DICT_LOG_SIZE_MAX)
            .find(|&log| options.dict_size <= 1 << log)
            .unwrap_or(DICT_LOG_SIZE_MAX);

        let table_size = (options.num_fast_bytes + 1 - MATCH_MIN_LEN) as usize;

        debug!(
            "lzma encoder: dict {} bytes, {} fast bytes, {}, lc={} lp={} pb={}",
            options.dict_size,
            options.num_fast_bytes,
            options.match_finder,
            props.lc,
            props.lp,
            props.pb
        );

        let mut encoder = Self {
            options: options.clone(),
            match_finder,
            rc: RangeEncoder::new(),
            model: LzmaModel::new(props),
            state: State::new(),
            rep_distances: [0; NUM_REP_DISTANCES],
            previous_byte: 0,
            pos_state_mask: props.pos_mask(),
            optimum: vec![Optimal::default(); NUM_OPTS as usize],
            optimum_end_index: 0,
            optimum_current_index: 0,
            longest_match_length: 0,
            longest_match_was_found: false,
            matches: Vec::with_capacity(MATCH_MAX_LEN as usize + 1),
            additional_offset: 0,
            len_prices: LengthPriceTable::new(table_size),
            rep_len_prices: LengthPriceTable::new(table_size),
            pos_slot_prices: [0; 1 << (NUM_POS_SLOT_BITS + 2)],
            distances_prices: [0; NUM_FULL_DISTANCES as usize * NUM_LEN_TO_POS_STATES],
            align_prices: [0; ALIGN_TABLE_SIZE],
            match_price_count: 0,
            align_price_count: 0,
            dist_table_size: dict_log * 2,
            dictionary: Vec::new(),
            now_pos: 0,
        };

        encoder.fill_distances_prices();
        encoder.fill_align_prices();
        let num_pos_states = props.num_pos_states();
        encoder
            .len_prices
            .update_all(&encoder.model.match_len, num_pos_states);
        encoder
            .rep_len_prices
            .update_all(&encoder.model.rep_len, num_pos_states);

        Ok(encoder)
    }

    /// Pre-load history so the stream can refer back into `dictionary`.
    ///
    /// Only the last `dict_size` bytes are kept. The decoder must be trained
    /// on the same bytes.
    pub fn with_dictionary(mut self, dictionary: &[u8]) -> Self {
        let keep = dictionary.len().min(self.options.dict_size as usize);
        self.dictionary = dictionary[dictionary.len() - keep..].to_vec();
        self
    }

    /// Header for a stream of `size` bytes (`None` if unknown).
    pub fn header(&self, size: Option<u64>) -> LzmaHeader {
        LzmaHeader::new(self.options.properties(), self.options.dict_size, size)
    }

    /// Write the 5 coder property bytes.
    pub fn write_coder_properties<W: Write>(&self, writer: &mut W) -> Result<()> {
        let bytes: [u8; PROPS_SIZE] = self.header(None).properties_bytes();
        writer.write_all(&bytes)?;
        Ok(())
    }

    /// Encode the whole input into `writer` and return the number of
    /// compressed bytes written.
    ///
    /// Only the compressed body is written, not the header. When `size` is
    /// `None` an end marker is always written; otherwise the input must be
    /// exactly `size` bytes long.
    pub fn encode<W: Write, P: CodeProgress>(
        mut self,
        writer: &mut W,
        size: Option<u64>,
        progress: &mut P,
    ) -> Result<u64> {
        let end_marker = self.options.end_marker || size.is_none();
        let train_size = self.dictionary.len() as u32;

        self.match_finder.init(&self.dictionary)?;
        if train_size > 0 {
            self.match_finder.skip(train_size)?;
            trace!("skipped {} bytes of pre-loaded history", train_size);
        }

        while !self.code_one_block()? {
            self.rc.drain_to(writer)?;
            progress.set_progress(self.now_pos, self.rc.processed_size())?;
        }

        if end_marker {
            let pos_state = (self.now_pos as u32 & self.pos_state_mask) as usize;
            self.write_end_marker(pos_state);
        }
        self.rc.flush();
        self.rc.drain_to(writer)?;
        progress.set_progress(self.now_pos, self.rc.drained())?;

        if let Some(expected) = size {
            if self.now_pos != expected {
                return Err(OxiLzmaError::invalid_parameter(
                    "size",
                    format!(
                        "declared {} bytes but the input held {}",
                        expected, self.now_pos
                    ),
                ));
            }
        }

        debug!(
            "lzma encoder: {} -> {} bytes{}",
            self.now_pos,
            self.rc.drained(),
            if end_marker { " with end marker" } else { "" }
        );
        Ok(self.rc.drained())
    }

    /// Code at least [`BLOCK_SIZE`] input bytes. Returns `true` once the
    /// input is exhausted.
    fn code_one_block(&mut self) -> Result<bool> {
        let progress_pos_prev = self.now_pos;

        if self.now_pos == 0 {
            if self.match_finder.num_available_bytes() == 0 {
                return Ok(true);
            }
            // the first symbol is always a plain literal
            self.read_match_distances()?;
            self.rc
                .encode_bit(&mut self.model.is_match[self.state.value()][0], 0);
            self.state.update_literal();
            let cur_byte = self
                .match_finder
                .get_index_byte(-(self.additional_offset as i32));
            let lit_state = self.model.literal.get_state(0, self.previous_byte);
            self.model.literal.encode(&mut self.rc, lit_state, cur_byte);
            self.previous_byte = cur_byte;
            self.additional_offset -= 1;
            self.now_pos += 1;
        }

        if self.match_finder.num_available_bytes() == 0 {
            return Ok(true);
        }

        loop {
            let (len, back) = self.get_optimum(self.now_pos as u32)?;

            let pos_state = (self.now_pos as u32 & self.pos_state_mask) as usize;
            let st = self.state.value();

            if len == 1 && back == LITERAL {
                self.rc.encode_bit(&mut self.model.is_match[st][pos_state], 0);
                let cur_byte = self
                    .match_finder
                    .get_index_byte(-(self.additional_offset as i32));
                let lit_state = self
                    .model
                    .literal
                    .get_state(self.now_pos as u32, self.previous_byte);
                if self.state.is_literal() {
                    self.model.literal.encode(&mut self.rc, lit_state, cur_byte);
                } else {
                    let match_byte = self.match_finder.get_index_byte(
                        -(self.rep_distances[0] as i32) - 1 - self.additional_offset as i32,
                    );
                    self.model
                        .literal
                        .encode_matched(&mut self.rc, lit_state, match_byte, cur_byte);
                }
                self.previous_byte = cur_byte;
                self.state.update_literal();
            } else {
                self.rc.encode_bit(&mut self.model.is_match[st][pos_state], 1);
                if back < NUM_REP_DISTANCES as u32 {
                    self.encode_rep(back as usize, len, pos_state);
                } else {
                    self.rc.encode_bit(&mut self.model.is_rep[st], 0);
                    self.state.update_match();
                    self.len_prices.encode(
                        &mut self.model.match_len,
                        &mut self.rc,
                        len - MATCH_MIN_LEN,
                        pos_state,
                    );
                    let distance = back - NUM_REP_DISTANCES as u32;
                    self.encode_distance(distance, len);
                    push_rep(&mut self.rep_distances, distance);
                    self.match_price_count += 1;
                }
                self.previous_byte = self
                    .match_finder
                    .get_index_byte(len as i32 - 1 - self.additional_offset as i32);
            }

            self.additional_offset -= len;
            self.now_pos += len as u64;

            if self.additional_offset == 0 {
                if self.match_price_count >= MATCH_PRICE_REFRESH {
                    self.fill_distances_prices();
                }
                if self.align_price_count >= ALIGN_TABLE_SIZE as u32 {
                    self.fill_align_prices();
                }
                if self.match_finder.num_available_bytes() == 0 {
                    return Ok(true);
                }
                if self.now_pos - progress_pos_prev >= BLOCK_SIZE {
                    trace!("block done at {} bytes", self.now_pos);
                    return Ok(false);
                }
            }
        }
    }

    /// Encode a rep match and move the used distance to the front.
    fn encode_rep(&mut self, rep_index: usize, len: u32, pos_state: usize) {
        let st = self.state.value();
        self.rc.encode_bit(&mut self.model.is_rep[st], 1);
        if rep_index == 0 {
            self.rc.encode_bit(&mut self.model.is_rep_g0[st], 0);
            self.rc.encode_bit(
                &mut self.model.is_rep0_long[st][pos_state],
                (len != 1) as u32,
            );
        } else {
            self.rc.encode_bit(&mut self.model.is_rep_g0[st], 1);
            if rep_index == 1 {
                self.rc.encode_bit(&mut self.model.is_rep_g1[st], 0);
            } else {
                self.rc.encode_bit(&mut self.model.is_rep_g1[st], 1);
                self.rc
                    .encode_bit(&mut self.model.is_rep_g2[st], rep_index as u32 - 2);
            }
        }

        if len == 1 {
            self.state.update_short_rep();
        } else {
            self.rep_len_prices.encode(
                &mut self.model.rep_len,
                &mut self.rc,
                len - MATCH_MIN_LEN,
                pos_state,
            );
            self.state.update_long_rep();
        }

        rotate_reps(&mut self.rep_distances, rep_index);
    }

    /// Encode a zero-based match distance for a match of `len` bytes.
    fn encode_distance(&mut self, distance: u32, len: u32) {
        let pos_slot = get_pos_slot(distance);
        self.rc.encode_bit_tree(
            &mut self.model.pos_slot[len_to_pos_state(len)],
            NUM_POS_SLOT_BITS,
            pos_slot,
        );

        if pos_slot >= START_POS_MODEL_INDEX {
            let footer_bits = (pos_slot >> 1) - 1;
            let base = (2 | (pos_slot & 1)) << footer_bits;
            let reduced = distance - base;

            if pos_slot < END_POS_MODEL_INDEX {
                self.rc.encode_bit_tree_reverse(
                    &mut self.model.pos_special[(base - pos_slot) as usize..],
                    footer_bits,
                    reduced,
                );
            } else {
                self.rc
                    .encode_direct_bits(reduced >> NUM_ALIGN_BITS, footer_bits - NUM_ALIGN_BITS);
                self.rc.encode_bit_tree_reverse(
                    &mut self.model.align,
                    NUM_ALIGN_BITS,
                    reduced & ALIGN_MASK,
                );
                self.align_price_count += 1;
            }
        }
    }

    /// Encode a match with distance `0xFFFF_FFFF`.
    fn write_end_marker(&mut self, pos_state: usize) {
        let st = self.state.value();
        self.rc.encode_bit(&mut self.model.is_match[st][pos_state], 1);
        self.rc.encode_bit(&mut self.model.is_rep[st], 0);
        self.state.update_match();

        let len = MATCH_MIN_LEN;
        self.len_prices
            .encode(&mut self.model.match_len, &mut self.rc, 0, pos_state);

        let pos_slot = (1 << NUM_POS_SLOT_BITS) - 1;
        self.rc.encode_bit_tree(
            &mut self.model.pos_slot[len_to_pos_state(len)],
            NUM_POS_SLOT_BITS,
            pos_slot,
        );
        let footer_bits = 30;
        let reduced = (1u32 << footer_bits) - 1;
        self.rc
            .encode_direct_bits(reduced >> NUM_ALIGN_BITS, footer_bits - NUM_ALIGN_BITS);
        self.rc
            .encode_bit_tree_reverse(&mut self.model.align, NUM_ALIGN_BITS, reduced & ALIGN_MASK);
    }

    /// Recompute slot and short-distance prices.
    fn fill_distances_prices(&mut self) {
        let mut temp_prices = [0u32; NUM_FULL_DISTANCES as usize];
        for i in START_POS_MODEL_INDEX..NUM_FULL_DISTANCES {
            let pos_slot = get_pos_slot(i);
            let footer_bits = (pos_slot >> 1) - 1;
            let base = (2 | (pos_slot & 1)) << footer_bits;
            temp_prices[i as usize] = get_bit_tree_reverse_price(
                &self.model.pos_special[(base - pos_slot) as usize..],
                footer_bits,
                i - base,
            );
        }

        for lps in 0..NUM_LEN_TO_POS_STATES {
            let probs = &self.model.pos_slot[lps];
            let st = lps << NUM_POS_SLOT_BITS;
            for pos_slot in 0..self.dist_table_size {
                self.pos_slot_prices[st + pos_slot as usize] =
                    get_bit_tree_price(probs, NUM_POS_SLOT_BITS, pos_slot);
            }
            for pos_slot in END_POS_MODEL_INDEX..self.dist_table_size {
                self.pos_slot_prices[st + pos_slot as usize] +=
                    ((pos_slot >> 1) - 1 - NUM_ALIGN_BITS) << BIT_PRICE_SHIFT_BITS;
            }

            let st2 = lps * NUM_FULL_DISTANCES as usize;
            for i in 0..START_POS_MODEL_INDEX as usize {
                self.distances_prices[st2 + i] = self.pos_slot_prices[st + i];
            }
            for i in START_POS_MODEL_INDEX..NUM_FULL_DISTANCES {
                self.distances_prices[st2 + i as usize] = self.pos_slot_prices
                    [st + get_pos_slot(i) as usize]
                    + temp_prices[i as usize];
            }
        }

        trace!("refreshed distance prices at {}", self.now_pos);
        self.match_price_count = 0;
    }

    /// Recompute the aligned low-bit prices.
    fn fill_align_prices(&mut self) {
        for (i, price) in self.align_prices.iter_mut().enumerate() {
            *price = get_bit_tree_reverse_price(&self.model.align, NUM_ALIGN_BITS, i as u32);
        }
        self.align_price_count = 0;
    }
}

/// Compress `reader` into `writer` as a `.lzma` stream (header and body).
///
/// `size` is written to the header; pass `None` when the input length is not
/// known in advance. Returns the total number of bytes written.
pub fn compress_stream<R: Read, W: Write>(
    reader: R,
    writer: &mut W,
    options: &EncoderOptions,
    size: Option<u64>,
) -> Result<u64> {
    let encoder = LzmaEncoder::new(reader, options)?;
    encoder.header(size).write_to(writer)?;
    let body = encoder.encode(writer, size, &mut NoProgress)?;
    Ok(HEADER_SIZE as u64 + body)
}
