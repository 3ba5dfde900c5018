//! Optimal parsing for LZMA compression.
//!
//! The parser runs a forward dynamic program over a lattice of up to
//! [`NUM_OPTS`] positions. Each node keeps the cheapest known way to reach
//! it together with the coder state and rep distances at that point. Edges
//! are literals, short reps, rep matches, new matches and the two-step
//! combinations literal+rep0, rep+literal+rep0 and match+literal+rep0.
//!
//! Once the lattice end is reached (or a match of at least `num_fast_bytes`
//! shows up) the cheapest path is walked backward and handed out one token
//! per call.

use crate::encoder::LzmaEncoder;
use crate::model::{
    ALIGN_MASK, MATCH_MAX_LEN, MATCH_MIN_LEN, NUM_FULL_DISTANCES, NUM_POS_SLOT_BITS,
    NUM_REP_DISTANCES, State, len_to_pos_state, push_rep, rotate_reps,
};
use crate::price::{INFINITY_PRICE, get_pos_slot_large, get_price, price0, price1};
use oxilzma_core::error::Result;
use std::io::Read;

/// Lattice size.
pub(crate) const NUM_OPTS: u32 = 1 << 12;

/// `back` value of a literal token.
pub(crate) const LITERAL: u32 = u32::MAX;

/// One lattice node.
///
/// `back_prev` is [`LITERAL`], a rep index below 4, or a zero-based match
/// distance plus 4.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct Optimal {
    pub state: State,
    /// The step into this node ends with a literal.
    pub prev1_is_char: bool,
    /// The literal was preceded by a match or rep from `pos_prev2`.
    pub prev2: bool,
    pub pos_prev2: u32,
    pub back_prev2: u32,
    pub price: u32,
    pub pos_prev: u32,
    pub back_prev: u32,
    pub backs: [u32; NUM_REP_DISTANCES],
}

impl Optimal {
    #[inline]
    pub fn make_as_char(&mut self) {
        self.back_prev = LITERAL;
        self.prev1_is_char = false;
    }

    #[inline]
    pub fn make_as_short_rep(&mut self) {
        self.back_prev = 0;
        self.prev1_is_char = false;
    }

    #[inline]
    pub fn is_short_rep(&self) -> bool {
        self.back_prev == 0
    }
}

impl<R: Read> LzmaEncoder<R> {
    /// Read matches at the next position and return the longest length,
    /// extended past `num_fast_bytes` when the finder stopped there.
    pub(crate) fn read_match_distances(&mut self) -> Result<u32> {
        self.match_finder.get_matches(&mut self.matches)?;
        let mut len = 0;
        if let Some(last) = self.matches.last() {
            len = last.len;
            if len == self.options.num_fast_bytes {
                len += self
                    .match_finder
                    .get_match_len(len as i32 - 1, last.dist, MATCH_MAX_LEN - len);
            }
        }
        self.additional_offset += 1;
        Ok(len)
    }

    pub(crate) fn move_pos(&mut self, num: u32) -> Result<()> {
        if num > 0 {
            self.match_finder.skip(num)?;
            self.additional_offset += num;
        }
        Ok(())
    }

    fn rep_len1_price(&self, state: State, pos_state: usize) -> u32 {
        let st = state.value();
        price0(self.model.is_rep_g0[st]) + price0(self.model.is_rep0_long[st][pos_state])
    }

    fn pure_rep_price(&self, rep_index: u32, state: State, pos_state: usize) -> u32 {
        let st = state.value();
        if rep_index == 0 {
            price0(self.model.is_rep_g0[st]) + price1(self.model.is_rep0_long[st][pos_state])
        } else {
            let mut price = price1(self.model.is_rep_g0[st]);
            if rep_index == 1 {
                price += price0(self.model.is_rep_g1[st]);
            } else {
                price += price1(self.model.is_rep_g1[st]);
                price += get_price(self.model.is_rep_g2[st], rep_index - 2);
            }
            price
        }
    }

    fn rep_price(&self, rep_index: u32, len: u32, state: State, pos_state: usize) -> u32 {
        self.rep_len_prices.price(len - MATCH_MIN_LEN, pos_state)
            + self.pure_rep_price(rep_index, state, pos_state)
    }

    fn pos_len_price(&self, distance: u32, len: u32, pos_state: usize) -> u32 {
        let lps = len_to_pos_state(len);
        let price = if distance < NUM_FULL_DISTANCES {
            self.distances_prices[lps * NUM_FULL_DISTANCES as usize + distance as usize]
        } else {
            self.pos_slot_prices
                [(lps << NUM_POS_SLOT_BITS) + get_pos_slot_large(distance) as usize]
                + self.align_prices[(distance & ALIGN_MASK) as usize]
        };
        price + self.len_prices.price(len - MATCH_MIN_LEN, pos_state)
    }

    /// Price of a literal at `position` given the coder state there.
    fn literal_price(
        &self,
        position: u32,
        prev_byte: u8,
        match_mode: bool,
        match_byte: u8,
        symbol: u8,
    ) -> u32 {
        let lit_state = self.model.literal.get_state(position, prev_byte);
        self.model
            .literal
            .price(lit_state, match_mode, match_byte, symbol)
    }

    /// Grow the lattice end up to `end`, marking new nodes unreachable.
    #[inline]
    fn extend_lattice(&mut self, len_end: &mut u32, end: u32) {
        while *len_end < end {
            *len_end += 1;
            self.optimum[*len_end as usize].price = INFINITY_PRICE;
        }
    }

    /// Reverse the chain ending at `cur` so it can be replayed from node 0.
    fn backward(&mut self, mut cur: u32) -> (u32, u32) {
        self.optimum_end_index = cur;
        let mut pos_mem = self.optimum[cur as usize].pos_prev;
        let mut back_mem = self.optimum[cur as usize].back_prev;
        loop {
            let node = self.optimum[cur as usize];
            if node.prev1_is_char {
                let mem = pos_mem as usize;
                self.optimum[mem].make_as_char();
                self.optimum[mem].pos_prev = pos_mem - 1;
                if node.prev2 {
                    let before = &mut self.optimum[mem - 1];
                    before.prev1_is_char = false;
                    before.pos_prev = node.pos_prev2;
                    before.back_prev = node.back_prev2;
                }
            }

            let pos_prev = pos_mem;
            let back_cur = back_mem;

            back_mem = self.optimum[pos_prev as usize].back_prev;
            pos_mem = self.optimum[pos_prev as usize].pos_prev;

            self.optimum[pos_prev as usize].back_prev = back_cur;
            self.optimum[pos_prev as usize].pos_prev = cur;
            cur = pos_prev;
            if cur == 0 {
                break;
            }
        }

        self.optimum_current_index = self.optimum[0].pos_prev;
        (self.optimum_current_index, self.optimum[0].back_prev)
    }

    /// Choose the next token at `position`: returns `(len, back)`.
    pub(crate) fn get_optimum(&mut self, mut position: u32) -> Result<(u32, u32)> {
        if self.optimum_end_index != self.optimum_current_index {
            let node = self.optimum[self.optimum_current_index as usize];
            let len = node.pos_prev - self.optimum_current_index;
            self.optimum_current_index = node.pos_prev;
            return Ok((len, node.back_prev));
        }
        self.optimum_current_index = 0;
        self.optimum_end_index = 0;

        let num_fast_bytes = self.options.num_fast_bytes;

        let len_main = if self.longest_match_was_found {
            self.longest_match_was_found = false;
            self.longest_match_length
        } else {
            self.read_match_distances()?
        };

        if self.match_finder.num_available_bytes() + 1 < 2 {
            return Ok((1, LITERAL));
        }

        let mut reps = [0u32; NUM_REP_DISTANCES];
        let mut rep_lens = [0u32; NUM_REP_DISTANCES];
        let mut rep_max_index = 0;
        for i in 0..NUM_REP_DISTANCES {
            reps[i] = self.rep_distances[i];
            rep_lens[i] = self.match_finder.get_match_len(-1, reps[i], MATCH_MAX_LEN);
            if rep_lens[i] > rep_lens[rep_max_index] {
                rep_max_index = i;
            }
        }

        if rep_lens[rep_max_index] >= num_fast_bytes {
            let len = rep_lens[rep_max_index];
            self.move_pos(len - 1)?;
            return Ok((len, rep_max_index as u32));
        }

        if len_main >= num_fast_bytes {
            let back = self.matches[self.matches.len() - 1].dist + NUM_REP_DISTANCES as u32;
            self.move_pos(len_main - 1)?;
            return Ok((len_main, back));
        }

        let mut current_byte = self.match_finder.get_index_byte(-1);
        let mut match_byte = self.match_finder.get_index_byte(-(reps[0] as i32) - 2);

        if len_main < 2 && current_byte != match_byte && rep_lens[rep_max_index] < 2 {
            return Ok((1, LITERAL));
        }

        let state = self.state;
        self.optimum[0].state = state;

        let mut pos_state = (position & self.pos_state_mask) as usize;
        let st = state.value();

        self.optimum[1].price = price0(self.model.is_match[st][pos_state])
            + self.literal_price(
                position,
                self.previous_byte,
                !state.is_literal(),
                match_byte,
                current_byte,
            );
        self.optimum[1].make_as_char();

        let mut match_price = price1(self.model.is_match[st][pos_state]);
        let mut rep_match_price = match_price + price1(self.model.is_rep[st]);

        if match_byte == current_byte {
            let short_rep_price = rep_match_price + self.rep_len1_price(state, pos_state);
            if short_rep_price < self.optimum[1].price {
                self.optimum[1].price = short_rep_price;
                self.optimum[1].make_as_short_rep();
            }
        }

        let mut len_end = len_main.max(rep_lens[rep_max_index]);
        if len_end < 2 {
            return Ok((1, self.optimum[1].back_prev));
        }

        self.optimum[1].pos_prev = 0;
        self.optimum[0].backs = reps;

        for len in 2..=len_end {
            self.optimum[len as usize].price = INFINITY_PRICE;
        }

        for (i, &rep_len) in rep_lens.iter().enumerate() {
            if rep_len < 2 {
                continue;
            }
            let price = rep_match_price + self.pure_rep_price(i as u32, state, pos_state);
            for len in (2..=rep_len).rev() {
                let cur_and_len_price =
                    price + self.rep_len_prices.price(len - MATCH_MIN_LEN, pos_state);
                let opt = &mut self.optimum[len as usize];
                if cur_and_len_price < opt.price {
                    opt.price = cur_and_len_price;
                    opt.pos_prev = 0;
                    opt.back_prev = i as u32;
                    opt.prev1_is_char = false;
                }
            }
        }

        let mut normal_match_price = match_price + price0(self.model.is_rep[st]);

        let mut len = if rep_lens[0] >= 2 { rep_lens[0] + 1 } else { 2 };
        if len <= len_main {
            let mut offs = 0;
            while len > self.matches[offs].len {
                offs += 1;
            }
            loop {
                let distance = self.matches[offs].dist;
                let cur_and_len_price =
                    normal_match_price + self.pos_len_price(distance, len, pos_state);
                let opt = &mut self.optimum[len as usize];
                if cur_and_len_price < opt.price {
                    opt.price = cur_and_len_price;
                    opt.pos_prev = 0;
                    opt.back_prev = distance + NUM_REP_DISTANCES as u32;
                    opt.prev1_is_char = false;
                }
                if len == self.matches[offs].len {
                    offs += 1;
                    if offs == self.matches.len() {
                        break;
                    }
                }
                len += 1;
            }
        }

        let mut cur = 0u32;
        loop {
            cur += 1;
            if cur == len_end {
                return Ok(self.backward(cur));
            }

            let mut new_len = self.read_match_distances()?;
            if new_len >= num_fast_bytes {
                self.longest_match_length = new_len;
                self.longest_match_was_found = true;
                return Ok(self.backward(cur));
            }

            position += 1;

            // state and reps on arrival at `cur`
            let node = self.optimum[cur as usize];
            let mut pos_prev = node.pos_prev;
            let mut state;
            if node.prev1_is_char {
                pos_prev -= 1;
                if node.prev2 {
                    state = self.optimum[node.pos_prev2 as usize].state;
                    if node.back_prev2 < NUM_REP_DISTANCES as u32 {
                        state.update_long_rep();
                    } else {
                        state.update_match();
                    }
                } else {
                    state = self.optimum[pos_prev as usize].state;
                }
                state.update_literal();
            } else {
                state = self.optimum[pos_prev as usize].state;
            }

            if pos_prev == cur - 1 {
                if node.is_short_rep() {
                    state.update_short_rep();
                } else {
                    state.update_literal();
                }
                reps = self.optimum[pos_prev as usize].backs;
            } else {
                let back;
                if node.prev1_is_char && node.prev2 {
                    pos_prev = node.pos_prev2;
                    back = node.back_prev2;
                    state.update_long_rep();
                } else {
                    back = node.back_prev;
                    if back < NUM_REP_DISTANCES as u32 {
                        state.update_long_rep();
                    } else {
                        state.update_match();
                    }
                }

                reps = self.optimum[pos_prev as usize].backs;
                if back < NUM_REP_DISTANCES as u32 {
                    rotate_reps(&mut reps, back as usize);
                } else {
                    push_rep(&mut reps, back - NUM_REP_DISTANCES as u32);
                }
            }

            self.optimum[cur as usize].state = state;
            self.optimum[cur as usize].backs = reps;
            let cur_price = self.optimum[cur as usize].price;

            current_byte = self.match_finder.get_index_byte(-1);
            match_byte = self.match_finder.get_index_byte(-(reps[0] as i32) - 2);

            pos_state = (position & self.pos_state_mask) as usize;
            let st = state.value();

            let cur_and_1_price = cur_price
                + price0(self.model.is_match[st][pos_state])
                + self.literal_price(
                    position,
                    self.match_finder.get_index_byte(-2),
                    !state.is_literal(),
                    match_byte,
                    current_byte,
                );

            let next = (cur + 1) as usize;
            let mut next_is_char = false;
            if cur_and_1_price < self.optimum[next].price {
                let opt = &mut self.optimum[next];
                opt.price = cur_and_1_price;
                opt.pos_prev = cur;
                opt.make_as_char();
                next_is_char = true;
            }

            match_price = cur_price + price1(self.model.is_match[st][pos_state]);
            rep_match_price = match_price + price1(self.model.is_rep[st]);

            if match_byte == current_byte
                && !(self.optimum[next].pos_prev < cur && self.optimum[next].back_prev == 0)
            {
                let short_rep_price = rep_match_price + self.rep_len1_price(state, pos_state);
                if short_rep_price <= self.optimum[next].price {
                    let opt = &mut self.optimum[next];
                    opt.price = short_rep_price;
                    opt.pos_prev = cur;
                    opt.make_as_short_rep();
                    next_is_char = true;
                }
            }

            let num_available_full =
                (self.match_finder.num_available_bytes() + 1).min(NUM_OPTS - 1 - cur);
            if num_available_full < 2 {
                continue;
            }
            let num_available = num_available_full.min(num_fast_bytes);

            if !next_is_char && match_byte != current_byte {
                // literal + rep0
                let limit = (num_available_full - 1).min(num_fast_bytes);
                let len_test2 = self.match_finder.get_match_len(0, reps[0], limit);
                if len_test2 >= 2 {
                    let mut state2 = state;
                    state2.update_literal();
                    let pos_state_next = ((position + 1) & self.pos_state_mask) as usize;
                    let next_rep_match_price = cur_and_1_price
                        + price1(self.model.is_match[state2.value()][pos_state_next])
                        + price1(self.model.is_rep[state2.value()]);

                    let offset = cur + 1 + len_test2;
                    self.extend_lattice(&mut len_end, offset);
                    let cur_and_len_price = next_rep_match_price
                        + self.rep_price(0, len_test2, state2, pos_state_next);
                    let opt = &mut self.optimum[offset as usize];
                    if cur_and_len_price < opt.price {
                        opt.price = cur_and_len_price;
                        opt.pos_prev = cur + 1;
                        opt.back_prev = 0;
                        opt.prev1_is_char = true;
                        opt.prev2 = false;
                    }
                }
            }

            let mut start_len = 2;

            for rep_index in 0..NUM_REP_DISTANCES {
                let rep = reps[rep_index];
                let rep_len = self.match_finder.get_match_len(-1, rep, num_available);
                if rep_len < 2 {
                    continue;
                }

                for len_test in (2..=rep_len).rev() {
                    self.extend_lattice(&mut len_end, cur + len_test);
                    let cur_and_len_price = rep_match_price
                        + self.rep_price(rep_index as u32, len_test, state, pos_state);
                    let opt = &mut self.optimum[(cur + len_test) as usize];
                    if cur_and_len_price < opt.price {
                        opt.price = cur_and_len_price;
                        opt.pos_prev = cur;
                        opt.back_prev = rep_index as u32;
                        opt.prev1_is_char = false;
                    }
                }

                if rep_index == 0 {
                    start_len = rep_len + 1;
                }

                // rep + literal + rep0
                if rep_len >= num_available_full {
                    continue;
                }
                let limit = (num_available_full - 1 - rep_len).min(num_fast_bytes);
                let len_test2 = self.match_finder.get_match_len(rep_len as i32, rep, limit);
                if len_test2 < 2 {
                    continue;
                }

                let mut state2 = state;
                state2.update_long_rep();
                let mut pos_state_next = ((position + rep_len) & self.pos_state_mask) as usize;
                let cur_and_len_char_price = rep_match_price
                    + self.rep_price(rep_index as u32, rep_len, state, pos_state)
                    + price0(self.model.is_match[state2.value()][pos_state_next])
                    + self.literal_price(
                        position + rep_len,
                        self.match_finder.get_index_byte(rep_len as i32 - 2),
                        true,
                        self.match_finder
                            .get_index_byte(rep_len as i32 - 1 - (rep as i32 + 1)),
                        self.match_finder.get_index_byte(rep_len as i32 - 1),
                    );
                state2.update_literal();
                pos_state_next = ((position + rep_len + 1) & self.pos_state_mask) as usize;
                let next_match_price = cur_and_len_char_price
                    + price1(self.model.is_match[state2.value()][pos_state_next]);
                let next_rep_match_price =
                    next_match_price + price1(self.model.is_rep[state2.value()]);

                let offset = rep_len + 1 + len_test2;
                self.extend_lattice(&mut len_end, cur + offset);
                let cur_and_len_price =
                    next_rep_match_price + self.rep_price(0, len_test2, state2, pos_state_next);
                let opt = &mut self.optimum[(cur + offset) as usize];
                if cur_and_len_price < opt.price {
                    opt.price = cur_and_len_price;
                    opt.pos_prev = cur + rep_len + 1;
                    opt.back_prev = 0;
                    opt.prev1_is_char = true;
                    opt.prev2 = true;
                    opt.pos_prev2 = cur;
                    opt.back_prev2 = rep_index as u32;
                }
            }

            if new_len > num_available {
                new_len = num_available;
                if let Some(k) = self.matches.iter().position(|m| m.len >= new_len) {
                    self.matches[k].len = new_len;
                    self.matches.truncate(k + 1);
                }
            }

            if new_len < start_len {
                continue;
            }

            normal_match_price = match_price + price0(self.model.is_rep[st]);
            self.extend_lattice(&mut len_end, cur + new_len);

            let mut offs = 0;
            while start_len > self.matches[offs].len {
                offs += 1;
            }

            let mut len_test = start_len;
            loop {
                let cur_back = self.matches[offs].dist;
                let mut cur_and_len_price =
                    normal_match_price + self.pos_len_price(cur_back, len_test, pos_state);
                {
                    let opt = &mut self.optimum[(cur + len_test) as usize];
                    if cur_and_len_price < opt.price {
                        opt.price = cur_and_len_price;
                        opt.pos_prev = cur;
                        opt.back_prev = cur_back + NUM_REP_DISTANCES as u32;
                        opt.prev1_is_char = false;
                    }
                }

                if len_test == self.matches[offs].len {
                    // match + literal + rep0
                    if len_test < num_available_full {
                        let limit = (num_available_full - 1 - len_test).min(num_fast_bytes);
                        let len_test2 =
                            self.match_finder
                                .get_match_len(len_test as i32, cur_back, limit);
                        if len_test2 >= 2 {
                            let mut state2 = state;
                            state2.update_match();
                            let mut pos_state_next =
                                ((position + len_test) & self.pos_state_mask) as usize;
                            let cur_and_len_char_price = cur_and_len_price
                                + price0(self.model.is_match[state2.value()][pos_state_next])
                                + self.literal_price(
                                    position + len_test,
                                    self.match_finder.get_index_byte(len_test as i32 - 2),
                                    true,
                                    self.match_finder.get_index_byte(
                                        len_test as i32 - (cur_back as i32 + 1) - 1,
                                    ),
                                    self.match_finder.get_index_byte(len_test as i32 - 1),
                                );
                            state2.update_literal();
                            pos_state_next =
                                ((position + len_test + 1) & self.pos_state_mask) as usize;
                            let next_match_price = cur_and_len_char_price
                                + price1(self.model.is_match[state2.value()][pos_state_next]);
                            let next_rep_match_price =
                                next_match_price + price1(self.model.is_rep[state2.value()]);

                            let offset = len_test + 1 + len_test2;
                            self.extend_lattice(&mut len_end, cur + offset);
                            cur_and_len_price = next_rep_match_price
                                + self.rep_price(0, len_test2, state2, pos_state_next);
                            let opt = &mut self.optimum[(cur + offset) as usize];
                            if cur_and_len_price < opt.price {
                                opt.price = cur_and_len_price;
                                opt.pos_prev = cur + len_test + 1;
                                opt.back_prev = 0;
                                opt.prev1_is_char = true;
                                opt.prev2 = true;
                                opt.pos_prev2 = cur;
                                opt.back_prev2 = cur_back + NUM_REP_DISTANCES as u32;
                            }
                        }
                    }

                    offs += 1;
                    if offs == self.matches.len() {
                        break;
                    }
                }
                len_test += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::EncoderOptions;
    use std::io::Cursor;

    fn encoder_for(data: &[u8]) -> LzmaEncoder<Cursor<Vec<u8>>> {
        let options = EncoderOptions::default().with_dict_size(1 << 16);
        let mut encoder = LzmaEncoder::new(Cursor::new(data.to_vec()), &options).unwrap();
        encoder.match_finder.init(&[]).unwrap();
        encoder
    }

    /// Replay the parse the way the block coder does, without coding bits.
    fn parse(encoder: &mut LzmaEncoder<Cursor<Vec<u8>>>, total: u32) -> Vec<(u32, u32)> {
        let mut tokens = Vec::new();
        // first byte is a literal
        encoder.read_match_distances().unwrap();
        encoder.additional_offset -= 1;
        let mut pos = 1;
        while pos < total {
            let (len, back) = encoder.get_optimum(pos).unwrap();
            tokens.push((len, back));
            if back >= NUM_REP_DISTANCES as u32 && back != LITERAL {
                push_rep(&mut encoder.rep_distances, back - NUM_REP_DISTANCES as u32);
            } else if back < NUM_REP_DISTANCES as u32 {
                rotate_reps(&mut encoder.rep_distances, back as usize);
            }
            encoder.additional_offset -= len;
            pos += len;
        }
        tokens
    }

    #[test]
    fn test_optimal_flags() {
        let mut opt = Optimal::default();
        opt.prev1_is_char = true;
        opt.make_as_char();
        assert_eq!(opt.back_prev, LITERAL);
        assert!(!opt.prev1_is_char);
        assert!(!opt.is_short_rep());
        opt.make_as_short_rep();
        assert!(opt.is_short_rep());
    }

    #[test]
    fn test_tokens_cover_input() {
        let data: Vec<u8> = b"abracadabra, abracadabra! cadabra abra"
            .iter()
            .cycle()
            .take(3000)
            .copied()
            .collect();
        let mut encoder = encoder_for(&data);
        let tokens = parse(&mut encoder, data.len() as u32);
        let covered: u32 = tokens.iter().map(|t| t.0).sum();
        assert_eq!(covered + 1, data.len() as u32);
        assert!(tokens.iter().all(|&(len, _)| (1..=MATCH_MAX_LEN).contains(&len)));
        // a periodic input is mostly covered by long matches
        assert!(tokens.len() < 200, "{} tokens", tokens.len());
    }

    #[test]
    fn test_literals_for_incompressible_input() {
        let data: Vec<u8> = (0..=255u8).collect();
        let mut encoder = encoder_for(&data);
        let tokens = parse(&mut encoder, data.len() as u32);
        assert!(tokens.iter().all(|&(len, back)| len == 1 && back == LITERAL));
    }

    #[test]
    fn test_long_run_uses_rep0() {
        let data = vec![0x55u8; 2000];
        let mut encoder = encoder_for(&data);
        let tokens = parse(&mut encoder, data.len() as u32);
        // after the first match, the run continues at rep0
        assert!(tokens.iter().skip(1).all(|&(_, back)| back == 0));
        assert!(tokens.len() <= 10);
    }
}
