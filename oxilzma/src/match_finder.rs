//! Binary-tree match finder.
//!
//! Every position is inserted into a binary search tree rooted at the hash
//! bucket of its first bytes. Searching and inserting happen in one pass:
//! while walking down from the root, the tree is re-split around the new
//! position so it becomes the new root. Nodes live in a flat arena (`son`)
//! indexed by `position mod cyclic_buffer_size`; link value 0 means empty.
//!
//! Two kinds are supported:
//! - `BT2`: direct 16-bit hash of the first two bytes.
//! - `BT4`: CRC-based hash of four bytes, plus side tables for 2- and 3-byte
//!   prefixes that report short close matches.

use crate::in_window::InWindow;
use crate::options::MatchFinderKind;
use log::trace;
use oxilzma_core::crc::CRC32_TABLE;
use oxilzma_core::error::{OxiLzmaError, Result};
use std::io::Read;

const HASH2_SIZE: u32 = 1 << 10;
const HASH3_SIZE: u32 = 1 << 16;
const BT2_HASH_SIZE: u32 = 1 << 16;
const HASH3_OFFSET: u32 = HASH2_SIZE;
const START_MAX_LEN: u32 = 1;
const EMPTY_HASH_VALUE: u32 = 0;

/// Positions are rebased before they reach this value.
const MAX_VAL_FOR_NORMALIZE: u32 = (1 << 31) - 1;

/// Largest history the finder accepts.
pub const MAX_HISTORY_SIZE: u32 = MAX_VAL_FOR_NORMALIZE - 256;

/// A match candidate: `len` bytes at `dist + 1` bytes back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Match {
    /// Match length.
    pub len: u32,
    /// Zero-based distance.
    pub dist: u32,
}

/// Binary-tree match finder over an [`InWindow`].
#[derive(Debug)]
pub struct BinTree<R> {
    window: InWindow<R>,
    kind: MatchFinderKind,
    cyclic_buffer_pos: u32,
    cyclic_buffer_size: u32,
    match_max_len: u32,
    son: Vec<u32>,
    hash: Vec<u32>,
    hash_mask: u32,
    cut_value: u32,
    fix_hash_size: u32,
    min_match_check: u32,
    num_hash_direct_bytes: u32,
}

impl<R: Read> BinTree<R> {
    /// Create a match finder.
    ///
    /// `keep_add_before` and `keep_add_after` are extra bytes the window
    /// keeps around the current position on top of the history and the
    /// longest reported match.
    pub fn new(
        reader: R,
        kind: MatchFinderKind,
        history_size: u32,
        keep_add_before: u32,
        match_max_len: u32,
        keep_add_after: u32,
    ) -> Result<Self> {
        if history_size > MAX_HISTORY_SIZE {
            return Err(OxiLzmaError::invalid_parameter(
                "dict_size",
                format!("history of {} bytes is too large", history_size),
            ));
        }

        let reserve =
            (history_size + keep_add_before + match_max_len + keep_add_after) / 2 + 256;
        let window = InWindow::new(
            reader,
            history_size + keep_add_before,
            match_max_len + keep_add_after,
            reserve,
        );

        let cyclic_buffer_size = history_size + 1;

        let (fix_hash_size, min_match_check, num_hash_direct_bytes) = match kind {
            MatchFinderKind::Bt2 => (0, 3, 2),
            MatchFinderKind::Bt4 => (HASH2_SIZE + HASH3_SIZE, 4, 0),
        };

        let (hash_mask, hash_size) = match kind {
            MatchFinderKind::Bt2 => (BT2_HASH_SIZE - 1, BT2_HASH_SIZE),
            MatchFinderKind::Bt4 => {
                let mut hs = history_size.saturating_sub(1);
                hs |= hs >> 1;
                hs |= hs >> 2;
                hs |= hs >> 4;
                hs |= hs >> 8;
                hs >>= 1;
                hs |= 0xFFFF;
                if hs > 1 << 24 {
                    hs >>= 1;
                }
                (hs, hs + 1 + fix_hash_size)
            }
        };

        trace!(
            "match finder {}: history {}, hash size {}, cyclic size {}",
            kind, history_size, hash_size, cyclic_buffer_size
        );

        Ok(Self {
            window,
            kind,
            cyclic_buffer_pos: 0,
            cyclic_buffer_size,
            match_max_len,
            son: vec![EMPTY_HASH_VALUE; cyclic_buffer_size as usize * 2],
            hash: vec![EMPTY_HASH_VALUE; hash_size as usize],
            hash_mask,
            cut_value: 16 + (match_max_len >> 1),
            fix_hash_size,
            min_match_check,
            num_hash_direct_bytes,
        })
    }

    /// Reset the finder and start reading. `prefix` is placed in front of
    /// the source and must be shorter than the history.
    pub fn init(&mut self, prefix: &[u8]) -> Result<()> {
        self.window.init(prefix)?;
        self.hash.fill(EMPTY_HASH_VALUE);
        self.cyclic_buffer_pos = 0;
        // position 0 is reserved for "empty"
        self.window.reduce_offsets(-1);
        Ok(())
    }

    /// Byte at `index` relative to the current position.
    #[inline]
    pub fn get_index_byte(&self, index: i32) -> u8 {
        self.window.get_index_byte(index)
    }

    /// Match length at `index` against `distance + 1` bytes back.
    #[inline]
    pub fn get_match_len(&self, index: i32, distance: u32, limit: u32) -> u32 {
        self.window.get_match_len(index, distance, limit)
    }

    /// Bytes left in front of the current position.
    #[inline]
    pub fn num_available_bytes(&self) -> u32 {
        self.window.num_available_bytes()
    }

    fn len_limit(&self) -> Option<u32> {
        let pos = self.window.pos();
        let stream_pos = self.window.stream_pos();
        if pos + self.match_max_len <= stream_pos {
            Some(self.match_max_len)
        } else {
            let len_limit = stream_pos - pos;
            (len_limit >= self.min_match_check).then_some(len_limit)
        }
    }

    /// Hash values of the bytes at `pos`: `(hash2, hash3, main)`.
    fn hash_values(&self, pos: u32) -> (u32, u32, u32) {
        let cur = self.window.bytes_from(pos);
        match self.kind {
            MatchFinderKind::Bt2 => (0, 0, cur[0] as u32 ^ ((cur[1] as u32) << 8)),
            MatchFinderKind::Bt4 => {
                let mut temp = CRC32_TABLE[cur[0] as usize] ^ cur[1] as u32;
                let hash2 = temp & (HASH2_SIZE - 1);
                temp ^= (cur[2] as u32) << 8;
                let hash3 = temp & (HASH3_SIZE - 1);
                let main = (temp ^ (CRC32_TABLE[cur[3] as usize] << 5)) & self.hash_mask;
                (hash2, hash3, main)
            }
        }
    }

    fn match_min_pos(&self, pos: u32) -> u32 {
        pos.saturating_sub(self.cyclic_buffer_size)
    }

    /// Find matches at the current position and advance by one byte.
    ///
    /// `matches` receives candidates with strictly increasing lengths.
    pub fn get_matches(&mut self, matches: &mut Vec<Match>) -> Result<()> {
        matches.clear();
        let Some(len_limit) = self.len_limit() else {
            return self.move_pos();
        };

        let pos = self.window.pos();
        let match_min_pos = self.match_min_pos(pos);
        let mut max_len = START_MAX_LEN;
        let (hash2, hash3, hash_value) = self.hash_values(pos);
        let main_slot = (self.fix_hash_size + hash_value) as usize;
        let cur_match = self.hash[main_slot];

        if self.kind == MatchFinderKind::Bt4 {
            let mut cur_match2 = self.hash[hash2 as usize];
            let cur_match3 = self.hash[(HASH3_OFFSET + hash3) as usize];
            self.hash[hash2 as usize] = pos;
            self.hash[(HASH3_OFFSET + hash3) as usize] = pos;

            let cur_byte = self.window.byte_at(pos);
            if cur_match2 > match_min_pos && self.window.byte_at(cur_match2) == cur_byte {
                max_len = 2;
                matches.push(Match {
                    len: 2,
                    dist: pos - cur_match2 - 1,
                });
            }
            if cur_match3 > match_min_pos && self.window.byte_at(cur_match3) == cur_byte {
                if cur_match3 == cur_match2 {
                    matches.pop();
                }
                max_len = 3;
                matches.push(Match {
                    len: 3,
                    dist: pos - cur_match3 - 1,
                });
                cur_match2 = cur_match3;
            }
            // the tree walk reports this candidate with its full length
            if !matches.is_empty() && cur_match2 == cur_match {
                matches.pop();
                max_len = START_MAX_LEN;
            }
        }

        self.hash[main_slot] = pos;

        let direct = self.num_hash_direct_bytes;
        if direct != 0
            && cur_match > match_min_pos
            && self.window.byte_at(cur_match + direct) != self.window.byte_at(pos + direct)
        {
            max_len = direct;
            matches.push(Match {
                len: direct,
                dist: pos - cur_match - 1,
            });
        }

        self.insert(pos, len_limit, cur_match, match_min_pos, max_len, Some(matches));
        self.move_pos()
    }

    /// Insert the next `num` positions without reporting matches.
    pub fn skip(&mut self, num: u32) -> Result<()> {
        for _ in 0..num {
            let Some(len_limit) = self.len_limit() else {
                self.move_pos()?;
                continue;
            };

            let pos = self.window.pos();
            let match_min_pos = self.match_min_pos(pos);
            let (hash2, hash3, hash_value) = self.hash_values(pos);
            if self.kind == MatchFinderKind::Bt4 {
                self.hash[hash2 as usize] = pos;
                self.hash[(HASH3_OFFSET + hash3) as usize] = pos;
            }
            let main_slot = (self.fix_hash_size + hash_value) as usize;
            let cur_match = self.hash[main_slot];
            self.hash[main_slot] = pos;

            self.insert(pos, len_limit, cur_match, match_min_pos, START_MAX_LEN, None);
            self.move_pos()?;
        }
        Ok(())
    }

    /// Walk the tree from `cur_match`, re-rooting it at `pos`.
    fn insert(
        &mut self,
        pos: u32,
        len_limit: u32,
        mut cur_match: u32,
        match_min_pos: u32,
        mut max_len: u32,
        mut matches: Option<&mut Vec<Match>>,
    ) {
        let mut ptr0 = ((self.cyclic_buffer_pos << 1) + 1) as usize;
        let mut ptr1 = (self.cyclic_buffer_pos << 1) as usize;
        let mut len0 = self.num_hash_direct_bytes;
        let mut len1 = self.num_hash_direct_bytes;
        let mut count = self.cut_value;

        loop {
            if cur_match <= match_min_pos || count == 0 {
                self.son[ptr0] = EMPTY_HASH_VALUE;
                self.son[ptr1] = EMPTY_HASH_VALUE;
                return;
            }
            count -= 1;

            let delta = pos - cur_match;
            let node = if delta <= self.cyclic_buffer_pos {
                self.cyclic_buffer_pos - delta
            } else {
                self.cyclic_buffer_pos + self.cyclic_buffer_size - delta
            };
            let cyclic_pos = node as usize * 2;

            let mut len = len0.min(len1);
            if self.window.byte_at(cur_match + len) == self.window.byte_at(pos + len) {
                len += 1;
                while len != len_limit
                    && self.window.byte_at(cur_match + len) == self.window.byte_at(pos + len)
                {
                    len += 1;
                }
                if max_len < len {
                    max_len = len;
                    if let Some(out) = matches.as_mut() {
                        out.push(Match {
                            len,
                            dist: delta - 1,
                        });
                    }
                }
                if len == len_limit {
                    self.son[ptr1] = self.son[cyclic_pos];
                    self.son[ptr0] = self.son[cyclic_pos + 1];
                    return;
                }
            }

            if self.window.byte_at(cur_match + len) < self.window.byte_at(pos + len) {
                self.son[ptr1] = cur_match;
                ptr1 = cyclic_pos + 1;
                cur_match = self.son[ptr1];
                len1 = len;
            } else {
                self.son[ptr0] = cur_match;
                ptr0 = cyclic_pos;
                cur_match = self.son[ptr0];
                len0 = len;
            }
        }
    }

    fn move_pos(&mut self) -> Result<()> {
        self.cyclic_buffer_pos += 1;
        if self.cyclic_buffer_pos >= self.cyclic_buffer_size {
            self.cyclic_buffer_pos = 0;
        }
        self.window.move_pos()?;
        if self.window.pos() == MAX_VAL_FOR_NORMALIZE {
            self.normalize();
        }
        Ok(())
    }

    /// Rebase every stored position so the counters stay below 2^31.
    fn normalize(&mut self) {
        let sub_value = self.window.pos() - self.cyclic_buffer_size;
        trace!("normalizing match finder positions by {}", sub_value);
        for link in self.son.iter_mut().chain(self.hash.iter_mut()) {
            *link = if *link <= sub_value {
                EMPTY_HASH_VALUE
            } else {
                *link - sub_value
            };
        }
        self.window.reduce_offsets(sub_value as i32);
    }
}
