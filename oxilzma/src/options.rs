//! Encoder configuration.
//!
//! [`EncoderOptions`] collects every tunable of the encoder. Values can be
//! set through the `with_*` builders, one [`CoderProperty`] at a time, or
//! from a [`LzmaLevel`] preset. Everything is checked by
//! [`EncoderOptions::validate`] before an encoder is built.

use crate::model::{
    LC_DEFAULT, LIT_CONTEXT_BITS_MAX, LIT_POS_BITS_ENCODING_MAX, LP_DEFAULT, LzmaProperties,
    MATCH_MAX_LEN, PB_DEFAULT, POS_STATES_BITS_MAX,
};
use oxilzma_core::error::{OxiLzmaError, Result};
use std::fmt;
use std::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Default dictionary size (4 MiB).
pub const DICT_SIZE_DEFAULT: u32 = 1 << 22;
/// Smallest dictionary size.
pub const DICT_SIZE_MIN: u32 = 1;
/// Largest dictionary size (1 GiB).
pub const DICT_SIZE_MAX: u32 = 1 << 30;

/// Default number of fast bytes.
pub const FAST_BYTES_DEFAULT: u32 = 32;
/// Minimum fast bytes value.
pub const FAST_BYTES_MIN: u32 = 5;
/// Maximum fast bytes value.
pub const FAST_BYTES_MAX: u32 = MATCH_MAX_LEN;

/// Match finder algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum MatchFinderKind {
    /// Binary tree keyed by 2 bytes.
    Bt2,
    /// Binary tree keyed by 4 bytes, with 2- and 3-byte side hashes.
    #[default]
    Bt4,
}

impl MatchFinderKind {
    /// Canonical name.
    pub fn name(self) -> &'static str {
        match self {
            Self::Bt2 => "BT2",
            Self::Bt4 => "BT4",
        }
    }
}

impl fmt::Display for MatchFinderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for MatchFinderKind {
    type Err = OxiLzmaError;

    fn from_str(s: &str) -> Result<Self> {
        if s.eq_ignore_ascii_case("bt2") {
            Ok(Self::Bt2)
        } else if s.eq_ignore_ascii_case("bt4") {
            Ok(Self::Bt4)
        } else {
            Err(OxiLzmaError::invalid_parameter(
                "match_finder",
                format!("unknown match finder '{}'", s),
            ))
        }
    }
}

/// A single encoder setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum CoderProperty {
    /// Dictionary size in bytes.
    DictionarySize(u32),
    /// Number of position bits (`pb`).
    PosStateBits(u32),
    /// Number of literal position bits (`lp`).
    LitPosBits(u32),
    /// Number of literal context bits (`lc`).
    LitContextBits(u32),
    /// Match length that stops the optimal parser early.
    NumFastBytes(u32),
    /// Match finder algorithm.
    MatchFinder(MatchFinderKind),
    /// Always terminate the stream with an end marker.
    EndMarker(bool),
}

/// Encoder options.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct EncoderOptions {
    /// Dictionary size in bytes.
    pub dict_size: u32,
    /// Match length that stops the optimal parser early.
    pub num_fast_bytes: u32,
    /// Match finder algorithm.
    pub match_finder: MatchFinderKind,
    /// Literal context bits.
    pub lc: u32,
    /// Literal position bits.
    pub lp: u32,
    /// Position bits.
    pub pb: u32,
    /// Always terminate the stream with an end marker.
    pub end_marker: bool,
}

impl Default for EncoderOptions {
    fn default() -> Self {
        Self {
            dict_size: DICT_SIZE_DEFAULT,
            num_fast_bytes: FAST_BYTES_DEFAULT,
            match_finder: MatchFinderKind::Bt4,
            lc: LC_DEFAULT,
            lp: LP_DEFAULT,
            pb: PB_DEFAULT,
            end_marker: false,
        }
    }
}

impl EncoderOptions {
    /// Default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Options for a compression level.
    pub fn from_level(level: LzmaLevel) -> Self {
        Self {
            dict_size: level.dict_size(),
            num_fast_bytes: level.num_fast_bytes(),
            match_finder: level.match_finder(),
            ..Self::default()
        }
    }

    /// Set the dictionary size.
    pub fn with_dict_size(mut self, dict_size: u32) -> Self {
        self.dict_size = dict_size;
        self
    }

    /// Set the number of fast bytes.
    pub fn with_num_fast_bytes(mut self, num_fast_bytes: u32) -> Self {
        self.num_fast_bytes = num_fast_bytes;
        self
    }

    /// Set the match finder.
    pub fn with_match_finder(mut self, match_finder: MatchFinderKind) -> Self {
        self.match_finder = match_finder;
        self
    }

    /// Set `lc`, `lp` and `pb`.
    pub fn with_properties(mut self, lc: u32, lp: u32, pb: u32) -> Self {
        self.lc = lc;
        self.lp = lp;
        self.pb = pb;
        self
    }

    /// Request an end marker.
    pub fn with_end_marker(mut self, end_marker: bool) -> Self {
        self.end_marker = end_marker;
        self
    }

    /// Apply one property, rejecting out-of-range values.
    ///
    /// On error the options are left unchanged.
    pub fn set(&mut self, property: CoderProperty) -> Result<()> {
        let mut next = self.clone();
        match property {
            CoderProperty::DictionarySize(v) => next.dict_size = v,
            CoderProperty::PosStateBits(v) => next.pb = v,
            CoderProperty::LitPosBits(v) => next.lp = v,
            CoderProperty::LitContextBits(v) => next.lc = v,
            CoderProperty::NumFastBytes(v) => next.num_fast_bytes = v,
            CoderProperty::MatchFinder(kind) => next.match_finder = kind,
            CoderProperty::EndMarker(v) => next.end_marker = v,
        }
        next.validate()?;
        *self = next;
        Ok(())
    }

    /// Apply several properties at once. Either all of them take effect or none.
    pub fn apply(&mut self, properties: &[CoderProperty]) -> Result<()> {
        let mut next = self.clone();
        for &property in properties {
            next.set(property)?;
        }
        *self = next;
        Ok(())
    }

    /// Check every value against its allowed range.
    pub fn validate(&self) -> Result<()> {
        if !(FAST_BYTES_MIN..=FAST_BYTES_MAX).contains(&self.num_fast_bytes) {
            return Err(OxiLzmaError::invalid_parameter(
                "num_fast_bytes",
                format!(
                    "{} is outside {}..={}",
                    self.num_fast_bytes, FAST_BYTES_MIN, FAST_BYTES_MAX
                ),
            ));
        }
        if !(DICT_SIZE_MIN..=DICT_SIZE_MAX).contains(&self.dict_size) {
            return Err(OxiLzmaError::invalid_parameter(
                "dict_size",
                format!(
                    "{} is outside {}..={}",
                    self.dict_size, DICT_SIZE_MIN, DICT_SIZE_MAX
                ),
            ));
        }
        if self.pb > POS_STATES_BITS_MAX {
            return Err(OxiLzmaError::invalid_parameter(
                "pb",
                format!("{} exceeds {}", self.pb, POS_STATES_BITS_MAX),
            ));
        }
        if self.lp > LIT_POS_BITS_ENCODING_MAX {
            return Err(OxiLzmaError::invalid_parameter(
                "lp",
                format!("{} exceeds {}", self.lp, LIT_POS_BITS_ENCODING_MAX),
            ));
        }
        if self.lc > LIT_CONTEXT_BITS_MAX {
            return Err(OxiLzmaError::invalid_parameter(
                "lc",
                format!("{} exceeds {}", self.lc, LIT_CONTEXT_BITS_MAX),
            ));
        }
        Ok(())
    }

    /// The `lc`/`lp`/`pb` triple.
    pub fn properties(&self) -> LzmaProperties {
        LzmaProperties::new(self.lc, self.lp, self.pb)
    }
}

/// LZMA compression level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LzmaLevel(u8);

impl LzmaLevel {
    /// Fastest compression (level 0).
    pub const FAST: Self = Self(0);
    /// Default compression (level 5).
    pub const DEFAULT: Self = Self(5);
    /// Best compression (level 9).
    pub const BEST: Self = Self(9);

    /// Create a new compression level.
    pub fn new(level: u8) -> Self {
        Self(level.min(9))
    }

    /// Get the level value.
    pub fn level(&self) -> u8 {
        self.0
    }

    /// Get the dictionary size for this level.
    pub fn dict_size(&self) -> u32 {
        match self.0 {
            0 => 1 << 16, // 64 KB
            1 => 1 << 18, // 256 KB
            2 => 1 << 19, // 512 KB
            3 => 1 << 20, // 1 MB
            4 => 1 << 21, // 2 MB
            5 => 1 << 22, // 4 MB
            6 => 1 << 23, // 8 MB
            7 => 1 << 24, // 16 MB
            8 => 1 << 25, // 32 MB
            _ => 1 << 26, // 64 MB
        }
    }

    /// Get the number of fast bytes for this level.
    pub fn num_fast_bytes(&self) -> u32 {
        match self.0 {
            0 | 1 => 16,
            2..=5 => 32,
            6 | 7 => 64,
            8 => 128,
            _ => FAST_BYTES_MAX,
        }
    }

    /// Get the match finder for this level.
    pub fn match_finder(&self) -> MatchFinderKind {
        if self.0 < 2 {
            MatchFinderKind::Bt2
        } else {
            MatchFinderKind::Bt4
        }
    }
}

impl Default for LzmaLevel {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl From<LzmaLevel> for EncoderOptions {
    fn from(level: LzmaLevel) -> Self {
        Self::from_level(level)
    }
}
