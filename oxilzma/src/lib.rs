//! # OxiLZMA
//!
//! LZMA (Lempel-Ziv-Markov chain Algorithm) compression and decompression
//! for `.lzma` ("LZMA-alone") streams.
//!
//! LZMA combines an LZ77-style dictionary coder with a context-adaptive
//! binary range coder. Streams produced here are byte-compatible with the
//! 7-Zip and `xz --format=lzma`.
//!
//! ## Features
//!
//! - **Pure Rust** implementation
//! - **Optimal parsing** encoder with binary-tree match finders (BT2, BT4)
//! - **Streaming** encoder and decoder over `Read`/`Write`
//! - **Trained** (solid) coding against a shared history
//! - Progress callbacks with cooperative cancellation
//!
//! ## Usage
//!
//! ### Buffers
//!
//! ```rust
//! use oxilzma::{compress, decompress};
//!
//! let data = b"Hello, World! Hello, World!";
//! let packed = compress(data)?;
//! assert_eq!(decompress(&packed)?, data);
//! # Ok::<(), oxilzma::OxiLzmaError>(())
//! ```
//!
//! ### Streams
//!
//! ```rust
//! use oxilzma::{EncoderOptions, LzmaLevel, compress_stream, decompress_stream};
//! use std::io::Cursor;
//!
//! let data = vec![42u8; 10_000];
//! let options = EncoderOptions::from_level(LzmaLevel::new(3));
//! let mut packed = Vec::new();
//! compress_stream(Cursor::new(&data), &mut packed, &options, None)?;
//!
//! let mut out = Vec::new();
//! decompress_stream(Cursor::new(&packed), &mut out)?;
//! assert_eq!(out, data);
//! # Ok::<(), oxilzma::OxiLzmaError>(())
//! ```
//!
//! ## LZMA Format
//!
//! An `.lzma` stream consists of:
//! 1. Properties byte (`(pb * 5 + lp) * 9 + lc`)
//! 2. Dictionary size (4 bytes, little-endian)
//! 3. Uncompressed size (8 bytes, little-endian, all ones = unknown)
//! 4. Range-coded body, ending with an end marker when the size is unknown

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod decoder;
pub mod encoder;
pub mod header;
pub mod in_window;
pub mod length;
pub mod literal;
pub mod match_finder;
pub mod model;
mod optimal;
pub mod options;
pub mod out_window;
pub mod price;
pub mod range_coder;

// Re-exports
pub use decoder::{LzmaDecoder, decompress_stream};
pub use encoder::{LzmaEncoder, compress_stream};
pub use header::{HEADER_SIZE, LzmaHeader, PROPS_SIZE};
pub use match_finder::Match;
pub use model::{LzmaModel, LzmaProperties, State};
pub use options::{CoderProperty, EncoderOptions, LzmaLevel, MatchFinderKind};
pub use oxilzma_core::error::{OxiLzmaError, Result};
pub use oxilzma_core::progress::{CodeProgress, NoProgress};
pub use range_coder::{RangeDecoder, RangeEncoder};

use std::io::Cursor;

/// Compress data into a `.lzma` stream using default settings.
pub fn compress(data: &[u8]) -> Result<Vec<u8>> {
    compress_with(data, &EncoderOptions::default())
}

/// Compress data into a `.lzma` stream.
///
/// The header records the exact input size.
pub fn compress_with(data: &[u8], options: &EncoderOptions) -> Result<Vec<u8>> {
    let mut output = Vec::with_capacity(HEADER_SIZE + data.len() / 2);
    compress_stream(data, &mut output, options, Some(data.len() as u64))?;
    Ok(output)
}

/// Decompress a complete `.lzma` stream.
pub fn decompress(data: &[u8]) -> Result<Vec<u8>> {
    let header = LzmaHeader::parse(data)?;
    // the declared size may only lower the guess
    let guess = (data.len() - HEADER_SIZE).saturating_mul(4);
    let capacity = header
        .uncompressed_size
        .map_or(guess, |size| size.min(guess as u64) as usize);
    let mut output = Vec::with_capacity(capacity);
    decompress_stream(Cursor::new(data), &mut output)?;
    Ok(output)
}
