//! # OxiLZMA Core
//!
//! Core components shared by the OxiLZMA codec and its command-line tool.
//!
//! - [`crc`]: CRC-32 checksum and its lookup table
//! - [`progress`]: Progress callbacks for encoders and decoders
//! - [`error`]: Error types
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │ CLI                                                     │
//! │     oxilzma compress / decompress / info / test         │
//! ├─────────────────────────────────────────────────────────┤
//! │ Codec                                                   │
//! │     .lzma header, encoder (optimal parser), decoder     │
//! ├─────────────────────────────────────────────────────────┤
//! │ Engine                                                  │
//! │     windows, binary-tree match finder, range coder      │
//! ├─────────────────────────────────────────────────────────┤
//! │ Core (this crate)                                       │
//! │     CRC-32, progress, errors                            │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```rust
//! use oxilzma_core::crc::Crc32;
//!
//! let crc = Crc32::compute(b"Hello, World!");
//! assert_eq!(crc, 0xEC4AC3D0);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod crc;
pub mod error;
pub mod progress;

// Re-exports for convenience
pub use crc::Crc32;
pub use error::{OxiLzmaError, Result};
pub use progress::{CodeProgress, NoProgress};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::crc::Crc32;
    pub use crate::error::{OxiLzmaError, Result};
    pub use crate::progress::{CodeProgress, NoProgress};
}
