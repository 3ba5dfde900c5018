//! Error types for OxiLZMA operations.
//!
//! Every failure the codec can report falls into one of a few groups:
//! rejected configuration, malformed headers, corrupt compressed data,
//! truncated input and plain I/O failures from the caller's reader or writer.

use std::io;
use thiserror::Error;

/// The main error type for OxiLZMA operations.
#[derive(Debug, Error)]
pub enum OxiLzmaError {
    /// I/O error from underlying reader/writer.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// An encoder or decoder parameter is out of its allowed range.
    #[error("Invalid parameter {name}: {message}")]
    InvalidParameter {
        /// Name of the offending parameter.
        name: &'static str,
        /// Description of the violation.
        message: String,
    },

    /// Invalid header format.
    #[error("Invalid header: {message}")]
    InvalidHeader {
        /// Description of the header error.
        message: String,
    },

    /// Corrupted data in the compressed stream.
    #[error("Corrupted data at offset {offset}: {message}")]
    CorruptedData {
        /// Uncompressed position where corruption was detected.
        offset: u64,
        /// Description of the corruption.
        message: String,
    },

    /// The compressed stream ended before the data was complete.
    #[error("Unexpected end of input after {position} compressed bytes")]
    UnexpectedEof {
        /// Number of compressed bytes consumed before the input ran out.
        position: u64,
    },

    /// CRC checksum mismatch.
    #[error("CRC mismatch: expected {expected:#010x}, computed {computed:#010x}")]
    CrcMismatch {
        /// Expected CRC value.
        expected: u32,
        /// Computed CRC value from data.
        computed: u32,
    },
}

/// Result type alias for OxiLZMA operations.
pub type Result<T> = std::result::Result<T, OxiLzmaError>;

impl OxiLzmaError {
    /// Create an invalid parameter error.
    pub fn invalid_parameter(name: &'static str, message: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name,
            message: message.into(),
        }
    }

    /// Create an invalid header error.
    pub fn invalid_header(message: impl Into<String>) -> Self {
        Self::InvalidHeader {
            message: message.into(),
        }
    }

    /// Create a corrupted data error.
    pub fn corrupted(offset: u64, message: impl Into<String>) -> Self {
        Self::CorruptedData {
            offset,
            message: message.into(),
        }
    }

    /// Create an unexpected EOF error.
    pub fn unexpected_eof(position: u64) -> Self {
        Self::UnexpectedEof { position }
    }

    /// Create a CRC mismatch error.
    pub fn crc_mismatch(expected: u32, computed: u32) -> Self {
        Self::CrcMismatch { expected, computed }
    }

    /// Returns true if the error means the input was cut short.
    pub fn is_truncation(&self) -> bool {
        match self {
            Self::UnexpectedEof { .. } => true,
            Self::Io(e) => e.kind() == io::ErrorKind::UnexpectedEof,
            _ => false,
        }
    }
}
