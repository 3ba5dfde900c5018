//! `.lzma` stream header.
//!
//! ```text
//! +-------+----------------+------------------------+
//! | props | dict size (LE) | uncompressed size (LE) |
//! | 1 B   | 4 B            | 8 B, all ones=unknown  |
//! +-------+----------------+------------------------+
//! ```

use crate::model::LzmaProperties;
use oxilzma_core::error::{OxiLzmaError, Result};
use std::io::{self, Read, Write};

/// Size of the coder properties (props byte and dictionary size).
pub const PROPS_SIZE: usize = 5;

/// Size of the full header.
pub const HEADER_SIZE: usize = PROPS_SIZE + 8;

/// Size field value meaning "unknown, terminated by an end marker".
pub const UNKNOWN_SIZE: u64 = u64::MAX;

/// Parsed `.lzma` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LzmaHeader {
    /// Literal and position bits.
    pub props: LzmaProperties,
    /// Dictionary size.
    pub dict_size: u32,
    /// Uncompressed size, `None` if the stream ends with an end marker.
    pub uncompressed_size: Option<u64>,
}

impl LzmaHeader {
    /// Create a header.
    pub fn new(props: LzmaProperties, dict_size: u32, uncompressed_size: Option<u64>) -> Self {
        Self {
            props,
            dict_size,
            uncompressed_size,
        }
    }

    /// Decode the 5 coder property bytes.
    pub fn parse_properties(bytes: &[u8]) -> Result<(LzmaProperties, u32)> {
        if bytes.len() < PROPS_SIZE {
            return Err(OxiLzmaError::invalid_header(format!(
                "coder properties need {} bytes, got {}",
                PROPS_SIZE,
                bytes.len()
            )));
        }
        let props = LzmaProperties::from_byte(bytes[0])?;
        let dict_size = u32::from_le_bytes([bytes[1], bytes[2], bytes[3], bytes[4]]);
        Ok((props, dict_size))
    }

    /// Parse a header from the start of `bytes`.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_SIZE {
            return Err(OxiLzmaError::invalid_header(format!(
                "header needs {} bytes, got {}",
                HEADER_SIZE,
                bytes.len()
            )));
        }
        let (props, dict_size) = Self::parse_properties(&bytes[..PROPS_SIZE])?;
        let mut size = [0u8; 8];
        size.copy_from_slice(&bytes[PROPS_SIZE..HEADER_SIZE]);
        let size = u64::from_le_bytes(size);
        Ok(Self {
            props,
            dict_size,
            uncompressed_size: (size != UNKNOWN_SIZE).then_some(size),
        })
    }

    /// Read and parse a header.
    pub fn read_from<R: Read>(reader: &mut R) -> Result<Self> {
        let mut bytes = [0u8; HEADER_SIZE];
        let mut filled = 0;
        while filled < HEADER_SIZE {
            match reader.read(&mut bytes[filled..]) {
                Ok(0) => {
                    return Err(OxiLzmaError::invalid_header(format!(
                        "header needs {} bytes, got {}",
                        HEADER_SIZE, filled
                    )));
                }
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Self::parse(&bytes)
    }

    /// Coder property bytes.
    pub fn properties_bytes(&self) -> [u8; PROPS_SIZE] {
        let dict = self.dict_size.to_le_bytes();
        [self.props.to_byte(), dict[0], dict[1], dict[2], dict[3]]
    }

    /// Serialize the header.
    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut bytes = [0u8; HEADER_SIZE];
        bytes[..PROPS_SIZE].copy_from_slice(&self.properties_bytes());
        let size = self.uncompressed_size.unwrap_or(UNKNOWN_SIZE);
        bytes[PROPS_SIZE..].copy_from_slice(&size.to_le_bytes());
        bytes
    }

    /// Write the header.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(&self.to_bytes())?;
        Ok(())
    }
}
