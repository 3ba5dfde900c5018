//! Info command implementation.

use crate::utils::{CliResult, space_savings};
use oxilzma::LzmaHeader;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// JSON output for `oxilzma info --json`.
#[derive(Debug, Serialize, Deserialize)]
struct InfoJson {
    file: String,
    file_size: u64,
    properties: u8,
    lc: u32,
    lp: u32,
    pb: u32,
    dict_size: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    uncompressed_size: Option<u64>,
    end_marker: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    savings: Option<f64>,
}

impl InfoJson {
    fn new(path: &Path, file_size: u64, header: &LzmaHeader) -> Self {
        Self {
            file: path.display().to_string(),
            file_size,
            properties: header.props.to_byte(),
            lc: header.props.lc,
            lp: header.props.lp,
            pb: header.props.pb,
            dict_size: header.dict_size,
            uncompressed_size: header.uncompressed_size,
            end_marker: header.uncompressed_size.is_none(),
            savings: header
                .uncompressed_size
                .map(|size| space_savings(size, file_size)),
        }
    }
}

pub fn cmd_info(input: &Path, json: bool) -> CliResult<()> {
    let file = File::open(input)?;
    let file_size = file.metadata()?.len();
    let header = LzmaHeader::read_from(&mut BufReader::new(file))?;
    let info = InfoJson::new(input, file_size, &header);

    if json {
        println!("{}", serde_json::to_string_pretty(&info)?);
        return Ok(());
    }

    println!("LZMA Stream Information");
    println!("=======================");
    println!("File: {}", info.file);
    println!("Size: {} bytes", info.file_size);
    println!();
    println!("Header:");
    println!("  Properties: 0x{:02X}", info.properties);
    println!("  Literal context bits (lc): {}", info.lc);
    println!("  Literal position bits (lp): {}", info.lp);
    println!("  Position bits (pb): {}", info.pb);
    println!("  Dictionary size: {} bytes", info.dict_size);
    match info.uncompressed_size {
        Some(size) => println!("  Uncompressed size: {} bytes", size),
        None => println!("  Uncompressed size: unknown (end marker)"),
    }
    if let Some(savings) = info.savings {
        println!("  Space savings: {:.1}%", savings);
    }

    Ok(())
}
