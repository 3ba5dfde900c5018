//! Decompress command implementation.

use crate::utils::{
    CliResult, Target, check_overwrite, copy_mtime, create_progress_bar, decompressed_target,
    discard_output, open_input, open_output, print_summary, read_history,
};
use log::{debug, info};
use oxilzma::{HEADER_SIZE, LzmaDecoder, LzmaHeader};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

/// Arguments of `oxilzma decompress`.
#[derive(Debug, Clone)]
pub struct DecompressArgs {
    pub input: PathBuf,
    pub output: Option<PathBuf>,
    pub train: Option<PathBuf>,
    pub force: bool,
    pub progress: bool,
}

pub fn cmd_decompress(args: &DecompressArgs) -> CliResult<()> {
    let target = decompressed_target(&args.input, args.output.as_deref());
    if let Target::File(path) = &target {
        if path == &args.input {
            return Err(format!("output would overwrite input {}", path.display()).into());
        }
    }
    check_overwrite(&target, args.force)?;

    let (mut reader, _) = open_input(&args.input)?;
    let header = LzmaHeader::read_from(&mut reader)?;
    info!(
        "decompressing {}: lc={} lp={} pb={}, dict {} B",
        args.input.display(),
        header.props.lc,
        header.props.lp,
        header.props.pb,
        header.dict_size
    );

    let mut writer = open_output(&target)?;
    let result = decode_body(
        &header,
        &mut reader,
        &mut writer,
        args.train.as_deref(),
        args.progress,
    );
    drop(writer);
    let (consumed, produced) = match result {
        Ok(totals) => totals,
        Err(e) => {
            discard_output(&target);
            return Err(e);
        }
    };
    copy_mtime(&args.input, &target)?;

    print_summary(
        &target,
        !args.progress,
        &format!(
            "{}: {} -> {} bytes",
            args.input.display(),
            consumed + HEADER_SIZE as u64,
            produced
        ),
    );
    Ok(())
}

/// Decode the stream body after `header`, returning `(bytes read, bytes written)`.
pub fn decode_body<R: Read, W: Write>(
    header: &LzmaHeader,
    reader: &mut R,
    writer: &mut W,
    train: Option<&Path>,
    progress: bool,
) -> CliResult<(u64, u64)> {
    let mut decoder = LzmaDecoder::from_header(header)?;
    if let Some(path) = train {
        let history = read_history(path)?;
        let kept = decoder.train(history.as_slice())?;
        debug!("trained on {} of {} history bytes", kept, history.len());
    }

    let pb = create_progress_bar(header.uncompressed_size, progress);
    let mut consumed = 0u64;
    let mut report = |in_size: u64, out_size: u64| -> oxilzma::Result<()> {
        consumed = in_size;
        pb.set_position(out_size);
        Ok(())
    };
    let produced =
        decoder.decode_with_progress(reader, writer, header.uncompressed_size, &mut report)?;
    writer.flush()?;
    pb.finish_and_clear();

    Ok((consumed, produced))
}
