//! Compress command implementation.

use crate::utils::{
    CliResult, Target, check_overwrite, compressed_target, copy_mtime, create_progress_bar,
    discard_output, open_input, open_output, print_summary, read_history, space_savings,
};
use log::{debug, info};
use oxilzma::{CoderProperty, EncoderOptions, LzmaEncoder, LzmaLevel, MatchFinderKind};
use std::io::Write;
use std::path::PathBuf;

/// Arguments of `oxilzma compress`.
#[derive(Debug, Clone)]
pub struct CompressArgs {
    pub input: PathBuf,
    pub output: Option<PathBuf>,
    pub level: u8,
    pub dict_log: Option<u32>,
    pub fast_bytes: Option<u32>,
    pub lc: Option<u32>,
    pub lp: Option<u32>,
    pub pb: Option<u32>,
    pub match_finder: Option<MatchFinderKind>,
    pub eos: bool,
    pub train: Option<PathBuf>,
    pub force: bool,
    pub progress: bool,
}

impl CompressArgs {
    /// Start from the level preset and apply every explicit override.
    pub fn encoder_options(&self) -> CliResult<EncoderOptions> {
        let mut options = EncoderOptions::from_level(LzmaLevel::new(self.level));

        let mut overrides = Vec::new();
        if let Some(log) = self.dict_log {
            overrides.push(CoderProperty::DictionarySize(1 << log));
        }
        if let Some(fb) = self.fast_bytes {
            overrides.push(CoderProperty::NumFastBytes(fb));
        }
        if let Some(lc) = self.lc {
            overrides.push(CoderProperty::LitContextBits(lc));
        }
        if let Some(lp) = self.lp {
            overrides.push(CoderProperty::LitPosBits(lp));
        }
        if let Some(pb) = self.pb {
            overrides.push(CoderProperty::PosStateBits(pb));
        }
        if let Some(kind) = self.match_finder {
            overrides.push(CoderProperty::MatchFinder(kind));
        }
        if self.eos {
            overrides.push(CoderProperty::EndMarker(true));
        }
        options.apply(&overrides)?;
        Ok(options)
    }
}

pub fn cmd_compress(args: &CompressArgs) -> CliResult<()> {
    let options = args.encoder_options()?;
    let target = compressed_target(&args.input, args.output.as_deref());
    check_overwrite(&target, args.force)?;

    let (reader, size) = open_input(&args.input)?;
    let history = args.train.as_deref().map(read_history).transpose()?;
    info!(
        "compressing {} with dict {} B, {} fast bytes, {}",
        args.input.display(),
        options.dict_size,
        options.num_fast_bytes,
        options.match_finder
    );
    debug!("encoder options: {}", serde_json::to_string(&options)?);

    let mut writer = open_output(&target)?;
    let result = encode(reader, &mut writer, &options, size, history.as_deref(), args.progress);
    let (read, written) = match result {
        Ok(totals) => totals,
        Err(e) => {
            drop(writer);
            discard_output(&target);
            return Err(e);
        }
    };
    drop(writer);
    copy_mtime(&args.input, &target)?;

    let name = match &target {
        Target::File(path) => path.display().to_string(),
        Target::Stdout => "<stdout>".to_string(),
    };
    print_summary(
        &target,
        !args.progress,
        &format!(
            "{} -> {}: {} -> {} bytes ({:.1}% saved)",
            args.input.display(),
            name,
            read,
            written,
            space_savings(read, written)
        ),
    );
    Ok(())
}

/// Run the encoder and return `(bytes read, bytes written)`.
fn encode(
    reader: Box<dyn std::io::Read>,
    writer: &mut Box<dyn Write>,
    options: &EncoderOptions,
    size: Option<u64>,
    history: Option<&[u8]>,
    progress: bool,
) -> CliResult<(u64, u64)> {
    let mut encoder = LzmaEncoder::new(reader, options)?;
    if let Some(history) = history {
        encoder = encoder.with_dictionary(history);
    }
    encoder.header(size).write_to(writer)?;

    let pb = create_progress_bar(size, progress);
    let mut read = 0u64;
    let mut report = |in_size: u64, _out_size: u64| -> oxilzma::Result<()> {
        read = in_size;
        pb.set_position(in_size);
        Ok(())
    };
    let body = encoder.encode(writer, size, &mut report)?;
    writer.flush()?;
    pb.finish_and_clear();

    Ok((read, oxilzma::HEADER_SIZE as u64 + body))
}
