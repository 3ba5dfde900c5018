//! OxiLZMA CLI - The Oxidized LZMA
//!
//! A Pure Rust command-line tool for `.lzma` (LZMA-alone) files.

mod commands;
mod utils;

use clap::{ArgAction, CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use commands::{
    CompressArgs, DecompressArgs, cmd_compress, cmd_decompress, cmd_info, cmd_test, parse_crc,
};
use log::LevelFilter;
use oxilzma::MatchFinderKind;
use std::io;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "oxilzma")]
#[command(author, version, about = "The Oxidized LZMA - Pure Rust .lzma compressor")]
#[command(long_about = "
OxiLZMA compresses and decompresses .lzma (LZMA-alone) files, compatible
with 7-Zip and `xz --format=lzma`. Use `-` for stdin/stdout.

Examples:
  oxilzma compress file.txt
  oxilzma compress -l 9 --mf bt4 file.txt -o file.txt.lzma
  oxilzma compress -d 16 --lc 0 --lp 2 --pb 2 data.bin
  oxilzma decompress file.txt.lzma
  cat data | oxilzma compress - > data.lzma
  oxilzma info --json file.txt.lzma
  oxilzma test --crc 414fa339 file.txt.lzma
")]
struct Cli {
    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress progress bars and summaries
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compress a file into a .lzma stream
    #[command(alias = "c")]
    Compress {
        /// Input file (`-` for stdin)
        input: PathBuf,

        /// Output file (default: input with `.lzma` appended, `-` for stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Compression level preset
        #[arg(short, long, default_value_t = 5, value_parser = clap::value_parser!(u8).range(0..=9))]
        level: u8,

        /// Dictionary size as a power of two (2^N bytes)
        #[arg(short, long = "dict", value_parser = clap::value_parser!(u32).range(0..=30))]
        dict_log: Option<u32>,

        /// Number of fast bytes (5-273)
        #[arg(long = "fb")]
        fast_bytes: Option<u32>,

        /// Literal context bits (0-8)
        #[arg(long)]
        lc: Option<u32>,

        /// Literal position bits (0-4)
        #[arg(long)]
        lp: Option<u32>,

        /// Position bits (0-4)
        #[arg(long)]
        pb: Option<u32>,

        /// Match finder (bt2, bt4)
        #[arg(long = "mf")]
        match_finder: Option<MatchFinderKind>,

        /// Always write an end marker
        #[arg(long)]
        eos: bool,

        /// Pre-load history from this file (the decompressor needs the same file)
        #[arg(long)]
        train: Option<PathBuf>,

        /// Overwrite the output without asking
        #[arg(short, long)]
        force: bool,
    },

    /// Decompress a .lzma stream
    #[command(alias = "d")]
    Decompress {
        /// Input file (`-` for stdin)
        input: PathBuf,

        /// Output file (default: input without `.lzma`, `-` for stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// History file used when the stream was compressed
        #[arg(long)]
        train: Option<PathBuf>,

        /// Overwrite the output without asking
        #[arg(short, long)]
        force: bool,
    },

    /// Show the header of a .lzma file
    #[command(alias = "i")]
    Info {
        /// File to inspect
        input: PathBuf,

        /// Output as JSON (machine-readable)
        #[arg(short, long)]
        json: bool,
    },

    /// Decode a .lzma file without writing the output
    #[command(alias = "t")]
    Test {
        /// File to test (`-` for stdin)
        input: PathBuf,

        /// Expected CRC-32 of the decompressed data (hex)
        #[arg(long, value_parser = parse_crc)]
        crc: Option<u32>,

        /// History file used when the stream was compressed
        #[arg(long)]
        train: Option<PathBuf>,
    },

    /// Generate shell completion scripts
    Completions {
        /// Target shell
        shell: Shell,
    },
}

fn init_logger(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logger(cli.verbose);
    let progress = !cli.quiet;

    let result = match cli.command {
        Commands::Compress {
            input,
            output,
            level,
            dict_log,
            fast_bytes,
            lc,
            lp,
            pb,
            match_finder,
            eos,
            train,
            force,
        } => cmd_compress(&CompressArgs {
            input,
            output,
            level,
            dict_log,
            fast_bytes,
            lc,
            lp,
            pb,
            match_finder,
            eos,
            train,
            force,
            progress,
        }),
        Commands::Decompress {
            input,
            output,
            train,
            force,
        } => cmd_decompress(&DecompressArgs {
            input,
            output,
            train,
            force,
            progress,
        }),
        Commands::Info { input, json } => cmd_info(&input, json),
        Commands::Test { input, crc, train } => {
            cmd_test(&input, crc, train.as_deref(), progress)
        }
        Commands::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "oxilzma", &mut io::stdout());
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
