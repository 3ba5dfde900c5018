//! Utility functions for the CLI.

use dialoguer::Confirm;
use filetime::FileTime;
use indicatif::{ProgressBar, ProgressStyle};
use oxilzma_core::crc::Crc32;
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

/// Extension of compressed files.
pub const LZMA_EXTENSION: &str = "lzma";

/// Boxed error used by every command.
pub type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

/// Where decoded or encoded bytes go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Stdout,
    File(PathBuf),
}

/// Whether `path` stands for stdin/stdout.
pub fn is_stdio(path: &Path) -> bool {
    path.as_os_str() == "-"
}

/// Open an input, returning the reader and its length when known.
pub fn open_input(path: &Path) -> CliResult<(Box<dyn Read>, Option<u64>)> {
    if is_stdio(path) {
        return Ok((Box::new(BufReader::new(io::stdin().lock())), None));
    }
    let file = File::open(path)?;
    let len = file.metadata()?.len();
    Ok((Box::new(BufReader::new(file)), Some(len)))
}

/// Open an output target for writing.
pub fn open_output(target: &Target) -> CliResult<Box<dyn Write>> {
    match target {
        Target::Stdout => Ok(Box::new(BufWriter::new(io::stdout().lock()))),
        Target::File(path) => Ok(Box::new(BufWriter::new(File::create(path)?))),
    }
}

/// Output target for compressing `input`.
pub fn compressed_target(input: &Path, output: Option<&Path>) -> Target {
    match output {
        Some(path) if is_stdio(path) => Target::Stdout,
        Some(path) => Target::File(path.to_path_buf()),
        None if is_stdio(input) => Target::Stdout,
        None => {
            let mut name = input.as_os_str().to_owned();
            name.push(".");
            name.push(LZMA_EXTENSION);
            Target::File(PathBuf::from(name))
        }
    }
}

/// Output target for decompressing `input`.
///
/// `file.lzma` becomes `file`; any other name gets `.out` appended.
pub fn decompressed_target(input: &Path, output: Option<&Path>) -> Target {
    match output {
        Some(path) if is_stdio(path) => Target::Stdout,
        Some(path) => Target::File(path.to_path_buf()),
        None if is_stdio(input) => Target::Stdout,
        None => {
            let has_extension = input
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case(LZMA_EXTENSION));
            if has_extension {
                Target::File(input.with_extension(""))
            } else {
                let mut name = input.as_os_str().to_owned();
                name.push(".out");
                Target::File(PathBuf::from(name))
            }
        }
    }
}

/// Refuse to clobber an existing file unless forced or confirmed.
pub fn check_overwrite(target: &Target, force: bool) -> CliResult<()> {
    let Target::File(path) = target else {
        return Ok(());
    };
    if force || !path.exists() {
        return Ok(());
    }
    let confirmed = Confirm::new()
        .with_prompt(format!("{} already exists. Overwrite?", path.display()))
        .default(false)
        .interact()
        .unwrap_or(false);
    if confirmed {
        Ok(())
    } else {
        Err(format!("{} already exists (use --force to overwrite)", path.display()).into())
    }
}

/// Remove a partially written output after a failure.
pub fn discard_output(target: &Target) {
    if let Target::File(path) = target {
        if let Err(e) = fs::remove_file(path) {
            log::warn!("could not remove {}: {}", path.display(), e);
        }
    }
}

/// Copy the modification time of `source` onto `target`.
pub fn copy_mtime(source: &Path, target: &Target) -> CliResult<()> {
    let Target::File(path) = target else {
        return Ok(());
    };
    if is_stdio(source) {
        return Ok(());
    }
    let metadata = fs::metadata(source)?;
    let mtime = FileTime::from_last_modification_time(&metadata);
    filetime::set_file_mtime(path, mtime)?;
    Ok(())
}

/// Read a whole history file for trained coding.
pub fn read_history(path: &Path) -> CliResult<Vec<u8>> {
    Ok(fs::read(path)?)
}

/// Create a byte progress bar, or a spinner when the total is unknown.
pub fn create_progress_bar(len: Option<u64>, enable: bool) -> ProgressBar {
    if !enable {
        return ProgressBar::hidden();
    }

    match len {
        Some(len) => {
            let pb = ProgressBar::new(len);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("[{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} {msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_bar())
                    .progress_chars("█▓▒░ "),
            );
            pb
        }
        None => {
            let pb = ProgressBar::new_spinner();
            pb.set_style(
                ProgressStyle::default_spinner()
                    .template("[{elapsed_precise}] {spinner} {bytes} {msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_spinner()),
            );
            pb
        }
    }
}

/// Space saved by compression, in percent.
pub fn space_savings(original: u64, compressed: u64) -> f64 {
    if original == 0 {
        0.0
    } else {
        (1.0 - compressed as f64 / original as f64) * 100.0
    }
}

/// Print a one-line summary unless the data itself goes to stdout.
pub fn print_summary(target: &Target, quiet: bool, line: &str) {
    if quiet {
        return;
    }
    match target {
        Target::Stdout => eprintln!("{}", line),
        Target::File(_) => println!("{}", line),
    }
}

/// A sink that only counts bytes and computes their CRC-32.
#[derive(Debug, Default)]
pub struct CrcSink {
    crc: Crc32,
    len: u64,
}

impl CrcSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bytes(&self) -> u64 {
        self.len
    }

    pub fn crc(&self) -> u32 {
        self.crc.value()
    }
}

impl Write for CrcSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.crc.update(buf);
        self.len += buf.len() as u64;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compressed_target() {
        assert_eq!(
            compressed_target(Path::new("a/b.txt"), None),
            Target::File(PathBuf::from("a/b.txt.lzma"))
        );
        assert_eq!(compressed_target(Path::new("-"), None), Target::Stdout);
        assert_eq!(
            compressed_target(Path::new("x"), Some(Path::new("-"))),
            Target::Stdout
        );
    }

    #[test]
    fn test_decompressed_target() {
        assert_eq!(
            decompressed_target(Path::new("dir/file.txt.lzma"), None),
            Target::File(PathBuf::from("dir/file.txt"))
        );
        assert_eq!(
            decompressed_target(Path::new("file.LZMA"), None),
            Target::File(PathBuf::from("file"))
        );
        assert_eq!(
            decompressed_target(Path::new("file.bin"), None),
            Target::File(PathBuf::from("file.bin.out"))
        );
        assert_eq!(
            decompressed_target(Path::new("file.lzma"), Some(Path::new("plain"))),
            Target::File(PathBuf::from("plain"))
        );
    }

    #[test]
    fn test_crc_sink() {
        let mut sink = CrcSink::new();
        sink.write_all(b"123456789").unwrap();
        assert_eq!(sink.bytes(), 9);
        assert_eq!(sink.crc(), 0xCBF43926);
    }

    #[test]
    fn test_space_savings() {
        assert_eq!(space_savings(0, 13), 0.0);
        assert!((space_savings(200, 50) - 75.0).abs() < 1e-9);
    }
}
