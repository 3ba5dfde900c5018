//! Progress reporting for long-running coding operations.
//!
//! Encoders and decoders call [`CodeProgress::set_progress`] after each
//! bounded chunk of work with the running totals of consumed and produced
//! bytes. Returning an error from the callback aborts the operation, which
//! is how callers implement cancellation.

use crate::error::Result;

/// Receiver of progress updates from a coder.
pub trait CodeProgress {
    /// Report that `in_size` bytes were consumed and `out_size` produced so far.
    fn set_progress(&mut self, in_size: u64, out_size: u64) -> Result<()>;
}

/// A progress sink that ignores every update.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl CodeProgress for NoProgress {
    #[inline]
    fn set_progress(&mut self, _in_size: u64, _out_size: u64) -> Result<()> {
        Ok(())
    }
}

impl<F> CodeProgress for F
where
    F: FnMut(u64, u64) -> Result<()>,
{
    #[inline]
    fn set_progress(&mut self, in_size: u64, out_size: u64) -> Result<()> {
        self(in_size, out_size)
    }
}
