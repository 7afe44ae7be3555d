//! Export progress reporting.

use tracing::info;

/// Receives the export queue depth after every processed frame.
pub trait ProgressSink: Send {
    /// `depth` frames are still waiting; `expected` is the number of frames
    /// the recording is expected to produce (0 if unknown).
    fn report(&mut self, depth: usize, expected: usize);
}

impl<F> ProgressSink for F
where
    F: FnMut(usize, usize) + Send,
{
    fn report(&mut self, depth: usize, expected: usize) {
        self(depth, expected)
    }
}

/// Logs queue depth at `info` level.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogProgress;

impl ProgressSink for LogProgress {
    fn report(&mut self, depth: usize, expected: usize) {
        info!(depth, expected, "export queue depth");
    }
}

/// Discards every report.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn report(&mut self, _depth: usize, _expected: usize) {}
}
