//! Secondary export of completed mosaics.
//!
//! Completed mosaics are mirrored into a derived format off the acquisition
//! thread. The pipeline is lossy on failure: a frame that cannot
//! be timestamped, filtered or written is logged and dropped, and the worker
//! carries on with the next one.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────┐  enqueue   ┌──────────────┐
//! │ DualSinkCoordinator │───────────►│ ExportQueue  │
//! └─────────────────────┘            └──────┬───────┘
//!                                           │ worker thread
//!                    ┌──────────────────────┼──────────────────────┐
//!                    ▼                      ▼                      ▼
//!            ┌───────────────┐     ┌───────────────┐     ┌─────────────────┐
//!            │RecordingClock │     │  FrameFilter  │     │   FrameWriter   │
//!            └───────────────┘     └───────────────┘     └─────────────────┘
//!                                                                  │
//!                                                          ProgressSink
//! ```
//!
//! # Lifecycle
//!
//! `Inactive` (no export configured) or `Active` → `Draining` on close →
//! `Closed` once the worker has emptied the queue and closed the writer.

mod clock;
mod filter;
mod progress;
mod queue;
mod writer;

pub use clock::{format_elapsed, parse_capture_time, RecordingClock, Timestamp};
pub use filter::FrameFilter;
pub use progress::{LogProgress, NoProgress, ProgressSink};
pub use queue::{ExportQueue, WORKER_THREAD_NAME};
pub use writer::{
    FrameWriter, JpegSequenceWriter, Manifest, ManifestEntry, DEFAULT_JPEG_QUALITY,
    MAX_JPEG_QUALITY, MIN_JPEG_QUALITY,
};

/// Lifecycle of the export path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportState {
    /// No secondary export configured; puts only reach the store
    Inactive,
    /// Completed mosaics are being queued
    Active,
    /// No new frames accepted; the worker is emptying the queue
    Draining,
    /// Queue drained and writer closed
    Closed,
}

/// Settings for the export worker.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ExportOptions {
    /// Smoothing applied before each frame is written
    pub filter: FrameFilter,

    /// Number of frames the recording should produce, passed to the
    /// progress sink. Zero if unknown.
    pub expected_frames: usize,
}

impl ExportOptions {
    pub fn new(filter: FrameFilter, expected_frames: usize) -> Self {
        Self {
            filter,
            expected_frames,
        }
    }
}
