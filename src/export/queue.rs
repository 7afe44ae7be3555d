//! FIFO of completed mosaics drained by one background worker.
//!
//! The producer side pushes frames into an unbounded channel and never
//! blocks. A single named thread takes frames in order, stamps them with the
//! recording clock, runs the smoothing filter and hands them to the writer.
//! Closing sends a sentinel behind every queued frame; when the worker takes
//! it, the queue is empty, so the writer is closed exactly once and the
//! thread exits.
//!
//! ```text
//!  enqueue() ──► [ Frame | Frame | ... | Close ] ──► worker thread
//!                                                      │ clock.stamp
//!                                                      │ filter.apply
//!                                                      │ writer.append_frame
//!                                                      ▼ progress.report(depth)
//! ```

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender};
use tracing::{debug, info, warn};

use super::clock::RecordingClock;
use super::progress::ProgressSink;
use super::writer::FrameWriter;
use super::{ExportOptions, ExportState};
use crate::error::ExportError;
use crate::tile::Tile;

/// Name of the export worker thread.
pub const WORKER_THREAD_NAME: &str = "mosaic-export";

enum Message {
    Frame(Box<Tile>),
    Close,
}

struct Shared {
    state: Mutex<ExportState>,
    depth: AtomicUsize,
    written: AtomicUsize,
    dropped: AtomicUsize,
    aborted: AtomicBool,
}

impl Shared {
    fn set_state(&self, next: ExportState) {
        if let Ok(mut state) = self.state.lock() {
            *state = next;
        }
    }
}

/// Producer handle of the export pipeline.
pub struct ExportQueue {
    sender: Sender<Message>,
    shared: Arc<Shared>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl ExportQueue {
    /// Spawn the worker and return an active queue.
    pub fn start<W, P>(writer: W, progress: P, options: ExportOptions) -> Result<Self, ExportError>
    where
        W: FrameWriter + 'static,
        P: ProgressSink + 'static,
    {
        let (sender, receiver) = crossbeam_channel::unbounded();
        let shared = Arc::new(Shared {
            state: Mutex::new(ExportState::Active),
            depth: AtomicUsize::new(0),
            written: AtomicUsize::new(0),
            dropped: AtomicUsize::new(0),
            aborted: AtomicBool::new(false),
        });

        let worker = Worker {
            receiver,
            shared: Arc::clone(&shared),
            writer: Box::new(writer),
            progress: Box::new(progress),
            options,
            clock: RecordingClock::new(),
        };
        let handle = thread::Builder::new()
            .name(WORKER_THREAD_NAME.to_string())
            .spawn(move || worker.run())
            .map_err(|e| ExportError::Worker(e.to_string()))?;

        info!(filter = %options.filter, expected = options.expected_frames, "export queue started");
        Ok(Self {
            sender,
            shared,
            worker: Mutex::new(Some(handle)),
        })
    }

    /// Queue a completed mosaic. Returns `false` if the queue no longer
    /// accepts frames.
    pub fn enqueue(&self, frame: Tile) -> bool {
        let Ok(state) = self.shared.state.lock() else {
            return false;
        };
        if *state != ExportState::Active {
            debug!(state = ?*state, key = ?frame.frame_key(), "export queue not accepting frames");
            return false;
        }

        let key = frame.frame_key();
        let depth = self.shared.depth.fetch_add(1, Ordering::SeqCst) + 1;
        if self.sender.send(Message::Frame(Box::new(frame))).is_err() {
            self.shared.depth.fetch_sub(1, Ordering::SeqCst);
            warn!(?key, "export worker has exited; frame not queued");
            return false;
        }
        debug!(?key, depth, "queued frame for export");
        true
    }

    /// Stop accepting frames and let the worker drain what is queued.
    ///
    /// Returns `false` if the queue was already draining or closed.
    pub fn close(&self) -> bool {
        let Ok(mut state) = self.shared.state.lock() else {
            return false;
        };
        if *state != ExportState::Active {
            return false;
        }
        *state = ExportState::Draining;
        // A send error means the worker already exited and closed the writer.
        let _ = self.sender.send(Message::Close);
        info!(depth = self.depth(), "export queue draining");
        true
    }

    /// Close the queue and have the worker drop every frame still queued
    /// instead of writing it. The writer is still closed.
    pub fn abort(&self) {
        self.shared.aborted.store(true, Ordering::SeqCst);
        self.close();
        warn!(depth = self.depth(), "export aborted");
    }

    pub fn state(&self) -> ExportState {
        self.shared
            .state
            .lock()
            .map(|state| *state)
            .unwrap_or(ExportState::Closed)
    }

    /// Frames queued but not yet processed.
    pub fn depth(&self) -> usize {
        self.shared.depth.load(Ordering::SeqCst)
    }

    /// Frames handed to the writer successfully.
    pub fn frames_written(&self) -> usize {
        self.shared.written.load(Ordering::SeqCst)
    }

    /// Frames dropped because of an export error or an abort.
    pub fn frames_dropped(&self) -> usize {
        self.shared.dropped.load(Ordering::SeqCst)
    }

    /// Close the queue if it is still active, then block until the worker
    /// has drained it and closed the writer.
    pub fn wait(&self) -> Result<(), ExportError> {
        self.close();
        let handle = self
            .worker
            .lock()
            .map_err(|_| ExportError::Worker("worker handle lock poisoned".to_string()))?
            .take();
        let Some(handle) = handle else {
            return Ok(());
        };
        handle.join().map_err(|_| {
            self.shared.set_state(ExportState::Closed);
            ExportError::Worker("export worker panicked".to_string())
        })
    }
}

impl Drop for ExportQueue {
    fn drop(&mut self) {
        if let Err(e) = self.wait() {
            warn!(error = %e, "export worker did not shut down cleanly");
        }
    }
}

// =============================================================================
// Worker
// =============================================================================

struct Worker {
    receiver: Receiver<Message>,
    shared: Arc<Shared>,
    writer: Box<dyn FrameWriter>,
    progress: Box<dyn ProgressSink>,
    options: ExportOptions,
    clock: RecordingClock,
}

impl Worker {
    fn run(mut self) {
        // A disconnected channel means the producer handle is gone; treat it
        // like the close sentinel.
        while let Ok(Message::Frame(frame)) = self.receiver.recv() {
            if self.shared.aborted.load(Ordering::SeqCst) {
                self.shared.dropped.fetch_add(1, Ordering::SeqCst);
                debug!(key = ?frame.frame_key(), "dropping frame after abort");
            } else {
                match self.export(&frame) {
                    Ok(()) => {
                        self.shared.written.fetch_add(1, Ordering::SeqCst);
                    }
                    Err(e) => {
                        self.shared.dropped.fetch_add(1, Ordering::SeqCst);
                        warn!(key = ?frame.frame_key(), error = %e, "dropping export frame");
                    }
                }
            }

            let depth = self.shared.depth.fetch_sub(1, Ordering::SeqCst) - 1;
            self.progress.report(depth, self.options.expected_frames);
        }

        if let Err(e) = self.writer.close() {
            warn!(error = %e, "failed to close export writer");
        }
        self.shared.set_state(ExportState::Closed);
        info!(
            written = self.shared.written.load(Ordering::SeqCst),
            dropped = self.shared.dropped.load(Ordering::SeqCst),
            "export worker finished"
        );
    }

    fn export(&mut self, frame: &Tile) -> Result<(), ExportError> {
        let md = frame.metadata();
        let stamp = self.clock.stamp(&md.time, md.elapsed_ms)?;
        let pixels = self.options.filter.apply(&frame.buffer())?;
        self.writer.append_frame(
            &pixels,
            md.slice,
            md.channel,
            md.frame,
            &stamp.date,
            &stamp.time,
        )
    }
}
