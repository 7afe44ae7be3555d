//! Test utilities for integration tests.
//!
//! Tile builders plus recording and failing implementations of the writer,
//! progress sink and store interfaces.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use serde_json::Map;

use mosaic_stitch::error::{ExportError, StorageError, StoreError};
use mosaic_stitch::export::{FrameWriter, ProgressSink};
use mosaic_stitch::store::{MemoryTileStore, TileStore};
use mosaic_stitch::tile::{PixelBuffer, PixelType, SummaryMetadata, Tile, TileKey, TileMetadata};

// =============================================================================
// Tile Builders
// =============================================================================

/// Capture time used for every test tile.
pub const CAPTURE_TIME: &str = "2014-03-19 14:21:33.123 -0700";

/// Metadata for a square gray8 tile.
pub fn metadata(key: TileKey, size: u32) -> TileMetadata {
    TileMetadata {
        channel: key.channel,
        slice: key.slice,
        frame: key.frame,
        position: key.position,
        width: size,
        height: size,
        pixel_type: PixelType::Gray8,
        time: CAPTURE_TIME.to_string(),
        elapsed_ms: key.frame as f64 * 1000.0 + key.position as f64,
        extra: Map::new(),
    }
}

/// Square gray8 tile filled with one value.
pub fn solid_tile(key: TileKey, size: u32, fill: u8) -> Tile {
    Tile::new(metadata(key, size), vec![fill; (size * size) as usize]).unwrap()
}

/// Square gray8 tile whose pixels encode position and location, so that
/// misplaced rows or columns show up in comparisons.
pub fn pattern_tile(key: TileKey, size: u32) -> Tile {
    let pixels: Vec<u8> = (0..size * size)
        .map(|i| (key.position as u32 * 37 + i * 7) as u8)
        .collect();
    Tile::new(metadata(key, size), pixels).unwrap()
}

/// Memory store for square gray8 tiles.
pub fn memory_store(size: u32) -> MemoryTileStore {
    MemoryTileStore::new(SummaryMetadata::new(size, size, PixelType::Gray8))
}

// =============================================================================
// Recording Writer
// =============================================================================

/// One frame received by a [`RecordingWriter`].
#[derive(Debug, Clone, PartialEq)]
pub struct WrittenFrame {
    pub channel: usize,
    pub slice: usize,
    pub frame: usize,
    pub date: String,
    pub time: String,
    pub pixels: PixelBuffer,
}

/// Writer that records every appended frame and counts closes.
///
/// Frames listed in `fail_frames` are rejected with a writer error.
#[derive(Clone, Default)]
pub struct RecordingWriter {
    frames: Arc<Mutex<Vec<WrittenFrame>>>,
    closes: Arc<AtomicUsize>,
    fail_frames: Arc<HashSet<usize>>,
}

impl RecordingWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_on(frames: impl IntoIterator<Item = usize>) -> Self {
        Self {
            fail_frames: Arc::new(frames.into_iter().collect()),
            ..Self::default()
        }
    }

    pub fn frames(&self) -> Vec<WrittenFrame> {
        self.frames.lock().unwrap().clone()
    }

    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

impl FrameWriter for RecordingWriter {
    fn append_frame(
        &mut self,
        pixels: &PixelBuffer,
        slice: usize,
        channel: usize,
        frame: usize,
        date: &str,
        time: &str,
    ) -> Result<(), ExportError> {
        if self.fail_frames.contains(&frame) {
            return Err(ExportError::Writer(format!("cannot write frame {frame}")));
        }
        self.frames.lock().unwrap().push(WrittenFrame {
            channel,
            slice,
            frame,
            date: date.to_string(),
            time: time.to_string(),
            pixels: pixels.clone(),
        });
        Ok(())
    }

    fn close(&mut self) -> Result<(), ExportError> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

// =============================================================================
// Recording Progress Sink
// =============================================================================

/// Progress sink that records every `(depth, expected)` report.
#[derive(Clone, Default)]
pub struct RecordingProgress {
    reports: Arc<Mutex<Vec<(usize, usize)>>>,
}

impl RecordingProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reports(&self) -> Vec<(usize, usize)> {
        self.reports.lock().unwrap().clone()
    }
}

impl ProgressSink for RecordingProgress {
    fn report(&mut self, depth: usize, expected: usize) {
        self.reports.lock().unwrap().push((depth, expected));
    }
}

// =============================================================================
// Failing Store
// =============================================================================

/// Store that accepts puts but fails every read with an I/O error.
pub struct FailingStore {
    inner: MemoryTileStore,
}

impl FailingStore {
    pub fn new(size: u32) -> Self {
        Self {
            inner: memory_store(size),
        }
    }
}

impl TileStore for FailingStore {
    fn put(&self, tile: Tile) -> Result<(), StoreError> {
        self.inner.put(tile)
    }

    fn get(&self, _key: TileKey) -> Result<Option<Tile>, StorageError> {
        Err(StorageError::Io("device unplugged".to_string()))
    }

    fn finish(&self) -> Result<(), StorageError> {
        self.inner.finish()
    }

    fn is_finished(&self) -> bool {
        self.inner.is_finished()
    }

    fn close(&self) -> Result<(), StorageError> {
        self.inner.close()
    }

    fn summary_metadata(&self) -> SummaryMetadata {
        self.inner.summary_metadata()
    }

    fn tile_keys(&self) -> Vec<TileKey> {
        self.inner.tile_keys()
    }
}
