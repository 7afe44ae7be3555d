//! Export pipeline integration tests.
//!
//! Tests verify:
//! - Queue depth reporting while draining, ending at zero
//! - The writer is closed exactly once after the queue drains
//! - Per-frame export failures are dropped without stopping the worker
//! - Timestamps derived from the first exported frame
//! - JPEG sequence output and smoothing through the full pipeline
//! - Forced shutdown

use mosaic_stitch::export::{
    ExportOptions, ExportQueue, ExportState, FrameFilter, JpegSequenceWriter,
};
use mosaic_stitch::mosaic::{DualSinkCoordinator, GridLayout, MosaicAssembler, Orientation};
use mosaic_stitch::store::{MemoryTileStore, TileStore};
use mosaic_stitch::tile::{FrameKey, TileKey};

use super::test_utils::{memory_store, solid_tile, RecordingProgress, RecordingWriter};

const TILE: u32 = 4;

fn exporting(
    writer: RecordingWriter,
    progress: RecordingProgress,
    options: ExportOptions,
) -> DualSinkCoordinator<MemoryTileStore> {
    let assembler = MosaicAssembler::new(
        memory_store(TILE),
        GridLayout::new(2, 1, Orientation::default()).unwrap(),
    );
    DualSinkCoordinator::start_export(assembler, writer, progress, options).unwrap()
}

/// Write both tiles of frame `frame`, completing its mosaic.
fn acquire(coordinator: &DualSinkCoordinator<MemoryTileStore>, frame: usize, fill: u8) {
    for position in 0..2 {
        coordinator
            .put(solid_tile(TileKey::new(0, 0, frame, position), TILE, fill))
            .unwrap();
    }
}

// =============================================================================
// Draining
// =============================================================================

#[test]
fn test_depth_reaches_zero_and_writer_closes_once() {
    let writer = RecordingWriter::new();
    let progress = RecordingProgress::new();
    let options = ExportOptions::new(FrameFilter::None, 3);
    let coordinator = exporting(writer.clone(), progress.clone(), options);

    for frame in 0..3 {
        acquire(&coordinator, frame, 10 * frame as u8);
    }
    coordinator.finish().unwrap();
    assert!(matches!(
        coordinator.state(),
        ExportState::Draining | ExportState::Closed
    ));
    coordinator.wait_for_export().unwrap();

    assert_eq!(coordinator.state(), ExportState::Closed);
    assert_eq!(coordinator.export_queue().unwrap().depth(), 0);
    assert_eq!(writer.close_count(), 1);

    let reports = progress.reports();
    assert_eq!(reports.len(), 3);
    assert_eq!(reports.last(), Some(&(0, 3)));
    assert!(reports.iter().all(|&(depth, expected)| depth < 3 && expected == 3));

    let frames: Vec<usize> = writer.frames().iter().map(|f| f.frame).collect();
    assert_eq!(frames, vec![0, 1, 2]);

    // Closing the store afterwards does not close the writer again.
    coordinator.close().unwrap();
    assert_eq!(writer.close_count(), 1);
}

#[test]
fn test_exported_frame_is_full_mosaic() {
    let writer = RecordingWriter::new();
    let coordinator = exporting(writer.clone(), RecordingProgress::new(), ExportOptions::default());
    coordinator
        .put(solid_tile(TileKey::new(0, 0, 0, 0), TILE, 1))
        .unwrap();
    coordinator
        .put(solid_tile(TileKey::new(0, 0, 0, 1), TILE, 2))
        .unwrap();
    coordinator.close().unwrap();

    let frames = writer.frames();
    assert_eq!(frames.len(), 1);
    let pixels = &frames[0].pixels;
    assert_eq!((pixels.width(), pixels.height()), (2 * TILE, TILE));
    assert_eq!(pixels.sample(0, 0), 1);
    assert_eq!(pixels.sample(TILE, 0), 2);
}

#[test]
fn test_failed_frames_are_dropped() {
    let writer = RecordingWriter::failing_on([1]);
    let progress = RecordingProgress::new();
    let coordinator = exporting(writer.clone(), progress.clone(), ExportOptions::default());

    for frame in 0..3 {
        acquire(&coordinator, frame, 5);
    }
    coordinator.close().unwrap();

    let queue = coordinator.export_queue().unwrap();
    assert_eq!(queue.frames_written(), 2);
    assert_eq!(queue.frames_dropped(), 1);
    assert_eq!(progress.reports().len(), 3);
    assert_eq!(writer.close_count(), 1);

    let frames: Vec<usize> = writer.frames().iter().map(|f| f.frame).collect();
    assert_eq!(frames, vec![0, 2]);
}

#[test]
fn test_export_does_not_block_reads() {
    let coordinator = exporting(
        RecordingWriter::new(),
        RecordingProgress::new(),
        ExportOptions::default(),
    );
    acquire(&coordinator, 0, 7);
    coordinator.finish().unwrap();

    let mosaic = coordinator.compose(FrameKey::new(0, 0, 0)).unwrap().unwrap();
    assert_eq!(mosaic.buffer().sample(0, 0), 7);
}

// =============================================================================
// Timestamps
// =============================================================================

#[test]
fn test_timestamps_follow_first_frame() {
    let writer = RecordingWriter::new();
    let coordinator = exporting(writer.clone(), RecordingProgress::new(), ExportOptions::default());
    for frame in 0..2 {
        acquire(&coordinator, frame, 0);
    }
    coordinator.close().unwrap();

    let frames = writer.frames();
    // Capture time 14:21:33.123; the start is truncated to whole seconds
    // and each frame adds its elapsed milliseconds.
    assert_eq!(frames[0].date, "2014-03-19");
    assert_eq!(frames[0].time, "14:21:33.000");
    assert_eq!(frames[1].date, "2014-03-19");
    assert_eq!(frames[1].time, "14:21:34.000");
}

// =============================================================================
// Filters and Writers
// =============================================================================

#[test]
fn test_mean_filter_applied_before_writing() {
    let writer = RecordingWriter::new();
    let coordinator = exporting(
        writer.clone(),
        RecordingProgress::new(),
        ExportOptions::new(FrameFilter::Mean3x3, 1),
    );
    coordinator
        .put(solid_tile(TileKey::new(0, 0, 0, 0), TILE, 0))
        .unwrap();
    coordinator
        .put(solid_tile(TileKey::new(0, 0, 0, 1), TILE, 90))
        .unwrap();
    coordinator.close().unwrap();

    let pixels = &writer.frames()[0].pixels;
    // Column 3 is the last dark column, next to the bright tile.
    assert_eq!(pixels.sample(3, 1), 30);
    assert_eq!(pixels.sample(4, 1), 60);
    assert_eq!(pixels.sample(0, 1), 0);
    assert_eq!(pixels.sample(7, 1), 90);
}

#[test]
fn test_jpeg_sequence_export() {
    let dir = tempfile::tempdir().unwrap();
    let assembler = MosaicAssembler::new(
        memory_store(TILE),
        GridLayout::new(2, 2, Orientation::default()).unwrap(),
    );
    let (width, height) = assembler.mosaic_size();
    let writer = JpegSequenceWriter::open(dir.path(), width, height, 90).unwrap();
    let coordinator = DualSinkCoordinator::start_export(
        assembler,
        writer,
        RecordingProgress::new(),
        ExportOptions::default(),
    )
    .unwrap();

    for channel in 0..2 {
        for position in 0..4 {
            coordinator
                .put(solid_tile(TileKey::new(channel, 0, 0, position), TILE, 100))
                .unwrap();
        }
    }
    coordinator.close().unwrap();

    assert!(dir.path().join("c0_z0_t0.jpg").exists());
    assert!(dir.path().join("c1_z0_t0.jpg").exists());

    let manifest = JpegSequenceWriter::read_manifest(dir.path()).unwrap();
    assert_eq!((manifest.width, manifest.height), (8, 8));
    assert_eq!(manifest.frames.len(), 2);
    assert_eq!(manifest.frames[1].channel, 1);
    assert_eq!(manifest.frames[0].date, "2014-03-19");
}

// =============================================================================
// Shutdown
// =============================================================================

#[test]
fn test_abort_drops_pending_frames() {
    let writer = RecordingWriter::new();
    let queue = ExportQueue::start(
        writer.clone(),
        RecordingProgress::new(),
        ExportOptions::default(),
    )
    .unwrap();
    for frame in 0..50 {
        queue.enqueue(solid_tile(TileKey::new(0, 0, frame, 0), TILE, 1));
    }
    queue.abort();
    assert!(!queue.enqueue(solid_tile(TileKey::new(0, 0, 99, 0), TILE, 1)));
    queue.wait().unwrap();

    assert_eq!(queue.state(), ExportState::Closed);
    assert_eq!(queue.depth(), 0);
    assert_eq!(queue.frames_written() + queue.frames_dropped(), 50);
    assert_eq!(writer.frames().len(), queue.frames_written());
    assert_eq!(writer.close_count(), 1);
}

#[test]
fn test_store_without_export_stays_inactive() {
    let assembler = MosaicAssembler::new(
        memory_store(TILE),
        GridLayout::new(2, 1, Orientation::default()).unwrap(),
    );
    let coordinator = DualSinkCoordinator::new(assembler);
    acquire(&coordinator, 0, 3);
    coordinator.close().unwrap();
    assert_eq!(coordinator.state(), ExportState::Inactive);
    assert!(coordinator.export_queue().is_none());
}
