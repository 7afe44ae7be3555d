//! Mosaic composition integration tests.
//!
//! Tests verify:
//! - Tile placement under mirror flags
//! - Composition is independent of arrival order and of repeated writes
//! - Incomplete mosaics are zero-filled and never exported
//! - Store faults propagate while missing tiles do not
//! - Disk-backed composition and concurrent readers

use std::sync::Arc;
use std::thread;

use proptest::prelude::*;

use mosaic_stitch::error::{StorageError, StoreError, TileError};
use mosaic_stitch::export::{ExportOptions, ExportState};
use mosaic_stitch::mosaic::{
    DualSinkCoordinator, GridLayout, GridPosition, MosaicAssembler, Orientation, PositionList,
};
use mosaic_stitch::store::{DiskTileStore, MemoryTileStore, TileStore};
use mosaic_stitch::tile::{FrameKey, PixelType, SummaryMetadata, TileKey, COMPOSITE_POSITION};

use super::test_utils::{
    memory_store, pattern_tile, solid_tile, FailingStore, RecordingProgress, RecordingWriter,
};

fn assembler(
    size: u32,
    per_row: usize,
    per_column: usize,
    orientation: Orientation,
) -> MosaicAssembler<MemoryTileStore> {
    MosaicAssembler::new(
        memory_store(size),
        GridLayout::new(per_row, per_column, orientation).unwrap(),
    )
}

// =============================================================================
// Placement
// =============================================================================

#[test]
fn test_mirror_y_puts_last_position_on_top() {
    let assembler = assembler(100, 2, 2, Orientation::new(false, true, false));
    assert_eq!(assembler.mosaic_size(), (200, 200));

    assembler.put(solid_tile(TileKey::new(0, 0, 0, 3), 100, 255)).unwrap();

    let mosaic = assembler
        .compose(FrameKey::new(0, 0, 0))
        .unwrap()
        .unwrap()
        .buffer();
    // Position 3 is row 1, col 1 before mirroring; mirrored it is top right.
    assert_eq!(mosaic.sample(100, 0), 255);
    assert_eq!(mosaic.sample(199, 99), 255);
    assert_eq!(mosaic.sample(100, 100), 0);
    assert_eq!(mosaic.sample(0, 0), 0);
}

#[test]
fn test_tile_rows_land_at_grid_offsets() {
    let size = 4;
    let assembler = assembler(size, 3, 2, Orientation::default());
    let tile = pattern_tile(TileKey::new(0, 0, 0, 4), size);
    assembler.put(tile.clone()).unwrap();

    let mosaic = assembler
        .compose(FrameKey::new(0, 0, 0))
        .unwrap()
        .unwrap()
        .buffer();
    let source = tile.buffer();
    // Position 4 of a 3-wide grid is row 1, col 1.
    for y in 0..size {
        for x in 0..size {
            assert_eq!(mosaic.sample(size + x, size + y), source.sample(x, y));
        }
    }
}

#[test]
fn test_composite_metadata() {
    let assembler = assembler(8, 2, 2, Orientation::default());
    assembler.put(solid_tile(TileKey::new(1, 2, 3, 2), 8, 1)).unwrap();

    let mosaic = assembler.compose(FrameKey::new(1, 2, 3)).unwrap().unwrap();
    let md = mosaic.metadata();
    assert_eq!((md.channel, md.slice, md.frame), (1, 2, 3));
    assert_eq!((md.width, md.height), (16, 16));
    assert_eq!(md.position, COMPOSITE_POSITION);
    assert!(assembler.compose(FrameKey::new(1, 2, 4)).unwrap().is_none());
}

// =============================================================================
// Order Independence
// =============================================================================

#[test]
fn test_repeated_put_is_idempotent() {
    let once = assembler(4, 2, 2, Orientation::new(true, false, false));
    let twice = assembler(4, 2, 2, Orientation::new(true, false, false));
    for position in [0, 3] {
        let tile = pattern_tile(TileKey::new(0, 0, 0, position), 4);
        once.put(tile.clone()).unwrap();
        twice.put(tile.clone()).unwrap();
        twice.put(tile).unwrap();
    }

    let key = FrameKey::new(0, 0, 0);
    assert_eq!(
        once.compose(key).unwrap().unwrap(),
        twice.compose(key).unwrap().unwrap()
    );
    assert_eq!(twice.frame_keys().unwrap(), vec![key]);
}

proptest! {
    #[test]
    fn composition_is_independent_of_arrival_order(
        order in Just((0usize..6).collect::<Vec<_>>()).prop_shuffle(),
        keep in proptest::collection::vec(any::<bool>(), 6),
        mirror_x in any::<bool>(),
        mirror_y in any::<bool>(),
        swap_xy in any::<bool>(),
    ) {
        let orientation = Orientation::new(mirror_x, mirror_y, swap_xy);
        let in_order = assembler(3, 3, 2, orientation);
        let shuffled = assembler(3, 3, 2, orientation);

        for position in 0..6 {
            if keep[position] {
                in_order.put(pattern_tile(TileKey::new(0, 0, 0, position), 3)).unwrap();
            }
        }
        for &position in &order {
            if keep[position] {
                shuffled.put(pattern_tile(TileKey::new(0, 0, 0, position), 3)).unwrap();
            }
        }

        let key = FrameKey::new(0, 0, 0);
        let a = in_order.compose(key).unwrap().map(|tile| tile.buffer());
        let b = shuffled.compose(key).unwrap().map(|tile| tile.buffer());
        prop_assert_eq!(a, b);
    }
}

// =============================================================================
// Position Lists
// =============================================================================

fn listed(cells: &[(usize, usize)]) -> PositionList {
    PositionList::new(
        cells
            .iter()
            .map(|&(row, column)| GridPosition {
                label: format!("Pos{row}{column}"),
                row,
                column,
            })
            .collect(),
    )
}

#[test]
fn test_serpentine_list_places_tiles_by_listed_cell() {
    let list = listed(&[(0, 0), (0, 1), (1, 1), (1, 0)]);
    let assembler = MosaicAssembler::new(
        memory_store(2),
        GridLayout::from_position_list(&list, Orientation::default()).unwrap(),
    );
    for position in 0..4 {
        assembler
            .put(solid_tile(TileKey::new(0, 0, 0, position), 2, 10 * (position as u8 + 1)))
            .unwrap();
    }

    let mosaic = assembler
        .compose(FrameKey::new(0, 0, 0))
        .unwrap()
        .unwrap()
        .buffer();
    assert_eq!(mosaic.sample(0, 0), 10);
    assert_eq!(mosaic.sample(2, 0), 20);
    assert_eq!(mosaic.sample(2, 2), 30);
    assert_eq!(mosaic.sample(0, 2), 40);
}

#[test]
fn test_sparse_list_exports_on_last_listed_position() {
    let list = listed(&[(0, 0), (0, 2), (1, 1)]);
    let writer = RecordingWriter::new();
    let coordinator = DualSinkCoordinator::start_export(
        MosaicAssembler::new(
            memory_store(2),
            GridLayout::from_position_list(&list, Orientation::default()).unwrap(),
        ),
        writer.clone(),
        RecordingProgress::new(),
        ExportOptions::default(),
    )
    .unwrap();

    for position in 0..3 {
        coordinator
            .put(solid_tile(TileKey::new(0, 0, 0, position), 2, 50))
            .unwrap();
    }
    coordinator.close().unwrap();

    let frames = writer.frames();
    assert_eq!(frames.len(), 1);
    let pixels = &frames[0].pixels;
    assert_eq!((pixels.width(), pixels.height()), (6, 4));
    assert_eq!(pixels.sample(4, 0), 50);
    assert_eq!(pixels.sample(2, 2), 50);
    // No position claims row 0, column 1.
    assert_eq!(pixels.sample(2, 0), 0);
}

// =============================================================================
// Incomplete Mosaics
// =============================================================================

#[test]
fn test_missing_last_tile_is_zero_and_not_exported() {
    let writer = RecordingWriter::new();
    let coordinator = DualSinkCoordinator::start_export(
        assembler(4, 2, 2, Orientation::default()),
        writer.clone(),
        RecordingProgress::new(),
        ExportOptions::default(),
    )
    .unwrap();

    for position in 0..3 {
        coordinator
            .put(solid_tile(TileKey::new(0, 0, 0, position), 4, 10))
            .unwrap();
    }

    let mosaic = coordinator
        .compose(FrameKey::new(0, 0, 0))
        .unwrap()
        .unwrap()
        .buffer();
    assert_eq!(mosaic.sample(0, 0), 10);
    assert_eq!(mosaic.sample(4, 4), 0);
    assert_eq!(mosaic.sample(7, 7), 0);
    assert_eq!(coordinator.export_queue().unwrap().depth(), 0);

    coordinator.close().unwrap();
    assert!(writer.frames().is_empty());
    assert_eq!(writer.close_count(), 1);
    assert_eq!(coordinator.state(), ExportState::Closed);
}

// =============================================================================
// Faults
// =============================================================================

#[test]
fn test_store_fault_propagates_from_compose() {
    let assembler = MosaicAssembler::new(
        FailingStore::new(4),
        GridLayout::new(2, 2, Orientation::default()).unwrap(),
    );
    assembler.put(solid_tile(TileKey::new(0, 0, 0, 0), 4, 1)).unwrap();
    assert!(matches!(
        assembler.compose(FrameKey::new(0, 0, 0)),
        Err(StorageError::Io(_))
    ));
}

#[test]
fn test_store_fault_propagates_from_completing_put() {
    let coordinator = DualSinkCoordinator::start_export(
        MosaicAssembler::new(
            FailingStore::new(4),
            GridLayout::new(1, 1, Orientation::default()).unwrap(),
        ),
        RecordingWriter::new(),
        RecordingProgress::new(),
        ExportOptions::default(),
    )
    .unwrap();
    assert!(matches!(
        coordinator.put(solid_tile(TileKey::new(0, 0, 0, 0), 4, 1)),
        Err(StoreError::Storage(StorageError::Io(_)))
    ));
}

#[test]
fn test_malformed_tile_rejected_at_put() {
    let assembler = assembler(4, 2, 2, Orientation::default());
    let err = assembler
        .put(solid_tile(TileKey::new(0, 0, 0, 7), 4, 1))
        .unwrap_err();
    assert!(matches!(
        err,
        StoreError::MalformedTile(TileError::PositionOutOfRange { .. })
    ));
    assert!(assembler.frame_keys().unwrap().is_empty());
}

// =============================================================================
// Disk Store
// =============================================================================

#[test]
fn test_compose_from_reopened_disk_store() {
    let dir = tempfile::tempdir().unwrap();
    let summary = SummaryMetadata::new(4, 4, PixelType::Gray8).with_positions(4);
    let layout = GridLayout::new(2, 2, Orientation::new(false, false, true)).unwrap();

    let expected = {
        let store = DiskTileStore::create(dir.path(), summary, 2).unwrap();
        let assembler = MosaicAssembler::new(store, layout.clone());
        for position in 0..4 {
            assembler
                .put(pattern_tile(TileKey::new(0, 0, 0, position), 4))
                .unwrap();
        }
        let mosaic = assembler.compose(FrameKey::new(0, 0, 0)).unwrap().unwrap();
        assembler.close().unwrap();
        mosaic
    };

    let reopened = MosaicAssembler::new(DiskTileStore::open(dir.path(), 2).unwrap(), layout);
    assert!(reopened.is_complete(FrameKey::new(0, 0, 0)).unwrap());
    assert_eq!(
        reopened.compose(FrameKey::new(0, 0, 0)).unwrap().unwrap(),
        expected
    );

    let summary = reopened.summary_metadata();
    assert_eq!((summary.width, summary.height, summary.positions), (8, 8, 1));
}

// =============================================================================
// Concurrency
// =============================================================================

#[test]
fn test_readers_run_alongside_producer() {
    let assembler = Arc::new(assembler(8, 4, 4, Orientation::default()));
    let key = FrameKey::new(0, 0, 0);

    let producer = {
        let assembler = Arc::clone(&assembler);
        thread::spawn(move || {
            for position in 0..16 {
                assembler
                    .put(solid_tile(TileKey::new(0, 0, 0, position), 8, 200))
                    .unwrap();
            }
        })
    };

    let readers: Vec<_> = (0..3)
        .map(|_| {
            let assembler = Arc::clone(&assembler);
            thread::spawn(move || {
                for _ in 0..50 {
                    if let Some(mosaic) = assembler.compose(key).unwrap() {
                        let buffer = mosaic.buffer();
                        assert_eq!((buffer.width(), buffer.height()), (32, 32));
                        // Every pixel is either a placed tile or zero fill.
                        assert!(buffer.to_gray8().iter().all(|&v| v == 0 || v == 200));
                    }
                }
            })
        })
        .collect();

    producer.join().unwrap();
    for reader in readers {
        reader.join().unwrap();
    }

    let mosaic = assembler.compose(key).unwrap().unwrap().buffer();
    assert!(mosaic.to_gray8().iter().all(|&v| v == 200));
}
