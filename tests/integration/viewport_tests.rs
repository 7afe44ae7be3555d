//! Viewport integration tests.
//!
//! Tests verify:
//! - Overview and zoomed renders agree with the composed mosaic
//! - Triples with no tiles render as unavailable
//! - Rendering through an exporting coordinator
//! - Display coordinates map back to grid positions under mirroring

use std::sync::Arc;

use mosaic_stitch::export::ExportOptions;
use mosaic_stitch::mosaic::{DualSinkCoordinator, GridLayout, MosaicAssembler, Orientation};
use mosaic_stitch::store::{MemoryTileStore, TileStore};
use mosaic_stitch::tile::{FrameKey, PixelBuffer, TileKey};
use mosaic_stitch::viewport::{Render, TileLocation, ViewportMode, ViewportWindow};

use super::test_utils::{memory_store, pattern_tile, RecordingProgress, RecordingWriter};

const TILE: u32 = 6;

/// 3x2 grid of 6px tiles: an 18x12 mosaic shown at factor 3 in a 6x4 window.
fn filled_assembler(orientation: Orientation) -> MosaicAssembler<MemoryTileStore> {
    let assembler = MosaicAssembler::new(
        memory_store(TILE),
        GridLayout::new(3, 2, orientation).unwrap(),
    );
    for position in 0..6 {
        assembler
            .put(pattern_tile(TileKey::new(0, 0, 0, position), TILE))
            .unwrap();
    }
    assembler
}

fn full_mosaic(assembler: &MosaicAssembler<MemoryTileStore>) -> PixelBuffer {
    assembler
        .compose(FrameKey::new(0, 0, 0))
        .unwrap()
        .unwrap()
        .buffer()
}

// =============================================================================
// Rendering
// =============================================================================

#[test]
fn test_overview_is_downsampled_mosaic() {
    let assembler = Arc::new(filled_assembler(Orientation::default()));
    let expected = full_mosaic(&assembler).downsample(3);

    let window = ViewportWindow::new(Arc::clone(&assembler), 6);
    assert_eq!(window.downsample_factor(), 3);
    assert_eq!(window.viewport_size(), (6, 4));

    let render = window.render(FrameKey::new(0, 0, 0)).unwrap();
    assert_eq!(render, Render::Ready(expected));
}

#[test]
fn test_zoom_matches_mosaic_crop() {
    let assembler = Arc::new(filled_assembler(Orientation::new(true, false, false)));
    let mosaic = full_mosaic(&assembler);
    let mut window = ViewportWindow::new(Arc::clone(&assembler), 6);
    let key = FrameKey::new(0, 0, 0);

    window.activate_zoom(2, 1);
    let (x, y) = window.offset().unwrap();
    let pixels = window.render(key).unwrap().into_pixels().unwrap();
    assert_eq!((pixels.width(), pixels.height()), (6, 4));
    assert_eq!(pixels, mosaic.crop(x, y, 6, 4));

    // Pan far past the edge: the crop stays inside the mosaic.
    window.pan(100, 100);
    assert_eq!(
        window.mode(),
        ViewportMode::Zoomed {
            offset_x: 12,
            offset_y: 8
        }
    );
    let pixels = window.render(key).unwrap().into_pixels().unwrap();
    assert_eq!(pixels, mosaic.crop(12, 8, 6, 4));

    window.activate_full();
    assert_eq!(window.offset(), None);
}

#[test]
fn test_unknown_triple_is_unavailable() {
    let assembler = filled_assembler(Orientation::default());
    let mut window = ViewportWindow::new(assembler, 6);

    assert_eq!(
        window.render(FrameKey::new(1, 0, 0)).unwrap(),
        Render::Unavailable
    );
    window.activate_zoom(0, 0);
    assert!(!window.render(FrameKey::new(0, 0, 5)).unwrap().is_ready());
}

#[test]
fn test_render_through_exporting_coordinator() {
    let writer = RecordingWriter::new();
    let coordinator = Arc::new(
        DualSinkCoordinator::start_export(
            filled_assembler(Orientation::default()),
            writer.clone(),
            RecordingProgress::new(),
            ExportOptions::default(),
        )
        .unwrap(),
    );
    // The tiles went in before export started, so add a second frame.
    for position in 0..6 {
        coordinator
            .put(pattern_tile(TileKey::new(0, 0, 1, position), TILE))
            .unwrap();
    }

    let window = ViewportWindow::new(Arc::clone(&coordinator), 6);
    let render = window.render(FrameKey::new(0, 0, 1)).unwrap();
    assert!(render.is_ready());

    coordinator.close().unwrap();
    let frames = writer.frames();
    assert_eq!(frames.len(), 1);
    assert_eq!(
        render.into_pixels().unwrap(),
        frames[0].pixels.downsample(3)
    );
}

// =============================================================================
// Hit Testing
// =============================================================================

#[test]
fn test_tile_at_display_follows_orientation() {
    let window = ViewportWindow::new(filled_assembler(Orientation::new(true, false, false)), 6);

    // Display pixel (0, 0) is the top-left cell, which holds the last
    // position of the first row once columns are mirrored.
    assert_eq!(
        window.tile_at_display(0, 0),
        Some(TileLocation {
            row: 0,
            column: 0,
            position: 2
        })
    );
    assert_eq!(
        window.tile_at_display(5, 3),
        Some(TileLocation {
            row: 1,
            column: 2,
            position: 3
        })
    );
    assert_eq!(window.tile_at_display(6, 0), None);
}
