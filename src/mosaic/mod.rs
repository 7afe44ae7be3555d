//! Mosaic composition.
//!
//! Tiles acquired at a grid of stage positions are stitched into one image
//! per (channel, slice, frame). Composition happens on demand from whatever
//! the underlying [`TileStore`](crate::store::TileStore) holds; nothing is
//! cached here.
//!
//! # Architecture
//!
//! ```text
//!        tiles (producer thread)             readers (viewport, display)
//!               │                                       ▲
//!               ▼                                       │ MosaicSource
//! ┌───────────────────────────┐   completed mosaic   ┌──┴──────────────┐
//! │    DualSinkCoordinator    │─────────────────────►│  ExportQueue    │
//! └─────────────┬─────────────┘                      └─────────────────┘
//!               ▼
//! ┌───────────────────────────┐      ┌────────────┐
//! │      MosaicAssembler      │─────►│ GridLayout │
//! └─────────────┬─────────────┘      └────────────┘
//!               ▼
//!          TileStore
//! ```
//!
//! # Components
//!
//! - [`GridLayout`]: position index to grid cell, with mirror/swap flags
//! - [`MosaicAssembler`]: composes full mosaics and sub-regions
//! - [`DualSinkCoordinator`]: detects completed mosaics and feeds the export queue
//! - [`MosaicSource`]: read-only accessor used by the viewport

mod assembler;
mod coordinator;
mod grid;

use std::sync::Arc;

pub use assembler::MosaicAssembler;
pub use coordinator::DualSinkCoordinator;
pub use grid::{GridLayout, GridPosition, Orientation, PositionList};

use crate::error::StorageError;
use crate::tile::{FrameKey, PixelBuffer};

/// Read access to composed mosaics.
pub trait MosaicSource: Send + Sync {
    /// Full-resolution mosaic size `(width, height)`.
    fn mosaic_size(&self) -> (u32, u32);

    /// Size of one tile `(width, height)`.
    fn tile_size(&self) -> (u32, u32);

    fn layout(&self) -> &GridLayout;

    /// The full mosaic, or `None` if no tile of the triple has arrived.
    fn mosaic(&self, key: FrameKey) -> Result<Option<PixelBuffer>, StorageError>;

    /// A full-resolution sub-rectangle, clipped to the mosaic.
    fn region(
        &self,
        key: FrameKey,
        x: u32,
        y: u32,
        width: u32,
        height: u32,
    ) -> Result<Option<PixelBuffer>, StorageError>;
}

impl<T: MosaicSource + ?Sized> MosaicSource for Arc<T> {
    fn mosaic_size(&self) -> (u32, u32) {
        (**self).mosaic_size()
    }

    fn tile_size(&self) -> (u32, u32) {
        (**self).tile_size()
    }

    fn layout(&self) -> &GridLayout {
        (**self).layout()
    }

    fn mosaic(&self, key: FrameKey) -> Result<Option<PixelBuffer>, StorageError> {
        (**self).mosaic(key)
    }

    fn region(
        &self,
        key: FrameKey,
        x: u32,
        y: u32,
        width: u32,
        height: u32,
    ) -> Result<Option<PixelBuffer>, StorageError> {
        (**self).region(key, x, y, width, height)
    }
}
