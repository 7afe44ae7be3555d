//! Per-tile storage.
//!
//! The [`TileStore`] trait is the key/value interface the mosaic layer
//! consumes: tiles keyed by (channel, slice, frame, position). Stores are
//! internally thread-safe; one producer may `put` while any number of
//! readers `get`.
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │     DualSinkCoordinator / Assembler     │
//! └────────────────────┬────────────────────┘
//!                      │ TileStore
//!          ┌───────────┴───────────┐
//!          ▼                       ▼
//! ┌─────────────────┐    ┌─────────────────────┐
//! │ MemoryTileStore │    │   DiskTileStore     │
//! │ (HashMap)       │    │ (files + LRU cache) │
//! └─────────────────┘    └─────────────────────┘
//! ```
//!
//! The mosaic assembler implements the same trait, so a composing store can
//! stand in anywhere a plain per-tile store is expected.

mod disk;
mod memory;

use std::sync::Arc;

pub use disk::{DiskTileStore, DEFAULT_DISK_CACHE_CAPACITY};
pub use memory::MemoryTileStore;

use crate::error::{StorageError, StoreError, TileError};
use crate::tile::{SummaryMetadata, Tile, TileKey};

/// Key/value storage for tiles.
pub trait TileStore: Send + Sync {
    /// Store a tile, replacing any tile with the same key.
    fn put(&self, tile: Tile) -> Result<(), StoreError>;

    /// Fetch a tile, or `None` if it has not arrived.
    fn get(&self, key: TileKey) -> Result<Option<Tile>, StorageError>;

    /// Mark the dataset complete. Later puts fail with [`StorageError::Finished`].
    fn finish(&self) -> Result<(), StorageError>;

    fn is_finished(&self) -> bool;

    /// Release resources. Later reads fail with [`StorageError::Closed`].
    fn close(&self) -> Result<(), StorageError>;

    fn summary_metadata(&self) -> SummaryMetadata;

    /// Keys of every stored tile, sorted.
    fn tile_keys(&self) -> Vec<TileKey>;
}

impl<S: TileStore + ?Sized> TileStore for Arc<S> {
    fn put(&self, tile: Tile) -> Result<(), StoreError> {
        (**self).put(tile)
    }

    fn get(&self, key: TileKey) -> Result<Option<Tile>, StorageError> {
        (**self).get(key)
    }

    fn finish(&self) -> Result<(), StorageError> {
        (**self).finish()
    }

    fn is_finished(&self) -> bool {
        (**self).is_finished()
    }

    fn close(&self) -> Result<(), StorageError> {
        (**self).close()
    }

    fn summary_metadata(&self) -> SummaryMetadata {
        (**self).summary_metadata()
    }

    fn tile_keys(&self) -> Vec<TileKey> {
        (**self).tile_keys()
    }
}

/// Reject tiles whose pixel type differs from the dataset's.
pub(crate) fn check_pixel_type(summary: &SummaryMetadata, tile: &Tile) -> Result<(), TileError> {
    let actual = tile.metadata().pixel_type;
    if actual != summary.pixel_type {
        return Err(TileError::PixelTypeMismatch {
            expected: summary.pixel_type.as_str(),
            actual: actual.as_str(),
        });
    }
    Ok(())
}
