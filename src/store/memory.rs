//! Memory-resident tile store.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;

use tracing::debug;

use super::{check_pixel_type, TileStore};
use crate::error::{StorageError, StoreError};
use crate::tile::{SummaryMetadata, Tile, TileKey};

/// Keeps every tile in a `HashMap`.
///
/// # Example
///
/// ```
/// use mosaic_stitch::store::{MemoryTileStore, TileStore};
/// use mosaic_stitch::tile::{PixelType, SummaryMetadata, TileKey};
///
/// let store = MemoryTileStore::new(SummaryMetadata::new(64, 64, PixelType::Gray8));
/// assert!(store.get(TileKey::new(0, 0, 0, 0)).unwrap().is_none());
/// ```
pub struct MemoryTileStore {
    summary: SummaryMetadata,
    tiles: RwLock<HashMap<TileKey, Tile>>,
    finished: AtomicBool,
    closed: AtomicBool,
}

impl MemoryTileStore {
    pub fn new(summary: SummaryMetadata) -> Self {
        Self {
            summary,
            tiles: RwLock::new(HashMap::new()),
            finished: AtomicBool::new(false),
            closed: AtomicBool::new(false),
        }
    }

    /// Number of stored tiles.
    pub fn len(&self) -> usize {
        self.tiles.read().map(|tiles| tiles.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl TileStore for MemoryTileStore {
    fn put(&self, tile: Tile) -> Result<(), StoreError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(StorageError::Closed.into());
        }
        if self.finished.load(Ordering::Acquire) {
            return Err(StorageError::Finished.into());
        }
        check_pixel_type(&self.summary, &tile)?;

        let key = tile.key();
        let mut tiles = self.tiles.write().map_err(|_| poisoned())?;
        tiles.insert(key, tile);
        debug!(?key, "stored tile in memory");
        Ok(())
    }

    fn get(&self, key: TileKey) -> Result<Option<Tile>, StorageError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(StorageError::Closed);
        }
        let tiles = self.tiles.read().map_err(|_| poisoned())?;
        Ok(tiles.get(&key).cloned())
    }

    fn finish(&self) -> Result<(), StorageError> {
        self.finished.store(true, Ordering::Release);
        Ok(())
    }

    fn is_finished(&self) -> bool {
        self.finished.load(Ordering::Acquire)
    }

    fn close(&self) -> Result<(), StorageError> {
        self.closed.store(true, Ordering::Release);
        if let Ok(mut tiles) = self.tiles.write() {
            tiles.clear();
        }
        Ok(())
    }

    fn summary_metadata(&self) -> SummaryMetadata {
        self.summary.clone()
    }

    fn tile_keys(&self) -> Vec<TileKey> {
        let mut keys: Vec<TileKey> = self
            .tiles
            .read()
            .map(|tiles| tiles.keys().copied().collect())
            .unwrap_or_default();
        keys.sort();
        keys
    }
}

fn poisoned() -> StorageError {
    StorageError::Io("tile map lock poisoned".to_string())
}
