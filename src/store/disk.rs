//! Disk-backed tile store.
//!
//! Each tile becomes two files in the store directory: the raw pixel bytes
//! and a JSON sidecar holding its tags. Dataset metadata lives in
//! `summary.json`. An in-memory index records which keys exist so that
//! lookups for tiles that have not arrived never touch the filesystem, and an
//! LRU cache keeps recently read tiles in memory.
//!
//! # Layout
//!
//! ```text
//! <dir>/summary.json
//! <dir>/tile_c0_z0_t0_p0.raw
//! <dir>/tile_c0_z0_t0_p0.json
//! ...
//! ```

use std::collections::BTreeSet;
use std::fs;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, RwLock};

use lru::LruCache;
use serde_json::Value;
use tracing::{debug, info};

use super::{check_pixel_type, TileStore};
use crate::error::{StorageError, StoreError};
use crate::tile::{SummaryMetadata, Tile, TileKey, TileMetadata};

/// Default number of tiles held in the read cache.
pub const DEFAULT_DISK_CACHE_CAPACITY: usize = 64;

const SUMMARY_FILE: &str = "summary.json";

/// Tile store that persists every tile to a directory.
pub struct DiskTileStore {
    dir: PathBuf,
    summary: SummaryMetadata,
    index: RwLock<BTreeSet<TileKey>>,
    cache: Mutex<ReadCache>,
    finished: AtomicBool,
    closed: AtomicBool,
}

/// Recently read or written tiles plus a count of completed writes.
///
/// A reader that missed the cache only inserts what it read from disk if no
/// write has completed since the miss.
struct ReadCache {
    tiles: LruCache<TileKey, Tile>,
    writes: u64,
}

impl DiskTileStore {
    /// Create a new, empty store in `dir`, writing `summary.json`.
    ///
    /// The directory is created if needed.
    pub fn create(
        dir: impl Into<PathBuf>,
        summary: SummaryMetadata,
        cache_capacity: usize,
    ) -> Result<Self, StorageError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        fs::write(dir.join(SUMMARY_FILE), serde_json::to_vec_pretty(&summary)?)?;
        info!(dir = %dir.display(), "created disk tile store");

        Ok(Self::from_parts(dir, summary, BTreeSet::new(), cache_capacity))
    }

    /// Open an existing store, rebuilding the key index from the sidecars.
    ///
    /// A reopened store is already finished and only serves reads.
    pub fn open(dir: impl Into<PathBuf>, cache_capacity: usize) -> Result<Self, StorageError> {
        let dir = dir.into();
        let summary: SummaryMetadata =
            serde_json::from_slice(&fs::read(dir.join(SUMMARY_FILE))?)?;

        let mut index = BTreeSet::new();
        for entry in fs::read_dir(&dir)? {
            let path = entry?.path();
            let is_sidecar = path.extension().is_some_and(|ext| ext == "json")
                && path
                    .file_name()
                    .and_then(|name| name.to_str())
                    .is_some_and(|name| name.starts_with("tile_"));
            if is_sidecar {
                index.insert(read_sidecar(&path)?.key());
            }
        }
        info!(dir = %dir.display(), tiles = index.len(), "opened disk tile store");

        let store = Self::from_parts(dir, summary, index, cache_capacity);
        store.finished.store(true, Ordering::Release);
        Ok(store)
    }

    fn from_parts(
        dir: PathBuf,
        summary: SummaryMetadata,
        index: BTreeSet<TileKey>,
        cache_capacity: usize,
    ) -> Self {
        Self {
            dir,
            summary,
            index: RwLock::new(index),
            cache: Mutex::new(ReadCache {
                tiles: LruCache::new(
                    NonZeroUsize::new(cache_capacity).unwrap_or(NonZeroUsize::MIN),
                ),
                writes: 0,
            }),
            finished: AtomicBool::new(false),
            closed: AtomicBool::new(false),
        }
    }

    /// Directory holding the store's files.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Number of tiles currently held in the read cache.
    pub fn cached_tiles(&self) -> usize {
        self.cache.lock().map(|cache| cache.tiles.len()).unwrap_or(0)
    }

    fn file_stem(key: &TileKey) -> String {
        format!(
            "tile_c{}_z{}_t{}_p{}",
            key.channel, key.slice, key.frame, key.position
        )
    }

    fn pixel_path(&self, key: &TileKey) -> PathBuf {
        self.dir.join(format!("{}.raw", Self::file_stem(key)))
    }

    fn sidecar_path(&self, key: &TileKey) -> PathBuf {
        self.dir.join(format!("{}.json", Self::file_stem(key)))
    }

    fn read_tile(&self, key: &TileKey) -> Result<Tile, StorageError> {
        let metadata = read_sidecar(&self.sidecar_path(key))?;
        let pixels = fs::read(self.pixel_path(key))?;
        Tile::new(metadata, pixels).map_err(|e| StorageError::Serialization(e.to_string()))
    }

    /// Cached tile, or the write count at the time of the miss.
    fn cached(&self, key: &TileKey) -> Result<Result<Tile, u64>, StorageError> {
        let mut cache = self.cache.lock().map_err(|_| poisoned("cache"))?;
        let writes = cache.writes;
        Ok(cache.tiles.get(key).cloned().ok_or(writes))
    }

    /// Cache a tile read from disk after a miss at write count `seen`.
    ///
    /// Returns the tile to hand out: the cached one if a write of the same
    /// key landed in the meantime, otherwise `tile`.
    fn remember(&self, key: TileKey, tile: Tile, seen: u64) -> Result<Tile, StorageError> {
        let mut cache = self.cache.lock().map_err(|_| poisoned("cache"))?;
        if let Some(newer) = cache.tiles.get(&key) {
            return Ok(newer.clone());
        }
        if cache.writes == seen {
            cache.tiles.put(key, tile.clone());
        }
        Ok(tile)
    }
}

fn read_sidecar(path: &Path) -> Result<TileMetadata, StorageError> {
    let tags: Value = serde_json::from_slice(&fs::read(path)?)?;
    TileMetadata::from_tags(&tags)
        .map_err(|e| StorageError::Serialization(format!("{}: {}", path.display(), e)))
}

impl TileStore for DiskTileStore {
    fn put(&self, tile: Tile) -> Result<(), StoreError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(StorageError::Closed.into());
        }
        if self.finished.load(Ordering::Acquire) {
            return Err(StorageError::Finished.into());
        }
        check_pixel_type(&self.summary, &tile)?;

        let key = tile.key();
        fs::write(self.pixel_path(&key), tile.pixels()).map_err(StorageError::from)?;
        let sidecar =
            serde_json::to_vec_pretty(&tile.metadata().to_tags()).map_err(StorageError::from)?;
        fs::write(self.sidecar_path(&key), sidecar).map_err(StorageError::from)?;

        self.index
            .write()
            .map_err(|_| poisoned("index"))?
            .insert(key);
        {
            let mut cache = self.cache.lock().map_err(|_| poisoned("cache"))?;
            cache.writes += 1;
            cache.tiles.put(key, tile);
        }

        debug!(?key, "wrote tile to disk");
        Ok(())
    }

    fn get(&self, key: TileKey) -> Result<Option<Tile>, StorageError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(StorageError::Closed);
        }
        if !self.index.read().map_err(|_| poisoned("index"))?.contains(&key) {
            return Ok(None);
        }

        let seen = match self.cached(&key)? {
            Ok(tile) => return Ok(Some(tile)),
            Err(writes) => writes,
        };

        let tile = self.read_tile(&key)?;
        self.remember(key, tile, seen).map(Some)
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
        if let Ok(mut cache) = self.cache.lock() {
            cache.tiles.clear();
        }
        info!(dir = %self.dir.display(), "closed disk tile store");
        Ok(())
    }

    fn summary_metadata(&self) -> SummaryMetadata {
        self.summary.clone()
    }

    fn tile_keys(&self) -> Vec<TileKey> {
        self.index
            .read()
            .map(|index| index.iter().copied().collect())
            .unwrap_or_default()
    }
}

fn poisoned(what: &str) -> StorageError {
    StorageError::Io(format!("{what} lock poisoned"))
}
