//! On-demand mosaic composition.
//!
//! The assembler never keeps pixel data of its own. Every read walks the grid,
//! pulls whatever tiles the underlying store currently holds and copies them
//! into a freshly zeroed buffer, so a mosaic always reflects the latest puts
//! and regions for tiles that have not arrived stay black.
//!
//! # Pixel Placement
//!
//! For a tile at cell `(row, col)`, source row `y` lands at byte offset
//!
//! ```text
//! (full_width * (tile_height * row + y) + col * tile_width) * bytes_per_pixel
//! ```

use std::collections::BTreeSet;
use std::sync::RwLock;

use bytes::BytesMut;
use tracing::{debug, warn};

use super::grid::GridLayout;
use super::MosaicSource;
use crate::error::{StorageError, StoreError, TileError};
use crate::store::TileStore;
use crate::tile::{
    byte_len, FrameKey, PixelBuffer, PixelType, SummaryMetadata, Tile, TileKey, COMPOSITE_POSITION,
};

/// Composes mosaics for (channel, slice, frame) triples from a tile store.
///
/// Implements [`TileStore`] itself: `put` forwards tiles to the underlying
/// store, `get` returns the composed mosaic for the key's triple regardless
/// of its position index.
///
/// # Example
///
/// ```
/// use mosaic_stitch::mosaic::{GridLayout, MosaicAssembler, Orientation};
/// use mosaic_stitch::store::MemoryTileStore;
/// use mosaic_stitch::tile::{FrameKey, PixelType, SummaryMetadata};
///
/// let store = MemoryTileStore::new(SummaryMetadata::new(100, 100, PixelType::Gray8));
/// let layout = GridLayout::new(2, 2, Orientation::default()).unwrap();
/// let assembler = MosaicAssembler::new(store, layout);
///
/// assert_eq!(assembler.mosaic_size(), (200, 200));
/// assert!(assembler.compose(FrameKey::new(0, 0, 0)).unwrap().is_none());
/// ```
pub struct MosaicAssembler<S> {
    store: S,
    layout: GridLayout,
    tile_width: u32,
    tile_height: u32,
    pixel_type: PixelType,
    known: RwLock<BTreeSet<FrameKey>>,
}

impl<S: TileStore> MosaicAssembler<S> {
    /// Wrap a store. Tile size and pixel type come from its summary metadata.
    pub fn new(store: S, layout: GridLayout) -> Self {
        let summary = store.summary_metadata();
        let known = store
            .tile_keys()
            .iter()
            .filter(|key| key.position < layout.position_count())
            .map(TileKey::frame_key)
            .collect();

        Self {
            store,
            layout,
            tile_width: summary.width,
            tile_height: summary.height,
            pixel_type: summary.pixel_type,
            known: RwLock::new(known),
        }
    }

    pub fn layout(&self) -> &GridLayout {
        &self.layout
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn tile_size(&self) -> (u32, u32) {
        (self.tile_width, self.tile_height)
    }

    pub fn pixel_type(&self) -> PixelType {
        self.pixel_type
    }

    /// Full-resolution mosaic size `(width, height)`.
    pub fn mosaic_size(&self) -> (u32, u32) {
        self.layout.mosaic_size(self.tile_width, self.tile_height)
    }

    /// Whether any tile of this triple has arrived.
    pub fn is_known(&self, key: FrameKey) -> Result<bool, StorageError> {
        Ok(self.known.read().map_err(|_| known_poisoned())?.contains(&key))
    }

    /// Whether the tile at the last grid position of this triple has arrived.
    pub fn is_complete(&self, key: FrameKey) -> Result<bool, StorageError> {
        Ok(self
            .store
            .get(key.at_position(self.layout.last_position()))?
            .is_some())
    }

    /// Every triple with at least one tile, sorted.
    pub fn frame_keys(&self) -> Result<Vec<FrameKey>, StorageError> {
        Ok(self
            .known
            .read()
            .map_err(|_| known_poisoned())?
            .iter()
            .copied()
            .collect())
    }

    /// Check a tile against the grid before it reaches the store.
    fn validate(&self, tile: &Tile) -> Result<(), TileError> {
        let md = tile.metadata();
        if md.position >= self.layout.position_count() {
            return Err(TileError::PositionOutOfRange {
                position: md.position,
                positions: self.layout.position_count(),
            });
        }
        if md.width != self.tile_width || md.height != self.tile_height {
            return Err(TileError::DimensionMismatch {
                width: md.width,
                height: md.height,
                expected_width: self.tile_width,
                expected_height: self.tile_height,
            });
        }
        if md.pixel_type != self.pixel_type {
            return Err(TileError::PixelTypeMismatch {
                expected: self.pixel_type.as_str(),
                actual: md.pixel_type.as_str(),
            });
        }
        Ok(())
    }

    /// Tile at `key` if it exists and fits the grid's tile size.
    fn fetch(&self, key: TileKey) -> Result<Option<Tile>, StorageError> {
        let Some(tile) = self.store.get(key)? else {
            return Ok(None);
        };
        let md = tile.metadata();
        if md.width != self.tile_width
            || md.height != self.tile_height
            || md.pixel_type != self.pixel_type
        {
            warn!(?key, "skipping stored tile with unexpected size or pixel type");
            return Ok(None);
        }
        Ok(Some(tile))
    }

    /// Compose the full mosaic for a triple.
    ///
    /// Returns `None` if no tile of the triple has ever arrived. Regions of
    /// tiles that are still missing are zero. The mosaic carries the metadata
    /// of the first arrived tile in position order, with mosaic width and
    /// height and [`COMPOSITE_POSITION`] as its position.
    pub fn compose(&self, key: FrameKey) -> Result<Option<Tile>, StorageError> {
        if !self.is_known(key)? {
            return Ok(None);
        }

        let (full_width, full_height) = self.mosaic_size();
        let bpp = self.pixel_type.bytes_per_pixel();
        let full_row_bytes = full_width as usize * bpp;
        let tile_row_bytes = self.tile_width as usize * bpp;
        let tile_height = self.tile_height as usize;

        let mut pixels = BytesMut::zeroed(byte_len(full_width, full_height, self.pixel_type));
        let mut template = None;
        let mut arrived = 0usize;

        for position in 0..self.layout.position_count() {
            let Some(tile) = self.fetch(key.at_position(position))? else {
                continue;
            };
            let (row, col) = self.layout.cell(position);
            let src = tile.pixels();
            for y in 0..tile_height {
                let dst = full_row_bytes * (tile_height * row + y) + col * tile_row_bytes;
                let from = y * tile_row_bytes;
                pixels[dst..dst + tile_row_bytes]
                    .copy_from_slice(&src[from..from + tile_row_bytes]);
            }
            if template.is_none() {
                template = Some(tile.metadata().clone());
            }
            arrived += 1;
        }

        let Some(mut metadata) = template else {
            return Ok(None);
        };
        metadata.width = full_width;
        metadata.height = full_height;
        metadata.position = COMPOSITE_POSITION;

        debug!(?key, arrived, "composed mosaic");
        Ok(Some(Tile::from_parts(metadata, pixels.freeze())))
    }

    /// Full-resolution sub-image of a mosaic, reading only overlapping tiles.
    ///
    /// The rectangle is clipped to the mosaic. Returns `None` if no tile of
    /// the triple has arrived; missing tiles inside the rectangle are zero.
    pub fn get_region(
        &self,
        key: FrameKey,
        x: u32,
        y: u32,
        width: u32,
        height: u32,
    ) -> Result<Option<PixelBuffer>, StorageError> {
        if !self.is_known(key)? {
            return Ok(None);
        }

        let (full_width, full_height) = self.mosaic_size();
        let x = x.min(full_width);
        let y = y.min(full_height);
        let width = width.min(full_width - x);
        let height = height.min(full_height - y);
        if width == 0 || height == 0 {
            return Ok(Some(PixelBuffer::zeroed(width, height, self.pixel_type)));
        }

        let bpp = self.pixel_type.bytes_per_pixel();
        let out_row_bytes = width as usize * bpp;
        let tile_row_bytes = self.tile_width as usize * bpp;
        let mut out = BytesMut::zeroed(byte_len(width, height, self.pixel_type));

        let first_col = (x / self.tile_width) as usize;
        let last_col = ((x + width - 1) / self.tile_width) as usize;
        let first_row = (y / self.tile_height) as usize;
        let last_row = ((y + height - 1) / self.tile_height) as usize;

        for row in first_row..=last_row {
            for col in first_col..=last_col {
                let Some(position) = self.layout.position_at(row, col) else {
                    continue;
                };
                let Some(tile) = self.fetch(key.at_position(position))? else {
                    continue;
                };

                // Intersection of the tile with the requested rectangle, in mosaic pixels.
                let tile_x0 = col as u32 * self.tile_width;
                let tile_y0 = row as u32 * self.tile_height;
                let x0 = x.max(tile_x0);
                let x1 = (x + width).min(tile_x0 + self.tile_width);
                let y0 = y.max(tile_y0);
                let y1 = (y + height).min(tile_y0 + self.tile_height);

                let span = (x1 - x0) as usize * bpp;
                let src = tile.pixels();
                for my in y0..y1 {
                    let from =
                        (my - tile_y0) as usize * tile_row_bytes + (x0 - tile_x0) as usize * bpp;
                    let to = (my - y) as usize * out_row_bytes + (x0 - x) as usize * bpp;
                    out[to..to + span].copy_from_slice(&src[from..from + span]);
                }
            }
        }

        Ok(Some(PixelBuffer::from_parts(
            width,
            height,
            self.pixel_type,
            out.freeze(),
        )))
    }
}

impl<S: TileStore> TileStore for MosaicAssembler<S> {
    /// Validate and forward a tile, recording its triple as known.
    fn put(&self, tile: Tile) -> Result<(), StoreError> {
        self.validate(&tile)?;
        let key = tile.frame_key();
        self.store.put(tile)?;
        self.known
            .write()
            .map_err(|_| known_poisoned())?
            .insert(key);
        Ok(())
    }

    /// The composed mosaic for the key's triple. The position is ignored.
    fn get(&self, key: TileKey) -> Result<Option<Tile>, StorageError> {
        self.compose(key.frame_key())
    }

    fn finish(&self) -> Result<(), StorageError> {
        self.store.finish()
    }

    fn is_finished(&self) -> bool {
        self.store.is_finished()
    }

    fn close(&self) -> Result<(), StorageError> {
        self.store.close()
    }

    /// Store summary with mosaic dimensions and a single position.
    fn summary_metadata(&self) -> SummaryMetadata {
        let (width, height) = self.mosaic_size();
        let mut summary = self.store.summary_metadata();
        summary.width = width;
        summary.height = height;
        summary.positions = 1;
        summary
    }

    fn tile_keys(&self) -> Vec<TileKey> {
        self.frame_keys()
            .unwrap_or_default()
            .into_iter()
            .map(|key| key.at_position(COMPOSITE_POSITION))
            .collect()
    }
}

fn known_poisoned() -> StorageError {
    StorageError::Io("known-frame lock poisoned".to_string())
}

impl<S: TileStore> MosaicSource for MosaicAssembler<S> {
    fn mosaic_size(&self) -> (u32, u32) {
        MosaicAssembler::mosaic_size(self)
    }

    fn tile_size(&self) -> (u32, u32) {
        MosaicAssembler::tile_size(self)
    }

    fn layout(&self) -> &GridLayout {
        &self.layout
    }

    fn mosaic(&self, key: FrameKey) -> Result<Option<PixelBuffer>, StorageError> {
        Ok(self.compose(key)?.map(|tile| tile.buffer()))
    }

    fn region(
        &self,
        key: FrameKey,
        x: u32,
        y: u32,
        width: u32,
        height: u32,
    ) -> Result<Option<PixelBuffer>, StorageError> {
        MosaicAssembler::get_region(self, key, x, y, width, height)
    }
}

// =============================================================================
// Tests
// =============================================================================
