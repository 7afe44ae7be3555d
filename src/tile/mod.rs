//! Tile data model.
//!
//! A [`Tile`] is one camera image acquired at one stage position, tagged with
//! the (channel, slice, frame, position) it belongs to. Mosaics composed from
//! tiles use the same type, with the position index set to
//! [`COMPOSITE_POSITION`].
//!
//! # Components
//!
//! - [`Tile`]: pixel buffer plus typed metadata, immutable once built
//! - [`TileMetadata`]: typed record of the tags every tile must carry
//! - [`SummaryMetadata`]: dataset-wide dimensions and counts
//! - [`PixelBuffer`]: raw grayscale pixels with crop/downsample helpers
//! - [`TileKey`] / [`FrameKey`]: store keys for tiles and mosaics

mod metadata;
mod pixels;

use bytes::Bytes;
use serde_json::Value;

pub use metadata::{tags, FrameKey, SummaryMetadata, TileKey, TileMetadata};
pub use pixels::{byte_len, PixelBuffer, PixelType};

use crate::error::TileError;

/// Position index given to composed mosaics.
///
/// A mosaic stands for every stage position at once, so viewers see a single
/// position and never offer a position selector.
pub const COMPOSITE_POSITION: usize = 0;

/// One tagged image.
#[derive(Debug, Clone, PartialEq)]
pub struct Tile {
    metadata: TileMetadata,
    pixels: Bytes,
}

impl Tile {
    /// Build a tile, checking the pixel buffer length against the metadata.
    pub fn new(metadata: TileMetadata, pixels: impl Into<Bytes>) -> Result<Self, TileError> {
        let pixels = pixels.into();
        let expected = byte_len(metadata.width, metadata.height, metadata.pixel_type);
        if pixels.len() != expected {
            return Err(TileError::PixelCount {
                expected,
                actual: pixels.len(),
            });
        }
        Ok(Self { metadata, pixels })
    }

    pub(crate) fn from_parts(metadata: TileMetadata, pixels: Bytes) -> Self {
        debug_assert_eq!(
            pixels.len(),
            byte_len(metadata.width, metadata.height, metadata.pixel_type)
        );
        Self { metadata, pixels }
    }

    /// Build a tile from raw JSON tags.
    pub fn from_tags(tags: &Value, pixels: impl Into<Bytes>) -> Result<Self, TileError> {
        let metadata = TileMetadata::from_tags(tags)?;
        Self::new(metadata, pixels)
    }

    pub fn metadata(&self) -> &TileMetadata {
        &self.metadata
    }

    pub fn pixels(&self) -> &Bytes {
        &self.pixels
    }

    pub fn key(&self) -> TileKey {
        self.metadata.key()
    }

    pub fn frame_key(&self) -> FrameKey {
        self.metadata.frame_key()
    }

    /// View the pixels as a [`PixelBuffer`]. Shares the underlying bytes.
    pub fn buffer(&self) -> PixelBuffer {
        PixelBuffer::from_parts(
            self.metadata.width,
            self.metadata.height,
            self.metadata.pixel_type,
            self.pixels.clone(),
        )
    }

    pub fn into_parts(self) -> (TileMetadata, Bytes) {
        (self.metadata, self.pixels)
    }
}
