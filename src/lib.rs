//! # Mosaic Stitch
//!
//! Composes camera tiles acquired at a grid of stage positions into one
//! mosaic per (channel, slice, frame), mirrors completed mosaics into a
//! derived export format on a background thread, and serves them at display
//! resolution through a two-mode viewport.
//!
//! ## Features
//!
//! - **On-demand composition**: mosaics are rebuilt from the tile store on every read, missing tiles stay black
//! - **Camera orientation**: mirror and swap flags applied when placing tiles
//! - **Background export**: completed mosaics are smoothed and written as a JPEG sequence off the producer thread
//! - **Viewport**: capped-size overview or full-resolution crop that reads only the tiles it needs
//! - **Storage**: memory store or disk store with an LRU read cache
//!
//! ## Architecture
//!
//! - [`tile`] - Tiles, typed metadata and pixel buffers
//! - [`store`] - The `TileStore` interface with memory and disk stores
//! - [`mosaic`] - Grid layout, mosaic assembler and export coordinator
//! - [`export`] - Export queue, recording clock, filters and writers
//! - [`viewport`] - Overview and zoomed windows over a mosaic
//! - [`config`] - CLI configuration types
//!
//! ## Example
//!
//! ```rust
//! use mosaic_stitch::{
//!     FrameKey, GridLayout, MemoryTileStore, MosaicAssembler, Orientation, PixelType,
//!     SummaryMetadata, Tile, TileStore,
//! };
//! use serde_json::json;
//!
//! let store = MemoryTileStore::new(SummaryMetadata::new(2, 2, PixelType::Gray8));
//! let layout = GridLayout::new(2, 1, Orientation::default()).unwrap();
//! let assembler = MosaicAssembler::new(store, layout);
//!
//! let tags = json!({
//!     "ChannelIndex": 0, "SliceIndex": 0, "FrameIndex": 0, "PositionIndex": 1,
//!     "Width": 2, "Height": 2, "PixelType": "GRAY8",
//!     "Time": "2014-03-19 14:21:33.123 -0700", "ElapsedTime-ms": 0
//! });
//! assembler.put(Tile::from_tags(&tags, vec![9u8; 4]).unwrap()).unwrap();
//!
//! let mosaic = assembler.compose(FrameKey::new(0, 0, 0)).unwrap().unwrap();
//! assert_eq!(mosaic.pixels().as_ref(), &[0, 0, 9, 9, 0, 0, 9, 9]);
//! ```

pub mod config;
pub mod error;
pub mod export;
pub mod mosaic;
pub mod store;
pub mod tile;
pub mod viewport;

// Re-export commonly used types
pub use config::Config;
pub use error::{ExportError, GridError, MetadataError, StorageError, StoreError, TileError};
pub use export::{
    format_elapsed, ExportOptions, ExportQueue, ExportState, FrameFilter, FrameWriter,
    JpegSequenceWriter, LogProgress, ProgressSink, RecordingClock, Timestamp,
};
pub use mosaic::{
    DualSinkCoordinator, GridLayout, GridPosition, MosaicAssembler, MosaicSource, Orientation,
    PositionList,
};
pub use store::{DiskTileStore, MemoryTileStore, TileStore};
pub use tile::{
    FrameKey, PixelBuffer, PixelType, SummaryMetadata, Tile, TileKey, TileMetadata,
    COMPOSITE_POSITION,
};
pub use viewport::{downsample_factor, Render, ViewportMode, ViewportWindow, DEFAULT_DISPLAY_CAP};
