//! Configuration for the mosaic stitching tool.
//!
//! Options come from command-line arguments via clap, with every option also
//! readable from a `MOSAIC_`-prefixed environment variable.
//!
//! # Example
//!
//! ```ignore
//! use clap::Parser;
//! use mosaic_stitch::config::Config;
//!
//! let config = Config::parse();
//! config.validate()?;
//! println!("{}x{} grid", config.columns, config.rows);
//! ```
//!
//! # Environment Variables
//!
//! - `MOSAIC_ROWS` / `MOSAIC_COLUMNS` - Grid size in tiles (default: 2x2)
//! - `MOSAIC_TILE_WIDTH` / `MOSAIC_TILE_HEIGHT` - Tile size in pixels (default: 256)
//! - `MOSAIC_PIXEL_TYPE` - `GRAY8` or `GRAY16` (default: GRAY16)
//! - `MOSAIC_CHANNELS` / `MOSAIC_SLICES` / `MOSAIC_FRAMES` - Acquisition counts (default: 1)
//! - `MOSAIC_MIRROR_X` / `MOSAIC_MIRROR_Y` / `MOSAIC_SWAP_XY` - Camera orientation
//! - `MOSAIC_STORAGE_DIR` - Disk store directory (memory store when unset)
//! - `MOSAIC_DISK_CACHE` - Tiles kept in the disk store read cache (default: 64)
//! - `MOSAIC_EXPORT_DIR` - Enables the JPEG export into this directory
//! - `MOSAIC_FILTER` - Export smoothing: `none`, `mean`, `gaussian:<sigma>`
//! - `MOSAIC_JPEG_QUALITY` - Export JPEG quality (default: 85)
//! - `MOSAIC_DISPLAY_CAP` - Overview size cap in pixels (default: 512)
//! - `MOSAIC_OVERVIEW` - Write the last frame's overview JPEG here

use std::path::PathBuf;

use clap::Parser;

use crate::export::{FrameFilter, DEFAULT_JPEG_QUALITY, MAX_JPEG_QUALITY, MIN_JPEG_QUALITY};
use crate::mosaic::Orientation;
use crate::store::DEFAULT_DISK_CACHE_CAPACITY;
use crate::tile::PixelType;
use crate::viewport::DEFAULT_DISPLAY_CAP;

// =============================================================================
// Default Values
// =============================================================================

/// Default grid size in tiles along each axis.
pub const DEFAULT_GRID_SIZE: usize = 2;

/// Default tile edge in pixels.
pub const DEFAULT_TILE_SIZE: u32 = 256;

/// Largest accepted tile edge in pixels.
pub const MAX_TILE_SIZE: u32 = 16_384;

// =============================================================================
// CLI Arguments
// =============================================================================

/// Mosaic Stitch - composes stage-position tiles into mosaics.
///
/// Runs a synthetic acquisition through the stitching pipeline: tiles are
/// stored, composed per (channel, slice, frame), optionally exported as a JPEG
/// sequence, and the last frame's overview can be written to disk.
#[derive(Parser, Debug, Clone)]
#[command(name = "mosaic-stitch")]
#[command(author, version, about, long_about = None)]
pub struct Config {
    // =========================================================================
    // Grid
    // =========================================================================
    /// Number of tile rows in the grid.
    #[arg(long, default_value_t = DEFAULT_GRID_SIZE, env = "MOSAIC_ROWS")]
    pub rows: usize,

    /// Number of tile columns in the grid.
    #[arg(long, default_value_t = DEFAULT_GRID_SIZE, env = "MOSAIC_COLUMNS")]
    pub columns: usize,

    /// Tile width in pixels.
    #[arg(long, default_value_t = DEFAULT_TILE_SIZE, env = "MOSAIC_TILE_WIDTH")]
    pub tile_width: u32,

    /// Tile height in pixels.
    #[arg(long, default_value_t = DEFAULT_TILE_SIZE, env = "MOSAIC_TILE_HEIGHT")]
    pub tile_height: u32,

    /// Pixel type of every tile (GRAY8 or GRAY16).
    #[arg(
        long,
        default_value = "GRAY16",
        value_parser = parse_pixel_type,
        env = "MOSAIC_PIXEL_TYPE"
    )]
    pub pixel_type: PixelType,

    // =========================================================================
    // Acquisition
    // =========================================================================
    /// Number of channels.
    #[arg(long, default_value_t = 1, env = "MOSAIC_CHANNELS")]
    pub channels: usize,

    /// Number of z slices.
    #[arg(long, default_value_t = 1, env = "MOSAIC_SLICES")]
    pub slices: usize,

    /// Number of time points.
    #[arg(long, default_value_t = 1, env = "MOSAIC_FRAMES")]
    pub frames: usize,

    // =========================================================================
    // Camera Orientation
    // =========================================================================
    /// Mirror tile columns.
    #[arg(long, default_value_t = false, env = "MOSAIC_MIRROR_X")]
    pub mirror_x: bool,

    /// Mirror tile rows.
    #[arg(long, default_value_t = false, env = "MOSAIC_MIRROR_Y")]
    pub mirror_y: bool,

    /// Swap tile rows and columns.
    #[arg(long, default_value_t = false, env = "MOSAIC_SWAP_XY")]
    pub swap_xy: bool,

    // =========================================================================
    // Storage
    // =========================================================================
    /// Directory for the disk tile store.
    ///
    /// If not specified, tiles are kept in memory.
    #[arg(long, env = "MOSAIC_STORAGE_DIR")]
    pub storage_dir: Option<PathBuf>,

    /// Number of tiles kept in the disk store's read cache.
    #[arg(long, default_value_t = DEFAULT_DISK_CACHE_CAPACITY, env = "MOSAIC_DISK_CACHE")]
    pub disk_cache: usize,

    // =========================================================================
    // Export
    // =========================================================================
    /// Directory for the JPEG sequence export.
    ///
    /// Export is disabled when not specified.
    #[arg(long, env = "MOSAIC_EXPORT_DIR")]
    pub export_dir: Option<PathBuf>,

    /// Smoothing applied to exported frames: none, mean or gaussian:<sigma>.
    #[arg(long, default_value = "none", env = "MOSAIC_FILTER")]
    pub filter: FrameFilter,

    /// JPEG quality for exported frames (1-100).
    #[arg(long, default_value_t = DEFAULT_JPEG_QUALITY, env = "MOSAIC_JPEG_QUALITY")]
    pub jpeg_quality: u8,

    // =========================================================================
    // Display
    // =========================================================================
    /// Cap on the overview's larger side in pixels.
    #[arg(long, default_value_t = DEFAULT_DISPLAY_CAP, env = "MOSAIC_DISPLAY_CAP")]
    pub display_cap: u32,

    /// Write the overview of the last composed frame to this JPEG file.
    #[arg(long, env = "MOSAIC_OVERVIEW")]
    pub overview: Option<PathBuf>,

    // =========================================================================
    // Logging
    // =========================================================================
    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}

fn parse_pixel_type(value: &str) -> Result<PixelType, String> {
    PixelType::parse(&value.to_ascii_uppercase())
        .ok_or_else(|| format!("unknown pixel type '{value}' (expected GRAY8 or GRAY16)"))
}

impl Config {
    /// Validate the configuration and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.rows == 0 || self.columns == 0 {
            return Err("rows and columns must be greater than 0".to_string());
        }

        if self.tile_width == 0 || self.tile_height == 0 {
            return Err("tile_width and tile_height must be greater than 0".to_string());
        }
        if self.tile_width > MAX_TILE_SIZE || self.tile_height > MAX_TILE_SIZE {
            return Err(format!("tile size must not exceed {MAX_TILE_SIZE} pixels"));
        }

        if self.channels == 0 || self.slices == 0 || self.frames == 0 {
            return Err("channels, slices and frames must be greater than 0".to_string());
        }

        if self.disk_cache == 0 {
            return Err("disk_cache must be greater than 0".to_string());
        }

        if !(MIN_JPEG_QUALITY..=MAX_JPEG_QUALITY).contains(&self.jpeg_quality) {
            return Err("jpeg_quality must be between 1 and 100".to_string());
        }

        if self.display_cap == 0 {
            return Err("display_cap must be greater than 0".to_string());
        }

        // Composed mosaics must fit a u32 pixel extent.
        let too_wide = (self.columns.max(self.rows) as u64)
            * (self.tile_width.max(self.tile_height) as u64)
            > u32::MAX as u64;
        if too_wide {
            return Err("grid is too large for a single mosaic".to_string());
        }

        Ok(())
    }

    pub fn orientation(&self) -> Orientation {
        Orientation::new(self.mirror_x, self.mirror_y, self.swap_xy)
    }

    /// Number of positions in the grid.
    pub fn positions(&self) -> usize {
        self.rows * self.columns
    }

    /// Number of mosaics the acquisition produces.
    pub fn frame_count(&self) -> usize {
        self.channels * self.slices * self.frames
    }

    pub fn export_enabled(&self) -> bool {
        self.export_dir.is_some()
    }
}

// =============================================================================
// Tests
// =============================================================================
