//! Two-mode viewport over a mosaic.

use tracing::debug;

use crate::error::StorageError;
use crate::mosaic::MosaicSource;
use crate::tile::{FrameKey, PixelBuffer};

/// Default on-screen size cap in pixels.
pub const DEFAULT_DISPLAY_CAP: u32 = 512;

/// Smallest integer factor that brings the larger mosaic side within `cap`.
///
/// Always at least 1. A `cap` of 0 is treated as 1.
#[inline]
pub fn downsample_factor(full_width: u32, full_height: u32, cap: u32) -> u32 {
    full_width.max(full_height).div_ceil(cap.max(1)).max(1)
}

/// What the viewport currently shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewportMode {
    /// The whole mosaic, downsampled
    Full,
    /// A full-resolution crop whose top-left corner sits at the offset
    Zoomed { offset_x: u32, offset_y: u32 },
}

/// Result of rendering one triple.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Render {
    Ready(PixelBuffer),
    /// No tile of the triple has arrived yet
    Unavailable,
}

impl Render {
    pub fn is_ready(&self) -> bool {
        matches!(self, Render::Ready(_))
    }

    pub fn into_pixels(self) -> Option<PixelBuffer> {
        match self {
            Render::Ready(pixels) => Some(pixels),
            Render::Unavailable => None,
        }
    }
}

/// Grid cell under a display pixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileLocation {
    pub row: usize,
    pub column: usize,
    pub position: usize,
}

/// Viewport with a downsampled overview and a full-resolution zoom.
///
/// Both modes produce images of the same `viewport_size`. The downsample
/// factor and viewport size are fixed when the window is built.
///
/// # Example
///
/// ```
/// use mosaic_stitch::mosaic::{GridLayout, MosaicAssembler, Orientation};
/// use mosaic_stitch::store::MemoryTileStore;
/// use mosaic_stitch::tile::{PixelType, SummaryMetadata};
/// use mosaic_stitch::viewport::{ViewportMode, ViewportWindow};
///
/// let store = MemoryTileStore::new(SummaryMetadata::new(512, 512, PixelType::Gray16));
/// let layout = GridLayout::new(3, 2, Orientation::default()).unwrap();
/// let mut window = ViewportWindow::new(MosaicAssembler::new(store, layout), 512);
///
/// assert_eq!(window.downsample_factor(), 3);
/// assert_eq!(window.viewport_size(), (512, 341));
///
/// window.activate_zoom(256, 170);
/// assert_eq!(window.mode(), ViewportMode::Zoomed { offset_x: 512, offset_y: 340 });
/// ```
pub struct ViewportWindow<M> {
    source: M,
    full_width: u32,
    full_height: u32,
    factor: u32,
    viewport_width: u32,
    viewport_height: u32,
    mode: ViewportMode,
}

impl<M: MosaicSource> ViewportWindow<M> {
    pub fn new(source: M, display_cap: u32) -> Self {
        let (full_width, full_height) = source.mosaic_size();
        let factor = downsample_factor(full_width, full_height, display_cap);
        Self {
            source,
            full_width,
            full_height,
            factor,
            viewport_width: full_width / factor,
            viewport_height: full_height / factor,
            mode: ViewportMode::Full,
        }
    }

    pub fn with_default_cap(source: M) -> Self {
        Self::new(source, DEFAULT_DISPLAY_CAP)
    }

    pub fn source(&self) -> &M {
        &self.source
    }

    pub fn mode(&self) -> ViewportMode {
        self.mode
    }

    pub fn downsample_factor(&self) -> u32 {
        self.factor
    }

    pub fn full_size(&self) -> (u32, u32) {
        (self.full_width, self.full_height)
    }

    /// Size of rendered images `(width, height)`.
    pub fn viewport_size(&self) -> (u32, u32) {
        (self.viewport_width, self.viewport_height)
    }

    /// Full-resolution offset of the zoomed crop, `None` in full mode.
    pub fn offset(&self) -> Option<(u32, u32)> {
        match self.mode {
            ViewportMode::Full => None,
            ViewportMode::Zoomed { offset_x, offset_y } => Some((offset_x, offset_y)),
        }
    }

    /// Zoom to full resolution, centring on a point of the overview.
    ///
    /// `focus_x`/`focus_y` are display coordinates of the full-mode image.
    pub fn activate_zoom(&mut self, focus_x: u32, focus_y: u32) {
        let offset_x = self.clamp_x(
            focus_x as i64 * self.factor as i64 - self.viewport_width as i64 / 2,
        );
        let offset_y = self.clamp_y(
            focus_y as i64 * self.factor as i64 - self.viewport_height as i64 / 2,
        );
        self.mode = ViewportMode::Zoomed { offset_x, offset_y };
        debug!(offset_x, offset_y, "viewport zoomed");
    }

    pub fn activate_full(&mut self) {
        self.mode = ViewportMode::Full;
        debug!("viewport showing full mosaic");
    }

    /// Move the zoomed crop by full-resolution pixels, staying inside the
    /// mosaic. Returns `false` and does nothing in full mode.
    pub fn pan(&mut self, dx: i64, dy: i64) -> bool {
        let ViewportMode::Zoomed { offset_x, offset_y } = self.mode else {
            return false;
        };
        self.mode = ViewportMode::Zoomed {
            offset_x: self.clamp_x(offset_x as i64 + dx),
            offset_y: self.clamp_y(offset_y as i64 + dy),
        };
        true
    }

    fn clamp_x(&self, value: i64) -> u32 {
        value.clamp(0, (self.full_width - self.viewport_width) as i64) as u32
    }

    fn clamp_y(&self, value: i64) -> u32 {
        value.clamp(0, (self.full_height - self.viewport_height) as i64) as u32
    }

    /// Image for the current mode.
    pub fn render(&self, key: FrameKey) -> Result<Render, StorageError> {
        let pixels = match self.mode {
            ViewportMode::Full => self
                .source
                .mosaic(key)?
                .map(|mosaic| mosaic.downsample(self.factor)),
            ViewportMode::Zoomed { offset_x, offset_y } => self.source.region(
                key,
                offset_x,
                offset_y,
                self.viewport_width,
                self.viewport_height,
            )?,
        };
        Ok(pixels.map_or(Render::Unavailable, Render::Ready))
    }

    /// Full-resolution mosaic coordinates of a display pixel, or `None` if
    /// it falls outside the mosaic.
    pub fn display_to_full(&self, x: u32, y: u32) -> Option<(u32, u32)> {
        let (full_x, full_y) = match self.mode {
            ViewportMode::Full => (
                x.checked_mul(self.factor)?,
                y.checked_mul(self.factor)?,
            ),
            ViewportMode::Zoomed { offset_x, offset_y } => {
                (offset_x.checked_add(x)?, offset_y.checked_add(y)?)
            }
        };
        (full_x < self.full_width && full_y < self.full_height).then_some((full_x, full_y))
    }

    /// Grid cell and position index of the tile under a display pixel.
    pub fn tile_at_display(&self, x: u32, y: u32) -> Option<TileLocation> {
        let (full_x, full_y) = self.display_to_full(x, y)?;
        let (tile_width, tile_height) = self.source.tile_size();
        if tile_width == 0 || tile_height == 0 {
            return None;
        }
        let row = (full_y / tile_height) as usize;
        let column = (full_x / tile_width) as usize;
        let position = self.source.layout().position_at(row, column)?;
        Some(TileLocation {
            row,
            column,
            position,
        })
    }
}
