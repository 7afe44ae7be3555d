//! Resolution-aware windowing over mosaics.
//!
//! A mosaic is usually far larger than a display. [`ViewportWindow`] shows
//! either the whole mosaic shrunk by an integer factor, or a crop of the same
//! on-screen size at full resolution. Zoomed renders read only the tiles
//! under the crop.
//!
//! ```text
//!   Full                               Zoomed { offset_x, offset_y }
//! ┌──────────────────────┐           ┌──────────────────────┐
//! │ whole mosaic / factor│  zoom ──► │   ┌────────┐         │
//! │                      │           │   │  crop  │ 1:1     │
//! │                      │ ◄── full  │   └────────┘         │
//! └──────────────────────┘           └──────────────────────┘
//! ```

mod window;

pub use window::{
    downsample_factor, Render, TileLocation, ViewportMode, ViewportWindow, DEFAULT_DISPLAY_CAP,
};
