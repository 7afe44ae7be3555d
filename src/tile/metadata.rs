//! Typed tile and summary metadata.
//!
//! Tiles arrive tagged with a JSON object. The fields this crate relies on are
//! pulled out into [`TileMetadata`] once, at the edge, so that a tag that is
//! absent is reported differently from one that is present but unreadable.
//! All other tags are carried through untouched in `extra`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::pixels::PixelType;
use crate::error::MetadataError;

/// Tag names for the required fields.
pub mod tags {
    pub const CHANNEL_INDEX: &str = "ChannelIndex";
    pub const SLICE_INDEX: &str = "SliceIndex";
    pub const FRAME_INDEX: &str = "FrameIndex";
    pub const POSITION_INDEX: &str = "PositionIndex";
    pub const WIDTH: &str = "Width";
    pub const HEIGHT: &str = "Height";
    pub const PIXEL_TYPE: &str = "PixelType";
    pub const TIME: &str = "Time";
    pub const ELAPSED_TIME_MS: &str = "ElapsedTime-ms";
}

// =============================================================================
// Keys
// =============================================================================

/// Identifies one tile: a (channel, slice, frame) triple at one stage position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileKey {
    pub channel: usize,
    pub slice: usize,
    pub frame: usize,
    pub position: usize,
}

impl TileKey {
    pub fn new(channel: usize, slice: usize, frame: usize, position: usize) -> Self {
        Self {
            channel,
            slice,
            frame,
            position,
        }
    }

    /// The mosaic this tile belongs to.
    pub fn frame_key(&self) -> FrameKey {
        FrameKey::new(self.channel, self.slice, self.frame)
    }
}

/// Identifies one mosaic: a (channel, slice, frame) triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FrameKey {
    pub channel: usize,
    pub slice: usize,
    pub frame: usize,
}

impl FrameKey {
    pub fn new(channel: usize, slice: usize, frame: usize) -> Self {
        Self {
            channel,
            slice,
            frame,
        }
    }

    /// The tile of this mosaic at `position`.
    pub fn at_position(&self, position: usize) -> TileKey {
        TileKey::new(self.channel, self.slice, self.frame, position)
    }
}

// =============================================================================
// Tile Metadata
// =============================================================================

/// Metadata record attached to every tile.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TileMetadata {
    #[serde(rename = "ChannelIndex")]
    pub channel: usize,

    #[serde(rename = "SliceIndex")]
    pub slice: usize,

    #[serde(rename = "FrameIndex")]
    pub frame: usize,

    #[serde(rename = "PositionIndex")]
    pub position: usize,

    #[serde(rename = "Width")]
    pub width: u32,

    #[serde(rename = "Height")]
    pub height: u32,

    #[serde(rename = "PixelType")]
    pub pixel_type: PixelType,

    /// Capture wall-clock time, e.g. `2014-03-19 14:21:33.123 -0700`
    #[serde(rename = "Time")]
    pub time: String,

    /// Milliseconds elapsed since the acquisition started
    #[serde(rename = "ElapsedTime-ms")]
    pub elapsed_ms: f64,

    /// Every other tag, passed through unchanged
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl TileMetadata {
    /// Parse the required fields out of a JSON tag object.
    ///
    /// # Errors
    ///
    /// - [`MetadataError::Missing`] if a required tag is absent (or `null`)
    /// - [`MetadataError::Malformed`] if a tag has the wrong type or value
    pub fn from_tags(tags: &Value) -> Result<Self, MetadataError> {
        let object = tags.as_object().ok_or(MetadataError::Malformed {
            field: "tags",
            message: "expected a JSON object".to_string(),
        })?;

        let pixel_type_tag = required_str(object, tags::PIXEL_TYPE)?;
        let pixel_type =
            PixelType::parse(pixel_type_tag).ok_or_else(|| MetadataError::Malformed {
                field: tags::PIXEL_TYPE,
                message: format!("unsupported pixel type {pixel_type_tag:?}"),
            })?;

        let mut extra = object.clone();
        for name in [
            tags::CHANNEL_INDEX,
            tags::SLICE_INDEX,
            tags::FRAME_INDEX,
            tags::POSITION_INDEX,
            tags::WIDTH,
            tags::HEIGHT,
            tags::PIXEL_TYPE,
            tags::TIME,
            tags::ELAPSED_TIME_MS,
        ] {
            extra.remove(name);
        }

        Ok(Self {
            channel: required_index(object, tags::CHANNEL_INDEX)?,
            slice: required_index(object, tags::SLICE_INDEX)?,
            frame: required_index(object, tags::FRAME_INDEX)?,
            position: required_index(object, tags::POSITION_INDEX)?,
            width: required_dimension(object, tags::WIDTH)?,
            height: required_dimension(object, tags::HEIGHT)?,
            pixel_type,
            time: required_str(object, tags::TIME)?.to_string(),
            elapsed_ms: required_f64(object, tags::ELAPSED_TIME_MS)?,
            extra,
        })
    }

    /// Serialize back into a JSON tag object.
    pub fn to_tags(&self) -> Value {
        // Infallible: every field serializes to plain JSON.
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    pub fn key(&self) -> TileKey {
        TileKey::new(self.channel, self.slice, self.frame, self.position)
    }

    pub fn frame_key(&self) -> FrameKey {
        FrameKey::new(self.channel, self.slice, self.frame)
    }
}

fn required<'a>(
    object: &'a Map<String, Value>,
    field: &'static str,
) -> Result<&'a Value, MetadataError> {
    match object.get(field) {
        None | Some(Value::Null) => Err(MetadataError::Missing { field }),
        Some(value) => Ok(value),
    }
}

fn required_index(
    object: &Map<String, Value>,
    field: &'static str,
) -> Result<usize, MetadataError> {
    let value = required(object, field)?;
    value
        .as_u64()
        .and_then(|v| usize::try_from(v).ok())
        .ok_or_else(|| MetadataError::Malformed {
            field,
            message: format!("expected a non-negative integer, got {value}"),
        })
}

fn required_dimension(
    object: &Map<String, Value>,
    field: &'static str,
) -> Result<u32, MetadataError> {
    let value = required(object, field)?;
    match value.as_u64().and_then(|v| u32::try_from(v).ok()) {
        Some(v) if v > 0 => Ok(v),
        _ => Err(MetadataError::Malformed {
            field,
            message: format!("expected a positive integer, got {value}"),
        }),
    }
}

fn required_f64(object: &Map<String, Value>, field: &'static str) -> Result<f64, MetadataError> {
    let value = required(object, field)?;
    value.as_f64().ok_or_else(|| MetadataError::Malformed {
        field,
        message: format!("expected a number, got {value}"),
    })
}

fn required_str<'a>(
    object: &'a Map<String, Value>,
    field: &'static str,
) -> Result<&'a str, MetadataError> {
    let value = required(object, field)?;
    value.as_str().ok_or_else(|| MetadataError::Malformed {
        field,
        message: format!("expected a string, got {value}"),
    })
}

// =============================================================================
// Summary Metadata
// =============================================================================

/// Dataset-level metadata describing every tile in a store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SummaryMetadata {
    /// Width in pixels of every image in the store
    pub width: u32,

    /// Height in pixels of every image in the store
    pub height: u32,

    pub pixel_type: PixelType,

    pub channels: usize,

    pub slices: usize,

    pub frames: usize,

    pub positions: usize,

    /// Dataset name
    #[serde(default)]
    pub prefix: String,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl SummaryMetadata {
    pub fn new(width: u32, height: u32, pixel_type: PixelType) -> Self {
        Self {
            width,
            height,
            pixel_type,
            channels: 1,
            slices: 1,
            frames: 1,
            positions: 1,
            prefix: String::new(),
            extra: Map::new(),
        }
    }

    /// Set channel, slice and frame counts.
    pub fn with_dimensions(mut self, channels: usize, slices: usize, frames: usize) -> Self {
        self.channels = channels;
        self.slices = slices;
        self.frames = frames;
        self
    }

    pub fn with_positions(mut self, positions: usize) -> Self {
        self.positions = positions;
        self
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Expected number of (channel, slice, frame) triples.
    pub fn frame_count(&self) -> usize {
        self.channels * self.slices * self.frames
    }
}

// =============================================================================
// Tests
// =============================================================================
