//! Raw grayscale pixel buffers.
//!
//! Pixels are stored row-major as little-endian samples of one or two bytes.
//! Buffers are backed by [`Bytes`] so that tiles, composed mosaics and export
//! entries can share pixel data without copying.

use std::fmt;

use bytes::{Bytes, BytesMut};
use serde::{Deserialize, Serialize};

use crate::error::TileError;

// =============================================================================
// Pixel Type
// =============================================================================

/// Sample format of a grayscale image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PixelType {
    /// 8-bit unsigned samples
    #[serde(rename = "GRAY8")]
    Gray8,

    /// 16-bit unsigned little-endian samples
    #[serde(rename = "GRAY16")]
    Gray16,
}

impl PixelType {
    /// Number of bytes per sample.
    #[inline]
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            PixelType::Gray8 => 1,
            PixelType::Gray16 => 2,
        }
    }

    /// Tag value used in metadata (`GRAY8` / `GRAY16`).
    pub fn as_str(self) -> &'static str {
        match self {
            PixelType::Gray8 => "GRAY8",
            PixelType::Gray16 => "GRAY16",
        }
    }

    /// Parse a tag value.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "GRAY8" => Some(PixelType::Gray8),
            "GRAY16" => Some(PixelType::Gray16),
            _ => None,
        }
    }
}

impl fmt::Display for PixelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Pixel Buffer
// =============================================================================

/// A width x height grayscale image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    pixel_type: PixelType,
    data: Bytes,
}

impl PixelBuffer {
    /// Wrap raw pixel bytes, checking the length against the dimensions.
    pub fn new(
        width: u32,
        height: u32,
        pixel_type: PixelType,
        data: impl Into<Bytes>,
    ) -> Result<Self, TileError> {
        let data = data.into();
        let expected = byte_len(width, height, pixel_type);
        if data.len() != expected {
            return Err(TileError::PixelCount {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            pixel_type,
            data,
        })
    }

    /// A buffer filled with zeros.
    pub fn zeroed(width: u32, height: u32, pixel_type: PixelType) -> Self {
        Self {
            width,
            height,
            pixel_type,
            data: BytesMut::zeroed(byte_len(width, height, pixel_type)).freeze(),
        }
    }

    pub(crate) fn from_parts(width: u32, height: u32, pixel_type: PixelType, data: Bytes) -> Self {
        debug_assert_eq!(data.len(), byte_len(width, height, pixel_type));
        Self {
            width,
            height,
            pixel_type,
            data,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixel_type(&self) -> PixelType {
        self.pixel_type
    }

    pub fn data(&self) -> &Bytes {
        &self.data
    }

    pub fn into_data(self) -> Bytes {
        self.data
    }

    /// Row stride in bytes.
    #[inline]
    pub fn row_bytes(&self) -> usize {
        self.width as usize * self.pixel_type.bytes_per_pixel()
    }

    /// Sample value at (x, y), widened to `u16`.
    ///
    /// # Panics
    ///
    /// Panics if the coordinates are outside the buffer.
    pub fn sample(&self, x: u32, y: u32) -> u16 {
        assert!(x < self.width && y < self.height, "pixel ({x}, {y}) out of bounds");
        let bpp = self.pixel_type.bytes_per_pixel();
        let offset = (y as usize * self.width as usize + x as usize) * bpp;
        match self.pixel_type {
            PixelType::Gray8 => self.data[offset] as u16,
            PixelType::Gray16 => u16::from_le_bytes([self.data[offset], self.data[offset + 1]]),
        }
    }

    /// Copy out the sub-rectangle starting at (x, y).
    ///
    /// The rectangle is clipped to the buffer bounds.
    pub fn crop(&self, x: u32, y: u32, width: u32, height: u32) -> PixelBuffer {
        let x = x.min(self.width);
        let y = y.min(self.height);
        let width = width.min(self.width - x);
        let height = height.min(self.height - y);

        let bpp = self.pixel_type.bytes_per_pixel();
        let src_stride = self.row_bytes();
        let dst_stride = width as usize * bpp;
        let mut out = BytesMut::with_capacity(dst_stride * height as usize);
        for row in y..y + height {
            let start = row as usize * src_stride + x as usize * bpp;
            out.extend_from_slice(&self.data[start..start + dst_stride]);
        }
        PixelBuffer::from_parts(width, height, self.pixel_type, out.freeze())
    }

    /// Shrink by an integer factor, averaging each `factor x factor` block.
    ///
    /// Output size is `width / factor` by `height / factor`; trailing columns
    /// and rows that do not fill a whole block are dropped.
    pub fn downsample(&self, factor: u32) -> PixelBuffer {
        if factor <= 1 {
            return self.clone();
        }
        let out_width = self.width / factor;
        let out_height = self.height / factor;
        let block = (factor as u64) * (factor as u64);

        let mut out = BytesMut::with_capacity(byte_len(out_width, out_height, self.pixel_type));
        for oy in 0..out_height {
            for ox in 0..out_width {
                let mut sum: u64 = 0;
                for dy in 0..factor {
                    for dx in 0..factor {
                        sum += self.sample(ox * factor + dx, oy * factor + dy) as u64;
                    }
                }
                let mean = (sum / block) as u16;
                match self.pixel_type {
                    PixelType::Gray8 => out.extend_from_slice(&[mean as u8]),
                    PixelType::Gray16 => out.extend_from_slice(&mean.to_le_bytes()),
                }
            }
        }
        PixelBuffer::from_parts(out_width, out_height, self.pixel_type, out.freeze())
    }

    /// Samples as `u8`, keeping the high byte of 16-bit data.
    pub fn to_gray8(&self) -> Vec<u8> {
        match self.pixel_type {
            PixelType::Gray8 => self.data.to_vec(),
            PixelType::Gray16 => self.to_gray16().into_iter().map(|v| (v >> 8) as u8).collect(),
        }
    }

    /// Samples as `u16`.
    pub fn to_gray16(&self) -> Vec<u16> {
        match self.pixel_type {
            PixelType::Gray8 => self.data.iter().map(|&v| v as u16).collect(),
            PixelType::Gray16 => self
                .data
                .chunks_exact(2)
                .map(|c| u16::from_le_bytes([c[0], c[1]]))
                .collect(),
        }
    }
}

/// Number of bytes occupied by a width x height image.
#[inline]
pub fn byte_len(width: u32, height: u32, pixel_type: PixelType) -> usize {
    width as usize * height as usize * pixel_type.bytes_per_pixel()
}

// =============================================================================
// Tests
// =============================================================================
