//! Smoothing filters applied to frames before export.

use std::fmt;
use std::str::FromStr;

use bytes::Bytes;
use image::{ImageBuffer, Luma};

use crate::error::ExportError;
use crate::tile::{PixelBuffer, PixelType};

/// Optional smoothing step of the export worker.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub enum FrameFilter {
    /// Frames are written unchanged
    #[default]
    None,

    /// 3x3 box mean, edges clamped
    Mean3x3,

    /// Gaussian blur with the given standard deviation in pixels
    Gaussian { sigma: f32 },
}

impl FrameFilter {
    /// Smooth a frame. The output has the same size and pixel type.
    pub fn apply(&self, frame: &PixelBuffer) -> Result<PixelBuffer, ExportError> {
        match *self {
            FrameFilter::None => Ok(frame.clone()),
            FrameFilter::Mean3x3 => Ok(mean3x3(frame)),
            FrameFilter::Gaussian { sigma } => gaussian(frame, sigma),
        }
    }
}

fn mean3x3(frame: &PixelBuffer) -> PixelBuffer {
    let width = frame.width();
    let height = frame.height();
    if width == 0 || height == 0 {
        return frame.clone();
    }

    let samples = frame.to_gray16();
    let at = |x: i64, y: i64| {
        let x = x.clamp(0, width as i64 - 1) as usize;
        let y = y.clamp(0, height as i64 - 1) as usize;
        samples[y * width as usize + x] as u32
    };

    let mut out = Vec::with_capacity(samples.len());
    for y in 0..height as i64 {
        for x in 0..width as i64 {
            let mut sum = 0u32;
            for dy in -1..=1 {
                for dx in -1..=1 {
                    sum += at(x + dx, y + dy);
                }
            }
            out.push(((sum + 4) / 9) as u16);
        }
    }
    from_samples(width, height, frame.pixel_type(), out)
}

fn gaussian(frame: &PixelBuffer, sigma: f32) -> Result<PixelBuffer, ExportError> {
    if !(sigma.is_finite() && sigma > 0.0) {
        return Err(ExportError::Filter(format!(
            "gaussian sigma must be positive, got {sigma}"
        )));
    }
    let (width, height) = (frame.width(), frame.height());
    let size_error =
        || ExportError::Filter(format!("buffer does not hold {width}x{height} pixels"));

    match frame.pixel_type() {
        PixelType::Gray8 => {
            let img: ImageBuffer<Luma<u8>, Vec<u8>> =
                ImageBuffer::from_raw(width, height, frame.data().to_vec()).ok_or_else(size_error)?;
            let blurred = image::imageops::blur(&img, sigma);
            Ok(PixelBuffer::from_parts(
                width,
                height,
                PixelType::Gray8,
                Bytes::from(blurred.into_raw()),
            ))
        }
        PixelType::Gray16 => {
            let img: ImageBuffer<Luma<u16>, Vec<u16>> =
                ImageBuffer::from_raw(width, height, frame.to_gray16()).ok_or_else(size_error)?;
            let blurred = image::imageops::blur(&img, sigma);
            Ok(from_samples(width, height, PixelType::Gray16, blurred.into_raw()))
        }
    }
}

fn from_samples(width: u32, height: u32, pixel_type: PixelType, samples: Vec<u16>) -> PixelBuffer {
    let data: Vec<u8> = match pixel_type {
        PixelType::Gray8 => samples.into_iter().map(|v| v as u8).collect(),
        PixelType::Gray16 => samples.into_iter().flat_map(u16::to_le_bytes).collect(),
    };
    PixelBuffer::from_parts(width, height, pixel_type, Bytes::from(data))
}

impl fmt::Display for FrameFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameFilter::None => f.write_str("none"),
            FrameFilter::Mean3x3 => f.write_str("mean"),
            FrameFilter::Gaussian { sigma } => write!(f, "gaussian:{sigma}"),
        }
    }
}

/// Parses `none`, `mean` or `gaussian:<sigma>`.
impl FromStr for FrameFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" | "" => Ok(FrameFilter::None),
            "mean" | "mean3x3" => Ok(FrameFilter::Mean3x3),
            other => {
                let sigma = other.strip_prefix("gaussian:").ok_or_else(|| {
                    format!("unknown filter '{s}' (expected none, mean or gaussian:<sigma>)")
                })?;
                let sigma: f32 = sigma
                    .parse()
                    .map_err(|_| format!("invalid gaussian sigma '{sigma}'"))?;
                if !(sigma.is_finite() && sigma > 0.0) {
                    return Err(format!("gaussian sigma must be positive, got {sigma}"));
                }
                Ok(FrameFilter::Gaussian { sigma })
            }
        }
    }
}
