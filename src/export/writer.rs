//! Derived-format writers fed by the export worker.
//!
//! The [`FrameWriter`] trait is the seam to whatever secondary format a
//! recording is mirrored into. [`JpegSequenceWriter`] is the bundled
//! implementation: one 8-bit JPEG per frame plus a JSON manifest.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use image::codecs::jpeg::JpegEncoder;
use image::GrayImage;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::ExportError;
use crate::tile::PixelBuffer;

/// Default JPEG quality for exported frames.
pub const DEFAULT_JPEG_QUALITY: u8 = 85;

/// Minimum valid JPEG quality.
pub const MIN_JPEG_QUALITY: u8 = 1;

/// Maximum valid JPEG quality.
pub const MAX_JPEG_QUALITY: u8 = 100;

const MANIFEST_FILE: &str = "manifest.json";

/// Secondary writer receiving completed mosaic frames, one at a time.
///
/// Called only from the export worker thread.
pub trait FrameWriter: Send {
    /// Append one frame.
    fn append_frame(
        &mut self,
        pixels: &PixelBuffer,
        slice: usize,
        channel: usize,
        frame: usize,
        date: &str,
        time: &str,
    ) -> Result<(), ExportError>;

    /// Flush and release the output. Called exactly once by the worker.
    fn close(&mut self) -> Result<(), ExportError>;
}

impl<W: FrameWriter + ?Sized> FrameWriter for Box<W> {
    fn append_frame(
        &mut self,
        pixels: &PixelBuffer,
        slice: usize,
        channel: usize,
        frame: usize,
        date: &str,
        time: &str,
    ) -> Result<(), ExportError> {
        (**self).append_frame(pixels, slice, channel, frame, date, time)
    }

    fn close(&mut self) -> Result<(), ExportError> {
        (**self).close()
    }
}

// =============================================================================
// JPEG Sequence
// =============================================================================

/// One appended frame as listed in `manifest.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub file: String,
    pub channel: usize,
    pub slice: usize,
    pub frame: usize,
    pub date: String,
    pub time: String,
}

/// Contents of `manifest.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub width: u32,
    pub height: u32,
    pub frames: Vec<ManifestEntry>,
}

/// Writes each frame as `c{channel}_z{slice}_t{frame}.jpg` in a directory.
///
/// 16-bit frames are reduced to 8 bits by keeping the high byte.
pub struct JpegSequenceWriter {
    dir: PathBuf,
    width: u32,
    height: u32,
    quality: u8,
    entries: Vec<ManifestEntry>,
    closed: bool,
}

impl JpegSequenceWriter {
    /// Create the output directory for frames of `width x height` pixels.
    ///
    /// Quality is clamped to 1-100.
    pub fn open(
        dir: impl Into<PathBuf>,
        width: u32,
        height: u32,
        quality: u8,
    ) -> Result<Self, ExportError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        info!(dir = %dir.display(), width, height, "opened JPEG sequence writer");

        Ok(Self {
            dir,
            width,
            height,
            quality: quality.clamp(MIN_JPEG_QUALITY, MAX_JPEG_QUALITY),
            entries: Vec::new(),
            closed: false,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn quality(&self) -> u8 {
        self.quality
    }

    /// Number of frames appended so far.
    pub fn frame_count(&self) -> usize {
        self.entries.len()
    }

    /// Read the manifest written by [`close`](FrameWriter::close).
    pub fn read_manifest(dir: &Path) -> Result<Manifest, ExportError> {
        let raw = fs::read(dir.join(MANIFEST_FILE))?;
        serde_json::from_slice(&raw).map_err(|e| ExportError::Writer(e.to_string()))
    }
}

impl FrameWriter for JpegSequenceWriter {
    fn append_frame(
        &mut self,
        pixels: &PixelBuffer,
        slice: usize,
        channel: usize,
        frame: usize,
        date: &str,
        time: &str,
    ) -> Result<(), ExportError> {
        if self.closed {
            return Err(ExportError::Writer("writer is closed".to_string()));
        }
        if pixels.width() != self.width || pixels.height() != self.height {
            return Err(ExportError::Writer(format!(
                "frame is {}x{}, writer expects {}x{}",
                pixels.width(),
                pixels.height(),
                self.width,
                self.height
            )));
        }

        let img = GrayImage::from_raw(self.width, self.height, pixels.to_gray8())
            .ok_or_else(|| ExportError::Writer("pixel buffer size mismatch".to_string()))?;

        let file = format!("c{channel}_z{slice}_t{frame}.jpg");
        let mut out = BufWriter::new(File::create(self.dir.join(&file))?);
        JpegEncoder::new_with_quality(&mut out, self.quality)
            .encode_image(&img)
            .map_err(|e| ExportError::Writer(e.to_string()))?;
        out.flush()?;

        debug!(file = %file, time, "wrote export frame");
        self.entries.push(ManifestEntry {
            file,
            channel,
            slice,
            frame,
            date: date.to_string(),
            time: time.to_string(),
        });
        Ok(())
    }

    fn close(&mut self) -> Result<(), ExportError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        let manifest = Manifest {
            width: self.width,
            height: self.height,
            frames: std::mem::take(&mut self.entries),
        };
        let json =
            serde_json::to_vec_pretty(&manifest).map_err(|e| ExportError::Writer(e.to_string()))?;
        fs::write(self.dir.join(MANIFEST_FILE), json)?;

        info!(
            dir = %self.dir.display(),
            frames = manifest.frames.len(),
            "closed JPEG sequence writer"
        );
        Ok(())
    }
}
