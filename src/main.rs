//! Mosaic Stitch - runs a synthetic multi-position acquisition through the
//! stitching pipeline.
//!
//! Tiles are generated for every (channel, slice, frame, position), written
//! through the export coordinator into a memory or disk store, and the last
//! composed frame can be saved as an overview JPEG.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use chrono::{Duration, Local, NaiveDateTime};
use clap::Parser;
use image::codecs::jpeg::JpegEncoder;
use image::GrayImage;
use thiserror::Error;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mosaic_stitch::{
    config::Config,
    error::{ExportError, GridError, StorageError, StoreError, TileError},
    export::{format_elapsed, ExportOptions, JpegSequenceWriter, LogProgress},
    mosaic::{DualSinkCoordinator, GridLayout, MosaicAssembler},
    store::{DiskTileStore, MemoryTileStore, TileStore},
    tile::{FrameKey, PixelBuffer, PixelType, SummaryMetadata, Tile, TileMetadata},
    viewport::{Render, ViewportWindow},
};

/// Interval between synthetic time points.
const FRAME_INTERVAL_MS: f64 = 1_000.0;

/// Synthetic stage move time between positions.
const POSITION_INTERVAL_MS: f64 = 25.0;

#[derive(Debug, Error)]
enum AppError {
    #[error(transparent)]
    Grid(#[from] GridError),

    #[error(transparent)]
    Tile(#[from] TileError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Export(#[from] ExportError),

    #[error("Failed to write overview {path}: {message}")]
    Overview { path: String, message: String },
}

fn main() -> ExitCode {
    let config = Config::parse();

    init_logging(config.verbose);

    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    info!("Configuration:");
    info!(
        "  Grid: {} rows x {} columns of {}x{} {} tiles",
        config.rows, config.columns, config.tile_width, config.tile_height, config.pixel_type
    );
    info!(
        "  Acquisition: {} channel(s), {} slice(s), {} frame(s)",
        config.channels, config.slices, config.frames
    );
    match &config.storage_dir {
        Some(dir) => info!("  Store: disk at {}", dir.display()),
        None => info!("  Store: memory"),
    }
    match &config.export_dir {
        Some(dir) => info!("  Export: JPEG sequence at {} ({})", dir.display(), config.filter),
        None => info!("  Export: disabled"),
    }

    let store: Arc<dyn TileStore> = match open_store(&config) {
        Ok(store) => store,
        Err(e) => {
            error!("Failed to open tile store: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match run(&config, store) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        "mosaic_stitch=debug"
    } else {
        "mosaic_stitch=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn open_store(config: &Config) -> Result<Arc<dyn TileStore>, StorageError> {
    let summary = SummaryMetadata::new(config.tile_width, config.tile_height, config.pixel_type)
        .with_dimensions(config.channels, config.slices, config.frames)
        .with_positions(config.positions())
        .with_prefix("mosaic");

    Ok(match &config.storage_dir {
        Some(dir) => Arc::new(DiskTileStore::create(dir, summary, config.disk_cache)?),
        None => Arc::new(MemoryTileStore::new(summary)),
    })
}

fn run(config: &Config, store: Arc<dyn TileStore>) -> Result<(), AppError> {
    let layout = GridLayout::new(config.columns, config.rows, config.orientation())?;
    let assembler = MosaicAssembler::new(store, layout);
    let (mosaic_width, mosaic_height) = assembler.mosaic_size();
    info!("  Mosaic: {}x{} pixels", mosaic_width, mosaic_height);

    let coordinator = match &config.export_dir {
        Some(dir) => {
            let writer =
                JpegSequenceWriter::open(dir, mosaic_width, mosaic_height, config.jpeg_quality)?;
            let options = ExportOptions::new(config.filter, config.frame_count());
            DualSinkCoordinator::start_export(assembler, writer, LogProgress, options)?
        }
        None => DualSinkCoordinator::new(assembler),
    };
    let coordinator = Arc::new(coordinator);

    let started = Local::now().naive_local();
    let mut last = None;
    for frame in 0..config.frames {
        for slice in 0..config.slices {
            for channel in 0..config.channels {
                for position in 0..config.positions() {
                    let tile = synthetic_tile(config, started, channel, slice, frame, position)?;
                    coordinator.put(tile)?;
                }
                last = Some(FrameKey::new(channel, slice, frame));
            }
        }
        info!(
            "  Acquired time point {} ({})",
            frame,
            format_elapsed((frame as f64 * FRAME_INTERVAL_MS) as u64)
        );
    }

    coordinator.finish()?;
    if let Some(queue) = coordinator.export_queue() {
        coordinator.wait_for_export()?;
        info!(
            "  Exported {} frame(s), dropped {}",
            queue.frames_written(),
            queue.frames_dropped()
        );
    }

    if let (Some(path), Some(key)) = (&config.overview, last) {
        let window = ViewportWindow::new(Arc::clone(&coordinator), config.display_cap);
        match window.render(key)? {
            Render::Ready(pixels) => {
                write_overview(path, &pixels)?;
                info!(
                    "  Overview {}x{} (factor {}) written to {}",
                    pixels.width(),
                    pixels.height(),
                    window.downsample_factor(),
                    path.display()
                );
            }
            Render::Unavailable => warn!("No tiles available for overview of {:?}", key),
        }
    }

    coordinator.close()?;
    Ok(())
}

/// A tile whose brightness encodes its position, with a diagonal ramp so
/// that orientation is visible in the composed mosaic.
fn synthetic_tile(
    config: &Config,
    started: NaiveDateTime,
    channel: usize,
    slice: usize,
    frame: usize,
    position: usize,
) -> Result<Tile, TileError> {
    let (width, height) = (config.tile_width, config.tile_height);
    let positions = config.positions().max(1) as u64;
    let base = position as u64 * 0xFFFF / positions;
    let span = 0xFFFF / positions;
    let diagonal = (width as u64 + height as u64).max(1);

    let mut pixels =
        Vec::with_capacity(width as usize * height as usize * config.pixel_type.bytes_per_pixel());
    for y in 0..height {
        for x in 0..width {
            let value = (base + span * (x as u64 + y as u64) / diagonal) as u16;
            match config.pixel_type {
                PixelType::Gray8 => pixels.push((value >> 8) as u8),
                PixelType::Gray16 => pixels.extend_from_slice(&value.to_le_bytes()),
            }
        }
    }

    let elapsed_ms = frame as f64 * FRAME_INTERVAL_MS + position as f64 * POSITION_INTERVAL_MS;
    let captured = started + Duration::milliseconds(elapsed_ms as i64);
    let metadata = TileMetadata {
        channel,
        slice,
        frame,
        position,
        width,
        height,
        pixel_type: config.pixel_type,
        time: captured.format("%Y-%m-%d %H:%M:%S%.3f").to_string(),
        elapsed_ms,
        extra: Default::default(),
    };
    Tile::new(metadata, pixels)
}

fn write_overview(path: &Path, pixels: &PixelBuffer) -> Result<(), AppError> {
    let overview_error = |message: String| AppError::Overview {
        path: path.display().to_string(),
        message,
    };

    let img = GrayImage::from_raw(pixels.width(), pixels.height(), pixels.to_gray8())
        .ok_or_else(|| overview_error("pixel buffer size mismatch".to_string()))?;
    let file = File::create(path).map_err(|e| overview_error(e.to_string()))?;
    let mut out = BufWriter::new(file);
    JpegEncoder::new_with_quality(&mut out, 90)
        .encode_image(&img)
        .map_err(|e| overview_error(e.to_string()))?;
    out.flush().map_err(|e| overview_error(e.to_string()))
}
