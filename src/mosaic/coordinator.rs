//! Store wrapper that mirrors completed mosaics into the export queue.

use std::collections::HashSet;
use std::sync::Mutex;

use tracing::{debug, info, warn};

use super::assembler::MosaicAssembler;
use super::grid::GridLayout;
use super::MosaicSource;
use crate::error::{ExportError, StorageError, StoreError};
use crate::export::{ExportOptions, ExportQueue, ExportState, FrameWriter, ProgressSink};
use crate::store::TileStore;
use crate::tile::{FrameKey, PixelBuffer, SummaryMetadata, Tile, TileKey};

/// Forwards tiles to a [`MosaicAssembler`] and queues each mosaic for export
/// when the tile at the grid's last position arrives.
///
/// Without an export queue the coordinator is a plain pass-through and its
/// state stays [`ExportState::Inactive`]. Reads never wait on the export path.
pub struct DualSinkCoordinator<S> {
    assembler: MosaicAssembler<S>,
    export: Option<ExportQueue>,
    exported: Mutex<HashSet<FrameKey>>,
}

impl<S: TileStore> DualSinkCoordinator<S> {
    /// Coordinator without secondary export.
    pub fn new(assembler: MosaicAssembler<S>) -> Self {
        Self {
            assembler,
            export: None,
            exported: Mutex::new(HashSet::new()),
        }
    }

    /// Coordinator feeding an already started queue.
    pub fn with_export(assembler: MosaicAssembler<S>, queue: ExportQueue) -> Self {
        Self {
            assembler,
            export: Some(queue),
            exported: Mutex::new(HashSet::new()),
        }
    }

    /// Start an export queue around `writer` and attach it.
    pub fn start_export<W, P>(
        assembler: MosaicAssembler<S>,
        writer: W,
        progress: P,
        options: ExportOptions,
    ) -> Result<Self, ExportError>
    where
        W: FrameWriter + 'static,
        P: ProgressSink + 'static,
    {
        let queue = ExportQueue::start(writer, progress, options)?;
        Ok(Self::with_export(assembler, queue))
    }

    pub fn assembler(&self) -> &MosaicAssembler<S> {
        &self.assembler
    }

    pub fn export_queue(&self) -> Option<&ExportQueue> {
        self.export.as_ref()
    }

    pub fn state(&self) -> ExportState {
        self.export
            .as_ref()
            .map(ExportQueue::state)
            .unwrap_or(ExportState::Inactive)
    }

    /// Composed mosaic for a triple. Pass-through to the assembler.
    pub fn compose(&self, key: FrameKey) -> Result<Option<Tile>, StorageError> {
        self.assembler.compose(key)
    }

    /// Block until the export worker has drained and closed the writer.
    ///
    /// Closes the queue first if it is still active. Returns immediately when
    /// no export is configured.
    pub fn wait_for_export(&self) -> Result<(), ExportError> {
        match &self.export {
            Some(queue) => queue.wait(),
            None => Ok(()),
        }
    }

    /// Queue the mosaic of `key` unless it was queued before.
    ///
    /// A triple counts as exported only once its mosaic is in the queue, so a
    /// failed attempt is retried when the last tile is written again.
    fn export_completed(&self, queue: &ExportQueue, key: FrameKey) -> Result<(), StorageError> {
        let mut exported = self
            .exported
            .lock()
            .map_err(|_| StorageError::Io("exported-frame lock poisoned".to_string()))?;
        if exported.contains(&key) {
            debug!(?key, "mosaic already exported; skipping");
            return Ok(());
        }

        match self.assembler.compose(key)? {
            Some(mosaic) => {
                if queue.enqueue(mosaic) {
                    exported.insert(key);
                } else {
                    warn!(?key, state = ?queue.state(), "completed mosaic not queued for export");
                }
            }
            None => warn!(?key, "completed mosaic has no tiles"),
        }
        Ok(())
    }
}

impl<S: TileStore> TileStore for DualSinkCoordinator<S> {
    fn put(&self, tile: Tile) -> Result<(), StoreError> {
        let key = tile.frame_key();
        let completes = tile.metadata().position == self.assembler.layout().last_position();
        self.assembler.put(tile)?;

        if let Some(queue) = &self.export {
            if completes && queue.state() == ExportState::Active {
                self.export_completed(queue, key)?;
            }
        }
        Ok(())
    }

    fn get(&self, key: TileKey) -> Result<Option<Tile>, StorageError> {
        self.assembler.compose(key.frame_key())
    }

    /// Finish the store and start draining the export queue.
    fn finish(&self) -> Result<(), StorageError> {
        let result = self.assembler.finish();
        if let Some(queue) = &self.export {
            if queue.close() {
                info!(depth = queue.depth(), "acquisition finished; draining export");
            }
        }
        result
    }

    fn is_finished(&self) -> bool {
        self.assembler.is_finished()
    }

    /// Finish if needed, wait for the export worker, then close the store.
    fn close(&self) -> Result<(), StorageError> {
        if !self.is_finished() {
            self.finish()?;
        }
        if let Err(e) = self.wait_for_export() {
            warn!(error = %e, "export worker failed during close");
        }
        self.assembler.close()
    }

    fn summary_metadata(&self) -> SummaryMetadata {
        self.assembler.summary_metadata()
    }

    fn tile_keys(&self) -> Vec<TileKey> {
        self.assembler.tile_keys()
    }
}

impl<S: TileStore> MosaicSource for DualSinkCoordinator<S> {
    fn mosaic_size(&self) -> (u32, u32) {
        self.assembler.mosaic_size()
    }

    fn tile_size(&self) -> (u32, u32) {
        self.assembler.tile_size()
    }

    fn layout(&self) -> &GridLayout {
        self.assembler.layout()
    }

    fn mosaic(&self, key: FrameKey) -> Result<Option<PixelBuffer>, StorageError> {
        MosaicSource::mosaic(&self.assembler, key)
    }

    fn region(
        &self,
        key: FrameKey,
        x: u32,
        y: u32,
        width: u32,
        height: u32,
    ) -> Result<Option<PixelBuffer>, StorageError> {
        self.assembler.get_region(key, x, y, width, height)
    }
}
