use thiserror::Error;

/// Errors produced while reading a typed field out of tile metadata tags
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MetadataError {
    /// Required field is not present in the tags
    #[error("Missing required metadata field: {field}")]
    Missing { field: &'static str },

    /// Field is present but has the wrong type or an unparseable value
    #[error("Malformed metadata field {field}: {message}")]
    Malformed {
        field: &'static str,
        message: String,
    },
}

/// A tile that cannot be stored because its metadata or pixels are inconsistent.
///
/// Raised eagerly at put time so that composition never has to synthesize
/// missing data.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TileError {
    /// Metadata field missing or malformed
    #[error("Malformed tile metadata: {0}")]
    Metadata(#[from] MetadataError),

    /// Pixel buffer length does not match width * height * bytes per pixel
    #[error("Pixel buffer has {actual} bytes, expected {expected}")]
    PixelCount { expected: usize, actual: usize },

    /// Position index is outside the mosaic grid
    #[error("Position {position} is outside the grid ({positions} positions)")]
    PositionOutOfRange { position: usize, positions: usize },

    /// Tile size differs from the size every other tile in the mosaic uses
    #[error("Tile is {width}x{height}, mosaic expects {expected_width}x{expected_height}")]
    DimensionMismatch {
        width: u32,
        height: u32,
        expected_width: u32,
        expected_height: u32,
    },

    /// Tile pixel type differs from the store's pixel type
    #[error("Tile pixel type {actual} does not match store pixel type {expected}")]
    PixelTypeMismatch {
        expected: &'static str,
        actual: &'static str,
    },
}

/// I/O level failures inside a tile store. Fatal for the current operation.
#[derive(Debug, Clone, Error)]
pub enum StorageError {
    /// Filesystem or device error
    #[error("Storage I/O error: {0}")]
    Io(String),

    /// Metadata could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// The store was finished and accepts no more tiles
    #[error("Store is finished and accepts no more tiles")]
    Finished,

    /// The store was closed
    #[error("Store is closed")]
    Closed,
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        StorageError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Serialization(err.to_string())
    }
}

/// Errors returned when writing a tile into a store
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// Underlying storage failed
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// The tile itself is malformed
    #[error(transparent)]
    MalformedTile(#[from] TileError),
}

/// Errors raised while building a grid layout
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GridError {
    /// A grid needs at least one row and one column
    #[error("Grid must have at least one row and one column, got {rows}x{columns}")]
    EmptyGrid { rows: usize, columns: usize },

    /// Position list contains no positions
    #[error("Position list is empty")]
    EmptyPositionList,

    /// Two positions of a position list claim the same grid cell
    #[error("Positions {first} and {second} both occupy grid cell ({row}, {column})")]
    DuplicateCell {
        row: usize,
        column: usize,
        first: usize,
        second: usize,
    },
}

/// Failures on the export path.
///
/// The export worker logs these per frame and drops the frame; they never
/// reach the producer.
#[derive(Debug, Clone, Error)]
pub enum ExportError {
    /// Smoothing filter could not be applied
    #[error("Filter error: {0}")]
    Filter(String),

    /// Derived-format writer failed
    #[error("Writer error: {0}")]
    Writer(String),

    /// Capture time could not be parsed
    #[error("Invalid capture time {value:?}: {message}")]
    Timestamp { value: String, message: String },

    /// Export worker thread could not be started or panicked
    #[error("Export worker error: {0}")]
    Worker(String),
}

impl From<std::io::Error> for ExportError {
    fn from(err: std::io::Error) -> Self {
        ExportError::Writer(err.to_string())
    }
}
