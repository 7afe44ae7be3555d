//! Mapping between stage position indices and mosaic grid cells.
//!
//! Positions are numbered row-major over a `tiles_per_row x tiles_per_column`
//! grid, unless the layout was built from a [`PositionList`], in which case
//! each position sits at the row and column the list assigns to it. The
//! camera's orientation flags are then applied in a fixed order: swap rows
//! and columns, mirror columns, mirror rows.
//!
//! When `swap_xy` is set on a non-square grid the mosaic itself is
//! transposed: it has `tiles_per_row` rows of `tiles_per_column` cells, and
//! the mirror flags act on those transposed extents so that every position
//! still lands on a distinct cell.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::GridError;

/// Camera orientation flags, read once when a mosaic is set up.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Orientation {
    pub mirror_x: bool,
    pub mirror_y: bool,
    pub swap_xy: bool,
}

impl Orientation {
    pub fn new(mirror_x: bool, mirror_y: bool, swap_xy: bool) -> Self {
        Self {
            mirror_x,
            mirror_y,
            swap_xy,
        }
    }
}

// =============================================================================
// Position List
// =============================================================================

/// One stage position with its assigned grid cell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridPosition {
    #[serde(rename = "Label", default)]
    pub label: String,

    #[serde(rename = "GridRowIndex")]
    pub row: usize,

    #[serde(rename = "GridColumnIndex")]
    pub column: usize,
}

/// Ordered list of stage positions, indexed by position index.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PositionList {
    positions: Vec<GridPosition>,
}

impl PositionList {
    pub fn new(positions: Vec<GridPosition>) -> Self {
        Self { positions }
    }

    /// Positions covering a full `rows x columns` grid in row-major order.
    pub fn grid(rows: usize, columns: usize) -> Self {
        let positions = (0..rows)
            .flat_map(|row| {
                (0..columns).map(move |column| GridPosition {
                    label: format!("Pos_{row:03}_{column:03}"),
                    row,
                    column,
                })
            })
            .collect();
        Self { positions }
    }

    /// Parse a JSON array of `{GridRowIndex, GridColumnIndex}` objects.
    pub fn from_json(value: &Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value.clone())
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&GridPosition> {
        self.positions.get(index)
    }

    /// Grid size spanned by the list: `(rows, columns)`, each one past the
    /// largest index used.
    pub fn extent(&self) -> (usize, usize) {
        self.positions.iter().fold((0, 0), |(rows, columns), p| {
            (rows.max(p.row + 1), columns.max(p.column + 1))
        })
    }
}

// =============================================================================
// Grid Layout
// =============================================================================

/// Bijective map between position index and (row, column) cell.
///
/// # Example
///
/// ```
/// use mosaic_stitch::mosaic::{GridLayout, Orientation};
///
/// let layout = GridLayout::new(2, 2, Orientation::new(false, true, false)).unwrap();
/// // Position 3 sits in the bottom right; mirroring Y moves it to the top.
/// assert_eq!(layout.cell(3), (0, 1));
/// assert_eq!(layout.position_at(0, 1), Some(3));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GridLayout {
    tiles_per_row: usize,
    tiles_per_column: usize,
    orientation: Orientation,
    assigned: Option<Assignment>,
}

/// Cells taken from a position list, before orientation.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Assignment {
    /// `(row, column)` per position index
    cells: Vec<(usize, usize)>,
    /// Position index per cell, row-major over the unoriented grid
    occupants: Vec<Option<usize>>,
}

impl GridLayout {
    pub fn new(
        tiles_per_row: usize,
        tiles_per_column: usize,
        orientation: Orientation,
    ) -> Result<Self, GridError> {
        if tiles_per_row == 0 || tiles_per_column == 0 {
            return Err(GridError::EmptyGrid {
                rows: tiles_per_column,
                columns: tiles_per_row,
            });
        }
        Ok(Self {
            tiles_per_row,
            tiles_per_column,
            orientation,
            assigned: None,
        })
    }

    /// Place each position at the cell the list assigns to it.
    ///
    /// The grid spans the list's extent. Cells no position claims stay
    /// empty, and the list's last entry completes a mosaic.
    pub fn from_position_list(
        positions: &PositionList,
        orientation: Orientation,
    ) -> Result<Self, GridError> {
        if positions.is_empty() {
            return Err(GridError::EmptyPositionList);
        }
        let (rows, columns) = positions.extent();
        let mut layout = Self::new(columns, rows, orientation)?;

        let mut occupants = vec![None; rows * columns];
        let mut cells = Vec::with_capacity(positions.len());
        for (index, position) in positions.positions.iter().enumerate() {
            let slot = &mut occupants[position.row * columns + position.column];
            if let Some(first) = *slot {
                return Err(GridError::DuplicateCell {
                    row: position.row,
                    column: position.column,
                    first,
                    second: index,
                });
            }
            *slot = Some(index);
            cells.push((position.row, position.column));
        }

        layout.assigned = Some(Assignment { cells, occupants });
        Ok(layout)
    }

    pub fn tiles_per_row(&self) -> usize {
        self.tiles_per_row
    }

    pub fn tiles_per_column(&self) -> usize {
        self.tiles_per_column
    }

    pub fn orientation(&self) -> Orientation {
        self.orientation
    }

    /// Number of positions in the grid.
    pub fn position_count(&self) -> usize {
        match &self.assigned {
            Some(assigned) => assigned.cells.len(),
            None => self.tiles_per_row * self.tiles_per_column,
        }
    }

    /// Index of the position whose arrival completes a mosaic.
    pub fn last_position(&self) -> usize {
        self.position_count() - 1
    }

    /// Cell rows in the composed mosaic.
    pub fn rows(&self) -> usize {
        if self.orientation.swap_xy {
            self.tiles_per_row
        } else {
            self.tiles_per_column
        }
    }

    /// Cell columns in the composed mosaic.
    pub fn columns(&self) -> usize {
        if self.orientation.swap_xy {
            self.tiles_per_column
        } else {
            self.tiles_per_row
        }
    }

    /// Destination `(row, column)` of a position.
    ///
    /// # Panics
    ///
    /// Panics if `index` is not below [`position_count`](Self::position_count).
    pub fn cell(&self, index: usize) -> (usize, usize) {
        assert!(
            index < self.position_count(),
            "position {index} outside {}x{} grid",
            self.tiles_per_row,
            self.tiles_per_column
        );
        let (mut row, mut col) = match &self.assigned {
            Some(assigned) => assigned.cells[index],
            None => (index / self.tiles_per_row, index % self.tiles_per_row),
        };
        if self.orientation.swap_xy {
            std::mem::swap(&mut row, &mut col);
        }
        if self.orientation.mirror_x {
            col = self.columns() - 1 - col;
        }
        if self.orientation.mirror_y {
            row = self.rows() - 1 - row;
        }
        (row, col)
    }

    /// Position index occupying a cell, or `None` if the cell is outside the
    /// grid or no listed position claims it.
    pub fn position_at(&self, row: usize, col: usize) -> Option<usize> {
        if row >= self.rows() || col >= self.columns() {
            return None;
        }
        let mut row = row;
        let mut col = col;
        if self.orientation.mirror_y {
            row = self.rows() - 1 - row;
        }
        if self.orientation.mirror_x {
            col = self.columns() - 1 - col;
        }
        if self.orientation.swap_xy {
            std::mem::swap(&mut row, &mut col);
        }
        let index = row * self.tiles_per_row + col;
        match &self.assigned {
            Some(assigned) => assigned.occupants[index],
            None => Some(index),
        }
    }

    /// Pixel size of a mosaic built from `tile_width x tile_height` tiles.
    pub fn mosaic_size(&self, tile_width: u32, tile_height: u32) -> (u32, u32) {
        (
            self.columns() as u32 * tile_width,
            self.rows() as u32 * tile_height,
        )
    }
}

// =============================================================================
// Tests
// =============================================================================
