//! Rubble store: settled cells, the raised floor and line clearing

use crate::tetromino::ShapeKind;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Rows of solid floor a fresh board starts with
pub const BASELINE_ROWS: u32 = 1;
/// Boundary rows that make up one floor level
pub const ROWS_PER_FLOOR: u32 = 1;

/// A grid cell. Row 0 is the top of the board, rows grow downward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Cell {
    pub row: i32,
    pub col: i32,
}

impl Cell {
    pub const fn new(col: i32, row: i32) -> Self {
        Self { row, col }
    }
}

/// Settled cells plus the floor boundary height
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rubble {
    /// Occupied cells, ordered top-down then left-right
    cells: BTreeMap<Cell, ShapeKind>,
    /// Solid rows along the bottom of the board
    boundary_rows: u32,
    columns: i32,
    rows: i32,
}

impl Rubble {
    /// Create an empty store with the baseline floor
    pub fn new(columns: i32, rows: i32) -> Self {
        Self {
            cells: BTreeMap::new(),
            boundary_rows: BASELINE_ROWS,
            columns,
            rows,
        }
    }

    /// Create an empty store with a given floor height (used when a
    /// single-player reset keeps the floor it had)
    pub fn with_boundary(columns: i32, rows: i32, boundary_rows: u32) -> Self {
        Self {
            boundary_rows: boundary_rows.max(BASELINE_ROWS),
            ..Self::new(columns, rows)
        }
    }

    pub fn columns(&self) -> i32 {
        self.columns
    }

    pub fn rows(&self) -> i32 {
        self.rows
    }

    pub fn boundary_rows(&self) -> u32 {
        self.boundary_rows
    }

    /// First row index that belongs to the floor boundary
    pub fn floor_top(&self) -> i32 {
        self.rows - self.boundary_rows as i32
    }

    pub fn is_occupied(&self, cell: Cell) -> bool {
        self.cells.contains_key(&cell)
    }

    /// Kind that settled into a cell, for drawing
    pub fn kind_at(&self, cell: Cell) -> Option<ShapeKind> {
        self.cells.get(&cell).copied()
    }

    pub fn cells(&self) -> impl Iterator<Item = (Cell, ShapeKind)> + '_ {
        self.cells.iter().map(|(c, k)| (*c, *k))
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Lock a shape's cells into the store
    pub fn lock(&mut self, cells: &[Cell], kind: ShapeKind) {
        for &cell in cells {
            self.cells.insert(cell, kind);
        }
    }

    /// Insert a single cell, used when rebuilding from a snapshot
    pub fn insert(&mut self, cell: Cell, kind: ShapeKind) {
        self.cells.insert(cell, kind);
    }

    /// Remove full rows and compact everything above them.
    /// Returns the number of rows cleared.
    pub fn evaluate_clears(&mut self) -> u32 {
        let full: Vec<i32> = (0..self.floor_top())
            .rev()
            .filter(|&row| self.is_row_full(row))
            .collect();
        if full.is_empty() {
            return 0;
        }

        let old = std::mem::take(&mut self.cells);
        for (cell, kind) in old {
            if full.contains(&cell.row) {
                continue;
            }
            // Shift down by the number of cleared rows beneath this one
            let drop = full.iter().filter(|&&r| r > cell.row).count() as i32;
            self.cells.insert(Cell::new(cell.col, cell.row + drop), kind);
        }
        full.len() as u32
    }

    /// Check if every column of a row is occupied
    fn is_row_full(&self, row: i32) -> bool {
        (0..self.columns).all(|col| self.cells.contains_key(&Cell::new(col, row)))
    }

    /// The store as it would be after raising the floor by `rows`:
    /// every settled cell moves up and solid rows are added at the bottom.
    /// A raise taller than the board fills it.
    pub fn raised(&self, rows: u32) -> Rubble {
        let rows = rows.min(self.rows.max(0) as u32);
        let shift = rows as i32;
        Rubble {
            cells: self
                .cells
                .iter()
                .map(|(c, k)| (Cell::new(c.col, c.row - shift), *k))
                .collect(),
            boundary_rows: self.boundary_rows.saturating_add(rows).min(self.rows.max(0) as u32),
            columns: self.columns,
            rows: self.rows,
        }
    }

    /// Commit a floor raise
    #[cfg(test)]
    pub fn raise_floor(&mut self, rows: u32) {
        *self = self.raised(rows);
    }

    /// Floor levels above the baseline
    pub fn floor_level(&self) -> u32 {
        floor_level(self.boundary_rows)
    }

    /// Any settled cell above the top of the board
    pub fn is_topped_out(&self) -> bool {
        self.cells.keys().next().is_some_and(|c| c.row < 0)
    }
}

/// Floors raised, derived from a boundary height
pub fn floor_level(boundary_rows: u32) -> u32 {
    if boundary_rows > BASELINE_ROWS {
        (boundary_rows - BASELINE_ROWS) / ROWS_PER_FLOOR
    } else {
        0
    }
}
