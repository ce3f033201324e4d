//! Collision detection against walls, the floor boundary and rubble

use crate::board::{Cell, Rubble};
use crate::piece::Shape;

/// Why a cell is blocked
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Blocker {
    Wall,
    Floor,
    Rubble,
}

/// Legal area of a board
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bounds {
    pub columns: i32,
    /// First row belonging to the floor boundary
    pub floor_top: i32,
}

impl Bounds {
    pub fn of(rubble: &Rubble) -> Self {
        Self {
            columns: rubble.columns(),
            floor_top: rubble.floor_top(),
        }
    }
}

/// Result of testing a candidate pose
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Collision {
    pub blocking: Vec<(Cell, Blocker)>,
}

impl Collision {
    pub fn blocked(&self) -> bool {
        !self.blocking.is_empty()
    }

    /// First blocking reason, for logging
    pub fn reason(&self) -> Option<Blocker> {
        self.blocking.first().map(|(_, b)| *b)
    }
}

/// Classify one cell. Rows above the top are open headroom.
pub fn check_cell(cell: Cell, rubble: &Rubble, bounds: Bounds) -> Option<Blocker> {
    if cell.col < 0 || cell.col >= bounds.columns {
        Some(Blocker::Wall)
    } else if cell.row >= bounds.floor_top {
        Some(Blocker::Floor)
    } else if rubble.is_occupied(cell) {
        Some(Blocker::Rubble)
    } else {
        None
    }
}

/// Test a set of cells against explicit bounds
pub fn test_cells(cells: &[Cell], rubble: &Rubble, bounds: Bounds) -> Collision {
    Collision {
        blocking: cells
            .iter()
            .filter_map(|&c| check_cell(c, rubble, bounds).map(|b| (c, b)))
            .collect(),
    }
}

/// Test a candidate pose against the board it would live on
pub fn test(candidate: &Shape, rubble: &Rubble) -> Collision {
    test_cells(&candidate.cells, rubble, Bounds::of(rubble))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tetromino::ShapeKind;

    #[test]
    fn test_empty_board_never_blocks_inside() {
        let rubble = Rubble::new(10, 20);
        for kind in ShapeKind::all() {
            let shape = Shape::spawn(kind, 30, 300).translated(0, 5);
            assert!(!test(&shape, &rubble).blocked());
        }
    }

    #[test]
    fn test_overlap_with_rubble_is_blocked() {
        let mut rubble = Rubble::new(10, 20);
        let shape = Shape::spawn(ShapeKind::S, 30, 300).translated(0, 3);
        rubble.lock(&shape.cells, ShapeKind::L);
        let result = test(&shape, &rubble);
        assert!(result.blocked());
        assert_eq!(result.blocking.len(), 4);
        assert_eq!(result.reason(), Some(Blocker::Rubble));
    }

    #[test]
    fn test_walls() {
        let rubble = Rubble::new(10, 20);
        let mut shape = Shape::spawn(ShapeKind::I, 30, 300);
        while !test(&shape.translated(-1, 0), &rubble).blocked() {
            shape = shape.translated(-1, 0);
        }
        assert_eq!(shape.cells.iter().map(|c| c.col).min(), Some(0));
        assert_eq!(test(&shape.translated(-1, 0), &rubble).reason(), Some(Blocker::Wall));
    }

    #[test]
    fn test_floor_boundary() {
        let mut rubble = Rubble::new(10, 20);
        rubble.raise_floor(2);
        let cells = [Cell::new(0, 17)];
        assert_eq!(test_cells(&cells, &rubble, Bounds::of(&rubble)).reason(), Some(Blocker::Floor));
        let cells = [Cell::new(0, 16)];
        assert!(!test_cells(&cells, &rubble, Bounds::of(&rubble)).blocked());
    }

    #[test]
    fn test_headroom_above_top_is_open() {
        let rubble = Rubble::new(10, 20);
        let cells = [Cell::new(3, -2)];
        assert!(!test_cells(&cells, &rubble, Bounds::of(&rubble)).blocked());
    }
}
