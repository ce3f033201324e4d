//! Active falling shape and the move processor

use crate::board::{Cell, Rubble};
use crate::collision;
use crate::geometry::{absolute_vertices, bounding_box, covered_cells, BoundingBox, Point};
use crate::tetromino::{RotationStage, ShapeKind};

/// A shape pose with its derived geometry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shape {
    pub kind: ShapeKind,
    pub unit_size: i32,
    /// Pivot position in pixels
    pub x: i32,
    pub y: i32,
    pub stage: RotationStage,
    pub relative_vertices: Vec<Point>,
    pub absolute_vertices: Vec<Point>,
    pub bounding_box: BoundingBox,
    /// Grid cells covered by this pose
    pub cells: Vec<Cell>,
}

impl Shape {
    /// Build a pose and compute its geometry
    pub fn at(kind: ShapeKind, unit_size: i32, x: i32, y: i32, stage: RotationStage) -> Self {
        let relative_vertices = kind.vertices(stage);
        let absolute_vertices = absolute_vertices(unit_size, x, y, &relative_vertices);
        let bounding_box = bounding_box(&absolute_vertices);
        let cells = covered_cells(unit_size, &absolute_vertices);
        Self {
            kind,
            unit_size,
            x,
            y,
            stage,
            relative_vertices,
            absolute_vertices,
            bounding_box,
            cells,
        }
    }

    /// Spawn pose: horizontally centred, top edge on row 0, stage 0
    pub fn spawn(kind: ShapeKind, unit_size: i32, board_width: i32) -> Self {
        let x = if kind.spawns_on_center() {
            board_width / 2
        } else {
            board_width / 2 + unit_size / 2
        };
        let probe = absolute_vertices(unit_size, x, 0, &kind.vertices(RotationStage::default()));
        let y = -bounding_box(&probe).min_y;
        Self::at(kind, unit_size, x, y, RotationStage::default())
    }

    /// Same shape moved by whole units
    pub fn translated(&self, dx_units: i32, dy_units: i32) -> Self {
        Self::at(
            self.kind,
            self.unit_size,
            self.x + dx_units * self.unit_size,
            self.y + dy_units * self.unit_size,
            self.stage,
        )
    }

    /// Same shape one quarter turn clockwise about its pivot
    pub fn rotated(&self) -> Self {
        Self::at(self.kind, self.unit_size, self.x, self.y, self.stage.cw())
    }
}

/// A single player input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Move {
    Left,
    Right,
    Rotate,
    SoftDrop,
    HardDrop,
}

/// The one candidate pose an input produces.
/// Hard drop resolves to the lowest legal pose, which may be the current one.
pub fn candidate(shape: &Shape, mv: Move, rubble: &Rubble) -> Shape {
    match mv {
        Move::Left => shape.translated(-1, 0),
        Move::Right => shape.translated(1, 0),
        Move::Rotate => shape.rotated(),
        Move::SoftDrop => shape.translated(0, 1),
        Move::HardDrop => hard_drop_candidate(shape, rubble),
    }
}

/// Lowest pose reachable by falling straight down
pub fn hard_drop_candidate(shape: &Shape, rubble: &Rubble) -> Shape {
    let mut landed = shape.clone();
    loop {
        let next = landed.translated(0, 1);
        if collision::test(&next, rubble).blocked() {
            return landed;
        }
        landed = next;
    }
}
