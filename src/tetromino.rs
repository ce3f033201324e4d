//! Shape catalog
//!
//! Every piece is described by the outline polygon of its four cells, in
//! half-unit steps around the rotation pivot. Pieces three cells wide pivot on
//! the centre of a cell; the I and O pieces pivot on a grid corner.

use crate::geometry::{rotate_quarter, Point};
use serde::{Deserialize, Serialize};

/// The 7 piece kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ShapeKind {
    I, // long bar
    O, // square
    T,
    S,
    Z,
    J,
    L,
}

impl ShapeKind {
    /// All kinds, in catalog order
    pub fn all() -> [ShapeKind; 7] {
        [
            ShapeKind::I,
            ShapeKind::O,
            ShapeKind::T,
            ShapeKind::S,
            ShapeKind::Z,
            ShapeKind::J,
            ShapeKind::L,
        ]
    }

    /// Outline at rotation stage 0, clockwise in screen space (y grows down)
    fn outline(&self) -> &'static [(i32, i32)] {
        match self {
            ShapeKind::I => &[(-4, 0), (4, 0), (4, 2), (-4, 2)],
            ShapeKind::O => &[(-2, -2), (2, -2), (2, 2), (-2, 2)],
            // .T.
            // TTT
            ShapeKind::T => &[(-3, -1), (-1, -1), (-1, -3), (1, -3), (1, -1), (3, -1), (3, 1), (-3, 1)],
            // .SS
            // SS.
            ShapeKind::S => &[(-1, -3), (3, -3), (3, -1), (1, -1), (1, 1), (-3, 1), (-3, -1), (-1, -1)],
            // ZZ.
            // .ZZ
            ShapeKind::Z => &[(-3, -3), (1, -3), (1, -1), (3, -1), (3, 1), (-1, 1), (-1, -1), (-3, -1)],
            // J..
            // JJJ
            ShapeKind::J => &[(-3, -3), (-1, -3), (-1, -1), (3, -1), (3, 1), (-3, 1)],
            // ..L
            // LLL
            ShapeKind::L => &[(-3, -1), (1, -1), (1, -3), (3, -3), (3, 1), (-3, 1)],
        }
    }

    /// Relative vertices (half units) for a rotation stage
    pub fn vertices(&self, stage: RotationStage) -> Vec<Point> {
        self.outline()
            .iter()
            .map(|&(x, y)| {
                let mut p = Point::new(x, y);
                for _ in 0..stage.index() {
                    p = rotate_quarter(p);
                }
                p
            })
            .collect()
    }

    /// Whether this piece spawns exactly on the board's horizontal centre.
    /// The others are shifted half a unit right so their pivot sits on a cell centre.
    pub fn spawns_on_center(&self) -> bool {
        matches!(self, ShapeKind::I | ShapeKind::O)
    }

    pub fn name(&self) -> &'static str {
        match self {
            ShapeKind::I => "I",
            ShapeKind::O => "O",
            ShapeKind::T => "T",
            ShapeKind::S => "S",
            ShapeKind::Z => "Z",
            ShapeKind::J => "J",
            ShapeKind::L => "L",
        }
    }
}

/// Quarter-turn rotation stage in `[0, 4)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash, Serialize, Deserialize)]
pub struct RotationStage(u8);

impl RotationStage {
    /// Build a stage, wrapping into `[0, 4)`
    pub fn new(stage: u8) -> Self {
        Self(stage % 4)
    }

    pub fn index(&self) -> u8 {
        self.0
    }

    /// Next stage clockwise: 0 → 1 → 2 → 3 → 0
    pub fn cw(&self) -> RotationStage {
        RotationStage::new(self.0 + 1)
    }
}
