//! Geometry engine: relative outlines to board coordinates
//!
//! All arithmetic is integer. Relative vertices are in half units, so a unit
//! size must be even for absolute vertices to land on whole pixels.

use crate::board::Cell;
use serde::{Deserialize, Serialize};

/// A point in pixel space (x right, y down), or in half units when relative
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Axis-aligned bounding box, inclusive of the extreme vertices
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_x: i32,
    pub max_x: i32,
    pub min_y: i32,
    pub max_y: i32,
}

/// Quarter turn clockwise in screen space
pub fn rotate_quarter(p: Point) -> Point {
    Point::new(-p.y, p.x)
}

/// Place relative half-unit vertices at an origin
pub fn absolute_vertices(unit_size: i32, origin_x: i32, origin_y: i32, relative: &[Point]) -> Vec<Point> {
    let half = unit_size / 2;
    relative
        .iter()
        .map(|p| Point::new(origin_x + p.x * half, origin_y + p.y * half))
        .collect()
}

/// Bounding box of a vertex set. An empty set yields the zero box.
pub fn bounding_box(points: &[Point]) -> BoundingBox {
    let Some(first) = points.first() else {
        return BoundingBox::default();
    };
    points.iter().skip(1).fold(
        BoundingBox {
            min_x: first.x,
            max_x: first.x,
            min_y: first.y,
            max_y: first.y,
        },
        |b, p| BoundingBox {
            min_x: b.min_x.min(p.x),
            max_x: b.max_x.max(p.x),
            min_y: b.min_y.min(p.y),
            max_y: b.max_y.max(p.y),
        },
    )
}

/// Even-odd test of a point against a closed polygon.
/// Cell centres never sit on an outline edge, so ties cannot occur.
fn contains(polygon: &[Point], px: i32, py: i32) -> bool {
    let mut inside = false;
    let n = polygon.len();
    for i in 0..n {
        let a = polygon[i];
        let b = polygon[(i + 1) % n];
        if (a.y > py) == (b.y > py) {
            continue;
        }
        let dy = i64::from(b.y - a.y);
        let lhs = i64::from(px - a.x) * dy;
        let rhs = i64::from(py - a.y) * i64::from(b.x - a.x);
        if (dy > 0 && lhs < rhs) || (dy < 0 && lhs > rhs) {
            inside = !inside;
        }
    }
    inside
}

/// Grid cells whose centre lies inside the outline
pub fn covered_cells(unit_size: i32, outline: &[Point]) -> Vec<Cell> {
    if outline.is_empty() || unit_size <= 0 {
        return Vec::new();
    }
    let bbox = bounding_box(outline);
    let first_col = bbox.min_x.div_euclid(unit_size);
    let last_col = (bbox.max_x + unit_size - 1).div_euclid(unit_size);
    let first_row = bbox.min_y.div_euclid(unit_size);
    let last_row = (bbox.max_y + unit_size - 1).div_euclid(unit_size);
    let half = unit_size / 2;

    let mut cells = Vec::with_capacity(4);
    for row in first_row..last_row {
        for col in first_col..last_col {
            if contains(outline, col * unit_size + half, row * unit_size + half) {
                cells.push(Cell::new(col, row));
            }
        }
    }
    cells
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tetromino::{RotationStage, ShapeKind};

    #[test]
    fn test_absolute_vertices_scale_by_half_unit() {
        let rel = [Point::new(-2, -2), Point::new(2, 2)];
        let abs = absolute_vertices(30, 150, 30, &rel);
        assert_eq!(abs, vec![Point::new(120, 0), Point::new(180, 60)]);
    }

    #[test]
    fn test_bounding_box_is_idempotent() {
        let points = absolute_vertices(30, 165, 45, &ShapeKind::T.vertices(RotationStage::new(0)));
        let first = bounding_box(&points);
        let second = bounding_box(&points);
        assert_eq!(first, second);
        assert_eq!(first, BoundingBox { min_x: 120, max_x: 210, min_y: 0, max_y: 60 });
    }

    #[test]
    fn test_empty_bounding_box() {
        assert_eq!(bounding_box(&[]), BoundingBox::default());
    }

    #[test]
    fn test_every_pose_covers_four_cells() {
        for kind in ShapeKind::all() {
            for stage in 0..4 {
                let origin_x = if kind.spawns_on_center() { 150 } else { 165 };
                let abs = absolute_vertices(30, origin_x, 90, &kind.vertices(RotationStage::new(stage)));
                assert_eq!(covered_cells(30, &abs).len(), 4, "{:?} stage {}", kind, stage);
            }
        }
    }

    #[test]
    fn test_t_cells_at_spawn() {
        let abs = absolute_vertices(30, 165, 45, &ShapeKind::T.vertices(RotationStage::new(0)));
        let mut cells = covered_cells(30, &abs);
        cells.sort();
        assert_eq!(
            cells,
            vec![Cell::new(5, 0), Cell::new(4, 1), Cell::new(5, 1), Cell::new(6, 1)]
        );
    }

    #[test]
    fn test_vertical_i_piece() {
        let abs = absolute_vertices(30, 150, 120, &ShapeKind::I.vertices(RotationStage::new(1)));
        let mut cells = covered_cells(30, &abs);
        cells.sort();
        assert_eq!(
            cells,
            vec![Cell::new(4, 2), Cell::new(4, 3), Cell::new(4, 4), Cell::new(4, 5)]
        );
    }
}
