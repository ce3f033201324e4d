//! Serializable board snapshots and the send-side change detector

use crate::board::{floor_level, Cell, Rubble};
use crate::game::{Game, GameState};
use crate::piece::Shape;
use crate::settings::BoardSettings;
use crate::tetromino::{RotationStage, ShapeKind};
use serde::{Deserialize, Serialize};

/// Rows above the board a falling shape may reach
const SPAWN_HEADROOM_ROWS: i32 = 4;

/// Pose of the falling shape as sent over the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivePose {
    pub kind: ShapeKind,
    pub x: i32,
    pub y: i32,
    pub stage: u8,
}

/// One settled cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotCell {
    pub col: i32,
    pub row: i32,
    pub kind: ShapeKind,
}

/// Everything the peer needs to paint a mirror of this board
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardSnapshot {
    /// Send order, assigned by [`SnapshotThrottle`]
    pub seq: u64,
    pub columns: i32,
    pub rows: i32,
    pub active: Option<ActivePose>,
    pub next_kind: Option<ShapeKind>,
    pub rubble: Vec<SnapshotCell>,
    pub boundary_rows: u32,
    pub lines_cleared: u32,
    pub level: u32,
    pub paused: bool,
    pub game_over: bool,
}

impl BoardSnapshot {
    /// Capture the current board. The sequence number is left at 0.
    pub fn capture(game: &Game) -> Self {
        Self {
            seq: 0,
            columns: game.rubble.columns(),
            rows: game.rubble.rows(),
            active: game.active.as_ref().map(|shape| ActivePose {
                kind: shape.kind,
                x: shape.x,
                y: shape.y,
                stage: shape.stage.index(),
            }),
            next_kind: game.next_kind,
            rubble: game
                .rubble
                .cells()
                .map(|(cell, kind)| SnapshotCell {
                    col: cell.col,
                    row: cell.row,
                    kind,
                })
                .collect(),
            boundary_rows: game.rubble.boundary_rows(),
            lines_cleared: game.progress.lines,
            level: game.progress.level,
            paused: game.state == GameState::Paused,
            game_over: game.state == GameState::GameOver,
        }
    }

    /// Structural equality ignoring the sequence number
    pub fn same_board(&self, other: &BoardSnapshot) -> bool {
        self.columns == other.columns
            && self.rows == other.rows
            && self.active == other.active
            && self.next_kind == other.next_kind
            && self.rubble == other.rubble
            && self.boundary_rows == other.boundary_rows
            && self.lines_cleared == other.lines_cleared
            && self.level == other.level
            && self.paused == other.paused
            && self.game_over == other.game_over
    }

    /// Check that the snapshot describes a board shaped like ours that can
    /// be painted
    pub fn is_well_formed(&self, board: &BoardSettings) -> bool {
        if self.columns != board.columns || self.rows != board.rows {
            return false;
        }
        if self.boundary_rows as i64 > self.rows as i64 {
            return false;
        }
        let headroom = SPAWN_HEADROOM_ROWS * board.unit_size;
        let pose_fits = |pose: &ActivePose| {
            pose.stage <= 3
                && (0..=board.width_px()).contains(&pose.x)
                && (-headroom..=self.rows * board.unit_size).contains(&pose.y)
        };
        if self.active.as_ref().is_some_and(|pose| !pose_fits(pose)) {
            return false;
        }
        // Raises can push settled cells up to a board height above the top
        self.rubble
            .iter()
            .all(|cell| (0..self.columns).contains(&cell.col) && (-self.rows..self.rows).contains(&cell.row))
    }

    /// Rebuild the rubble store
    pub fn to_rubble(&self) -> Rubble {
        let mut rubble = Rubble::with_boundary(self.columns, self.rows, self.boundary_rows);
        for cell in &self.rubble {
            rubble.insert(Cell::new(cell.col, cell.row), cell.kind);
        }
        rubble
    }

    /// Rebuild the falling shape at the given cell size
    pub fn active_shape(&self, unit_size: i32) -> Option<Shape> {
        self.active
            .map(|pose| Shape::at(pose.kind, unit_size, pose.x, pose.y, RotationStage::new(pose.stage)))
    }

    pub fn floor_level(&self) -> u32 {
        floor_level(self.boundary_rows)
    }
}

/// Hands out a snapshot only when the board differs from the last one sent
#[derive(Debug, Clone, Default)]
pub struct SnapshotThrottle {
    last_sent: Option<BoardSnapshot>,
    next_seq: u64,
}

impl SnapshotThrottle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stamp and return the snapshot if it changed, `None` otherwise
    pub fn offer(&mut self, mut snapshot: BoardSnapshot) -> Option<BoardSnapshot> {
        if let Some(last) = &self.last_sent {
            if last.same_board(&snapshot) {
                return None;
            }
        }
        self.next_seq += 1;
        snapshot.seq = self.next_seq;
        self.last_sent = Some(snapshot.clone());
        Some(snapshot)
    }

    /// Forget the last sent board; sequence numbers keep increasing
    pub fn reset(&mut self) {
        self.last_sent = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mode::PlayMode;
    use crate::piece::Move;
    use crate::settings::{BoardSettings, TimingSettings};
    use std::time::Instant;

    fn started_game() -> Game {
        let mut game = Game::with_seed(PlayMode::Versus, &BoardSettings::default(), &TimingSettings::default(), 3);
        game.start(Instant::now());
        game
    }

    #[test]
    fn test_capture_matches_board() {
        let game = started_game();
        let snap = BoardSnapshot::capture(&game);
        let active = game.active.as_ref().unwrap();
        assert_eq!(snap.active.unwrap().kind, active.kind);
        assert_eq!(snap.boundary_rows, 1);
        assert_eq!(snap.to_rubble(), game.rubble);
        assert_eq!(snap.active_shape(30).unwrap().cells, active.cells);
        assert!(snap.is_well_formed(&BoardSettings::default()));
    }

    #[test]
    fn test_throttle_only_sends_changes() {
        let mut game = started_game();
        let mut throttle = SnapshotThrottle::new();
        let first = throttle.offer(BoardSnapshot::capture(&game)).unwrap();
        assert_eq!(first.seq, 1);
        assert!(throttle.offer(BoardSnapshot::capture(&game)).is_none());

        game.apply_move(Move::HardDrop, Instant::now());
        let second = throttle.offer(BoardSnapshot::capture(&game)).unwrap();
        assert_eq!(second.seq, 2);
        assert!(throttle.offer(BoardSnapshot::capture(&game)).is_none());
    }

    #[test]
    fn test_reset_resends_with_higher_seq() {
        let game = started_game();
        let mut throttle = SnapshotThrottle::new();
        throttle.offer(BoardSnapshot::capture(&game));
        throttle.reset();
        let again = throttle.offer(BoardSnapshot::capture(&game)).unwrap();
        assert_eq!(again.seq, 2);
    }

    #[test]
    fn test_malformed_cells_detected() {
        let game = started_game();
        let mut snap = BoardSnapshot::capture(&game);
        snap.rubble.push(SnapshotCell {
            col: 42,
            row: 3,
            kind: ShapeKind::T,
        });
        assert!(!snap.is_well_formed(&BoardSettings::default()));
    }

    #[test]
    fn test_foreign_board_size_rejected() {
        let game = started_game();
        let mut snap = BoardSnapshot::capture(&game);
        snap.rows = i32::MAX;
        assert!(!snap.is_well_formed(&BoardSettings::default()));
        let mut snap = BoardSnapshot::capture(&game);
        snap.columns = 11;
        assert!(!snap.is_well_formed(&BoardSettings::default()));
    }

    #[test]
    fn test_active_pose_off_board_rejected() {
        let game = started_game();
        let board = BoardSettings::default();
        for (x, y) in [(i32::MAX, 30), (-30, 30), (150, i32::MIN), (150, 30 * 21)] {
            let mut snap = BoardSnapshot::capture(&game);
            let pose = snap.active.as_mut().unwrap();
            pose.x = x;
            pose.y = y;
            assert!(!snap.is_well_formed(&board), "pose ({}, {})", x, y);
        }
        let mut snap = BoardSnapshot::capture(&game);
        snap.active.as_mut().unwrap().y = -30;
        assert!(snap.is_well_formed(&board));
    }
}
