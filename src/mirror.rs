//! Non-authoritative copy of the opponent's board
//!
//! Snapshots are applied latest-wins. Anything older than what is already
//! shown, or that fails the shape check, is dropped and the mirror is left as
//! it was.

use crate::board::Rubble;
use crate::piece::Shape;
use crate::settings::BoardSettings;
use crate::snapshot::BoardSnapshot;
use tracing::{debug, warn};

/// Outcome of offering a snapshot to the mirror
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MirrorUpdate {
    /// Shown; carries the lines the peer cleared since the previous snapshot
    Applied { lines_delta: u32 },
    /// Sequence or line total went backwards
    Stale,
    /// Wrong board shape, off-board cells, or more lines than a board holds
    Malformed,
}

#[derive(Debug, Clone)]
pub struct OpponentMirror {
    board: BoardSettings,
    latest: Option<BoardSnapshot>,
    rubble: Option<Rubble>,
    active: Option<Shape>,
}

impl OpponentMirror {
    pub fn new(board: &BoardSettings) -> Self {
        Self {
            board: board.clone(),
            latest: None,
            rubble: None,
            active: None,
        }
    }

    pub fn apply(&mut self, snapshot: BoardSnapshot) -> MirrorUpdate {
        if !snapshot.is_well_formed(&self.board) {
            warn!("Discarding malformed snapshot seq={}", snapshot.seq);
            return MirrorUpdate::Malformed;
        }
        let previous_lines = match &self.latest {
            Some(latest) => {
                if snapshot.seq <= latest.seq || snapshot.lines_cleared < latest.lines_cleared {
                    warn!(
                        "Discarding stale snapshot seq={} (showing seq={})",
                        snapshot.seq, latest.seq
                    );
                    return MirrorUpdate::Stale;
                }
                latest.lines_cleared
            }
            None => 0,
        };
        let lines_delta = snapshot.lines_cleared - previous_lines;
        if lines_delta > self.board.rows as u32 {
            warn!("Discarding snapshot seq={} claiming {} new lines", snapshot.seq, lines_delta);
            return MirrorUpdate::Malformed;
        }
        debug!("Mirror now at seq={} lines={}", snapshot.seq, snapshot.lines_cleared);
        self.rubble = Some(snapshot.to_rubble());
        self.active = snapshot.active_shape(self.board.unit_size);
        self.latest = Some(snapshot);
        MirrorUpdate::Applied { lines_delta }
    }

    /// Drop all mirrored state
    pub fn clear(&mut self) {
        self.latest = None;
        self.rubble = None;
        self.active = None;
    }

    pub fn is_empty(&self) -> bool {
        self.latest.is_none()
    }

    pub fn latest(&self) -> Option<&BoardSnapshot> {
        self.latest.as_ref()
    }

    pub fn rubble(&self) -> Option<&Rubble> {
        self.rubble.as_ref()
    }

    pub fn active(&self) -> Option<&Shape> {
        self.active.as_ref()
    }

    pub fn lines_cleared(&self) -> u32 {
        self.latest.as_ref().map_or(0, |s| s.lines_cleared)
    }

    pub fn floor_level(&self) -> u32 {
        self.latest.as_ref().map_or(0, |s| s.floor_level())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::ActivePose;
    use crate::tetromino::ShapeKind;

    fn snapshot(seq: u64, lines: u32) -> BoardSnapshot {
        BoardSnapshot {
            seq,
            columns: 10,
            rows: 20,
            active: None,
            next_kind: None,
            rubble: Vec::new(),
            boundary_rows: 1,
            lines_cleared: lines,
            level: 1,
            paused: false,
            game_over: false,
        }
    }

    #[test]
    fn test_line_delta_between_snapshots() {
        let mut mirror = OpponentMirror::new(&BoardSettings::default());
        assert_eq!(mirror.apply(snapshot(1, 0)), MirrorUpdate::Applied { lines_delta: 0 });
        assert_eq!(mirror.apply(snapshot(2, 2)), MirrorUpdate::Applied { lines_delta: 2 });
        assert_eq!(mirror.apply(snapshot(5, 3)), MirrorUpdate::Applied { lines_delta: 1 });
        assert_eq!(mirror.lines_cleared(), 3);
    }

    #[test]
    fn test_out_of_order_snapshot_dropped() {
        let mut mirror = OpponentMirror::new(&BoardSettings::default());
        mirror.apply(snapshot(3, 2));
        assert_eq!(mirror.apply(snapshot(2, 4)), MirrorUpdate::Stale);
        assert_eq!(mirror.apply(snapshot(3, 4)), MirrorUpdate::Stale);
        assert_eq!(mirror.apply(snapshot(4, 1)), MirrorUpdate::Stale);
        assert_eq!(mirror.latest().unwrap().seq, 3);
    }

    #[test]
    fn test_malformed_snapshot_leaves_mirror() {
        let mut mirror = OpponentMirror::new(&BoardSettings::default());
        mirror.apply(snapshot(1, 0));
        let mut bad = snapshot(2, 0);
        bad.boundary_rows = 99;
        assert_eq!(mirror.apply(bad), MirrorUpdate::Malformed);
        assert_eq!(mirror.latest().unwrap().seq, 1);
    }

    #[test]
    fn test_off_board_pose_is_discarded() {
        let mut mirror = OpponentMirror::new(&BoardSettings::default());
        mirror.apply(snapshot(1, 0));
        let mut bad = snapshot(2, 0);
        bad.active = Some(ActivePose {
            kind: ShapeKind::T,
            x: i32::MAX,
            y: i32::MAX,
            stage: 0,
        });
        assert_eq!(mirror.apply(bad), MirrorUpdate::Malformed);
        assert!(mirror.active().is_none());
        assert_eq!(mirror.latest().unwrap().seq, 1);
    }

    #[test]
    fn test_impossible_line_jump_is_discarded() {
        let mut mirror = OpponentMirror::new(&BoardSettings::default());
        assert_eq!(mirror.apply(snapshot(1, u32::MAX)), MirrorUpdate::Malformed);
        mirror.apply(snapshot(2, 4));
        assert_eq!(mirror.apply(snapshot(3, 4 + 21)), MirrorUpdate::Malformed);
        assert_eq!(mirror.apply(snapshot(4, 4 + 20)), MirrorUpdate::Applied { lines_delta: 20 });
    }

    #[test]
    fn test_clear() {
        let mut mirror = OpponentMirror::new(&BoardSettings::default());
        mirror.apply(snapshot(1, 0));
        mirror.clear();
        assert!(mirror.is_empty());
        assert!(mirror.rubble().is_none());
        assert_eq!(mirror.apply(snapshot(1, 0)), MirrorUpdate::Applied { lines_delta: 0 });
    }
}
