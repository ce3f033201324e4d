//! Core board state and the tick/move pipeline
//!
//! Every mutation goes through `Game`: scheduler firings, player moves and
//! floor raises. A candidate pose is produced, tested for collision, and then
//! either committed or, for a blocked downward step, locked into the rubble.

use crate::bag::Bag;
use crate::board::Rubble;
use crate::collision::{self, Blocker, Bounds};
use crate::mode::PlayMode;
use crate::piece::{self, Move, Shape};
use crate::scheduler::{TickScheduler, TickToken};
use crate::score::{interval_for_level, Progress};
use crate::settings::{BoardSettings, TimingSettings};
use crate::tetromino::ShapeKind;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Board lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameState {
    /// Reset, waiting for a start
    Ready,
    Playing,
    Paused,
    GameOver,
}

/// Something observable that happened during one event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GameEvent {
    Spawned(ShapeKind),
    Moved,
    /// A move was rejected; the shape is unchanged
    Rejected(Blocker),
    Locked,
    LinesCleared { count: u32, total: u32 },
    LevelUp(u32),
    FloorRaised(u32),
    /// A floor raise would have overlapped the active shape
    RaiseRejected(Blocker),
    ToppedOut,
}

/// The main game struct
pub struct Game {
    pub mode: PlayMode,
    pub board: BoardSettings,
    timing: TimingSettings,
    /// Current falling shape, none between lock and spawn
    pub active: Option<Shape>,
    /// Kind that will spawn next
    pub next_kind: Option<ShapeKind>,
    pub rubble: Rubble,
    pub progress: Progress,
    pub state: GameState,
    scheduler: TickScheduler,
    bag: Bag,
    /// Soft drop is ignored until the next firing after a spawn
    spawn_guard: bool,
}

impl Game {
    /// Create a game with a seeded bag
    pub fn with_seed(mode: PlayMode, board: &BoardSettings, timing: &TimingSettings, seed: u64) -> Self {
        Self {
            mode,
            board: board.clone(),
            timing: timing.clone(),
            active: None,
            next_kind: None,
            rubble: Rubble::new(board.columns, board.rows),
            progress: Progress::new(),
            state: GameState::Ready,
            scheduler: TickScheduler::new(interval_for_level(1, timing)),
            bag: Bag::with_seed(seed),
            spawn_guard: false,
        }
    }

    /// Create a game with a random seed
    pub fn new(mode: PlayMode, board: &BoardSettings, timing: &TimingSettings) -> Self {
        Self::with_seed(mode, board, timing, rand::random())
    }

    pub fn tick_interval(&self) -> Duration {
        self.scheduler.interval()
    }

    pub fn is_ticking(&self) -> bool {
        self.scheduler.is_running()
    }

    /// Start play with a fresh shape
    pub fn start(&mut self, now: Instant) -> Vec<GameEvent> {
        let mut events = Vec::new();
        if self.state != GameState::Ready {
            return events;
        }
        info!("Starting {} board, interval {:?}", self.mode.name(), self.scheduler.interval());
        self.state = GameState::Playing;
        self.spawn_next(&mut events);
        if self.state == GameState::Playing {
            self.scheduler.start(now);
        }
        events
    }

    /// Clear the board. Cancels any armed timer, so a firing that was already
    /// queued is dropped when it arrives.
    pub fn reset(&mut self, keep_floor: bool) {
        self.scheduler.cancel();
        let boundary = if keep_floor {
            self.rubble.boundary_rows()
        } else {
            0
        };
        self.rubble = Rubble::with_boundary(self.board.columns, self.board.rows, boundary);
        self.active = None;
        self.next_kind = None;
        self.progress = Progress::new();
        self.state = GameState::Ready;
        self.spawn_guard = false;
        self.scheduler.set_interval(interval_for_level(1, &self.timing));
        debug!("Board reset (keep_floor={})", keep_floor);
    }

    /// Stop the timer for good and drop the active shape
    pub fn teardown(&mut self) {
        self.scheduler.cancel();
        self.active = None;
        self.state = GameState::GameOver;
    }

    /// Fire the scheduler if a tick is due
    pub fn poll_tick(&mut self, now: Instant) -> Option<TickToken> {
        self.scheduler.poll(now)
    }

    pub fn time_until_tick(&self, now: Instant) -> Option<Duration> {
        self.scheduler.time_until_due(now)
    }

    /// Apply a scheduler firing
    pub fn on_tick(&mut self, token: TickToken, now: Instant) -> Vec<GameEvent> {
        let mut events = Vec::new();
        if !self.scheduler.is_current(token) {
            debug!("Dropping stale tick");
            return events;
        }
        if self.state == GameState::Paused {
            self.scheduler.cancel();
            return events;
        }
        if self.state != GameState::Playing {
            return events;
        }
        self.spawn_guard = false;
        self.step_down(now, &mut events);
        events
    }

    /// Apply one player input
    pub fn apply_move(&mut self, mv: Move, now: Instant) -> Vec<GameEvent> {
        let mut events = Vec::new();
        if self.state != GameState::Playing {
            return events;
        }
        let Some(shape) = &self.active else {
            return events;
        };

        match mv {
            Move::SoftDrop => {
                if self.spawn_guard {
                    debug!("Soft drop ignored on fresh spawn");
                    return events;
                }
                self.step_down(now, &mut events);
                if self.state == GameState::Playing {
                    self.scheduler.start(now);
                }
            }
            Move::HardDrop => {
                let landed = piece::candidate(shape, Move::HardDrop, &self.rubble);
                self.active = Some(landed);
                self.lock_active(now, &mut events);
            }
            Move::Left | Move::Right | Move::Rotate => {
                let candidate = piece::candidate(shape, mv, &self.rubble);
                let collision = collision::test(&candidate, &self.rubble);
                match collision.reason() {
                    Some(blocker) => {
                        debug!("{:?} rejected by {:?}", mv, blocker);
                        events.push(GameEvent::Rejected(blocker));
                    }
                    None => {
                        self.active = Some(candidate);
                        self.spawn_guard = false;
                        events.push(GameEvent::Moved);
                    }
                }
            }
        }
        events
    }

    pub fn pause(&mut self) {
        if self.state == GameState::Playing {
            self.state = GameState::Paused;
            self.scheduler.cancel();
        }
    }

    /// Resume without spawning a new shape
    pub fn resume(&mut self, now: Instant) {
        if self.state == GameState::Paused {
            self.state = GameState::Playing;
            self.scheduler.start(now);
        }
    }

    pub fn toggle_pause(&mut self, now: Instant) {
        match self.state {
            GameState::Playing => self.pause(),
            GameState::Paused => self.resume(now),
            _ => {}
        }
    }

    /// Raise the floor by `rows`. Rejected without any change if the raised
    /// boundary or the shifted rubble would overlap the active shape.
    pub fn raise_floor(&mut self, rows: u32) -> Vec<GameEvent> {
        let mut events = Vec::new();
        if rows == 0 || self.state == GameState::GameOver {
            return events;
        }
        let raised = self.rubble.raised(rows);
        if let Some(shape) = &self.active {
            let forecast = collision::test_cells(&shape.cells, &raised, Bounds::of(&raised));
            if let Some(blocker) = forecast.reason() {
                warn!("Unable to raise floor by {}: {:?}", rows, blocker);
                events.push(GameEvent::RaiseRejected(blocker));
                return events;
            }
        }
        self.rubble = raised;
        info!("Floor raised by {} to {} rows", rows, self.rubble.boundary_rows());
        events.push(GameEvent::FloorRaised(rows));
        if self.rubble.is_topped_out() {
            self.top_out(&mut events);
        }
        events
    }

    /// One unit down, or lock when blocked
    fn step_down(&mut self, now: Instant, events: &mut Vec<GameEvent>) {
        let Some(shape) = &self.active else {
            return;
        };
        let forecast = shape.translated(0, 1);
        if collision::test(&forecast, &self.rubble).blocked() {
            self.lock_active(now, events);
        } else {
            self.active = Some(forecast);
            events.push(GameEvent::Moved);
        }
    }

    /// Lock the active shape, clear lines and spawn the next one
    fn lock_active(&mut self, now: Instant, events: &mut Vec<GameEvent>) {
        let Some(shape) = self.active.take() else {
            return;
        };
        self.rubble.lock(&shape.cells, shape.kind);
        events.push(GameEvent::Locked);

        let cleared = self.rubble.evaluate_clears();
        if cleared > 0 {
            let leveled = self.progress.add_lines(cleared);
            events.push(GameEvent::LinesCleared {
                count: cleared,
                total: self.progress.lines,
            });
            if leveled {
                events.push(GameEvent::LevelUp(self.progress.level));
                if self.mode.speeds_up() {
                    let interval = interval_for_level(self.progress.level, &self.timing);
                    info!("Level {} - interval now {:?}", self.progress.level, interval);
                    self.scheduler.restart(interval, now);
                }
            }
        }

        if self.rubble.is_topped_out() {
            self.top_out(events);
            return;
        }
        self.spawn_next(events);
    }

    /// Spawn the queued kind. The very first shape of a game is not guarded.
    fn spawn_next(&mut self, events: &mut Vec<GameEvent>) {
        let guard = self.next_kind.is_some();
        let kind = self.next_kind.take().unwrap_or_else(|| self.bag.next());
        self.next_kind = Some(self.bag.next());

        let shape = Shape::spawn(kind, self.board.unit_size, self.board.width_px());
        if collision::test(&shape, &self.rubble).blocked() {
            self.top_out(events);
            return;
        }
        self.active = Some(shape);
        self.spawn_guard = guard;
        events.push(GameEvent::Spawned(kind));
    }

    fn top_out(&mut self, events: &mut Vec<GameEvent>) {
        info!("Topped out with {} lines at level {}", self.progress.lines, self.progress.level);
        self.state = GameState::GameOver;
        self.active = None;
        self.scheduler.cancel();
        events.push(GameEvent::ToppedOut);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::Cell;

    fn game(mode: PlayMode) -> Game {
        Game::with_seed(mode, &BoardSettings::default(), &TimingSettings::default(), 99)
    }

    fn started(mode: PlayMode, now: Instant) -> Game {
        let mut game = game(mode);
        game.start(now);
        game
    }

    /// Fill a row except for the given columns
    fn fill_row(game: &mut Game, row: i32, gaps: &[i32]) {
        for col in 0..game.board.columns {
            if !gaps.contains(&col) {
                game.rubble.insert(Cell::new(col, row), ShapeKind::Z);
            }
        }
    }

    #[test]
    fn test_tick_moves_down_one_unit() {
        let now = Instant::now();
        let mut game = started(PlayMode::Single, now);
        assert_eq!(game.tick_interval(), Duration::from_millis(1000));
        assert_eq!(game.progress.level, 1);
        let y = game.active.as_ref().unwrap().y;

        let token = game.poll_tick(now + Duration::from_millis(1000)).unwrap();
        let events = game.on_tick(token, now + Duration::from_millis(1000));
        assert_eq!(events, vec![GameEvent::Moved]);
        assert_eq!(game.active.as_ref().unwrap().y, y + 30);
    }

    #[test]
    fn test_first_spawn_has_next_preview() {
        let game = started(PlayMode::Single, Instant::now());
        assert!(game.active.is_some());
        assert!(game.next_kind.is_some());
        assert_eq!(game.state, GameState::Playing);
    }

    #[test]
    fn test_stale_tick_after_reset_is_dropped() {
        let now = Instant::now();
        let mut game = started(PlayMode::Single, now);
        let token = game.poll_tick(now + Duration::from_secs(1)).unwrap();
        game.reset(false);
        game.start(now);
        let before = game.active.clone();
        assert!(game.on_tick(token, now + Duration::from_secs(1)).is_empty());
        assert_eq!(game.active, before);
    }

    #[test]
    fn test_paused_firing_cancels_timer() {
        let now = Instant::now();
        let mut game = started(PlayMode::Single, now);
        let token = game.poll_tick(now + Duration::from_secs(1)).unwrap();
        game.state = GameState::Paused;
        assert!(game.on_tick(token, now).is_empty());
        assert!(!game.is_ticking());
    }

    #[test]
    fn test_pause_and_resume() {
        let now = Instant::now();
        let mut game = started(PlayMode::Single, now);
        game.toggle_pause(now);
        assert_eq!(game.state, GameState::Paused);
        assert!(!game.is_ticking());
        assert!(game.apply_move(Move::Left, now).is_empty());
        let kind = game.active.as_ref().unwrap().kind;
        game.toggle_pause(now);
        assert_eq!(game.state, GameState::Playing);
        assert!(game.is_ticking());
        assert_eq!(game.active.as_ref().unwrap().kind, kind);
    }

    #[test]
    fn test_hard_drop_locks_and_spawns() {
        let now = Instant::now();
        let mut game = started(PlayMode::Single, now);
        let events = game.apply_move(Move::HardDrop, now);
        assert!(events.contains(&GameEvent::Locked));
        assert!(matches!(events.last(), Some(GameEvent::Spawned(_))));
        assert_eq!(game.rubble.len(), 4);
    }

    #[test]
    fn test_soft_drop_guard_after_spawn() {
        let now = Instant::now();
        let mut game = started(PlayMode::Single, now);
        game.apply_move(Move::HardDrop, now);
        let y = game.active.as_ref().unwrap().y;
        // Freshly spawned (not the first) shape ignores soft drop
        assert!(game.apply_move(Move::SoftDrop, now).is_empty());
        assert_eq!(game.active.as_ref().unwrap().y, y);

        let token = game.poll_tick(now + Duration::from_secs(1)).unwrap();
        game.on_tick(token, now + Duration::from_secs(1));
        let y = game.active.as_ref().unwrap().y;
        assert_eq!(game.apply_move(Move::SoftDrop, now), vec![GameEvent::Moved]);
        assert_eq!(game.active.as_ref().unwrap().y, y + 30);
    }

    #[test]
    fn test_first_shape_allows_soft_drop() {
        let now = Instant::now();
        let mut game = started(PlayMode::Single, now);
        assert_eq!(game.apply_move(Move::SoftDrop, now), vec![GameEvent::Moved]);
    }

    #[test]
    fn test_blocked_rotation_leaves_shape_unchanged() {
        let now = Instant::now();
        let mut game = started(PlayMode::Single, now);
        // Wall in everything around the spawn area except the shape itself
        let cells = game.active.as_ref().unwrap().cells.clone();
        for row in 0..6 {
            for col in 0..game.board.columns {
                let cell = Cell::new(col, row);
                if !cells.contains(&cell) {
                    game.rubble.insert(cell, ShapeKind::J);
                }
            }
        }
        let before = game.active.clone();
        let events = game.apply_move(Move::Rotate, now);
        if game.active.as_ref().unwrap().kind != ShapeKind::O {
            assert_eq!(events, vec![GameEvent::Rejected(Blocker::Rubble)]);
        }
        assert_eq!(game.active.as_ref().unwrap().cells, before.as_ref().unwrap().cells);
    }

    #[test]
    fn test_line_clear_and_level_up_speeds_single() {
        let now = Instant::now();
        let mut game = started(PlayMode::Single, now);
        game.progress.lines = 9;
        let shape = game.active.clone().unwrap();
        let landed = piece::hard_drop_candidate(&shape, &game.rubble);
        let bottom = landed.cells.iter().map(|c| c.row).max().unwrap();
        let gaps: Vec<i32> = landed.cells.iter().filter(|c| c.row == bottom).map(|c| c.col).collect();
        fill_row(&mut game, bottom, &gaps);

        let events = game.apply_move(Move::HardDrop, now);
        assert!(events.contains(&GameEvent::LinesCleared { count: 1, total: 10 }));
        assert!(events.contains(&GameEvent::LevelUp(2)));
        assert_eq!(game.tick_interval(), Duration::from_millis(925));
    }

    #[test]
    fn test_versus_keeps_interval_on_level_up() {
        let now = Instant::now();
        let mut game = started(PlayMode::Versus, now);
        game.progress.lines = 9;
        let shape = game.active.clone().unwrap();
        let landed = piece::hard_drop_candidate(&shape, &game.rubble);
        let bottom = landed.cells.iter().map(|c| c.row).max().unwrap();
        let gaps: Vec<i32> = landed.cells.iter().filter(|c| c.row == bottom).map(|c| c.col).collect();
        fill_row(&mut game, bottom, &gaps);

        let events = game.apply_move(Move::HardDrop, now);
        assert!(events.contains(&GameEvent::LevelUp(2)));
        assert_eq!(game.tick_interval(), Duration::from_millis(1000));
    }

    #[test]
    fn test_floor_raise_rejected_over_active_shape() {
        let now = Instant::now();
        let mut game = started(PlayMode::Versus, now);
        // Drop the shape onto the floor so it sits in the rows a raise would take
        let shape = game.active.clone().unwrap();
        game.active = Some(piece::hard_drop_candidate(&shape, &game.rubble));
        let before = game.rubble.clone();

        let events = game.raise_floor(2);
        assert_eq!(events, vec![GameEvent::RaiseRejected(Blocker::Floor)]);
        assert_eq!(game.rubble, before);
    }

    #[test]
    fn test_floor_raise_accepted_with_room() {
        let now = Instant::now();
        let mut game = started(PlayMode::Versus, now);
        game.rubble.insert(Cell::new(0, 18), ShapeKind::S);
        assert_eq!(game.raise_floor(2), vec![GameEvent::FloorRaised(2)]);
        assert_eq!(game.rubble.boundary_rows(), 3);
        assert!(game.rubble.is_occupied(Cell::new(0, 16)));
    }

    #[test]
    fn test_spawn_blocked_tops_out() {
        let now = Instant::now();
        let mut game = game(PlayMode::Single);
        for row in 0..3 {
            for col in 1..10 {
                game.rubble.insert(Cell::new(col, row), ShapeKind::I);
            }
        }
        let events = game.start(now);
        assert_eq!(events, vec![GameEvent::ToppedOut]);
        assert_eq!(game.state, GameState::GameOver);
        assert!(!game.is_ticking());
        assert!(game.active.is_none());
    }

    #[test]
    fn test_reset_keeps_floor_on_request() {
        let now = Instant::now();
        let mut game = started(PlayMode::Single, now);
        game.active = None;
        game.raise_floor(3);
        game.reset(true);
        assert_eq!(game.rubble.boundary_rows(), 4);
        game.reset(false);
        assert_eq!(game.rubble.boundary_rows(), 1);
        assert_eq!(game.state, GameState::Ready);
        assert!(!game.is_ticking());
    }
}
