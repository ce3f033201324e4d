//! Single owner of the local board and the versus session
//!
//! Every mutation arrives as an [`Event`] and is processed to completion
//! before the next one. Timer firings, key presses and relay messages all go
//! through [`Controller::on_event`].

use crate::floor_raise::Difficulty;
use crate::game::{Game, GameEvent, GameState};
use crate::input::Command;
use crate::mode::PlayMode;
use crate::multiplayer::{MultiplayerSession, Phase, SessionEvent};
use crate::protocol::{ClientMessage, ServerMessage};
use crate::results::{ResultSink, SinglePlayerResult};
use crate::scheduler::TickToken;
use crate::settings::Settings;
use crate::snapshot::BoardSnapshot;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Longest the event loop waits when nothing is scheduled
pub const IDLE_WAIT: Duration = Duration::from_millis(16);

/// Startup options
#[derive(Debug, Clone)]
pub struct Config {
    pub settings: Settings,
    pub mode: PlayMode,
    /// Fixed piece seed, random when unset
    pub seed: Option<u64>,
}

/// Inputs to the controller
#[derive(Debug, Clone)]
pub enum Event {
    Tick(TickToken),
    /// Time passed; drives the countdown
    Clock,
    Input(Command),
    Connected,
    Net(ServerMessage),
    Disconnected,
    Teardown,
}

pub struct Controller<S: ResultSink> {
    settings: Settings,
    seed: Option<u64>,
    pub game: Game,
    pub session: MultiplayerSession,
    sink: S,
    selected: usize,
    status: String,
    online: bool,
    running: bool,
}

impl<S: ResultSink> Controller<S> {
    /// Build the controller and start a board in the requested mode
    pub fn init(config: Config, sink: S, now: Instant) -> Self {
        let settings = config.settings;
        let session = MultiplayerSession::new(
            &settings.versus.player_name,
            settings.versus.difficulty,
            settings.timing.countdown_secs,
            &settings.board,
        );
        let game = new_game(&settings, PlayMode::Single, config.seed);
        let mut controller = Self {
            settings,
            seed: config.seed,
            game,
            session,
            sink,
            selected: 0,
            status: String::new(),
            online: false,
            running: true,
        };
        match config.mode {
            PlayMode::Single => controller.start_solo(now),
            PlayMode::Versus => controller.status = "Connecting to relay...".to_string(),
        }
        controller
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn is_online(&self) -> bool {
        self.online
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn selected(&self) -> usize {
        self.selected
    }

    #[cfg(test)]
    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Messages for the relay produced by the last events
    pub fn drain_outgoing(&mut self) -> Vec<ClientMessage> {
        self.session.drain_outbox()
    }

    /// Timer events that are due at `now`
    pub fn due_events(&mut self, now: Instant) -> Vec<Event> {
        let mut events = Vec::new();
        if let Some(token) = self.game.poll_tick(now) {
            events.push(Event::Tick(token));
        }
        if matches!(self.session.phase(), Phase::Accepted { .. }) {
            events.push(Event::Clock);
        }
        events
    }

    /// How long the loop may wait for input before the next timer is due
    pub fn time_until_next(&self, now: Instant) -> Duration {
        [self.game.time_until_tick(now), self.session.time_until_poll(now)]
            .into_iter()
            .flatten()
            .fold(IDLE_WAIT, Duration::min)
    }

    /// Process one event to completion
    pub fn on_event(&mut self, event: Event, now: Instant) {
        match event {
            Event::Tick(token) => {
                let events = self.game.on_tick(token, now);
                self.handle_game_events(events);
            }
            Event::Clock => {
                let events = self.session.poll(now);
                self.handle_session_events(events, now);
            }
            Event::Input(command) => self.handle_command(command, now),
            Event::Connected => {
                info!("Connected to relay");
                self.online = true;
                self.status = "Connected - press S to look for opponents".to_string();
                self.session.hello();
            }
            Event::Net(msg) => {
                let events = self.session.on_message(msg, now);
                self.handle_session_events(events, now);
            }
            Event::Disconnected => {
                self.online = false;
                let events = self.session.transport_lost();
                self.handle_session_events(events, now);
                self.status = "Disconnected from relay".to_string();
            }
            Event::Teardown => self.teardown(),
        }
    }

    /// Stop everything. Timers are cancelled, so late firings are ignored.
    pub fn teardown(&mut self) {
        if !self.running {
            return;
        }
        info!("Tearing down");
        self.game.teardown();
        self.session.unmount();
        self.running = false;
    }

    fn handle_command(&mut self, command: Command, now: Instant) {
        match command {
            Command::Move(mv) => {
                let events = self.game.apply_move(mv, now);
                self.handle_game_events(events);
            }
            Command::Pause => {
                self.game.toggle_pause(now);
                self.publish();
            }
            Command::RaiseFloor => {
                if self.game.mode.allows_manual_raise() {
                    let events = self.game.raise_floor(1);
                    self.handle_game_events(events);
                }
            }
            Command::Search => {
                if self.online {
                    self.session.search();
                    self.status = "Looking for opponents...".to_string();
                }
            }
            Command::NextOpponent => {
                let count = self.session.pool().len();
                if count > 0 {
                    self.selected = (self.selected + 1) % count;
                }
            }
            Command::Invite => {
                let target = self.session.pool().get(self.selected).cloned();
                if let Some(opponent) = target {
                    if self.session.invite(&opponent.id) {
                        self.status = format!("Invited {}", opponent.name);
                    }
                }
            }
            Command::Accept => {
                let events = self.session.accept(now);
                self.handle_session_events(events, now);
            }
            Command::Decline => {
                self.session.decline();
                self.status = "Invitation declined".to_string();
            }
            Command::CycleDifficulty => {
                let next = self.session.difficulty().level() % Difficulty::MAX + 1;
                if let Some(difficulty) = Difficulty::new(next) {
                    self.session.set_difficulty(difficulty);
                    self.settings.versus.difficulty = self.session.difficulty();
                }
            }
            Command::Restart => {
                if self.session.phase() == Phase::GameOver {
                    self.session.acknowledge();
                }
                if !self.session.in_match() && !matches!(self.session.phase(), Phase::Accepted { .. }) {
                    self.start_solo(now);
                }
            }
            Command::Quit => self.teardown(),
        }
    }

    fn start_solo(&mut self, now: Instant) {
        if self.game.mode == PlayMode::Single {
            self.game.reset(false);
        } else {
            self.game = new_game(&self.settings, PlayMode::Single, self.seed);
        }
        self.game.start(now);
        self.status = "Solo".to_string();
    }

    fn publish(&mut self) {
        if self.game.mode == PlayMode::Versus {
            self.session.publish(BoardSnapshot::capture(&self.game));
        }
    }

    fn handle_game_events(&mut self, events: Vec<GameEvent>) {
        if events.is_empty() {
            return;
        }
        self.publish();
        for event in events {
            match event {
                GameEvent::RaiseRejected(blocker) => {
                    self.status = format!("Floor raise blocked by {:?}", blocker);
                }
                GameEvent::LevelUp(level) => self.status = format!("Level {}", level),
                GameEvent::ToppedOut => self.on_topped_out(),
                _ => {}
            }
        }
    }

    fn on_topped_out(&mut self) {
        match self.game.mode {
            PlayMode::Versus => {
                self.session.local_game_over();
                self.status = "Topped out".to_string();
            }
            PlayMode::Single => {
                let result = SinglePlayerResult {
                    participant_id: self.settings.versus.player_name.clone(),
                    lines_cleared: self.game.progress.lines,
                    level_reached: self.game.progress.level,
                };
                self.sink.save_single(&result);
                self.status = format!("Game over - {} lines, press R to restart", result.lines_cleared);
            }
        }
    }

    fn handle_session_events(&mut self, events: Vec<SessionEvent>, now: Instant) {
        for event in events {
            debug!("Session event {:?}", event);
            match event {
                SessionEvent::InviteReceived(from) => {
                    self.status = format!(
                        "{} invites you (difficulty {}) - A to accept, D to decline",
                        from.name,
                        self.session.difficulty().level()
                    );
                }
                SessionEvent::InviteDeclined => self.status = "Invitation declined".to_string(),
                SessionEvent::Countdown(value) => {
                    if self.game.state != GameState::GameOver {
                        self.game.teardown();
                    }
                    self.status = format!("Starting in {}", value);
                }
                SessionEvent::MatchStarted { difficulty } => {
                    info!("Versus match started at difficulty {}", difficulty.level());
                    self.game = new_game(&self.settings, PlayMode::Versus, self.seed);
                    self.game.start(now);
                    self.status = "Versus".to_string();
                    self.session.publish(BoardSnapshot::capture(&self.game));
                }
                SessionEvent::FloorRaise(rows) => {
                    let events = self.game.raise_floor(rows);
                    self.handle_game_events(events);
                }
                SessionEvent::MatchOver(outcome) => {
                    self.game.teardown();
                    if let Some(result) = &outcome.result {
                        self.sink.save_match(result);
                    }
                    self.status = match (outcome.won, outcome.disqualified) {
                        (true, true) => "You won! Opponent disqualified".to_string(),
                        (true, false) => format!("You won! {} floors raised", outcome.floors_raised),
                        (false, _) => format!("You lost! {} floors raised", outcome.floors_raised),
                    };
                }
                SessionEvent::Ended => {
                    if self.game.mode == PlayMode::Versus {
                        self.game.teardown();
                    }
                }
            }
        }
    }
}

fn new_game(settings: &Settings, mode: PlayMode, seed: Option<u64>) -> Game {
    match seed {
        Some(seed) => Game::with_seed(mode, &settings.board, &settings.timing, seed),
        None => Game::new(mode, &settings.board, &settings.timing),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::piece::Move;
    use crate::protocol::{GameOverNotice, OpponentInfo, PlayerId, SessionToken};
    use crate::results::MemorySink;

    fn controller(mode: PlayMode, now: Instant) -> Controller<MemorySink> {
        let config = Config {
            settings: Settings::default(),
            mode,
            seed: Some(11),
        };
        Controller::init(config, MemorySink::default(), now)
    }

    fn peer() -> OpponentInfo {
        OpponentInfo {
            id: PlayerId("peer".into()),
            name: "bob".into(),
        }
    }

    /// Drive a controller to a running versus match
    fn in_match(now: Instant) -> Controller<MemorySink> {
        in_match_at(now, Difficulty::new(1).unwrap())
    }

    fn in_match_at(now: Instant, difficulty: Difficulty) -> Controller<MemorySink> {
        let mut c = controller(PlayMode::Versus, now);
        c.on_event(Event::Connected, now);
        c.on_event(Event::Net(ServerMessage::SocketId { id: PlayerId("me".into()) }), now);
        c.on_event(Event::Input(Command::Search), now);
        c.on_event(
            Event::Net(ServerMessage::InviteReceived {
                from: peer(),
                difficulty,
                session: SessionToken("s".into()),
            }),
            now,
        );
        c.on_event(Event::Input(Command::Accept), now);
        c.on_event(Event::Clock, now + Duration::from_secs(3));
        c
    }

    #[test]
    fn test_solo_starts_ticking() {
        let now = Instant::now();
        let mut c = controller(PlayMode::Single, now);
        assert!(c.game.is_ticking());
        let events = c.due_events(now + Duration::from_secs(1));
        assert_eq!(events.len(), 1);
        let y = c.game.active.as_ref().unwrap().y;
        for event in events {
            c.on_event(event, now + Duration::from_secs(1));
        }
        assert_eq!(c.game.active.as_ref().unwrap().y, y + 30);
    }

    #[test]
    fn test_tick_after_teardown_is_ignored() {
        let now = Instant::now();
        let mut c = controller(PlayMode::Single, now);
        let token = c.game.poll_tick(now + Duration::from_secs(1)).unwrap();
        c.on_event(Event::Teardown, now);
        let before = c.game.active.clone();
        c.on_event(Event::Tick(token), now + Duration::from_secs(1));
        assert_eq!(c.game.active, before);
        assert!(!c.is_running());
        assert!(!c.game.is_ticking());
    }

    #[test]
    fn test_solo_top_out_saves_result() {
        let now = Instant::now();
        let mut c = controller(PlayMode::Single, now);
        for _ in 0..40 {
            c.on_event(Event::Input(Command::Move(Move::HardDrop)), now);
        }
        assert_eq!(c.game.state, GameState::GameOver);
        assert_eq!(c.sink().singles.len(), 1);
        assert_eq!(c.sink().singles[0].level_reached, 1);
    }

    #[test]
    fn test_restart_after_top_out_starts_fresh_board() {
        let now = Instant::now();
        let mut c = controller(PlayMode::Single, now);
        let stale = c.game.poll_tick(now + Duration::from_secs(1)).unwrap();
        for _ in 0..40 {
            c.on_event(Event::Input(Command::Move(Move::HardDrop)), now);
        }
        assert_eq!(c.game.state, GameState::GameOver);

        c.on_event(Event::Input(Command::Restart), now);
        assert_eq!(c.game.state, GameState::Playing);
        assert_eq!(c.game.progress.lines, 0);
        assert!(c.game.active.is_some());
        assert!(c.game.is_ticking());
        let before = c.game.active.clone();
        c.on_event(Event::Tick(stale), now + Duration::from_millis(10));
        assert_eq!(c.game.active, before);
    }

    #[test]
    fn test_hostile_peer_screens_are_dropped() {
        let now = Instant::now();
        let mut c = in_match_at(now, Difficulty::new(4).unwrap());
        let screen = |snapshot| {
            Event::Net(ServerMessage::OpponentScreen {
                from: PlayerId("peer".into()),
                snapshot,
            })
        };

        let mut lines = BoardSnapshot::capture(&c.game);
        lines.seq = 1;
        lines.lines_cleared = u32::MAX;
        c.on_event(screen(lines), now);

        let mut pose = BoardSnapshot::capture(&c.game);
        pose.seq = 2;
        if let Some(active) = pose.active.as_mut() {
            active.x = i32::MAX;
        }
        c.on_event(screen(pose), now);

        let mut huge = BoardSnapshot::capture(&c.game);
        huge.seq = 3;
        huge.rows = i32::MAX;
        huge.columns = i32::MAX;
        c.on_event(screen(huge), now);

        assert_eq!(c.game.rubble.boundary_rows(), 1);
        assert!(c.session.mirror().is_empty());
        assert_eq!(c.session.phase(), Phase::InProgress);
    }

    #[test]
    fn test_second_notice_does_not_save_twice() {
        let now = Instant::now();
        let mut c = in_match(now);
        let notice = |winner: &str, loser: &str| {
            Event::Net(ServerMessage::GameOver(GameOverNotice {
                winner: PlayerId(winner.into()),
                loser: PlayerId(loser.into()),
                loser_lines_cleared: 0,
                disqualified: false,
            }))
        };
        c.on_event(notice("peer", "me"), now);
        c.on_event(notice("me", "peer"), now);
        assert_eq!(c.session.outcome().map(|o| o.won), Some(false));
        assert!(c.sink().matches.is_empty());
    }

    #[test]
    fn test_quit_dispatches_teardown() {
        let now = Instant::now();
        let mut c = in_match(now);
        c.drain_outgoing();
        c.on_event(Event::Teardown, now);
        assert!(!c.is_running());
        assert!(!c.game.is_ticking());
        assert_eq!(c.session.phase(), Phase::Idle);
        assert!(c
            .drain_outgoing()
            .iter()
            .any(|m| matches!(m, ClientMessage::OpponentUnmounted)));
    }

    #[test]
    fn test_match_start_sends_initial_board() {
        let now = Instant::now();
        let mut c = in_match(now);
        assert_eq!(c.session.phase(), Phase::InProgress);
        assert_eq!(c.game.mode, PlayMode::Versus);
        assert!(c.game.is_ticking());
        let outgoing = c.drain_outgoing();
        assert!(outgoing
            .iter()
            .any(|m| matches!(m, ClientMessage::StartGame { opponent, .. } if opponent.0 == "peer")));
    }

    #[test]
    fn test_peer_lines_raise_local_floor() {
        let now = Instant::now();
        let mut c = in_match(now);
        let mut snapshot = BoardSnapshot::capture(&c.game);
        snapshot.seq = 1;
        snapshot.lines_cleared = 4;
        c.on_event(
            Event::Net(ServerMessage::OpponentScreen {
                from: PlayerId("peer".into()),
                snapshot,
            }),
            now,
        );
        assert_eq!(c.game.rubble.boundary_rows(), 2);
    }

    #[test]
    fn test_peer_disconnect_mid_match() {
        let now = Instant::now();
        let mut c = in_match(now);
        c.on_event(Event::Net(ServerMessage::PeerDisconnected { id: PlayerId("peer".into()) }), now);
        assert_eq!(c.session.phase(), Phase::Idle);
        assert!(!c.game.is_ticking());
        assert!(c.session.mirror().is_empty());
        assert_eq!(c.sink().matches.len(), 1);
        assert!(c.sink().matches[0].loser_disqualified);
    }

    #[test]
    fn test_relay_loss_returns_to_idle() {
        let now = Instant::now();
        let mut c = in_match(now);
        c.on_event(Event::Disconnected, now);
        assert_eq!(c.session.phase(), Phase::Idle);
        assert!(!c.game.is_ticking());
        assert!(!c.is_online());
        assert!(c.drain_outgoing().is_empty());
    }

    #[test]
    fn test_topping_out_in_versus_reports_lines() {
        let now = Instant::now();
        let mut c = in_match(now);
        c.drain_outgoing();
        for _ in 0..40 {
            c.on_event(Event::Input(Command::Move(Move::HardDrop)), now);
        }
        let outgoing = c.drain_outgoing();
        assert!(outgoing.iter().any(|m| matches!(m, ClientMessage::GameOver { .. })));
        assert_eq!(c.session.phase(), Phase::GameOver);
    }
}
