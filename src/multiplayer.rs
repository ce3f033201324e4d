//! Versus session state machine
//!
//! Phases:
//! 1. `Idle` until the player looks for opponents (`Searching`)
//! 2. One side invites (`InviteSent`), the other sees `InviteReceived`
//! 3. Accepting starts a countdown on both sides (`Accepted`)
//! 4. At zero both boards start and snapshots flow (`InProgress`)
//! 5. The relay's game-over notice settles the match (`GameOver`)
//!
//! The session does no I/O. Outgoing messages collect in an outbox that the
//! controller drains into the transport, and everything the local board has
//! to act on comes back as [`SessionEvent`]s.

use crate::floor_raise::{Difficulty, FloorRaiseCalculator};
use crate::mirror::{MirrorUpdate, OpponentMirror};
use crate::protocol::{ClientMessage, GameOverNotice, OpponentInfo, PlayerId, ServerMessage, SessionToken};
use crate::settings::BoardSettings;
use crate::snapshot::{BoardSnapshot, SnapshotThrottle};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Where the pairing stands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Searching,
    InviteSent,
    InviteReceived,
    /// Counting down to the start; `countdown` is the value last shown
    Accepted { countdown: u8, since: Instant },
    InProgress,
    GameOver,
}

impl Phase {
    pub fn name(&self) -> &'static str {
        match self {
            Phase::Idle => "idle",
            Phase::Searching => "searching",
            Phase::InviteSent => "invite sent",
            Phase::InviteReceived => "invite received",
            Phase::Accepted { .. } => "accepted",
            Phase::InProgress => "in progress",
            Phase::GameOver => "game over",
        }
    }
}

/// A completed match as handed to persistence. Only the winner builds one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchResult {
    pub winner_id: PlayerId,
    pub loser_id: PlayerId,
    pub difficulty: Difficulty,
    pub winner_lines_cleared: u32,
    pub winner_floors_raised: u32,
    pub loser_lines_cleared: u32,
    pub loser_floors_raised: u32,
    pub loser_disqualified: bool,
}

/// How the match ended from this side
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchOutcome {
    pub won: bool,
    pub disqualified: bool,
    pub floors_raised: u32,
    pub result: Option<MatchResult>,
}

/// What the local board has to react to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    InviteReceived(OpponentInfo),
    InviteDeclined,
    Countdown(u8),
    /// Start a fresh versus board at this difficulty
    MatchStarted { difficulty: Difficulty },
    /// Raise the local floor by this many rows
    FloorRaise(u32),
    MatchOver(MatchOutcome),
    /// Pairing is gone; stop the local board
    Ended,
}

pub struct MultiplayerSession {
    name: String,
    local_id: Option<PlayerId>,
    peer: Option<OpponentInfo>,
    token: Option<SessionToken>,
    phase: Phase,
    difficulty: Difficulty,
    countdown_secs: u8,
    logged_in: u32,
    pool: Vec<OpponentInfo>,
    local_lines: u32,
    local_floor_level: u32,
    own_calc: FloorRaiseCalculator,
    peer_calc: FloorRaiseCalculator,
    mirror: OpponentMirror,
    throttle: SnapshotThrottle,
    start_sent: bool,
    outbox: Vec<ClientMessage>,
    outcome: Option<MatchOutcome>,
}

impl MultiplayerSession {
    pub fn new(name: &str, difficulty: Difficulty, countdown_secs: u8, board: &BoardSettings) -> Self {
        Self {
            name: name.to_string(),
            local_id: None,
            peer: None,
            token: None,
            phase: Phase::Idle,
            difficulty,
            countdown_secs,
            logged_in: 0,
            pool: Vec::new(),
            local_lines: 0,
            local_floor_level: 0,
            own_calc: FloorRaiseCalculator::new(difficulty),
            peer_calc: FloorRaiseCalculator::new(difficulty),
            mirror: OpponentMirror::new(board),
            throttle: SnapshotThrottle::new(),
            start_sent: false,
            outbox: Vec::new(),
            outcome: None,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn local_id(&self) -> Option<&PlayerId> {
        self.local_id.as_ref()
    }

    pub fn peer(&self) -> Option<&OpponentInfo> {
        self.peer.as_ref()
    }

    pub fn difficulty(&self) -> Difficulty {
        self.difficulty
    }

    pub fn logged_in(&self) -> u32 {
        self.logged_in
    }

    pub fn pool(&self) -> &[OpponentInfo] {
        &self.pool
    }

    pub fn mirror(&self) -> &OpponentMirror {
        &self.mirror
    }

    /// Floors our clears raised on the opponent this match
    pub fn floors_raised_by_local(&self) -> u32 {
        self.own_calc.total_raises()
    }

    pub fn outcome(&self) -> Option<&MatchOutcome> {
        self.outcome.as_ref()
    }

    /// Whether a versus board should be running
    pub fn in_match(&self) -> bool {
        self.phase == Phase::InProgress
    }

    /// Messages waiting for the transport
    pub fn drain_outbox(&mut self) -> Vec<ClientMessage> {
        std::mem::take(&mut self.outbox)
    }

    fn send(&mut self, msg: ClientMessage) {
        debug!("Queueing {}", msg.name());
        self.outbox.push(msg);
    }

    fn set_phase(&mut self, phase: Phase) {
        if self.phase.name() != phase.name() {
            info!("Session {} -> {}", self.phase.name(), phase.name());
        }
        self.phase = phase;
    }

    /// Introduce ourselves to the relay
    pub fn hello(&mut self) {
        let name = self.name.clone();
        self.send(ClientMessage::Hello { name });
    }

    pub fn set_difficulty(&mut self, difficulty: Difficulty) {
        if matches!(self.phase, Phase::Idle | Phase::Searching) {
            self.difficulty = difficulty;
        }
    }

    /// Enter the opponent pool
    pub fn search(&mut self) {
        if matches!(self.phase, Phase::Idle | Phase::Searching) {
            self.set_phase(Phase::Searching);
            self.send(ClientMessage::LookForOpponents);
        }
    }

    /// Invite a player from the pool
    pub fn invite(&mut self, to: &PlayerId) -> bool {
        if !matches!(self.phase, Phase::Idle | Phase::Searching) {
            return false;
        }
        let info = self
            .pool
            .iter()
            .find(|o| &o.id == to)
            .cloned()
            .unwrap_or_else(|| OpponentInfo {
                id: to.clone(),
                name: to.0.clone(),
            });
        info!("Inviting {} at difficulty {}", info.name, self.difficulty.level());
        self.peer = Some(info);
        self.set_phase(Phase::InviteSent);
        self.send(ClientMessage::InviteSent {
            sent_to: to.clone(),
            difficulty: self.difficulty,
        });
        true
    }

    /// Accept a pending invitation and start the countdown
    pub fn accept(&mut self, now: Instant) -> Vec<SessionEvent> {
        if self.phase != Phase::InviteReceived {
            return Vec::new();
        }
        let Some(session) = self.token.clone() else {
            return Vec::new();
        };
        self.send(ClientMessage::InviteAccepted { session });
        self.begin_countdown(now)
    }

    /// Turn down a pending invitation
    pub fn decline(&mut self) {
        if self.phase != Phase::InviteReceived {
            return;
        }
        if let Some(session) = self.token.take() {
            self.send(ClientMessage::InviteDeclined { session });
        }
        self.peer = None;
        self.set_phase(Phase::Searching);
    }

    /// Publish the local board. Only changed boards are sent; the first one
    /// of a match goes out as the start-game message.
    pub fn publish(&mut self, snapshot: BoardSnapshot) {
        if !matches!(self.phase, Phase::InProgress | Phase::GameOver) {
            return;
        }
        let Some(peer) = self.peer.as_ref().map(|p| p.id.clone()) else {
            return;
        };
        let Some(snapshot) = self.throttle.offer(snapshot) else {
            return;
        };

        if snapshot.lines_cleared > self.local_lines {
            // Counts the floors our clears raise on the opponent
            self.own_calc.record(snapshot.lines_cleared - self.local_lines);
        }
        self.local_lines = snapshot.lines_cleared;
        self.local_floor_level = snapshot.floor_level();

        if self.start_sent {
            self.send(ClientMessage::UpdatedClientScreen {
                opponent_id: peer,
                snapshot,
            });
        } else {
            self.start_sent = true;
            self.send(ClientMessage::StartGame { opponent: peer, snapshot });
        }
    }

    /// Our board topped out
    pub fn local_game_over(&mut self) {
        if self.phase != Phase::InProgress {
            return;
        }
        info!("Local board topped out with {} lines", self.local_lines);
        self.set_phase(Phase::GameOver);
        let lines_cleared = self.local_lines;
        self.send(ClientMessage::GameOver { lines_cleared });
    }

    /// Dismiss the result screen
    pub fn acknowledge(&mut self) {
        if self.phase == Phase::GameOver {
            self.end_pairing(Phase::Idle);
        }
    }

    /// The player left the versus screen
    pub fn unmount(&mut self) -> Vec<SessionEvent> {
        match self.phase {
            Phase::InviteReceived => self.decline(),
            Phase::InviteSent | Phase::Accepted { .. } | Phase::InProgress => {
                self.send(ClientMessage::OpponentUnmounted);
            }
            _ => {}
        }
        self.end_pairing(Phase::Idle);
        vec![SessionEvent::Ended]
    }

    /// The relay connection dropped
    pub fn transport_lost(&mut self) -> Vec<SessionEvent> {
        warn!("Relay connection lost in phase {}", self.phase.name());
        self.outbox.clear();
        self.local_id = None;
        self.pool.clear();
        self.logged_in = 0;
        self.end_pairing(Phase::Idle);
        vec![SessionEvent::Ended]
    }

    /// Drive the countdown
    pub fn poll(&mut self, now: Instant) -> Vec<SessionEvent> {
        let Phase::Accepted { countdown, since } = self.phase else {
            return Vec::new();
        };
        let elapsed = now.saturating_duration_since(since).as_secs();
        let remaining = (self.countdown_secs as u64).saturating_sub(elapsed) as u8;
        if remaining == countdown {
            return Vec::new();
        }
        if remaining > 0 {
            self.phase = Phase::Accepted {
                countdown: remaining,
                since,
            };
            return vec![SessionEvent::Countdown(remaining)];
        }

        self.own_calc = FloorRaiseCalculator::new(self.difficulty);
        self.peer_calc = FloorRaiseCalculator::new(self.difficulty);
        self.local_lines = 0;
        self.local_floor_level = 0;
        self.throttle.reset();
        self.start_sent = false;
        self.outcome = None;
        self.set_phase(Phase::InProgress);
        vec![
            SessionEvent::Countdown(0),
            SessionEvent::MatchStarted {
                difficulty: self.difficulty,
            },
        ]
    }

    /// Time until the countdown next changes
    pub fn time_until_poll(&self, now: Instant) -> Option<Duration> {
        let Phase::Accepted { countdown, since } = self.phase else {
            return None;
        };
        let shown = self.countdown_secs.saturating_sub(countdown) as u64 + 1;
        Some((since + Duration::from_secs(shown)).saturating_duration_since(now))
    }

    /// Apply one relay message
    pub fn on_message(&mut self, msg: ServerMessage, now: Instant) -> Vec<SessionEvent> {
        let mut events = Vec::new();
        match msg {
            ServerMessage::LoggedInUsers { count } => self.logged_in = count,
            ServerMessage::SocketId { id } => {
                info!("Relay assigned id {}", id);
                self.local_id = Some(id);
            }
            ServerMessage::OpponentPool { opponents } => {
                let local = self.local_id.clone();
                self.pool = opponents
                    .into_iter()
                    .filter(|o| Some(&o.id) != local.as_ref())
                    .collect();
                debug!("Opponent pool has {} players", self.pool.len());
            }
            ServerMessage::InviteSent { to, session } => {
                if self.phase == Phase::InviteSent {
                    self.peer = Some(to);
                    self.token = Some(session);
                }
            }
            ServerMessage::InviteReceived {
                from,
                difficulty,
                session,
            } => {
                if matches!(self.phase, Phase::Idle | Phase::Searching) {
                    info!("Invitation from {} at difficulty {}", from.name, difficulty.level());
                    self.peer = Some(from.clone());
                    self.token = Some(session);
                    self.difficulty = difficulty;
                    self.set_phase(Phase::InviteReceived);
                    events.push(SessionEvent::InviteReceived(from));
                } else {
                    debug!("Busy, declining invitation from {}", from.name);
                    self.send(ClientMessage::InviteDeclined { session });
                }
            }
            ServerMessage::InvitationDeclined { .. } => {
                if self.phase == Phase::InviteSent {
                    self.peer = None;
                    self.token = None;
                    self.set_phase(Phase::Searching);
                    events.push(SessionEvent::InviteDeclined);
                }
            }
            ServerMessage::InvitationAccepted {
                opponent,
                difficulty,
                session,
            } => {
                if self.phase == Phase::InviteSent {
                    self.peer = Some(opponent);
                    self.token = Some(session);
                    self.difficulty = difficulty;
                    events.extend(self.begin_countdown(now));
                }
            }
            ServerMessage::GameStarted { from, snapshot } | ServerMessage::OpponentScreen { from, snapshot } => {
                if !self.is_peer(&from) {
                    debug!("Ignoring screen from {}", from);
                } else if matches!(self.phase, Phase::Accepted { .. } | Phase::InProgress | Phase::GameOver) {
                    events.extend(self.mirror_snapshot(snapshot));
                }
            }
            ServerMessage::GameOver(notice) => {
                if self.outcome.is_some() {
                    debug!("Match already settled, ignoring notice won by {}", notice.winner);
                } else if matches!(self.phase, Phase::InProgress | Phase::GameOver) && self.involves_us(&notice) {
                    let outcome = self.resolve(&notice);
                    self.set_phase(Phase::GameOver);
                    events.push(SessionEvent::MatchOver(outcome));
                }
            }
            ServerMessage::PeerDisconnected { id } => {
                if self.is_peer(&id) {
                    events.extend(self.peer_left());
                }
            }
        }
        events
    }

    fn begin_countdown(&mut self, now: Instant) -> Vec<SessionEvent> {
        self.set_phase(Phase::Accepted {
            countdown: self.countdown_secs,
            since: now,
        });
        self.mirror.clear();
        vec![SessionEvent::Countdown(self.countdown_secs)]
    }

    fn is_peer(&self, id: &PlayerId) -> bool {
        self.peer.as_ref().is_some_and(|p| &p.id == id)
    }

    fn involves_us(&self, notice: &GameOverNotice) -> bool {
        match &self.local_id {
            Some(id) => &notice.winner == id || &notice.loser == id,
            None => self.is_peer(&notice.winner) || self.is_peer(&notice.loser),
        }
    }

    fn mirror_snapshot(&mut self, snapshot: BoardSnapshot) -> Vec<SessionEvent> {
        match self.mirror.apply(snapshot) {
            MirrorUpdate::Applied { lines_delta } if lines_delta > 0 && self.phase == Phase::InProgress => {
                let raises = self.peer_calc.record(lines_delta);
                if raises > 0 {
                    info!("Opponent cleared {} lines, raising floor by {}", lines_delta, raises);
                    return vec![SessionEvent::FloorRaise(raises)];
                }
                Vec::new()
            }
            _ => Vec::new(),
        }
    }

    /// Settle the match. The winner builds the persisted result.
    fn resolve(&mut self, notice: &GameOverNotice) -> MatchOutcome {
        let won = match &self.local_id {
            Some(id) => &notice.winner == id,
            None => self.is_peer(&notice.loser),
        };
        let result = won.then(|| MatchResult {
            winner_id: notice.winner.clone(),
            loser_id: notice.loser.clone(),
            difficulty: self.difficulty,
            winner_lines_cleared: self.local_lines,
            winner_floors_raised: self.own_calc.total_raises(),
            loser_lines_cleared: notice.loser_lines_cleared,
            loser_floors_raised: self.local_floor_level,
            loser_disqualified: notice.disqualified,
        });
        info!(
            "Match over: {} (disqualified={})",
            if won { "won" } else { "lost" },
            notice.disqualified
        );
        let outcome = MatchOutcome {
            won,
            disqualified: notice.disqualified,
            floors_raised: self.own_calc.total_raises(),
            result,
        };
        self.outcome = Some(outcome.clone());
        outcome
    }

    fn peer_left(&mut self) -> Vec<SessionEvent> {
        warn!("Peer left during {}", self.phase.name());
        match self.phase {
            Phase::InProgress => {
                let notice = GameOverNotice {
                    winner: self.local_id.clone().unwrap_or_else(|| PlayerId(self.name.clone())),
                    loser: self.peer.as_ref().map(|p| p.id.clone()).unwrap_or_else(|| PlayerId(String::new())),
                    loser_lines_cleared: self.mirror.lines_cleared(),
                    disqualified: true,
                };
                let outcome = self.resolve(&notice);
                self.end_pairing(Phase::Idle);
                vec![SessionEvent::MatchOver(outcome), SessionEvent::Ended]
            }
            Phase::InviteSent | Phase::InviteReceived | Phase::Accepted { .. } => {
                self.end_pairing(Phase::Searching);
                vec![SessionEvent::Ended]
            }
            _ => Vec::new(),
        }
    }

    /// Forget the peer and everything mirrored from it
    fn end_pairing(&mut self, phase: Phase) {
        self.peer = None;
        self.token = None;
        self.mirror.clear();
        self.throttle.reset();
        self.start_sent = false;
        self.set_phase(phase);
    }
}
