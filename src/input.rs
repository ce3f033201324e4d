//! Key → command mapping from the configured bindings
//!
//! Held keys rely on the terminal's own key repeat; each press or repeat maps
//! to exactly one command.

use crate::piece::Move;
use crate::settings::KeyBindings as KeySettings;
use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers, ModifierKeyCode};

/// Everything the player can ask for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Move(Move),
    Pause,
    /// Practice floor raise (solo only)
    RaiseFloor,
    /// Enter the opponent pool
    Search,
    /// Invite the selected opponent
    Invite,
    Accept,
    Decline,
    /// New solo game, or dismiss a finished match
    Restart,
    /// Pick the next opponent in the pool
    NextOpponent,
    /// Cycle the versus difficulty
    CycleDifficulty,
    Quit,
}

/// Key bindings resolved to key codes - supports multiple keys per action
#[derive(Debug, Clone)]
pub struct KeyBindings {
    bindings: Vec<(Vec<KeyCode>, Command)>,
}

impl KeyBindings {
    /// Parse a key string into KeyCode
    fn parse_key(s: &str) -> Option<KeyCode> {
        let lower = s.to_lowercase();
        let code = match lower.as_str() {
            "left" => KeyCode::Left,
            "right" => KeyCode::Right,
            "up" => KeyCode::Up,
            "down" => KeyCode::Down,
            "space" => KeyCode::Char(' '),
            "enter" => KeyCode::Enter,
            "tab" => KeyCode::Tab,
            "esc" | "escape" => KeyCode::Esc,
            "shift" => KeyCode::Modifier(ModifierKeyCode::LeftShift),
            "ctrl" | "control" => KeyCode::Modifier(ModifierKeyCode::LeftControl),
            "alt" => KeyCode::Modifier(ModifierKeyCode::LeftAlt),
            _ => {
                let mut chars = lower.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => KeyCode::Char(c),
                    _ => return None,
                }
            }
        };
        Some(code)
    }

    /// Parse a list of key strings, skipping names we do not know
    fn parse_keys(keys: &[String]) -> Vec<KeyCode> {
        keys.iter().filter_map(|s| Self::parse_key(s)).collect()
    }

    /// Create keybindings from settings
    pub fn from_settings(keys: &KeySettings) -> Self {
        let table = [
            (&keys.move_left, Command::Move(Move::Left)),
            (&keys.move_right, Command::Move(Move::Right)),
            (&keys.rotate, Command::Move(Move::Rotate)),
            (&keys.soft_drop, Command::Move(Move::SoftDrop)),
            (&keys.hard_drop, Command::Move(Move::HardDrop)),
            (&keys.pause, Command::Pause),
            (&keys.raise_floor, Command::RaiseFloor),
            (&keys.search, Command::Search),
            (&keys.invite, Command::Invite),
            (&keys.accept, Command::Accept),
            (&keys.decline, Command::Decline),
            (&keys.restart, Command::Restart),
            (&keys.next_opponent, Command::NextOpponent),
            (&keys.difficulty, Command::CycleDifficulty),
            (&keys.quit, Command::Quit),
        ];
        Self {
            bindings: table
                .into_iter()
                .map(|(keys, command)| (Self::parse_keys(keys), command))
                .collect(),
        }
    }

    /// Map a key press to a command
    pub fn command_for(&self, key: KeyEvent) -> Option<Command> {
        if key.kind == KeyEventKind::Release {
            return None;
        }
        // Handle Ctrl+C for quit
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            return Some(Command::Quit);
        }
        let code = normalize_key(key.code);
        self.bindings
            .iter()
            .find(|(codes, _)| codes.contains(&code))
            .map(|(_, command)| *command)
    }
}

impl Default for KeyBindings {
    fn default() -> Self {
        Self::from_settings(&KeySettings::default())
    }
}

/// Normalize key codes for consistent handling
fn normalize_key(code: KeyCode) -> KeyCode {
    match code {
        KeyCode::Char(c) => KeyCode::Char(c.to_ascii_lowercase()),
        other => other,
    }
}
