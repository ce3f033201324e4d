//! Settings persistence using TOML
//!
//! Stores settings in ~/.config/floorwars/settings.toml (or platform equivalent)

use crate::error::{Error, Result};
use crate::floor_raise::Difficulty;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use tracing::{debug, warn};

/// Game settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub board: BoardSettings,
    pub timing: TimingSettings,
    pub versus: VersusSettings,
    pub keys: KeyBindings,
}

/// Board geometry
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BoardSettings {
    pub columns: i32,
    pub rows: i32,
    /// Cell edge in pixels; must be even
    pub unit_size: i32,
}

/// Gravity and countdown pacing
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingSettings {
    /// Tick interval at level 1
    pub base_interval_ms: u64,
    /// Reduction per level
    pub step_ms: u64,
    /// Fastest auto-speed interval
    pub min_interval_ms: u64,
    /// Countdown length after an invitation is accepted
    pub countdown_secs: u8,
}

/// Versus defaults and relay connection
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VersusSettings {
    pub difficulty: Difficulty,
    pub relay_addr: String,
    pub player_name: String,
}

/// Key bindings (stored as strings for easy editing)
/// Each action can have one or more keys bound to it
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyBindings {
    #[serde(deserialize_with = "deserialize_keys", serialize_with = "serialize_keys")]
    pub move_left: Vec<String>,
    #[serde(deserialize_with = "deserialize_keys", serialize_with = "serialize_keys")]
    pub move_right: Vec<String>,
    #[serde(deserialize_with = "deserialize_keys", serialize_with = "serialize_keys")]
    pub rotate: Vec<String>,
    #[serde(deserialize_with = "deserialize_keys", serialize_with = "serialize_keys")]
    pub soft_drop: Vec<String>,
    #[serde(deserialize_with = "deserialize_keys", serialize_with = "serialize_keys")]
    pub hard_drop: Vec<String>,
    #[serde(deserialize_with = "deserialize_keys", serialize_with = "serialize_keys")]
    pub pause: Vec<String>,
    #[serde(deserialize_with = "deserialize_keys", serialize_with = "serialize_keys")]
    pub raise_floor: Vec<String>,
    #[serde(deserialize_with = "deserialize_keys", serialize_with = "serialize_keys")]
    pub search: Vec<String>,
    #[serde(deserialize_with = "deserialize_keys", serialize_with = "serialize_keys")]
    pub invite: Vec<String>,
    #[serde(deserialize_with = "deserialize_keys", serialize_with = "serialize_keys")]
    pub accept: Vec<String>,
    #[serde(deserialize_with = "deserialize_keys", serialize_with = "serialize_keys")]
    pub decline: Vec<String>,
    #[serde(deserialize_with = "deserialize_keys", serialize_with = "serialize_keys")]
    pub restart: Vec<String>,
    #[serde(deserialize_with = "deserialize_keys", serialize_with = "serialize_keys")]
    pub next_opponent: Vec<String>,
    #[serde(deserialize_with = "deserialize_keys", serialize_with = "serialize_keys")]
    pub difficulty: Vec<String>,
    #[serde(deserialize_with = "deserialize_keys", serialize_with = "serialize_keys")]
    pub quit: Vec<String>,
}

/// Deserialize keys as either a single string or array of strings
fn deserialize_keys<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::{self, Visitor};

    struct KeysVisitor;

    impl<'de> Visitor<'de> for KeysVisitor {
        type Value = Vec<String>;

        fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
            formatter.write_str("a string or array of strings")
        }

        fn visit_str<E>(self, v: &str) -> std::result::Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(vec![v.to_string()])
        }

        fn visit_seq<A>(self, mut seq: A) -> std::result::Result<Self::Value, A::Error>
        where
            A: de::SeqAccess<'de>,
        {
            let mut keys = Vec::new();
            while let Some(key) = seq.next_element::<String>()? {
                keys.push(key);
            }
            Ok(keys)
        }
    }

    deserializer.deserialize_any(KeysVisitor)
}

/// Serialize keys: single key as string, multiple as array
fn serialize_keys<S>(keys: &[String], serializer: S) -> std::result::Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    use serde::ser::SerializeSeq;

    if let [single] = keys {
        serializer.serialize_str(single)
    } else {
        let mut seq = serializer.serialize_seq(Some(keys.len()))?;
        for key in keys {
            seq.serialize_element(key)?;
        }
        seq.end()
    }
}

impl Default for BoardSettings {
    fn default() -> Self {
        Self {
            columns: 10,
            rows: 20,
            unit_size: 30,
        }
    }
}

impl BoardSettings {
    /// Canvas width in pixels
    pub fn width_px(&self) -> i32 {
        self.columns * self.unit_size
    }
}

impl Default for TimingSettings {
    fn default() -> Self {
        Self {
            base_interval_ms: 1000,
            step_ms: 75,
            min_interval_ms: 250,
            countdown_secs: 3,
        }
    }
}

impl Default for VersusSettings {
    fn default() -> Self {
        Self {
            difficulty: Difficulty::default(),
            relay_addr: "127.0.0.1:4321".to_string(),
            player_name: "player".to_string(),
        }
    }
}

impl Default for KeyBindings {
    fn default() -> Self {
        Self {
            move_left: vec!["Left".to_string()],
            move_right: vec!["Right".to_string()],
            rotate: vec!["Up".to_string(), "x".to_string()],
            soft_drop: vec!["Down".to_string()],
            hard_drop: vec!["Space".to_string()],
            pause: vec!["p".to_string(), "Esc".to_string()],
            raise_floor: vec!["f".to_string()],
            search: vec!["s".to_string()],
            invite: vec!["i".to_string()],
            accept: vec!["a".to_string()],
            decline: vec!["d".to_string()],
            restart: vec!["r".to_string()],
            next_opponent: vec!["Tab".to_string(), "n".to_string()],
            difficulty: vec!["c".to_string()],
            quit: vec!["q".to_string()],
        }
    }
}

impl Settings {
    /// Get the config directory path
    fn config_dir() -> Option<PathBuf> {
        ProjectDirs::from("com", "floorwars", "floorwars").map(|dirs| dirs.config_dir().to_path_buf())
    }

    /// Get the settings file path
    fn settings_path() -> Option<PathBuf> {
        Self::config_dir().map(|dir| dir.join("settings.toml"))
    }

    /// Load settings from file, or fall back to defaults
    pub fn load() -> Self {
        let Some(path) = Self::settings_path() else {
            return Self::default();
        };

        match fs::read_to_string(&path) {
            Ok(contents) => match Self::from_toml(&contents) {
                Ok(settings) => settings,
                Err(e) => {
                    warn!("Ignoring {}: {}", path.display(), e);
                    Self::default()
                }
            },
            Err(e) => {
                debug!("No settings at {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    /// Parse and validate settings text
    pub fn from_toml(contents: &str) -> Result<Self> {
        let settings: Settings = toml::from_str(contents)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Save settings to file
    pub fn save(&self) -> Result<()> {
        let dir = Self::config_dir()
            .ok_or_else(|| Error::Config("could not determine config directory".to_string()))?;
        fs::create_dir_all(&dir)?;
        let contents = toml::to_string_pretty(self)?;
        fs::write(dir.join("settings.toml"), contents)?;
        Ok(())
    }

    /// Reject geometry and pacing the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        let board = &self.board;
        if board.unit_size <= 0 || board.unit_size % 2 != 0 {
            return Err(Error::Config(format!(
                "unit_size must be a positive even number, got {}",
                board.unit_size
            )));
        }
        if board.columns < 4 || board.rows < 4 {
            return Err(Error::Config(format!(
                "board must be at least 4x4, got {}x{}",
                board.columns, board.rows
            )));
        }
        if self.timing.min_interval_ms == 0 || self.timing.base_interval_ms < self.timing.min_interval_ms {
            return Err(Error::Config(
                "base_interval_ms must be at least min_interval_ms, which must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(Settings::default().validate().is_ok());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let settings = Settings::from_toml("[timing]\nbase_interval_ms = 800\n").unwrap();
        assert_eq!(settings.timing.base_interval_ms, 800);
        assert_eq!(settings.timing.min_interval_ms, 250);
        assert_eq!(settings.board.columns, 10);
    }

    #[test]
    fn test_odd_unit_size_rejected() {
        assert!(Settings::from_toml("[board]\nunit_size = 31\n").is_err());
    }

    #[test]
    fn test_bad_difficulty_rejected() {
        assert!(Settings::from_toml("[versus]\ndifficulty = 9\n").is_err());
    }

    #[test]
    fn test_keys_accept_string_or_list() {
        let settings = Settings::from_toml("[keys]\nrotate = \"w\"\nhard_drop = [\"Space\", \"Enter\"]\n").unwrap();
        assert_eq!(settings.keys.rotate, vec!["w".to_string()]);
        assert_eq!(settings.keys.hard_drop.len(), 2);
    }

    #[test]
    fn test_round_trip_through_toml() {
        let settings = Settings::default();
        let text = toml::to_string_pretty(&settings).unwrap();
        let back = Settings::from_toml(&text).unwrap();
        assert_eq!(back.keys.rotate, settings.keys.rotate);
        assert_eq!(back.versus.difficulty, settings.versus.difficulty);
    }
}
