//! Best-effort persistence of finished games
//!
//! Results are appended as JSON lines under the platform data directory.
//! Saving never fails the caller: errors are logged and dropped.

use crate::error::{Error, Result};
use crate::multiplayer::MatchResult;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const MATCHES_FILE: &str = "matches.jsonl";
const SINGLE_FILE: &str = "single.jsonl";

/// End of a solo game
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SinglePlayerResult {
    pub participant_id: String,
    pub lines_cleared: u32,
    pub level_reached: u32,
}

/// Where finished games are sent
pub trait ResultSink {
    fn save_match(&mut self, result: &MatchResult);
    fn save_single(&mut self, result: &SinglePlayerResult);
}

/// Appends results to JSON-lines files in a directory
#[derive(Debug, Clone)]
pub struct FileResultSink {
    dir: PathBuf,
}

impl FileResultSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Sink in the platform data directory
    pub fn open_default() -> Result<Self> {
        let dirs = ProjectDirs::from("com", "floorwars", "floorwars")
            .ok_or_else(|| Error::Config("could not determine data directory".to_string()))?;
        Ok(Self::new(dirs.data_dir()))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn append<T: Serialize>(&self, file: &str, record: &T) -> Result<()> {
        fs::create_dir_all(&self.dir)?;
        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');
        let mut out = OpenOptions::new().create(true).append(true).open(self.dir.join(file))?;
        out.write_all(&line)?;
        Ok(())
    }
}

impl ResultSink for FileResultSink {
    fn save_match(&mut self, result: &MatchResult) {
        match self.append(MATCHES_FILE, result) {
            Ok(()) => debug!("Saved match won by {}", result.winner_id),
            Err(e) => warn!("Could not save match result: {}", e),
        }
    }

    fn save_single(&mut self, result: &SinglePlayerResult) {
        match self.append(SINGLE_FILE, result) {
            Ok(()) => debug!("Saved solo result of {} lines", result.lines_cleared),
            Err(e) => warn!("Could not save solo result: {}", e),
        }
    }
}

/// Keeps results in memory
#[cfg(test)]
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    pub matches: Vec<MatchResult>,
    pub singles: Vec<SinglePlayerResult>,
}

#[cfg(test)]
impl ResultSink for MemorySink {
    fn save_match(&mut self, result: &MatchResult) {
        self.matches.push(result.clone());
    }

    fn save_single(&mut self, result: &SinglePlayerResult) {
        self.singles.push(result.clone());
    }
}
