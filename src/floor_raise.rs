//! Floor-raise calculation
//!
//! Difficulty  Lines needed per floor raised on the opponent
//! ----------  ---------------------------------------------
//!     1       4
//!     2       3
//!     3       2
//!     4       1
//!
//! Lines that do not complete a raise are carried to the next clear.

use serde::{Deserialize, Serialize};

/// Versus difficulty, 1 (gentle) to 4 (brutal)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Difficulty(u8);

impl Difficulty {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 4;

    pub fn new(level: u8) -> Option<Self> {
        (Self::MIN..=Self::MAX).contains(&level).then_some(Self(level))
    }

    pub fn level(&self) -> u8 {
        self.0
    }

    /// Lines a player must clear to raise the opponent's floor by one
    pub fn lines_per_raise(&self) -> u32 {
        match self.0 {
            1 => 4,
            2 => 3,
            3 => 2,
            _ => 1,
        }
    }

    pub fn all() -> [Difficulty; 4] {
        [Difficulty(1), Difficulty(2), Difficulty(3), Difficulty(4)]
    }
}

impl Default for Difficulty {
    fn default() -> Self {
        Self(2)
    }
}

impl TryFrom<u8> for Difficulty {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Difficulty::new(value).ok_or_else(|| format!("difficulty must be 1-4, got {}", value))
    }
}

impl From<Difficulty> for u8 {
    fn from(d: Difficulty) -> u8 {
        d.0
    }
}

/// Converts cleared lines into floor raises, carrying the remainder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FloorRaiseCalculator {
    difficulty: Difficulty,
    surplus: u32,
    total_raises: u32,
}

impl FloorRaiseCalculator {
    pub fn new(difficulty: Difficulty) -> Self {
        Self {
            difficulty,
            surplus: 0,
            total_raises: 0,
        }
    }

    /// Lines carried towards the next raise
    #[cfg(test)]
    pub fn surplus(&self) -> u32 {
        self.surplus
    }

    /// Raises produced since creation
    pub fn total_raises(&self) -> u32 {
        self.total_raises
    }

    /// Record a line-clear event and return the floors to raise (possibly 0)
    pub fn record(&mut self, lines_cleared: u32) -> u32 {
        let needed = self.difficulty.lines_per_raise();
        let total = self.surplus.saturating_add(lines_cleared);
        let raises = total / needed;
        self.surplus = total - raises * needed;
        self.total_raises = self.total_raises.saturating_add(raises);
        raises
    }
}
