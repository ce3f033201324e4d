//! Line and level progress, and the level → tick interval curve

use crate::settings::TimingSettings;
use std::time::Duration;

/// Lines needed per level
pub const LINES_PER_LEVEL: u32 = 10;

/// Progress tracking for one board
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Progress {
    /// Total lines cleared
    pub lines: u32,
    /// Current level
    pub level: u32,
}

impl Default for Progress {
    fn default() -> Self {
        Self::new()
    }
}

impl Progress {
    pub fn new() -> Self {
        Self { lines: 0, level: 1 }
    }

    /// Add cleared lines, returns true if the level went up
    pub fn add_lines(&mut self, cleared: u32) -> bool {
        self.lines += cleared;
        let level = self.lines / LINES_PER_LEVEL + 1;
        let leveled = level > self.level;
        self.level = level;
        leveled
    }
}

/// Tick interval for a level: shrinks by a fixed step down to a floor
pub fn interval_for_level(level: u32, timing: &TimingSettings) -> Duration {
    let step = u64::from(level.saturating_sub(1)) * timing.step_ms;
    let ms = timing.base_interval_ms.saturating_sub(step).max(timing.min_interval_ms);
    Duration::from_millis(ms)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_up() {
        let mut progress = Progress::new();
        for _ in 0..9 {
            assert!(!progress.add_lines(1));
        }
        assert!(progress.add_lines(1));
        assert_eq!(progress.level, 2);
        assert_eq!(progress.lines, 10);
    }

    #[test]
    fn test_multi_line_level_jump() {
        let mut progress = Progress::new();
        progress.add_lines(8);
        assert!(progress.add_lines(4));
        assert_eq!(progress.level, 2);
    }

    #[test]
    fn test_interval_decreases_to_floor() {
        let timing = TimingSettings::default();
        let mut last = interval_for_level(1, &timing);
        assert_eq!(last, Duration::from_millis(timing.base_interval_ms));
        for level in 2..40 {
            let interval = interval_for_level(level, &timing);
            assert!(interval < last || interval == Duration::from_millis(timing.min_interval_ms));
            assert!(interval >= Duration::from_millis(timing.min_interval_ms));
            last = interval;
        }
        assert_eq!(last, Duration::from_millis(timing.min_interval_ms));
    }
}
