//! Fixed-interval tick scheduler with an epoch guard
//!
//! The scheduler never sleeps. The event loop asks it whether a tick is due
//! at a given instant and receives a [`TickToken`] stamped with the epoch that
//! was current when the tick was armed. Every start, restart or cancel bumps
//! the epoch, so a token that was queued before a reset is recognisably stale.

use std::time::{Duration, Instant};

/// Proof that a tick fired under a particular arming of the scheduler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickToken {
    epoch: u64,
}

#[derive(Debug, Clone)]
pub struct TickScheduler {
    interval: Duration,
    next_due: Option<Instant>,
    epoch: u64,
}

impl TickScheduler {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            next_due: None,
            epoch: 0,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn is_running(&self) -> bool {
        self.next_due.is_some()
    }

    /// Change the interval without arming
    pub fn set_interval(&mut self, interval: Duration) {
        self.interval = interval;
    }

    /// Arm the timer; the first tick is due one interval from `now`
    pub fn start(&mut self, now: Instant) {
        self.epoch += 1;
        self.next_due = Some(now + self.interval);
    }

    /// Re-arm with a new interval
    pub fn restart(&mut self, interval: Duration, now: Instant) {
        self.interval = interval;
        self.start(now);
    }

    /// Stop the timer. Safe to call when already stopped.
    pub fn cancel(&mut self) {
        if self.next_due.take().is_some() {
            self.epoch += 1;
        }
    }

    /// Fire if a tick is due. At most one token is produced per call; a loop
    /// that fell behind catches up one tick at a time.
    pub fn poll(&mut self, now: Instant) -> Option<TickToken> {
        let due = self.next_due?;
        if now < due {
            return None;
        }
        self.next_due = Some(due + self.interval);
        Some(TickToken { epoch: self.epoch })
    }

    /// Time until the next tick, for sizing the event loop's wait
    pub fn time_until_due(&self, now: Instant) -> Option<Duration> {
        self.next_due.map(|due| due.saturating_duration_since(now))
    }

    /// Whether a token belongs to the current arming
    pub fn is_current(&self, token: TickToken) -> bool {
        self.next_due.is_some() && token.epoch == self.epoch
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_due_before_interval() {
        let now = Instant::now();
        let mut scheduler = TickScheduler::new(Duration::from_millis(1000));
        scheduler.start(now);
        assert!(scheduler.poll(now + Duration::from_millis(999)).is_none());
        assert!(scheduler.poll(now + Duration::from_millis(1000)).is_some());
        assert!(scheduler.poll(now + Duration::from_millis(1500)).is_none());
        assert!(scheduler.poll(now + Duration::from_millis(2000)).is_some());
    }

    #[test]
    fn test_stopped_scheduler_never_fires() {
        let now = Instant::now();
        let mut scheduler = TickScheduler::new(Duration::from_millis(100));
        assert!(scheduler.poll(now + Duration::from_secs(10)).is_none());
        scheduler.start(now);
        scheduler.cancel();
        scheduler.cancel();
        assert!(!scheduler.is_running());
        assert!(scheduler.poll(now + Duration::from_secs(10)).is_none());
    }

    #[test]
    fn test_cancel_invalidates_outstanding_token() {
        let now = Instant::now();
        let mut scheduler = TickScheduler::new(Duration::from_millis(100));
        scheduler.start(now);
        let token = scheduler.poll(now + Duration::from_millis(100)).unwrap();
        assert!(scheduler.is_current(token));
        scheduler.cancel();
        assert!(!scheduler.is_current(token));
        scheduler.start(now);
        assert!(!scheduler.is_current(token));
    }

    #[test]
    fn test_restart_changes_interval() {
        let now = Instant::now();
        let mut scheduler = TickScheduler::new(Duration::from_millis(1000));
        scheduler.start(now);
        scheduler.restart(Duration::from_millis(250), now);
        assert_eq!(scheduler.interval(), Duration::from_millis(250));
        assert!(scheduler.poll(now + Duration::from_millis(250)).is_some());
    }
}
