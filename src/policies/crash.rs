//! # Sliding-window crash-rate limiter.
//!
//! Each worker slot owns a [`CrashWindow`]: a bounded ring of the timestamps
//! of its most recent crashes. Recording a crash yields a [`RespawnVerdict`]:
//! a slot that accumulates `max_crashes` crashes within `window` is presumed
//! to have a deterministic defect, and further respawns are refused.
//!
//! The verdict itself is stateless advice; stickiness (a disabled slot stays
//! disabled) is enforced by the registry's `Disabled` status.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Decision returned after recording a crash.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RespawnVerdict {
    /// The slot may be respawned.
    Allow,
    /// The crash rate was exceeded; the slot must be disabled.
    Disable,
}

/// Bounded ring of recent crash timestamps for one worker slot.
#[derive(Debug, Clone)]
pub struct CrashWindow {
    max_crashes: usize,
    window: Duration,
    times: VecDeque<Instant>,
}

impl CrashWindow {
    /// Creates a window holding at most `max_crashes` timestamps (min 1)
    /// and judging them against `window`.
    pub fn new(max_crashes: usize, window: Duration) -> Self {
        let max_crashes = max_crashes.max(1);
        Self {
            max_crashes,
            window,
            times: VecDeque::with_capacity(max_crashes),
        }
    }

    /// Records a crash at `now` and decides whether respawning is still
    /// permitted.
    ///
    /// The oldest timestamp is overwritten once the ring is full. The slot is
    /// disabled when the ring is full and the span from oldest to newest fits
    /// inside the window.
    pub fn record(&mut self, now: Instant) -> RespawnVerdict {
        if self.times.len() == self.max_crashes {
            self.times.pop_front();
        }
        self.times.push_back(now);

        if self.times.len() == self.max_crashes {
            if let Some(oldest) = self.times.front() {
                if now.saturating_duration_since(*oldest) <= self.window {
                    return RespawnVerdict::Disable;
                }
            }
        }
        RespawnVerdict::Allow
    }

    /// Number of crashes currently remembered.
    pub fn len(&self) -> usize {
        self.times.len()
    }

    /// True if no crash has been recorded yet.
    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(base: Instant, ms: u64) -> Instant {
        base + Duration::from_millis(ms)
    }

    #[test]
    fn burst_inside_window_disables() {
        let mut w = CrashWindow::new(3, Duration::from_secs(5));
        let t0 = Instant::now();

        assert_eq!(w.record(at(t0, 0)), RespawnVerdict::Allow);
        assert_eq!(w.record(at(t0, 50)), RespawnVerdict::Allow);
        assert_eq!(w.record(at(t0, 100)), RespawnVerdict::Disable);
    }

    #[test]
    fn slow_crashes_stay_allowed() {
        let mut w = CrashWindow::new(3, Duration::from_secs(5));
        let t0 = Instant::now();

        for i in 0..10u64 {
            // 6 seconds apart: any three consecutive span 12s > 5s.
            assert_eq!(w.record(at(t0, i * 6_000)), RespawnVerdict::Allow);
        }
    }

    #[test]
    fn ring_is_bounded_and_forgets_old_crashes() {
        let mut w = CrashWindow::new(3, Duration::from_secs(5));
        let t0 = Instant::now();

        w.record(at(t0, 0));
        w.record(at(t0, 100));
        assert_eq!(w.len(), 2);

        // A long quiet period pushes the early burst out of relevance: the
        // two old crashes plus one fresh one span more than the window.
        assert_eq!(w.record(at(t0, 60_000)), RespawnVerdict::Allow);
        assert_eq!(w.len(), 3);

        // Two more rapid crashes complete a fresh in-window triple.
        assert_eq!(w.record(at(t0, 60_050)), RespawnVerdict::Allow);
        assert_eq!(w.record(at(t0, 60_100)), RespawnVerdict::Disable);
        assert_eq!(w.len(), 3);
    }

    #[test]
    fn single_crash_budget_disables_immediately() {
        let mut w = CrashWindow::new(1, Duration::from_secs(5));
        assert_eq!(w.record(Instant::now()), RespawnVerdict::Disable);
    }
}
