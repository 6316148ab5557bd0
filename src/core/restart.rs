//! # Rolling restart: sequential slot replacement.
//!
//! A [`RollingRestart`] cursor walks slot ids `1..=N`. At each step it asks
//! the supervisor to SIGTERM the incumbent, then waits until the slot's
//! *replacement* incarnation has been promoted to active before moving on,
//! so serving capacity never drops by more than one worker.
//!
//! ## Rules
//! - The cursor only ever *observes* the registry; terminating and spawning
//!   stay in the supervisor, which drives [`RollingRestart::advance`] once
//!   per loop iteration.
//! - Replacement is detected by the slot's incarnation counter moving past
//!   the value recorded when the step began; pids are not compared (a pid
//!   can be recycled).
//! - `Disabled` and settled slots are skipped rather than wedging the cycle.
//! - Shutdown abandons the cursor entirely; the supervisor drops it.

use crate::registry::{Registry, WorkerStatus};

/// What the supervisor should do for the cycle right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RollingAction {
    /// Send SIGTERM to this slot's incumbent and mark it stopping.
    Terminate(u8),
    /// Nothing to do; re-advance on a later iteration.
    Wait,
    /// The cursor passed the last slot; the cycle is complete.
    Done,
}

#[derive(Debug, Clone, Copy)]
struct Step {
    id: u8,
    /// Incarnation counter when the step began; the replacement must exceed it.
    baseline: u64,
    /// Whether the incumbent has already been asked (or managed) to go.
    initiated: bool,
}

/// Cursor state for one rolling restart cycle.
#[derive(Debug)]
pub(crate) struct RollingRestart {
    next: u8,
    total: u8,
    current: Option<Step>,
}

impl RollingRestart {
    pub(crate) fn new(total: u8) -> Self {
        Self {
            next: 1,
            total,
            current: None,
        }
    }

    /// Moves the cycle as far as the registry allows and reports the next
    /// action. Safe to call repeatedly; it never blocks.
    pub(crate) fn advance(&mut self, registry: &Registry) -> RollingAction {
        loop {
            let Some(step) = self.current else {
                if self.next > self.total {
                    return RollingAction::Done;
                }
                let id = self.next;
                match registry.slot(id) {
                    Some(rec) if rec.status != WorkerStatus::Disabled && !rec.is_settled() => {
                        self.current = Some(Step {
                            id,
                            baseline: rec.incarnation,
                            initiated: false,
                        });
                    }
                    _ => self.next += 1,
                }
                continue;
            };

            let Some(rec) = registry.slot(step.id) else {
                self.skip();
                continue;
            };

            if step.initiated {
                if rec.status == WorkerStatus::Disabled || rec.is_settled() {
                    self.skip();
                    continue;
                }
                if rec.status == WorkerStatus::Active && rec.incarnation > step.baseline {
                    self.skip();
                    continue;
                }
                return RollingAction::Wait;
            }

            match rec.status {
                WorkerStatus::Active if rec.incarnation == step.baseline => {
                    self.initiate();
                    return RollingAction::Terminate(step.id);
                }
                // Replaced between cycle start and cursor arrival.
                WorkerStatus::Active => {
                    self.skip();
                }
                // Let a fresh incarnation finish starting before we take it down.
                WorkerStatus::Starting => return RollingAction::Wait,
                // Incumbent is already on its way out; its replacement counts.
                WorkerStatus::Stopping | WorkerStatus::Crashed | WorkerStatus::Respawning => {
                    self.initiate();
                    return RollingAction::Wait;
                }
                WorkerStatus::Disabled => {
                    self.skip();
                }
            }
        }
    }

    fn initiate(&mut self) {
        if let Some(step) = self.current.as_mut() {
            step.initiated = true;
        }
    }

    fn skip(&mut self) {
        if let Some(step) = self.current.take() {
            self.next = step.id + 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::WorkerExit;
    use std::time::{Duration, Instant};

    fn registry(n: usize) -> Registry {
        let mut reg = Registry::new(n, 3000, 3, Duration::from_secs(5));
        let now = Instant::now();
        for id in 1..=n as u8 {
            let rec = reg.slot_mut(id).unwrap();
            rec.note_spawned(100 + id as u32, now, Duration::from_millis(10));
            rec.note_active();
        }
        reg
    }

    fn replace(reg: &mut Registry, id: u8, pid: u32) {
        let rec = reg.slot_mut(id).unwrap();
        rec.note_exited(WorkerExit {
            code: None,
            signal: Some(libc::SIGTERM),
        });
        rec.note_spawned(pid, Instant::now(), Duration::from_millis(10));
        rec.note_active();
    }

    #[test]
    fn walks_slots_in_order() {
        let mut reg = registry(3);
        let mut cycle = RollingRestart::new(3);

        assert_eq!(cycle.advance(&reg), RollingAction::Terminate(1));
        assert_eq!(cycle.advance(&reg), RollingAction::Wait);

        reg.slot_mut(1).unwrap().note_stopping();
        assert_eq!(cycle.advance(&reg), RollingAction::Wait);

        replace(&mut reg, 1, 201);
        assert_eq!(cycle.advance(&reg), RollingAction::Terminate(2));

        replace(&mut reg, 2, 202);
        assert_eq!(cycle.advance(&reg), RollingAction::Terminate(3));

        replace(&mut reg, 3, 203);
        assert_eq!(cycle.advance(&reg), RollingAction::Done);
        // Idempotent once complete.
        assert_eq!(cycle.advance(&reg), RollingAction::Done);
    }

    #[test]
    fn waits_for_replacement_promotion_not_just_exit() {
        let mut reg = registry(2);
        let mut cycle = RollingRestart::new(2);

        assert_eq!(cycle.advance(&reg), RollingAction::Terminate(1));
        let rec = reg.slot_mut(1).unwrap();
        rec.note_stopping();
        rec.note_exited(WorkerExit {
            code: Some(0),
            signal: None,
        });
        rec.note_spawned(301, Instant::now(), Duration::from_millis(10));

        // Replacement spawned but still starting: the cursor must hold.
        assert_eq!(cycle.advance(&reg), RollingAction::Wait);

        reg.slot_mut(1).unwrap().note_active();
        assert_eq!(cycle.advance(&reg), RollingAction::Terminate(2));
    }

    #[test]
    fn skips_disabled_and_settled_slots() {
        let mut reg = registry(3);
        reg.slot_mut(1).unwrap().disable();
        {
            let rec = reg.slot_mut(2).unwrap();
            rec.note_exited(WorkerExit {
                code: Some(1),
                signal: None,
            });
        }

        let mut cycle = RollingRestart::new(3);
        assert_eq!(cycle.advance(&reg), RollingAction::Terminate(3));

        replace(&mut reg, 3, 303);
        assert_eq!(cycle.advance(&reg), RollingAction::Done);
    }

    #[test]
    fn gives_up_on_a_slot_that_gets_disabled_mid_step() {
        let mut reg = registry(2);
        let mut cycle = RollingRestart::new(2);

        assert_eq!(cycle.advance(&reg), RollingAction::Terminate(1));
        reg.slot_mut(1).unwrap().note_stopping();
        // The replacement crash-storms and trips the limiter.
        reg.slot_mut(1).unwrap().note_exited(WorkerExit {
            code: Some(1),
            signal: None,
        });
        reg.slot_mut(1).unwrap().disable();

        assert_eq!(cycle.advance(&reg), RollingAction::Terminate(2));
        replace(&mut reg, 2, 402);
        assert_eq!(cycle.advance(&reg), RollingAction::Done);
    }

    #[test]
    fn empty_cluster_completes_immediately() {
        let reg = Registry::new(0, 3000, 3, Duration::from_secs(5));
        let mut cycle = RollingRestart::new(0);
        assert_eq!(cycle.advance(&reg), RollingAction::Done);
    }
}
