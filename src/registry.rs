//! # Worker registry: the fixed slot table.
//!
//! One [`WorkerRecord`] per configured worker slot, allocated at init and
//! never resized. A *slot* is a persistent worker identity; the process
//! currently filling it (an *incarnation*) changes across respawns while the
//! slot id stays stable.
//!
//! ## Rules
//! - The registry is owned exclusively by the supervisor loop; readers see
//!   published snapshots, never the table itself.
//! - A record is **live** iff `pid` is set (status `Starting`/`Active`/
//!   `Stopping`); at most one live process exists per slot at any instant.
//! - `Disabled` is terminal: no transition out of it for the supervisor's
//!   lifetime.

use std::time::{Duration, Instant};

use crate::platform::WorkerExit;
use crate::policies::CrashWindow;

/// Lifecycle state of a worker slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerStatus {
    /// Spawned, inside its startup window.
    Starting,
    /// Survived the startup window; serving.
    Active,
    /// Asked to stop (shutdown or rolling restart); exit pending.
    Stopping,
    /// Exited (or never spawned); slot is empty.
    Crashed,
    /// Empty, with a replacement spawn scheduled.
    Respawning,
    /// Crash rate exceeded; permanently retired.
    Disabled,
}

impl WorkerStatus {
    /// True for states that have a running process behind them.
    pub fn is_live(&self) -> bool {
        matches!(
            self,
            WorkerStatus::Starting | WorkerStatus::Active | WorkerStatus::Stopping
        )
    }

    /// Returns a short stable label (snake_case) for logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            WorkerStatus::Starting => "starting",
            WorkerStatus::Active => "active",
            WorkerStatus::Stopping => "stopping",
            WorkerStatus::Crashed => "crashed",
            WorkerStatus::Respawning => "respawning",
            WorkerStatus::Disabled => "disabled",
        }
    }
}

/// State of one worker slot across all its incarnations.
#[derive(Debug, Clone)]
pub struct WorkerRecord {
    /// Slot id, stable across respawns; `1..=N`.
    pub id: u8,
    /// The port every incarnation inherits.
    pub port: u16,
    /// Pid of the current incarnation, if one is running.
    pub pid: Option<u32>,
    /// Lifecycle state.
    pub status: WorkerStatus,
    /// Spawn time of the most recent incarnation.
    pub started_at: Option<Instant>,
    /// When the current `Starting` incarnation is promoted to `Active`.
    pub active_due: Option<Instant>,
    /// When a scheduled respawn becomes due.
    pub respawn_due: Option<Instant>,
    /// Whether the current incarnation was promoted to `Active` (and thus
    /// produced an `on_start`); exits of unpromoted incarnations must not
    /// produce an `on_exit`.
    pub started: bool,
    /// Last observed termination.
    pub last_exit: Option<WorkerExit>,
    /// Total crashes observed for this slot.
    pub crash_count: u64,
    /// Incarnations spawned for this slot (1 = first spawn).
    pub incarnation: u64,
    /// Recent crash timestamps for the rate limiter.
    pub crashes: CrashWindow,
}

impl WorkerRecord {
    fn new(id: u8, port: u16, max_crashes: usize, window: Duration) -> Self {
        Self {
            id,
            port,
            pid: None,
            // Placeholder until the first spawn; an empty record.
            status: WorkerStatus::Crashed,
            started_at: None,
            active_due: None,
            respawn_due: None,
            started: false,
            last_exit: None,
            crash_count: 0,
            incarnation: 0,
            crashes: CrashWindow::new(max_crashes, window),
        }
    }

    /// True while a process is running for this slot.
    pub fn is_live(&self) -> bool {
        self.pid.is_some()
    }

    /// True once nothing is running and nothing further is scheduled.
    ///
    /// The supervisor loop exits when every slot settles.
    pub fn is_settled(&self) -> bool {
        self.pid.is_none() && self.respawn_due.is_none() && self.status != WorkerStatus::Respawning
    }

    /// A fresh incarnation was spawned.
    pub fn note_spawned(&mut self, pid: u32, now: Instant, startup_delay: Duration) {
        self.pid = Some(pid);
        self.status = WorkerStatus::Starting;
        self.started_at = Some(now);
        self.active_due = Some(now + startup_delay);
        self.respawn_due = None;
        self.started = false;
        self.incarnation += 1;
    }

    /// The incarnation survived its startup window.
    pub fn note_active(&mut self) {
        self.status = WorkerStatus::Active;
        self.active_due = None;
        self.started = true;
    }

    /// The supervisor asked this incarnation to stop.
    pub fn note_stopping(&mut self) {
        self.status = WorkerStatus::Stopping;
    }

    /// The incarnation terminated.
    pub fn note_exited(&mut self, exit: WorkerExit) {
        self.pid = None;
        self.status = WorkerStatus::Crashed;
        self.active_due = None;
        self.last_exit = Some(exit);
    }

    /// A replacement spawn was scheduled.
    pub fn schedule_respawn(&mut self, due: Instant) {
        self.status = WorkerStatus::Respawning;
        self.respawn_due = Some(due);
    }

    /// Drops a scheduled respawn (shutdown won).
    pub fn cancel_respawn(&mut self) {
        if self.status == WorkerStatus::Respawning {
            self.status = WorkerStatus::Crashed;
        }
        self.respawn_due = None;
    }

    /// Retires the slot permanently.
    pub fn disable(&mut self) {
        self.status = WorkerStatus::Disabled;
        self.respawn_due = None;
        self.active_due = None;
    }
}

/// Fixed table of worker slots, ids `1..=N`.
#[derive(Debug)]
pub struct Registry {
    slots: Vec<WorkerRecord>,
}

impl Registry {
    /// Creates `count` empty slots sharing `port`, each with its own crash
    /// window.
    pub fn new(count: usize, port: u16, max_crashes: usize, window: Duration) -> Self {
        let slots = (1..=count)
            .map(|i| WorkerRecord::new(i as u8, port, max_crashes, window))
            .collect();
        Self { slots }
    }

    /// Number of slots.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// True when configured with zero workers.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Looks up a slot by id (`1..=N`); `0` is the master, never a slot.
    pub fn slot(&self, id: u8) -> Option<&WorkerRecord> {
        if id == 0 {
            return None;
        }
        self.slots.get(id as usize - 1)
    }

    /// Mutable lookup by id.
    pub fn slot_mut(&mut self, id: u8) -> Option<&mut WorkerRecord> {
        if id == 0 {
            return None;
        }
        self.slots.get_mut(id as usize - 1)
    }

    /// All slots in id order.
    pub fn iter(&self) -> impl Iterator<Item = &WorkerRecord> {
        self.slots.iter()
    }

    /// All slots, mutably, in id order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut WorkerRecord> {
        self.slots.iter_mut()
    }

    /// `(id, pid)` of every live slot.
    pub fn live_pairs(&self) -> Vec<(u8, u32)> {
        self.slots
            .iter()
            .filter_map(|r| r.pid.map(|pid| (r.id, pid)))
            .collect()
    }

    /// Number of slots currently in `status`.
    pub fn count(&self, status: WorkerStatus) -> usize {
        self.slots.iter().filter(|r| r.status == status).count()
    }

    /// True once every slot is settled; the loop-exit predicate.
    pub fn all_settled(&self) -> bool {
        self.slots.iter().all(WorkerRecord::is_settled)
    }
}
