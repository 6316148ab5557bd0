//! # Lifecycle events emitted by the supervisor.
//!
//! [`EventKind`] classifies events across the worker lifecycle:
//! - **Per-worker events**: spawn, promotion to active, exit, respawn
//!   scheduling, rate-limit disable.
//! - **Cluster events**: shutdown and rolling-restart progress.
//! - **Fan-out anomalies**: a subscriber queue overflowed or a subscriber
//!   panicked.
//!
//! The [`Event`] struct carries metadata such as the worker id, the pid of
//! the incarnation involved, exit code/signal, and scheduled delays.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases
//! monotonically. Within one worker slot, events follow lifecycle order
//! (spawn → active → exit → respawn …) because they are all published from
//! the single supervisor loop.
//!
//! ## Event flow examples
//!
//! ### Crash and respawn
//! ```text
//! WorkerStarting{id, pid}
//!   → WorkerActive{id}
//!   → WorkerCrashed{id, exit}
//!   → RespawnScheduled{id, delay}
//!   → WorkerStarting{id, new pid}
//! ```
//!
//! ### Orderly shutdown
//! ```text
//! ShutdownRequested
//!   → WorkerStopped{id} per worker  (or ShutdownTimeout{id} → WorkerCrashed)
//!   → AllWorkersDown
//! ```

use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{Duration, SystemTime};

use crate::platform::WorkerExit;

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of supervisor events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Worker lifecycle ===
    /// A new incarnation was spawned for a slot.
    WorkerStarting,
    /// The incarnation survived its startup window and is serving.
    WorkerActive,
    /// The incarnation exited gracefully (clean exit, or terminated by the
    /// supervisor's own SIGTERM while stopping).
    WorkerStopped,
    /// The incarnation crashed (nonzero exit, unexpected signal, or a spawn
    /// that failed outright).
    WorkerCrashed,
    /// A replacement spawn was scheduled after a delay.
    RespawnScheduled,
    /// The slot tripped the crash-rate limiter and will not be respawned.
    WorkerDisabled,

    // === Cluster control ===
    /// Orderly shutdown began; live workers were sent SIGTERM.
    ShutdownRequested,
    /// A worker outlived the shutdown grace period and was sent SIGKILL.
    ShutdownTimeout,
    /// A rolling restart cycle began.
    RestartRequested,
    /// A rolling restart cycle replaced every eligible slot.
    RestartCompleted,
    /// Every slot is settled; the supervisor loop is about to return.
    AllWorkersDown,

    // === Subscriber fan-out anomalies ===
    /// A subscriber's queue was full and an event was dropped for it.
    SubscriberOverflow,
    /// A subscriber panicked while processing an event.
    SubscriberPanicked,
}

/// Supervisor event with optional metadata.
///
/// ## Fields
/// - `seq`: unique sequence number (monotonically increasing)
/// - `at`: wall-clock timestamp (may go backwards under NTP, logging only)
/// - `kind`: event classification
/// - `worker`, `pid`, `exit_code`, `signal`, `delay`, `incarnation`, `error`:
///   optional metadata, populated per kind
#[derive(Debug, Clone)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp of publication.
    pub at: SystemTime,
    /// The kind of event.
    pub kind: EventKind,
    /// Worker slot id, for per-worker events.
    pub worker: Option<u8>,
    /// Pid of the incarnation involved.
    pub pid: Option<u32>,
    /// Exit code, when the event reports a normal exit.
    pub exit_code: Option<i32>,
    /// Terminating signal, when the event reports a signal death.
    pub signal: Option<i32>,
    /// Scheduled delay (respawn events).
    pub delay: Option<Duration>,
    /// Incarnation counter of the slot at publication time.
    pub incarnation: Option<u64>,
    /// Error message, when the event represents a failure.
    pub error: Option<String>,
}

impl Event {
    /// Creates a new event of the given kind with the next sequence number.
    pub fn now(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            worker: None,
            pid: None,
            exit_code: None,
            signal: None,
            delay: None,
            incarnation: None,
            error: None,
        }
    }

    /// Attaches a worker slot id.
    pub fn with_worker(mut self, id: u8) -> Self {
        self.worker = Some(id);
        self
    }

    /// Attaches a pid.
    pub fn with_pid(mut self, pid: u32) -> Self {
        self.pid = Some(pid);
        self
    }

    /// Attaches exit details.
    pub fn with_exit(mut self, exit: WorkerExit) -> Self {
        self.exit_code = exit.code;
        self.signal = exit.signal;
        self
    }

    /// Attaches a scheduled delay.
    pub fn with_delay(mut self, d: Duration) -> Self {
        self.delay = Some(d);
        self
    }

    /// Attaches the slot's incarnation counter.
    pub fn with_incarnation(mut self, n: u64) -> Self {
        self.incarnation = Some(n);
        self
    }

    /// Attaches an error message.
    pub fn with_error(mut self, msg: impl Into<String>) -> Self {
        self.error = Some(msg.into());
        self
    }

    /// Creates a subscriber overflow event.
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Event::now(EventKind::SubscriberOverflow)
            .with_error(format!("subscriber={subscriber} reason={reason}"))
    }

    /// Creates a subscriber panic event.
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::now(EventKind::SubscriberPanicked).with_error(format!("subscriber={subscriber} {info}"))
    }
}
