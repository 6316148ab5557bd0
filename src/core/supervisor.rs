//! # Supervisor: the master's control loop.
//!
//! The [`Supervisor`] owns the worker registry exclusively and drives every
//! lifecycle transition from one single-threaded loop: spawning, promotion
//! out of the startup window, reaping, crash-rate accounting, deferred
//! respawns, rolling restarts, and SIGTERM→SIGKILL shutdown escalation.
//!
//! ## Rules
//! - The loop is the only writer of worker state; signals reach it as
//!   [`SignalFlags`] transitions, never as reentrant handlers.
//! - User hooks run synchronously here, so per-slot callback order is
//!   exactly lifecycle order and callbacks never overlap for one slot.
//! - No worker failure aborts the loop; it returns only when every slot has
//!   settled (exited under shutdown, retired by the rate limiter, or left
//!   empty with respawns off).
//! - Exits are observed by per-pid nonblocking reaps each pass; a SIGCHLD
//!   wakeup shortens the wait but is never required for correctness.

use std::sync::Arc;
use std::time::Instant;

use tokio::time;

use crate::config::ClusterConfig;
use crate::error::ClusterError;
use crate::events::{Bus, Event, EventKind};
use crate::platform::process::{self, SpawnCommand};
use crate::platform::WorkerExit;
use crate::policies::RespawnVerdict;
use crate::registry::{Registry, WorkerStatus};
use crate::stats::{ClusterStats, StatsHandle, WorkerStats};
use crate::subscribers::{Subscribe, SubscriberSet};

use super::flags::SignalFlags;
use super::restart::{RollingAction, RollingRestart};

/// Drives a cluster of worker processes to completion.
///
/// Built by [`cluster::init`](crate::cluster::init) in the common case; can
/// also be constructed directly by embedders that manage their own runtime
/// and call [`run`](Supervisor::run) themselves.
pub struct Supervisor {
    cfg: ClusterConfig,
    registry: Registry,
    spawner: SpawnCommand,
    flags: Arc<SignalFlags>,
    bus: Bus,
    subs: Option<SubscriberSet>,
    pending_subs: Vec<Arc<dyn Subscribe>>,
    stats: StatsHandle,
    rolling: Option<RollingRestart>,
    total_restarts: u64,
    shutdown_started: bool,
    shutdown_deadline: Option<Instant>,
    sigkill_sent: bool,
    initial_spawned: bool,
}

impl Supervisor {
    /// Validates the config and prepares the slot table. Nothing is spawned
    /// yet.
    pub fn new(mut cfg: ClusterConfig) -> Result<Self, ClusterError> {
        cfg.validate()?;
        let spawner = match cfg.worker_command.clone() {
            Some(cmd) => cmd,
            None => SpawnCommand::current_exe().map_err(|source| ClusterError::Runtime { source })?,
        };
        let count = cfg.worker_count();
        let registry = Registry::new(count, cfg.port, cfg.respawn_max_crashes, cfg.respawn_window);
        let bus = Bus::new(cfg.bus_capacity);
        let pending_subs = std::mem::take(&mut cfg.subscribers);

        Ok(Self {
            cfg,
            registry,
            spawner,
            flags: Arc::new(SignalFlags::default()),
            bus,
            subs: None,
            pending_subs,
            stats: StatsHandle::default(),
            rolling: None,
            total_restarts: 0,
            shutdown_started: false,
            shutdown_deadline: None,
            sigkill_sent: false,
            initial_spawned: false,
        })
    }

    /// Shared request flags; `graceful_restart` and the signal listener feed
    /// these.
    pub fn flags(&self) -> Arc<SignalFlags> {
        Arc::clone(&self.flags)
    }

    /// Shared stats cell the loop publishes into.
    pub fn stats(&self) -> StatsHandle {
        self.stats.clone()
    }

    /// Event bus; subscribe to watch lifecycle events.
    pub fn bus(&self) -> Bus {
        self.bus.clone()
    }

    /// Number of worker slots.
    pub fn worker_count(&self) -> usize {
        self.registry.len()
    }

    /// Spawns the initial workers synchronously, staggered by
    /// `startup_delay`.
    ///
    /// Used by `init`, which must have the workers running by the time it
    /// returns to user code; [`run`](Supervisor::run) spawns them itself when
    /// this was not called first.
    pub fn spawn_initial_blocking(&mut self) {
        if self.initial_spawned {
            return;
        }
        self.initial_spawned = true;
        let n = self.registry.len() as u8;
        for id in 1..=n {
            if self.flags.shutdown_requested() {
                break;
            }
            self.spawn_slot(id);
            if id < n && !self.cfg.startup_delay.is_zero() {
                std::thread::sleep(self.cfg.startup_delay);
            }
        }
        self.publish_stats();
    }

    /// Runs the supervisor loop until every slot settles.
    ///
    /// ### Exit conditions
    /// - Orderly shutdown completed (every worker reaped, by SIGTERM or the
    ///   SIGKILL escalation after `shutdown_grace`).
    /// - Every slot died on its own and nothing will respawn it (respawns
    ///   disabled per config, or every slot rate-limited into `Disabled`).
    ///
    /// Worker failures never surface as errors here; they feed the respawn
    /// logic and the event stream.
    pub async fn run(&mut self) -> Result<(), ClusterError> {
        if self.registry.is_empty() {
            return Ok(());
        }
        if self.subs.is_none() {
            self.subs = Some(SubscriberSet::new(
                std::mem::take(&mut self.pending_subs),
                self.bus.clone(),
            ));
        }
        if !self.initial_spawned {
            self.spawn_initial().await;
        }

        loop {
            self.drain_exits();
            self.promote_started();
            self.begin_shutdown();
            self.enforce_shutdown_deadline();
            self.drive_rolling_restart();
            self.execute_due_respawns();
            self.publish_stats();
            if self.registry.all_settled() {
                break;
            }
            self.idle().await;
        }

        self.publish(Event::now(EventKind::AllWorkersDown));
        self.publish_stats();
        if let Some(subs) = self.subs.take() {
            subs.shutdown().await;
        }
        Ok(())
    }

    /// Async twin of [`spawn_initial_blocking`](Self::spawn_initial_blocking).
    async fn spawn_initial(&mut self) {
        self.initial_spawned = true;
        let n = self.registry.len() as u8;
        for id in 1..=n {
            if self.flags.shutdown_requested() {
                break;
            }
            self.spawn_slot(id);
            if id < n && !self.cfg.startup_delay.is_zero() {
                time::sleep(self.cfg.startup_delay).await;
            }
        }
        self.publish_stats();
    }

    fn shutting_down(&self) -> bool {
        self.shutdown_started || self.flags.shutdown_requested()
    }

    /// Spawns one incarnation for `id`. A failed spawn counts as a crash of
    /// the slot and feeds the rate limiter.
    fn spawn_slot(&mut self, id: u8) {
        let now = Instant::now();
        let port = self.cfg.port;
        let workers = self.registry.len();

        match self.spawner.spawn(id, port, workers) {
            Ok(pid) => {
                let incarnation = match self.registry.slot_mut(id) {
                    Some(rec) => {
                        rec.note_spawned(pid, now, self.cfg.startup_delay);
                        rec.incarnation
                    }
                    None => return,
                };
                tracing::debug!(worker = id, pid, incarnation, "worker spawned");
                self.publish(
                    Event::now(EventKind::WorkerStarting)
                        .with_worker(id)
                        .with_pid(pid)
                        .with_incarnation(incarnation),
                );
            }
            Err(e) => {
                tracing::warn!(worker = id, error = %e, "spawn failed");
                self.publish(
                    Event::now(EventKind::WorkerCrashed)
                        .with_worker(id)
                        .with_error(e.to_string()),
                );
                let verdict = match self.registry.slot_mut(id) {
                    Some(rec) => {
                        rec.pid = None;
                        rec.status = WorkerStatus::Crashed;
                        rec.respawn_due = None;
                        rec.crash_count += 1;
                        rec.crashes.record(now)
                    }
                    None => return,
                };
                self.decide_respawn(id, now, verdict, false);
            }
        }
    }

    /// Per-pid nonblocking reap over every live slot.
    fn drain_exits(&mut self) {
        let now = Instant::now();
        for (id, pid) in self.registry.live_pairs() {
            match process::try_reap(pid) {
                Ok(Some(exit)) => self.handle_exit(id, pid, exit, now),
                Ok(None) => {}
                Err(e) => tracing::warn!(worker = id, pid, error = %e, "reap failed"),
            }
        }
    }

    fn handle_exit(&mut self, id: u8, pid: u32, exit: WorkerExit, now: Instant) {
        let (was_stopping, had_started, incarnation) = match self.registry.slot_mut(id) {
            Some(rec) => {
                let was_stopping = rec.status == WorkerStatus::Stopping;
                let had_started = rec.started;
                rec.note_exited(exit);
                (was_stopping, had_started, rec.incarnation)
            }
            None => return,
        };
        let is_crash = exit.is_crash(was_stopping);

        let kind = if is_crash {
            EventKind::WorkerCrashed
        } else {
            EventKind::WorkerStopped
        };
        self.publish(
            Event::now(kind)
                .with_worker(id)
                .with_pid(pid)
                .with_exit(exit)
                .with_incarnation(incarnation),
        );
        // An incarnation that never reached active produced no on_start, so
        // it produces no on_exit either.
        if had_started {
            self.cfg.hooks.fire_exit(id, exit, is_crash);
        }

        let verdict = if is_crash {
            match self.registry.slot_mut(id) {
                Some(rec) => {
                    rec.crash_count += 1;
                    rec.crashes.record(now)
                }
                None => return,
            }
        } else {
            RespawnVerdict::Allow
        };

        // A stopping slot during an active rolling cycle was asked to exit
        // by the protocol itself; its replacement is not gated on `respawn`.
        let protocol_replacement = self.rolling.is_some() && was_stopping;
        self.decide_respawn(id, now, verdict, protocol_replacement);
    }

    /// Applies the crash-rate verdict: retire the slot, schedule the
    /// replacement, or leave the slot empty.
    fn decide_respawn(&mut self, id: u8, now: Instant, verdict: RespawnVerdict, protocol_replacement: bool) {
        if self.shutting_down() {
            return;
        }
        match verdict {
            RespawnVerdict::Disable => {
                if let Some(rec) = self.registry.slot_mut(id) {
                    rec.disable();
                }
                self.publish(Event::now(EventKind::WorkerDisabled).with_worker(id));
            }
            RespawnVerdict::Allow => {
                if self.cfg.respawn || protocol_replacement {
                    let delay = self.cfg.respawn_jitter.apply(self.cfg.respawn_delay);
                    if let Some(rec) = self.registry.slot_mut(id) {
                        rec.schedule_respawn(now + delay);
                    }
                    self.publish(
                        Event::now(EventKind::RespawnScheduled)
                            .with_worker(id)
                            .with_delay(delay),
                    );
                }
            }
        }
    }

    /// Promotes `Starting` slots whose startup window elapsed without an
    /// exit; this is where `on_start` fires.
    fn promote_started(&mut self) {
        let now = Instant::now();
        let mut promoted: Vec<(u8, u32)> = Vec::new();
        for rec in self.registry.iter_mut() {
            if rec.status != WorkerStatus::Starting {
                continue;
            }
            if let (Some(due), Some(pid)) = (rec.active_due, rec.pid) {
                if now >= due {
                    rec.note_active();
                    promoted.push((rec.id, pid));
                }
            }
        }
        for (id, pid) in promoted {
            self.publish(Event::now(EventKind::WorkerActive).with_worker(id).with_pid(pid));
            self.cfg.hooks.fire_start(id, pid);
        }
    }

    /// First observation of the shutdown flag: SIGTERM everything live,
    /// cancel pending respawns, abandon any rolling cycle, arm the deadline.
    fn begin_shutdown(&mut self) {
        if self.shutdown_started || !self.flags.shutdown_requested() {
            return;
        }
        self.shutdown_started = true;
        self.shutdown_deadline = Some(Instant::now() + self.cfg.shutdown_grace);
        self.rolling = None;
        self.publish(Event::now(EventKind::ShutdownRequested));
        tracing::info!(grace = ?self.cfg.shutdown_grace, "shutting down workers");

        for rec in self.registry.iter_mut() {
            rec.cancel_respawn();
        }
        for (id, pid) in self.registry.live_pairs() {
            if let Err(e) = process::send_signal(pid, libc::SIGTERM) {
                tracing::warn!(worker = id, pid, error = %e, "SIGTERM delivery failed");
            }
            if let Some(rec) = self.registry.slot_mut(id) {
                rec.note_stopping();
            }
        }
    }

    /// SIGKILL escalation for workers that outlive the grace period.
    fn enforce_shutdown_deadline(&mut self) {
        if self.sigkill_sent {
            return;
        }
        let Some(deadline) = self.shutdown_deadline else {
            return;
        };
        if Instant::now() < deadline {
            return;
        }
        self.sigkill_sent = true;
        for (id, pid) in self.registry.live_pairs() {
            self.publish(Event::now(EventKind::ShutdownTimeout).with_worker(id).with_pid(pid));
            tracing::warn!(worker = id, pid, "worker outlived shutdown grace, sending SIGKILL");
            if let Err(e) = process::send_signal(pid, libc::SIGKILL) {
                tracing::warn!(worker = id, pid, error = %e, "SIGKILL delivery failed");
            }
        }
    }

    /// Starts or advances a rolling restart cycle.
    fn drive_rolling_restart(&mut self) {
        if self.shutting_down() {
            // Requests arriving mid-shutdown are dropped; shutdown wins.
            self.flags.take_restart();
            return;
        }
        if self.flags.take_restart() && self.rolling.is_none() {
            self.rolling = Some(RollingRestart::new(self.registry.len() as u8));
            self.publish(Event::now(EventKind::RestartRequested));
            tracing::info!(workers = self.registry.len(), "rolling restart started");
        }
        let Some(cycle) = self.rolling.as_mut() else {
            return;
        };
        match cycle.advance(&self.registry) {
            RollingAction::Terminate(id) => {
                if let Some(pid) = self.registry.slot(id).and_then(|r| r.pid) {
                    if let Err(e) = process::send_signal(pid, libc::SIGTERM) {
                        tracing::warn!(worker = id, pid, error = %e, "SIGTERM delivery failed");
                    }
                    if let Some(rec) = self.registry.slot_mut(id) {
                        rec.note_stopping();
                    }
                }
            }
            RollingAction::Wait => {}
            RollingAction::Done => {
                self.rolling = None;
                self.total_restarts += 1;
                self.publish(Event::now(EventKind::RestartCompleted));
                tracing::info!(total_restarts = self.total_restarts, "rolling restart completed");
            }
        }
    }

    /// Executes respawns whose delay has elapsed.
    fn execute_due_respawns(&mut self) {
        if self.shutting_down() {
            return;
        }
        let now = Instant::now();
        let due: Vec<u8> = self
            .registry
            .iter()
            .filter(|r| r.status == WorkerStatus::Respawning && r.respawn_due.is_some_and(|d| now >= d))
            .map(|r| r.id)
            .collect();
        for id in due {
            self.spawn_slot(id);
        }
    }

    fn publish_stats(&self) {
        let cluster = ClusterStats::collect(
            &self.registry,
            self.total_restarts,
            self.shutting_down(),
            self.rolling.is_some(),
        );
        let workers = self.registry.iter().map(WorkerStats::from).collect();
        self.stats.publish(cluster, workers);
    }

    fn publish(&self, ev: Event) {
        if let Some(subs) = &self.subs {
            subs.emit(&ev);
        }
        self.bus.publish(ev);
    }

    /// Sleeps until the earliest deadline (promotion, respawn, shutdown
    /// escalation), bounded by `poll_interval`, or until a signal wakes the
    /// loop.
    async fn idle(&self) {
        let now = Instant::now();
        let mut deadline = now + self.cfg.poll_interval;
        for rec in self.registry.iter() {
            match rec.status {
                WorkerStatus::Starting => {
                    if let Some(due) = rec.active_due {
                        deadline = deadline.min(due);
                    }
                }
                WorkerStatus::Respawning => {
                    if let Some(due) = rec.respawn_due {
                        deadline = deadline.min(due);
                    }
                }
                _ => {}
            }
        }
        if !self.sigkill_sent {
            if let Some(dl) = self.shutdown_deadline {
                deadline = deadline.min(dl);
            }
        }

        let sleep_for = deadline.saturating_duration_since(now);
        tokio::select! {
            _ = time::sleep(sleep_for) => {}
            _ = self.flags.notified() => {}
        }
    }
}
