//! # Cluster statistics: published snapshots of supervisor state.
//!
//! The supervisor loop owns the registry exclusively. Once per iteration it
//! publishes an immutable copy into a shared [`StatsHandle`]; readers
//! (`cluster::stats`, hooks, embedders) only ever touch that cell. A reading
//! may therefore lag the loop by one iteration, and readers never contend
//! with the loop beyond a short lock on the cell itself.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::registry::{Registry, WorkerRecord, WorkerStatus};

/// Aggregate counters for the whole cluster.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClusterStats {
    /// Configured number of worker slots.
    pub workers_total: usize,
    /// Slots inside their startup window.
    pub starting: usize,
    /// Slots serving.
    pub active: usize,
    /// Slots asked to stop, exit pending.
    pub stopping: usize,
    /// Empty slots (exited, nothing scheduled).
    pub crashed: usize,
    /// Empty slots with a replacement spawn scheduled.
    pub respawning: usize,
    /// Slots retired by the crash-rate limiter.
    pub disabled: usize,
    /// Crashes observed across all slots.
    pub total_crashes: u64,
    /// Completed rolling-restart cycles (respawns do not count).
    pub total_restarts: u64,
    /// Whether orderly shutdown has begun.
    pub shutdown_requested: bool,
    /// Whether a rolling restart cycle is running.
    pub restart_in_progress: bool,
}

impl ClusterStats {
    pub(crate) fn collect(
        registry: &Registry,
        total_restarts: u64,
        shutdown_requested: bool,
        restart_in_progress: bool,
    ) -> Self {
        Self {
            workers_total: registry.len(),
            starting: registry.count(WorkerStatus::Starting),
            active: registry.count(WorkerStatus::Active),
            stopping: registry.count(WorkerStatus::Stopping),
            crashed: registry.count(WorkerStatus::Crashed),
            respawning: registry.count(WorkerStatus::Respawning),
            disabled: registry.count(WorkerStatus::Disabled),
            total_crashes: registry.iter().map(|r| r.crash_count).sum(),
            total_restarts,
            shutdown_requested,
            restart_in_progress,
        }
    }
}

/// Point-in-time copy of one worker slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerStats {
    /// Slot id.
    pub id: u8,
    /// Pid of the current incarnation, if live.
    pub pid: Option<u32>,
    /// Inherited port.
    pub port: u16,
    /// Lifecycle state.
    pub status: WorkerStatus,
    /// Crashes observed for this slot.
    pub crash_count: u64,
    /// Incarnations spawned so far.
    pub incarnation: u64,
    /// Exit code of the last termination, if it exited normally.
    pub last_exit_code: Option<i32>,
    /// Terminating signal of the last termination, if signaled.
    pub last_exit_signal: Option<i32>,
}

impl From<&WorkerRecord> for WorkerStats {
    fn from(rec: &WorkerRecord) -> Self {
        Self {
            id: rec.id,
            pid: rec.pid,
            port: rec.port,
            status: rec.status,
            crash_count: rec.crash_count,
            incarnation: rec.incarnation,
            last_exit_code: rec.last_exit.and_then(|e| e.code),
            last_exit_signal: rec.last_exit.and_then(|e| e.signal),
        }
    }
}

#[derive(Debug, Default)]
struct Snapshot {
    cluster: ClusterStats,
    workers: Vec<WorkerStats>,
}

/// Shared cell holding the latest published snapshot.
///
/// Cheap to clone; all clones observe the same cell.
#[derive(Debug, Clone, Default)]
pub struct StatsHandle {
    inner: Arc<RwLock<Snapshot>>,
}

impl StatsHandle {
    /// Replaces the published snapshot. Called by the supervisor loop only.
    pub(crate) fn publish(&self, cluster: ClusterStats, workers: Vec<WorkerStats>) {
        let mut snap = self.inner.write();
        snap.cluster = cluster;
        snap.workers = workers;
    }

    /// Latest aggregate counters.
    pub fn cluster(&self) -> ClusterStats {
        self.inner.read().cluster
    }

    /// Latest copy of one slot.
    pub fn worker(&self, id: u8) -> Option<WorkerStats> {
        self.inner.read().workers.iter().find(|w| w.id == id).copied()
    }

    /// Latest copy of every slot, in id order.
    pub fn workers(&self) -> Vec<WorkerStats> {
        self.inner.read().workers.clone()
    }

    /// `(id, pid)` of every slot that was live at publication.
    pub fn live_pids(&self) -> Vec<(u8, u32)> {
        self.inner
            .read()
            .workers
            .iter()
            .filter_map(|w| w.pid.map(|pid| (w.id, pid)))
            .collect()
    }
}
