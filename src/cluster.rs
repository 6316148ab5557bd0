//! # Cluster facade: the process-global API.
//!
//! One call to [`init`] decides what this process is. A process with no
//! inherited identity becomes the **master**: its workers are spawned before
//! `init` returns, and user code is expected to call [`wait_workers`] to run
//! the supervisor. A process spawned by a master becomes a **worker**: `init`
//! records the inherited identity and returns immediately so user code can
//! start the server on [`get_port`].
//!
//! ```no_run
//! use procvisor::{cluster, ClusterConfig, Role};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut cfg = ClusterConfig::new(3000);
//!     cfg.workers = 4;
//!
//!     match cluster::init(cfg)? {
//!         Role::Worker => {
//!             // run the server on cluster::get_port(); the kernel spreads
//!             // connections across workers via SO_REUSEPORT-style binding
//!         }
//!         Role::Master => {
//!             cluster::wait_workers()?;
//!         }
//!     }
//!     Ok(())
//! }
//! ```
//!
//! Every incarnation of a worker, including respawns and rolling-restart
//! replacements, is a fresh execution of the binary that takes the
//! `Role::Worker` branch; nothing but `init` has to cooperate.
//!
//! The global state behind this module is the narrow kernel the design
//! needs: the role decision, the shared request flags, and the published
//! stats cell. The registry itself lives inside the [`Supervisor`] and dies
//! with `wait_workers`.

use std::sync::OnceLock;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use crate::config::ClusterConfig;
use crate::core::{spawn_listener, SignalFlags, Supervisor};
use crate::error::ClusterError;
use crate::platform::{self, process};
use crate::stats::{ClusterStats, StatsHandle, WorkerStats};
use crate::worker::{self, WorkerIdentity};

/// What `init` decided this process is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// The supervising process; call [`wait_workers`] next.
    Master,
    /// A worker incarnation; run the server on [`get_port`].
    Worker,
}

struct MasterState {
    flags: std::sync::Arc<SignalFlags>,
    stats: StatsHandle,
    workers: usize,
    supervisor: Mutex<Option<Supervisor>>,
}

enum ProcessState {
    Master(MasterState),
    Worker(WorkerIdentity),
}

static CLUSTER: OnceLock<ProcessState> = OnceLock::new();
static INIT_GUARD: Mutex<()> = Mutex::new(());

/// Initializes clustering for this process.
///
/// In a process with no inherited identity this validates `cfg`, spawns the
/// initial workers (staggered by `startup_delay`), installs nothing yet in
/// the way of signal handling (that belongs to [`wait_workers`]), and
/// returns [`Role::Master`]. In a spawned worker it records the inherited
/// identity, scrubs the inheritance variables, and returns [`Role::Worker`].
///
/// ### Errors
/// - [`ClusterError::Config`] for an invalid configuration; nothing is
///   spawned and no global state is modified, so [`is_master`] and
///   [`is_worker`] both stay false.
/// - [`ClusterError::AlreadyInitialized`] on a second call.
pub fn init(cfg: ClusterConfig) -> Result<Role, ClusterError> {
    let _guard = INIT_GUARD.lock();
    cfg.validate()?;
    if CLUSTER.get().is_some() {
        return Err(ClusterError::AlreadyInitialized);
    }

    if let Some(identity) = worker::from_env() {
        worker::scrub_env();
        let _ = CLUSTER.set(ProcessState::Worker(identity));
        return Ok(Role::Worker);
    }

    let mut supervisor = Supervisor::new(cfg)?;
    supervisor.spawn_initial_blocking();
    let state = MasterState {
        flags: supervisor.flags(),
        stats: supervisor.stats(),
        workers: supervisor.worker_count(),
        supervisor: Mutex::new(Some(supervisor)),
    };
    let _ = CLUSTER.set(ProcessState::Master(state));
    Ok(Role::Master)
}

fn master(op: &'static str) -> Result<&'static MasterState, ClusterError> {
    match CLUSTER.get() {
        Some(ProcessState::Master(state)) => Ok(state),
        _ => Err(ClusterError::NotMaster { op }),
    }
}

fn identity() -> Option<&'static WorkerIdentity> {
    match CLUSTER.get() {
        Some(ProcessState::Worker(identity)) => Some(identity),
        _ => None,
    }
}

/// Runs the supervisor loop to completion. Master-only.
///
/// Blocks on a current-thread runtime until every slot settles: shutdown
/// completed, or every worker retired/left dead with respawns off. The
/// signal listener (SIGTERM/SIGINT → shutdown, SIGUSR2 → rolling restart,
/// SIGCHLD → reap wakeup) lives exactly as long as the loop.
pub fn wait_workers() -> Result<(), ClusterError> {
    let state = master("wait_workers")?;
    let mut supervisor = state
        .supervisor
        .lock()
        .take()
        .ok_or(ClusterError::AlreadyRan)?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|source| ClusterError::Runtime { source })?;

    runtime.block_on(async {
        let cancel = CancellationToken::new();
        let listener = spawn_listener(supervisor.flags(), cancel.clone())?;
        let result = supervisor.run().await;
        cancel.cancel();
        let _ = listener.await;
        result
    })
}

/// Requests a rolling restart of all workers. Master-only.
///
/// Sets the restart flag consumed by the supervisor loop; calling it while a
/// cycle is already running is a no-op, so back-to-back calls produce
/// exactly one cycle.
pub fn graceful_restart() -> Result<(), ClusterError> {
    master("graceful_restart")?.flags.request_restart();
    Ok(())
}

/// Sends `sig` to every live worker. Master-only.
///
/// Delivery is best-effort against the latest published snapshot; returns
/// how many workers were signaled. Unknown signal numbers are passed through
/// to the OS untouched.
pub fn signal_workers(sig: i32) -> Result<usize, ClusterError> {
    let state = master("signal_workers")?;
    let mut sent = 0;
    for (id, pid) in state.stats.live_pids() {
        match process::send_signal(pid, sig) {
            Ok(()) => sent += 1,
            Err(e) => tracing::warn!(worker = id, pid, sig, error = %e, "signal delivery failed"),
        }
    }
    Ok(sent)
}

/// True in a process where `init` returned [`Role::Master`].
pub fn is_master() -> bool {
    matches!(CLUSTER.get(), Some(ProcessState::Master(_)))
}

/// True in a process where `init` returned [`Role::Worker`].
pub fn is_worker() -> bool {
    identity().is_some()
}

/// This worker's slot id; `0` in the master (and before `init`).
pub fn worker_id() -> u8 {
    identity().map(|w| w.id).unwrap_or(0)
}

/// The inherited listening port; `0` in the master (and before `init`).
pub fn get_port() -> u16 {
    identity().map(|w| w.port).unwrap_or(0)
}

/// Configured number of workers; `0` before `init`.
pub fn worker_count() -> usize {
    match CLUSTER.get() {
        Some(ProcessState::Master(state)) => state.workers,
        Some(ProcessState::Worker(identity)) => identity.workers,
        None => 0,
    }
}

/// Logical CPU count, clamped to `[1, MAX_WORKERS]`. Works anywhere.
pub fn cpus() -> usize {
    platform::cpu::logical()
}

/// Physical core count, clamped to `[1, MAX_WORKERS]`. Works anywhere.
pub fn cpus_physical() -> usize {
    platform::cpu::physical()
}

/// Latest aggregate cluster counters. Master-only.
///
/// Snapshots are published once per supervisor iteration, so a reading may
/// lag the loop by one pass.
pub fn stats() -> Result<ClusterStats, ClusterError> {
    Ok(master("stats")?.stats.cluster())
}

/// Latest snapshot of one worker slot. Master-only.
pub fn worker_stats(id: u8) -> Result<WorkerStats, ClusterError> {
    master("worker_stats")?
        .stats
        .worker(id)
        .ok_or(ClusterError::UnknownWorker { id })
}

/// Latest snapshot of every worker slot, in id order. Master-only.
pub fn all_worker_stats() -> Result<Vec<WorkerStats>, ClusterError> {
    Ok(master("all_worker_stats")?.stats.workers())
}
