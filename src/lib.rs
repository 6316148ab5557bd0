//! # procvisor
//!
//! **Procvisor** is a prefork process-supervision library for
//! single-threaded network servers.
//!
//! The master process spawns N workers that each serve the same listening
//! port (relying on the server's kernel-level `SO_REUSEPORT`-style binding
//! for per-connection load distribution), monitors them, respawns crashes
//! with sliding-window rate limiting, performs zero-downtime rolling
//! restarts, and coordinates orderly shutdown on external signals.
//!
//! ## Features
//!
//! | Area              | Description                                                    | Key types / entry points                 |
//! |-------------------|----------------------------------------------------------------|------------------------------------------|
//! | **Clustering**    | One binary, N worker processes, one shared port.               | [`cluster::init`], [`Role`], [`get_port`](cluster::get_port) |
//! | **Supervision**   | Reap, respawn with delay/jitter, crash-rate disable.           | [`Supervisor`], [`CrashWindow`], [`JitterPolicy`] |
//! | **Control**       | SIGTERM/SIGINT shutdown with SIGKILL escalation; SIGUSR2 rolling restart. | [`cluster::wait_workers`], [`cluster::graceful_restart`] |
//! | **Hooks**         | Synchronous per-worker lifecycle callbacks in the master.      | [`WorkerHooks`]                          |
//! | **Observability** | Event bus, subscriber fan-out, tracing log subscriber, stats snapshots. | [`Subscribe`], [`LogSubscriber`], [`ClusterStats`] |
//! | **Errors**        | Typed setup/API errors; worker failures never abort the master. | [`ClusterError`]                        |
//!
//! ## Life of a cluster
//!
//! ```no_run
//! use procvisor::{cluster, ClusterConfig, Role};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut cfg = ClusterConfig::new(3000);
//!     cfg.workers = 0; // auto-detect logical CPUs
//!
//!     match cluster::init(cfg)? {
//!         Role::Worker => {
//!             let port = cluster::get_port();
//!             // bind with SO_REUSEPORT and serve; SIGTERM means exit
//!             let _ = port;
//!         }
//!         Role::Master => cluster::wait_workers()?,
//!     }
//!     Ok(())
//! }
//! ```
//!
//! Workers are fresh executions of the same binary with their identity
//! inherited through the environment, so respawned and rolling-restarted
//! incarnations re-enter `main` and reach the server code with no extra
//! cooperation.
//!
//! This crate targets a POSIX process/signal model.

pub mod cluster;
pub mod config;
pub mod core;
pub mod error;
pub mod events;
pub mod platform;
pub mod policies;
pub mod registry;
pub mod stats;
pub mod subscribers;

mod worker;

/// Upper bound on the worker count: slot ids are a single byte with `0`
/// reserved for the master and `255` left unassigned.
pub const MAX_WORKERS: usize = 254;

// ---- Public re-exports ----

pub use cluster::{
    all_worker_stats, cpus, cpus_physical, get_port, graceful_restart, init, is_master, is_worker,
    signal_workers, stats, wait_workers, worker_count, worker_id, worker_stats, Role,
};
pub use config::{ClusterConfig, ExitHook, StartHook, WorkerHooks};
pub use crate::core::{SignalFlags, Supervisor};
pub use error::ClusterError;
pub use events::{Bus, Event, EventKind};
pub use platform::{SpawnCommand, WorkerExit};
pub use policies::{CrashWindow, JitterPolicy, RespawnVerdict};
pub use registry::WorkerStatus;
pub use stats::{ClusterStats, StatsHandle, WorkerStats};
pub use subscribers::{LogSubscriber, Subscribe, SubscriberSet};
pub use worker::WorkerIdentity;
