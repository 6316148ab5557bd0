//! # Cluster configuration.
//!
//! Provides [`ClusterConfig`], the frozen-after-init settings for the master
//! and every worker it spawns, and [`WorkerHooks`], the synchronous lifecycle
//! callbacks.
//!
//! ## Sentinel values
//! - `workers = 0` → auto-detect logical CPUs, capped at [`MAX_WORKERS`]
//! - `port = 0` → invalid; rejected by [`ClusterConfig::validate`]
//!
//! ## Example
//! ```
//! use std::time::Duration;
//! use procvisor::ClusterConfig;
//!
//! let mut cfg = ClusterConfig::new(3000);
//! cfg.workers = 4;
//! cfg.shutdown_grace = Duration::from_secs(10);
//!
//! assert!(cfg.validate().is_ok());
//! assert_eq!(cfg.worker_count(), 4);
//! ```

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::error::ClusterError;
use crate::platform::{self, SpawnCommand, WorkerExit};
use crate::policies::JitterPolicy;
use crate::subscribers::Subscribe;
use crate::MAX_WORKERS;

/// Callback invoked when a worker finishes its startup window.
pub type StartHook = Arc<dyn Fn(u8, u32) + Send + Sync>;
/// Callback invoked when a worker incarnation exits; the bool is `true` for
/// a crash, `false` for a graceful stop.
pub type ExitHook = Arc<dyn Fn(u8, WorkerExit, bool) + Send + Sync>;

/// Synchronous lifecycle callbacks.
///
/// Both run only in the master, only from the supervisor loop, never from
/// signal context, so they may allocate, log, and make syscalls freely. For
/// a given slot, calls arrive in lifecycle order and never overlap; a
/// worker's `on_start` strictly precedes the `on_exit` of the same
/// incarnation.
#[derive(Clone, Default)]
pub struct WorkerHooks {
    /// Invoked with `(worker_id, pid)` when a worker becomes active.
    pub on_start: Option<StartHook>,
    /// Invoked with `(worker_id, exit, is_crash)` when an incarnation that
    /// reached active exits. Incarnations that die inside their startup
    /// window never started, so they produce no call.
    pub on_exit: Option<ExitHook>,
}

impl WorkerHooks {
    pub(crate) fn fire_start(&self, id: u8, pid: u32) {
        if let Some(hook) = &self.on_start {
            hook(id, pid);
        }
    }

    pub(crate) fn fire_exit(&self, id: u8, exit: WorkerExit, is_crash: bool) {
        if let Some(hook) = &self.on_exit {
            hook(id, exit, is_crash);
        }
    }
}

impl fmt::Debug for WorkerHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerHooks")
            .field("on_start", &self.on_start.is_some())
            .field("on_exit", &self.on_exit.is_some())
            .finish()
    }
}

/// Configuration for the cluster; frozen once `init` accepts it.
///
/// Defines:
/// - **Topology**: worker count and the shared listening port
/// - **Respawn behavior**: enable flag, delay, jitter, crash-rate window
/// - **Shutdown behavior**: grace period before SIGKILL escalation
/// - **Observability**: lifecycle hooks and event subscribers
#[derive(Clone)]
pub struct ClusterConfig {
    /// Worker count; `0` = logical CPU count, capped at [`MAX_WORKERS`].
    pub workers: usize,
    /// Port every worker inherits; must be nonzero. All workers share it,
    /// relying on the server's kernel-level port reuse (`SO_REUSEPORT`) for
    /// per-connection load distribution.
    pub port: u16,
    /// Whether crashed workers are respawned.
    pub respawn: bool,
    /// Maximum wait for workers to exit after SIGTERM before SIGKILL.
    pub shutdown_grace: Duration,
    /// Startup window: stagger between initial spawns, and how long a fresh
    /// incarnation must survive to be promoted to active.
    pub startup_delay: Duration,
    /// Delay between an exit and the replacement spawn.
    pub respawn_delay: Duration,
    /// Span within which `respawn_max_crashes` crashes disable a slot.
    pub respawn_window: Duration,
    /// Crash budget per [`respawn_window`](Self::respawn_window); min 1.
    pub respawn_max_crashes: usize,
    /// Randomization applied to `respawn_delay`.
    pub respawn_jitter: JitterPolicy,
    /// Upper bound on the supervisor loop's sleep between bookkeeping passes.
    pub poll_interval: Duration,
    /// Capacity of the event bus ring buffer.
    pub bus_capacity: usize,
    /// What a worker incarnation executes; `None` = re-execute the current
    /// binary with the master's own arguments.
    pub worker_command: Option<SpawnCommand>,
    /// Synchronous lifecycle callbacks (master only).
    pub hooks: WorkerHooks,
    /// Event observers (master only).
    pub subscribers: Vec<Arc<dyn Subscribe>>,
}

impl ClusterConfig {
    /// Configuration with defaults and the given listening port.
    pub fn new(port: u16) -> Self {
        Self {
            port,
            ..Self::default()
        }
    }

    /// Validates the configuration without touching process state.
    ///
    /// Rejected: `port == 0`, `workers > MAX_WORKERS`,
    /// `respawn_max_crashes == 0`.
    pub fn validate(&self) -> Result<(), ClusterError> {
        if self.port == 0 {
            return Err(ClusterError::config("port must be nonzero"));
        }
        if self.workers > MAX_WORKERS {
            return Err(ClusterError::config(format!(
                "workers must be <= {MAX_WORKERS}, got {}",
                self.workers
            )));
        }
        if self.respawn_max_crashes == 0 {
            return Err(ClusterError::config("respawn_max_crashes must be >= 1"));
        }
        Ok(())
    }

    /// Resolved worker count: the configured value, or the logical CPU count
    /// when `workers == 0`.
    pub fn worker_count(&self) -> usize {
        if self.workers == 0 {
            platform::cpu::logical()
        } else {
            self.workers
        }
    }
}

impl Default for ClusterConfig {
    /// Default configuration:
    ///
    /// - `workers = 0` (auto-detect logical CPUs)
    /// - `port = 0` (**must** be set; validation rejects it otherwise)
    /// - `respawn = true`
    /// - `shutdown_grace = 15s`
    /// - `startup_delay = 100ms`, `respawn_delay = 100ms`
    /// - `respawn_window = 5s`, `respawn_max_crashes = 3`
    /// - `respawn_jitter = JitterPolicy::None`
    /// - `poll_interval = 50ms`, `bus_capacity = 1024`
    fn default() -> Self {
        Self {
            workers: 0,
            port: 0,
            respawn: true,
            shutdown_grace: Duration::from_secs(15),
            startup_delay: Duration::from_millis(100),
            respawn_delay: Duration::from_millis(100),
            respawn_window: Duration::from_secs(5),
            respawn_max_crashes: 3,
            respawn_jitter: JitterPolicy::None,
            poll_interval: Duration::from_millis(50),
            bus_capacity: 1024,
            worker_command: None,
            hooks: WorkerHooks::default(),
            subscribers: Vec::new(),
        }
    }
}

impl fmt::Debug for ClusterConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClusterConfig")
            .field("workers", &self.workers)
            .field("port", &self.port)
            .field("respawn", &self.respawn)
            .field("shutdown_grace", &self.shutdown_grace)
            .field("startup_delay", &self.startup_delay)
            .field("respawn_delay", &self.respawn_delay)
            .field("respawn_window", &self.respawn_window)
            .field("respawn_max_crashes", &self.respawn_max_crashes)
            .field("respawn_jitter", &self.respawn_jitter)
            .field("poll_interval", &self.poll_interval)
            .field("bus_capacity", &self.bus_capacity)
            .field("worker_command", &self.worker_command)
            .field("hooks", &self.hooks)
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_port_is_rejected() {
        let cfg = ClusterConfig::default();
        assert!(matches!(
            cfg.validate(),
            Err(ClusterError::Config { .. })
        ));
    }

    #[test]
    fn sane_config_passes() {
        let mut cfg = ClusterConfig::new(3000);
        cfg.workers = 2;
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn worker_count_is_bounded() {
        let mut cfg = ClusterConfig::new(3000);
        cfg.workers = MAX_WORKERS + 1;
        assert!(cfg.validate().is_err());

        cfg.workers = 0;
        assert!(cfg.validate().is_ok());
        let auto = cfg.worker_count();
        assert!((1..=MAX_WORKERS).contains(&auto));
    }

    #[test]
    fn zero_crash_budget_is_rejected() {
        let mut cfg = ClusterConfig::new(3000);
        cfg.respawn_max_crashes = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn hooks_fire_only_when_set() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let hooks = WorkerHooks::default();
        hooks.fire_start(1, 42);
        hooks.fire_exit(1, WorkerExit { code: Some(0), signal: None }, false);

        let calls = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&calls);
        let hooks = WorkerHooks {
            on_start: Some(Arc::new(move |_, _| {
                c.fetch_add(1, Ordering::SeqCst);
            })),
            on_exit: None,
        };
        hooks.fire_start(1, 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
