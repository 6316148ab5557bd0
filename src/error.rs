//! # Error types for cluster initialization and control.
//!
//! The supervisor deliberately has a small error surface: everything that can
//! go wrong while workers are running (a crash, a failed spawn, a reap error,
//! a worker that ignores SIGTERM) is handled *inside* the loop and surfaced as
//! events, never as an error return. [`ClusterError`] covers only the places
//! where the caller made a mistake or the OS refused setup:
//!
//! - configuration rejected before anything was spawned,
//! - calling a master-only operation from the wrong process,
//! - failure to install the signal listener or build the loop runtime.

use std::io;

use thiserror::Error;

/// Errors produced by cluster setup and the control API.
///
/// Runtime worker failures are not represented here; they feed the respawn
/// logic and the event stream instead.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ClusterError {
    /// Configuration was rejected; no process state was modified.
    #[error("invalid configuration: {reason}")]
    Config {
        /// Human-readable description of the rejected field.
        reason: String,
    },

    /// `init` was called a second time in the same process.
    #[error("cluster already initialized in this process")]
    AlreadyInitialized,

    /// The supervisor loop was already consumed by a previous `wait_workers`.
    #[error("the supervisor loop has already run in this process")]
    AlreadyRan,

    /// A master-only operation was invoked from a worker or before `init`.
    #[error("'{op}' is only available in the master process")]
    NotMaster {
        /// Name of the rejected operation.
        op: &'static str,
    },

    /// The OS refused to install the master's signal listener.
    #[error("failed to install signal listener: {source}")]
    Signal {
        #[source]
        source: io::Error,
    },

    /// The supervisor runtime could not be built, or the worker executable
    /// path could not be resolved for spawning.
    #[error("failed to set up the supervisor: {source}")]
    Runtime {
        #[source]
        source: io::Error,
    },

    /// A stats lookup referenced a worker id outside the configured range.
    #[error("no worker slot with id {id}")]
    UnknownWorker {
        /// The out-of-range worker id.
        id: u8,
    },
}

impl ClusterError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            ClusterError::Config { .. } => "cluster_config_invalid",
            ClusterError::AlreadyInitialized => "cluster_already_initialized",
            ClusterError::AlreadyRan => "cluster_already_ran",
            ClusterError::NotMaster { .. } => "cluster_not_master",
            ClusterError::Signal { .. } => "cluster_signal_install",
            ClusterError::Runtime { .. } => "cluster_runtime_setup",
            ClusterError::UnknownWorker { .. } => "cluster_unknown_worker",
        }
    }

    pub(crate) fn config(reason: impl Into<String>) -> Self {
        ClusterError::Config {
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_are_stable() {
        assert_eq!(
            ClusterError::config("port is zero").as_label(),
            "cluster_config_invalid"
        );
        assert_eq!(
            ClusterError::NotMaster { op: "stats" }.as_label(),
            "cluster_not_master"
        );
    }

    #[test]
    fn display_includes_context() {
        let err = ClusterError::NotMaster { op: "wait_workers" };
        assert!(err.to_string().contains("wait_workers"));

        let err = ClusterError::UnknownWorker { id: 7 };
        assert!(err.to_string().contains('7'));
    }
}
