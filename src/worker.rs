//! # Worker-side bootstrap: inherited identity.
//!
//! A worker incarnation learns who it is from the environment variables the
//! master set at spawn time. `init` consumes them exactly once: after a
//! successful parse they are scrubbed from the worker's own environment, so
//! processes the *worker* spawns are not mistaken for cluster workers.
//!
//! Malformed or incomplete inheritance (say, a user exporting one of the
//! variables by hand) is ignored and the process proceeds as a master.

use std::env;

use crate::platform::process::{ENV_WORKER_COUNT, ENV_WORKER_ID, ENV_WORKER_PORT};

/// Identity a worker inherits from the master; immutable after `init`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerIdentity {
    /// This worker's slot id, `1..=N`.
    pub id: u8,
    /// The shared listening port.
    pub port: u16,
    /// Total configured workers.
    pub workers: usize,
}

/// Parses an inherited identity from raw variable values.
///
/// A worker id must sit in `[1, workers]`; anything else cannot have come
/// from a well-behaved master.
fn parse(id: &str, port: &str, workers: &str) -> Option<WorkerIdentity> {
    let id: u8 = id.parse().ok()?;
    let port: u16 = port.parse().ok()?;
    let workers: usize = workers.parse().ok()?;
    if id == 0 || port == 0 || workers == 0 || id as usize > workers {
        return None;
    }
    Some(WorkerIdentity { id, port, workers })
}

/// Reads the inherited identity from the environment, if present and valid.
pub(crate) fn from_env() -> Option<WorkerIdentity> {
    let id = env::var(ENV_WORKER_ID).ok()?;
    let port = env::var(ENV_WORKER_PORT).ok()?;
    let workers = env::var(ENV_WORKER_COUNT).ok()?;
    parse(&id, &port, &workers)
}

/// Removes the inheritance variables from this process's environment.
pub(crate) fn scrub_env() {
    env::remove_var(ENV_WORKER_ID);
    env::remove_var(ENV_WORKER_PORT);
    env::remove_var(ENV_WORKER_COUNT);
}
