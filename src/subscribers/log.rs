//! # Structured logging subscriber.
//!
//! [`LogSubscriber`] renders every supervisor event through `tracing`, so a
//! master process gets a readable lifecycle log by installing any
//! `tracing-subscriber` and adding this to the config:
//!
//! ```text
//! INFO worker=1 pid=4242 incarnation=1 worker spawned
//! INFO worker=1 serving
//! WARN worker=1 code=1 worker crashed
//! INFO worker=1 delay=100ms respawn scheduled
//! ERROR worker=1 respawns disabled: crash rate exceeded
//! ```

use async_trait::async_trait;

use crate::events::{Event, EventKind};

use super::Subscribe;

/// Built-in subscriber that logs every event via `tracing`.
///
/// Severity mapping: routine lifecycle at `info`, crashes and drops at
/// `warn`, disables and subscriber panics at `error`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSubscriber;

#[async_trait]
impl Subscribe for LogSubscriber {
    async fn on_event(&self, e: &Event) {
        match e.kind {
            EventKind::WorkerStarting => {
                tracing::info!(
                    worker = e.worker,
                    pid = e.pid,
                    incarnation = e.incarnation,
                    "worker spawned"
                );
            }
            EventKind::WorkerActive => {
                tracing::info!(worker = e.worker, pid = e.pid, "serving");
            }
            EventKind::WorkerStopped => {
                tracing::info!(worker = e.worker, code = e.exit_code, signal = e.signal, "worker stopped");
            }
            EventKind::WorkerCrashed => {
                tracing::warn!(
                    worker = e.worker,
                    code = e.exit_code,
                    signal = e.signal,
                    error = e.error.as_deref(),
                    "worker crashed"
                );
            }
            EventKind::RespawnScheduled => {
                tracing::info!(worker = e.worker, delay = ?e.delay, "respawn scheduled");
            }
            EventKind::WorkerDisabled => {
                tracing::error!(worker = e.worker, "respawns disabled: crash rate exceeded");
            }
            EventKind::ShutdownRequested => {
                tracing::info!("shutdown requested");
            }
            EventKind::ShutdownTimeout => {
                tracing::warn!(worker = e.worker, pid = e.pid, "shutdown grace exceeded, killing");
            }
            EventKind::RestartRequested => {
                tracing::info!("rolling restart started");
            }
            EventKind::RestartCompleted => {
                tracing::info!("rolling restart completed");
            }
            EventKind::AllWorkersDown => {
                tracing::info!("all workers down");
            }
            EventKind::SubscriberOverflow => {
                tracing::warn!(detail = e.error.as_deref(), "subscriber overflow");
            }
            EventKind::SubscriberPanicked => {
                tracing::error!(detail = e.error.as_deref(), "subscriber panicked");
            }
        }
    }

    fn name(&self) -> &'static str {
        "log"
    }
}
