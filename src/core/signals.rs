//! # Master signal listener.
//!
//! Translates OS signals into [`SignalFlags`] transitions. The listener is a
//! background task on the master's runtime; the supervisor loop never handles
//! a signal directly, it only observes flags at its next iteration.
//!
//! | Signal           | Effect                       |
//! |------------------|------------------------------|
//! | SIGTERM, SIGINT  | `request_shutdown()`         |
//! | SIGUSR2          | `request_restart()`          |
//! | SIGCHLD          | wake the loop to reap        |
//!
//! All other signals keep their default disposition. Workers are fresh
//! executions of the binary, so they start with default dispositions and may
//! install whatever handlers they want; nothing here runs in a worker.

use std::sync::Arc;

use tokio::signal::unix::{signal, SignalKind};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::ClusterError;

use super::flags::SignalFlags;

/// Installs the four signal streams and spawns the listener task.
///
/// Stream installation happens before spawning so a refusal surfaces as
/// [`ClusterError::Signal`] instead of a dead listener. The task runs until
/// `cancel` fires (the loop returned).
pub(crate) fn spawn_listener(
    flags: Arc<SignalFlags>,
    cancel: CancellationToken,
) -> Result<JoinHandle<()>, ClusterError> {
    let mut sigterm = signal(SignalKind::terminate()).map_err(|source| ClusterError::Signal { source })?;
    let mut sigint = signal(SignalKind::interrupt()).map_err(|source| ClusterError::Signal { source })?;
    let mut sigusr2 = signal(SignalKind::user_defined2()).map_err(|source| ClusterError::Signal { source })?;
    let mut sigchld = signal(SignalKind::child()).map_err(|source| ClusterError::Signal { source })?;

    Ok(tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = sigterm.recv() => flags.request_shutdown(),
                _ = sigint.recv() => flags.request_shutdown(),
                _ = sigusr2.recv() => flags.request_restart(),
                _ = sigchld.recv() => flags.wake(),
            }
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;
    use std::time::Duration;

    #[tokio::test]
    async fn sigusr2_sets_the_restart_flag() {
        let flags = Arc::new(SignalFlags::default());
        let cancel = CancellationToken::new();
        let handle = spawn_listener(Arc::clone(&flags), cancel.clone()).expect("listener install");

        kill(Pid::this(), Signal::SIGUSR2).expect("self-signal");

        let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
        loop {
            if flags.take_restart() {
                break;
            }
            assert!(
                tokio::time::Instant::now() < deadline,
                "restart flag never set"
            );
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        cancel.cancel();
        let _ = handle.await;
    }
}
