//! # Control flags shared between signal context and the supervisor loop.
//!
//! Signal arrival must never touch the registry; it only flips an atomic and
//! wakes the loop. [`SignalFlags`] is that narrow surface: two coalescing
//! request flags plus a [`Notify`] the loop parks on between deadlines.
//!
//! ## Rules
//! - Flags coalesce: N deliveries of SIGTERM set `shutdown` once, and a
//!   false→true transition is never lost.
//! - `shutdown` is one-way; there is no un-requesting a shutdown.
//! - `restart` is consumed by the loop when a rolling cycle starts, so a
//!   request arriving *during* a cycle is a no-op rather than a queued
//!   second cycle.

use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::Notify;

/// Coalescing request flags plus a loop wakeup.
#[derive(Debug, Default)]
pub struct SignalFlags {
    shutdown: AtomicBool,
    restart: AtomicBool,
    wake: Notify,
}

impl SignalFlags {
    /// Requests orderly shutdown and wakes the loop. Idempotent.
    pub fn request_shutdown(&self) {
        self.shutdown.store(true, Ordering::Release);
        self.wake.notify_one();
    }

    /// Requests a rolling restart and wakes the loop. Idempotent while a
    /// cycle is already running.
    pub fn request_restart(&self) {
        self.restart.store(true, Ordering::Release);
        self.wake.notify_one();
    }

    /// Wakes the loop without changing any flag (SIGCHLD path).
    pub fn wake(&self) {
        self.wake.notify_one();
    }

    /// True once shutdown was requested.
    pub fn shutdown_requested(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }

    /// Consumes a pending restart request, if any.
    pub fn take_restart(&self) -> bool {
        self.restart.swap(false, Ordering::AcqRel)
    }

    /// Parks until the next wakeup.
    pub async fn notified(&self) {
        self.wake.notified().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shutdown_is_sticky_and_coalescing() {
        let flags = SignalFlags::default();
        assert!(!flags.shutdown_requested());

        flags.request_shutdown();
        flags.request_shutdown();
        assert!(flags.shutdown_requested());
    }

    #[test]
    fn restart_is_consumed_once() {
        let flags = SignalFlags::default();
        assert!(!flags.take_restart());

        flags.request_restart();
        flags.request_restart();
        assert!(flags.take_restart());
        assert!(!flags.take_restart());
    }

    #[tokio::test]
    async fn requests_wake_a_parked_waiter() {
        use std::sync::Arc;
        use std::time::Duration;

        let flags = Arc::new(SignalFlags::default());
        let waiter = Arc::clone(&flags);
        let handle = tokio::spawn(async move { waiter.notified().await });

        tokio::time::sleep(Duration::from_millis(10)).await;
        flags.request_shutdown();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("waiter was never woken")
            .expect("waiter panicked");
    }
}
