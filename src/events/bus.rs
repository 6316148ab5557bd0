//! # Event bus for broadcasting lifecycle events.
//!
//! [`Bus`] is a wrapper around [`tokio::sync::broadcast`] that lets the
//! supervisor loop broadcast [`Event`]s to multiple receivers: the built-in
//! subscriber fan-out, and any embedder that wants to watch the cluster
//! (tests subscribe to assert lifecycle ordering).
//!
//! ## Key characteristics
//! - **Broadcast semantics**: all active receivers see a clone of each event
//! - **Non-persistent**: events published with no receivers are dropped
//! - **Bounded capacity**: a lagging receiver skips the oldest events
//!
//! The supervisor can always operate without observers; publishing is
//! fire-and-forget.

use tokio::sync::broadcast;

use super::event::Event;

/// Broadcast channel for supervisor events.
#[derive(Clone)]
pub struct Bus {
    tx: broadcast::Sender<Event>,
}

impl Bus {
    /// Creates a new bus with the given channel capacity (clamped to >= 1).
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Publishes an event to all current receivers.
    ///
    /// Dropped silently when nobody listens.
    pub fn publish(&self, ev: Event) {
        let _ = self.tx.send(ev);
    }

    /// Creates a receiver that sees all events published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventKind;

    #[tokio::test]
    async fn delivers_to_subscribers() {
        let bus = Bus::new(8);
        let mut rx = bus.subscribe();
        bus.publish(Event::now(EventKind::ShutdownRequested).with_worker(1));

        let ev = rx.recv().await.expect("event lost");
        assert_eq!(ev.kind, EventKind::ShutdownRequested);
        assert_eq!(ev.worker, Some(1));
    }

    #[test]
    fn zero_capacity_is_clamped() {
        // Would panic inside broadcast::channel without the clamp.
        let _ = Bus::new(0);
    }
}
