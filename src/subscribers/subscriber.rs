//! # Event subscriber trait.
//!
//! [`Subscribe`] is the extension point for plugging custom event handlers
//! into the master process (metrics export, alerting, audit trails).
//!
//! Each subscriber gets:
//! - **Dedicated worker task** (runs on the master's runtime, independently
//!   of the supervisor loop)
//! - **Bounded queue** (capacity via [`Subscribe::queue_capacity`])
//! - **Panic isolation** (panics are caught and reported, the cluster keeps
//!   running)
//!
//! ## Overflow behavior
//! When a subscriber's queue is full:
//! 1. The event is **dropped** for this subscriber only.
//! 2. The drop is logged with the subscriber's name.
//! 3. Other subscribers are unaffected.

use async_trait::async_trait;

use crate::events::Event;

/// Observer of supervisor events.
///
/// Runs only in the master process. Implementations should handle errors
/// internally and avoid blocking; slow processing backs up only this
/// subscriber's own queue.
#[async_trait]
pub trait Subscribe: Send + Sync + 'static {
    /// Processes a single event.
    ///
    /// Called from the subscriber's dedicated worker task, in queue (FIFO)
    /// order. Panics are caught and isolated.
    async fn on_event(&self, event: &Event);

    /// Subscriber name for logging and anomaly events.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Preferred queue capacity for this subscriber.
    fn queue_capacity(&self) -> usize {
        1024
    }
}
