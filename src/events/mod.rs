//! Lifecycle events: types and broadcast bus.
//!
//! This module groups the event **data model** and the **bus** used to
//! publish/subscribe to lifecycle events emitted by the supervisor loop as it
//! spawns, promotes, reaps, respawns, and retires workers.
//!
//! ## Contents
//! - [`EventKind`], [`Event`] event classification and payload metadata
//! - [`Bus`] thin wrapper over `tokio::sync::broadcast`
//!
//! ## Quick reference
//! - **Publisher**: the supervisor loop (plus `SubscriberSet` workers for
//!   overflow/panic anomalies).
//! - **Consumers**: the `SubscriberSet` fan-out, and any embedder holding a
//!   receiver from [`Bus::subscribe`].
//!
//! See `core/mod.rs` for the system-level wiring diagram.

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind};
