//! # Event subscribers for cluster observability.
//!
//! This module provides the [`Subscribe`] trait and the fan-out machinery
//! that delivers supervisor events to observers without ever blocking the
//! control loop.
//!
//! ## Architecture
//! ```text
//! Event flow:
//!   supervisor loop ── emit(&Event) ──► SubscriberSet
//!                                            │
//!                                 ┌──────────┼──────────┐
//!                                 ▼          ▼          ▼
//!                            [queue S1] [queue S2] [queue SN]
//!                                 │          │          │
//!                              worker     worker     worker
//!                                 ▼          ▼          ▼
//!                          LogSubscriber  Metrics   Custom ...
//! ```
//!
//! Each subscriber gets a dedicated worker task and a bounded queue; a slow
//! or panicking subscriber affects only itself. The master's callbacks
//! (`on_start`/`on_exit`) are *not* subscribers: they run synchronously in
//! the supervisor loop with strict per-slot ordering, while subscribers are
//! the asynchronous observability path.

mod log;
mod set;
mod subscriber;

pub use log::LogSubscriber;
pub use set::SubscriberSet;
pub use subscriber::Subscribe;
