//! Policies governing worker respawns:
//!  - [`CrashWindow`] sliding-window crash-rate limiting;
//!  - [`JitterPolicy`] optional randomization of the respawn delay.
//!
//! ## Overview
//! - [`crash`]: decide whether a slot that just crashed may be respawned,
//!   or has crashed so often so quickly that respawning would only burn CPU
//!   and mask a deterministic defect.
//! - [`jitter`]: spread simultaneous respawns so a common-cause crash does
//!   not produce a thundering-herd restart.
//!
//! ## Example
//! ```rust
//! use std::time::{Duration, Instant};
//! use procvisor::{CrashWindow, RespawnVerdict};
//!
//! // Three crashes inside a five-second window disable the slot.
//! let mut window = CrashWindow::new(3, Duration::from_secs(5));
//! let t0 = Instant::now();
//!
//! assert_eq!(window.record(t0), RespawnVerdict::Allow);
//! assert_eq!(window.record(t0 + Duration::from_millis(100)), RespawnVerdict::Allow);
//! assert_eq!(window.record(t0 + Duration::from_millis(200)), RespawnVerdict::Disable);
//! ```

mod crash;
mod jitter;

pub use crash::{CrashWindow, RespawnVerdict};
pub use jitter::JitterPolicy;
