//! OS-facing primitives the supervisor is built on.
//!
//! Everything that touches the platform directly lives here, so the rest of
//! the crate can reason in terms of worker ids and instants:
//!
//! - [`cpu`]      logical/physical CPU counts, clamped to the worker id space
//! - [`process`]  spawning worker incarnations, signal delivery, nonblocking reaping

pub mod cpu;
pub mod process;

pub use process::{SpawnCommand, WorkerExit};
