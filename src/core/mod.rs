//! Master core: the control loop and its inputs.
//!
//! The only public API re-exported from here is [`Supervisor`] (and the
//! [`SignalFlags`] handle used to drive it). Everything else is an internal
//! building block the supervisor wires together.
//!
//! ## Files & responsibilities
//! - **supervisor.rs**: the loop; owns the registry, spawns/reaps/promotes
//!   workers, applies the crash-rate verdicts, escalates shutdown, drives
//!   rolling restarts, publishes events and stats snapshots.
//! - **flags.rs**: coalescing atomic request flags + loop wakeup; the only
//!   state signal context may touch.
//! - **signals.rs**: background listener translating SIGTERM/SIGINT/SIGUSR2/
//!   SIGCHLD into flag transitions.
//! - **restart.rs**: the rolling-restart cursor state machine.
//!
//! ## Wiring (module-level flow)
//! ```text
//! cluster::init()                         cluster::wait_workers()
//!   └─ Supervisor::new(cfg)                 ├─ signals::spawn_listener(flags)
//!      spawn_initial_blocking()             └─ Supervisor::run()
//!
//! SIGTERM/SIGINT ─┐                                   ┌──► spawn_slot()
//! SIGUSR2 ────────┼─► SignalFlags ─► run() loop ──────┼──► try_reap()/handle_exit()
//! SIGCHLD ────────┘    (atomics +     each pass:      ├──► promote_started() → on_start
//! graceful_restart() ─►  Notify)        1. reap       ├──► decide_respawn()  → on_exit
//!                                       2. promote    ├──► RollingRestart::advance()
//!                                       3. shutdown   └──► StatsHandle::publish()
//!                                       4. escalate
//!                                       5. rolling
//!                                       6. respawns
//!                                       7. stats, settle-check, idle()
//!
//! events: Bus ──► SubscriberSet ──► [queue] ──► LogSubscriber / custom
//! ```
//!
//! ## Shutdown timeline
//! ```text
//! SIGTERM → flag → begin_shutdown(): SIGTERM all live, arm deadline,
//!           cancel pending respawns, abandon rolling cycle
//! → workers exit (graceful) OR deadline passes → SIGKILL survivors
//! → every slot settles → AllWorkersDown → run() returns
//! ```

mod flags;
mod restart;
mod signals;
mod supervisor;

pub use flags::SignalFlags;
pub use supervisor::Supervisor;

pub(crate) use signals::spawn_listener;
