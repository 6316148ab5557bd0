//! Worker process management: spawn, signal, reap.
//!
//! Every worker incarnation is a fresh execution of a command (by default the
//! current executable) with its identity passed through the environment. The
//! child process calls [`crate::cluster::init`] on startup, finds the
//! inherited variables, and takes the worker branch; this is what lets a
//! *respawned* worker re-enter the user's server code long after the master
//! returned from its own init.
//!
//! Reaping is per-pid (`waitpid(pid, WNOHANG)`), never `waitpid(-1)`: the
//! supervisor polls exactly the pids it owns, so children of other code in
//! the same process are never stolen.

use std::ffi::OsString;
use std::io;
use std::path::PathBuf;
use std::process::Command;

use nix::errno::Errno;
use nix::sys::signal::{self, Signal};
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::Pid;

/// Environment variable carrying the worker id into a spawned incarnation.
pub const ENV_WORKER_ID: &str = "PROCVISOR_WORKER_ID";
/// Environment variable carrying the shared listening port.
pub const ENV_WORKER_PORT: &str = "PROCVISOR_WORKER_PORT";
/// Environment variable carrying the configured worker count.
pub const ENV_WORKER_COUNT: &str = "PROCVISOR_WORKER_COUNT";

/// How a worker incarnation terminated, as reported by `waitpid`.
///
/// Exactly one of `code`/`signal` is set for a real termination. A reap that
/// finds the child already gone (`ECHILD`) yields neither, and is treated as
/// a clean exit so a lost child can never wedge the supervisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerExit {
    /// Exit code, if the process exited normally.
    pub code: Option<i32>,
    /// Terminating signal number, if the process was killed by a signal.
    pub signal: Option<i32>,
}

impl WorkerExit {
    /// True if the process exited normally with status 0.
    pub fn clean(&self) -> bool {
        self.signal.is_none() && self.code.unwrap_or(0) == 0
    }

    /// Whether this termination counts as a crash.
    ///
    /// `stopping` is true when the supervisor had already asked this worker to
    /// stop. While stopping, any normal exit is graceful (whatever the code),
    /// and so is death by the SIGTERM we sent; every other signal death, and
    /// any nonzero spontaneous exit, is a crash.
    pub fn is_crash(&self, stopping: bool) -> bool {
        match self.signal {
            Some(sig) => !(stopping && sig == libc::SIGTERM),
            None => !stopping && self.code.unwrap_or(0) != 0,
        }
    }
}

/// The command a worker incarnation runs.
///
/// Defaults to the current executable with the master's own arguments, which
/// re-enters `main` and lands back in `init`. Overriding it (for supervising
/// a separate worker binary, or for tests driving throwaway shell children)
/// changes only what gets executed; identity inheritance stays the same.
#[derive(Debug, Clone)]
pub struct SpawnCommand {
    program: PathBuf,
    args: Vec<OsString>,
}

impl SpawnCommand {
    /// Command for an explicit program and argument list.
    pub fn new(program: impl Into<PathBuf>, args: impl IntoIterator<Item = impl Into<OsString>>) -> Self {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Command that re-executes the current binary with its own arguments.
    pub fn current_exe() -> io::Result<Self> {
        Ok(Self {
            program: std::env::current_exe()?,
            args: std::env::args_os().skip(1).collect(),
        })
    }

    /// Spawns one incarnation with identity variables set.
    ///
    /// Stdio is inherited from the master, as prefork servers expect. The
    /// returned pid is tracked by the caller; the child handle itself is not
    /// kept, reaping goes through [`try_reap`].
    pub fn spawn(&self, id: u8, port: u16, workers: usize) -> io::Result<u32> {
        let child = Command::new(&self.program)
            .args(&self.args)
            .env(ENV_WORKER_ID, id.to_string())
            .env(ENV_WORKER_PORT, port.to_string())
            .env(ENV_WORKER_COUNT, workers.to_string())
            .spawn()?;
        Ok(child.id())
    }
}

/// Sends `sig` to `pid`.
///
/// Known signal numbers go through `nix`; anything else is passed to the OS
/// raw, so callers can forward platform-specific or real-time signals.
pub fn send_signal(pid: u32, sig: i32) -> io::Result<()> {
    match Signal::try_from(sig) {
        Ok(s) => signal::kill(Pid::from_raw(pid as i32), s).map_err(io::Error::from),
        Err(_) => {
            let rc = unsafe { libc::kill(pid as libc::pid_t, sig) };
            if rc == 0 {
                Ok(())
            } else {
                Err(io::Error::last_os_error())
            }
        }
    }
}

/// Nonblocking reap of one pid.
///
/// Returns `Ok(None)` while the child is still running, `Ok(Some(exit))` once
/// it terminated. `ECHILD` (someone else reaped it, or it never existed) is
/// reported as an exit with neither code nor signal.
pub fn try_reap(pid: u32) -> io::Result<Option<WorkerExit>> {
    match waitpid(Pid::from_raw(pid as i32), Some(WaitPidFlag::WNOHANG)) {
        Ok(WaitStatus::Exited(_, code)) => Ok(Some(WorkerExit {
            code: Some(code),
            signal: None,
        })),
        Ok(WaitStatus::Signaled(_, sig, _)) => Ok(Some(WorkerExit {
            code: None,
            signal: Some(sig as i32),
        })),
        Ok(WaitStatus::StillAlive) => Ok(None),
        // Stopped/continued children have not terminated.
        Ok(_) => Ok(None),
        Err(Errno::ECHILD) => Ok(Some(WorkerExit {
            code: None,
            signal: None,
        })),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    fn reap_blocking(pid: u32) -> WorkerExit {
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            if let Some(exit) = try_reap(pid).expect("waitpid failed") {
                return exit;
            }
            assert!(Instant::now() < deadline, "child {pid} did not exit");
            std::thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn crash_table() {
        let ok = WorkerExit { code: Some(0), signal: None };
        let failed = WorkerExit { code: Some(1), signal: None };
        let termed = WorkerExit { code: None, signal: Some(libc::SIGTERM) };
        let killed = WorkerExit { code: None, signal: Some(libc::SIGKILL) };
        let lost = WorkerExit { code: None, signal: None };

        // Spontaneous exits: only a nonzero code or a signal death is a crash.
        assert!(!ok.is_crash(false));
        assert!(failed.is_crash(false));
        assert!(termed.is_crash(false));
        assert!(killed.is_crash(false));

        // While stopping: any normal exit is graceful, SIGTERM death is
        // graceful, SIGKILL death is not.
        assert!(!ok.is_crash(true));
        assert!(!failed.is_crash(true));
        assert!(!termed.is_crash(true));
        assert!(killed.is_crash(true));

        assert!(!lost.is_crash(false));
        assert!(lost.clean());
    }

    #[test]
    fn spawn_sets_identity_environment() {
        // The child fails (exit 7) unless all three variables arrive intact.
        let script = format!(
            "[ \"${id}\" = 3 ] && [ \"${port}\" = 8080 ] && [ \"${count}\" = 4 ] || exit 7",
            id = ENV_WORKER_ID,
            port = ENV_WORKER_PORT,
            count = ENV_WORKER_COUNT,
        );
        let cmd = SpawnCommand::new("/bin/sh", ["-c", script.as_str()]);
        let pid = cmd.spawn(3, 8080, 4).expect("spawn failed");
        assert_eq!(reap_blocking(pid).code, Some(0));
    }

    #[test]
    fn reap_reports_exit_code() {
        let cmd = SpawnCommand::new("/bin/sh", ["-c", "exit 5"]);
        let pid = cmd.spawn(1, 1, 1).expect("spawn failed");
        let exit = reap_blocking(pid);
        assert_eq!(exit.code, Some(5));
        assert_eq!(exit.signal, None);
        assert!(exit.is_crash(false));
    }

    #[test]
    fn reap_reports_terminating_signal() {
        let cmd = SpawnCommand::new("/bin/sleep", ["30"]);
        let pid = cmd.spawn(1, 1, 1).expect("spawn failed");
        send_signal(pid, libc::SIGKILL).expect("kill failed");
        let exit = reap_blocking(pid);
        assert_eq!(exit.signal, Some(libc::SIGKILL));
        assert!(exit.is_crash(true));
    }

    #[test]
    fn reaping_an_unknown_pid_is_a_lost_child() {
        // Pid 1 is never our child.
        let exit = try_reap(1).expect("waitpid failed").expect("expected ECHILD");
        assert_eq!(exit, WorkerExit { code: None, signal: None });
    }
}
