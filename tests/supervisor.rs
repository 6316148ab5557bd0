//! Supervisor scenarios over real child processes.
//!
//! Each test builds a [`Supervisor`] directly with a throwaway `/bin/sh`
//! worker command, drives it through the shared flags/stats handles, and
//! lets real spawn/reap/signal traffic flow. Timings are kept small but
//! with wide assertion margins.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use procvisor::{
    ClusterConfig, EventKind, SpawnCommand, StatsHandle, Supervisor, WorkerExit, WorkerHooks,
    WorkerStatus,
};

fn sh(script: &str) -> SpawnCommand {
    SpawnCommand::new("/bin/sh", ["-c", script])
}

fn base_config(workers: usize, command: SpawnCommand) -> ClusterConfig {
    let mut cfg = ClusterConfig::new(3000);
    cfg.workers = workers;
    cfg.worker_command = Some(command);
    cfg.startup_delay = Duration::from_millis(20);
    cfg.respawn_delay = Duration::from_millis(30);
    cfg.poll_interval = Duration::from_millis(20);
    cfg
}

async fn wait_for(stats: &StatsHandle, what: &str, cond: impl Fn(&StatsHandle) -> bool) {
    let deadline = Instant::now() + Duration::from_secs(10);
    while !cond(stats) {
        assert!(Instant::now() < deadline, "timed out waiting for {what}");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

#[derive(Default)]
struct HookLog {
    starts: Mutex<Vec<u8>>,
    exits: Mutex<Vec<(u8, bool)>>,
}

fn recording_hooks(log: &Arc<HookLog>) -> WorkerHooks {
    let starts = Arc::clone(log);
    let exits = Arc::clone(log);
    WorkerHooks {
        on_start: Some(Arc::new(move |id, _pid| starts.starts.lock().push(id))),
        on_exit: Some(Arc::new(move |id, _exit: WorkerExit, is_crash| {
            exits.exits.lock().push((id, is_crash))
        })),
    }
}

#[tokio::test]
async fn clean_shutdown_terminates_all_workers() {
    let log = Arc::new(HookLog::default());
    let mut cfg = base_config(2, sh("sleep 30"));
    cfg.hooks = recording_hooks(&log);
    cfg.shutdown_grace = Duration::from_secs(5);

    let mut sup = Supervisor::new(cfg).expect("config");
    let flags = sup.flags();
    let stats = sup.stats();

    let driver = async {
        wait_for(&stats, "both workers active", |s| s.cluster().active == 2).await;
        flags.request_shutdown();
        // Coalescing: a second request changes nothing.
        flags.request_shutdown();
    };
    let (res, ()) = tokio::join!(sup.run(), driver);
    res.expect("supervisor run");

    let cluster = stats.cluster();
    assert!(cluster.shutdown_requested);
    assert_eq!(cluster.active + cluster.starting + cluster.stopping, 0);
    assert_eq!(cluster.total_crashes, 0);
    assert_eq!(cluster.total_restarts, 0);

    let mut starts = log.starts.lock().clone();
    starts.sort_unstable();
    assert_eq!(starts, vec![1, 2]);

    let exits = log.exits.lock().clone();
    assert_eq!(exits.len(), 2);
    assert!(exits.iter().all(|(_, is_crash)| !is_crash), "shutdown exits must be graceful");
}

#[tokio::test]
async fn killed_worker_is_respawned_into_the_same_slot() {
    let log = Arc::new(HookLog::default());
    let mut cfg = base_config(1, sh("sleep 30"));
    cfg.hooks = recording_hooks(&log);

    let mut sup = Supervisor::new(cfg).expect("config");
    let flags = sup.flags();
    let stats = sup.stats();

    let driver = async {
        wait_for(&stats, "worker active", |s| s.cluster().active == 1).await;
        let first = stats.worker(1).and_then(|w| w.pid).expect("live pid");

        procvisor::platform::process::send_signal(first, libc::SIGKILL).expect("kill");

        wait_for(&stats, "replacement active", |s| {
            s.worker(1)
                .map(|w| w.status == WorkerStatus::Active && w.pid != Some(first))
                .unwrap_or(false)
        })
        .await;

        let worker = stats.worker(1).expect("slot");
        assert_eq!(worker.crash_count, 1);
        assert_eq!(worker.incarnation, 2);
        assert_eq!(worker.last_exit_signal, Some(libc::SIGKILL));
        // Respawns are not rolling restarts.
        assert_eq!(stats.cluster().total_restarts, 0);

        flags.request_shutdown();
    };
    let (res, ()) = tokio::join!(sup.run(), driver);
    res.expect("supervisor run");

    let exits = log.exits.lock().clone();
    assert_eq!(exits.first(), Some(&(1, true)), "external SIGKILL is a crash");
    assert_eq!(log.starts.lock().len(), 2, "on_start fires per incarnation");
}

#[tokio::test]
async fn crash_storm_disables_the_slot_and_the_loop_returns() {
    let mut cfg = base_config(1, sh("exit 1"));
    cfg.respawn_window = Duration::from_secs(5);
    cfg.respawn_max_crashes = 3;
    cfg.respawn_delay = Duration::from_millis(10);

    let mut sup = Supervisor::new(cfg).expect("config");
    let stats = sup.stats();
    let mut events = sup.bus().subscribe();

    // No driver: the crash storm must retire the slot all by itself.
    tokio::time::timeout(Duration::from_secs(10), sup.run())
        .await
        .expect("loop wedged")
        .expect("supervisor run");

    let cluster = stats.cluster();
    assert_eq!(cluster.disabled, 1);
    assert_eq!(cluster.total_crashes, 3);
    assert!(!cluster.shutdown_requested);

    let worker = stats.worker(1).expect("slot");
    assert_eq!(worker.status, WorkerStatus::Disabled);
    assert_eq!(worker.crash_count, 3);
    assert_eq!(worker.last_exit_code, Some(1));

    let mut crashes = 0;
    let mut disables = 0;
    while let Ok(ev) = events.try_recv() {
        match ev.kind {
            EventKind::WorkerCrashed => crashes += 1,
            EventKind::WorkerDisabled => disables += 1,
            _ => {}
        }
    }
    assert_eq!(crashes, 3);
    assert_eq!(disables, 1);
}

#[tokio::test]
async fn rolling_restart_replaces_every_worker_once() {
    let mut cfg = base_config(3, sh("sleep 30"));
    cfg.shutdown_grace = Duration::from_secs(5);

    let mut sup = Supervisor::new(cfg).expect("config");
    let flags = sup.flags();
    let stats = sup.stats();

    let driver = async {
        wait_for(&stats, "all workers active", |s| s.cluster().active == 3).await;
        let before: Vec<_> = stats.workers().iter().filter_map(|w| w.pid).collect();
        assert_eq!(before.len(), 3);

        flags.request_restart();
        // Idempotent while the cycle runs: still exactly one cycle.
        flags.request_restart();

        wait_for(&stats, "rolling cycle completion", |s| {
            s.cluster().total_restarts == 1
        })
        .await;
        wait_for(&stats, "replacements active", |s| s.cluster().active == 3).await;

        let after = stats.workers();
        for worker in &after {
            assert_eq!(worker.incarnation, 2, "slot {} not replaced", worker.id);
            assert!(
                worker.pid.is_some() && !before.contains(&worker.pid.unwrap()),
                "slot {} kept its old incarnation",
                worker.id
            );
            // A supervised replacement is not a crash.
            assert_eq!(worker.crash_count, 0);
        }

        assert_eq!(stats.cluster().total_restarts, 1);
        flags.request_shutdown();
    };
    let (res, ()) = tokio::join!(sup.run(), driver);
    res.expect("supervisor run");
}

#[tokio::test]
async fn stubborn_worker_is_killed_after_the_grace_period() {
    let log = Arc::new(HookLog::default());
    let mut cfg = base_config(1, sh("trap '' TERM; sleep 30"));
    cfg.hooks = recording_hooks(&log);
    cfg.shutdown_grace = Duration::from_millis(300);

    let mut sup = Supervisor::new(cfg).expect("config");
    let flags = sup.flags();
    let stats = sup.stats();

    let shutdown_at = Arc::new(Mutex::new(None::<Instant>));
    let marker = Arc::clone(&shutdown_at);
    let driver = async {
        wait_for(&stats, "worker active", |s| s.cluster().active == 1).await;
        *marker.lock() = Some(Instant::now());
        flags.request_shutdown();
    };
    let (res, ()) = tokio::join!(sup.run(), driver);
    res.expect("supervisor run");

    let started = shutdown_at.lock().expect("driver ran");
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_millis(300), "returned before the grace period");
    assert!(elapsed < Duration::from_secs(5), "SIGKILL escalation took too long");

    let worker = stats.worker(1).expect("slot");
    assert_eq!(worker.last_exit_signal, Some(libc::SIGKILL));
    assert_eq!(log.exits.lock().clone(), vec![(1, true)], "a killed worker is a crash");
}

#[tokio::test]
async fn failing_spawns_feed_the_crash_limiter() {
    let mut cfg = base_config(1, SpawnCommand::new("/nonexistent/procvisor-worker", Vec::<String>::new()));
    cfg.respawn_max_crashes = 2;
    cfg.respawn_delay = Duration::from_millis(10);

    let mut sup = Supervisor::new(cfg).expect("config");
    let stats = sup.stats();

    tokio::time::timeout(Duration::from_secs(10), sup.run())
        .await
        .expect("loop wedged")
        .expect("supervisor run");

    let worker = stats.worker(1).expect("slot");
    assert_eq!(worker.status, WorkerStatus::Disabled);
    assert_eq!(worker.crash_count, 2);
    assert_eq!(worker.incarnation, 0, "no process ever existed");
}

#[tokio::test]
async fn workers_that_exit_clean_settle_when_respawn_is_off() {
    let mut cfg = base_config(2, sh("exit 0"));
    cfg.respawn = false;

    let mut sup = Supervisor::new(cfg).expect("config");
    let stats = sup.stats();

    tokio::time::timeout(Duration::from_secs(10), sup.run())
        .await
        .expect("loop wedged")
        .expect("supervisor run");

    let cluster = stats.cluster();
    assert_eq!(cluster.total_crashes, 0);
    assert_eq!(cluster.crashed, 2);
    assert_eq!(cluster.active, 0);
    assert!(!cluster.shutdown_requested);
}
