//! Facade behavior around `init`: role detection, guards, inherited
//! identity.
//!
//! Role state is process-global, so everything runs in a single test
//! function with a controlled order: guard checks first, then a failed
//! init, then the worker branch via injected inheritance variables.

use std::env;

use procvisor::platform::process::{ENV_WORKER_COUNT, ENV_WORKER_ID, ENV_WORKER_PORT};
use procvisor::{cluster, ClusterConfig, ClusterError, Role, MAX_WORKERS};

#[test]
fn role_and_guards_follow_process_state() {
    // Before init: not a master, not a worker, and master-only operations
    // refuse.
    assert!(!cluster::is_master());
    assert!(!cluster::is_worker());
    assert_eq!(cluster::worker_id(), 0);
    assert_eq!(cluster::get_port(), 0);
    assert_eq!(cluster::worker_count(), 0);
    assert!(matches!(
        cluster::stats(),
        Err(ClusterError::NotMaster { .. })
    ));
    assert!(matches!(
        cluster::wait_workers(),
        Err(ClusterError::NotMaster { .. })
    ));
    assert!(matches!(
        cluster::graceful_restart(),
        Err(ClusterError::NotMaster { .. })
    ));
    assert!(matches!(
        cluster::signal_workers(libc::SIGTERM),
        Err(ClusterError::NotMaster { .. })
    ));

    // Topology queries need no init at all.
    assert!((1..=MAX_WORKERS).contains(&cluster::cpus()));
    assert!(cluster::cpus_physical() <= cluster::cpus());

    // A rejected config modifies nothing.
    assert!(matches!(
        cluster::init(ClusterConfig::default()),
        Err(ClusterError::Config { .. })
    ));
    let mut oversized = ClusterConfig::new(3000);
    oversized.workers = MAX_WORKERS + 1;
    assert!(matches!(
        cluster::init(oversized),
        Err(ClusterError::Config { .. })
    ));
    assert!(!cluster::is_master());
    assert!(!cluster::is_worker());

    // Inherited identity takes the worker branch; nothing is spawned.
    env::set_var(ENV_WORKER_ID, "5");
    env::set_var(ENV_WORKER_PORT, "4321");
    env::set_var(ENV_WORKER_COUNT, "8");
    let role = cluster::init(ClusterConfig::new(4321)).expect("worker init");
    assert_eq!(role, Role::Worker);

    assert!(cluster::is_worker());
    assert!(!cluster::is_master());
    assert_eq!(cluster::worker_id(), 5);
    assert_eq!(cluster::get_port(), 4321);
    assert_eq!(cluster::worker_count(), 8);

    // The inheritance variables are consumed: children of this worker must
    // not be mistaken for cluster workers.
    assert!(env::var(ENV_WORKER_ID).is_err());
    assert!(env::var(ENV_WORKER_PORT).is_err());
    assert!(env::var(ENV_WORKER_COUNT).is_err());

    // Stats and the loop remain master-only.
    assert!(matches!(
        cluster::stats(),
        Err(ClusterError::NotMaster { .. })
    ));
    assert!(matches!(
        cluster::wait_workers(),
        Err(ClusterError::NotMaster { .. })
    ));

    // Clustering is one-shot per process.
    assert!(matches!(
        cluster::init(ClusterConfig::new(4321)),
        Err(ClusterError::AlreadyInitialized)
    ));
}
