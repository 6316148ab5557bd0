//! Minimal prefork skeleton: a master supervising two stand-in workers.
//!
//! Run with `cargo run --example prefork_echo`, then:
//! - `kill -USR2 <master pid>` for a rolling restart
//! - `kill -TERM <master pid>` for orderly shutdown
//!
//! A real server would bind `cluster::get_port()` with `SO_REUSEPORT` inside
//! the worker branch; here each worker just idles until it is told to stop.

use std::sync::Arc;
use std::time::Duration;

use procvisor::{cluster, ClusterConfig, LogSubscriber, Role};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut cfg = ClusterConfig::new(3000);
    cfg.workers = 2;
    cfg.subscribers = vec![Arc::new(LogSubscriber)];

    match cluster::init(cfg)? {
        Role::Worker => run_worker(),
        Role::Master => {
            tracing_subscriber::fmt()
                .with_env_filter(
                    tracing_subscriber::EnvFilter::try_from_default_env()
                        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
                )
                .init();
            println!(
                "master {} supervising {} workers (TERM to stop, USR2 to restart)",
                std::process::id(),
                cluster::worker_count()
            );
            cluster::wait_workers()?;
            println!("master: all workers down");
        }
    }
    Ok(())
}

fn run_worker() {
    println!(
        "worker {} (pid {}) would serve port {}",
        cluster::worker_id(),
        std::process::id(),
        cluster::get_port()
    );
    // Default SIGTERM disposition ends the incarnation; nothing to install.
    loop {
        std::thread::sleep(Duration::from_secs(1));
    }
}
