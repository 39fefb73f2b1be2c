/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Concurrent arm/kill load generator.
//!
//! Several worker threads create, arm, kill and re-arm timers against a
//! single manager while the clock runs, exercising the lock shared between
//! the fire path and caller threads. Reports fire/kill counts at the end;
//! the interesting output is the absence of a wedge or a panic.
//!
//! Example:
//!   timer-storm --workers 8 --timers-per-worker 64 --duration-secs 10

use std::process;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::Result;
use clap::Parser;
use tracing::{error, info};

use softclock::{DriverKind, Scheduler, TimerManager};

// ── CLI argument definition ───────────────────────────────────────────────────

/// Soft clock concurrent timer load generator.
#[derive(Debug, Parser)]
#[command(name = "timer-storm", about = "Arm/kill timers from many threads")]
struct Cli {
    /// Number of worker threads.
    #[arg(short = 'w', long = "workers", default_value_t = 4)]
    workers: u64,

    /// Timers each worker keeps cycling.
    #[arg(short = 'n', long = "timers-per-worker", default_value_t = 32)]
    timers_per_worker: u64,

    /// Timer clock resolution in ms.
    #[arg(short = 't', long = "resolution-ms", default_value_t = 20)]
    resolution_ms: u64,

    /// How long to keep the storm running, in seconds.
    #[arg(short = 'd', long = "duration-secs", default_value_t = 5)]
    duration_secs: u64,
}

// ── Entry point ───────────────────────────────────────────────────────────────

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    if let Err(e) = run(Cli::parse()) {
        error!("timer-storm failed: {:#}", e);
        process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let mut sched = Scheduler::new(DriverKind::Thread);
    let manager = Arc::new(TimerManager::new(&mut sched, cli.resolution_ms));
    sched.start()?;

    let fires = Arc::new(AtomicU64::new(0));
    let kills = Arc::new(AtomicU64::new(0));
    let deadline = Instant::now() + Duration::from_secs(cli.duration_secs);

    info!(
        workers = cli.workers,
        timers_per_worker = cli.timers_per_worker,
        resolution_ms = cli.resolution_ms,
        duration_secs = cli.duration_secs,
        "storm starting"
    );

    let mut handles = Vec::new();
    for worker in 0..cli.workers {
        let manager = Arc::clone(&manager);
        let fires = Arc::clone(&fires);
        let kills = Arc::clone(&kills);

        handles.push(thread::spawn(move || {
            let timers: Vec<_> = (0..cli.timers_per_worker)
                .map(|_| {
                    let fires = Arc::clone(&fires);
                    manager.create_timer(move |_| {
                        fires.fetch_add(1, Ordering::Relaxed);
                    })
                })
                .collect();

            let mut round = 0u64;
            while Instant::now() < deadline {
                for (i, timer) in timers.iter().enumerate() {
                    // Spread deadlines across a few resolution multiples;
                    // every third round kills instead of letting it fire.
                    let timeout = (1 + (worker + i as u64 + round) % 8) * 10;
                    manager.arm(timer, timeout).expect("nonzero timeout");
                    if (round + i as u64) % 3 == 0 && manager.kill(timer) {
                        kills.fetch_add(1, Ordering::Relaxed);
                    }
                }
                round += 1;
                thread::sleep(Duration::from_millis(25));
            }

            for timer in &timers {
                timer.kill();
            }
        }));
    }

    for handle in handles {
        handle.join().expect("worker panicked");
    }
    sched.stop();

    info!(
        fires = fires.load(Ordering::Relaxed),
        kills = kills.load(Ordering::Relaxed),
        armed_left = manager.armed_count(),
        stats = ?sched.stats(),
        "storm complete"
    );
    Ok(())
}
