/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Tick-rate soak check.
//!
//! Runs a scheduler with a media clock (and optionally a timer clock) for a
//! fixed wall-clock window, then compares delivered ticks against the
//! nominal count. Long-run drift shows up here as a deficit that grows with
//! the window length.
//!
//! Example:
//!   tick-soak --media-ms 20 --timer-ms 100 --rate 1 --duration-secs 5
//!   tick-soak --config engine.yaml --duration-secs 10

use std::path::PathBuf;
use std::process;
use std::thread;
use std::time::Duration;

use anyhow::{bail, Result};
use clap::Parser;
use tracing::{error, info};

use softclock::{DriverKind, EngineConfig, Scheduler, TimerManager};

// ── CLI argument definition ───────────────────────────────────────────────────

/// Soft clock tick-rate soak check.
#[derive(Debug, Parser)]
#[command(name = "tick-soak", about = "Measure delivered vs expected ticks")]
struct Cli {
    /// Media clock period in ms (0 = no media clock).
    #[arg(short = 'm', long = "media-ms", default_value_t = 20)]
    media_ms: u64,

    /// Timer clock resolution in ms (0 = no timer manager).
    #[arg(short = 't', long = "timer-ms", default_value_t = 100)]
    timer_ms: u64,

    /// Clock rate multiplier (1..=10).
    #[arg(short = 'r', long = "rate", default_value_t = 1)]
    rate: u32,

    /// Wall-clock measurement window, in seconds.
    #[arg(short = 'd', long = "duration-secs", default_value_t = 5)]
    duration_secs: u64,

    /// Tick source: thread | runtime.
    #[arg(long = "driver", default_value = "thread")]
    driver: String,

    /// Path to a YAML engine configuration; overrides the flags above.
    #[arg(short = 'c', long = "config")]
    config: Option<PathBuf>,
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
        error!("tick-soak failed: {:#}", e);
        process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let (mut sched, media_ms, timer_ms) = match &cli.config {
        Some(path) => {
            let config = EngineConfig::load_from_file(path)?;
            (
                Scheduler::from_config(&config),
                config.media_resolution_ms,
                config.timer_resolution_ms,
            )
        }
        None => {
            let Some(driver) = DriverKind::from_name(&cli.driver) else {
                bail!("unknown driver '{}' (valid: thread, runtime)", cli.driver);
            };
            let mut sched = Scheduler::new(driver);
            sched.set_rate(cli.rate);
            (sched, cli.media_ms, cli.timer_ms)
        }
    };

    if media_ms > 0 {
        sched.set_media_clock(media_ms, || {});
    }

    // A self-re-arming timer gives the timer path real work during the soak.
    let timers = (timer_ms > 0).then(|| TimerManager::new(&mut sched, timer_ms));
    let heartbeat = timers.as_ref().map(|mgr| {
        let t = mgr.create_timer(|me| {
            let _ = me.arm(200);
        });
        mgr.arm(&t, 200).expect("nonzero timeout");
        t
    });

    info!(
        driver = sched.driver_kind().as_str(),
        media_ms,
        timer_ms,
        duration_secs = cli.duration_secs,
        "soak starting"
    );

    sched.start()?;
    thread::sleep(Duration::from_secs(cli.duration_secs));
    sched.stop();

    let drive_ms = sched
        .drive_resolution_ms()
        .expect("started scheduler has a drive resolution");
    let stats = sched.stats();
    let expected = cli.duration_secs * 1_000 / drive_ms;
    let deficit = expected as i64 - stats.ticks as i64;

    info!(
        drive_ms,
        expected,
        delivered = stats.ticks,
        deficit,
        media_fires = stats.media_fires,
        timer_fires = stats.timer_fires,
        "soak complete"
    );

    if let Some(t) = heartbeat {
        t.kill();
    }
    Ok(())
}
