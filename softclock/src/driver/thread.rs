/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Dedicated-thread tick driver with drift compensation.
//!
//! A fixed `sleep(period)` per tick would systematically fall behind: every
//! tick also pays the callback cost plus OS scheduling jitter. Instead the
//! loop measures what each cycle actually took, accumulates the overrun into
//! `drift_us`, and shortens the next sleep by that amount:
//!
//! ```text
//! drift += actual_cycle - nominal_period
//! sleep(max(0, nominal_period - drift))
//! ```
//!
//! A cycle that overruns by more than one whole period drives the sleep to
//! zero for the following cycles until the long-run average catches back up
//! to the nominal rate.

use std::io;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, trace};

use super::{TickDriver, TickFn};

/// Portable tick source: a named thread running the drift-compensated loop.
pub struct ThreadDriver {
    stop_tx: Sender<()>,
    handle: JoinHandle<()>,
}

impl ThreadDriver {
    /// Spawn the tick thread. The first tick fires immediately.
    pub(crate) fn spawn(period: Duration, tick: TickFn) -> io::Result<Self> {
        let (stop_tx, stop_rx) = mpsc::channel();

        let handle = thread::Builder::new()
            .name("softclock-tick".into())
            .spawn(move || run_loop(period, tick, stop_rx))?;

        debug!(period_ms = period.as_millis() as u64, "thread driver started");
        Ok(ThreadDriver { stop_tx, handle })
    }
}

impl TickDriver for ThreadDriver {
    fn stop(self: Box<Self>) {
        // The loop may already have exited on a panic; a dead receiver is fine.
        let _ = self.stop_tx.send(());
        match self.handle.join() {
            Ok(()) => debug!("thread driver stopped"),
            Err(panic) => std::panic::resume_unwind(panic),
        }
    }
}

/// The tick loop. The sleep doubles as the stop wait: a message (or a
/// dropped sender) ends the loop without waiting out the period.
fn run_loop(period: Duration, mut tick: TickFn, stop_rx: Receiver<()>) {
    let nominal_us = period.as_micros() as i64;
    let mut drift_us: i64 = 0;

    loop {
        let cycle_start = Instant::now();
        tick();

        let sleep_us = (nominal_us - drift_us).max(0);
        match stop_rx.recv_timeout(Duration::from_micros(sleep_us as u64)) {
            Err(RecvTimeoutError::Timeout) => {}
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
        }

        let actual_us = cycle_start.elapsed().as_micros() as i64;
        drift_us += actual_us - nominal_us;
        trace!(drift_us, "tick cycle complete");
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;

    #[test]
    fn delivers_ticks_at_roughly_the_nominal_rate() {
        let count = Arc::new(AtomicU64::new(0));
        let count_in = Arc::clone(&count);

        let driver = ThreadDriver::spawn(
            Duration::from_millis(5),
            Box::new(move || {
                count_in.fetch_add(1, Ordering::Relaxed);
            }),
        )
        .unwrap();

        thread::sleep(Duration::from_millis(200));
        Box::new(driver).stop();

        // 200 ms at 5 ms nominal is 40 ticks; allow wide margins for CI jitter.
        let n = count.load(Ordering::Relaxed);
        assert!(n >= 10, "expected at least 10 ticks, got {n}");
    }

    #[test]
    fn stop_is_synchronous_no_tick_after_return() {
        let count = Arc::new(AtomicU64::new(0));
        let count_in = Arc::clone(&count);

        let driver = ThreadDriver::spawn(
            Duration::from_millis(2),
            Box::new(move || {
                count_in.fetch_add(1, Ordering::Relaxed);
            }),
        )
        .unwrap();

        thread::sleep(Duration::from_millis(20));
        Box::new(driver).stop();

        let at_stop = count.load(Ordering::Relaxed);
        thread::sleep(Duration::from_millis(50));
        assert_eq!(count.load(Ordering::Relaxed), at_stop);
    }

    #[test]
    fn slow_callback_does_not_stall_the_long_run_rate() {
        // Callback costs ~2x the period; drift compensation must drop the
        // sleeps to keep ticking rather than accumulate a growing backlog.
        let count = Arc::new(AtomicU64::new(0));
        let count_in = Arc::clone(&count);

        let driver = ThreadDriver::spawn(
            Duration::from_millis(2),
            Box::new(move || {
                count_in.fetch_add(1, Ordering::Relaxed);
                thread::sleep(Duration::from_millis(4));
            }),
        )
        .unwrap();

        thread::sleep(Duration::from_millis(100));
        Box::new(driver).stop();

        let n = count.load(Ordering::Relaxed);
        // With compensation the loop runs back to back at ~4 ms per cycle.
        assert!(n >= 10, "expected back-to-back ticks, got {n}");
    }
}
