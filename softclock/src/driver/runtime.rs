/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Callback-based tick driver on the async runtime.
//!
//! The runtime analogue of a kernel periodic timer: `tokio::time::interval`
//! owns the pacing and its `Burst` missed-tick behaviour replays overdue
//! ticks back to back after a slow callback, so the long-run rate matches
//! the nominal rate without hand-rolled drift arithmetic.
//!
//! The runtime is current-thread and lives on a dedicated named thread, which
//! keeps the stop contract identical to the thread driver: signal, join,
//! done.

use std::io;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::debug;

use super::{TickDriver, TickFn};

/// Tick source backed by a tokio interval.
pub struct RuntimeDriver {
    stop_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl RuntimeDriver {
    /// Build the runtime and spawn its host thread. The first tick fires
    /// immediately.
    pub(crate) fn spawn(period: Duration, mut tick: TickFn) -> io::Result<Self> {
        // Built here, not on the host thread, so a failure surfaces as the
        // start error instead of a dead driver.
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()?;

        let (stop_tx, mut stop_rx) = watch::channel(false);

        let handle = thread::Builder::new()
            .name("softclock-tick-rt".into())
            .spawn(move || {
                rt.block_on(async move {
                    let mut interval = tokio::time::interval(period);
                    interval.set_missed_tick_behavior(MissedTickBehavior::Burst);
                    loop {
                        tokio::select! {
                            changed = stop_rx.changed() => {
                                // A send or a dropped sender both end the loop.
                                let _ = changed;
                                break;
                            }
                            _ = interval.tick() => tick(),
                        }
                    }
                });
            })?;

        debug!(period_ms = period.as_millis() as u64, "runtime driver started");
        Ok(RuntimeDriver { stop_tx, handle })
    }
}

impl TickDriver for RuntimeDriver {
    fn stop(self: Box<Self>) {
        let _ = self.stop_tx.send(true);
        match self.handle.join() {
            Ok(()) => debug!("runtime driver stopped"),
            Err(panic) => std::panic::resume_unwind(panic),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
