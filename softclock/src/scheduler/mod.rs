//! Tick scheduler: one physical clock fanned out into two virtual clocks.
//!
//! [`Scheduler`] owns a single platform tick source and multiplexes it into
//! a *media clock* (fires on every drive tick) and a *timer clock* (fires
//! once enough drive ticks have accumulated to cover its period). The media
//! clock paces frame processing; the timer clock drives the
//! [`TimerManager`](crate::timer::TimerManager).
//!
//! # Design decisions vs the C implementation
//!
//! | Topic | C | Rust |
//! |---|---|---|
//! | Instance model | Process-wide singleton | Owned value, caller holds the handle |
//! | Clock registration | Function pointer + `void*` context | Owned `FnMut` closures |
//! | Run flag | Mutable global int | [`SchedulerState`], owned by `start`/`stop` |
//! | Stop | Flag write, caller hopes | Synchronous: blocks until the driver thread has joined |
//! | Rate | Unchecked int | [`Rate`], out-of-range coerced to 1 |
//!
//! # Example
//! ```rust,ignore
//! let mut sched = Scheduler::new(DriverKind::Thread);
//! sched.set_media_clock(20, move || frames.process());
//! let timers = TimerManager::new(&mut sched, 100);
//! sched.start()?;
//! // ... run ...
//! sched.stop();
//! ```

pub mod error;

pub use error::SchedulerError;

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::driver::{spawn_driver, DriverKind, TickDriver};
use crate::types::{ClockCallback, Rate, SchedulerState, TickCounters, TickStats};

// ── Virtual clock registration ───────────────────────────────────────────────

/// One registered virtual clock: nominal period plus the callback to fan the
/// tick out to.
struct ClockSlot {
    period_ms: u64,
    callback: ClockCallback,
}

// ── Clock multiplexer ─────────────────────────────────────────────────────────

/// The per-tick fan-out state, moved onto the driver thread at `start`.
///
/// Kept separate from [`Scheduler`] so the tick algorithm is testable
/// without spawning a driver.
struct ClockMux {
    media: Option<ClockCallback>,
    /// Timer clock: scaled period plus callback.
    timer: Option<(u64, ClockCallback)>,
    /// Drive ticks accumulated toward the timer period, in ms.
    accumulated: u64,
    /// The drive resolution, in ms.
    resolution: u64,
    counters: Arc<TickCounters>,
}

impl ClockMux {
    /// One drive tick: media fires unconditionally, the timer clock fires
    /// when the accumulated tick time covers its period. The accumulator
    /// resets to zero, carrying no remainder forward.
    fn tick(&mut self) {
        use std::sync::atomic::Ordering::Relaxed;

        self.counters.ticks.fetch_add(1, Relaxed);

        if let Some(media) = self.media.as_mut() {
            self.counters.media_fires.fetch_add(1, Relaxed);
            media();
        }

        if let Some((period, timer)) = self.timer.as_mut() {
            self.accumulated += self.resolution;
            if self.accumulated >= *period {
                self.accumulated = 0;
                self.counters.timer_fires.fetch_add(1, Relaxed);
                timer();
            }
        }
    }
}

// ── Scheduler ─────────────────────────────────────────────────────────────────

/// The tick scheduler.
///
/// Lifecycle: configure (clocks, rate), `start`, run, `stop`. Clock
/// registrations are moved into the driver at `start`; `stop` is synchronous
/// and idempotent, so once it returns the registered callbacks (and anything
/// they borrow through `Arc`s) can be torn down safely.
pub struct Scheduler {
    driver_kind: DriverKind,
    rate: Rate,
    media: Option<ClockSlot>,
    timer: Option<ClockSlot>,
    state: SchedulerState,
    driver: Option<Box<dyn TickDriver>>,
    drive_resolution_ms: Option<u64>,
    counters: Arc<TickCounters>,
}

impl Scheduler {
    /// Create a stopped scheduler backed by the given driver kind. No
    /// resource is allocated until [`start`](Self::start).
    pub fn new(driver_kind: DriverKind) -> Self {
        Scheduler {
            driver_kind,
            rate: Rate::default(),
            media: None,
            timer: None,
            state: SchedulerState::Stopped,
            driver: None,
            drive_resolution_ms: None,
            counters: Arc::new(TickCounters::default()),
        }
    }

    /// Create a scheduler configured from an [`EngineConfig`] (driver kind
    /// and rate; clock callbacks are still registered by the caller).
    pub fn from_config(config: &EngineConfig) -> Self {
        let mut sched = Scheduler::new(config.driver);
        sched.rate = config.rate;
        sched
    }

    // ── Configuration (before start) ─────────────────────────────────────────

    /// Register the media clock: `callback` fires on every drive tick.
    ///
    /// Replaces any previous media clock. A period of 0 means no media
    /// clock. Ignored with a warning while running.
    pub fn set_media_clock(&mut self, period_ms: u64, callback: impl FnMut() + Send + 'static) {
        if self.state == SchedulerState::Running {
            warn!("media clock registration ignored while running");
            return;
        }
        self.media = (period_ms > 0).then(|| ClockSlot {
            period_ms,
            callback: Box::new(callback),
        });
        debug!(period_ms, "media clock registered");
    }

    /// Register the timer clock: `callback` fires once accumulated drive
    /// ticks reach `period_ms`.
    ///
    /// Replaces any previous timer clock. A period of 0 means no timer
    /// clock. Ignored with a warning while running.
    pub fn set_timer_clock(&mut self, period_ms: u64, callback: impl FnMut() + Send + 'static) {
        if self.state == SchedulerState::Running {
            warn!("timer clock registration ignored while running");
            return;
        }
        self.timer = (period_ms > 0).then(|| ClockSlot {
            period_ms,
            callback: Box::new(callback),
        });
        debug!(period_ms, "timer clock registered");
    }

    /// Set the rate multiplier. Out-of-range values (0 or above 10) are
    /// coerced to 1. Ignored with a warning while running.
    pub fn set_rate(&mut self, rate: u32) {
        if self.state == SchedulerState::Running {
            warn!("rate change ignored while running");
            return;
        }
        self.rate = Rate::new(rate);
    }

    // ── Lifecycle ─────────────────────────────────────────────────────────────

    /// Derive the drive resolution and start the platform driver.
    ///
    /// The drive resolution is the minimum of the registered periods after
    /// each is divided by the rate (floored at 1 ms, so a high rate can
    /// never produce a zero period).
    ///
    /// # Errors
    /// * [`SchedulerError::AlreadyRunning`] – `start` on a running scheduler.
    /// * [`SchedulerError::NoClocksRegistered`] – neither clock is set.
    /// * [`SchedulerError::DriverCreation`] – the OS refused the driver; the
    ///   scheduler remains `Stopped`.
    pub fn start(&mut self) -> Result<(), SchedulerError> {
        if self.state == SchedulerState::Running {
            return Err(SchedulerError::AlreadyRunning);
        }

        let rate = self.rate.get() as u64;
        let scale = |period_ms: u64| (period_ms / rate).max(1);

        let media_period = self.media.as_ref().map(|c| scale(c.period_ms));
        let timer_period = self.timer.as_ref().map(|c| scale(c.period_ms));

        let drive_ms = match (media_period, timer_period) {
            (Some(m), Some(t)) => m.min(t),
            (Some(m), None) => m,
            (None, Some(t)) => t,
            (None, None) => return Err(SchedulerError::NoClocksRegistered),
        };

        let mut mux = ClockMux {
            media: self.media.take().map(|c| c.callback),
            timer: self
                .timer
                .take()
                .map(|c| (timer_period.unwrap_or(c.period_ms), c.callback)),
            accumulated: 0,
            resolution: drive_ms,
            counters: Arc::clone(&self.counters),
        };

        let driver = spawn_driver(
            self.driver_kind,
            Duration::from_millis(drive_ms),
            Box::new(move || mux.tick()),
        )?;

        self.driver = Some(driver);
        self.drive_resolution_ms = Some(drive_ms);
        self.state = SchedulerState::Running;

        info!(
            driver = self.driver_kind.as_str(),
            drive_ms,
            media_ms = ?media_period,
            timer_ms = ?timer_period,
            rate,
            "scheduler started"
        );
        Ok(())
    }

    /// Stop the driver. Blocks until no tick is in flight and no further
    /// tick can be delivered. Idempotent: stopping a stopped scheduler is a
    /// no-op.
    pub fn stop(&mut self) {
        let Some(driver) = self.driver.take() else {
            return;
        };
        driver.stop();
        self.state = SchedulerState::Stopped;
        info!(stats = ?self.counters.snapshot(), "scheduler stopped");
    }

    // ── Observation ───────────────────────────────────────────────────────────

    /// Current lifecycle state.
    pub fn state(&self) -> SchedulerState {
        self.state
    }

    /// The tick source this scheduler was built for.
    pub fn driver_kind(&self) -> DriverKind {
        self.driver_kind
    }

    /// The drive resolution derived by the last successful `start`, in ms.
    pub fn drive_resolution_ms(&self) -> Option<u64> {
        self.drive_resolution_ms
    }

    /// Snapshot of the tick counters.
    pub fn stats(&self) -> TickStats {
        self.counters.snapshot()
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
