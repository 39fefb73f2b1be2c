/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Shared type declarations for the soft clock engine.
//!
//! Everything in this module is plain data used on both sides of the tick
//! boundary: by application threads configuring the engine, and by the driver
//! thread delivering ticks.
//!
//! Replaces the loose C conventions with typed values:
//!
//! * `Rate` replaces a bare `int` that callers were trusted to keep in range;
//!   out-of-range values are coerced at construction, so an invalid rate
//!   cannot exist inside the engine.
//! * Callback/context pointer pairs become owned closures; the context
//!   pointer is whatever state the closure captures.
//! * The run flag becomes a [`SchedulerState`] enum owned exclusively by
//!   `start`/`stop`.

use std::sync::atomic::{AtomicU64, Ordering};

use tracing::warn;

// ── Clock rate ────────────────────────────────────────────────────────────────

/// Lowest accepted rate multiplier (real time).
pub const RATE_MIN: u32 = 1;

/// Highest accepted rate multiplier (10x faster than real time).
pub const RATE_MAX: u32 = 10;

/// Clock rate multiplier, always within `RATE_MIN..=RATE_MAX`.
///
/// Registered clock periods are divided by the rate before the drive
/// resolution is derived, so a rate of 2 runs the whole engine twice as fast
/// as real time. Used by load tests and accelerated call scenarios.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rate(u32);

impl Rate {
    /// Build a rate from a raw integer, coercing out-of-range values to 1.
    pub fn new(raw: u32) -> Self {
        if (RATE_MIN..=RATE_MAX).contains(&raw) {
            Rate(raw)
        } else {
            warn!(raw, "clock rate out of range, coerced to 1");
            Rate(RATE_MIN)
        }
    }

    /// The multiplier as a plain integer.
    pub fn get(self) -> u32 {
        self.0
    }
}

impl Default for Rate {
    fn default() -> Self {
        Rate(RATE_MIN)
    }
}

// ── Callbacks ─────────────────────────────────────────────────────────────────

/// Callback invoked on a virtual clock tick (media clock, timer clock).
///
/// Runs on the driver thread. Must not block; a slow callback stretches the
/// tick and the driver has to eat the drift afterwards.
pub type ClockCallback = Box<dyn FnMut() + Send>;

// ── Scheduler state ───────────────────────────────────────────────────────────

/// Lifecycle state of a [`Scheduler`](crate::scheduler::Scheduler).
///
/// Only `start` and `stop` transition this value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SchedulerState {
    /// No driver is running; clocks may be registered.
    #[default]
    Stopped,
    /// The platform driver is delivering ticks.
    Running,
}

// ── Tick statistics ───────────────────────────────────────────────────────────

/// Live tick counters shared between the driver thread and observers.
///
/// Plain relaxed atomics: the counts are diagnostics, not synchronisation.
#[derive(Debug, Default)]
pub(crate) struct TickCounters {
    pub ticks: AtomicU64,
    pub media_fires: AtomicU64,
    pub timer_fires: AtomicU64,
}

impl TickCounters {
    pub fn snapshot(&self) -> TickStats {
        TickStats {
            ticks: self.ticks.load(Ordering::Relaxed),
            media_fires: self.media_fires.load(Ordering::Relaxed),
            timer_fires: self.timer_fires.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time snapshot of the scheduler's tick counters.
///
/// `ticks` counts drive-resolution ticks; `media_fires` and `timer_fires`
/// count virtual-clock callback invocations fanned out from them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TickStats {
    pub ticks: u64,
    pub media_fires: u64,
    pub timer_fires: u64,
}

// ── Tests ─────────────────────────────────────────────────────────────────────
