/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Structured error types for the tick scheduler.
//!
//! Configuration errors are returned synchronously from the call that caused
//! them; there is no deferred error channel. A failed `start` leaves the
//! scheduler `Stopped` with nothing running.

use thiserror::Error;

/// Top-level error type returned by
/// [`Scheduler::start()`](super::Scheduler::start).
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// `start()` was called with neither a media clock nor a timer clock
    /// registered. There is nothing to schedule; rejected before any driver
    /// resource is allocated.
    #[error("no clocks registered — nothing to schedule")]
    NoClocksRegistered,

    /// `start()` was called on a scheduler that is already running.
    #[error("scheduler is already running")]
    AlreadyRunning,

    /// The platform driver could not be created (thread spawn or runtime
    /// construction failed). Carries the OS error; no scheduler state is
    /// left partially running.
    #[error("platform timer driver creation failed: {0}")]
    DriverCreation(#[from] std::io::Error),
}
