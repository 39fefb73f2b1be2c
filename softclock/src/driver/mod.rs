//! Platform timer drivers: the one physical periodic source.
//!
//! A driver owns a dedicated thread that calls the scheduler's tick function
//! at a fixed period until stopped. Two interchangeable strategies:
//!
//! * [`ThreadDriver`] – portable sleep loop with explicit drift
//!   compensation. The default; no runtime required.
//! * [`RuntimeDriver`] – a current-thread tokio runtime whose
//!   `tokio::time::interval` paces the ticks and bursts to catch up after a
//!   slow callback.
//!
//! Both satisfy the same contract: [`TickDriver::stop`] blocks until the
//! tick loop has exited, so after it returns no further tick can be
//! delivered and no tick is in flight.

pub mod runtime;
pub mod thread;

use std::io;
use std::time::Duration;

pub use runtime::RuntimeDriver;
pub use thread::ThreadDriver;

/// Tick entry point handed to a driver, invoked once per drive period on the
/// driver's thread.
pub(crate) type TickFn = Box<dyn FnMut() + Send>;

// ── Driver kind ───────────────────────────────────────────────────────────────

/// Which physical tick source backs a scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DriverKind {
    /// Dedicated thread, drift-compensated sleep.
    #[default]
    Thread,
    /// Callback-based: tokio interval on a dedicated current-thread runtime.
    Runtime,
}

impl DriverKind {
    /// Parse a configuration string. Returns `None` for unknown names.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "thread" => Some(DriverKind::Thread),
            "runtime" => Some(DriverKind::Runtime),
            _ => None,
        }
    }

    /// Canonical configuration name.
    pub fn as_str(self) -> &'static str {
        match self {
            DriverKind::Thread => "thread",
            DriverKind::Runtime => "runtime",
        }
    }
}

// ── TickDriver contract ───────────────────────────────────────────────────────

/// A running physical tick source.
pub(crate) trait TickDriver: Send {
    /// Stop ticking. Blocks until the driver thread has exited; after this
    /// returns, the tick function will never be called again.
    ///
    /// If a tick callback panicked, the panic is resumed on the stopping
    /// thread. The engine cannot keep ticking over state a panicking
    /// callback may have left behind.
    fn stop(self: Box<Self>);
}

/// Spawn the requested driver variant at `period`, ticking `tick`.
///
/// Fails with the underlying `io::Error` when the OS refuses the thread (or
/// the runtime cannot be built); nothing is left running on failure.
pub(crate) fn spawn_driver(
    kind: DriverKind,
    period: Duration,
    tick: TickFn,
) -> io::Result<Box<dyn TickDriver>> {
    match kind {
        DriverKind::Thread => Ok(Box::new(ThreadDriver::spawn(period, tick)?)),
        DriverKind::Runtime => Ok(Box::new(RuntimeDriver::spawn(period, tick)?)),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
