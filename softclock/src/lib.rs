/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Softclock – real-time clock and timer-multiplexing engine (Rust port)
//!
//! One physical periodic source drives the whole switch core: a media clock
//! ticking frame processing at audio-frame granularity and, derived from the
//! same clock, a timer clock driving a manager of one-shot timers used for
//! retransmission timeouts, media pacing and deferred actions.
//!
//! Module layout:
//!
//! ```text
//! lib.rs
//! ├── types.rs    – shared declarations: rate, callbacks, state, stats
//! ├── config/     – YAML engine configuration
//! ├── driver/     – platform tick sources (thread / runtime variants)
//! ├── scheduler/  – clock multiplexer: media + timer virtual clocks
//! └── timer/      – one-shot timer manager on the timer clock
//! ```
//!
//! # Example
//! ```rust
//! use softclock::{DriverKind, Scheduler, TimerManager};
//!
//! let mut sched = Scheduler::new(DriverKind::Thread);
//! let timers = TimerManager::new(&mut sched, 100);
//!
//! let bye = timers.create_timer(|_| println!("retransmit BYE"));
//! timers.arm(&bye, 300).unwrap();
//!
//! sched.start().unwrap();
//! // ... call processing ...
//! sched.stop();
//! ```

pub mod config;
pub mod driver;
pub mod scheduler;
pub mod timer;
pub mod types;

pub use config::EngineConfig;
pub use driver::DriverKind;
pub use scheduler::{Scheduler, SchedulerError};
pub use timer::{TimerError, TimerHandle, TimerManager};
pub use types::{Rate, SchedulerState, TickStats};
