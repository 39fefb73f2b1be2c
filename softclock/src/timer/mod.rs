//! One-shot timer manager driven by the scheduler's timer clock.
//!
//! [`TimerManager`] keeps a sorted ring of armed timers, each with an
//! absolute deadline in the manager's own elapsed-tick domain (not
//! wall-clock). On every timer-clock invocation it advances `elapsed` by its
//! resolution and fires everything that has come due, in deadline order.
//! Call-processing code uses it for retransmission timeouts, media pacing
//! and deferred actions.
//!
//! # Design decisions vs the C implementation
//!
//! | Topic | C | Rust |
//! |---|---|---|
//! | Collection | Intrusive linked ring through the timer structs | [`TimerRing`], a sorted `Vec` keyed by timer id |
//! | arm/kill vs fire | Unsynchronised (a latent data race) | One mutex around collection and counter |
//! | Callback ownership | Caller-owned `void*`, dangles if freed while armed | Handle owns the callback; the ring holds a weak ref |
//! | "armed" flag | Sentinel deadline `0` | Ring membership is the armed state |
//!
//! The mutex is released for the callback invocation itself: the due timer
//! is removed and disarmed first, which is what makes it safe for a fire
//! callback to arm or kill timers, including its own.

pub mod ring;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

use thiserror::Error;
use tracing::{debug, trace};

use crate::scheduler::Scheduler;
use ring::TimerRing;

// ── Constants ─────────────────────────────────────────────────────────────────

/// Default timer-clock resolution, in ms. Coarse relative to media pacing:
/// signalling timeouts do not need frame granularity.
pub const DEFAULT_RESOLUTION_MS: u64 = 100;

/// Elapsed-counter value that triggers a deadline rebase.
///
/// A wide safety margin, far below any real `u64` overflow: deadlines stay
/// expressed relative to a recent origin over long uptimes.
const REBASE_LIMIT: u64 = 0xFFFF;

// ── Errors ────────────────────────────────────────────────────────────────────

/// Errors returned by [`TimerManager::arm`] / [`TimerHandle::arm`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TimerError {
    /// `arm()` was called with a timeout of 0. The timer stays disarmed.
    #[error("timer timeout must be greater than zero")]
    InvalidTimeout,

    /// The manager backing this handle has been dropped.
    #[error("timer manager is gone")]
    ManagerGone,
}

// ── Timer objects ─────────────────────────────────────────────────────────────

/// Callback invoked when a timer fires. Receives the timer's own handle so
/// it can re-arm or kill itself.
pub type TimerCallback = Box<dyn FnMut(&TimerHandle) + Send>;

/// The caller-owned half of a timer: identity plus the fire callback.
struct TimerCore {
    id: u64,
    callback: Mutex<TimerCallback>,
}

/// Handle to a one-shot, re-armable timer.
///
/// The handle (and its clones) own the timer; while armed, the manager holds
/// only a weak reference. Identity is stable across re-arming. Kill the
/// timer before dropping the last handle if it must not fire afterwards;
/// a still-armed entry whose handles are all gone is skipped at fire time.
#[derive(Clone)]
pub struct TimerHandle {
    core: Arc<TimerCore>,
    inner: Weak<Mutex<TimerInner>>,
}

impl TimerHandle {
    /// Arm this timer, replacing any pending arm. See [`TimerManager::arm`].
    pub fn arm(&self, timeout_ms: u64) -> Result<(), TimerError> {
        let inner = self.inner.upgrade().ok_or(TimerError::ManagerGone)?;
        arm_entry(&inner, self, timeout_ms)
    }

    /// Kill this timer. See [`TimerManager::kill`].
    pub fn kill(&self) -> bool {
        match self.inner.upgrade() {
            Some(inner) => kill_entry(&inner, self.core.id),
            None => false,
        }
    }

    /// `true` while this timer sits in the manager's ring.
    pub fn is_armed(&self) -> bool {
        match self.inner.upgrade() {
            Some(inner) => inner.lock().unwrap().ring.contains(self.core.id),
            None => false,
        }
    }
}

impl std::fmt::Debug for TimerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimerHandle")
            .field("id", &self.core.id)
            .finish()
    }
}

// ── Manager ───────────────────────────────────────────────────────────────────

/// State shared between the driver thread (fire path) and caller threads
/// (arm/kill). The one lock of the subsystem.
struct TimerInner {
    ring: TimerRing<Weak<TimerCore>>,
    /// Ticks elapsed, in ms, since the last idle reset or rebase.
    elapsed: u64,
}

/// Sorted collection of one-shot timers, driven by a scheduler's timer
/// clock.
///
/// Bound to one scheduler for its whole lifetime; `resolution` is fixed at
/// construction and equals the timer clock's registered period.
pub struct TimerManager {
    inner: Arc<Mutex<TimerInner>>,
    resolution_ms: u64,
    next_id: AtomicU64,
}

impl TimerManager {
    /// Create a manager and register it as `scheduler`'s timer clock with
    /// period `resolution_ms` (0 selects [`DEFAULT_RESOLUTION_MS`]).
    pub fn new(scheduler: &mut Scheduler, resolution_ms: u64) -> Self {
        let resolution_ms = if resolution_ms == 0 {
            DEFAULT_RESOLUTION_MS
        } else {
            resolution_ms
        };

        let inner = Arc::new(Mutex::new(TimerInner {
            ring: TimerRing::new(),
            elapsed: 0,
        }));

        let tick_inner = Arc::clone(&inner);
        scheduler.set_timer_clock(resolution_ms, move || {
            fire_due(&tick_inner, resolution_ms);
        });

        debug!(resolution_ms, "timer manager attached");
        TimerManager {
            inner,
            resolution_ms,
            next_id: AtomicU64::new(1),
        }
    }

    /// Allocate a disarmed timer owning `callback`. No scheduling effect
    /// until armed.
    pub fn create_timer(
        &self,
        callback: impl FnMut(&TimerHandle) + Send + 'static,
    ) -> TimerHandle {
        let core = Arc::new(TimerCore {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            callback: Mutex::new(Box::new(callback)),
        });
        TimerHandle {
            core,
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Arm `timer` to fire after `timeout_ms` of timer-clock time.
    ///
    /// The deadline is `elapsed + timeout_ms`. An already-armed timer is
    /// removed first and reinserted, never duplicated.
    ///
    /// # Errors
    /// [`TimerError::InvalidTimeout`] for a zero timeout; the timer remains
    /// disarmed (or keeps its previous arm).
    pub fn arm(&self, timer: &TimerHandle, timeout_ms: u64) -> Result<(), TimerError> {
        arm_entry(&self.inner, timer, timeout_ms)
    }

    /// Disarm `timer`. Returns `false` if it was not armed (never armed,
    /// already fired, or already killed); kill only prevents future fires.
    pub fn kill(&self, timer: &TimerHandle) -> bool {
        kill_entry(&self.inner, timer.core.id)
    }

    /// The timer-clock period this manager was registered with, in ms.
    pub fn resolution_ms(&self) -> u64 {
        self.resolution_ms
    }

    /// Number of currently armed timers.
    pub fn armed_count(&self) -> usize {
        self.inner.lock().unwrap().ring.len()
    }
}

impl std::fmt::Debug for TimerManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimerManager")
            .field("resolution_ms", &self.resolution_ms)
            .field("armed", &self.armed_count())
            .finish()
    }
}

// ── Shared arm/kill/fire paths ────────────────────────────────────────────────

fn arm_entry(
    inner: &Arc<Mutex<TimerInner>>,
    timer: &TimerHandle,
    timeout_ms: u64,
) -> Result<(), TimerError> {
    if timeout_ms == 0 {
        return Err(TimerError::InvalidTimeout);
    }

    let mut guard = inner.lock().unwrap();
    let deadline = guard.elapsed + timeout_ms;
    guard
        .ring
        .insert(timer.core.id, deadline, Arc::downgrade(&timer.core));
    trace!(id = timer.core.id, deadline, "timer armed");
    Ok(())
}

fn kill_entry(inner: &Arc<Mutex<TimerInner>>, id: u64) -> bool {
    let mut guard = inner.lock().unwrap();
    let removed = guard.ring.remove(id);
    if removed {
        trace!(id, "timer killed");
        if guard.ring.is_empty() {
            // Idle reset: bound counter growth while nothing is armed.
            guard.elapsed = 0;
        }
    }
    removed
}

/// The timer-clock callback: advance `elapsed` and fire everything due.
///
/// The lock is dropped for each callback invocation; the fired timer is out
/// of the ring and disarmed before its callback runs, so the callback can
/// freely arm or kill timers, itself included.
fn fire_due(inner: &Arc<Mutex<TimerInner>>, resolution_ms: u64) {
    {
        let mut guard = inner.lock().unwrap();
        if guard.ring.is_empty() {
            return;
        }
        guard.elapsed += resolution_ms;

        if guard.elapsed >= REBASE_LIMIT {
            let origin = guard.elapsed;
            guard.ring.rebase(origin);
            guard.elapsed = 0;
            debug!(origin, "rebased timer deadlines");
        }
    }

    loop {
        let due = {
            let mut guard = inner.lock().unwrap();
            match guard.ring.head_deadline() {
                Some(deadline) if deadline <= guard.elapsed => guard.ring.pop_front(),
                Some(_) => None,
                None => {
                    guard.elapsed = 0;
                    None
                }
            }
        };

        let Some(entry) = due else { break };

        // All handles dropped while armed: nothing left to call.
        let Some(core) = entry.payload.upgrade() else {
            continue;
        };

        trace!(id = core.id, deadline = entry.deadline, "timer fired");
        let handle = TimerHandle {
            core: Arc::clone(&core),
            inner: Arc::downgrade(inner),
        };
        let mut callback = core.callback.lock().unwrap();
        (*callback)(&handle);
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::DriverKind;
    use std::sync::mpsc;
    use std::time::Duration;

    const RES: u64 = 100;

    /// Manager on a scheduler that is never started; ticks are injected by
    /// calling `tick` directly, which is exactly what the scheduler's timer
    /// clock does.
    fn manual_manager() -> TimerManager {
        let mut sched = Scheduler::new(DriverKind::Thread);
        TimerManager::new(&mut sched, RES)
    }

    fn tick(mgr: &TimerManager) {
        fire_due(&mgr.inner, mgr.resolution_ms);
    }

    fn elapsed(mgr: &TimerManager) -> u64 {
        mgr.inner.lock().unwrap().elapsed
    }

    /// Timer that appends `label` to a shared log on every fire.
    fn logging_timer(
        mgr: &TimerManager,
        log: &Arc<Mutex<Vec<&'static str>>>,
        label: &'static str,
    ) -> TimerHandle {
        let log = Arc::clone(log);
        mgr.create_timer(move |_| log.lock().unwrap().push(label))
    }

    // ── Deadline order ────────────────────────────────────────────────────────

    #[test]
    fn earlier_deadline_fires_first() {
        let mgr = manual_manager();
        let log = Arc::new(Mutex::new(Vec::new()));

        let a = logging_timer(&mgr, &log, "a");
        let b = logging_timer(&mgr, &log, "b");
        mgr.arm(&a, 300).unwrap();
        mgr.arm(&b, 100).unwrap();

        tick(&mgr);
        assert_eq!(*log.lock().unwrap(), vec!["b"]);

        tick(&mgr);
        tick(&mgr);
        assert_eq!(*log.lock().unwrap(), vec!["b", "a"]);
    }

    #[test]
    fn equal_deadlines_fire_in_arm_order() {
        let mgr = manual_manager();
        let log = Arc::new(Mutex::new(Vec::new()));

        let a = logging_timer(&mgr, &log, "a");
        let b = logging_timer(&mgr, &log, "b");
        mgr.arm(&a, 200).unwrap();
        mgr.arm(&b, 200).unwrap();

        tick(&mgr);
        assert!(log.lock().unwrap().is_empty());

        tick(&mgr);
        assert_eq!(*log.lock().unwrap(), vec!["a", "b"]);
    }

    #[test]
    fn sub_resolution_timeout_fires_on_next_tick() {
        let mgr = manual_manager();
        let log = Arc::new(Mutex::new(Vec::new()));
        let t = logging_timer(&mgr, &log, "t");
        mgr.arm(&t, 1).unwrap();

        tick(&mgr);
        assert_eq!(*log.lock().unwrap(), vec!["t"]);
    }

    // ── One-shot semantics ────────────────────────────────────────────────────

    #[test]
    fn a_timer_fires_at_most_once_per_arm() {
        let mgr = manual_manager();
        let log = Arc::new(Mutex::new(Vec::new()));
        let t = logging_timer(&mgr, &log, "t");
        mgr.arm(&t, 100).unwrap();

        for _ in 0..5 {
            tick(&mgr);
        }
        assert_eq!(*log.lock().unwrap(), vec!["t"]);
        assert!(!t.is_armed());
    }

    #[test]
    fn rearming_replaces_the_pending_deadline() {
        let mgr = manual_manager();
        let log = Arc::new(Mutex::new(Vec::new()));
        let t = logging_timer(&mgr, &log, "t");

        mgr.arm(&t, 100).unwrap();
        mgr.arm(&t, 300).unwrap();
        assert_eq!(mgr.armed_count(), 1);

        tick(&mgr);
        assert!(log.lock().unwrap().is_empty(), "first deadline was replaced");
        tick(&mgr);
        tick(&mgr);
        assert_eq!(*log.lock().unwrap(), vec!["t"]);
    }

    // ── kill ──────────────────────────────────────────────────────────────────

    #[test]
    fn kill_prevents_the_fire_and_reports_state() {
        let mgr = manual_manager();
        let log = Arc::new(Mutex::new(Vec::new()));
        let t = logging_timer(&mgr, &log, "t");
        mgr.arm(&t, 500).unwrap();

        assert!(mgr.kill(&t));
        for _ in 0..10 {
            tick(&mgr);
        }
        assert!(log.lock().unwrap().is_empty());
        assert!(!mgr.kill(&t), "second kill reports not armed");
    }

    #[test]
    fn kill_of_never_armed_timer_is_a_noop() {
        let mgr = manual_manager();
        let t = mgr.create_timer(|_| {});
        assert!(!mgr.kill(&t));
    }

    #[test]
    fn kill_after_fire_returns_false() {
        let mgr = manual_manager();
        let log = Arc::new(Mutex::new(Vec::new()));
        let t = logging_timer(&mgr, &log, "t");
        mgr.arm(&t, 100).unwrap();
        tick(&mgr);
        assert_eq!(log.lock().unwrap().len(), 1);
        assert!(!mgr.kill(&t));
    }

    // ── arm validation ────────────────────────────────────────────────────────

    #[test]
    fn zero_timeout_is_rejected_and_timer_stays_disarmed() {
        let mgr = manual_manager();
        let t = mgr.create_timer(|_| {});
        assert_eq!(mgr.arm(&t, 0), Err(TimerError::InvalidTimeout));
        assert!(!t.is_armed());
        assert_eq!(mgr.armed_count(), 0);
    }

    #[test]
    fn failed_arm_is_safe_to_retry() {
        let mgr = manual_manager();
        let t = mgr.create_timer(|_| {});
        assert!(mgr.arm(&t, 0).is_err());
        mgr.arm(&t, 100).unwrap();
        assert!(t.is_armed());
    }

    // ── Re-arm from the fire callback ─────────────────────────────────────────

    #[test]
    fn callback_rearming_itself_yields_exactly_one_armed_entry() {
        let mgr = manual_manager();
        let fires = Arc::new(AtomicU64::new(0));
        let fires_in = Arc::clone(&fires);

        let t = mgr.create_timer(move |me| {
            fires_in.fetch_add(1, Ordering::Relaxed);
            me.arm(100).unwrap();
        });
        mgr.arm(&t, 100).unwrap();

        tick(&mgr);
        assert_eq!(fires.load(Ordering::Relaxed), 1);
        assert_eq!(mgr.armed_count(), 1, "re-arm produced a single entry");
        assert!(t.is_armed());

        tick(&mgr);
        assert_eq!(fires.load(Ordering::Relaxed), 2, "periodic via self re-arm");
    }

    #[test]
    fn callback_may_arm_and_kill_other_timers() {
        let mgr = manual_manager();
        let log = Arc::new(Mutex::new(Vec::new()));

        let victim = logging_timer(&mgr, &log, "victim");
        mgr.arm(&victim, 200).unwrap();

        let v = victim.clone();
        let killer = mgr.create_timer(move |_| {
            assert!(v.kill());
        });
        mgr.arm(&killer, 100).unwrap();

        for _ in 0..5 {
            tick(&mgr);
        }
        assert!(log.lock().unwrap().is_empty(), "victim was killed in time");
    }

    // ── Idle reset ────────────────────────────────────────────────────────────

    #[test]
    fn elapsed_resets_when_last_timer_is_killed() {
        let mgr = manual_manager();
        let t = mgr.create_timer(|_| {});
        mgr.arm(&t, 1000).unwrap();
        for _ in 0..3 {
            tick(&mgr);
        }
        assert_eq!(elapsed(&mgr), 300);

        mgr.kill(&t);
        assert_eq!(elapsed(&mgr), 0);
    }

    #[test]
    fn elapsed_resets_after_last_timer_fires() {
        let mgr = manual_manager();
        let log = Arc::new(Mutex::new(Vec::new()));
        let t = logging_timer(&mgr, &log, "t");
        mgr.arm(&t, 100).unwrap();

        tick(&mgr);
        assert_eq!(log.lock().unwrap().len(), 1);
        // The fire sweep emptied the ring and reset the counter in the same tick.
        assert_eq!(elapsed(&mgr), 0);
    }

    #[test]
    fn idle_ticks_do_not_advance_elapsed() {
        let mgr = manual_manager();
        for _ in 0..10 {
            tick(&mgr);
        }
        assert_eq!(elapsed(&mgr), 0);

        // The next arm is relative to the untouched origin.
        let log = Arc::new(Mutex::new(Vec::new()));
        let t = logging_timer(&mgr, &log, "t");
        mgr.arm(&t, 100).unwrap();
        tick(&mgr);
        assert_eq!(log.lock().unwrap().len(), 1);
    }

    // ── Rebase ────────────────────────────────────────────────────────────────

    #[test]
    fn rebase_preserves_pending_delay_and_order() {
        let mgr = manual_manager();
        let log = Arc::new(Mutex::new(Vec::new()));

        // Park the counter just below the limit, with two timers pending.
        mgr.inner.lock().unwrap().elapsed = REBASE_LIMIT - RES;
        let a = logging_timer(&mgr, &log, "a");
        let b = logging_timer(&mgr, &log, "b");
        mgr.arm(&a, 300).unwrap();
        mgr.arm(&b, 500).unwrap();

        // This tick crosses the limit and rebases.
        tick(&mgr);
        assert_eq!(elapsed(&mgr), 0);
        assert!(log.lock().unwrap().is_empty());

        // a was 300 ms out and one tick has passed: two more ticks to go.
        tick(&mgr);
        tick(&mgr);
        assert_eq!(*log.lock().unwrap(), vec!["a"]);

        tick(&mgr);
        tick(&mgr);
        assert_eq!(*log.lock().unwrap(), vec!["a", "b"]);
    }

    #[test]
    fn rebase_fires_already_due_timers_in_order() {
        let mgr = manual_manager();
        let log = Arc::new(Mutex::new(Vec::new()));

        mgr.inner.lock().unwrap().elapsed = REBASE_LIMIT - RES;
        let a = logging_timer(&mgr, &log, "a");
        let b = logging_timer(&mgr, &log, "b");
        // Due on exactly the crossing tick.
        mgr.arm(&a, RES).unwrap();
        mgr.arm(&b, RES).unwrap();

        tick(&mgr);
        assert_eq!(*log.lock().unwrap(), vec!["a", "b"]);
    }

    // ── Dropped handles ───────────────────────────────────────────────────────

    #[test]
    fn armed_timer_with_no_handles_is_skipped() {
        let mgr = manual_manager();
        let log = Arc::new(Mutex::new(Vec::new()));
        let t = logging_timer(&mgr, &log, "t");
        mgr.arm(&t, 100).unwrap();
        drop(t);

        tick(&mgr);
        assert!(log.lock().unwrap().is_empty());
        assert_eq!(mgr.armed_count(), 0);
    }

    #[test]
    fn handle_outliving_manager_degrades_gracefully() {
        let mut sched = Scheduler::new(DriverKind::Thread);
        let mgr = TimerManager::new(&mut sched, RES);
        let t = mgr.create_timer(|_| {});
        drop(mgr);
        drop(sched);

        assert_eq!(t.arm(100), Err(TimerError::ManagerGone));
        assert!(!t.kill());
        assert!(!t.is_armed());
    }

    // ── End to end with a live scheduler ──────────────────────────────────────

    #[test]
    fn timer_fires_under_a_running_scheduler() {
        let mut sched = Scheduler::new(DriverKind::Thread);
        let mgr = TimerManager::new(&mut sched, 10);

        let (fired_tx, fired_rx) = mpsc::channel();
        let t = mgr.create_timer(move |_| {
            let _ = fired_tx.send(());
        });
        mgr.arm(&t, 30).unwrap();

        sched.start().unwrap();
        fired_rx
            .recv_timeout(Duration::from_secs(5))
            .expect("timer should fire under the live clock");
        sched.stop();
        assert!(!t.is_armed());
    }

    #[test]
    fn arm_and_kill_from_other_threads_while_running() {
        let mut sched = Scheduler::new(DriverKind::Thread);
        let mgr = Arc::new(TimerManager::new(&mut sched, 5));
        sched.start().unwrap();

        let fires = Arc::new(AtomicU64::new(0));
        let mut workers = Vec::new();
        for _ in 0..4 {
            let mgr = Arc::clone(&mgr);
            let fires = Arc::clone(&fires);
            workers.push(std::thread::spawn(move || {
                for i in 0..50u64 {
                    let fires = Arc::clone(&fires);
                    let t = mgr.create_timer(move |_| {
                        fires.fetch_add(1, Ordering::Relaxed);
                    });
                    mgr.arm(&t, 5 + i % 20).unwrap();
                    if i % 3 == 0 {
                        mgr.kill(&t);
                    } else {
                        // Keep the handle alive long enough to fire.
                        std::thread::sleep(Duration::from_millis(40));
                    }
                }
            }));
        }
        for w in workers {
            w.join().unwrap();
        }

        std::thread::sleep(Duration::from_millis(100));
        sched.stop();
        assert!(fires.load(Ordering::Relaxed) > 0);
    }
}
