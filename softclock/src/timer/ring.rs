/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Sorted ring of armed timer entries.
//!
//! Pure data structure, no locking and no callbacks, so the ordering
//! invariants can be tested independently of the [`TimerManager`].
//!
//! The C original kept an intrusive doubly-linked list threaded through the
//! timer objects themselves. Ring sizes are small in practice (tens of
//! entries per call leg), so this is a plain `Vec` kept sorted ascending by
//! `(deadline, seq)`. `seq` is a monotonically increasing arm counter: two
//! entries armed for the same deadline fire in arm order.
//!
//! [`TimerManager`]: super::TimerManager

/// One armed entry. `payload` is whatever the owner needs to find the timer
/// again at fire time.
#[derive(Debug)]
pub(crate) struct RingEntry<T> {
    pub deadline: u64,
    pub seq: u64,
    pub id: u64,
    pub payload: T,
}

/// Ordered collection of armed timers, head = next to fire.
#[derive(Debug, Default)]
pub(crate) struct TimerRing<T> {
    entries: Vec<RingEntry<T>>,
    next_seq: u64,
}

impl<T> TimerRing<T> {
    pub fn new() -> Self {
        TimerRing {
            entries: Vec::new(),
            next_seq: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// `true` if an entry with `id` is currently armed.
    pub fn contains(&self, id: u64) -> bool {
        self.entries.iter().any(|e| e.id == id)
    }

    /// Insert an entry for `id`, replacing any existing entry with the same
    /// id first. Arming is therefore re-entrant safe: a timer is never
    /// present twice.
    pub fn insert(&mut self, id: u64, deadline: u64, payload: T) {
        self.remove(id);

        let seq = self.next_seq;
        self.next_seq += 1;

        // Strictly-greater partition point keeps equal deadlines in seq order.
        let pos = self
            .entries
            .partition_point(|e| (e.deadline, e.seq) <= (deadline, seq));
        self.entries.insert(
            pos,
            RingEntry {
                deadline,
                seq,
                id,
                payload,
            },
        );
    }

    /// Remove the entry for `id`. Returns `false` if it was not armed.
    pub fn remove(&mut self, id: u64) -> bool {
        match self.entries.iter().position(|e| e.id == id) {
            Some(pos) => {
                self.entries.remove(pos);
                true
            }
            None => false,
        }
    }

    /// Deadline of the next entry to fire, if any.
    pub fn head_deadline(&self) -> Option<u64> {
        self.entries.first().map(|e| e.deadline)
    }

    /// Remove and return the next entry to fire.
    pub fn pop_front(&mut self) -> Option<RingEntry<T>> {
        if self.entries.is_empty() {
            None
        } else {
            Some(self.entries.remove(0))
        }
    }

    /// Shift every stored deadline down by `by`, saturating at zero.
    ///
    /// Already-due entries pin to deadline 0 and keep their seq order, so the
    /// fire order is unchanged; only the representation moves to a fresh
    /// origin.
    pub fn rebase(&mut self, by: u64) {
        for entry in &mut self.entries {
            entry.deadline = entry.deadline.saturating_sub(by);
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
