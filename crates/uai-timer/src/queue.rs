//! `TimerQueue`: sparse, time-ordered one-shot timers.
//!
//! Timers are kept in a `BTreeMap` keyed by `(due, id)` so a turn only
//! touches the timers that are actually due, in a deterministic order: by
//! due time, then by creation order.  A side table maps live ids to their
//! due time so cancellation is O(log W).

use std::collections::BTreeMap;

use rustc_hash::FxHashMap;
use uai_core::{EntityId, SimTime, TimerId};

use crate::{TimerError, TimerResult, TimerService};

/// A timer that came due during [`TimerQueue::advance`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TimerFiring {
    pub id:        TimerId,
    pub owner:     EntityId,
    pub due:       SimTime,
    pub repeat_ms: u64,
    /// How far past `due` the queue was advanced before it fired.
    pub lateness:  u64,
}

impl TimerFiring {
    /// Offset for the next firing of a periodic timer, compensated for the
    /// lateness of this one.
    #[inline]
    pub fn next_offset(&self) -> u64 {
        self.repeat_ms.saturating_sub(self.lateness)
    }
}

#[derive(Copy, Clone, Debug)]
struct Scheduled {
    owner:     EntityId,
    repeat_ms: u64,
}

#[derive(Default)]
pub struct TimerQueue {
    now:     SimTime,
    next_id: u32,
    pending: BTreeMap<(SimTime, TimerId), Scheduled>,
    live:    FxHashMap<TimerId, SimTime>,
}

impl TimerQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Time of the last [`advance`](Self::advance).
    pub fn now(&self) -> SimTime {
        self.now
    }

    /// Schedule a timer due at `now + offset_ms`.
    pub fn schedule(&mut self, owner: EntityId, offset_ms: u64, repeat_ms: u64) -> TimerId {
        let id = TimerId(self.next_id);
        self.next_id = self.next_id.wrapping_add(1);
        if !id.is_valid() {
            // Skip the sentinel on wrap-around.
            return self.schedule(owner, offset_ms, repeat_ms);
        }
        let due = self.now.offset(offset_ms);
        self.pending.insert((due, id), Scheduled { owner, repeat_ms });
        self.live.insert(id, due);
        tracing::trace!(timer = %id, entity = %owner, %due, repeat_ms, "timer set");
        id
    }

    /// Remove a timer.  Returns `false` if it was not pending.
    pub fn cancel(&mut self, id: TimerId) -> bool {
        match self.live.remove(&id) {
            Some(due) => {
                self.pending.remove(&(due, id));
                tracing::trace!(timer = %id, "timer cancelled");
                true
            }
            None => false,
        }
    }

    /// Cancel every timer owned by `owner`.  Returns how many were removed.
    pub fn cancel_owner(&mut self, owner: EntityId) -> usize {
        let ids: Vec<TimerId> = self
            .pending
            .iter()
            .filter(|(_, s)| s.owner == owner)
            .map(|(&(_, id), _)| id)
            .collect();
        for &id in &ids {
            self.cancel(id);
        }
        ids.len()
    }

    /// Move the clock to `now` and remove every timer due at or before it.
    ///
    /// Timers scheduled from the returned firings are relative to `now` and
    /// are never returned by the same call.
    pub fn advance(&mut self, now: SimTime) -> TimerResult<Vec<TimerFiring>> {
        if now < self.now {
            return Err(TimerError::ClockRegression { previous: self.now, now });
        }
        self.now = now;

        let mut fired = Vec::new();
        while let Some(entry) = self.pending.first_entry() {
            let (due, id) = *entry.key();
            if due > now {
                break;
            }
            let scheduled = entry.remove();
            self.live.remove(&id);
            fired.push(TimerFiring {
                id,
                owner: scheduled.owner,
                due,
                repeat_ms: scheduled.repeat_ms,
                lateness: now.since(due),
            });
        }
        Ok(fired)
    }

    pub fn is_pending(&self, id: TimerId) -> bool {
        self.live.contains_key(&id)
    }

    /// Due time of the earliest pending timer.
    pub fn next_due(&self) -> Option<SimTime> {
        self.pending.keys().next().map(|&(due, _)| due)
    }

    /// Number of timers currently pending for `owner`.
    pub fn count_for(&self, owner: EntityId) -> usize {
        self.pending.values().filter(|s| s.owner == owner).count()
    }

    pub fn len(&self) -> usize {
        self.live.len()
    }

    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }
}

impl TimerService for TimerQueue {
    fn set_timeout(&mut self, owner: EntityId, offset_ms: u64, repeat_ms: u64) -> TimerId {
        self.schedule(owner, offset_ms, repeat_ms)
    }

    fn cancel_timer(&mut self, id: TimerId) {
        self.cancel(id);
    }
}
