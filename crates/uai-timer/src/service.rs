//! The time-service interface a unit controller schedules against.

use uai_core::{EntityId, TimerId};

/// Schedules one-shot callbacks for an entity.
///
/// A timer fires once, `offset_ms` after it was set, and the owner is handed
/// its `repeat_ms` along with how late the firing was.  Periodic behavior is
/// built by the owner setting a fresh timer from each firing, which lets it
/// correct for lateness.
pub trait TimerService {
    /// Schedule a firing for `owner` after `offset_ms`.
    fn set_timeout(&mut self, owner: EntityId, offset_ms: u64, repeat_ms: u64) -> TimerId;

    /// Cancel a timer.  Unknown or already-fired ids are ignored.
    fn cancel_timer(&mut self, id: TimerId);
}
