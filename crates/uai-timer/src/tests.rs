//! Unit tests for uai-timer.

#[cfg(test)]
mod queue {
    use uai_core::{EntityId, SimTime};

    use crate::{TimerError, TimerQueue, TimerService};

    #[test]
    fn fires_in_due_order() {
        let mut q = TimerQueue::new();
        let late = q.schedule(EntityId(1), 500, 0);
        let early = q.schedule(EntityId(2), 100, 0);
        let fired = q.advance(SimTime(1_000)).unwrap();
        let ids: Vec<_> = fired.iter().map(|f| f.id).collect();
        assert_eq!(ids, vec![early, late]);
        assert!(q.is_empty());
    }

    #[test]
    fn not_due_stays_pending() {
        let mut q = TimerQueue::new();
        let id = q.schedule(EntityId(1), 1_000, 0);
        assert!(q.advance(SimTime(999)).unwrap().is_empty());
        assert!(q.is_pending(id));
        assert_eq!(q.next_due(), Some(SimTime(1_000)));
        assert_eq!(q.advance(SimTime(1_000)).unwrap().len(), 1);
    }

    #[test]
    fn lateness_is_measured_from_due_time() {
        let mut q = TimerQueue::new();
        q.schedule(EntityId(1), 300, 1_000);
        let fired = q.advance(SimTime(400)).unwrap();
        assert_eq!(fired[0].lateness, 100);
        assert_eq!(fired[0].next_offset(), 900);
    }

    #[test]
    fn next_offset_never_negative() {
        let mut q = TimerQueue::new();
        q.schedule(EntityId(1), 0, 200);
        let fired = q.advance(SimTime(1_000)).unwrap();
        assert_eq!(fired[0].next_offset(), 0);
    }

    #[test]
    fn cancel_is_idempotent() {
        let mut q = TimerQueue::new();
        let id = q.set_timeout(EntityId(3), 100, 100);
        assert!(q.cancel(id));
        assert!(!q.cancel(id));
        q.cancel_timer(id);
        assert!(q.advance(SimTime(500)).unwrap().is_empty());
    }

    #[test]
    fn cancel_owner_removes_only_that_owner() {
        let mut q = TimerQueue::new();
        q.schedule(EntityId(1), 100, 0);
        q.schedule(EntityId(1), 200, 0);
        q.schedule(EntityId(2), 100, 0);
        assert_eq!(q.cancel_owner(EntityId(1)), 2);
        assert_eq!(q.count_for(EntityId(1)), 0);
        assert_eq!(q.count_for(EntityId(2)), 1);
    }

    #[test]
    fn rearmed_timer_is_relative_to_advance_time() {
        let mut q = TimerQueue::new();
        q.schedule(EntityId(1), 100, 100);
        let fired = q.advance(SimTime(150)).unwrap();
        let next = q.schedule(EntityId(1), fired[0].next_offset(), 100);
        assert!(q.advance(SimTime(150)).unwrap().is_empty());
        let fired = q.advance(SimTime(200)).unwrap();
        assert_eq!(fired[0].id, next);
        assert_eq!(fired[0].lateness, 0);
    }

    #[test]
    fn clock_cannot_go_backwards() {
        let mut q = TimerQueue::new();
        q.advance(SimTime(1_000)).unwrap();
        assert_eq!(
            q.advance(SimTime(500)),
            Err(TimerError::ClockRegression { previous: SimTime(1_000), now: SimTime(500) })
        );
    }
}
