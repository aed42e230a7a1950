//! Simulation observer trait for progress reporting and data collection.

use uai_core::SimTime;

use crate::SimWorld;

/// What happened during one turn.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct TurnStats {
    pub timers_fired:  usize,
    /// Events routed to units (motion, attacks, construction, formations).
    pub events:        usize,
    pub range_updates: usize,
    pub removed:       usize,
}

/// Callbacks invoked by [`Sim::run`][crate::Sim::run] at turn boundaries.
///
/// All methods have default no-op implementations so implementors only need to
/// override what they care about.
///
/// # Example: body count
///
/// ```rust,ignore
/// struct Casualties(usize);
///
/// impl SimObserver for Casualties {
///     fn on_turn_end(&mut self, _turn: u64, stats: &TurnStats, _world: &SimWorld) {
///         self.0 += stats.removed;
///     }
/// }
/// ```
pub trait SimObserver {
    /// Called at the very start of each turn, before timers fire.
    fn on_turn_start(&mut self, _turn: u64, _now: SimTime) {}

    /// Called after the turn's removals, with read access to the world.
    fn on_turn_end(&mut self, _turn: u64, _stats: &TurnStats, _world: &SimWorld) {}

    /// Called once after the final turn of [`Sim::run`][crate::Sim::run].
    fn on_sim_end(&mut self, _turns: u64, _world: &SimWorld) {}
}

/// A [`SimObserver`] that does nothing.
pub struct NoopObserver;

impl SimObserver for NoopObserver {}
