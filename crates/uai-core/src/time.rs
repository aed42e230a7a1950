//! Simulation time model.
//!
//! # Design
//!
//! Time is a monotonically increasing millisecond counter, `SimTime`.  The
//! simulation advances in fixed-length turns held by `SimClock`:
//!
//!   now = turn * turn_length_ms
//!
//! Integer milliseconds keep timer arithmetic exact, which matters for the
//! drift correction applied to periodic timers: a timer that fires late by
//! `lateness` ms reschedules itself `repeat - lateness` ms ahead so the
//! long-run cadence stays at `repeat`.

use std::fmt;

use crate::CoreError;

// ── SimTime ──────────────────────────────────────────────────────────────────

/// An absolute simulation time in milliseconds.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SimTime(pub u64);

impl SimTime {
    pub const ZERO: SimTime = SimTime(0);

    /// The time `ms` milliseconds after `self`.
    #[inline]
    pub fn offset(self, ms: u64) -> SimTime {
        SimTime(self.0 + ms)
    }

    /// Milliseconds elapsed from `earlier` to `self`, saturating at zero.
    #[inline]
    pub fn since(self, earlier: SimTime) -> u64 {
        self.0.saturating_sub(earlier.0)
    }
}

impl std::ops::Add<u64> for SimTime {
    type Output = SimTime;
    #[inline]
    fn add(self, rhs: u64) -> SimTime {
        SimTime(self.0 + rhs)
    }
}

/// Same as [`SimTime::since`]: saturates at zero.
impl std::ops::Sub for SimTime {
    type Output = u64;
    #[inline]
    fn sub(self, rhs: SimTime) -> u64 {
        self.since(rhs)
    }
}

impl fmt::Display for SimTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}ms", self.0)
    }
}

// ── SimClock ──────────────────────────────────────────────────────────────────

/// Turn counter plus the fixed turn length.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SimClock {
    /// Milliseconds simulated per turn.
    pub turn_length_ms: u32,
    /// Number of completed turns.
    pub turn: u64,
}

impl SimClock {
    pub fn new(turn_length_ms: u32) -> Self {
        Self { turn_length_ms, turn: 0 }
    }

    /// Advance by one turn and return the new current time.
    #[inline]
    pub fn advance(&mut self) -> SimTime {
        self.turn += 1;
        self.now()
    }

    #[inline]
    pub fn now(&self) -> SimTime {
        SimTime(self.turn * self.turn_length_ms as u64)
    }

    /// Turn length in seconds, for speed × time movement maths.
    #[inline]
    pub fn turn_secs(&self) -> f32 {
        self.turn_length_ms as f32 / 1000.0
    }

    /// Turns needed to cover `ms` (rounds up so a timer is never early).
    #[inline]
    pub fn turns_for_ms(&self, ms: u64) -> u64 {
        ms.div_ceil(self.turn_length_ms as u64)
    }
}

impl fmt::Display for SimClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "turn {} ({})", self.turn, self.now())
    }
}

// ── SimConfig ─────────────────────────────────────────────────────────────────

/// Top-level simulation configuration.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SimConfig {
    /// Milliseconds per turn.  The classic RTS turn length is 200 ms.
    pub turn_length_ms: u32,

    /// Turns to simulate in `Sim::run`.
    pub total_turns: u64,

    /// Master RNG seed.  The same seed always produces identical results.
    pub seed: u64,
}

impl SimConfig {
    /// Reject configurations that would stall the clock.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.turn_length_ms == 0 {
            return Err(CoreError::Config("turn_length_ms must be positive".into()));
        }
        Ok(())
    }

    /// The time at which `Sim::run` stops.
    #[inline]
    pub fn end_time(&self) -> SimTime {
        SimTime(self.total_turns * self.turn_length_ms as u64)
    }

    pub fn make_clock(&self) -> SimClock {
        SimClock::new(self.turn_length_ms)
    }
}

impl Default for SimConfig {
    fn default() -> Self {
        Self { turn_length_ms: 200, total_turns: 300, seed: 42 }
    }
}
