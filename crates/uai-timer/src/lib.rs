//! `uai-timer`: the time service units schedule periodic work against.
//!
//! # Crate layout
//!
//! | Module      | Contents                                             |
//! |-------------|------------------------------------------------------|
//! | [`service`] | `TimerService` trait                                 |
//! | [`queue`]   | `TimerQueue` (`BTreeMap<(SimTime, TimerId), _>`), `TimerFiring` |
//! | [`error`]   | `TimerError`, `TimerResult<T>`                       |
//!
//! # Drift correction
//!
//! Timers are one-shot.  A periodic owner re-arms from each firing with
//! [`TimerFiring::next_offset`], `repeat - lateness` clamped at zero, so a
//! late tick shortens the following interval instead of shifting every later
//! tick.

pub mod error;
pub mod queue;
pub mod service;

#[cfg(test)]
mod tests;

pub use error::{TimerError, TimerResult};
pub use queue::{TimerFiring, TimerQueue};
pub use service::TimerService;
