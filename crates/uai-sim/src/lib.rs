//! `uai-sim`: a reference world and turn loop for the unit controller.
//!
//! # Turn loop
//!
//! ```text
//! for turn in 0..config.total_turns:
//!   ① Timers      fire due timers; each owner re-arms and runs its tick
//!   ② Movement    step every moving entity; arrivals become MotionChanged
//!   ③ Perception  rebuild the R-tree; deliver active range-query diffs
//!   ④ Removal     drop the dead, the exhausted and dissolved formations
//! ```
//!
//! After each of ①–③ the world's event queue (attacks, motion, finished
//! construction, formation relays) is drained into the affected units.
//!
//! # Crate layout
//!
//! | Module       | Contents                                               |
//! |--------------|--------------------------------------------------------|
//! | [`world`]    | `SimWorld`, implementing every collaborator trait      |
//! | [`entity`]   | `Entity`, its parts, and stock `Template`s             |
//! | [`event`]    | `SimEvent`                                             |
//! | [`sim`]      | `Sim`, `Command`                                       |
//! | [`builder`]  | `SimBuilder`, `Spawn`                                  |
//! | [`observer`] | `SimObserver`, `NoopObserver`, `TurnStats`             |
//! | [`scenario`] | CSV scenario loader                                    |
//! | [`error`]    | `SimError`, `SimResult<T>`                             |
//!
//! # Quick-start
//!
//! ```rust,ignore
//! use uai_core::{PlayerId, Point, SimConfig};
//! use uai_sim::{Command, NoopObserver, SimBuilder};
//!
//! let mut sim = SimBuilder::new(SimConfig::default())
//!     .spawn("worker", PlayerId(1), Point::new(0.0, 0.0))
//!     .spawn("tree", PlayerId::GAIA, Point::new(12.0, 0.0))
//!     .build()?;
//! sim.command(EntityId(1), Command::Gather(EntityId(2)), false)?;
//! sim.run(&mut NoopObserver)?;
//! ```

pub mod builder;
pub mod entity;
pub mod error;
pub mod event;
pub mod observer;
pub mod scenario;
pub mod sim;
pub mod world;

#[cfg(test)]
mod tests;

pub use builder::{SimBuilder, Spawn};
pub use entity::{Entity, Template};
pub use error::{SimError, SimResult};
pub use event::SimEvent;
pub use observer::{NoopObserver, SimObserver, TurnStats};
pub use scenario::{load_scenario_csv, load_scenario_reader};
pub use sim::{Command, EVENT_LIMIT, Sim};
pub use world::SimWorld;
