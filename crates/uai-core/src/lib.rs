//! `uai-core`: foundational types for the `rust_uai` unit behavior controller.
//!
//! This crate is a dependency of every other `uai-*` crate.  It has no
//! `uai-*` dependencies and minimal external ones (only `rand` and
//! `thiserror`, plus optional `serde`).
//!
//! # What lives here
//!
//! | Module          | Contents                                              |
//! |-----------------|-------------------------------------------------------|
//! | [`ids`]         | `EntityId`, `PlayerId`, `TimerId`, `QueryId`          |
//! | [`geo`]         | `Point`, `RangeBand`                                  |
//! | [`time`]        | `SimTime`, `SimClock`, `SimConfig`                    |
//! | [`resource`]    | `ResourceType`, `QueryFilter`                         |
//! | [`rng`]         | `SimRng` (scenario generation only)                   |
//! | [`error`]       | `CoreError`, `CoreResult`                             |
//!
//! # Feature flags
//!
//! | Flag    | Effect                                                     |
//! |---------|------------------------------------------------------------|
//! | `serde` | Adds `Serialize`/`Deserialize` to all public types.        |

pub mod error;
pub mod geo;
pub mod ids;
pub mod resource;
pub mod rng;
pub mod time;

#[cfg(test)]
mod tests;

// ── Re-exports ────────────────────────────────────────────────────────────────

pub use error::{CoreError, CoreResult};
pub use geo::{Point, RangeBand};
pub use ids::{EntityId, PlayerId, QueryId, TimerId};
pub use resource::{QueryFilter, ResourceType};
pub use rng::SimRng;
pub use time::{SimClock, SimConfig, SimTime};
