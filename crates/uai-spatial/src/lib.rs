//! `uai-spatial`: range queries over entity positions.
//!
//! # Crate layout
//!
//! | Module    | Contents                                                 |
//! |-----------|----------------------------------------------------------|
//! | [`index`] | `RangeIndex` (R-tree via `rstar`), `Tracked`, `QuerySpec` |
//! | [`query`] | `QueryRegistry` of active queries, `RangeUpdate`         |
//! | [`error`] | `SpatialError`, `SpatialResult<T>`                       |
//!
//! One-shot queries (`RangeIndex::query`) answer "who is near me right now".
//! Active queries are standing subscriptions: each
//! `QueryRegistry::update` reports, per enabled query, which matching
//! entities came into range and which left since the previous report.

pub mod error;
pub mod index;
pub mod query;

#[cfg(test)]
mod tests;

pub use error::{SpatialError, SpatialResult};
pub use index::{QuerySpec, RangeIndex, Tracked};
pub use query::{QueryRegistry, RangeUpdate};
