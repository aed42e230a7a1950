//! `uai-behavior`: the unit behavior controller.
//!
//! A [`UnitAi`] owns one unit's order queue, stance, timer handle and
//! line-of-sight query, and runs on the shared behavior tree in [`states`].
//! It never touches game data directly: everything it needs (movement,
//! combat, gathering, perception, presentation, timers) is reached through
//! the [`World`] trait, so the same controller runs inside `uai-sim` or
//! against a scripted test double.
//!
//! # Crate layout
//!
//! | Module      | Contents                                                   |
//! |-------------|------------------------------------------------------------|
//! | [`unit_ai`] | `UnitAi`, `Regime`, order commands and event entry points  |
//! | [`states`]  | the behavior tree (`tree()`, `build_tree()`)               |
//! | [`order`]   | `Order`, `OrderKind`, `OrderQueue`                         |
//! | [`message`] | `UnitMessage`, `MessageKind`                               |
//! | [`world`]   | collaborator traits and `World`                            |
//! | [`stance`]  | `Stance`                                                   |
//! | [`config`]  | `UnitAiConfig`                                             |
//! | [`error`]   | `BehaviorError`, `BehaviorResult<T>`                       |
//!
//! # Driving a unit
//!
//! ```ignore
//! let mut unit = UnitAi::new(id, Regime::Unit, UnitAiConfig::default());
//! unit.on_create(&mut world)?;
//! unit.on_ownership_changed(&mut world, Some(PlayerId(1)));
//! unit.attack(&mut world, enemy, false)?;
//! // later, as the world reports back:
//! unit.on_motion_changed(&mut world, false, false)?;
//! unit.on_timer(&mut world, &firing)?;
//! ```
//!
//! # Feature flags
//!
//! | Flag    | Effect                                                     |
//! |---------|------------------------------------------------------------|
//! | `serde` | `Serialize`/`Deserialize` on orders, stances and config.   |

pub mod config;
pub mod error;
pub mod message;
pub mod order;
pub mod stance;
pub mod states;
pub mod unit_ai;
pub mod world;


// ── Re-exports ────────────────────────────────────────────────────────────────

pub use config::UnitAiConfig;
pub use error::{BehaviorError, BehaviorResult};
pub use message::{MessageKind, UnitMessage};
pub use order::{Order, OrderKind, OrderQueue};
pub use stance::Stance;
pub use states::tree;
pub use unit_ai::{Regime, UnitAi, hostile_players};
pub use world::{
    AttackTiming, AttackType, Building, Combat, Diplomacy, DynWorld, FormationCommand, Formations,
    Garrisoning, Gathering, Motion, Perception, Presentation, World,
};
