//! Collaborator interfaces the controller drives.
//!
//! Every call names the acting entity explicitly, so one world object serves
//! every unit.  Movement and construction complete asynchronously: a call
//! that starts something returns at once and the outcome arrives later
//! through the unit's `on_*` entry points.
//!
//! "Not present" is always expressible (`None`, `false`, `0.0`): a unit
//! without a visual, a gatherer or a vision range is normal, and the
//! controller skips the behavior that needs it.

use uai_core::{EntityId, PlayerId, Point, QueryFilter, QueryId, RangeBand, ResourceType};
use uai_timer::TimerService;

// ── Shared value types ────────────────────────────────────────────────────────

/// Attack modes a unit may have.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum AttackType {
    Melee,
    Ranged,
}

/// Cadence of one attack type.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AttackTiming {
    /// Delay from starting the attack animation to the first hit.
    pub prepare_ms: u64,
    /// Interval between hits.
    pub repeat_ms:  u64,
}

/// An order a formation controller relays to every member.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FormationCommand {
    Attack(EntityId),
    Gather(EntityId),
    Repair(EntityId),
    Garrison(EntityId),
}

// ── Capabilities ──────────────────────────────────────────────────────────────

pub trait Motion {
    /// Ground position, or `None` if the entity has no position or is not in
    /// the world (garrisoned, destroyed).
    fn position(&self, ent: EntityId) -> Option<Point>;

    /// Start walking to `to`.  Returns whether movement started.
    fn move_to_point(&mut self, ent: EntityId, to: Point) -> bool;

    /// Start moving until `target` is within `band`.  Returns `false` when
    /// already in range or when the unit cannot move there.
    fn move_to_range(&mut self, ent: EntityId, target: EntityId, band: RangeBand) -> bool;

    /// Follow `controller` keeping `offset` from its position.
    fn move_to_formation_offset(&mut self, ent: EntityId, controller: EntityId, offset: Point);

    fn is_in_range(&self, ent: EntityId, target: EntityId, band: RangeBand) -> bool;

    fn walk_speed(&self, ent: EntityId) -> f32;
    fn run_speed(&self, ent: EntityId) -> f32;

    /// Obstruction control group: entities in the same group pass through
    /// each other.
    fn set_control_group(&mut self, ent: EntityId, group: EntityId);
}

pub trait Combat {
    /// Preferred attack, or `None` if the unit cannot attack at all.
    fn best_attack(&self, ent: EntityId) -> Option<AttackType>;
    fn attack_range(&self, ent: EntityId, kind: AttackType) -> Option<RangeBand>;
    fn attack_timing(&self, ent: EntityId, kind: AttackType) -> Option<AttackTiming>;
    fn perform_attack(&mut self, ent: EntityId, kind: AttackType, target: EntityId);

    /// Current hitpoints, or `None` if `ent` has no health (or no longer
    /// exists).
    fn hitpoints(&self, ent: EntityId) -> Option<u32>;
}

pub trait Gathering {
    /// Rate at which `ent` can gather from `target`; zero means it cannot.
    fn gather_rate(&self, ent: EntityId, target: EntityId) -> f32;
    fn gather_range(&self, ent: EntityId) -> Option<RangeBand>;
    fn perform_gather(&mut self, ent: EntityId, target: EntityId);

    fn resource_type(&self, target: EntityId) -> Option<ResourceType>;
    /// The supply is a live animal that must die before it can be gathered.
    fn kill_before_gather(&self, target: EntityId) -> bool;
}

pub trait Building {
    /// Build range, or `None` if `ent` is not a builder.
    fn build_range(&self, ent: EntityId) -> Option<RangeBand>;
    fn perform_building(&mut self, ent: EntityId, target: EntityId);
}

pub trait Garrisoning {
    fn has_garrison_holder(&self, target: EntityId) -> bool;
    /// Returns whether `ent` is now inside `target`.
    fn garrison(&mut self, ent: EntityId, target: EntityId) -> bool;
}

pub trait Perception {
    fn vision_range(&self, ent: EntityId) -> Option<f32>;

    /// Create a disabled active query centred on `ent`.
    fn create_query(&mut self, ent: EntityId, range: f32, owners: Vec<PlayerId>, filter: QueryFilter) -> QueryId;
    fn enable_query(&mut self, query: QueryId);
    fn disable_query(&mut self, query: QueryId);
    fn destroy_query(&mut self, query: QueryId);
    /// Enable `query` and return its current matches, nearest first.
    fn reset_query(&mut self, query: QueryId) -> Vec<EntityId>;

    /// One-shot query around `ent`, nearest first.
    fn execute_query(&self, ent: EntityId, range: f32, owners: &[PlayerId], filter: QueryFilter) -> Vec<EntityId>;
}

pub trait Diplomacy {
    fn owner(&self, ent: EntityId) -> Option<PlayerId>;
    /// Players including Gaia (player 0).
    fn player_count(&self) -> u32;
    /// `player`'s stance toward `other`; negative means enemy.
    fn diplomacy(&self, player: PlayerId, other: PlayerId) -> i32;
}

/// Animation and sound.  Fire-and-forget.
pub trait Presentation {
    fn has_visual(&self, ent: EntityId) -> bool;
    /// Walk/run cycle chosen by the renderer from current speed.
    fn select_movement_animation(&mut self, ent: EntityId, run_threshold: f32);
    fn select_animation(&mut self, ent: EntityId, name: &str, once: bool, speed: f32, sound_group: &str);
    fn sound_group(&self, ent: EntityId, name: &str) -> Option<String>;
    fn set_animation_sync(&mut self, ent: EntityId, action_ms: u64, repeat_ms: u64);
    fn play_sound(&mut self, ent: EntityId, name: &str);
}

pub trait Formations {
    fn broadcast(&mut self, controller: EntityId, command: FormationCommand);
    fn disband(&mut self, controller: EntityId);
    fn move_members_into_formation(&mut self, controller: EntityId);
    fn primary_member(&self, controller: EntityId) -> Option<EntityId>;
}

// ── World ─────────────────────────────────────────────────────────────────────

/// Everything a unit controller talks to.
pub trait World:
    Motion
    + Combat
    + Gathering
    + Building
    + Garrisoning
    + Perception
    + Diplomacy
    + Presentation
    + Formations
    + TimerService
{
}

impl<T> World for T where
    T: Motion
        + Combat
        + Gathering
        + Building
        + Garrisoning
        + Perception
        + Diplomacy
        + Presentation
        + Formations
        + TimerService
{
}

/// The world as handlers receive it.
pub type DynWorld = dyn World;
