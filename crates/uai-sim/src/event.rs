//! Side effects the world cannot deliver on its own.
//!
//! A world call is made from inside one unit's handler, while that unit is
//! borrowed.  Anything that has to reach a unit (the caller included) is
//! queued here and routed by the turn loop once the handler has returned.

use uai_behavior::FormationCommand;
use uai_core::{EntityId, Point};

#[derive(Clone, Debug, PartialEq)]
pub enum SimEvent {
    /// Movement of `entity` started, or finished (`error` when the goal was
    /// lost along the way).
    MotionChanged { entity: EntityId, starting: bool, error: bool },
    Attacked { target: EntityId, attacker: EntityId },
    /// Broadcast to every unit.
    ConstructionFinished { entity: EntityId, new_entity: EntityId },
    /// Relay of a controller order to each member.
    Formation { controller: EntityId, command: FormationCommand },
    /// Each member walks to its slot relative to the controller.
    MembersIntoFormation { controller: EntityId, slots: Vec<(EntityId, Point)> },
    Disband { controller: EntityId },
}
