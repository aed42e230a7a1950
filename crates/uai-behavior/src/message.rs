//! Messages a unit's state machine reacts to.

use uai_core::EntityId;
use uai_fsm::Message;

use crate::{Order, OrderKind};

#[derive(Clone, Debug, PartialEq)]
pub enum UnitMessage {
    /// An order just became the queue head.
    Order(Order),
    MoveStarted,
    MoveCompleted { error: bool },
    ConstructionFinished { entity: EntityId, new_entity: EntityId },
    /// Change in the unit's line-of-sight query.
    LosRangeUpdate { added: Vec<EntityId>, removed: Vec<EntityId> },
    Attacked { attacker: EntityId },
    FormationLeave,
    Timer { lateness: u64 },
}

/// Handler-table key.  Each order kind is its own message kind.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum MessageKind {
    Order(OrderKind),
    MoveStarted,
    MoveCompleted,
    ConstructionFinished,
    LosRangeUpdate,
    Attacked,
    FormationLeave,
    Timer,
}

impl Message for UnitMessage {
    type Kind = MessageKind;

    fn kind(&self) -> MessageKind {
        match self {
            UnitMessage::Order(order) => MessageKind::Order(order.kind()),
            UnitMessage::MoveStarted => MessageKind::MoveStarted,
            UnitMessage::MoveCompleted { .. } => MessageKind::MoveCompleted,
            UnitMessage::ConstructionFinished { .. } => MessageKind::ConstructionFinished,
            UnitMessage::LosRangeUpdate { .. } => MessageKind::LosRangeUpdate,
            UnitMessage::Attacked { .. } => MessageKind::Attacked,
            UnitMessage::FormationLeave => MessageKind::FormationLeave,
            UnitMessage::Timer { .. } => MessageKind::Timer,
        }
    }
}
