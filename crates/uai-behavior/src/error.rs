use thiserror::Error;

use uai_core::EntityId;
use uai_fsm::FsmError;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BehaviorError {
    #[error(transparent)]
    Fsm(#[from] FsmError),

    #[error("unknown stance {0:?}")]
    UnknownStance(String),

    #[error("{0}: finish_order called with an empty order queue")]
    EmptyOrderQueue(EntityId),

    #[error("{0}: start_timer called while a timer is already active")]
    TimerAlreadyActive(EntityId),
}

pub type BehaviorResult<T> = Result<T, BehaviorError>;
