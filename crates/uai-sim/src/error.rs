use thiserror::Error;

use uai_behavior::BehaviorError;
use uai_core::{CoreError, EntityId, PlayerId};
use uai_timer::TimerError;

#[derive(Debug, Error)]
pub enum SimError {
    #[error("simulation configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("behavior error: {0}")]
    Behavior(#[from] BehaviorError),

    #[error("timer error: {0}")]
    Timer(#[from] TimerError),

    #[error("unknown template {0:?}")]
    UnknownTemplate(String),

    #[error("{player} is not one of the {players} players")]
    UnknownPlayer { player: PlayerId, players: u32 },

    #[error("entity {0} has no unit controller")]
    NotAUnit(EntityId),

    #[error("event queue did not drain after {limit} events in turn {turn}")]
    EventStorm { turn: u64, limit: usize },

    #[error("scenario row {row}: {reason}")]
    Scenario { row: usize, reason: String },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type SimResult<T> = Result<T, SimError>;
