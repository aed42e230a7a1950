use thiserror::Error;
use uai_core::SimTime;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TimerError {
    #[error("clock moved backwards from {previous} to {now}")]
    ClockRegression { previous: SimTime, now: SimTime },
}

pub type TimerResult<T> = Result<T, TimerError>;
