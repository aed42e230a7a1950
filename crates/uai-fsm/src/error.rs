use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FsmError {
    #[error("unknown state {0:?}")]
    UnknownState(String),

    #[error("state {0:?} declared twice")]
    DuplicateState(String),

    #[error("parent of state {0:?} has not been declared")]
    MissingParent(String),

    #[error("state {state:?} already handles {kind}")]
    DuplicateHandler { state: String, kind: String },

    #[error("state tree exceeds {0} states")]
    TooManyStates(usize),

    #[error("state machine used before init")]
    NotInitialised,

    #[error("state machine initialised twice")]
    AlreadyInitialised,

    #[error("enter hook of {0:?} reported a transition but none was requested")]
    MissingTransition(String),

    #[error("transition chain ending at {state:?} exceeded {limit} hops")]
    TransitionLimit { state: String, limit: usize },
}

pub type FsmResult<T> = Result<T, FsmError>;
