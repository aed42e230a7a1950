//! Shared error type for `uai-core`.
//!
//! Higher crates define their own enums and wrap `CoreError` with `#[from]`
//! where a core operation can fail inside them.

use thiserror::Error;

use crate::EntityId;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("entity {0} not found")]
    EntityNotFound(EntityId),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("parse error: {0}")]
    Parse(String),
}

pub type CoreResult<T> = Result<T, CoreError>;
