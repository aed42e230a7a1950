//! Spatial-subsystem error type.

use thiserror::Error;

use uai_core::{EntityId, QueryId};

/// Errors produced by `uai-spatial`.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SpatialError {
    #[error("range query {0} does not exist")]
    UnknownQuery(QueryId),

    #[error("query source {0} is not in the world")]
    SourceNotInWorld(EntityId),
}

pub type SpatialResult<T> = Result<T, SpatialError>;
