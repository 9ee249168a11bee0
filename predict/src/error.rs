//! Error types for prediction state.

use thiserror::Error;

pub type PredictResult<T> = Result<T, PredictError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PredictError {
    #[error("prediction buffer capacity must be non-zero")]
    ZeroCapacity,

    /// Value storage does not line up with the entity type's property table.
    #[error("expected {expected} property values, got {found}")]
    ValueCount { expected: usize, found: usize },
}
