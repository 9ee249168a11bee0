//! Error types for the tick runtime.

use bitstream::BitError;
use codec::CodecError;
use predict::PredictError;
use repgraph::{EntityId, RepError};
use schema::{PropertyIndex, SchemaError};
use thiserror::Error;
use wire::{DecodeError, EncodeError, LocalId, Tick};

/// Result type for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuntimeError {
    #[error(transparent)]
    Bit(#[from] BitError),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Encode(#[from] EncodeError),

    #[error(transparent)]
    Graph(#[from] RepError),

    #[error(transparent)]
    Predict(#[from] PredictError),

    #[error("invalid runtime config: {reason}")]
    InvalidConfig { reason: &'static str },

    #[error("unknown entity {entity}")]
    UnknownEntity { entity: EntityId },

    #[error("entity {entity} has no property {index}")]
    UnknownProperty { entity: EntityId, index: PropertyIndex },

    #[error("unknown local entity {local}")]
    UnknownLocal { local: LocalId },

    /// Local entity is not owned by this observer.
    #[error("local entity {local} is not owned")]
    NotOwned { local: LocalId },

    /// Parent does not exist, or would create a cycle.
    #[error("cannot parent {entity} under {parent}")]
    InvalidParent { entity: EntityId, parent: EntityId },

    /// Every entity id has been handed out; ids are never reused.
    #[error("entity ids exhausted")]
    IdsExhausted,

    /// A tick message failed part way through. Entities decoded before the
    /// failure stay applied.
    #[error("tick {tick} aborted after {applied} entities: {source}")]
    Aborted {
        tick: Tick,
        applied: usize,
        #[source]
        source: Box<RuntimeError>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converts_from_lower_layers() {
        let err: RuntimeError = BitError::InvalidUtf8.into();
        assert!(matches!(err, RuntimeError::Bit(_)));
        let err: RuntimeError = RepError::ZeroCapacity.into();
        assert!(matches!(err, RuntimeError::Graph(_)));
    }

    #[test]
    fn aborted_keeps_source() {
        let err = RuntimeError::Aborted {
            tick: Tick::new(4),
            applied: 2,
            source: Box::new(RuntimeError::UnknownEntity {
                entity: EntityId::new(3),
            }),
        };
        let msg = err.to_string();
        assert!(msg.contains("#4"));
        assert!(msg.contains("unknown entity E3"));
        assert!(std::error::Error::source(&err).is_some());
    }
}
