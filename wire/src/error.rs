//! Error types for wire format operations.

use bitstream::BitError;
use thiserror::Error;

/// Result type for wire decoding.
pub type WireResult<T> = Result<T, DecodeError>;

/// Errors that can occur while decoding a framed message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum DecodeError {
    #[error(transparent)]
    Bit(#[from] BitError),

    /// Per-entity flag byte carries bits this version does not define.
    #[error("invalid entity flags: 0b{flags:08b}")]
    InvalidEntityFlags { flags: u8 },

    /// Local ids are 1..=64.
    #[error("invalid local entity id {id}")]
    InvalidLocalId { id: u8 },

    /// An entity listed in the tick mask has no property payload.
    #[error("entity entry without payload")]
    MissingPayload,

    #[error("{count} entries exceed the maximum of {max}")]
    TooManyEntries { count: usize, max: usize },

    /// Data left over after a fixed-size message.
    #[error("{remaining} trailing bits after message")]
    TrailingBits { remaining: usize },
}

/// Errors that can occur during encoding.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodeError {
    #[error(transparent)]
    Bit(#[from] BitError),

    #[error("{count} entries do not fit a one-byte count")]
    TooManyEntries { count: usize },

    #[error("invalid local entity id {id}")]
    InvalidLocalId { id: u8 },

    #[error("entity entry without payload")]
    MissingPayload,
}
