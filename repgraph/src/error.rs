//! Error types for replication graph operations.

use thiserror::Error;

use crate::PeerId;

/// Result type for replication graph operations.
pub type RepResult<T> = Result<T, RepError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RepError {
    #[error("peer {peer} is already registered")]
    DuplicatePeer { peer: PeerId },

    #[error("unknown peer {peer}")]
    UnknownPeer { peer: PeerId },

    /// Backlog capacity must be at least one slot.
    #[error("backlog capacity must be non-zero")]
    ZeroCapacity,
}
