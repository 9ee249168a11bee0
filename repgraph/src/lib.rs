//! Replication graph: decide what each peer receives, not how it is encoded.
//!
//! This crate keeps the per-peer side of replication:
//! - Entity and peer identifiers, and the 64-slot local id table per peer
//! - Property interest with per-entity overrides
//! - The acknowledgement backlog that drives retransmission
//! - Peer lifecycle and liveness
//!
//! Encoding lives in `codec`; the tick loop that ties both together lives in
//! `runtime`.

mod backlog;
mod error;
mod graph;
mod ids;
mod interest;
mod peer;

pub use backlog::Backlog;
pub use error::{RepError, RepResult};
pub use graph::{GraphConfig, ReplicationGraph};
pub use ids::{EntityId, LocalIdAllocator, PeerEntityMap, PeerId};
pub use interest::{gained_properties, Interest};
pub use peer::{KeyframeLedger, PeerState, PeerStatus};
