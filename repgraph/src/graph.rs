//! The set of peers a world replicates to.

use std::collections::BTreeMap;

use log::debug;
use wire::Tick;

use crate::error::{RepError, RepResult};
use crate::peer::PeerState;
use crate::PeerId;

/// Replication graph configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GraphConfig {
    /// Backlog slots per peer; must exceed the worst round trip in ticks.
    pub backlog_capacity: usize,
    /// Interest mask given to new peers.
    pub default_interest: u64,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            backlog_capacity: 64,
            default_interest: u64::MAX,
        }
    }
}

/// Peers keyed by id. Iteration is in ascending peer id so exports are
/// produced in a stable order.
#[derive(Debug, Clone)]
pub struct ReplicationGraph {
    config: GraphConfig,
    peers: BTreeMap<PeerId, PeerState>,
}

impl ReplicationGraph {
    #[must_use]
    pub const fn new(config: GraphConfig) -> Self {
        Self {
            config,
            peers: BTreeMap::new(),
        }
    }

    #[must_use]
    pub const fn config(&self) -> &GraphConfig {
        &self.config
    }

    /// Registers a peer in the `Initial` state.
    pub fn add_peer(&mut self, peer: PeerId, joined: Tick) -> RepResult<&mut PeerState> {
        if self.peers.contains_key(&peer) {
            return Err(RepError::DuplicatePeer { peer });
        }
        let state = PeerState::new(
            peer,
            joined,
            self.config.backlog_capacity,
            self.config.default_interest,
        )?;
        debug!("peer {peer} joined at {joined}");
        Ok(self.peers.entry(peer).or_insert(state))
    }

    /// Removes a peer, returning its final state with all replication state discarded.
    pub fn remove_peer(&mut self, peer: PeerId) -> RepResult<PeerState> {
        let mut state = self
            .peers
            .remove(&peer)
            .ok_or(RepError::UnknownPeer { peer })?;
        state.disconnect();
        Ok(state)
    }

    #[must_use]
    pub fn peer(&self, peer: PeerId) -> Option<&PeerState> {
        self.peers.get(&peer)
    }

    pub fn peer_mut(&mut self, peer: PeerId) -> Option<&mut PeerState> {
        self.peers.get_mut(&peer)
    }

    pub fn require_mut(&mut self, peer: PeerId) -> RepResult<&mut PeerState> {
        self.peers
            .get_mut(&peer)
            .ok_or(RepError::UnknownPeer { peer })
    }

    pub fn peers(&self) -> impl Iterator<Item = &PeerState> {
        self.peers.values()
    }

    pub fn peers_mut(&mut self) -> impl Iterator<Item = &mut PeerState> {
        self.peers.values_mut()
    }

    #[must_use]
    pub fn peer_ids(&self) -> Vec<PeerId> {
        self.peers.keys().copied().collect()
    }

    /// Peers with no acknowledgement within `window` ticks of `now`.
    #[must_use]
    pub fn timed_out(&self, now: Tick, window: u32) -> Vec<PeerId> {
        self.peers
            .values()
            .filter(|p| p.is_timed_out(now, window))
            .map(PeerState::id)
            .collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.peers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PeerStatus;

    #[test]
    fn add_and_remove_peers() {
        let mut graph = ReplicationGraph::new(GraphConfig::default());
        graph.add_peer(PeerId(2), Tick::ZERO).unwrap();
        graph.add_peer(PeerId(1), Tick::ZERO).unwrap();
        assert_eq!(
            graph.add_peer(PeerId(1), Tick::ZERO).unwrap_err(),
            RepError::DuplicatePeer { peer: PeerId(1) }
        );
        assert_eq!(graph.peer_ids(), vec![PeerId(1), PeerId(2)]);

        let removed = graph.remove_peer(PeerId(1)).unwrap();
        assert_eq!(removed.status(), PeerStatus::Disconnected);
        assert!(graph.remove_peer(PeerId(1)).is_err());
        assert_eq!(graph.len(), 1);
    }

    #[test]
    fn zero_backlog_rejected() {
        let mut graph = ReplicationGraph::new(GraphConfig {
            backlog_capacity: 0,
            ..GraphConfig::default()
        });
        assert_eq!(
            graph.add_peer(PeerId(1), Tick::ZERO).unwrap_err(),
            RepError::ZeroCapacity
        );
    }

    #[test]
    fn timed_out_lists_silent_peers() {
        let mut graph = ReplicationGraph::new(GraphConfig::default());
        graph.add_peer(PeerId(1), Tick::ZERO).unwrap();
        let fresh = graph.add_peer(PeerId(2), Tick::ZERO).unwrap();
        fresh.begin_export(Tick::new(50));
        fresh.acknowledge(Tick::new(50));
        assert_eq!(graph.timed_out(Tick::new(60), 30), vec![PeerId(1)]);
    }
}
