//! What one authority tick produced.

use repgraph::{EntityId, PeerId};
use wire::{Channel, Tick};

/// A message ready for the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outgoing {
    pub peer: PeerId,
    pub channel: Channel,
    pub bytes: Vec<u8>,
}

/// Send side of the transport.
pub trait Transport {
    type Error;

    fn send(&mut self, peer: PeerId, channel: Channel, bytes: &[u8]) -> Result<(), Self::Error>;
}

/// Result of [`Authority::tick`](crate::Authority::tick).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    pub tick: Tick,
    /// Messages in send order: per peer, the tick state then any release notice.
    pub outgoing: Vec<Outgoing>,
    /// Peers dropped for not acknowledging within the timeout window.
    pub timed_out: Vec<PeerId>,
    /// Entities despawned because their owner left.
    pub disposed: Vec<EntityId>,
    /// Tick messages larger than the configured limit. They were still sent.
    pub oversized: usize,
}

impl TickReport {
    /// Messages addressed to `peer` on `channel`.
    pub fn messages_for(&self, peer: PeerId, channel: Channel) -> impl Iterator<Item = &[u8]> {
        self.outgoing
            .iter()
            .filter(move |m| m.peer == peer && m.channel == channel)
            .map(|m| m.bytes.as_slice())
    }

    /// Total bytes across all outgoing messages.
    #[must_use]
    pub fn total_bytes(&self) -> usize {
        self.outgoing.iter().map(|m| m.bytes.len()).sum()
    }

    /// Hands every outgoing message to `transport`, stopping at the first error.
    pub fn dispatch<T: Transport>(&self, transport: &mut T) -> Result<(), T::Error> {
        for message in &self.outgoing {
            transport.send(message.peer, message.channel, &message.bytes)?;
        }
        Ok(())
    }
}
