//! In-process link from the authority to its observers.

use std::collections::{HashMap, VecDeque};

use anyhow::{bail, Result};
use runtime::{Channel, PeerId, Transport};
use wire::Reliability;

/// Messages held per peer before the link refuses more.
const INBOX_CAPACITY: usize = 64;

#[derive(Debug, Default)]
struct Inbox {
    reliable: VecDeque<(Channel, Vec<u8>)>,
    unreliable: VecDeque<(Channel, Vec<u8>)>,
}

/// Drops unreliable messages with probability `loss`; reliable ones always
/// arrive and are handed out first.
#[derive(Debug)]
pub struct LossyLink {
    rng: fastrand::Rng,
    loss: f64,
    inboxes: HashMap<PeerId, Inbox>,
    pub dropped: u64,
}

impl LossyLink {
    pub fn new(seed: u64, loss: f64) -> Self {
        Self {
            rng: fastrand::Rng::with_seed(seed),
            loss,
            inboxes: HashMap::new(),
            dropped: 0,
        }
    }

    pub fn set_loss(&mut self, loss: f64) {
        self.loss = loss;
    }

    pub fn connect(&mut self, peer: PeerId) {
        self.inboxes.entry(peer).or_default();
    }

    pub fn disconnect(&mut self, peer: PeerId) {
        self.inboxes.remove(&peer);
    }

    /// Everything queued for `peer`, reliable channels first.
    pub fn drain(&mut self, peer: PeerId) -> Vec<(Channel, Vec<u8>)> {
        let Some(inbox) = self.inboxes.get_mut(&peer) else {
            return Vec::new();
        };
        inbox.reliable.drain(..).chain(inbox.unreliable.drain(..)).collect()
    }
}

impl Transport for LossyLink {
    type Error = anyhow::Error;

    fn send(&mut self, peer: PeerId, channel: Channel, bytes: &[u8]) -> Result<()> {
        let Some(inbox) = self.inboxes.get_mut(&peer) else {
            bail!("no link to peer {peer}");
        };
        if inbox.reliable.len() + inbox.unreliable.len() >= INBOX_CAPACITY {
            bail!("inbox for peer {peer} is full");
        }
        match channel.reliability() {
            Reliability::Reliable => inbox.reliable.push_back((channel, bytes.to_vec())),
            Reliability::Unreliable => {
                if self.rng.f64() < self.loss {
                    self.dropped += 1;
                } else {
                    inbox.unreliable.push_back((channel, bytes.to_vec()));
                }
            }
        }
        Ok(())
    }
}
