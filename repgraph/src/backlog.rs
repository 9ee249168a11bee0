//! Per-peer retention of sent-but-unacknowledged property masks.

use std::collections::{BTreeMap, HashMap};

use log::debug;
use wire::Tick;

use crate::error::{RepError, RepResult};
use crate::EntityId;

#[derive(Debug, Clone, PartialEq, Eq)]
struct Slot {
    tick: Tick,
    sent: BTreeMap<EntityId, u64>,
}

/// Fixed-capacity ring of the masks sent at each unacknowledged tick,
/// indexed by `tick % capacity`, plus the bits each entity has had
/// acknowledged at least once.
///
/// An export resends the union of every retained mask, so a dropped message
/// is covered by the next one without per-message retry logic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Backlog {
    slots: Vec<Option<Slot>>,
    acked: HashMap<EntityId, u64>,
}

impl Backlog {
    pub fn new(capacity: usize) -> RepResult<Self> {
        if capacity == 0 {
            return Err(RepError::ZeroCapacity);
        }
        Ok(Self {
            slots: vec![None; capacity],
            acked: HashMap::new(),
        })
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of ticks still awaiting acknowledgement.
    #[must_use]
    pub fn pending_ticks(&self) -> usize {
        self.slots.iter().flatten().count()
    }

    /// Records the mask sent for `entity` at `tick`.
    ///
    /// If the slot still holds an older unacknowledged tick, that tick is
    /// evicted and its bits are treated as never acknowledged so they go out
    /// again in full.
    pub fn record(&mut self, tick: Tick, entity: EntityId, mask: u64) {
        if mask == 0 {
            return;
        }
        let index = self.index(tick);
        let stale = self.slots[index].as_ref().is_some_and(|s| s.tick != tick);
        if stale {
            if let Some(evicted) = self.slots[index].take() {
                debug!("backlog evicting unacknowledged tick {}", evicted.tick);
                for (entity, bits) in evicted.sent {
                    self.forget_acked(entity, bits);
                }
            }
        }
        let slot = self.slots[index].get_or_insert_with(|| Slot {
            tick,
            sent: BTreeMap::new(),
        });
        *slot.sent.entry(entity).or_insert(0) |= mask;
    }

    /// Union of all retained masks for `entity`.
    #[must_use]
    pub fn pending(&self, entity: EntityId) -> u64 {
        self.slots
            .iter()
            .flatten()
            .filter_map(|slot| slot.sent.get(&entity))
            .fold(0, |acc, bits| acc | bits)
    }

    /// Bits of `entity` acknowledged at least once.
    #[must_use]
    pub fn acked(&self, entity: EntityId) -> u64 {
        self.acked.get(&entity).copied().unwrap_or(0)
    }

    /// Folds every tick at or before `tick` into the acknowledged set and prunes it.
    pub fn acknowledge(&mut self, tick: Tick) {
        for slot in &mut self.slots {
            if slot.as_ref().is_some_and(|s| s.tick <= tick) {
                if let Some(done) = slot.take() {
                    for (entity, bits) in done.sent {
                        *self.acked.entry(entity).or_insert(0) |= bits;
                    }
                }
            }
        }
    }

    /// Forces `bits` of `entity` to be sent again: clears them from the
    /// acknowledged set and from every retained tick.
    pub fn reset_bits(&mut self, entity: EntityId, bits: u64) {
        self.forget_acked(entity, bits);
        for slot in self.slots.iter_mut().flatten() {
            if let Some(sent) = slot.sent.get_mut(&entity) {
                *sent &= !bits;
                if *sent == 0 {
                    slot.sent.remove(&entity);
                }
            }
        }
    }

    /// Drops all state for an entity that left the peer's view.
    pub fn remove_entity(&mut self, entity: EntityId) {
        self.acked.remove(&entity);
        for slot in self.slots.iter_mut().flatten() {
            slot.sent.remove(&entity);
        }
    }

    pub fn clear(&mut self) {
        self.slots.iter_mut().for_each(|slot| *slot = None);
        self.acked.clear();
    }

    fn forget_acked(&mut self, entity: EntityId, bits: u64) {
        if let Some(acked) = self.acked.get_mut(&entity) {
            *acked &= !bits;
        }
    }

    fn index(&self, tick: Tick) -> usize {
        tick.raw() as usize % self.slots.len()
    }
}
