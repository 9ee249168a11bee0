//! Replication state kept per connected peer.

use std::collections::{BTreeSet, HashMap};

use codec::DirtyMask;
use log::{debug, warn};
use schema::{EntityTypeDef, PropertyIndex};
use wire::{LocalId, Tick};

use crate::backlog::Backlog;
use crate::error::RepResult;
use crate::ids::PeerEntityMap;
use crate::interest::{gained_properties, Interest};
use crate::{EntityId, PeerId};

/// Connection phase of a peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PeerStatus {
    /// Joined, nothing exported yet.
    Initial,
    /// Receiving tick state.
    InWorld,
    /// Removed or timed out. All per-peer state has been discarded.
    Disconnected,
}

/// Which pose reference each peer was sent, and when.
///
/// A peer is known to hold the reference of generation `g` once it
/// acknowledges a tick at or after the first tick that carried `g` to it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyframeLedger {
    sent: HashMap<(EntityId, PropertyIndex), (u32, Tick)>,
}

impl KeyframeLedger {
    /// Returns `true` if the peer may lack reference `generation`.
    #[must_use]
    pub fn needs_catch_up(
        &self,
        entity: EntityId,
        property: PropertyIndex,
        generation: u32,
        last_acked: Tick,
    ) -> bool {
        match self.sent.get(&(entity, property)) {
            Some(&(sent_generation, sent_tick)) => {
                sent_generation != generation || last_acked < sent_tick
            }
            None => true,
        }
    }

    /// Notes that reference `generation` went out at `tick`. The earliest
    /// tick is kept for repeated sends of the same generation.
    pub fn record(&mut self, entity: EntityId, property: PropertyIndex, generation: u32, tick: Tick) {
        let entry = self.sent.entry((entity, property)).or_insert((generation, tick));
        if entry.0 != generation {
            *entry = (generation, tick);
        }
    }

    pub fn forget(&mut self, entity: EntityId) {
        self.sent.retain(|(e, _), _| *e != entity);
    }

    pub fn clear(&mut self) {
        self.sent.clear();
    }
}

/// Everything the authority tracks for one peer.
#[derive(Debug, Clone)]
pub struct PeerState {
    id: PeerId,
    status: PeerStatus,
    joined: Tick,
    last_acked: Tick,
    last_sent: Tick,
    entities: PeerEntityMap,
    interest: Interest,
    backlog: Backlog,
    owned: BTreeSet<EntityId>,
    keyframes: KeyframeLedger,
    pending_release: Vec<LocalId>,
}

impl PeerState {
    pub fn new(id: PeerId, joined: Tick, backlog_capacity: usize, interest: u64) -> RepResult<Self> {
        Ok(Self {
            id,
            status: PeerStatus::Initial,
            joined,
            last_acked: Tick::ZERO,
            last_sent: Tick::ZERO,
            entities: PeerEntityMap::new(),
            interest: Interest::new(interest),
            backlog: Backlog::new(backlog_capacity)?,
            owned: BTreeSet::new(),
            keyframes: KeyframeLedger::default(),
            pending_release: Vec::new(),
        })
    }

    #[must_use]
    pub const fn id(&self) -> PeerId {
        self.id
    }

    #[must_use]
    pub const fn status(&self) -> PeerStatus {
        self.status
    }

    #[must_use]
    pub const fn last_acked(&self) -> Tick {
        self.last_acked
    }

    #[must_use]
    pub const fn last_sent(&self) -> Tick {
        self.last_sent
    }

    #[must_use]
    pub const fn entities(&self) -> &PeerEntityMap {
        &self.entities
    }

    #[must_use]
    pub const fn interest(&self) -> &Interest {
        &self.interest
    }

    #[must_use]
    pub const fn backlog(&self) -> &Backlog {
        &self.backlog
    }

    #[must_use]
    pub const fn keyframes(&self) -> &KeyframeLedger {
        &self.keyframes
    }

    pub fn keyframes_mut(&mut self) -> &mut KeyframeLedger {
        &mut self.keyframes
    }

    #[must_use]
    pub fn owns(&self, entity: EntityId) -> bool {
        self.owned.contains(&entity)
    }

    pub fn owned(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.owned.iter().copied()
    }

    pub fn set_owned(&mut self, entity: EntityId, owned: bool) {
        if owned {
            self.owned.insert(entity);
        } else {
            self.owned.remove(&entity);
        }
    }

    /// Properties of `entity` to export this tick: this cycle's dirty bits,
    /// bits never acknowledged, and bits still in the backlog, limited to
    /// what the peer can see.
    #[must_use]
    pub fn export_mask(&self, entity: EntityId, ty: &EntityTypeDef, dirty: DirtyMask) -> u64 {
        let visible = ty.visible_mask(self.interest.get(entity));
        let unacked = ty.full_mask() & !self.backlog.acked(entity);
        (dirty.bits() | unacked | self.backlog.pending(entity)) & visible
    }

    /// Properties of `entity` the peer can currently see.
    #[must_use]
    pub fn visible_mask(&self, entity: EntityId, ty: &EntityTypeDef) -> u64 {
        ty.visible_mask(self.interest.get(entity))
    }

    /// Local id for `entity`, allocated on first sight.
    pub fn ensure_local(&mut self, entity: EntityId) -> LocalId {
        self.entities.ensure(entity)
    }

    /// Marks the start of a tick's export for this peer.
    pub fn begin_export(&mut self, tick: Tick) {
        if self.status == PeerStatus::Initial {
            debug!("peer {} entering world at {tick}", self.id);
            self.status = PeerStatus::InWorld;
        }
        self.last_sent = tick;
    }

    pub fn record_export(&mut self, tick: Tick, entity: EntityId, mask: u64) {
        self.backlog.record(tick, entity, mask);
    }

    /// Applies an acknowledgement. Returns `false` for stale acks and acks of
    /// ticks never sent.
    pub fn acknowledge(&mut self, tick: Tick) -> bool {
        if tick > self.last_sent {
            warn!(
                "peer {} acknowledged {tick} beyond last sent {}",
                self.id, self.last_sent
            );
            return false;
        }
        if tick <= self.last_acked {
            return false;
        }
        self.last_acked = tick;
        self.backlog.acknowledge(tick);
        true
    }

    /// `true` when no acknowledgement arrived within `window` ticks.
    #[must_use]
    pub fn is_timed_out(&self, now: Tick, window: u32) -> bool {
        now.since(self.last_acked.max(self.joined)) > window
    }

    /// Changes the peer-wide default interest. Properties that become visible
    /// on any of `entities` are resent on the next export.
    pub fn set_default_interest<'a>(
        &mut self,
        mask: u64,
        entities: impl IntoIterator<Item = (EntityId, &'a EntityTypeDef)>,
    ) {
        let old = self.interest.set_default(mask);
        for (entity, ty) in entities {
            if self.interest.has_override(entity) {
                continue;
            }
            self.on_gain(entity, gained_properties(ty, old, mask));
        }
    }

    /// Overrides interest for one entity.
    pub fn set_entity_interest(&mut self, entity: EntityId, ty: &EntityTypeDef, mask: u64) {
        let old = self.interest.set(entity, mask);
        self.on_gain(entity, gained_properties(ty, old, mask));
    }

    /// Drops an entity override, falling back to the default.
    pub fn clear_entity_interest(&mut self, entity: EntityId, ty: &EntityTypeDef) {
        let old = self.interest.clear(entity);
        self.on_gain(entity, gained_properties(ty, old, self.interest.default_mask()));
    }

    /// Removes `entity` from this peer's view. Its local id is queued for a
    /// release notice and only becomes reusable once that notice is taken.
    pub fn release(&mut self, entity: EntityId) -> Option<LocalId> {
        self.backlog.remove_entity(entity);
        self.keyframes.forget(entity);
        let local = self.entities.unmap(entity)?;
        self.pending_release.push(local);
        Some(local)
    }

    /// Forgets an entity that no longer exists.
    pub fn forget(&mut self, entity: EntityId) -> Option<LocalId> {
        self.interest.forget(entity);
        self.owned.remove(&entity);
        self.release(entity)
    }

    #[must_use]
    pub fn has_pending_releases(&self) -> bool {
        !self.pending_release.is_empty()
    }

    /// Drains queued releases and frees their ids.
    pub fn take_releases(&mut self) -> Vec<LocalId> {
        let released = std::mem::take(&mut self.pending_release);
        for local in &released {
            self.entities.free(*local);
        }
        released
    }

    /// Discards all per-peer replication state.
    pub fn disconnect(&mut self) {
        self.status = PeerStatus::Disconnected;
        self.backlog.clear();
        self.keyframes.clear();
        self.pending_release.clear();
        self.entities = PeerEntityMap::new();
    }

    fn on_gain(&mut self, entity: EntityId, gained: u64) {
        if gained == 0 {
            return;
        }
        debug!(
            "peer {} gained visibility of {entity} properties 0x{gained:016x}",
            self.id
        );
        self.backlog.reset_bits(entity, gained);
        self.keyframes.forget(entity);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use schema::{PropertyDef, Schema, ValueType};

    fn schema() -> Schema {
        Schema::builder()
            .entity(
                EntityTypeDef::new(1, "unit")
                    .property(PropertyDef::new(0, "hp", ValueType::U16).interest(0b01))
                    .property(PropertyDef::new(1, "intel", ValueType::U16).interest(0b10)),
            )
            .build()
            .unwrap()
    }

    fn peer() -> PeerState {
        PeerState::new(PeerId(1), Tick::ZERO, 8, 0b01).unwrap()
    }

    const E: EntityId = EntityId::new(7);

    #[test]
    fn never_acked_bits_exported_until_acked() {
        let schema = schema();
        let ty = schema.entity_type(1).unwrap();
        let mut peer = peer();
        assert_eq!(peer.export_mask(E, ty, DirtyMask::EMPTY), 0b01);

        peer.begin_export(Tick::new(1));
        peer.record_export(Tick::new(1), E, 0b01);
        assert_eq!(peer.export_mask(E, ty, DirtyMask::EMPTY), 0b01);
        assert!(peer.acknowledge(Tick::new(1)));
        assert_eq!(peer.export_mask(E, ty, DirtyMask::EMPTY), 0);
        assert_eq!(peer.export_mask(E, ty, DirtyMask::single(0)), 0b01);
        assert_eq!(peer.export_mask(E, ty, DirtyMask::single(1)), 0);
    }

    #[test]
    fn interest_gain_resends_without_dirty() {
        let schema = schema();
        let ty = schema.entity_type(1).unwrap();
        let mut peer = PeerState::new(PeerId(1), Tick::ZERO, 8, 0b11).unwrap();
        peer.begin_export(Tick::new(1));
        peer.record_export(Tick::new(1), E, 0b11);
        peer.acknowledge(Tick::new(1));
        assert_eq!(peer.export_mask(E, ty, DirtyMask::EMPTY), 0);

        peer.set_entity_interest(E, ty, 0b01);
        peer.set_entity_interest(E, ty, 0b11);
        assert_eq!(peer.export_mask(E, ty, DirtyMask::EMPTY), 0b10);
    }

    #[test]
    fn default_interest_change_respects_overrides() {
        let schema = schema();
        let ty = schema.entity_type(1).unwrap();
        let other = EntityId::new(8);
        let mut peer = peer();
        peer.begin_export(Tick::new(1));
        peer.record_export(Tick::new(1), E, 0b01);
        peer.record_export(Tick::new(1), other, 0b01);
        peer.acknowledge(Tick::new(1));
        peer.set_entity_interest(other, ty, 0b01);

        peer.set_default_interest(0b11, [(E, ty), (other, ty)]);
        assert_eq!(peer.export_mask(E, ty, DirtyMask::EMPTY), 0b10);
        assert_eq!(peer.export_mask(other, ty, DirtyMask::EMPTY), 0);
    }

    #[test]
    fn acks_beyond_sent_or_stale_ignored() {
        let mut peer = peer();
        assert!(!peer.acknowledge(Tick::new(1)));
        peer.begin_export(Tick::new(5));
        assert_eq!(peer.status(), PeerStatus::InWorld);
        assert!(peer.acknowledge(Tick::new(5)));
        assert!(!peer.acknowledge(Tick::new(4)));
        assert_eq!(peer.last_acked(), Tick::new(5));
    }

    #[test]
    fn timeout_counts_from_join_or_last_ack() {
        let mut peer = PeerState::new(PeerId(2), Tick::new(100), 8, 1).unwrap();
        assert!(!peer.is_timed_out(Tick::new(400), 300));
        assert!(peer.is_timed_out(Tick::new(401), 300));
        peer.begin_export(Tick::new(400));
        peer.acknowledge(Tick::new(400));
        assert!(!peer.is_timed_out(Tick::new(700), 300));
    }

    #[test]
    fn release_defers_id_reuse() {
        let mut peer = peer();
        let a = peer.ensure_local(E);
        assert_eq!(peer.release(E), Some(a));
        assert!(peer.has_pending_releases());
        assert_ne!(peer.ensure_local(EntityId::new(9)), a);
        assert_eq!(peer.take_releases(), vec![a]);
        assert_eq!(peer.ensure_local(EntityId::new(10)), a);
    }

    #[test]
    fn ledger_tracks_reference_confirmation() {
        let mut ledger = KeyframeLedger::default();
        assert!(ledger.needs_catch_up(E, 0, 1, Tick::ZERO));
        ledger.record(E, 0, 1, Tick::new(10));
        ledger.record(E, 0, 1, Tick::new(11));
        assert!(ledger.needs_catch_up(E, 0, 1, Tick::new(9)));
        assert!(!ledger.needs_catch_up(E, 0, 1, Tick::new(10)));
        assert!(ledger.needs_catch_up(E, 0, 2, Tick::new(10)));
        ledger.forget(E);
        assert!(ledger.needs_catch_up(E, 0, 1, Tick::new(10)));
    }

    #[test]
    fn disconnect_discards_state() {
        let mut peer = peer();
        peer.ensure_local(E);
        peer.begin_export(Tick::new(1));
        peer.record_export(Tick::new(1), E, 1);
        peer.disconnect();
        assert_eq!(peer.status(), PeerStatus::Disconnected);
        assert!(peer.entities().is_empty());
        assert_eq!(peer.backlog().pending_ticks(), 0);
    }
}
