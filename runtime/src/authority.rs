//! The authoritative side of a replicated world.
//!
//! One [`Authority`] owns the canonical entity state of a world and the
//! replication state of every peer attached to it. All work happens inside
//! [`Authority::tick`] and the message handlers; nothing blocks and nothing is
//! shared across worlds.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use bitstream::{BitReader, BitWriter};
use codec::{CodecError, DirtyMask, PoseWrite};
use log::{debug, error, warn};
use repgraph::{EntityId, GraphConfig, PeerId, PeerState, RepError, ReplicationGraph};
use schema::{EntityTypeId, PropertyIndex, Schema, Value, ValueContext};
use wire::{
    decode_ack, decode_input_entry, decode_input_header, encode_entity_header, encode_release,
    encode_tick_header, Channel, EntityHeader, LocalId, Tick, TickHeader,
};

use crate::arena::{EntityArena, EntityRecord};
use crate::config::{Disposal, RuntimeConfig};
use crate::error::{RuntimeError, RuntimeResult};
use crate::report::{Outgoing, TickReport};

/// Pose properties whose planned keyframe reached a non-owning peer this tick.
type Delivered = HashSet<(EntityId, PropertyIndex)>;

/// Canonical entity state plus per-peer replication state for one world.
#[derive(Debug)]
pub struct Authority {
    schema: Arc<Schema>,
    config: RuntimeConfig,
    tick: Tick,
    arena: EntityArena,
    graph: ReplicationGraph,
    last_input: HashMap<PeerId, Tick>,
}

impl Authority {
    pub fn new(schema: Arc<Schema>, config: RuntimeConfig) -> RuntimeResult<Self> {
        config.validate()?;
        let graph = ReplicationGraph::new(GraphConfig {
            backlog_capacity: config.backlog_capacity,
            default_interest: config.default_interest,
        });
        Ok(Self {
            schema,
            config,
            tick: Tick::ZERO,
            arena: EntityArena::new(),
            graph,
            last_input: HashMap::new(),
        })
    }

    #[must_use]
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// The schema handle, for building observers of this world.
    #[must_use]
    pub fn shared_schema(&self) -> Arc<Schema> {
        Arc::clone(&self.schema)
    }

    #[must_use]
    pub const fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// The last tick produced by [`tick`](Self::tick).
    #[must_use]
    pub const fn current_tick(&self) -> Tick {
        self.tick
    }

    #[must_use]
    pub const fn arena(&self) -> &EntityArena {
        &self.arena
    }

    #[must_use]
    pub const fn graph(&self) -> &ReplicationGraph {
        &self.graph
    }

    #[must_use]
    pub fn peer(&self, peer: PeerId) -> Option<&PeerState> {
        self.graph.peer(peer)
    }

    // Entities

    /// Registers a root entity. Its properties start at their type defaults.
    pub fn spawn(&mut self, type_id: EntityTypeId) -> RuntimeResult<EntityId> {
        let ty = self.schema.require(type_id)?;
        let id = self.arena.spawn(ty, None, &self.config.pose)?;
        debug!("spawned {id} of type {type_id}");
        Ok(id)
    }

    /// Registers an entity under `parent`.
    pub fn spawn_child(&mut self, type_id: EntityTypeId, parent: EntityId) -> RuntimeResult<EntityId> {
        let ty = self.schema.require(type_id)?;
        let id = self.arena.spawn(ty, Some(parent), &self.config.pose)?;
        debug!("spawned {id} of type {type_id} under {parent}");
        Ok(id)
    }

    /// Removes `entity` and its subtree from the world and from every peer's
    /// view. Peers are sent release notices on the next tick.
    pub fn despawn(&mut self, entity: EntityId) -> RuntimeResult<Vec<EntityId>> {
        let removed = self.arena.despawn(entity)?;
        for peer in self.graph.peers_mut() {
            for id in &removed {
                peer.forget(*id);
            }
        }
        debug!("despawned {entity} ({} entities)", removed.len());
        Ok(removed)
    }

    pub fn set_parent(&mut self, entity: EntityId, parent: Option<EntityId>) -> RuntimeResult<()> {
        self.arena.set_parent(entity, parent)
    }

    /// Writes a property. The property is marked dirty only when the value changes.
    pub fn set(&mut self, entity: EntityId, index: PropertyIndex, value: Value) -> RuntimeResult<()> {
        let record = self.arena.get_mut(entity)?;
        let ty = self.schema.require(record.type_id())?;
        let pos = ty
            .position(index)
            .ok_or(RuntimeError::UnknownProperty { entity, index })?;
        let expected = ty.properties[pos].ty;
        if value.value_type() != expected {
            return Err(CodecError::TypeMismatch {
                index,
                expected,
                found: value.value_type(),
            }
            .into());
        }
        if record.values[pos] != value {
            record.values[pos] = value;
            record.dirty.mark(index);
        }
        Ok(())
    }

    /// Forces a property into the next export even if its value is unchanged.
    pub fn mark_dirty(&mut self, entity: EntityId, index: PropertyIndex) -> RuntimeResult<()> {
        let record = self.arena.get_mut(entity)?;
        let ty = self.schema.require(record.type_id())?;
        if ty.get(index).is_none() {
            return Err(RuntimeError::UnknownProperty { entity, index });
        }
        record.dirty.mark(index);
        Ok(())
    }

    pub fn get(&self, entity: EntityId, index: PropertyIndex) -> RuntimeResult<&Value> {
        let record = self.arena.get(entity)?;
        let ty = self.schema.require(record.type_id())?;
        ty.position(index)
            .and_then(|pos| record.values().get(pos))
            .ok_or(RuntimeError::UnknownProperty { entity, index })
    }

    /// Hands write authority over `entity` to `owner`, or back to the
    /// authority with `None`. The whole entity is resent so every peer sees
    /// the new ownership flag.
    pub fn set_owner(&mut self, entity: EntityId, owner: Option<PeerId>) -> RuntimeResult<()> {
        if let Some(peer) = owner {
            if self.graph.peer(peer).is_none() {
                return Err(RepError::UnknownPeer { peer }.into());
            }
        }
        let full = self.schema.require(self.arena.get(entity)?.type_id())?.full_mask();
        let previous = self.arena.set_owner(entity, owner)?;
        if previous == owner {
            return Ok(());
        }
        if let Some(state) = previous.and_then(|p| self.graph.peer_mut(p)) {
            state.set_owned(entity, false);
        }
        if let Some(state) = owner.and_then(|p| self.graph.peer_mut(p)) {
            state.set_owned(entity, true);
        }
        self.arena.get_mut(entity)?.dirty.mark_mask(DirtyMask::new(full));
        Ok(())
    }

    // Peers

    /// Attaches a peer. It receives the full visible world on the next tick.
    pub fn add_peer(&mut self, peer: PeerId) -> RuntimeResult<()> {
        self.graph.add_peer(peer, self.tick)?;
        Ok(())
    }

    /// Detaches a peer and disposes of its owned entities per the configured
    /// policy. Returns the despawned entities.
    pub fn remove_peer(&mut self, peer: PeerId) -> RuntimeResult<Vec<EntityId>> {
        self.graph.remove_peer(peer)?;
        self.last_input.remove(&peer);
        let owned = self.arena.owned_by(peer);
        let mut disposed = Vec::new();
        match self.config.disposal {
            Disposal::Despawn => {
                for entity in owned {
                    if self.arena.contains(entity) {
                        disposed.extend(self.despawn(entity)?);
                    }
                }
            }
            Disposal::ReleaseOwnership => {
                for entity in owned {
                    self.set_owner(entity, None)?;
                }
            }
        }
        debug!("peer {peer} removed, {} entities disposed", disposed.len());
        Ok(disposed)
    }

    /// Changes a peer's default interest mask.
    pub fn set_interest(&mut self, peer: PeerId, mask: u64) -> RuntimeResult<()> {
        let state = self.graph.require_mut(peer)?;
        let schema = &self.schema;
        state.set_default_interest(
            mask,
            self.arena
                .iter()
                .filter_map(|r| schema.entity_type(r.type_id()).map(|ty| (r.id(), ty))),
        );
        Ok(())
    }

    /// Overrides a peer's interest for one entity.
    pub fn set_entity_interest(&mut self, peer: PeerId, entity: EntityId, mask: u64) -> RuntimeResult<()> {
        let ty = self.schema.require(self.arena.get(entity)?.type_id())?;
        self.graph.require_mut(peer)?.set_entity_interest(entity, ty, mask);
        Ok(())
    }

    pub fn clear_entity_interest(&mut self, peer: PeerId, entity: EntityId) -> RuntimeResult<()> {
        let ty = self.schema.require(self.arena.get(entity)?.type_id())?;
        self.graph.require_mut(peer)?.clear_entity_interest(entity, ty);
        Ok(())
    }

    /// Handles an ack message. Returns `false` if it was stale or invalid.
    pub fn acknowledge(&mut self, peer: PeerId, bytes: &[u8]) -> RuntimeResult<bool> {
        let tick = decode_ack(bytes)?;
        self.acknowledge_tick(peer, tick)
    }

    pub fn acknowledge_tick(&mut self, peer: PeerId, tick: Tick) -> RuntimeResult<bool> {
        Ok(self.graph.require_mut(peer)?.acknowledge(tick))
    }

    /// Applies an input message from `peer`. Only entities the peer owns are
    /// written; everything else is decoded and dropped. Returns the number of
    /// entities applied.
    pub fn receive_input(&mut self, peer: PeerId, bytes: &[u8]) -> RuntimeResult<usize> {
        let state = self.graph.peer(peer).ok_or(RepError::UnknownPeer { peer })?;
        let mut reader = BitReader::new(bytes);
        let header = decode_input_header(&mut reader)?;
        if self.last_input.get(&peer).is_some_and(|last| header.tick <= *last) {
            debug!("peer {peer} stale input {} discarded", header.tick);
            return Ok(0);
        }
        self.last_input.insert(peer, header.tick);

        let ctx = ValueContext::new(self.schema.serializers(), self.config.value_limits());
        let mut writes = Vec::new();
        for _ in 0..header.count {
            let (local, mask) = decode_input_entry(&mut reader)?;
            let Some(entity) = state.entities().global(local) else {
                warn!("peer {peer} input names unknown {local}, rest of message dropped");
                return Err(RuntimeError::UnknownLocal { local });
            };
            let ty = self.schema.require(self.arena.get(entity)?.type_id())?;
            let values = codec::decode_properties_plain(&mut reader, &ctx, ty, mask)?;
            if state.owns(entity) {
                writes.push((entity, values));
            } else {
                warn!("peer {peer} sent input for {entity} it does not own, ignored");
            }
        }

        let applied = writes.len();
        for (entity, values) in writes {
            for (index, value) in values {
                if let Err(err) = self.set(entity, index, value) {
                    warn!("peer {peer} input for {entity} property {index} skipped: {err}");
                }
            }
        }
        Ok(applied)
    }

    // Tick

    /// Runs one authority tick: liveness, dirty snapshot, per-peer export.
    pub fn tick(&mut self) -> TickReport {
        self.tick = self.tick.next();
        let tick = self.tick;
        let mut report = TickReport {
            tick,
            ..TickReport::default()
        };

        for peer in self.graph.timed_out(tick, self.config.timeout_ticks()) {
            let last_acked = self.graph.peer(peer).map(PeerState::last_acked);
            warn!(
                "peer {peer} timed out at {tick} (last acked {})",
                last_acked.unwrap_or(Tick::ZERO)
            );
            match self.remove_peer(peer) {
                Ok(disposed) => report.disposed.extend(disposed),
                Err(err) => error!("failed to remove timed out peer {peer}: {err}"),
            }
            report.timed_out.push(peer);
        }

        self.begin(tick);

        let ctx = ValueContext::new(self.schema.serializers(), self.config.value_limits());
        let mut delivered = Delivered::new();
        for peer in self.graph.peers_mut() {
            let id = peer.id();
            match export_peer(peer, &self.arena, &self.schema, &ctx, &self.config, tick, &mut delivered) {
                Ok(bytes) => {
                    if self.config.limits.is_oversized(bytes.len()) {
                        warn!(
                            "tick {tick} message for peer {id} is {} bytes, over the {} byte limit",
                            bytes.len(),
                            self.config.limits.max_message_bytes
                        );
                        report.oversized += 1;
                    }
                    report.outgoing.push(Outgoing {
                        peer: id,
                        channel: Channel::TickState,
                        bytes,
                    });
                }
                Err(err) => error!("tick {tick} export for peer {id} failed: {err}"),
            }

            let released = peer.take_releases();
            if released.is_empty() {
                continue;
            }
            match encode_release(&released) {
                Ok(bytes) => report.outgoing.push(Outgoing {
                    peer: id,
                    channel: Channel::Spawn,
                    bytes,
                }),
                Err(err) => error!("release notice for peer {id} failed: {err}"),
            }
        }

        for record in self.arena.iter_mut() {
            let entity = record.id();
            for (index, encoder) in &mut record.poses {
                encoder.commit(delivered.contains(&(entity, *index)));
            }
        }
        report
    }

    /// Snapshots dirty masks and plans every pose encoder for `tick`.
    fn begin(&mut self, tick: Tick) {
        let schema = &self.schema;
        let pose_config = &self.config.pose;
        for record in self.arena.iter_mut() {
            record.dirty.begin();
            let Some(ty) = schema.entity_type(record.type_id()) else {
                continue;
            };
            for (index, encoder) in &mut record.poses {
                let current = ty.position(*index).and_then(|pos| record.values.get(pos));
                if let Some(Value::Pose(pose)) = current {
                    encoder.plan(tick, *pose, pose_config);
                }
            }
        }
    }
}

/// Ledger change to apply once an entity entry is fully encoded.
struct KeyframeNote {
    index: PropertyIndex,
    generation: u32,
    planned: bool,
}

/// Builds one peer's tick-state message.
fn export_peer(
    peer: &mut PeerState,
    arena: &EntityArena,
    schema: &Schema,
    ctx: &ValueContext<'_>,
    config: &RuntimeConfig,
    tick: Tick,
    delivered: &mut Delivered,
) -> RuntimeResult<Vec<u8>> {
    peer.begin_export(tick);
    let mut entries = BTreeMap::new();

    for record in arena.iter() {
        let Some(ty) = schema.entity_type(record.type_id()) else {
            continue;
        };
        let entity = record.id();
        if peer.visible_mask(entity, ty) == 0 {
            if let Some(local) = peer.release(entity) {
                debug!("peer {} lost sight of {entity} ({local})", peer.id());
            }
            continue;
        }
        let wanted = peer.export_mask(entity, ty, record.dirty().cycle());
        let mask = codec::writable_mask(ty, record.values(), wanted);
        if mask == 0 {
            continue;
        }
        let local = peer.ensure_local(entity);
        if !local.is_registered() {
            continue;
        }

        let owned = peer.owns(entity);
        let mut notes = Vec::new();
        match encode_entity(peer, record, ty, ctx, config, mask, owned, &mut notes) {
            Ok(bytes) => {
                peer.record_export(tick, entity, mask);
                if owned {
                    peer.keyframes_mut().forget(entity);
                }
                for note in notes {
                    peer.keyframes_mut().record(entity, note.index, note.generation, tick);
                    if note.planned {
                        delivered.insert((entity, note.index));
                    }
                }
                entries.insert(local, bytes);
            }
            Err(err) => warn!("tick {tick} skipped {entity} for peer {}: {err}", peer.id()),
        }
    }

    let entity_mask = entries.keys().fold(0, |mask, local: &LocalId| mask | local.mask_bit());
    let body_len: usize = entries.values().map(Vec::len).sum();
    let mut writer = BitWriter::with_capacity(wire::TICK_HEADER_SIZE + body_len);
    encode_tick_header(&mut writer, &TickHeader { tick, entity_mask })?;
    for bytes in entries.values() {
        writer.write_raw_aligned(bytes)?;
    }
    Ok(writer.finish())
}

/// Encodes one entity entry into its own buffer so a failure leaves the
/// message untouched.
#[allow(clippy::too_many_arguments)]
fn encode_entity(
    peer: &PeerState,
    record: &EntityRecord,
    ty: &schema::EntityTypeDef,
    ctx: &ValueContext<'_>,
    config: &RuntimeConfig,
    mask: u64,
    owned: bool,
    notes: &mut Vec<KeyframeNote>,
) -> RuntimeResult<Vec<u8>> {
    let entity = record.id();
    let mut writer = BitWriter::new();
    encode_entity_header(&mut writer, &EntityHeader::with_payload(ty.id, mask, owned))?;
    codec::encode_properties(&mut writer, ctx, ty, mask, record.values(), |def, w| {
        let encoder = record
            .pose_encoder(def.index)
            .ok_or(CodecError::UnknownProperties {
                entity_type: ty.id,
                unknown: def.bit(),
            })?;
        let mode = if owned {
            PoseWrite::Owner
        } else if encoder.plans_keyframe() {
            notes.push(KeyframeNote {
                index: def.index,
                generation: encoder.planned_generation(),
                planned: true,
            });
            PoseWrite::Planned
        } else if peer.keyframes().needs_catch_up(
            entity,
            def.index,
            encoder.generation(),
            peer.last_acked(),
        ) {
            notes.push(KeyframeNote {
                index: def.index,
                generation: encoder.generation(),
                planned: false,
            });
            PoseWrite::CatchUp
        } else {
            PoseWrite::Planned
        };
        encoder.write(w, mode, &config.pose)
    })?;
    Ok(writer.finish())
}
