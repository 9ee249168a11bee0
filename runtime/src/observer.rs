//! The receiving side of a replicated world.

use std::collections::BTreeMap;
use std::sync::Arc;

use bitstream::{BitReader, BitWriter};
use codec::{CodecError, DirtyTracker, PoseDecoder};
use log::{debug, error};
use predict::EntityPrediction;
use schema::{
    EntityTypeDef, EntityTypeId, LerpPolicy, PropertyIndex, Schema, Value, ValueContext, ValueType,
};
use wire::{
    decode_entity_header, decode_release, decode_tick_header, encode_ack, encode_input_entry,
    encode_input_header, DecodeError, InputHeader, LocalId, Tick,
};

use crate::config::RuntimeConfig;
use crate::error::{RuntimeError, RuntimeResult};
use crate::hooks::ReplicationHooks;

/// An entity as one observer knows it.
#[derive(Debug, Clone)]
pub struct RemoteEntity {
    type_id: EntityTypeId,
    owned: bool,
    confirmed: Vec<Value>,
    live: Vec<Value>,
    poses: Vec<(PropertyIndex, PoseDecoder)>,
    prediction: Option<EntityPrediction>,
    input: DirtyTracker,
}

impl RemoteEntity {
    fn new(ty: &EntityTypeDef) -> Self {
        let values = ty.default_values();
        Self {
            type_id: ty.id,
            owned: false,
            confirmed: values.clone(),
            live: values,
            poses: ty
                .properties
                .iter()
                .filter(|p| p.ty == ValueType::Pose)
                .map(|p| (p.index, PoseDecoder::new()))
                .collect(),
            prediction: None,
            input: DirtyTracker::new(),
        }
    }

    #[must_use]
    pub const fn type_id(&self) -> EntityTypeId {
        self.type_id
    }

    /// `true` when the authority granted this observer write authority.
    #[must_use]
    pub const fn is_owned(&self) -> bool {
        self.owned
    }

    /// Last values received from the authority, in property table order.
    #[must_use]
    pub fn confirmed(&self) -> &[Value] {
        &self.confirmed
    }

    /// Values the application sees: confirmed state, or the local
    /// prediction for owned entities.
    #[must_use]
    pub fn live(&self) -> &[Value] {
        &self.live
    }

    #[must_use]
    pub const fn prediction(&self) -> Option<&EntityPrediction> {
        self.prediction.as_ref()
    }

    fn set_owned(&mut self, owned: bool, ty: &EntityTypeDef, capacity: usize) -> RuntimeResult<()> {
        if owned && self.prediction.is_none() {
            self.prediction = Some(EntityPrediction::for_type(ty, capacity)?);
        } else if !owned {
            self.prediction = None;
            self.input.clear();
        }
        self.owned = owned;
        Ok(())
    }
}

/// Outcome of [`Observer::receive`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReceiveOutcome {
    /// The tick was applied; `ack` goes back to the authority.
    Applied {
        tick: Tick,
        ack: Vec<u8>,
        entities: usize,
    },
    /// The tick was at or before the last applied one and was discarded.
    Stale { tick: Tick },
}

impl ReceiveOutcome {
    #[must_use]
    pub fn ack(&self) -> Option<&[u8]> {
        match self {
            Self::Applied { ack, .. } => Some(ack),
            Self::Stale { .. } => None,
        }
    }
}

/// Applies tick-state messages from one authority.
#[derive(Debug)]
pub struct Observer {
    schema: Arc<Schema>,
    config: RuntimeConfig,
    last_applied: Tick,
    entities: BTreeMap<LocalId, RemoteEntity>,
}

impl Observer {
    pub fn new(schema: Arc<Schema>, config: RuntimeConfig) -> RuntimeResult<Self> {
        config.validate()?;
        Ok(Self {
            schema,
            config,
            last_applied: Tick::ZERO,
            entities: BTreeMap::new(),
        })
    }

    #[must_use]
    pub const fn last_applied(&self) -> Tick {
        self.last_applied
    }

    #[must_use]
    pub fn entity(&self, local: LocalId) -> Option<&RemoteEntity> {
        self.entities.get(&local)
    }

    pub fn entities(&self) -> impl Iterator<Item = (LocalId, &RemoteEntity)> {
        self.entities.iter().map(|(l, e)| (*l, e))
    }

    /// Live value of one property.
    #[must_use]
    pub fn value(&self, local: LocalId, index: PropertyIndex) -> Option<&Value> {
        let entity = self.entities.get(&local)?;
        let pos = self.schema.entity_type(entity.type_id)?.position(index)?;
        entity.live.get(pos)
    }

    /// Applies one tick-state message.
    ///
    /// Entities are applied in ascending local id order. If an entity fails
    /// to decode, the ones before it stay applied, the rest of the message is
    /// dropped, and the tick is neither marked applied nor acknowledged.
    pub fn receive<H: ReplicationHooks>(
        &mut self,
        bytes: &[u8],
        hooks: &mut H,
    ) -> RuntimeResult<ReceiveOutcome> {
        let mut reader = BitReader::new(bytes);
        let header = decode_tick_header(&mut reader).map_err(|err| {
            error!("dropping tick message with unreadable header: {err}");
            RuntimeError::from(err)
        })?;
        let tick = header.tick;
        if tick <= self.last_applied {
            debug!("stale tick {tick} discarded (last applied {})", self.last_applied);
            return Ok(ReceiveOutcome::Stale { tick });
        }

        let mut applied = 0;
        for local in LocalId::iter_mask(header.entity_mask) {
            if let Err(err) = self.apply_entity(&mut reader, tick, local, hooks) {
                error!("tick {tick} aborted at {local} after {applied} entities: {err}");
                return Err(RuntimeError::Aborted {
                    tick,
                    applied,
                    source: Box::new(err),
                });
            }
            applied += 1;
        }
        if !reader.is_empty() {
            let err = DecodeError::TrailingBits {
                remaining: reader.bits_remaining(),
            };
            error!("tick {tick} aborted after {applied} entities: {err}");
            return Err(RuntimeError::Aborted {
                tick,
                applied,
                source: Box::new(err.into()),
            });
        }

        self.last_applied = tick;
        Ok(ReceiveOutcome::Applied {
            tick,
            ack: encode_ack(tick),
            entities: applied,
        })
    }

    /// Applies a release notice. Returns how many known entities were removed.
    pub fn receive_release<H: ReplicationHooks>(
        &mut self,
        bytes: &[u8],
        hooks: &mut H,
    ) -> RuntimeResult<usize> {
        let mut removed = 0;
        for local in decode_release(bytes)? {
            if self.entities.remove(&local).is_some() {
                debug!("released {local}");
                hooks.on_released(local);
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// Writes a property of an owned entity locally. The change is sent with
    /// the next [`build_input`](Self::build_input).
    pub fn set_local(&mut self, local: LocalId, index: PropertyIndex, value: Value) -> RuntimeResult<()> {
        let entity = self
            .entities
            .get_mut(&local)
            .ok_or(RuntimeError::UnknownLocal { local })?;
        if !entity.owned {
            return Err(RuntimeError::NotOwned { local });
        }
        let ty = self.schema.require(entity.type_id)?;
        let unknown = CodecError::UnknownProperties {
            entity_type: ty.id,
            unknown: 1u64 << (index & 63),
        };
        let pos = ty.position(index).ok_or(unknown)?;
        let expected = ty.properties[pos].ty;
        if value.value_type() != expected {
            return Err(CodecError::TypeMismatch {
                index,
                expected,
                found: value.value_type(),
            }
            .into());
        }
        entity.live[pos] = value;
        entity.input.mark(index);
        Ok(())
    }

    /// Snapshots the live values of every predicted property for `tick`.
    pub fn store_predicted(&mut self, tick: Tick) -> RuntimeResult<()> {
        for entity in self.entities.values_mut() {
            if let Some(prediction) = entity.prediction.as_mut() {
                prediction.store_predicted(tick, &entity.live)?;
            }
        }
        Ok(())
    }

    /// Re-applies the predictions stored for `tick` to one entity. Returns
    /// the mask of restored properties.
    pub fn restore_predicted(&mut self, local: LocalId, tick: Tick) -> RuntimeResult<u64> {
        let entity = self
            .entities
            .get_mut(&local)
            .ok_or(RuntimeError::UnknownLocal { local })?;
        let Some(prediction) = entity.prediction.as_ref() else {
            return Err(RuntimeError::NotOwned { local });
        };
        Ok(prediction.restore(tick, &mut entity.live)?)
    }

    /// Encodes locally changed properties of owned entities, or `None` when
    /// nothing changed since the last call.
    pub fn build_input(&mut self, tick: Tick) -> RuntimeResult<Option<Vec<u8>>> {
        let changed: Vec<LocalId> = self
            .entities
            .iter()
            .filter(|(_, e)| e.owned && !e.input.live().is_empty())
            .map(|(l, _)| *l)
            .collect();
        if changed.is_empty() {
            return Ok(None);
        }

        let count = u8::try_from(changed.len()).map_err(|_| wire::EncodeError::TooManyEntries {
            count: changed.len(),
        })?;
        let ctx = ValueContext::new(self.schema.serializers(), self.config.value_limits());
        let mut writer = BitWriter::new();
        encode_input_header(&mut writer, &InputHeader { tick, count })?;
        for local in changed {
            let Some(entity) = self.entities.get_mut(&local) else {
                continue;
            };
            let ty = self.schema.require(entity.type_id)?;
            let mask = entity.input.begin().bits();
            encode_input_entry(&mut writer, local, mask)?;
            codec::encode_properties_plain(&mut writer, &ctx, ty, mask, &entity.live)?;
        }
        Ok(Some(writer.finish()))
    }

    fn apply_entity<H: ReplicationHooks>(
        &mut self,
        reader: &mut BitReader<'_>,
        tick: Tick,
        local: LocalId,
        hooks: &mut H,
    ) -> RuntimeResult<()> {
        let schema = Arc::clone(&self.schema);
        let header = decode_entity_header(reader)?;
        let owned = header.flags.is_owned();

        let ty = schema.require(header.type_id)?;
        let known = self
            .entities
            .get(&local)
            .is_some_and(|e| e.type_id == header.type_id);
        if !known {
            debug!("placeholder for {local} (type {})", header.type_id);
            self.entities.insert(local, RemoteEntity::new(ty));
            hooks.on_placeholder(local, header.type_id);
        }
        let Some(entity) = self.entities.get_mut(&local) else {
            return Err(RuntimeError::UnknownLocal { local });
        };
        entity.set_owned(owned, ty, self.config.prediction_capacity)?;

        let pose_config = &self.config.pose;
        let poses = &mut entity.poses;
        let ctx = ValueContext::new(schema.serializers(), self.config.value_limits());
        let values = codec::decode_properties(reader, &ctx, ty, header.property_mask, |def, r| {
            let decoder = poses
                .iter_mut()
                .find(|(index, _)| *index == def.index)
                .map(|(_, d)| d)
                .ok_or(CodecError::UnknownProperties {
                    entity_type: ty.id,
                    unknown: def.bit(),
                })?;
            decoder.read(r, pose_config)
        })?;

        let mut mask = 0u64;
        for (index, value) in values {
            if let Some(pos) = ty.position(index) {
                entity.confirmed[pos] = value;
                mask |= 1u64 << index;
            }
        }

        let mut predicted = 0;
        if let Some(prediction) = entity.prediction.as_mut() {
            predicted = mask & ty.predicted_mask();
            prediction.store_confirmed(&entity.confirmed, mask)?;
            let snapped = prediction.reconcile(tick, &mut entity.live, predicted)?;
            if snapped != 0 {
                debug!("{local} mispredicted at {tick}, snapped 0x{snapped:016x}");
                hooks.on_mispredicted(local, snapped, tick);
            }
        }

        for (pos, def) in ty.properties.iter().enumerate() {
            if mask & !predicted & def.bit() == 0 {
                continue;
            }
            let value = &entity.confirmed[pos];
            if def.notify && entity.live[pos] != *value {
                hooks.on_property_changed(local, def.index, value);
            }
            if def.lerp != LerpPolicy::None {
                hooks.on_interpolation_target(local, def.index, value, def.lerp);
            }
            entity.live[pos] = value.clone();
        }
        hooks.on_entity_updated(local, mask);
        Ok(())
    }
}
