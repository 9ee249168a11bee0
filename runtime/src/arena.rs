//! Authority-side entity storage.

use std::collections::BTreeMap;

use codec::{DirtyTracker, PoseConfig, PoseEncoder};
use repgraph::{EntityId, PeerId};
use schema::{EntityTypeDef, EntityTypeId, PropertyIndex, Value, ValueType};

use crate::error::{RuntimeError, RuntimeResult};

/// One replicated entity as the authority sees it.
#[derive(Debug, Clone)]
pub struct EntityRecord {
    id: EntityId,
    type_id: EntityTypeId,
    parent: Option<EntityId>,
    children: Vec<EntityId>,
    pub(crate) values: Vec<Value>,
    pub(crate) dirty: DirtyTracker,
    pub(crate) poses: Vec<(PropertyIndex, PoseEncoder)>,
    owner: Option<PeerId>,
}

impl EntityRecord {
    #[must_use]
    pub const fn id(&self) -> EntityId {
        self.id
    }

    #[must_use]
    pub const fn type_id(&self) -> EntityTypeId {
        self.type_id
    }

    #[must_use]
    pub const fn parent(&self) -> Option<EntityId> {
        self.parent
    }

    #[must_use]
    pub fn children(&self) -> &[EntityId] {
        &self.children
    }

    #[must_use]
    pub const fn owner(&self) -> Option<PeerId> {
        self.owner
    }

    /// Current values, parallel to the entity type's property table.
    #[must_use]
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    #[must_use]
    pub const fn dirty(&self) -> &DirtyTracker {
        &self.dirty
    }

    pub(crate) fn pose_encoder(&self, index: PropertyIndex) -> Option<&PoseEncoder> {
        self.poses.iter().find(|(i, _)| *i == index).map(|(_, e)| e)
    }
}

/// Entities keyed by global id.
///
/// Ids are assigned from 1 upwards and never reused, so id order is
/// registration order and iteration is stable across peers.
#[derive(Debug, Clone, Default)]
pub struct EntityArena {
    records: BTreeMap<EntityId, EntityRecord>,
    /// Highest id handed out so far.
    issued: u32,
}

impl EntityArena {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            records: BTreeMap::new(),
            issued: 0,
        }
    }

    /// Adds an entity of type `ty`, optionally under `parent`.
    pub fn spawn(
        &mut self,
        ty: &EntityTypeDef,
        parent: Option<EntityId>,
        pose: &PoseConfig,
    ) -> RuntimeResult<EntityId> {
        let raw = self
            .issued
            .checked_add(1)
            .ok_or(RuntimeError::IdsExhausted)?;
        let id = EntityId::new(raw);
        if let Some(parent) = parent {
            let parent_record = self
                .records
                .get_mut(&parent)
                .ok_or(RuntimeError::InvalidParent { entity: id, parent })?;
            parent_record.children.push(id);
        }
        self.issued = raw;

        let poses = ty
            .properties
            .iter()
            .filter(|p| p.ty == ValueType::Pose)
            .map(|p| (p.index, PoseEncoder::new(pose)))
            .collect();
        self.records.insert(
            id,
            EntityRecord {
                id,
                type_id: ty.id,
                parent,
                children: Vec::new(),
                values: ty.default_values(),
                dirty: DirtyTracker::new(),
                poses,
                owner: None,
            },
        );
        Ok(id)
    }

    /// Removes `entity` and its subtree. Returns the removed ids, children first.
    pub fn despawn(&mut self, entity: EntityId) -> RuntimeResult<Vec<EntityId>> {
        let record = self
            .records
            .get(&entity)
            .ok_or(RuntimeError::UnknownEntity { entity })?;
        if let Some(parent) = record.parent {
            if let Some(parent) = self.records.get_mut(&parent) {
                parent.children.retain(|c| *c != entity);
            }
        }
        let mut removed = Vec::new();
        let mut stack = vec![(entity, false)];
        while let Some((id, expanded)) = stack.pop() {
            if expanded {
                self.records.remove(&id);
                removed.push(id);
                continue;
            }
            stack.push((id, true));
            if let Some(record) = self.records.get(&id) {
                stack.extend(record.children.iter().map(|c| (*c, false)));
            }
        }
        Ok(removed)
    }

    /// Moves `entity` under `parent`, or to the root with `None`.
    pub fn set_parent(&mut self, entity: EntityId, parent: Option<EntityId>) -> RuntimeResult<()> {
        let old = self.get(entity)?.parent;
        if let Some(parent) = parent {
            if !self.records.contains_key(&parent) || self.is_ancestor_or_self(entity, parent) {
                return Err(RuntimeError::InvalidParent { entity, parent });
            }
        }
        if let Some(old) = old.and_then(|p| self.records.get_mut(&p)) {
            old.children.retain(|c| *c != entity);
        }
        if let Some(new) = parent.and_then(|p| self.records.get_mut(&p)) {
            new.children.push(entity);
        }
        self.get_mut(entity)?.parent = parent;
        Ok(())
    }

    pub fn set_owner(&mut self, entity: EntityId, owner: Option<PeerId>) -> RuntimeResult<Option<PeerId>> {
        let record = self.get_mut(entity)?;
        Ok(std::mem::replace(&mut record.owner, owner))
    }

    pub fn get(&self, entity: EntityId) -> RuntimeResult<&EntityRecord> {
        self.records
            .get(&entity)
            .ok_or(RuntimeError::UnknownEntity { entity })
    }

    pub fn get_mut(&mut self, entity: EntityId) -> RuntimeResult<&mut EntityRecord> {
        self.records
            .get_mut(&entity)
            .ok_or(RuntimeError::UnknownEntity { entity })
    }

    #[must_use]
    pub fn contains(&self, entity: EntityId) -> bool {
        self.records.contains_key(&entity)
    }

    /// Entities in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &EntityRecord> {
        self.records.values()
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut EntityRecord> {
        self.records.values_mut()
    }

    /// Entities owned by `peer`.
    #[must_use]
    pub fn owned_by(&self, peer: PeerId) -> Vec<EntityId> {
        self.records
            .values()
            .filter(|r| r.owner == Some(peer))
            .map(|r| r.id)
            .collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn is_ancestor_or_self(&self, ancestor: EntityId, mut entity: EntityId) -> bool {
        loop {
            if entity == ancestor {
                return true;
            }
            match self.records.get(&entity).and_then(|r| r.parent) {
                Some(parent) => entity = parent,
                None => return false,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use schema::{PropertyDef, Schema};

    fn schema() -> Schema {
        Schema::builder()
            .entity(
                EntityTypeDef::new(1, "node")
                    .property(PropertyDef::new(0, "pose", ValueType::Pose))
                    .property(PropertyDef::new(1, "label", ValueType::String)),
            )
            .build()
            .unwrap()
    }

    fn spawn(arena: &mut EntityArena, schema: &Schema, parent: Option<EntityId>) -> EntityId {
        arena
            .spawn(schema.entity_type(1).unwrap(), parent, &PoseConfig::for_testing())
            .unwrap()
    }

    #[test]
    fn ids_are_monotonic_from_one() {
        let schema = schema();
        let mut arena = EntityArena::new();
        let a = spawn(&mut arena, &schema, None);
        let b = spawn(&mut arena, &schema, None);
        assert_eq!((a.raw(), b.raw()), (1, 2));
        arena.despawn(b).unwrap();
        assert_eq!(spawn(&mut arena, &schema, None).raw(), 3);
    }

    #[test]
    fn exhausted_ids_are_an_error() {
        let schema = schema();
        let mut arena = EntityArena::new();
        arena.issued = u32::MAX - 1;
        let last = spawn(&mut arena, &schema, None);
        assert_eq!(last.raw(), u32::MAX);

        let err = arena
            .spawn(schema.entity_type(1).unwrap(), None, &PoseConfig::for_testing())
            .unwrap_err();
        assert!(matches!(err, RuntimeError::IdsExhausted));
        assert_eq!(arena.len(), 1);
        assert!(arena.get(last).is_ok());
    }

    #[test]
    fn spawn_seeds_defaults_and_pose_encoders() {
        let schema = schema();
        let mut arena = EntityArena::new();
        let id = spawn(&mut arena, &schema, None);
        let record = arena.get(id).unwrap();
        assert_eq!(record.values(), &[Value::Pose(schema::Pose::default()), Value::from("")]);
        assert!(record.pose_encoder(0).is_some());
        assert!(record.pose_encoder(1).is_none());
    }

    #[test]
    fn despawn_removes_subtree_children_first() {
        let schema = schema();
        let mut arena = EntityArena::new();
        let root = spawn(&mut arena, &schema, None);
        let child = spawn(&mut arena, &schema, Some(root));
        let grandchild = spawn(&mut arena, &schema, Some(child));
        let other = spawn(&mut arena, &schema, None);

        let removed = arena.despawn(root).unwrap();
        assert_eq!(removed, vec![grandchild, child, root]);
        assert_eq!(arena.len(), 1);
        assert!(arena.contains(other));
        assert!(arena.despawn(root).is_err());
    }

    #[test]
    fn reparent_rejects_cycles() {
        let schema = schema();
        let mut arena = EntityArena::new();
        let a = spawn(&mut arena, &schema, None);
        let b = spawn(&mut arena, &schema, Some(a));
        assert!(matches!(
            arena.set_parent(a, Some(b)),
            Err(RuntimeError::InvalidParent { .. })
        ));
        let c = spawn(&mut arena, &schema, None);
        arena.set_parent(b, Some(c)).unwrap();
        assert!(arena.get(a).unwrap().children().is_empty());
        assert_eq!(arena.get(c).unwrap().children(), &[b]);
    }

    #[test]
    fn unknown_parent_rejected() {
        let schema = schema();
        let mut arena = EntityArena::new();
        let missing = EntityId::new(99);
        let err = arena
            .spawn(schema.entity_type(1).unwrap(), Some(missing), &PoseConfig::for_testing())
            .unwrap_err();
        assert!(matches!(err, RuntimeError::InvalidParent { parent, .. } if parent == missing));
    }

    #[test]
    fn ownership_lookup() {
        let schema = schema();
        let mut arena = EntityArena::new();
        let a = spawn(&mut arena, &schema, None);
        let _b = spawn(&mut arena, &schema, None);
        assert_eq!(arena.set_owner(a, Some(PeerId(4))).unwrap(), None);
        assert_eq!(arena.owned_by(PeerId(4)), vec![a]);
    }
}
