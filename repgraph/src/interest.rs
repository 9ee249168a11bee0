//! Per-peer interest masks.

use std::collections::HashMap;

use schema::EntityTypeDef;

use crate::EntityId;

/// A peer-wide default interest mask with per-entity overrides.
///
/// A property is visible iff `property.interest_mask & interest != 0`, except
/// on always-visible entity types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interest {
    default: u64,
    overrides: HashMap<EntityId, u64>,
}

impl Default for Interest {
    fn default() -> Self {
        Self::new(u64::MAX)
    }
}

impl Interest {
    #[must_use]
    pub fn new(default: u64) -> Self {
        Self {
            default,
            overrides: HashMap::new(),
        }
    }

    #[must_use]
    pub const fn default_mask(&self) -> u64 {
        self.default
    }

    /// Effective interest for `entity`.
    #[must_use]
    pub fn get(&self, entity: EntityId) -> u64 {
        self.overrides.get(&entity).copied().unwrap_or(self.default)
    }

    #[must_use]
    pub fn has_override(&self, entity: EntityId) -> bool {
        self.overrides.contains_key(&entity)
    }

    /// Replaces the default, returning the previous one.
    pub fn set_default(&mut self, mask: u64) -> u64 {
        std::mem::replace(&mut self.default, mask)
    }

    /// Sets an override, returning the previous effective interest.
    pub fn set(&mut self, entity: EntityId, mask: u64) -> u64 {
        let old = self.get(entity);
        self.overrides.insert(entity, mask);
        old
    }

    /// Removes an override, returning the previous effective interest.
    pub fn clear(&mut self, entity: EntityId) -> u64 {
        self.overrides.remove(&entity).unwrap_or(self.default)
    }

    pub fn forget(&mut self, entity: EntityId) {
        self.overrides.remove(&entity);
    }
}

/// Properties that become visible when interest moves from `old` to `new`.
#[must_use]
pub fn gained_properties(ty: &EntityTypeDef, old: u64, new: u64) -> u64 {
    ty.visible_mask(new) & !ty.visible_mask(old)
}

#[cfg(test)]
mod tests {
    use super::*;
    use schema::{PropertyDef, Schema, ValueType};

    fn ty() -> EntityTypeDef {
        EntityTypeDef::new(1, "unit")
            .property(PropertyDef::new(0, "hp", ValueType::U16).interest(0b01))
            .property(PropertyDef::new(1, "secret", ValueType::U16).interest(0b10))
            .property(PropertyDef::new(2, "name", ValueType::String))
    }

    fn built(ty: EntityTypeDef) -> Schema {
        Schema::builder().entity(ty).build().unwrap()
    }

    #[test]
    fn overrides_take_precedence() {
        let mut interest = Interest::new(0b01);
        let e = EntityId::new(3);
        assert_eq!(interest.get(e), 0b01);
        assert_eq!(interest.set(e, 0b10), 0b01);
        assert_eq!(interest.get(e), 0b10);
        assert_eq!(interest.clear(e), 0b10);
        assert_eq!(interest.get(e), 0b01);
    }

    #[test]
    fn gained_only_counts_new_visibility() {
        let schema = built(ty());
        let ty = schema.entity_type(1).unwrap();
        assert_eq!(gained_properties(ty, 0b01, 0b11), 0b010);
        assert_eq!(gained_properties(ty, 0b11, 0b01), 0);
        assert_eq!(gained_properties(ty, 0, 0b01), 0b101);
    }

    #[test]
    fn always_visible_types_never_gain() {
        let schema = built(ty().always_visible());
        assert_eq!(gained_properties(schema.entity_type(1).unwrap(), 0, 0b11), 0);
    }
}
