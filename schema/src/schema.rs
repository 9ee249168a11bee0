//! Entity type definitions and validation.

use std::collections::HashSet;
use std::fmt;

use crate::codec::{ObjectSerializer, SerializerRegistry};
use crate::error::{SchemaError, SchemaResult};
use crate::property::PropertyDef;
use crate::value::{Value, ValueType};
use crate::{EntityTypeId, PropertyIndex, MAX_PROPERTIES};

/// A replicable entity type: an ordered table of properties.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EntityTypeDef {
    pub id: EntityTypeId,
    pub name: String,
    /// Sorted by property index once the schema is built.
    pub properties: Vec<PropertyDef>,
    /// Root entities bypass interest filtering.
    pub always_visible: bool,
}

impl EntityTypeDef {
    #[must_use]
    pub fn new(id: EntityTypeId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            properties: Vec::new(),
            always_visible: false,
        }
    }

    /// Adds a property.
    #[must_use]
    pub fn property(mut self, property: PropertyDef) -> Self {
        self.properties.push(property);
        self
    }

    #[must_use]
    pub fn always_visible(mut self) -> Self {
        self.always_visible = true;
        self
    }

    /// Looks up a property by index.
    #[must_use]
    pub fn get(&self, index: PropertyIndex) -> Option<&PropertyDef> {
        self.position(index).map(|pos| &self.properties[pos])
    }

    /// Position of a property in the table, which is also its slot in value storage.
    #[must_use]
    pub fn position(&self, index: PropertyIndex) -> Option<usize> {
        self.properties.binary_search_by_key(&index, |p| p.index).ok()
    }

    /// Default values for every property, in table order.
    #[must_use]
    pub fn default_values(&self) -> Vec<Value> {
        self.properties.iter().map(|p| Value::default_for(p.ty)).collect()
    }

    /// Mask with one bit per declared property.
    #[must_use]
    pub fn full_mask(&self) -> u64 {
        self.properties.iter().fold(0, |mask, p| mask | p.bit())
    }

    /// Properties visible to a peer with `interest`.
    #[must_use]
    pub fn visible_mask(&self, interest: u64) -> u64 {
        if self.always_visible {
            return self.full_mask();
        }
        self.properties
            .iter()
            .filter(|p| p.is_visible_to(interest))
            .fold(0, |mask, p| mask | p.bit())
    }

    /// Properties that are locally predicted.
    #[must_use]
    pub fn predicted_mask(&self) -> u64 {
        self.properties
            .iter()
            .filter(|p| p.is_predicted())
            .fold(0, |mask, p| mask | p.bit())
    }

    /// Iterates the properties selected by `mask` in ascending index order.
    pub fn iter_mask(&self, mask: u64) -> impl Iterator<Item = &PropertyDef> {
        self.properties.iter().filter(move |p| mask & p.bit() != 0)
    }

    fn validate(&mut self, serializers: &SerializerRegistry) -> SchemaResult<()> {
        if self.properties.len() > MAX_PROPERTIES {
            return Err(SchemaError::TooManyProperties {
                entity_type: self.id,
                count: self.properties.len(),
            });
        }
        let mut seen = HashSet::new();
        for prop in &self.properties {
            if usize::from(prop.index) >= MAX_PROPERTIES {
                return Err(SchemaError::PropertyIndexOutOfRange {
                    entity_type: self.id,
                    index: prop.index,
                });
            }
            if !seen.insert(prop.index) {
                return Err(SchemaError::DuplicateProperty {
                    entity_type: self.id,
                    index: prop.index,
                });
            }
            match prop.ty {
                ValueType::Nil => {
                    return Err(SchemaError::NilProperty {
                        entity_type: self.id,
                        index: prop.index,
                    });
                }
                ValueType::Object { type_id } if !serializers.contains(type_id) => {
                    return Err(SchemaError::MissingSerializer {
                        entity_type: self.id,
                        index: prop.index,
                        type_id,
                    });
                }
                _ => {}
            }
        }
        self.properties.sort_by_key(|p| p.index);
        Ok(())
    }
}

/// The validated set of entity types plus object serializers.
pub struct Schema {
    types: Vec<EntityTypeDef>,
    serializers: SerializerRegistry,
}

impl fmt::Debug for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Schema")
            .field("types", &self.types)
            .field("serializers", &self.serializers)
            .finish()
    }
}

impl Schema {
    /// Creates a schema after validating every entity type.
    pub fn new(
        mut types: Vec<EntityTypeDef>,
        serializers: SerializerRegistry,
    ) -> SchemaResult<Self> {
        let mut ids = HashSet::new();
        for ty in &mut types {
            if !ids.insert(ty.id) {
                return Err(SchemaError::DuplicateEntityType { id: ty.id });
            }
            ty.validate(&serializers)?;
        }
        types.sort_by_key(|t| t.id);
        Ok(Self { types, serializers })
    }

    #[must_use]
    pub fn builder() -> SchemaBuilder {
        SchemaBuilder::default()
    }

    #[must_use]
    pub fn entity_type(&self, id: EntityTypeId) -> Option<&EntityTypeDef> {
        self.types
            .binary_search_by_key(&id, |t| t.id)
            .ok()
            .map(|pos| &self.types[pos])
    }

    /// Like [`entity_type`](Self::entity_type) but returns an error when missing.
    pub fn require(&self, id: EntityTypeId) -> SchemaResult<&EntityTypeDef> {
        self.entity_type(id)
            .ok_or(SchemaError::UnknownEntityType { id })
    }

    #[must_use]
    pub fn entity_types(&self) -> &[EntityTypeDef] {
        &self.types
    }

    #[must_use]
    pub fn serializers(&self) -> &SerializerRegistry {
        &self.serializers
    }
}

/// Builder for `Schema`.
#[derive(Debug, Default)]
pub struct SchemaBuilder {
    types: Vec<EntityTypeDef>,
    serializers: SerializerRegistry,
}

impl SchemaBuilder {
    #[must_use]
    pub fn entity(mut self, ty: EntityTypeDef) -> Self {
        self.types.push(ty);
        self
    }

    /// Registers an object type laid out as an ordered field list.
    #[must_use]
    pub fn object(mut self, type_id: u16, fields: Vec<ValueType>) -> Self {
        self.serializers.register_fields(type_id, fields);
        self
    }

    /// Registers a custom object serializer.
    #[must_use]
    pub fn serializer(mut self, type_id: u16, serializer: impl ObjectSerializer + 'static) -> Self {
        self.serializers.register(type_id, serializer);
        self
    }

    pub fn build(self) -> SchemaResult<Schema> {
        Schema::new(self.types, self.serializers)
    }
}
