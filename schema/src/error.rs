//! Schema validation and value codec errors.

use bitstream::BitError;
use thiserror::Error;

use crate::{EntityTypeId, PropertyIndex, ValueType};

/// Result type for schema operations.
pub type SchemaResult<T> = Result<T, SchemaError>;

/// Result type for value encoding/decoding.
pub type ValueResult<T> = Result<T, ValueError>;

/// Errors that can occur when building or validating a schema.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("duplicate entity type id {id}")]
    DuplicateEntityType { id: EntityTypeId },

    #[error("entity type {entity_type} declares property index {index} twice")]
    DuplicateProperty {
        entity_type: EntityTypeId,
        index: PropertyIndex,
    },

    /// Property indices must fit the 64-bit dirty mask.
    #[error("entity type {entity_type} uses property index {index}, maximum is 63")]
    PropertyIndexOutOfRange {
        entity_type: EntityTypeId,
        index: PropertyIndex,
    },

    #[error("entity type {entity_type} declares {count} properties, maximum is 64")]
    TooManyProperties {
        entity_type: EntityTypeId,
        count: usize,
    },

    #[error("property {index} of entity type {entity_type} has nil type")]
    NilProperty {
        entity_type: EntityTypeId,
        index: PropertyIndex,
    },

    #[error("property {index} of entity type {entity_type} uses object type {type_id} with no serializer")]
    MissingSerializer {
        entity_type: EntityTypeId,
        index: PropertyIndex,
        type_id: u16,
    },

    #[error("unknown entity type {id}")]
    UnknownEntityType { id: EntityTypeId },
}

/// Errors produced while writing or reading a typed value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValueError {
    #[error(transparent)]
    Bit(#[from] BitError),

    /// `Nil` has no wire representation.
    #[error("type {ty} cannot be serialized")]
    UnsupportedType { ty: ValueType },

    #[error("expected value of type {expected}, found {found}")]
    TypeMismatch { expected: ValueType, found: ValueType },

    #[error("no serializer registered for object type {type_id}")]
    NoSerializer { type_id: u16 },

    #[error("object type {type_id} expects {expected} fields, found {found}")]
    FieldCount {
        type_id: u16,
        expected: usize,
        found: usize,
    },

    #[error("object nesting exceeds depth {max}")]
    DepthExceeded { max: u8 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_error_display() {
        let err = SchemaError::TooManyProperties {
            entity_type: 3,
            count: 65,
        };
        let msg = err.to_string();
        assert!(msg.contains("65"));
        assert!(msg.contains("entity type 3"));
    }

    #[test]
    fn value_error_from_bit_error() {
        let err: ValueError = BitError::InvalidUtf8.into();
        assert_eq!(err, ValueError::Bit(BitError::InvalidUtf8));
        assert!(err.to_string().contains("UTF-8"));
    }

    #[test]
    fn type_mismatch_names_both_types() {
        let err = ValueError::TypeMismatch {
            expected: ValueType::Vec3,
            found: ValueType::F32,
        };
        let msg = err.to_string();
        assert!(msg.contains("vec3"));
        assert!(msg.contains("f32"));
    }
}
