//! Error types for codec operations.

use bitstream::BitError;
use schema::{EntityTypeId, PropertyIndex, ValueError, ValueType};
use thiserror::Error;

/// Result type for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;

/// Errors that can occur while encoding or decoding property payloads.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error(transparent)]
    Bit(#[from] BitError),

    #[error(transparent)]
    Value(#[from] ValueError),

    /// Pose header uses an undefined change type or reserved bit.
    #[error("invalid pose header 0b{header:08b}")]
    InvalidPoseHeader { header: u8 },

    /// Property mask names properties the entity type does not declare.
    #[error("entity type {entity_type} has no properties for mask bits 0x{unknown:016x}")]
    UnknownProperties { entity_type: EntityTypeId, unknown: u64 },

    /// A value does not match its property's declared type.
    #[error("property {index} expects {expected}, found {found}")]
    TypeMismatch {
        index: PropertyIndex,
        expected: ValueType,
        found: ValueType,
    },

    /// Value storage does not line up with the entity type's property table.
    #[error("entity type {entity_type} has {expected} properties, got {found} values")]
    ValueCount {
        entity_type: EntityTypeId,
        expected: usize,
        found: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_unknown_properties() {
        let err = CodecError::UnknownProperties {
            entity_type: 2,
            unknown: 0x10,
        };
        let msg = err.to_string();
        assert!(msg.contains("entity type 2"));
        assert!(msg.contains("0x0000000000000010"));
    }

    #[test]
    fn converts_from_lower_layers() {
        let err: CodecError = BitError::InvalidUtf8.into();
        assert!(matches!(err, CodecError::Bit(_)));
        let err: CodecError = ValueError::NoSerializer { type_id: 1 }.into();
        assert!(matches!(err, CodecError::Value(_)));
    }

    #[test]
    fn display_invalid_pose_header() {
        let err = CodecError::InvalidPoseHeader { header: 0x83 };
        assert!(err.to_string().contains("10000011"));
    }
}
