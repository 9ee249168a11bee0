//! Value model and property schema for statecast replication.
//!
//! This crate defines how replicated state is described:
//! - Value types and values (scalars, vectors, quaternions, poses, strings, arrays, objects)
//! - Typed value encoding over the bitstream primitives
//! - Pluggable serializers for structured object values
//! - Property entries (interest mask, lerp policy, prediction tolerance)
//! - Entity type tables, validated once when the schema is built
//!
//! # Design Principles
//!
//! - **Explicit schemas** - No reflection on arbitrary Rust types.
//! - **Fixed layouts** - Every value type has one wire layout.
//! - **Table per type** - Property lookups resolve against a sorted table, never by name.

mod codec;
mod error;
mod math;
mod property;
mod schema;
mod value;

pub use codec::{
    read_value, write_value, FieldListSerializer, ObjectSerializer, SerializerRegistry,
    ValueContext, ValueLimits, MAX_OBJECT_DEPTH,
};
pub use error::{SchemaError, SchemaResult, ValueError, ValueResult};
pub use math::{Pose, Quat, Vec3};
pub use property::{LerpPolicy, PropertyDef};
pub use schema::{EntityTypeDef, Schema, SchemaBuilder};
pub use value::{ObjectValue, Value, ValueType};

/// An entity type id within a schema.
pub type EntityTypeId = u16;

/// A property index within an entity type (0-63).
pub type PropertyIndex = u8;

/// Maximum number of properties per entity type (width of the dirty mask).
pub const MAX_PROPERTIES: usize = 64;
