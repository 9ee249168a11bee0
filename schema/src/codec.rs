//! Typed value encoding on top of the bitstream primitives.
//!
//! Every value type has a fixed layout: scalars use their natural width,
//! vectors and quaternions are consecutive `f32`s, strings and arrays carry a
//! `u16` length prefix. Object values delegate to the serializer registered
//! for their type id.

use std::collections::HashMap;
use std::fmt;

use bitstream::{BitReader, BitWriter};

use crate::error::{ValueError, ValueResult};
use crate::math::{Pose, Quat, Vec3};
use crate::value::{ObjectValue, Value, ValueType};

/// Maximum object nesting accepted while reading or writing.
pub const MAX_OBJECT_DEPTH: u8 = 8;

/// Length limits applied while decoding untrusted values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ValueLimits {
    pub max_string_len: usize,
    pub max_array_len: usize,
}

impl Default for ValueLimits {
    fn default() -> Self {
        Self {
            max_string_len: 256,
            max_array_len: 256,
        }
    }
}

/// Writes and reads the fields of one structured property type.
pub trait ObjectSerializer: Send + Sync {
    fn write(&self, ctx: &ValueContext<'_>, writer: &mut BitWriter, value: &ObjectValue)
        -> ValueResult<()>;

    fn read(
        &self,
        ctx: &ValueContext<'_>,
        reader: &mut BitReader<'_>,
        type_id: u16,
    ) -> ValueResult<ObjectValue>;
}

/// Serializer for objects laid out as an ordered list of typed fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldListSerializer {
    fields: Vec<ValueType>,
}

impl FieldListSerializer {
    #[must_use]
    pub fn new(fields: Vec<ValueType>) -> Self {
        Self { fields }
    }

    #[must_use]
    pub fn fields(&self) -> &[ValueType] {
        &self.fields
    }
}

impl ObjectSerializer for FieldListSerializer {
    fn write(
        &self,
        ctx: &ValueContext<'_>,
        writer: &mut BitWriter,
        value: &ObjectValue,
    ) -> ValueResult<()> {
        if value.fields.len() != self.fields.len() {
            return Err(ValueError::FieldCount {
                type_id: value.type_id,
                expected: self.fields.len(),
                found: value.fields.len(),
            });
        }
        for (ty, field) in self.fields.iter().zip(&value.fields) {
            if field.value_type() != *ty {
                return Err(ValueError::TypeMismatch {
                    expected: *ty,
                    found: field.value_type(),
                });
            }
            ctx.write(writer, field)?;
        }
        Ok(())
    }

    fn read(
        &self,
        ctx: &ValueContext<'_>,
        reader: &mut BitReader<'_>,
        type_id: u16,
    ) -> ValueResult<ObjectValue> {
        let fields = self
            .fields
            .iter()
            .map(|ty| ctx.read(reader, *ty))
            .collect::<ValueResult<Vec<_>>>()?;
        Ok(ObjectValue::new(type_id, fields))
    }
}

/// Object serializers keyed by object type id.
#[derive(Default)]
pub struct SerializerRegistry {
    serializers: HashMap<u16, Box<dyn ObjectSerializer>>,
}

impl fmt::Debug for SerializerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut ids: Vec<_> = self.serializers.keys().copied().collect();
        ids.sort_unstable();
        f.debug_struct("SerializerRegistry")
            .field("type_ids", &ids)
            .finish()
    }
}

impl SerializerRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a serializer, replacing any previous one for `type_id`.
    pub fn register(&mut self, type_id: u16, serializer: impl ObjectSerializer + 'static) {
        self.serializers.insert(type_id, Box::new(serializer));
    }

    /// Registers a [`FieldListSerializer`] for `type_id`.
    pub fn register_fields(&mut self, type_id: u16, fields: Vec<ValueType>) {
        self.register(type_id, FieldListSerializer::new(fields));
    }

    #[must_use]
    pub fn contains(&self, type_id: u16) -> bool {
        self.serializers.contains_key(&type_id)
    }

    fn get(&self, type_id: u16) -> ValueResult<&dyn ObjectSerializer> {
        self.serializers
            .get(&type_id)
            .map(AsRef::as_ref)
            .ok_or(ValueError::NoSerializer { type_id })
    }
}

/// Registry, limits and nesting depth for one encode/decode pass.
#[derive(Debug, Clone, Copy)]
pub struct ValueContext<'a> {
    registry: &'a SerializerRegistry,
    limits: ValueLimits,
    depth: u8,
}

impl<'a> ValueContext<'a> {
    #[must_use]
    pub fn new(registry: &'a SerializerRegistry, limits: ValueLimits) -> Self {
        Self {
            registry,
            limits,
            depth: 0,
        }
    }

    #[must_use]
    pub const fn limits(&self) -> ValueLimits {
        self.limits
    }

    /// Writes `value` in its fixed layout.
    pub fn write(&self, writer: &mut BitWriter, value: &Value) -> ValueResult<()> {
        match value {
            Value::Nil => {
                return Err(ValueError::UnsupportedType { ty: ValueType::Nil });
            }
            Value::Bool(v) => writer.write_bool_aligned(*v)?,
            Value::U8(v) => writer.write_u8_aligned(*v)?,
            Value::U16(v) => writer.write_u16_aligned(*v)?,
            Value::U32(v) => writer.write_u32_aligned(*v)?,
            Value::U64(v) => writer.write_u64_aligned(*v)?,
            Value::I8(v) => writer.write_i8_aligned(*v)?,
            Value::I16(v) => writer.write_i16_aligned(*v)?,
            Value::I32(v) => writer.write_i32_aligned(*v)?,
            Value::I64(v) => writer.write_i64_aligned(*v)?,
            Value::F32(v) => writer.write_f32_aligned(*v)?,
            Value::F64(v) => writer.write_f64_aligned(*v)?,
            Value::String(v) => writer.write_str_aligned(v)?,
            Value::Vec3(v) => write_vec3(writer, *v)?,
            Value::Quat(v) => write_quat(writer, *v)?,
            Value::Pose(v) => {
                write_vec3(writer, v.position)?;
                write_quat(writer, v.rotation)?;
            }
            Value::Bytes(v) => writer.write_bytes_aligned(v)?,
            Value::IntArray(v) => writer.write_i32_array_aligned(v)?,
            Value::Object(obj) => {
                let nested = self.nested()?;
                self.registry.get(obj.type_id)?.write(&nested, writer, obj)?;
            }
        }
        Ok(())
    }

    /// Reads a value of type `ty`.
    pub fn read(&self, reader: &mut BitReader<'_>, ty: ValueType) -> ValueResult<Value> {
        let value = match ty {
            ValueType::Nil => return Err(ValueError::UnsupportedType { ty }),
            ValueType::Bool => Value::Bool(reader.read_bool_aligned()?),
            ValueType::U8 => Value::U8(reader.read_u8_aligned()?),
            ValueType::U16 => Value::U16(reader.read_u16_aligned()?),
            ValueType::U32 => Value::U32(reader.read_u32_aligned()?),
            ValueType::U64 => Value::U64(reader.read_u64_aligned()?),
            ValueType::I8 => Value::I8(reader.read_i8_aligned()?),
            ValueType::I16 => Value::I16(reader.read_i16_aligned()?),
            ValueType::I32 => Value::I32(reader.read_i32_aligned()?),
            ValueType::I64 => Value::I64(reader.read_i64_aligned()?),
            ValueType::F32 => Value::F32(reader.read_f32_aligned()?),
            ValueType::F64 => Value::F64(reader.read_f64_aligned()?),
            ValueType::String => {
                Value::String(reader.read_string_aligned(self.limits.max_string_len)?)
            }
            ValueType::Vec3 => Value::Vec3(read_vec3(reader)?),
            ValueType::Quat => Value::Quat(read_quat(reader)?),
            ValueType::Pose => {
                let position = read_vec3(reader)?;
                let rotation = read_quat(reader)?;
                Value::Pose(Pose::new(position, rotation))
            }
            ValueType::Bytes => Value::Bytes(reader.read_bytes_aligned(self.limits.max_array_len)?),
            ValueType::IntArray => {
                Value::IntArray(reader.read_i32_array_aligned(self.limits.max_array_len)?)
            }
            ValueType::Object { type_id } => {
                let nested = self.nested()?;
                Value::Object(self.registry.get(type_id)?.read(&nested, reader, type_id)?)
            }
        };
        Ok(value)
    }

    fn nested(&self) -> ValueResult<Self> {
        if self.depth >= MAX_OBJECT_DEPTH {
            return Err(ValueError::DepthExceeded {
                max: MAX_OBJECT_DEPTH,
            });
        }
        Ok(Self {
            depth: self.depth + 1,
            ..*self
        })
    }
}

/// Writes `value` with a fresh context over `registry`.
pub fn write_value(
    writer: &mut BitWriter,
    value: &Value,
    registry: &SerializerRegistry,
) -> ValueResult<()> {
    ValueContext::new(registry, ValueLimits::default()).write(writer, value)
}

/// Reads a value of type `ty` with a fresh context over `registry`.
pub fn read_value(
    reader: &mut BitReader<'_>,
    ty: ValueType,
    registry: &SerializerRegistry,
    limits: ValueLimits,
) -> ValueResult<Value> {
    ValueContext::new(registry, limits).read(reader, ty)
}

fn write_vec3(writer: &mut BitWriter, v: Vec3) -> ValueResult<()> {
    for c in v.to_array() {
        writer.write_f32_aligned(c)?;
    }
    Ok(())
}

fn write_quat(writer: &mut BitWriter, q: Quat) -> ValueResult<()> {
    for c in q.to_array() {
        writer.write_f32_aligned(c)?;
    }
    Ok(())
}

fn read_vec3(reader: &mut BitReader<'_>) -> ValueResult<Vec3> {
    Ok(Vec3::new(
        reader.read_f32_aligned()?,
        reader.read_f32_aligned()?,
        reader.read_f32_aligned()?,
    ))
}

fn read_quat(reader: &mut BitReader<'_>) -> ValueResult<Quat> {
    Ok(Quat::new(
        reader.read_f32_aligned()?,
        reader.read_f32_aligned()?,
        reader.read_f32_aligned()?,
        reader.read_f32_aligned()?,
    ))
}
