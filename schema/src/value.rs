//! Replicated value model.

use std::fmt;

use crate::math::{Pose, Quat, Vec3};

/// Type tag of a replicated property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ValueType {
    /// Placeholder type with no wire representation.
    Nil,
    Bool,
    U8,
    U16,
    U32,
    U64,
    I8,
    I16,
    I32,
    I64,
    F32,
    F64,
    /// UTF-8 string with a `u16` length prefix.
    String,
    Vec3,
    Quat,
    /// Position plus orientation. Inside tick messages this goes through the pose codec.
    Pose,
    /// Byte array with a `u16` length prefix.
    Bytes,
    /// `i32` array with a `u16` count prefix.
    IntArray,
    /// Structured value written by the serializer registered for `type_id`.
    Object { type_id: u16 },
}

impl ValueType {
    /// Fixed wire size in bytes, or `None` for length-prefixed and object types.
    #[must_use]
    pub const fn fixed_size(self) -> Option<usize> {
        match self {
            Self::Bool | Self::U8 | Self::I8 => Some(1),
            Self::U16 | Self::I16 => Some(2),
            Self::U32 | Self::I32 | Self::F32 => Some(4),
            Self::U64 | Self::I64 | Self::F64 => Some(8),
            Self::Vec3 => Some(12),
            Self::Quat => Some(16),
            Self::Pose => Some(28),
            Self::Nil | Self::String | Self::Bytes | Self::IntArray | Self::Object { .. } => None,
        }
    }

    /// Returns `true` for integer and floating point scalars.
    #[must_use]
    pub const fn is_numeric(self) -> bool {
        matches!(
            self,
            Self::U8
                | Self::U16
                | Self::U32
                | Self::U64
                | Self::I8
                | Self::I16
                | Self::I32
                | Self::I64
                | Self::F32
                | Self::F64
        )
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Nil => "nil",
            Self::Bool => "bool",
            Self::U8 => "u8",
            Self::U16 => "u16",
            Self::U32 => "u32",
            Self::U64 => "u64",
            Self::I8 => "i8",
            Self::I16 => "i16",
            Self::I32 => "i32",
            Self::I64 => "i64",
            Self::F32 => "f32",
            Self::F64 => "f64",
            Self::String => "string",
            Self::Vec3 => "vec3",
            Self::Quat => "quat",
            Self::Pose => "pose",
            Self::Bytes => "bytes",
            Self::IntArray => "int-array",
            Self::Object { type_id } => return write!(f, "object({type_id})"),
        };
        f.write_str(name)
    }
}

/// Field values of a structured property.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ObjectValue {
    pub type_id: u16,
    pub fields: Vec<Value>,
}

impl ObjectValue {
    #[must_use]
    pub fn new(type_id: u16, fields: Vec<Value>) -> Self {
        Self { type_id, fields }
    }
}

/// A replicated property value.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Nil,
    Bool(bool),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
    String(String),
    Vec3(Vec3),
    Quat(Quat),
    Pose(Pose),
    Bytes(Vec<u8>),
    IntArray(Vec<i32>),
    Object(ObjectValue),
}

impl Value {
    /// Type tag of this value.
    #[must_use]
    pub fn value_type(&self) -> ValueType {
        match self {
            Self::Nil => ValueType::Nil,
            Self::Bool(_) => ValueType::Bool,
            Self::U8(_) => ValueType::U8,
            Self::U16(_) => ValueType::U16,
            Self::U32(_) => ValueType::U32,
            Self::U64(_) => ValueType::U64,
            Self::I8(_) => ValueType::I8,
            Self::I16(_) => ValueType::I16,
            Self::I32(_) => ValueType::I32,
            Self::I64(_) => ValueType::I64,
            Self::F32(_) => ValueType::F32,
            Self::F64(_) => ValueType::F64,
            Self::String(_) => ValueType::String,
            Self::Vec3(_) => ValueType::Vec3,
            Self::Quat(_) => ValueType::Quat,
            Self::Pose(_) => ValueType::Pose,
            Self::Bytes(_) => ValueType::Bytes,
            Self::IntArray(_) => ValueType::IntArray,
            Self::Object(obj) => ValueType::Object {
                type_id: obj.type_id,
            },
        }
    }

    /// Zero value for a type, used to seed caches before the first update.
    #[must_use]
    pub fn default_for(ty: ValueType) -> Self {
        match ty {
            ValueType::Nil => Self::Nil,
            ValueType::Bool => Self::Bool(false),
            ValueType::U8 => Self::U8(0),
            ValueType::U16 => Self::U16(0),
            ValueType::U32 => Self::U32(0),
            ValueType::U64 => Self::U64(0),
            ValueType::I8 => Self::I8(0),
            ValueType::I16 => Self::I16(0),
            ValueType::I32 => Self::I32(0),
            ValueType::I64 => Self::I64(0),
            ValueType::F32 => Self::F32(0.0),
            ValueType::F64 => Self::F64(0.0),
            ValueType::String => Self::String(String::new()),
            ValueType::Vec3 => Self::Vec3(Vec3::ZERO),
            ValueType::Quat => Self::Quat(Quat::IDENTITY),
            ValueType::Pose => Self::Pose(Pose::default()),
            ValueType::Bytes => Self::Bytes(Vec::new()),
            ValueType::IntArray => Self::IntArray(Vec::new()),
            ValueType::Object { type_id } => Self::Object(ObjectValue::new(type_id, Vec::new())),
        }
    }

    /// Numeric scalars widened to `f64`; `None` for every other type.
    #[allow(clippy::cast_precision_loss)]
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Self::U8(v) => Some(f64::from(v)),
            Self::U16(v) => Some(f64::from(v)),
            Self::U32(v) => Some(f64::from(v)),
            Self::U64(v) => Some(v as f64),
            Self::I8(v) => Some(f64::from(v)),
            Self::I16(v) => Some(f64::from(v)),
            Self::I32(v) => Some(f64::from(v)),
            Self::I64(v) => Some(v as f64),
            Self::F32(v) => Some(f64::from(v)),
            Self::F64(v) => Some(v),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::I32(v)
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Self::U32(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Self::F32(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::String(v.to_owned())
    }
}

impl From<Vec3> for Value {
    fn from(v: Vec3) -> Self {
        Self::Vec3(v)
    }
}

impl From<Quat> for Value {
    fn from(v: Quat) -> Self {
        Self::Quat(v)
    }
}

impl From<Pose> for Value {
    fn from(v: Pose) -> Self {
        Self::Pose(v)
    }
}
