//! Per-entity property payloads.
//!
//! Properties selected by a mask are written back to back in ascending index
//! order. Non-pose values go through the typed value codec; pose values are
//! handed to a caller-supplied pose writer/reader so the caller can pick the
//! keyframe or delta form per receiver.

use bitstream::{BitReader, BitWriter};
use log::warn;
use schema::{EntityTypeDef, Pose, PropertyDef, PropertyIndex, Value, ValueContext, ValueType};

use crate::error::{CodecError, CodecResult};

/// Entity values stored in the order of the type's property table.
pub fn check_values(ty: &EntityTypeDef, values: &[Value]) -> CodecResult<()> {
    if values.len() != ty.properties.len() {
        return Err(CodecError::ValueCount {
            entity_type: ty.id,
            expected: ty.properties.len(),
            found: values.len(),
        });
    }
    Ok(())
}

/// Drops mask bits whose stored value does not match the declared type.
///
/// Mismatches are logged and skipped so the rest of the entity still goes out.
#[must_use]
pub fn writable_mask(ty: &EntityTypeDef, values: &[Value], mask: u64) -> u64 {
    let mut out = mask & ty.full_mask();
    for (def, value) in ty.properties.iter().zip(values) {
        if out & def.bit() != 0 && value.value_type() != def.ty {
            warn!(
                "entity type {} property {} ({}) holds {}, skipping",
                ty.id,
                def.index,
                def.ty,
                value.value_type()
            );
            out &= !def.bit();
        }
    }
    out
}

/// Writes the properties in `mask`.
///
/// `write_pose` is called for every pose property in place of the value codec.
pub fn encode_properties<F>(
    writer: &mut BitWriter,
    ctx: &ValueContext<'_>,
    ty: &EntityTypeDef,
    mask: u64,
    values: &[Value],
    mut write_pose: F,
) -> CodecResult<()>
where
    F: FnMut(&PropertyDef, &mut BitWriter) -> CodecResult<()>,
{
    check_values(ty, values)?;
    check_mask(ty, mask)?;
    for (def, value) in ty.properties.iter().zip(values) {
        if mask & def.bit() == 0 {
            continue;
        }
        if value.value_type() != def.ty {
            return Err(CodecError::TypeMismatch {
                index: def.index,
                expected: def.ty,
                found: value.value_type(),
            });
        }
        if def.ty == ValueType::Pose {
            write_pose(def, writer)?;
        } else {
            ctx.write(writer, value)?;
        }
    }
    Ok(())
}

/// Reads the properties in `mask`, returning `(index, value)` pairs in wire order.
pub fn decode_properties<F>(
    reader: &mut BitReader<'_>,
    ctx: &ValueContext<'_>,
    ty: &EntityTypeDef,
    mask: u64,
    mut read_pose: F,
) -> CodecResult<Vec<(PropertyIndex, Value)>>
where
    F: FnMut(&PropertyDef, &mut BitReader<'_>) -> CodecResult<Pose>,
{
    check_mask(ty, mask)?;
    let mut out = Vec::with_capacity(mask.count_ones() as usize);
    for def in ty.iter_mask(mask) {
        let value = if def.ty == ValueType::Pose {
            Value::Pose(read_pose(def, reader)?)
        } else {
            ctx.read(reader, def.ty)?
        };
        out.push((def.index, value));
    }
    Ok(out)
}

/// [`encode_properties`] with poses written as plain values.
pub fn encode_properties_plain(
    writer: &mut BitWriter,
    ctx: &ValueContext<'_>,
    ty: &EntityTypeDef,
    mask: u64,
    values: &[Value],
) -> CodecResult<()> {
    encode_properties(writer, ctx, ty, mask, values, |def, writer| {
        let pos = ty
            .properties
            .iter()
            .position(|p| p.index == def.index)
            .ok_or(CodecError::UnknownProperties {
                entity_type: ty.id,
                unknown: def.bit(),
            })?;
        ctx.write(writer, &values[pos])?;
        Ok(())
    })
}

/// [`decode_properties`] with poses read as plain values.
pub fn decode_properties_plain(
    reader: &mut BitReader<'_>,
    ctx: &ValueContext<'_>,
    ty: &EntityTypeDef,
    mask: u64,
) -> CodecResult<Vec<(PropertyIndex, Value)>> {
    decode_properties(reader, ctx, ty, mask, |def, reader| {
        expect_pose(def, ctx.read(reader, ValueType::Pose)?)
    })
}

fn expect_pose(def: &PropertyDef, value: Value) -> CodecResult<Pose> {
    match value {
        Value::Pose(pose) => Ok(pose),
        other => Err(CodecError::TypeMismatch {
            index: def.index,
            expected: ValueType::Pose,
            found: other.value_type(),
        }),
    }
}

fn check_mask(ty: &EntityTypeDef, mask: u64) -> CodecResult<()> {
    let unknown = mask & !ty.full_mask();
    if unknown != 0 {
        return Err(CodecError::UnknownProperties {
            entity_type: ty.id,
            unknown,
        });
    }
    Ok(())
}
