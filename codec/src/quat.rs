//! Smallest-three quaternion compression.
//!
//! A unit quaternion has one redundant component: given three, the fourth is
//! `sqrt(1 - a² - b² - c²)` up to sign. We drop the component with the largest
//! magnitude, flip the whole quaternion so that component is positive (`q` and
//! `-q` are the same rotation), and quantize the remaining three. Each of them
//! lies in `[-1/√2, 1/√2]` because the largest is at least as big.
//!
//! Layout: `[largest index: 2 bits][a: N][b: N][c: N]`, most significant first,
//! zero-padded to a whole byte on the wire. Codes run from 0 to `2^N - 2` so
//! that a zero component is exact.

use bitstream::{BitReader, BitWriter};
use schema::Quat;

use crate::error::CodecResult;

const RANGE: f32 = std::f32::consts::FRAC_1_SQRT_2;

/// Bits per quantized component.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuatPrecision {
    /// 10 bits per component, packed into 32 bits.
    Standard,
    /// 14 bits per component, packed into 44 bits (6 bytes on the wire).
    High,
}

impl QuatPrecision {
    #[must_use]
    pub const fn component_bits(self) -> u32 {
        match self {
            Self::Standard => 10,
            Self::High => 14,
        }
    }

    /// Total packed width in bits.
    #[must_use]
    pub const fn packed_bits(self) -> u8 {
        match self {
            Self::Standard => 32,
            Self::High => 44,
        }
    }

    /// Bytes used on the wire.
    #[must_use]
    pub const fn wire_bytes(self) -> usize {
        match self {
            Self::Standard => 4,
            Self::High => 6,
        }
    }

    /// Highest code used. Even, so that zero sits exactly on a code.
    const fn max_quantized(self) -> u32 {
        (1 << self.component_bits()) - 2
    }
}

/// Packs a rotation into its smallest-three representation.
#[must_use]
pub fn pack_quat(q: Quat, precision: QuatPrecision) -> u64 {
    let c = q.normalize().to_array();

    let mut largest = 0;
    for i in 1..4 {
        if c[i].abs() > c[largest].abs() {
            largest = i;
        }
    }
    let sign = if c[largest] < 0.0 { -1.0 } else { 1.0 };

    let bits = precision.component_bits();
    let max = precision.max_quantized();
    let mut packed = largest as u64;
    for (i, v) in c.iter().enumerate() {
        if i == largest {
            continue;
        }
        packed = (packed << bits) | u64::from(quantize(v * sign, max));
    }
    packed
}

/// Unpacks a smallest-three value into a unit quaternion.
#[must_use]
pub fn unpack_quat(packed: u64, precision: QuatPrecision) -> Quat {
    let bits = precision.component_bits();
    let max = precision.max_quantized();
    let field_mask = (1u64 << bits) - 1;
    let largest = ((packed >> (3 * bits)) & 0b11) as usize;

    let mut rest = [0.0f32; 3];
    for (slot, value) in rest.iter_mut().enumerate() {
        let shift = bits * (2 - slot as u32);
        // Truncation is fine: the mask keeps at most 14 bits.
        #[allow(clippy::cast_possible_truncation)]
        let q = ((packed >> shift) & field_mask) as u32;
        *value = dequantize(q, max);
    }

    let sum_sq: f32 = rest.iter().map(|v| v * v).sum();
    let omitted = (1.0 - sum_sq).max(0.0).sqrt();

    let mut out = [0.0f32; 4];
    let mut next = 0;
    for (i, slot) in out.iter_mut().enumerate() {
        if i == largest {
            *slot = omitted;
        } else {
            *slot = rest[next];
            next += 1;
        }
    }
    Quat::from_array(out).normalize()
}

/// Returns what an observer reconstructs after a pack/unpack cycle.
#[must_use]
pub fn quantize_quat(q: Quat, precision: QuatPrecision) -> Quat {
    unpack_quat(pack_quat(q, precision), precision)
}

/// Writes a packed rotation, most significant bit first, padded to the
/// next byte boundary (4 or 6 bytes).
pub fn write_quat(writer: &mut BitWriter, q: Quat, precision: QuatPrecision) -> CodecResult<()> {
    write_packed(writer, pack_quat(q, precision), precision)
}

pub(crate) fn write_packed(
    writer: &mut BitWriter,
    packed: u64,
    precision: QuatPrecision,
) -> CodecResult<()> {
    writer.write_bits(packed, precision.packed_bits())?;
    writer.align_to_byte();
    Ok(())
}

/// Reads a packed rotation written by [`write_quat`].
pub fn read_quat(reader: &mut BitReader<'_>, precision: QuatPrecision) -> CodecResult<Quat> {
    let packed = reader.read_bits(precision.packed_bits())?;
    reader.align_to_byte()?;
    Ok(unpack_quat(packed, precision))
}

#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
fn quantize(v: f32, max: u32) -> u32 {
    let t = ((v + RANGE) / (2.0 * RANGE)).clamp(0.0, 1.0);
    (t * max as f32).round() as u32
}

#[allow(clippy::cast_precision_loss)]
fn dequantize(q: u32, max: u32) -> f32 {
    (q as f32 / max as f32) * (2.0 * RANGE) - RANGE
}
