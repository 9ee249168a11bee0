//! Position + orientation compression with keyframe/delta alternation.
//!
//! A keyframe carries the absolute position in fixed point (`i32` per axis,
//! scaled by [`PoseConfig::position_scale`]) and a smallest-three rotation. It
//! becomes the *reference*. A delta carries only the offset from that reference:
//! `i16` per changed axis and an optional standard-precision rotation offset.
//! Since deltas are measured against the reference rather than against the
//! previous delta, movement that is not flushed on one tick is still contained
//! in the next tick's delta, and a lost delta never corrupts later ones.
//!
//! Header byte:
//!
//! ```text
//! bits 0-1  change type: 0 none, 1 delta, 2 keyframe
//! bits 2-4  x/y/z delta present
//! bit  5    rotation delta present
//! bit  6    keyframe rotation is high precision
//! bit  7    reserved (zero)
//! ```
//!
//! A keyframe may be followed by delta fields. That form re-sends the current
//! reference plus the current offset to an observer that has not confirmed the
//! reference yet.

use bitstream::{BitReader, BitWriter};
use log::warn;
use schema::{Pose, Quat, Vec3};
use wire::Tick;

use crate::error::{CodecError, CodecResult};
use crate::quat::{pack_quat, read_quat, unpack_quat, write_packed, QuatPrecision};

const CHANGE_MASK: u8 = 0b11;
const CHANGE_NONE: u8 = 0;
const CHANGE_DELTA: u8 = 1;
const CHANGE_KEYFRAME: u8 = 2;
const AXIS_SHIFT: u8 = 2;
const ROTATION_BIT: u8 = 1 << 5;
const HIGH_RES_BIT: u8 = 1 << 6;
const RESERVED_BIT: u8 = 1 << 7;

/// Rotation offsets closer to identity than this are not sent.
const ROTATION_EPSILON: f32 = 1e-6;

/// Pose compression settings.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct PoseConfig {
    /// Fixed-point units per world unit (10.0 gives 0.1 resolution).
    pub position_scale: f32,
    /// Ticks between scheduled keyframes; 0 disables the schedule.
    pub keyframe_interval: u32,
    /// Distance from the reference that forces a keyframe.
    pub keyframe_distance: f32,
    /// Rotation away from the reference that forces a keyframe.
    pub keyframe_angle_degrees: f32,
    /// Offset each encoder's schedule by a random phase.
    pub random_phase: bool,
}

impl Default for PoseConfig {
    fn default() -> Self {
        Self {
            position_scale: 10.0,
            keyframe_interval: 30,
            keyframe_distance: 8.0,
            keyframe_angle_degrees: 18.0,
            random_phase: true,
        }
    }
}

impl PoseConfig {
    /// Deterministic settings for tests.
    #[must_use]
    pub fn for_testing() -> Self {
        Self {
            random_phase: false,
            ..Self::default()
        }
    }

    /// `|dot(reference, current)|` below this forces a keyframe.
    #[must_use]
    pub fn rotation_threshold(&self) -> f32 {
        (self.keyframe_angle_degrees.to_radians() * 0.5).cos()
    }

    fn phase(&self) -> u32 {
        if self.random_phase && self.keyframe_interval > 0 {
            fastrand::u32(0..self.keyframe_interval)
        } else {
            0
        }
    }
}

/// How a pose is written for one receiver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoseWrite {
    /// The shared plan for this tick: a new keyframe or a delta.
    Planned,
    /// Reference keyframe plus the current offset, for receivers that lack the reference.
    CatchUp,
    /// Absolute high-precision keyframe for the owning peer.
    Owner,
}

/// Reference pose in the form observers reconstruct it.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Reference {
    position: [i32; 3],
    rotation: Quat,
    packed_rotation: u64,
}

impl Reference {
    fn capture(pose: &Pose, scale: f32) -> Self {
        let packed_rotation = pack_quat(pose.rotation, QuatPrecision::Standard);
        Self {
            position: fixed_position(pose.position, scale),
            rotation: unpack_quat(packed_rotation, QuatPrecision::Standard),
            packed_rotation,
        }
    }
}

/// Offset of the current pose from the reference.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
struct Offset {
    axes: [Option<i16>; 3],
    rotation: Option<u64>,
}

impl Offset {
    fn is_empty(&self) -> bool {
        self.axes.iter().all(Option::is_none) && self.rotation.is_none()
    }

    fn header_bits(&self) -> u8 {
        let mut bits = 0;
        for (axis, value) in self.axes.iter().enumerate() {
            if value.is_some() {
                bits |= 1 << (AXIS_SHIFT + axis as u8);
            }
        }
        if self.rotation.is_some() {
            bits |= ROTATION_BIT;
        }
        bits
    }

    fn write(&self, writer: &mut BitWriter) -> CodecResult<()> {
        for value in self.axes.iter().flatten() {
            writer.write_i16_aligned(*value)?;
        }
        if let Some(packed) = self.rotation {
            write_packed(writer, packed, QuatPrecision::Standard)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Plan {
    tick: Tick,
    current: Pose,
    /// Set when this tick re-keys; becomes the reference on commit.
    keyframe: Option<Reference>,
    offset: Offset,
}

/// Authority-side encoder for one pose property of one entity.
#[derive(Debug, Clone, PartialEq)]
pub struct PoseEncoder {
    reference: Option<Reference>,
    generation: u32,
    phase: u32,
    rekey_pending: bool,
    plan: Option<Plan>,
}

impl PoseEncoder {
    /// Creates an encoder with a schedule phase drawn from `config`.
    #[must_use]
    pub fn new(config: &PoseConfig) -> Self {
        Self::with_phase(config.phase())
    }

    #[must_use]
    pub const fn with_phase(phase: u32) -> Self {
        Self {
            reference: None,
            generation: 0,
            phase,
            rekey_pending: false,
            plan: None,
        }
    }

    #[must_use]
    pub const fn phase(&self) -> u32 {
        self.phase
    }

    /// Generation of the committed reference; bumps on every committed keyframe.
    #[must_use]
    pub const fn generation(&self) -> u32 {
        self.generation
    }

    /// Generation a receiver holds after this tick's write.
    #[must_use]
    pub fn planned_generation(&self) -> u32 {
        match self.plan {
            Some(Plan {
                keyframe: Some(_), ..
            }) => self.generation.wrapping_add(1),
            _ => self.generation,
        }
    }

    /// Returns `true` if this tick's plan is a new keyframe.
    #[must_use]
    pub fn plans_keyframe(&self) -> bool {
        self.plan.is_some_and(|p| p.keyframe.is_some())
    }

    /// Decides keyframe or delta for `tick`. Call once per tick before writing.
    pub fn plan(&mut self, tick: Tick, current: Pose, config: &PoseConfig) {
        let keyframe = match &self.reference {
            None => true,
            Some(reference) => self.rekey_pending || self.keyframe_due(tick, reference, &current, config),
        };
        let (keyframe, offset) = if keyframe {
            (Some(Reference::capture(&current, config.position_scale)), Offset::default())
        } else {
            let offset = self
                .reference
                .as_ref()
                .map(|r| offset_from(r, &current, config.position_scale))
                .unwrap_or_default();
            (None, offset)
        };
        self.plan = Some(Plan {
            tick,
            current,
            keyframe,
            offset,
        });
    }

    /// Writes this tick's plan in the requested form.
    pub fn write(&self, writer: &mut BitWriter, mode: PoseWrite, config: &PoseConfig) -> CodecResult<()> {
        let Some(plan) = self.plan.as_ref() else {
            writer.write_u8_aligned(CHANGE_NONE)?;
            return Ok(());
        };
        match mode {
            PoseWrite::Owner => {
                let position = fixed_position(plan.current.position, config.position_scale);
                let rotation = pack_quat(plan.current.rotation, QuatPrecision::High);
                write_keyframe(writer, position, rotation, QuatPrecision::High, &Offset::default())
            }
            PoseWrite::Planned | PoseWrite::CatchUp => {
                if let Some(reference) = plan.keyframe.as_ref().or(self.reference.as_ref()) {
                    if plan.keyframe.is_some() || mode == PoseWrite::CatchUp {
                        return write_keyframe(
                            writer,
                            reference.position,
                            reference.packed_rotation,
                            QuatPrecision::Standard,
                            &plan.offset,
                        );
                    }
                }
                if plan.offset.is_empty() {
                    writer.write_u8_aligned(CHANGE_NONE)?;
                } else {
                    writer.write_u8_aligned(CHANGE_DELTA | plan.offset.header_bits())?;
                    plan.offset.write(writer)?;
                }
                Ok(())
            }
        }
    }

    /// Completes the tick. `delivered` is `true` when at least one non-owning
    /// receiver was sent this tick's plan; otherwise a planned keyframe stays pending.
    pub fn commit(&mut self, delivered: bool) {
        let Some(plan) = self.plan.take() else {
            return;
        };
        if let Some(keyframe) = plan.keyframe {
            if delivered {
                self.reference = Some(keyframe);
                self.generation = self.generation.wrapping_add(1);
                self.rekey_pending = false;
            } else {
                self.rekey_pending = true;
            }
        }
    }

    fn keyframe_due(&self, tick: Tick, reference: &Reference, current: &Pose, config: &PoseConfig) -> bool {
        if config.keyframe_interval > 0
            && tick.raw().wrapping_add(self.phase) % config.keyframe_interval == 0
        {
            return true;
        }
        let ref_position = float_position(reference.position, config.position_scale);
        let limit = config.keyframe_distance;
        if current.position.distance_sq(ref_position) > limit * limit {
            return true;
        }
        reference.rotation.dot(current.rotation.normalize()).abs() < config.rotation_threshold()
    }
}

/// Observer-side decoder for one pose property of one entity.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PoseDecoder {
    base: Option<([i32; 3], Quat)>,
}

impl PoseDecoder {
    #[must_use]
    pub const fn new() -> Self {
        Self { base: None }
    }

    /// Returns `true` once a keyframe has been received.
    #[must_use]
    pub const fn has_reference(&self) -> bool {
        self.base.is_some()
    }

    /// Reads one pose payload and returns the reconstructed pose.
    ///
    /// A delta without a prior keyframe is applied to the origin so the stream
    /// stays aligned.
    pub fn read(&mut self, reader: &mut BitReader<'_>, config: &PoseConfig) -> CodecResult<Pose> {
        let header = reader.read_u8_aligned()?;
        if header & RESERVED_BIT != 0 {
            return Err(CodecError::InvalidPoseHeader { header });
        }
        let change = header & CHANGE_MASK;
        match change {
            CHANGE_NONE => {
                if header != CHANGE_NONE {
                    return Err(CodecError::InvalidPoseHeader { header });
                }
            }
            CHANGE_KEYFRAME => {
                let mut position = [0i32; 3];
                for axis in &mut position {
                    *axis = reader.read_i32_aligned()?;
                }
                let precision = if header & HIGH_RES_BIT != 0 {
                    QuatPrecision::High
                } else {
                    QuatPrecision::Standard
                };
                let rotation = read_quat(reader, precision)?;
                self.base = Some((position, rotation));
            }
            CHANGE_DELTA => {
                if header & HIGH_RES_BIT != 0 {
                    return Err(CodecError::InvalidPoseHeader { header });
                }
            }
            _ => return Err(CodecError::InvalidPoseHeader { header }),
        }

        let (mut position, mut rotation) = self.base.unwrap_or(([0; 3], Quat::IDENTITY));
        for (axis, value) in position.iter_mut().enumerate() {
            if header & (1 << (AXIS_SHIFT + axis as u8)) != 0 {
                *value = value.saturating_add(i32::from(reader.read_i16_aligned()?));
            }
        }
        if header & ROTATION_BIT != 0 {
            let offset = read_quat(reader, QuatPrecision::Standard)?;
            rotation = (rotation * offset).normalize();
        }
        Ok(Pose::new(float_position(position, config.position_scale), rotation))
    }

    /// Forgets the reference, e.g. when the entity's local id is released.
    pub fn reset(&mut self) {
        self.base = None;
    }
}

fn write_keyframe(
    writer: &mut BitWriter,
    position: [i32; 3],
    packed_rotation: u64,
    precision: QuatPrecision,
    offset: &Offset,
) -> CodecResult<()> {
    let mut header = CHANGE_KEYFRAME | offset.header_bits();
    if precision == QuatPrecision::High {
        header |= HIGH_RES_BIT;
    }
    writer.write_u8_aligned(header)?;
    for axis in position {
        writer.write_i32_aligned(axis)?;
    }
    write_packed(writer, packed_rotation, precision)?;
    offset.write(writer)
}

fn offset_from(reference: &Reference, current: &Pose, scale: f32) -> Offset {
    let target = fixed_position(current.position, scale);
    let mut axes = [None; 3];
    for (axis, slot) in axes.iter_mut().enumerate() {
        let delta = i64::from(target[axis]) - i64::from(reference.position[axis]);
        if delta != 0 {
            *slot = Some(clamp_i16(delta, axis));
        }
    }
    let rotation = current.rotation.normalize();
    let relative = (reference.rotation.conjugate() * rotation).normalize();
    let rotation = if relative.w.abs() < 1.0 - ROTATION_EPSILON {
        Some(pack_quat(relative, QuatPrecision::Standard))
    } else {
        None
    };
    Offset { axes, rotation }
}

fn clamp_i16(delta: i64, axis: usize) -> i16 {
    i16::try_from(delta).unwrap_or_else(|_| {
        warn!("pose delta {delta} on axis {axis} exceeds i16 range, clamping");
        if delta < 0 {
            i16::MIN
        } else {
            i16::MAX
        }
    })
}

#[allow(clippy::cast_possible_truncation)]
fn fixed_position(position: Vec3, scale: f32) -> [i32; 3] {
    position.to_array().map(|v| {
        let q = (f64::from(v) * f64::from(scale)).round();
        if q > f64::from(i32::MAX) || q < f64::from(i32::MIN) || q.is_nan() {
            warn!("pose coordinate {v} exceeds fixed-point range, clamping");
            if q.is_nan() {
                0
            } else if q < 0.0 {
                i32::MIN
            } else {
                i32::MAX
            }
        } else {
            q as i32
        }
    })
}

#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
fn float_position(position: [i32; 3], scale: f32) -> Vec3 {
    let scale = f64::from(scale);
    let [x, y, z] = position.map(|v| (f64::from(v) / scale) as f32);
    Vec3::new(x, y, z)
}
