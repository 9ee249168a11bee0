//! Demo world: ships flying in circles, each towing a cargo pod.

use std::sync::Arc;

use anyhow::{Context, Result};
use runtime::{Authority, EntityId, PeerId};
use schema::{EntityTypeDef, LerpPolicy, Pose, PropertyDef, Quat, Schema, Value, ValueType, Vec3};

pub const SHIP: u16 = 1;
pub const POD: u16 = 2;

pub const SHIP_POSE: u8 = 0;
pub const SHIP_HULL: u8 = 1;
pub const SHIP_THROTTLE: u8 = 2;
pub const SHIP_CALLSIGN: u8 = 3;
pub const POD_CRATES: u8 = 0;

/// Units per second at full throttle.
const TOP_SPEED: f32 = 12.0;
/// Radians per second.
const TURN_RATE: f32 = 0.6;

pub fn demo_schema() -> Result<Arc<Schema>> {
    let schema = Schema::builder()
        .entity(
            EntityTypeDef::new(SHIP, "ship")
                .property(PropertyDef::new(SHIP_POSE, "pose", ValueType::Pose).lerp(LerpPolicy::Smooth))
                .property(PropertyDef::new(SHIP_HULL, "hull", ValueType::I32).notify())
                .property(PropertyDef::new(SHIP_THROTTLE, "throttle", ValueType::F32).predicted(0.01))
                .property(PropertyDef::new(SHIP_CALLSIGN, "callsign", ValueType::String).interest(0b10)),
        )
        .entity(
            EntityTypeDef::new(POD, "pod")
                .property(PropertyDef::new(POD_CRATES, "crates", ValueType::U8).interest(0b01)),
        )
        .build()
        .context("build demo schema")?;
    Ok(Arc::new(schema))
}

/// Authority-side bookkeeping for one ship.
#[derive(Debug, Clone)]
pub struct Ship {
    pub id: EntityId,
    pub pod: EntityId,
    pub pilot: Option<PeerId>,
    heading: f32,
}

/// Spawns a ship with its pod. Piloted ships are owned by `pilot`.
pub fn launch(auth: &mut Authority, pilot: Option<PeerId>, slot: u32, rng: &mut fastrand::Rng) -> Result<Ship> {
    let id = auth.spawn(SHIP)?;
    let pod = auth.spawn_child(POD, id)?;
    #[allow(clippy::cast_precision_loss)]
    let ring = slot as f32 * 20.0;
    let heading = rng.f32() * std::f32::consts::TAU;
    auth.set(id, SHIP_POSE, Value::Pose(pose_at(Vec3::new(ring, 0.0, 0.0), heading)))?;
    auth.set(id, SHIP_HULL, Value::I32(100))?;
    auth.set(id, SHIP_THROTTLE, Value::F32(0.5))?;
    auth.set(id, SHIP_CALLSIGN, Value::from(format!("ship-{slot}").as_str()))?;
    auth.set(pod, POD_CRATES, Value::U8(rng.u8(1..=20)))?;
    if pilot.is_some() {
        auth.set_owner(id, pilot)?;
    }
    Ok(Ship {
        id,
        pod,
        pilot,
        heading,
    })
}

impl Ship {
    /// Advances the ship by one tick at its current throttle.
    pub fn fly(&mut self, auth: &mut Authority, dt: f32, rng: &mut fastrand::Rng) -> Result<()> {
        let throttle = match auth.get(self.id, SHIP_THROTTLE)? {
            Value::F32(t) => t.clamp(0.0, 1.0),            _ => 0.0,
        };
        let position = match auth.get(self.id, SHIP_POSE)? {
            Value::Pose(pose) => pose.position,
            _ => Vec3::ZERO,
        };
        self.heading = (self.heading + TURN_RATE * dt) % std::f32::consts::TAU;
        let step = TOP_SPEED * throttle * dt;
        let forward = Vec3::new(self.heading.cos() * step, 0.0, self.heading.sin() * step);
        let next = Vec3::new(position.x + forward.x, position.y, position.z + forward.z);
        auth.set(self.id, SHIP_POSE, Value::Pose(pose_at(next, self.heading)))?;

        if rng.u8(..) < 3 {
            let hull = match auth.get(self.id, SHIP_HULL)? {
                Value::I32(hull) => *hull,
                _ => 0,
            };
            auth.set(self.id, SHIP_HULL, Value::I32((hull - 1).max(0)))?;
        }
        if self.pilot.is_none() && rng.u8(..) < 8 {
            auth.set(self.id, SHIP_THROTTLE, Value::F32(rng.f32()))?;
        }
        Ok(())
    }
}

fn pose_at(position: Vec3, heading: f32) -> Pose {
    Pose::new(position, Quat::from_axis_angle(Vec3::new(0.0, 1.0, 0.0), -heading))
}
