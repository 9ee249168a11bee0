#![allow(dead_code)]

use std::sync::Arc;

use runtime::{
    Authority, Channel, EntityId, LocalId, Observer, PeerId, RecordingHooks, RuntimeConfig,
    TickReport,
};
use schema::{EntityTypeDef, LerpPolicy, PropertyDef, Schema, Value, ValueType};

pub const SHIP: u16 = 1;
pub const BEACON: u16 = 2;

/// Ships carry a pose, hull points, a name visible to group 0b10 only and a
/// predicted throttle. Beacons are always visible.
pub fn schema() -> Arc<Schema> {
    Arc::new(
        Schema::builder()
            .entity(
                EntityTypeDef::new(SHIP, "ship")
                    .property(PropertyDef::new(0, "pose", ValueType::Pose).lerp(LerpPolicy::Smooth))
                    .property(PropertyDef::new(1, "hull", ValueType::I32).notify())
                    .property(PropertyDef::new(2, "name", ValueType::String).interest(0b10))
                    .property(PropertyDef::new(3, "throttle", ValueType::F32).predicted(0.05)),
            )
            .entity(
                EntityTypeDef::new(BEACON, "beacon")
                    .always_visible()
                    .property(PropertyDef::new(0, "charge", ValueType::U8).interest(0)),
            )
            .build()
            .expect("schema is valid"),
    )
}

/// Acks never time out unless a test wants them to.
pub fn patient_config() -> RuntimeConfig {
    RuntimeConfig::for_testing().with_ack_timeout_secs(1000)
}

pub struct Client {
    pub id: PeerId,
    pub observer: Observer,
    pub hooks: RecordingHooks,
}

impl Client {
    pub fn join(auth: &mut Authority, id: u32) -> Self {
        let id = PeerId(id);
        auth.add_peer(id).unwrap();
        Self {
            id,
            observer: Observer::new(auth.shared_schema(), auth.config().clone()).unwrap(),
            hooks: RecordingHooks::default(),
        }
    }

    /// Applies this client's messages from `report`. Release notices are
    /// reliable and always arrive; the tick state is dropped when
    /// `drop_state` is set. Returns the ack, if any.
    pub fn deliver(&mut self, report: &TickReport, drop_state: bool) -> Option<Vec<u8>> {
        for notice in report.messages_for(self.id, Channel::Spawn) {
            self.observer.receive_release(notice, &mut self.hooks).unwrap();
        }
        if drop_state {
            return None;
        }
        let bytes = report.messages_for(self.id, Channel::TickState).next()?;
        self.observer
            .receive(bytes, &mut self.hooks)
            .unwrap()
            .ack()
            .map(<[u8]>::to_vec)
    }

    /// Delivers and acknowledges without loss.
    pub fn sync(&mut self, auth: &mut Authority, report: &TickReport) {
        if let Some(ack) = self.deliver(report, false) {
            auth.acknowledge(self.id, &ack).unwrap();
        }
    }

    pub fn local(&self, auth: &Authority, entity: EntityId) -> Option<LocalId> {
        auth.peer(self.id)?.entities().local(entity)
    }

    pub fn value(&self, auth: &Authority, entity: EntityId, index: u8) -> Option<Value> {
        let local = self.local(auth, entity)?;
        self.observer.value(local, index).cloned()
    }
}

/// Poses match within fixed-point and standard rotation quantization.
pub fn assert_pose_close(expected: &Value, actual: &Value) {
    let (Value::Pose(a), Value::Pose(b)) = (expected, actual) else {
        panic!("not poses: {expected:?} / {actual:?}");
    };
    let distance = a.position.distance_sq(b.position).sqrt();
    assert!(distance <= 0.1, "position off by {distance}: {a:?} / {b:?}");
    let degrees = a.rotation.normalize().angle_to(b.rotation).to_degrees();
    assert!(degrees <= 1.0, "rotation off by {degrees} degrees");
}
