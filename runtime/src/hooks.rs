//! Observer-side callbacks.

use schema::{EntityTypeId, LerpPolicy, PropertyIndex, Value};
use wire::{LocalId, Tick};

/// Notifications raised while an observer applies authority state.
///
/// Every method has an empty default, so implementors only override what
/// they care about.
pub trait ReplicationHooks {
    /// A tick referenced a local id the observer had not seen yet.
    fn on_placeholder(&mut self, _local: LocalId, _type_id: EntityTypeId) {}

    /// An entity received properties in `mask` this tick.
    fn on_entity_updated(&mut self, _local: LocalId, _mask: u64) {}

    /// A property flagged `notify` changed value.
    fn on_property_changed(&mut self, _local: LocalId, _index: PropertyIndex, _value: &Value) {}

    /// A smoothed property received a new target. The live value already
    /// holds it; renderers interpolate toward it.
    fn on_interpolation_target(
        &mut self,
        _local: LocalId,
        _index: PropertyIndex,
        _target: &Value,
        _policy: LerpPolicy,
    ) {
    }

    /// Predicted properties in `mask` were snapped to the confirmed value.
    fn on_mispredicted(&mut self, _local: LocalId, _mask: u64, _tick: Tick) {}

    /// The authority released a local id; the entity is gone from this view.
    fn on_released(&mut self, _local: LocalId) {}
}

/// Hooks that ignore every notification.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoHooks;

impl ReplicationHooks for NoHooks {}

/// Hooks that record every notification, for tests and tooling.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordingHooks {
    pub placeholders: Vec<(LocalId, EntityTypeId)>,
    pub updated: Vec<(LocalId, u64)>,
    pub changed: Vec<(LocalId, PropertyIndex, Value)>,
    pub targets: Vec<(LocalId, PropertyIndex, Value)>,
    pub mispredicted: Vec<(LocalId, u64, Tick)>,
    pub released: Vec<LocalId>,
}

impl ReplicationHooks for RecordingHooks {
    fn on_placeholder(&mut self, local: LocalId, type_id: EntityTypeId) {
        self.placeholders.push((local, type_id));
    }

    fn on_entity_updated(&mut self, local: LocalId, mask: u64) {
        self.updated.push((local, mask));
    }

    fn on_property_changed(&mut self, local: LocalId, index: PropertyIndex, value: &Value) {
        self.changed.push((local, index, value.clone()));
    }

    fn on_interpolation_target(
        &mut self,
        local: LocalId,
        index: PropertyIndex,
        target: &Value,
        _policy: LerpPolicy,
    ) {
        self.targets.push((local, index, target.clone()));
    }

    fn on_mispredicted(&mut self, local: LocalId, mask: u64, tick: Tick) {
        self.mispredicted.push((local, mask, tick));
    }

    fn on_released(&mut self, local: LocalId) {
        self.released.push(local);
    }
}
