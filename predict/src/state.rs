//! Predict, confirm and reconcile for individual properties and whole entities.

use log::debug;
use schema::{EntityTypeDef, PropertyIndex, Value};
use wire::Tick;

use crate::buffer::PredictionBuffer;
use crate::compare::within_tolerance;
use crate::error::{PredictError, PredictResult};

/// Prediction state of one predicted property.
#[derive(Debug, Clone, PartialEq)]
pub struct PredictedProperty {
    index: PropertyIndex,
    tolerance: f32,
    buffer: PredictionBuffer<Value>,
    confirmed: Option<Value>,
}

impl PredictedProperty {
    pub fn new(index: PropertyIndex, tolerance: f32, capacity: usize) -> PredictResult<Self> {
        Ok(Self {
            index,
            tolerance,
            buffer: PredictionBuffer::new(capacity)?,
            confirmed: None,
        })
    }

    #[must_use]
    pub const fn index(&self) -> PropertyIndex {
        self.index
    }

    #[must_use]
    pub const fn tolerance(&self) -> f32 {
        self.tolerance
    }

    #[must_use]
    pub fn predicted(&self, tick: Tick) -> Option<&Value> {
        self.buffer.get(tick)
    }

    #[must_use]
    pub const fn confirmed(&self) -> Option<&Value> {
        self.confirmed.as_ref()
    }

    /// Snapshots the locally simulated value for `tick`.
    pub fn store_predicted(&mut self, tick: Tick, value: &Value) {
        self.buffer.store(tick, value.clone());
    }

    /// Records the authoritative value. Pass the authority-sourced copy, not
    /// the live value, which may already hold a newer prediction.
    pub fn store_confirmed(&mut self, value: &Value) {
        self.confirmed = Some(value.clone());
    }

    /// Compares the prediction for `tick` with the confirmed value.
    ///
    /// On a mismatch, or when nothing was predicted for `tick`, `live` is
    /// snapped to the confirmed value and `true` is returned. Without a
    /// confirmed value nothing happens.
    pub fn reconcile(&mut self, tick: Tick, live: &mut Value) -> bool {
        let Some(confirmed) = self.confirmed.as_ref() else {
            return false;
        };
        let keep = self
            .buffer
            .get(tick)
            .is_some_and(|predicted| within_tolerance(predicted, confirmed, self.tolerance));
        if keep {
            return false;
        }
        *live = confirmed.clone();
        true
    }

    /// Re-applies the value predicted for `tick`. Returns `false` if it was overwritten.
    pub fn restore(&self, tick: Tick, live: &mut Value) -> bool {
        match self.buffer.get(tick) {
            Some(predicted) => {
                *live = predicted.clone();
                true
            }
            None => false,
        }
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
        self.confirmed = None;
    }
}

/// Prediction state for every predicted property of one entity.
///
/// Values are passed as slices parallel to the entity type's property table.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityPrediction {
    properties: Vec<(usize, PredictedProperty)>,
    value_count: usize,
}

impl EntityPrediction {
    /// Builds prediction state for the predicted properties of `ty`.
    pub fn for_type(ty: &EntityTypeDef, capacity: usize) -> PredictResult<Self> {
        let mut properties = Vec::new();
        for (position, def) in ty.properties.iter().enumerate() {
            if let Some(tolerance) = def.prediction {
                properties.push((position, PredictedProperty::new(def.index, tolerance, capacity)?));
            }
        }
        Ok(Self {
            properties,
            value_count: ty.properties.len(),
        })
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    pub fn properties(&self) -> impl Iterator<Item = &PredictedProperty> {
        self.properties.iter().map(|(_, p)| p)
    }

    #[must_use]
    pub fn property(&self, index: PropertyIndex) -> Option<&PredictedProperty> {
        self.properties().find(|p| p.index == index)
    }

    pub fn store_predicted(&mut self, tick: Tick, values: &[Value]) -> PredictResult<()> {
        self.check(values)?;
        for (position, prop) in &mut self.properties {
            prop.store_predicted(tick, &values[*position]);
        }
        Ok(())
    }

    /// Records confirmed values for the properties in `mask`.
    pub fn store_confirmed(&mut self, confirmed: &[Value], mask: u64) -> PredictResult<()> {
        self.check(confirmed)?;
        for (position, prop) in &mut self.properties {
            if mask & (1u64 << prop.index) != 0 {
                prop.store_confirmed(&confirmed[*position]);
            }
        }
        Ok(())
    }

    /// Reconciles the properties in `mask` against their prediction for
    /// `tick`. Returns the mask of properties that were snapped.
    pub fn reconcile(&mut self, tick: Tick, live: &mut [Value], mask: u64) -> PredictResult<u64> {
        self.check(live)?;
        let mut snapped = 0;
        for (position, prop) in &mut self.properties {
            let bit = 1u64 << prop.index;
            if mask & bit != 0 && prop.reconcile(tick, &mut live[*position]) {
                debug!("property {} mispredicted at {tick}, snapped", prop.index);
                snapped |= bit;
            }
        }
        Ok(snapped)
    }

    /// Re-applies predictions for `tick`; returns the mask of restored properties.
    pub fn restore(&self, tick: Tick, live: &mut [Value]) -> PredictResult<u64> {
        self.check(live)?;
        let mut restored = 0;
        for (position, prop) in &self.properties {
            if prop.restore(tick, &mut live[*position]) {
                restored |= 1u64 << prop.index;
            }
        }
        Ok(restored)
    }

    pub fn clear(&mut self) {
        for (_, prop) in &mut self.properties {
            prop.clear();
        }
    }

    fn check(&self, values: &[Value]) -> PredictResult<()> {
        if values.len() == self.value_count {
            Ok(())
        } else {
            Err(PredictError::ValueCount {
                expected: self.value_count,
                found: values.len(),
            })
        }
    }
}
