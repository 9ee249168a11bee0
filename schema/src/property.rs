//! Property schema entries.

use crate::value::ValueType;
use crate::PropertyIndex;

/// How observers smooth incoming values of a property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum LerpPolicy {
    /// Apply received values immediately.
    #[default]
    None,
    /// Interpolate toward the latest received value.
    Smooth,
    /// Interpolate between buffered received values.
    Buffered,
}

/// One replicated property of an entity type.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PropertyDef {
    /// Bit position in the dirty mask (0-63), stable per entity type.
    pub index: PropertyIndex,
    pub name: String,
    pub ty: ValueType,
    /// Visible to a peer iff `interest_mask & peer_interest != 0`.
    pub interest_mask: u64,
    pub lerp: LerpPolicy,
    /// Prediction tolerance, `None` when the property is not predicted.
    pub prediction: Option<f32>,
    /// Fire a change notification on observers when the value changes.
    pub notify: bool,
}

impl PropertyDef {
    /// Creates a property visible to every interest group, not predicted, no notify.
    #[must_use]
    pub fn new(index: PropertyIndex, name: impl Into<String>, ty: ValueType) -> Self {
        Self {
            index,
            name: name.into(),
            ty,
            interest_mask: u64::MAX,
            lerp: LerpPolicy::None,
            prediction: None,
            notify: false,
        }
    }

    #[must_use]
    pub fn interest(mut self, mask: u64) -> Self {
        self.interest_mask = mask;
        self
    }

    #[must_use]
    pub fn lerp(mut self, lerp: LerpPolicy) -> Self {
        self.lerp = lerp;
        self
    }

    /// Marks the property as predicted with the given mismatch tolerance.
    #[must_use]
    pub fn predicted(mut self, tolerance: f32) -> Self {
        self.prediction = Some(tolerance);
        self
    }

    #[must_use]
    pub fn notify(mut self) -> Self {
        self.notify = true;
        self
    }

    /// Single-bit mask for this property.
    #[must_use]
    pub const fn bit(&self) -> u64 {
        1u64 << (self.index & 63)
    }

    #[must_use]
    pub const fn is_predicted(&self) -> bool {
        self.prediction.is_some()
    }

    #[must_use]
    pub const fn is_visible_to(&self, interest: u64) -> bool {
        self.interest_mask & interest != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_sets_fields() {
        let prop = PropertyDef::new(5, "health", ValueType::I32)
            .interest(0b10)
            .lerp(LerpPolicy::Smooth)
            .predicted(0.5)
            .notify();
        assert_eq!(prop.bit(), 1 << 5);
        assert_eq!(prop.interest_mask, 0b10);
        assert_eq!(prop.lerp, LerpPolicy::Smooth);
        assert_eq!(prop.prediction, Some(0.5));
        assert!(prop.notify);
        assert!(prop.is_predicted());
    }

    #[test]
    fn visibility_is_mask_intersection() {
        let prop = PropertyDef::new(0, "secret", ValueType::U8).interest(0b0100);
        assert!(prop.is_visible_to(0b0110));
        assert!(!prop.is_visible_to(0b1011));
        assert!(!prop.is_visible_to(0));
    }

    #[test]
    fn default_property_visible_to_any_interest() {
        let prop = PropertyDef::new(63, "tag", ValueType::String);
        assert_eq!(prop.bit(), 1 << 63);
        assert!(prop.is_visible_to(1));
        assert!(!prop.is_predicted());
    }
}
