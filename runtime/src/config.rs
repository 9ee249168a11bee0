//! Runtime configuration.

use codec::PoseConfig;
use schema::ValueLimits;
use wire::Limits;

use crate::error::{RuntimeError, RuntimeResult};

/// What happens to a departed peer's owned entities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Disposal {
    /// Despawn owned entities and their children.
    #[default]
    Despawn,
    /// Keep the entities and clear their owner.
    ReleaseOwnership,
}

/// Settings for one replicated world.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct RuntimeConfig {
    /// Ticks per second.
    pub tick_rate: u32,
    /// Seconds without an acknowledgement before a peer is dropped.
    pub ack_timeout_secs: u32,
    /// Backlog slots per peer.
    pub backlog_capacity: usize,
    /// Prediction slots per predicted property.
    pub prediction_capacity: usize,
    pub disposal: Disposal,
    /// Interest mask assigned to new peers.
    pub default_interest: u64,
    pub limits: Limits,
    pub pose: PoseConfig,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            tick_rate: 30,
            ack_timeout_secs: 10,
            backlog_capacity: 64,
            prediction_capacity: 64,
            disposal: Disposal::Despawn,
            default_interest: u64::MAX,
            limits: Limits::default(),
            pose: PoseConfig::default(),
        }
    }
}

impl RuntimeConfig {
    /// Small, deterministic settings for tests.
    #[must_use]
    pub fn for_testing() -> Self {
        Self {
            tick_rate: 10,
            ack_timeout_secs: 2,
            backlog_capacity: 16,
            prediction_capacity: 16,
            limits: Limits::for_testing(),
            pose: PoseConfig::for_testing(),
            ..Self::default()
        }
    }

    #[must_use]
    pub const fn with_tick_rate(mut self, tick_rate: u32) -> Self {
        self.tick_rate = tick_rate;
        self
    }

    #[must_use]
    pub const fn with_ack_timeout_secs(mut self, secs: u32) -> Self {
        self.ack_timeout_secs = secs;
        self
    }

    #[must_use]
    pub const fn with_disposal(mut self, disposal: Disposal) -> Self {
        self.disposal = disposal;
        self
    }

    #[must_use]
    pub const fn with_backlog_capacity(mut self, capacity: usize) -> Self {
        self.backlog_capacity = capacity;
        self
    }

    #[must_use]
    pub const fn with_default_interest(mut self, mask: u64) -> Self {
        self.default_interest = mask;
        self
    }

    #[must_use]
    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    #[must_use]
    pub fn with_pose(mut self, pose: PoseConfig) -> Self {
        self.pose = pose;
        self
    }

    /// Ticks without an acknowledgement after which a peer times out.
    #[must_use]
    pub const fn timeout_ticks(&self) -> u32 {
        self.tick_rate.saturating_mul(self.ack_timeout_secs)
    }

    /// Decode bounds for property values, taken from the wire limits.
    #[must_use]
    pub const fn value_limits(&self) -> ValueLimits {
        ValueLimits {
            max_string_len: self.limits.max_string_len,
            max_array_len: self.limits.max_array_len,
        }
    }

    pub fn validate(&self) -> RuntimeResult<()> {
        let reason = if self.tick_rate == 0 {
            "tick_rate must be non-zero"
        } else if self.ack_timeout_secs == 0 {
            "ack_timeout_secs must be non-zero"
        } else if self.backlog_capacity == 0 {
            "backlog_capacity must be non-zero"
        } else if self.prediction_capacity == 0 {
            "prediction_capacity must be non-zero"
        } else if !(self.pose.position_scale.is_finite() && self.pose.position_scale > 0.0) {
            "pose.position_scale must be positive"
        } else {
            return Ok(());
        };
        Err(RuntimeError::InvalidConfig { reason })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = RuntimeConfig::default();
        assert_eq!(config.timeout_ticks(), 300);
        assert_eq!(config.disposal, Disposal::Despawn);
        assert_eq!(config.limits.max_message_bytes, 1200);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn builder_setters() {
        let config = RuntimeConfig::for_testing()
            .with_tick_rate(20)
            .with_ack_timeout_secs(3)
            .with_disposal(Disposal::ReleaseOwnership);
        assert_eq!(config.timeout_ticks(), 60);
        assert_eq!(config.disposal, Disposal::ReleaseOwnership);
    }

    #[test]
    fn invalid_values_rejected() {
        let err = RuntimeConfig::default().with_tick_rate(0).validate().unwrap_err();
        assert_eq!(
            err,
            RuntimeError::InvalidConfig {
                reason: "tick_rate must be non-zero"
            }
        );
        assert!(RuntimeConfig::default()
            .with_backlog_capacity(0)
            .validate()
            .is_err());
    }
}
