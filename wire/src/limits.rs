//! Configurable limits for bounded decoding.

/// Wire-level limits.
///
/// `max_message_bytes` is the transport's per-message budget. Outgoing messages
/// above it are reported but still sent. The string and array limits bound
/// allocations while decoding untrusted property payloads.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct Limits {
    /// Per-message byte budget (typical MTU-safe UDP payload).
    pub max_message_bytes: usize,

    /// Maximum decoded string length in bytes.
    pub max_string_len: usize,

    /// Maximum decoded byte/int array length in elements.
    pub max_array_len: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_message_bytes: 1200,
            max_string_len: 256,
            max_array_len: 256,
        }
    }
}

impl Limits {
    /// Creates limits suitable for testing with smaller values.
    #[must_use]
    pub const fn for_testing() -> Self {
        Self {
            max_message_bytes: 512,
            max_string_len: 64,
            max_array_len: 64,
        }
    }

    /// Creates limits with no restrictions (use with caution).
    #[must_use]
    pub const fn unlimited() -> Self {
        Self {
            max_message_bytes: usize::MAX,
            max_string_len: usize::MAX,
            max_array_len: usize::MAX,
        }
    }

    /// Returns `true` if a message of `len` bytes exceeds the budget.
    #[must_use]
    pub const fn is_oversized(&self, len: usize) -> bool {
        len > self.max_message_bytes
    }
}
