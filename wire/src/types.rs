//! Core wire identifiers: ticks, per-peer local ids, logical channels.

use std::fmt;

/// A world tick number.
///
/// Ticks increase monotonically from 1. Tick 0 means "nothing yet".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Tick(u32);

impl Tick {
    pub const ZERO: Self = Self(0);

    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }

    #[must_use]
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// The following tick, saturating at `u32::MAX`.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0.saturating_add(1))
    }

    /// Number of ticks from `earlier` to `self`, zero if `earlier` is later.
    #[must_use]
    pub const fn since(self, earlier: Self) -> u32 {
        self.0.saturating_sub(earlier.0)
    }
}

impl From<u32> for Tick {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

impl From<Tick> for u32 {
    fn from(value: Tick) -> Self {
        value.0
    }
}

impl fmt::Display for Tick {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Largest number of entities a single peer can see at once.
pub const MAX_LOCAL_IDS: u8 = 64;

/// A per-peer, one-byte entity reference (1..=64).
///
/// Global ids are never sent; each peer gets its own local id table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LocalId(u8);

impl LocalId {
    /// Sentinel returned when allocation fails.
    pub const UNREGISTERED: Self = Self(0);

    /// Creates a local id, `None` if out of range.
    #[must_use]
    pub const fn new(value: u8) -> Option<Self> {
        if value >= 1 && value <= MAX_LOCAL_IDS {
            Some(Self(value))
        } else {
            None
        }
    }

    #[must_use]
    pub const fn raw(self) -> u8 {
        self.0
    }

    #[must_use]
    pub const fn is_registered(self) -> bool {
        self.0 != 0
    }

    /// Bit for this id in the updated-entity mask (`id - 1`).
    #[must_use]
    pub const fn mask_bit(self) -> u64 {
        if self.0 == 0 {
            0
        } else {
            1u64 << (self.0 - 1)
        }
    }

    /// Iterates the ids set in an updated-entity mask, ascending.
    pub fn iter_mask(mask: u64) -> impl Iterator<Item = Self> {
        (0..MAX_LOCAL_IDS)
            .filter(move |bit| mask & (1u64 << bit) != 0)
            .map(|bit| Self(bit + 1))
    }
}

impl fmt::Display for LocalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "L{}", self.0)
    }
}

/// Whether the transport retransmits a channel's messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reliability {
    /// Latest-wins; losses are repaired by the backlog.
    Unreliable,
    Reliable,
}

/// Logical streams multiplexed over one connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Channel {
    /// Authority to observer tick state.
    TickState,
    /// Observer to authority tick acknowledgements.
    Ack,
    /// Observer to authority input for owned entities.
    Input,
    /// Remote function calls.
    Rpc,
    /// Spawn/despawn and local id release notices.
    Spawn,
}

impl Channel {
    #[must_use]
    pub const fn reliability(self) -> Reliability {
        match self {
            Self::TickState | Self::Ack | Self::Input => Reliability::Unreliable,
            Self::Rpc | Self::Spawn => Reliability::Reliable,
        }
    }
}
