//! Per-entity dirty tracking.

use std::fmt;
use std::ops::{BitAnd, BitAndAssign, BitOr, BitOrAssign, Not};

use schema::PropertyIndex;

/// One bit per property index.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct DirtyMask(u64);

impl DirtyMask {
    pub const EMPTY: Self = Self(0);
    pub const ALL: Self = Self(u64::MAX);

    #[must_use]
    pub const fn new(bits: u64) -> Self {
        Self(bits)
    }

    #[must_use]
    pub const fn single(index: PropertyIndex) -> Self {
        Self(1u64 << (index & 63))
    }

    #[must_use]
    pub const fn bits(self) -> u64 {
        self.0
    }

    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    #[must_use]
    pub const fn contains(self, index: PropertyIndex) -> bool {
        self.0 & (1u64 << (index & 63)) != 0
    }

    pub fn insert(&mut self, index: PropertyIndex) {
        self.0 |= 1u64 << (index & 63);
    }

    pub fn remove(&mut self, index: PropertyIndex) {
        self.0 &= !(1u64 << (index & 63));
    }

    #[must_use]
    pub const fn count(self) -> u32 {
        self.0.count_ones()
    }

    /// Set indices in ascending order.
    pub fn iter(self) -> impl Iterator<Item = PropertyIndex> {
        (0..64u8).filter(move |i| self.0 & (1u64 << i) != 0)
    }
}

impl fmt::Debug for DirtyMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DirtyMask({:#018x})", self.0)
    }
}

impl From<u64> for DirtyMask {
    fn from(bits: u64) -> Self {
        Self(bits)
    }
}

impl From<DirtyMask> for u64 {
    fn from(mask: DirtyMask) -> Self {
        mask.0
    }
}

impl BitOr for DirtyMask {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for DirtyMask {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for DirtyMask {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self {
        Self(self.0 & rhs.0)
    }
}

impl BitAndAssign for DirtyMask {
    fn bitand_assign(&mut self, rhs: Self) {
        self.0 &= rhs.0;
    }
}

impl Not for DirtyMask {
    type Output = Self;

    fn not(self) -> Self {
        Self(!self.0)
    }
}

/// Live and per-cycle dirty masks for one entity.
///
/// Marks land in the live mask. [`begin`](Self::begin) moves them into the
/// cycle snapshot that exports read, so marks made during an export belong to
/// the next cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DirtyTracker {
    live: DirtyMask,
    cycle: DirtyMask,
}

impl DirtyTracker {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            live: DirtyMask::EMPTY,
            cycle: DirtyMask::EMPTY,
        }
    }

    /// Marks a property as changed. Repeated marks before `begin` are idempotent.
    pub fn mark(&mut self, index: PropertyIndex) {
        self.live.insert(index);
    }

    pub fn mark_mask(&mut self, mask: DirtyMask) {
        self.live |= mask;
    }

    /// Snapshots the live mask for this cycle and clears it.
    pub fn begin(&mut self) -> DirtyMask {
        self.cycle = self.live;
        self.live = DirtyMask::EMPTY;
        self.cycle
    }

    /// Changes captured by the last `begin`.
    #[must_use]
    pub const fn cycle(&self) -> DirtyMask {
        self.cycle
    }

    /// Changes marked since the last `begin`.
    #[must_use]
    pub const fn live(&self) -> DirtyMask {
        self.live
    }

    pub fn clear(&mut self) {
        *self = Self::new();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mask_ops() {
        let mut mask = DirtyMask::EMPTY;
        mask.insert(0);
        mask.insert(63);
        assert!(mask.contains(63));
        assert_eq!(mask.count(), 2);
        assert_eq!(mask.iter().collect::<Vec<_>>(), vec![0, 63]);
        mask.remove(0);
        assert_eq!(mask, DirtyMask::single(63));
        assert_eq!((mask | DirtyMask::single(1)).bits(), (1 << 63) | 2);
        assert!((mask & !mask).is_empty());
    }

    #[test]
    fn repeated_marks_set_one_bit() {
        let mut tracker = DirtyTracker::new();
        for _ in 0..5 {
            tracker.mark(3);
        }
        let cycle = tracker.begin();
        assert_eq!(cycle, DirtyMask::single(3));
        assert_eq!(cycle.count(), 1);
    }

    #[test]
    fn begin_clears_live_and_keeps_cycle() {
        let mut tracker = DirtyTracker::new();
        tracker.mark(1);
        tracker.begin();
        tracker.mark(2);
        assert_eq!(tracker.cycle(), DirtyMask::single(1));
        assert_eq!(tracker.live(), DirtyMask::single(2));
        assert_eq!(tracker.begin(), DirtyMask::single(2));
        assert!(tracker.begin().is_empty());
    }

    #[test]
    fn debug_format() {
        assert_eq!(
            format!("{:?}", DirtyMask::single(4)),
            "DirtyMask(0x0000000000000010)"
        );
    }
}
