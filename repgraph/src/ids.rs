//! Entity and peer identifiers, and per-peer local id tables.

use std::collections::HashMap;
use std::fmt;

use log::error;
use wire::{LocalId, MAX_LOCAL_IDS};

/// Authority-assigned entity id. Zero is never assigned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EntityId(u32);

impl EntityId {
    pub const INVALID: Self = Self(0);

    #[must_use]
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }

    #[must_use]
    pub const fn is_valid(self) -> bool {
        self.0 != 0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "E{}", self.0)
    }
}

/// Peer identifier assigned by the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PeerId(pub u32);

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P{}", self.0)
    }
}

/// Free-list allocator for the 64 local ids of one peer.
///
/// Fresh ids are handed out in ascending order; released ids are reused
/// most-recently-freed first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalIdAllocator {
    next_fresh: u8,
    free: Vec<LocalId>,
}

impl Default for LocalIdAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalIdAllocator {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            next_fresh: 1,
            free: Vec::new(),
        }
    }

    /// Returns a free id, or `None` when all 64 are in use.
    pub fn allocate(&mut self) -> Option<LocalId> {
        if let Some(id) = self.free.pop() {
            return Some(id);
        }
        let id = LocalId::new(self.next_fresh)?;
        self.next_fresh += 1;
        Some(id)
    }

    /// Makes `id` available again.
    pub fn free(&mut self, id: LocalId) {
        if id.is_registered() && !self.free.contains(&id) {
            self.free.push(id);
        }
    }

    /// Ids currently handed out.
    #[must_use]
    pub fn in_use(&self) -> usize {
        usize::from(self.next_fresh - 1) - self.free.len()
    }
}

/// Bidirectional global/local id table for one peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerEntityMap {
    allocator: LocalIdAllocator,
    to_local: HashMap<EntityId, LocalId>,
    to_global: [Option<EntityId>; MAX_LOCAL_IDS as usize],
}

impl Default for PeerEntityMap {
    fn default() -> Self {
        Self::new()
    }
}

impl PeerEntityMap {
    #[must_use]
    pub fn new() -> Self {
        Self {
            allocator: LocalIdAllocator::new(),
            to_local: HashMap::new(),
            to_global: [None; MAX_LOCAL_IDS as usize],
        }
    }

    #[must_use]
    pub fn local(&self, entity: EntityId) -> Option<LocalId> {
        self.to_local.get(&entity).copied()
    }

    #[must_use]
    pub fn global(&self, local: LocalId) -> Option<EntityId> {
        slot(local).and_then(|i| self.to_global[i])
    }

    /// Returns the entity's local id, allocating one on first use.
    ///
    /// When the peer already sees 64 entities this logs and returns
    /// [`LocalId::UNREGISTERED`].
    pub fn ensure(&mut self, entity: EntityId) -> LocalId {
        if let Some(local) = self.local(entity) {
            return local;
        }
        let Some(local) = self.allocator.allocate() else {
            error!(
                "local id space exhausted ({MAX_LOCAL_IDS} in use), cannot register {entity}"
            );
            return LocalId::UNREGISTERED;
        };
        self.to_local.insert(entity, local);
        if let Some(i) = slot(local) {
            self.to_global[i] = Some(entity);
        }
        local
    }

    /// Unmaps an entity. The returned id is not reusable until passed to [`free`](Self::free).
    pub fn unmap(&mut self, entity: EntityId) -> Option<LocalId> {
        let local = self.to_local.remove(&entity)?;
        if let Some(i) = slot(local) {
            self.to_global[i] = None;
        }
        Some(local)
    }

    pub fn free(&mut self, local: LocalId) {
        if self.global(local).is_none() {
            self.allocator.free(local);
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.to_local.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.to_local.is_empty()
    }

    pub fn entities(&self) -> impl Iterator<Item = (EntityId, LocalId)> + '_ {
        self.to_local.iter().map(|(e, l)| (*e, *l))
    }
}

fn slot(local: LocalId) -> Option<usize> {
    local.raw().checked_sub(1).map(usize::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocator_exhausts_at_64() {
        let mut alloc = LocalIdAllocator::new();
        for expected in 1..=64u8 {
            assert_eq!(alloc.allocate().map(LocalId::raw), Some(expected));
        }
        assert_eq!(alloc.allocate(), None);
        assert_eq!(alloc.in_use(), 64);
    }

    #[test]
    fn allocator_reuses_freed() {
        let mut alloc = LocalIdAllocator::new();
        let a = alloc.allocate().unwrap();
        let _b = alloc.allocate().unwrap();
        alloc.free(a);
        alloc.free(a);
        assert_eq!(alloc.in_use(), 1);
        assert_eq!(alloc.allocate(), Some(a));
        assert_eq!(alloc.allocate().map(LocalId::raw), Some(3));
    }

    #[test]
    fn map_translates_both_ways() {
        let mut map = PeerEntityMap::new();
        let e = EntityId::new(500);
        let local = map.ensure(e);
        assert_eq!(local.raw(), 1);
        assert_eq!(map.ensure(e), local);
        assert_eq!(map.global(local), Some(e));
        assert_eq!(map.local(e), Some(local));
        assert_eq!(map.global(LocalId::UNREGISTERED), None);
    }

    #[test]
    fn exhaustion_returns_unregistered() {
        let mut map = PeerEntityMap::new();
        for raw in 1..=64 {
            assert!(map.ensure(EntityId::new(raw)).is_registered());
        }
        assert_eq!(map.ensure(EntityId::new(65)), LocalId::UNREGISTERED);
        assert_eq!(map.len(), 64);
    }

    #[test]
    fn unmapped_id_held_until_freed() {
        let mut map = PeerEntityMap::new();
        let a = map.ensure(EntityId::new(1));
        assert_eq!(map.unmap(EntityId::new(1)), Some(a));
        assert_eq!(map.ensure(EntityId::new(2)).raw(), 2);
        map.free(a);
        assert_eq!(map.ensure(EntityId::new(3)), a);
    }

    #[test]
    fn entity_id_zero_is_invalid() {
        assert!(!EntityId::INVALID.is_valid());
        assert!(EntityId::new(1).is_valid());
        assert_eq!(EntityId::new(4).to_string(), "E4");
    }
}
