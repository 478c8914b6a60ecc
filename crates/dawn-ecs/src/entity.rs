//! Entity identifiers and allocation.
//!
//! An [`EntityId`] is an opaque 64-bit handle. Identifiers are handed out by a
//! monotonic cursor and are never reused within a process run, so a stale
//! handle can never alias a live entity. Identifiers may also be *reserved*
//! ahead of time (for replication handshakes) and materialized later.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::fmt;

use crate::EcsError;

// ---------------------------------------------------------------------------
// EntityId
// ---------------------------------------------------------------------------

/// An opaque entity identifier.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(u64);

impl EntityId {
    /// Raw `u64` representation (stable across the network boundary).
    #[inline]
    pub fn to_raw(self) -> u64 {
        self.0
    }

    /// Reconstruct from a raw `u64`.
    #[inline]
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Debug for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntityId({})", self.0)
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// EntityAllocator
// ---------------------------------------------------------------------------

/// Hands out [`EntityId`]s and tracks which of them are alive.
///
/// Fresh ids come from a cursor that only moves forward. Ids supplied from
/// elsewhere (replication, save files) never move the cursor; ones at or past
/// it are remembered as claimed and skipped when the cursor reaches them, so
/// a remote id anywhere in the `u64` range can neither alias a fresh id nor
/// exhaust the local id space.
#[derive(Debug, Default)]
pub struct EntityAllocator {
    /// Next raw id to hand out.
    next: u64,
    /// Externally supplied raw ids at or past `next`.
    claimed: BTreeSet<u64>,
    /// Currently alive entities.
    alive: HashSet<EntityId>,
}

impl EntityAllocator {
    /// Create a new, empty allocator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve a fresh id without making it alive.
    ///
    /// # Panics
    ///
    /// Panics once every locally issuable `u64` id has been handed out.
    pub fn reserve(&mut self) -> EntityId {
        // Claims never sit below the cursor.
        while self.claimed.remove(&self.next) {
            self.advance();
        }
        let id = EntityId(self.next);
        self.advance();
        id
    }

    fn advance(&mut self) {
        self.next = self
            .next
            .checked_add(1)
            .expect("entity id space exhausted");
    }

    /// Allocate a fresh id and mark it alive.
    pub fn allocate(&mut self) -> EntityId {
        let id = self.reserve();
        self.alive.insert(id);
        id
    }

    /// Mark a previously reserved (or externally supplied) id alive.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::DuplicateId`] if `id` is already alive.
    pub fn allocate_reserved(&mut self, id: EntityId) -> Result<EntityId, EcsError> {
        if self.alive.contains(&id) {
            return Err(EcsError::DuplicateId { entity: id });
        }
        if id.0 >= self.next {
            self.claimed.insert(id.0);
        }
        self.alive.insert(id);
        Ok(id)
    }

    /// Mark an entity dead.
    ///
    /// Returns `true` if the entity was alive, `false` if it was already dead
    /// or never allocated.
    pub fn deallocate(&mut self, id: EntityId) -> bool {
        self.alive.remove(&id)
    }

    /// Returns `true` if `id` refers to a currently alive entity.
    pub fn is_alive(&self, id: EntityId) -> bool {
        self.alive.contains(&id)
    }

    /// Total number of currently alive entities.
    pub fn alive_count(&self) -> usize {
        self.alive.len()
    }

    /// All alive entities, in ascending id order.
    pub fn alive_sorted(&self) -> Vec<EntityId> {
        let mut ids: Vec<EntityId> = self.alive.iter().copied().collect();
        ids.sort_unstable();
        ids
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
