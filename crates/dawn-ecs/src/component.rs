//! Component kinds, registration metadata, and per-kind storage.
//!
//! Every component kind gets one [`ComponentStorage`] inside the
//! [`World`](crate::world::World). Kinds are registered in a
//! [`ComponentRegistry`], either explicitly with a human-readable name or
//! lazily on first insert. Registration produces a [`ComponentTypeId`] that
//! indexes the world's storage table.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;

use crate::entity::EntityId;

// ---------------------------------------------------------------------------
// Component
// ---------------------------------------------------------------------------

/// Marker trait for plain-data component values.
///
/// Implemented for every `'static + Send + Sync` type. Each entity holds at
/// most one value of a given component kind.
pub trait Component: Any + Send + Sync {}

impl<T: Any + Send + Sync> Component for T {}

// ---------------------------------------------------------------------------
// ComponentKind
// ---------------------------------------------------------------------------

/// Runtime key for a component kind, used in system requirement sets.
///
/// Two kinds compare equal iff they refer to the same Rust type; the name is
/// carried only for diagnostics.
#[derive(Clone, Copy)]
pub struct ComponentKind {
    type_id: TypeId,
    name: &'static str,
}

impl ComponentKind {
    /// The kind of component type `T`.
    pub fn of<T: Component>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    /// Rust `TypeId` of the component type.
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Rust type name of the component type.
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for ComponentKind {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id
    }
}

impl Eq for ComponentKind {}

impl std::hash::Hash for ComponentKind {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.type_id.hash(state);
    }
}

impl fmt::Debug for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ComponentKind({})", self.name)
    }
}

// ---------------------------------------------------------------------------
// ComponentTypeId
// ---------------------------------------------------------------------------

/// Opaque, lightweight identifier for a registered component type.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComponentTypeId(pub(crate) u32);

impl ComponentTypeId {
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for ComponentTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ComponentTypeId({})", self.0)
    }
}

// ---------------------------------------------------------------------------
// ComponentInfo
// ---------------------------------------------------------------------------

/// Metadata about a registered component type.
#[derive(Debug, Clone)]
pub struct ComponentInfo {
    /// Unique ID assigned at registration time.
    pub id: ComponentTypeId,
    /// Human-readable name (supplied by the caller, or the Rust type name).
    pub name: String,
    /// `std::mem::size_of::<T>()`
    pub size: usize,
    /// Rust `TypeId` for runtime type checking.
    pub type_id: TypeId,
}

// ---------------------------------------------------------------------------
// ComponentRegistry
// ---------------------------------------------------------------------------

/// Registry mapping Rust types to [`ComponentTypeId`]s and their metadata.
///
/// A type can only be registered once; subsequent registrations of the same
/// Rust `TypeId` return the existing [`ComponentTypeId`].
#[derive(Debug, Default)]
pub struct ComponentRegistry {
    /// TypeId -> ComponentTypeId for dedup.
    by_type: HashMap<TypeId, ComponentTypeId>,
    /// Name -> ComponentTypeId for diagnostics lookups.
    by_name: HashMap<String, ComponentTypeId>,
    /// Indexed by ComponentTypeId.0.
    infos: Vec<ComponentInfo>,
}

impl ComponentRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a component type under the given `name`.
    ///
    /// If the type has already been registered, the existing
    /// [`ComponentTypeId`] is returned and `name` is ignored. If `name` is
    /// already taken by a different type, the Rust type name is used instead.
    pub fn register<T: Component>(&mut self, name: &str) -> ComponentTypeId {
        let rust_type_id = TypeId::of::<T>();
        if let Some(&existing) = self.by_type.get(&rust_type_id) {
            return existing;
        }

        let id = ComponentTypeId(self.infos.len() as u32);
        let name = if self.by_name.contains_key(name) {
            tracing::warn!(
                name,
                rust_type = std::any::type_name::<T>(),
                "component name already registered for a different type, using the type name"
            );
            std::any::type_name::<T>().to_owned()
        } else {
            name.to_owned()
        };

        self.infos.push(ComponentInfo {
            id,
            name: name.clone(),
            size: std::mem::size_of::<T>(),
            type_id: rust_type_id,
        });
        self.by_type.insert(rust_type_id, id);
        self.by_name.insert(name, id);
        id
    }

    /// Look up a component type by its Rust type.
    pub fn lookup<T: 'static>(&self) -> Option<ComponentTypeId> {
        self.by_type.get(&TypeId::of::<T>()).copied()
    }

    /// Look up a component type by a [`ComponentKind`].
    pub fn lookup_kind(&self, kind: ComponentKind) -> Option<ComponentTypeId> {
        self.by_type.get(&kind.type_id()).copied()
    }

    /// Look up a component type by its registered string name.
    pub fn lookup_by_name(&self, name: &str) -> Option<ComponentTypeId> {
        self.by_name.get(name).copied()
    }

    /// Get the [`ComponentInfo`] for a registered component type ID.
    pub fn get_info(&self, id: ComponentTypeId) -> Option<&ComponentInfo> {
        self.infos.get(id.index())
    }

    /// Total number of registered component types.
    pub fn len(&self) -> usize {
        self.infos.len()
    }

    /// Whether any component types have been registered.
    pub fn is_empty(&self) -> bool {
        self.infos.is_empty()
    }

    /// Returns the names of all registered component types, sorted.
    pub fn registered_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.by_name.keys().map(|s| s.as_str()).collect();
        names.sort();
        names
    }
}

// ---------------------------------------------------------------------------
// ComponentStorage
// ---------------------------------------------------------------------------

/// Contiguous storage for every value of one component kind.
///
/// Values live in a dense `Vec` alongside their owning entity; a sparse map
/// from entity to slot gives O(1) lookup. Removal swaps the last slot into the
/// hole, so iteration order changes over time and must not be relied upon.
#[derive(Debug)]
pub struct ComponentStorage<T> {
    dense: Vec<T>,
    owners: Vec<EntityId>,
    slots: HashMap<EntityId, usize>,
}

impl<T> Default for ComponentStorage<T> {
    fn default() -> Self {
        Self {
            dense: Vec::new(),
            owners: Vec::new(),
            slots: HashMap::new(),
        }
    }
}

impl<T: Component> ComponentStorage<T> {
    /// Create an empty storage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach `value` to `entity`, returning the value it replaced, if any.
    pub fn insert(&mut self, entity: EntityId, value: T) -> Option<T> {
        if let Some(&slot) = self.slots.get(&entity) {
            return Some(std::mem::replace(&mut self.dense[slot], value));
        }
        self.slots.insert(entity, self.dense.len());
        self.dense.push(value);
        self.owners.push(entity);
        None
    }

    /// Shared reference to the value attached to `entity`.
    pub fn get(&self, entity: EntityId) -> Option<&T> {
        self.slots.get(&entity).map(|&slot| &self.dense[slot])
    }

    /// Mutable reference to the value attached to `entity`.
    pub fn get_mut(&mut self, entity: EntityId) -> Option<&mut T> {
        match self.slots.get(&entity) {
            Some(&slot) => Some(&mut self.dense[slot]),
            None => None,
        }
    }

    /// Whether `entity` has a value in this storage.
    pub fn contains(&self, entity: EntityId) -> bool {
        self.slots.contains_key(&entity)
    }

    /// Detach and return the value attached to `entity`. No-op if absent.
    pub fn remove(&mut self, entity: EntityId) -> Option<T> {
        let slot = self.slots.remove(&entity)?;
        let value = self.dense.swap_remove(slot);
        self.owners.swap_remove(slot);
        if let Some(&moved) = self.owners.get(slot) {
            self.slots.insert(moved, slot);
        }
        Some(value)
    }

    /// Lazily iterate `(entity, &value)` pairs in storage order.
    pub fn iter(&self) -> impl Iterator<Item = (EntityId, &T)> + '_ {
        self.owners.iter().copied().zip(self.dense.iter())
    }

    /// Lazily iterate `(entity, &mut value)` pairs in storage order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (EntityId, &mut T)> + '_ {
        self.owners.iter().copied().zip(self.dense.iter_mut())
    }

    /// Entities that currently own a value, in storage order.
    pub fn entities(&self) -> &[EntityId] {
        &self.owners
    }

    /// Number of stored values.
    pub fn len(&self) -> usize {
        self.dense.len()
    }

    /// Whether the storage is empty.
    pub fn is_empty(&self) -> bool {
        self.dense.is_empty()
    }
}

// ---------------------------------------------------------------------------
// ErasedStorage
// ---------------------------------------------------------------------------

/// Type-erased view of a [`ComponentStorage`] so the world can cascade
/// removals and test membership without knowing `T`.
pub(crate) trait ErasedStorage: Send + Sync {
    fn remove_entity(&mut self, entity: EntityId) -> bool;
    fn contains(&self, entity: EntityId) -> bool;
    fn entities(&self) -> &[EntityId];
    fn len(&self) -> usize;
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Component> ErasedStorage for ComponentStorage<T> {
    fn remove_entity(&mut self, entity: EntityId) -> bool {
        self.remove(entity).is_some()
    }

    fn contains(&self, entity: EntityId) -> bool {
        ComponentStorage::contains(self, entity)
    }

    fn entities(&self) -> &[EntityId] {
        ComponentStorage::entities(self)
    }

    fn len(&self) -> usize {
        ComponentStorage::len(self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Pos {
        x: f32,
        y: f32,
    }

    #[derive(Debug, Clone, PartialEq)]
    struct Vel {
        dx: f32,
        dy: f32,
    }

    fn id(raw: u64) -> EntityId {
        EntityId::from_raw(raw)
    }

    // -- registry -----------------------------------------------------------

    #[test]
    fn register_and_lookup() {
        let mut reg = ComponentRegistry::new();
        let id = reg.register::<Pos>("position");
        assert_eq!(reg.lookup::<Pos>(), Some(id));
        assert_eq!(reg.lookup_kind(ComponentKind::of::<Pos>()), Some(id));
        assert_eq!(reg.lookup_by_name("position"), Some(id));
    }

    #[test]
    fn same_type_same_id() {
        let mut reg = ComponentRegistry::new();
        let id1 = reg.register::<Pos>("position");
        let id2 = reg.register::<Pos>("position_again");
        assert_eq!(id1, id2);
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn clashing_name_falls_back_to_type_name() {
        let mut reg = ComponentRegistry::new();
        reg.register::<Pos>("thing");
        let v = reg.register::<Vel>("thing");
        let info = reg.get_info(v).unwrap();
        assert_eq!(info.name, std::any::type_name::<Vel>());
    }

    #[test]
    fn kinds_compare_by_type() {
        assert_eq!(ComponentKind::of::<Pos>(), ComponentKind::of::<Pos>());
        assert_ne!(ComponentKind::of::<Pos>(), ComponentKind::of::<Vel>());
    }

    // -- storage ------------------------------------------------------------

    #[test]
    fn insert_get_remove() {
        let mut store = ComponentStorage::new();
        assert_eq!(store.insert(id(1), Pos { x: 1.0, y: 2.0 }), None);
        assert_eq!(store.get(id(1)), Some(&Pos { x: 1.0, y: 2.0 }));
        assert!(store.contains(id(1)));

        assert_eq!(store.remove(id(1)), Some(Pos { x: 1.0, y: 2.0 }));
        assert!(!store.contains(id(1)));
        assert_eq!(store.remove(id(1)), None);
    }

    #[test]
    fn insert_replaces_existing_value() {
        let mut store = ComponentStorage::new();
        store.insert(id(1), Pos { x: 1.0, y: 1.0 });
        let old = store.insert(id(1), Pos { x: 9.0, y: 9.0 });
        assert_eq!(old, Some(Pos { x: 1.0, y: 1.0 }));
        assert_eq!(store.len(), 1);
        assert_eq!(store.get(id(1)), Some(&Pos { x: 9.0, y: 9.0 }));
    }

    #[test]
    fn swap_remove_keeps_remaining_lookups_valid() {
        let mut store = ComponentStorage::new();
        for raw in 0..5 {
            store.insert(id(raw), Vel { dx: raw as f32, dy: 0.0 });
        }
        store.remove(id(1));
        store.remove(id(3));
        assert_eq!(store.len(), 3);
        for raw in [0u64, 2, 4] {
            assert_eq!(store.get(id(raw)).map(|v| v.dx), Some(raw as f32));
        }
    }

    #[test]
    fn iter_mut_modifies_values() {
        let mut store = ComponentStorage::new();
        store.insert(id(7), Vel { dx: 1.0, dy: 1.0 });
        for (_, vel) in store.iter_mut() {
            vel.dx *= 3.0;
        }
        assert_eq!(store.get(id(7)).unwrap().dx, 3.0);
        let pairs: Vec<_> = store.iter().map(|(e, _)| e).collect();
        assert_eq!(pairs, vec![id(7)]);
    }
}
