//! The [`World`] is the top-level container for the ECS. It owns the entity
//! allocator, the component registry, and one storage per component kind.
//!
//! Entities never own their components: the world keeps the association, and
//! removing an entity cascades through every storage.

use std::any::type_name;

use crate::component::{
    Component, ComponentKind, ComponentRegistry, ComponentStorage, ComponentTypeId, ErasedStorage,
};
use crate::entity::{EntityAllocator, EntityId};
use crate::EcsError;

// ---------------------------------------------------------------------------
// ComponentBundle
// ---------------------------------------------------------------------------

/// A single type-erased component value waiting to be attached.
trait BundleEntry: Send + Sync {
    fn kind(&self) -> ComponentKind;
    fn insert_into(self: Box<Self>, world: &mut World, entity: EntityId);
}

struct Entry<T>(T);

impl<T: Component> BundleEntry for Entry<T> {
    fn kind(&self) -> ComponentKind {
        ComponentKind::of::<T>()
    }

    fn insert_into(self: Box<Self>, world: &mut World, entity: EntityId) {
        world.storage_or_register::<T>().insert(entity, self.0);
    }
}

/// An ordered collection of component values attached to an entity in one
/// step. Adding a kind twice keeps the last value.
#[derive(Default)]
pub struct ComponentBundle {
    entries: Vec<Box<dyn BundleEntry>>,
}

impl ComponentBundle {
    /// Create an empty bundle.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a component value.
    pub fn add<T: Component>(&mut self, value: T) -> &mut Self {
        let kind = ComponentKind::of::<T>();
        self.entries.retain(|e| e.kind() != kind);
        self.entries.push(Box::new(Entry(value)));
        self
    }

    /// Builder-style [`add`](Self::add).
    pub fn with<T: Component>(mut self, value: T) -> Self {
        self.add(value);
        self
    }

    /// The component kinds in this bundle, in insertion order.
    pub fn kinds(&self) -> Vec<ComponentKind> {
        self.entries.iter().map(|e| e.kind()).collect()
    }

    /// Number of components in the bundle.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the bundle is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl std::fmt::Debug for ComponentBundle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComponentBundle")
            .field("kinds", &self.kinds())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// EntityRef
// ---------------------------------------------------------------------------

/// Borrowed view of a live entity, returned by [`World::find_entity`].
#[derive(Clone, Copy)]
pub struct EntityRef<'w> {
    world: &'w World,
    id: EntityId,
}

impl<'w> EntityRef<'w> {
    /// The entity's identifier.
    pub fn id(&self) -> EntityId {
        self.id
    }

    /// The entity's component of kind `T`, if attached.
    pub fn get<T: Component>(&self) -> Option<&'w T> {
        self.world.get::<T>(self.id)
    }

    /// Whether the entity has a component of kind `T`.
    pub fn has<T: Component>(&self) -> bool {
        self.world.has::<T>(self.id)
    }
}

impl std::fmt::Debug for EntityRef<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("EntityRef").field(&self.id).finish()
    }
}

// ---------------------------------------------------------------------------
// World
// ---------------------------------------------------------------------------

/// The ECS world: entity registry plus all component storages.
#[derive(Default)]
pub struct World {
    allocator: EntityAllocator,
    registry: ComponentRegistry,
    /// Indexed by [`ComponentTypeId`].
    storages: Vec<Box<dyn ErasedStorage>>,
}

impl World {
    /// Create an empty world.
    pub fn new() -> Self {
        Self::default()
    }

    // -- component registration ---------------------------------------------

    /// Register a component kind under a human-readable name.
    ///
    /// Registration is optional: unregistered kinds are registered lazily on
    /// first insert under their Rust type name.
    pub fn register_component<T: Component>(&mut self, name: &str) -> ComponentTypeId {
        let id = self.registry.register::<T>(name);
        if id.index() == self.storages.len() {
            self.storages.push(Box::new(ComponentStorage::<T>::new()));
        }
        id
    }

    /// Read-only access to the component registry.
    pub fn registry(&self) -> &ComponentRegistry {
        &self.registry
    }

    // -- entity lifecycle ---------------------------------------------------

    /// Create a new empty entity with a fresh identifier.
    pub fn create_entity(&mut self) -> EntityId {
        self.allocator.allocate()
    }

    /// Create an entity under a pre-allocated identifier, e.g. one reserved
    /// with [`reserve_entity_id`](Self::reserve_entity_id) or received from a
    /// remote peer.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::DuplicateId`] if an entity with that id is alive.
    pub fn create_entity_with_id(&mut self, id: EntityId) -> Result<EntityId, EcsError> {
        self.allocator.allocate_reserved(id)
    }

    /// Allocate an identifier without creating the entity.
    pub fn reserve_entity_id(&mut self) -> EntityId {
        self.allocator.reserve()
    }

    /// Create an entity and attach every component in `bundle`.
    pub fn spawn_bundle(&mut self, bundle: ComponentBundle) -> EntityId {
        let entity = self.create_entity();
        self.attach_bundle(entity, bundle);
        entity
    }

    /// Attach every component in `bundle` to a live entity.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::StaleEntity`] if the entity is not alive.
    pub fn insert_bundle(
        &mut self,
        entity: EntityId,
        bundle: ComponentBundle,
    ) -> Result<(), EcsError> {
        self.ensure_alive(entity)?;
        self.attach_bundle(entity, bundle);
        Ok(())
    }

    /// Look up a live entity.
    pub fn find_entity(&self, id: EntityId) -> Option<EntityRef<'_>> {
        self.is_alive(id).then_some(EntityRef { world: self, id })
    }

    /// Whether `id` refers to a live entity.
    pub fn is_alive(&self, id: EntityId) -> bool {
        self.allocator.is_alive(id)
    }

    /// Remove an entity and every component attached to it.
    ///
    /// Idempotent: returns `false` (and does nothing) if the entity is not
    /// alive.
    pub fn remove_entity(&mut self, id: EntityId) -> bool {
        if !self.allocator.deallocate(id) {
            return false;
        }
        for storage in &mut self.storages {
            storage.remove_entity(id);
        }
        true
    }

    /// Number of live entities.
    pub fn entity_count(&self) -> usize {
        self.allocator.alive_count()
    }

    /// All live entities in ascending id order.
    pub fn entities(&self) -> Vec<EntityId> {
        self.allocator.alive_sorted()
    }

    // -- component access ---------------------------------------------------

    /// Attach `value` to a live entity, replacing any previous value of the
    /// same kind. Returns the replaced value.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::StaleEntity`] if the entity is not alive.
    pub fn insert<T: Component>(&mut self, entity: EntityId, value: T) -> Result<Option<T>, EcsError> {
        self.ensure_alive(entity)?;
        Ok(self.storage_or_register::<T>().insert(entity, value))
    }

    /// The entity's component of kind `T`. Never allocates.
    pub fn get<T: Component>(&self, entity: EntityId) -> Option<&T> {
        self.storage::<T>()?.get(entity)
    }

    /// Mutable access to the entity's component of kind `T`.
    pub fn get_mut<T: Component>(&mut self, entity: EntityId) -> Option<&mut T> {
        self.storage_mut::<T>()?.get_mut(entity)
    }

    /// Whether the entity has a component of kind `T`.
    pub fn has<T: Component>(&self, entity: EntityId) -> bool {
        self.storage::<T>().is_some_and(|s| s.contains(entity))
    }

    /// Detach the entity's component of kind `T`. No-op if absent.
    pub fn remove<T: Component>(&mut self, entity: EntityId) -> Option<T> {
        self.storage_mut::<T>()?.remove(entity)
    }

    /// Detach a component identified only by its runtime kind.
    pub fn remove_kind(&mut self, entity: EntityId, kind: ComponentKind) -> bool {
        match self.registry.lookup_kind(kind) {
            Some(id) => self.storages[id.index()].remove_entity(entity),
            None => false,
        }
    }

    /// Lazily iterate `(entity, &T)` for every entity holding a `T`.
    ///
    /// Order is unspecified.
    pub fn iter<T: Component>(&self) -> impl Iterator<Item = (EntityId, &T)> + '_ {
        self.storage::<T>().into_iter().flat_map(|s| s.iter())
    }

    /// Lazily iterate `(entity, &mut T)` for every entity holding a `T`.
    pub fn iter_mut<T: Component>(&mut self) -> impl Iterator<Item = (EntityId, &mut T)> + '_ {
        self.storage_mut::<T>().into_iter().flat_map(|s| s.iter_mut())
    }

    /// Typed storage for component kind `T`, if any value was ever stored.
    pub fn storage<T: Component>(&self) -> Option<&ComponentStorage<T>> {
        let id = self.registry.lookup::<T>()?;
        self.storages[id.index()]
            .as_any()
            .downcast_ref::<ComponentStorage<T>>()
    }

    /// Mutable typed storage for component kind `T`.
    pub fn storage_mut<T: Component>(&mut self) -> Option<&mut ComponentStorage<T>> {
        let id = self.registry.lookup::<T>()?;
        self.storages[id.index()]
            .as_any_mut()
            .downcast_mut::<ComponentStorage<T>>()
    }

    // -- matching -----------------------------------------------------------

    /// Whether a live entity holds every kind in `kinds`.
    pub fn matches(&self, entity: EntityId, kinds: &[ComponentKind]) -> bool {
        self.is_alive(entity)
            && kinds.iter().all(|&kind| match self.registry.lookup_kind(kind) {
                Some(id) => self.storages[id.index()].contains(entity),
                None => false,
            })
    }

    /// Every live entity holding all of `kinds`, in ascending id order.
    ///
    /// An empty requirement set matches every live entity.
    pub fn entities_with(&self, kinds: &[ComponentKind]) -> Vec<EntityId> {
        let mut required = Vec::with_capacity(kinds.len());
        for &kind in kinds {
            match self.registry.lookup_kind(kind) {
                Some(id) => required.push(&self.storages[id.index()]),
                // Nothing has ever stored this kind, so nothing matches.
                None => return Vec::new(),
            }
        }

        let Some(smallest) = required.iter().min_by_key(|s| s.len()) else {
            return self.entities();
        };
        let mut matched: Vec<EntityId> = smallest
            .entities()
            .iter()
            .copied()
            .filter(|&e| required.iter().all(|s| s.contains(e)))
            .collect();
        matched.sort_unstable();
        matched
    }

    // -- internals ----------------------------------------------------------

    fn ensure_alive(&self, entity: EntityId) -> Result<(), EcsError> {
        if self.is_alive(entity) {
            Ok(())
        } else {
            Err(EcsError::StaleEntity { entity })
        }
    }

    fn attach_bundle(&mut self, entity: EntityId, bundle: ComponentBundle) {
        for entry in bundle.entries {
            entry.insert_into(self, entity);
        }
    }

    fn storage_or_register<T: Component>(&mut self) -> &mut ComponentStorage<T> {
        let id = match self.registry.lookup::<T>() {
            Some(id) => id,
            None => self.register_component::<T>(type_name::<T>()),
        };
        self.storages[id.index()]
            .as_any_mut()
            .downcast_mut::<ComponentStorage<T>>()
            .unwrap_or_else(|| unreachable!("storage type mismatch for {}", type_name::<T>()))
    }
}

impl std::fmt::Debug for World {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("World")
            .field("entities", &self.entity_count())
            .field("components", &self.registry.registered_names())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Position {
        x: f32,
        y: f32,
    }

    #[derive(Debug, Clone, PartialEq)]
    struct Velocity {
        dx: f32,
        dy: f32,
    }

    #[derive(Debug, Clone, PartialEq)]
    struct Health(u32);

    fn setup_world() -> World {
        let mut world = World::new();
        world.register_component::<Position>("position");
        world.register_component::<Velocity>("velocity");
        world
    }

    #[test]
    fn add_then_get_round_trips() {
        let mut world = setup_world();
        let e = world.create_entity();
        world.insert(e, Position { x: 1.0, y: 2.0 }).unwrap();
        assert_eq!(world.get::<Position>(e), Some(&Position { x: 1.0, y: 2.0 }));

        world.remove::<Position>(e);
        assert!(!world.has::<Position>(e));
    }

    #[test]
    fn insert_unregistered_kind_registers_lazily() {
        let mut world = World::new();
        let e = world.create_entity();
        world.insert(e, Health(10)).unwrap();
        assert_eq!(world.get::<Health>(e), Some(&Health(10)));
        assert!(world.registry().lookup::<Health>().is_some());
    }

    #[test]
    fn insert_on_dead_entity_is_an_error() {
        let mut world = setup_world();
        let e = world.create_entity();
        world.remove_entity(e);
        let err = world.insert(e, Health(1)).unwrap_err();
        assert!(matches!(err, EcsError::StaleEntity { .. }));
    }

    #[test]
    fn remove_entity_cascades_to_every_storage() {
        let mut world = setup_world();
        let e = world.spawn_bundle(
            ComponentBundle::new()
                .with(Position { x: 0.0, y: 0.0 })
                .with(Velocity { dx: 1.0, dy: 1.0 })
                .with(Health(3)),
        );
        assert!(world.remove_entity(e));
        assert!(world.find_entity(e).is_none());
        assert!(!world.has::<Position>(e));
        assert!(!world.has::<Velocity>(e));
        assert!(!world.has::<Health>(e));
        assert_eq!(world.iter::<Health>().count(), 0);
    }

    #[test]
    fn remove_entity_is_idempotent() {
        let mut world = setup_world();
        let e = world.create_entity();
        assert!(world.remove_entity(e));
        assert!(!world.remove_entity(e));
        assert_eq!(world.entity_count(), 0);
    }

    #[test]
    fn create_with_reserved_id() {
        let mut world = setup_world();
        let reserved = world.reserve_entity_id();
        assert!(world.find_entity(reserved).is_none());

        world.create_entity_with_id(reserved).unwrap();
        assert_eq!(world.find_entity(reserved).map(|e| e.id()), Some(reserved));

        let err = world.create_entity_with_id(reserved).unwrap_err();
        assert!(matches!(err, EcsError::DuplicateId { .. }));
    }

    #[test]
    fn find_entity_exposes_components() {
        let mut world = setup_world();
        let e = world.spawn_bundle(ComponentBundle::new().with(Position { x: 4.0, y: 5.0 }));
        let found = world.find_entity(e).unwrap();
        assert!(found.has::<Position>());
        assert!(!found.has::<Velocity>());
        assert_eq!(found.get::<Position>().map(|p| p.x), Some(4.0));
    }

    #[test]
    fn entities_with_requires_full_set() {
        let mut world = setup_world();
        let both = world.spawn_bundle(
            ComponentBundle::new()
                .with(Position { x: 0.0, y: 0.0 })
                .with(Velocity { dx: 0.0, dy: 0.0 }),
        );
        let _only_pos = world.spawn_bundle(ComponentBundle::new().with(Position { x: 0.0, y: 0.0 }));

        let kinds = [ComponentKind::of::<Position>(), ComponentKind::of::<Velocity>()];
        assert_eq!(world.entities_with(&kinds), vec![both]);
        assert!(world.matches(both, &kinds));
    }

    #[test]
    fn entities_with_unknown_kind_matches_nothing() {
        let mut world = setup_world();
        world.create_entity();
        assert!(world.entities_with(&[ComponentKind::of::<Health>()]).is_empty());
        assert_eq!(world.entities_with(&[]).len(), 1);
    }

    #[test]
    fn bundle_keeps_last_value_per_kind() {
        let bundle = ComponentBundle::new().with(Health(1)).with(Health(2));
        assert_eq!(bundle.len(), 1);
        let mut world = World::new();
        let e = world.spawn_bundle(bundle);
        assert_eq!(world.get::<Health>(e), Some(&Health(2)));
    }

    #[test]
    fn iter_mut_updates_in_place() {
        let mut world = setup_world();
        let e = world.spawn_bundle(ComponentBundle::new().with(Velocity { dx: 1.0, dy: 2.0 }));
        for (_, vel) in world.iter_mut::<Velocity>() {
            vel.dx = 10.0;
        }
        assert_eq!(world.get::<Velocity>(e).map(|v| v.dx), Some(10.0));
    }
}
