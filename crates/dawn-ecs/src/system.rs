//! The [`System`] trait and the context systems run in.
//!
//! A system declares which component kinds an entity needs to be processed
//! ([`SystemRequirements::supports`]) and which other systems must run before
//! it ([`SystemRequirements::executes_after`]). The
//! [`Scheduler`](crate::schedule::Scheduler) calls
//! [`begin_processing`](System::begin_processing) once per update and then
//! [`process`](System::process) once per candidate entity.

use std::any::{type_name, Any, TypeId};
use std::fmt;

use crate::command::CommandBuffer;
use crate::component::{Component, ComponentKind, ComponentStorage};
use crate::entity::EntityId;
use crate::world::{ComponentBundle, EntityRef, World};

// ---------------------------------------------------------------------------
// SystemKind
// ---------------------------------------------------------------------------

/// Runtime key for a system type.
#[derive(Clone, Copy)]
pub struct SystemKind {
    type_id: TypeId,
    name: &'static str,
}

impl SystemKind {
    /// The kind of system type `S`.
    pub fn of<S: System>() -> Self {
        Self {
            type_id: TypeId::of::<S>(),
            name: type_name::<S>(),
        }
    }

    /// Rust `TypeId` of the system type.
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Rust type name of the system type.
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for SystemKind {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id
    }
}

impl Eq for SystemKind {}

impl fmt::Debug for SystemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SystemKind({})", self.name)
    }
}

// ---------------------------------------------------------------------------
// SystemRequirements
// ---------------------------------------------------------------------------

/// What a system needs: a component set and a list of predecessor systems.
///
/// ```
/// use dawn_ecs::prelude::*;
///
/// struct Transform;
/// struct Velocity;
///
/// let reqs = SystemRequirements::new()
///     .supports::<Transform>()
///     .supports::<Velocity>();
/// assert_eq!(reqs.components().len(), 2);
/// ```
#[derive(Debug, Clone, Default)]
pub struct SystemRequirements {
    components: Vec<ComponentKind>,
    after: Vec<SystemKind>,
}

impl SystemRequirements {
    /// Empty requirements: matches every entity, no ordering constraints.
    pub fn new() -> Self {
        Self::default()
    }

    /// Require component kind `T` on candidate entities.
    pub fn supports<T: Component>(mut self) -> Self {
        let kind = ComponentKind::of::<T>();
        if !self.components.contains(&kind) {
            self.components.push(kind);
        }
        self
    }

    /// Run after system `S` whenever both are registered.
    pub fn executes_after<S: System>(mut self) -> Self {
        let kind = SystemKind::of::<S>();
        if !self.after.contains(&kind) {
            self.after.push(kind);
        }
        self
    }

    /// Required component kinds.
    pub fn components(&self) -> &[ComponentKind] {
        &self.components
    }

    /// Systems that must run first.
    pub fn after(&self) -> &[SystemKind] {
        &self.after
    }
}

// ---------------------------------------------------------------------------
// System
// ---------------------------------------------------------------------------

/// A stateful unit of per-entity logic.
pub trait System: 'static {
    /// The component set and ordering constraints of this system. Read once,
    /// when the system is added to a scheduler.
    fn requirements(&self) -> SystemRequirements;

    /// Name used in logs and diagnostics.
    fn name(&self) -> &'static str {
        type_name::<Self>()
    }

    /// Called once when the system is registered.
    fn initialise(&mut self) {}

    /// Called once per update, before any entity is processed, even when no
    /// entity matches.
    fn begin_processing(&mut self, _ctx: &mut SystemContext<'_>) {}

    /// Called once per update for every entity that held the full required
    /// component set when the update began.
    fn process(&mut self, ctx: &mut SystemContext<'_>, entity: EntityId, dt: f64);
}

/// Object-safe wrapper adding downcasting to boxed systems.
pub(crate) trait ErasedSystem {
    fn system_mut(&mut self) -> &mut dyn System;
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
    fn into_any(self: Box<Self>) -> Box<dyn Any>;
}

impl<S: System> ErasedSystem for S {
    fn system_mut(&mut self) -> &mut dyn System {
        self
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}

// ---------------------------------------------------------------------------
// SystemContext
// ---------------------------------------------------------------------------

/// What a system can touch while it runs.
///
/// Component *values* can be read and modified in place. Structural changes
/// (spawning, despawning, attaching or detaching components) go through the
/// deferred [`CommandBuffer`] and become visible on the next update.
pub struct SystemContext<'a> {
    world: &'a mut World,
    commands: &'a mut CommandBuffer,
    dt: f64,
}

impl<'a> SystemContext<'a> {
    /// Build a context over `world` that queues into `commands`.
    pub fn new(world: &'a mut World, commands: &'a mut CommandBuffer, dt: f64) -> Self {
        Self {
            world,
            commands,
            dt,
        }
    }

    /// Fixed step of the current update, in seconds.
    pub fn dt(&self) -> f64 {
        self.dt
    }

    /// Read-only view of the world.
    pub fn world(&self) -> &World {
        self.world
    }

    /// The entity's component of kind `T`.
    pub fn get<T: Component>(&self, entity: EntityId) -> Option<&T> {
        self.world.get::<T>(entity)
    }

    /// Mutable access to the entity's component of kind `T`.
    pub fn get_mut<T: Component>(&mut self, entity: EntityId) -> Option<&mut T> {
        self.world.get_mut::<T>(entity)
    }

    /// Whether the entity has a component of kind `T`.
    pub fn has<T: Component>(&self, entity: EntityId) -> bool {
        self.world.has::<T>(entity)
    }

    /// Look up a live entity.
    pub fn find_entity(&self, id: EntityId) -> Option<EntityRef<'_>> {
        self.world.find_entity(id)
    }

    /// Typed storage for kind `T`, for whole-storage scans.
    pub fn storage<T: Component>(&self) -> Option<&ComponentStorage<T>> {
        self.world.storage::<T>()
    }

    /// Every live entity holding all of `kinds`.
    pub fn entities_with(&self, kinds: &[ComponentKind]) -> Vec<EntityId> {
        self.world.entities_with(kinds)
    }

    /// Reserve an id now and queue creation of the entity for the end of the
    /// update.
    pub fn spawn(&mut self, bundle: ComponentBundle) -> EntityId {
        let entity = self.world.reserve_entity_id();
        self.commands.spawn(entity, bundle);
        entity
    }

    /// Queue attaching `value` to `entity`.
    pub fn insert<T: Component>(&mut self, entity: EntityId, value: T) {
        self.commands.insert(entity, value);
    }

    /// Queue detaching kind `T` from `entity`.
    pub fn remove<T: Component>(&mut self, entity: EntityId) {
        self.commands.remove::<T>(entity);
    }

    /// Queue removal of `entity`.
    pub fn despawn(&mut self, entity: EntityId) {
        self.commands.despawn(entity);
    }

    /// Direct access to the deferred command buffer.
    pub fn commands(&mut self) -> &mut CommandBuffer {
        self.commands
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
