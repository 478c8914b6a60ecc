//! Scene manager subsystem: the ECS world plus its system scheduler.

use dawn_ecs::entity::EntityId;
use dawn_ecs::schedule::{ScheduleError, Scheduler};
use dawn_ecs::system::System;
use dawn_ecs::world::{ComponentBundle, EntityRef, World};
use dawn_ecs::EcsError;

use crate::context::Subsystem;

/// Owns the [`World`] and the [`Scheduler`] that runs systems over it.
#[derive(Debug, Default)]
pub struct SceneManager {
    world: World,
    scheduler: Scheduler,
}

impl SceneManager {
    /// An empty scene with no systems.
    pub fn new() -> Self {
        Self::default()
    }

    // -- entities -----------------------------------------------------------

    /// Create an entity with a fresh id.
    pub fn create_entity(&mut self) -> EntityId {
        self.world.create_entity()
    }

    /// Create an entity under a reserved or replicated id.
    ///
    /// # Errors
    ///
    /// [`EcsError::DuplicateId`] if the id is alive.
    pub fn create_entity_with_id(&mut self, id: EntityId) -> Result<EntityId, EcsError> {
        self.world.create_entity_with_id(id)
    }

    /// Allocate an id without creating the entity.
    pub fn reserve_entity_id(&mut self) -> EntityId {
        self.world.reserve_entity_id()
    }

    /// Create an entity with components attached.
    pub fn spawn(&mut self, bundle: ComponentBundle) -> EntityId {
        self.world.spawn_bundle(bundle)
    }

    /// Look up a live entity.
    pub fn find_entity(&self, id: EntityId) -> Option<EntityRef<'_>> {
        self.world.find_entity(id)
    }

    /// Remove an entity and its components. Idempotent.
    pub fn remove_entity(&mut self, id: EntityId) -> bool {
        self.world.remove_entity(id)
    }

    /// The ECS world.
    pub fn world(&self) -> &World {
        &self.world
    }

    /// Mutable ECS world, for setup and for physics providers.
    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    // -- systems ------------------------------------------------------------

    /// Register a system.
    ///
    /// # Errors
    ///
    /// See [`Scheduler::add_system`].
    pub fn add_system<T: System>(&mut self, system: T) -> Result<&mut T, ScheduleError> {
        self.scheduler.add_system(system)
    }

    /// Unregister a system.
    ///
    /// # Errors
    ///
    /// See [`Scheduler::remove_system`].
    pub fn remove_system<T: System>(&mut self) -> Result<Option<T>, ScheduleError> {
        self.scheduler.remove_system::<T>()
    }

    /// The registered system of type `T`.
    pub fn system<T: System>(&self) -> Option<&T> {
        self.scheduler.system::<T>()
    }

    /// Mutable access to the registered system of type `T`.
    pub fn system_mut<T: System>(&mut self) -> Option<&mut T> {
        self.scheduler.system_mut::<T>()
    }

    /// The scheduler.
    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Freeze the system schedule.
    pub fn begin_main_loop(&mut self) {
        self.scheduler.begin_main_loop();
    }

    /// Run every system once with step `dt`.
    pub fn update(&mut self, dt: f64) {
        self.scheduler.update(&mut self.world, dt);
    }

    /// Step passed to the most recent update.
    pub fn last_dt(&self) -> f64 {
        self.scheduler.last_dt()
    }
}

impl Subsystem for SceneManager {
    fn name(&self) -> &'static str {
        "scene"
    }

    fn shutdown(&mut self) {
        tracing::debug!(entities = self.world.entity_count(), "scene shut down");
    }
}
