//! Dawn ECS -- entity registry, sparse component stores and a
//! dependency-ordered system scheduler.
//!
//! Entities are plain monotonic ids. Each component kind lives in its own
//! sparse-set store. Systems declare the components they operate on and which
//! systems must run before them; the [`Scheduler`](schedule::Scheduler) turns
//! those declarations into a stable execution order and visits every
//! candidate entity once per update.
//!
//! # Quick Start
//!
//! ```
//! use dawn_ecs::prelude::*;
//!
//! #[derive(Debug, Clone, PartialEq)]
//! struct Position { x: f32, y: f32 }
//!
//! #[derive(Debug, Clone, PartialEq)]
//! struct Velocity { dx: f32, dy: f32 }
//!
//! let mut world = World::new();
//! world.register_component::<Position>("position");
//! world.register_component::<Velocity>("velocity");
//!
//! let entity = world.spawn_bundle(
//!     ComponentBundle::new()
//!         .with(Position { x: 0.0, y: 0.0 })
//!         .with(Velocity { dx: 1.0, dy: 0.0 }),
//! );
//!
//! assert_eq!(world.get::<Position>(entity), Some(&Position { x: 0.0, y: 0.0 }));
//!
//! world.remove_entity(entity);
//! assert!(world.find_entity(entity).is_none());
//! assert!(!world.has::<Velocity>(entity));
//! ```

#![deny(unsafe_code)]

pub mod command;
pub mod component;
pub mod entity;
pub mod schedule;
pub mod system;
pub mod world;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors produced by entity and component operations.
#[derive(Debug, thiserror::Error)]
pub enum EcsError {
    /// An entity with this id is already alive.
    #[error("entity {entity} already exists")]
    DuplicateId {
        /// The id that was already in use.
        entity: entity::EntityId,
    },

    /// The entity does not exist (removed or never created).
    #[error("entity {entity} does not exist")]
    StaleEntity {
        /// The id that failed to resolve.
        entity: entity::EntityId,
    },
}

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::command::{ApplyReport, Command, CommandBuffer};
    pub use crate::component::{
        Component, ComponentInfo, ComponentKind, ComponentRegistry, ComponentStorage,
        ComponentTypeId,
    };
    pub use crate::entity::{EntityAllocator, EntityId};
    pub use crate::schedule::{ScheduleError, Scheduler, SystemTiming, UpdateDiagnostics};
    pub use crate::system::{System, SystemContext, SystemKind, SystemRequirements};
    pub use crate::world::{ComponentBundle, EntityRef, World};
    pub use crate::EcsError;
}
