//! Command buffer for deferred structural ECS mutations.
//!
//! Systems never change which entities exist or which components they hold
//! while an update is running. Instead they queue [`Command`]s; the scheduler
//! applies the buffer in FIFO order once every system has run. This is what
//! makes a newly spawned entity (or a newly completed component set) visible
//! only from the *next* update onwards.
//!
//! # Example
//!
//! ```
//! use dawn_ecs::prelude::*;
//!
//! #[derive(Debug, PartialEq)]
//! struct Health(u32);
//!
//! let mut world = World::new();
//! let entity = world.create_entity();
//!
//! let mut cmds = CommandBuffer::new();
//! cmds.insert(entity, Health(50));
//! assert!(!world.has::<Health>(entity));
//!
//! let report = cmds.apply(&mut world);
//! assert_eq!(report.applied, 1);
//! assert_eq!(world.get::<Health>(entity), Some(&Health(50)));
//! ```

use tracing::warn;

use crate::component::{Component, ComponentKind};
use crate::entity::EntityId;
use crate::world::{ComponentBundle, World};

// ---------------------------------------------------------------------------
// Command
// ---------------------------------------------------------------------------

/// A single deferred mutation.
#[derive(Debug)]
pub enum Command {
    /// Create an entity under an already reserved id and attach a bundle.
    Spawn {
        /// The reserved id the entity will live under.
        entity: EntityId,
        /// Components attached on creation.
        bundle: ComponentBundle,
    },
    /// Attach (or replace) components on a live entity.
    Insert {
        /// Target entity.
        entity: EntityId,
        /// Components to attach.
        bundle: ComponentBundle,
    },
    /// Detach one component kind from an entity.
    Remove {
        /// Target entity.
        entity: EntityId,
        /// Kind to detach.
        kind: ComponentKind,
    },
    /// Remove an entity and all of its components.
    Despawn {
        /// Target entity.
        entity: EntityId,
    },
}

impl Command {
    /// The entity this command targets.
    pub fn entity(&self) -> EntityId {
        match self {
            Command::Spawn { entity, .. }
            | Command::Insert { entity, .. }
            | Command::Remove { entity, .. }
            | Command::Despawn { entity } => *entity,
        }
    }

    /// Short label used in diagnostics.
    pub fn label(&self) -> &'static str {
        match self {
            Command::Spawn { .. } => "spawn",
            Command::Insert { .. } => "insert",
            Command::Remove { .. } => "remove",
            Command::Despawn { .. } => "despawn",
        }
    }
}

// ---------------------------------------------------------------------------
// ApplyReport
// ---------------------------------------------------------------------------

/// Outcome of [`CommandBuffer::apply`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplyReport {
    /// Commands that changed the world.
    pub applied: usize,
    /// Commands skipped because their target was dead or already alive.
    pub skipped: usize,
}

// ---------------------------------------------------------------------------
// CommandBuffer
// ---------------------------------------------------------------------------

/// FIFO queue of deferred world mutations.
#[derive(Debug, Default)]
pub struct CommandBuffer {
    commands: Vec<Command>,
}

impl CommandBuffer {
    /// Create an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue creation of an entity under `entity`, which must have been
    /// obtained from [`World::reserve_entity_id`].
    pub fn spawn(&mut self, entity: EntityId, bundle: ComponentBundle) {
        self.commands.push(Command::Spawn { entity, bundle });
    }

    /// Queue attaching `value` to `entity`.
    pub fn insert<T: Component>(&mut self, entity: EntityId, value: T) {
        self.insert_bundle(entity, ComponentBundle::new().with(value));
    }

    /// Queue attaching every component in `bundle` to `entity`.
    pub fn insert_bundle(&mut self, entity: EntityId, bundle: ComponentBundle) {
        self.commands.push(Command::Insert { entity, bundle });
    }

    /// Queue detaching component kind `T` from `entity`.
    pub fn remove<T: Component>(&mut self, entity: EntityId) {
        self.commands.push(Command::Remove {
            entity,
            kind: ComponentKind::of::<T>(),
        });
    }

    /// Queue removal of `entity`.
    pub fn despawn(&mut self, entity: EntityId) {
        self.commands.push(Command::Despawn { entity });
    }

    /// Push a pre-built command.
    pub fn push(&mut self, command: Command) {
        self.commands.push(command);
    }

    /// Number of queued commands.
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// Whether no commands are queued.
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Drop every queued command without applying it.
    pub fn clear(&mut self) {
        self.commands.clear();
    }

    /// Apply all commands to the world in insertion order and clear the
    /// buffer.
    ///
    /// Commands targeting dead entities (or spawning an id that is already
    /// alive) are logged and skipped; they never abort the batch.
    pub fn apply(&mut self, world: &mut World) -> ApplyReport {
        let mut report = ApplyReport::default();

        for command in self.commands.drain(..) {
            let entity = command.entity();
            let label = command.label();
            let ok = match command {
                Command::Spawn { entity, bundle } => {
                    world.create_entity_with_id(entity).is_ok()
                        && world.insert_bundle(entity, bundle).is_ok()
                }
                Command::Insert { entity, bundle } => world.insert_bundle(entity, bundle).is_ok(),
                Command::Remove { entity, kind } => {
                    // Removing an absent component is a no-op, not a failure.
                    world.remove_kind(entity, kind);
                    world.is_alive(entity)
                }
                Command::Despawn { entity } => world.remove_entity(entity),
            };

            if ok {
                report.applied += 1;
            } else {
                report.skipped += 1;
                warn!(%entity, command = label, "command skipped: target entity in wrong lifecycle state");
            }
        }

        report
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Health(u32);

    #[derive(Debug, Clone, PartialEq)]
    struct Tag;

    #[test]
    fn commands_apply_in_fifo_order() {
        let mut world = World::new();
        let e = world.create_entity();

        let mut cmds = CommandBuffer::new();
        cmds.insert(e, Health(1));
        cmds.insert(e, Health(2));
        cmds.insert(e, Health(3));
        let report = cmds.apply(&mut world);

        assert_eq!(report.applied, 3);
        assert_eq!(world.get::<Health>(e), Some(&Health(3)));
        assert!(cmds.is_empty());
    }

    #[test]
    fn spawn_materializes_reserved_id() {
        let mut world = World::new();
        let reserved = world.reserve_entity_id();

        let mut cmds = CommandBuffer::new();
        cmds.spawn(reserved, ComponentBundle::new().with(Health(9)));
        // Later commands in the same batch may target the reserved id.
        cmds.insert(reserved, Tag);
        assert!(!world.is_alive(reserved));

        cmds.apply(&mut world);
        assert!(world.is_alive(reserved));
        assert_eq!(world.get::<Health>(reserved), Some(&Health(9)));
        assert!(world.has::<Tag>(reserved));
    }

    #[test]
    fn commands_on_dead_entities_are_skipped() {
        let mut world = World::new();
        let e = world.create_entity();
        world.remove_entity(e);

        let mut cmds = CommandBuffer::new();
        cmds.insert(e, Health(1));
        cmds.remove::<Health>(e);
        cmds.despawn(e);
        let report = cmds.apply(&mut world);

        assert_eq!(report, ApplyReport { applied: 0, skipped: 3 });
        assert_eq!(world.entity_count(), 0);
    }

    #[test]
    fn despawn_then_insert_in_same_batch_skips_insert() {
        let mut world = World::new();
        let e = world.create_entity();

        let mut cmds = CommandBuffer::new();
        cmds.despawn(e);
        cmds.insert(e, Health(5));
        let report = cmds.apply(&mut world);

        assert_eq!(report.applied, 1);
        assert_eq!(report.skipped, 1);
        assert!(!world.has::<Health>(e));
    }

    #[test]
    fn remove_detaches_component() {
        let mut world = World::new();
        let e = world.create_entity();
        world.insert(e, Health(4)).unwrap();

        let mut cmds = CommandBuffer::new();
        cmds.remove::<Health>(e);
        cmds.apply(&mut world);
        assert!(!world.has::<Health>(e));
        assert!(world.is_alive(e));
    }
}
