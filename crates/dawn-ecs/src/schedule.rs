//! System registry and dependency-ordered scheduler.
//!
//! The [`Scheduler`] owns one instance per system type and keeps an execution
//! order that is a topological sort of the declared `executes_after` edges.
//! Systems with no relative constraint run in registration order.
//!
//! Each [`update`](Scheduler::update):
//!
//! 1. For every system in execution order, calls `begin_processing` once and
//!    then `process` for each entity holding the system's required components.
//! 2. Applies the deferred [`CommandBuffer`] to the world (FIFO).
//!
//! Because structural changes only land in step 2, an entity spawned or
//! completed during an update is first visited on the following update.
//!
//! # Example
//!
//! ```
//! use dawn_ecs::prelude::*;
//!
//! struct Position(f64);
//! struct Velocity(f64);
//!
//! struct Integrate;
//!
//! impl System for Integrate {
//!     fn requirements(&self) -> SystemRequirements {
//!         SystemRequirements::new().supports::<Position>().supports::<Velocity>()
//!     }
//!
//!     fn process(&mut self, ctx: &mut SystemContext<'_>, entity: EntityId, dt: f64) {
//!         let v = ctx.get::<Velocity>(entity).map_or(0.0, |v| v.0);
//!         if let Some(p) = ctx.get_mut::<Position>(entity) {
//!             p.0 += v * dt;
//!         }
//!     }
//! }
//!
//! let mut world = World::new();
//! let e = world.spawn_bundle(ComponentBundle::new().with(Position(0.0)).with(Velocity(2.0)));
//!
//! let mut scheduler = Scheduler::new();
//! scheduler.add_system(Integrate).unwrap();
//! scheduler.update(&mut world, 0.5);
//!
//! assert_eq!(world.get::<Position>(e).map(|p| p.0), Some(1.0));
//! ```

use std::any::TypeId;
use std::collections::BTreeSet;
use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::command::{ApplyReport, CommandBuffer};
use crate::system::{ErasedSystem, System, SystemContext, SystemKind, SystemRequirements};
use crate::world::World;

// ---------------------------------------------------------------------------
// ScheduleError
// ---------------------------------------------------------------------------

/// Errors produced while editing the schedule.
#[derive(Debug, thiserror::Error)]
pub enum ScheduleError {
    /// Adding the system would close a dependency cycle. The schedule is left
    /// as it was before the call.
    #[error("system `{system}` closes a dependency cycle: {}", .cycle.join(" -> "))]
    CyclicDependency {
        /// The system whose registration was rejected.
        system: String,
        /// Names along the cycle, first name repeated at the end.
        cycle: Vec<String>,
    },

    /// A system of this type is already registered.
    #[error("system `{system}` is already registered")]
    DuplicateSystem {
        /// Name of the duplicate system.
        system: String,
    },

    /// The schedule was finalized by `begin_main_loop`.
    #[error("cannot add or remove system `{system}` after the main loop has begun")]
    ScheduleLocked {
        /// Name of the system the caller tried to add or remove.
        system: String,
    },
}

// ---------------------------------------------------------------------------
// Diagnostics
// ---------------------------------------------------------------------------

/// Timing for one system during the last update.
#[derive(Debug, Clone)]
pub struct SystemTiming {
    /// System name.
    pub name: &'static str,
    /// Wall time spent in `begin_processing` plus all `process` calls.
    pub duration: Duration,
    /// Number of candidate entities processed.
    pub entities: usize,
}

/// Timing diagnostics for the last update.
#[derive(Debug, Clone, Default)]
pub struct UpdateDiagnostics {
    /// Per-system timings, in execution order.
    pub system_times: Vec<SystemTiming>,
    /// Time spent applying deferred commands.
    pub command_apply_time: Duration,
    /// Outcome of applying deferred commands.
    pub commands: ApplyReport,
    /// Total time for the update.
    pub total_time: Duration,
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

struct SystemSlot {
    kind: SystemKind,
    name: &'static str,
    requirements: SystemRequirements,
    system: Box<dyn ErasedSystem>,
}

/// Registry of systems plus their resolved execution order.
#[derive(Default)]
pub struct Scheduler {
    /// Registered systems, in registration order.
    slots: Vec<SystemSlot>,
    /// Indices into `slots`, in execution order.
    order: Vec<usize>,
    locked: bool,
    commands: CommandBuffer,
    last_dt: f64,
    last_diagnostics: UpdateDiagnostics,
}

impl Scheduler {
    /// Create an empty, unlocked scheduler.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `system`, recompute the execution order and call the
    /// system's `initialise` hook.
    ///
    /// Dependencies on systems that are not registered yet are remembered and
    /// enforced once they are.
    ///
    /// # Errors
    ///
    /// - [`ScheduleError::ScheduleLocked`] after [`begin_main_loop`](Self::begin_main_loop).
    /// - [`ScheduleError::DuplicateSystem`] if a system of type `T` exists.
    /// - [`ScheduleError::CyclicDependency`] if the new edges close a cycle.
    ///
    /// On error the schedule is unchanged.
    pub fn add_system<T: System>(&mut self, system: T) -> Result<&mut T, ScheduleError> {
        let name = system.name();
        if self.locked {
            return Err(ScheduleError::ScheduleLocked {
                system: name.to_owned(),
            });
        }
        if self.position::<T>().is_some() {
            return Err(ScheduleError::DuplicateSystem {
                system: name.to_owned(),
            });
        }

        self.slots.push(SystemSlot {
            kind: SystemKind::of::<T>(),
            name,
            requirements: system.requirements(),
            system: Box::new(system),
        });

        match resolve_order(&self.slots) {
            Ok(order) => self.order = order,
            Err(cycle) => {
                self.slots.pop();
                return Err(ScheduleError::CyclicDependency {
                    system: name.to_owned(),
                    cycle,
                });
            }
        }
        debug!(system = name, order = ?self.execution_order(), "system added");

        let slot = self.slots.len() - 1;
        self.slots[slot].system.system_mut().initialise();
        match self.slots[slot].system.as_any_mut().downcast_mut::<T>() {
            Some(system) => Ok(system),
            None => unreachable!("slot holds a system of a different type"),
        }
    }

    /// Unregister the system of type `T` and hand it back.
    ///
    /// Returns `Ok(None)` if no such system is registered.
    ///
    /// # Errors
    ///
    /// [`ScheduleError::ScheduleLocked`] after
    /// [`begin_main_loop`](Self::begin_main_loop).
    pub fn remove_system<T: System>(&mut self) -> Result<Option<T>, ScheduleError> {
        let Some(index) = self.position::<T>() else {
            return Ok(None);
        };
        if self.locked {
            return Err(ScheduleError::ScheduleLocked {
                system: self.slots[index].name.to_owned(),
            });
        }

        let slot = self.slots.remove(index);
        // Dropping a node cannot introduce a cycle.
        self.order = resolve_order(&self.slots).unwrap_or_else(|_| (0..self.slots.len()).collect());
        debug!(system = slot.name, order = ?self.execution_order(), "system removed");

        Ok(slot.system.into_any().downcast::<T>().ok().map(|boxed| *boxed))
    }

    /// Freeze the schedule. Called once before the first update; later calls
    /// are no-ops.
    pub fn begin_main_loop(&mut self) {
        if self.locked {
            return;
        }
        self.locked = true;
        info!(
            systems = self.slots.len(),
            order = ?self.execution_order(),
            "schedule finalized"
        );
    }

    /// Run one update with step `dt`, then apply deferred commands.
    ///
    /// Finalizes the schedule first if [`begin_main_loop`](Self::begin_main_loop)
    /// has not been called.
    pub fn update(&mut self, world: &mut World, dt: f64) {
        if !self.locked {
            self.begin_main_loop();
        }

        let update_start = Instant::now();
        let mut system_times = Vec::with_capacity(self.order.len());

        for &index in &self.order {
            let slot = &mut self.slots[index];
            let sys_start = Instant::now();

            let candidates = world.entities_with(slot.requirements.components());
            let mut ctx = SystemContext::new(world, &mut self.commands, dt);
            let system = slot.system.system_mut();
            system.begin_processing(&mut ctx);
            for &entity in &candidates {
                system.process(&mut ctx, entity, dt);
            }

            system_times.push(SystemTiming {
                name: slot.name,
                duration: sys_start.elapsed(),
                entities: candidates.len(),
            });
        }

        let apply_start = Instant::now();
        let commands = self.commands.apply(world);
        let command_apply_time = apply_start.elapsed();

        self.last_dt = dt;
        self.last_diagnostics = UpdateDiagnostics {
            system_times,
            command_apply_time,
            commands,
            total_time: update_start.elapsed(),
        };
    }

    // -- accessors ----------------------------------------------------------

    /// The registered system of type `T`.
    pub fn system<T: System>(&self) -> Option<&T> {
        let index = self.position::<T>()?;
        self.slots[index].system.as_any().downcast_ref::<T>()
    }

    /// Mutable access to the registered system of type `T`.
    pub fn system_mut<T: System>(&mut self) -> Option<&mut T> {
        let index = self.position::<T>()?;
        self.slots[index].system.as_any_mut().downcast_mut::<T>()
    }

    /// Whether a system of type `T` is registered.
    pub fn contains<T: System>(&self) -> bool {
        self.position::<T>().is_some()
    }

    /// System names in execution order.
    pub fn execution_order(&self) -> Vec<&'static str> {
        self.order.iter().map(|&i| self.slots[i].name).collect()
    }

    /// Number of registered systems.
    pub fn system_count(&self) -> usize {
        self.slots.len()
    }

    /// Whether [`begin_main_loop`](Self::begin_main_loop) has run.
    pub fn is_locked(&self) -> bool {
        self.locked
    }

    /// Step passed to the most recent update, or 0.0 before the first one.
    pub fn last_dt(&self) -> f64 {
        self.last_dt
    }

    /// Diagnostics from the most recent update.
    pub fn last_diagnostics(&self) -> &UpdateDiagnostics {
        &self.last_diagnostics
    }

    fn position<T: System>(&self) -> Option<usize> {
        let id = TypeId::of::<T>();
        self.slots.iter().position(|s| s.kind.type_id() == id)
    }
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("order", &self.execution_order())
            .field("locked", &self.locked)
            .field("pending_commands", &self.commands.len())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Ordering
// ---------------------------------------------------------------------------

/// Stable topological sort of `slots` (Kahn's algorithm, lowest registration
/// index first among ready systems).
///
/// On failure returns the names along one cycle.
fn resolve_order(slots: &[SystemSlot]) -> Result<Vec<usize>, Vec<String>> {
    let n = slots.len();
    // deps[i]: registered systems that must run before i.
    let deps: Vec<Vec<usize>> = slots
        .iter()
        .map(|slot| {
            slot.requirements
                .after()
                .iter()
                .filter_map(|kind| slots.iter().position(|s| s.kind == *kind))
                .collect()
        })
        .collect();

    let mut indegree: Vec<usize> = deps.iter().map(Vec::len).collect();
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); n];
    for (i, ds) in deps.iter().enumerate() {
        for &d in ds {
            dependents[d].push(i);
        }
    }

    let mut ready: BTreeSet<usize> = (0..n).filter(|&i| indegree[i] == 0).collect();
    let mut order = Vec::with_capacity(n);
    while let Some(next) = ready.pop_first() {
        order.push(next);
        for &dependent in &dependents[next] {
            indegree[dependent] -= 1;
            if indegree[dependent] == 0 {
                ready.insert(dependent);
            }
        }
    }

    if order.len() == n {
        return Ok(order);
    }

    let stuck: Vec<bool> = indegree.iter().map(|&d| d > 0).collect();
    let cycle = find_cycle(&deps, &stuck).unwrap_or_default();
    Err(cycle.into_iter().map(|i| slots[i].name.to_owned()).collect())
}

/// Depth-first search over `deps` restricted to `stuck` nodes, returning the
/// first back edge's cycle with its start repeated at the end.
fn find_cycle(deps: &[Vec<usize>], stuck: &[bool]) -> Option<Vec<usize>> {
    fn dfs(
        node: usize,
        deps: &[Vec<usize>],
        stuck: &[bool],
        visited: &mut [bool],
        path: &mut Vec<usize>,
    ) -> Option<Vec<usize>> {
        if let Some(start) = path.iter().position(|&p| p == node) {
            let mut cycle = path[start..].to_vec();
            cycle.push(node);
            return Some(cycle);
        }
        if visited[node] {
            return None;
        }
        visited[node] = true;
        path.push(node);
        for &dep in &deps[node] {
            if stuck[dep] {
                if let Some(cycle) = dfs(dep, deps, stuck, visited, path) {
                    return Some(cycle);
                }
            }
        }
        path.pop();
        None
    }

    let mut visited = vec![false; deps.len()];
    (0..deps.len())
        .filter(|&i| stuck[i])
        .find_map(|i| dfs(i, deps, stuck, &mut visited, &mut Vec::new()))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
