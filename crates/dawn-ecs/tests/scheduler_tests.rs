//! End-to-end scheduler scenarios: several systems sharing a world, with
//! deferred spawns and despawns crossing update boundaries.

use dawn_ecs::prelude::*;

#[derive(Debug, Clone, PartialEq)]
struct Position(f64);

#[derive(Debug, Clone, PartialEq)]
struct Velocity(f64);

#[derive(Debug, Clone, PartialEq)]
struct Health(i32);

#[derive(Debug, Clone, PartialEq)]
struct Projectile {
    damage: i32,
    target: EntityId,
}

// ---------------------------------------------------------------------------
// Systems
// ---------------------------------------------------------------------------

struct Movement;

impl System for Movement {
    fn requirements(&self) -> SystemRequirements {
        SystemRequirements::new()
            .supports::<Position>()
            .supports::<Velocity>()
    }

    fn process(&mut self, ctx: &mut SystemContext<'_>, entity: EntityId, dt: f64) {
        let v = ctx.get::<Velocity>(entity).map_or(0.0, |v| v.0);
        if let Some(p) = ctx.get_mut::<Position>(entity) {
            p.0 += v * dt;
        }
    }
}

/// Applies projectile damage once, then removes the projectile.
struct Impact;

impl System for Impact {
    fn requirements(&self) -> SystemRequirements {
        SystemRequirements::new()
            .supports::<Projectile>()
            .executes_after::<Movement>()
    }

    fn process(&mut self, ctx: &mut SystemContext<'_>, entity: EntityId, _dt: f64) {
        let Some(hit) = ctx.get::<Projectile>(entity).cloned() else {
            return;
        };
        if ctx.find_entity(hit.target).is_some() {
            if let Some(h) = ctx.get_mut::<Health>(hit.target) {
                h.0 -= hit.damage;
            }
        }
        ctx.despawn(entity);
    }
}

/// Despawns anything whose health dropped to zero.
#[derive(Default)]
struct Reaper {
    reaped: Vec<EntityId>,
}

impl System for Reaper {
    fn requirements(&self) -> SystemRequirements {
        SystemRequirements::new()
            .supports::<Health>()
            .executes_after::<Impact>()
    }

    fn process(&mut self, ctx: &mut SystemContext<'_>, entity: EntityId, _dt: f64) {
        if ctx.get::<Health>(entity).is_some_and(|h| h.0 <= 0) {
            ctx.despawn(entity);
            self.reaped.push(entity);
        }
    }
}

/// Fires one projectile at every living target per update.
struct Turret;

impl System for Turret {
    fn requirements(&self) -> SystemRequirements {
        SystemRequirements::new().supports::<Health>()
    }

    fn process(&mut self, ctx: &mut SystemContext<'_>, entity: EntityId, _dt: f64) {
        ctx.spawn(ComponentBundle::new().with(Projectile {
            damage: 40,
            target: entity,
        }));
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[test]
fn execution_order_resolves_chain_registered_backwards() {
    let mut s = Scheduler::new();
    s.add_system(Reaper::default()).unwrap();
    s.add_system(Impact).unwrap();
    s.add_system(Movement).unwrap();

    let order = s.execution_order();
    let pos = |suffix: &str| order.iter().position(|n| n.ends_with(suffix));
    assert!(pos("Movement") < pos("Impact"));
    assert!(pos("Impact") < pos("Reaper"));
}

#[test]
fn projectiles_spawned_this_update_hit_next_update() {
    let mut world = World::new();
    let target = world.spawn_bundle(ComponentBundle::new().with(Health(100)));

    let mut s = Scheduler::new();
    s.add_system(Turret).unwrap();
    s.add_system(Impact).unwrap();
    s.add_system(Reaper::default()).unwrap();
    s.begin_main_loop();

    // Update 1: turret fires, projectile does not exist yet for Impact.
    s.update(&mut world, 0.1);
    assert_eq!(world.get::<Health>(target), Some(&Health(100)));
    assert_eq!(world.iter::<Projectile>().count(), 1);

    // Update 2: first projectile hits, a second one is fired.
    s.update(&mut world, 0.1);
    assert_eq!(world.get::<Health>(target), Some(&Health(60)));
    assert_eq!(world.iter::<Projectile>().count(), 1);

    // Updates 3 and 4: down to -20, reaped on the update it crosses zero.
    s.update(&mut world, 0.1);
    s.update(&mut world, 0.1);
    assert!(world.find_entity(target).is_none());
    assert_eq!(s.system::<Reaper>().unwrap().reaped, vec![target]);

    // The last projectile still resolves cleanly against a dead target.
    s.update(&mut world, 0.1);
    assert_eq!(world.iter::<Projectile>().count(), 0);
}

#[test]
fn movement_integrates_with_fixed_dt() {
    let mut world = World::new();
    let mover = world.spawn_bundle(
        ComponentBundle::new()
            .with(Position(0.0))
            .with(Velocity(6.0)),
    );
    let still = world.spawn_bundle(ComponentBundle::new().with(Position(3.0)));

    let mut s = Scheduler::new();
    s.add_system(Movement).unwrap();
    for _ in 0..60 {
        s.update(&mut world, 1.0 / 60.0);
    }

    let x = world.get::<Position>(mover).map_or(f64::NAN, |p| p.0);
    assert!((x - 6.0).abs() < 1e-9, "got {x}");
    assert_eq!(world.get::<Position>(still), Some(&Position(3.0)));
}

#[test]
fn removed_component_stops_candidacy_next_update() {
    struct Brake;
    impl System for Brake {
        fn requirements(&self) -> SystemRequirements {
            SystemRequirements::new().supports::<Velocity>()
        }
        fn process(&mut self, ctx: &mut SystemContext<'_>, entity: EntityId, _dt: f64) {
            ctx.remove::<Velocity>(entity);
        }
    }

    let mut world = World::new();
    let e = world.spawn_bundle(
        ComponentBundle::new()
            .with(Position(0.0))
            .with(Velocity(1.0)),
    );

    let mut s = Scheduler::new();
    s.add_system(Brake).unwrap();
    s.add_system(Movement).unwrap();

    s.update(&mut world, 1.0);
    // Movement ran in the same update that queued the removal.
    assert_eq!(world.get::<Position>(e), Some(&Position(1.0)));
    assert!(!world.has::<Velocity>(e));

    s.update(&mut world, 1.0);
    assert_eq!(world.get::<Position>(e), Some(&Position(1.0)));
}

#[test]
fn replicated_id_is_honoured_and_fresh_ids_skip_it() {
    let mut world = World::new();
    let remote = EntityId::from_raw(1_000);
    world.create_entity_with_id(remote).unwrap();
    world.insert(remote, Health(5)).unwrap();

    let err = world.create_entity_with_id(remote).unwrap_err();
    assert!(matches!(err, EcsError::DuplicateId { .. }));

    let locals: Vec<EntityId> = (0..1_100).map(|_| world.create_entity()).collect();
    assert!(!locals.contains(&remote));
    assert_eq!(world.get::<Health>(remote), Some(&Health(5)));
}

#[test]
fn replicated_id_at_top_of_range_never_aliases() {
    let mut world = World::new();
    let first = world.create_entity();
    let remote = EntityId::from_raw(u64::MAX);
    world.create_entity_with_id(remote).unwrap();

    let fresh = world.create_entity();
    assert_ne!(fresh, first);
    assert_ne!(fresh, remote);
    assert_eq!(world.entity_count(), 3);
}

#[test]
fn diagnostics_report_each_system() {
    let mut world = World::new();
    for i in 0..10 {
        world.spawn_bundle(ComponentBundle::new().with(Position(i as f64)).with(Velocity(1.0)));
    }

    let mut s = Scheduler::new();
    s.add_system(Movement).unwrap();
    s.add_system(Reaper::default()).unwrap();
    s.update(&mut world, 0.5);

    let diag = s.last_diagnostics();
    assert_eq!(diag.system_times.len(), 2);
    let movement = diag
        .system_times
        .iter()
        .find(|t| t.name.ends_with("Movement"))
        .unwrap();
    assert_eq!(movement.entities, 10);
    assert_eq!(diag.commands, ApplyReport::default());
}
