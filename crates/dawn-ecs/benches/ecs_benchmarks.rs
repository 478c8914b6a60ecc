//! Scheduler and component store benchmarks.
//!
//! The frame budget at 60 Hz is 16.67ms; a scheduler update over 10K
//! candidate entities should stay well inside it.
//!
//! Run with: `cargo bench --bench ecs_benchmarks`

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use dawn_ecs::prelude::*;

// ---------------------------------------------------------------------------
// Benchmark component types and systems
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
struct Position {
    x: f64,
    y: f64,
}

#[derive(Debug, Clone, PartialEq)]
struct Velocity {
    dx: f64,
    dy: f64,
}

#[derive(Debug, Clone, PartialEq)]
struct Health(u32);

struct Movement;

impl System for Movement {
    fn requirements(&self) -> SystemRequirements {
        SystemRequirements::new()
            .supports::<Position>()
            .supports::<Velocity>()
    }

    fn process(&mut self, ctx: &mut SystemContext<'_>, entity: EntityId, dt: f64) {
        let Some(v) = ctx.get::<Velocity>(entity).cloned() else {
            return;
        };
        if let Some(p) = ctx.get_mut::<Position>(entity) {
            p.x += v.dx * dt;
            p.y += v.dy * dt;
        }
    }
}

struct Regen;

impl System for Regen {
    fn requirements(&self) -> SystemRequirements {
        SystemRequirements::new()
            .supports::<Health>()
            .executes_after::<Movement>()
    }

    fn process(&mut self, ctx: &mut SystemContext<'_>, entity: EntityId, _dt: f64) {
        if let Some(h) = ctx.get_mut::<Health>(entity) {
            h.0 = (h.0 + 1).min(100);
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// A world where every entity has Position and Velocity and every other
/// entity also has Health.
fn setup_world(entity_count: usize) -> World {
    let mut world = World::new();
    world.register_component::<Position>("position");
    world.register_component::<Velocity>("velocity");
    world.register_component::<Health>("health");

    for i in 0..entity_count {
        let mut bundle = ComponentBundle::new()
            .with(Position { x: i as f64, y: 0.0 })
            .with(Velocity { dx: 1.0, dy: 0.5 });
        if i % 2 == 0 {
            bundle.add(Health(50));
        }
        world.spawn_bundle(bundle);
    }
    world
}

// ---------------------------------------------------------------------------
// Benchmarks
// ---------------------------------------------------------------------------

fn bench_scheduler_update(c: &mut Criterion) {
    let mut group = c.benchmark_group("scheduler_update");

    for &count in &[1_000usize, 10_000] {
        let mut world = setup_world(count);
        let mut scheduler = Scheduler::new();
        let _ = scheduler.add_system(Regen);
        let _ = scheduler.add_system(Movement);
        scheduler.begin_main_loop();

        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, &_count| {
            b.iter(|| {
                scheduler.update(&mut world, 1.0 / 60.0);
                black_box(scheduler.last_diagnostics().total_time);
            });
        });
    }

    group.finish();
}

fn bench_deferred_spawn_despawn(c: &mut Criterion) {
    let mut world = setup_world(1_000);

    c.bench_function("command_buffer_spawn_despawn_1k", |b| {
        b.iter(|| {
            let mut cmds = CommandBuffer::new();
            let ids: Vec<EntityId> = (0..1_000)
                .map(|i| {
                    let id = world.reserve_entity_id();
                    cmds.spawn(id, ComponentBundle::new().with(Health(i)));
                    id
                })
                .collect();
            cmds.apply(&mut world);

            for id in ids {
                cmds.despawn(id);
            }
            black_box(cmds.apply(&mut world));
        });
    });
}

fn bench_entities_with(c: &mut Criterion) {
    let world = setup_world(10_000);
    let kinds = [
        ComponentKind::of::<Position>(),
        ComponentKind::of::<Health>(),
    ];

    c.bench_function("entities_with_10k", |b| {
        b.iter(|| black_box(world.entities_with(&kinds).len()));
    });
}

// ---------------------------------------------------------------------------
// Criterion groups and main
// ---------------------------------------------------------------------------

criterion_group!(
    benches,
    bench_scheduler_update,
    bench_deferred_spawn_despawn,
    bench_entities_with,
);
criterion_main!(benches);
