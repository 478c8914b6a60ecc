//! Headless sandbox -- particles drift under a toy physics provider, expire,
//! and respawn, until a scripted exit after two simulated seconds.
//!
//! Run with:
//!   RUST_LOG=info cargo run --example headless_sandbox -p dawn-engine

use dawn_engine::prelude::*;

// ---------------------------------------------------------------------------
// Components
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
struct Position(f64, f64);

#[derive(Debug, Clone, Copy)]
struct Velocity(f64, f64);

#[derive(Debug, Clone, Copy)]
struct Lifetime(f64);

// ---------------------------------------------------------------------------
// Collaborators
// ---------------------------------------------------------------------------

/// Explicit Euler integration of every `Position` with a `Velocity`.
struct EulerPhysics;

impl PhysicsProvider for EulerPhysics {
    fn update(&mut self, world: &mut World, dt: f64, _camera: Option<EntityId>) {
        let moving: Vec<(EntityId, Velocity)> =
            world.iter::<Velocity>().map(|(e, v)| (e, *v)).collect();
        for (entity, velocity) in moving {
            if let Some(pos) = world.get_mut::<Position>(entity) {
                pos.0 += velocity.0 * dt;
                pos.1 += velocity.1 * dt;
            }
        }
    }
}

/// Pretends a peer said hello once.
struct LoopbackNet {
    greeted: bool,
}

impl NetworkProvider for LoopbackNet {
    fn update(&mut self, _dt: f64, events: &mut EventSystem) {
        if !self.greeted {
            self.greeted = true;
            events.queue(MessageEvent {
                sender: "loopback".to_owned(),
                message: "hello from the wire".to_owned(),
            });
        }
    }
}

// ---------------------------------------------------------------------------
// Systems
// ---------------------------------------------------------------------------

/// Counts down lifetimes; expired particles respawn at the origin.
struct Expiry {
    respawned: u32,
}

impl System for Expiry {
    fn requirements(&self) -> SystemRequirements {
        SystemRequirements::new()
            .supports::<Lifetime>()
            .supports::<Position>()
    }

    fn process(&mut self, ctx: &mut SystemContext<'_>, entity: EntityId, dt: f64) {
        let Some(life) = ctx.get_mut::<Lifetime>(entity) else {
            return;
        };
        life.0 -= dt;
        if life.0 > 0.0 {
            return;
        }

        let heading = f64::from(self.respawned) * 0.7;
        ctx.despawn(entity);
        ctx.spawn(
            ComponentBundle::new()
                .with(Position(0.0, 0.0))
                .with(Velocity(heading.cos(), heading.sin()))
                .with(Lifetime(0.5)),
        );
        self.respawned += 1;
    }
}

/// Reports the particle spread once per simulated second.
struct Census {
    elapsed: f64,
}

impl System for Census {
    fn requirements(&self) -> SystemRequirements {
        SystemRequirements::new()
            .supports::<Position>()
            .executes_after::<Expiry>()
    }

    fn begin_processing(&mut self, ctx: &mut SystemContext<'_>) {
        self.elapsed += ctx.dt();
        if self.elapsed < 1.0 {
            return;
        }
        self.elapsed -= 1.0;
        let farthest = ctx
            .world()
            .iter::<Position>()
            .map(|(_, p)| p.0.hypot(p.1))
            .fold(0.0, f64::max);
        tracing::info!(
            particles = ctx.world().entity_count(),
            farthest,
            "census"
        );
    }

    fn process(&mut self, _ctx: &mut SystemContext<'_>, _entity: EntityId, _dt: f64) {}
}

// ---------------------------------------------------------------------------
// Game mode
// ---------------------------------------------------------------------------

struct Sandbox;

impl GameMode for Sandbox {
    fn name(&self) -> &'static str {
        "sandbox"
    }

    fn on_start(&mut self, ctx: &mut Context) {
        let Some(scene) = ctx.subsystem_mut::<SceneManager>() else {
            return;
        };
        for i in 0..16 {
            let angle = f64::from(i) * std::f64::consts::TAU / 16.0;
            scene.spawn(
                ComponentBundle::new()
                    .with(Position(0.0, 0.0))
                    .with(Velocity(angle.cos() * 2.0, angle.sin() * 2.0))
                    .with(Lifetime(0.25 + f64::from(i) * 0.05)),
            );
        }
    }

    fn update(&mut self, _ctx: &mut GameModeContext<'_>, _dt: f64) {}
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<(), anyhow::Error> {
    let config = EngineConfig {
        game_name: "Headless Sandbox".to_owned(),
        ..EngineConfig::headless()
    };
    let mut engine = Engine::builder(config)
        .physics(EulerPhysics)
        .network(LoopbackNet { greeted: false })
        .build()?;

    if let Some(events) = engine.events_mut() {
        events.add_listener::<MessageEvent>(|msg, _| {
            tracing::info!(sender = %msg.sender, message = %msg.message, "message received");
        });
    }
    if let Some(scene) = engine.scene_mut() {
        scene.add_system(Census { elapsed: 0.0 })?;
        scene.add_system(Expiry { respawned: 0 })?;
    }
    engine.set_game_mode(Sandbox);

    engine.run(
        |engine, _| {
            if engine.sim_time() >= 2.0 {
                if let Some(events) = engine.events_mut() {
                    events.queue(ExitEvent);
                }
            }
        },
        |_, _| {},
    );

    let respawned = engine
        .scene()
        .and_then(|s| s.system::<Expiry>())
        .map(|e| e.respawned);
    if let Some(respawned) = respawned {
        println!(
            "stopped after {} ticks ({:.2}s simulated), {respawned} respawns",
            engine.tick_count(),
            engine.sim_time()
        );
    }
    engine.shutdown();
    Ok(())
}
