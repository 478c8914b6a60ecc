//! Dawn Engine -- subsystem coordination and the fixed-timestep main loop.
//!
//! This crate builds on [`dawn_ecs`] to provide the runtime around a scene:
//! a typed [`Context`](context::Context) of subsystems with ordered teardown,
//! a [`SimulationClock`](clock::SimulationClock) that turns frame time into
//! fixed steps, an in-process [`EventSystem`](event::EventSystem), game modes,
//! and the [`Engine`](engine::Engine) that runs the stages of every step in a
//! fixed order.
//!
//! # Quick Start
//!
//! ```
//! use dawn_engine::prelude::*;
//!
//! struct Counter(u32);
//!
//! struct Count;
//!
//! impl System for Count {
//!     fn requirements(&self) -> SystemRequirements {
//!         SystemRequirements::new().supports::<Counter>()
//!     }
//!
//!     fn process(&mut self, ctx: &mut SystemContext<'_>, entity: EntityId, _dt: f64) {
//!         if let Some(counter) = ctx.get_mut::<Counter>(entity) {
//!             counter.0 += 1;
//!         }
//!     }
//! }
//!
//! let mut engine = Engine::builder(EngineConfig::headless()).build()?;
//! let scene = engine.scene_mut().expect("scene is registered at build");
//! scene.add_system(Count)?;
//! let e = scene.spawn(ComponentBundle::new().with(Counter(0)));
//!
//! // One 1/30 s frame at 60 Hz is two fixed steps.
//! let report = engine.run_frame(1.0 / 30.0, |_, _| {}, |_, _| {});
//! assert_eq!(report.steps, 2);
//! assert_eq!(engine.scene().and_then(|s| s.world().get::<Counter>(e)).map(|c| c.0), Some(2));
//! # Ok::<(), EngineError>(())
//! ```

#![deny(unsafe_code)]

pub mod clock;
pub mod config;
pub mod context;
pub mod engine;
pub mod event;
pub mod game;
pub mod logging;
pub mod provider;
pub mod scene;

// ---------------------------------------------------------------------------
// Re-exports
// ---------------------------------------------------------------------------

/// Re-export the ECS crate for convenience.
pub use dawn_ecs;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors raised while bootstrapping or reconfiguring the engine.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// A subsystem of this type is already registered.
    #[error("subsystem `{name}` is already registered")]
    DuplicateSubsystem {
        /// Name of the rejected subsystem.
        name: &'static str,
    },

    /// Configuration could not be loaded, saved or validated.
    #[error(transparent)]
    Config(#[from] config::ConfigError),

    /// Entity registry failure.
    #[error(transparent)]
    Ecs(#[from] dawn_ecs::EcsError),

    /// System registration failure.
    #[error(transparent)]
    Schedule(#[from] dawn_ecs::schedule::ScheduleError),
}

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common engine usage.
pub mod prelude {
    pub use dawn_ecs::prelude::*;

    pub use crate::clock::{FrameSteps, SimulationClock};
    pub use crate::config::{ConfigError, EngineConfig};
    pub use crate::context::{Context, Subsystem};
    pub use crate::engine::{Engine, EngineBuilder, FrameReport, StopHandle};
    pub use crate::event::{EventDispatch, EventSystem, ExitEvent, ListenerId, MessageEvent};
    pub use crate::game::{GameFramework, GameMode, GameModeContext};
    pub use crate::provider::{
        NetSubsystem, NetworkProvider, PhysicsProvider, PhysicsSubsystem, RenderBackend,
        RendererSubsystem, UiSubsystem, UserInterface, Viewport,
    };
    pub use crate::scene::SceneManager;
    pub use crate::EngineError;
}
