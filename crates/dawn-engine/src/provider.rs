//! Collaborator interfaces consumed by the engine loop.
//!
//! Physics, networking, rendering and UI are black boxes to the core. Each is
//! a narrow trait plus a concrete [`Subsystem`] wrapper so the engine can find
//! it through the [`Context`](crate::context::Context) by type. Every provider
//! is optional; when one is missing its stage is skipped.

use dawn_ecs::entity::EntityId;
use dawn_ecs::world::World;

use crate::context::Subsystem;
use crate::event::EventSystem;

// ---------------------------------------------------------------------------
// Physics
// ---------------------------------------------------------------------------

/// Steps a physics simulation and writes results back into component data.
pub trait PhysicsProvider {
    /// Advance by `dt` seconds. `camera` is the entity the view follows, for
    /// providers that cull or prioritise around it.
    fn update(&mut self, world: &mut World, dt: f64, camera: Option<EntityId>);

    /// Release resources before the subsystem is dropped.
    fn shutdown(&mut self) {}
}

/// Subsystem wrapper around a [`PhysicsProvider`].
pub struct PhysicsSubsystem {
    provider: Box<dyn PhysicsProvider>,
    camera: Option<EntityId>,
}

impl PhysicsSubsystem {
    /// Wrap `provider` with no camera entity.
    pub fn new(provider: impl PhysicsProvider + 'static) -> Self {
        Self {
            provider: Box::new(provider),
            camera: None,
        }
    }

    /// Entity passed to the provider as camera context.
    pub fn camera(&self) -> Option<EntityId> {
        self.camera
    }

    /// Set or clear the camera entity.
    pub fn set_camera(&mut self, camera: Option<EntityId>) {
        self.camera = camera;
    }

    /// Step the provider.
    pub fn update(&mut self, world: &mut World, dt: f64) {
        self.provider.update(world, dt, self.camera);
    }
}

impl Subsystem for PhysicsSubsystem {
    fn name(&self) -> &'static str {
        "physics"
    }

    fn shutdown(&mut self) {
        self.provider.shutdown();
    }
}

// ---------------------------------------------------------------------------
// Network
// ---------------------------------------------------------------------------

/// Drains inbound traffic and turns it into local events. Must not block.
pub trait NetworkProvider {
    /// Poll the transport and queue or trigger events for what arrived.
    fn update(&mut self, dt: f64, events: &mut EventSystem);

    /// Close connections before the subsystem is dropped.
    fn shutdown(&mut self) {}
}

/// Subsystem wrapper around a [`NetworkProvider`].
pub struct NetSubsystem {
    provider: Box<dyn NetworkProvider>,
}

impl NetSubsystem {
    /// Wrap `provider`.
    pub fn new(provider: impl NetworkProvider + 'static) -> Self {
        Self {
            provider: Box::new(provider),
        }
    }

    /// Poll the provider.
    pub fn update(&mut self, dt: f64, events: &mut EventSystem) {
        self.provider.update(dt, events);
    }
}

impl Subsystem for NetSubsystem {
    fn name(&self) -> &'static str {
        "net"
    }

    fn shutdown(&mut self) {
        self.provider.shutdown();
    }
}

// ---------------------------------------------------------------------------
// Renderer
// ---------------------------------------------------------------------------

/// Display dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Viewport {
    /// Width over height, or 0.0 for a zero-height viewport.
    pub fn aspect_ratio(&self) -> f64 {
        if self.height == 0 {
            0.0
        } else {
            f64::from(self.width) / f64::from(self.height)
        }
    }
}

/// Draws the world. Never mutates simulation state.
pub trait RenderBackend {
    /// Record draw work for the current world state, blended by
    /// `interpolation` toward the next step.
    fn render(&mut self, world: &World, interpolation: f64);

    /// Present the frame.
    fn frame(&mut self);

    /// Current display size.
    fn viewport(&self) -> Viewport;

    /// Resize the display. Called once at engine build with the configured
    /// window size.
    fn resize(&mut self, _viewport: Viewport) {}

    /// Release GPU resources before the subsystem is dropped.
    fn shutdown(&mut self) {}
}

/// Subsystem wrapper around a [`RenderBackend`].
pub struct RendererSubsystem {
    backend: Box<dyn RenderBackend>,
    frames: u64,
}

impl RendererSubsystem {
    /// Wrap `backend`.
    pub fn new(backend: impl RenderBackend + 'static) -> Self {
        Self {
            backend: Box::new(backend),
            frames: 0,
        }
    }

    /// Draw the world.
    pub fn render(&mut self, world: &World, interpolation: f64) {
        self.backend.render(world, interpolation);
    }

    /// Present and count the frame.
    pub fn frame(&mut self) {
        self.backend.frame();
        self.frames += 1;
    }

    /// Current display size.
    pub fn viewport(&self) -> Viewport {
        self.backend.viewport()
    }

    /// Ask the backend to resize its display.
    pub fn resize(&mut self, viewport: Viewport) {
        tracing::debug!(width = viewport.width, height = viewport.height, "renderer resized");
        self.backend.resize(viewport);
    }

    /// Frames presented so far.
    pub fn frames_presented(&self) -> u64 {
        self.frames
    }
}

impl Subsystem for RendererSubsystem {
    fn name(&self) -> &'static str {
        "renderer"
    }

    fn shutdown(&mut self) {
        self.backend.shutdown();
    }
}

// ---------------------------------------------------------------------------
// UI
// ---------------------------------------------------------------------------

/// In-game user interface layer.
pub trait UserInterface {
    /// Advance widgets after the simulation step.
    fn update(&mut self, dt: f64);

    /// Draw on top of the rendered world.
    fn render(&mut self);

    /// Release resources before the subsystem is dropped.
    fn shutdown(&mut self) {}
}

/// Subsystem wrapper around a [`UserInterface`].
pub struct UiSubsystem {
    ui: Box<dyn UserInterface>,
}

impl UiSubsystem {
    /// Wrap `ui`.
    pub fn new(ui: impl UserInterface + 'static) -> Self {
        Self { ui: Box::new(ui) }
    }

    /// Advance the UI.
    pub fn update(&mut self, dt: f64) {
        self.ui.update(dt);
    }

    /// Draw the UI.
    pub fn render(&mut self) {
        self.ui.render();
    }
}

impl Subsystem for UiSubsystem {
    fn name(&self) -> &'static str {
        "ui"
    }

    fn shutdown(&mut self) {
        self.ui.shutdown();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
