//! The engine: subsystem bootstrap and the fixed-timestep main loop.
//!
//! [`EngineBuilder::build`] registers subsystems in a fixed order (log,
//! events, renderer, UI, scene, physics, game, net) so teardown runs in the
//! reverse. Each simulation step then runs its stages in a fixed order:
//!
//! 1. network intake
//! 2. event dispatch
//! 3. physics
//! 4. game mode
//! 5. scene systems
//! 6. UI
//!
//! Rendering happens once per frame after all steps, with the interpolation
//! factor left in the clock's accumulator.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::clock::SimulationClock;
use crate::config::EngineConfig;
use crate::context::Context;
use crate::event::{EventSystem, ExitEvent};
use crate::game::{GameFramework, GameMode};
use crate::logging::LogSubsystem;
use crate::provider::{
    NetSubsystem, NetworkProvider, PhysicsProvider, PhysicsSubsystem, RenderBackend,
    RendererSubsystem, UiSubsystem, UserInterface,
};
use crate::scene::SceneManager;
use crate::EngineError;

// ---------------------------------------------------------------------------
// StopHandle / FrameReport
// ---------------------------------------------------------------------------

/// Cloneable handle that stops a running [`Engine`] from anywhere.
///
/// The loop finishes the frame it is in before exiting.
#[derive(Debug, Clone)]
pub struct StopHandle {
    running: Arc<AtomicBool>,
}

impl StopHandle {
    /// Ask the main loop to exit.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// Whether a stop has been requested.
    pub fn is_stopped(&self) -> bool {
        !self.running.load(Ordering::SeqCst)
    }
}

/// Outcome of one [`Engine::run_frame`] call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameReport {
    /// Fixed steps simulated.
    pub steps: u32,
    /// Interpolation factor passed to the render pass.
    pub interpolation: f64,
    /// Wall time discarded by the clock clamps, in seconds.
    pub dropped_time: f64,
}

// ---------------------------------------------------------------------------
// EngineBuilder
// ---------------------------------------------------------------------------

/// Collects configuration and collaborator providers, then bootstraps an
/// [`Engine`].
///
/// ```
/// use dawn_engine::config::EngineConfig;
/// use dawn_engine::engine::EngineBuilder;
///
/// let mut engine = EngineBuilder::new(EngineConfig::headless()).build()?;
/// engine.update(1.0 / 60.0);
/// assert!(engine.is_running());
/// # Ok::<(), dawn_engine::EngineError>(())
/// ```
#[derive(Default)]
pub struct EngineBuilder {
    config: EngineConfig,
    config_path: Option<PathBuf>,
    physics: Option<PhysicsSubsystem>,
    network: Option<NetSubsystem>,
    renderer: Option<RendererSubsystem>,
    ui: Option<UiSubsystem>,
}

impl EngineBuilder {
    /// Start from `config` with no providers.
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Load the config at `path`, writing defaults there if it is missing.
    /// The same path is used when saving on shutdown.
    ///
    /// # Errors
    ///
    /// [`EngineError::Config`] if the file cannot be read, parsed or created.
    pub fn from_config_file(path: impl AsRef<Path>) -> Result<Self, EngineError> {
        let path = path.as_ref();
        let config = EngineConfig::load_or_default(path)?;
        Ok(Self::new(config).config_path(path))
    }

    /// Where to save the config when `save_config_on_exit` is set.
    pub fn config_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_path = Some(path.into());
        self
    }

    /// Physics stage provider.
    pub fn physics(mut self, provider: impl PhysicsProvider + 'static) -> Self {
        self.physics = Some(PhysicsSubsystem::new(provider));
        self
    }

    /// Network intake provider.
    pub fn network(mut self, provider: impl NetworkProvider + 'static) -> Self {
        self.network = Some(NetSubsystem::new(provider));
        self
    }

    /// Render backend. Ignored in headless mode.
    pub fn renderer(mut self, backend: impl RenderBackend + 'static) -> Self {
        self.renderer = Some(RendererSubsystem::new(backend));
        self
    }

    /// User interface layer.
    pub fn ui(mut self, ui: impl UserInterface + 'static) -> Self {
        self.ui = Some(UiSubsystem::new(ui));
        self
    }

    /// Validate the config and register every subsystem.
    ///
    /// # Errors
    ///
    /// [`EngineError::Config`] for an invalid config.
    pub fn build(self) -> Result<Engine, EngineError> {
        let Self {
            config,
            config_path,
            physics,
            network,
            renderer,
            ui,
        } = self;

        if let Err(err) = config.validate() {
            tracing::error!(error = %err, "invalid engine configuration");
            return Err(err.into());
        }

        let mut context = Context::new();
        context.add_subsystem(LogSubsystem::new(&config.log_filter))?;

        let running = Arc::new(AtomicBool::new(true));
        let mut events = EventSystem::new();
        let flag = Arc::clone(&running);
        events.add_listener::<ExitEvent>(move |_, _| {
            tracing::info!("exit requested");
            flag.store(false, Ordering::SeqCst);
        });
        context.add_subsystem(events)?;

        match renderer {
            Some(_) if config.headless => {
                tracing::debug!("headless mode; render backend ignored");
            }
            Some(mut renderer) => {
                renderer.resize(config.window_viewport());
                context.add_subsystem(renderer)?;
            }
            None => {}
        }
        if let Some(ui) = ui {
            context.add_subsystem(ui)?;
        }
        context.add_subsystem(SceneManager::new())?;
        if let Some(physics) = physics {
            context.add_subsystem(physics)?;
        }
        context.add_subsystem(GameFramework::new())?;
        if let Some(network) = network {
            context.add_subsystem(network)?;
        }

        let clock = SimulationClock::new(config.fixed_dt)
            .with_max_frame_time(config.max_frame_time)
            .with_max_steps_per_frame(config.max_steps_per_frame);

        tracing::info!(
            game = %config.game_name,
            version = %config.game_version,
            headless = config.headless,
            subsystems = ?context.names(),
            "engine initialised"
        );

        Ok(Engine {
            context,
            clock,
            running,
            config,
            config_path,
            shut_down: false,
        })
    }
}

impl std::fmt::Debug for EngineBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineBuilder")
            .field("config", &self.config)
            .field("config_path", &self.config_path)
            .field("physics", &self.physics.is_some())
            .field("network", &self.network.is_some())
            .field("renderer", &self.renderer.is_some())
            .field("ui", &self.ui.is_some())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Owns the subsystem [`Context`] and drives the main loop.
pub struct Engine {
    context: Context,
    clock: SimulationClock,
    running: Arc<AtomicBool>,
    config: EngineConfig,
    config_path: Option<PathBuf>,
    shut_down: bool,
}

impl Engine {
    /// Builder with the given config.
    pub fn builder(config: EngineConfig) -> EngineBuilder {
        EngineBuilder::new(config)
    }

    // -- stepping -----------------------------------------------------------

    /// Run one simulation step of `dt` seconds through every stage.
    pub fn update(&mut self, dt: f64) {
        let budget = self.config.event_budget_ms.map(Duration::from_millis);
        let ctx = &mut self.context;

        ctx.with_subsystem::<NetSubsystem, _>(|net, ctx| {
            if let Some(events) = ctx.subsystem_mut::<EventSystem>() {
                net.update(dt, events);
            }
        });

        if let Some(events) = ctx.subsystem_mut::<EventSystem>() {
            events.update(budget);
        }

        ctx.with_subsystem::<PhysicsSubsystem, _>(|physics, ctx| {
            if let Some(scene) = ctx.subsystem_mut::<SceneManager>() {
                physics.update(scene.world_mut(), dt);
            }
        });

        ctx.with_subsystem::<GameFramework, _>(|game, ctx| game.update(ctx, dt));

        if let Some(scene) = ctx.subsystem_mut::<SceneManager>() {
            scene.update(dt);
        }

        if let Some(ui) = ctx.subsystem_mut::<UiSubsystem>() {
            ui.update(dt);
        }
    }

    /// Draw one frame: world, then `render`, then UI, then present.
    ///
    /// `render` gets a shared borrow so it cannot change simulation state.
    pub fn render(&mut self, interpolation: f64, mut render: impl FnMut(&Engine, f64)) {
        self.context
            .with_subsystem::<RendererSubsystem, _>(|renderer, ctx| {
                if let Some(scene) = ctx.subsystem::<SceneManager>() {
                    renderer.render(scene.world(), interpolation);
                }
            });

        render(&*self, interpolation);

        if let Some(ui) = self.context.subsystem_mut::<UiSubsystem>() {
            ui.render();
        }
        if let Some(renderer) = self.context.subsystem_mut::<RendererSubsystem>() {
            renderer.frame();
        }
    }

    /// One main-loop iteration for a frame that took `elapsed` seconds.
    ///
    /// Runs as many fixed steps as the clock hands out, calling `tick` after
    /// each, then renders once.
    pub fn run_frame(
        &mut self,
        elapsed: f64,
        mut tick: impl FnMut(&mut Engine, f64),
        render: impl FnMut(&Engine, f64),
    ) -> FrameReport {
        let frame = self.clock.advance(elapsed);
        let dt = self.clock.fixed_dt();
        for _ in 0..frame.steps {
            self.update(dt);
            tick(&mut *self, dt);
        }
        self.render(frame.interpolation, render);

        FrameReport {
            steps: frame.steps,
            interpolation: frame.interpolation,
            dropped_time: frame.dropped,
        }
    }

    /// Freeze the system schedule. Called by [`run`](Self::run); call it
    /// directly when driving frames by hand.
    pub fn begin_main_loop(&mut self) {
        if let Some(scene) = self.context.subsystem_mut::<SceneManager>() {
            scene.begin_main_loop();
        }
    }

    /// Loop on the wall clock until stopped by an [`ExitEvent`] or a
    /// [`StopHandle`], then end the active game mode.
    pub fn run(
        &mut self,
        mut tick: impl FnMut(&mut Engine, f64),
        mut render: impl FnMut(&Engine, f64),
    ) {
        self.begin_main_loop();
        tracing::info!(fixed_dt = self.clock.fixed_dt(), "main loop started");

        let mut last = Instant::now();
        while self.is_running() {
            let now = Instant::now();
            let elapsed = now.duration_since(last).as_secs_f64();
            last = now;
            self.run_frame(elapsed, &mut tick, &mut render);
        }

        self.context
            .with_subsystem::<GameFramework, _>(|game, ctx| game.clear_game_mode(ctx));
        tracing::info!(
            ticks = self.clock.tick_count(),
            sim_time = self.clock.sim_time(),
            "main loop stopped"
        );
    }

    /// Ask the loop to exit after the current frame.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// Handle that can stop the loop from a callback or another thread.
    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            running: Arc::clone(&self.running),
        }
    }

    /// Whether the main loop should keep going.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Save the config if requested and tear down every subsystem in reverse
    /// order. Runs once; later calls do nothing.
    pub fn shutdown(&mut self) {
        if self.shut_down {
            return;
        }
        self.shut_down = true;
        self.stop();

        if self.config.save_config_on_exit {
            match &self.config_path {
                Some(path) => {
                    if let Err(err) = self.config.save(path) {
                        tracing::error!(
                            path = %path.display(),
                            error = %err,
                            "failed to save configuration"
                        );
                    }
                }
                None => tracing::warn!("save_config_on_exit set but no config path"),
            }
        }

        self.context.clear_subsystems();
        tracing::info!("engine shut down");
    }

    // -- accessors ----------------------------------------------------------

    /// Switch game mode at the start of the next step. Returns `false` if the
    /// game framework was removed.
    pub fn set_game_mode(&mut self, mode: impl GameMode) -> bool {
        match self.context.subsystem_mut::<GameFramework>() {
            Some(game) => {
                game.set_game_mode(mode);
                true
            }
            None => false,
        }
    }

    /// Wall-clock delta of the latest frame, in seconds.
    pub fn frame_time(&self) -> f64 {
        self.clock.frame_time()
    }

    /// Fixed steps simulated so far.
    pub fn tick_count(&self) -> u64 {
        self.clock.tick_count()
    }

    /// Simulated seconds so far.
    pub fn sim_time(&self) -> f64 {
        self.clock.sim_time()
    }

    /// The fixed-timestep clock.
    pub fn clock(&self) -> &SimulationClock {
        &self.clock
    }

    /// Active configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Mutable configuration. Clock settings only apply at build time.
    pub fn config_mut(&mut self) -> &mut EngineConfig {
        &mut self.config
    }

    /// The subsystem context.
    pub fn context(&self) -> &Context {
        &self.context
    }

    /// Mutable subsystem context.
    pub fn context_mut(&mut self) -> &mut Context {
        &mut self.context
    }

    /// The scene manager, unless it was removed.
    pub fn scene(&self) -> Option<&SceneManager> {
        self.context.subsystem::<SceneManager>()
    }

    /// Mutable scene manager.
    pub fn scene_mut(&mut self) -> Option<&mut SceneManager> {
        self.context.subsystem_mut::<SceneManager>()
    }

    /// The event system, unless it was removed.
    pub fn events(&self) -> Option<&EventSystem> {
        self.context.subsystem::<EventSystem>()
    }

    /// Mutable event system.
    pub fn events_mut(&mut self) -> Option<&mut EventSystem> {
        self.context.subsystem_mut::<EventSystem>()
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("context", &self.context)
            .field("clock", &self.clock)
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stop_handle_shares_flag() {
        let engine = EngineBuilder::new(EngineConfig::headless()).build().unwrap();
        let handle = engine.stop_handle();
        assert!(!handle.is_stopped());
        handle.clone().stop();
        assert!(handle.is_stopped());
        assert!(!engine.is_running());
    }

    #[test]
    fn invalid_config_fails_build() {
        let config = EngineConfig {
            fixed_dt: 0.0,
            ..EngineConfig::headless()
        };
        let err = EngineBuilder::new(config).build().unwrap_err();
        assert!(matches!(err, EngineError::Config(_)));
    }

    #[test]
    fn shutdown_is_idempotent() {
        let mut engine = EngineBuilder::new(EngineConfig::headless()).build().unwrap();
        engine.shutdown();
        assert!(engine.context().is_empty());
        engine.shutdown();
        assert!(engine.scene().is_none());
    }

    #[test]
    fn run_frame_reports_clamped_time() {
        let mut engine = EngineBuilder::new(EngineConfig::headless()).build().unwrap();
        let report = engine.run_frame(1.0, |_, _| {}, |_, _| {});
        assert_eq!(report.steps, engine.config().max_steps_per_frame);
        assert!(report.dropped_time > 0.0);
        assert_eq!(engine.frame_time(), 1.0);
    }
}
