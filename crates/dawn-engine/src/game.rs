//! Game modes and the framework that swaps them.
//!
//! A [`GameMode`] is the top-level gameplay state (main menu, match, ...).
//! [`GameFramework::set_game_mode`] only records the request; the handoff
//! happens at the start of the framework's next update. While the framework is
//! lent out of the [`Context`], a mode reaches the pending slot through the
//! [`GameModeContext`] it is updated with, so it can replace itself.

use std::any::type_name;
use std::ops::{Deref, DerefMut};

use crate::context::{Context, Subsystem};

/// Top-level gameplay state.
pub trait GameMode: 'static {
    /// Name used in logs.
    fn name(&self) -> &'static str {
        type_name::<Self>()
    }

    /// Called once when the mode becomes active.
    fn on_start(&mut self, _ctx: &mut Context) {}

    /// Called once per fixed step while active.
    fn update(&mut self, ctx: &mut GameModeContext<'_>, dt: f64);

    /// Called once when the mode is replaced or cleared.
    fn on_end(&mut self, _ctx: &mut Context) {}
}

/// The [`Context`] as seen by [`GameMode::update`], plus the framework's
/// pending-mode slot.
pub struct GameModeContext<'a> {
    ctx: &'a mut Context,
    pending: &'a mut Option<Box<dyn GameMode>>,
}

impl GameModeContext<'_> {
    /// Switch to `mode` at the framework's next update. Same rules as
    /// [`GameFramework::set_game_mode`].
    pub fn set_game_mode(&mut self, mode: impl GameMode) {
        replace_pending(self.pending, Box::new(mode));
    }

    /// Whether a switch is already waiting.
    pub fn has_pending_mode(&self) -> bool {
        self.pending.is_some()
    }
}

impl Deref for GameModeContext<'_> {
    type Target = Context;

    fn deref(&self) -> &Context {
        self.ctx
    }
}

impl DerefMut for GameModeContext<'_> {
    fn deref_mut(&mut self) -> &mut Context {
        self.ctx
    }
}

fn replace_pending(slot: &mut Option<Box<dyn GameMode>>, mode: Box<dyn GameMode>) {
    if let Some(replaced) = slot.replace(mode) {
        tracing::debug!(mode = replaced.name(), "pending game mode replaced");
    }
}

/// Holds the active [`GameMode`] and any pending replacement.
#[derive(Default)]
pub struct GameFramework {
    active: Option<Box<dyn GameMode>>,
    pending: Option<Box<dyn GameMode>>,
}

impl GameFramework {
    /// A framework with no mode.
    pub fn new() -> Self {
        Self::default()
    }

    /// Switch to `mode` at the next [`update`](Self::update). A later call
    /// before that update wins.
    pub fn set_game_mode(&mut self, mode: impl GameMode) {
        replace_pending(&mut self.pending, Box::new(mode));
    }

    /// End the active mode now and drop any pending one.
    pub fn clear_game_mode(&mut self, ctx: &mut Context) {
        self.pending = None;
        if let Some(mut mode) = self.active.take() {
            mode.on_end(ctx);
            tracing::info!(mode = mode.name(), "game mode ended");
        }
    }

    /// Apply a pending switch, then step the active mode.
    pub fn update(&mut self, ctx: &mut Context, dt: f64) {
        if let Some(mut next) = self.pending.take() {
            if let Some(mut previous) = self.active.take() {
                previous.on_end(ctx);
                tracing::info!(mode = previous.name(), "game mode ended");
            }
            tracing::info!(mode = next.name(), "game mode started");
            next.on_start(ctx);
            self.active = Some(next);
        }
        if let Some(mode) = self.active.as_mut() {
            let mut mode_ctx = GameModeContext {
                ctx,
                pending: &mut self.pending,
            };
            mode.update(&mut mode_ctx, dt);
        }
    }

    /// Name of the active mode.
    pub fn active_mode(&self) -> Option<&'static str> {
        self.active.as_ref().map(|m| m.name())
    }

    /// Whether a switch is waiting for the next update.
    pub fn has_pending_mode(&self) -> bool {
        self.pending.is_some()
    }
}

impl Subsystem for GameFramework {
    fn name(&self) -> &'static str {
        "game"
    }
}

impl std::fmt::Debug for GameFramework {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GameFramework")
            .field("active", &self.active_mode())
            .field("pending", &self.pending.as_ref().map(|m| m.name()))
            .finish()
    }
}
