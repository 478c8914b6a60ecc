//! Engine configuration.
//!
//! [`EngineConfig`] is stored as pretty-printed JSON. Missing fields take
//! their defaults, so an old config file keeps loading after new settings are
//! added.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::clock::{DEFAULT_MAX_FRAME_TIME, DEFAULT_MAX_STEPS_PER_FRAME};
use crate::provider::Viewport;

// ---------------------------------------------------------------------------
// ConfigError
// ---------------------------------------------------------------------------

/// Errors produced while loading, saving or validating configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The file could not be read or written.
    #[error("config I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The file is not valid JSON for [`EngineConfig`].
    #[error("config parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// A value is out of range.
    #[error("invalid config value `{field}`: {reason}")]
    Invalid {
        /// Offending field.
        field: &'static str,
        /// What is wrong with it.
        reason: String,
    },
}

// ---------------------------------------------------------------------------
// EngineConfig
// ---------------------------------------------------------------------------

/// Settings read once at engine startup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Fixed simulation step in seconds.
    pub fixed_dt: f64,
    /// Upper bound on the wall-clock delta fed to the clock per frame.
    pub max_frame_time: f64,
    /// Upper bound on catch-up steps per frame.
    pub max_steps_per_frame: u32,
    /// Skip renderer bootstrap and the render pass.
    pub headless: bool,
    /// Initial window width in pixels.
    pub window_width: u32,
    /// Initial window height in pixels.
    pub window_height: u32,
    /// Game name shown in logs and window titles.
    pub game_name: String,
    /// Game version string.
    pub game_version: String,
    /// Default `tracing` filter when `RUST_LOG` is unset.
    pub log_filter: String,
    /// Write the config back to disk on shutdown.
    pub save_config_on_exit: bool,
    /// Per-update time budget for event dispatch, in milliseconds. `None`
    /// drains the queue every update.
    pub event_budget_ms: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            fixed_dt: 1.0 / 60.0,
            max_frame_time: DEFAULT_MAX_FRAME_TIME,
            max_steps_per_frame: DEFAULT_MAX_STEPS_PER_FRAME,
            headless: false,
            window_width: 1280,
            window_height: 800,
            game_name: "Dawn".to_owned(),
            game_version: "0.1.0".to_owned(),
            log_filter: "info".to_owned(),
            save_config_on_exit: false,
            event_budget_ms: None,
        }
    }
}

impl EngineConfig {
    /// Defaults with headless mode on.
    pub fn headless() -> Self {
        Self {
            headless: true,
            ..Self::default()
        }
    }

    /// The configured window size.
    pub fn window_viewport(&self) -> Viewport {
        Viewport {
            width: self.window_width,
            height: self.window_height,
        }
    }

    /// Read a config file.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Io`] if the file cannot be read, [`ConfigError::Parse`]
    /// if it is not valid JSON.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    /// Read a config file, creating it with defaults if it does not exist.
    ///
    /// # Errors
    ///
    /// As [`load`](Self::load) and [`save`](Self::save).
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if path.exists() {
            return Self::load(path);
        }
        tracing::info!(path = %path.display(), "config does not exist, creating defaults");
        let config = Self::default();
        config.save(path)?;
        Ok(config)
    }

    /// Write the config as pretty JSON, creating parent directories.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Io`] on filesystem failure.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Check value ranges.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Invalid`] naming the first bad field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.fixed_dt > 0.0 && self.fixed_dt.is_finite()) {
            return Err(ConfigError::Invalid {
                field: "fixed_dt",
                reason: format!("must be positive and finite, got {}", self.fixed_dt),
            });
        }
        if !(self.max_frame_time > 0.0 && self.max_frame_time.is_finite()) {
            return Err(ConfigError::Invalid {
                field: "max_frame_time",
                reason: format!("must be positive and finite, got {}", self.max_frame_time),
            });
        }
        if self.max_steps_per_frame == 0 {
            return Err(ConfigError::Invalid {
                field: "max_steps_per_frame",
                reason: "must be at least 1".to_owned(),
            });
        }
        if !self.headless && (self.window_width == 0 || self.window_height == 0) {
            return Err(ConfigError::Invalid {
                field: "window_width",
                reason: format!(
                    "window must have a nonzero size, got {}x{}",
                    self.window_width, self.window_height
                ),
            });
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
